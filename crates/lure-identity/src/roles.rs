//! Realm roles provisioned in every tenant realm

use std::fmt;
use std::str::FromStr;

use lure_core::ServiceError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RealmRole {
    #[serde(rename = "ORG_MANAGER")]
    OrgManager,
    #[serde(rename = "CONTENT_MANAGER")]
    ContentManager,
    #[serde(rename = "DEFAULT_USER")]
    DefaultUser,
}

impl RealmRole {
    pub const ALL: [RealmRole; 3] = [
        RealmRole::OrgManager,
        RealmRole::ContentManager,
        RealmRole::DefaultUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RealmRole::OrgManager => "ORG_MANAGER",
            RealmRole::ContentManager => "CONTENT_MANAGER",
            RealmRole::DefaultUser => "DEFAULT_USER",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RealmRole::OrgManager => "Manages users, groups and campaigns of the organization",
            RealmRole::ContentManager => "Manages training content and templates",
            RealmRole::DefaultUser => "Regular member of the organization",
        }
    }
}

impl fmt::Display for RealmRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RealmRole {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RealmRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| {
                ServiceError::validation(format!(
                    "Role '{}' is not one of ORG_MANAGER, CONTENT_MANAGER, DEFAULT_USER",
                    s
                ))
            })
    }
}

/// Client that owns the realm administration roles in Keycloak.
pub const REALM_MANAGEMENT_CLIENT: &str = "realm-management";
/// Client role granting full realm administration.
pub const REALM_ADMIN_ROLE: &str = "realm-admin";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_roles() {
        assert_eq!("ORG_MANAGER".parse::<RealmRole>().unwrap(), RealmRole::OrgManager);
        assert_eq!(
            "DEFAULT_USER".parse::<RealmRole>().unwrap(),
            RealmRole::DefaultUser
        );
    }

    #[test]
    fn test_unknown_role_is_validation_error() {
        let err = "SUPERUSER".parse::<RealmRole>().unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }
}
