use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRealmRequest {
    #[schema(example = "acme")]
    pub name: String,
    /// Bootstrap organization manager.
    #[schema(example = "it-admin@acme.test")]
    pub admin_email: String,
    #[schema(example = "acme.test")]
    pub domain: String,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedRealm {
    pub name: String,
    pub domain: String,
    pub admin_email: String,
    /// Shown once; the admin must change it at first login.
    pub temporary_password: String,
    pub features: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RealmSummary {
    pub name: String,
    pub enabled: bool,
    pub domain: Option<String>,
    pub features: BTreeMap<String, bool>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeletedRealm {
    pub name: String,
    pub deleted_users: usize,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "bob@acme.test")]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// One of `ORG_MANAGER`, `CONTENT_MANAGER`, `DEFAULT_USER`.
    #[schema(example = "DEFAULT_USER")]
    pub role: String,
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub temporary_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_org_manager: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct EventQuery {
    pub first: Option<u32>,
    pub max: Option<u32>,
    /// Event type filter, e.g. `LOGIN_ERROR`.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
}

impl EventQuery {
    pub(crate) fn to_query_string(&self) -> String {
        let mut params = Vec::new();
        if let Some(first) = self.first {
            params.push(format!("first={}", first));
        }
        params.push(format!("max={}", self.max.unwrap_or(100)));
        if let Some(event_type) = &self.event_type {
            params.push(format!("type={}", lure_identity::segment(event_type)));
        }
        params.join("&")
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QuizSubmission {
    /// Chosen option index per question, in question order.
    pub answers: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_query_defaults_max() {
        assert_eq!(EventQuery::default().to_query_string(), "max=100");
        let query = EventQuery {
            first: Some(20),
            max: Some(10),
            event_type: Some("LOGIN_ERROR".into()),
        };
        assert_eq!(query.to_query_string(), "first=20&max=10&type=LOGIN_ERROR");
    }
}
