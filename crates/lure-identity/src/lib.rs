//! Identity provider integration
//!
//! [`IdentityGateway`] wraps the Keycloak admin REST API and
//! [`RealmBlueprint`] produces the payload used to provision a tenant realm.

pub mod gateway;
pub mod password;
pub mod realm_template;
pub mod representations;
pub mod roles;

pub use gateway::{map_status, IdentityConfig, IdentityGateway, IdpResponse};
pub use password::generate_temporary_password;
pub use realm_template::{feature_mapper, features_from_scope, RealmBlueprint};
pub use representations::*;
pub use roles::{RealmRole, REALM_ADMIN_ROLE, REALM_MANAGEMENT_CLIENT};

/// Percent-encode one admin API path segment.
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
