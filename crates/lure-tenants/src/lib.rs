//! Tenant administration
//!
//! The identity provider stays authoritative for realms, users, groups and
//! role mappings; every mutation goes there first and is then mirrored into
//! the local database. Listing operations reconcile the mirror.

pub mod handlers;
pub mod plugin;
pub mod services;

pub use plugin::TenantsPlugin;
pub use services::*;
