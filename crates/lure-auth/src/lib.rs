//! Request authentication and authorization
//!
//! Bearer tokens are verified against the issuing realm's JWKS, the realm
//! named in the path is matched against the token realm, and the final
//! decision is delegated to the identity provider through a UMA ticket
//! exchange for `{resource}#{scope}`.

pub mod claims;
pub mod context;
pub mod guard;
pub mod jwks;

pub use claims::{realm_from_issuer, TokenClaims};
pub use context::AuthContext;
pub use guard::{require_permission, AuthorizationGuard, GuardConfig, Permission};
pub use jwks::JwksCache;
