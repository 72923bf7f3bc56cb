use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use lure_core::{Problem, ServiceError};

/// Verified caller identity, inserted into request extensions by the guard.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub realm: String,
    pub subject: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    /// Raw bearer token, forwarded to the identity provider for UMA.
    pub token: String,
}

impl AuthContext {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Best identifier for audit trails and compliance records.
    pub fn identifier(&self) -> &str {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.subject)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = Problem;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| ServiceError::unauthenticated("Authentication required").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_prefers_email() {
        let mut ctx = AuthContext {
            realm: "acme".into(),
            subject: "sub-1".into(),
            username: Some("ann".into()),
            email: Some("ann@acme.test".into()),
            roles: vec!["ORG_MANAGER".into()],
            token: String::new(),
        };
        assert_eq!(ctx.identifier(), "ann@acme.test");
        assert!(ctx.has_role("ORG_MANAGER"));

        ctx.email = None;
        assert_eq!(ctx.identifier(), "ann");
        ctx.username = None;
        assert_eq!(ctx.identifier(), "sub-1");
    }
}
