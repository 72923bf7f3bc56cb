use jsonwebtoken::{DecodingKey, Validation};
use lure_core::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims Lure reads from access tokens issued by a tenant realm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub realm_access: Option<RealmAccess>,
}

impl TokenClaims {
    pub fn realm_roles(&self) -> Vec<String> {
        self.realm_access
            .as_ref()
            .map(|access| access.roles.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct IssuerOnly {
    iss: Option<String>,
}

/// Realm name from an issuer such as `https://sso.example/realms/acme`.
pub fn realm_from_issuer(issuer: &str) -> Option<&str> {
    issuer
        .rsplit_once("/realms/")
        .map(|(_, realm)| realm.trim_end_matches('/'))
        .filter(|realm| !realm.is_empty() && !realm.contains('/'))
}

/// Read `iss` without checking the signature. Only used to pick the JWKS.
pub fn unverified_issuer(token: &str) -> ServiceResult<String> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<IssuerOnly>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| ServiceError::unauthenticated(format!("Malformed bearer token: {}", e)))?;

    data.claims
        .iss
        .ok_or_else(|| ServiceError::unauthenticated("Bearer token has no issuer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realm_from_issuer() {
        assert_eq!(
            realm_from_issuer("https://sso.lure.test/realms/acme"),
            Some("acme")
        );
        assert_eq!(
            realm_from_issuer("https://sso.lure.test/auth/realms/acme/"),
            Some("acme")
        );
        assert_eq!(realm_from_issuer("https://sso.lure.test/realms/"), None);
        assert_eq!(realm_from_issuer("https://sso.lure.test/acme"), None);
    }

    #[test]
    fn test_unverified_issuer_rejects_garbage() {
        let err = unverified_issuer("not-a-jwt").unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated { .. }));
    }

    #[test]
    fn test_realm_roles_default_to_empty() {
        let claims: TokenClaims =
            serde_json::from_value(serde_json::json!({ "iss": "x", "exp": 1 })).unwrap();
        assert!(claims.realm_roles().is_empty());
    }
}
