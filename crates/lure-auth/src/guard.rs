//! Authorization guard for protected routes
//!
//! Mounted per router with [`AuthorizationGuard::protect`] and
//! [`require_permission`]:
//!
//! ```ignore
//! router.route_layer(middleware::from_fn_with_state(
//!     guard.protect("org_manager", "manage"),
//!     require_permission,
//! ))
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{RawPathParams, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, Validation};
use lure_core::{Problem, ServiceError, ServiceResult};
use lure_identity::IdentityGateway;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::claims::{realm_from_issuer, unverified_issuer, TokenClaims};
use crate::context::AuthContext;
use crate::jwks::JwksCache;

pub const UMA_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:uma-ticket";

/// Path parameter naming the tenant a route operates on.
pub const REALM_PATH_PARAM: &str = "realm";

#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Audience requested in the UMA exchange.
    pub api_client_id: String,
    pub jwks_ttl: Duration,
    /// Realm whose tokens may address any tenant.
    pub operator_realm: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            api_client_id: "api".to_string(),
            jwks_ttl: Duration::from_secs(300),
            operator_realm: Some("platform".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UmaResponse {
    access_token: Option<String>,
}

pub struct AuthorizationGuard {
    gateway: Arc<IdentityGateway>,
    jwks: JwksCache,
    config: GuardConfig,
}

impl AuthorizationGuard {
    pub fn new(gateway: Arc<IdentityGateway>, config: GuardConfig) -> Self {
        let jwks = JwksCache::new(
            gateway.http_client().clone(),
            gateway.base_url(),
            config.jwks_ttl,
        );
        Self {
            gateway,
            jwks,
            config,
        }
    }

    /// Verify a bearer token and build the caller context.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<AuthContext> {
        let issuer = unverified_issuer(token)?;
        let realm = realm_from_issuer(&issuer)
            .ok_or_else(|| ServiceError::unauthenticated("Token issuer names no realm"))?
            .to_string();

        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| ServiceError::unauthenticated(format!("Malformed token header: {}", e)))?;
        if header.alg != Algorithm::RS256 {
            return Err(ServiceError::unauthenticated(format!(
                "Unsupported token algorithm {:?}",
                header.alg
            )));
        }

        let key = self.jwks.decoding_key(&realm, header.kid.as_deref()).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        validation.set_issuer(&[&issuer]);

        let claims = jsonwebtoken::decode::<TokenClaims>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ServiceError::unauthenticated("Token has expired")
                }
                _ => ServiceError::unauthenticated(format!("Invalid token: {}", e)),
            })?
            .claims;

        Ok(AuthContext {
            roles: claims.realm_roles(),
            subject: claims.sub.clone().unwrap_or_default(),
            username: claims.preferred_username,
            email: claims.email,
            realm,
            token: token.to_string(),
        })
    }

    /// Tenant-scoped routes may only be called with a token of that tenant.
    pub fn check_realm(&self, ctx: &AuthContext, path_realm: Option<&str>) -> ServiceResult<()> {
        let Some(path_realm) = path_realm else {
            return Ok(());
        };
        if path_realm == ctx.realm || self.config.operator_realm.as_deref() == Some(ctx.realm.as_str()) {
            return Ok(());
        }
        warn!(
            "Realm isolation: token of realm {} used against realm {}",
            ctx.realm, path_realm
        );
        Err(ServiceError::forbidden(format!(
            "Token is not valid for realm '{}'",
            path_realm
        )))
    }

    /// Ask the identity provider whether the caller holds `resource#scope`.
    pub async fn authorize(&self, ctx: &AuthContext, resource: &str, scope: &str) -> ServiceResult<()> {
        let url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.gateway.base_url(),
            lure_identity::segment(&ctx.realm)
        );
        let permission = format!("{}#{}", resource, scope);

        let response = self
            .gateway
            .http_client()
            .post(&url)
            .bearer_auth(&ctx.token)
            .form(&[
                ("grant_type", UMA_GRANT_TYPE),
                ("permission", permission.as_str()),
                ("audience", self.config.api_client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                ServiceError::upstream_unavailable(format!("Identity provider unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(
                "UMA denied {} for {} in realm {}: {}",
                permission, ctx.subject, ctx.realm, status
            );
            return Err(ServiceError::forbidden(format!("Permission {} denied", permission)));
        }

        match response.json::<UmaResponse>().await {
            Ok(UmaResponse {
                access_token: Some(_),
            }) => Ok(()),
            _ => Err(ServiceError::forbidden(format!(
                "Permission {} not granted",
                permission
            ))),
        }
    }

    /// Middleware state requiring `resource#scope`.
    pub fn protect(self: &Arc<Self>, resource: &'static str, scope: &'static str) -> Permission {
        Permission {
            guard: Arc::clone(self),
            required: Some((resource, scope)),
        }
    }

    /// Middleware state requiring only a valid token of the path realm.
    pub fn authenticated(self: &Arc<Self>) -> Permission {
        Permission {
            guard: Arc::clone(self),
            required: None,
        }
    }
}

/// What a guarded route demands of its caller.
#[derive(Clone)]
pub struct Permission {
    guard: Arc<AuthorizationGuard>,
    required: Option<(&'static str, &'static str)>,
}

impl Permission {
    pub async fn check(&self, headers: &HeaderMap, path_realm: Option<&str>) -> ServiceResult<AuthContext> {
        let token = bearer_token(headers)?;
        let ctx = self.guard.authenticate(token).await?;
        self.guard.check_realm(&ctx, path_realm)?;
        if let Some((resource, scope)) = self.required {
            self.guard.authorize(&ctx, resource, scope).await?;
        }
        Ok(ctx)
    }
}

pub async fn require_permission(
    State(permission): State<Permission>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    mut request: Request,
    next: Next,
) -> Response {
    let path_realm = params.ok().and_then(|params| {
        params
            .iter()
            .find(|(name, _)| *name == REALM_PATH_PARAM)
            .map(|(_, value)| value.to_string())
    });

    match permission.check(request.headers(), path_realm.as_deref()).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => Problem::from(err).into_response(),
    }
}

fn bearer_token(headers: &HeaderMap) -> ServiceResult<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::unauthenticated("Missing bearer token"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(ServiceError::unauthenticated("Missing bearer token")),
    }
}
