//! Single choke point for identity-provider I/O
//!
//! All admin REST calls go through [`IdentityGateway`], which owns the
//! service-account token cache and the HTTP status to [`ServiceError`]
//! mapping. No retries happen here.

use std::time::Duration;

use lure_core::{ServiceError, ServiceResult};
use reqwest::header::LOCATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Tokens are refreshed once this much lifetime or less remains.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Keycloak root, e.g. `https://sso.lure.test`.
    pub base_url: String,
    pub admin_client_id: Option<String>,
    pub admin_client_secret: Option<String>,
    pub request_timeout: Duration,
}

impl IdentityConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_client_id: None,
            admin_client_secret: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_admin_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.admin_client_id = Some(client_id.into());
        self.admin_client_secret = Some(client_secret.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    60
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at.saturating_duration_since(Instant::now()) > TOKEN_REFRESH_MARGIN
    }
}

/// Response of an admin request that completed with a 2xx status.
#[derive(Debug, Clone)]
pub struct IdpResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Option<Value>,
}

impl IdpResponse {
    /// Id of a created resource, taken from the last `Location` path segment.
    pub fn created_id(&self) -> Option<String> {
        self.location
            .as_deref()
            .and_then(|location| location.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    pub fn json<T: DeserializeOwned>(self) -> ServiceResult<T> {
        let body = self.body.unwrap_or(Value::Null);
        serde_json::from_value(body).map_err(|e| {
            ServiceError::upstream(
                self.status.as_u16(),
                format!("Unexpected identity provider response: {}", e),
            )
        })
    }
}

pub struct IdentityGateway {
    http: reqwest::Client,
    config: IdentityConfig,
    token: Mutex<Option<CachedToken>>,
}

impl IdentityGateway {
    pub fn new(config: IdentityConfig) -> ServiceResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::misconfigured(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Service-account token for the admin API, cached until near expiry.
    pub async fn admin_token(&self) -> ServiceResult<String> {
        let (client_id, client_secret) = match (
            self.config.admin_client_id.as_deref(),
            self.config.admin_client_secret.as_deref(),
        ) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id, secret),
            _ => {
                return Err(ServiceError::misconfigured(
                    "Identity provider admin client credentials are not configured",
                ))
            }
        };

        // Held across the fetch so concurrent callers share one refresh.
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        debug!("Fetching identity provider admin token");
        let url = format!(
            "{}/realms/master/protocol/openid-connect/token",
            self.config.base_url
        );
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(status, &text));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ServiceError::upstream(status.as_u16(), format!("Invalid token response: {}", e))
        })?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    /// Authenticated JSON request against `{base_url}{path}`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<&Value>,
    ) -> ServiceResult<IdpResponse> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("Identity provider request: {} {}", method, path);

        let mut builder = self.http.request(method.clone(), &url).bearer_auth(token);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(unavailable)?;
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.map_err(unavailable)?;

        if !status.is_success() {
            warn!(
                "Identity provider rejected {} {} with {}",
                method, path, status
            );
            return Err(map_status(status, &text));
        }

        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).map_err(|e| {
                ServiceError::upstream(status.as_u16(), format!("Invalid JSON body: {}", e))
            })?)
        };

        Ok(IdpResponse {
            status,
            location,
            body,
        })
    }

    /// [`request`](Self::request) with the cached admin token.
    pub async fn admin_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ServiceResult<IdpResponse> {
        let token = self.admin_token().await?;
        self.request(method, path, &token, body).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ServiceResult<T> {
        self.admin_request(Method::GET, path, None).await?.json()
    }

    pub async fn post(&self, path: &str, body: &Value) -> ServiceResult<IdpResponse> {
        self.admin_request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> ServiceResult<IdpResponse> {
        self.admin_request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str, body: Option<&Value>) -> ServiceResult<IdpResponse> {
        self.admin_request(Method::DELETE, path, body).await
    }
}

fn unavailable(err: reqwest::Error) -> ServiceError {
    ServiceError::upstream_unavailable(format!("Identity provider unreachable: {}", err))
}

/// Translate a non-2xx identity provider status into the service taxonomy.
pub fn map_status(status: StatusCode, body: &str) -> ServiceError {
    let message = error_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("identity provider error")
            .to_string()
    });

    match status {
        StatusCode::UNAUTHORIZED => ServiceError::unauthenticated(message),
        StatusCode::FORBIDDEN => ServiceError::forbidden(message),
        StatusCode::NOT_FOUND => ServiceError::not_found(message),
        StatusCode::CONFLICT => ServiceError::conflict(message),
        _ => ServiceError::upstream(status.as_u16(), message),
    }
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["errorMessage", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_status() {
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, ""),
            ServiceError::Unauthenticated { .. }
        ));
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, ""),
            ServiceError::Forbidden { .. }
        ));
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, ""),
            ServiceError::NotFound { .. }
        ));
        assert!(matches!(
            map_status(StatusCode::CONFLICT, r#"{"errorMessage":"User exists with same email"}"#),
            ServiceError::Conflict { message } if message == "User exists with same email"
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, ""),
            ServiceError::Upstream { status: 502, .. }
        ));
    }

    #[test]
    fn test_created_id_from_location() {
        let response = IdpResponse {
            status: StatusCode::CREATED,
            location: Some(
                "https://sso/admin/realms/acme/users/5b1c7f2e-1111-2222-3333-444455556666".into(),
            ),
            body: None,
        };
        assert_eq!(
            response.created_id().as_deref(),
            Some("5b1c7f2e-1111-2222-3333-444455556666")
        );
    }
}
