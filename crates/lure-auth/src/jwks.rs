//! Per-realm JWKS cache

use std::collections::HashMap;
use std::time::Duration;

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::DecodingKey;
use lure_core::{ServiceError, ServiceResult};
use reqwest::StatusCode;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Minimum age before an unknown `kid` may trigger a refetch.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
}

pub struct JwksCache {
    http: reqwest::Client,
    base_url: String,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedJwks>>,
}

impl JwksCache {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Key that verifies tokens signed by `realm` with the given `kid`.
    pub async fn decoding_key(&self, realm: &str, kid: Option<&str>) -> ServiceResult<DecodingKey> {
        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(realm) {
                let age = cached.fetched_at.elapsed();
                if age < self.ttl {
                    if let Some(jwk) = select_key(&cached.keys, kid) {
                        return to_decoding_key(jwk);
                    }
                    if age < MIN_REFRESH_INTERVAL {
                        return Err(no_matching_key(realm));
                    }
                }
            }
        }

        let keys = self.fetch(realm).await?;
        let key = select_key(&keys, kid).map(to_decoding_key);
        self.entries.write().await.insert(
            realm.to_string(),
            CachedJwks {
                keys,
                fetched_at: Instant::now(),
            },
        );

        key.unwrap_or_else(|| Err(no_matching_key(realm)))
    }

    async fn fetch(&self, realm: &str) -> ServiceResult<JwkSet> {
        let url = format!(
            "{}/realms/{}/protocol/openid-connect/certs",
            self.base_url,
            lure_identity::segment(realm)
        );
        debug!("Fetching JWKS for realm {}", realm);

        let response = self.http.get(&url).send().await.map_err(|e| {
            ServiceError::upstream_unavailable(format!("Identity provider unreachable: {}", e))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::unauthenticated(format!(
                "Token issued by unknown realm '{}'",
                realm
            )));
        }
        if !status.is_success() {
            warn!("JWKS fetch for realm {} failed with {}", realm, status);
            return Err(ServiceError::upstream(
                status.as_u16(),
                "Failed to fetch signing keys",
            ));
        }

        response.json::<JwkSet>().await.map_err(|e| {
            ServiceError::upstream(status.as_u16(), format!("Invalid JWKS document: {}", e))
        })
    }
}

fn select_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => keys.find(kid),
        None => keys
            .keys
            .iter()
            .find(|jwk| matches!(jwk.algorithm, AlgorithmParameters::RSA(_))),
    }
}

fn to_decoding_key(jwk: &Jwk) -> ServiceResult<DecodingKey> {
    if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
        return Err(ServiceError::unauthenticated("Signing key is not an RSA key"));
    }
    DecodingKey::from_jwk(jwk)
        .map_err(|e| ServiceError::unauthenticated(format!("Unusable signing key: {}", e)))
}

fn no_matching_key(realm: &str) -> ServiceError {
    ServiceError::unauthenticated(format!("No signing key of realm '{}' matches the token", realm))
}
