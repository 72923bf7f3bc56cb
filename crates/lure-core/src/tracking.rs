//! Public tracking URL surface embedded in phishing emails and landing pages

use subtle::ConstantTimeEq;

/// Header carrying the shared secret on dispatcher-only endpoints
/// (template fetch and delivery confirmation).
pub const DISPATCHER_TOKEN_HEADER: &str = "x-lure-dispatcher-token";

/// Compares a presented dispatcher token in constant time.
pub fn dispatcher_token_matches(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// Builds absolute tracking URLs from the deployment's public base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingUrls {
    base_url: String,
}

impl TrackingUrls {
    /// `base_url` is the externally reachable API root, e.g. `https://lure.acme.test/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn open(&self, token: &str) -> String {
        self.build("open", token)
    }

    pub fn click(&self, token: &str) -> String {
        self.build("click", token)
    }

    pub fn phish(&self, token: &str) -> String {
        self.build("phish", token)
    }

    pub fn sent(&self, token: &str) -> String {
        self.build("sent", token)
    }

    /// Invisible 1x1 image pointing at the open endpoint.
    pub fn pixel_tag(&self, token: &str) -> String {
        format!(
            r#"<img src="{}" width="1" height="1" alt="" style="display:none" />"#,
            self.open(token)
        )
    }

    fn build(&self, event: &str, token: &str) -> String {
        format!(
            "{}/track/{}?si={}",
            self.base_url,
            event,
            urlencoding::encode(token)
        )
    }
}
