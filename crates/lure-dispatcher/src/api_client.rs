//! Calls back into the Lure API: template fetches and delivery confirmation

use std::time::Duration;

use lure_core::{TrackingUrls, DISPATCHER_TOKEN_HEADER};
use serde::Deserialize;
use tracing::debug;

use crate::error::DispatchError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateBody {
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    urls: TrackingUrls,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            urls: TrackingUrls::new(base_url.clone()),
            base_url,
            token,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(DISPATCHER_TOKEN_HEADER, token),
            None => request,
        }
    }

    pub fn tracking_urls(&self) -> &TrackingUrls {
        &self.urls
    }

    pub async fn fetch_template(&self, template_id: &str) -> Result<TemplateBody, DispatchError> {
        if template_id.is_empty() || !template_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(DispatchError::InvalidMessage(format!(
                "template id {:?} is not numeric",
                template_id
            )));
        }
        let url = format!("{}/templates/{}", self.base_url, template_id);
        let response = self.authorize(self.http.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(DispatchError::ApiStatus {
                status: response.status().as_u16(),
                url,
            });
        }
        Ok(response.json().await?)
    }

    pub async fn confirm_sent(&self, tracking_id: &str) -> Result<(), DispatchError> {
        let url = self.urls.sent(tracking_id);
        let response = self.authorize(self.http.post(&url)).send().await?;
        if !response.status().is_success() {
            return Err(DispatchError::ApiStatus {
                status: response.status().as_u16(),
                url,
            });
        }
        debug!("Delivery of {} confirmed", tracking_id);
        Ok(())
    }
}
