use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::services::{CampaignService, TrackingService};

/// Shared state for campaign and tracking handlers
pub struct AppState {
    pub campaign_service: Arc<CampaignService>,
    pub tracking_service: Arc<TrackingService>,
    /// Secret the dispatcher presents on template fetches and delivery
    /// confirmations. Those endpoints reject every call when unset.
    pub dispatcher_token: Option<String>,
}

impl AppState {
    pub fn new(campaign_service: Arc<CampaignService>, tracking_service: Arc<TrackingService>) -> Self {
        Self {
            campaign_service,
            tracking_service,
            dispatcher_token: None,
        }
    }

    pub fn with_dispatcher_token(mut self, token: Option<String>) -> Self {
        self.dispatcher_token = token;
        self
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TrackingQuery {
    /// Tracking token of the sending.
    pub si: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TemplateQuery {
    /// `email` or `landing_page`.
    pub kind: Option<lure_entities::TemplateKind>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PhishResponse {
    /// False when this submission was already recorded.
    pub recorded: bool,
}
