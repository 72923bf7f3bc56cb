mod campaigns;
mod tracking;
pub mod types;

use std::sync::Arc;

use axum::middleware;
use axum::Router;
use lure_auth::{require_permission, AuthorizationGuard, Permission};
use utoipa::OpenApi;

pub use campaigns::ORG_MANAGER_RESOURCE;
pub use types::{AppState, PhishResponse};

use crate::services::{CampaignResponse, CampaignStats, CreateCampaignRequest, TemplateResponse};

pub(crate) fn guarded(router: Router<Arc<AppState>>, permission: Permission) -> Router<Arc<AppState>> {
    router.route_layer(middleware::from_fn_with_state(permission, require_permission))
}

pub fn configure_routes(guard: &Arc<AuthorizationGuard>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(campaigns::routes(guard))
        .merge(tracking::routes())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        campaigns::list_campaigns,
        campaigns::create_campaign,
        campaigns::get_campaign,
        campaigns::get_campaign_stats,
        campaigns::cancel_campaign,
        campaigns::list_templates,
        tracking::track_open,
        tracking::track_click,
        tracking::track_phish,
        tracking::track_sent,
        tracking::get_template,
    ),
    components(
        schemas(
            CreateCampaignRequest,
            CampaignResponse,
            CampaignStats,
            TemplateResponse,
            PhishResponse,
            lure_entities::CampaignStatus,
            lure_entities::TemplateKind,
        )
    ),
    info(
        title = "Campaigns API",
        description = "Phishing campaign scheduling and engagement tracking",
        version = "1.0.0"
    ),
    tags(
        (name = "Campaigns", description = "Campaign lifecycle and statistics"),
        (name = "Templates", description = "Email templates and landing pages"),
        (name = "Tracking", description = "Recipient engagement endpoints")
    )
)]
pub struct CampaignsApiDoc;
