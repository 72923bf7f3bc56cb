//! Organization manager campaign administration

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use lure_auth::{AuthContext, AuthorizationGuard};
use lure_core::Problem;
use tracing::info;

use super::guarded;
use super::types::{AppState, TemplateQuery};
use crate::services::{CampaignResponse, CampaignStats, CreateCampaignRequest, TemplateResponse};

pub const ORG_MANAGER_RESOURCE: &str = "org_manager";

pub fn routes(guard: &Arc<AuthorizationGuard>) -> Router<Arc<AppState>> {
    let view = Router::new()
        .route("/org-manager/realms/{realm}/campaigns", get(list_campaigns))
        .route("/org-manager/realms/{realm}/campaigns/{id}", get(get_campaign))
        .route(
            "/org-manager/realms/{realm}/campaigns/{id}/stats",
            get(get_campaign_stats),
        )
        .route("/org-manager/realms/{realm}/templates", get(list_templates));

    let manage = Router::new()
        .route("/org-manager/realms/{realm}/campaigns", post(create_campaign))
        .route(
            "/org-manager/realms/{realm}/campaigns/{id}/cancel",
            post(cancel_campaign),
        );

    Router::new()
        .merge(guarded(view, guard.protect(ORG_MANAGER_RESOURCE, "view")))
        .merge(guarded(manage, guard.protect(ORG_MANAGER_RESOURCE, "manage")))
}

/// List campaigns of the realm, most recent first
#[utoipa::path(
    get,
    path = "/org-manager/realms/{realm}/campaigns",
    params(("realm" = String, Path, description = "Realm name")),
    responses(
        (status = 200, description = "Campaigns", body = Vec<CampaignResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Campaigns",
    security(("bearer_auth" = []))
)]
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let campaigns = state.campaign_service.list(&realm).await?;
    Ok(Json(
        campaigns
            .into_iter()
            .map(CampaignResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Schedule a campaign against one or more groups
#[utoipa::path(
    post,
    path = "/org-manager/realms/{realm}/campaigns",
    params(("realm" = String, Path, description = "Realm name")),
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Campaign scheduled", body = CampaignResponse),
        (status = 400, description = "Invalid campaign"),
        (status = 404, description = "Realm not found")
    ),
    tag = "Campaigns",
    security(("bearer_auth" = []))
)]
pub async fn create_campaign(
    auth: AuthContext,
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, Problem> {
    let campaign = state.campaign_service.create(&realm, request).await?;
    info!("{} scheduled campaign {} in {}", auth.identifier(), campaign.id, realm);
    Ok((StatusCode::CREATED, Json(CampaignResponse::from(campaign))))
}

#[utoipa::path(
    get,
    path = "/org-manager/realms/{realm}/campaigns/{id}",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("id" = i32, Path, description = "Campaign id")
    ),
    responses(
        (status = 200, description = "Campaign", body = CampaignResponse),
        (status = 404, description = "Campaign not found")
    ),
    tag = "Campaigns",
    security(("bearer_auth" = []))
)]
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path((realm, id)): Path<(String, i32)>,
) -> Result<impl IntoResponse, Problem> {
    let campaign = state.campaign_service.get(&realm, id).await?;
    Ok(Json(CampaignResponse::from(campaign)))
}

/// Engagement counters and rates
#[utoipa::path(
    get,
    path = "/org-manager/realms/{realm}/campaigns/{id}/stats",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("id" = i32, Path, description = "Campaign id")
    ),
    responses(
        (status = 200, description = "Statistics", body = CampaignStats),
        (status = 404, description = "Campaign not found")
    ),
    tag = "Campaigns",
    security(("bearer_auth" = []))
)]
pub async fn get_campaign_stats(
    State(state): State<Arc<AppState>>,
    Path((realm, id)): Path<(String, i32)>,
) -> Result<impl IntoResponse, Problem> {
    Ok(Json(state.campaign_service.stats(&realm, id).await?))
}

/// Cancel a scheduled or running campaign
///
/// Pending emails are marked failed. Emails already handed to the queue may
/// still be delivered.
#[utoipa::path(
    post,
    path = "/org-manager/realms/{realm}/campaigns/{id}/cancel",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("id" = i32, Path, description = "Campaign id")
    ),
    responses(
        (status = 200, description = "Campaign canceled", body = CampaignResponse),
        (status = 400, description = "Campaign already finished"),
        (status = 404, description = "Campaign not found")
    ),
    tag = "Campaigns",
    security(("bearer_auth" = []))
)]
pub async fn cancel_campaign(
    auth: AuthContext,
    State(state): State<Arc<AppState>>,
    Path((realm, id)): Path<(String, i32)>,
) -> Result<impl IntoResponse, Problem> {
    let campaign = state.campaign_service.cancel(&realm, id).await?;
    info!("{} canceled campaign {} in {}", auth.identifier(), id, realm);
    Ok(Json(CampaignResponse::from(campaign)))
}

/// Templates available to the realm, shared ones included
#[utoipa::path(
    get,
    path = "/org-manager/realms/{realm}/templates",
    params(("realm" = String, Path, description = "Realm name"), TemplateQuery),
    responses(
        (status = 200, description = "Templates", body = Vec<TemplateResponse>)
    ),
    tag = "Templates",
    security(("bearer_auth" = []))
)]
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
    Query(query): Query<TemplateQuery>,
) -> Result<impl IntoResponse, Problem> {
    let templates = state
        .campaign_service
        .list_templates(&realm, query.kind)
        .await?;
    Ok(Json(
        templates
            .into_iter()
            .map(TemplateResponse::from)
            .collect::<Vec<_>>(),
    ))
}
