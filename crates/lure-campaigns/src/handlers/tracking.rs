//! Public endpoints hit by recipients' mail clients and browsers, and the
//! endpoints the dispatcher calls with its shared token.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use lure_core::{dispatcher_token_matches, Problem, ServiceError, DISPATCHER_TOKEN_HEADER};
use tracing::debug;

use super::types::{AppState, PhishResponse, TrackingQuery};
use crate::services::{TemplateResponse, TRACKING_PIXEL};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/track/open", get(track_open))
        .route("/track/click", get(track_click))
        .route("/track/phish", post(track_phish))
        .route("/track/sent", post(track_sent))
        .route("/templates/{id}", get(get_template))
}

fn require_dispatcher(state: &AppState, headers: &HeaderMap) -> Result<(), Problem> {
    let presented = headers
        .get(DISPATCHER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    match (state.dispatcher_token.as_deref(), presented) {
        (Some(expected), Some(presented)) if dispatcher_token_matches(expected, presented) => Ok(()),
        _ => Err(ServiceError::unauthenticated("Dispatcher token required").into()),
    }
}

/// Tracking pixel. Always answers with the image, even for unknown tokens.
#[utoipa::path(
    get,
    path = "/track/open",
    params(TrackingQuery),
    responses((status = 200, description = "1x1 transparent GIF", content_type = "image/gif")),
    tag = "Tracking"
)]
pub async fn track_open(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrackingQuery>,
) -> impl IntoResponse {
    if let Err(e) = state.tracking_service.record_open(&query.si).await {
        debug!("Open not recorded: {}", e);
    }
    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
        ],
        TRACKING_PIXEL.to_vec(),
    )
}

/// Link target of phishing emails; serves the kit's landing page
#[utoipa::path(
    get,
    path = "/track/click",
    params(TrackingQuery),
    responses(
        (status = 200, description = "Landing page", content_type = "text/html"),
        (status = 404, description = "Unknown token")
    ),
    tag = "Tracking"
)]
pub async fn track_click(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrackingQuery>,
) -> Result<impl IntoResponse, Problem> {
    let page = state.tracking_service.record_click(&query.si).await?;
    Ok(Html(page))
}

/// Landing page form target. The submitted body is discarded unread.
#[utoipa::path(
    post,
    path = "/track/phish",
    params(TrackingQuery),
    responses(
        (status = 200, description = "Submission recorded", body = PhishResponse),
        (status = 404, description = "Unknown token")
    ),
    tag = "Tracking"
)]
pub async fn track_phish(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrackingQuery>,
) -> Result<impl IntoResponse, Problem> {
    let recorded = state.tracking_service.record_phish(&query.si).await?;
    Ok(Json(PhishResponse { recorded }))
}

/// Delivery confirmation from the dispatcher
#[utoipa::path(
    post,
    path = "/track/sent",
    params(TrackingQuery),
    responses(
        (status = 204, description = "Recorded"),
        (status = 401, description = "Missing or wrong dispatcher token"),
        (status = 404, description = "Unknown token")
    ),
    tag = "Tracking"
)]
pub async fn track_sent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TrackingQuery>,
) -> Result<impl IntoResponse, Problem> {
    require_dispatcher(&state, &headers)?;
    state.tracking_service.record_sent(&query.si).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Raw template body, fetched by the dispatcher before rendering
#[utoipa::path(
    get,
    path = "/templates/{id}",
    params(("id" = i32, Path, description = "Template id")),
    responses(
        (status = 200, description = "Template", body = TemplateResponse),
        (status = 401, description = "Missing or wrong dispatcher token"),
        (status = 404, description = "Template not found")
    ),
    tag = "Templates"
)]
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, Problem> {
    require_dispatcher(&state, &headers)?;
    let template = state.campaign_service.get_template(id).await?;
    Ok(Json(TemplateResponse::from(template)))
}
