use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use lure_auth::AuthorizationGuard;
use lure_core::Problem;

use super::guarded;
use super::types::{AppState, GroupRequest};
use crate::services::{GroupSummary, UserSummary};

pub fn routes(guard: &Arc<AuthorizationGuard>) -> Router<Arc<AppState>> {
    let view = Router::new()
        .route("/org-manager/realms/{realm}/groups", get(list_groups))
        .route("/org-manager/realms/{realm}/groups/{group_id}", get(get_group))
        .route(
            "/org-manager/realms/{realm}/groups/{group_id}/members",
            get(list_members),
        );

    let manage = Router::new()
        .route("/org-manager/realms/{realm}/groups", post(create_group))
        .route(
            "/org-manager/realms/{realm}/groups/{group_id}",
            put(rename_group).delete(delete_group),
        )
        .route(
            "/org-manager/realms/{realm}/groups/{group_id}/members/{user_id}",
            put(add_member).delete(remove_member),
        );

    Router::new()
        .merge(guarded(view, guard.protect("org_manager", "view")))
        .merge(guarded(manage, guard.protect("org_manager", "manage")))
}

#[utoipa::path(
    get,
    path = "/org-manager/realms/{realm}/groups",
    params(("realm" = String, Path, description = "Realm name")),
    responses((status = 200, description = "Groups", body = Vec<GroupSummary>)),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    Ok(Json(state.tenant_service.list_groups(&realm).await?))
}

#[utoipa::path(
    post,
    path = "/org-manager/realms/{realm}/groups",
    params(("realm" = String, Path, description = "Realm name")),
    request_body = GroupRequest,
    responses(
        (status = 201, description = "Group created", body = GroupSummary),
        (status = 409, description = "Group name already used")
    ),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
    Json(request): Json<GroupRequest>,
) -> Result<impl IntoResponse, Problem> {
    let group = state.tenant_service.create_group(&realm, &request.name).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    get,
    path = "/org-manager/realms/{realm}/groups/{group_id}",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("group_id" = String, Path, description = "Group id")
    ),
    responses(
        (status = 200, description = "Group", body = GroupSummary),
        (status = 404, description = "Group not found")
    ),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn get_group(
    State(state): State<Arc<AppState>>,
    Path((realm, group_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Problem> {
    Ok(Json(state.tenant_service.get_group(&realm, &group_id).await?))
}

#[utoipa::path(
    put,
    path = "/org-manager/realms/{realm}/groups/{group_id}",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("group_id" = String, Path, description = "Group id")
    ),
    request_body = GroupRequest,
    responses((status = 200, description = "Group renamed", body = GroupSummary)),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn rename_group(
    State(state): State<Arc<AppState>>,
    Path((realm, group_id)): Path<(String, String)>,
    Json(request): Json<GroupRequest>,
) -> Result<impl IntoResponse, Problem> {
    let group = state
        .tenant_service
        .rename_group(&realm, &group_id, &request.name)
        .await?;
    Ok(Json(group))
}

#[utoipa::path(
    delete,
    path = "/org-manager/realms/{realm}/groups/{group_id}",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("group_id" = String, Path, description = "Group id")
    ),
    responses((status = 204, description = "Group deleted")),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    Path((realm, group_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Problem> {
    state.tenant_service.delete_group(&realm, &group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/org-manager/realms/{realm}/groups/{group_id}/members",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("group_id" = String, Path, description = "Group id")
    ),
    responses((status = 200, description = "Members", body = Vec<UserSummary>)),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Path((realm, group_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Problem> {
    Ok(Json(
        state
            .tenant_service
            .list_group_members(&realm, &group_id)
            .await?,
    ))
}

#[utoipa::path(
    put,
    path = "/org-manager/realms/{realm}/groups/{group_id}/members/{user_id}",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("group_id" = String, Path, description = "Group id"),
        ("user_id" = String, Path, description = "User id")
    ),
    responses((status = 204, description = "Member added")),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Path((realm, group_id, user_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, Problem> {
    state
        .tenant_service
        .add_group_member(&realm, &group_id, &user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/org-manager/realms/{realm}/groups/{group_id}/members/{user_id}",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("group_id" = String, Path, description = "Group id"),
        ("user_id" = String, Path, description = "User id")
    ),
    responses((status = 204, description = "Member removed")),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Path((realm, group_id, user_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, Problem> {
    state
        .tenant_service
        .remove_group_member(&realm, &group_id, &user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
