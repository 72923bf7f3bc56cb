use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use lure_auth::{AuthContext, AuthorizationGuard};
use lure_core::Problem;
use tracing::info;

use super::guarded;
use super::realms::PLATFORM_ADMIN_RESOURCE;
use super::types::{AppState, UpdateRoleRequest};
use crate::services::{CreateUserRequest, CreatedUser, UserSummary};

pub fn routes(guard: &Arc<AuthorizationGuard>) -> Router<Arc<AppState>> {
    let view = Router::new().route("/org-manager/realms/{realm}/users", get(list_users));

    let manage = Router::new()
        .route("/org-manager/realms/{realm}/users", post(create_user))
        .route("/org-manager/realms/{realm}/users/{user_id}", delete(delete_user))
        .route(
            "/org-manager/realms/{realm}/users/{user_id}/role",
            put(update_user_role),
        );

    // Operators bootstrap additional managers of a tenant.
    let platform_view =
        Router::new().route("/platform-admin/realms/{realm}/users", get(list_users));
    let platform_manage =
        Router::new().route("/platform-admin/realms/{realm}/users", post(create_user));

    Router::new()
        .merge(guarded(view, guard.protect("org_manager", "view")))
        .merge(guarded(manage, guard.protect("org_manager", "manage")))
        .merge(guarded(platform_view, guard.protect(PLATFORM_ADMIN_RESOURCE, "view")))
        .merge(guarded(platform_manage, guard.protect(PLATFORM_ADMIN_RESOURCE, "manage")))
}

/// List users of the realm
#[utoipa::path(
    get,
    path = "/org-manager/realms/{realm}/users",
    params(("realm" = String, Path, description = "Realm name")),
    responses(
        (status = 200, description = "Users", body = Vec<UserSummary>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    Ok(Json(state.tenant_service.list_users(&realm).await?))
}

/// Create a user with a temporary password
///
/// The password is returned once and must be changed at first login.
#[utoipa::path(
    post,
    path = "/org-manager/realms/{realm}/users",
    params(("realm" = String, Path, description = "Realm name")),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreatedUser),
        (status = 400, description = "Invalid role or e-mail outside the realm domain"),
        (status = 409, description = "E-mail already in use")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    auth: AuthContext,
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, Problem> {
    let created = state.tenant_service.create_user(&realm, request).await?;
    info!(
        "{} created user {} with role {} in {}",
        auth.identifier(),
        created.email,
        created.role,
        realm
    );
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    delete,
    path = "/org-manager/realms/{realm}/users/{user_id}",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("user_id" = String, Path, description = "Identity provider user id")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Last organization manager cannot be removed"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    auth: AuthContext,
    State(state): State<Arc<AppState>>,
    Path((realm, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Problem> {
    state.tenant_service.delete_user(&realm, &user_id).await?;
    info!("{} deleted user {} in {}", auth.identifier(), user_id, realm);
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the user's application role
#[utoipa::path(
    put,
    path = "/org-manager/realms/{realm}/users/{user_id}/role",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("user_id" = String, Path, description = "Identity provider user id")
    ),
    request_body = UpdateRoleRequest,
    responses(
        (status = 204, description = "Role updated"),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Last organization manager cannot be demoted")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn update_user_role(
    auth: AuthContext,
    State(state): State<Arc<AppState>>,
    Path((realm, user_id)): Path<(String, String)>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, Problem> {
    state
        .tenant_service
        .update_user_role(&realm, &user_id, &request.role)
        .await?;
    info!(
        "{} set role of {} in {} to {}",
        auth.identifier(),
        user_id,
        realm,
        request.role
    );
    Ok(StatusCode::NO_CONTENT)
}
