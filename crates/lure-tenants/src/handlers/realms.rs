//! Platform administration of tenant realms

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use lure_auth::{AuthContext, AuthorizationGuard};
use lure_core::{Problem, ServiceError};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use super::guarded;
use super::types::{AppState, AttributesRequest, FeatureRequest, RealmLookupResponse};
use crate::services::{CreateRealmRequest, CreatedRealm, DeletedRealm, EventQuery, RealmSummary};

pub const PLATFORM_ADMIN_RESOURCE: &str = "platform_admin";

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListRealmsQuery {
    /// Hide `master` and `platform`. Defaults to true.
    pub exclude_system: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LookupQuery {
    #[param(example = "acme.test")]
    pub domain: String,
}

pub fn routes(guard: &Arc<AuthorizationGuard>) -> Router<Arc<AppState>> {
    let view = Router::new()
        .route("/platform-admin/realms", get(list_realms))
        .route("/platform-admin/realms/{realm}", get(get_realm))
        .route("/platform-admin/realms/{realm}/events", get(list_events))
        .route("/platform-admin/realms/{realm}/admin-events", get(list_admin_events));

    let manage = Router::new()
        .route("/platform-admin/realms", post(create_realm))
        .route("/platform-admin/realms/{realm}", delete(delete_realm))
        .route(
            "/platform-admin/realms/{realm}/attributes",
            patch(update_attributes),
        )
        .route(
            "/platform-admin/realms/{realm}/features/{feature}",
            put(set_feature),
        );

    // Organization managers maintain their own branding attributes.
    let org_manage = Router::new().route(
        "/org-manager/realms/{realm}/attributes",
        patch(update_attributes),
    );

    Router::new()
        .merge(guarded(view, guard.protect(PLATFORM_ADMIN_RESOURCE, "view")))
        .merge(guarded(manage, guard.protect(PLATFORM_ADMIN_RESOURCE, "manage")))
        .merge(guarded(org_manage, guard.protect("org_manager", "manage")))
        .route("/tenants/lookup", get(lookup_tenant))
}

/// List realms known to the identity provider
#[utoipa::path(
    get,
    path = "/platform-admin/realms",
    params(ListRealmsQuery),
    responses(
        (status = 200, description = "Realms", body = Vec<RealmSummary>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "Identity provider unavailable")
    ),
    tag = "Realms",
    security(("bearer_auth" = []))
)]
pub async fn list_realms(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRealmsQuery>,
) -> Result<impl IntoResponse, Problem> {
    let realms = state
        .tenant_service
        .list_realms(query.exclude_system.unwrap_or(true))
        .await?;
    Ok(Json(realms))
}

/// Create a tenant realm with its bootstrap organization manager
#[utoipa::path(
    post,
    path = "/platform-admin/realms",
    request_body = CreateRealmRequest,
    responses(
        (status = 201, description = "Realm created", body = CreatedRealm),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Domain or realm already exists")
    ),
    tag = "Realms",
    security(("bearer_auth" = []))
)]
pub async fn create_realm(
    auth: AuthContext,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRealmRequest>,
) -> Result<impl IntoResponse, Problem> {
    let created = state.tenant_service.create_realm(request).await?;
    info!("{} created realm {}", auth.identifier(), created.name);
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/platform-admin/realms/{realm}",
    params(("realm" = String, Path, description = "Realm name")),
    responses(
        (status = 200, description = "Realm", body = RealmSummary),
        (status = 404, description = "Realm not found")
    ),
    tag = "Realms",
    security(("bearer_auth" = []))
)]
pub async fn get_realm(
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    Ok(Json(state.tenant_service.get_realm(&realm).await?))
}

/// Delete a tenant realm and its mirrored users and groups
#[utoipa::path(
    delete,
    path = "/platform-admin/realms/{realm}",
    params(("realm" = String, Path, description = "Realm name")),
    responses(
        (status = 200, description = "Realm deleted", body = DeletedRealm),
        (status = 403, description = "System realms cannot be deleted"),
        (status = 404, description = "Realm not found")
    ),
    tag = "Realms",
    security(("bearer_auth" = []))
)]
pub async fn delete_realm(
    auth: AuthContext,
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let deleted = state.tenant_service.delete_realm(&realm).await?;
    info!("{} deleted realm {}", auth.identifier(), realm);
    Ok(Json(deleted))
}

/// Merge attributes into the realm, leaving other keys untouched
#[utoipa::path(
    patch,
    path = "/platform-admin/realms/{realm}/attributes",
    params(("realm" = String, Path, description = "Realm name")),
    request_body = AttributesRequest,
    responses(
        (status = 200, description = "Resulting attributes", body = std::collections::BTreeMap<String, String>),
        (status = 400, description = "Invalid attributes")
    ),
    tag = "Realms",
    security(("bearer_auth" = []))
)]
pub async fn update_attributes(
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
    Json(request): Json<AttributesRequest>,
) -> Result<impl IntoResponse, Problem> {
    let attributes = state
        .tenant_service
        .merge_realm_attributes(&realm, request.attributes)
        .await?;
    Ok(Json(attributes))
}

/// Enable or disable a feature flag claim for every token of the realm
#[utoipa::path(
    put,
    path = "/platform-admin/realms/{realm}/features/{feature}",
    params(
        ("realm" = String, Path, description = "Realm name"),
        ("feature" = String, Path, description = "Feature name")
    ),
    request_body = FeatureRequest,
    responses(
        (status = 200, description = "All feature flags of the realm", body = std::collections::BTreeMap<String, bool>),
        (status = 400, description = "Invalid feature name")
    ),
    tag = "Realms",
    security(("bearer_auth" = []))
)]
pub async fn set_feature(
    State(state): State<Arc<AppState>>,
    Path((realm, feature)): Path<(String, String)>,
    Json(request): Json<FeatureRequest>,
) -> Result<impl IntoResponse, Problem> {
    let features = state
        .tenant_service
        .set_realm_feature(&realm, &feature, request.enabled)
        .await?;
    Ok(Json(features))
}

#[utoipa::path(
    get,
    path = "/platform-admin/realms/{realm}/events",
    params(("realm" = String, Path, description = "Realm name"), EventQuery),
    responses((status = 200, description = "Login events, newest first", body = Vec<serde_json::Value>)),
    tag = "Realms",
    security(("bearer_auth" = []))
)]
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
    Query(query): Query<EventQuery>,
) -> Result<impl IntoResponse, Problem> {
    Ok(Json(state.tenant_service.list_events(&realm, &query).await?))
}

#[utoipa::path(
    get,
    path = "/platform-admin/realms/{realm}/admin-events",
    params(("realm" = String, Path, description = "Realm name"), EventQuery),
    responses((status = 200, description = "Admin events, newest first", body = Vec<serde_json::Value>)),
    tag = "Realms",
    security(("bearer_auth" = []))
)]
pub async fn list_admin_events(
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
    Query(query): Query<EventQuery>,
) -> Result<impl IntoResponse, Problem> {
    Ok(Json(
        state.tenant_service.list_admin_events(&realm, &query).await?,
    ))
}

/// Resolve the realm that owns an e-mail domain, for login routing
#[utoipa::path(
    get,
    path = "/tenants/lookup",
    params(LookupQuery),
    responses(
        (status = 200, description = "Owning realm", body = RealmLookupResponse),
        (status = 404, description = "No realm owns this domain")
    ),
    tag = "Realms"
)]
pub async fn lookup_tenant(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LookupQuery>,
) -> Result<impl IntoResponse, Problem> {
    let domain = query.domain.trim().to_lowercase();
    let realm = state
        .tenant_service
        .find_realm_by_domain(&domain)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Realm for domain {}", domain)))?;

    Ok(Json(RealmLookupResponse {
        realm: realm.name,
        domain: realm.domain.unwrap_or(domain),
        features: realm.features,
    }))
}
