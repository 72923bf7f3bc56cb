mod compliance;
mod groups;
mod realms;
pub mod types;
mod users;

use std::sync::Arc;

use axum::middleware;
use axum::Router;
use lure_auth::{require_permission, AuthorizationGuard, Permission};
use utoipa::OpenApi;

pub use realms::PLATFORM_ADMIN_RESOURCE;
pub use types::AppState;

use crate::services::{
    CreateRealmRequest, CreateUserRequest, CreatedRealm, CreatedUser, DeletedRealm, GroupSummary,
    QuizOutcome, QuizSubmission, RealmSummary, UserSummary,
};
use types::{
    AttributesRequest, ComplianceStatusResponse, FeatureRequest, GroupRequest, PolicyResponse,
    RealmLookupResponse, UpdateRoleRequest,
};

/// Wrap every route of `router` in the authorization middleware.
pub(crate) fn guarded(router: Router<Arc<AppState>>, permission: Permission) -> Router<Arc<AppState>> {
    router.route_layer(middleware::from_fn_with_state(permission, require_permission))
}

pub fn configure_routes(guard: &Arc<AuthorizationGuard>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(realms::routes(guard))
        .merge(users::routes(guard))
        .merge(groups::routes(guard))
        .merge(compliance::routes(guard))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        realms::list_realms,
        realms::create_realm,
        realms::get_realm,
        realms::delete_realm,
        realms::update_attributes,
        realms::set_feature,
        realms::list_events,
        realms::list_admin_events,
        realms::lookup_tenant,
        users::list_users,
        users::create_user,
        users::delete_user,
        users::update_user_role,
        groups::list_groups,
        groups::create_group,
        groups::get_group,
        groups::rename_group,
        groups::delete_group,
        groups::list_members,
        groups::add_member,
        groups::remove_member,
        compliance::get_policy,
        compliance::get_quiz,
        compliance::submit_quiz,
        compliance::get_status,
    ),
    components(
        schemas(
            CreateRealmRequest,
            CreatedRealm,
            RealmSummary,
            DeletedRealm,
            AttributesRequest,
            FeatureRequest,
            RealmLookupResponse,
            CreateUserRequest,
            CreatedUser,
            UserSummary,
            UpdateRoleRequest,
            GroupRequest,
            GroupSummary,
            PolicyResponse,
            QuizSubmission,
            QuizOutcome,
            ComplianceStatusResponse,
        )
    ),
    info(
        title = "Tenants API",
        description = "Realm provisioning, user and group administration, and policy compliance",
        version = "1.0.0"
    ),
    tags(
        (name = "Realms", description = "Tenant realm provisioning"),
        (name = "Users", description = "Organization user management"),
        (name = "Groups", description = "Organization groups and membership"),
        (name = "Compliance", description = "Security policy acceptance")
    )
)]
pub struct TenantsApiDoc;
