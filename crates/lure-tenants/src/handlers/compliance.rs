//! Self-service compliance endpoints for any authenticated member of a realm

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use lure_auth::{AuthContext, AuthorizationGuard};
use lure_core::Problem;

use super::guarded;
use super::types::{AppState, ComplianceStatusResponse, PolicyResponse};
use crate::services::{QuizOutcome, QuizSubmission};

pub fn routes(guard: &Arc<AuthorizationGuard>) -> Router<Arc<AppState>> {
    let routes = Router::new()
        .route("/realms/{realm}/compliance/policy", get(get_policy))
        .route(
            "/realms/{realm}/compliance/quiz",
            get(get_quiz).post(submit_quiz),
        )
        .route("/realms/{realm}/compliance/status", get(get_status));

    guarded(routes, guard.authenticated())
}

/// Active security policy of the realm
#[utoipa::path(
    get,
    path = "/realms/{realm}/compliance/policy",
    params(("realm" = String, Path, description = "Realm name")),
    responses(
        (status = 200, description = "Active policy", body = PolicyResponse),
        (status = 404, description = "No policy configured")
    ),
    tag = "Compliance",
    security(("bearer_auth" = []))
)]
pub async fn get_policy(
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let policy = state.compliance_service.active_policy(&realm).await?;
    Ok(Json(PolicyResponse::from(policy)))
}

/// Quiz for the active policy, without the answers
#[utoipa::path(
    get,
    path = "/realms/{realm}/compliance/quiz",
    params(("realm" = String, Path, description = "Realm name")),
    responses((status = 200, description = "Quiz questions", body = serde_json::Value)),
    tag = "Compliance",
    security(("bearer_auth" = []))
)]
pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    Ok(Json(state.compliance_service.quiz(&realm).await?))
}

/// Grade a quiz submission; passing records acceptance of the policy
#[utoipa::path(
    post,
    path = "/realms/{realm}/compliance/quiz",
    params(("realm" = String, Path, description = "Realm name")),
    request_body = QuizSubmission,
    responses(
        (status = 200, description = "Graded submission", body = QuizOutcome),
        (status = 400, description = "Submitted again within the cooldown")
    ),
    tag = "Compliance",
    security(("bearer_auth" = []))
)]
pub async fn submit_quiz(
    auth: AuthContext,
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
    Json(submission): Json<QuizSubmission>,
) -> Result<impl IntoResponse, Problem> {
    let outcome = state
        .compliance_service
        .submit_quiz(&realm, auth.identifier(), &submission.answers)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/realms/{realm}/compliance/status",
    params(("realm" = String, Path, description = "Realm name")),
    responses((status = 200, description = "Acceptance of the active policy", body = ComplianceStatusResponse)),
    tag = "Compliance",
    security(("bearer_auth" = []))
)]
pub async fn get_status(
    auth: AuthContext,
    State(state): State<Arc<AppState>>,
    Path(realm): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let policy = state.compliance_service.active_policy(&realm).await?;
    let acceptance = state
        .compliance_service
        .status(&realm, auth.identifier())
        .await?;

    Ok(Json(ComplianceStatusResponse {
        policy_version: policy.version,
        accepted: acceptance.is_some(),
        score: acceptance.as_ref().map(|a| a.score),
        accepted_at: acceptance.map(|a| a.accepted_at),
    }))
}
