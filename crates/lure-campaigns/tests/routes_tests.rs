mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use common::{campaign_request, fixture, Fixture, StaticDirectory, PUBLIC_BASE, REALM};
use http_body_util::BodyExt;
use lure_auth::{AuthorizationGuard, GuardConfig};
use lure_campaigns::handlers::{configure_routes, AppState};
use lure_campaigns::{CampaignService, TrackingConfig, TrackingService, TRACKING_PIXEL};
use lure_core::DISPATCHER_TOKEN_HEADER;
use lure_entities::email_sendings;
use lure_identity::{IdentityConfig, IdentityGateway};
use sea_orm::EntityTrait;
use tower::ServiceExt;

const DISPATCHER_TOKEN: &str = "worker-secret";

fn app(f: &Fixture) -> Router {
    // Public routes never reach the identity provider.
    let gateway = Arc::new(IdentityGateway::new(IdentityConfig::new("http://127.0.0.1:9")).unwrap());
    let guard = Arc::new(AuthorizationGuard::new(gateway, GuardConfig::default()));
    let state = Arc::new(
        AppState::new(
            Arc::new(CampaignService::new(f.db.connection(), 1)),
            Arc::new(TrackingService::new(
                f.db.connection(),
                TrackingConfig {
                    public_base_url: PUBLIC_BASE.to_string(),
                },
            )),
        )
        .with_dispatcher_token(Some(DISPATCHER_TOKEN.to_string())),
    );
    configure_routes(&guard).with_state(state)
}

async fn first_token(f: &Fixture) -> String {
    f.campaigns
        .create(
            REALM,
            campaign_request(Utc::now() - Duration::seconds(1), Duration::hours(1), &["g-1"], f.kit_id),
        )
        .await
        .unwrap();
    f.scheduler.run_once().await.unwrap();
    email_sendings::Entity::find()
        .one(f.db.connection().as_ref())
        .await
        .unwrap()
        .unwrap()
        .tracking_token
}

#[tokio::test]
async fn test_open_always_returns_pixel() {
    let f = fixture(StaticDirectory::default()).await;

    let response = app(&f)
        .oneshot(
            Request::builder()
                .uri("/track/open?si=unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), TRACKING_PIXEL.as_slice());
}

#[tokio::test]
async fn test_phish_ignores_submitted_form() {
    let f = fixture(StaticDirectory::default().with_group("g-1", &["u1"])).await;
    let token = first_token(&f).await;

    let response = app(&f)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/track/phish?si={}", token))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=bob&password=hunter2"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let recorded: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(recorded, serde_json::json!({ "recorded": true }));

    let row = email_sendings::Entity::find()
        .one(f.db.connection().as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(row.phished_at.is_some());
}

#[tokio::test]
async fn test_sent_callback_and_template_fetch() {
    let f = fixture(StaticDirectory::default().with_group("g-1", &["u1"])).await;
    let token = first_token(&f).await;
    let router = app(&f);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/track/sent?si={}", token))
                .header(DISPATCHER_TOKEN_HEADER, DISPATCHER_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let job = &f.broker.peek_jobs()[0];
    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/templates/{}", job.template_id))
                .header(DISPATCHER_TOKEN_HEADER, DISPATCHER_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let template: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(template["kind"], "email");
    assert!(template["body"].as_str().unwrap().contains("${{pixel}}"));
}

#[tokio::test]
async fn test_click_with_unknown_token_is_problem() {
    let f = fixture(StaticDirectory::default()).await;

    let response = app(&f)
        .oneshot(
            Request::builder()
                .uri("/track/click?si=unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_campaign_routes_require_bearer_token() {
    let f = fixture(StaticDirectory::default()).await;

    let response = app(&f)
        .oneshot(
            Request::builder()
                .uri(format!("/org-manager/realms/{}/campaigns", REALM))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dispatcher_endpoints_require_shared_token() {
    let f = fixture(StaticDirectory::default().with_group("g-1", &["u1"])).await;
    let token = first_token(&f).await;
    let template_id = f.broker.peek_jobs()[0].template_id.clone();
    let router = app(&f);

    for presented in [None, Some("guess")] {
        let mut request = Request::builder().uri(format!("/templates/{}", template_id));
        if let Some(value) = presented {
            request = request.header(DISPATCHER_TOKEN_HEADER, value);
        }
        let response = router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/track/sent?si={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let row = email_sendings::Entity::find()
        .one(f.db.connection().as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(row.delivered_at.is_none());
}
