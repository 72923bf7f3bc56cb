mod common;

use chrono::{Duration, Utc};
use common::{campaign_request, fixture, Fixture, StaticDirectory, PUBLIC_BASE, REALM};
use lure_core::ServiceError;
use lure_entities::{campaigns, email_sendings, SendingStatus};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

/// A running campaign with three planned sendings, the first one published.
async fn running_campaign() -> (Fixture, i32, Vec<String>) {
    let f = fixture(StaticDirectory::default().with_group("g-1", &["u1", "u2", "u3"])).await;
    let created = f
        .campaigns
        .create(
            REALM,
            campaign_request(Utc::now() - Duration::seconds(1), Duration::hours(1), &["g-1"], f.kit_id),
        )
        .await
        .unwrap();
    f.scheduler.run_once().await.unwrap();

    let tokens = email_sendings::Entity::find()
        .filter(email_sendings::Column::CampaignId.eq(created.id))
        .order_by_asc(email_sendings::Column::Id)
        .all(f.db.connection().as_ref())
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.tracking_token)
        .collect();
    (f, created.id, tokens)
}

async fn counters(f: &Fixture, id: i32) -> (i32, i32, i32, i32) {
    let c = campaigns::Entity::find_by_id(id)
        .one(f.db.connection().as_ref())
        .await
        .unwrap()
        .unwrap();
    (c.total_sent, c.total_opened, c.total_clicked, c.total_phished)
}

async fn sending(f: &Fixture, token: &str) -> email_sendings::Model {
    email_sendings::Entity::find()
        .filter(email_sendings::Column::TrackingToken.eq(token))
        .one(f.db.connection().as_ref())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_duplicate_open_counts_once() {
    let (f, id, tokens) = running_campaign().await;

    assert!(f.tracking.record_open(&tokens[0]).await.unwrap());
    assert!(!f.tracking.record_open(&tokens[0]).await.unwrap());

    assert_eq!(counters(&f, id).await, (0, 1, 0, 0));
    assert_eq!(sending(&f, &tokens[0]).await.status, SendingStatus::Opened);
}

#[tokio::test]
async fn test_concurrent_clicks_count_once() {
    let (f, id, tokens) = running_campaign().await;

    let (a, b) = tokio::join!(
        f.tracking.record_click(&tokens[0]),
        f.tracking.record_click(&tokens[0])
    );
    let page = a.unwrap();
    assert_eq!(page, b.unwrap());

    assert_eq!(counters(&f, id).await, (0, 1, 1, 0));
    let row = sending(&f, &tokens[0]).await;
    assert_eq!(row.status, SendingStatus::Clicked);
    assert!(row.opened_at.is_some());
    assert!(row.clicked_at.is_some());
}

#[tokio::test]
async fn test_click_serves_landing_page_with_submission_link() {
    let (f, _, tokens) = running_campaign().await;

    let page = f.tracking.record_click(&tokens[0]).await.unwrap();
    let expected = format!("{}/track/phish?si={}", PUBLIC_BASE, tokens[0]);
    assert!(page.contains(&format!("action=\"{}\"", expected)));
    assert!(page.contains("Acme u1@acme.test"));
    assert!(!page.contains("${{"));
}

#[tokio::test]
async fn test_phish_implies_open_and_click() {
    let (f, id, tokens) = running_campaign().await;

    assert!(f.tracking.record_phish(&tokens[0]).await.unwrap());
    assert!(!f.tracking.record_phish(&tokens[0]).await.unwrap());

    assert_eq!(counters(&f, id).await, (0, 1, 1, 1));
    let row = sending(&f, &tokens[0]).await;
    assert_eq!(row.status, SendingStatus::Phished);
    let (opened, clicked, phished) = (
        row.opened_at.unwrap(),
        row.clicked_at.unwrap(),
        row.phished_at.unwrap(),
    );
    assert!(opened <= clicked && clicked <= phished);
}

#[tokio::test]
async fn test_late_open_does_not_move_status_backwards() {
    let (f, id, tokens) = running_campaign().await;

    f.tracking.record_phish(&tokens[0]).await.unwrap();
    assert!(!f.tracking.record_open(&tokens[0]).await.unwrap());
    f.tracking.record_click(&tokens[0]).await.unwrap();

    assert_eq!(sending(&f, &tokens[0]).await.status, SendingStatus::Phished);
    assert_eq!(counters(&f, id).await, (0, 1, 1, 1));
}

#[tokio::test]
async fn test_delivery_confirmation_counts_once() {
    let (f, id, tokens) = running_campaign().await;

    assert!(f.tracking.record_sent(&tokens[0]).await.unwrap());
    assert!(!f.tracking.record_sent(&tokens[0]).await.unwrap());

    let row = sending(&f, &tokens[0]).await;
    assert_eq!(row.status, SendingStatus::Sent);
    assert!(row.delivered_at.is_some());
    assert_eq!(counters(&f, id).await, (1, 0, 0, 0));

    // An open that raced ahead of the confirmation keeps its status.
    f.tracking.record_open(&tokens[1]).await.unwrap();
    f.tracking.record_sent(&tokens[1]).await.unwrap();
    assert_eq!(sending(&f, &tokens[1]).await.status, SendingStatus::Opened);
    assert_eq!(counters(&f, id).await, (2, 1, 0, 0));
}

#[tokio::test]
async fn test_canceled_sendings_are_not_tracked() {
    let (f, id, tokens) = running_campaign().await;
    f.campaigns.cancel(REALM, id).await.unwrap();

    assert!(!f.tracking.record_open(&tokens[1]).await.unwrap());
    assert!(!f.tracking.record_sent(&tokens[1]).await.unwrap());
    assert_eq!(counters(&f, id).await, (0, 0, 0, 0));
    assert_eq!(sending(&f, &tokens[1]).await.status, SendingStatus::Failed);

    // The message published before cancellation is still tracked.
    assert!(f.tracking.record_open(&tokens[0]).await.unwrap());
}

#[tokio::test]
async fn test_counters_stay_ordered() {
    let (f, id, tokens) = running_campaign().await;

    f.tracking.record_open(&tokens[0]).await.unwrap();
    f.tracking.record_click(&tokens[1]).await.unwrap();
    f.tracking.record_phish(&tokens[2]).await.unwrap();

    let c = campaigns::Entity::find_by_id(id)
        .one(f.db.connection().as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(c.total_opened, 3);
    assert_eq!(c.total_clicked, 2);
    assert_eq!(c.total_phished, 1);
    assert!(c.total_opened <= c.total_recipients.unwrap());
    assert!(c.total_clicked <= c.total_opened);
    assert!(c.total_phished <= c.total_clicked);
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let (f, _, _) = running_campaign().await;

    assert!(matches!(
        f.tracking.record_click("nope").await,
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        f.tracking.record_sent("nope").await,
        Err(ServiceError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_stats_report_rates_over_sent() {
    let (f, id, tokens) = running_campaign().await;
    f.tracking.record_sent(&tokens[0]).await.unwrap();
    f.tracking.record_sent(&tokens[1]).await.unwrap();
    f.tracking.record_click(&tokens[0]).await.unwrap();

    let stats = f.campaigns.stats(REALM, id).await.unwrap();
    assert_eq!(stats.total_recipients, 3);
    assert_eq!(stats.total_sent, 2);
    assert_eq!(stats.open_rate, 0.5);
    assert_eq!(stats.click_rate, 0.5);
    assert_eq!(stats.phish_rate, 0.0);
}
