mod common;

use std::collections::HashSet;

use chrono::{Duration, Utc};
use common::{campaign_request, fixture, fixture_with, StaticDirectory, REALM};
use lure_campaigns::SchedulerConfig;
use lure_core::ServiceError;
use lure_entities::{campaigns, email_sendings, CampaignStatus, SendingStatus};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

async fn sendings(f: &common::Fixture, campaign_id: i32) -> Vec<email_sendings::Model> {
    email_sendings::Entity::find()
        .filter(email_sendings::Column::CampaignId.eq(campaign_id))
        .order_by_asc(email_sendings::Column::Id)
        .all(f.db.connection().as_ref())
        .await
        .unwrap()
}

async fn campaign(f: &common::Fixture, id: i32) -> campaigns::Model {
    campaigns::Entity::find_by_id(id)
        .one(f.db.connection().as_ref())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_recipients_are_spread_over_campaign_window() {
    let directory = StaticDirectory::default()
        .with_group("g-1", &["u1", "u2", "u3"])
        .with_group("g-2", &["u3", "u4", "u5"]);
    let f = fixture(directory).await;
    let begin = Utc::now() - Duration::seconds(5);
    let created = f
        .campaigns
        .create(REALM, campaign_request(begin, Duration::seconds(100), &["g-1", "g-2"], f.kit_id))
        .await
        .unwrap();

    let report = f.scheduler.run_once().await.unwrap().unwrap();
    assert_eq!(report.started, 1);
    assert_eq!(report.materialized, 5);

    let stored = campaign(&f, created.id).await;
    assert_eq!(stored.status, CampaignStatus::Running);
    assert_eq!(stored.total_recipients, Some(5));

    let rows = sendings(&f, created.id).await;
    let offsets: Vec<i64> = rows
        .iter()
        .map(|s| (s.scheduled_date - stored.begin_date).num_seconds())
        .collect();
    assert_eq!(offsets, vec![0, 20, 40, 60, 80]);

    let users: HashSet<_> = rows.iter().map(|s| s.user_id.as_str()).collect();
    assert_eq!(users.len(), 5);
    let tokens: HashSet<_> = rows.iter().map(|s| s.tracking_token.as_str()).collect();
    assert_eq!(tokens.len(), 5);
}

#[tokio::test]
async fn test_due_sendings_are_published_and_marked_sent() {
    let f = fixture(StaticDirectory::default().with_group("g-1", &["u1", "u2"])).await;
    let begin = Utc::now() - Duration::seconds(5);
    let created = f
        .campaigns
        .create(REALM, campaign_request(begin, Duration::hours(1), &["g-1"], f.kit_id))
        .await
        .unwrap();

    let report = f.scheduler.run_once().await.unwrap().unwrap();
    assert_eq!(report.dispatched, 1);

    let jobs = f.broker.peek_jobs();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.receiver_email, "u1@acme.test");
    assert_eq!(job.sender_email, "it@acme.test");
    assert_eq!(job.subject, "Your password expires today");
    assert_eq!(job.smtp_config.host, "smtp.acme.test");
    assert_eq!(job.smtp_config.port, 587);
    assert_eq!(job.arguments["company"], "Acme");
    assert_eq!(job.arguments["first_name"], "U1");

    let rows = sendings(&f, created.id).await;
    assert_eq!(rows[0].status, SendingStatus::Sent);
    assert!(rows[0].sent_at.is_some());
    assert_eq!(job.tracking_id, rows[0].tracking_token);
    assert_eq!(rows[1].status, SendingStatus::Scheduled);
    assert!(rows[1].sent_at.is_none());
}

#[tokio::test]
async fn test_materialization_happens_once() {
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
    let second = f.scheduler.run_once().await.unwrap().unwrap();
    assert_eq!(second.materialized, 0);
    assert_eq!(sendings(&f, created.id).await.len(), 3);
}

#[tokio::test]
async fn test_batch_size_caps_dispatch_in_begin_date_order() {
    let config = SchedulerConfig {
        batch_size: 2,
        ..SchedulerConfig::default()
    };
    let f = fixture_with(
        StaticDirectory::default()
            .with_group("early", &["a1", "a2", "a3"])
            .with_group("late", &["b1"]),
        config,
    )
    .await;
    let now = Utc::now();
    // a1..a3 are due at -90s, -50s and -10s; b1 at -80s.
    f.campaigns
        .create(REALM, campaign_request(now - Duration::seconds(80), Duration::seconds(120), &["late"], f.kit_id))
        .await
        .unwrap();
    f.campaigns
        .create(REALM, campaign_request(now - Duration::seconds(90), Duration::seconds(120), &["early"], f.kit_id))
        .await
        .unwrap();

    let report = f.scheduler.run_once().await.unwrap().unwrap();
    assert_eq!(report.materialized, 4);
    assert_eq!(report.dispatched, 2);
    let receivers: Vec<String> = f
        .broker
        .peek_jobs()
        .into_iter()
        .map(|j| j.receiver_email)
        .collect();
    assert_eq!(receivers, vec!["a1@acme.test", "a2@acme.test"]);

    let next = f.scheduler.run_once().await.unwrap().unwrap();
    assert_eq!(next.dispatched, 2);
    assert_eq!(f.broker.pending(), 4);
}

#[tokio::test]
async fn test_kit_without_sending_profile_stays_queued() {
    let f = fixture(StaticDirectory::default().with_group("g-1", &["u1"])).await;
    let conn = f.db.connection();
    let kit = lure_entities::phishing_kits::Entity::find_by_id(f.kit_id)
        .one(conn.as_ref())
        .await
        .unwrap()
        .unwrap();
    let mut kit: lure_entities::phishing_kits::ActiveModel = kit.into();
    kit.sending_profile_id = Set(None);
    kit.update(conn.as_ref()).await.unwrap();

    let created = f
        .campaigns
        .create(
            REALM,
            campaign_request(Utc::now() - Duration::seconds(1), Duration::hours(1), &["g-1"], f.kit_id),
        )
        .await
        .unwrap();
    let report = f.scheduler.run_once().await.unwrap().unwrap();

    assert_eq!(report.dispatched, 0);
    assert_eq!(f.broker.pending(), 0);
    assert_eq!(sendings(&f, created.id).await[0].status, SendingStatus::Scheduled);
}

#[tokio::test]
async fn test_campaign_over_before_first_tick_completes_without_emails() {
    let f = fixture(StaticDirectory::default().with_group("g-1", &["u1"])).await;
    let begin = Utc::now() - Duration::hours(2);
    let created = f
        .campaigns
        .create(REALM, campaign_request(begin, Duration::hours(1), &["g-1"], f.kit_id))
        .await
        .unwrap();

    let report = f.scheduler.run_once().await.unwrap().unwrap();
    assert_eq!(report.started, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(report.materialized, 0);
    let ended = campaign(&f, created.id).await;
    assert_eq!(ended.status, CampaignStatus::Completed);
    assert_eq!(ended.total_recipients, Some(0));
    assert!(sendings(&f, created.id).await.is_empty());
}

#[tokio::test]
async fn test_unsendable_kit_does_not_starve_later_campaigns() {
    let config = SchedulerConfig {
        batch_size: 2,
        ..SchedulerConfig::default()
    };
    let f = fixture_with(
        StaticDirectory::default()
            .with_group("early", &["a1", "a2", "a3"])
            .with_group("late", &["b1"]),
        config,
    )
    .await;
    let conn = f.db.connection();
    let kit = lure_entities::phishing_kits::Entity::find_by_id(f.kit_id)
        .one(conn.as_ref())
        .await
        .unwrap()
        .unwrap();
    let profileless = lure_entities::phishing_kits::ActiveModel {
        realm: Set(kit.realm.clone()),
        name: Set("No relay".to_string()),
        email_template_id: Set(kit.email_template_id),
        landing_page_template_id: Set(kit.landing_page_template_id),
        sending_profile_id: Set(None),
        args: Set(kit.args.clone()),
        ..Default::default()
    }
    .insert(conn.as_ref())
    .await
    .unwrap();

    let now = Utc::now();
    let early = f
        .campaigns
        .create(REALM, campaign_request(now - Duration::seconds(90), Duration::seconds(120), &["early"], profileless.id))
        .await
        .unwrap();
    let late = f
        .campaigns
        .create(REALM, campaign_request(now - Duration::seconds(80), Duration::seconds(120), &["late"], f.kit_id))
        .await
        .unwrap();

    let report = f.scheduler.run_once().await.unwrap().unwrap();
    assert_eq!(report.materialized, 4);
    assert_eq!(report.dispatched, 1);
    let receivers: Vec<String> = f
        .broker
        .peek_jobs()
        .into_iter()
        .map(|j| j.receiver_email)
        .collect();
    assert_eq!(receivers, vec!["b1@acme.test"]);
    assert_eq!(sendings(&f, late.id).await[0].status, SendingStatus::Sent);
    assert!(sendings(&f, early.id)
        .await
        .iter()
        .all(|s| s.status == SendingStatus::Scheduled));
}

#[tokio::test]
async fn test_overlapping_runs_are_skipped() {
    let f = fixture(StaticDirectory::default().with_group("g-1", &["u1", "u2"])).await;
    f.campaigns
        .create(
            REALM,
            campaign_request(Utc::now() - Duration::seconds(1), Duration::hours(1), &["g-1"], f.kit_id),
        )
        .await
        .unwrap();

    let (first, second) = tokio::join!(f.scheduler.run_once(), f.scheduler.run_once());
    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(first.is_some() != second.is_some());
    assert_eq!(f.broker.pending(), 1);
}

#[tokio::test]
async fn test_cancel_fails_pending_sendings() {
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

    let canceled = f.campaigns.cancel(REALM, created.id).await.unwrap();
    assert_eq!(canceled.status, CampaignStatus::Canceled);

    let statuses: Vec<_> = sendings(&f, created.id)
        .await
        .into_iter()
        .map(|s| s.status)
        .collect();
    assert_eq!(
        statuses,
        vec![SendingStatus::Sent, SendingStatus::Failed, SendingStatus::Failed]
    );

    // Canceled is terminal and the scheduler leaves it alone.
    assert!(matches!(
        f.campaigns.cancel(REALM, created.id).await,
        Err(ServiceError::Invariant { forbidden: false, .. })
    ));
    let report = f.scheduler.run_once().await.unwrap().unwrap();
    assert_eq!(report.dispatched, 0);
}

#[tokio::test]
async fn test_completed_campaign_cannot_be_canceled() {
    let f = fixture(StaticDirectory::default().with_group("g-1", &["u1"])).await;
    let created = f
        .campaigns
        .create(
            REALM,
            campaign_request(Utc::now() - Duration::hours(2), Duration::hours(1), &["g-1"], f.kit_id),
        )
        .await
        .unwrap();
    f.scheduler.run_once().await.unwrap();

    let err = f.campaigns.cancel(REALM, created.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Invariant { .. }));
    assert_eq!(campaign(&f, created.id).await.status, CampaignStatus::Completed);
}

#[tokio::test]
async fn test_campaign_of_other_realm_is_not_found() {
    let f = fixture(StaticDirectory::default()).await;
    let created = f
        .campaigns
        .create(
            REALM,
            campaign_request(Utc::now(), Duration::hours(1), &["g-1"], f.kit_id),
        )
        .await
        .unwrap();

    assert!(matches!(
        f.campaigns.get("globex", created.id).await,
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        f.campaigns.cancel("globex", created.id).await,
        Err(ServiceError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_unknown_kit_is_rejected() {
    let f = fixture(StaticDirectory::default()).await;
    let err = f
        .campaigns
        .create(
            REALM,
            campaign_request(Utc::now(), Duration::hours(1), &["g-1"], f.kit_id + 100),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation { .. }));

    let err = f
        .campaigns
        .create(
            "globex",
            campaign_request(Utc::now(), Duration::hours(1), &["g-1"], f.kit_id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[tokio::test]
async fn test_failed_status_update_does_not_abort_dispatch() {
    let f = fixture(StaticDirectory::default().with_group("g-1", &["u1", "u2"])).await;
    let created = f
        .campaigns
        .create(
            REALM,
            campaign_request(Utc::now() - Duration::seconds(1), Duration::seconds(2), &["g-1"], f.kit_id),
        )
        .await
        .unwrap();
    f.db.connection()
        .execute_unprepared(
            "CREATE TRIGGER reject_sent BEFORE UPDATE ON email_sendings \
             WHEN NEW.status = 'SENT' BEGIN SELECT RAISE(ABORT, 'read only'); END;",
        )
        .await
        .unwrap();

    let report = f.scheduler.run_once().await.unwrap().unwrap();

    assert_eq!(report.dispatched, 2);
    assert_eq!(f.broker.pending(), 2);
    assert!(sendings(&f, created.id)
        .await
        .iter()
        .all(|s| s.status == SendingStatus::Scheduled));
}
