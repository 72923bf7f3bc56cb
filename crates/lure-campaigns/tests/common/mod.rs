#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lure_campaigns::{
    CampaignScheduler, CampaignService, CreateCampaignRequest, SchedulerConfig, TrackingConfig,
    TrackingService,
};
use lure_core::{GroupDirectory, Recipient, ServiceResult};
use lure_database::test_utils::TestDatabase;
use lure_entities::{phishing_kits, realms, sending_profiles, templates, TemplateKind};
use lure_queue::InMemoryBroker;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;

pub const REALM: &str = "acme";
pub const PUBLIC_BASE: &str = "https://lure.test/api";

/// Group membership served from memory.
#[derive(Default)]
pub struct StaticDirectory {
    groups: HashMap<String, Vec<Recipient>>,
}

impl StaticDirectory {
    pub fn with_group(mut self, group_id: &str, members: &[&str]) -> Self {
        self.groups.insert(
            group_id.to_string(),
            members.iter().map(|id| recipient(id)).collect(),
        );
        self
    }
}

#[async_trait]
impl GroupDirectory for StaticDirectory {
    async fn group_members(&self, _realm: &str, group_id: &str) -> ServiceResult<Vec<Recipient>> {
        Ok(self.groups.get(group_id).cloned().unwrap_or_default())
    }
}

pub fn recipient(id: &str) -> Recipient {
    Recipient {
        user_id: id.to_string(),
        email: format!("{}@acme.test", id),
        first_name: Some(id.to_uppercase()),
        last_name: Some("Doe".to_string()),
    }
}

pub struct Fixture {
    pub db: TestDatabase,
    pub broker: Arc<InMemoryBroker>,
    pub campaigns: CampaignService,
    pub scheduler: CampaignScheduler,
    pub tracking: TrackingService,
    pub kit_id: i32,
}

pub async fn fixture(directory: StaticDirectory) -> Fixture {
    fixture_with(directory, SchedulerConfig::default()).await
}

pub async fn fixture_with(directory: StaticDirectory, config: SchedulerConfig) -> Fixture {
    let db = TestDatabase::with_migrations().await.unwrap();
    let conn = db.connection();

    realms::ActiveModel {
        name: Set(REALM.to_string()),
        domain: Set("acme.test".to_string()),
        attributes: Set(json!({ "tenant-domain": "acme.test" })),
        features: Set(json!({})),
        ..Default::default()
    }
    .insert(conn.as_ref())
    .await
    .unwrap();

    let email = templates::ActiveModel {
        realm: Set(Some(REALM.to_string())),
        name: Set("Password expiry".to_string()),
        kind: Set(TemplateKind::Email),
        subject: Set(Some("Your password expires today".to_string())),
        body: Set("<p>Hi ${{ first_name }}, <a href=\"${{redirect}}\">renew</a></p>${{pixel}}".to_string()),
        ..Default::default()
    }
    .insert(conn.as_ref())
    .await
    .unwrap();
    let landing = templates::ActiveModel {
        realm: Set(Some(REALM.to_string())),
        name: Set("Fake login".to_string()),
        kind: Set(TemplateKind::LandingPage),
        subject: Set(None),
        body: Set("<form method=\"post\" action=\"${{ redirect }}\">${{ company }} ${{ email }}</form>".to_string()),
        ..Default::default()
    }
    .insert(conn.as_ref())
    .await
    .unwrap();
    let profile = sending_profiles::ActiveModel {
        realm: Set(REALM.to_string()),
        name: Set("Relay".to_string()),
        host: Set("smtp.acme.test".to_string()),
        port: Set(587),
        username: Set(Some("relay".to_string())),
        password: Set(Some("relay-pass".to_string())),
        from_address: Set("it@acme.test".to_string()),
        ..Default::default()
    }
    .insert(conn.as_ref())
    .await
    .unwrap();
    let kit = phishing_kits::ActiveModel {
        realm: Set(REALM.to_string()),
        name: Set("Password expiry".to_string()),
        email_template_id: Set(email.id),
        landing_page_template_id: Set(landing.id),
        sending_profile_id: Set(Some(profile.id)),
        args: Set(json!({ "company": "Acme" })),
        ..Default::default()
    }
    .insert(conn.as_ref())
    .await
    .unwrap();

    let broker = Arc::new(InMemoryBroker::new());
    let campaigns = CampaignService::new(conn.clone(), config.min_send_interval_seconds);
    let scheduler = CampaignScheduler::new(
        conn.clone(),
        Arc::new(directory),
        broker.clone(),
        config,
    );
    let tracking = TrackingService::new(
        conn,
        TrackingConfig {
            public_base_url: PUBLIC_BASE.to_string(),
        },
    );

    Fixture {
        db,
        broker,
        campaigns,
        scheduler,
        tracking,
        kit_id: kit.id,
    }
}

pub fn campaign_request(
    begin: DateTime<Utc>,
    duration: Duration,
    groups: &[&str],
    kit_id: i32,
) -> CreateCampaignRequest {
    CreateCampaignRequest {
        name: "Password expiry wave".to_string(),
        begin_date: begin,
        end_date: begin + duration,
        send_interval_seconds: Some(1),
        group_ids: groups.iter().map(|g| g.to_string()).collect(),
        phishing_kit_ids: vec![kit_id],
    }
}
