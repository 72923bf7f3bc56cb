//! Periodic campaign driver: advances campaign states, plans one email per
//! recipient and hands due emails to the broker.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lure_core::{GroupDirectory, MessageBroker, Recipient, SendEmailJob, ServiceResult};
use lure_entities::{
    campaign_groups, campaign_kits, campaigns, email_sendings, phishing_kits, sending_profiles,
    templates, CampaignStatus, SendingStatus,
};
use rand::seq::SliceRandom;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Select,
    Set, TransactionTrait,
};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::types::SchedulerReport;

/// SQLite caps bound parameters per statement.
const INSERT_CHUNK: usize = 200;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Sendings published per tick.
    pub batch_size: u64,
    pub min_send_interval_seconds: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 100,
            min_send_interval_seconds: 1,
        }
    }
}

/// Gap between two consecutive emails of a campaign: the configured value,
/// stretched so the recipients are spread over the whole campaign window.
pub fn effective_interval(
    configured_seconds: i64,
    duration_seconds: i64,
    recipients: usize,
    minimum_seconds: i64,
) -> i64 {
    let spread = match i64::try_from(recipients) {
        Ok(n) if n > 0 && duration_seconds > 0 => (duration_seconds + n - 1) / n,
        _ => 0,
    };
    configured_seconds.max(spread).max(minimum_seconds)
}

pub struct CampaignScheduler {
    db: Arc<DatabaseConnection>,
    directory: Arc<dyn GroupDirectory>,
    broker: Arc<dyn MessageBroker>,
    config: SchedulerConfig,
    running: Mutex<()>,
}

impl CampaignScheduler {
    pub fn new(
        db: Arc<DatabaseConnection>,
        directory: Arc<dyn GroupDirectory>,
        broker: Arc<dyn MessageBroker>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            db,
            directory,
            broker,
            config,
            running: Mutex::new(()),
        }
    }

    /// Tick forever. Each tick runs detached so a slow pass never delays the
    /// timer; overlapping ticks are dropped by [`Self::run_once`].
    pub async fn run(self: Arc<Self>) {
        info!(
            "Campaign scheduler started (every {:?}, batch {})",
            self.config.interval, self.config.batch_size
        );
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let scheduler = self.clone();
            tokio::spawn(async move {
                match scheduler.run_once().await {
                    Ok(Some(report)) if report != SchedulerReport::default() => {
                        info!("Scheduler tick: {:?}", report);
                    }
                    Ok(_) => {}
                    Err(e) => error!("Scheduler tick failed: {}", e),
                }
            });
        }
    }

    /// Run the three passes once. Returns `None` when another run holds the
    /// lock.
    pub async fn run_once(&self) -> ServiceResult<Option<SchedulerReport>> {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("Previous scheduler run still in progress, skipping tick");
            return Ok(None);
        };

        let now = Utc::now();
        let (started, completed) = self.advance(now).await?;
        let materialized = self.materialize().await?;
        let dispatched = self.dispatch(now).await?;

        Ok(Some(SchedulerReport {
            started,
            completed,
            materialized,
            dispatched,
        }))
    }

    async fn advance(&self, now: DateTime<Utc>) -> ServiceResult<(u64, u64)> {
        let started = campaigns::Entity::update_many()
            .col_expr(campaigns::Column::Status, Expr::value(CampaignStatus::Running))
            .col_expr(campaigns::Column::UpdatedAt, Expr::value(now))
            .filter(campaigns::Column::Status.eq(CampaignStatus::Scheduled))
            .filter(campaigns::Column::BeginDate.lte(now))
            .exec(self.db.as_ref())
            .await?
            .rows_affected;

        let completed = campaigns::Entity::update_many()
            .col_expr(campaigns::Column::Status, Expr::value(CampaignStatus::Completed))
            .col_expr(campaigns::Column::UpdatedAt, Expr::value(now))
            .filter(campaigns::Column::Status.eq(CampaignStatus::Running))
            .filter(campaigns::Column::EndDate.lte(now))
            .exec(self.db.as_ref())
            .await?
            .rows_affected;

        // Campaigns that ended before any tick saw them running never get
        // recipients planned.
        let unplanned = campaigns::Entity::update_many()
            .col_expr(campaigns::Column::TotalRecipients, Expr::value(0))
            .col_expr(campaigns::Column::UpdatedAt, Expr::value(now))
            .filter(campaigns::Column::Status.eq(CampaignStatus::Completed))
            .filter(campaigns::Column::TotalRecipients.is_null())
            .exec(self.db.as_ref())
            .await?
            .rows_affected;
        if unplanned > 0 {
            warn!(
                "{} campaign(s) ended before their recipients were planned; no emails were sent",
                unplanned
            );
        }

        Ok((started, completed))
    }

    async fn materialize(&self) -> ServiceResult<usize> {
        let pending = campaigns::Entity::find()
            .filter(campaigns::Column::Status.eq(CampaignStatus::Running))
            .filter(campaigns::Column::TotalRecipients.is_null())
            .order_by_asc(campaigns::Column::BeginDate)
            .all(self.db.as_ref())
            .await?;

        let mut total = 0;
        for campaign in pending {
            match self.materialize_campaign(&campaign).await {
                Ok(count) => total += count,
                Err(e) => warn!(
                    "Could not plan sendings for campaign {}: {}; retrying next tick",
                    campaign.id, e
                ),
            }
        }
        Ok(total)
    }

    async fn materialize_campaign(&self, campaign: &campaigns::Model) -> ServiceResult<usize> {
        let groups = campaign_groups::Entity::find()
            .filter(campaign_groups::Column::CampaignId.eq(campaign.id))
            .order_by_asc(campaign_groups::Column::GroupId)
            .all(self.db.as_ref())
            .await?;
        let kit_ids: Vec<i32> = campaign_kits::Entity::find()
            .filter(campaign_kits::Column::CampaignId.eq(campaign.id))
            .order_by_asc(campaign_kits::Column::PhishingKitId)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|k| k.phishing_kit_id)
            .collect();

        let mut seen = HashSet::new();
        let mut recipients = Vec::new();
        for group in &groups {
            for member in self
                .directory
                .group_members(&campaign.realm, &group.group_id)
                .await?
            {
                if seen.insert(member.user_id.clone()) {
                    recipients.push(member);
                }
            }
        }

        let interval = effective_interval(
            campaign.send_interval_seconds,
            (campaign.end_date - campaign.begin_date).num_seconds(),
            recipients.len(),
            self.config.min_send_interval_seconds,
        );
        let sendings = plan_sendings(campaign, &recipients, &kit_ids, interval);
        let count = sendings.len();

        let txn = self.db.begin().await?;
        let claimed = campaigns::Entity::update_many()
            .col_expr(
                campaigns::Column::TotalRecipients,
                Expr::value(i32::try_from(count).unwrap_or(i32::MAX)),
            )
            .col_expr(campaigns::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(campaigns::Column::Id.eq(campaign.id))
            .filter(campaigns::Column::TotalRecipients.is_null())
            .exec(&txn)
            .await?;
        if claimed.rows_affected == 0 {
            debug!("Campaign {} already materialized", campaign.id);
            return Ok(0);
        }
        let mut rows = sendings.into_iter().peekable();
        while rows.peek().is_some() {
            let chunk: Vec<_> = rows.by_ref().take(INSERT_CHUNK).collect();
            email_sendings::Entity::insert_many(chunk).exec(&txn).await?;
        }
        txn.commit().await?;

        info!(
            "Planned {} sendings for campaign {} ({}s apart)",
            count, campaign.id, interval
        );
        Ok(count)
    }

    /// Scheduled sendings that are due, for campaigns still allowed to send.
    fn due_sendings(&self, now: DateTime<Utc>) -> Select<email_sendings::Entity> {
        email_sendings::Entity::find()
            .inner_join(campaigns::Entity)
            .filter(email_sendings::Column::Status.eq(SendingStatus::Scheduled))
            .filter(email_sendings::Column::ScheduledDate.lte(now))
            .filter(
                campaigns::Column::Status
                    .is_in([CampaignStatus::Running, CampaignStatus::Completed]),
            )
    }

    async fn dispatch(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        // Rows of kits that cannot be sent never enter the batch.
        let due_kits: Vec<i32> = self
            .due_sendings(now)
            .select_only()
            .column(email_sendings::Column::PhishingKitId)
            .distinct()
            .into_tuple()
            .all(self.db.as_ref())
            .await?;
        let mut kits: HashMap<i32, KitDelivery> = HashMap::new();
        for kit_id in due_kits {
            if let Some(kit) = self.load_kit(kit_id).await? {
                kits.insert(kit_id, kit);
            }
        }
        if kits.is_empty() {
            return Ok(0);
        }

        let due = self
            .due_sendings(now)
            .filter(email_sendings::Column::PhishingKitId.is_in(kits.keys().copied()))
            .order_by_asc(campaigns::Column::BeginDate)
            .order_by_asc(email_sendings::Column::ScheduledDate)
            .order_by_asc(email_sendings::Column::Id)
            .limit(self.config.batch_size)
            .all(self.db.as_ref())
            .await?;

        let mut dispatched = 0;
        for sending in due {
            let Some(kit) = kits.get(&sending.phishing_kit_id) else {
                continue;
            };

            let job = kit.job_for(&sending);
            if let Err(e) = self.broker.publish(&job).await {
                warn!("Failed to publish sending {}: {}", sending.id, e);
                continue;
            }
            dispatched += 1;

            // Already queued; the rest of the batch still goes out.
            if let Err(e) = email_sendings::Entity::update_many()
                .col_expr(email_sendings::Column::Status, Expr::value(SendingStatus::Sent))
                .col_expr(email_sendings::Column::SentAt, Expr::value(Some(Utc::now())))
                .col_expr(email_sendings::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(email_sendings::Column::Id.eq(sending.id))
                .filter(email_sendings::Column::Status.eq(SendingStatus::Scheduled))
                .exec(self.db.as_ref())
                .await
            {
                error!("Sending {} was published but not marked sent: {}", sending.id, e);
            }
        }
        Ok(dispatched)
    }

    /// Everything about a kit the broker message needs. `None` when the kit
    /// cannot be sent (no sending profile or no email template).
    async fn load_kit(&self, kit_id: i32) -> ServiceResult<Option<KitDelivery>> {
        let Some(kit) = phishing_kits::Entity::find_by_id(kit_id)
            .one(self.db.as_ref())
            .await?
        else {
            warn!("Phishing kit {} no longer exists", kit_id);
            return Ok(None);
        };
        let profile = match kit.sending_profile_id {
            Some(id) => sending_profiles::Entity::find_by_id(id)
                .one(self.db.as_ref())
                .await?,
            None => None,
        };
        let Some(profile) = profile else {
            warn!("Phishing kit {} has no sending profile; its sendings stay queued", kit.id);
            return Ok(None);
        };
        let Some(template) = templates::Entity::find_by_id(kit.email_template_id)
            .one(self.db.as_ref())
            .await?
        else {
            warn!("Email template {} of kit {} is missing", kit.email_template_id, kit.id);
            return Ok(None);
        };

        Ok(Some(KitDelivery {
            arguments: kit.arguments(),
            template_id: kit.email_template_id,
            subject: template.subject.unwrap_or_default(),
            profile,
        }))
    }
}

struct KitDelivery {
    arguments: std::collections::BTreeMap<String, String>,
    template_id: i32,
    subject: String,
    profile: sending_profiles::Model,
}

impl KitDelivery {
    fn job_for(&self, sending: &email_sendings::Model) -> SendEmailJob {
        let mut arguments = self.arguments.clone();
        arguments.insert(
            "first_name".into(),
            sending.first_name.clone().unwrap_or_default(),
        );
        arguments.insert(
            "last_name".into(),
            sending.last_name.clone().unwrap_or_default(),
        );
        arguments.insert("email".into(), sending.email_to.clone());

        SendEmailJob {
            smtp_config: self.profile.smtp_config(),
            sender_email: self.profile.from_address.clone(),
            receiver_email: sending.email_to.clone(),
            subject: self.subject.clone(),
            template_id: self.template_id.to_string(),
            tracking_id: sending.tracking_token.clone(),
            arguments,
        }
    }
}

/// One row per recipient, `interval` seconds apart from the campaign start,
/// each with a randomly drawn kit and a fresh tracking token.
fn plan_sendings(
    campaign: &campaigns::Model,
    recipients: &[Recipient],
    kit_ids: &[i32],
    interval_seconds: i64,
) -> Vec<email_sendings::ActiveModel> {
    let mut rng = rand::thread_rng();
    let now = Utc::now();
    recipients
        .iter()
        .enumerate()
        .filter_map(|(i, recipient)| {
            let kit_id = *kit_ids.choose(&mut rng)?;
            let offset = chrono::Duration::seconds(interval_seconds.saturating_mul(i as i64));
            Some(email_sendings::ActiveModel {
                campaign_id: Set(campaign.id),
                user_id: Set(recipient.user_id.clone()),
                email_to: Set(recipient.email.clone()),
                first_name: Set(recipient.first_name.clone()),
                last_name: Set(recipient.last_name.clone()),
                phishing_kit_id: Set(kit_id),
                scheduled_date: Set(campaign.begin_date + offset),
                tracking_token: Set(uuid::Uuid::new_v4().simple().to_string()),
                status: Set(SendingStatus::Scheduled),
                sent_at: Set(None),
                delivered_at: Set(None),
                opened_at: Set(None),
                clicked_at: Set(None),
                phished_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_spreads_recipients_over_window() {
        assert_eq!(effective_interval(1, 100, 5, 1), 20);
        assert_eq!(effective_interval(1, 100, 3, 1), 34);
    }

    #[test]
    fn test_interval_keeps_larger_configured_value() {
        assert_eq!(effective_interval(60, 100, 5, 1), 60);
    }

    #[test]
    fn test_interval_never_below_minimum() {
        assert_eq!(effective_interval(0, 0, 0, 5), 5);
        assert_eq!(effective_interval(0, 10, 100, 2), 2);
    }

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.min_send_interval_seconds, 1);
    }
}
