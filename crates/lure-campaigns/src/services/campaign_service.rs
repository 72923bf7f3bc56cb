//! Campaign lifecycle operations invoked from the HTTP surface

use std::collections::BTreeSet;
use std::sync::Arc;

use lure_core::{ServiceError, ServiceResult};
use lure_entities::{
    campaign_groups, campaign_kits, campaigns, email_sendings, phishing_kits, realms, templates,
    CampaignStatus, SendingStatus, TemplateKind,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use super::types::{CampaignStats, CreateCampaignRequest};

pub struct CampaignService {
    db: Arc<DatabaseConnection>,
    min_send_interval_seconds: i64,
}

impl CampaignService {
    pub fn new(db: Arc<DatabaseConnection>, min_send_interval_seconds: i64) -> Self {
        Self {
            db,
            min_send_interval_seconds,
        }
    }

    /// Store a new campaign in `SCHEDULED` with zeroed counters.
    pub async fn create(&self, realm: &str, request: CreateCampaignRequest) -> ServiceResult<campaigns::Model> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("Campaign name is required"));
        }
        if request.begin_date > request.end_date {
            return Err(ServiceError::validation("begin_date must not be after end_date"));
        }
        let interval = request
            .send_interval_seconds
            .unwrap_or(self.min_send_interval_seconds);
        if interval < self.min_send_interval_seconds {
            return Err(ServiceError::validation(format!(
                "send_interval_seconds must be at least {}",
                self.min_send_interval_seconds
            )));
        }

        let group_ids: BTreeSet<String> = request
            .group_ids
            .iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        let kit_ids: BTreeSet<i32> = request.phishing_kit_ids.iter().copied().collect();
        if group_ids.is_empty() {
            return Err(ServiceError::validation("At least one target group is required"));
        }
        if kit_ids.is_empty() {
            return Err(ServiceError::validation("At least one phishing kit is required"));
        }

        if realms::Entity::find_by_id(realm.to_string())
            .one(self.db.as_ref())
            .await?
            .is_none()
        {
            return Err(ServiceError::not_found(format!("Realm {}", realm)));
        }
        let known_kits = phishing_kits::Entity::find()
            .filter(phishing_kits::Column::Realm.eq(realm))
            .filter(phishing_kits::Column::Id.is_in(kit_ids.iter().copied()))
            .count(self.db.as_ref())
            .await?;
        if known_kits != kit_ids.len() as u64 {
            return Err(ServiceError::validation(
                "Every phishing kit must exist in this realm",
            ));
        }

        let txn = self.db.begin().await?;
        let campaign = campaigns::ActiveModel {
            realm: Set(realm.to_string()),
            name: Set(name.to_string()),
            begin_date: Set(request.begin_date),
            end_date: Set(request.end_date),
            send_interval_seconds: Set(interval),
            status: Set(CampaignStatus::Scheduled),
            total_recipients: Set(None),
            total_sent: Set(0),
            total_opened: Set(0),
            total_clicked: Set(0),
            total_phished: Set(0),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        campaign_groups::Entity::insert_many(group_ids.into_iter().map(|group_id| {
            campaign_groups::ActiveModel {
                campaign_id: Set(campaign.id),
                group_id: Set(group_id),
            }
        }))
        .exec(&txn)
        .await?;
        campaign_kits::Entity::insert_many(kit_ids.into_iter().map(|kit_id| {
            campaign_kits::ActiveModel {
                campaign_id: Set(campaign.id),
                phishing_kit_id: Set(kit_id),
            }
        }))
        .exec(&txn)
        .await?;
        txn.commit().await?;

        info!(
            "Scheduled campaign {} ({}) in realm {} from {} to {}",
            campaign.id, campaign.name, realm, campaign.begin_date, campaign.end_date
        );
        Ok(campaign)
    }

    pub async fn get(&self, realm: &str, id: i32) -> ServiceResult<campaigns::Model> {
        campaigns::Entity::find_by_id(id)
            .filter(campaigns::Column::Realm.eq(realm))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Campaign {}", id)))
    }

    pub async fn list(&self, realm: &str) -> ServiceResult<Vec<campaigns::Model>> {
        Ok(campaigns::Entity::find()
            .filter(campaigns::Column::Realm.eq(realm))
            .order_by_desc(campaigns::Column::BeginDate)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn stats(&self, realm: &str, id: i32) -> ServiceResult<CampaignStats> {
        let campaign = self.get(realm, id).await?;
        Ok(CampaignStats::from(&campaign))
    }

    /// Cancel a scheduled or running campaign. Every sending that has not
    /// been handed to the broker yet becomes `FAILED`.
    pub async fn cancel(&self, realm: &str, id: i32) -> ServiceResult<campaigns::Model> {
        let txn = self.db.begin().await?;

        let campaign = campaigns::Entity::find_by_id(id)
            .filter(campaigns::Column::Realm.eq(realm))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Campaign {}", id)))?;
        if !campaign.status.is_cancelable() {
            return Err(ServiceError::invariant(format!(
                "Campaign {} is {} and cannot be canceled",
                id, campaign.status
            )));
        }

        let updated = campaigns::Entity::update_many()
            .col_expr(campaigns::Column::Status, Expr::value(CampaignStatus::Canceled))
            .col_expr(campaigns::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .filter(campaigns::Column::Id.eq(id))
            .filter(
                campaigns::Column::Status
                    .is_in([CampaignStatus::Scheduled, CampaignStatus::Running]),
            )
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::invariant(format!(
                "Campaign {} changed state while canceling",
                id
            )));
        }

        let failed = email_sendings::Entity::update_many()
            .col_expr(email_sendings::Column::Status, Expr::value(SendingStatus::Failed))
            .col_expr(email_sendings::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .filter(email_sendings::Column::CampaignId.eq(id))
            .filter(email_sendings::Column::Status.eq(SendingStatus::Scheduled))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        info!(
            "Canceled campaign {} of realm {}; {} pending sendings failed",
            id, realm, failed.rows_affected
        );
        self.get(realm, id).await
    }

    /// Email template or landing page, as fetched by the dispatcher.
    pub async fn get_template(&self, id: i32) -> ServiceResult<templates::Model> {
        templates::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Template {}", id)))
    }

    pub async fn list_templates(&self, realm: &str, kind: Option<TemplateKind>) -> ServiceResult<Vec<templates::Model>> {
        let mut query = templates::Entity::find().filter(
            templates::Column::Realm
                .eq(realm)
                .or(templates::Column::Realm.is_null()),
        );
        if let Some(kind) = kind {
            query = query.filter(templates::Column::Kind.eq(kind));
        }
        Ok(query
            .order_by_asc(templates::Column::Name)
            .all(self.db.as_ref())
            .await?)
    }
}
