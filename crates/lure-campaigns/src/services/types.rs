use chrono::{DateTime, Utc};
use lure_entities::campaigns;
use lure_entities::CampaignStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCampaignRequest {
    #[schema(example = "Q3 invoice lure")]
    pub name: String,
    #[schema(example = "2026-07-01T08:00:00Z")]
    pub begin_date: DateTime<Utc>,
    #[schema(example = "2026-07-05T17:00:00Z")]
    pub end_date: DateTime<Utc>,
    /// Minimum gap between two emails of the campaign. Defaults to the
    /// configured minimum.
    pub send_interval_seconds: Option<i64>,
    /// Identity provider group ids whose members are targeted.
    pub group_ids: Vec<String>,
    /// Kits drawn from at random, one per recipient.
    pub phishing_kit_ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampaignResponse {
    pub id: i32,
    pub realm: String,
    pub name: String,
    pub begin_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub send_interval_seconds: i64,
    pub status: CampaignStatus,
    pub total_recipients: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<campaigns::Model> for CampaignResponse {
    fn from(campaign: campaigns::Model) -> Self {
        Self {
            id: campaign.id,
            realm: campaign.realm,
            name: campaign.name,
            begin_date: campaign.begin_date,
            end_date: campaign.end_date,
            send_interval_seconds: campaign.send_interval_seconds,
            status: campaign.status,
            total_recipients: campaign.total_recipients,
            created_at: campaign.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CampaignStats {
    pub campaign_id: i32,
    pub status: CampaignStatus,
    pub total_recipients: i32,
    pub total_sent: i32,
    pub total_opened: i32,
    pub total_clicked: i32,
    pub total_phished: i32,
    /// Fractions of `total_sent`, in `[0, 1]`.
    pub open_rate: f64,
    pub click_rate: f64,
    pub phish_rate: f64,
}

impl From<&campaigns::Model> for CampaignStats {
    fn from(campaign: &campaigns::Model) -> Self {
        let rate = |count: i32| {
            if campaign.total_sent > 0 {
                f64::from(count) / f64::from(campaign.total_sent)
            } else {
                0.0
            }
        };
        Self {
            campaign_id: campaign.id,
            status: campaign.status,
            total_recipients: campaign.total_recipients.unwrap_or(0),
            total_sent: campaign.total_sent,
            total_opened: campaign.total_opened,
            total_clicked: campaign.total_clicked,
            total_phished: campaign.total_phished,
            open_rate: rate(campaign.total_opened),
            click_rate: rate(campaign.total_clicked),
            phish_rate: rate(campaign.total_phished),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TemplateResponse {
    pub id: i32,
    pub name: String,
    #[schema(example = "email")]
    pub kind: String,
    pub subject: Option<String>,
    pub body: String,
}

impl From<lure_entities::templates::Model> for TemplateResponse {
    fn from(template: lure_entities::templates::Model) -> Self {
        Self {
            id: template.id,
            name: template.name,
            kind: template.kind.as_str().to_string(),
            subject: template.subject,
            body: template.body,
        }
    }
}

/// What one scheduler tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub started: u64,
    pub completed: u64,
    pub materialized: usize,
    pub dispatched: usize,
}
