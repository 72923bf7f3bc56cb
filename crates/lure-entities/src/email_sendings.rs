//! One planned or executed email per recipient per campaign

use async_trait::async_trait;
use lure_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};

use crate::types::SendingStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email_sendings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub campaign_id: i32,
    pub user_id: String,
    pub email_to: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phishing_kit_id: i32,
    pub scheduled_date: DBDateTime,
    /// Opaque token; the only identifier that leaves the system.
    #[sea_orm(unique)]
    pub tracking_token: String,
    pub status: SendingStatus,
    /// When the message was handed to the broker.
    pub sent_at: Option<DBDateTime>,
    /// When the dispatcher confirmed SMTP delivery.
    pub delivered_at: Option<DBDateTime>,
    pub opened_at: Option<DBDateTime>,
    pub clicked_at: Option<DBDateTime>,
    pub phished_at: Option<DBDateTime>,
    pub created_at: DBDateTime,
    pub updated_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaigns::Entity",
        from = "Column::CampaignId",
        to = "super::campaigns::Column::Id",
        on_delete = "Cascade"
    )]
    Campaign,
    #[sea_orm(
        belongs_to = "super::phishing_kits::Entity",
        from = "Column::PhishingKitId",
        to = "super::phishing_kits::Column::Id"
    )]
    PhishingKit,
}

impl Related<super::campaigns::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl Related<super::phishing_kits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PhishingKit.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();
        if insert && self.created_at.is_not_set() {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}
