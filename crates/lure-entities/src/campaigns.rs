//! Phishing campaigns and their aggregate counters

use async_trait::async_trait;
use lure_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};

use crate::types::CampaignStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaigns")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub realm: String,
    pub name: String,
    pub begin_date: DBDateTime,
    pub end_date: DBDateTime,
    pub send_interval_seconds: i64,
    pub status: CampaignStatus,
    /// Set once, when sendings are materialized.
    pub total_recipients: Option<i32>,
    pub total_sent: i32,
    pub total_opened: i32,
    pub total_clicked: i32,
    pub total_phished: i32,
    pub created_at: DBDateTime,
    pub updated_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::realms::Entity",
        from = "Column::Realm",
        to = "super::realms::Column::Name",
        on_delete = "Cascade"
    )]
    Realm,
    #[sea_orm(has_many = "super::email_sendings::Entity")]
    EmailSendings,
    #[sea_orm(has_many = "super::campaign_groups::Entity")]
    CampaignGroups,
    #[sea_orm(has_many = "super::campaign_kits::Entity")]
    CampaignKits,
}

impl Related<super::realms::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Realm.def()
    }
}

impl Related<super::email_sendings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailSendings.def()
    }
}

impl Related<super::campaign_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CampaignGroups.def()
    }
}

impl Related<super::campaign_kits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CampaignKits.def()
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
