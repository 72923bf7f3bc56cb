//! Reusable email + landing page bundles

use async_trait::async_trait;
use lure_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "phishing_kits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub realm: String,
    pub name: String,
    pub email_template_id: i32,
    pub landing_page_template_id: i32,
    pub sending_profile_id: Option<i32>,
    /// Static template variables, a JSON object of strings.
    pub args: Json,
    pub created_at: DBDateTime,
    pub updated_at: DBDateTime,
}

impl Model {
    /// `args` as a string map; non-string values are skipped.
    pub fn arguments(&self) -> BTreeMap<String, String> {
        self.args
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sending_profiles::Entity",
        from = "Column::SendingProfileId",
        to = "super::sending_profiles::Column::Id"
    )]
    SendingProfile,
}

impl Related<super::sending_profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SendingProfile.def()
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
