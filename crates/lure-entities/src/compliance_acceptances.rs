//! Record of a user accepting a policy version

use lure_core::DBDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Unique on `(user_identifier, tenant, version)`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "compliance_acceptances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_identifier: String,
    pub tenant: String,
    pub version: String,
    pub score: i32,
    pub accepted_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
