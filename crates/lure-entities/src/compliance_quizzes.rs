//! Quiz attached to a compliance policy version

use lure_core::DBDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "compliance_quizzes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tenant: String,
    pub policy_version: String,
    /// Array of `{question, options, answer}` objects.
    pub questions: Json,
    /// Minimum percentage of correct answers required to pass.
    pub passing_score: i32,
    pub created_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
