use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::{ComplianceService, TenantService};

/// Shared state for tenant handlers
pub struct AppState {
    pub tenant_service: Arc<TenantService>,
    pub compliance_service: Arc<ComplianceService>,
}

impl AppState {
    pub fn new(tenant_service: Arc<TenantService>, compliance_service: Arc<ComplianceService>) -> Self {
        Self {
            tenant_service,
            compliance_service,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    #[schema(example = "CONTENT_MANAGER")]
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GroupRequest {
    #[schema(example = "Finance")]
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FeatureRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttributesRequest {
    /// Keys to add or overwrite; other attributes are kept.
    #[schema(example = json!({"tenant-logo-id": "4f1c", "tenant-logo-updated-at": "2026-01-05T10:00:00Z"}))]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RealmLookupResponse {
    pub realm: String,
    pub domain: String,
    pub features: BTreeMap<String, bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PolicyResponse {
    pub version: String,
    pub title: String,
    pub content: String,
    #[schema(example = "2026-01-05T10:00:00Z")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<lure_entities::compliance_policies::Model> for PolicyResponse {
    fn from(policy: lure_entities::compliance_policies::Model) -> Self {
        Self {
            version: policy.version,
            title: policy.title,
            content: policy.content,
            created_at: policy.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComplianceStatusResponse {
    pub policy_version: String,
    pub accepted: bool,
    pub score: Option<i32>,
    pub accepted_at: Option<chrono::DateTime<chrono::Utc>>,
}
