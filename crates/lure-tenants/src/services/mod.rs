mod compliance_service;
mod cooldown;
mod tenant_service;
mod types;

pub use compliance_service::{ComplianceService, QuizOutcome, DEFAULT_POLICY_VERSION};
pub use cooldown::QuizCooldown;
pub use tenant_service::{TenantConfig, TenantService};
pub use types::*;
