//! sea-orm entities for the Lure data model

pub mod campaign_groups;
pub mod campaign_kits;
pub mod campaigns;
pub mod compliance_acceptances;
pub mod compliance_policies;
pub mod compliance_quizzes;
pub mod email_sendings;
pub mod groups;
pub mod phishing_kits;
pub mod realms;
pub mod sending_profiles;
pub mod templates;
pub mod types;
pub mod users;

pub use types::{CampaignStatus, SendingStatus, TemplateKind};
