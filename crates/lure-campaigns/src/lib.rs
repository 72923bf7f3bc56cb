//! Phishing campaigns
//!
//! Campaign administration, the periodic scheduler that plans and publishes
//! emails, and the public tracking endpoints that aggregate engagement.

pub mod handlers;
pub mod plugin;
pub mod services;

pub use plugin::{CampaignsConfig, CampaignsPlugin};
pub use services::*;
