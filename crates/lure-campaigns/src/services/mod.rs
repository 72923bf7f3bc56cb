mod campaign_service;
mod scheduler;
mod tracking_service;
mod types;

pub use campaign_service::CampaignService;
pub use scheduler::{effective_interval, CampaignScheduler, SchedulerConfig};
pub use tracking_service::{TrackingConfig, TrackingService, TRACKING_PIXEL};
pub use types::*;
