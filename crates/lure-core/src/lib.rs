//! Core utilities and contracts shared across all Lure crates

pub mod broker;
pub mod directory;
pub mod error;
pub mod error_builder;
pub mod plugin;
pub mod problemdetails;
pub mod template;
pub mod tracking;
pub mod types;

pub use broker::{BrokerConnector, Delivery, MessageBroker, QueueError, SendEmailJob, SmtpConfig};
pub use directory::{GroupDirectory, Recipient};
pub use error::{ServiceError, ServiceResult};
pub use problemdetails::{Problem, ProblemDetails};
pub use tracking::{dispatcher_token_matches, TrackingUrls, DISPATCHER_TOKEN_HEADER};
pub use types::{DBDateTime, UtcDateTime};

// Re-export external dependencies
pub use anyhow;
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use tracing;
