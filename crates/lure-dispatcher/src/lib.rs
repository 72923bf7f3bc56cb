//! Email send worker
//!
//! Pulls one message at a time from the broker, renders the referenced
//! template with tracking links, relays it through the tenant's SMTP server
//! and reports delivery back to the API. Every message is acknowledged,
//! whether it was sent or not.

pub mod api_client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod rate_limiter;
pub mod smtp;

pub use api_client::{ApiClient, TemplateBody};
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use rate_limiter::{RateLimiter, RateLimiterError};
pub use smtp::{MailSender, SmtpSender};
