//! Broker contract shared by the campaign scheduler (producer) and the
//! send dispatcher (consumer).
//!
//! The queue is durable and acknowledgement is manual: a delivery stays
//! owned by its consumer until [`MessageBroker::ack`] is called.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Broker connection failed: {0}")]
    Connection(String),

    #[error("Failed to publish message: {0}")]
    Publish(String),

    #[error("Failed to receive message: {0}")]
    Receive(String),

    #[error("Failed to acknowledge message: {0}")]
    Ack(String),

    #[error("Malformed message payload: {0}")]
    Decode(String),

    #[error("Broker closed")]
    Closed,
}

/// SMTP endpoint a message is relayed through.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// One phishing email to render and deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEmailJob {
    pub smtp_config: SmtpConfig,
    pub sender_email: String,
    pub receiver_email: String,
    pub subject: String,
    pub template_id: String,
    /// Tracking token of the sending this message belongs to.
    pub tracking_id: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
}

impl SendEmailJob {
    pub fn to_payload(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::Decode(e.to_string()))
    }
}

/// A received, not yet acknowledged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-specific handle used to acknowledge this delivery.
    pub tag: String,
    pub payload: String,
}

impl Delivery {
    pub fn decode(&self) -> Result<SendEmailJob, QueueError> {
        serde_json::from_str(&self.payload).map_err(|e| QueueError::Decode(e.to_string()))
    }
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Persist a message on the queue.
    async fn publish(&self, job: &SendEmailJob) -> Result<(), QueueError>;

    /// Wait for the next message. Only one unacknowledged delivery is
    /// handed to a consumer at a time.
    async fn receive(&self) -> Result<Delivery, QueueError>;

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;
}

/// Opens broker sessions; used by long-running consumers to reconnect.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn MessageBroker>, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_format() {
        let payload = r#"{
            "smtp_config": {"host": "smtp.acme.test", "port": 587, "user": "u", "password": "p"},
            "sender_email": "it@acme.test",
            "receiver_email": "bob@acme.test",
            "subject": "Password expiry",
            "template_id": "12",
            "tracking_id": "tok",
            "arguments": {"first_name": "Bob"}
        }"#;
        let delivery = Delivery {
            tag: "1".into(),
            payload: payload.into(),
        };

        let job = delivery.decode().unwrap();
        assert_eq!(job.smtp_config.port, 587);
        assert_eq!(job.arguments["first_name"], "Bob");
    }

    #[test]
    fn test_malformed_payload_is_decode_error() {
        let delivery = Delivery {
            tag: "1".into(),
            payload: "{not json".into(),
        };
        assert!(matches!(delivery.decode(), Err(QueueError::Decode(_))));
    }

    #[test]
    fn test_smtp_password_is_redacted_in_debug() {
        let config = SmtpConfig {
            host: "h".into(),
            port: 25,
            user: Some("u".into()),
            password: Some("secret".into()),
        };
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
