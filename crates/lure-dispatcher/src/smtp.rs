//! SMTP relay through the sending profile carried by each message

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use lure_core::{SendEmailJob, SmtpConfig};
use tracing::debug;

use crate::error::DispatchError;

/// Port on which SMTP servers expect TLS from the first byte.
pub const IMPLICIT_TLS_PORT: u16 = 465;

#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver `html` (already rendered) to the job's receiver.
    async fn send(&self, job: &SendEmailJob, subject: &str, html: &str) -> Result<(), DispatchError>;
}

pub struct SmtpSender {
    timeout: Duration,
}

impl SmtpSender {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn transport(&self, config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, DispatchError> {
        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        let mut builder = builder.port(config.port).timeout(Some(self.timeout));

        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            if !user.is_empty() {
                builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
            }
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn send(&self, job: &SendEmailJob, subject: &str, html: &str) -> Result<(), DispatchError> {
        let message = build_message(job, subject, html)?;
        let transport = self.transport(&job.smtp_config)?;
        transport.send(message).await?;
        debug!(
            "Relayed message {} through {}:{}",
            job.tracking_id, job.smtp_config.host, job.smtp_config.port
        );
        Ok(())
    }
}

fn mailbox(address: &str) -> Result<Mailbox, DispatchError> {
    address.parse().map_err(|e: lettre::address::AddressError| DispatchError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// `multipart/alternative` message with a text fallback of the HTML body.
pub fn build_message(job: &SendEmailJob, subject: &str, html: &str) -> Result<Message, DispatchError> {
    Message::builder()
        .from(mailbox(&job.sender_email)?)
        .to(mailbox(&job.receiver_email)?)
        .subject(subject)
        .multipart(MultiPart::alternative_plain_html(
            plain_text(html),
            html.to_string(),
        ))
        .map_err(|e| DispatchError::InvalidMessage(e.to_string()))
}

/// Drop markup, keeping text content.
fn plain_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.trim().to_string()
}
