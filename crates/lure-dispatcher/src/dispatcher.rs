//! Queue consumer loop

use std::sync::Arc;

use lure_core::template;
use lure_core::{BrokerConnector, Delivery, MessageBroker, QueueError};
use tracing::{debug, error, info, warn};

use crate::api_client::ApiClient;
use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::rate_limiter::RateLimiter;
use crate::smtp::MailSender;

pub struct Dispatcher {
    config: DispatcherConfig,
    api: ApiClient,
    mailer: Arc<dyn MailSender>,
    limiter: Arc<RateLimiter>,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        mailer: Arc<dyn MailSender>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, DispatchError> {
        let api = ApiClient::new(
            config.api_base_url.clone(),
            config.api_token.clone(),
            config.api_timeout,
        )?;
        Ok(Self {
            config,
            api,
            mailer,
            limiter,
        })
    }

    /// Consume forever, reopening the broker session after any failure.
    pub async fn run(&self, connector: &dyn BrokerConnector) {
        loop {
            match connector.connect().await {
                Ok(broker) => {
                    info!("Connected to broker, waiting for messages");
                    if let Err(e) = self.consume(broker.as_ref()).await {
                        warn!("Broker session lost: {}", e);
                    }
                }
                Err(e) => warn!("Broker connection failed: {}", e),
            }
            info!("Reconnecting in {:?}", self.config.reconnect_delay);
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    /// Process messages until the broker fails.
    pub async fn consume(&self, broker: &dyn MessageBroker) -> Result<(), QueueError> {
        loop {
            self.process_next(broker).await?;
        }
    }

    /// Receive, handle and acknowledge one message. Only broker failures are
    /// returned; a message that cannot be sent is logged and acknowledged.
    pub async fn process_next(&self, broker: &dyn MessageBroker) -> Result<(), QueueError> {
        let delivery = broker.receive().await?;
        match self.handle(&delivery).await {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                error!("Dropping message {} after transient failure: {}", delivery.tag, e);
            }
            Err(e) => warn!("Dropping invalid message {}: {}", delivery.tag, e),
        }
        broker.ack(&delivery).await
    }

    pub async fn handle(&self, delivery: &Delivery) -> Result<(), DispatchError> {
        self.limiter.acquire().await;

        let job = delivery.decode()?;
        if job.tracking_id.is_empty() {
            return Err(DispatchError::InvalidMessage("missing tracking id".into()));
        }
        let template = self.api.fetch_template(&job.template_id).await?;

        let urls = self.api.tracking_urls();
        let mut variables = job.arguments.clone();
        variables.insert("pixel".into(), urls.pixel_tag(&job.tracking_id));
        variables.insert("redirect".into(), urls.click(&job.tracking_id));
        variables.insert("email".into(), job.receiver_email.clone());

        let html = template::render(&template.body, &variables);
        let subject = if job.subject.is_empty() {
            template.subject.clone().unwrap_or_default()
        } else {
            job.subject.clone()
        };
        let subject = template::render(&subject, &variables);

        self.mailer.send(&job, &subject, &html).await?;
        debug!("Sent message {} to {}", job.tracking_id, job.receiver_email);

        // Delivery already happened; a failed callback only skews counters.
        if let Err(e) = self.api.confirm_sent(&job.tracking_id).await {
            warn!("Could not confirm delivery of {}: {}", job.tracking_id, e);
        }
        Ok(())
    }
}
