//! Queue plugin: registers the process-wide [`MessageBroker`]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use lure_core::plugin::{LurePlugin, PluginError, ServiceRegistrationContext};
use lure_core::MessageBroker;
use tracing::{info, warn};

use crate::{InMemoryBroker, RedisConnector};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL; the in-memory broker is used when absent.
    pub redis_url: Option<String>,
    pub queue_name: String,
    pub consumer_name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            queue_name: "emails".to_string(),
            consumer_name: "scheduler".to_string(),
        }
    }
}

pub struct QueuePlugin {
    config: QueueConfig,
}

impl QueuePlugin {
    pub fn new(config: QueueConfig) -> Self {
        Self { config }
    }
}

impl LurePlugin for QueuePlugin {
    fn name(&self) -> &'static str {
        "queue"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let broker: Arc<dyn MessageBroker> = match &self.config.redis_url {
                Some(url) => {
                    let connector = RedisConnector::new(
                        url.clone(),
                        self.config.queue_name.clone(),
                        self.config.consumer_name.clone(),
                    );
                    let broker = connector.open().await.map_err(|e| {
                        PluginError::InitializationFailed(format!("queue: {}", e))
                    })?;
                    info!("Using Redis queue {}", self.config.queue_name);
                    Arc::new(broker)
                }
                None => {
                    warn!("No Redis URL configured; messages stay in this process");
                    Arc::new(InMemoryBroker::new())
                }
            };

            context.register_service(broker);
            Ok(())
        })
    }
}
