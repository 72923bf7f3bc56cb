use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lure_core::{BrokerConnector, Delivery, MessageBroker, QueueError, SendEmailJob};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

/// How long one BLMOVE waits before the receive loop polls again.
const BLOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis list queue with a reliable-queue processing list.
///
/// `publish` pushes on the left of `queue`; `receive` atomically moves the
/// oldest message into `{queue}:processing:{consumer}`; `ack` removes it
/// from there. Messages left in the processing list by a crashed consumer
/// are pushed back by [`RedisBroker::recover`].
pub struct RedisBroker {
    conn: ConnectionManager,
    queue: String,
    processing: String,
}

impl RedisBroker {
    pub fn new(conn: ConnectionManager, queue: impl Into<String>, consumer: &str) -> Self {
        let queue = queue.into();
        let processing = format!("{}:processing:{}", queue, consumer);
        Self {
            conn,
            queue,
            processing,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Requeue deliveries this consumer received but never acknowledged.
    pub async fn recover(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let mut recovered = 0;
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing)
                .arg(&self.queue)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await
                .map_err(|e| QueueError::Connection(e.to_string()))?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        if recovered > 0 {
            warn!(
                "Requeued {} unacknowledged messages from {}",
                recovered, self.processing
            );
        }
        Ok(recovered)
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn publish(&self, job: &SendEmailJob) -> Result<(), QueueError> {
        let payload = job.to_payload()?;
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .lpush(&self.queue, payload)
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;
        debug!("Published message for {} on {}", job.tracking_id, self.queue);
        Ok(())
    }

    async fn receive(&self) -> Result<Delivery, QueueError> {
        let mut conn = self.conn.clone();
        loop {
            let payload: Option<String> = redis::cmd("BLMOVE")
                .arg(&self.queue)
                .arg(&self.processing)
                .arg("RIGHT")
                .arg("LEFT")
                .arg(BLOCK_TIMEOUT.as_secs())
                .query_async(&mut conn)
                .await
                .map_err(|e| QueueError::Receive(e.to_string()))?;

            if let Some(payload) = payload {
                return Ok(Delivery {
                    tag: payload.clone(),
                    payload,
                });
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .lrem(&self.processing, 1, &delivery.tag)
            .await
            .map_err(|e| QueueError::Ack(e.to_string()))?;
        if removed == 0 {
            warn!("Acknowledged a delivery that was not in {}", self.processing);
        }
        Ok(())
    }
}

/// Opens [`RedisBroker`] sessions from a connection URL.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    url: String,
    queue: String,
    consumer: String,
}

impl RedisConnector {
    pub fn new(url: impl Into<String>, queue: impl Into<String>, consumer: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: queue.into(),
            consumer: consumer.into(),
        }
    }

    pub async fn open(&self) -> Result<RedisBroker, QueueError> {
        let client =
            redis::Client::open(self.url.as_str()).map_err(|e| QueueError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        let broker = RedisBroker::new(conn, self.queue.clone(), &self.consumer);
        broker.recover().await?;
        info!("Connected to queue {} as {}", self.queue, self.consumer);
        Ok(broker)
    }
}

#[async_trait]
impl BrokerConnector for RedisConnector {
    async fn connect(&self) -> Result<Arc<dyn MessageBroker>, QueueError> {
        Ok(Arc::new(self.open().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_connection_error() {
        let connector = RedisConnector::new("not-a-url", "emails", "worker-1");
        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, QueueError::Connection(_)));
    }
}
