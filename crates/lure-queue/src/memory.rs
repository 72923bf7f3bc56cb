use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use lure_core::{BrokerConnector, Delivery, MessageBroker, QueueError, SendEmailJob};
use tokio::sync::Notify;

#[derive(Default)]
struct State {
    ready: VecDeque<String>,
    unacked: HashMap<String, String>,
}

/// Single-process broker used when no Redis URL is configured and in tests.
#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<State>,
    available: Notify,
    next_tag: AtomicU64,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Messages waiting to be received.
    pub fn pending(&self) -> usize {
        self.lock().ready.len()
    }

    /// Messages received but not yet acknowledged.
    pub fn unacked(&self) -> usize {
        self.lock().unacked.len()
    }

    /// Decoded copies of every waiting message, oldest first.
    pub fn peek_jobs(&self) -> Vec<SendEmailJob> {
        self.lock()
            .ready
            .iter()
            .filter_map(|payload| serde_json::from_str(payload).ok())
            .collect()
    }

    /// Queue a raw payload, bypassing serialization.
    pub fn push_raw(&self, payload: impl Into<String>) {
        self.lock().ready.push_back(payload.into());
        self.available.notify_one();
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, job: &SendEmailJob) -> Result<(), QueueError> {
        self.push_raw(job.to_payload()?);
        Ok(())
    }

    async fn receive(&self) -> Result<Delivery, QueueError> {
        loop {
            let notified = self.available.notified();
            {
                let mut state = self.lock();
                if let Some(payload) = state.ready.pop_front() {
                    let tag = self.next_tag.fetch_add(1, Ordering::Relaxed).to_string();
                    state.unacked.insert(tag.clone(), payload.clone());
                    return Ok(Delivery { tag, payload });
                }
            }
            notified.await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        match self.lock().unacked.remove(&delivery.tag) {
            Some(_) => Ok(()),
            None => Err(QueueError::Ack(format!("unknown delivery tag {}", delivery.tag))),
        }
    }
}

/// Hands out one pre-built broker; reconnecting returns the same instance.
pub struct StaticConnector(pub Arc<dyn MessageBroker>);

#[async_trait]
impl BrokerConnector for StaticConnector {
    async fn connect(&self) -> Result<Arc<dyn MessageBroker>, QueueError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use lure_core::SmtpConfig;

    use super::*;

    fn job(tracking_id: &str) -> SendEmailJob {
        SendEmailJob {
            smtp_config: SmtpConfig {
                host: "smtp.acme.test".into(),
                port: 587,
                user: None,
                password: None,
            },
            sender_email: "it@acme.test".into(),
            receiver_email: "bob@acme.test".into(),
            subject: "Hello".into(),
            template_id: "1".into(),
            tracking_id: tracking_id.into(),
            arguments: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_fifo_with_manual_ack() {
        let broker = InMemoryBroker::new();
        broker.publish(&job("a")).await.unwrap();
        broker.publish(&job("b")).await.unwrap();

        let first = broker.receive().await.unwrap();
        assert_eq!(first.decode().unwrap().tracking_id, "a");
        assert_eq!(broker.unacked(), 1);
        assert_eq!(broker.pending(), 1);

        broker.ack(&first).await.unwrap();
        assert_eq!(broker.unacked(), 0);
        assert!(broker.ack(&first).await.is_err());

        let second = broker.receive().await.unwrap();
        assert_eq!(second.decode().unwrap().tracking_id, "b");
    }

    #[tokio::test]
    async fn test_receive_waits_for_publish() {
        let broker = Arc::new(InMemoryBroker::new());
        let consumer = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.receive().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.publish(&job("late")).await.unwrap();

        let delivery = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(delivery.decode().unwrap().tracking_id, "late");
    }

    #[tokio::test]
    async fn test_static_connector_returns_same_broker() {
        let broker = Arc::new(InMemoryBroker::new());
        let connector = StaticConnector(broker.clone());
        let connected = connector.connect().await.unwrap();
        connected.publish(&job("x")).await.unwrap();
        assert_eq!(broker.pending(), 1);
    }
}
