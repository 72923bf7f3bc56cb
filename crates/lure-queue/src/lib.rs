//! Message brokers for the email send queue
//!
//! [`RedisBroker`] keeps messages in a Redis list and moves each delivery
//! into a per-consumer processing list until it is acknowledged.
//! [`InMemoryBroker`] offers the same contract inside one process.

pub mod memory;
pub mod plugin;
pub mod redis_broker;

pub use memory::{InMemoryBroker, StaticConnector};
pub use plugin::{QueueConfig, QueuePlugin};
pub use redis_broker::{RedisBroker, RedisConnector};

pub use lure_core::{BrokerConnector, Delivery, MessageBroker, QueueError, SendEmailJob};
