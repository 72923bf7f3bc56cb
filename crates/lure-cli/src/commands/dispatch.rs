use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use lure_dispatcher::{Dispatcher, DispatcherConfig, RateLimiter, SmtpSender};
use lure_queue::RedisConnector;
use tracing::info;

use super::shutdown::shutdown_signal;

#[derive(Args)]
pub struct DispatchCommand {
    /// Redis URL of the send queue
    #[arg(long, env = "LURE_REDIS_URL")]
    pub redis_url: String,

    #[arg(long, default_value = "emails", env = "LURE_QUEUE_NAME")]
    pub queue_name: String,

    /// Name of this worker; messages it held when it stopped are requeued
    /// by the next worker started under the same name
    #[arg(long, default_value = "dispatcher", env = "LURE_CONSUMER_NAME")]
    pub consumer_name: String,

    /// API root used for template fetches, delivery callbacks and tracking links
    #[arg(long, default_value = "http://localhost:8000/api", env = "LURE_API_BASE_URL")]
    pub api_base_url: String,

    /// Shared secret presented to the API
    #[arg(long, env = "LURE_DISPATCHER_TOKEN", hide_env_values = true)]
    pub dispatcher_token: String,

    /// Emails allowed per rate limit window
    #[arg(long, default_value_t = 10, env = "LURE_RATE_LIMIT_MAX")]
    pub rate_limit_max: usize,

    #[arg(long, default_value_t = 1, env = "LURE_RATE_LIMIT_WINDOW_SECS")]
    pub rate_limit_window_secs: u64,

    #[arg(long, default_value_t = 10, env = "LURE_SMTP_TIMEOUT_SECS")]
    pub smtp_timeout_secs: u64,
}

impl DispatchCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let config = DispatcherConfig {
            api_base_url: self.api_base_url.clone(),
            api_token: Some(self.dispatcher_token.clone()),
            rate_limit_max: self.rate_limit_max,
            rate_limit_window: Duration::from_secs(self.rate_limit_window_secs),
            smtp_timeout: Duration::from_secs(self.smtp_timeout_secs),
            ..DispatcherConfig::default()
        };
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_max, config.rate_limit_window)?);
        let mailer = Arc::new(SmtpSender::new(config.smtp_timeout));
        let dispatcher = Dispatcher::new(config, mailer, limiter)?;
        let connector = RedisConnector::new(
            self.redis_url.clone(),
            self.queue_name.clone(),
            self.consumer_name.clone(),
        );

        info!(
            "Dispatcher {} consuming {} ({} per {}s)",
            self.consumer_name, self.queue_name, self.rate_limit_max, self.rate_limit_window_secs
        );
        tokio::select! {
            _ = dispatcher.run(&connector) => {},
            _ = shutdown_signal() => {},
        }
        info!("Dispatcher stopped");
        Ok(())
    }
}
