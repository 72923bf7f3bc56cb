use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// API root used for template fetches and delivery callbacks; also the
    /// base of the tracking links embedded in emails.
    pub api_base_url: String,
    /// Shared secret presented on template fetches and delivery callbacks.
    pub api_token: Option<String>,
    /// Messages allowed per `rate_limit_window`, across the whole process.
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
    pub smtp_timeout: Duration,
    pub api_timeout: Duration,
    /// Pause before reopening a lost broker session.
    pub reconnect_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            api_token: None,
            rate_limit_max: 10,
            rate_limit_window: Duration::from_secs(1),
            smtp_timeout: Duration::from_secs(10),
            api_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}
