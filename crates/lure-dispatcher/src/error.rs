use lure_core::QueueError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// The message can never be sent as is.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("API request failed: {0}")]
    Api(String),

    #[error("API returned {status} for {url}")]
    ApiStatus { status: u16, url: String },

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl DispatchError {
    /// Whether retrying the same message later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::InvalidMessage(_) | DispatchError::InvalidAddress { .. } => false,
            DispatchError::ApiStatus { status, .. } => *status >= 500,
            DispatchError::Queue(QueueError::Decode(_)) => false,
            DispatchError::Api(_) | DispatchError::Smtp(_) | DispatchError::Queue(_) => true,
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Api(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for DispatchError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        DispatchError::Smtp(err.to_string())
    }
}
