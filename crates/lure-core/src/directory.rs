//! Read access to group membership held by the identity provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ServiceResult;

/// A user eligible to receive campaign emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Current members of a realm group, as known by the identity provider.
    async fn group_members(&self, realm: &str, group_id: &str) -> ServiceResult<Vec<Recipient>>;
}
