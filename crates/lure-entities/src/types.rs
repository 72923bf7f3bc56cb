use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use utoipa::ToSchema;

/// Lifecycle of a phishing campaign.
///
/// `Scheduled -> Running -> Completed`, or `Canceled` from either of the
/// first two. `Completed` and `Canceled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    #[sea_orm(string_value = "SCHEDULED")]
    Scheduled,
    #[sea_orm(string_value = "RUNNING")]
    Running,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELED")]
    Canceled,
}

impl Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Scheduled => "SCHEDULED",
            CampaignStatus::Running => "RUNNING",
            CampaignStatus::Completed => "COMPLETED",
            CampaignStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_cancelable(&self) -> bool {
        matches!(self, CampaignStatus::Scheduled | CampaignStatus::Running)
    }
}

/// Delivery and engagement state of one recipient's email.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendingStatus {
    #[sea_orm(string_value = "SCHEDULED")]
    Scheduled,
    #[sea_orm(string_value = "SENT")]
    Sent,
    #[sea_orm(string_value = "OPENED")]
    Opened,
    #[sea_orm(string_value = "CLICKED")]
    Clicked,
    #[sea_orm(string_value = "PHISHED")]
    Phished,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

impl Display for SendingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl SendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendingStatus::Scheduled => "SCHEDULED",
            SendingStatus::Sent => "SENT",
            SendingStatus::Opened => "OPENED",
            SendingStatus::Clicked => "CLICKED",
            SendingStatus::Phished => "PHISHED",
            SendingStatus::Failed => "FAILED",
        }
    }

    /// Engagement stages strictly below `self`; a status only moves forward.
    pub fn preceding(&self) -> Vec<SendingStatus> {
        use SendingStatus::*;
        match self {
            Scheduled | Failed => vec![],
            Sent => vec![Scheduled],
            Opened => vec![Scheduled, Sent],
            Clicked => vec![Scheduled, Sent, Opened],
            Phished => vec![Scheduled, Sent, Opened, Clicked],
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    #[sea_orm(string_value = "email")]
    Email,
    #[sea_orm(string_value = "landing_page")]
    LandingPage,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Email => "email",
            TemplateKind::LandingPage => "landing_page",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_scheduled_and_running_are_cancelable() {
        assert!(CampaignStatus::Scheduled.is_cancelable());
        assert!(CampaignStatus::Running.is_cancelable());
        assert!(!CampaignStatus::Completed.is_cancelable());
        assert!(!CampaignStatus::Canceled.is_cancelable());
    }

    #[test]
    fn test_failed_never_advances() {
        assert!(SendingStatus::Opened.preceding().contains(&SendingStatus::Sent));
        assert!(!SendingStatus::Phished.preceding().contains(&SendingStatus::Failed));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&CampaignStatus::Canceled).unwrap(),
            "\"CANCELED\""
        );
        assert_eq!(SendingStatus::Phished.to_string(), "PHISHED");
    }
}
