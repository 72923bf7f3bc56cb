//! Engagement tracking keyed by the opaque per-recipient token.
//!
//! Each event is recorded at most once: the timestamp column is only set
//! while it is still null, and the campaign counter moves only when that
//! conditional update touched a row. Status never moves backwards and a
//! `FAILED` sending is never updated.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use lure_core::template;
use lure_core::{ServiceError, ServiceResult, TrackingUrls};
use lure_entities::{campaigns, email_sendings, phishing_kits, templates, SendingStatus};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, TransactionTrait,
};
use tracing::{debug, info};

/// Transparent 1x1 GIF served by the open endpoint.
pub const TRACKING_PIXEL: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3B,
];

#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Externally reachable API root the tracking links point at.
    pub public_base_url: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8000/api".to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum Event {
    Open,
    Click,
    Phish,
}

impl Event {
    fn stamp(self) -> email_sendings::Column {
        match self {
            Event::Open => email_sendings::Column::OpenedAt,
            Event::Click => email_sendings::Column::ClickedAt,
            Event::Phish => email_sendings::Column::PhishedAt,
        }
    }

    fn counter(self) -> campaigns::Column {
        match self {
            Event::Open => campaigns::Column::TotalOpened,
            Event::Click => campaigns::Column::TotalClicked,
            Event::Phish => campaigns::Column::TotalPhished,
        }
    }

    fn status(self) -> SendingStatus {
        match self {
            Event::Open => SendingStatus::Opened,
            Event::Click => SendingStatus::Clicked,
            Event::Phish => SendingStatus::Phished,
        }
    }
}

pub struct TrackingService {
    db: Arc<DatabaseConnection>,
    urls: TrackingUrls,
}

impl TrackingService {
    pub fn new(db: Arc<DatabaseConnection>, config: TrackingConfig) -> Self {
        Self {
            db,
            urls: TrackingUrls::new(config.public_base_url),
        }
    }

    pub fn urls(&self) -> &TrackingUrls {
        &self.urls
    }

    /// SMTP delivery confirmed by the dispatcher.
    pub async fn record_sent(&self, token: &str) -> ServiceResult<bool> {
        let txn = self.db.begin().await?;
        let sending = find_sending(&txn, token).await?;

        let now = Utc::now();
        let stamped = email_sendings::Entity::update_many()
            .col_expr(email_sendings::Column::DeliveredAt, Expr::value(Some(now)))
            .col_expr(email_sendings::Column::UpdatedAt, Expr::value(now))
            .filter(email_sendings::Column::Id.eq(sending.id))
            .filter(email_sendings::Column::DeliveredAt.is_null())
            .filter(email_sendings::Column::Status.ne(SendingStatus::Failed))
            .exec(&txn)
            .await?
            .rows_affected
            == 1;
        if stamped {
            // Rows handed over outside the scheduler have no sent_at yet.
            email_sendings::Entity::update_many()
                .col_expr(email_sendings::Column::SentAt, Expr::value(Some(now)))
                .filter(email_sendings::Column::Id.eq(sending.id))
                .filter(email_sendings::Column::SentAt.is_null())
                .exec(&txn)
                .await?;
            advance_status(&txn, sending.id, SendingStatus::Sent).await?;
            increment(&txn, sending.campaign_id, campaigns::Column::TotalSent).await?;
        }
        txn.commit().await?;

        debug!("Delivery of sending {} recorded (new: {})", sending.id, stamped);
        Ok(stamped)
    }

    pub async fn record_open(&self, token: &str) -> ServiceResult<bool> {
        let txn = self.db.begin().await?;
        let sending = find_sending(&txn, token).await?;
        let opened = record(&txn, &sending, Event::Open).await?;
        txn.commit().await?;
        Ok(opened)
    }

    /// Record a click (and the open it implies) and return the kit's landing
    /// page with the submission link filled in.
    pub async fn record_click(&self, token: &str) -> ServiceResult<String> {
        let txn = self.db.begin().await?;
        let sending = find_sending(&txn, token).await?;
        record(&txn, &sending, Event::Open).await?;
        let clicked = record(&txn, &sending, Event::Click).await?;
        txn.commit().await?;

        if clicked {
            info!("Sending {} clicked", sending.id);
        }
        self.landing_page(&sending).await
    }

    /// Record a credential submission. The submitted form is never read.
    pub async fn record_phish(&self, token: &str) -> ServiceResult<bool> {
        let txn = self.db.begin().await?;
        let sending = find_sending(&txn, token).await?;
        record(&txn, &sending, Event::Open).await?;
        record(&txn, &sending, Event::Click).await?;
        let phished = record(&txn, &sending, Event::Phish).await?;
        txn.commit().await?;

        if phished {
            info!("Sending {} submitted the landing page", sending.id);
        }
        Ok(phished)
    }

    async fn landing_page(&self, sending: &email_sendings::Model) -> ServiceResult<String> {
        let kit = phishing_kits::Entity::find_by_id(sending.phishing_kit_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Phishing kit {}", sending.phishing_kit_id)))?;
        let page = templates::Entity::find_by_id(kit.landing_page_template_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| {
                ServiceError::not_found(format!("Landing page {}", kit.landing_page_template_id))
            })?;

        let mut variables: BTreeMap<String, String> = kit.arguments();
        variables.insert("first_name".into(), sending.first_name.clone().unwrap_or_default());
        variables.insert("last_name".into(), sending.last_name.clone().unwrap_or_default());
        variables.insert("email".into(), sending.email_to.clone());
        variables.insert("redirect".into(), self.urls.phish(&sending.tracking_token));
        Ok(template::render(&page.body, &variables))
    }
}

async fn find_sending(txn: &DatabaseTransaction, token: &str) -> ServiceResult<email_sendings::Model> {
    email_sendings::Entity::find()
        .filter(email_sendings::Column::TrackingToken.eq(token))
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Tracking token"))
}

/// Stamp `event` if not yet stamped; returns whether this call did it.
async fn record<C: ConnectionTrait>(
    conn: &C,
    sending: &email_sendings::Model,
    event: Event,
) -> ServiceResult<bool> {
    let now = Utc::now();
    let stamped = email_sendings::Entity::update_many()
        .col_expr(event.stamp(), Expr::value(Some(now)))
        .col_expr(email_sendings::Column::UpdatedAt, Expr::value(now))
        .filter(email_sendings::Column::Id.eq(sending.id))
        .filter(event.stamp().is_null())
        .filter(email_sendings::Column::Status.ne(SendingStatus::Failed))
        .exec(conn)
        .await?
        .rows_affected
        == 1;

    if stamped {
        advance_status(conn, sending.id, event.status()).await?;
        increment(conn, sending.campaign_id, event.counter()).await?;
    }
    Ok(stamped)
}

async fn advance_status<C: ConnectionTrait>(
    conn: &C,
    sending_id: i32,
    target: SendingStatus,
) -> ServiceResult<()> {
    email_sendings::Entity::update_many()
        .col_expr(email_sendings::Column::Status, Expr::value(target))
        .filter(email_sendings::Column::Id.eq(sending_id))
        .filter(email_sendings::Column::Status.is_in(target.preceding()))
        .exec(conn)
        .await?;
    Ok(())
}

async fn increment<C: ConnectionTrait>(
    conn: &C,
    campaign_id: i32,
    counter: campaigns::Column,
) -> ServiceResult<()> {
    campaigns::Entity::update_many()
        .col_expr(counter, Expr::col(counter).add(1))
        .filter(campaigns::Column::Id.eq(campaign_id))
        .exec(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_is_a_gif() {
        assert_eq!(&TRACKING_PIXEL[..6], b"GIF89a");
        assert_eq!(TRACKING_PIXEL.len(), 43);
        assert_eq!(TRACKING_PIXEL[42], 0x3B);
    }

    #[test]
    fn test_events_move_status_forward() {
        assert_eq!(Event::Open.status(), SendingStatus::Opened);
        assert!(Event::Phish.status().preceding().contains(&SendingStatus::Clicked));
    }
}
