//! Shared datetime aliases

use chrono::{DateTime, Utc};

/// Timestamp type stored in every `TIMESTAMPTZ` column.
pub type DBDateTime = DateTime<Utc>;

/// Timestamp type exposed in API responses (RFC 3339, UTC).
pub type UtcDateTime = DateTime<Utc>;
