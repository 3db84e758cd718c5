//! Small helpers for timestamps and run identifiers.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Generates a fresh run identifier.
#[must_use]
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}
