//! # Time Utilities
//!
//! Epoch timestamps and age checks using chrono.

use chrono::Utc;

/// Current time as Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current time as Unix seconds.
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Whether a record written at `written_at_ms` is still younger than `max_age_ms` at `now_ms`.
///
/// A write time in the future counts as fresh.
pub fn is_within_max_age(written_at_ms: i64, now_ms: i64, max_age_ms: i64) -> bool {
    now_ms.saturating_sub(written_at_ms) < max_age_ms
}
