/// Source timestamp staleness detection.
///
/// The WFS layer holds hourly values, published with some delay. When a sensor
/// stops reporting, the API keeps returning its last value with an old
/// `end_measure`, and nothing else in the response says so. This module
/// flags such readings so the poller can warn about them.
///
/// # Clock injection
/// `is_stale_at` takes `now` as a parameter rather than calling `Utc::now()`
/// internally, which keeps the tests deterministic.

use chrono::{DateTime, Utc};

use crate::model::Measurement;

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Returns `Some(true)` if the measurement's source timestamp is older than
/// `max_age_minutes` relative to `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
///
/// Returns `None` when there is no source timestamp (page readings) or it
/// cannot be parsed as RFC 3339; such readings are recorded unflagged.
pub fn is_stale_at(
    measurement: &Measurement,
    max_age_minutes: u64,
    now: DateTime<Utc>,
) -> Option<bool> {
    let age = age_minutes_at(measurement, now)?;
    Some(age > max_age_minutes as i64)
}

/// Age of the source timestamp in whole minutes. Negative if the source
/// reports a time ahead of `now`.
pub fn age_minutes_at(measurement: &Measurement, now: DateTime<Utc>) -> Option<i64> {
    let ts = measurement.timestamp.as_deref()?;
    let source_time = DateTime::parse_from_rfc3339(ts.trim()).ok()?.with_timezone(&Utc);
    Some((now - source_time).num_minutes())
}

/// Convenience wrapper that uses the real current time.
pub fn is_stale(measurement: &Measurement, max_age_minutes: u64) -> Option<bool> {
    is_stale_at(measurement, max_age_minutes, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
