// SPDX-License-Identifier: MIT
//! Billable-amount and duration math.
//!
//! Pure functions only. The timer registry and the entry store both derive
//! durations and amounts through here so the two paths cannot drift apart.
//!
//! All durations are hours rounded to 2 decimals; all amounts are currency
//! rounded to 2 decimals.

use chrono::{DateTime, Utc};

pub const MS_PER_HOUR: f64 = 3_600_000.0;

/// Round to 2 decimal places, half away from zero.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Convert a measured span into billable hours.
///
/// `paused_ms` is subtracted from the wall-clock span before conversion.
/// The result is clamped to zero — clock skew between `start` and `end`
/// must not fail a legitimate stop.
pub fn duration_hours(start: DateTime<Utc>, end: DateTime<Utc>, paused_ms: i64) -> f64 {
    let worked_ms = (end - start).num_milliseconds() - paused_ms;
    round2((worked_ms as f64 / MS_PER_HOUR).max(0.0))
}

/// Billable amount for an entry: `duration × rate` when billable, else 0.
pub fn amount(duration: f64, billable: bool, hourly_rate: f64) -> f64 {
    if billable {
        round2(duration * hourly_rate)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn non_billable_is_always_zero() {
        assert_eq!(amount(8.0, false, 150.0), 0.0);
        assert_eq!(amount(0.01, false, 9_999.0), 0.0);
    }

    #[test]
    fn billable_amount_rounds_to_cents() {
        assert_eq!(amount(1.0, true, 50.0), 50.0);
        // 0.33 × 49.99 = 16.4967
        assert_eq!(amount(0.33, true, 49.99), 16.5);
    }

    #[test]
    fn duration_subtracts_paused_time() {
        let start = Utc::now();
        let end = start + Duration::minutes(90);
        // 90 min wall clock minus 30 min paused = 1.0h
        assert_eq!(duration_hours(start, end, 30 * 60 * 1_000), 1.0);
    }

    #[test]
    fn duration_clamps_negative_spans_to_zero() {
        let start = Utc::now();
        let end = start - Duration::seconds(5);
        assert_eq!(duration_hours(start, end, 0), 0.0);
        // Paused time exceeding the span also clamps.
        assert_eq!(duration_hours(start, start + Duration::seconds(1), 60_000), 0.0);
    }

    #[test]
    fn immediate_stop_is_zero_not_an_error() {
        let now = Utc::now();
        assert_eq!(duration_hours(now, now, 0), 0.0);
    }
}
