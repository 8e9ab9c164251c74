use crate::errors::{WheelError, WheelResult};
use chrono::NaiveDate;

/// Parses an expiration as `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_expiration(s: &str) -> WheelResult<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| {
            // Broker chain keys look like "2026-11-20:35"
            s.split(':')
                .next()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        })
        .ok_or_else(|| WheelError::Parse(format!("invalid expiration date: {s}")))
}

/// Calendar days from `as_of` to `expiration`. Negative once expired.
#[inline]
pub fn days_to_expiry(expiration: NaiveDate, as_of: NaiveDate) -> i64 {
    (expiration - as_of).num_days()
}

/// First supplied date falling inside `[as_of, expiration]`.
pub fn first_date_in_window(
    dates: &[NaiveDate],
    as_of: NaiveDate,
    expiration: NaiveDate,
) -> Option<NaiveDate> {
    dates
        .iter()
        .copied()
        .filter(|d| *d >= as_of && *d <= expiration)
        .min()
}
