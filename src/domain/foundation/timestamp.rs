//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Creates a timestamp from Unix seconds (Stripe's wire format).
    pub fn from_unix_secs(secs: i64) -> Result<Self, ValidationError> {
        Utc.timestamp_opt(secs, 0)
            .single()
            .map(Self)
            .ok_or_else(|| {
                ValidationError::invalid_format("timestamp", format!("{} is out of range", secs))
            })
    }

    /// Parses an RFC 3339 timestamp (PayPal's wire format).
    pub fn parse_rfc3339(value: &str) -> Result<Self, ValidationError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| ValidationError::invalid_format("timestamp", e.to_string()))
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Formats the timestamp as RFC 3339 with second precision.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Creates a new timestamp by adding the specified number of days.
    ///
    /// Negative values subtract days.
    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Creates a new timestamp by adding the specified number of seconds.
    pub fn plus_secs(&self, secs: i64) -> Self {
        Self(self.0 + Duration::seconds(secs))
    }

    /// Formats the calendar date as `YYYYMMDD`.
    pub fn compact_date(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_unix_secs_round_trips() {
        let ts = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        assert_eq!(ts.as_unix_secs(), 1_700_000_000);
    }

    #[test]
    fn from_unix_secs_rejects_out_of_range() {
        assert!(Timestamp::from_unix_secs(i64::MAX).is_err());
    }

    #[test]
    fn parse_rfc3339_normalizes_offset_to_utc() {
        let ts = Timestamp::parse_rfc3339("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:00:00Z");
    }

    #[test]
    fn parse_rfc3339_rejects_garbage() {
        assert!(Timestamp::parse_rfc3339("yesterday").is_err());
    }

    #[test]
    fn compact_date_formats_calendar_day() {
        let ts = Timestamp::parse_rfc3339("2024-01-05T23:59:59Z").unwrap();
        assert_eq!(ts.compact_date(), "20240105");
    }

    #[test]
    fn is_before_compares_instants() {
        let earlier = Timestamp::from_unix_secs(100).unwrap();
        let later = earlier.plus_secs(1);
        assert!(earlier.is_before(&later));
        assert!(!later.is_before(&earlier));
    }

    #[test]
    fn add_days_handles_negative_offsets() {
        let ts = Timestamp::from_unix_secs(86_400 * 10).unwrap();
        assert_eq!(ts.add_days(-1).as_unix_secs(), 86_400 * 9);
    }
}
