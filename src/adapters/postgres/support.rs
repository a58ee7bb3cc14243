//! Row conversion and error mapping shared by the Postgres repositories.

use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::domain::foundation::{Currency, DomainError, ErrorCode, Timestamp, ValidationError};

/// Maps a read failure.
pub(super) fn read_error(what: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to load {}: {}", what, e))
}

/// Maps a write failure, surfacing unique violations so callers can retry.
pub(super) fn write_error(entity: &str, key: impl Into<String>, e: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return DomainError::unique_violation(entity, key);
        }
    }
    DomainError::database(format!("Failed to save {}: {}", entity, e))
}

/// Parses a stored enum column; a bad value means the row is corrupt.
pub(super) fn parse_column<T>(column: &str, value: &str) -> Result<T, DomainError>
where
    T: FromStr<Err = ValidationError>,
{
    value.parse().map_err(|e: ValidationError| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid {} value: {}", column, e),
        )
    })
}

pub(super) fn parse_currency(value: &str) -> Result<Currency, DomainError> {
    Currency::new(value).map_err(|e| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid currency value: {}", e))
    })
}

pub(super) fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    value: serde_json::Value,
) -> Result<T, DomainError> {
    serde_json::from_value(value).map_err(|e| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid {} value: {}", column, e))
    })
}

pub(super) fn encode_json<T: serde::Serialize>(
    column: &str,
    value: &T,
) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(value).map_err(|e| {
        DomainError::new(ErrorCode::InternalError, format!("Cannot encode {}: {}", column, e))
    })
}

pub(super) fn ts(value: DateTime<Utc>) -> Timestamp {
    Timestamp::from_datetime(value)
}

pub(super) fn opt_ts(value: Option<DateTime<Utc>>) -> Option<Timestamp> {
    value.map(Timestamp::from_datetime)
}

pub(super) fn opt_dt(value: &Option<Timestamp>) -> Option<DateTime<Utc>> {
    value.as_ref().map(|t| *t.as_datetime())
}
