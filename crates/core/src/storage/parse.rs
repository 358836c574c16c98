//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values and the fixed-width timestamp
//! encoding that keeps SQL comparisons on `TEXT` columns chronological.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Error as SqlError, ErrorCode};

use crate::error::StorageError;
use crate::identity::NationalId;
use crate::models::ReservationStatus;

/// Whether a timestamp encodes with a plain four-digit year
pub fn is_storable(dt: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&dt.year())
}

/// Encode a timestamp as RFC3339 with nanoseconds and a `Z` suffix.
///
/// Every storable value has the same width, so lexicographic order is time
/// order. Years outside 0000..=9999 gain a sign and break that ordering.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SqlError::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Parse a reservation status column
pub fn parse_status(s: &str) -> Result<ReservationStatus, SqlError> {
    ReservationStatus::from_str(s).ok_or_else(|| {
        SqlError::FromSqlConversionFailure(
            0,
            Type::Text,
            format!("unknown reservation status '{s}'").into(),
        )
    })
}

/// Wrap a stored identity column.
///
/// Values are written only after validation, so they are taken as canonical.
pub fn parse_identity(s: String) -> NationalId {
    NationalId::from_trusted(s)
}

/// Convert a non-negative count column
pub fn parse_count(n: i64) -> Result<u32, SqlError> {
    u32::try_from(n).map_err(|e| SqlError::FromSqlConversionFailure(0, Type::Integer, Box::new(e)))
}

/// Map constraint failures to [`StorageError::Constraint`], keep everything else
pub fn map_constraint(err: SqlError) -> StorageError {
    match err {
        SqlError::SqliteFailure(ref code, ref message)
            if code.code == ErrorCode::ConstraintViolation =>
        {
            StorageError::Constraint(
                message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string()),
            )
        }
        other => StorageError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_storable_range() {
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        assert!(is_storable(&last));
        assert!(!is_storable(&(last + Duration::seconds(1))));
        assert!(is_storable(&Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).unwrap()));
        assert!(!is_storable(&Utc.with_ymd_and_hms(-1, 12, 31, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_datetime_round_trip_keeps_nanos() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap() + Duration::nanoseconds(123);
        let encoded = format_datetime(&dt);
        assert_eq!(encoded, "2026-03-02T10:00:00.000000123Z");
        assert_eq!(parse_datetime(&encoded).unwrap(), dt);
    }

    #[test]
    fn test_encoding_sorts_chronologically() {
        let base = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let later = [
            base + Duration::nanoseconds(1),
            base + Duration::milliseconds(500),
            base + Duration::seconds(1),
            base + Duration::hours(2),
        ];

        let mut previous = format_datetime(&base);
        for dt in later {
            let encoded = format_datetime(&dt);
            assert!(encoded > previous, "{encoded} should sort after {previous}");
            previous = encoded;
        }
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("cancelled").unwrap(), ReservationStatus::Cancelled);
        assert!(parse_status("estado").is_err());
    }
}
