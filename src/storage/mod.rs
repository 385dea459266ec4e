mod blob;
pub mod chain;
mod repository;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

pub use blob::*;
pub use repository::*;

/// SQL migration for initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for expenses
pub const MIGRATION_002_EXPENSES: &str = include_str!("migrations/002_expenses.sql");

/// Encode a timestamp so that text ordering matches chronological ordering.
pub(crate) fn encode_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(value: &str, column: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid {} timestamp", column))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_encoded_timestamps_sort_chronologically() {
        let whole = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let fraction = whole + chrono::Duration::milliseconds(5);
        let next_second = whole + chrono::Duration::seconds(1);

        let mut encoded = vec![encode_ts(next_second), encode_ts(fraction), encode_ts(whole)];
        encoded.sort();

        assert_eq!(
            encoded,
            vec![encode_ts(whole), encode_ts(fraction), encode_ts(next_second)]
        );
        assert_eq!(encode_ts(whole), "2024-01-05T00:00:00.000000Z");
        assert_eq!(decode_ts(&encode_ts(fraction), "test").unwrap(), fraction);
    }
}
