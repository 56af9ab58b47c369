//! Read-only access to per-unit observations.
//!
//! A store hands out private connections: the orchestrator opens one to
//! enumerate units, and every unit task opens its own so no connection is
//! ever shared between tasks.

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::domain::{Observation, UnitId, UnitSummary};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteConnection, SqliteStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("failed to open store '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub trait ObservationStore: Send + Sync {
    type Connection: StoreConnection;

    fn connect(&self) -> Result<Self::Connection, StoreError>;
}

pub trait StoreConnection {
    /// Distinct units with their observation extent, ordered by identifier.
    fn list_units(&self) -> Result<Vec<UnitSummary>, StoreError>;

    /// Every observation of `unit`, in no particular order. Unknown units
    /// yield an empty list.
    fn observations(&self, unit: &UnitId) -> Result<Vec<Observation>, StoreError>;
}

/// Parse a stored date; anything unparseable becomes `None`.
///
/// Accepts `YYYY-MM-DD`, `YYYYMMDD` and date-times in ISO or space-separated
/// form (the time part is dropped).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Some(d);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_date_layouts() {
        let want = NaiveDate::from_ymd_opt(2003, 7, 14);
        assert_eq!(parse_date("2003-07-14"), want);
        assert_eq!(parse_date(" 20030714 "), want);
        assert_eq!(parse_date("2003-07-14 10:22:01"), want);
        assert_eq!(parse_date("2003-07-14T10:22:01.250"), want);
    }

    #[test]
    fn malformed_dates_are_coerced_to_none() {
        assert_eq!(parse_date("2003-13-40"), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }
}
