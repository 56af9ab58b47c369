//! SQLite observation store.
//!
//! Table and column names come from configuration, so they are validated as
//! plain identifiers and quoted; the unit identifier itself is always bound as
//! a query parameter with its native type (integer or text).

use std::path::PathBuf;

use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OpenFlags};

use crate::domain::{Observation, StoreSchema, UnitId, UnitSummary};
use crate::store::{ObservationStore, StoreConnection, StoreError, parse_date};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    select_unit: String,
    select_units: String,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>, schema: &StoreSchema) -> Result<Self, StoreError> {
        let table = quote_identifier(&schema.table)?;
        let id = quote_identifier(&schema.id_field)?;
        let date = quote_identifier(&schema.date_column)?;
        let value = quote_identifier(&schema.value_column)?;
        let count = quote_identifier(&schema.count_column)?;
        let total = quote_identifier(&schema.total_column)?;

        Ok(Self {
            path: path.into(),
            select_unit: format!(
                "SELECT {date}, {value}, {count}, {total} FROM {table} WHERE {id} = ?1"
            ),
            select_units: format!(
                "SELECT {id}, MIN({date}), MAX({date}), COUNT(*) FROM {table} GROUP BY 1 ORDER BY 1"
            ),
        })
    }
}

impl ObservationStore for SqliteStore {
    type Connection = SqliteConnection;

    fn connect(&self) -> Result<SqliteConnection, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags).map_err(|source| StoreError::Open {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(SqliteConnection {
            conn,
            select_unit: self.select_unit.clone(),
            select_units: self.select_units.clone(),
        })
    }
}

/// A private, read-only connection.
pub struct SqliteConnection {
    conn: Connection,
    select_unit: String,
    select_units: String,
}

impl StoreConnection for SqliteConnection {
    fn list_units(&self) -> Result<Vec<UnitSummary>, StoreError> {
        let mut stmt = self.conn.prepare(&self.select_units)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                unit_id_of(row.get_ref(0)?),
                date_of(row.get_ref(1)?),
                date_of(row.get_ref(2)?),
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut units = Vec::new();
        for row in rows {
            let (unit_id, min_date, max_date, count) = row?;
            let Some(unit_id) = unit_id else {
                log::warn!("Skipping {count} observations with a NULL or non-key unit id");
                continue;
            };
            units.push(UnitSummary {
                unit_id,
                min_date,
                max_date,
                count: count.max(0) as u64,
            });
        }
        Ok(units)
    }

    fn observations(&self, unit: &UnitId) -> Result<Vec<Observation>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&self.select_unit)?;
        let rows = stmt.query_map([bind_value(unit)], |row| {
            Ok(Observation {
                unit_id: unit.clone(),
                date: date_of(row.get_ref(0)?),
                value: number_of(row.get_ref(1)?),
                sample_count: number_of(row.get_ref(2)?),
                sample_total: number_of(row.get_ref(3)?),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }
}

fn quote_identifier(name: &str) -> Result<String, StoreError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

fn bind_value(unit: &UnitId) -> Value {
    match unit {
        UnitId::Int(v) => Value::Integer(*v),
        UnitId::Text(s) => Value::Text(s.clone()),
    }
}

fn unit_id_of(value: ValueRef<'_>) -> Option<UnitId> {
    match value {
        ValueRef::Integer(v) => Some(UnitId::Int(v)),
        ValueRef::Text(bytes) => Some(UnitId::Text(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Real(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Some(UnitId::Int(v as i64)),
        _ => None,
    }
}

fn date_of(value: ValueRef<'_>) -> Option<chrono::NaiveDate> {
    match value {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().and_then(parse_date),
        ValueRef::Integer(v) => parse_date(&v.to_string()),
        _ => None,
    }
}

fn number_of(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Integer(v) => Some(v as f64),
        ValueRef::Real(v) => Some(v),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rusqlite::params;

    fn seed(path: &std::path::Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE restoration (
                ID_POL INTEGER, date TEXT, NDVI_median REAL, Pixel_Count INTEGER, Total_Pixels INTEGER
            );",
        )
        .unwrap();
        let rows: [(i64, &str, f64, i64, i64); 5] = [
            (2, "2001-01-03", 0.61, 90, 100),
            (1, "2001-01-01", 0.50, 80, 100),
            (1, "2001-02-10", 0.55, 10, 100),
            (1, "garbage", 0.70, 100, 100),
            (2, "2002-12-30", 0.64, 100, 100),
        ];
        for r in rows {
            conn.execute(
                "INSERT INTO restoration VALUES (?1, ?2, ?3, ?4, ?5)",
                params![r.0, r.1, r.2, r.3, r.4],
            )
            .unwrap();
        }
    }

    #[test]
    fn enumerates_units_in_order_with_extent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.db");
        seed(&path);

        let store = SqliteStore::new(&path, &StoreSchema::with_id_field("ID_POL")).unwrap();
        let units = store.connect().unwrap().list_units().unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].unit_id, UnitId::Int(1));
        assert_eq!(units[0].count, 3);
        assert_eq!(units[1].unit_id, UnitId::Int(2));
        assert_eq!(units[1].min_date, NaiveDate::from_ymd_opt(2001, 1, 3));
        assert_eq!(units[1].max_date, NaiveDate::from_ymd_opt(2002, 12, 30));
    }

    #[test]
    fn reads_one_unit_and_coerces_bad_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.db");
        seed(&path);

        let store = SqliteStore::new(&path, &StoreSchema::with_id_field("ID_POL")).unwrap();
        let conn = store.connect().unwrap();
        let obs = conn.observations(&UnitId::Int(1)).unwrap();

        assert_eq!(obs.len(), 3);
        assert_eq!(obs.iter().filter(|o| o.date.is_none()).count(), 1);
        assert!(obs.iter().all(|o| o.unit_id == UnitId::Int(1)));
        assert!(conn.observations(&UnitId::Int(99)).unwrap().is_empty());
    }

    #[test]
    fn text_ids_are_bound_not_interpolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE restoration (code TEXT, date TEXT, NDVI_median REAL, Pixel_Count INTEGER, Total_Pixels INTEGER);
             INSERT INTO restoration VALUES ('a''b', '2001-01-01', 0.3, 1, 1);
             INSERT INTO restoration VALUES ('c', '2001-01-01', 0.4, 1, 1);",
        )
        .unwrap();
        drop(conn);

        let store = SqliteStore::new(&path, &StoreSchema::with_id_field("code")).unwrap();
        let conn = store.connect().unwrap();
        let obs = conn.observations(&UnitId::from("a'b")).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].value, Some(0.3));
        assert!(conn.observations(&UnitId::from("x' OR '1'='1")).unwrap().is_empty());
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        let schema = StoreSchema::with_id_field("ID_POL; DROP TABLE restoration");
        assert!(matches!(
            SqliteStore::new("unused.db", &schema),
            Err(StoreError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn missing_database_fails_to_connect() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("absent.db"), &StoreSchema::with_id_field("ID_POL")).unwrap();
        assert!(matches!(store.connect(), Err(StoreError::Open { .. })));
    }
}
