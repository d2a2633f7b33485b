//! SQLite-backed archive index.
//!
//! One `coa.db` file at the archive root, usable concurrently with other
//! tooling (the schema is plain SQL and can be inspected directly). The
//! connection sits behind a mutex; each trait call is a single statement or
//! transaction, so readers never observe a half-written row.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::db::error::{ArchiveError, ArchiveResult};
use crate::db::repository::{ArchiveIndexRepository, SearchCriteria};
use crate::models::{ArchiveEntry, RecordKey};

const DATE_FMT: &str = "%Y-%m-%d";
const TIMESTAMP_FMT: &str = "%Y-%m-%dT%H:%M:%SZ";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS flights (
    data_id TEXT PRIMARY KEY,
    flight_number TEXT NOT NULL,
    flight_date TEXT NOT NULL,
    device_id TEXT NOT NULL,
    origin_icao TEXT,
    destination_icao TEXT,
    takeoff_utc TEXT NOT NULL,
    landing_utc TEXT NOT NULL,
    fit_r2 REAL,
    citizen_id TEXT NOT NULL,
    processed_path TEXT NOT NULL,
    raw_path TEXT,
    reference_path TEXT,
    checksum TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_flights_key
    ON flights (flight_number, flight_date, device_id);
";

const ENTRY_COLUMNS: &str = "data_id, flight_number, flight_date, device_id, origin_icao, \
     destination_icao, takeoff_utc, landing_utc, fit_r2, citizen_id, \
     processed_path, raw_path, reference_path, checksum";

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (creating if needed) the index database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> ArchiveResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, handy for tests of the SQL layer itself.
    pub fn open_in_memory() -> ArchiveResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Row image as stored; converted to [`ArchiveEntry`] after the query so
/// date parsing failures surface as index errors, not panics.
struct RawEntry {
    data_id: String,
    flight_number: String,
    flight_date: String,
    device_id: String,
    origin_icao: Option<String>,
    destination_icao: Option<String>,
    takeoff_utc: String,
    landing_utc: String,
    fit_r2: Option<f64>,
    citizen_id: String,
    processed_path: String,
    raw_path: Option<String>,
    reference_path: Option<String>,
    checksum: String,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            data_id: row.get(0)?,
            flight_number: row.get(1)?,
            flight_date: row.get(2)?,
            device_id: row.get(3)?,
            origin_icao: row.get(4)?,
            destination_icao: row.get(5)?,
            takeoff_utc: row.get(6)?,
            landing_utc: row.get(7)?,
            fit_r2: row.get(8)?,
            citizen_id: row.get(9)?,
            processed_path: row.get(10)?,
            raw_path: row.get(11)?,
            reference_path: row.get(12)?,
            checksum: row.get(13)?,
        })
    }

    fn into_entry(self) -> ArchiveResult<ArchiveEntry> {
        let date = NaiveDate::parse_from_str(&self.flight_date, DATE_FMT)
            .map_err(|e| ArchiveError::Index(format!("bad flight_date for {}: {e}", self.data_id)))?;
        let takeoff_utc = NaiveDateTime::parse_from_str(&self.takeoff_utc, TIMESTAMP_FMT)
            .map_err(|e| ArchiveError::Index(format!("bad takeoff_utc for {}: {e}", self.data_id)))?
            .and_utc();
        let landing_utc = NaiveDateTime::parse_from_str(&self.landing_utc, TIMESTAMP_FMT)
            .map_err(|e| ArchiveError::Index(format!("bad landing_utc for {}: {e}", self.data_id)))?
            .and_utc();

        Ok(ArchiveEntry {
            data_id: self.data_id,
            flight_number: self.flight_number,
            date,
            device_id: self.device_id,
            origin_icao: self.origin_icao,
            destination_icao: self.destination_icao,
            takeoff_utc,
            landing_utc,
            fit_r2: self.fit_r2,
            citizen_id: self.citizen_id,
            processed_path: self.processed_path,
            raw_path: self.raw_path,
            reference_path: self.reference_path,
            checksum: self.checksum,
        })
    }
}

fn entry_params(entry: &ArchiveEntry) -> [Box<dyn rusqlite::ToSql>; 14] {
    [
        Box::new(entry.data_id.clone()),
        Box::new(entry.flight_number.clone()),
        Box::new(entry.date.format(DATE_FMT).to_string()),
        Box::new(entry.device_id.clone()),
        Box::new(entry.origin_icao.clone()),
        Box::new(entry.destination_icao.clone()),
        Box::new(entry.takeoff_utc.format(TIMESTAMP_FMT).to_string()),
        Box::new(entry.landing_utc.format(TIMESTAMP_FMT).to_string()),
        Box::new(entry.fit_r2),
        Box::new(entry.citizen_id.clone()),
        Box::new(entry.processed_path.clone()),
        Box::new(entry.raw_path.clone()),
        Box::new(entry.reference_path.clone()),
        Box::new(entry.checksum.clone()),
    ]
}

#[async_trait]
impl ArchiveIndexRepository for SqliteRepository {
    async fn insert(&self, entry: &ArchiveEntry) -> ArchiveResult<()> {
        let conn = self.conn.lock();
        let exists: Option<String> = conn
            .query_row(
                "SELECT data_id FROM flights WHERE data_id = ?1",
                params![entry.data_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(ArchiveError::DuplicateKey(entry.data_id.clone()));
        }

        conn.execute(
            &format!(
                "INSERT INTO flights ({ENTRY_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            rusqlite::params_from_iter(entry_params(entry).iter().map(|p| p.as_ref())),
        )?;
        Ok(())
    }

    async fn replace(&self, entry: &ArchiveEntry) -> ArchiveResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO flights ({ENTRY_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            rusqlite::params_from_iter(entry_params(entry).iter().map(|p| p.as_ref())),
        )?;
        Ok(())
    }

    async fn get(&self, key: &RecordKey) -> ArchiveResult<Option<ArchiveEntry>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM flights WHERE data_id = ?1"),
                params![key.data_id()],
                RawEntry::from_row,
            )
            .optional()?;
        raw.map(RawEntry::into_entry).transpose()
    }

    async fn remove(&self, key: &RecordKey) -> ArchiveResult<bool> {
        let conn = self.conn.lock();
        let affected = conn.execute(
            "DELETE FROM flights WHERE data_id = ?1",
            params![key.data_id()],
        )?;
        Ok(affected > 0)
    }

    async fn search(&self, criteria: &SearchCriteria) -> ArchiveResult<Vec<ArchiveEntry>> {
        let conn = self.conn.lock();
        let date = criteria.date.map(|d| d.format(DATE_FMT).to_string());
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM flights \
             WHERE (?1 IS NULL OR flight_number = ?1) \
               AND (?2 IS NULL OR flight_date = ?2) \
               AND (?3 IS NULL OR device_id = ?3) \
             ORDER BY data_id"
        ))?;

        let raw_rows = stmt
            .query_map(
                params![criteria.flight_number, date, criteria.device_id],
                RawEntry::from_row,
            )?
            .collect::<rusqlite::Result<Vec<RawEntry>>>()?;

        raw_rows.into_iter().map(RawEntry::into_entry).collect()
    }

    async fn list_ids(&self) -> ArchiveResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT data_id FROM flights ORDER BY data_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    async fn health_check(&self) -> ArchiveResult<bool> {
        let conn = self.conn.lock();
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(one == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(flight_number: &str, device_id: &str) -> ArchiveEntry {
        let date = NaiveDate::from_ymd_opt(2025, 6, 27).unwrap();
        let key = RecordKey::new(flight_number, date, device_id);
        ArchiveEntry {
            data_id: key.data_id(),
            flight_number: flight_number.to_string(),
            date,
            device_id: device_id.to_string(),
            origin_icao: Some("LFPG".to_string()),
            destination_icao: Some("FACT".to_string()),
            takeoff_utc: Utc.with_ymd_and_hms(2025, 6, 27, 10, 5, 0).unwrap(),
            landing_utc: Utc.with_ymd_and_hms(2025, 6, 27, 21, 40, 0).unwrap(),
            fit_r2: Some(0.9877),
            citizen_id: "UNKNOWN".to_string(),
            processed_path: format!("processed/{}.log", key.data_id()),
            raw_path: Some(format!("raw/{}/device.log", key.data_id())),
            reference_path: None,
            checksum: "cafe".to_string(),
        }
    }

    #[tokio::test]
    async fn roundtrips_an_entry() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let e = entry("AFR81", "Safecast 1225");

        repo.insert(&e).await.unwrap();
        let fetched = repo.get(&e.key()).await.unwrap().unwrap();
        assert_eq!(fetched, e);
    }

    #[tokio::test]
    async fn duplicate_insert_rejected() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let e = entry("AFR81", "Safecast 1225");
        repo.insert(&e).await.unwrap();
        assert!(matches!(
            repo.insert(&e).await.unwrap_err(),
            ArchiveError::DuplicateKey(_)
        ));
    }

    #[tokio::test]
    async fn search_with_conjunction() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        repo.insert(&entry("AFR81", "Safecast 1225")).await.unwrap();
        repo.insert(&entry("AFR81", "GMC")).await.unwrap();
        repo.insert(&entry("BAW12", "GMC")).await.unwrap();

        let by_flight = repo
            .search(&SearchCriteria::by_flight_number("AFR81"))
            .await
            .unwrap();
        assert_eq!(by_flight.len(), 2);

        let by_both = repo
            .search(&SearchCriteria::by_flight_number("AFR81").with_device_id("GMC"))
            .await
            .unwrap();
        assert_eq!(by_both.len(), 1);
        assert_eq!(by_both[0].flight_number, "AFR81");
        assert_eq!(by_both[0].device_id, "GMC");
    }

    #[tokio::test]
    async fn replace_swaps_row() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let mut e = entry("AFR81", "Safecast 1225");
        repo.insert(&e).await.unwrap();

        e.fit_r2 = Some(0.5);
        e.checksum = "beef".to_string();
        repo.replace(&e).await.unwrap();

        let fetched = repo.get(&e.key()).await.unwrap().unwrap();
        assert_eq!(fetched.fit_r2, Some(0.5));
        assert_eq!(fetched.checksum, "beef");
        assert_eq!(repo.list_ids().await.unwrap().len(), 1);
    }
}
