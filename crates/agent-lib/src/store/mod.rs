//! Durable, append-only persistence of sampled readings
//!
//! Readings live in a single SQLite table. The agent loop only ever calls
//! [`ReadingStore::initialize`] and [`ReadingStore::append`]; the read-side
//! queries on [`SqliteStore`] exist for operators and tests.

mod migrations;

use crate::error::{StoreError, StoreResult};
use crate::models::{Reading, ReadingId, ReadingStats, TierCounts};
use crate::sampler::Thresholds;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use migrations::CURRENT_SCHEMA_VERSION as SCHEMA_VERSION;

/// Write side of the reading store as seen by the agent loop
pub trait ReadingStore: Send {
    /// Ensure the readings table exists. Safe on an already-initialized store.
    fn initialize(&mut self) -> StoreResult<()>;

    /// Durably record one reading and return its id.
    ///
    /// Returns only after the row is committed.
    fn append(&mut self, value: f64, observed_at: DateTime<Utc>) -> StoreResult<ReadingId>;
}

/// SQLite-backed reading store
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the store file at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        configure(&conn).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "Opened reading store");

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Open an existing store file for inspection only
    ///
    /// No pragmas are changed and no migrations run, so the file is left
    /// exactly as the agent wrote it.
    pub fn open_read_only(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "Opened reading store read-only");

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Open a store that lives only as long as this value
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        Ok(Self { conn, path: None })
    }

    /// Path of the backing file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the readings table exists yet
    pub fn has_readings(&self) -> StoreResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'readings'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Query)?;
        Ok(found.is_some())
    }

    /// Schema version recorded in the file
    pub fn schema_version(&self) -> StoreResult<i32> {
        self.conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(StoreError::Query)
    }

    /// Number of persisted readings
    pub fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))
            .map_err(StoreError::Query)?;
        Ok(count.max(0) as u64)
    }

    /// Newest readings first, at most `limit` rows
    pub fn recent(&self, limit: usize) -> StoreResult<Vec<Reading>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_readings(
            "SELECT rowid, val, ts FROM readings ORDER BY rowid DESC LIMIT ?1",
            params![limit],
        )
    }

    /// Every reading in insertion order
    pub fn all(&self) -> StoreResult<Vec<Reading>> {
        self.query_readings("SELECT rowid, val, ts FROM readings ORDER BY rowid ASC", [])
    }

    /// Most recent reading, if any
    pub fn latest(&self) -> StoreResult<Option<Reading>> {
        Ok(self.recent(1)?.into_iter().next())
    }

    /// Aggregate statistics over all readings
    pub fn stats(&self) -> StoreResult<ReadingStats> {
        let (count, min, max, mean): (i64, Option<f64>, Option<f64>, Option<f64>) = self
            .conn
            .query_row(
                "SELECT COUNT(*), MIN(val), MAX(val), AVG(val) FROM readings",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(StoreError::Query)?;

        let first_at = self.edge_timestamp("ASC")?;
        let last_at = self.edge_timestamp("DESC")?;

        Ok(ReadingStats {
            count: count.max(0) as u64,
            min,
            max,
            mean,
            first_at,
            last_at,
        })
    }

    /// Count readings per tier without loading them
    pub fn tier_counts(&self, thresholds: &Thresholds) -> StoreResult<TierCounts> {
        let (normal, warning, critical): (i64, i64, i64) = self
            .conn
            .query_row(
                "SELECT
                    COALESCE(SUM(CASE WHEN val <= ?1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN val > ?1 AND val <= ?2 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN val > ?2 THEN 1 ELSE 0 END), 0)
                 FROM readings",
                params![thresholds.warning_above, thresholds.critical_above],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(StoreError::Query)?;

        Ok(TierCounts {
            normal: normal.max(0) as u64,
            warning: warning.max(0) as u64,
            critical: critical.max(0) as u64,
        })
    }

    fn edge_timestamp(&self, order: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let sql = format!("SELECT rowid, ts FROM readings ORDER BY rowid {order} LIMIT 1");
        let row: Option<(i64, String)> = self
            .conn
            .query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
            .map_err(StoreError::Query)?;

        row.map(|(id, ts)| parse_timestamp(id, &ts)).transpose()
    }

    fn query_readings<P: rusqlite::Params>(&self, sql: &str, params: P) -> StoreResult<Vec<Reading>> {
        let mut stmt = self.conn.prepare(sql).map_err(StoreError::Query)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(StoreError::Query)?;

        let mut readings = Vec::new();
        for row in rows {
            let (id, value, ts) = row.map_err(StoreError::Query)?;
            readings.push(Reading {
                id,
                value,
                timestamp: parse_timestamp(id, &ts)?,
            });
        }
        Ok(readings)
    }
}

impl ReadingStore for SqliteStore {
    fn initialize(&mut self) -> StoreResult<()> {
        migrations::run_migrations(&mut self.conn)?;
        info!(
            path = %self.path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| ":memory:".into()),
            schema_version = migrations::CURRENT_SCHEMA_VERSION,
            "Reading store initialized"
        );
        Ok(())
    }

    fn append(&mut self, value: f64, observed_at: DateTime<Utc>) -> StoreResult<ReadingId> {
        // Named columns keep this valid against tables created without `id`.
        self.conn
            .execute(
                "INSERT INTO readings (val, ts) VALUES (?1, ?2)",
                params![value, format_timestamp(observed_at)],
            )
            .map_err(StoreError::Append)?;

        Ok(self.conn.last_insert_rowid())
    }
}

fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // A commit is on stable storage before `append` returns.
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

/// Fixed-width RFC 3339 so lexical order matches time order
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp, accepting the SQLite `datetime('now')` format
/// written by older agents.
pub fn parse_timestamp(id: i64, value: &str) -> StoreResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| StoreError::Timestamp {
            id,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_append_assigns_sequential_ids() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();

        let first = store.append(75.0, base_time()).unwrap();
        let second = store.append(110.0, base_time()).unwrap();
        let third = store.append(130.0, base_time()).unwrap();

        assert_eq!((first, second, third), (1, 2, 3));
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_readings_round_trip_in_order() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();

        for (i, value) in [60.0, 105.5, 149.9].into_iter().enumerate() {
            store
                .append(value, base_time() + Duration::seconds(i as i64 * 5))
                .unwrap();
        }

        let all = store.all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, 1);
        assert_eq!(all[1].value, 105.5);
        assert_eq!(all[2].timestamp, base_time() + Duration::seconds(10));

        let recent = store.recent(2).unwrap();
        assert_eq!(recent.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[test]
    fn test_reinitialize_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.db");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.initialize().unwrap();
            store.append(80.0, base_time()).unwrap();
            store.append(90.0, base_time()).unwrap();
        }

        let mut reopened = SqliteStore::open(&path).unwrap();
        reopened.initialize().unwrap();
        reopened.initialize().unwrap();

        assert_eq!(reopened.count().unwrap(), 2);
        assert_eq!(reopened.append(95.0, base_time()).unwrap(), 3);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("edge").join("data.db");

        let mut store = SqliteStore::open(&path).unwrap();
        store.initialize().unwrap();

        assert!(path.exists());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn test_append_without_table_fails() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let err = store.append(100.0, base_time()).unwrap_err();
        assert!(matches!(err, StoreError::Append(_)));
    }

    #[test]
    fn test_stats() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();

        let empty = store.stats().unwrap();
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_none());
        assert!(empty.last_at.is_none());

        store.append(60.0, base_time()).unwrap();
        store.append(140.0, base_time() + Duration::seconds(5)).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, Some(60.0));
        assert_eq!(stats.max, Some(140.0));
        assert_eq!(stats.mean, Some(100.0));
        assert_eq!(stats.first_at, Some(base_time()));
        assert_eq!(stats.last_at, Some(base_time() + Duration::seconds(5)));
    }

    #[test]
    fn test_tier_counts_use_strict_cut_points() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();

        let empty = store.tier_counts(&Thresholds::default()).unwrap();
        assert_eq!(empty, TierCounts::default());

        for value in [95.0, 100.0, 110.0, 120.0, 130.0] {
            store.append(value, base_time()).unwrap();
        }

        let counts = store.tier_counts(&Thresholds::default()).unwrap();
        assert_eq!(
            counts,
            TierCounts {
                normal: 2,
                warning: 2,
                critical: 1,
            }
        );

        let shifted = store
            .tier_counts(&Thresholds::new(110.0, 125.0).unwrap())
            .unwrap();
        assert_eq!(shifted.normal, 3);
        assert_eq!(shifted.warning, 1);
        assert_eq!(shifted.critical, 1);
    }

    #[test]
    fn test_read_only_open_leaves_legacy_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE readings (val REAL, ts TEXT);
                 INSERT INTO readings VALUES (121.0, '2024-03-01 12:00:00');",
            )
            .unwrap();
        }

        let mut store = SqliteStore::open_read_only(&path).unwrap();
        assert!(store.has_readings().unwrap());
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.latest().unwrap().unwrap().value, 121.0);
        assert!(matches!(
            store.append(99.0, base_time()),
            Err(StoreError::Append(_))
        ));
        drop(store);

        let conn = Connection::open(&path).unwrap();
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        let journal: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 0);
        assert_eq!(journal, "delete");
    }

    #[test]
    fn test_read_only_open_of_fresh_agent_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.initialize().unwrap();
            store.append(101.0, base_time()).unwrap();
        }

        let store = SqliteStore::open_read_only(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_read_only_open_of_empty_file_has_no_readings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE other (x INTEGER);")
            .unwrap();

        let store = SqliteStore::open_read_only(&path).unwrap();
        assert!(!store.has_readings().unwrap());
    }

    #[test]
    fn test_read_only_open_of_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.db");

        let err = SqliteStore::open_read_only(&path).err().unwrap();
        assert!(matches!(err, StoreError::Open { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_legacy_rows_are_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE readings (val REAL, ts TEXT);
                 INSERT INTO readings VALUES (121.0, '2024-03-01 12:00:00');",
            )
            .unwrap();
        }

        let mut store = SqliteStore::open(&path).unwrap();
        store.initialize().unwrap();
        let id = store.append(99.0, base_time()).unwrap();

        assert_eq!(id, 2);
        let all = store.all().unwrap();
        assert_eq!(all[0].value, 121.0);
        assert_eq!(
            all[0].timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_timestamp_format_is_sortable() {
        let early = format_timestamp(base_time());
        let late = format_timestamp(base_time() + Duration::milliseconds(1500));
        assert_eq!(early, "2024-06-01T12:00:00.000Z");
        assert!(early < late);
        assert!(parse_timestamp(1, "not a time").is_err());
    }
}
