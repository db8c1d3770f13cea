//! Database connection and query operations.

use crate::{migrations, DatabaseError, DatabaseResult, PendingPoint, RegisteredStream, StoredConfig};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Database wrapper with query methods.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, running migrations if needed.
    pub fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL keeps committed inserts durable while a sync cycle reads
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        migrations::run_migrations(&conn)?;
        debug!(path = %path.display(), "Opened logger database");

        Ok(Self { conn })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA temp_store = MEMORY;")?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Close the connection, surfacing any error SQLite reports.
    pub fn close(self) -> DatabaseResult<()> {
        self.conn.close().map_err(|(_, e)| DatabaseError::Sqlite(e))
    }

    // ==========================================
    // Pending points
    // ==========================================

    /// Append one pending point.
    pub fn insert_pending_point(&self, point: &PendingPoint) -> DatabaseResult<()> {
        self.conn.execute(
            "INSERT INTO pending_points (stream, timestamp, payload) VALUES (?1, ?2, ?3)",
            params![point.stream, point.timestamp, point.payload],
        )?;
        Ok(())
    }

    /// Append several pending points in one transaction.
    pub fn insert_pending_points(&self, points: &[PendingPoint]) -> DatabaseResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO pending_points (stream, timestamp, payload) VALUES (?1, ?2, ?3)",
            )?;
            for point in points {
                stmt.execute(params![point.stream, point.timestamp, point.payload])?;
            }
        }
        tx.commit()?;
        Ok(points.len())
    }

    /// All pending points of a stream, oldest first.
    pub fn pending_points_for_stream(&self, stream: &str) -> DatabaseResult<Vec<PendingPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT stream, timestamp, payload FROM pending_points
             WHERE stream = ?1
             ORDER BY timestamp ASC, rowid ASC",
        )?;

        let points = stmt
            .query_map(params![stream], |row| {
                Ok(PendingPoint {
                    stream: row.get(0)?,
                    timestamp: row.get(1)?,
                    payload: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(points)
    }

    /// Delete every pending point of a stream stamped at or before `timestamp`.
    ///
    /// Returns the number of rows removed.
    pub fn delete_pending_points_through(&self, stream: &str, timestamp: f64) -> DatabaseResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM pending_points WHERE stream = ?1 AND timestamp <= ?2",
            params![stream, timestamp],
        )?;
        Ok(deleted)
    }

    /// Total number of pending points across all streams.
    pub fn count_pending_points(&self) -> DatabaseResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pending_points", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Number of pending points for one stream.
    pub fn count_pending_points_for_stream(&self, stream: &str) -> DatabaseResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pending_points WHERE stream = ?1",
            params![stream],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Newest timestamp in the buffer, if any.
    pub fn latest_pending_timestamp(&self) -> DatabaseResult<Option<f64>> {
        let latest: Option<f64> =
            self.conn
                .query_row("SELECT MAX(timestamp) FROM pending_points", [], |row| row.get(0))?;
        Ok(latest)
    }

    // ==========================================
    // Streams
    // ==========================================

    /// Insert a stream or replace the schema of an existing one.
    ///
    /// An existing row keeps its position in registration order.
    pub fn upsert_stream(&self, stream: &RegisteredStream) -> DatabaseResult<()> {
        let schema = stream.schema.as_ref().map(serde_json::to_string).transpose()?;
        self.conn.execute(
            "INSERT INTO streams (name, schema, registered_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET schema = excluded.schema",
            params![stream.name, schema, stream.registered_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// All registered streams in registration order.
    pub fn list_streams(&self) -> DatabaseResult<Vec<RegisteredStream>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, schema, registered_at FROM streams ORDER BY rowid ASC")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(name, schema, registered_at)| -> DatabaseResult<RegisteredStream> {
                let schema = match schema {
                    Some(text) => match serde_json::from_str::<Value>(&text)? {
                        Value::Null => None,
                        value => Some(value),
                    },
                    None => None,
                };
                Ok(RegisteredStream {
                    name,
                    schema,
                    registered_at: parse_datetime(registered_at),
                })
            })
            .collect()
    }

    // ==========================================
    // Configuration
    // ==========================================

    /// Insert `defaults` as the configuration row if none exists yet.
    ///
    /// Returns `true` when the row was created by this call.
    pub fn ensure_config(&self, defaults: &StoredConfig) -> DatabaseResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO logger_config
                (id, credential, endpoint_url, last_sync_time, sync_period, user_data)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![
                defaults.credential,
                defaults.endpoint_url,
                defaults.last_sync_time,
                defaults.sync_period,
                serde_json::to_string(&defaults.user_data)?,
            ],
        )?;
        if inserted == 1 {
            debug!("Created logger configuration row");
        }
        Ok(inserted == 1)
    }

    /// Read the configuration row.
    pub fn get_config(&self) -> DatabaseResult<StoredConfig> {
        let row = self
            .conn
            .query_row(
                "SELECT credential, endpoint_url, last_sync_time, sync_period, user_data
                 FROM logger_config WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let (credential, endpoint_url, last_sync_time, sync_period, user_data) =
            row.ok_or_else(|| DatabaseError::NotFound("logger configuration row".to_string()))?;

        Ok(StoredConfig {
            credential,
            endpoint_url,
            last_sync_time,
            sync_period,
            user_data: serde_json::from_str(&user_data)?,
        })
    }

    pub fn set_credential(&self, credential: &str) -> DatabaseResult<()> {
        self.update_config("UPDATE logger_config SET credential = ?1 WHERE id = 1", params![credential])
    }

    pub fn set_endpoint_url(&self, url: &str) -> DatabaseResult<()> {
        self.update_config("UPDATE logger_config SET endpoint_url = ?1 WHERE id = 1", params![url])
    }

    pub fn set_last_sync_time(&self, timestamp: f64) -> DatabaseResult<()> {
        self.update_config(
            "UPDATE logger_config SET last_sync_time = ?1 WHERE id = 1",
            params![timestamp],
        )
    }

    pub fn set_sync_period(&self, seconds: f64) -> DatabaseResult<()> {
        self.update_config("UPDATE logger_config SET sync_period = ?1 WHERE id = 1", params![seconds])
    }

    pub fn set_user_data(&self, data: &Value) -> DatabaseResult<()> {
        let text = serde_json::to_string(data)?;
        self.update_config("UPDATE logger_config SET user_data = ?1 WHERE id = 1", params![text])
    }

    fn update_config(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> DatabaseResult<()> {
        let updated = self.conn.execute(sql, params)?;
        if updated == 0 {
            return Err(DatabaseError::NotFound("logger configuration row".to_string()));
        }
        Ok(())
    }
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn create_test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.ensure_config(&StoredConfig::with_endpoint_url("https://example.com"))
            .unwrap();
        db
    }

    fn point(stream: &str, timestamp: f64, payload: &str) -> PendingPoint {
        PendingPoint {
            stream: stream.to_string(),
            timestamp,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn pending_points_are_returned_oldest_first() {
        let db = create_test_db();
        db.insert_pending_point(&point("temp", 3.0, "3")).unwrap();
        db.insert_pending_point(&point("temp", 1.0, "1")).unwrap();
        db.insert_pending_point(&point("humidity", 0.5, "50")).unwrap();
        db.insert_pending_point(&point("temp", 2.0, "2")).unwrap();

        let points = db.pending_points_for_stream("temp").unwrap();
        let stamps: Vec<f64> = points.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![1.0, 2.0, 3.0]);
        assert!(points.iter().all(|p| p.stream == "temp"));
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let db = create_test_db();
        db.insert_pending_point(&point("temp", 1.0, "\"first\"")).unwrap();
        db.insert_pending_point(&point("temp", 1.0, "\"second\"")).unwrap();

        let points = db.pending_points_for_stream("temp").unwrap();
        assert_eq!(points[0].payload, "\"first\"");
        assert_eq!(points[1].payload, "\"second\"");
    }

    #[test]
    fn delete_through_keeps_newer_points_and_other_streams() {
        let db = create_test_db();
        db.insert_pending_points(&[
            point("temp", 1.0, "1"),
            point("temp", 2.0, "2"),
            point("temp", 3.0, "3"),
            point("humidity", 1.0, "40"),
        ])
        .unwrap();

        let deleted = db.delete_pending_points_through("temp", 2.0).unwrap();
        assert_eq!(deleted, 2);

        let remaining = db.pending_points_for_stream("temp").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].timestamp, 3.0);
        assert_eq!(db.count_pending_points_for_stream("humidity").unwrap(), 1);
        assert_eq!(db.count_pending_points().unwrap(), 2);
    }

    #[test]
    fn latest_pending_timestamp_tracks_buffer() {
        let db = create_test_db();
        assert_eq!(db.latest_pending_timestamp().unwrap(), None);

        db.insert_pending_point(&point("temp", 5.0, "1")).unwrap();
        db.insert_pending_point(&point("other", 7.5, "1")).unwrap();
        assert_eq!(db.latest_pending_timestamp().unwrap(), Some(7.5));
    }

    #[test]
    fn upsert_stream_overwrites_schema_in_place() {
        let db = create_test_db();
        db.upsert_stream(&RegisteredStream::new("a", Some(json!({"type": "number"}))))
            .unwrap();
        db.upsert_stream(&RegisteredStream::new("b", None)).unwrap();
        db.upsert_stream(&RegisteredStream::new("a", Some(json!({"type": "string"}))))
            .unwrap();

        let streams = db.list_streams().unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].name, "a");
        assert_eq!(streams[0].schema, Some(json!({"type": "string"})));
        assert_eq!(streams[1].name, "b");
        assert_eq!(streams[1].schema, None);
    }

    #[test]
    fn ensure_config_creates_row_once() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_config(), Err(DatabaseError::NotFound(_))));

        let defaults = StoredConfig::with_endpoint_url("https://example.com");
        assert!(db.ensure_config(&defaults).unwrap());
        assert!(!db.ensure_config(&defaults).unwrap());

        let config = db.get_config().unwrap();
        assert_eq!(config, defaults);
        assert_eq!(config.credential, "");
        assert_eq!(config.sync_period, 600.0);
        assert_eq!(config.last_sync_time, 0.0);
        assert_eq!(config.user_data, json!({}));
    }

    #[test]
    fn config_updates_are_written_through() {
        let db = create_test_db();
        db.set_credential("secret").unwrap();
        db.set_endpoint_url("https://other.example.com").unwrap();
        db.set_last_sync_time(1234.5).unwrap();
        db.set_sync_period(30.0).unwrap();
        db.set_user_data(&json!({"hi": 56})).unwrap();

        let config = db.get_config().unwrap();
        assert_eq!(config.credential, "secret");
        assert_eq!(config.endpoint_url, "https://other.example.com");
        assert_eq!(config.last_sync_time, 1234.5);
        assert_eq!(config.sync_period, 30.0);
        assert_eq!(config.user_data, json!({"hi": 56}));
    }

    #[test]
    fn config_update_without_row_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.set_credential("secret").unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("logger.sqlite");

        {
            let db = Database::open(&path).unwrap();
            db.ensure_config(&StoredConfig::with_endpoint_url("https://example.com"))
                .unwrap();
            db.set_credential("persisted").unwrap();
            db.upsert_stream(&RegisteredStream::new("temp", None)).unwrap();
            db.insert_pending_point(&point("temp", 1.0, "1")).unwrap();
            db.close().unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_config().unwrap().credential, "persisted");
        assert_eq!(db.list_streams().unwrap().len(), 1);
        assert_eq!(db.count_pending_points().unwrap(), 1);
    }
}
