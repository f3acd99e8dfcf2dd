use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql, params};
use tracing::debug;

use crate::models::{Reading, ReadingContext, ReadingImage, SETTINGS_KEY, Settings};

/// Highest schema version `migrate` knows how to reach.
pub const SCHEMA_VERSION: i64 = 2;

pub struct Database {
    conn: Connection,
}

impl ToSql for ReadingContext {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ReadingContext {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()
            .with_context(|| format!("Failed to migrate database: {}", path.display()))?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version = self.schema_version()?;
        if version < SCHEMA_VERSION {
            debug!(from = version, to = SCHEMA_VERSION, "upgrading schema");
        }

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS readings (
                    id TEXT PRIMARY KEY NOT NULL,
                    value REAL NOT NULL,
                    timestamp INTEGER NOT NULL,
                    context TEXT NOT NULL,
                    notes TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_readings_timestamp ON readings(timestamp);

                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS reading_images (
                    reading_id TEXT PRIMARY KEY NOT NULL
                        REFERENCES readings(id) ON DELETE CASCADE,
                    data BLOB NOT NULL
                );

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    // Expects columns:
    // 0: r.id, 1: r.value, 2: r.timestamp, 3: r.context, 4: r.notes
    fn reading_from_row(row: &rusqlite::Row, image: ReadingImage) -> rusqlite::Result<Reading> {
        Ok(Reading {
            id: row.get(0)?,
            value: row.get(1)?,
            timestamp: row.get(2)?,
            context: row.get(3)?,
            notes: row.get(4)?,
            image,
        })
    }

    // Column 5: i.data
    fn loaded_reading_from_row(row: &rusqlite::Row) -> rusqlite::Result<Reading> {
        let data: Option<Vec<u8>> = row.get(5)?;
        Self::reading_from_row(row, data.into())
    }

    // Column 5: whether an image row exists
    fn listed_reading_from_row(row: &rusqlite::Row) -> rusqlite::Result<Reading> {
        let stored: bool = row.get(5)?;
        let image = if stored {
            ReadingImage::Stored
        } else {
            ReadingImage::None
        };
        Self::reading_from_row(row, image)
    }

    // --- Readings ---

    /// Insert or overwrite a reading by id. A loaded image replaces the
    /// stored one, `ReadingImage::None` drops it and `Stored` leaves it.
    pub fn put_reading(&self, reading: &Reading) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO readings (id, value, timestamp, context, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                value = excluded.value,
                timestamp = excluded.timestamp,
                context = excluded.context,
                notes = excluded.notes",
            params![
                reading.id,
                reading.value,
                reading.timestamp,
                reading.context,
                reading.notes
            ],
        )?;
        match &reading.image {
            ReadingImage::Loaded(data) => {
                tx.execute(
                    "INSERT INTO reading_images (reading_id, data) VALUES (?1, ?2)
                     ON CONFLICT(reading_id) DO UPDATE SET data = excluded.data",
                    params![reading.id, data],
                )?;
            }
            ReadingImage::None => {
                tx.execute(
                    "DELETE FROM reading_images WHERE reading_id = ?1",
                    params![reading.id],
                )?;
            }
            ReadingImage::Stored => {}
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_reading(&self, id: &str) -> Result<Option<Reading>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.value, r.timestamp, r.context, r.notes, i.data
             FROM readings r
             LEFT JOIN reading_images i ON i.reading_id = r.id
             WHERE r.id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::loaded_reading_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// All readings, oldest first. Readings sharing a timestamp are ordered
    /// by id. Photos are reported as `ReadingImage::Stored`, not loaded.
    pub fn list_readings_by_date(&self) -> Result<Vec<Reading>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.value, r.timestamp, r.context, r.notes,
                    i.reading_id IS NOT NULL
             FROM readings r
             LEFT JOIN reading_images i ON i.reading_id = r.id
             ORDER BY r.timestamp, r.id",
        )?;
        let readings = stmt
            .query_map([], Self::listed_reading_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(readings)
    }

    /// Remove a reading and its image. Returns whether a reading existed.
    pub fn delete_reading(&self, id: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM reading_images WHERE reading_id = ?1",
            params![id],
        )?;
        let rows = tx.execute("DELETE FROM readings WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    // --- Settings ---

    fn read_settings(conn: &Connection) -> Result<Option<Settings>> {
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![SETTINGS_KEY])?;
        if let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            let settings = serde_json::from_str(&raw).context("Corrupt settings record")?;
            Ok(Some(settings))
        } else {
            Ok(None)
        }
    }

    fn write_settings(conn: &Connection, settings: &Settings) -> Result<()> {
        let value = serde_json::to_string(settings)?;
        let now = Local::now().to_rfc3339();
        conn.execute(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![SETTINGS_KEY, value, now],
        )?;
        Ok(())
    }

    /// The stored settings, or the defaults when none were ever written.
    pub fn get_settings(&self) -> Result<Settings> {
        Ok(Self::read_settings(&self.conn)?.unwrap_or_default())
    }

    pub fn put_settings(&self, settings: &Settings) -> Result<()> {
        Self::write_settings(&self.conn, settings)
    }

    /// Read, transform and write back the settings inside one transaction.
    pub fn update_settings<F>(&self, update: F) -> Result<Settings>
    where
        F: FnOnce(Settings) -> Settings,
    {
        let tx = self.conn.unchecked_transaction()?;
        let current = Self::read_settings(&tx)?.unwrap_or_default();
        let updated = update(current);
        Self::write_settings(&tx, &updated)?;
        tx.commit()?;
        Ok(updated)
    }
}
