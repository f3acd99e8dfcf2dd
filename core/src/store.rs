//! Async access to the glucose database.
//!
//! The database is opened lazily on first use and the handle is shared for
//! the lifetime of the `Store`. Callers that race on the first access all
//! wait on the same open. Every operation runs on the blocking pool while
//! holding the connection lock, so storage operations never overlap.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{GlucoseError, GlucoseResult};
use crate::models::{Reading, Settings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory,
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::InMemory => f.write_str(":memory:"),
        }
    }
}

pub struct Store {
    location: StoreLocation,
    handle: OnceCell<Arc<Mutex<Database>>>,
    open_attempts: AtomicUsize,
}

impl Store {
    /// A store backed by the file at `path`. Nothing is opened until the
    /// first operation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_location(StoreLocation::File(path.into()))
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_location(StoreLocation::InMemory)
    }

    fn with_location(location: StoreLocation) -> Self {
        Self {
            location,
            handle: OnceCell::new(),
            open_attempts: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Open the database now instead of on first use.
    pub async fn init(&self) -> GlucoseResult<()> {
        self.handle().await.map(|_| ())
    }

    async fn handle(&self) -> GlucoseResult<Arc<Mutex<Database>>> {
        let handle = self.handle.get_or_try_init(|| self.open()).await?;
        Ok(Arc::clone(handle))
    }

    async fn open(&self) -> GlucoseResult<Arc<Mutex<Database>>> {
        let attempt = self.open_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let location = self.location.clone();
        let unavailable = |reason: String| GlucoseError::StorageUnavailable {
            location: self.location.to_string(),
            reason,
        };

        let opened = tokio::task::spawn_blocking(move || match &location {
            StoreLocation::File(path) => Database::open(path),
            StoreLocation::InMemory => Database::open_in_memory(),
        })
        .await
        .map_err(|e| unavailable(e.to_string()))?;

        match opened {
            Ok(db) => {
                info!(location = %self.location, attempt, "opened glucose store");
                Ok(Arc::new(Mutex::new(db)))
            }
            Err(err) => {
                warn!(
                    location = %self.location,
                    attempt,
                    error = %format!("{err:#}"),
                    "failed to open glucose store"
                );
                Err(unavailable(format!("{err:#}")))
            }
        }
    }

    async fn with_db<T, F>(&self, op: F) -> GlucoseResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.handle().await?;
        let result = tokio::task::spawn_blocking(move || {
            let db = handle.lock().unwrap_or_else(PoisonError::into_inner);
            op(&db)
        })
        .await?;
        Ok(result?)
    }

    // --- Readings ---

    /// Insert a reading, or overwrite the one with the same id.
    pub async fn add_or_replace(&self, reading: &Reading) -> GlucoseResult<()> {
        let reading = reading.clone();
        self.with_db(move |db| db.put_reading(&reading)).await
    }

    pub async fn get_reading(&self, id: &str) -> GlucoseResult<Option<Reading>> {
        let id = id.to_string();
        self.with_db(move |db| db.get_reading(&id)).await
    }

    /// Every reading, oldest first.
    pub async fn list_readings_by_date(&self) -> GlucoseResult<Vec<Reading>> {
        self.with_db(Database::list_readings_by_date).await
    }

    /// Delete a reading and its image. Unknown ids are not an error; the
    /// return value says whether anything was removed.
    pub async fn delete_reading(&self, id: &str) -> GlucoseResult<bool> {
        let owned = id.to_string();
        let removed = self.with_db(move |db| db.delete_reading(&owned)).await?;
        if !removed {
            debug!(id, "delete of unknown reading ignored");
        }
        Ok(removed)
    }

    // --- Settings ---

    pub async fn get_settings(&self) -> GlucoseResult<Settings> {
        self.with_db(Database::get_settings).await
    }

    /// Replace the settings record wholesale.
    pub async fn put_settings(&self, settings: &Settings) -> GlucoseResult<()> {
        let settings = settings.clone();
        self.with_db(move |db| db.put_settings(&settings)).await
    }

    /// Read-modify-write of the settings record as one storage operation.
    pub async fn modify_settings<F>(&self, update: F) -> GlucoseResult<Settings>
    where
        F: FnOnce(Settings) -> Settings + Send + 'static,
    {
        self.with_db(move |db| db.update_settings(update)).await
    }

    #[cfg(test)]
    fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }
}
