//! Fallback snapshot storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

use super::traits::Record;

/// A snapshot loaded back from storage.
#[derive(Debug, Clone)]
pub struct StoredSnapshot<T> {
  /// The records in the order they were saved
  pub records: Vec<T>,
  /// When the snapshot was written
  pub saved_at: DateTime<Utc>,
}

/// Trait for fallback snapshot backends.
///
/// One snapshot per key; saving overwrites. Loading never fails: a missing,
/// unreadable or unparseable snapshot is reported as `None`.
pub trait SnapshotStore: Send + Sync {
  /// Persist a snapshot, replacing any previous one for `key`.
  fn save<T: Record>(&self, key: &str, records: &[T]) -> Result<()>;

  /// Load the last snapshot saved for `key`.
  fn load<T: Record>(&self, key: &str) -> Option<StoredSnapshot<T>>;
}

/// Storage implementation that doesn't persist anything.
/// Used when caching is disabled - every load misses.
pub struct NoopStorage;

impl SnapshotStore for NoopStorage {
  fn save<T: Record>(&self, _key: &str, _records: &[T]) -> Result<()> {
    Ok(()) // Discard
  }

  fn load<T: Record>(&self, _key: &str) -> Option<StoredSnapshot<T>> {
    None // Always miss
  }
}

/// SQLite-based snapshot storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the snapshot database, at `path` or the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SNAPSHOT_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("adminsync").join("cache.db"))
  }

  fn conn(&self) -> MutexGuard<'_, Connection> {
    // A panic mid-statement leaves the connection itself usable
    self.conn.lock().unwrap_or_else(PoisonError::into_inner)
  }

  #[cfg(test)]
  pub(crate) fn put_raw(&self, key: &str, data: &[u8]) {
    self
      .conn()
      .execute(
        "INSERT OR REPLACE INTO fallback_snapshot (resource_key, resource, data, record_count, saved_at)
         VALUES (?, 'raw', ?, 0, datetime('now'))",
        params![key, data],
      )
      .expect("raw insert");
  }
}

/// Schema for the snapshot table.
const SNAPSHOT_SCHEMA: &str = r#"
-- One serialized collection per resource key
CREATE TABLE IF NOT EXISTS fallback_snapshot (
    resource_key TEXT PRIMARY KEY,
    resource TEXT NOT NULL,
    data BLOB NOT NULL,
    record_count INTEGER NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SnapshotStore for SqliteStorage {
  fn save<T: Record>(&self, key: &str, records: &[T]) -> Result<()> {
    let data =
      serde_json::to_vec(records).map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;

    // Single-row replace: readers see the old snapshot or the new one
    self
      .conn()
      .execute(
        "INSERT OR REPLACE INTO fallback_snapshot (resource_key, resource, data, record_count, saved_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![key, T::resource_name(), data, records.len()],
      )
      .map_err(|e| eyre!("Failed to store snapshot {}: {}", key, e))?;

    Ok(())
  }

  fn load<T: Record>(&self, key: &str) -> Option<StoredSnapshot<T>> {
    let row: Option<(Vec<u8>, String)> = match self
      .conn()
      .query_row(
        "SELECT data, saved_at FROM fallback_snapshot WHERE resource_key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
    {
      Ok(row) => row,
      Err(e) => {
        warn!(key, error = %e, "failed to read fallback snapshot");
        return None;
      }
    };

    let (data, saved_at) = row?;

    let records = match serde_json::from_slice::<Vec<T>>(&data) {
      Ok(records) => records,
      Err(e) => {
        warn!(key, error = %e, "fallback snapshot is corrupt, ignoring it");
        return None;
      }
    };

    let saved_at = parse_datetime(&saved_at).unwrap_or_else(|e| {
      warn!(key, error = %e, "unreadable snapshot timestamp");
      DateTime::<Utc>::MIN_UTC
    });

    Some(StoredSnapshot { records, saved_at })
  }
}

/// Snapshot storage selected at startup.
pub enum AnyStorage {
  Sqlite(SqliteStorage),
  Noop(NoopStorage),
}

impl SnapshotStore for AnyStorage {
  fn save<T: Record>(&self, key: &str, records: &[T]) -> Result<()> {
    match self {
      AnyStorage::Sqlite(s) => s.save(key, records),
      AnyStorage::Noop(s) => s.save(key, records),
    }
  }

  fn load<T: Record>(&self, key: &str) -> Option<StoredSnapshot<T>> {
    match self {
      AnyStorage::Sqlite(s) => s.load(key),
      AnyStorage::Noop(s) => s.load(key),
    }
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
