//! Record model and durable fallback storage.
//!
//! This module knows nothing about any particular resource type:
//! - `Record` describes what the sync core needs from an entity
//! - `SnapshotStore` persists one serialized collection per resource key
//! - a corrupt or missing snapshot reads back as absent, never as an error

mod storage;
mod traits;

pub use storage::{AnyStorage, NoopStorage, SnapshotStore, SqliteStorage, StoredSnapshot};
pub use traits::{CacheSource, Record, RecordId, StatusValue};
