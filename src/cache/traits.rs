//! Core traits and types for cached records.

use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::ValidationFailure;

const TEMPORARY_PREFIX: &str = "tmp-";

/// Identifier of a record within its resource type.
///
/// Server ids are numbers or opaque strings on the wire. Records created
/// locally carry a temporary id (`"tmp-<n>"` on the wire) until the backend
/// confirms them. Temporary ids come from a per-cache counter and are not
/// stable across restarts.
///
/// Ordering: numeric ids by value, then string ids lexically, then every
/// temporary id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordId {
  Server(u64),
  /// Non-numeric server id, e.g. an ObjectId or a code like `STF001`
  Key(String),
  Temporary(u64),
}

impl RecordId {
  pub fn is_temporary(&self) -> bool {
    matches!(self, RecordId::Temporary(_))
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RecordId::Server(id) => write!(f, "{}", id),
      RecordId::Key(key) => f.write_str(key),
      RecordId::Temporary(n) => write!(f, "{}{}", TEMPORARY_PREFIX, n),
    }
  }
}

impl Serialize for RecordId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      RecordId::Server(id) => serializer.serialize_u64(*id),
      RecordId::Key(key) => serializer.serialize_str(key),
      RecordId::Temporary(_) => serializer.serialize_str(&self.to_string()),
    }
  }
}

impl<'de> Deserialize<'de> for RecordId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Number(u64),
      Text(String),
    }

    match Raw::deserialize(deserializer)? {
      Raw::Number(id) => Ok(RecordId::Server(id)),
      Raw::Text(text) => {
        if let Some(n) = text.strip_prefix(TEMPORARY_PREFIX) {
          n.parse()
            .map(RecordId::Temporary)
            .map_err(|_| de::Error::custom(format!("invalid temporary id '{}'", text)))
        } else if text.is_empty() {
          Err(de::Error::custom("empty record id"))
        } else {
          // Some backends quote numeric ids
          Ok(text.parse().map(RecordId::Server).unwrap_or(RecordId::Key(text)))
        }
      }
    }
  }
}

/// A status enumeration a record can be filtered by.
pub trait StatusValue: Copy + Eq + fmt::Debug + Send + Sync + 'static {
  /// Human readable label (also used in CSV output and filenames)
  fn label(&self) -> &'static str;

  /// Every variant, in display order
  fn all_variants() -> &'static [Self];
}

/// A record of one remote resource type that can be cached and synchronized.
pub trait Record:
  Clone + fmt::Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
  type Status: StatusValue;

  /// Resource name, used both as the URL path segment and the snapshot key prefix
  fn resource_name() -> &'static str;

  fn id(&self) -> &RecordId;

  fn set_id(&mut self, id: RecordId);

  fn status(&self) -> Self::Status;

  fn created_at(&self) -> DateTime<Utc>;

  /// Fields matched by the free-text search
  fn search_fields(&self) -> Vec<&str>;

  /// Domain key that must stay unique besides the id.
  ///
  /// When a create collides with an existing record's natural key, the
  /// existing record is replaced rather than duplicated.
  fn natural_key(&self) -> Option<String> {
    None
  }

  /// Check required fields before any mutation is applied.
  fn validate(&self) -> Result<(), ValidationFailure> {
    Ok(())
  }
}

/// Where the visible collection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Nothing loaded yet
  Empty,
  /// Most recent successful fetch
  Network,
  /// Stored snapshot, served because the fetch failed
  Fallback,
}
