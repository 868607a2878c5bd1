//! Typed failures the sync core branches on.
//!
//! Everything else in the application reports through `color_eyre::Result`.

use std::time::Duration;
use thiserror::Error;

use crate::cache::RecordId;

/// A backend call that did not produce the value it promised.
///
/// Network errors, timeouts, non-success statuses and undecodable bodies all
/// land here. None of them are fatal: the read path falls back to the stored
/// snapshot and the write path reverts the optimistic change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteFailure {
  #[error("network error: {0}")]
  Network(String),

  #[error("request timed out after {}s", .0.as_secs_f32())]
  Timeout(Duration),

  #[error("backend responded with status {status}: {body}")]
  Status { status: u16, body: String },

  #[error("malformed response body: {0}")]
  Malformed(String),
}

impl RemoteFailure {
  /// Map a reqwest transport error, treating its timeout as ours.
  pub fn from_transport(err: reqwest::Error, limit: Duration) -> Self {
    if err.is_timeout() {
      RemoteFailure::Timeout(limit)
    } else {
      RemoteFailure::Network(err.to_string())
    }
  }
}

/// A mutation rejected before anything was applied or sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
  #[error("{0} is required")]
  MissingField(&'static str),

  #[error("{field}: {reason}")]
  InvalidField { field: &'static str, reason: String },

  #[error("record {0} is not in the list")]
  UnknownRecord(RecordId),

  #[error("record {0} is still being created")]
  PendingCreate(RecordId),

  #[error("another record already uses {0}")]
  DuplicateKey(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_failure_messages() {
    let timeout = RemoteFailure::Timeout(Duration::from_secs(10));
    assert_eq!(timeout.to_string(), "request timed out after 10s");

    let status = RemoteFailure::Status {
      status: 503,
      body: "maintenance".to_string(),
    };
    assert_eq!(
      status.to_string(),
      "backend responded with status 503: maintenance"
    );

    let pending = ValidationFailure::PendingCreate(RecordId::Temporary(4));
    assert_eq!(pending.to_string(), "record tmp-4 is still being created");
  }
}
