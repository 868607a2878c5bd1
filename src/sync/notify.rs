use std::fmt;

use tokio::sync::mpsc;

use crate::cache::RecordId;
use crate::error::{RemoteFailure, ValidationFailure};

use super::state::IntentKind;

/// User-facing events raised by caches and coordinators.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
  /// Fetch failed and a stored snapshot is shown instead
  UsingCachedData { resource: &'static str },
  /// Fetch failed and nothing was stored
  NoDataAvailable { resource: &'static str },
  /// Background refresh failed while data was already on screen
  RefreshFailed {
    resource: &'static str,
    reason: RemoteFailure,
  },
  MutationConfirmed {
    resource: &'static str,
    kind: IntentKind,
    id: RecordId,
  },
  MutationReverted {
    resource: &'static str,
    kind: IntentKind,
    reason: RemoteFailure,
  },
  ValidationRejected {
    resource: &'static str,
    reason: ValidationFailure,
  },
}

impl Notification {
  /// Failures are shown in the error style.
  pub fn is_error(&self) -> bool {
    !matches!(self, Notification::MutationConfirmed { .. })
  }
}

impl fmt::Display for Notification {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Notification::UsingCachedData { resource } => {
        write!(f, "Backend unreachable, showing cached {}", resource)
      }
      Notification::NoDataAvailable { resource } => {
        write!(f, "Backend unreachable and no cached {} available", resource)
      }
      Notification::RefreshFailed { resource, reason } => {
        write!(f, "Failed to refresh {}: {}", resource, reason)
      }
      Notification::MutationConfirmed { resource, kind, id } => {
        write!(f, "Saved {} {} ({})", resource, id, kind.label())
      }
      Notification::MutationReverted {
        resource,
        kind,
        reason,
      } => write!(f, "Failed to {} {}, change undone: {}", kind.label(), resource, reason),
      Notification::ValidationRejected { resource, reason } => {
        write!(f, "Invalid {}: {}", resource, reason)
      }
    }
  }
}

/// Sending half of the notification channel.
///
/// A silent notifier drops everything; a closed receiver is ignored.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
  tx: Option<mpsc::UnboundedSender<Notification>>,
}

impl Notifier {
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx: Some(tx) }, rx)
  }

  pub fn silent() -> Self {
    Self { tx: None }
  }

  pub fn send(&self, notification: Notification) {
    tracing::debug!(%notification, "notify");
    if let Some(tx) = &self.tx {
      let _ = tx.send(notification);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_messages() {
    let n = Notification::MutationReverted {
      resource: "categories",
      kind: IntentKind::Delete,
      reason: RemoteFailure::Status {
        status: 409,
        body: "in use".to_string(),
      },
    };
    assert!(n.to_string().starts_with("Failed to delete categories, change undone"));
    assert!(n.is_error());

    let ok = Notification::MutationConfirmed {
      resource: "roles",
      kind: IntentKind::Create,
      id: RecordId::Server(4),
    };
    assert_eq!(ok.to_string(), "Saved roles 4 (create)");
    assert!(!ok.is_error());
  }

  #[tokio::test]
  async fn test_channel_delivers_and_silent_drops() {
    let (notifier, mut rx) = Notifier::channel();
    notifier.send(Notification::NoDataAvailable { resource: "roles" });
    assert_eq!(
      rx.recv().await,
      Some(Notification::NoDataAvailable { resource: "roles" })
    );

    Notifier::silent().send(Notification::NoDataAvailable { resource: "roles" });
  }
}
