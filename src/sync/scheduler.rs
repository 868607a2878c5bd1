//! Per-screen refresh scheduling.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::cache::{Record, SnapshotStore};

use super::collection::{CollectionCache, RefreshOutcome};
use super::projection::{filtered, total_pages, SharedFilter};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const MIN_INTERVAL: Duration = Duration::from_secs(5);
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Refreshes one cache on activation, on a fixed interval, and on request.
///
/// Owned by the screen that started it. Dropping it stops the timer and
/// cancels any refresh it is running.
pub struct RefreshScheduler {
  trigger: mpsc::UnboundedSender<()>,
  task: JoinHandle<()>,
}

impl RefreshScheduler {
  /// Start refreshing `cache` right away, then every `interval`.
  pub fn start<T: Record, S: SnapshotStore + 'static>(
    cache: CollectionCache<T, S>,
    filter: SharedFilter<T::Status>,
    interval: Duration,
  ) -> Self {
    let interval = interval.clamp(MIN_INTERVAL, MAX_INTERVAL);
    let (trigger, mut requests) = mpsc::unbounded_channel::<()>();

    let task = tokio::spawn(async move {
      // The first tick completes immediately: that is the activation refresh
      let mut ticker = tokio::time::interval(interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

      loop {
        tokio::select! {
          _ = ticker.tick() => {
            debug!(resource = T::resource_name(), "scheduled refresh");
          }
          request = requests.recv() => {
            if request.is_none() {
              break;
            }
            // A manual refresh restarts the interval
            ticker.reset();
            debug!(resource = T::resource_name(), "requested refresh");
          }
        }
        refresh_preserving(&cache, &filter).await;
      }
    });

    Self { trigger, task }
  }

  /// Queue an immediate refresh.
  pub fn refresh_now(&self) {
    let _ = self.trigger.send(());
  }

  pub fn is_running(&self) -> bool {
    !self.task.is_finished()
  }
}

impl Drop for RefreshScheduler {
  fn drop(&mut self) {
    self.task.abort();
  }
}

/// Refresh `cache`, keeping the user's filter state across it.
///
/// The filter is snapshotted first and reapplied afterwards, with the page
/// clamped to the new page count. Edits the user made while the fetch was
/// in flight win over the snapshot.
pub async fn refresh_preserving<T: Record, S: SnapshotStore>(
  cache: &CollectionCache<T, S>,
  filter: &SharedFilter<T::Status>,
) -> RefreshOutcome {
  let (snapshot, revision) = filter.snapshot();
  let outcome = cache.refresh().await;

  let records = cache.current().records;
  filter.restore(snapshot, revision, |state| {
    total_pages(filtered(&records, state).len(), state.page_size)
  });
  outcome
}
