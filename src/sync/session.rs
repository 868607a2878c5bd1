use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::{Record, SnapshotStore};
use crate::error::ValidationFailure;
use crate::remote::ResourceClient;

use super::collection::CollectionCache;
use super::mutation::{MutationCoordinator, MutationHandle};
use super::notify::Notifier;
use super::projection::{project, FilterState, Page, SharedFilter};
use super::scheduler::RefreshScheduler;
use super::state::{CacheSnapshot, Intent};

/// Everything one list screen needs to stay in sync with its resource.
///
/// The refresh scheduler only runs while the session is active.
pub struct ScreenSession<T: Record, S> {
  cache: CollectionCache<T, S>,
  coordinator: MutationCoordinator<T, S>,
  filter: SharedFilter<T::Status>,
  interval: Duration,
  scheduler: Option<RefreshScheduler>,
}

impl<T: Record, S: SnapshotStore + 'static> ScreenSession<T, S> {
  pub fn new(
    key: impl Into<String>,
    client: Arc<dyn ResourceClient<T>>,
    store: Arc<S>,
    notifier: Notifier,
    interval: Duration,
    page_size: usize,
  ) -> Self {
    let cache = CollectionCache::new(key, client, store, notifier);
    Self {
      coordinator: MutationCoordinator::new(cache.clone()),
      cache,
      filter: SharedFilter::new(FilterState::new(page_size)),
      interval,
      scheduler: None,
    }
  }

  /// Start the scheduler, which refreshes immediately. No-op if active.
  pub fn activate(&mut self) {
    if self.scheduler.is_some() {
      return;
    }
    info!(resource = T::resource_name(), "screen activated");
    self.scheduler = Some(RefreshScheduler::start(
      self.cache.clone(),
      self.filter.clone(),
      self.interval,
    ));
  }

  pub fn deactivate(&mut self) {
    if self.scheduler.take().is_some() {
      info!(resource = T::resource_name(), "screen deactivated");
    }
  }

  pub fn is_active(&self) -> bool {
    self.scheduler.is_some()
  }

  /// Ask for a refresh now; ignored while inactive.
  pub fn refresh_now(&self) {
    if let Some(scheduler) = &self.scheduler {
      scheduler.refresh_now();
    }
  }

  pub fn apply(&self, intent: Intent<T>) -> Result<MutationHandle, ValidationFailure> {
    self.coordinator.apply(intent)
  }

  pub fn snapshot(&self) -> CacheSnapshot<T> {
    self.cache.current()
  }

  pub fn filter(&self) -> FilterState<T::Status> {
    self.filter.get()
  }

  pub fn update_filter(&self, f: impl FnOnce(&mut FilterState<T::Status>)) {
    self.filter.update(f);
  }

  /// Cache state and the visible page, projected with the current filter.
  pub fn view(&self) -> SessionView<T> {
    SessionView {
      snapshot: self.cache.current(),
      filter: self.filter.get(),
    }
  }
}

/// Owned data behind one rendered frame.
pub struct SessionView<T: Record> {
  pub snapshot: CacheSnapshot<T>,
  pub filter: FilterState<T::Status>,
}

impl<T: Record> SessionView<T> {
  pub fn page(&self) -> Page<'_, T> {
    project(&self.snapshot.records, &self.filter)
  }
}
