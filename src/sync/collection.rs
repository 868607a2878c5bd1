//! Synchronized collection cache: one per resource type and screen.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::cache::{Record, SnapshotStore};
use crate::error::RemoteFailure;
use crate::remote::ResourceClient;

use super::notify::{Notification, Notifier};
use super::state::{CacheSnapshot, CollectionState};

/// How a call to [`CollectionCache::refresh`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
  /// The fetched list replaced the collection
  Applied,
  /// A newer refresh or a confirmed write superseded this result
  Discarded,
  /// The fetch failed; the best available data stays visible
  Failed(RemoteFailure),
}

struct Shared<T: Record, S> {
  key: String,
  client: Arc<dyn ResourceClient<T>>,
  store: Arc<S>,
  state: Mutex<CollectionState<T>>,
  notifier: Notifier,
}

/// In-memory collection of `T` kept in sync with the backend, with the last
/// good list persisted to a fallback store.
///
/// Cloning is cheap and every clone shares the same state.
pub struct CollectionCache<T: Record, S> {
  shared: Arc<Shared<T, S>>,
}

impl<T: Record, S> Clone for CollectionCache<T, S> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T: Record, S: SnapshotStore> CollectionCache<T, S> {
  pub fn new(
    key: impl Into<String>,
    client: Arc<dyn ResourceClient<T>>,
    store: Arc<S>,
    notifier: Notifier,
  ) -> Self {
    Self {
      shared: Arc::new(Shared {
        key: key.into(),
        client,
        store,
        state: Mutex::new(CollectionState::default()),
        notifier,
      }),
    }
  }

  pub fn key(&self) -> &str {
    &self.shared.key
  }

  pub fn current(&self) -> CacheSnapshot<T> {
    self.lock().snapshot()
  }

  /// Fetch the list from the backend and make it the collection.
  ///
  /// Existing records stay visible while the fetch is in flight. On failure
  /// an already loaded collection is kept; otherwise the stored snapshot
  /// (if any) is shown and marked stale.
  pub async fn refresh(&self) -> RefreshOutcome {
    let seq = self.lock().begin_refresh();
    let _in_flight = InFlight { cache: self };
    debug!(resource = T::resource_name(), seq, "refresh started");

    match self.shared.client.list().await {
      Ok(records) => {
        let count = records.len();
        let applied = self.transition(|state| state.apply_fetch(seq, records).then_some(()));
        if applied.is_some() {
          info!(resource = T::resource_name(), seq, count, "refresh applied");
          RefreshOutcome::Applied
        } else {
          debug!(resource = T::resource_name(), seq, "discarded superseded refresh result");
          RefreshOutcome::Discarded
        }
      }
      Err(failure) => {
        warn!(resource = T::resource_name(), seq, error = %failure, "refresh failed");
        self.degrade(&failure);
        RefreshOutcome::Failed(failure)
      }
    }
  }

  fn degrade(&self, failure: &RemoteFailure) {
    let resource = T::resource_name();
    let mut state = self.lock();

    if state.is_loaded() {
      self.shared.notifier.send(Notification::RefreshFailed {
        resource,
        reason: failure.clone(),
      });
      return;
    }

    let snapshot = self.shared.store.load::<T>(&self.shared.key);
    let notification = if snapshot.is_some() {
      info!(resource, key = %self.shared.key, "serving fallback snapshot");
      Notification::UsingCachedData { resource }
    } else {
      Notification::NoDataAvailable { resource }
    };
    state.apply_fallback(snapshot);
    drop(state);

    self.shared.notifier.send(notification);
  }

  /// Run `f` under the state lock; when it yields `Some`, the resulting
  /// collection is written to the fallback store before the lock is released.
  pub(crate) fn transition<R>(&self, f: impl FnOnce(&mut CollectionState<T>) -> Option<R>) -> Option<R> {
    let mut state = self.lock();
    let result = f(&mut state)?;
    self.persist(&state);
    Some(result)
  }

  /// [`transition`](Self::transition) for fallible steps; persists on `Ok`.
  pub(crate) fn try_transition<R, E>(
    &self,
    f: impl FnOnce(&mut CollectionState<T>) -> Result<R, E>,
  ) -> Result<R, E> {
    let mut state = self.lock();
    let result = f(&mut state)?;
    self.persist(&state);
    Ok(result)
  }

  pub(crate) fn client(&self) -> &Arc<dyn ResourceClient<T>> {
    &self.shared.client
  }

  pub(crate) fn notifier(&self) -> &Notifier {
    &self.shared.notifier
  }

  fn persist(&self, state: &CollectionState<T>) {
    // The store is only a fallback; a failed write never blocks the screen
    if let Err(e) = self.shared.store.save(&self.shared.key, state.records()) {
      warn!(key = %self.shared.key, "Failed to save fallback snapshot: {}", e);
    }
  }

  fn lock(&self) -> MutexGuard<'_, CollectionState<T>> {
    self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Marks a refresh as finished when dropped, including when the refresh
/// future is cancelled mid-fetch.
struct InFlight<'a, T: Record, S: SnapshotStore> {
  cache: &'a CollectionCache<T, S>,
}

impl<T: Record, S: SnapshotStore> Drop for InFlight<'_, T, S> {
  fn drop(&mut self) {
    self.cache.lock().end_refresh();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, NoopStorage, RecordId, SqliteStorage};
  use crate::remote::types::{ActiveStatus, Category};
  use crate::sync::testing::{wait_until, ScriptedClient};

  const KEY: &str = "categories:test";

  fn category(id: u64, name: &str) -> Category {
    Category {
      id: RecordId::Server(id),
      name: name.to_string(),
      description: String::new(),
      status: ActiveStatus::Active,
      created_at: "2024-03-01T09:00:00Z".parse().unwrap(),
    }
  }

  fn names(snapshot: &CacheSnapshot<Category>) -> Vec<String> {
    snapshot.records.iter().map(|r| r.name.clone()).collect()
  }

  fn setup(
    list: Vec<Category>,
  ) -> (
    CollectionCache<Category, SqliteStorage>,
    Arc<ScriptedClient<Category>>,
    Arc<SqliteStorage>,
  ) {
    let client = Arc::new(ScriptedClient::new(list));
    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let cache = CollectionCache::new(KEY, client.clone() as Arc<dyn ResourceClient<Category>>, store.clone(), Notifier::silent());
    (cache, client, store)
  }

  #[tokio::test]
  async fn test_refresh_is_idempotent() {
    let (cache, _client, store) = setup(vec![category(1, "Dental"), category(2, "Optics")]);

    assert_eq!(cache.refresh().await, RefreshOutcome::Applied);
    let first = cache.current();
    assert_eq!(cache.refresh().await, RefreshOutcome::Applied);
    let second = cache.current();

    assert_eq!(first.records, second.records);
    assert!(!second.is_stale);
    assert!(!second.is_loading);
    assert_eq!(second.source, CacheSource::Network);

    let stored = store.load::<Category>(KEY).unwrap();
    assert_eq!(stored.records, second.records);
  }

  #[tokio::test]
  async fn test_stale_fetch_is_discarded() {
    let (cache, client, _store) = setup(Vec::new());
    let gate_a = client.gate_list();
    let gate_b = client.gate_list();

    let first = tokio::spawn({
      let cache = cache.clone();
      async move { cache.refresh().await }
    });
    wait_until(|| client.list_calls() == 1).await;
    let second = tokio::spawn({
      let cache = cache.clone();
      async move { cache.refresh().await }
    });
    wait_until(|| client.list_calls() == 2).await;

    gate_b.send(Ok(vec![category(1, "Newer")])).unwrap();
    assert_eq!(second.await.unwrap(), RefreshOutcome::Applied);
    assert!(cache.current().is_loading);

    gate_a.send(Ok(vec![category(1, "Older")])).unwrap();
    assert_eq!(first.await.unwrap(), RefreshOutcome::Discarded);

    let current = cache.current();
    assert_eq!(names(&current), vec!["Newer"]);
    assert!(!current.is_loading);
  }

  #[tokio::test]
  async fn test_records_stay_visible_while_loading() {
    let (cache, client, _store) = setup(vec![category(1, "Dental")]);
    cache.refresh().await;

    let gate = client.gate_list();
    let pending = tokio::spawn({
      let cache = cache.clone();
      async move { cache.refresh().await }
    });
    wait_until(|| client.list_calls() == 2).await;

    let during = cache.current();
    assert!(during.is_loading);
    assert_eq!(names(&during), vec!["Dental"]);

    gate.send(Ok(vec![category(1, "Dental"), category(2, "Optics")])).unwrap();
    pending.await.unwrap();
    assert!(!cache.current().is_loading);
    assert_eq!(cache.current().records.len(), 2);
  }

  #[tokio::test]
  async fn test_cancelled_refresh_does_not_stick_loading() {
    let (cache, client, _store) = setup(Vec::new());
    let _gate = client.gate_list();

    let pending = tokio::spawn({
      let cache = cache.clone();
      async move { cache.refresh().await }
    });
    wait_until(|| client.list_calls() == 1).await;
    assert!(cache.current().is_loading);

    pending.abort();
    let _ = pending.await;
    assert!(!cache.current().is_loading);
  }

  #[tokio::test]
  async fn test_failed_first_refresh_serves_fallback() {
    let client = Arc::new(ScriptedClient::new(Vec::new()));
    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    store.save(KEY, &[category(1, "Cached")]).unwrap();
    let (notifier, mut rx) = Notifier::channel();
    let cache = CollectionCache::new(KEY, client.clone() as Arc<dyn ResourceClient<Category>>, store, notifier);

    client.push_list(Err(RemoteFailure::Network("connection refused".to_string())));
    assert!(matches!(cache.refresh().await, RefreshOutcome::Failed(_)));

    let current = cache.current();
    assert_eq!(names(&current), vec!["Cached"]);
    assert!(current.is_stale);
    assert_eq!(current.source, CacheSource::Fallback);
    assert!(current.synced_at.is_some());
    assert_eq!(
      rx.recv().await,
      Some(Notification::UsingCachedData {
        resource: "categories"
      })
    );

    // Backend back: the fallback is replaced and no longer stale
    assert_eq!(cache.refresh().await, RefreshOutcome::Applied);
    assert!(!cache.current().is_stale);
  }

  #[tokio::test]
  async fn test_failed_first_refresh_without_fallback() {
    let client = Arc::new(ScriptedClient::new(Vec::new()));
    let (notifier, mut rx) = Notifier::channel();
    let cache = CollectionCache::new(KEY, client.clone() as Arc<dyn ResourceClient<Category>>, Arc::new(NoopStorage), notifier);

    client.push_list(Err(RemoteFailure::Timeout(std::time::Duration::from_secs(10))));
    cache.refresh().await;

    let current = cache.current();
    assert!(current.records.is_empty());
    assert!(current.is_stale);
    assert_eq!(
      rx.recv().await,
      Some(Notification::NoDataAvailable {
        resource: "categories"
      })
    );
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_loaded_collection() {
    let client = Arc::new(ScriptedClient::new(vec![category(1, "Live")]));
    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let (notifier, mut rx) = Notifier::channel();
    let cache = CollectionCache::new(KEY, client.clone() as Arc<dyn ResourceClient<Category>>, store.clone(), notifier);
    cache.refresh().await;

    // An older snapshot in the store must not replace live data
    store.save(KEY, &[category(9, "Old")]).unwrap();
    let failure = RemoteFailure::Status {
      status: 502,
      body: "bad gateway".to_string(),
    };
    client.push_list(Err(failure.clone()));
    assert_eq!(cache.refresh().await, RefreshOutcome::Failed(failure.clone()));

    let current = cache.current();
    assert_eq!(names(&current), vec!["Live"]);
    assert!(!current.is_stale);
    assert_eq!(
      rx.recv().await,
      Some(Notification::RefreshFailed {
        resource: "categories",
        reason: failure
      })
    );
  }
}
