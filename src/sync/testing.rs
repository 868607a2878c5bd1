//! Scripted resource client for exercising the sync core.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::cache::{Record, RecordId};
use crate::error::RemoteFailure;
use crate::remote::ResourceClient;

enum Reply<V> {
  Now(Result<V, RemoteFailure>),
  Gated(oneshot::Receiver<Result<V, RemoteFailure>>),
}

impl<V> Reply<V> {
  async fn resolve(self) -> Result<V, RemoteFailure> {
    match self {
      Reply::Now(result) => result,
      Reply::Gated(rx) => rx
        .await
        .unwrap_or_else(|_| Err(RemoteFailure::Network("gate dropped".to_string()))),
    }
  }
}

/// Replies to `list` and write calls in the order they were scripted.
///
/// An unscripted `list` returns `fallback_list`. An unscripted write (or one
/// scripted with `Ok(None)`) echoes its input, assigning server ids to
/// creates from 100 upwards.
pub struct ScriptedClient<T> {
  lists: Mutex<VecDeque<Reply<Vec<T>>>>,
  writes: Mutex<VecDeque<Reply<Option<T>>>>,
  fallback_list: Mutex<Vec<T>>,
  list_calls: AtomicUsize,
  write_calls: AtomicUsize,
  /// `"create"`, `"update <id>"` or `"delete <id>"` per write, in call order
  write_log: Mutex<Vec<String>>,
  next_id: AtomicU64,
}

impl<T: Record> ScriptedClient<T> {
  pub fn new(fallback_list: Vec<T>) -> Self {
    Self {
      lists: Mutex::new(VecDeque::new()),
      writes: Mutex::new(VecDeque::new()),
      fallback_list: Mutex::new(fallback_list),
      list_calls: AtomicUsize::new(0),
      write_calls: AtomicUsize::new(0),
      write_log: Mutex::new(Vec::new()),
      next_id: AtomicU64::new(100),
    }
  }

  pub fn set_list(&self, records: Vec<T>) {
    *self.fallback_list.lock().unwrap() = records;
  }

  pub fn push_list(&self, result: Result<Vec<T>, RemoteFailure>) {
    self.lists.lock().unwrap().push_back(Reply::Now(result));
  }

  pub fn gate_list(&self) -> oneshot::Sender<Result<Vec<T>, RemoteFailure>> {
    let (tx, rx) = oneshot::channel();
    self.lists.lock().unwrap().push_back(Reply::Gated(rx));
    tx
  }

  pub fn push_write(&self, result: Result<Option<T>, RemoteFailure>) {
    self.writes.lock().unwrap().push_back(Reply::Now(result));
  }

  pub fn gate_write(&self) -> oneshot::Sender<Result<Option<T>, RemoteFailure>> {
    let (tx, rx) = oneshot::channel();
    self.writes.lock().unwrap().push_back(Reply::Gated(rx));
    tx
  }

  pub fn list_calls(&self) -> usize {
    self.list_calls.load(Ordering::SeqCst)
  }

  pub fn write_calls(&self) -> usize {
    self.write_calls.load(Ordering::SeqCst)
  }

  pub fn write_log(&self) -> Vec<String> {
    self.write_log.lock().unwrap().clone()
  }

  /// Next scripted write reply; `Ok(None)` when unscripted.
  async fn next_write(&self, call: String) -> Result<Option<T>, RemoteFailure> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    self.write_log.lock().unwrap().push(call);
    let reply = self.writes.lock().unwrap().pop_front();
    match reply {
      Some(reply) => reply.resolve().await,
      None => Ok(None),
    }
  }
}

#[async_trait]
impl<T: Record> ResourceClient<T> for ScriptedClient<T> {
  async fn list(&self) -> Result<Vec<T>, RemoteFailure> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    let reply = self.lists.lock().unwrap().pop_front();
    match reply {
      Some(reply) => reply.resolve().await,
      None => Ok(self.fallback_list.lock().unwrap().clone()),
    }
  }

  async fn create(&self, record: &T) -> Result<T, RemoteFailure> {
    let scripted = self.next_write("create".to_string()).await?;
    Ok(scripted.unwrap_or_else(|| {
      let mut echo = record.clone();
      echo.set_id(RecordId::Server(self.next_id.fetch_add(1, Ordering::SeqCst)));
      echo
    }))
  }

  async fn update(&self, id: &RecordId, record: &T) -> Result<T, RemoteFailure> {
    let scripted = self.next_write(format!("update {}", id)).await?;
    Ok(scripted.unwrap_or_else(|| record.clone()))
  }

  async fn delete(&self, id: &RecordId) -> Result<(), RemoteFailure> {
    self.next_write(format!("delete {}", id)).await.map(|_| ())
  }
}

/// Yield to other tasks until `cond` holds.
pub async fn wait_until(cond: impl Fn() -> bool) {
  for _ in 0..1000 {
    if cond() {
      return;
    }
    tokio::task::yield_now().await;
  }
  panic!("condition not reached");
}
