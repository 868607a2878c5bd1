//! In-memory collection state and its transitions.
//!
//! Every method here is synchronous. The owning cache calls them under its
//! lock, so each transition is observed whole or not at all.
//!
//! Pending optimistic intents are kept in application order. Each one owns a
//! *slot* (the record id it wrote) and remembers the record it displaced, so
//! it can be undone on its own without touching anything else. When a later
//! intent displaced an earlier intent's record, settling the earlier one
//! hands its knowledge down the chain instead of changing the visible list.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::cache::{CacheSource, Record, RecordId, StoredSnapshot};
use crate::error::ValidationFailure;

pub type IntentId = u64;

/// A single requested mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent<T> {
  /// Create a record; its id is replaced by a temporary one
  Create(T),
  /// Replace the record with the same id
  Update(T),
  /// Remove the record with this id
  Delete(RecordId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
  Create,
  Update,
  Delete,
}

impl IntentKind {
  pub fn label(&self) -> &'static str {
    match self {
      IntentKind::Create => "create",
      IntentKind::Update => "update",
      IntentKind::Delete => "delete",
    }
  }
}

/// The backend call an accepted intent still has to make.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp<T> {
  Create(T),
  Update(RecordId, T),
  Delete(RecordId),
}

impl<T> RemoteOp<T> {
  pub fn kind(&self) -> IntentKind {
    match self {
      RemoteOp::Create(_) => IntentKind::Create,
      RemoteOp::Update(..) => IntentKind::Update,
      RemoteOp::Delete(_) => IntentKind::Delete,
    }
  }
}

/// An intent that was applied locally and awaits its remote result.
#[derive(Debug, Clone)]
pub struct Accepted<T> {
  pub intent: IntentId,
  pub op: RemoteOp<T>,
  /// Earlier create of the same natural key that must land first. Once it
  /// has a server id, `op` is sent as an update of that record instead.
  pub follows: Option<IntentId>,
}

struct Prepared<T> {
  kind: IntentKind,
  slot: RecordId,
  before: Option<T>,
  after: Option<T>,
  op: RemoteOp<T>,
  follows: Option<IntentId>,
}

#[derive(Debug, Clone)]
struct PendingIntent<T> {
  id: IntentId,
  kind: IntentKind,
  /// Record id this intent wrote (or removed)
  slot: RecordId,
  /// Record displaced by this intent, restored on revert
  before: Option<T>,
  /// Record written by this intent
  after: Option<T>,
  position: usize,
}

/// Point-in-time view of a cache, safe to hand to rendering code.
#[derive(Debug, Clone)]
pub struct CacheSnapshot<T> {
  pub records: Vec<T>,
  pub is_loading: bool,
  pub is_stale: bool,
  pub source: CacheSource,
  /// Last successful fetch, or when the fallback snapshot was saved
  pub synced_at: Option<DateTime<Utc>>,
  /// Ids of records with an unconfirmed mutation
  pub pending: Vec<RecordId>,
}

impl<T> CacheSnapshot<T> {
  pub fn is_pending(&self, id: &RecordId) -> bool {
    self.pending.contains(id)
  }
}

/// What a confirmation did to the visible list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
  /// The authoritative record replaced the optimistic one
  Reconciled { from: RecordId, to: RecordId },
  /// Nothing visible changed (delete, or a later intent owns the slot)
  Absorbed,
}

#[derive(Debug)]
pub struct CollectionState<T: Record> {
  records: Vec<T>,
  pending: Vec<PendingIntent<T>>,
  loaded: bool,
  is_stale: bool,
  source: CacheSource,
  synced_at: Option<DateTime<Utc>>,
  /// Sequence number of the last refresh issued
  issued: u64,
  /// Sequence number of the last refresh result applied
  applied: u64,
  /// Refreshes issued at or before this sequence predate a confirmed write
  barrier: u64,
  in_flight: usize,
  next_intent: IntentId,
  next_temporary: u64,
}

impl<T: Record> Default for CollectionState<T> {
  fn default() -> Self {
    Self {
      records: Vec::new(),
      pending: Vec::new(),
      loaded: false,
      is_stale: false,
      source: CacheSource::Empty,
      synced_at: None,
      issued: 0,
      applied: 0,
      barrier: 0,
      in_flight: 0,
      next_intent: 0,
      next_temporary: 0,
    }
  }
}

impl<T: Record> CollectionState<T> {
  pub fn records(&self) -> &[T] {
    &self.records
  }

  pub fn is_loaded(&self) -> bool {
    self.loaded
  }

  pub fn snapshot(&self) -> CacheSnapshot<T> {
    CacheSnapshot {
      records: self.records.clone(),
      is_loading: self.in_flight > 0,
      is_stale: self.is_stale,
      source: self.source,
      synced_at: self.synced_at,
      pending: self.pending.iter().map(|p| p.slot.clone()).collect(),
    }
  }

  // ==========================================================================
  // Refresh bookkeeping
  // ==========================================================================

  /// Register a new refresh and return its sequence number.
  pub fn begin_refresh(&mut self) -> u64 {
    self.issued += 1;
    self.in_flight += 1;
    self.issued
  }

  pub fn end_refresh(&mut self) {
    self.in_flight = self.in_flight.saturating_sub(1);
  }

  /// Apply the result of refresh `seq`.
  ///
  /// Returns false (leaving everything untouched) when a newer refresh was
  /// already applied, or a write was confirmed after `seq` was issued.
  pub fn apply_fetch(&mut self, seq: u64, fetched: Vec<T>) -> bool {
    if seq <= self.applied || seq <= self.barrier {
      return false;
    }

    self.applied = seq;
    self.records = dedup_records(fetched);
    self.rebase();
    self.loaded = true;
    self.is_stale = false;
    self.source = CacheSource::Network;
    self.synced_at = Some(Utc::now());
    true
  }

  /// Show the stored snapshot because nothing was loaded and the fetch failed.
  pub fn apply_fallback(&mut self, snapshot: Option<StoredSnapshot<T>>) {
    match snapshot {
      Some(snapshot) => {
        self.records = dedup_records(snapshot.records);
        self.synced_at = Some(snapshot.saved_at);
        self.loaded = true;
      }
      None => self.records.clear(),
    }
    self.rebase();
    self.is_stale = true;
    self.source = CacheSource::Fallback;
  }

  // ==========================================================================
  // Optimistic intents
  // ==========================================================================

  /// Validate `intent`, apply it locally and describe the remote call to make.
  pub fn apply_intent(&mut self, intent: Intent<T>) -> Result<Accepted<T>, ValidationFailure> {
    let Prepared {
      kind,
      slot,
      before,
      after,
      op,
      follows,
    } = match intent {
      Intent::Create(draft) => self.prepare_create(draft)?,
      Intent::Update(record) => self.prepare_update(record)?,
      Intent::Delete(id) => self.prepare_delete(id)?,
    };

    self.next_intent += 1;
    let mut pending = PendingIntent {
      id: self.next_intent,
      kind,
      slot,
      before,
      after,
      position: 0,
    };
    self.place(&mut pending);
    self.pending.push(pending);

    Ok(Accepted {
      intent: self.next_intent,
      op,
      follows,
    })
  }

  fn prepare_create(
    &mut self,
    mut draft: T,
  ) -> Result<Prepared<T>, ValidationFailure> {
    draft.validate()?;

    let existing = draft
      .natural_key()
      .and_then(|key| self.records.iter().find(|r| r.natural_key().as_ref() == Some(&key)))
      .cloned();

    match existing {
      // Same natural key, already on the server: this is an update
      Some(existing) if !existing.id().is_temporary() => {
        let id = existing.id().clone();
        draft.set_id(id.clone());
        Ok(Prepared {
          kind: IntentKind::Update,
          slot: id.clone(),
          before: Some(existing),
          op: RemoteOp::Update(id, draft.clone()),
          after: Some(draft),
          follows: None,
        })
      }
      // Same natural key, still being created: supersede it and wait for
      // that create so the backend never sees two records for one key
      existing => {
        let follows = existing.as_ref().and_then(|e| {
          self
            .pending
            .iter()
            .rev()
            .find(|p| p.kind == IntentKind::Create && &p.slot == e.id())
            .map(|p| p.id)
        });
        let slot = self.allocate_temporary();
        draft.set_id(slot.clone());
        Ok(Prepared {
          kind: IntentKind::Create,
          slot,
          before: existing,
          op: RemoteOp::Create(draft.clone()),
          after: Some(draft),
          follows,
        })
      }
    }
  }

  fn prepare_update(
    &mut self,
    record: T,
  ) -> Result<Prepared<T>, ValidationFailure> {
    record.validate()?;

    let id = record.id().clone();
    if id.is_temporary() {
      return Err(ValidationFailure::PendingCreate(id));
    }
    let existing = self
      .find(&id)
      .cloned()
      .ok_or_else(|| ValidationFailure::UnknownRecord(id.clone()))?;

    if let Some(key) = record.natural_key() {
      let clash = self
        .records
        .iter()
        .any(|r| r.id() != &id && r.natural_key().as_ref() == Some(&key));
      if clash {
        return Err(ValidationFailure::DuplicateKey(key));
      }
    }

    Ok(Prepared {
      kind: IntentKind::Update,
      slot: id.clone(),
      before: Some(existing),
      op: RemoteOp::Update(id, record.clone()),
      after: Some(record),
      follows: None,
    })
  }

  fn prepare_delete(
    &mut self,
    id: RecordId,
  ) -> Result<Prepared<T>, ValidationFailure> {
    if id.is_temporary() {
      return Err(ValidationFailure::PendingCreate(id));
    }
    let existing = self
      .find(&id)
      .cloned()
      .ok_or_else(|| ValidationFailure::UnknownRecord(id.clone()))?;

    Ok(Prepared {
      kind: IntentKind::Delete,
      slot: id.clone(),
      before: Some(existing),
      after: None,
      op: RemoteOp::Delete(id),
      follows: None,
    })
  }

  /// Settle `intent` with the backend's answer.
  ///
  /// `server` is the authoritative record for creates and updates, `None`
  /// for deletes. Returns `None` if the intent is unknown.
  pub fn confirm(&mut self, intent: IntentId, server: Option<T>) -> Option<Settled> {
    let idx = self.pending.iter().position(|p| p.id == intent)?;
    let settled = self.pending.remove(idx);

    // Any refresh already in flight may predate this write
    self.barrier = self.issued;

    if let Some(heir) = self.heir_of(idx, &settled.slot) {
      heir.before = server;
      return Some(Settled::Absorbed);
    }

    let Some(server) = server else {
      return Some(Settled::Absorbed);
    };
    let Some(pos) = self.index_of(&settled.slot) else {
      return Some(Settled::Absorbed);
    };

    let from = settled.slot.clone();
    let to = server.id().clone();
    self.records.remove(pos);
    let mut pos = pos;
    if let Some(dup) = self.index_of(&to) {
      // A refresh may already have brought the server copy in
      self.records.remove(dup);
      if dup < pos {
        pos -= 1;
      }
    }
    self.records.insert(pos.min(self.records.len()), server);

    if from == to {
      Some(Settled::Absorbed)
    } else {
      Some(Settled::Reconciled { from, to })
    }
  }

  /// Undo `intent` after the backend rejected it.
  ///
  /// Only this intent's change is undone. Returns the intent's kind, or
  /// `None` if it is unknown.
  pub fn revert(&mut self, intent: IntentId) -> Option<IntentKind> {
    let idx = self.pending.iter().position(|p| p.id == intent)?;
    let reverted = self.pending.remove(idx);

    if let Some(heir) = self.heir_of(idx, &reverted.slot) {
      heir.before = reverted.before;
      heir.position = reverted.position;
      return Some(reverted.kind);
    }

    if let Some(pos) = self.index_of(&reverted.slot) {
      self.records.remove(pos);
    }
    if let Some(before) = reverted.before {
      if self.index_of(before.id()).is_none() {
        let at = reverted.position.min(self.records.len());
        self.records.insert(at, before);
      }
    }

    Some(reverted.kind)
  }

  // ==========================================================================
  // Internals
  // ==========================================================================

  /// First pending intent at or after `from` that displaced the record in `slot`.
  fn heir_of(&mut self, from: usize, slot: &RecordId) -> Option<&mut PendingIntent<T>> {
    self.pending[from..]
      .iter_mut()
      .find(|p| p.before.as_ref().map(|b| b.id()) == Some(slot))
  }

  /// Re-apply pending intents on top of freshly replaced records.
  fn rebase(&mut self) {
    let pending = std::mem::take(&mut self.pending);
    for mut intent in pending {
      intent.before = intent
        .before
        .as_ref()
        .and_then(|b| self.find(b.id()))
        .cloned();

      // The record is gone on the server; keep the intent but show nothing
      let vanished = intent.kind != IntentKind::Create && intent.before.is_none();
      if !vanished {
        self.place(&mut intent);
      }
      self.pending.push(intent);
    }
  }

  /// Swap `intent.before` for `intent.after` in the list.
  fn place(&mut self, intent: &mut PendingIntent<T>) {
    let displaced = intent.before.as_ref().and_then(|b| self.index_of(b.id()));
    let mut position = match displaced {
      Some(pos) => {
        self.records.remove(pos);
        pos
      }
      None => self.records.len(),
    };

    if let Some(after) = &intent.after {
      if let Some(dup) = self.index_of(after.id()) {
        self.records.remove(dup);
        if dup < position {
          position -= 1;
        }
      }
      self.records.insert(position.min(self.records.len()), after.clone());
    }

    intent.position = position;
  }

  fn allocate_temporary(&mut self) -> RecordId {
    self.next_temporary += 1;
    RecordId::Temporary(self.next_temporary)
  }

  fn find(&self, id: &RecordId) -> Option<&T> {
    self.records.iter().find(|r| r.id() == id)
  }

  fn index_of(&self, id: &RecordId) -> Option<usize> {
    self.records.iter().position(|r| r.id() == id)
  }
}

/// Keep the first occurrence of each id, then one record per natural key:
/// the most recently created, at the position of the first.
fn dedup_records<T: Record>(records: Vec<T>) -> Vec<T> {
  let mut ids = HashSet::new();
  let mut keys: HashMap<String, usize> = HashMap::new();
  let mut kept: Vec<T> = Vec::with_capacity(records.len());

  for record in records {
    if !ids.insert(record.id().clone()) {
      continue;
    }
    let Some(key) = record.natural_key() else {
      kept.push(record);
      continue;
    };
    match keys.get(&key) {
      Some(&idx) => {
        if record.created_at() > kept[idx].created_at() {
          kept[idx] = record;
        }
      }
      None => {
        keys.insert(key, kept.len());
        kept.push(record);
      }
    }
  }
  kept
}
