//! Optimistic mutation coordinator.
//!
//! An intent is validated and applied to the collection (and its fallback
//! snapshot) immediately. The backend call then runs on its own task and
//! either swaps in the authoritative record or undoes that intent alone.
//!
//! A create that supersedes another still-pending create of the same
//! natural key waits for it, then updates the record it produced.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{Record, RecordId, SnapshotStore};
use crate::error::{RemoteFailure, ValidationFailure};

use super::collection::CollectionCache;
use super::notify::Notification;
use super::state::{Accepted, Intent, IntentId, IntentKind, RemoteOp};

/// Final result of one intent.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
  /// The backend accepted the change; `id` is the server id
  Confirmed { kind: IntentKind, id: RecordId },
  /// The backend rejected the change and it was undone locally
  Reverted {
    kind: IntentKind,
    reason: RemoteFailure,
  },
}

/// Handle to an intent whose backend call is still running.
#[derive(Debug)]
pub struct MutationHandle {
  intent: IntentId,
  /// Id the optimistic record is visible under until settled
  pub provisional_id: RecordId,
  task: JoinHandle<MutationOutcome>,
}

impl MutationHandle {
  pub fn intent(&self) -> IntentId {
    self.intent
  }

  /// Wait for the backend call to settle.
  pub async fn settled(self) -> Result<MutationOutcome> {
    let intent = self.intent;
    self
      .task
      .await
      .map_err(|e| eyre!("Mutation task for intent {} failed: {}", intent, e))
  }
}

/// Where a create's record ended up on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Landing {
  Pending,
  Stored(RecordId),
  Dropped,
}

pub struct MutationCoordinator<T: Record, S> {
  cache: CollectionCache<T, S>,
  /// Creates that a later create of the same key may still follow
  landings: Arc<Mutex<HashMap<IntentId, watch::Receiver<Landing>>>>,
}

impl<T: Record, S: SnapshotStore + 'static> MutationCoordinator<T, S> {
  pub fn new(cache: CollectionCache<T, S>) -> Self {
    Self {
      cache,
      landings: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Apply `intent` optimistically and start its backend call.
  ///
  /// On `ValidationFailure` nothing is applied and nothing is sent.
  pub fn apply(&self, intent: Intent<T>) -> Result<MutationHandle, ValidationFailure> {
    let resource = T::resource_name();
    let mut landings = self
      .landings
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    // A landing is published only after its intent left the state
    landings.retain(|_, rx| *rx.borrow() == Landing::Pending);

    let accepted = self
      .cache
      .try_transition(|state| state.apply_intent(intent))
      .inspect_err(|reason| {
        warn!(resource, error = %reason, "mutation rejected");
        self.cache.notifier().send(Notification::ValidationRejected {
          resource,
          reason: reason.clone(),
        });
      })?;

    let provisional_id = match &accepted.op {
      RemoteOp::Create(record) | RemoteOp::Update(_, record) => record.id().clone(),
      RemoteOp::Delete(id) => id.clone(),
    };
    info!(
      resource,
      intent = accepted.intent,
      kind = accepted.op.kind().label(),
      id = %provisional_id,
      "mutation applied"
    );

    let intent = accepted.intent;
    let follows = accepted.follows.and_then(|id| landings.get(&id).cloned());
    let (landed, rx) = watch::channel(Landing::Pending);
    if matches!(accepted.op, RemoteOp::Create(_)) {
      landings.insert(intent, rx);
    }
    drop(landings);

    let cache = self.cache.clone();
    let task = tokio::spawn(async move {
      let outcome = settle(cache, accepted, follows).await;
      let landing = match &outcome {
        MutationOutcome::Confirmed { id, .. } => Landing::Stored(id.clone()),
        MutationOutcome::Reverted { .. } => Landing::Dropped,
      };
      landed.send_replace(landing);
      outcome
    });

    Ok(MutationHandle {
      intent,
      provisional_id,
      task,
    })
  }
}

/// Wait for the create `accepted` follows and retarget it at that record.
async fn after_landing<T: Record>(
  mut accepted: Accepted<T>,
  mut earlier: watch::Receiver<Landing>,
) -> Accepted<T> {
  let landing = match earlier.wait_for(|l| *l != Landing::Pending).await {
    Ok(landing) => landing.clone(),
    Err(_) => Landing::Dropped,
  };

  if let (Landing::Stored(id), RemoteOp::Create(record)) = (&landing, &accepted.op) {
    debug!(
      resource = T::resource_name(),
      intent = accepted.intent,
      %id,
      "earlier create landed, sending update"
    );
    let mut record = record.clone();
    record.set_id(id.clone());
    accepted.op = RemoteOp::Update(id.clone(), record);
  }
  accepted
}

async fn settle<T: Record, S: SnapshotStore>(
  cache: CollectionCache<T, S>,
  accepted: Accepted<T>,
  follows: Option<watch::Receiver<Landing>>,
) -> MutationOutcome {
  let accepted = match follows {
    Some(earlier) => after_landing(accepted, earlier).await,
    None => accepted,
  };

  let resource = T::resource_name();
  let kind = accepted.op.kind();
  let client = cache.client().clone();

  let result = match &accepted.op {
    RemoteOp::Create(record) => client
      .create(record)
      .await
      .map(|r| (r.id().clone(), Some(r))),
    RemoteOp::Update(id, record) => client
      .update(id, record)
      .await
      .map(|r| (r.id().clone(), Some(r))),
    RemoteOp::Delete(id) => client.delete(id).await.map(|_| (id.clone(), None)),
  };

  match result {
    Ok((id, server)) => {
      cache.transition(|state| state.confirm(accepted.intent, server));
      info!(resource, intent = accepted.intent, %id, "mutation confirmed");
      cache
        .notifier()
        .send(Notification::MutationConfirmed { resource, kind, id: id.clone() });
      MutationOutcome::Confirmed { kind, id }
    }
    Err(reason) => {
      cache.transition(|state| state.revert(accepted.intent));
      warn!(resource, intent = accepted.intent, error = %reason, "mutation reverted");
      cache.notifier().send(Notification::MutationReverted {
        resource,
        kind,
        reason: reason.clone(),
      });
      MutationOutcome::Reverted { kind, reason }
    }
  }
}
