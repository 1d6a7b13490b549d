//! In-Flight Registry
//!
//! Coalesces concurrent classifications of the same normalized key into one
//! computation. The first caller for a key becomes the leader: its
//! computation is spawned onto the runtime and every later caller subscribes
//! to the leader's broadcast instead of starting a second provider call.
//!
//! The entry is removed as soon as the computation settles, success or
//! failure, so the next request for that key starts fresh. Code that
//! computes results itself, like the batch coordinator, takes an
//! [`InFlightClaim`] instead so single-text callers still join it. Because the
//! computation runs in its own task, a caller that stops waiting does not
//! cancel it; the result still reaches the cache and the other waiters.
//!
//! ## Usage
//!
//! ```no_run
//! use tokio_emotion_orchestrator::enhanced::InFlightRegistry;
//! use tokio_emotion_orchestrator::{normalize, Classification, Emotion};
//! # #[tokio::main]
//! # async fn main() {
//! let registry = InFlightRegistry::new();
//! let key = normalize("shared text");
//! let result = registry
//!     .get_or_create(&key, async { Ok(Classification::new(Emotion::Joy, 0.9, "primary")) })
//!     .await;
//! # }
//! ```

use crate::{Classification, ClassifierError, NormalizedKey};
use dashmap::mapref::entry::{Entry, VacantEntry};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

type SharedResult = Result<Classification, ClassifierError>;

struct InFlightEntry {
    id: Uuid,
    waiter_tx: broadcast::Sender<SharedResult>,
}

/// Whether a call started a computation or joined an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InFlightRole {
    /// This call started the computation.
    Leader,
    /// This call attached to a computation already pending for the key.
    Follower,
}

/// Registry of pending classifications, keyed by normalized text.
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    pending: Arc<DashMap<NormalizedKey, InFlightEntry>>,
}

/// Leadership of one pending key, held by whoever computes its result.
///
/// Callers of [`InFlightRegistry::join_or_start`] for the same key follow
/// the claim until [`complete`](Self::complete) is called. Dropping an
/// uncompleted claim unregisters the key and its followers see the
/// computation as abandoned.
pub struct InFlightClaim {
    pending: Arc<DashMap<NormalizedKey, InFlightEntry>>,
    key: NormalizedKey,
    id: Uuid,
    waiter_tx: broadcast::Sender<SharedResult>,
}

impl InFlightClaim {
    /// The claimed key.
    pub fn key(&self) -> &NormalizedKey {
        &self.key
    }

    /// Publish `result` to every follower and unregister the key.
    ///
    /// The key is removed before the broadcast, so a caller arriving after
    /// this point starts fresh instead of subscribing to a channel that
    /// already fired.
    pub fn complete(&self, result: SharedResult) {
        self.unregister();
        let _ = self.waiter_tx.send(result);
    }

    fn unregister(&self) {
        self.pending.remove_if(&self.key, |_, entry| entry.id == self.id);
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl InFlightRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Become the leader for `key` if nothing is pending for it.
    ///
    /// Returns `None` when another computation already owns the key; join it
    /// with [`join_or_start`](Self::join_or_start) instead.
    pub fn claim(&self, key: &NormalizedKey) -> Option<InFlightClaim> {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => Some(self.register(vacant, key)),
        }
    }

    fn register(
        &self,
        vacant: VacantEntry<'_, NormalizedKey, InFlightEntry>,
        key: &NormalizedKey,
    ) -> InFlightClaim {
        let (tx, _) = broadcast::channel(1);
        let id = Uuid::new_v4();
        vacant.insert(InFlightEntry {
            id,
            waiter_tx: tx.clone(),
        });
        debug!(key = %key, id = %id, "in-flight classification registered");
        InFlightClaim {
            pending: Arc::clone(&self.pending),
            key: key.clone(),
            id,
            waiter_tx: tx,
        }
    }

    /// Await the shared result for `key`, starting `computation` only if no
    /// computation is pending for it.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn get_or_create<F>(&self, key: &NormalizedKey, computation: F) -> SharedResult
    where
        F: Future<Output = SharedResult> + Send + 'static,
    {
        self.join_or_start(key, computation).await.0
    }

    /// Like [`get_or_create`](Self::get_or_create), also reporting whether this
    /// call led or followed.
    pub async fn join_or_start<F>(
        &self,
        key: &NormalizedKey,
        computation: F,
    ) -> (SharedResult, InFlightRole)
    where
        F: Future<Output = SharedResult> + Send + 'static,
    {
        let (mut rx, role) = match self.pending.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                debug!(key = %key, "joining in-flight classification");
                (occupied.get().waiter_tx.subscribe(), InFlightRole::Follower)
            }
            Entry::Vacant(vacant) => {
                let claim = self.register(vacant, key);
                let rx = claim.waiter_tx.subscribe();
                tokio::spawn(async move {
                    let result = computation.await;
                    claim.complete(result);
                });
                (rx, InFlightRole::Leader)
            }
        };

        let result = match rx.recv().await {
            Ok(result) => result,
            Err(e) => {
                warn!(key = %key, error = %e, "in-flight classification abandoned");
                Err(ClassifierError::Other(format!(
                    "in-flight classification abandoned: {e}"
                )))
            }
        };
        (result, role)
    }

    /// Number of computations currently pending.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether a computation is pending for `key`.
    pub fn is_pending(&self, key: &NormalizedKey) -> bool {
        self.pending.contains_key(key)
    }
}
