// Computation arena - storage for computation metadata
//
// A computation is the unit that re-reads a value expression and reacts to
// changes. The arena holds its erased update closure and the set of change
// channels it subscribed to; the typed value cache lives outside the arena
// in the Computation handle, captured by the closure.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use slab::Slab;

use crate::error::BindingError;
use crate::hash::StableHashBuilder;
use crate::tracker;

use super::ChannelId;

/// Source channels of one computation, in first-subscription order.
pub type SourceSet = IndexSet<ChannelId, StableHashBuilder>;

/// Erased update closure. Receives the computation's own id so it can open
/// a tracking frame around its read expression.
pub type Updater = Box<dyn FnMut(ComputationId) + Send>;

/// Global computation arena - stores all computation metadata
static COMPUTATION_ARENA: RwLock<Slab<ComputationMetadata>> = RwLock::new(Slab::new());

/// Source of computation uids. Slab indices are reused after removal; uids
/// never are, so a notification pass can tell a snapshotted computation from
/// a new one occupying its recycled slot.
static NEXT_COMPUTATION_UID: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a computation in the arena.
///
/// This is a zero-cost wrapper around a slab index. When a Computation is
/// dropped it removes itself from the arena, making this id stale. Accessing
/// a stale ComputationId returns None.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ComputationId(u32);

impl ComputationId {
    /// Create a new ComputationId from a raw index
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Convert to usize for slab indexing
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Access the computation metadata with a closure (read-only)
    ///
    /// Returns None if the computation has been removed (stale access).
    pub fn with<F, R>(self, f: F) -> Option<R>
    where
        F: FnOnce(&ComputationMetadata) -> R,
    {
        let arena = COMPUTATION_ARENA.read();
        arena.get(self.index()).map(f)
    }

    /// Never-reused uid of this computation, or None if stale.
    pub fn uid(self) -> Option<u64> {
        self.with(|metadata| metadata.uid)
    }

    /// Record `channel` as a source of this computation.
    ///
    /// Returns true when the pair is new. A false return means the channel
    /// was already a source (or the id is stale) and the caller must not
    /// append another observer entry for it.
    pub fn add_source(self, channel: ChannelId) -> bool {
        self.with(|metadata| metadata.sources.write().insert(channel))
            .unwrap_or(false)
    }

    /// Whether `channel` is already a source of this computation.
    #[cfg(test)]
    pub fn has_source(self, channel: ChannelId) -> bool {
        self.with(|metadata| metadata.sources.read().contains(&channel))
            .unwrap_or(false)
    }

    /// Drop `channel` from the source set. Called from channel teardown.
    pub fn remove_source(self, channel: ChannelId) {
        self.with(|metadata| {
            metadata.sources.write().shift_remove(&channel);
        });
    }

    /// Execute a closure with this computation's source set.
    pub fn with_sources<F, R>(self, f: F) -> Option<R>
    where
        F: FnOnce(&SourceSet) -> R,
    {
        self.with(|metadata| {
            let sources = metadata.sources.read();
            f(&sources)
        })
    }
}

/// Run one update of `computation`: re-evaluate its read expression under a
/// tracking frame and let it react if the value changed.
///
/// A stale id is a successful no-op. That is also the dispose-mid-pass path:
/// notification runs against a snapshot, and an observer disposed by an
/// earlier callback in the same pass resolves to a stale id here.
///
/// Re-entry is an error. If `computation` already has an evaluation on this
/// thread's stack, or its updater is already taken, then one of its own
/// dependencies was written from inside its read expression or callback,
/// which closes a cycle the synchronous model cannot run.
pub fn run_update(computation: ComputationId) -> Result<(), BindingError> {
    /// Guard that restores an updater to the arena on drop (even on panic)
    struct UpdaterGuard {
        computation: ComputationId,
        updater: Option<Updater>,
    }

    impl UpdaterGuard {
        fn run(&mut self) {
            if let Some(ref mut updater) = self.updater {
                updater(self.computation);
            }
        }
    }

    impl Drop for UpdaterGuard {
        fn drop(&mut self) {
            if let Some(updater) = self.updater.take() {
                let arena = COMPUTATION_ARENA.read();
                if let Some(metadata) = arena.get(self.computation.index()) {
                    *metadata.updater.lock() = Some(updater);
                }
            }
        }
    }

    if tracker::is_active(computation) {
        cov_mark::hit!(update_reentered_in_read);
        tracing::warn!(
            computation = computation.index(),
            "update skipped: evaluation already in progress"
        );
        return Err(BindingError::ReentrantTracking {
            computation: computation.0,
        });
    }

    // Take the updater out of the arena
    let updater = {
        let arena = COMPUTATION_ARENA.read();
        match arena.get(computation.index()) {
            Some(metadata) => metadata.updater.lock().take(),
            None => {
                cov_mark::hit!(stale_observer_skipped);
                return Ok(());
            }
        }
    };
    // Arena lock released - the updater may subscribe or create new nodes

    let Some(updater) = updater else {
        // The updater is out right now, so this update was triggered from
        // the computation's own callback phase.
        cov_mark::hit!(update_reentered_in_callback);
        tracing::warn!(
            computation = computation.index(),
            "update skipped: previous update still running"
        );
        return Err(BindingError::ReentrantTracking {
            computation: computation.0,
        });
    };
    let mut guard = UpdaterGuard {
        computation,
        updater: Some(updater),
    };
    guard.run();
    // Guard drops here, restoring the updater to the arena
    Ok(())
}

/// Metadata for a computation stored in the arena.
///
/// Note: the typed value cache lives outside the arena in the Computation
/// handle. The arena only needs the erased closure and the bookkeeping that
/// channel teardown has to reach.
pub struct ComputationMetadata {
    /// Identity that survives slot reuse. Monotonic across the process,
    /// never handed out twice.
    uid: u64,
    /// Update closure, taken out while running so the arena lock is never
    /// held across user code.
    pub(crate) updater: Mutex<Option<Updater>>,
    /// Channels this computation subscribed to. Kept in first-subscription
    /// order so teardown and diagnostics are deterministic.
    pub(crate) sources: RwLock<SourceSet>,
}

impl ComputationMetadata {
    /// Create new computation metadata holding `updater`
    pub fn new(updater: Updater) -> Self {
        Self {
            uid: NEXT_COMPUTATION_UID.fetch_add(1, Ordering::Relaxed),
            updater: Mutex::new(Some(updater)),
            sources: RwLock::new(SourceSet::with_hasher(StableHashBuilder)),
        }
    }
}

/// Insert a computation into the arena and return its ID
pub fn computation_arena_insert(metadata: ComputationMetadata) -> ComputationId {
    let mut arena = COMPUTATION_ARENA.write();
    let entry = arena.vacant_entry();
    let key = entry.key();
    entry.insert(metadata);
    ComputationId::new(key as u32)
}

/// Remove a computation from the arena
pub fn computation_arena_remove(id: ComputationId) -> Option<ComputationMetadata> {
    let mut arena = COMPUTATION_ARENA.write();
    if arena.contains(id.index()) {
        Some(arena.remove(id.index()))
    } else {
        None
    }
}
