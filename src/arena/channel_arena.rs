// Channel arena - storage for change-channel metadata
//
// A change channel is the observer registry behind one instrumented field.
// The arena holds the registries; the ChangeChannel handle owns the entry
// and removes it on drop. The field's value itself never enters the arena,
// it stays in the Observable that owns the channel.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::RwLock;
use slab::Slab;

use crate::error::BindingError;
use crate::tracker;

use super::{ComputationId, run_update};

/// Global channel arena - stores all channel metadata
static CHANNEL_ARENA: RwLock<Slab<ChannelMetadata>> = RwLock::new(Slab::new());

/// Source of channel uids. Slab indices are reused after removal; uids never
/// are, so diagnostics can name a channel unambiguously.
static NEXT_CHANNEL_UID: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a change channel in the arena.
///
/// This is a zero-cost wrapper around a slab index. When the owning
/// ChangeChannel is dropped it removes itself from the arena, making this id
/// stale. Accessing a stale ChannelId returns None.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ChannelId(u32);

impl ChannelId {
    /// Create a new ChannelId from a raw index
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Convert to usize for slab indexing
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Access the channel metadata with a closure (read-only)
    ///
    /// Returns None if the channel has been removed (stale access).
    pub fn with<F, R>(self, f: F) -> Option<R>
    where
        F: FnOnce(&ChannelMetadata) -> R,
    {
        let arena = CHANNEL_ARENA.read();
        arena.get(self.index()).map(f)
    }

    /// Never-reused uid of this channel, or None if stale.
    pub fn uid(self) -> Option<u64> {
        self.with(|metadata| metadata.uid)
    }

    /// Register this channel as a dependency of the evaluating computation.
    ///
    /// Consults the tracker; outside an evaluation this is a no-op. The
    /// computation's source set decides whether the pair is new: only a
    /// first-time pair appends an observer entry, so re-reading a field
    /// inside one expression cannot double-subscribe.
    pub fn track_dependency(self) {
        let Some(computation) = tracker::current() else {
            return;
        };
        if computation.add_source(self) {
            self.add_observer(computation);
            tracing::trace!(
                channel = self.index(),
                computation = computation.index(),
                "dependency registered"
            );
        } else {
            cov_mark::hit!(duplicate_subscription_ignored);
        }
    }

    /// Append an observer to this channel.
    ///
    /// The list keeps registration order and the append is unconditional.
    /// Dedup happens on the computation side, see track_dependency.
    pub fn add_observer(self, computation: ComputationId) {
        self.with(|metadata| {
            let mut observers = metadata.observers.write();
            observers.push(computation);
        });
    }

    /// Remove the first occurrence of an observer from this channel.
    pub fn remove_observer(self, computation: ComputationId) {
        self.with(|metadata| {
            let mut observers = metadata.observers.write();
            if let Some(position) = observers.iter().position(|entry| *entry == computation) {
                observers.remove(position);
            }
        });
    }

    /// Number of registered observers, or None if stale.
    #[cfg(test)]
    pub fn observer_count(self) -> Option<usize> {
        self.with(|metadata| metadata.observers.read().len())
    }

    /// Whether a notification pass over this channel is in progress.
    pub fn is_notifying(self) -> bool {
        self.with(|metadata| metadata.notify_depth.load(Ordering::Relaxed) > 0)
            .unwrap_or(false)
    }

    /// Run one notification pass over this channel's observers.
    ///
    /// The observer list is snapshotted up front: subscriptions and removals
    /// made by callbacks during the pass affect the next pass, not this one.
    /// An observer disposed mid-pass resolves to a stale id inside
    /// run_update and is skipped; if its slot was already recycled by a
    /// computation created during the pass, the uid recorded at snapshot
    /// time no longer matches and the slot is skipped without running the
    /// new occupant. An erroring observer does not stop the pass; the first
    /// error is kept and returned once every snapshotted observer had its
    /// turn.
    pub fn notify(self) -> Result<(), BindingError> {
        let Some(observers) = self.with(|metadata| metadata.observers.read().clone()) else {
            return Ok(());
        };
        if observers.is_empty() {
            return Ok(());
        }
        cov_mark::hit!(notify_uses_snapshot);
        tracing::trace!(
            channel = self.index(),
            observers = observers.len(),
            "notifying observers"
        );
        // Pair each observer with its uid so a slot freed and reoccupied
        // during the pass is distinguishable from the computation that was
        // snapshotted into it.
        let snapshot: Vec<(ComputationId, Option<u64>)> = observers
            .into_iter()
            .map(|observer| (observer, observer.uid()))
            .collect();

        let _pass = NotifyGuard::begin(self);
        let mut first_error = None;
        for (observer, uid) in snapshot {
            let current = observer.uid();
            if current.is_some() && current != uid {
                cov_mark::hit!(recycled_slot_skipped);
                tracing::trace!(
                    channel = self.index(),
                    computation = observer.index(),
                    "observer slot recycled mid-pass, skipping"
                );
                continue;
            }
            if let Err(error) = run_update(observer) {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }
}

/// RAII marker for an in-progress notification pass over one channel.
/// Decrements on drop so the mid-notify flag clears even if a callback
/// panics through the pass.
struct NotifyGuard {
    channel: ChannelId,
}

impl NotifyGuard {
    fn begin(channel: ChannelId) -> Self {
        channel.with(|metadata| metadata.notify_depth.fetch_add(1, Ordering::Relaxed));
        NotifyGuard { channel }
    }
}

impl Drop for NotifyGuard {
    fn drop(&mut self) {
        self.channel
            .with(|metadata| metadata.notify_depth.fetch_sub(1, Ordering::Relaxed));
    }
}

/// Metadata for a change channel stored in the arena.
#[derive(Debug)]
pub struct ChannelMetadata {
    /// Identity for diagnostics. Monotonic across the process, never reused.
    uid: u64,
    /// Observers in registration order. Notification walks a snapshot of
    /// this list front to back.
    pub(crate) observers: RwLock<Vec<ComputationId>>,
    /// Depth of in-progress notification passes over this channel.
    notify_depth: AtomicU32,
}

impl ChannelMetadata {
    /// Create new channel metadata with a fresh uid
    pub fn new() -> Self {
        Self {
            uid: NEXT_CHANNEL_UID.fetch_add(1, Ordering::Relaxed),
            observers: RwLock::new(Vec::new()),
            notify_depth: AtomicU32::new(0),
        }
    }
}

impl Default for ChannelMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert a channel into the arena and return its ID
pub fn channel_arena_insert(metadata: ChannelMetadata) -> ChannelId {
    let mut arena = CHANNEL_ARENA.write();
    let entry = arena.vacant_entry();
    let key = entry.key();
    entry.insert(metadata);
    ChannelId::new(key as u32)
}

/// Remove a channel from the arena
pub fn channel_arena_remove(id: ChannelId) -> Option<ChannelMetadata> {
    let mut arena = CHANNEL_ARENA.write();
    if arena.contains(id.index()) {
        Some(arena.remove(id.index()))
    } else {
        None
    }
}
