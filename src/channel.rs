use crate::arena::{ChannelId, ChannelMetadata, channel_arena_insert, channel_arena_remove};
use crate::error::BindingError;

/// Owning handle for one field's change channel.
///
/// A channel is just 4 bytes of id - the observer registry lives in the
/// arena and the field's value stays wherever the owning Observable keeps
/// it. The handle's job is lifetime: it allocates the arena entry on
/// creation and tears it down on drop, unsubscribing every observer so no
/// computation is left holding a reused slot.
pub(crate) struct ChangeChannel {
    id: ChannelId,
}

impl ChangeChannel {
    /// Create a new channel and allocate it in the arena
    pub(crate) fn new() -> Self {
        let id = channel_arena_insert(ChannelMetadata::new());
        tracing::debug!(channel = id.index(), "change channel attached");
        ChangeChannel { id }
    }

    /// Get the arena id for this channel (internal use only)
    #[cfg(test)]
    pub(crate) fn id(&self) -> ChannelId {
        self.id
    }

    /// Never-reused uid, for diagnostics and error payloads.
    ///
    /// The arena entry is alive for as long as this handle exists, so the
    /// uid is always resolvable here.
    pub(crate) fn uid(&self) -> u64 {
        self.id.uid().unwrap_or_default()
    }

    /// Register this channel with the currently evaluating computation.
    pub(crate) fn track_dependency(&self) {
        self.id.track_dependency();
    }

    /// Whether a notification pass over this channel is in progress.
    pub(crate) fn is_notifying(&self) -> bool {
        self.id.is_notifying()
    }

    /// Notify every registered observer in registration order.
    pub(crate) fn notify(&self) -> Result<(), BindingError> {
        self.id.notify()
    }
}

impl Drop for ChangeChannel {
    fn drop(&mut self) {
        // Unhook every observer before the slot is reused.
        let observers = self
            .id
            .with(|metadata| metadata.observers.read().clone())
            .unwrap_or_default();
        for observer in observers {
            observer.remove_source(self.id);
        }

        // Deallocate from arena
        channel_arena_remove(self.id);
    }
}

// NOTE: ChangeChannel intentionally does NOT implement Clone.
// This is a single-ownership model - cloning would create double-free risk
// when two handles both try to deallocate the same arena slot. The copyable
// ChannelId exists for shared, stale-tolerant references.
