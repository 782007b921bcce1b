use std::sync::Arc;

use parking_lot::RwLock;

use crate::arena::{
    ComputationId, ComputationMetadata, computation_arena_insert, computation_arena_remove,
    run_update,
};
use crate::tracker::FrameGuard;

/// A change-gated reader: evaluates a value expression, remembers the
/// result, and runs a callback whenever re-evaluation produces a different
/// value.
///
/// # How it works
/// Construction runs the expression once under a tracking frame. Every
/// [`Observable`](crate::Observable) read during that evaluation subscribes
/// this computation to the field's change channel. From then on, a write to
/// any subscribed field re-runs the expression synchronously. If the fresh
/// value differs from the cached one (`T: PartialEq`), the cache is
/// replaced and the callback receives `(new, old)`; an equal result is
/// absorbed and the callback stays quiet.
///
/// Dependencies are discovered, not declared: re-reading a field inside one
/// expression still subscribes once, and reads performed in the callback or
/// under [`untracked`](crate::untracked) subscribe nothing. The seed
/// evaluation never runs the callback - there is no old value to compare
/// against yet.
///
/// Dropping the computation, or handing it to [`dispose`](Self::dispose),
/// detaches it from every channel; later writes no longer reach it, even
/// writes from a notification pass already in progress.
///
/// # Example
/// ```ignore
/// let profile = Arc::new(Profile {
///     name: Observable::new("Ann".to_string()),
/// });
/// observe(&*profile);
///
/// let source = profile.clone();
/// let label = Computation::new(
///     move || source.name.get(),
///     |new, old| println!("{old} -> {new}"),
/// );
///
/// profile.name.set("Bob".to_string())?; // prints "Ann -> Bob"
/// profile.name.set("Bob".to_string())?; // unchanged, prints nothing
/// ```
pub struct Computation<T> {
    id: ComputationId,
    /// Cached result of the last evaluation. Lives outside the arena; the
    /// updater closure holds the other reference.
    value: Arc<RwLock<Option<T>>>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Computation<T> {
    /// Create a computation and run its seed evaluation.
    ///
    /// `read` is the value expression; `callback` receives `(new, old)`
    /// whenever a re-evaluation changes the value. Construction itself is
    /// infallible: errors raised by writes inside the expression surface at
    /// those write sites, not here.
    pub fn new<F, C>(read: F, callback: C) -> Self
    where
        F: FnMut() -> T + Send + 'static,
        C: FnMut(&T, &T) + Send + 'static,
    {
        let value: Arc<RwLock<Option<T>>> = Arc::new(RwLock::new(None));

        let cache = value.clone();
        let mut read = read;
        let mut callback = callback;
        let updater = Box::new(move |id: ComputationId| {
            // Reads subscribe only while the expression evaluates. The
            // callback below runs outside the frame, so its reads track
            // nothing, matching how it can freely inspect other fields.
            let fresh = {
                let _frame = FrameGuard::tracked(id);
                read()
            };

            let previous = {
                let mut slot = cache.write();
                match slot.as_ref() {
                    Some(old) if *old == fresh => {
                        cov_mark::hit!(unchanged_value_skips_callback);
                        return;
                    }
                    _ => slot.replace(fresh.clone()),
                }
            };
            // Cache lock released before user code runs.

            if let Some(old) = previous {
                callback(&fresh, &old);
            }
        });

        let id = computation_arena_insert(ComputationMetadata::new(updater));
        let computation = Computation { id, value };

        // Seed run: evaluates the expression, subscribes to everything it
        // reads and fills the cache. A freshly inserted id cannot be
        // mid-update, so this reports no error. The handle is built first:
        // if the expression panics, unwinding drops it and its Drop frees
        // the entry and whatever subscribed before the panic.
        let _ = run_update(id);
        tracing::trace!(computation = id.index(), "computation created");

        computation
    }

    /// The cached result of the most recent evaluation.
    ///
    /// This is a plain peek: it does not re-evaluate and does not subscribe
    /// the caller to anything.
    pub fn value(&self) -> T {
        self.value
            .read()
            .clone()
            .expect("computation value should always be set after creation")
    }

    /// Detach from all subscribed channels and discard the computation.
    ///
    /// Equivalent to dropping it; the explicit form reads better at call
    /// sites that end a binding's life deliberately.
    pub fn dispose(self) {
        drop(self);
    }

    /// Arena id of this computation (internal use only)
    #[cfg(test)]
    pub(crate) fn id(&self) -> ComputationId {
        self.id
    }
}

impl<T> Drop for Computation<T> {
    fn drop(&mut self) {
        // Unsubscribe from every source channel before the slot is freed,
        // so channels never notify into a reused index.
        let sources = self
            .id
            .with_sources(|sources| sources.iter().copied().collect::<Vec<_>>());
        if let Some(sources) = sources {
            for channel in sources {
                channel.remove_observer(self.id);
            }
        }

        computation_arena_remove(self.id);
        tracing::trace!(computation = self.id.index(), "computation disposed");
    }
}

// NOTE: Computation intentionally does NOT implement Clone.
// The handle owns the arena entry; cloning would tear the entry down twice.
// Share the cached value through Computation::value instead.
