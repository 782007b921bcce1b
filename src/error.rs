//! Error taxonomy for the binding engine.
//!
//! Only the mutating entry points (`set`, `replace`, `update`) are fallible.
//! Reads never fail, and `observe` on a non-container value is a no-op by
//! contract rather than an error.

use thiserror::Error;

/// Errors surfaced by writes to observable fields.
///
/// Both variants describe cycles that the synchronous propagation model
/// cannot support. They are detected and reported instead of recursing:
/// the offending update is skipped (and also logged at `warn` level), while
/// the rest of the notification pass still runs in registration order.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingError {
    /// An update pass reached a computation whose evaluation is already in
    /// progress on this thread. This happens when a read expression writes
    /// to one of the computation's own dependencies: the write fans out,
    /// reaches the computation mid-evaluation, and closes a cycle.
    ///
    /// The error is returned from the write whose fan-out hit the cycle.
    #[error("computation in slot {computation} re-entered during its own evaluation")]
    ReentrantTracking {
        /// Arena slot of the computation that was mid-evaluation.
        computation: u32,
    },

    /// A field was written while its own change channel was mid-notify.
    /// Allowing the write would start a second synchronous pass over the
    /// same channel inside the first, which recurses without bound when the
    /// value keeps changing. The write is rejected before the value is
    /// stored; writes to *other* fields during a pass remain legal.
    #[error("field written during its own change notification (channel #{channel})")]
    MutationDuringNotify {
        /// Monotonic uid of the channel whose pass was interrupted.
        channel: u64,
    },
}
