//! Thread-local record of which computation is currently evaluating.
//!
//! Reads of observable fields consult [`current`] to decide who subscribes.
//! The record is a stack rather than a single slot: constructing a
//! computation inside another's read expression pushes a new frame, so the
//! inner reads attribute to the inner computation and the outer one resumes
//! untouched when the frame pops. [`untracked`] pushes a `None` frame,
//! masking any enclosing evaluation for the duration of the closure.

use std::cell::RefCell;

use crate::arena::ComputationId;

thread_local! {
    static FRAMES: RefCell<Vec<Option<ComputationId>>> = const { RefCell::new(Vec::new()) };
}

/// The computation whose read expression is evaluating right now, if any.
pub(crate) fn current() -> Option<ComputationId> {
    FRAMES.with(|frames| frames.borrow().last().copied().flatten())
}

/// Whether `computation` has an evaluation in progress anywhere on the
/// stack, including frames shadowed by nested evaluations.
pub(crate) fn is_active(computation: ComputationId) -> bool {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .iter()
            .any(|frame| *frame == Some(computation))
    })
}

/// RAII frame on the tracking stack. Pops on drop, so the enclosing
/// evaluation is restored even if the closure inside panics.
pub(crate) struct FrameGuard {
    frame: Option<ComputationId>,
}

impl FrameGuard {
    /// Enters an evaluation frame for `computation`.
    pub(crate) fn tracked(computation: ComputationId) -> Self {
        Self::push(Some(computation))
    }

    /// Enters a masking frame: reads see no active computation.
    pub(crate) fn untracked() -> Self {
        Self::push(None)
    }

    fn push(frame: Option<ComputationId>) -> Self {
        FRAMES.with(|frames| frames.borrow_mut().push(frame));
        FrameGuard { frame }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        FRAMES.with(|frames| {
            let popped = frames.borrow_mut().pop();
            debug_assert_eq!(
                popped,
                Some(self.frame),
                "tracking frames must unwind in LIFO order"
            );
        });
    }
}

/// Runs `f` with dependency tracking suppressed.
///
/// Reads inside the closure do not subscribe the enclosing computation, so
/// later writes to those fields will not re-run it. Nesting is fine; a
/// computation constructed inside the closure still tracks its own reads.
pub fn untracked<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _frame = FrameGuard::untracked();
    f()
}
