//! Reactive Context
//!
//! The reactive context records which computation is currently running.
//! [`Dependency::depend`](super::Dependency::depend) reads it to find the
//! computation to register.
//!
//! # Implementation
//!
//! Each thread has one slot for the current computation and one flag saying
//! whether a computation body is executing. Both are only changed through
//! [`ReactiveContext`] guards, which put the previous values back on drop, so
//! an early return or a panic in user code cannot leave a stale computation
//! behind.
//!
//! The two are separate because [`nonreactive`](super::nonreactive) clears the
//! current computation while a body is still executing, and flushing must stay
//! forbidden there.

use std::cell::{Cell, RefCell};

use super::Computation;

thread_local! {
    static CURRENT: RefCell<Option<Computation>> = const { RefCell::new(None) };
    static IN_COMPUTE: Cell<bool> = const { Cell::new(false) };
}

/// Guard that restores the previous reactive context when dropped.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub struct ReactiveContext {
    previous: Option<Computation>,
    previous_in_compute: bool,
}

impl ReactiveContext {
    /// Make `computation` (or nothing) current until the guard is dropped.
    pub fn enter(computation: Option<Computation>) -> Self {
        let previous = CURRENT.with(|current| current.replace(computation));
        Self {
            previous,
            previous_in_compute: IN_COMPUTE.with(Cell::get),
        }
    }

    /// Like [`enter`](Self::enter), and also mark that a computation body is
    /// executing.
    pub(crate) fn enter_compute(computation: Computation) -> Self {
        let guard = Self::enter(Some(computation));
        IN_COMPUTE.with(|flag| flag.set(true));
        guard
    }

    /// Check if there is a current computation.
    pub fn is_active() -> bool {
        CURRENT.with(|current| current.borrow().is_some())
    }

    /// Get the current computation, if any.
    pub fn current() -> Option<Computation> {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Whether a computation body is executing somewhere up the call stack,
    /// even if it is hidden by `nonreactive`.
    pub fn in_compute() -> bool {
        IN_COMPUTE.with(Cell::get)
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // The slots may already be gone during thread teardown.
        let _ = CURRENT.try_with(|current| *current.borrow_mut() = previous);
        let _ = IN_COMPUTE.try_with(|flag| flag.set(self.previous_in_compute));
    }
}
