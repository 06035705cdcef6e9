//! Computation Implementation
//!
//! A Computation is one unit of reactive, re-runnable work created by
//! [`autorun`](super::autorun).
//!
//! # How Computations Work
//!
//! 1. When created, the computation runs its function immediately. While it
//!    runs it is the current computation, so every
//!    [`Dependency::depend`](super::Dependency::depend) call registers it.
//!
//! 2. When a dependency changes, the computation is invalidated: its
//!    invalidation callbacks fire at once, and it is queued with the flusher.
//!
//! 3. The next flush re-runs it, collecting a fresh set of dependencies.
//!
//! A stopped computation never runs again.
//!
//! # State
//!
//! ```text
//! fresh -> running(first) -> valid <-> invalidated -> running -> valid
//!                    \__________________________________/
//!                                  |
//!                               stopped
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::flusher;
use super::id::ComputationId;
use super::nonreactive;
use crate::debug::ErrorOrigin;
use crate::error::{BoxError, IntoComputeResult, Result, TrackerError};

type ComputeFn = Rc<dyn Fn(&Computation) -> std::result::Result<(), BoxError>>;
type Callback = Box<dyn FnOnce(&Computation)>;
type ErrorHandler = Rc<dyn Fn(BoxError)>;

/// Options accepted by [`autorun_with`](super::autorun_with).
#[derive(Default, Clone)]
pub struct AutorunOptions {
    on_error: Option<ErrorHandler>,
}

impl AutorunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive errors returned by the computation body during re-runs.
    ///
    /// With a handler installed the error is considered dealt with: it is not
    /// reported and does not stop the computation or the flush.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(BoxError) + 'static,
    {
        self.on_error = Some(Rc::new(handler));
        self
    }
}

impl fmt::Debug for AutorunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutorunOptions")
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

struct Inner {
    id: ComputationId,
    stopped: Cell<bool>,
    invalidated: Cell<bool>,
    first_run: Cell<bool>,
    recomputing: Cell<bool>,
    on_invalidate: RefCell<SmallVec<[Callback; 4]>>,
    on_stop: RefCell<SmallVec<[Callback; 1]>>,
    parent: Option<Weak<Inner>>,
    func: ComputeFn,
    on_error: Option<ErrorHandler>,
}

/// Handle to a reactive computation.
///
/// Handles are cheap to clone and compare equal when they refer to the same
/// computation.
#[derive(Clone)]
pub struct Computation {
    inner: Rc<Inner>,
}

impl Computation {
    /// Create a computation and perform its first run.
    ///
    /// An error from the first run stops the computation and is returned; the
    /// `on_error` handler only covers re-runs.
    pub(crate) fn create<F, R>(
        func: F,
        parent: Option<&Computation>,
        options: AutorunOptions,
    ) -> Result<Self>
    where
        F: Fn(&Computation) -> R + 'static,
        R: IntoComputeResult,
    {
        let computation = Self {
            inner: Rc::new(Inner {
                id: ComputationId::new(),
                stopped: Cell::new(false),
                invalidated: Cell::new(false),
                first_run: Cell::new(true),
                recomputing: Cell::new(false),
                on_invalidate: RefCell::new(SmallVec::new()),
                on_stop: RefCell::new(SmallVec::new()),
                parent: parent.map(|parent| Rc::downgrade(&parent.inner)),
                func: Rc::new(move |c: &Computation| func(c).into_compute_result()),
                on_error: options.on_error,
            }),
        };

        let outcome = computation.compute();
        computation.inner.first_run.set(false);
        if let Err(source) = outcome {
            tracing::debug!(id = %computation.id(), "first run failed, stopping computation");
            computation.stop();
            return Err(TrackerError::Computation { source });
        }

        Ok(computation)
    }

    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.get()
    }

    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.get()
    }

    /// True only while the function runs for the very first time.
    pub fn is_first_run(&self) -> bool {
        self.inner.first_run.get()
    }

    /// The computation that was current when this one was created.
    ///
    /// Returns `None` for top-level computations and once the parent handle
    /// has been dropped everywhere.
    pub fn parent(&self) -> Option<Computation> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Computation { inner })
    }

    /// Register `callback` to run the next time this computation is
    /// invalidated. If it already is, the callback runs immediately.
    ///
    /// Callbacks run with no current computation.
    pub fn on_invalidate<F>(&self, callback: F)
    where
        F: FnOnce(&Computation) + 'static,
    {
        if self.is_invalidated() {
            nonreactive(|| callback(self));
        } else {
            self.inner.on_invalidate.borrow_mut().push(Box::new(callback));
        }
    }

    /// Register `callback` to run when this computation is stopped. If it
    /// already is, the callback runs immediately.
    pub fn on_stop<F>(&self, callback: F)
    where
        F: FnOnce(&Computation) + 'static,
    {
        if self.is_stopped() {
            nonreactive(|| callback(self));
        } else {
            self.inner.on_stop.borrow_mut().push(Box::new(callback));
        }
    }

    /// Mark the computation as needing a re-run.
    ///
    /// Invalidation callbacks fire synchronously. Unless the computation is
    /// stopped or currently re-running, it is queued for the next flush.
    /// Calling this on an invalidated computation does nothing.
    pub fn invalidate(&self) {
        if self.is_invalidated() {
            return;
        }

        // A computation invalidated during its own re-run is requeued by the
        // flusher once the run returns.
        if !self.inner.recomputing.get() && !self.is_stopped() {
            flusher::enqueue(self.clone());
        }

        self.inner.invalidated.set(true);

        let callbacks = std::mem::take(&mut *self.inner.on_invalidate.borrow_mut());
        for callback in callbacks {
            nonreactive(|| callback(self));
        }
    }

    /// Stop the computation for good. Safe to call any number of times, from
    /// anywhere, including the computation's own body.
    pub fn stop(&self) {
        if self.is_stopped() {
            return;
        }

        self.inner.stopped.set(true);
        self.invalidate();

        let callbacks = std::mem::take(&mut *self.inner.on_stop.borrow_mut());
        for callback in callbacks {
            nonreactive(|| callback(self));
        }
    }

    /// Invalidate, then re-run right away through [`flush`](Self::flush).
    ///
    /// From inside the computation's own re-run this only invalidates; the
    /// re-run follows once the current one returns. Errors from the body
    /// follow the same policy as during a flush.
    pub fn run(&self) -> Result<()> {
        self.invalidate();
        self.flush()
    }

    /// Re-run this computation now if it is invalidated and not stopped,
    /// without flushing anything else.
    pub fn flush(&self) -> Result<()> {
        if self.inner.recomputing.get() {
            return Ok(());
        }
        self.recompute()
    }

    pub(crate) fn needs_recompute(&self) -> bool {
        self.is_invalidated() && !self.is_stopped()
    }

    /// Re-run if needed, routing a body error to `on_error` or the flusher's
    /// throw-or-log policy.
    pub(crate) fn recompute(&self) -> Result<()> {
        let _recomputing = RecomputingGuard::new(&self.inner.recomputing);
        if !self.needs_recompute() {
            return Ok(());
        }

        match self.compute() {
            Ok(()) => Ok(()),
            Err(error) => match &self.inner.on_error {
                Some(handler) => {
                    handler(error);
                    Ok(())
                }
                None => flusher::throw_or_log(ErrorOrigin::Recompute, error),
            },
        }
    }

    fn compute(&self) -> std::result::Result<(), BoxError> {
        self.inner.invalidated.set(false);

        let func = Rc::clone(&self.inner.func);
        let _ctx = ReactiveContext::enter_compute(self.clone());
        func(self)
    }
}

/// Sets the recomputing flag, restoring its previous value on drop.
struct RecomputingGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> RecomputingGuard<'a> {
    fn new(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for RecomputingGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

impl PartialEq for Computation {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Computation {}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.id())
            .field("stopped", &self.is_stopped())
            .field("invalidated", &self.is_invalidated())
            .field("first_run", &self.is_first_run())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{autorun, autorun_with, flush, Dependency};

    #[test]
    fn computation_runs_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let counter = run_count.clone();

        let computation = autorun(move |c| {
            assert!(c.is_first_run());
            counter.set(counter.get() + 1);
        })
        .unwrap();

        assert_eq!(run_count.get(), 1);
        assert!(!computation.is_first_run());
        assert!(!computation.is_invalidated());
        assert!(!computation.is_stopped());
    }

    #[test]
    fn invalidate_fires_callbacks_once() {
        let computation = autorun(|_| {}).unwrap();
        let fired = Rc::new(Cell::new(0));

        let counter = fired.clone();
        computation.on_invalidate(move |_| counter.set(counter.get() + 1));

        computation.invalidate();
        computation.invalidate();
        assert_eq!(fired.get(), 1);
        assert!(computation.is_invalidated());

        flush().unwrap();
        assert!(!computation.is_invalidated());
        computation.stop();
    }

    #[test]
    fn on_invalidate_after_invalidation_fires_immediately() {
        let computation = autorun(|_| {}).unwrap();
        computation.invalidate();

        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        computation.on_invalidate(move |_| flag.set(true));
        assert!(fired.get());

        computation.stop();
        flush().unwrap();
    }

    #[test]
    fn stop_fires_invalidate_then_stop_callbacks() {
        let computation = autorun(|_| {}).unwrap();
        let order = Rc::new(RefCell::new(String::new()));

        let buf = order.clone();
        computation.on_stop(move |_| buf.borrow_mut().push('s'));
        let buf = order.clone();
        computation.on_invalidate(move |_| buf.borrow_mut().push('i'));

        computation.stop();
        computation.stop();
        assert_eq!(*order.borrow(), "is");
        assert!(computation.is_stopped());

        // Registering after the fact catches up immediately.
        let buf = order.clone();
        computation.on_stop(move |_| buf.borrow_mut().push('S'));
        assert_eq!(*order.borrow(), "isS");
    }

    #[test]
    fn stopped_computation_does_not_rerun() {
        let run_count = Rc::new(Cell::new(0));
        let counter = run_count.clone();
        let computation = autorun(move |_| counter.set(counter.get() + 1)).unwrap();

        computation.stop();
        computation.invalidate();
        flush().unwrap();
        computation.flush().unwrap();
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn first_run_error_stops_computation() {
        let result = autorun(|_| -> std::result::Result<(), BoxError> { Err("first".into()) });

        match result {
            Err(TrackerError::Computation { source }) => assert_eq!(source.to_string(), "first"),
            other => panic!("expected a computation error, got {other:?}"),
        }
    }

    #[test]
    fn on_error_receives_rerun_errors() {
        let dependency = Dependency::new();
        let errors = Rc::new(RefCell::new(Vec::new()));

        let dep = dependency.clone();
        let sink = errors.clone();
        let computation = autorun_with(
            move |c| -> std::result::Result<(), BoxError> {
                dep.depend();
                if c.is_first_run() {
                    Ok(())
                } else {
                    Err("foo".into())
                }
            },
            AutorunOptions::new().on_error(move |err| sink.borrow_mut().push(err.to_string())),
        )
        .unwrap();

        dependency.changed();
        flush().unwrap();
        assert_eq!(*errors.borrow(), vec!["foo"]);
        assert!(!computation.is_stopped());

        dependency.changed();
        flush().unwrap();
        assert_eq!(errors.borrow().len(), 2);
        computation.stop();
    }

    #[test]
    fn run_from_own_rerun_does_not_nest() {
        let dependency = Dependency::new();
        let runs = Rc::new(Cell::new(0));
        let depth = Rc::new(Cell::new(0));
        let max_depth = Rc::new(Cell::new(0));

        let (dep, counter, level, deepest) =
            (dependency.clone(), runs.clone(), depth.clone(), max_depth.clone());
        let computation = autorun(move |c| {
            dep.depend();
            level.set(level.get() + 1);
            deepest.set(deepest.get().max(level.get()));
            counter.set(counter.get() + 1);
            if counter.get() == 2 {
                c.run().unwrap();
                assert!(c.is_invalidated());
            }
            level.set(level.get() - 1);
        })
        .unwrap();

        dependency.changed();
        flush().unwrap();
        assert_eq!(max_depth.get(), 1);
        assert_eq!(runs.get(), 3);
        assert!(!computation.is_invalidated());
        assert_eq!(flusher::pending_count(), 0);
        computation.stop();
    }

    #[test]
    fn recomputing_guard_restores_previous_value() {
        let flag = Cell::new(true);
        {
            let _guard = RecomputingGuard::new(&flag);
            assert!(flag.get());
        }
        assert!(flag.get());

        let flag = Cell::new(false);
        drop(RecomputingGuard::new(&flag));
        assert!(!flag.get());
    }

    #[test]
    fn parent_is_recorded() {
        let child = Rc::new(RefCell::new(None));
        let slot = child.clone();
        let parent = autorun(move |_| {
            *slot.borrow_mut() = Some(autorun(|_| {}).unwrap());
        })
        .unwrap();

        let child = child.borrow().clone().unwrap();
        assert_eq!(child.parent(), Some(parent.clone()));
        assert_eq!(parent.parent(), None);

        parent.stop();
        assert!(child.is_stopped());
    }

    #[test]
    fn clone_shares_state() {
        let computation1 = autorun(|_| {}).unwrap();
        let computation2 = computation1.clone();

        assert_eq!(computation1, computation2);
        assert_eq!(computation1.id(), computation2.id());

        computation1.stop();
        assert!(computation2.is_stopped());
    }
}
