//! Flusher
//!
//! The flusher is the central coordinator for re-running invalidated
//! computations. Each thread owns one, holding:
//!
//! - the queue of computations waiting to re-run,
//! - the queue of after-flush callbacks,
//! - the flags that guard against reentrant flushing.
//!
//! # How a Flush Works
//!
//! 1. Invalidating a computation outside a flush queues it and asks the
//!    scheduler for a flush on the next tick ([`require_flush`]).
//!
//! 2. A flush repeatedly:
//!    a. re-runs queued computations in FIFO order until the queue is empty
//!       (computations invalidated along the way join the queue),
//!    b. pops and runs one after-flush callback.
//!
//!    It stops when both queues are empty, so every after-flush callback sees
//!    no pending computations.
//!
//!    At most one scheduled flush task is outstanding at a time. An explicit
//!    flush that runs first leaves it with nothing to do, and the next
//!    invalidation reuses it instead of queueing another.
//!
//! 3. A flush started by the scheduler yields after
//!    [`TrackerConfig::yield_threshold`](crate::config::TrackerConfig)
//!    recomputations and asks for another pass. An explicit flush always runs
//!    to completion.
//!
//! # Reentrancy
//!
//! Flushing while a flush is in progress, or from inside a computation body,
//! is rejected with a [`TrackerError`]. No `RefCell` borrow is held while user
//! code runs, so user code may freely invalidate, queue callbacks and create
//! computations.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::Computation;
use crate::config::TrackerConfig;
use crate::debug::{self, ErrorOrigin};
use crate::error::{BoxError, Result, TrackerError};
use crate::scheduler::{ManualScheduler, Scheduler};

pub(crate) type AfterFlushFn = Box<dyn FnOnce() -> std::result::Result<(), BoxError>>;

/// Options for an explicit [`flush_with`](super::flush_with).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushOptions {
    /// Return the first unhandled error from a computation body or
    /// after-flush callback instead of only reporting it. The flush still
    /// finishes before the error is returned.
    pub throw_first_error: bool,
}

impl FlushOptions {
    pub fn throw_first_error() -> Self {
        Self {
            throw_first_error: true,
        }
    }
}

#[derive(Default)]
struct Flusher {
    pending: RefCell<VecDeque<Computation>>,
    after_flush: RefCell<VecDeque<AfterFlushFn>>,
    will_flush: Cell<bool>,
    task_queued: Cell<bool>,
    generation: Cell<u64>,
    in_flush: Cell<bool>,
    throw_first_error: Cell<bool>,
    config: RefCell<TrackerConfig>,
    scheduler: RefCell<Option<Rc<dyn Scheduler>>>,
}

impl Flusher {
    fn scheduler(&self) -> Rc<dyn Scheduler> {
        match &*self.scheduler.borrow() {
            Some(scheduler) => Rc::clone(scheduler),
            None => ManualScheduler::thread_default() as Rc<dyn Scheduler>,
        }
    }

    fn has_pending_work(&self) -> bool {
        !self.pending.borrow().is_empty() || !self.after_flush.borrow().is_empty()
    }
}

thread_local! {
    static FLUSHER: Flusher = Flusher::default();
}

/// Clears the flushing flags when a flush ends, however it ends.
struct FlushingGuard;

impl FlushingGuard {
    fn begin(throw_first_error: bool) -> Self {
        FLUSHER.with(|flusher| {
            flusher.in_flush.set(true);
            flusher.will_flush.set(true);
            flusher.throw_first_error.set(throw_first_error);
        });
        Self
    }
}

impl Drop for FlushingGuard {
    fn drop(&mut self) {
        let _ = FLUSHER.try_with(|flusher| {
            flusher.will_flush.set(false);
            flusher.in_flush.set(false);
            flusher.throw_first_error.set(false);
        });
    }
}

pub(crate) fn in_flush() -> bool {
    FLUSHER.with(|flusher| flusher.in_flush.get())
}

pub(crate) fn configure(config: TrackerConfig) {
    FLUSHER.with(|flusher| *flusher.config.borrow_mut() = config);
}

pub(crate) fn config() -> TrackerConfig {
    FLUSHER.with(|flusher| flusher.config.borrow().clone())
}

/// Swap the scheduler. A task queued on the old one goes stale, and a flush
/// that was waiting on it is requested again from the new one.
pub(crate) fn set_scheduler(scheduler: Option<Rc<dyn Scheduler>>) {
    let rearm = FLUSHER.with(|flusher| {
        *flusher.scheduler.borrow_mut() = scheduler;
        flusher.generation.set(flusher.generation.get().wrapping_add(1));
        flusher.task_queued.set(false);
        let waiting = flusher.will_flush.get() && !flusher.in_flush.get();
        if waiting {
            flusher.will_flush.set(false);
        }
        waiting
    });

    if rearm {
        require_flush();
    }
}

/// Number of computations waiting to re-run.
pub(crate) fn pending_count() -> usize {
    FLUSHER.with(|flusher| flusher.pending.borrow().len())
}

/// Ask the scheduler for a flush on the next tick, unless one is already
/// scheduled or running.
pub(crate) fn require_flush() {
    let scheduled = FLUSHER.with(|flusher| {
        if flusher.will_flush.get() {
            return None;
        }
        flusher.will_flush.set(true);
        if flusher.task_queued.replace(true) {
            // The task left behind by an earlier explicit flush will do.
            return None;
        }
        Some((flusher.scheduler(), flusher.generation.get()))
    });

    if let Some((scheduler, generation)) = scheduled {
        tracing::trace!(generation, "scheduling flush");
        scheduler.schedule(
            Box::new(move || scheduled_flush(generation)),
            std::time::Duration::ZERO,
        );
    }
}

fn scheduled_flush(generation: u64) {
    let wanted = FLUSHER.with(|flusher| {
        if flusher.generation.get() != generation {
            return false;
        }
        flusher.task_queued.set(false);
        flusher.will_flush.get()
    });
    if !wanted {
        return;
    }

    match run_flush(false, false) {
        Ok(()) => {}
        Err(error @ TrackerError::FlushInsideComputation) => {
            // The host ticked from inside a computation body. Nothing ran,
            // so ask for another tick.
            debug::report(ErrorOrigin::Flush, &error);
            FLUSHER.with(|flusher| flusher.will_flush.set(false));
            require_flush();
        }
        Err(error) => debug::report(ErrorOrigin::Flush, &error),
    }
}

/// Queue an invalidated computation for re-running.
pub(crate) fn enqueue(computation: Computation) {
    require_flush();
    FLUSHER.with(|flusher| flusher.pending.borrow_mut().push_back(computation));
}

pub(crate) fn after_flush(callback: AfterFlushFn) {
    FLUSHER.with(|flusher| flusher.after_flush.borrow_mut().push_back(callback));
    require_flush();
}

/// Return `error` if the current flush asked for its first error, otherwise
/// report it and carry on.
pub(crate) fn throw_or_log(origin: ErrorOrigin, error: BoxError) -> Result<()> {
    if FLUSHER.with(|flusher| flusher.throw_first_error.get()) {
        return Err(match origin {
            ErrorOrigin::AfterFlush => TrackerError::AfterFlush { source: error },
            ErrorOrigin::Recompute | ErrorOrigin::Flush => {
                TrackerError::Computation { source: error }
            }
        });
    }
    debug::report(origin, &*error);
    Ok(())
}

/// Run a flush.
///
/// `finish_synchronously` is set for explicit flushes, which never yield.
pub(crate) fn run_flush(finish_synchronously: bool, throw_first_error: bool) -> Result<()> {
    if in_flush() {
        return Err(TrackerError::FlushWhileFlushing);
    }
    if ReactiveContext::in_compute() {
        return Err(TrackerError::FlushInsideComputation);
    }

    let yield_threshold = (!finish_synchronously).then(|| config().yield_threshold);
    let outcome = {
        let _flushing = FlushingGuard::begin(throw_first_error);
        match drain(yield_threshold) {
            Ok(()) => Ok(()),
            Err(error) => {
                // The caller gets the first error, but only after the rest
                // of the flush has run.
                tracing::debug!(%error, "finishing flush after first error");
                FLUSHER.with(|flusher| flusher.throw_first_error.set(false));
                if let Err(again) = drain(yield_threshold) {
                    debug::report(ErrorOrigin::Flush, &again);
                }
                Err(error)
            }
        }
    };

    if FLUSHER.with(Flusher::has_pending_work) {
        if finish_synchronously {
            tracing::warn!("explicit flush finished with work outstanding");
            require_flush();
        } else {
            schedule_retry();
        }
    }

    outcome
}

/// Drain both queues. Stops early only if `yield_threshold` recomputations
/// have happened or an error is thrown.
fn drain(yield_threshold: Option<usize>) -> Result<()> {
    let mut recomputed = 0usize;
    tracing::trace!(pending = pending_count(), "flush pass started");

    loop {
        while let Some(computation) = pop_pending() {
            let outcome = computation.recompute();
            if computation.needs_recompute() {
                // Invalidated during its own run: it goes next.
                FLUSHER.with(|flusher| flusher.pending.borrow_mut().push_front(computation));
            }
            outcome?;

            recomputed += 1;
            if let Some(threshold) = yield_threshold {
                if recomputed > threshold {
                    tracing::debug!(recomputed, "yielding scheduled flush");
                    return Ok(());
                }
            }
        }

        let Some(callback) = pop_after_flush() else {
            tracing::trace!(recomputed, "flush pass finished");
            return Ok(());
        };
        if let Err(error) = callback() {
            throw_or_log(ErrorOrigin::AfterFlush, error)?;
        }
    }
}

fn pop_pending() -> Option<Computation> {
    FLUSHER.with(|flusher| flusher.pending.borrow_mut().pop_front())
}

fn pop_after_flush() -> Option<AfterFlushFn> {
    FLUSHER.with(|flusher| flusher.after_flush.borrow_mut().pop_front())
}

fn schedule_retry() {
    let (scheduler, delay) =
        FLUSHER.with(|flusher| (flusher.scheduler(), flusher.config.borrow().retry_delay()));
    scheduler.schedule(Box::new(require_flush), delay);
}
