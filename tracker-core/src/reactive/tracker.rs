//! Free functions forming the public tracker API.

use std::rc::Rc;

use super::computation::AutorunOptions;
use super::context::ReactiveContext;
use super::flusher::{self, FlushOptions};
use super::Computation;
use crate::config::TrackerConfig;
use crate::error::{IntoComputeResult, Result, TrackerError};
use crate::scheduler::Scheduler;

/// Run `func` now and again whenever its dependencies change.
///
/// `func` receives its own computation on every run. If a computation is
/// current, the new one becomes its child and is stopped when the parent is
/// invalidated.
///
/// An error from the first run stops the new computation and is returned.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use tracker_core::reactive::{autorun, flush, Dependency};
///
/// let dependency = Dependency::new();
/// let runs = Rc::new(Cell::new(0));
///
/// let (dep, counter) = (dependency.clone(), runs.clone());
/// let computation = autorun(move |_| {
///     dep.depend();
///     counter.set(counter.get() + 1);
/// })
/// .unwrap();
///
/// dependency.changed();
/// flush().unwrap();
/// assert_eq!(runs.get(), 2);
/// computation.stop();
/// ```
pub fn autorun<F, R>(func: F) -> Result<Computation>
where
    F: Fn(&Computation) -> R + 'static,
    R: IntoComputeResult,
{
    autorun_with(func, AutorunOptions::default())
}

/// [`autorun`] with options.
pub fn autorun_with<F, R>(func: F, options: AutorunOptions) -> Result<Computation>
where
    F: Fn(&Computation) -> R + 'static,
    R: IntoComputeResult,
{
    let parent = ReactiveContext::current();
    let computation = Computation::create(func, parent.as_ref(), options)?;

    if let Some(parent) = parent {
        let child = computation.clone();
        parent.on_invalidate(move |_| child.stop());
    }

    Ok(computation)
}

/// Run `func` with no current computation.
pub fn nonreactive<T>(func: impl FnOnce() -> T) -> T {
    with_computation(None, func)
}

/// Run `func` with `computation` as the current computation.
pub fn with_computation<T>(computation: Option<Computation>, func: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::enter(computation);
    func()
}

/// Register `callback` on the current computation.
pub fn on_invalidate<F>(callback: F) -> Result<()>
where
    F: FnOnce(&Computation) + 'static,
{
    let computation = ReactiveContext::current().ok_or(TrackerError::NoActiveComputation)?;
    computation.on_invalidate(callback);
    Ok(())
}

/// Run `callback` after the next flush has re-run every invalidated
/// computation, scheduling a flush if none is pending.
///
/// Callbacks run in registration order, with no current computation.
pub fn after_flush<F, R>(callback: F)
where
    F: FnOnce() -> R + 'static,
    R: IntoComputeResult,
{
    flusher::after_flush(Box::new(move || callback().into_compute_result()));
}

/// Re-run all invalidated computations and after-flush callbacks now.
///
/// Errors from computation bodies are reported, not returned. Fails if a
/// flush is already running or if called from inside a computation.
pub fn flush() -> Result<()> {
    flush_with(FlushOptions::default())
}

/// [`flush`] with options.
pub fn flush_with(options: FlushOptions) -> Result<()> {
    flusher::run_flush(true, options.throw_first_error)
}

/// Whether a computation is current.
pub fn is_active() -> bool {
    ReactiveContext::is_active()
}

pub fn current_computation() -> Option<Computation> {
    ReactiveContext::current()
}

/// Whether a flush is running on this thread.
pub fn in_flush() -> bool {
    flusher::in_flush()
}

/// Number of invalidated computations waiting for a flush.
pub fn pending_computations() -> usize {
    flusher::pending_count()
}

/// Install the configuration for this thread.
pub fn configure(config: TrackerConfig) {
    flusher::configure(config);
}

/// The configuration in effect for this thread.
pub fn config() -> TrackerConfig {
    flusher::config()
}

/// Install the scheduler used to request flushes on this thread.
pub fn set_scheduler<S>(scheduler: Rc<S>)
where
    S: Scheduler + 'static,
{
    flusher::set_scheduler(Some(scheduler as Rc<dyn Scheduler>));
}

/// Go back to this thread's default
/// [`ManualScheduler`](crate::scheduler::ManualScheduler).
pub fn reset_scheduler() {
    flusher::set_scheduler(None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn active_only_inside_computation() {
        assert!(!is_active());
        assert!(current_computation().is_none());

        let seen = Rc::new(RefCell::new(None));
        let slot = seen.clone();
        let computation = autorun(move |c| {
            assert!(is_active());
            *slot.borrow_mut() = current_computation();
            assert_eq!(current_computation().as_ref(), Some(c));
        })
        .unwrap();

        assert_eq!(*seen.borrow(), Some(computation.clone()));
        assert!(!is_active());
        computation.stop();
    }

    #[test]
    fn nonreactive_hides_current_computation() {
        let computation = autorun(|_| {
            assert!(is_active());
            nonreactive(|| assert!(!is_active()));
            assert!(is_active());
        })
        .unwrap();
        computation.stop();
    }

    #[test]
    fn on_invalidate_requires_current_computation() {
        let err = on_invalidate(|_| {}).unwrap_err();
        assert!(matches!(err, TrackerError::NoActiveComputation));
    }

    #[test]
    fn flush_inside_computation_is_rejected() {
        let seen = Rc::new(RefCell::new(None));
        let slot = seen.clone();
        let computation = autorun(move |_| {
            *slot.borrow_mut() = Some(flush());
        })
        .unwrap();

        let outcome = seen.borrow_mut().take().unwrap();
        assert!(matches!(outcome, Err(TrackerError::FlushInsideComputation)));
        computation.stop();
    }

    #[test]
    fn flush_inside_nonreactive_computation_is_still_rejected() {
        let seen = Rc::new(Cell::new(false));
        let flag = seen.clone();
        let computation = autorun(move |_| {
            let outcome = nonreactive(flush);
            flag.set(matches!(outcome, Err(TrackerError::FlushInsideComputation)));
        })
        .unwrap();

        assert!(seen.get());
        computation.stop();
    }

    #[test]
    fn after_flush_sees_no_current_computation() {
        let seen = Rc::new(RefCell::new(String::new()));
        let buf = seen.clone();
        let computation = autorun(move |_| {
            let buf = buf.clone();
            after_flush(move || buf.borrow_mut().push(if is_active() { '1' } else { '0' }));
        })
        .unwrap();

        flush().unwrap();
        assert_eq!(*seen.borrow(), "0");
        computation.stop();
    }

    #[test]
    fn in_flush_reports_flushing() {
        let seen = Rc::new(Cell::new(false));
        let flag = seen.clone();
        after_flush(move || flag.set(in_flush()));

        assert!(!in_flush());
        flush().unwrap();
        assert!(seen.get());
        assert!(!in_flush());
    }
}
