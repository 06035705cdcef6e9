//! Next-Tick Scheduling
//!
//! The tracker never flushes inline when something is invalidated outside a
//! flush. It asks the host to run the flush "as soon as possible, but not
//! nested inside the current synchronous execution". This module defines
//! that host primitive.
//!
//! # Implementations
//!
//! - [`ManualScheduler`] queues tasks until the host drains them with
//!   [`ManualScheduler::run_pending`]. Each thread starts out using its own
//!   default instance, reachable through [`run_pending`].
//! - [`TokioScheduler`] spawns tasks onto the current `tokio::task::LocalSet`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Host primitive for deferring work to a later tick.
pub trait Scheduler {
    /// Run `task` once, asynchronously, no earlier than `delay` from now.
    ///
    /// Must never run `task` synchronously from inside this call.
    fn schedule(&self, task: Task, delay: Duration);
}

/// A scheduler whose queue is drained explicitly by the host.
///
/// Delay hints are ignored: every queued task runs on the next call to
/// [`run_pending`](Self::run_pending).
#[derive(Default)]
pub struct ManualScheduler {
    tasks: RefCell<VecDeque<Task>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The scheduler the tracker uses on this thread unless another one is
    /// installed with [`crate::reactive::set_scheduler`].
    pub fn thread_default() -> Rc<Self> {
        thread_local! {
            static DEFAULT: Rc<ManualScheduler> = Rc::new(ManualScheduler::new());
        }
        DEFAULT.with(Rc::clone)
    }

    /// Number of tasks waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Run one tick: every task queued before this call, in FIFO order.
    ///
    /// Tasks scheduled while the tick runs wait for the next call. Returns the
    /// number of tasks run.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.tasks.borrow_mut());
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: Task, _delay: Duration) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Run one tick of this thread's default [`ManualScheduler`].
pub fn run_pending() -> usize {
    ManualScheduler::thread_default().run_pending()
}

/// Schedules tasks with `tokio::task::spawn_local`.
///
/// Tracker handles are `!Send`, so tasks stay on the current thread. Every
/// call to [`Scheduler::schedule`] must happen inside a `LocalSet`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: Task, delay: Duration) {
        tokio::task::spawn_local(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task();
        });
    }
}
