//! Error reporting for failures the tracker recovers from.
//!
//! An error returned by a computation body (without an `on_error` handler) or
//! by an after-flush callback does not stop the flush. It is handed to the
//! thread's error reporter instead, which by default logs through `tracing`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Where a reported error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorOrigin {
    /// A computation body during a re-run.
    Recompute,
    /// An after-flush callback.
    AfterFlush,
    /// A scheduler-triggered flush that could not start.
    Flush,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Recompute => "recompute",
            Self::AfterFlush => "afterFlush",
            Self::Flush => "flush",
        };
        f.write_str(name)
    }
}

type Reporter = Rc<dyn Fn(ErrorOrigin, &dyn std::error::Error)>;

thread_local! {
    static REPORTER: RefCell<Option<Reporter>> = RefCell::new(None);
    static SUPPRESSED: Cell<usize> = const { Cell::new(0) };
}

/// Replace the error reporter for the current thread.
pub fn set_error_reporter<F>(reporter: F)
where
    F: Fn(ErrorOrigin, &dyn std::error::Error) + 'static,
{
    REPORTER.with(|slot| *slot.borrow_mut() = Some(Rc::new(reporter)));
}

/// Restore the default `tracing` reporter.
pub fn reset_error_reporter() {
    REPORTER.with(|slot| *slot.borrow_mut() = None);
}

/// Swallow the next `count` reports. Tests use this for errors they expect.
pub fn suppress_log(count: usize) {
    SUPPRESSED.with(|suppressed| suppressed.set(suppressed.get() + count));
}

/// Whether some suppressed reports are still outstanding.
pub fn suppressed_log_expected() -> bool {
    SUPPRESSED.with(|suppressed| suppressed.get() != 0)
}

pub(crate) fn report(origin: ErrorOrigin, error: &dyn std::error::Error) {
    let suppressed = SUPPRESSED.with(|suppressed| {
        let remaining = suppressed.get();
        if remaining > 0 {
            suppressed.set(remaining - 1);
            true
        } else {
            false
        }
    });
    if suppressed {
        tracing::trace!(%origin, "suppressed tracker error report");
        return;
    }

    // Clone out of the slot so the reporter may replace itself.
    let reporter = REPORTER.with(|slot| slot.borrow().clone());
    match reporter {
        Some(reporter) => reporter(origin, error),
        None => tracing::error!(%origin, %error, "exception from tracker {origin} function"),
    }
}
