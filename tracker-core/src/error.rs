//! Error types for the tracker.
//!
//! Two kinds of failure exist. Usage errors (`FlushWhileFlushing`,
//! `FlushInsideComputation`, `NoActiveComputation`) are contract violations
//! and are returned at the call site. Errors produced by user code inside a
//! computation or an after-flush callback are normally only reported through
//! [`crate::debug`]; they surface as [`TrackerError::Computation`] or
//! [`TrackerError::AfterFlush`] on a first run or when a flush asks for them.

use thiserror::Error;

/// Boxed error returned by user-supplied computation bodies and callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = TrackerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// `flush` was called while another flush was in progress.
    #[error("can't call flush while flushing")]
    FlushWhileFlushing,

    /// `flush` was called from inside a running computation body.
    #[error("can't flush inside an autorun")]
    FlushInsideComputation,

    /// A free function that needs a current computation was called outside one.
    #[error("on_invalidate requires a current computation")]
    NoActiveComputation,

    /// A computation body returned an error.
    #[error("exception from tracker recompute function: {source}")]
    Computation {
        #[source]
        source: BoxError,
    },

    /// An after-flush callback returned an error.
    #[error("exception from tracker afterFlush function: {source}")]
    AfterFlush {
        #[source]
        source: BoxError,
    },

    #[error("invalid tracker configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

/// Conversion for the return value of computation bodies and after-flush
/// callbacks, so closures may return either `()` or a `Result`.
pub trait IntoComputeResult {
    fn into_compute_result(self) -> Result<(), BoxError>;
}

impl IntoComputeResult for () {
    fn into_compute_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E> IntoComputeResult for std::result::Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_compute_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}
