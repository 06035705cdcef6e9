//! Reactive Primitives
//!
//! This module implements the tracker: dependencies, computations and the
//! flusher that re-runs computations when the data they read changes.
//!
//! # Concepts
//!
//! ## Dependencies
//!
//! A [`Dependency`] represents interest in a piece of mutable state. Reading
//! the state inside a computation calls [`Dependency::depend`]; changing it
//! calls [`Dependency::changed`], which invalidates every registered
//! computation.
//!
//! ## Computations
//!
//! A [`Computation`] is a re-runnable function created by [`autorun`]. It runs
//! once immediately and again after every invalidation, at the next flush.
//! Computations created while another one runs are its children and are
//! stopped when the parent is invalidated.
//!
//! ## Flushing
//!
//! Invalidated computations are re-run by a flush, either requested from the
//! [scheduler](crate::scheduler) for the next tick or forced with [`flush`].
//! Within a flush, computations re-run in the order they were invalidated, and
//! [`after_flush`] callbacks only run once no computation is pending.
//!
//! # Implementation Notes
//!
//! All tracker state is thread-local and handles are `Rc`-based. Each thread
//! has an independent tracker; nothing here is `Send`.

mod computation;
mod context;
mod dependency;
mod flusher;
mod id;
mod tracker;
mod var;

pub use computation::{AutorunOptions, Computation};
pub use context::ReactiveContext;
pub use dependency::Dependency;
pub use flusher::FlushOptions;
pub use id::ComputationId;
pub use tracker::{
    after_flush, autorun, autorun_with, config, configure, current_computation, flush, flush_with,
    in_flush, is_active, nonreactive, on_invalidate, pending_computations, reset_scheduler,
    set_scheduler, with_computation,
};
pub use var::ReactiveVar;
