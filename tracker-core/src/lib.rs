//! Tracker Core
//!
//! This crate provides a dependency-tracking and invalidation scheduler for
//! reactive computations. It implements:
//!
//! - Dependencies that record which computations read a piece of state
//! - Computations that re-run automatically when that state changes
//! - A flusher that re-runs invalidated computations in a deterministic order
//! - Reactive variables built on top of dependencies
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Dependencies, computations, the flusher and the public API
//! - `scheduler`: The "next tick" primitive used to request flushes
//! - `config`: Per-thread tuning of scheduled flushes
//! - `debug`: Reporting of errors the tracker recovers from
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use tracker_core::reactive::{autorun, flush, ReactiveVar};
//!
//! let name = ReactiveVar::new("world".to_string());
//! let greetings = Rc::new(RefCell::new(Vec::new()));
//!
//! let (source, sink) = (name.clone(), greetings.clone());
//! let computation = autorun(move |_| {
//!     sink.borrow_mut().push(format!("hello {}", source.get()));
//! })
//! .unwrap();
//!
//! name.set("tracker".to_string());
//! flush().unwrap();
//!
//! assert_eq!(*greetings.borrow(), vec!["hello world", "hello tracker"]);
//! computation.stop();
//! ```

pub mod config;
pub mod debug;
pub mod error;
pub mod reactive;
pub mod scheduler;

pub use error::{BoxError, Result, TrackerError};
