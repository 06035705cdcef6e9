//! ReactiveVar Implementation
//!
//! A ReactiveVar is a single reactive value built on a [`Dependency`].
//!
//! # How ReactiveVars Work
//!
//! 1. Reading the value inside a computation registers that computation.
//!
//! 2. Setting a value that differs from the stored one invalidates every
//!    registered computation.
//!
//! 3. Setting an equal value does nothing. Equality defaults to `PartialEq`
//!    and can be replaced with [`ReactiveVar::with_equals`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::Dependency;

type EqualsFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// A reactive value of type `T`.
///
/// # Example
///
/// ```rust
/// use tracker_core::reactive::ReactiveVar;
///
/// let count = ReactiveVar::new(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// assert_eq!(count.to_string(), "ReactiveVar{5}");
/// ```
pub struct ReactiveVar<T> {
    value: Rc<RefCell<T>>,
    dependency: Dependency,
    equals: EqualsFn<T>,
}

impl<T> ReactiveVar<T>
where
    T: PartialEq + 'static,
{
    pub fn new(value: T) -> Self {
        Self::with_equals(value, |a, b| a == b)
    }
}

impl<T> ReactiveVar<T>
where
    T: 'static,
{
    /// Create a var that treats values as unchanged when `equals` says so.
    pub fn with_equals<F>(value: T, equals: F) -> Self
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        Self {
            value: Rc::new(RefCell::new(value)),
            dependency: Dependency::new(),
            equals: Rc::new(equals),
        }
    }

    /// Get the current value.
    ///
    /// If called inside a computation, the computation re-runs when the
    /// value changes.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.dependency.depend();
        self.value.borrow().clone()
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    /// Borrow the current value, tracking it like [`get`](Self::get).
    ///
    /// The value stays borrowed while `func` runs, so `func` must not call
    /// [`set`](Self::set) or [`update`](Self::update) on this var.
    pub fn with<R>(&self, func: impl FnOnce(&T) -> R) -> R {
        self.dependency.depend();
        func(&self.value.borrow())
    }

    /// Store `value` and invalidate dependents, unless it equals the stored one.
    pub fn set(&self, value: T) {
        if (self.equals)(&self.value.borrow(), &value) {
            return;
        }
        *self.value.borrow_mut() = value;
        self.dependency.changed();
    }

    /// Set the value computed from the current one.
    ///
    /// `func` sees a snapshot and may itself read or set this var.
    pub fn update(&self, func: impl FnOnce(&T) -> T)
    where
        T: Clone,
    {
        let current = self.get_untracked();
        self.set(func(&current));
    }

    pub fn has_dependents(&self) -> bool {
        self.dependency.has_dependents()
    }
}

impl<T> Clone for ReactiveVar<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
            dependency: self.dependency.clone(),
            equals: Rc::clone(&self.equals),
        }
    }
}

impl<T: fmt::Display> fmt::Display for ReactiveVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReactiveVar{{{}}}", self.value.borrow())
    }
}

impl<T: fmt::Debug> fmt::Debug for ReactiveVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveVar")
            .field("value", &*self.value.borrow())
            .field("dependency", &self.dependency)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{autorun, flush};
    use std::cell::Cell;

    #[test]
    fn var_get_and_set() {
        let var = ReactiveVar::new("foo".to_string());
        assert_eq!(var.get(), "foo");

        var.set("bar".to_string());
        assert_eq!(var.get(), "bar");
    }

    #[test]
    fn var_update() {
        let var = ReactiveVar::new(10);
        var.update(|v| v + 5);
        assert_eq!(var.get(), 15);
    }

    #[test]
    fn update_closure_may_set_the_same_var() {
        let var = ReactiveVar::new(1);
        let inner = var.clone();
        var.update(|v| {
            inner.set(100);
            v + 1
        });
        assert_eq!(var.get(), 2);
    }

    #[test]
    fn var_reruns_dependents_on_change() {
        let var = ReactiveVar::new(0);
        let observed = Rc::new(Cell::new(-1));

        let (source, sink) = (var.clone(), observed.clone());
        let computation = autorun(move |_| sink.set(source.get())).unwrap();
        assert_eq!(observed.get(), 0);

        var.set(42);
        flush().unwrap();
        assert_eq!(observed.get(), 42);
        computation.stop();
    }

    #[test]
    fn setting_equal_value_does_not_invalidate() {
        let var = ReactiveVar::new(7);
        let run_count = Rc::new(Cell::new(0));

        let (source, counter) = (var.clone(), run_count.clone());
        let computation = autorun(move |_| {
            source.get();
            counter.set(counter.get() + 1);
        })
        .unwrap();

        var.set(7);
        assert!(!computation.is_invalidated());
        flush().unwrap();
        assert_eq!(run_count.get(), 1);
        computation.stop();
    }

    #[test]
    fn custom_equality() {
        let var = ReactiveVar::with_equals(vec![1, 2], |_, _| false);
        let (source, runs) = (var.clone(), Rc::new(Cell::new(0)));
        let counter = runs.clone();
        let computation = autorun(move |_| {
            source.with(|v| v.len());
            counter.set(counter.get() + 1);
        })
        .unwrap();

        var.set(vec![1, 2]);
        flush().unwrap();
        assert_eq!(runs.get(), 2);
        computation.stop();
    }

    #[test]
    fn untracked_read_does_not_register() {
        let var = ReactiveVar::new(1);
        let source = var.clone();
        let computation = autorun(move |_| {
            source.get_untracked();
        })
        .unwrap();

        assert!(!var.has_dependents());
        computation.stop();
    }

    #[test]
    fn display_format() {
        let var = ReactiveVar::new("baseValue");
        assert_eq!(var.to_string(), "ReactiveVar{baseValue}");
    }
}
