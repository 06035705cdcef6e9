//! Dependency Implementation
//!
//! A Dependency stands for one piece of changeable state. Computations that
//! read the state call [`Dependency::depend`]; whoever changes it calls
//! [`Dependency::changed`] and every registered computation is invalidated.
//!
//! A computation stays registered only until its next invalidation: the
//! registration installs an invalidation callback that removes it again, so a
//! re-run has to depend afresh.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::id::ComputationId;
use super::Computation;

#[derive(Default)]
struct DependencyInner {
    dependents: RefCell<IndexMap<ComputationId, Computation>>,
}

/// Tracks which computations must be invalidated when some state changes.
///
/// Clones share the same dependent set.
#[derive(Clone, Default)]
pub struct Dependency {
    inner: Rc<DependencyInner>,
}

impl Dependency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the current computation, if any, as a dependent.
    ///
    /// Returns `true` if a computation was newly registered and `false` if
    /// there is no current computation or it was already registered.
    pub fn depend(&self) -> bool {
        match ReactiveContext::current() {
            Some(computation) => self.depend_on(&computation),
            None => false,
        }
    }

    /// Register `computation` as a dependent. See [`depend`](Self::depend).
    pub fn depend_on(&self, computation: &Computation) -> bool {
        let id = computation.id();
        {
            let mut dependents = self.inner.dependents.borrow_mut();
            if dependents.contains_key(&id) {
                return false;
            }
            dependents.insert(id, computation.clone());
        }

        let dependency = Rc::downgrade(&self.inner);
        computation.on_invalidate(move |c| {
            if let Some(inner) = dependency.upgrade() {
                inner.dependents.borrow_mut().shift_remove(&c.id());
            }
        });
        true
    }

    /// Invalidate every dependent and clear the dependent set.
    pub fn changed(&self) {
        let dependents = std::mem::take(&mut *self.inner.dependents.borrow_mut());
        if !dependents.is_empty() {
            tracing::trace!(count = dependents.len(), "invalidating dependents");
        }
        for computation in dependents.into_values() {
            computation.invalidate();
        }
    }

    pub fn has_dependents(&self) -> bool {
        !self.inner.dependents.borrow().is_empty()
    }

    pub fn dependent_count(&self) -> usize {
        self.inner.dependents.borrow().len()
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("dependents", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
