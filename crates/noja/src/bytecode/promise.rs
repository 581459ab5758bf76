//! Single-assignment placeholders for not-yet-known jump targets.

use std::{cell::Cell, fmt, rc::Rc};

/// A single-assignment cell holding an instruction index that will be
/// known later in the same compilation.
///
/// The compiler embeds clones of a promise into jump operands before the
/// target instruction exists, then resolves the promise once the target
/// index is known. Finalization substitutes the resolved value into
/// every instruction that references it; an unresolved promise surviving
/// to finalization is a compiler bug.
///
/// Clones share the underlying cell, so identity is the `Rc` allocation:
/// resolving one clone resolves them all.
#[derive(Clone, Default)]
pub struct Promise(Rc<Cell<Option<u32>>>);

impl Promise {
    /// Creates a fresh, unresolved promise.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the promise to an instruction index.
    ///
    /// Resolving twice with the same value is a no-op.
    ///
    /// # Panics
    ///
    /// Panics when re-resolving with a different value; a promise names
    /// exactly one program point.
    pub fn resolve(&self, value: u32) {
        match self.0.get() {
            None => self.0.set(Some(value)),
            Some(prev) => assert_eq!(prev, value, "promise resolved twice with different values"),
        }
    }

    /// Returns whether the promise has been resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.0.get().is_some()
    }

    /// Returns the resolved value, or `None` while unresolved.
    #[must_use]
    pub fn value(&self) -> Option<u32> {
        self.0.get()
    }

    /// Whether two handles name the same underlying cell.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get() {
            Some(value) => write!(f, "Promise({value})"),
            None => write!(f, "Promise(?)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_once() {
        let p = Promise::new();
        assert!(!p.is_resolved());
        assert_eq!(p.value(), None);
        p.resolve(7);
        assert!(p.is_resolved());
        assert_eq!(p.value(), Some(7));
    }

    #[test]
    fn test_resolve_idempotent() {
        let p = Promise::new();
        p.resolve(3);
        p.resolve(3);
        assert_eq!(p.value(), Some(3));
    }

    #[test]
    #[should_panic(expected = "promise resolved twice")]
    fn test_conflicting_resolution_panics() {
        let p = Promise::new();
        p.resolve(3);
        p.resolve(4);
    }

    #[test]
    fn test_clones_share_cell() {
        let p = Promise::new();
        let q = p.clone();
        assert!(p.same_as(&q));
        q.resolve(11);
        assert_eq!(p.value(), Some(11));
        assert!(!p.same_as(&Promise::new()));
    }
}
