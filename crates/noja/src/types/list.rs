use serde::{Deserialize, Serialize};

use crate::{
    error::{RunError, RunResult},
    heap::HeapId,
    value::Value,
};

/// An ordered sequence of values.
///
/// Indexing is zero-based. Writing at an index equal to the current
/// length appends, which is how list literals are built up by the
/// compiler's `PUSHLST; PUSHINT i; <expr>; INSERT` pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct List {
    items: Vec<Value>,
}

impl List {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty list with room for `num` elements.
    #[must_use]
    pub fn with_capacity_hint(num: usize) -> Self {
        Self {
            items: Vec::with_capacity(num),
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the list has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The elements in order.
    #[must_use]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Reads the element at `index`.
    pub fn get(&self, index: i64) -> RunResult<Value> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.items.get(i).copied())
            .ok_or(RunError::IndexOutOfRange {
                index,
                count: self.items.len(),
            })
    }

    /// Writes the element at `index`, appending when `index` equals the
    /// current length.
    pub fn set(&mut self, index: i64, value: Value) -> RunResult<()> {
        let count = self.items.len();
        match usize::try_from(index) {
            Ok(i) if i < count => {
                self.items[i] = value;
                Ok(())
            }
            Ok(i) if i == count => {
                self.items.push(value);
                Ok(())
            }
            _ => Err(RunError::IndexOutOfRange { index, count }),
        }
    }

    /// Enumerates outgoing heap references for the collector.
    pub fn walk(&self, visit: &mut dyn FnMut(HeapId)) {
        for value in &self.items {
            if let Some(id) = value.ref_id() {
                visit(id);
            }
        }
    }
}
