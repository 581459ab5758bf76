use serde::{Deserialize, Serialize};

use crate::heap::HeapId;

/// A bytecode function object.
///
/// Created at runtime when `PUSHFUN` executes: the instruction supplies
/// the entry index and declared arity, and the interpreter captures the
/// closure chain current at the definition site. Calling convention and
/// arity checking are the interpreter's business; the compiler never
/// verifies argument counts at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    entry: u32,
    argc: u32,
    closure: Option<HeapId>,
}

impl Function {
    /// Creates a function object.
    #[must_use]
    pub fn new(entry: u32, argc: u32, closure: Option<HeapId>) -> Self {
        Self { entry, argc, closure }
    }

    /// Index of the first body instruction in the executable.
    #[must_use]
    pub fn entry(&self) -> u32 {
        self.entry
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn argc(&self) -> u32 {
        self.argc
    }

    /// The closure chain captured at the definition site, if any.
    #[must_use]
    pub fn closure(&self) -> Option<HeapId> {
        self.closure
    }

    /// Enumerates outgoing heap references for the collector.
    pub fn walk(&self, visit: &mut dyn FnMut(HeapId)) {
        if let Some(closure) = self.closure {
            visit(closure);
        }
    }
}
