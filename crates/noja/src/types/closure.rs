//! Closure environments: a parent-linked chain of binding frames.
//!
//! Each frame owns a reference to a bindings map (`name -> value`) and a
//! reference to its parent frame, or none at the root. Variable lookup
//! walks from the innermost frame toward the root, so an inner binding
//! shadows any outer one by visit order. Frames live on the heap like
//! everything else, which lets a frame outlive its creator when a
//! closure escapes; the collector reaches it through `walk`.

use serde::{Deserialize, Serialize};

use crate::{
    error::{RunError, RunResult},
    heap::{Heap, HeapData, HeapId},
    types::Type,
    value::Value,
};

/// One frame of the environment chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Closure {
    parent: Option<HeapId>,
    vars: HeapId,
}

impl Closure {
    /// The enclosing frame, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<HeapId> {
        self.parent
    }

    /// The bindings map of this frame.
    #[must_use]
    pub fn vars(&self) -> HeapId {
        self.vars
    }

    /// Enumerates outgoing heap references for the collector.
    pub fn walk(&self, visit: &mut dyn FnMut(HeapId)) {
        if let Some(parent) = self.parent {
            visit(parent);
        }
        visit(self.vars);
    }
}

/// Allocates a new frame whose bindings map is `vars` and whose parent
/// is `parent`.
///
/// Fails when `parent` is not a closure or `vars` is not a map.
pub fn allocate_closure(parent: Option<HeapId>, vars: HeapId, heap: &mut Heap) -> RunResult<HeapId> {
    if let Some(parent) = parent {
        let found = heap.get(parent).type_of();
        if found != Type::Closure {
            return Err(RunError::TypeMismatch {
                expected: Type::Closure.name(),
                found: found.name(),
            });
        }
    }
    let found = heap.get(vars).type_of();
    if found != Type::Map {
        return Err(RunError::TypeMismatch {
            expected: Type::Map.name(),
            found: found.name(),
        });
    }
    heap.alloc(HeapData::Closure(Closure { parent, vars }))
}

/// Looks a name up through the chain, innermost frame first.
///
/// `Ok(None)` means no frame binds the name. An error from an underlying
/// map lookup (an unhashable key, say) aborts the walk immediately.
pub fn lookup(closure: &Closure, key: &Value, heap: &Heap) -> RunResult<Option<Value>> {
    let mut current = *closure;
    loop {
        let HeapData::Map(vars) = heap.get(current.vars) else {
            return Err(RunError::TypeMismatch {
                expected: Type::Map.name(),
                found: heap.get(current.vars).type_of().name(),
            });
        };
        if let Some(value) = vars.select(key, heap)? {
            return Ok(Some(value));
        }
        match current.parent {
            Some(parent) => {
                let HeapData::Closure(parent) = heap.get(parent) else {
                    return Err(RunError::TypeMismatch {
                        expected: Type::Closure.name(),
                        found: heap.get(parent).type_of().name(),
                    });
                };
                current = *parent;
            }
            None => return Ok(None),
        }
    }
}

/// Binds a name in the innermost frame of `closure_id`, shadowing any
/// outer binding of the same name. This is the runtime effect of `ASS`.
pub fn bind(closure_id: HeapId, name: Value, value: Value, heap: &mut Heap) -> RunResult<()> {
    let HeapData::Closure(closure) = heap.get(closure_id) else {
        return Err(RunError::TypeMismatch {
            expected: Type::Closure.name(),
            found: heap.get(closure_id).type_of().name(),
        });
    };
    let vars_id = closure.vars;

    let name_type = name.type_of(heap);
    if !name_type.hashable() {
        return Err(RunError::unsupported(name_type.name(), "hash"));
    }

    // The insert may hash heap keys and allocate the key copy, so the
    // map is moved out of its slot for the duration.
    let mut data = heap.take(vars_id);
    let result = match &mut data {
        HeapData::Map(vars) => vars.insert(name, value, heap),
        other => Err(RunError::TypeMismatch {
            expected: Type::Map.name(),
            found: other.type_of().name(),
        }),
    };
    heap.put_back(vars_id, data);
    result
}
