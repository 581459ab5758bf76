//! The tracing heap that owns every runtime object.
//!
//! Objects live in slot storage addressed by [`HeapId`]; values hold ids,
//! never pointers. Collection is mark-sweep: the embedder supplies the
//! roots (its value stack, the global closure chain, ...), marking
//! follows each object's `walk`, and unmarked slots are reclaimed for
//! reuse. Singleton values (`none`, the booleans) and type descriptors
//! are immediates rather than heap objects, so "static, never freed"
//! holds by construction.

use serde::{Deserialize, Serialize};

use crate::{
    error::RunResult,
    function::Function,
    resource::HeapLimits,
    types::{Closure, List, Map, Type},
};

/// Index of an object slot in the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeapId(u32);

impl HeapId {
    fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("heap exceeds u32 slots"))
    }

    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Payload of one heap object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HeapData {
    Str(Box<str>),
    List(List),
    Map(Map),
    Closure(Closure),
    Function(Function),
}

impl HeapData {
    /// The type descriptor for this payload.
    #[must_use]
    pub fn type_of(&self) -> Type {
        match self {
            Self::Str(_) => Type::Str,
            Self::List(_) => Type::List,
            Self::Map(_) => Type::Map,
            Self::Closure(_) => Type::Closure,
            Self::Function(_) => Type::Function,
        }
    }

    /// Enumerates outgoing heap references for the collector.
    pub fn walk(&self, visit: &mut dyn FnMut(HeapId)) {
        match self {
            Self::Str(_) => {}
            Self::List(list) => list.walk(visit),
            Self::Map(map) => map.walk(visit),
            Self::Closure(closure) => closure.walk(visit),
            Self::Function(function) => function.walk(visit),
        }
    }
}

/// Slot arena owning every runtime object.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Heap {
    slots: Vec<Option<HeapData>>,
    free: Vec<HeapId>,
    live: usize,
    limits: HeapLimits,
}

impl Heap {
    /// Creates an empty heap with no allocation budget.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty heap with the given allocation budget.
    #[must_use]
    pub fn with_limits(limits: HeapLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Allocates one object, reusing a reclaimed slot when possible.
    ///
    /// Fails with `OutOfMemory` when the allocation budget is exhausted;
    /// running [`Heap::collect`] may free up room.
    pub fn alloc(&mut self, data: HeapData) -> RunResult<HeapId> {
        self.limits.check(self.live)?;
        self.live += 1;
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(data);
            Ok(id)
        } else {
            let id = HeapId::new(self.slots.len());
            self.slots.push(Some(data));
            Ok(id)
        }
    }

    /// Allocates a string object.
    pub fn alloc_str(&mut self, s: &str) -> RunResult<HeapId> {
        self.alloc(HeapData::Str(s.into()))
    }

    /// Returns the object at `id`.
    ///
    /// # Panics
    ///
    /// Panics if the slot was reclaimed; holding an id across a
    /// collection without rooting it is a bug in the embedder.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        self.slots[id.index()].as_ref().expect("heap object accessed after free")
    }

    /// Mutable access to the object at `id`.
    ///
    /// # Panics
    ///
    /// Panics if the slot was reclaimed.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        self.slots[id.index()].as_mut().expect("heap object accessed after free")
    }

    /// Moves the object out of its slot for an operation that needs both
    /// the object and the heap mutably (e.g. a map insert that hashes
    /// heap keys and copies the key). Pair with [`Heap::put_back`].
    pub(crate) fn take(&mut self, id: HeapId) -> HeapData {
        self.slots[id.index()].take().expect("heap object accessed after free")
    }

    /// Restores an object moved out with [`Heap::take`].
    pub(crate) fn put_back(&mut self, id: HeapId, data: HeapData) {
        debug_assert!(self.slots[id.index()].is_none(), "slot is not vacated");
        self.slots[id.index()] = Some(data);
    }

    /// Number of live objects.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.live
    }

    /// Mark-sweep collection. Every object reachable from `roots`
    /// survives; every other slot is reclaimed. Returns the number of
    /// objects freed.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = HeapId>) -> usize {
        let mut marked = vec![false; self.slots.len()];
        let mut worklist: Vec<HeapId> = roots.into_iter().collect();

        while let Some(id) = worklist.pop() {
            if std::mem::replace(&mut marked[id.index()], true) {
                continue;
            }
            if let Some(data) = &self.slots[id.index()] {
                data.walk(&mut |child| worklist.push(child));
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !marked[index] {
                *slot = None;
                self.free.push(HeapId::new(index));
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }
}
