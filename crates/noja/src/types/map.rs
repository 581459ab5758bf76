//! The polymorphic associative map.
//!
//! # Storage Strategy
//!
//! An open-addressed index table (the mapper) sits over dense parallel
//! key/value arrays that preserve insertion order. Each mapper slot is
//! either `-1` (empty) or an index into the arrays. Collisions are
//! resolved with a perturbation probe: `pert >>= 5; i = i*5 + pert + 1`,
//! masked to the table size, which visits every slot of a power-of-two
//! table. The arrays hold at most two thirds of the mapper size, so a
//! probe always finds an empty slot.
//!
//! Keys are hashed and compared through value dispatch, so any hashable
//! value works as a key and key equality is the language's `==`, not
//! Rust's. On first insertion a key is value-copied into the map; later
//! insertions of an equal key overwrite the value in place and do not
//! copy the key again.

use serde::{Deserialize, Serialize};

use crate::{
    error::RunResult,
    heap::{Heap, HeapId},
    value::Value,
};

/// Initial mapper size. Must be a power of two.
const INITIAL_MAPPER_SIZE: usize = 8;

/// Outcome of probing the mapper for a key.
enum Probe {
    /// The key is present; `slot` indexes the parallel arrays.
    Hit { slot: usize },
    /// The key is absent; `mapper_index` is the empty mapper slot where
    /// it would go.
    Miss { mapper_index: usize },
}

/// An insertion-ordered map with open-addressed lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Map {
    /// Index table: `-1` means empty, anything else indexes `keys`/`vals`.
    mapper: Vec<i32>,
    keys: Vec<Value>,
    vals: Vec<Value>,
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

impl Map {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity_hint(0)
    }

    /// Creates an empty map sized so `num` insertions won't grow it.
    #[must_use]
    pub fn with_capacity_hint(num: usize) -> Self {
        let mut mapper_size = INITIAL_MAPPER_SIZE;
        while Self::capacity_for(mapper_size) < num {
            mapper_size <<= 1;
        }
        Self {
            mapper: vec![-1; mapper_size],
            keys: Vec::with_capacity(Self::capacity_for(mapper_size)),
            vals: Vec::with_capacity(Self::capacity_for(mapper_size)),
        }
    }

    /// How many entries a mapper of the given size can index before the
    /// map must grow.
    fn capacity_for(mapper_size: usize) -> usize {
        mapper_size * 2 / 3
    }

    /// Number of entries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.keys.len()
    }

    /// Current mapper table size. Always a power of two.
    #[must_use]
    pub fn mapper_size(&self) -> usize {
        self.mapper.len()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.keys.iter().copied().zip(self.vals.iter().copied())
    }

    /// Looks up a key. `Ok(None)` means the key is not present; an error
    /// means the key's type cannot be hashed or compared.
    pub fn select(&self, key: &Value, heap: &Heap) -> RunResult<Option<Value>> {
        match self.probe(key, heap)? {
            Probe::Hit { slot } => Ok(Some(self.vals[slot])),
            Probe::Miss { .. } => Ok(None),
        }
    }

    /// Inserts or overwrites a key's value.
    ///
    /// A new key is value-copied into the map (so a later mutation of a
    /// string the key came from cannot corrupt the table); an existing
    /// key keeps its first-inserted copy and only the value changes.
    pub fn insert(&mut self, key: Value, val: Value, heap: &mut Heap) -> RunResult<()> {
        if self.count() == Self::capacity_for(self.mapper.len()) {
            self.grow(heap)?;
        }

        match self.probe(&key, heap)? {
            Probe::Hit { slot } => {
                self.vals[slot] = val;
            }
            Probe::Miss { mapper_index } => {
                let key_copy = key.copy_value(heap)?;
                let slot = i32::try_from(self.keys.len()).expect("map entry count exceeds i32 range");
                self.mapper[mapper_index] = slot;
                self.keys.push(key_copy);
                self.vals.push(val);
            }
        }
        Ok(())
    }

    /// Walks the probe sequence for `key` until a hit or an empty slot.
    ///
    /// Terminates because the arrays hold at most two thirds of the
    /// mapper, so empty slots always exist, and the perturbation step
    /// eventually degenerates to `i*5 + 1`, which cycles through all of
    /// a power-of-two table.
    fn probe(&self, key: &Value, heap: &Heap) -> RunResult<Probe> {
        let mask = (self.mapper.len() - 1) as u64;
        let hash = key.hash(heap)?;
        let mut pert = hash;
        let mut i = (hash & mask) as usize;

        loop {
            let k = self.mapper[i];
            if k == -1 {
                return Ok(Probe::Miss { mapper_index: i });
            }

            let slot = usize::try_from(k).expect("mapper holds a negative slot index");
            if key.op_eql(&self.keys[slot], heap)? {
                return Ok(Probe::Hit { slot });
            }

            pert >>= 5;
            i = ((i as u64).wrapping_mul(5).wrapping_add(pert).wrapping_add(1) & mask) as usize;
        }
    }

    /// Doubles the mapper and re-probes every key into it. Entry order
    /// in the parallel arrays is untouched. Re-hashing cannot fail in
    /// practice: every key hashed once already, at insertion.
    fn grow(&mut self, heap: &Heap) -> RunResult<()> {
        let new_mapper_size = self.mapper.len() << 1;
        let mask = (new_mapper_size - 1) as u64;
        let mut mapper = vec![-1i32; new_mapper_size];

        for (slot, key) in self.keys.iter().enumerate() {
            let hash = key.hash(heap)?;
            let mut pert = hash;
            let mut i = (hash & mask) as usize;
            while mapper[i] != -1 {
                pert >>= 5;
                i = ((i as u64).wrapping_mul(5).wrapping_add(pert).wrapping_add(1) & mask) as usize;
            }
            mapper[i] = i32::try_from(slot).expect("map entry count exceeds i32 range");
        }

        self.mapper = mapper;
        Ok(())
    }

    /// Enumerates outgoing heap references for the collector.
    pub fn walk(&self, visit: &mut dyn FnMut(HeapId)) {
        for value in self.keys.iter().chain(&self.vals) {
            if let Some(id) = value.ref_id() {
                visit(id);
            }
        }
    }
}
