//! String interning for identifier and string-literal operands.
//!
//! Instructions never own string data. The compiler interns every name
//! and string literal into an [`Interns`] table owned by the builder,
//! and instructions carry a copyable [`StringId`] index. At finalization
//! the table moves into the `Executable`, so every id embedded in an
//! instruction stays valid for the executable's whole lifetime.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Index into the intern table's storage.
///
/// Uses `u32` to keep operands small; four billion distinct strings is
/// far beyond any real compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StringId(u32);

impl StringId {
    fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("intern table exceeds u32 range"))
    }

    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Deduplicating string store.
///
/// Interning the same string twice returns the same id, so identifier
/// equality inside the executable is an integer comparison. The lookup
/// map is rebuilt from the storage vector on deserialization.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Box<str>>", into = "Vec<Box<str>>")]
pub struct Interns {
    strings: Vec<Box<str>>,
    lookup: AHashMap<Box<str>, StringId>,
}

impl Interns {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `s`, adding it to the table if new.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = StringId::new(self.strings.len());
        self.strings.push(s.into());
        self.lookup.insert(s.into(), id);
        id
    }

    /// Returns the string for an id.
    ///
    /// # Panics
    ///
    /// Panics if the id was produced by a different table.
    #[must_use]
    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Number of distinct interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl From<Vec<Box<str>>> for Interns {
    fn from(strings: Vec<Box<str>>) -> Self {
        let lookup = strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), StringId::new(i)))
            .collect();
        Self { strings, lookup }
    }
}

impl From<Interns> for Vec<Box<str>> {
    fn from(interns: Interns) -> Self {
        interns.strings
    }
}
