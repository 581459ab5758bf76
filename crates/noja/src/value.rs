//! Runtime values and the operation dispatch over them.
//!
//! `Value` uses a hybrid design: small immediate values (none, bool,
//! int, float, type descriptors) are stored inline, while string, list,
//! map, closure and function payloads live on the heap and are referenced
//! via `Ref(HeapId)`. Copying a `Value` copies a reference, never a
//! payload; the tracing heap owns every payload.
//!
//! Every language-level operation reads the value's type descriptor: a
//! type that does not implement an operation makes it fail with
//! `RunError::Unsupported`, which is the "type X does not support Y"
//! error the interpreter surfaces.

use std::{io, sync::LazyLock};

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use crate::{
    error::{RunError, RunResult},
    function::Function,
    heap::{Heap, HeapData, HeapId},
    types::{self, Type},
};

/// Printing nested containers stops at this depth, so a self-referencing
/// list cannot hang the sink.
const MAX_PRINT_DEPTH: usize = 64;

/// String hashing uses fixed seeds so hashes (and therefore map probe
/// sequences) are stable across runs and processes.
static STR_HASHER: LazyLock<RandomState> =
    LazyLock::new(|| RandomState::with_seeds(0x243f_6a88_85a3_08d3, 0x1319_8a2e_0370_7344, 0xa409_3822_299f_31d0, 0x082e_fa98_ec4e_6c89));

/// One runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A type descriptor used as a value.
    Type(Type),
    /// A heap-allocated payload: string, list, map, closure or function.
    Ref(HeapId),
}

impl Value {
    /// The value's type descriptor.
    #[must_use]
    pub fn type_of(&self, heap: &Heap) -> Type {
        match self {
            Self::None => Type::None,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::Type(_) => Type::Type,
            Self::Ref(id) => heap.get(*id).type_of(),
        }
    }

    /// The heap id behind the value, when it has one. Used to assemble
    /// GC roots and by the `walk` implementations of containers.
    #[must_use]
    pub fn ref_id(&self) -> Option<HeapId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Truthiness coercion. Only booleans have one; conditions in the
    /// language are strict.
    pub fn to_bool(&self, heap: &Heap) -> RunResult<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(RunError::unsupported(self.type_of(heap).name(), "to_bool")),
        }
    }

    /// Integer coercion.
    pub fn to_int(&self, heap: &Heap) -> RunResult<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            _ => Err(RunError::unsupported(self.type_of(heap).name(), "to_int")),
        }
    }

    /// Float coercion. Ints promote, which is what mixed arithmetic in
    /// the interpreter leans on.
    pub fn to_float(&self, heap: &Heap) -> RunResult<f64> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(i) => Ok(*i as f64),
            _ => Err(RunError::unsupported(self.type_of(heap).name(), "to_float")),
        }
    }

    /// String coercion.
    pub fn to_string_value(&self, heap: &Heap) -> RunResult<String> {
        match self {
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => Ok(s.to_string()),
                other => Err(RunError::unsupported(other.type_of().name(), "to_string")),
            },
            _ => Err(RunError::unsupported(self.type_of(heap).name(), "to_string")),
        }
    }

    /// Writes the value's printed form to a sink.
    pub fn print(&self, out: &mut dyn io::Write, heap: &Heap) -> io::Result<()> {
        self.print_depth(out, heap, 0)
    }

    fn print_depth(&self, out: &mut dyn io::Write, heap: &Heap, depth: usize) -> io::Result<()> {
        if depth > MAX_PRINT_DEPTH {
            return write!(out, "...");
        }
        match self {
            Self::None => write!(out, "none"),
            Self::Bool(true) => write!(out, "true"),
            Self::Bool(false) => write!(out, "false"),
            Self::Int(i) => write!(out, "{i}"),
            Self::Float(f) => write!(out, "{}", ryu::Buffer::new().format(*f)),
            Self::Type(t) => write!(out, "{}", t.name()),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => write!(out, "{s}"),
                HeapData::List(list) => {
                    write!(out, "[")?;
                    for (i, item) in list.items().iter().enumerate() {
                        if i > 0 {
                            write!(out, ", ")?;
                        }
                        item.print_depth(out, heap, depth + 1)?;
                    }
                    write!(out, "]")
                }
                HeapData::Map(map) => {
                    write!(out, "{{")?;
                    for (i, (key, value)) in map.iter().enumerate() {
                        if i > 0 {
                            write!(out, ", ")?;
                        }
                        key.print_depth(out, heap, depth + 1)?;
                        write!(out, ": ")?;
                        value.print_depth(out, heap, depth + 1)?;
                    }
                    write!(out, "}}")
                }
                HeapData::Closure(_) => write!(out, "<closure>"),
                HeapData::Function(f) => write!(out, "<function at {}>", f.entry()),
            },
        }
    }

    /// Language-level equality.
    ///
    /// Only same-type comparisons consult the payload; any cross-type
    /// comparison is `false`, so `2` and `2.0` are not equal. Types
    /// without an equality implementation (list, map, closure, function)
    /// fail instead.
    pub fn op_eql(&self, other: &Self, heap: &Heap) -> RunResult<bool> {
        let own = self.type_of(heap);
        if !own.comparable() {
            return Err(RunError::unsupported(own.name(), "op_eql"));
        }
        Ok(match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => match (heap.get(*a), heap.get(*b)) {
                (HeapData::Str(x), HeapData::Str(y)) => x == y,
                _ => false,
            },
            _ => false,
        })
    }

    /// `self < other` over numbers.
    pub fn op_lss(&self, other: &Self, heap: &Heap) -> RunResult<bool> {
        self.numeric_compare(other, heap, "op_lss", |a, b| a < b, |a, b| a < b)
    }

    /// `self <= other` over numbers.
    pub fn op_leq(&self, other: &Self, heap: &Heap) -> RunResult<bool> {
        self.numeric_compare(other, heap, "op_leq", |a, b| a <= b, |a, b| a <= b)
    }

    /// `self > other` over numbers.
    pub fn op_grt(&self, other: &Self, heap: &Heap) -> RunResult<bool> {
        self.numeric_compare(other, heap, "op_grt", |a, b| a > b, |a, b| a > b)
    }

    /// `self >= other` over numbers.
    pub fn op_geq(&self, other: &Self, heap: &Heap) -> RunResult<bool> {
        self.numeric_compare(other, heap, "op_geq", |a, b| a >= b, |a, b| a >= b)
    }

    fn numeric_compare(
        &self,
        other: &Self,
        heap: &Heap,
        operation: &'static str,
        int_cmp: fn(i64, i64) -> bool,
        float_cmp: fn(f64, f64) -> bool,
    ) -> RunResult<bool> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Ok(int_cmp(*a, *b)),
            (Self::Float(a), Self::Float(b)) => Ok(float_cmp(*a, *b)),
            (Self::Int(a), Self::Float(b)) => Ok(float_cmp(*a as f64, *b)),
            (Self::Float(a), Self::Int(b)) => Ok(float_cmp(*a, *b as f64)),
            _ => Err(RunError::unsupported(self.type_of(heap).name(), operation)),
        }
    }

    /// Hash for use as a map key.
    ///
    /// Consistent with [`Value::op_eql`]: equal values hash equally.
    /// Since equality is strict per type, hash domains need not agree
    /// across types; `2` and `2.0` are distinct keys.
    pub fn hash(&self, heap: &Heap) -> RunResult<u64> {
        match self {
            Self::Bool(b) => Ok(u64::from(*b)),
            Self::Int(i) => Ok(*i as u64),
            Self::Float(f) => Ok(hash_float(*f)),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => Ok(STR_HASHER.hash_one(&**s)),
                other => Err(RunError::unsupported(other.type_of().name(), "hash")),
            },
            _ => Err(RunError::unsupported(self.type_of(heap).name(), "hash")),
        }
    }

    /// Value-duplication, used where sharing would be wrong (a map
    /// copies each new key so the table cannot be corrupted through an
    /// alias). Immediates copy trivially; strings copy their contents;
    /// containers do not support it.
    pub fn copy_value(&self, heap: &mut Heap) -> RunResult<Self> {
        match self {
            Self::None | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Type(_) => Ok(*self),
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => {
                    let copy = s.clone();
                    Ok(Self::Ref(heap.alloc(HeapData::Str(copy))?))
                }
                other => Err(RunError::unsupported(other.type_of().name(), "copy")),
            },
        }
    }

    /// Cardinality: string length in characters, list length, map entry
    /// count.
    pub fn count(&self, heap: &Heap) -> RunResult<usize> {
        match self {
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => Ok(s.chars().count()),
                HeapData::List(list) => Ok(list.len()),
                HeapData::Map(map) => Ok(map.count()),
                other => Err(RunError::unsupported(other.type_of().name(), "count")),
            },
            _ => Err(RunError::unsupported(self.type_of(heap).name(), "count")),
        }
    }

    /// Index read. `Ok(None)` means "not present" for maps and closure
    /// chains; list reads fail on a bad index instead.
    pub fn select(&self, key: &Self, heap: &Heap) -> RunResult<Option<Self>> {
        match self {
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Map(map) => map.select(key, heap),
                HeapData::Closure(closure) => types::lookup(closure, key, heap),
                HeapData::List(list) => match key {
                    Self::Int(i) => list.get(*i).map(Some),
                    _ => Err(RunError::TypeMismatch {
                        expected: Type::Int.name(),
                        found: key.type_of(heap).name(),
                    }),
                },
                other => Err(RunError::unsupported(other.type_of().name(), "select")),
            },
            _ => Err(RunError::unsupported(self.type_of(heap).name(), "select")),
        }
    }

    /// Index write, updating the container in place.
    pub fn insert(&self, key: Self, value: Self, heap: &mut Heap) -> RunResult<()> {
        let Some(id) = self.ref_id() else {
            return Err(RunError::unsupported(self.type_of(heap).name(), "insert"));
        };
        match heap.get(id).type_of() {
            Type::Map => {
                // Reject unhashable keys while the map is still in its
                // slot, so a map used as its own key cannot be probed
                // after it has been moved out.
                let key_type = key.type_of(heap);
                if !key_type.hashable() {
                    return Err(RunError::unsupported(key_type.name(), "hash"));
                }
                // The insert hashes heap keys and copies the key, both of
                // which need the heap, so the map is moved out of its slot.
                let mut data = heap.take(id);
                let result = match &mut data {
                    HeapData::Map(map) => map.insert(key, value, heap),
                    _ => unreachable!("slot changed type while taken"),
                };
                heap.put_back(id, data);
                result
            }
            Type::List => {
                let Self::Int(index) = key else {
                    return Err(RunError::TypeMismatch {
                        expected: Type::Int.name(),
                        found: key.type_of(heap).name(),
                    });
                };
                let HeapData::List(list) = heap.get_mut(id) else {
                    unreachable!("type checked above")
                };
                list.set(index, value)
            }
            other => Err(RunError::unsupported(other.name(), "insert")),
        }
    }

    /// The function payload behind a callable value.
    pub fn callable<'h>(&self, heap: &'h Heap) -> RunResult<&'h Function> {
        match self {
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Function(f) => Ok(f),
                other => Err(RunError::unsupported(other.type_of().name(), "call")),
            },
            _ => Err(RunError::unsupported(self.type_of(heap).name(), "call")),
        }
    }
}

/// Floats hash their IEEE bits. Zero is special-cased so `-0.0` and
/// `0.0`, which compare equal, agree.
fn hash_float(f: f64) -> u64 {
    if f == 0.0 { 0 } else { f.to_bits() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{List, Map};

    fn printed(value: &Value, heap: &Heap) -> String {
        let mut out = Vec::new();
        value.print(&mut out, heap).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_type_of() {
        let mut heap = Heap::new();
        let s = heap.alloc_str("x").unwrap();
        assert_eq!(Value::None.type_of(&heap), Type::None);
        assert_eq!(Value::Int(1).type_of(&heap), Type::Int);
        assert_eq!(Value::Ref(s).type_of(&heap), Type::Str);
        assert_eq!(Value::Type(Type::Map).type_of(&heap), Type::Type);
    }

    #[test]
    fn test_strict_truthiness() {
        let heap = Heap::new();
        assert!(Value::Bool(true).to_bool(&heap).unwrap());
        assert_eq!(
            Value::Int(1).to_bool(&heap),
            Err(RunError::unsupported("int", "to_bool"))
        );
    }

    #[test]
    fn test_equality_is_strict_per_type() {
        let heap = Heap::new();
        // Only same-type comparisons consult the payload.
        assert!(!Value::Int(2).op_eql(&Value::Float(2.0), &heap).unwrap());
        assert!(!Value::Float(2.0).op_eql(&Value::Int(2), &heap).unwrap());
        assert!(Value::Float(2.0).op_eql(&Value::Float(2.0), &heap).unwrap());
        // Within floats, `-0.0 == 0.0` and hashes agree.
        assert!(Value::Float(0.0).op_eql(&Value::Float(-0.0), &heap).unwrap());
        assert_eq!(
            Value::Float(0.0).hash(&heap).unwrap(),
            Value::Float(-0.0).hash(&heap).unwrap()
        );
    }

    #[test]
    fn test_cross_type_equality_is_false() {
        let mut heap = Heap::new();
        let s = heap.alloc_str("1").unwrap();
        assert!(!Value::Int(1).op_eql(&Value::Ref(s), &heap).unwrap());
        assert!(!Value::None.op_eql(&Value::Bool(false), &heap).unwrap());
    }

    #[test]
    fn test_containers_do_not_compare() {
        let mut heap = Heap::new();
        let list = heap.alloc(HeapData::List(List::new())).unwrap();
        assert_eq!(
            Value::Ref(list).op_eql(&Value::Ref(list), &heap),
            Err(RunError::unsupported("list", "op_eql"))
        );
    }

    #[test]
    fn test_string_equality_by_content() {
        let mut heap = Heap::new();
        let a = heap.alloc_str("same").unwrap();
        let b = heap.alloc_str("same").unwrap();
        assert_ne!(a, b);
        assert!(Value::Ref(a).op_eql(&Value::Ref(b), &heap).unwrap());
        assert_eq!(
            Value::Ref(a).hash(&heap).unwrap(),
            Value::Ref(b).hash(&heap).unwrap()
        );
    }

    #[test]
    fn test_ordering() {
        let heap = Heap::new();
        assert!(Value::Int(1).op_lss(&Value::Int(2), &heap).unwrap());
        assert!(Value::Int(3).op_geq(&Value::Float(2.5), &heap).unwrap());
        assert!(Value::Float(1.5).op_leq(&Value::Int(2), &heap).unwrap());
        assert_eq!(
            Value::None.op_grt(&Value::Int(1), &heap),
            Err(RunError::unsupported("none", "op_grt"))
        );
    }

    #[test]
    fn test_copy_value_duplicates_strings() {
        let mut heap = Heap::new();
        let original = heap.alloc_str("text").unwrap();
        let copy = Value::Ref(original).copy_value(&mut heap).unwrap();
        assert_ne!(copy.ref_id(), Some(original));
        assert!(copy.op_eql(&Value::Ref(original), &heap).unwrap());
        assert_eq!(Value::Int(3).copy_value(&mut heap).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_count() {
        let mut heap = Heap::new();
        let s = heap.alloc_str("héllo").unwrap();
        assert_eq!(Value::Ref(s).count(&heap).unwrap(), 5);
        assert_eq!(Value::Int(1).count(&heap), Err(RunError::unsupported("int", "count")));
    }

    #[test]
    fn test_insert_and_select_through_dispatch() {
        let mut heap = Heap::new();
        let map = Value::Ref(heap.alloc(HeapData::Map(Map::new())).unwrap());
        let key = Value::Ref(heap.alloc_str("k").unwrap());
        map.insert(key, Value::Int(9), &mut heap).unwrap();
        assert_eq!(map.select(&key, &heap).unwrap(), Some(Value::Int(9)));

        let list = Value::Ref(heap.alloc(HeapData::List(List::new())).unwrap());
        list.insert(Value::Int(0), Value::Int(7), &mut heap).unwrap();
        assert_eq!(list.select(&Value::Int(0), &heap).unwrap(), Some(Value::Int(7)));
        assert_eq!(
            list.insert(Value::None, Value::Int(7), &mut heap),
            Err(RunError::TypeMismatch {
                expected: "int",
                found: "none"
            })
        );

        assert_eq!(
            Value::Int(1).insert(Value::Int(0), Value::None, &mut heap),
            Err(RunError::unsupported("int", "insert"))
        );
    }

    #[test]
    fn test_print_forms() {
        let mut heap = Heap::new();
        assert_eq!(printed(&Value::None, &heap), "none");
        assert_eq!(printed(&Value::Bool(true), &heap), "true");
        assert_eq!(printed(&Value::Float(2.5), &heap), "2.5");
        assert_eq!(printed(&Value::Type(Type::List), &heap), "list");

        let mut list = List::new();
        list.set(0, Value::Int(1)).unwrap();
        list.set(1, Value::None).unwrap();
        let list = Value::Ref(heap.alloc(HeapData::List(list)).unwrap());
        assert_eq!(printed(&list, &heap), "[1, none]");
    }

    #[test]
    fn test_print_cyclic_list_terminates() {
        let mut heap = Heap::new();
        let id = heap.alloc(HeapData::List(List::new())).unwrap();
        let HeapData::List(list) = heap.get_mut(id) else {
            unreachable!()
        };
        list.set(0, Value::Ref(id)).unwrap();
        let text = printed(&Value::Ref(id), &heap);
        assert!(text.contains("..."));
    }
}
