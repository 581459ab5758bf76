//! Built-in runtime types and their payloads.
//!
//! `Type` is the type descriptor: a value's descriptor decides which
//! operations it supports, and an absent capability makes the operation
//! fail with `RunError::Unsupported` ("type X does not support Y").
//! Descriptors are themselves values (`Value::Type`), so `type(x)` style
//! introspection costs nothing.

pub use closure::{Closure, allocate_closure, bind, lookup};
pub use list::List;
pub use map::Map;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

mod closure;
mod list;
mod map;

/// Descriptor of a built-in runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    None,
    Bool,
    Int,
    Float,
    #[strum(serialize = "string")]
    Str,
    List,
    Map,
    Closure,
    Function,
    Type,
}

impl Type {
    /// The user-visible type name, as it appears in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Whether values of this type can be hashed, i.e. used as map keys.
    #[must_use]
    pub fn hashable(self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Float | Self::Str)
    }

    /// Whether values of this type implement equality comparison.
    #[must_use]
    pub fn comparable(self) -> bool {
        matches!(
            self,
            Self::None | Self::Bool | Self::Int | Self::Float | Self::Str | Self::Type
        )
    }
}
