use std::fmt;

use serde::{Deserialize, Serialize};

/// A compilation input: the raw program text plus an optional name.
///
/// The name is whatever the embedder wants shown in diagnostics and
/// listings, typically a file path. The text is kept alive for the whole
/// lifetime of anything compiled from it so spans can be resolved back to
/// the offending characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    name: Option<String>,
    text: String,
}

impl Source {
    /// Creates a named source (the name is typically a file path).
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            text: text.into(),
        }
    }

    /// Creates a source with no name, e.g. for REPL or test input.
    pub fn anonymous(text: impl Into<String>) -> Self {
        Self {
            name: None,
            text: text.into(),
        }
    }

    /// Returns the source name, if one was given.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the full program text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the program text length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns whether the program text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Returns the text covered by a span, if the span is in bounds.
    #[must_use]
    pub fn slice(&self, span: SourceSpan) -> Option<&str> {
        self.text.get(span.offset as usize..span.end() as usize)
    }
}

/// A contiguous byte range into a [`Source`].
///
/// Every AST node and every emitted instruction carries one of these so
/// runtime diagnostics can point at the originating code. Spans are plain
/// offset/length pairs; line and column resolution is left to whoever
/// formats the diagnostic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    /// Byte offset of the first covered character.
    pub offset: u32,
    /// Number of covered bytes. Zero-length spans mark positions, such as
    /// the implicit return at the end of a program.
    pub length: u32,
}

impl SourceSpan {
    /// Creates a span covering `length` bytes starting at `offset`.
    #[must_use]
    pub const fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    /// Creates a zero-length span marking a position.
    #[must_use]
    pub const fn at(offset: u32) -> Self {
        Self { offset, length: 0 }
    }

    /// Returns the first byte offset past the span.
    #[must_use]
    pub const fn end(self) -> u32 {
        self.offset + self.length
    }
}

/// Compact `Debug` form, since spans appear inside nearly every other
/// `Debug` output in the crate.
impl fmt::Debug for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.offset, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice() {
        let src = Source::new("t.noja", "x = 1");
        assert_eq!(src.slice(SourceSpan::new(0, 1)), Some("x"));
        assert_eq!(src.slice(SourceSpan::new(4, 1)), Some("1"));
        assert_eq!(src.slice(SourceSpan::new(4, 9)), None);
    }

    #[test]
    fn test_position_span() {
        let span = SourceSpan::at(5);
        assert_eq!(span.offset, 5);
        assert_eq!(span.length, 0);
        assert_eq!(span.end(), 5);
    }
}
