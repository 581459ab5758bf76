//! The finalized instruction list and its operand model.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::op::Opcode;
use crate::{
    intern::{Interns, StringId},
    source::{Source, SourceSpan},
};

/// A finalized instruction operand.
///
/// Builder-side operands may still reference an unresolved promise; by
/// construction this type cannot, so a finalized executable holds no
/// placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Int(i64),
    Float(f64),
    /// An interned string; resolve through [`Executable::interns`].
    Str(StringId),
}

/// One finalized instruction: opcode, operands, and the span of the
/// source construct it was emitted for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instr {
    pub op: Opcode,
    pub operands: SmallVec<[Operand; 2]>,
    pub span: SourceSpan,
}

/// An immutable, fully resolved instruction list.
///
/// Produced by the builder at finalization, consumed by the interpreter.
/// Owns the intern table its string operands index into, and a copy of
/// the source for diagnostic messages during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Executable {
    instrs: Vec<Instr>,
    interns: Interns,
    source: Source,
}

impl Executable {
    pub(crate) fn new(instrs: Vec<Instr>, interns: Interns, source: Source) -> Self {
        Self { instrs, interns, source }
    }

    /// Returns the instruction list.
    #[must_use]
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    /// Returns the instruction at `index`, if in range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Instr> {
        self.instrs.get(index)
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Returns whether the executable holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Returns the intern table for resolving string operands.
    #[must_use]
    pub fn interns(&self) -> &Interns {
        &self.interns
    }

    /// Resolves a string operand.
    #[must_use]
    pub fn str_operand(&self, id: StringId) -> &str {
        self.interns.get(id)
    }

    /// Returns the source this executable was compiled from.
    #[must_use]
    pub fn source(&self) -> &Source {
        &self.source
    }
}

/// One instruction per line: index, opcode, operands with interned
/// strings resolved. The listing is the main debugging surface for
/// compiler output.
impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, instr) in self.instrs.iter().enumerate() {
            write!(f, "{index:4}  {}", instr.op)?;
            for operand in &instr.operands {
                match operand {
                    Operand::Int(value) => write!(f, " {value}")?,
                    Operand::Float(value) => write!(f, " {}", ryu::Buffer::new().format(*value))?,
                    Operand::Str(id) => write!(f, " {:?}", self.interns.get(*id))?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
