//! Opcode definitions for the stack machine.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// One opcode of the stack machine. The stack holds object references.
///
/// Operand counts are fixed per opcode (see [`Opcode::operand_count`]);
/// the builder asserts them on append. Jump operands hold instruction
/// indices, not byte offsets, since instructions are stored as a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Opcode {
    /// `int ->` push an integer literal.
    PushInt,
    /// `float ->` push a float literal.
    PushFlt,
    /// `str ->` push a string literal.
    PushStr,
    /// `->` push the true singleton.
    PushTru,
    /// `->` push the false singleton.
    PushFls,
    /// `->` push the none singleton.
    PushNne,
    /// `n ->` push a new empty list with capacity hint `n`.
    PushLst,
    /// `n ->` push a new empty map with capacity hint `n`.
    PushMap,
    /// `name ->` push the value bound to `name`, walking the closure
    /// chain outward from the innermost frame.
    PushVar,
    /// `entry, argc ->` push a function object capturing the current
    /// closure chain.
    PushFun,
    /// `name:` bind the stack top to `name` in the innermost frame. The
    /// value stays on the stack.
    Ass,
    /// `k:` pop `k` values.
    Pop,
    /// `container, index -> value` index read.
    Select,
    /// `container, key, value -> container` index write; the container
    /// is updated in place and stays on the stack.
    Insert,
    /// `value, container, index -> value` index write used by
    /// multi-target assignment. Note the operand order differs from
    /// [`Opcode::Insert`]: the stored value sits underneath.
    Insert2,
    /// `argc, returns: args..., callee -> returns values`.
    Call,
    /// `n:` pop `n` values and return them to the caller.
    Return,
    /// `target:` unconditional jump.
    Jump,
    /// `target:` pop the condition, jump if falsy.
    JumpIfNotAndPop,
    /// `target:` pop the condition, jump if truthy.
    JumpIfAndPop,
    Not,
    Pos,
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Eql,
    Nql,
    Lss,
    Leq,
    Grt,
    Geq,
    And,
    Or,
}

impl Opcode {
    /// Number of operands this opcode carries.
    #[must_use]
    pub fn operand_count(self) -> usize {
        match self {
            Self::PushInt
            | Self::PushFlt
            | Self::PushStr
            | Self::PushLst
            | Self::PushMap
            | Self::PushVar
            | Self::Ass
            | Self::Pop
            | Self::Return
            | Self::Jump
            | Self::JumpIfNotAndPop
            | Self::JumpIfAndPop => 1,
            Self::PushFun | Self::Call => 2,
            Self::PushTru
            | Self::PushFls
            | Self::PushNne
            | Self::Select
            | Self::Insert
            | Self::Insert2
            | Self::Not
            | Self::Pos
            | Self::Neg
            | Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Eql
            | Self::Nql
            | Self::Lss
            | Self::Leq
            | Self::Grt
            | Self::Geq
            | Self::And
            | Self::Or => 0,
        }
    }

    /// Whether the first operand is an instruction index that must stay
    /// inside the executable. Checked at finalization.
    #[must_use]
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::JumpIfNotAndPop | Self::JumpIfAndPop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(Opcode::PushInt.to_string(), "PUSHINT");
        assert_eq!(Opcode::JumpIfNotAndPop.to_string(), "JUMPIFNOTANDPOP");
        assert_eq!(Opcode::Insert2.to_string(), "INSERT2");
    }

    #[test]
    fn test_operand_counts() {
        assert_eq!(Opcode::Call.operand_count(), 2);
        assert_eq!(Opcode::Pop.operand_count(), 1);
        assert_eq!(Opcode::Add.operand_count(), 0);
        assert!(Opcode::JumpIfAndPop.is_jump());
        assert!(!Opcode::Call.is_jump());
    }
}
