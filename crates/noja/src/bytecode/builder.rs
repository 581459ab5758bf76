//! Builder for emitting instructions during compilation.
//!
//! `ExeBuilder` is append-only: the compiler pushes instructions in
//! lowering order, snapshots [`ExeBuilder::instr_count`] where a jump
//! target will land, and embeds [`Promise`]s for targets that are not
//! known yet. [`ExeBuilder::finalize`] substitutes every resolved
//! promise and produces the immutable [`Executable`].

use smallvec::SmallVec;

use super::{
    executable::{Executable, Instr, Operand},
    op::Opcode,
    promise::Promise,
};
use crate::{
    error::{CompileError, CompileResult},
    intern::{Interns, StringId},
    source::{Source, SourceSpan},
};

/// A builder-side operand: like [`Operand`] plus the promise case.
#[derive(Debug, Clone)]
pub enum RawOperand {
    Int(i64),
    Float(f64),
    Str(StringId),
    /// A jump target to be filled in at finalization.
    Promise(Promise),
}

/// One appended instruction awaiting finalization.
#[derive(Debug, Clone)]
struct PendingInstr {
    op: Opcode,
    operands: SmallVec<[RawOperand; 2]>,
    span: SourceSpan,
}

/// Append-only instruction buffer plus the intern table for string
/// operands.
#[derive(Debug, Default)]
pub struct ExeBuilder {
    instrs: Vec<PendingInstr>,
    interns: Interns,
}

impl ExeBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a name or string literal for use as an operand.
    pub fn intern(&mut self, s: &str) -> StringId {
        self.interns.intern(s)
    }

    /// Appends one instruction.
    ///
    /// Operands are copied into builder-owned storage; a promise operand
    /// keeps the instruction pending until the promise resolves.
    pub fn append(&mut self, op: Opcode, operands: impl IntoIterator<Item = RawOperand>, span: SourceSpan) {
        let operands: SmallVec<[RawOperand; 2]> = operands.into_iter().collect();
        debug_assert_eq!(
            operands.len(),
            op.operand_count(),
            "{op} takes {} operands",
            op.operand_count()
        );
        self.instrs.push(PendingInstr { op, operands, span });
    }

    /// Number of instructions appended so far. The compiler uses this to
    /// snapshot the current index as a jump target.
    #[must_use]
    pub fn instr_count(&self) -> usize {
        self.instrs.len()
    }

    /// Substitutes every promise operand with its resolved value and
    /// produces the executable.
    ///
    /// Fails with an internal error if any referenced promise is still
    /// unresolved, or if a jump target falls outside
    /// `0..=instr_count` — both indicate compiler bugs, not bad input.
    pub fn finalize(self, source: &Source) -> CompileResult<Executable> {
        let count = self.instrs.len();
        let mut instrs = Vec::with_capacity(count);
        for (index, pending) in self.instrs.into_iter().enumerate() {
            let mut operands = SmallVec::with_capacity(pending.operands.len());
            for operand in pending.operands {
                operands.push(match operand {
                    RawOperand::Int(value) => Operand::Int(value),
                    RawOperand::Float(value) => Operand::Float(value),
                    RawOperand::Str(id) => Operand::Str(id),
                    RawOperand::Promise(promise) => match promise.value() {
                        Some(value) => Operand::Int(i64::from(value)),
                        None => {
                            return Err(CompileError::internal(format!(
                                "unresolved jump promise in instruction {index} ({})",
                                pending.op
                            )));
                        }
                    },
                });
            }
            if pending.op.is_jump() {
                let target = match operands[0] {
                    Operand::Int(value) => value,
                    _ => return Err(CompileError::internal(format!("non-integer jump target in instruction {index}"))),
                };
                if target < 0 || target > count as i64 {
                    return Err(CompileError::internal(format!(
                        "jump target {target} out of range in instruction {index} of {count}"
                    )));
                }
            }
            instrs.push(Instr {
                op: pending.op,
                operands,
                span: pending.span,
            });
        }
        Ok(Executable::new(instrs, self.interns, source.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> SourceSpan {
        SourceSpan::at(0)
    }

    #[test]
    fn test_append_and_finalize() {
        let mut builder = ExeBuilder::new();
        builder.append(Opcode::PushInt, [RawOperand::Int(42)], span());
        builder.append(Opcode::Return, [RawOperand::Int(0)], span());

        let exe = builder.finalize(&Source::anonymous("")).unwrap();
        assert_eq!(exe.len(), 2);
        assert_eq!(exe.instrs()[0].op, Opcode::PushInt);
        assert_eq!(exe.instrs()[0].operands[0], Operand::Int(42));
    }

    #[test]
    fn test_promise_substitution() {
        let mut builder = ExeBuilder::new();
        let target = Promise::new();
        builder.append(Opcode::Jump, [RawOperand::Promise(target.clone())], span());
        builder.append(Opcode::PushNne, [], span());
        target.resolve(u32::try_from(builder.instr_count()).unwrap());
        builder.append(Opcode::Return, [RawOperand::Int(0)], span());

        let exe = builder.finalize(&Source::anonymous("")).unwrap();
        assert_eq!(exe.instrs()[0].operands[0], Operand::Int(2));
    }

    #[test]
    fn test_unresolved_promise_is_internal_error() {
        let mut builder = ExeBuilder::new();
        builder.append(Opcode::Jump, [RawOperand::Promise(Promise::new())], span());

        let err = builder.finalize(&Source::anonymous("")).unwrap_err();
        assert!(err.is_internal());
        assert!(err.message().contains("unresolved jump promise"));
    }

    #[test]
    fn test_out_of_range_target_is_internal_error() {
        let mut builder = ExeBuilder::new();
        builder.append(Opcode::Jump, [RawOperand::Int(5)], span());

        let err = builder.finalize(&Source::anonymous("")).unwrap_err();
        assert!(err.is_internal());
        assert!(err.message().contains("out of range"));
    }

    #[test]
    fn test_target_at_instr_count_is_valid() {
        // A jump to the first index past the end is how loops fall out of
        // the program; it must survive finalization.
        let mut builder = ExeBuilder::new();
        builder.append(Opcode::Jump, [RawOperand::Int(1)], span());

        assert!(builder.finalize(&Source::anonymous("")).is_ok());
    }

    #[test]
    fn test_interned_operand() {
        let mut builder = ExeBuilder::new();
        let name = builder.intern("counter");
        builder.append(Opcode::PushVar, [RawOperand::Str(name)], span());

        let exe = builder.finalize(&Source::anonymous("")).unwrap();
        assert_eq!(exe.str_operand(name), "counter");
    }
}
