#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is masked or checked")]
#![expect(clippy::cast_sign_loss, reason = "hash-domain casts are intentional")]
#![expect(clippy::cast_possible_wrap, reason = "wrap behavior is intentional in hashing")]
#![expect(clippy::float_cmp, reason = "language equality is exact IEEE comparison")]

mod ast;
mod bytecode;
mod error;
mod function;
mod heap;
mod intern;
mod resource;
mod source;
mod types;
mod value;

pub use crate::{
    ast::{Ast, Expr, ExprKind, Node, NodeKind, OperKind, Param},
    bytecode::{ExeBuilder, Executable, Instr, Opcode, Operand, Promise, RawOperand, compile},
    error::{CompileError, CompileErrorKind, CompileResult, RunError, RunResult},
    function::Function,
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StringId},
    resource::HeapLimits,
    source::{Source, SourceSpan},
    types::{Closure, List, Map, Type, allocate_closure, bind, lookup},
    value::Value,
};
