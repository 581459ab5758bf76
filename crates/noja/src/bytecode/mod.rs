//! The bytecode side of the crate: opcode set, instruction model,
//! builder with promise-based forward references, and the tree-walk
//! compiler.
//!
//! # Module Structure
//!
//! - `op` - Opcode enum definitions
//! - `promise` - single-assignment jump-target placeholders
//! - `executable` - finalized instructions and the `Executable`
//! - `builder` - `ExeBuilder` for appending instructions during compilation
//! - `compiler` - AST to instruction-list compiler

pub use builder::{ExeBuilder, RawOperand};
pub use compiler::compile;
pub use executable::{Executable, Instr, Operand};
pub use op::Opcode;
pub use promise::Promise;

mod builder;
mod compiler;
mod executable;
mod op;
mod promise;
