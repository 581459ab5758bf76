//! Tree-walk lowering of the AST into a flat instruction stream.
//!
//! [`compile`] is the only entry point. Lowering is recursive descent
//! over statements and expressions; any semantic or internal error
//! unwinds with `?` back to the entry, which returns it with no partial
//! output. Forward jump targets are represented with [`Promise`]s that
//! the builder substitutes at finalization.

use super::{
    builder::{ExeBuilder, RawOperand},
    executable::Executable,
    op::Opcode,
    promise::Promise,
};
use crate::{
    ast::{Ast, Expr, ExprKind, Node, NodeKind, OperKind, Param},
    error::{CompileError, CompileResult},
    source::SourceSpan,
};

/// Upper bound on flattened tuple elements in one assignment or return.
const MAX_TUPLE_ITEMS: usize = 32;

/// Lowers an AST into a finalized [`Executable`].
///
/// On failure the error describes the first problem encountered, with
/// the span of the offending node for semantic errors. No partial
/// executable is ever produced.
pub fn compile(ast: &Ast) -> CompileResult<Executable> {
    debug_assert!(matches!(ast.root.kind, NodeKind::Compound { .. }));

    let mut codegen = Codegen {
        builder: ExeBuilder::new(),
    };
    codegen.node(&ast.root, None)?;

    // Terminate uncontrolled falloff past the last statement.
    let end = u32::try_from(ast.source.len()).expect("source exceeds u32 range");
    codegen.emit(Opcode::Return, [RawOperand::Int(0)], SourceSpan::at(end));

    codegen.builder.finalize(&ast.source)
}

struct Codegen {
    builder: ExeBuilder,
}

impl Codegen {
    fn emit(&mut self, op: Opcode, operands: impl IntoIterator<Item = RawOperand>, span: SourceSpan) {
        self.builder.append(op, operands, span);
    }

    fn emit_pop1(&mut self, span: SourceSpan) {
        self.emit(Opcode::Pop, [RawOperand::Int(1)], span);
    }

    fn emit_ass(&mut self, name: &str, span: SourceSpan) {
        let id = self.builder.intern(name);
        self.emit(Opcode::Ass, [RawOperand::Str(id)], span);
    }

    /// The next instruction index, used as a jump target.
    fn here(&self) -> u32 {
        u32::try_from(self.builder.instr_count()).expect("instruction count exceeds u32 range")
    }

    /// Lowers one statement. `break_dest` is the promise for the end of
    /// the innermost enclosing loop, or `None` outside any loop.
    fn node(&mut self, node: &Node, break_dest: Option<&Promise>) -> CompileResult<()> {
        match &node.kind {
            NodeKind::Expr(expr) => self.expr(expr),
            NodeKind::Break => {
                let Some(dest) = break_dest else {
                    return Err(CompileError::semantic(node.span, "Break not inside a loop"));
                };
                self.emit(Opcode::Jump, [RawOperand::Promise(dest.clone())], node.span);
                Ok(())
            }
            NodeKind::IfElse {
                condition,
                true_branch,
                false_branch,
            } => self.if_else(node.span, condition, true_branch, false_branch.as_deref(), break_dest),
            NodeKind::While { condition, body } => self.while_loop(node.span, condition, body),
            NodeKind::DoWhile { body, condition } => self.do_while(body, condition),
            NodeKind::Compound { stmts } => {
                for stmt in stmts {
                    self.node(stmt, break_dest)?;
                    if stmt.is_expr() {
                        self.emit_pop1(SourceSpan::at(stmt.span.offset));
                    }
                }
                Ok(())
            }
            NodeKind::Return { value } => {
                let mut tuple = Vec::new();
                flatten_tuple(value, &mut tuple)?;
                for item in &tuple {
                    self.expr(item)?;
                }
                let count = i64::try_from(tuple.len()).expect("tuple length exceeds i64 range");
                self.emit(Opcode::Return, [RawOperand::Int(count)], node.span);
                Ok(())
            }
            NodeKind::Func { name, params, body } => self.function(node.span, name, params, body),
        }
    }

    /// Lowers one expression, leaving exactly one value on the stack.
    fn expr(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::Pair { .. } => Err(CompileError::semantic(
                expr.span,
                "Tuple outside of assignment or return statement",
            )),
            ExprKind::Oper { kind, operands } => {
                for operand in operands {
                    self.expr(operand)?;
                }
                self.emit(oper_opcode(*kind), [], expr.span);
                Ok(())
            }
            ExprKind::Assign { target, value } => self.assignment(expr.span, target, value),
            ExprKind::Int(value) => {
                self.emit(Opcode::PushInt, [RawOperand::Int(*value)], expr.span);
                Ok(())
            }
            ExprKind::Float(value) => {
                self.emit(Opcode::PushFlt, [RawOperand::Float(*value)], expr.span);
                Ok(())
            }
            ExprKind::Str(value) => {
                let id = self.builder.intern(value);
                self.emit(Opcode::PushStr, [RawOperand::Str(id)], expr.span);
                Ok(())
            }
            ExprKind::Ident(name) => {
                let id = self.builder.intern(name);
                self.emit(Opcode::PushVar, [RawOperand::Str(id)], expr.span);
                Ok(())
            }
            ExprKind::NoneLiteral => {
                self.emit(Opcode::PushNne, [], expr.span);
                Ok(())
            }
            ExprKind::True => {
                self.emit(Opcode::PushTru, [], expr.span);
                Ok(())
            }
            ExprKind::False => {
                self.emit(Opcode::PushFls, [], expr.span);
                Ok(())
            }
            ExprKind::List { items } => {
                let count = i64::try_from(items.len()).expect("list length exceeds i64 range");
                self.emit(Opcode::PushLst, [RawOperand::Int(count)], expr.span);
                for (index, item) in items.iter().enumerate() {
                    let index = i64::try_from(index).expect("list index exceeds i64 range");
                    self.emit(Opcode::PushInt, [RawOperand::Int(index)], item.span);
                    self.expr(item)?;
                    self.emit(Opcode::Insert, [], item.span);
                }
                Ok(())
            }
            ExprKind::Map { keys, values } => {
                debug_assert_eq!(keys.len(), values.len());
                let count = i64::try_from(values.len()).expect("map length exceeds i64 range");
                self.emit(Opcode::PushMap, [RawOperand::Int(count)], expr.span);
                for (key, value) in keys.iter().zip(values) {
                    self.expr(key)?;
                    self.expr(value)?;
                    self.emit(Opcode::Insert, [], value.span);
                }
                Ok(())
            }
            ExprKind::Call { func, args } => self.call(expr.span, func, args, 1),
            ExprKind::Select { set, index } => {
                self.expr(set)?;
                self.expr(index)?;
                self.emit(Opcode::Select, [], expr.span);
                Ok(())
            }
        }
    }

    /// Arguments left to right, then the callee, then `CALL argc, returns`.
    fn call(&mut self, span: SourceSpan, func: &Expr, args: &[Expr], returns: i64) -> CompileResult<()> {
        for arg in args {
            self.expr(arg)?;
        }
        self.expr(func)?;
        let argc = i64::try_from(args.len()).expect("argument count exceeds i64 range");
        self.emit(Opcode::Call, [RawOperand::Int(argc), RawOperand::Int(returns)], span);
        Ok(())
    }

    /// Lowers `target = value`, including multi-target tuple assignment.
    ///
    /// The RHS leaves as many values on the stack as there are targets
    /// (which for more than one target requires a call). Targets are then
    /// stored in reverse order, popping each stored value except the
    /// last, so the whole assignment nets one value like any expression.
    fn assignment(&mut self, span: SourceSpan, target: &Expr, value: &Expr) -> CompileResult<()> {
        let mut tuple = Vec::new();
        flatten_tuple(target, &mut tuple)?;
        let count = tuple.len();
        debug_assert!(count > 0);

        if count == 1 {
            self.expr(value)?;
        } else if let ExprKind::Call { func, args } = &value.kind {
            let returns = i64::try_from(count).expect("tuple length exceeds i64 range");
            self.call(value.span, func, args, returns)?;
        } else {
            return Err(CompileError::semantic(
                value.span,
                format!("Assigning to {count} variables only 1 value"),
            ));
        }

        for i in 0..count {
            let item = tuple[count - i - 1];
            match &item.kind {
                ExprKind::Ident(name) => self.emit_ass(name, item.span),
                ExprKind::Select { set, index } => {
                    self.expr(set)?;
                    self.expr(index)?;
                    self.emit(Opcode::Insert2, [], item.span);
                }
                _ => {
                    return Err(CompileError::semantic(
                        item.span,
                        "Assigning to something that it can't be assigned to",
                    ));
                }
            }
            if i + 1 < count {
                self.emit_pop1(SourceSpan::at(span.offset));
            }
        }
        Ok(())
    }

    fn if_else(
        &mut self,
        span: SourceSpan,
        condition: &Expr,
        true_branch: &Node,
        false_branch: Option<&Node>,
        break_dest: Option<&Promise>,
    ) -> CompileResult<()> {
        self.expr(condition)?;

        if let Some(false_branch) = false_branch {
            let else_offset = Promise::new();
            let done_offset = Promise::new();

            self.emit(Opcode::JumpIfNotAndPop, [RawOperand::Promise(else_offset.clone())], span);

            self.node(true_branch, break_dest)?;
            if true_branch.is_expr() {
                self.emit_pop1(SourceSpan::at(true_branch.span.offset));
            }
            self.emit(Opcode::Jump, [RawOperand::Promise(done_offset.clone())], span);

            else_offset.resolve(self.here());

            self.node(false_branch, break_dest)?;
            if false_branch.is_expr() {
                self.emit_pop1(SourceSpan::at(false_branch.span.offset));
            }

            done_offset.resolve(self.here());
        } else {
            let done_offset = Promise::new();

            self.emit(Opcode::JumpIfNotAndPop, [RawOperand::Promise(done_offset.clone())], span);

            self.node(true_branch, break_dest)?;
            if true_branch.is_expr() {
                self.emit_pop1(SourceSpan::at(true_branch.span.offset));
            }

            done_offset.resolve(self.here());
        }
        Ok(())
    }

    /// ```text
    /// start:
    ///   <condition>
    ///   JUMPIFNOTANDPOP end
    ///   <body>              (break jumps to end)
    ///   JUMP start
    /// end:
    /// ```
    fn while_loop(&mut self, span: SourceSpan, condition: &Expr, body: &Node) -> CompileResult<()> {
        let start_offset = Promise::new();
        let end_offset = Promise::new();

        start_offset.resolve(self.here());

        self.expr(condition)?;
        self.emit(
            Opcode::JumpIfNotAndPop,
            [RawOperand::Promise(end_offset.clone())],
            condition.span,
        );

        self.node(body, Some(&end_offset))?;
        if body.is_expr() {
            self.emit_pop1(SourceSpan::at(body.span.offset));
        }

        self.emit(Opcode::Jump, [RawOperand::Promise(start_offset)], span);

        end_offset.resolve(self.here());
        Ok(())
    }

    /// ```text
    /// start:
    ///   <body>              (break jumps to end)
    ///   <condition>
    ///   JUMPIFANDPOP start
    /// end:
    /// ```
    ///
    /// The backward target is known when the jump is emitted, so it is a
    /// plain integer rather than a promise.
    fn do_while(&mut self, body: &Node, condition: &Expr) -> CompileResult<()> {
        let end_offset = Promise::new();
        let start = i64::from(self.here());

        self.node(body, Some(&end_offset))?;
        if body.is_expr() {
            self.emit_pop1(SourceSpan::at(body.span.offset));
        }

        self.expr(condition)?;
        self.emit(Opcode::JumpIfAndPop, [RawOperand::Int(start)], condition.span);

        end_offset.resolve(self.here());
        Ok(())
    }

    /// Function bodies are emitted inline with a skip-jump over them:
    ///
    /// ```text
    ///   PUSHFUN entry, argc
    ///   ASS name
    ///   POP 1
    ///   JUMP after
    /// entry:
    ///   ASS param; POP 1    (per parameter, in declaration order)
    ///   <body>              (break does not cross the boundary)
    ///   RETURN 0            (in case the body didn't return)
    /// after:
    /// ```
    ///
    /// The runtime's `PUSHFUN` captures the closure chain current at the
    /// definition site together with the entry index.
    fn function(&mut self, span: SourceSpan, name: &str, params: &[Param], body: &Node) -> CompileResult<()> {
        let entry_offset = Promise::new();
        let after_offset = Promise::new();

        let argc = i64::try_from(params.len()).expect("parameter count exceeds i64 range");
        self.emit(
            Opcode::PushFun,
            [RawOperand::Promise(entry_offset.clone()), RawOperand::Int(argc)],
            span,
        );
        self.emit_ass(name, span);
        self.emit_pop1(span);

        self.emit(Opcode::Jump, [RawOperand::Promise(after_offset.clone())], span);

        entry_offset.resolve(self.here());

        // The caller pushed the arguments; bind them in declaration order.
        for param in params {
            self.emit_ass(&param.name, param.span);
            self.emit_pop1(param.span);
        }

        self.node(body, None)?;
        if body.is_expr() {
            self.emit_pop1(SourceSpan::at(body.span.end()));
        }
        self.emit(Opcode::Return, [RawOperand::Int(0)], SourceSpan::at(body.span.offset));

        after_offset.resolve(self.here());
        Ok(())
    }
}

fn oper_opcode(kind: OperKind) -> Opcode {
    match kind {
        OperKind::Not => Opcode::Not,
        OperKind::Pos => Opcode::Pos,
        OperKind::Neg => Opcode::Neg,
        OperKind::Add => Opcode::Add,
        OperKind::Sub => Opcode::Sub,
        OperKind::Mul => Opcode::Mul,
        OperKind::Div => Opcode::Div,
        OperKind::Eql => Opcode::Eql,
        OperKind::Nql => Opcode::Nql,
        OperKind::Lss => Opcode::Lss,
        OperKind::Leq => Opcode::Leq,
        OperKind::Grt => Opcode::Grt,
        OperKind::Geq => Opcode::Geq,
        OperKind::And => Opcode::And,
        OperKind::Or => Opcode::Or,
    }
}

/// Flattens a pair tree into its leaves in source order.
fn flatten_tuple<'a>(root: &'a Expr, out: &mut Vec<&'a Expr>) -> CompileResult<()> {
    if let ExprKind::Pair { first, second } = &root.kind {
        flatten_tuple(first, out)?;
        flatten_tuple(second, out)?;
    } else {
        if out.len() == MAX_TUPLE_ITEMS {
            return Err(CompileError::semantic(
                root.span,
                format!("Tuples of more than {MAX_TUPLE_ITEMS} values are not supported"),
            ));
        }
        out.push(root);
    }
    Ok(())
}
