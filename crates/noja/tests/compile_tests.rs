//! End-to-end lowering tests: build an AST the way the parser would,
//! compile it, and check the instruction listing.

use noja::{
    Ast, CompileError, Executable, Expr, ExprKind, Node, NodeKind, Opcode, OperKind, Operand, Param, Source,
    SourceSpan, compile,
};

fn expr(kind: ExprKind) -> Expr {
    Expr {
        span: SourceSpan::at(0),
        kind,
    }
}

fn int(value: i64) -> Expr {
    expr(ExprKind::Int(value))
}

fn ident(name: &str) -> Expr {
    expr(ExprKind::Ident(name.to_string()))
}

fn pair(first: Expr, second: Expr) -> Expr {
    expr(ExprKind::Pair {
        first: Box::new(first),
        second: Box::new(second),
    })
}

fn assign(target: Expr, value: Expr) -> Expr {
    expr(ExprKind::Assign {
        target: Box::new(target),
        value: Box::new(value),
    })
}

fn call(func: Expr, args: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        func: Box::new(func),
        args,
    })
}

fn select(set: Expr, index: Expr) -> Expr {
    expr(ExprKind::Select {
        set: Box::new(set),
        index: Box::new(index),
    })
}

fn stmt(e: Expr) -> Node {
    Node {
        span: e.span,
        kind: NodeKind::Expr(e),
    }
}

fn node(kind: NodeKind) -> Node {
    Node {
        span: SourceSpan::at(0),
        kind,
    }
}

fn param(name: &str) -> Param {
    Param {
        span: SourceSpan::at(0),
        name: name.to_string(),
    }
}

fn program(stmts: Vec<Node>) -> Ast {
    Ast::new(node(NodeKind::Compound { stmts }), Source::anonymous(""))
}

/// The `Display` listing without instruction indices, one entry per
/// instruction: `"PUSHINT 1"`, `"ASS \"x\""`, ...
fn listing(exe: &Executable) -> Vec<String> {
    exe.to_string()
        .lines()
        .map(|line| line.trim_start().split_once("  ").unwrap().1.to_string())
        .collect()
}

fn compile_stmts(stmts: Vec<Node>) -> Executable {
    compile(&program(stmts)).unwrap()
}

fn compile_err(stmts: Vec<Node>) -> CompileError {
    compile(&program(stmts)).unwrap_err()
}

#[test]
fn empty_program_still_returns() {
    let exe = compile_stmts(vec![]);
    assert_eq!(listing(&exe), ["RETURN 0"]);
}

#[test]
fn simple_assignment() {
    let exe = compile_stmts(vec![stmt(assign(ident("x"), int(1)))]);
    assert_eq!(listing(&exe), ["PUSHINT 1", "ASS \"x\"", "POP 1", "RETURN 0"]);
}

#[test]
fn multi_target_assignment_requests_two_returns() {
    let exe = compile_stmts(vec![stmt(assign(pair(ident("a"), ident("b")), call(ident("f"), vec![])))]);
    assert_eq!(
        listing(&exe),
        [
            "PUSHVAR \"f\"",
            "CALL 0 2",
            "ASS \"b\"",
            "POP 1",
            "ASS \"a\"",
            "POP 1",
            "RETURN 0",
        ]
    );
}

#[test]
fn if_else_at_statement_position() {
    let exe = compile_stmts(vec![node(NodeKind::IfElse {
        condition: ident("x"),
        true_branch: Box::new(stmt(int(1))),
        false_branch: Some(Box::new(stmt(int(2)))),
    })]);
    assert_eq!(
        listing(&exe),
        [
            "PUSHVAR \"x\"",
            "JUMPIFNOTANDPOP 5",
            "PUSHINT 1",
            "POP 1",
            "JUMP 7",
            "PUSHINT 2",
            "POP 1",
            "RETURN 0",
        ]
    );
}

#[test]
fn if_without_else() {
    let exe = compile_stmts(vec![node(NodeKind::IfElse {
        condition: ident("x"),
        true_branch: Box::new(stmt(int(1))),
        false_branch: None,
    })]);
    assert_eq!(
        listing(&exe),
        ["PUSHVAR \"x\"", "JUMPIFNOTANDPOP 4", "PUSHINT 1", "POP 1", "RETURN 0"]
    );
}

#[test]
fn while_with_break() {
    let exe = compile_stmts(vec![node(NodeKind::While {
        condition: ident("x"),
        body: Box::new(node(NodeKind::Break)),
    })]);
    assert_eq!(
        listing(&exe),
        ["PUSHVAR \"x\"", "JUMPIFNOTANDPOP 4", "JUMP 4", "JUMP 0", "RETURN 0"]
    );
}

#[test]
fn do_while_jumps_back_on_truthy() {
    let exe = compile_stmts(vec![node(NodeKind::DoWhile {
        body: Box::new(stmt(ident("x"))),
        condition: ident("c"),
    })]);
    assert_eq!(
        listing(&exe),
        ["PUSHVAR \"x\"", "POP 1", "PUSHVAR \"c\"", "JUMPIFANDPOP 0", "RETURN 0"]
    );
}

#[test]
fn break_inside_do_while_targets_loop_end() {
    let exe = compile_stmts(vec![node(NodeKind::DoWhile {
        body: Box::new(node(NodeKind::Break)),
        condition: ident("c"),
    })]);
    assert_eq!(
        listing(&exe),
        ["JUMP 3", "PUSHVAR \"c\"", "JUMPIFANDPOP 0", "RETURN 0"]
    );
}

#[test]
fn function_definition_is_inlined_with_skip_jump() {
    let exe = compile_stmts(vec![node(NodeKind::Func {
        name: "f".to_string(),
        params: vec![param("a")],
        body: Box::new(stmt(ident("a"))),
    })]);
    assert_eq!(
        listing(&exe),
        [
            "PUSHFUN 4 1",
            "ASS \"f\"",
            "POP 1",
            "JUMP 9",
            "ASS \"a\"",
            "POP 1",
            "PUSHVAR \"a\"",
            "POP 1",
            "RETURN 0",
            "RETURN 0",
        ]
    );
}

#[test]
fn break_does_not_cross_function_boundary() {
    let err = compile_err(vec![node(NodeKind::While {
        condition: ident("x"),
        body: Box::new(node(NodeKind::Func {
            name: "f".to_string(),
            params: vec![],
            body: Box::new(node(NodeKind::Break)),
        })),
    })]);
    assert!(err.message().contains("Break not inside a loop"));
}

#[test]
fn top_level_break_is_a_semantic_error() {
    let err = compile_err(vec![node(NodeKind::Break)]);
    assert!(!err.is_internal());
    assert!(err.message().contains("Break not inside a loop"));
    assert!(err.span().is_some());
}

#[test]
fn list_literal_builds_by_index() {
    let exe = compile_stmts(vec![stmt(expr(ExprKind::List {
        items: vec![int(1), int(2)],
    }))]);
    assert_eq!(
        listing(&exe),
        [
            "PUSHLST 2",
            "PUSHINT 0",
            "PUSHINT 1",
            "INSERT",
            "PUSHINT 1",
            "PUSHINT 2",
            "INSERT",
            "POP 1",
            "RETURN 0",
        ]
    );
}

#[test]
fn map_literal_inserts_pairs_in_order() {
    let exe = compile_stmts(vec![stmt(expr(ExprKind::Map {
        keys: vec![expr(ExprKind::Str("k".to_string()))],
        values: vec![int(1)],
    }))]);
    assert_eq!(
        listing(&exe),
        ["PUSHMAP 1", "PUSHSTR \"k\"", "PUSHINT 1", "INSERT", "POP 1", "RETURN 0"]
    );
}

#[test]
fn index_read_uses_select() {
    let exe = compile_stmts(vec![stmt(select(ident("x"), int(0)))]);
    assert_eq!(
        listing(&exe),
        ["PUSHVAR \"x\"", "PUSHINT 0", "SELECT", "POP 1", "RETURN 0"]
    );
}

#[test]
fn index_write_uses_insert2() {
    let exe = compile_stmts(vec![stmt(assign(select(ident("x"), int(0)), int(5)))]);
    assert_eq!(
        listing(&exe),
        ["PUSHINT 5", "PUSHVAR \"x\"", "PUSHINT 0", "INSERT2", "POP 1", "RETURN 0"]
    );
}

#[test]
fn mixed_targets_store_in_reverse_order() {
    let exe = compile_stmts(vec![stmt(assign(
        pair(ident("a"), select(ident("m"), ident("k"))),
        call(ident("f"), vec![]),
    ))]);
    assert_eq!(
        listing(&exe),
        [
            "PUSHVAR \"f\"",
            "CALL 0 2",
            "PUSHVAR \"m\"",
            "PUSHVAR \"k\"",
            "INSERT2",
            "POP 1",
            "ASS \"a\"",
            "POP 1",
            "RETURN 0",
        ]
    );
}

#[test]
fn operators_emit_operands_then_opcode() {
    let exe = compile_stmts(vec![stmt(expr(ExprKind::Oper {
        kind: OperKind::Add,
        operands: vec![
            int(1),
            expr(ExprKind::Oper {
                kind: OperKind::Mul,
                operands: vec![int(2), int(3)],
            }),
        ],
    }))]);
    assert_eq!(
        listing(&exe),
        ["PUSHINT 1", "PUSHINT 2", "PUSHINT 3", "MUL", "ADD", "POP 1", "RETURN 0"]
    );
}

#[test]
fn and_is_eager() {
    let exe = compile_stmts(vec![stmt(expr(ExprKind::Oper {
        kind: OperKind::And,
        operands: vec![ident("a"), ident("b")],
    }))]);
    assert_eq!(
        listing(&exe),
        ["PUSHVAR \"a\"", "PUSHVAR \"b\"", "AND", "POP 1", "RETURN 0"]
    );
}

#[test]
fn literals_push_singletons() {
    let exe = compile_stmts(vec![
        stmt(expr(ExprKind::True)),
        stmt(expr(ExprKind::False)),
        stmt(expr(ExprKind::NoneLiteral)),
        stmt(expr(ExprKind::Float(2.5))),
    ]);
    assert_eq!(
        listing(&exe),
        [
            "PUSHTRU", "POP 1", "PUSHFLS", "POP 1", "PUSHNNE", "POP 1", "PUSHFLT 2.5", "POP 1", "RETURN 0",
        ]
    );
}

#[test]
fn return_tuple_flattens_in_order() {
    let exe = compile_stmts(vec![node(NodeKind::Return {
        value: pair(ident("a"), ident("b")),
    })]);
    assert_eq!(
        listing(&exe),
        ["PUSHVAR \"a\"", "PUSHVAR \"b\"", "RETURN 2", "RETURN 0"]
    );
}

#[test]
fn bare_return_returns_none() {
    let exe = compile_stmts(vec![node(NodeKind::Return {
        value: expr(ExprKind::NoneLiteral),
    })]);
    assert_eq!(listing(&exe), ["PUSHNNE", "RETURN 1", "RETURN 0"]);
}

#[test]
fn tuple_outside_assignment_or_return_is_an_error() {
    let err = compile_err(vec![stmt(pair(int(1), int(2)))]);
    assert!(err.message().contains("Tuple outside of assignment or return statement"));
}

#[test]
fn multi_target_needs_a_call_rhs() {
    let err = compile_err(vec![stmt(assign(pair(ident("a"), ident("b")), int(1)))]);
    assert!(err.message().contains("Assigning to 2 variables only 1 value"));
}

#[test]
fn unassignable_target_is_an_error() {
    let err = compile_err(vec![stmt(assign(pair(int(1), ident("x")), call(ident("f"), vec![])))]);
    assert!(err.message().contains("Assigning to something that it can't be assigned to"));
}

#[test]
fn oversized_tuple_is_an_error() {
    let mut target = ident("v0");
    for i in 1..40 {
        target = pair(target, ident(&format!("v{i}")));
    }
    let err = compile_err(vec![stmt(assign(target, call(ident("f"), vec![])))]);
    assert!(err.message().contains("more than 32 values"));
}

#[test]
fn compilation_is_deterministic() {
    let build = || {
        compile_stmts(vec![
            node(NodeKind::While {
                condition: ident("x"),
                body: Box::new(node(NodeKind::IfElse {
                    condition: ident("y"),
                    true_branch: Box::new(node(NodeKind::Break)),
                    false_branch: Some(Box::new(stmt(call(ident("f"), vec![int(1)])))),
                })),
            }),
            node(NodeKind::Func {
                name: "g".to_string(),
                params: vec![param("p"), param("q")],
                body: Box::new(node(NodeKind::Return {
                    value: pair(ident("p"), ident("q")),
                })),
            }),
        ])
    };
    assert_eq!(listing(&build()), listing(&build()));
}

#[test]
fn every_jump_target_is_a_valid_index() {
    let exe = compile_stmts(vec![
        node(NodeKind::While {
            condition: ident("x"),
            body: Box::new(node(NodeKind::Compound {
                stmts: vec![
                    node(NodeKind::IfElse {
                        condition: ident("y"),
                        true_branch: Box::new(node(NodeKind::Break)),
                        false_branch: None,
                    }),
                    stmt(call(ident("f"), vec![])),
                ],
            })),
        }),
        node(NodeKind::DoWhile {
            body: Box::new(stmt(ident("a"))),
            condition: ident("c"),
        }),
        node(NodeKind::Func {
            name: "g".to_string(),
            params: vec![],
            body: Box::new(stmt(int(1))),
        }),
    ]);
    let count = exe.len() as i64;
    for instr in exe.instrs() {
        if instr.op.is_jump() {
            let Operand::Int(target) = instr.operands[0] else {
                panic!("jump holds a non-integer target");
            };
            assert!((0..=count).contains(&target), "target {target} out of range");
        }
    }
}

#[test]
fn nested_functions_resolve_their_own_entries() {
    let exe = compile_stmts(vec![node(NodeKind::Func {
        name: "outer".to_string(),
        params: vec![],
        body: Box::new(node(NodeKind::Compound {
            stmts: vec![node(NodeKind::Func {
                name: "inner".to_string(),
                params: vec![],
                body: Box::new(stmt(int(1))),
            })],
        })),
    })]);
    // Two PUSHFUN instructions, each pointing just past its own skip-jump.
    let entries: Vec<i64> = exe
        .instrs()
        .iter()
        .enumerate()
        .filter(|(_, instr)| instr.op == Opcode::PushFun)
        .map(|(index, instr)| {
            let Operand::Int(entry) = instr.operands[0] else {
                panic!("PUSHFUN entry is not an integer")
            };
            assert_eq!(entry, index as i64 + 4, "entry follows the definition prologue");
            entry
        })
        .collect();
    assert_eq!(entries.len(), 2);
}

#[test]
fn trailing_return_points_past_the_source() {
    let source = Source::anonymous("x = 1");
    let root = Node {
        span: SourceSpan::new(0, 5),
        kind: NodeKind::Compound {
            stmts: vec![Node {
                span: SourceSpan::new(0, 5),
                kind: NodeKind::Expr(Expr {
                    span: SourceSpan::new(0, 5),
                    kind: ExprKind::Assign {
                        target: Box::new(Expr {
                            span: SourceSpan::new(0, 1),
                            kind: ExprKind::Ident("x".to_string()),
                        }),
                        value: Box::new(Expr {
                            span: SourceSpan::new(4, 1),
                            kind: ExprKind::Int(1),
                        }),
                    },
                }),
            }],
        },
    };
    let exe = compile(&Ast::new(root, source)).unwrap();

    let last = exe.instrs().last().unwrap();
    assert_eq!(last.op, Opcode::Return);
    assert_eq!(last.span, SourceSpan::at(5));
    assert_eq!(exe.source().text(), "x = 1");
    assert_eq!(exe.instrs()[0].span, SourceSpan::new(4, 1));
}

#[test]
fn executable_survives_a_serde_round_trip() {
    let exe = compile_stmts(vec![
        stmt(assign(ident("x"), int(1))),
        node(NodeKind::While {
            condition: ident("x"),
            body: Box::new(node(NodeKind::Break)),
        }),
    ]);
    let json = serde_json::to_string(&exe).unwrap();
    let restored: Executable = serde_json::from_str(&json).unwrap();
    assert_eq!(listing(&restored), listing(&exe));
    assert_eq!(restored.source(), exe.source());
}
