//! The AST consumed by the bytecode compiler.
//!
//! The parser produces this tree; the compiler only reads it. Nodes are
//! plain owned data: statements are [`Node`]s, expressions are [`Expr`]s,
//! and both carry the source span of the text they were parsed from.

use serde::{Deserialize, Serialize};

use crate::source::{Source, SourceSpan};

/// A parsed program: the root statement block plus the source it came
/// from. The root is always a [`NodeKind::Compound`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ast {
    pub root: Node,
    pub source: Source,
}

impl Ast {
    /// Bundles a root block with its source.
    ///
    /// # Panics
    ///
    /// Panics if the root is not a compound block; the parser always
    /// wraps the top level in one.
    #[must_use]
    pub fn new(root: Node, source: Source) -> Self {
        assert!(
            matches!(root.kind, NodeKind::Compound { .. }),
            "AST root must be a compound block"
        );
        Self { root, source }
    }
}

/// One statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub span: SourceSpan,
    pub kind: NodeKind,
}

impl Node {
    /// Whether this statement is a bare expression, i.e. leaves one value
    /// on the stack that the enclosing context must pop.
    #[must_use]
    pub fn is_expr(&self) -> bool {
        matches!(self.kind, NodeKind::Expr(_))
    }
}

/// Statement kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    /// An expression in statement position.
    Expr(Expr),
    /// `break` out of the innermost enclosing loop.
    Break,
    IfElse {
        condition: Expr,
        true_branch: Box<Node>,
        false_branch: Option<Box<Node>>,
    },
    While {
        condition: Expr,
        body: Box<Node>,
    },
    /// `do { body } while (condition)` — body runs before the first test.
    DoWhile {
        body: Box<Node>,
        condition: Expr,
    },
    /// An ordered block of statements.
    Compound { stmts: Vec<Node> },
    /// `return expr`. A bare `return` is represented by the parser as a
    /// [`ExprKind::NoneLiteral`] value; `return a, b` as a pair tree.
    Return { value: Expr },
    /// A named function definition.
    Func {
        name: String,
        params: Vec<Param>,
        body: Box<Node>,
    },
}

/// One declared function parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub span: SourceSpan,
    pub name: String,
}

/// One expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub span: SourceSpan,
    pub kind: ExprKind,
}

/// Expression kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    NoneLiteral,
    True,
    False,
    /// A unary or binary operator application. Operands are stored in
    /// evaluation order; unary operators have one, binary two.
    Oper { kind: OperKind, operands: Vec<Expr> },
    /// A comma pair. Nested pairs form the tuple trees that only
    /// assignment and return statements may flatten.
    Pair { first: Box<Expr>, second: Box<Expr> },
    /// `target = value`. The target may be a pair tree of assignable
    /// expressions (identifiers and index selections).
    Assign { target: Box<Expr>, value: Box<Expr> },
    /// `[a, b, c]`
    List { items: Vec<Expr> },
    /// `{k: v, ...}` — parallel key/value lists of equal length.
    Map { keys: Vec<Expr>, values: Vec<Expr> },
    /// `func(args...)`
    Call { func: Box<Expr>, args: Vec<Expr> },
    /// `container[index]` in read position. In assignment-target position
    /// the compiler lowers it to an in-place insert instead.
    Select { set: Box<Expr>, index: Box<Expr> },
}

/// Operator tags for [`ExprKind::Oper`].
///
/// `And` and `Or` are eager here: both operands are evaluated before the
/// opcode runs. Short-circuit forms would have to be rewritten into
/// conditionals by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperKind {
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
