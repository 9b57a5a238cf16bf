//! Expression IR produced by analysis
//!
//! One tagged variant per source construct. Every node carries the
//! position it was analyzed in (statement/value/tail), whether the site
//! demands a boxed result, and the frame it was analyzed under — the facts
//! the code generators dispatch on. The enum is closed; backends match it
//! exhaustively.

use crate::form::Span;
use crate::value::Value;
use crate::vars::Var;
use smallvec::SmallVec;
use std::rc::Rc;

use super::frame::{Binding, Frame, RecursionContext};

/// Where an expression's value flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Result discarded; evaluated for effect only
    Statement,
    /// Result consumed by the enclosing expression
    Value,
    /// Result becomes the enclosing function arity's return value
    Tail,
}

/// An analyzed expression
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub position: Position,
    pub needs_box: bool,
    pub frame: Frame,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span, position: Position, needs_box: bool, frame: Frame) -> Self {
        Expr {
            kind,
            span,
            position,
            needs_box,
            frame,
        }
    }

    /// Is this a fully-resolved compile-time constant?
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal { .. })
    }
}

/// One arity of a function expression
#[derive(Debug, Clone)]
pub struct FnArity {
    pub params: SmallVec<[Binding; 4]>,
    pub variadic: bool,
    /// Body sequence; every element but the last is a statement, the last
    /// is the arity's tail expression.
    pub body: Vec<Expr>,
    pub frame: Frame,
    pub recursion: RecursionContext,
}

/// The catch clause of a `try`, with the caught-exception binding scoped
/// to its own frame
#[derive(Debug, Clone)]
pub struct CatchClause {
    pub binding: Binding,
    pub body: Vec<Expr>,
    pub frame: Frame,
}

#[derive(Debug, Clone)]
pub struct FinallyClause {
    pub body: Vec<Expr>,
    pub frame: Frame,
}

/// Expression kinds
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A compile-time constant, lifted into its frame
    Literal { value: Value },

    /// Reference to a local binding or capture
    Local { binding: Binding },

    /// Ordinary var reference: dereference the var's root value
    VarDeref { var: Var },

    /// `(var x)`: the var object itself
    VarRef { var: Var },

    Def {
        var: Var,
        value: Option<Box<Expr>>,
    },

    Fn {
        name: Option<Rc<str>>,
        arities: Vec<FnArity>,
    },

    /// A call that resolved to the enclosing named function rather than a
    /// var. The binding is the function's self-reference slot (captured
    /// like any other binding when the recursion crosses closures).
    NamedRecursion {
        binding: Binding,
        args: Vec<Expr>,
    },

    Recur {
        context: RecursionContext,
        args: Vec<Expr>,
    },

    Do { values: Vec<Expr> },

    Let {
        /// Sequential bindings; the initializer is shared so the binding
        /// can hold a non-owning reference to it.
        bindings: Vec<(Binding, Rc<Expr>)>,
        body: Vec<Expr>,
    },

    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        else_: Option<Box<Expr>>,
    },

    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },

    Throw { value: Box<Expr> },

    Try {
        body: Vec<Expr>,
        catch: Option<CatchClause>,
        finally: Option<FinallyClause>,
    },

    /// `(case* value shift mask default {key expr ...})`
    Case {
        value: Box<Expr>,
        shift: i64,
        mask: i64,
        default: Box<Expr>,
        branches: Vec<(i64, Expr)>,
    },

    /// Runtime-built list (packed variadic overflow)
    ListLit { items: Vec<Expr> },
    /// Runtime-built vector (kept when folding was not possible)
    VectorLit { items: Vec<Expr> },
    MapLit { pairs: Vec<(Expr, Expr)> },
    /// Runtime-built set (kept when folding was not possible)
    SetLit { items: Vec<Expr> },
}
