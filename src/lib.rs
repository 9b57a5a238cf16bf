//! # Sable — semantic analysis for a Clojure-family Lisp
//!
//! Sable is the front end of a Lisp compiler: it turns parsed s-expression
//! forms into a typed, scope-resolved expression tree that code generation
//! backends (native, C++ source, or a tree-walking evaluator) consume.
//!
//! ## Quick start
//!
//! ```
//! use sable::{Analyzer, ConstEvaluator, Form, Namespaces, Span, SymbolTable};
//!
//! let mut symbols = SymbolTable::new();
//! let mut namespaces = Namespaces::default();
//! let mut evaluator = ConstEvaluator;
//!
//! // (let* [x 1] x)
//! let span = Span::synthetic();
//! let form = Form::list(
//!     vec![
//!         Form::symbol("let*", span.clone()),
//!         Form::vector(
//!             vec![Form::symbol("x", span.clone()), Form::int(1, span.clone())],
//!             span.clone(),
//!         ),
//!         Form::symbol("x", span.clone()),
//!     ],
//!     span,
//! );
//!
//! let mut analyzer = Analyzer::new(&mut symbols, &mut namespaces, &mut evaluator);
//! let result = analyzer.analyze(&[form]).unwrap();
//! let _ = result.expr;
//! ```
//!
//! ## Architecture
//!
//! 1. **Forms** — parsed s-expressions handed in by the (external) reader
//! 2. **Analysis** — scope resolution, capture computation, boxing
//!    inference, special-form validation
//! 3. **Expression tree + frames** — the IR read by the (external) backends
//!
//! Analysis is single-threaded and synchronous; errors abort the current
//! unit at the first violation.

pub mod analysis;
pub mod error;
pub mod form;
pub mod symbol;
pub mod value;
pub mod vars;

pub use analysis::{
    AnalysisContext, AnalysisResult, Analyzer, Binding, CatchClause, ConstEvaluator, Expr,
    ExprKind, FinallyClause, FnArity, Frame, FrameKind, LiftedConstant, LiftedVar, Position,
    RecursionContext, MAX_PARAMS,
};
pub use error::{AnalysisError, Result};
pub use form::{Form, FormKind, Span, SymName};
pub use symbol::{SymbolId, SymbolTable};
pub use value::Value;
pub use vars::{ArityMeta, Evaluator, Namespaces, Var};
