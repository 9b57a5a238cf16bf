//! Semantic analysis
//!
//! Analysis converts parsed forms into a typed, scope-resolved expression
//! tree. All symbols are resolved to bindings or vars, closures' captures
//! are computed, boxing requirements are inferred, and `recur` targets are
//! validated. The finished tree plus its frame hierarchy (bindings,
//! captures, lifted constants and vars) is what the code generation
//! backends consume.
//!
//! Pipeline:
//! ```text
//! Forms → Analyze → Expr tree + Frames → (external) codegen / evaluator
//! ```

mod analyze;
mod expr;
mod fold;
mod frame;

pub use analyze::{AnalysisContext, AnalysisResult, Analyzer, MAX_PARAMS};
pub use expr::{CatchClause, Expr, ExprKind, FinallyClause, FnArity, Position};
pub use fold::ConstEvaluator;
pub use frame::{
    Binding, Frame, FrameKind, LiftedConstant, LiftedVar, RecursionContext,
};
