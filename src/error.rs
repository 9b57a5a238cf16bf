//! Typed analysis errors
//!
//! One variant per violated analysis contract, replacing generic
//! `Result<T, String>` plumbing. Every error carries a human-readable
//! message and the source span of the offending form. The first error
//! encountered at any depth aborts analysis of the current compilation
//! unit; there is no recovery and there are no warnings.

use crate::form::Span;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Closed taxonomy of analysis failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("{span}: {message}")]
    InvalidDef { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidFnParameters { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidFnArity { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidLet { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidIf { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidQuote { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidVar { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidRecurPosition { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidRecurArgs { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidRecurFromTry { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidThrow { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidTry { message: String, span: Span },

    #[error("{span}: {message}")]
    InvalidCase { message: String, span: Span },

    #[error("{span}: unresolved symbol: {message}")]
    UnresolvedSymbol { message: String, span: Span },

    #[error("{span}: unresolved var: {message}")]
    UnresolvedVar { message: String, span: Span },

    #[error("{span}: macro expansion failed: {message}")]
    MacroExpansion { message: String, span: Span },

    /// States a well-formed parser can never hand us; distinct from
    /// user-facing syntax errors.
    #[error("{span}: internal analysis failure: {message}")]
    InternalFailure { message: String, span: Span },
}

macro_rules! constructors {
    ($($fn_name:ident => $variant:ident),* $(,)?) => {
        impl AnalysisError {
            $(
                pub fn $fn_name(message: impl Into<String>, span: &Span) -> Self {
                    AnalysisError::$variant {
                        message: message.into(),
                        span: span.clone(),
                    }
                }
            )*
        }
    };
}

constructors! {
    invalid_def => InvalidDef,
    invalid_fn_parameters => InvalidFnParameters,
    invalid_fn_arity => InvalidFnArity,
    invalid_let => InvalidLet,
    invalid_if => InvalidIf,
    invalid_quote => InvalidQuote,
    invalid_var => InvalidVar,
    invalid_recur_position => InvalidRecurPosition,
    invalid_recur_args => InvalidRecurArgs,
    invalid_recur_from_try => InvalidRecurFromTry,
    invalid_throw => InvalidThrow,
    invalid_try => InvalidTry,
    invalid_case => InvalidCase,
    unresolved_symbol => UnresolvedSymbol,
    unresolved_var => UnresolvedVar,
    macro_expansion => MacroExpansion,
    internal_failure => InternalFailure,
}

impl AnalysisError {
    /// The span of the offending form
    pub fn span(&self) -> &Span {
        match self {
            AnalysisError::InvalidDef { span, .. }
            | AnalysisError::InvalidFnParameters { span, .. }
            | AnalysisError::InvalidFnArity { span, .. }
            | AnalysisError::InvalidLet { span, .. }
            | AnalysisError::InvalidIf { span, .. }
            | AnalysisError::InvalidQuote { span, .. }
            | AnalysisError::InvalidVar { span, .. }
            | AnalysisError::InvalidRecurPosition { span, .. }
            | AnalysisError::InvalidRecurArgs { span, .. }
            | AnalysisError::InvalidRecurFromTry { span, .. }
            | AnalysisError::InvalidThrow { span, .. }
            | AnalysisError::InvalidTry { span, .. }
            | AnalysisError::InvalidCase { span, .. }
            | AnalysisError::UnresolvedSymbol { span, .. }
            | AnalysisError::UnresolvedVar { span, .. }
            | AnalysisError::MacroExpansion { span, .. }
            | AnalysisError::InternalFailure { span, .. } => span,
        }
    }
}
