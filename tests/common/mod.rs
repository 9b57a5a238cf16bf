//! Form builders and analysis helpers shared by the integration tests
#![allow(dead_code)]

use sable::{
    AnalysisResult, Analyzer, ConstEvaluator, Expr, ExprKind, Form, Namespaces, Result, Span,
    SymbolTable,
};

pub fn span() -> Span {
    Span::synthetic()
}

pub fn sym(name: &str) -> Form {
    Form::symbol(name, span())
}

pub fn qsym(ns: &str, name: &str) -> Form {
    Form::qualified_symbol(ns, name, span())
}

pub fn int(n: i64) -> Form {
    Form::int(n, span())
}

pub fn kw(name: &str) -> Form {
    Form::keyword(name, span())
}

pub fn string(s: &str) -> Form {
    Form::string(s, span())
}

pub fn nil() -> Form {
    Form::nil(span())
}

pub fn bool_(b: bool) -> Form {
    Form::bool_(b, span())
}

pub fn list(items: Vec<Form>) -> Form {
    Form::list(items, span())
}

pub fn vec_(items: Vec<Form>) -> Form {
    Form::vector(items, span())
}

pub fn map(pairs: Vec<(Form, Form)>) -> Form {
    Form::map(pairs, span())
}

pub fn set(items: Vec<Form>) -> Form {
    Form::set(items, span())
}

/// Analyze forms with a fresh symbol table and namespace registry
pub fn analyze(forms: &[Form]) -> Result<AnalysisResult> {
    let mut namespaces = Namespaces::default();
    analyze_in(&mut namespaces, forms)
}

/// Analyze forms against an existing namespace registry (for cross-unit
/// var identity tests)
pub fn analyze_in(namespaces: &mut Namespaces, forms: &[Form]) -> Result<AnalysisResult> {
    let mut symbols = SymbolTable::new();
    let mut evaluator = ConstEvaluator;
    let mut analyzer = Analyzer::new(&mut symbols, namespaces, &mut evaluator);
    analyzer.analyze(forms)
}

/// The body of the implicit top-level wrapper function
pub fn unit_body(result: &AnalysisResult) -> &[Expr] {
    match &result.expr.kind {
        ExprKind::Fn { arities, .. } => &arities[0].body,
        other => panic!("entry point must produce a fn wrapper, got {:?}", other),
    }
}

/// The first analyzed top-level expression
pub fn first(result: &AnalysisResult) -> &Expr {
    &unit_body(result)[0]
}
