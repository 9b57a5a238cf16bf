//! Literal folding
//!
//! Vector and set literals whose elements all resolved to constants are
//! handed to the evaluator and collapsed into a single lifted constant.
//! The build is speculative: if the evaluator cannot produce a value the
//! runtime-built literal expression is kept unchanged.

use crate::error::Result;
use crate::form::{Form, FormKind};
use crate::value::Value;
use crate::vars::Evaluator;
use log::debug;

use super::expr::{Expr, ExprKind};
use super::frame::Frame;

/// Fold an all-literal vector or set expression into one constant via the
/// evaluator. Anything else — including collections with runtime elements —
/// passes through untouched.
pub(crate) fn fold_collection(
    evaluator: &mut dyn Evaluator,
    expr: Expr,
    frame: &Frame,
) -> Result<Expr> {
    let foldable = match &expr.kind {
        ExprKind::VectorLit { items } | ExprKind::SetLit { items } => {
            items.iter().all(Expr::is_literal)
        }
        _ => false,
    };
    if !foldable {
        return Ok(expr);
    }

    match evaluator.eval(&expr) {
        Ok(value) => {
            debug!("folded literal {} at {}", value, expr.span);
            frame.lift_target().lift_constant(&value);
            Ok(Expr::new(
                ExprKind::Literal { value },
                expr.span,
                expr.position,
                expr.needs_box,
                expr.frame,
            ))
        }
        Err(reason) => {
            debug!("keeping runtime literal at {}: {}", expr.span, reason);
            Ok(expr)
        }
    }
}

/// Convert a quoted form into the runtime value it denotes
pub(crate) fn form_to_value(form: &Form) -> Value {
    match &form.kind {
        FormKind::Nil => Value::Nil,
        FormKind::Bool(b) => Value::Bool(*b),
        FormKind::Int(n) => Value::Int(*n),
        FormKind::Float(x) => Value::Float(*x),
        FormKind::String(s) => Value::String(s.clone()),
        FormKind::Keyword(k) => Value::Keyword(k.clone()),
        FormKind::Symbol(sym) => Value::Symbol(sym.clone()),
        FormKind::List(items) => Value::list(items.iter().map(form_to_value).collect()),
        FormKind::Vector(items) => Value::vector(items.iter().map(form_to_value).collect()),
        FormKind::Map(pairs) => Value::map(
            pairs
                .iter()
                .map(|(k, v)| (form_to_value(k), form_to_value(v)))
                .collect(),
        ),
        FormKind::Set(items) => Value::set(items.iter().map(form_to_value).collect()),
    }
}

/// An evaluator sufficient for self-contained literal trees.
///
/// This is what the analyzer needs for folding when the full tree-walking
/// evaluator is not linked in; it expands no macros.
pub struct ConstEvaluator;

impl Evaluator for ConstEvaluator {
    fn eval(&mut self, expr: &Expr) -> std::result::Result<Value, String> {
        match &expr.kind {
            ExprKind::Literal { value } => Ok(value.clone()),
            ExprKind::ListLit { items } => Ok(Value::list(self.eval_all(items)?)),
            ExprKind::VectorLit { items } => Ok(Value::vector(self.eval_all(items)?)),
            ExprKind::SetLit { items } => Ok(Value::set(self.eval_all(items)?)),
            ExprKind::MapLit { pairs } => {
                let mut evaluated = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    evaluated.push((self.eval(k)?, self.eval(v)?));
                }
                Ok(Value::map(evaluated))
            }
            other => Err(format!(
                "not a compile-time constant: {:?}",
                std::mem::discriminant(other)
            )),
        }
    }

    fn macroexpand(
        &mut self,
        var: &crate::vars::Var,
        _form: &Form,
    ) -> std::result::Result<Form, String> {
        Err(format!("no macro evaluator linked for {}", var))
    }
}

impl ConstEvaluator {
    fn eval_all(&mut self, items: &[Expr]) -> std::result::Result<Vec<Value>, String> {
        items.iter().map(|e| self.eval(e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Span;

    fn span() -> Span {
        Span::synthetic()
    }

    #[test]
    fn test_form_to_value_nested() {
        let form = Form::list(
            vec![
                Form::symbol("a", span()),
                Form::vector(vec![Form::int(1, span())], span()),
            ],
            span(),
        );
        assert_eq!(
            form_to_value(&form),
            Value::list(vec![
                Value::symbol("a"),
                Value::vector(vec![Value::Int(1)])
            ])
        );
    }

    #[test]
    fn test_const_evaluator_rejects_non_constants() {
        use crate::analysis::expr::Position;
        use crate::analysis::frame::Frame as F;
        let frame = F::root();
        let expr = Expr::new(
            ExprKind::Do { values: vec![] },
            span(),
            Position::Value,
            true,
            frame,
        );
        assert!(ConstEvaluator.eval(&expr).is_err());
    }
}
