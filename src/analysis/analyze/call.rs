//! Call analysis: symbol heads, macro expansion, argument packing

use super::*;
use crate::vars::ArityMeta;
use log::debug;

impl<'a> Analyzer<'a> {
    /// Analyze a non-special list form as a call.
    ///
    /// The head resolves in order: local binding (a call through a closed
    /// over or let-bound function value, or a named-fn self reference),
    /// then var. A macro var expands and analysis restarts from the top on
    /// the expansion; everything else is an ordinary call.
    pub(crate) fn analyze_call(
        &mut self,
        form: &Form,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        let head = &items[0];

        if let Some(sym) = head.as_symbol() {
            if !sym.is_qualified() {
                let id = self.symbols.intern(&sym.name);
                if let Some((binding, _crossed)) = resolve_local(id, frame) {
                    // The callee is consumed as a boxed function object
                    binding.record_usage(true);

                    if self.self_refs.iter().any(|b| b.is(&binding)) {
                        let args = self.analyze_args(&items[1..], frame, ctx, None)?;
                        return Ok(Expr::new(
                            ExprKind::NamedRecursion { binding, args },
                            span.clone(),
                            ctx.position,
                            ctx.needs_box,
                            frame.clone(),
                        ));
                    }

                    let callee = Expr::new(
                        ExprKind::Local { binding },
                        head.span.clone(),
                        Position::Value,
                        true,
                        frame.clone(),
                    );
                    return self.build_call(callee, &items[1..], None, span, frame, ctx);
                }
            }

            return match self.namespaces.find_var(sym) {
                Some(var) if var.is_macro() => {
                    debug!("expanding macro {}", var);
                    let expanded = self
                        .evaluator
                        .macroexpand(&var, form)
                        .map_err(|e| AnalysisError::macro_expansion(e, span))?;

                    self.macro_depth += 1;
                    let result = if self.macro_depth > MAX_MACRO_DEPTH {
                        Err(AnalysisError::macro_expansion(
                            format!("expansion of {} nested deeper than {}", var, MAX_MACRO_DEPTH),
                            span,
                        ))
                    } else {
                        // Expansion restarts analysis from the top so nested
                        // macros are handled uniformly.
                        self.analyze_form(&expanded, frame, ctx)
                    };
                    self.macro_depth -= 1;
                    result
                }
                Some(var) => {
                    frame.lift_target().lift_var(&var);
                    let meta = var.arity_meta();
                    let callee = Expr::new(
                        ExprKind::VarDeref { var },
                        head.span.clone(),
                        Position::Value,
                        true,
                        frame.clone(),
                    );
                    self.build_call(callee, &items[1..], meta, span, frame, ctx)
                }
                None => Err(AnalysisError::unresolved_symbol(sym.to_string(), span)),
            };
        }

        // Non-symbol head: an immediately-invoked fn*, a nested call, ...
        let mut callee_ctx = AnalysisContext::value(true);
        callee_ctx.no_recur = ctx.no_recur;
        let callee = self.analyze_form(head, frame, callee_ctx)?;
        self.build_call(callee, &items[1..], None, span, frame, ctx)
    }

    fn build_call(
        &mut self,
        callee: Expr,
        arg_forms: &[Form],
        meta: Option<ArityMeta>,
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        let args = self.analyze_args(arg_forms, frame, ctx, meta)?;
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            span.clone(),
            ctx.position,
            ctx.needs_box,
            frame.clone(),
        ))
    }

    /// Analyze call arguments. Boxing defaults to boxed unless the callee's
    /// arity metadata declares unboxed arguments. Arguments beyond
    /// [`MAX_PARAMS`] are packed into one trailing list expression,
    /// mirroring the calling convention's variadic-overflow handling.
    fn analyze_args(
        &mut self,
        arg_forms: &[Form],
        frame: &Frame,
        ctx: AnalysisContext,
        meta: Option<ArityMeta>,
    ) -> Result<Vec<Expr>> {
        let unboxed_args = meta.map_or(false, |m| m.unboxed_args);
        let mut arg_ctx = AnalysisContext::value(!unboxed_args);
        arg_ctx.no_recur = ctx.no_recur;

        let direct = arg_forms.len().min(MAX_PARAMS);
        let mut args = Vec::with_capacity(direct + 1);
        for arg in &arg_forms[..direct] {
            args.push(self.analyze_form(arg, frame, arg_ctx)?);
        }

        if arg_forms.len() > MAX_PARAMS {
            let mut packed_ctx = AnalysisContext::value(true);
            packed_ctx.no_recur = ctx.no_recur;
            let overflow = arg_forms[MAX_PARAMS..]
                .iter()
                .map(|f| self.analyze_form(f, frame, packed_ctx))
                .collect::<Result<Vec<_>>>()?;
            let overflow_span = arg_forms[MAX_PARAMS]
                .span
                .merge(&arg_forms[arg_forms.len() - 1].span);
            args.push(Expr::new(
                ExprKind::ListLit { items: overflow },
                overflow_span,
                Position::Value,
                true,
                frame.clone(),
            ));
        }

        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fold::ConstEvaluator;
    use crate::form::Form;
    use crate::symbol::SymbolTable;
    use crate::value::Value;
    use crate::vars::{Evaluator, Namespaces, Var};
    use std::rc::Rc;

    fn span() -> Span {
        Span::synthetic()
    }

    fn sym(name: &str) -> Form {
        Form::symbol(name, span())
    }

    fn list(items: Vec<Form>) -> Form {
        Form::list(items, span())
    }

    fn analyze_with(
        namespaces: &mut Namespaces,
        evaluator: &mut dyn Evaluator,
        form: Form,
    ) -> Result<AnalysisResult> {
        let mut symbols = SymbolTable::new();
        let mut analyzer = Analyzer::new(&mut symbols, namespaces, evaluator);
        analyzer.analyze(std::slice::from_ref(&form))
    }

    fn first_expr(result: &AnalysisResult) -> &Expr {
        match &result.expr.kind {
            ExprKind::Fn { arities, .. } => &arities[0].body[0],
            _ => panic!("entry point must produce a fn wrapper"),
        }
    }

    fn intern(namespaces: &mut Namespaces, name: &str) -> Var {
        namespaces.intern_var(Rc::from("user"), Rc::from(name))
    }

    #[test]
    fn test_call_to_var() {
        let mut namespaces = Namespaces::default();
        intern(&mut namespaces, "inc");
        let mut evaluator = ConstEvaluator;
        let form = list(vec![sym("inc"), Form::int(1, span())]);
        let result = analyze_with(&mut namespaces, &mut evaluator, form).unwrap();
        match &first_expr(&result).kind {
            ExprKind::Call { callee, args } => {
                assert!(matches!(callee.kind, ExprKind::VarDeref { .. }));
                assert_eq!(args.len(), 1);
                assert!(args[0].needs_box);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_head_is_an_error() {
        let mut namespaces = Namespaces::default();
        let mut evaluator = ConstEvaluator;
        let form = list(vec![sym("nope")]);
        let err = analyze_with(&mut namespaces, &mut evaluator, form).unwrap_err();
        assert!(matches!(err, AnalysisError::UnresolvedSymbol { .. }));
    }

    #[test]
    fn test_unboxed_arg_metadata_relaxes_boxing() {
        let mut namespaces = Namespaces::default();
        let var = intern(&mut namespaces, "prim-add");
        var.set_arity_meta(ArityMeta {
            unboxed_args: true,
            unboxed_return: true,
        });
        let mut evaluator = ConstEvaluator;
        let form = list(vec![sym("prim-add"), Form::int(1, span())]);
        let result = analyze_with(&mut namespaces, &mut evaluator, form).unwrap();
        match &first_expr(&result).kind {
            ExprKind::Call { args, .. } => assert!(!args[0].needs_box),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_overflow_args_pack_into_trailing_list() {
        let mut namespaces = Namespaces::default();
        intern(&mut namespaces, "variadic");
        let mut evaluator = ConstEvaluator;
        let arg_count = MAX_PARAMS + 3;
        let mut items = vec![sym("variadic")];
        items.extend((0..arg_count).map(|i| Form::int(i as i64, span())));
        let result = analyze_with(&mut namespaces, &mut evaluator, list(items)).unwrap();
        match &first_expr(&result).kind {
            ExprKind::Call { args, .. } => {
                assert_eq!(args.len(), MAX_PARAMS + 1);
                match &args[MAX_PARAMS].kind {
                    ExprKind::ListLit { items } => assert_eq!(items.len(), 3),
                    other => panic!("expected packed list, got {:?}", other),
                }
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_macro_expansion_restarts_analysis() {
        struct ConstMacro;
        impl Evaluator for ConstMacro {
            fn eval(&mut self, _expr: &Expr) -> std::result::Result<Value, String> {
                Err("not a constant".into())
            }
            fn macroexpand(
                &mut self,
                _var: &Var,
                form: &Form,
            ) -> std::result::Result<Form, String> {
                // (m x) => 42, whatever x is
                Ok(Form::int(42, form.span.clone()))
            }
        }

        let mut namespaces = Namespaces::default();
        let var = intern(&mut namespaces, "m");
        var.set_macro();
        let mut evaluator = ConstMacro;
        let form = list(vec![sym("m"), sym("undefined-inside")]);
        let result = analyze_with(&mut namespaces, &mut evaluator, form).unwrap();
        assert!(matches!(
            first_expr(&result).kind,
            ExprKind::Literal {
                value: Value::Int(42)
            }
        ));
    }

    #[test]
    fn test_macro_as_value_is_an_error() {
        let mut namespaces = Namespaces::default();
        let var = intern(&mut namespaces, "m");
        var.set_macro();
        let mut evaluator = ConstEvaluator;
        let err = analyze_with(&mut namespaces, &mut evaluator, sym("m")).unwrap_err();
        assert!(matches!(err, AnalysisError::UnresolvedVar { .. }));
    }

    #[test]
    fn test_runaway_macro_expansion_aborts() {
        struct SelfExpanding;
        impl Evaluator for SelfExpanding {
            fn eval(&mut self, _expr: &Expr) -> std::result::Result<Value, String> {
                Err("not a constant".into())
            }
            fn macroexpand(
                &mut self,
                _var: &Var,
                form: &Form,
            ) -> std::result::Result<Form, String> {
                Ok(form.clone())
            }
        }

        let mut namespaces = Namespaces::default();
        let var = intern(&mut namespaces, "m");
        var.set_macro();
        let mut evaluator = SelfExpanding;
        let form = list(vec![sym("m")]);
        let err = analyze_with(&mut namespaces, &mut evaluator, form).unwrap_err();
        assert!(matches!(err, AnalysisError::MacroExpansion { .. }));
    }

    #[test]
    fn test_immediately_invoked_fn() {
        let mut namespaces = Namespaces::default();
        let mut evaluator = ConstEvaluator;
        // ((fn* [x] x) 1)
        let form = list(vec![
            list(vec![
                sym("fn*"),
                Form::vector(vec![sym("x")], span()),
                sym("x"),
            ]),
            Form::int(1, span()),
        ]);
        let result = analyze_with(&mut namespaces, &mut evaluator, form).unwrap();
        match &first_expr(&result).kind {
            ExprKind::Call { callee, args } => {
                assert!(matches!(callee.kind, ExprKind::Fn { .. }));
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }
}
