//! Core form analysis: the dispatcher and the structural forms

use super::*;
use crate::analysis::fold;
use crate::form::FormKind;

impl<'a> Analyzer<'a> {
    /// Analyze one form in the given frame and context
    pub(crate) fn analyze_form(
        &mut self,
        form: &Form,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        let span = form.span.clone();

        match &form.kind {
            FormKind::Nil => Ok(self.literal(Value::Nil, span, frame, ctx)),
            FormKind::Bool(b) => Ok(self.literal(Value::Bool(*b), span, frame, ctx)),
            FormKind::Int(n) => Ok(self.literal(Value::Int(*n), span, frame, ctx)),
            FormKind::Float(x) => Ok(self.literal(Value::Float(*x), span, frame, ctx)),
            FormKind::String(s) => Ok(self.literal(Value::String(s.clone()), span, frame, ctx)),
            FormKind::Keyword(k) => Ok(self.literal(Value::Keyword(k.clone()), span, frame, ctx)),

            FormKind::Symbol(sym) => self.analyze_symbol(sym, &span, frame, ctx),

            FormKind::List(items) => self.analyze_list(form, items, &span, frame, ctx),
            FormKind::Vector(items) => self.analyze_vector(items, &span, frame, ctx),
            FormKind::Map(pairs) => self.analyze_map(pairs, &span, frame, ctx),
            FormKind::Set(items) => self.analyze_set(items, &span, frame, ctx),
        }
    }

    /// A list is the empty-list literal, a special form, or a call
    fn analyze_list(
        &mut self,
        form: &Form,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        if items.is_empty() {
            return Ok(self.literal(Value::empty_list(), span.clone(), frame, ctx));
        }

        // Special forms dispatch on an unqualified leading symbol
        if let Some(name) = items[0].as_unqualified() {
            match name.as_ref() {
                "def" => return self.analyze_def(items, span, frame, ctx),
                "fn*" => return self.analyze_fn(items, span, frame, ctx),
                "recur" => return self.analyze_recur(items, span, frame, ctx),
                "do" => return self.analyze_do(items, span, frame, ctx),
                "let*" => return self.analyze_let(items, span, frame, ctx),
                "loop*" => return self.analyze_loop(items, span, frame, ctx),
                "if" => return self.analyze_if(items, span, frame, ctx),
                "quote" => return self.analyze_quote(items, span, frame, ctx),
                "var" => return self.analyze_var(items, span, frame, ctx),
                "throw" => return self.analyze_throw(items, span, frame, ctx),
                "try" => return self.analyze_try(items, span, frame, ctx),
                "case*" => return self.analyze_case(items, span, frame, ctx),
                _ => {}
            }
        }

        self.analyze_call(form, items, span, frame, ctx)
    }

    pub(crate) fn analyze_if(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        if items.len() < 3 || items.len() > 4 {
            return Err(AnalysisError::invalid_if(
                "if expects a condition, a then-branch, and an optional else-branch",
                span,
            ));
        }

        // The condition is consumed as a native truth test; the branches
        // cannot be statically unified, so both are forced boxed.
        let cond = self.analyze_form(
            &items[1],
            frame,
            ctx.with_position(Position::Value).with_needs_box(false),
        )?;
        let branch_ctx = ctx.with_needs_box(true);
        let then = self.analyze_form(&items[2], frame, branch_ctx)?;
        let else_ = match items.get(3) {
            Some(f) => Some(Box::new(self.analyze_form(f, frame, branch_ctx)?)),
            None => None,
        };

        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then: Box::new(then),
                else_,
            },
            span.clone(),
            ctx.position,
            ctx.needs_box,
            frame.clone(),
        ))
    }

    pub(crate) fn analyze_do(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        let values = self.analyze_body(&items[1..], frame, ctx, span)?;
        Ok(Expr::new(
            ExprKind::Do { values },
            span.clone(),
            ctx.position,
            ctx.needs_box,
            frame.clone(),
        ))
    }

    pub(crate) fn analyze_let(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        let binding_items = Self::let_bindings(items, span)?;
        self.analyze_let_like(binding_items, &items[2..], span, frame, ctx, FrameKind::Let)
    }

    /// `loop*` is desugared into a `let*` whose body immediately invokes an
    /// anonymous `fn*` over the loop's binding symbols:
    ///
    /// ```text
    /// (loop* [i 0] body...)  =>  (let* [i 0] ((fn* [i] body...) i))
    /// ```
    ///
    /// This reuses let*'s sequential-binding semantics and fn*'s recursion
    /// machinery for the loop's `recur`.
    pub(crate) fn analyze_loop(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        let binding_items = Self::let_bindings(items, span)?;

        let mut params = Vec::with_capacity(binding_items.len() / 2);
        for pair in binding_items.chunks(2) {
            match pair[0].as_unqualified() {
                Some(name) => params.push(Form::symbol(name.clone(), pair[0].span.clone())),
                None => {
                    return Err(AnalysisError::invalid_let(
                        format!("{} is not a legal loop* binding name", pair[0].kind_label()),
                        &pair[0].span,
                    ))
                }
            }
        }

        let mut fn_items = Vec::with_capacity(items.len());
        fn_items.push(Form::symbol("fn*", span.clone()));
        fn_items.push(Form::vector(params.clone(), items[1].span.clone()));
        fn_items.extend(items[2..].iter().cloned());
        let fn_form = Form::list(fn_items, span.clone());

        let mut call_items = Vec::with_capacity(params.len() + 1);
        call_items.push(fn_form);
        call_items.extend(params);
        let call_form = Form::list(call_items, span.clone());

        self.analyze_let_like(
            binding_items,
            &[call_form],
            span,
            frame,
            ctx,
            FrameKind::Loop,
        )
    }

    /// Validate the bindings vector of a `let*`/`loop*` and return its items
    fn let_bindings<'f>(items: &'f [Form], span: &Span) -> Result<&'f [Form]> {
        let head = items[0]
            .as_unqualified()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "let*".to_string());
        if items.len() < 2 {
            return Err(AnalysisError::invalid_let(
                format!("{} requires a bindings vector", head),
                span,
            ));
        }
        let bindings_form = &items[1];
        match bindings_form.as_vector() {
            Some(pairs) if pairs.len() % 2 == 0 => Ok(pairs),
            Some(_) => Err(AnalysisError::invalid_let(
                format!("odd number of forms in {} bindings", head),
                &bindings_form.span,
            )),
            None => Err(AnalysisError::invalid_let(
                format!(
                    "{} bindings must be a vector, got {}",
                    head,
                    bindings_form.kind_label()
                ),
                &bindings_form.span,
            )),
        }
    }

    fn analyze_let_like(
        &mut self,
        binding_items: &[Form],
        body_forms: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
        kind: FrameKind,
    ) -> Result<Expr> {
        let let_frame = frame.child(kind);

        let mut bindings = Vec::with_capacity(binding_items.len() / 2);
        for pair in binding_items.chunks(2) {
            let name = pair[0].as_unqualified().ok_or_else(|| {
                AnalysisError::invalid_let(
                    format!("{} is not a legal binding name", pair[0].kind_label()),
                    &pair[0].span,
                )
            })?;

            // Sequential semantics: the initializer sees earlier bindings
            // but not its own.
            let init = self.analyze_form(
                &pair[1],
                &let_frame,
                ctx.with_position(Position::Value).with_needs_box(false),
            )?;
            let init = std::rc::Rc::new(init);

            let sym = self.symbols.intern(name);
            let binding = let_frame.define(sym, name.clone());
            binding.set_initializer(&init);
            bindings.push((binding, init));
        }

        let body = self.analyze_body(body_forms, &let_frame, ctx, span)?;

        Ok(Expr::new(
            ExprKind::Let { bindings, body },
            span.clone(),
            ctx.position,
            ctx.needs_box,
            let_frame,
        ))
    }

    /// Vector literal: elements are analyzed boxed; if every element is
    /// already a resolved constant the whole literal folds to one.
    pub(crate) fn analyze_vector(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        let elements = self.analyze_elements(items, frame, ctx)?;
        let expr = Expr::new(
            ExprKind::VectorLit { items: elements },
            span.clone(),
            ctx.position,
            ctx.needs_box,
            frame.clone(),
        );
        fold::fold_collection(self.evaluator, expr, frame)
    }

    pub(crate) fn analyze_set(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        let elements = self.analyze_elements(items, frame, ctx)?;
        let expr = Expr::new(
            ExprKind::SetLit { items: elements },
            span.clone(),
            ctx.position,
            ctx.needs_box,
            frame.clone(),
        );
        fold::fold_collection(self.evaluator, expr, frame)
    }

    /// Map literals are analyzed element-wise but never folded
    pub(crate) fn analyze_map(
        &mut self,
        pairs: &[(Form, Form)],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        let element_ctx = AnalysisContext::value(true).with_no_recur_from(ctx);
        let mut analyzed = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            let key = self.analyze_form(k, frame, element_ctx)?;
            let value = self.analyze_form(v, frame, element_ctx)?;
            analyzed.push((key, value));
        }
        Ok(Expr::new(
            ExprKind::MapLit { pairs: analyzed },
            span.clone(),
            ctx.position,
            ctx.needs_box,
            frame.clone(),
        ))
    }

    fn analyze_elements(
        &mut self,
        items: &[Form],
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Vec<Expr>> {
        let element_ctx = AnalysisContext::value(true).with_no_recur_from(ctx);
        items
            .iter()
            .map(|item| self.analyze_form(item, frame, element_ctx))
            .collect()
    }
}

impl AnalysisContext {
    /// Carry the caller's no-recur flag into a fresh value context
    fn with_no_recur_from(self, outer: AnalysisContext) -> Self {
        AnalysisContext {
            no_recur: outer.no_recur,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fold::ConstEvaluator;
    use crate::form::Form;
    use crate::symbol::SymbolTable;
    use crate::vars::Namespaces;

    fn span() -> Span {
        Span::synthetic()
    }

    fn analyze_one(form: Form) -> Result<AnalysisResult> {
        let mut symbols = SymbolTable::new();
        let mut namespaces = Namespaces::default();
        let mut evaluator = ConstEvaluator;
        let mut analyzer = Analyzer::new(&mut symbols, &mut namespaces, &mut evaluator);
        analyzer.analyze(std::slice::from_ref(&form))
    }

    fn unit_body(result: &AnalysisResult) -> &[Expr] {
        match &result.expr.kind {
            ExprKind::Fn { arities, .. } => &arities[0].body,
            _ => panic!("entry point must produce a fn wrapper"),
        }
    }

    #[test]
    fn test_literal_is_lifted() {
        let result = analyze_one(Form::int(42, span())).unwrap();
        let body = unit_body(&result);
        assert!(matches!(
            body[0].kind,
            ExprKind::Literal {
                value: Value::Int(42)
            }
        ));
        // Lifted onto the wrapper fn frame, not the root
        let fn_frame = match &result.expr.kind {
            ExprKind::Fn { arities, .. } => &arities[0].frame,
            _ => unreachable!(),
        };
        assert_eq!(fn_frame.lifted_constants().len(), 1);
    }

    #[test]
    fn test_empty_list_is_a_literal() {
        let result = analyze_one(Form::list(vec![], span())).unwrap();
        let body = unit_body(&result);
        match &body[0].kind {
            ExprKind::Literal { value } => assert_eq!(value, &Value::empty_list()),
            other => panic!("expected literal, got {:?}", other),
        }
    }

    #[test]
    fn test_if_shape_validation() {
        let bad = Form::list(vec![Form::symbol("if", span()), Form::bool_(true, span())], span());
        let err = analyze_one(bad).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidIf { .. }));
    }

    #[test]
    fn test_if_branches_are_boxed_condition_is_not() {
        let form = Form::list(
            vec![
                Form::symbol("if", span()),
                Form::bool_(true, span()),
                Form::int(1, span()),
                Form::int(2, span()),
            ],
            span(),
        );
        let result = analyze_one(form).unwrap();
        match &unit_body(&result)[0].kind {
            ExprKind::If { cond, then, else_ } => {
                assert!(!cond.needs_box);
                assert!(then.needs_box);
                assert!(else_.as_ref().unwrap().needs_box);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_do_positions() {
        let form = Form::list(
            vec![
                Form::symbol("do", span()),
                Form::int(1, span()),
                Form::int(2, span()),
            ],
            span(),
        );
        let result = analyze_one(form).unwrap();
        match &unit_body(&result)[0].kind {
            ExprKind::Do { values } => {
                assert_eq!(values[0].position, Position::Statement);
                assert!(!values[0].needs_box);
                assert_eq!(values[1].position, Position::Tail);
                assert!(values[1].needs_box);
            }
            other => panic!("expected do, got {:?}", other),
        }
    }

    #[test]
    fn test_let_sequential_binding_resolution() {
        // (let* [a 1 b a] b): b's initializer is a local reference to a,
        // and nothing is captured.
        let form = Form::list(
            vec![
                Form::symbol("let*", span()),
                Form::vector(
                    vec![
                        Form::symbol("a", span()),
                        Form::int(1, span()),
                        Form::symbol("b", span()),
                        Form::symbol("a", span()),
                    ],
                    span(),
                ),
                Form::symbol("b", span()),
            ],
            span(),
        );
        let result = analyze_one(form).unwrap();
        match &unit_body(&result)[0].kind {
            ExprKind::Let { bindings, body } => {
                assert_eq!(bindings.len(), 2);
                let (a, _) = &bindings[0];
                let (_, b_init) = &bindings[1];
                match &b_init.kind {
                    ExprKind::Local { binding } => assert!(binding.is(a)),
                    other => panic!("expected local reference, got {:?}", other),
                }
                match &body[0].kind {
                    ExprKind::Local { binding } => assert!(binding.is(&bindings[1].0)),
                    other => panic!("expected local reference, got {:?}", other),
                }
                assert!(body[0].frame.captures().is_empty());
            }
            other => panic!("expected let, got {:?}", other),
        }
    }

    #[test]
    fn test_let_rejects_odd_bindings() {
        let form = Form::list(
            vec![
                Form::symbol("let*", span()),
                Form::vector(vec![Form::symbol("a", span())], span()),
                Form::symbol("a", span()),
            ],
            span(),
        );
        let err = analyze_one(form).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidLet { .. }));
    }

    #[test]
    fn test_let_rejects_non_symbol_binding_name() {
        let form = Form::list(
            vec![
                Form::symbol("let*", span()),
                Form::vector(vec![Form::int(1, span()), Form::int(2, span())], span()),
                Form::nil(span()),
            ],
            span(),
        );
        let err = analyze_one(form).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidLet { .. }));
    }

    #[test]
    fn test_loop_desugars_to_let_over_fn_call() {
        // (loop* [i 0] i) => (let* [i 0] ((fn* [i] i) i))
        let form = Form::list(
            vec![
                Form::symbol("loop*", span()),
                Form::vector(vec![Form::symbol("i", span()), Form::int(0, span())], span()),
                Form::symbol("i", span()),
            ],
            span(),
        );
        let result = analyze_one(form).unwrap();
        match &unit_body(&result)[0].kind {
            ExprKind::Let { bindings, body } => {
                assert_eq!(bindings.len(), 1);
                assert_eq!(body.len(), 1);
                match &body[0].kind {
                    ExprKind::Call { callee, args } => {
                        assert!(matches!(callee.kind, ExprKind::Fn { .. }));
                        assert_eq!(args.len(), 1);
                        assert!(matches!(args[0].kind, ExprKind::Local { .. }));
                    }
                    other => panic!("expected call of fn, got {:?}", other),
                }
            }
            other => panic!("expected let, got {:?}", other),
        }
        // The desugared let frame is a loop frame
        match &unit_body(&result)[0].kind {
            ExprKind::Let { .. } => {
                assert_eq!(unit_body(&result)[0].frame.kind(), FrameKind::Loop)
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_vector_of_literals_folds() {
        let form = Form::vector(vec![Form::int(1, span()), Form::int(2, span())], span());
        let result = analyze_one(form).unwrap();
        match &unit_body(&result)[0].kind {
            ExprKind::Literal { value } => {
                assert_eq!(value, &Value::vector(vec![Value::Int(1), Value::Int(2)]));
            }
            other => panic!("expected folded literal, got {:?}", other),
        }
    }
}
