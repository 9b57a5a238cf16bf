//! Function analysis: `fn*` arity assembly and `recur`

use super::*;
use smallvec::SmallVec;
use std::rc::Rc;

/// A parsed (not yet analyzed) parameter list
struct ParsedParams {
    names: Vec<Rc<str>>,
    variadic: bool,
}

impl<'a> Analyzer<'a> {
    /// `(fn* name? [params] body...)` or `(fn* name? ([params] body...)+)`
    pub(crate) fn analyze_fn(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        let mut idx = 1;
        let name: Option<Rc<str>> = match items.get(1) {
            Some(form) if form.as_symbol().is_some() => match form.as_unqualified() {
                Some(n) => {
                    idx = 2;
                    Some(n.clone())
                }
                None => {
                    return Err(AnalysisError::invalid_fn_parameters(
                        "fn* name must be an unqualified symbol",
                        &form.span,
                    ))
                }
            },
            _ => None,
        };

        if items.len() <= idx {
            return Err(AnalysisError::invalid_fn_parameters(
                "fn* requires a parameter vector",
                span,
            ));
        }

        let mut arities = Vec::new();
        if items[idx].as_vector().is_some() {
            // Single arity: parameter vector followed by body forms
            arities.push(self.analyze_arity(&items[idx..], &name, span, frame)?);
        } else {
            // Multiple arities: each remaining form is an arity list
            for arity_form in &items[idx..] {
                let arity_items = arity_form.as_list().ok_or_else(|| {
                    AnalysisError::invalid_fn_parameters(
                        format!("expected an arity list, got {}", arity_form.kind_label()),
                        &arity_form.span,
                    )
                })?;
                if arity_items.is_empty() {
                    return Err(AnalysisError::invalid_fn_parameters(
                        "arity list cannot be empty",
                        &arity_form.span,
                    ));
                }
                arities.push(self.analyze_arity(arity_items, &name, &arity_form.span, frame)?);
            }
        }

        Self::validate_arity_set(&arities, span)?;

        Ok(Expr::new(
            ExprKind::Fn { name, arities },
            span.clone(),
            ctx.position,
            // A function value is a uniform runtime handle
            true,
            frame.clone(),
        ))
    }

    /// One arity: `[params]` then body forms. The arity gets its own fn
    /// frame and recursion context; a named fn also gets a self-reference
    /// binding scoped to that frame.
    fn analyze_arity(
        &mut self,
        items: &[Form],
        fn_name: &Option<Rc<str>>,
        span: &Span,
        frame: &Frame,
    ) -> Result<FnArity> {
        let params_form = &items[0];
        let param_items = params_form.as_vector().ok_or_else(|| {
            AnalysisError::invalid_fn_parameters(
                format!(
                    "parameters must be a vector, got {}",
                    params_form.kind_label()
                ),
                &params_form.span,
            )
        })?;

        let parsed = Self::parse_params(param_items, &params_form.span)?;
        let fixed_count = parsed.names.len() - usize::from(parsed.variadic);

        let fn_frame = frame.child(FrameKind::Fn);
        let recursion =
            RecursionContext::new(fn_name.clone(), parsed.variadic, fixed_count);
        fn_frame.set_recursion(recursion.clone());

        // The self-reference binding goes in before the parameters so a
        // same-named parameter shadows it.
        let self_binding = fn_name.as_ref().map(|n| {
            let sym = self.symbols.intern(n);
            let binding = fn_frame.define(sym, n.clone());
            binding.mark_boxed();
            binding
        });

        // Duplicate parameter names shadow in the frame but keep their own
        // slots; native names are generated unique per binding.
        let mut params: SmallVec<[Binding; 4]> = SmallVec::with_capacity(parsed.names.len());
        for name in &parsed.names {
            let sym = self.symbols.intern(name);
            params.push(fn_frame.define(sym, name.clone()));
        }
        recursion.set_params(params.to_vec());

        if let Some(binding) = &self_binding {
            self.self_refs.push(binding.clone());
        }
        // A fresh fn body resets the no-recur flag: recursion inside a
        // function defined within a try does not cross the try.
        let body_ctx = AnalysisContext {
            position: Position::Tail,
            needs_box: true,
            no_recur: false,
        };
        let body = self.analyze_body(&items[1..], &fn_frame, body_ctx, span);
        if self_binding.is_some() {
            self.self_refs.pop();
        }
        let mut body = body?;

        // recur lowers to mutate-and-loop, which needs a uniformly typed
        // slot for the tail value.
        if recursion.is_tail_recursive() {
            if let Some(tail) = body.last_mut() {
                force_boxed(tail);
            }
        }

        Ok(FnArity {
            params,
            variadic: parsed.variadic,
            body,
            frame: fn_frame,
            recursion,
        })
    }

    fn parse_params(items: &[Form], span: &Span) -> Result<ParsedParams> {
        let mut names: Vec<Rc<str>> = Vec::with_capacity(items.len());
        let mut variadic = false;

        let mut i = 0;
        while i < items.len() {
            let item = &items[i];
            let name = item.as_unqualified().ok_or_else(|| {
                AnalysisError::invalid_fn_parameters(
                    format!(
                        "parameter must be an unqualified symbol, got {}",
                        item.kind_label()
                    ),
                    &item.span,
                )
            })?;

            if name.as_ref() == "&" {
                // Exactly one rest parameter, and it must be last
                if i + 2 != items.len() {
                    return Err(AnalysisError::invalid_fn_parameters(
                        "& must be followed by exactly one rest parameter",
                        &item.span,
                    ));
                }
                let rest = items[i + 1].as_unqualified().ok_or_else(|| {
                    AnalysisError::invalid_fn_parameters(
                        "rest parameter must be an unqualified symbol",
                        &items[i + 1].span,
                    )
                })?;
                names.push(rest.clone());
                variadic = true;
                break;
            }

            names.push(name.clone());
            i += 1;
        }

        let fixed = names.len() - usize::from(variadic);
        if fixed > MAX_PARAMS {
            return Err(AnalysisError::invalid_fn_parameters(
                format!(
                    "cannot have more than {} fixed parameters; pack the rest into a trailing list",
                    MAX_PARAMS
                ),
                span,
            ));
        }

        Ok(ParsedParams { names, variadic })
    }

    /// Validate the whole arity set: at most one variadic, the variadic at
    /// least as wide as every fixed arity, and no duplicate signatures.
    fn validate_arity_set(arities: &[FnArity], span: &Span) -> Result<()> {
        let variadic_count = arities.iter().filter(|a| a.variadic).count();
        if variadic_count > 1 {
            return Err(AnalysisError::invalid_fn_arity(
                "fn* can have at most one variadic arity",
                span,
            ));
        }

        if let Some(variadic) = arities.iter().find(|a| a.variadic) {
            let variadic_width = variadic.recursion.fixed_param_count();
            for arity in arities.iter().filter(|a| !a.variadic) {
                if arity.recursion.fixed_param_count() > variadic_width {
                    return Err(AnalysisError::invalid_fn_arity(
                        "a variadic arity must take at least as many fixed parameters \
                         as every fixed arity",
                        span,
                    ));
                }
            }
        }

        for (i, a) in arities.iter().enumerate() {
            for b in &arities[i + 1..] {
                if a.recursion.fixed_param_count() == b.recursion.fixed_param_count()
                    && a.variadic == b.variadic
                {
                    return Err(AnalysisError::invalid_fn_arity(
                        format!(
                            "duplicate arity taking {} parameters",
                            a.recursion.fixed_param_count()
                        ),
                        span,
                    ));
                }
            }
        }

        Ok(())
    }

    /// `(recur args...)`: legal only with an active recursion context, in
    /// tail position, outside try, with exactly the context's fixed
    /// parameter count.
    pub(crate) fn analyze_recur(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        if ctx.no_recur {
            return Err(AnalysisError::invalid_recur_from_try(
                "recur cannot cross a try boundary",
                span,
            ));
        }

        let context = frame.nearest_recursion().ok_or_else(|| {
            AnalysisError::invalid_recur_position(
                "recur requires an enclosing fn* or loop*",
                span,
            )
        })?;

        if ctx.position != Position::Tail {
            return Err(AnalysisError::invalid_recur_position(
                "recur must be in tail position",
                span,
            ));
        }

        let argc = items.len() - 1;
        if argc != context.fixed_param_count() {
            return Err(AnalysisError::invalid_recur_args(
                format!(
                    "recur expects {} arguments, got {}",
                    context.fixed_param_count(),
                    argc
                ),
                span,
            ));
        }

        let arg_ctx = AnalysisContext::value(true);
        let args = items[1..]
            .iter()
            .map(|f| self.analyze_form(f, frame, arg_ctx))
            .collect::<Result<Vec<_>>>()?;

        context.mark_tail_recursive();

        Ok(Expr::new(
            ExprKind::Recur { context, args },
            span.clone(),
            Position::Tail,
            true,
            frame.clone(),
        ))
    }
}

/// Re-force an arity's tail expression boxed after the arity was found
/// tail-recursive. Descends only into tail sub-positions; everything else
/// already carries its final boxing.
pub(crate) fn force_boxed(expr: &mut Expr) {
    expr.needs_box = true;
    match &mut expr.kind {
        ExprKind::Local { binding } => binding.record_usage(true),
        ExprKind::If { then, else_, .. } => {
            force_boxed(then);
            if let Some(else_) = else_ {
                force_boxed(else_);
            }
        }
        ExprKind::Do { values } => {
            if let Some(last) = values.last_mut() {
                force_boxed(last);
            }
        }
        ExprKind::Let { body, .. } => {
            if let Some(last) = body.last_mut() {
                force_boxed(last);
            }
        }
        ExprKind::Case {
            default, branches, ..
        } => {
            force_boxed(default);
            for (_, branch) in branches {
                force_boxed(branch);
            }
        }
        ExprKind::Try { body, catch, .. } => {
            if let Some(last) = body.last_mut() {
                force_boxed(last);
            }
            if let Some(catch) = catch {
                if let Some(last) = catch.body.last_mut() {
                    force_boxed(last);
                }
            }
        }
        // Leaves and non-tail-transparent forms: setting needs_box above
        // is the whole rewrite.
        _ => {}
    }
}
