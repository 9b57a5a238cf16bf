//! Remaining special forms: def, var, quote, throw, try, case*

use super::*;
use crate::analysis::expr::{CatchClause, FinallyClause};
use crate::analysis::fold;

/// `*foo*`-style names mark dynamically-bound vars
fn is_earmuffed(name: &str) -> bool {
    name.len() >= 3 && name.starts_with('*') && name.ends_with('*')
}

enum TryClause {
    Catch,
    Finally,
    Ordinary,
}

fn classify_try_form(form: &Form) -> TryClause {
    let head = form
        .as_list()
        .and_then(|items| items.first())
        .and_then(|h| h.as_unqualified());
    match head.map(|n| n.as_ref()) {
        Some("catch") => TryClause::Catch,
        Some("finally") => TryClause::Finally,
        _ => TryClause::Ordinary,
    }
}

impl<'a> Analyzer<'a> {
    /// `(def name)`, `(def name value)`, `(def name docstring value)`
    pub(crate) fn analyze_def(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        if items.len() < 2 || items.len() > 4 {
            return Err(AnalysisError::invalid_def(
                "def expects a name, an optional docstring, and an optional value",
                span,
            ));
        }

        let sym = items[1].as_symbol().ok_or_else(|| {
            AnalysisError::invalid_def(
                format!("def name must be a symbol, got {}", items[1].kind_label()),
                &items[1].span,
            )
        })?;
        if sym.is_qualified() {
            return Err(AnalysisError::invalid_def(
                "def name must not be namespace-qualified",
                &items[1].span,
            ));
        }

        let (doc, value_form) = match items.len() {
            2 => (None, None),
            3 => (None, Some(&items[2])),
            _ => {
                let doc = items[2].as_string().ok_or_else(|| {
                    AnalysisError::invalid_def(
                        format!("docstring must be a string, got {}", items[2].kind_label()),
                        &items[2].span,
                    )
                })?;
                (Some(doc.clone()), Some(&items[3]))
            }
        };

        let (ns, name) = self.namespaces.qualify(sym);
        let var = self.namespaces.intern_var(ns, name);
        if let Some(doc) = doc {
            var.set_doc(doc);
        }
        if is_earmuffed(&sym.name) {
            var.set_dynamic(true);
        }
        frame.lift_target().lift_var(&var);

        let value = match value_form {
            Some(form) => {
                let value_ctx = ctx.with_position(Position::Value).with_needs_box(true);
                Some(Box::new(self.analyze_form(form, frame, value_ctx)?))
            }
            None => None,
        };

        Ok(Expr::new(
            ExprKind::Def { var, value },
            span.clone(),
            ctx.position,
            true,
            frame.clone(),
        ))
    }

    /// `(var name)`: the var object itself; the var must already exist
    pub(crate) fn analyze_var(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        if items.len() != 2 {
            return Err(AnalysisError::invalid_var("var expects one symbol", span));
        }
        let sym = items[1].as_symbol().ok_or_else(|| {
            AnalysisError::invalid_var(
                format!("var expects a symbol, got {}", items[1].kind_label()),
                &items[1].span,
            )
        })?;

        let var = self
            .namespaces
            .find_var(sym)
            .ok_or_else(|| AnalysisError::unresolved_var(sym.to_string(), &items[1].span))?;
        frame.lift_target().lift_var(&var);

        Ok(Expr::new(
            ExprKind::VarRef { var },
            span.clone(),
            ctx.position,
            ctx.needs_box,
            frame.clone(),
        ))
    }

    /// `(quote form)`: the quoted form reduced to a constant
    pub(crate) fn analyze_quote(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        if items.len() != 2 {
            return Err(AnalysisError::invalid_quote("quote expects one form", span));
        }
        let value = fold::form_to_value(&items[1]);
        Ok(self.literal(value, span.clone(), frame, ctx))
    }

    pub(crate) fn analyze_throw(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        if items.len() != 2 {
            return Err(AnalysisError::invalid_throw(
                "throw expects exactly one value",
                span,
            ));
        }
        let value_ctx = ctx.with_position(Position::Value).with_needs_box(true);
        let value = self.analyze_form(&items[1], frame, value_ctx)?;
        Ok(Expr::new(
            ExprKind::Throw {
                value: Box::new(value),
            },
            span.clone(),
            ctx.position,
            ctx.needs_box,
            frame.clone(),
        ))
    }

    /// `(try body* (catch e body*)? (finally body*)?)`
    ///
    /// Body, catch, and finally each get their own frame so the caught
    /// exception is scoped to the catch block only. `recur` is disallowed
    /// across the whole form: recursion cannot cross an exception-handling
    /// boundary.
    pub(crate) fn analyze_try(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        let rest = &items[1..];
        let body_end = rest
            .iter()
            .position(|f| !matches!(classify_try_form(f), TryClause::Ordinary))
            .unwrap_or(rest.len());
        let body_forms = &rest[..body_end];
        let mut tail = &rest[body_end..];

        let inner = ctx.with_no_recur();

        let try_frame = frame.child(FrameKind::Try);
        // The protected body's result cannot be returned directly — the
        // handler must stay active — so its last form is a boxed value,
        // never a tail.
        let body_ctx = inner.with_position(Position::Value).with_needs_box(true);
        let body = self.analyze_body(body_forms, &try_frame, body_ctx, span)?;

        let mut catch = None;
        if let Some(form) = tail.first() {
            if matches!(classify_try_form(form), TryClause::Catch) {
                catch = Some(self.analyze_catch(form, frame, inner)?);
                tail = &tail[1..];
            }
        }

        let mut finally = None;
        if let Some(form) = tail.first() {
            if matches!(classify_try_form(form), TryClause::Finally) {
                let finally_items = Self::clause_items(form)?;
                let finally_frame = frame.child(FrameKind::Finally);
                // finally runs for effect; its result is discarded
                let finally_body = self.analyze_body(
                    &finally_items[1..],
                    &finally_frame,
                    inner.statement(),
                    &form.span,
                )?;
                finally = Some(FinallyClause {
                    body: finally_body,
                    frame: finally_frame,
                });
                tail = &tail[1..];
            }
        }

        if let Some(stray) = tail.first() {
            let message = match classify_try_form(stray) {
                TryClause::Catch if catch.is_some() => "try can have at most one catch clause",
                TryClause::Catch => "catch must precede finally",
                TryClause::Finally => "try can have at most one finally clause",
                TryClause::Ordinary => "no forms may follow catch or finally",
            };
            return Err(AnalysisError::invalid_try(message, &stray.span));
        }

        Ok(Expr::new(
            ExprKind::Try {
                body,
                catch,
                finally,
            },
            span.clone(),
            ctx.position,
            ctx.needs_box,
            frame.clone(),
        ))
    }

    /// Re-extract a clause's items after classification; failure here means
    /// the classifier and this accessor disagree, which a well-formed parse
    /// cannot produce.
    fn clause_items(form: &Form) -> Result<&[Form]> {
        form.as_list().ok_or_else(|| {
            AnalysisError::internal_failure("try clause lost its list shape", &form.span)
        })
    }

    fn analyze_catch(
        &mut self,
        form: &Form,
        frame: &Frame,
        inner: AnalysisContext,
    ) -> Result<CatchClause> {
        let items = Self::clause_items(form)?;
        if items.len() < 2 {
            return Err(AnalysisError::invalid_try(
                "catch expects a binding symbol",
                &form.span,
            ));
        }
        let name = items[1].as_unqualified().ok_or_else(|| {
            AnalysisError::invalid_try(
                "catch binding must be an unqualified symbol",
                &items[1].span,
            )
        })?;

        let catch_frame = frame.child(FrameKind::Catch);
        let sym = self.symbols.intern(name);
        let binding = catch_frame.define(sym, name.clone());
        // The caught exception is always a uniform runtime handle
        binding.mark_boxed();

        let body_ctx = inner.with_position(Position::Value).with_needs_box(true);
        let body = self.analyze_body(&items[2..], &catch_frame, body_ctx, &form.span)?;

        Ok(CatchClause {
            binding,
            body,
            frame: catch_frame,
        })
    }

    /// `(case* value shift mask default {key expr ...})` with integer
    /// literal shift, mask, and branch keys
    pub(crate) fn analyze_case(
        &mut self,
        items: &[Form],
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        if items.len() != 6 {
            return Err(AnalysisError::invalid_case(
                "case* expects a value, shift, mask, default, and a branch map",
                span,
            ));
        }

        let shift = items[2].as_int().ok_or_else(|| {
            AnalysisError::invalid_case(
                format!("case* shift must be an integer literal, got {}", items[2].kind_label()),
                &items[2].span,
            )
        })?;
        let mask = items[3].as_int().ok_or_else(|| {
            AnalysisError::invalid_case(
                format!("case* mask must be an integer literal, got {}", items[3].kind_label()),
                &items[3].span,
            )
        })?;

        // The dispatch value is consumed natively; branches, like if
        // branches, cannot be unified and are boxed.
        let value_ctx = ctx.with_position(Position::Value).with_needs_box(false);
        let value = self.analyze_form(&items[1], frame, value_ctx)?;

        let branch_ctx = ctx.with_needs_box(true);
        let default = self.analyze_form(&items[4], frame, branch_ctx)?;

        let branch_pairs = match &items[5].kind {
            crate::form::FormKind::Map(pairs) => pairs,
            _ => {
                return Err(AnalysisError::invalid_case(
                    format!(
                        "case* branches must be a map literal, got {}",
                        items[5].kind_label()
                    ),
                    &items[5].span,
                ))
            }
        };

        let mut branches = Vec::with_capacity(branch_pairs.len());
        for (key_form, branch_form) in branch_pairs {
            let key = key_form.as_int().ok_or_else(|| {
                AnalysisError::invalid_case(
                    format!(
                        "case* branch key must be an integer literal, got {}",
                        key_form.kind_label()
                    ),
                    &key_form.span,
                )
            })?;
            branches.push((key, self.analyze_form(branch_form, frame, branch_ctx)?));
        }

        Ok(Expr::new(
            ExprKind::Case {
                value: Box::new(value),
                shift,
                mask,
                default: Box::new(default),
                branches,
            },
            span.clone(),
            ctx.position,
            ctx.needs_box,
            frame.clone(),
        ))
    }
}
