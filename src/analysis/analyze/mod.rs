//! Form-to-expression analysis
//!
//! The analyzer converts parsed forms into the expression IR by:
//! 1. Resolving every symbol to a binding, a self-reference, or a var
//! 2. Computing captures for closures and forcing captured slots boxed
//! 3. Validating special-form shapes and `recur` legality
//! 4. Lifting constants and var references onto their owning frames
//!
//! Analysis is a single synchronous depth-first pass. The handful of
//! dynamically-scoped facts (position, boxing demand, the no-recur flag
//! set inside `try`) travel in [`AnalysisContext`], a `Copy` struct passed
//! by value into every analyzer, so an early `?` return can never leave a
//! flag stuck.

mod call;
mod forms;
mod function;
mod special;

use crate::error::{AnalysisError, Result};
use crate::form::{Form, Span};
use crate::symbol::{SymbolId, SymbolTable};
use crate::value::Value;
use crate::vars::{Evaluator, Namespaces};
use log::trace;

use super::expr::{Expr, ExprKind, FnArity, Position};
use super::frame::{Binding, Frame, FrameKind, RecursionContext};

/// Hard upper bound on fixed parameters per arity. Callers passing more
/// arguments than this pack the overflow into one trailing list.
pub const MAX_PARAMS: usize = 10;

/// Macro expansions nested deeper than this abort analysis; a legitimate
/// expansion chain never gets close.
const MAX_MACRO_DEPTH: usize = 200;

/// The dynamically-scoped facts of one analysis step.
///
/// Passed by value: every analyzer gets its own copy, so restoring on exit
/// is automatic whether the analyzer returns or errors out.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext {
    pub position: Position,
    pub needs_box: bool,
    /// Set while analyzing any part of a `try`; cleared on entering a
    /// fresh `fn*` body.
    pub no_recur: bool,
}

impl AnalysisContext {
    /// Context for a value whose result feeds the enclosing expression
    pub fn value(needs_box: bool) -> Self {
        AnalysisContext {
            position: Position::Value,
            needs_box,
            no_recur: false,
        }
    }

    pub fn with_position(self, position: Position) -> Self {
        AnalysisContext { position, ..self }
    }

    pub fn with_needs_box(self, needs_box: bool) -> Self {
        AnalysisContext { needs_box, ..self }
    }

    pub fn with_no_recur(self) -> Self {
        AnalysisContext {
            no_recur: true,
            ..self
        }
    }

    /// An effect-only position: result discarded, no boxing demand
    pub fn statement(self) -> Self {
        AnalysisContext {
            position: Position::Statement,
            needs_box: false,
            ..self
        }
    }
}

/// Result of analyzing one top-level unit
pub struct AnalysisResult {
    /// The implicit zero-arg function wrapping the top-level forms
    pub expr: Expr,
    /// The root frame; code generators read its lifted constants/vars
    pub root: Frame,
}

/// Walk the frame chain looking for `sym`, recording whether the walk
/// passed through one or more fn-frame boundaries. A binding found across
/// a boundary is registered as a capture into every fn frame crossed and
/// is unconditionally boxed.
pub(crate) fn resolve_local(sym: SymbolId, frame: &Frame) -> Option<(Binding, bool)> {
    let mut crossed_fns: Vec<Frame> = Vec::new();
    let mut cur = Some(frame.clone());

    while let Some(f) = cur {
        if let Some(binding) = f.find_local(sym).or_else(|| f.find_capture(sym)) {
            let crossed = !crossed_fns.is_empty();
            if crossed {
                binding.mark_boxed();
                for fn_frame in &crossed_fns {
                    trace!("capturing {} across fn boundary", binding.name());
                    fn_frame.register_capture(&binding);
                }
            }
            return Some((binding, crossed));
        }
        if f.kind() == FrameKind::Fn {
            crossed_fns.push(f.clone());
        }
        cur = f.parent();
    }
    None
}

/// Analyzer that converts forms into the expression IR
pub struct Analyzer<'a> {
    pub(crate) symbols: &'a mut SymbolTable,
    pub(crate) namespaces: &'a mut Namespaces,
    pub(crate) evaluator: &'a mut dyn Evaluator,
    /// Self-reference bindings of named `fn*`s currently being analyzed;
    /// calls resolving to one of these become `NamedRecursion`.
    pub(crate) self_refs: Vec<Binding>,
    pub(crate) macro_depth: usize,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        symbols: &'a mut SymbolTable,
        namespaces: &'a mut Namespaces,
        evaluator: &'a mut dyn Evaluator,
    ) -> Self {
        Analyzer {
            symbols,
            namespaces,
            evaluator,
            self_refs: Vec::new(),
            macro_depth: 0,
        }
    }

    /// Analyze a top-level sequence of forms.
    ///
    /// The sequence is wrapped in an implicit zero-arg function: all forms
    /// but the last are statements, the last is the unit's (boxed) result.
    /// The wrapper's frame has no recursion context, so a top-level `recur`
    /// fails like any other out-of-context `recur`.
    pub fn analyze(&mut self, forms: &[Form]) -> Result<AnalysisResult> {
        let root = Frame::root();
        let fn_frame = root.child(FrameKind::Fn);

        let span = forms
            .iter()
            .fold(None::<Span>, |acc, f| match acc {
                Some(s) => Some(s.merge(&f.span)),
                None => Some(f.span.clone()),
            })
            .unwrap_or_else(Span::synthetic);

        let ctx = AnalysisContext {
            position: Position::Tail,
            needs_box: true,
            no_recur: false,
        };
        let body = self.analyze_body(forms, &fn_frame, ctx, &span)?;

        let recursion = RecursionContext::new(None, false, 0);
        let arity = FnArity {
            params: smallvec::SmallVec::new(),
            variadic: false,
            body,
            frame: fn_frame,
            recursion,
        };
        let expr = Expr::new(
            ExprKind::Fn {
                name: None,
                arities: vec![arity],
            },
            span,
            Position::Value,
            true,
            root.clone(),
        );
        Ok(AnalysisResult { expr, root })
    }

    /// Analyze a body sequence: every form but the last in statement
    /// position with its result discarded, the last inheriting the caller's
    /// position and boxing demand. An empty body yields a single nil.
    pub(crate) fn analyze_body(
        &mut self,
        forms: &[Form],
        frame: &Frame,
        ctx: AnalysisContext,
        span: &Span,
    ) -> Result<Vec<Expr>> {
        let (last, rest) = match forms.split_last() {
            Some(split) => split,
            None => return Ok(vec![self.literal(Value::Nil, span.clone(), frame, ctx)]),
        };

        let mut body = Vec::with_capacity(forms.len());
        for form in rest {
            body.push(self.analyze_form(form, frame, ctx.statement())?);
        }
        body.push(self.analyze_form(last, frame, ctx)?);
        Ok(body)
    }

    /// Build a literal expression and lift its value onto the nearest fn
    /// (or root) frame.
    pub(crate) fn literal(
        &mut self,
        value: Value,
        span: Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Expr {
        frame.lift_target().lift_constant(&value);
        Expr::new(
            ExprKind::Literal { value },
            span,
            ctx.position,
            ctx.needs_box,
            frame.clone(),
        )
    }

    /// Analyze a symbol in value position. Resolution order: local binding
    /// or capture, then var; macros have no value.
    pub(crate) fn analyze_symbol(
        &mut self,
        sym: &crate::form::SymName,
        span: &Span,
        frame: &Frame,
        ctx: AnalysisContext,
    ) -> Result<Expr> {
        if !sym.is_qualified() {
            let id = self.symbols.intern(&sym.name);
            if let Some((binding, _crossed)) = resolve_local(id, frame) {
                binding.record_usage(ctx.needs_box);
                return Ok(Expr::new(
                    ExprKind::Local { binding },
                    span.clone(),
                    ctx.position,
                    ctx.needs_box,
                    frame.clone(),
                ));
            }
        }

        match self.namespaces.find_var(sym) {
            Some(var) if var.is_macro() => Err(AnalysisError::unresolved_var(
                format!("{} is a macro and has no value", sym),
                span,
            )),
            Some(var) => {
                frame.lift_target().lift_var(&var);
                Ok(Expr::new(
                    ExprKind::VarDeref { var },
                    span.clone(),
                    ctx.position,
                    ctx.needs_box,
                    frame.clone(),
                ))
            }
            None => Err(AnalysisError::unresolved_symbol(sym.to_string(), span)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn frame_with(sym: u32, name: &str, frame: &Frame) -> Binding {
        frame.define(SymbolId(sym), Rc::from(name))
    }

    #[test]
    fn test_resolve_in_same_frame_does_not_capture() {
        let root = Frame::root();
        let fn_frame = root.child(FrameKind::Fn);
        let b = frame_with(1, "x", &fn_frame);

        let (found, crossed) = resolve_local(SymbolId(1), &fn_frame).unwrap();
        assert!(found.is(&b));
        assert!(!crossed);
        assert!(!found.needs_box());
        assert!(fn_frame.captures().is_empty());
    }

    #[test]
    fn test_resolve_through_let_does_not_capture() {
        let root = Frame::root();
        let fn_frame = root.child(FrameKind::Fn);
        let b = frame_with(1, "x", &fn_frame);
        let let_frame = fn_frame.child(FrameKind::Let);

        let (found, crossed) = resolve_local(SymbolId(1), &let_frame).unwrap();
        assert!(found.is(&b));
        assert!(!crossed);
    }

    #[test]
    fn test_resolve_across_fn_boundary_captures_and_boxes() {
        let root = Frame::root();
        let outer = root.child(FrameKind::Fn);
        let b = frame_with(1, "x", &outer);
        let inner = outer.child(FrameKind::Fn);

        let (found, crossed) = resolve_local(SymbolId(1), &inner).unwrap();
        assert!(found.is(&b));
        assert!(crossed);
        assert!(found.needs_box());
        assert_eq!(inner.captures().len(), 1);
        assert!(outer.captures().is_empty());
    }

    #[test]
    fn test_resolve_registers_into_every_crossed_fn_frame() {
        let root = Frame::root();
        let outer = root.child(FrameKind::Fn);
        let b = frame_with(1, "x", &outer);
        let middle = outer.child(FrameKind::Fn);
        let inner = middle.child(FrameKind::Fn);

        let (found, crossed) = resolve_local(SymbolId(1), &inner).unwrap();
        assert!(found.is(&b));
        assert!(crossed);
        assert_eq!(middle.captures().len(), 1);
        assert_eq!(inner.captures().len(), 1);
    }

    #[test]
    fn test_resolve_finds_existing_capture() {
        let root = Frame::root();
        let outer = root.child(FrameKind::Fn);
        let b = frame_with(1, "x", &outer);
        let middle = outer.child(FrameKind::Fn);
        middle.register_capture(&b);
        let inner = middle.child(FrameKind::Fn);

        // Found via middle's capture list; still registered into inner.
        let (found, crossed) = resolve_local(SymbolId(1), &inner).unwrap();
        assert!(found.is(&b));
        assert!(crossed);
        assert_eq!(inner.captures().len(), 1);
    }

    #[test]
    fn test_resolve_miss() {
        let root = Frame::root();
        assert!(resolve_local(SymbolId(9), &root).is_none());
    }
}
