//! Lexical frames, bindings, and recursion contexts
//!
//! One `Frame` per lexical construct, chained root-ward: a child frame owns
//! an `Rc` to its parent, and the finished expression tree keeps its frames
//! alive the same way, so back-references never form ownership cycles.
//! `Binding` and `RecursionContext` are shared handles: the same logical
//! binding registered as a capture into several function frames stays one
//! identity, and its boxing flags are monotonic — they can be set, never
//! cleared.

use crate::symbol::{unique_name, SymbolId};
use crate::value::Value;
use crate::vars::Var;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::expr::Expr;

/// The lexical construct a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Root,
    Fn,
    Let,
    Loop,
    Try,
    Catch,
    Finally,
}

#[derive(Debug)]
struct BindingData {
    sym: SymbolId,
    name: Rc<str>,
    native_name: Rc<str>,
    declaring_frame: Weak<FrameData>,
    initializer: RefCell<Option<Weak<Expr>>>,
    needs_box: Cell<bool>,
    has_boxed_usage: Cell<bool>,
    has_unboxed_usage: Cell<bool>,
}

/// A named, lexically-scoped value slot and its boxing metadata.
///
/// Cloning a `Binding` clones the handle, not the slot. Equality is handle
/// identity.
#[derive(Clone)]
pub struct Binding(Rc<BindingData>);

impl Binding {
    pub fn sym(&self) -> SymbolId {
        self.0.sym
    }

    pub fn name(&self) -> &Rc<str> {
        &self.0.name
    }

    /// Unique codegen identifier for this slot
    pub fn native_name(&self) -> &Rc<str> {
        &self.0.native_name
    }

    pub fn declaring_frame(&self) -> Option<Frame> {
        self.0.declaring_frame.upgrade().map(Frame)
    }

    pub fn set_initializer(&self, init: &Rc<Expr>) {
        *self.0.initializer.borrow_mut() = Some(Rc::downgrade(init));
    }

    pub fn initializer(&self) -> Option<Rc<Expr>> {
        self.0
            .initializer
            .borrow()
            .as_ref()
            .and_then(|weak| weak.upgrade())
    }

    pub fn needs_box(&self) -> bool {
        self.0.needs_box.get()
    }

    /// Force the slot boxed. Monotonic: there is no way back.
    pub fn mark_boxed(&self) {
        self.0.needs_box.set(true);
    }

    pub fn has_boxed_usage(&self) -> bool {
        self.0.has_boxed_usage.get()
    }

    pub fn has_unboxed_usage(&self) -> bool {
        self.0.has_unboxed_usage.get()
    }

    /// Record one use site's boxing demand. A slot used both boxed and
    /// unboxed resolves toward boxed.
    pub fn record_usage(&self, boxed: bool) {
        if boxed {
            self.0.has_boxed_usage.set(true);
        } else {
            self.0.has_unboxed_usage.set(true);
        }
        if self.0.has_boxed_usage.get() && self.0.has_unboxed_usage.get() {
            self.mark_boxed();
        }
    }

    /// Handle identity
    pub fn is(&self, other: &Binding) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.is(other)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.0.name)
            .field("native_name", &self.0.native_name)
            .field("needs_box", &self.0.needs_box.get())
            .finish()
    }
}

/// A var referenced from a frame, hoisted so codegen materializes the
/// handle once
#[derive(Debug, Clone)]
pub struct LiftedVar {
    pub var: Var,
    pub native_name: Rc<str>,
}

/// A compile-time value hoisted so codegen materializes it once
#[derive(Debug, Clone)]
pub struct LiftedConstant {
    pub value: Value,
    pub native_name: Rc<str>,
}

#[derive(Debug)]
struct RecursionContextData {
    name: Option<Rc<str>>,
    is_variadic: bool,
    fixed_param_count: usize,
    is_tail_recursive: Cell<bool>,
    /// The arity's parameter bindings: the slots `recur` lowering mutates.
    params: RefCell<Vec<Binding>>,
}

/// Per-arity metadata used to validate and lower `recur`.
///
/// Shared handle; `Recur` expressions hold clones of the context of the
/// arity they target. `is_tail_recursive` flips true the first time a
/// `recur` against this context validates, and stays true.
#[derive(Debug, Clone)]
pub struct RecursionContext(Rc<RecursionContextData>);

impl RecursionContext {
    pub fn new(name: Option<Rc<str>>, is_variadic: bool, fixed_param_count: usize) -> Self {
        RecursionContext(Rc::new(RecursionContextData {
            name,
            is_variadic,
            fixed_param_count,
            is_tail_recursive: Cell::new(false),
            params: RefCell::new(Vec::new()),
        }))
    }

    pub fn name(&self) -> Option<&Rc<str>> {
        self.0.name.as_ref()
    }

    pub fn is_variadic(&self) -> bool {
        self.0.is_variadic
    }

    pub fn fixed_param_count(&self) -> usize {
        self.0.fixed_param_count
    }

    pub fn set_params(&self, params: Vec<Binding>) {
        *self.0.params.borrow_mut() = params;
    }

    pub fn params(&self) -> Vec<Binding> {
        self.0.params.borrow().clone()
    }

    pub fn mark_tail_recursive(&self) {
        self.0.is_tail_recursive.set(true);
    }

    pub fn is_tail_recursive(&self) -> bool {
        self.0.is_tail_recursive.get()
    }

    pub fn is(&self, other: &RecursionContext) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for RecursionContext {
    fn eq(&self, other: &Self) -> bool {
        self.is(other)
    }
}

#[derive(Debug)]
struct FrameData {
    kind: FrameKind,
    parent: Option<Frame>,
    locals: RefCell<FxHashMap<SymbolId, Binding>>,
    captures: RefCell<Vec<Binding>>,
    lifted_vars: RefCell<Vec<LiftedVar>>,
    lifted_constants: RefCell<Vec<LiftedConstant>>,
    recursion: RefCell<Option<RecursionContext>>,
}

/// A lexical scope record in the analyzer's scope chain
#[derive(Debug, Clone)]
pub struct Frame(Rc<FrameData>);

impl Frame {
    pub fn root() -> Self {
        Frame::make(FrameKind::Root, None)
    }

    pub fn child(&self, kind: FrameKind) -> Self {
        Frame::make(kind, Some(self.clone()))
    }

    fn make(kind: FrameKind, parent: Option<Frame>) -> Self {
        Frame(Rc::new(FrameData {
            kind,
            parent,
            locals: RefCell::new(FxHashMap::default()),
            captures: RefCell::new(Vec::new()),
            lifted_vars: RefCell::new(Vec::new()),
            lifted_constants: RefCell::new(Vec::new()),
            recursion: RefCell::new(None),
        }))
    }

    pub fn kind(&self) -> FrameKind {
        self.0.kind
    }

    pub fn parent(&self) -> Option<Frame> {
        self.0.parent.clone()
    }

    pub fn is(&self, other: &Frame) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Create a binding declared by this frame. A same-named binding
    /// already in the frame is shadowed (let* sequential semantics).
    pub fn define(&self, sym: SymbolId, name: Rc<str>) -> Binding {
        let binding = Binding(Rc::new(BindingData {
            sym,
            name: name.clone(),
            native_name: unique_name(&name),
            declaring_frame: Rc::downgrade(&self.0),
            initializer: RefCell::new(None),
            needs_box: Cell::new(false),
            has_boxed_usage: Cell::new(false),
            has_unboxed_usage: Cell::new(false),
        }));
        self.0.locals.borrow_mut().insert(sym, binding.clone());
        binding
    }

    /// Look up a binding in this frame's own locals
    pub fn find_local(&self, sym: SymbolId) -> Option<Binding> {
        self.0.locals.borrow().get(&sym).cloned()
    }

    /// Look up a binding among this frame's registered captures
    pub fn find_capture(&self, sym: SymbolId) -> Option<Binding> {
        self.0
            .captures
            .borrow()
            .iter()
            .find(|b| b.sym() == sym)
            .cloned()
    }

    /// Register a capture: a binding referenced from inside this function
    /// frame but declared outside it. Idempotent per binding identity.
    pub fn register_capture(&self, binding: &Binding) {
        let mut captures = self.0.captures.borrow_mut();
        if !captures.iter().any(|c| c.is(binding)) {
            captures.push(binding.clone());
        }
    }

    /// Captures in registration order (the closure context layout)
    pub fn captures(&self) -> Vec<Binding> {
        self.0.captures.borrow().clone()
    }

    pub fn set_recursion(&self, ctx: RecursionContext) {
        *self.0.recursion.borrow_mut() = Some(ctx);
    }

    /// This frame's own recursion context, if it is a fn frame that has one
    pub fn recursion(&self) -> Option<RecursionContext> {
        self.0.recursion.borrow().clone()
    }

    /// The recursion context `recur` would target from this frame: walk
    /// outward to the nearest fn frame and stop there — recursion never
    /// crosses a function boundary.
    pub fn nearest_recursion(&self) -> Option<RecursionContext> {
        let mut cur = Some(self.clone());
        while let Some(frame) = cur {
            if frame.kind() == FrameKind::Fn {
                return frame.recursion();
            }
            cur = frame.parent();
        }
        None
    }

    /// The frame lifted constants and vars land on: the nearest enclosing
    /// fn frame, or the root frame at top level.
    pub fn lift_target(&self) -> Frame {
        let mut cur = self.clone();
        loop {
            match cur.kind() {
                FrameKind::Fn | FrameKind::Root => return cur,
                _ => match cur.parent() {
                    Some(parent) => cur = parent,
                    None => return cur,
                },
            }
        }
    }

    /// Hoist a constant value onto this frame, reusing an existing slot for
    /// an equal value. Returns the slot's native name.
    pub fn lift_constant(&self, value: &Value) -> Rc<str> {
        let mut constants = self.0.lifted_constants.borrow_mut();
        if let Some(existing) = constants.iter().find(|c| &c.value == value) {
            return existing.native_name.clone();
        }
        let native_name = unique_name("const");
        constants.push(LiftedConstant {
            value: value.clone(),
            native_name: native_name.clone(),
        });
        native_name
    }

    /// Hoist a var reference onto this frame. Returns the slot's native name.
    pub fn lift_var(&self, var: &Var) -> Rc<str> {
        let mut vars = self.0.lifted_vars.borrow_mut();
        if let Some(existing) = vars.iter().find(|v| v.var.is(var)) {
            return existing.native_name.clone();
        }
        let native_name = unique_name(&format!("var_{}", var.name()));
        vars.push(LiftedVar {
            var: var.clone(),
            native_name: native_name.clone(),
        });
        native_name
    }

    pub fn lifted_constants(&self) -> Vec<LiftedConstant> {
        self.0.lifted_constants.borrow().clone()
    }

    pub fn lifted_vars(&self) -> Vec<LiftedVar> {
        self.0.lifted_vars.borrow().clone()
    }
}
