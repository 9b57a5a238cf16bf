//! Vars, namespaces, and the runtime seam
//!
//! The var/namespace system proper lives in the runtime, outside this crate.
//! What the analyzer needs from it is small: qualify a symbol against the
//! current namespace, intern or look up a var, read the var metadata that
//! influences analysis (macro flag, dynamic flag, docstring, unboxed-call
//! arity info), and call back into the evaluator for macro expansion and
//! literal folding. `Namespaces` is the registry realizing the lookup
//! surface; [`Evaluator`] is the call-in seam.

use crate::analysis::Expr;
use crate::form::{Form, SymName};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Per-arity calling-convention metadata a var may carry.
///
/// When present, call analysis relaxes the default all-boxed convention:
/// `unboxed_args` lets arguments stay native scalars, `unboxed_return`
/// marks the result as a native scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArityMeta {
    pub unboxed_args: bool,
    pub unboxed_return: bool,
}

#[derive(Debug, Default)]
struct VarMeta {
    is_macro: Cell<bool>,
    is_dynamic: Cell<bool>,
    doc: RefCell<Option<Rc<str>>>,
    arity: Cell<Option<ArityMeta>>,
}

#[derive(Debug)]
struct VarData {
    ns: Rc<str>,
    name: Rc<str>,
    meta: VarMeta,
}

/// A shared handle to an interned var.
///
/// Interning the same qualified name twice yields the same handle, so a
/// repeated `def` re-binds the existing var rather than minting a new
/// identity. Equality is handle identity.
#[derive(Debug, Clone)]
pub struct Var(Rc<VarData>);

impl Var {
    fn new(ns: Rc<str>, name: Rc<str>) -> Self {
        Var(Rc::new(VarData {
            ns,
            name,
            meta: VarMeta::default(),
        }))
    }

    pub fn ns(&self) -> &Rc<str> {
        &self.0.ns
    }

    pub fn name(&self) -> &Rc<str> {
        &self.0.name
    }

    pub fn is_macro(&self) -> bool {
        self.0.meta.is_macro.get()
    }

    pub fn set_macro(&self) {
        self.0.meta.is_macro.set(true);
    }

    pub fn is_dynamic(&self) -> bool {
        self.0.meta.is_dynamic.get()
    }

    pub fn set_dynamic(&self, dynamic: bool) {
        self.0.meta.is_dynamic.set(dynamic);
    }

    pub fn doc(&self) -> Option<Rc<str>> {
        self.0.meta.doc.borrow().clone()
    }

    pub fn set_doc(&self, doc: impl Into<Rc<str>>) {
        *self.0.meta.doc.borrow_mut() = Some(doc.into());
    }

    pub fn arity_meta(&self) -> Option<ArityMeta> {
        self.0.meta.arity.get()
    }

    pub fn set_arity_meta(&self, meta: ArityMeta) {
        self.0.meta.arity.set(Some(meta));
    }

    /// Handle identity: two handles to the same interned var
    pub fn is(&self, other: &Var) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.is(other)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#'{}/{}", self.0.ns, self.0.name)
    }
}

/// Namespace registry: qualification and var interning
#[derive(Debug)]
pub struct Namespaces {
    current: Rc<str>,
    vars: FxHashMap<(Rc<str>, Rc<str>), Var>,
}

impl Namespaces {
    pub fn new(current: impl Into<Rc<str>>) -> Self {
        Namespaces {
            current: current.into(),
            vars: FxHashMap::default(),
        }
    }

    pub fn current(&self) -> &Rc<str> {
        &self.current
    }

    pub fn set_current(&mut self, ns: impl Into<Rc<str>>) {
        self.current = ns.into();
    }

    /// Qualify a symbol: an explicit namespace wins, otherwise the symbol
    /// lands in the current namespace.
    pub fn qualify(&self, sym: &SymName) -> (Rc<str>, Rc<str>) {
        match &sym.ns {
            Some(ns) => (ns.clone(), sym.name.clone()),
            None => (self.current.clone(), sym.name.clone()),
        }
    }

    /// Intern a var, returning the existing handle if the qualified name is
    /// already known.
    pub fn intern_var(&mut self, ns: Rc<str>, name: Rc<str>) -> Var {
        self.vars
            .entry((ns.clone(), name.clone()))
            .or_insert_with(|| Var::new(ns, name))
            .clone()
    }

    /// Look up a var by (possibly unqualified) symbol without interning.
    pub fn find_var(&self, sym: &SymName) -> Option<Var> {
        let key = self.qualify(sym);
        self.vars.get(&key).cloned()
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Namespaces::new("user")
    }
}

/// The evaluator seam (spec'd external collaborator).
///
/// Both calls are synchronous call-ins made by the analyzer itself:
/// `eval` folds a self-contained expression tree into one runtime value,
/// `macroexpand` rewrites a macro call form into its expansion. Errors are
/// plain strings; the analyzer attaches spans and error kinds.
pub trait Evaluator {
    fn eval(&mut self, expr: &Expr) -> std::result::Result<crate::value::Value, String>;

    fn macroexpand(&mut self, var: &Var, form: &Form) -> std::result::Result<Form, String>;
}
