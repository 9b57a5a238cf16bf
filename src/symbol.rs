//! Symbol interning and unique-name generation

use rustc_hash::FxHashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Symbol ID for interned symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// Counter behind [`unique_name`]; never reset so generated names stay
/// unique across analyzer instances in one process.
static UNIQUE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique native (codegen-facing) identifier from a base name.
///
/// The base is munged to a C-family identifier first, so `unique_name("foo?")`
/// yields something like `foo_QMARK__17`.
pub fn unique_name(base: &str) -> Rc<str> {
    let n = UNIQUE_COUNTER.fetch_add(1, Ordering::Relaxed);
    Rc::from(format!("{}_{}", munge(base), n))
}

/// Munge a Lisp identifier into a valid C-family identifier.
pub fn munge(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        match c {
            '-' => out.push('_'),
            '?' => out.push_str("_QMARK_"),
            '!' => out.push_str("_BANG_"),
            '*' => out.push_str("_STAR_"),
            '+' => out.push_str("_PLUS_"),
            '<' => out.push_str("_LT_"),
            '>' => out.push_str("_GT_"),
            '=' => out.push_str("_EQ_"),
            '/' => out.push_str("_SLASH_"),
            '.' => out.push('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => {
                if i == 0 && c.is_ascii_digit() {
                    out.push('_');
                }
                out.push(c);
            }
            c => {
                out.push_str("_U");
                out.push_str(&format!("{:x}", c as u32));
                out.push('_');
            }
        }
    }
    out
}

/// Symbol interning table for fast symbol comparison
///
/// Uses `Rc<str>` for symbol names so the map key and the names vector
/// share one allocation.
#[derive(Debug, Default)]
pub struct SymbolTable {
    map: FxHashMap<Rc<str>, SymbolId>,
    names: Vec<Rc<str>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            map: FxHashMap::default(),
            names: Vec::new(),
        }
    }

    /// Intern a symbol, returning its ID
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.map.get(name) {
            return id;
        }

        let id = SymbolId(self.names.len() as u32);
        let shared: Rc<str> = Rc::from(name);
        self.names.push(shared.clone());
        self.map.insert(shared, id);
        id
    }

    /// Get the name of a symbol by ID
    pub fn name(&self, id: SymbolId) -> Option<&str> {
        self.names.get(id.0 as usize).map(|s| s.as_ref())
    }

    /// The shared allocation for a symbol's name
    pub fn shared_name(&self, id: SymbolId) -> Option<Rc<str>> {
        self.names.get(id.0 as usize).cloned()
    }

    /// Check if a name is already interned
    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.map.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut table = SymbolTable::new();
        let a = table.intern("foo");
        let b = table.intern("foo");
        assert_eq!(a, b);
        assert_eq!(table.name(a), Some("foo"));
    }

    #[test]
    fn test_distinct_names_distinct_ids() {
        let mut table = SymbolTable::new();
        let a = table.intern("foo");
        let b = table.intern("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn test_munge() {
        assert_eq!(munge("hello-world"), "hello_world");
        assert_eq!(munge("empty?"), "empty_QMARK_");
        assert_eq!(munge("set!"), "set_BANG_");
        assert_eq!(munge("*dyn*"), "_STAR_dyn_STAR_");
        assert_eq!(munge("1st"), "_1st");
    }

    #[test]
    fn test_unique_name_is_unique() {
        let a = unique_name("x");
        let b = unique_name("x");
        assert_ne!(a, b);
        assert!(a.starts_with("x_"));
    }
}
