//! Scoped symbol table with fully qualified names.
//!
//! The table keeps two stacks: the *active* stack of open scopes
//! (global always at the bottom) and an *archive* of popped scopes.
//! Archiving instead of discarding is what lets the code generator
//! and the editor queries resolve names after analysis has already
//! closed their scopes. A symbol's FQDN is fixed at insertion from
//! the then-current active stack, joined with `::`.

use core::fmt;
use std::collections::BTreeMap;

use crate::span::Pos;
use crate::types::SemType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    Layout,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolKind::Variable => "variable",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Function => "function",
            SymbolKind::Layout => "layout",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    /// Scope path joined with `::`, `global` outermost. Computed at
    /// insertion.
    pub fqdn: String,
    pub kind: SymbolKind,
    pub ty: SemType,
    pub pos: Pos,
    pub initialized: bool,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        ty: SemType,
        pos: Pos,
        initialized: bool,
    ) -> Symbol {
        Symbol {
            name: name.into(),
            fqdn: String::new(),
            kind,
            ty,
            pos,
            initialized,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.fqdn, self.ty)
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub name: String,
    pub symbols: BTreeMap<String, Symbol>,
}

impl Scope {
    fn new(name: impl Into<String>) -> Scope {
        Scope {
            name: name.into(),
            symbols: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    active: Vec<Scope>,
    archived: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            active: vec![Scope::new("global")],
            archived: Vec::new(),
        }
    }

    pub fn push_scope(&mut self, name: impl Into<String>) {
        self.active.push(Scope::new(name));
    }

    /// Close the innermost scope, moving it into the archive for
    /// post-analysis queries. The global scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.active.len() > 1 {
            let scope = self.active.pop().unwrap();
            self.archived.push(scope);
        }
    }

    pub fn current_scope_name(&self) -> &str {
        self.active.last().map(|s| s.name.as_str()).unwrap_or("")
    }

    pub fn build_fqdn(&self, name: &str) -> String {
        let mut fqdn = String::new();
        for scope in &self.active {
            if !fqdn.is_empty() {
                fqdn.push_str("::");
            }
            fqdn.push_str(&scope.name);
        }
        if fqdn.is_empty() {
            fqdn.push_str("global");
        }
        fqdn.push_str("::");
        fqdn.push_str(name);
        fqdn
    }

    pub fn insert(&mut self, mut symbol: Symbol) {
        symbol.fqdn = self.build_fqdn(&symbol.name);
        let scope = self.active.last_mut().expect("active stack never empty");
        scope.symbols.insert(symbol.name.clone(), symbol);
    }

    /// Replace a symbol in the current scope, recomputing its FQDN.
    /// Used by the placeholder-then-complete layout protocol.
    pub fn replace(&mut self, name: &str, mut symbol: Symbol) {
        symbol.fqdn = self.build_fqdn(name);
        let scope = self.active.last_mut().expect("active stack never empty");
        scope.symbols.insert(name.to_string(), symbol);
    }

    pub fn has_in_current_scope(&self, name: &str) -> bool {
        self.active
            .last()
            .map(|s| s.symbols.contains_key(name))
            .unwrap_or(false)
    }

    /// Resolve a name: active scopes innermost-first, then the
    /// archive as a fallback. A name containing `::` is routed to
    /// exact-FQDN search.
    pub fn find(&self, name: &str) -> Option<&Symbol> {
        if name.is_empty() || name == "global" {
            return None;
        }
        if name.contains("::") {
            return self.find_by_fqdn(name);
        }

        for scope in self.active.iter().rev() {
            if let Some(symbol) = scope.symbols.get(name) {
                return Some(symbol);
            }
        }
        for scope in &self.archived {
            if let Some(symbol) = scope.symbols.get(name) {
                return Some(symbol);
            }
        }
        None
    }

    /// Mutable resolution with the same search order as `find`; used
    /// to flip initialization flags.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        if name.is_empty() || name == "global" {
            return None;
        }
        let in_active = self
            .active
            .iter()
            .rev()
            .position(|s| s.symbols.contains_key(name));
        if let Some(rev_idx) = in_active {
            let idx = self.active.len() - 1 - rev_idx;
            return self.active[idx].symbols.get_mut(name);
        }
        self.archived
            .iter_mut()
            .find(|s| s.symbols.contains_key(name))
            .and_then(|s| s.symbols.get_mut(name))
    }

    pub fn find_by_fqdn(&self, fqdn: &str) -> Option<&Symbol> {
        for scope in self.active.iter().chain(&self.archived) {
            for symbol in scope.symbols.values() {
                if symbol.fqdn == fqdn {
                    return Some(symbol);
                }
            }
        }
        None
    }

    pub fn active_scopes(&self) -> &[Scope] {
        &self.active
    }

    pub fn archived_scopes(&self) -> &[Scope] {
        &self.archived
    }

    /// Active + archived combined, for inspection and queries.
    pub fn all_scopes(&self) -> impl Iterator<Item = &Scope> {
        self.active.iter().chain(&self.archived)
    }

    /// Does any scope (active or archived) carry this name? Used to
    /// recognize namespace scopes by their `namespace_<n>` names.
    pub fn has_scope_named(&self, name: &str) -> bool {
        self.all_scopes().any(|s| s.name == name)
    }

    /// Render every scope and symbol, debug-dump style.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for scope in self.all_scopes() {
            if scope.symbols.is_empty() {
                continue;
            }
            out.push_str(&format!("Scope: {}\n", scope.name));
            for symbol in scope.symbols.values() {
                out.push_str(&format!(
                    "  {} (line {}, col {})",
                    symbol, symbol.pos.line, symbol.pos.column
                ));
                if symbol.kind == SymbolKind::Variable {
                    out.push_str(if symbol.initialized {
                        " [initialized]"
                    } else {
                        " [uninitialized]"
                    });
                }
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, kind: SymbolKind) -> Symbol {
        Symbol::new(name, kind, SemType::Int, Pos::new(1, 1), true)
    }

    #[test]
    fn fqdn_reflects_scope_path_at_insertion() {
        let mut table = SymbolTable::new();
        table.insert(sym("x", SymbolKind::Variable));
        table.push_scope("function_f");
        table.insert(sym("y", SymbolKind::Variable));

        assert_eq!(table.find("x").unwrap().fqdn, "global::x");
        assert_eq!(table.find("y").unwrap().fqdn, "global::function_f::y");
    }

    #[test]
    fn shadowing_resolves_innermost_first() {
        let mut table = SymbolTable::new();
        table.insert(sym("x", SymbolKind::Variable));
        table.push_scope("block");
        let mut inner = sym("x", SymbolKind::Variable);
        inner.ty = SemType::Char;
        table.insert(inner);

        assert_eq!(table.find("x").unwrap().ty, SemType::Char);
        table.pop_scope();
        assert_eq!(table.find("x").unwrap().ty, SemType::Int);
    }

    #[test]
    fn archived_scopes_remain_searchable() {
        let mut table = SymbolTable::new();
        table.push_scope("function_f");
        table.insert(sym("local", SymbolKind::Variable));
        table.pop_scope();

        // Gone from the active stack, still resolvable.
        assert_eq!(table.active_scopes().len(), 1);
        let found = table.find("local").unwrap();
        assert_eq!(found.fqdn, "global::function_f::local");
        assert!(table.find_by_fqdn("global::function_f::local").is_some());
    }

    #[test]
    fn double_colon_routes_to_fqdn_search() {
        let mut table = SymbolTable::new();
        table.push_scope("namespace_math");
        table.insert(sym("pi", SymbolKind::Variable));
        table.pop_scope();

        assert!(table.find("global::namespace_math::pi").is_some());
        assert!(table.find("global::namespace_other::pi").is_none());
    }

    #[test]
    fn global_scope_cannot_be_popped() {
        let mut table = SymbolTable::new();
        table.pop_scope();
        assert_eq!(table.active_scopes().len(), 1);
        assert_eq!(table.current_scope_name(), "global");
    }
}
