//! Import/export symbol tables.
//!
//! A symbol is either an *entity* (one or more declarations sharing a
//! name - an overload set) or a *namespace* (a named collection of child
//! symbols). Modules expose their public surface as a namespace of
//! exports and accumulate what they import as a namespace of imports.
//!
//! Symbols are stored in a context-wide arena so a module can reference
//! another module's exported symbols directly.

use sable_common::Atom;
use smallvec::SmallVec;

use crate::node::DeclRef;

/// Handle to a symbol in the context-wide [`SymbolArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// What a symbol stands for.
#[derive(Clone, Debug)]
pub enum SymbolKind {
    /// One or more declarations of the same name (an overload set).
    Entity(SmallVec<[DeclRef; 2]>),
    /// A named collection of child symbols.
    Namespace(Vec<SymbolId>),
}

/// An entry in a module's import or export table.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: Atom,
    pub kind: SymbolKind,
}

impl Symbol {
    #[must_use]
    pub const fn is_namespace(&self) -> bool {
        matches!(self.kind, SymbolKind::Namespace(_))
    }

    #[must_use]
    pub const fn is_entity(&self) -> bool {
        matches!(self.kind, SymbolKind::Entity(_))
    }
}

/// Context-wide symbol storage.
#[derive(Debug, Default)]
pub struct SymbolArena {
    symbols: Vec<Symbol>,
}

impl SymbolArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(u32::try_from(self.symbols.len()).unwrap_or(u32::MAX));
        self.symbols.push(symbol);
        id
    }

    /// Create an empty entity symbol.
    pub fn create_entity(&mut self, name: Atom) -> SymbolId {
        self.push(Symbol {
            name,
            kind: SymbolKind::Entity(SmallVec::new()),
        })
    }

    /// Create an empty namespace symbol.
    pub fn create_namespace(&mut self, name: Atom) -> SymbolId {
        self.push(Symbol {
            name,
            kind: SymbolKind::Namespace(Vec::new()),
        })
    }

    #[must_use]
    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    /// Append a declaration to an entity symbol.
    pub fn add_decl(&mut self, id: SymbolId, decl: DeclRef) {
        match &mut self.get_mut(id).kind {
            SymbolKind::Entity(decls) => decls.push(decl),
            SymbolKind::Namespace(_) => {
                debug_assert!(false, "add_decl on a namespace symbol");
            }
        }
    }

    /// Append a child symbol to a namespace symbol.
    pub fn add_child(&mut self, ns: SymbolId, child: SymbolId) {
        match &mut self.get_mut(ns).kind {
            SymbolKind::Namespace(children) => children.push(child),
            SymbolKind::Entity(_) => {
                debug_assert!(false, "add_child on an entity symbol");
            }
        }
    }

    /// Find a direct child of a namespace by name. Linear scan; child
    /// lists stay small and insertion-ordered.
    #[must_use]
    pub fn lookup(&self, ns: SymbolId, name: Atom) -> Option<SymbolId> {
        match &self.get(ns).kind {
            SymbolKind::Namespace(children) => children
                .iter()
                .copied()
                .find(|&child| self.get(child).name == name),
            SymbolKind::Entity(_) => None,
        }
    }

    /// Children of a namespace symbol, in insertion order.
    #[must_use]
    pub fn children(&self, ns: SymbolId) -> &[SymbolId] {
        match &self.get(ns).kind {
            SymbolKind::Namespace(children) => children,
            SymbolKind::Entity(_) => &[],
        }
    }

    /// Declarations of an entity symbol, in insertion order.
    #[must_use]
    pub fn decls(&self, id: SymbolId) -> &[DeclRef] {
        match &self.get(id).kind {
            SymbolKind::Entity(decls) => decls,
            SymbolKind::Namespace(_) => &[],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ModuleId, NodeIndex};

    #[test]
    fn entities_accumulate_overloads() {
        let mut symbols = SymbolArena::new();
        let id = symbols.create_entity(Atom(3));
        symbols.add_decl(id, DeclRef::new(ModuleId(0), NodeIndex(1)));
        symbols.add_decl(id, DeclRef::new(ModuleId(0), NodeIndex(2)));
        assert_eq!(symbols.decls(id).len(), 2);
    }

    #[test]
    fn namespace_lookup_finds_children_by_name() {
        let mut symbols = SymbolArena::new();
        let ns = symbols.create_namespace(Atom(1));
        let child = symbols.create_entity(Atom(2));
        symbols.add_child(ns, child);

        assert_eq!(symbols.lookup(ns, Atom(2)), Some(child));
        assert_eq!(symbols.lookup(ns, Atom(9)), None);
    }
}
