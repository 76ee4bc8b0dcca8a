//! Lexical scopes.
//!
//! A scope carries two disjoint name-sets - values and types - plus a
//! parent link and a "function scope" flag. A name maps to the ordered
//! list of declarations sharing it (overload sets accumulate in
//! insertion order). Scopes live in the owning module and are addressed
//! by [`ScopeId`].

use rustc_hash::FxHashMap;
use sable_common::Atom;
use smallvec::SmallVec;

use crate::node::NodeIndex;

/// Index of a scope within its module's scope arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// The namespace a name is declared in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Namespace {
    Value,
    Type,
}

/// A lexical scope.
#[derive(Debug, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    /// Function bodies open a function scope; `return` resolves against
    /// the nearest one.
    pub is_function_scope: bool,
    values: FxHashMap<Atom, SmallVec<[NodeIndex; 1]>>,
    types: FxHashMap<Atom, SmallVec<[NodeIndex; 1]>>,
}

impl Scope {
    #[must_use]
    pub fn new(parent: Option<ScopeId>) -> Self {
        Scope {
            parent,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn function(parent: Option<ScopeId>) -> Self {
        Scope {
            parent,
            is_function_scope: true,
            ..Default::default()
        }
    }

    fn set(&mut self, ns: Namespace) -> &mut FxHashMap<Atom, SmallVec<[NodeIndex; 1]>> {
        match ns {
            Namespace::Value => &mut self.values,
            Namespace::Type => &mut self.types,
        }
    }

    fn set_ref(&self, ns: Namespace) -> &FxHashMap<Atom, SmallVec<[NodeIndex; 1]>> {
        match ns {
            Namespace::Value => &self.values,
            Namespace::Type => &self.types,
        }
    }

    /// Declare `name` in the given namespace. Duplicate names accumulate
    /// into an overload list.
    pub fn declare(&mut self, ns: Namespace, name: Atom, node: NodeIndex) {
        self.set(ns).entry(name).or_default().push(node);
    }

    /// Declarations of `name` in this scope only, in insertion order.
    #[must_use]
    pub fn lookup_local(&self, ns: Namespace, name: Atom) -> &[NodeIndex] {
        self.set_ref(ns).get(&name).map_or(&[], |v| v.as_slice())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_and_type_namespaces_are_disjoint() {
        let mut scope = Scope::new(None);
        scope.declare(Namespace::Value, Atom(1), NodeIndex(10));
        assert_eq!(scope.lookup_local(Namespace::Value, Atom(1)), &[NodeIndex(10)]);
        assert!(scope.lookup_local(Namespace::Type, Atom(1)).is_empty());
    }

    #[test]
    fn overloads_accumulate_in_order() {
        let mut scope = Scope::new(None);
        scope.declare(Namespace::Value, Atom(2), NodeIndex(5));
        scope.declare(Namespace::Value, Atom(2), NodeIndex(9));
        assert_eq!(
            scope.lookup_local(Namespace::Value, Atom(2)),
            &[NodeIndex(5), NodeIndex(9)]
        );
    }
}
