//! Modules (translation units).
//!
//! A module owns its node arena, its scopes and its top-level
//! declaration list. Its import and export tables are namespace symbols
//! in the context-wide symbol arena, created during symbol-table
//! construction.

use sable_common::{Arena, SourceId};

use crate::node::{ModuleId, NodeArena, NodeIndex};
use crate::scope::{Namespace, Scope, ScopeId};
use crate::symbol::SymbolId;

/// A translation unit derived from a single source file.
#[derive(Debug)]
pub struct Module {
    pub id: ModuleId,
    pub source: SourceId,
    pub arena: NodeArena,
    scopes: Arena<Scope>,
    /// The module-level scope; every other scope chains up to it.
    pub root_scope: ScopeId,
    pub top_level: Vec<NodeIndex>,
    /// Namespace symbol of everything this module imports.
    pub imports: Option<SymbolId>,
    /// Namespace symbol of everything this module exports.
    pub exports: Option<SymbolId>,
    /// Import declarations have been resolved to module references.
    pub imports_resolved: bool,
    /// Top-level dependency edges have been generated.
    pub dependencies_generated: bool,
}

impl Module {
    #[must_use]
    pub fn new(id: ModuleId, source: SourceId) -> Self {
        let mut scopes = Arena::new();
        let root = ScopeId(u32::try_from(scopes.insert(Scope::new(None))).unwrap_or(u32::MAX));
        Module {
            id,
            source,
            arena: NodeArena::new(),
            scopes,
            root_scope: root,
            top_level: Vec::new(),
            imports: None,
            exports: None,
            imports_resolved: false,
            dependencies_generated: false,
        }
    }

    /// Open a new scope under `parent`.
    pub fn push_scope(&mut self, parent: ScopeId, is_function_scope: bool) -> ScopeId {
        let scope = if is_function_scope {
            Scope::function(Some(parent))
        } else {
            Scope::new(Some(parent))
        };
        ScopeId(u32::try_from(self.scopes.insert(scope)).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        self.scopes
            .get(id.0 as usize)
            .expect("scope id from another module")
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        self.scopes
            .get_mut(id.0 as usize)
            .expect("scope id from another module")
    }

    /// Walk the scope chain from `scope` looking up `name`, returning the
    /// declarations of the innermost scope that has any.
    #[must_use]
    pub fn lookup(&self, scope: ScopeId, ns: Namespace, name: sable_common::Atom) -> &[NodeIndex] {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            let found = s.lookup_local(ns, name);
            if !found.is_empty() {
                return found;
            }
            current = s.parent;
        }
        &[]
    }
}
