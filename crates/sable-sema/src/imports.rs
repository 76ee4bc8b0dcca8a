//! Import resolution and symbol-table construction (analysis steps 1
//! and 2).
//!
//! Step 1 walks every module's import declarations, resolves each
//! referenced module path to an existing or newly loaded module, and
//! records the edges in the import dependency graph. Nothing else
//! happens in that step.
//!
//! Step 2 runs in import dependency order and builds each module's
//! `imports` and `exports` namespaces: whole-module imports become
//! namespace symbols holding a shallow copy of the referenced module's
//! exports; wildcard and path queries copy or share individual symbols;
//! exported declarations accumulate into entity symbols (overload
//! sets). Top-level declarations are also entered into the module's
//! root scope here.

use sable_common::Atom;
use sable_syntax::{
    DeclRef, ImportQuery, ModuleId, Namespace, NodeData, NodeIndex, SymbolId, SymbolKind,
};
use tracing::debug;

use crate::context::ModuleLoader;
use crate::Sema;

impl<'a> Sema<'a> {
    // ========================================================================
    // Step 1: import resolution
    // ========================================================================

    pub(crate) fn resolve_all_imports(&mut self, loader: &mut dyn ModuleLoader) {
        let mut worklist = self.ctx.module_ids();
        while let Some(module) = worklist.pop() {
            if self.ctx.module(module).imports_resolved {
                continue;
            }
            self.ctx.module_mut(module).imports_resolved = true;
            self.ctx.import_graph.ensure_tracked(module);

            let top_level = self.ctx.module(module).top_level.clone();
            for node in top_level {
                if let Some(referenced) = self.resolve_import_decl(module, node, loader) {
                    self.ctx.import_graph.add_dependency(module, referenced);
                    worklist.push(referenced);
                }
            }
        }
    }

    /// Resolve one import declaration to a module reference. Returns the
    /// referenced module when resolution succeeds.
    fn resolve_import_decl(
        &mut self,
        module: ModuleId,
        node: NodeIndex,
        loader: &mut dyn ModuleLoader,
    ) -> Option<ModuleId> {
        let (module_name, name_is_identifier) = match &self.ctx.module(module).arena.get(node).data
        {
            NodeData::Import {
                module_name,
                name_is_identifier,
                ..
            } => (*module_name, *name_is_identifier),
            _ => return None,
        };

        let location = self.ctx.location(module, node);
        if name_is_identifier {
            self.ctx.module_mut(module).arena.get_mut(node).set_errored();
            self.ctx.diag.error(
                location,
                "Currently, module names cannot be identifiers; this syntax is reserved for future features.",
            );
            return None;
        }

        let name = self.ctx.strings.resolve(module_name).to_string();
        let mut referenced = None;
        if let Some(source) = self.ctx.sources.find_by_name(&name).map(|f| f.id) {
            referenced = self.ctx.module_for_source(source);
        }
        if referenced.is_none() {
            referenced = loader.load(self.ctx, module, &name);
        }

        let Some(referenced) = referenced else {
            self.ctx.module_mut(module).arena.get_mut(node).set_errored();
            self.ctx.diag.error(
                location,
                format!("Cannot find module file to import: '{name}'"),
            );
            return None;
        };

        match &mut self.ctx.module_mut(module).arena.get_mut(node).data {
            NodeData::Import {
                referenced_module, ..
            } => *referenced_module = Some(referenced),
            _ => unreachable!(),
        }
        debug!(importer = module.0, referenced = referenced.0, "import resolved");
        Some(referenced)
    }

    // ========================================================================
    // Step 2: symbol tables
    // ========================================================================

    pub(crate) fn build_symbol_tables(&mut self, module: ModuleId) {
        debug_assert!(self.ctx.module(module).imports.is_none());
        let imports = self.ctx.symbols.create_namespace(Atom::EMPTY);
        let exports = self.ctx.symbols.create_namespace(Atom::EMPTY);
        self.ctx.module_mut(module).imports = Some(imports);
        self.ctx.module_mut(module).exports = Some(exports);

        let top_level = self.ctx.module(module).top_level.clone();
        for node in top_level {
            if self.ctx.module(module).arena.get(node).is_errored() {
                continue;
            }
            let data = self.ctx.module(module).arena.get(node).data.clone();
            match data {
                NodeData::Import {
                    module_name,
                    alias,
                    queries,
                    attrs,
                    referenced_module,
                    ..
                } => {
                    let Some(referenced) = referenced_module else {
                        continue;
                    };
                    let is_export_import =
                        attrs.linkage == sable_common::Linkage::Exported;
                    if queries.is_empty() {
                        self.import_whole_module(
                            module,
                            node,
                            referenced,
                            module_name,
                            alias,
                            is_export_import,
                        );
                    } else {
                        for query in &queries {
                            self.resolve_import_query(module, referenced, query, is_export_import);
                        }
                    }
                    // Imports are fully handled here; nothing analyses
                    // them later.
                    self.ctx.module_mut(module).arena.get_mut(node).state =
                        sable_syntax::SemaState::Done;
                }
                _ => {
                    self.declare_top_level(module, node, &data);
                }
            }
        }
    }

    /// A whole-module import: create (or re-export) a namespace symbol
    /// named after the alias or the file name, holding a shallow copy of
    /// the referenced module's exports.
    fn import_whole_module(
        &mut self,
        module: ModuleId,
        node: NodeIndex,
        referenced: ModuleId,
        module_name: Atom,
        alias: Option<Atom>,
        is_export_import: bool,
    ) {
        let location = self.ctx.location(module, node);
        let name = match alias {
            Some(alias) => alias,
            None => match self.derive_module_alias(module_name) {
                Some(name) => name,
                None => {
                    let raw = self.ctx.strings.resolve(module_name).to_string();
                    self.ctx.diag.error(
                        location,
                        format!("Module name '{raw}' does not reduce to a legal identifier."),
                    );
                    return;
                }
            },
        };

        let imports = self.ctx.module(module).imports.expect("imports namespace");
        if self.ctx.symbols.lookup(imports, name).is_some() {
            let name = self.ctx.strings.resolve(name).to_string();
            self.ctx
                .diag
                .error(location, format!("Redeclaration of name '{name}'."));
            return;
        }

        let import_scope = self.ctx.symbols.create_namespace(name);
        self.ctx.symbols.add_child(imports, import_scope);

        if is_export_import {
            let exports = self.ctx.module(module).exports.expect("exports namespace");
            debug_assert!(self.ctx.symbols.lookup(exports, name).is_none());
            self.ctx.symbols.add_child(exports, import_scope);
        }

        // Shallow-copy the referenced module's exports into the new
        // namespace.
        if let Some(referenced_exports) = self.ctx.module(referenced).exports {
            let children = self.ctx.symbols.children(referenced_exports).to_vec();
            for child in children {
                self.ctx.symbols.add_child(import_scope, child);
            }
        }
    }

    /// Derive the import alias from a module path: strip the directory
    /// and the final extension, then validate that the rest is a legal
    /// identifier.
    fn derive_module_alias(&mut self, module_name: Atom) -> Option<Atom> {
        let raw = self.ctx.strings.resolve(module_name);
        let base = raw.rsplit('/').next().unwrap_or(raw);
        let stem = match base.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem,
            _ => base,
        };
        if !is_identifier(stem) {
            return None;
        }
        let stem = stem.to_string();
        Some(self.ctx.strings.intern(&stem))
    }

    /// Resolve one import query against the referenced module's exports.
    fn resolve_import_query(
        &mut self,
        module: ModuleId,
        referenced: ModuleId,
        query: &ImportQuery,
        is_export: bool,
    ) {
        let location = sable_common::Location::new(self.ctx.module(module).source, query.span);
        let Some(search_namespace) = self.ctx.module(referenced).exports else {
            return;
        };

        if query.is_wildcard {
            let children = self.ctx.symbols.children(search_namespace).to_vec();
            for child in children {
                let name = self.ctx.symbols.get(child).name;
                self.merge_symbol_into_imports(module, child, name, location, "Wildcard");
                if is_export {
                    self.merge_symbol_into_exports(module, child, name, location);
                }
            }
            return;
        }

        debug_assert!(!query.pieces.is_empty());
        let mut current = search_namespace;
        for (i, &piece) in query.pieces.iter().enumerate() {
            let Some(found) = self.ctx.symbols.lookup(current, piece) else {
                let piece = self.ctx.strings.resolve(piece).to_string();
                self.ctx.diag.error(
                    location,
                    format!("No exported symbol '{piece}' in the imported module."),
                );
                return;
            };
            if i + 1 < query.pieces.len() && !self.ctx.symbols.get(found).is_namespace() {
                let piece = self.ctx.strings.resolve(piece).to_string();
                self.ctx
                    .diag
                    .error(location, format!("'{piece}' is not a namespace."));
                return;
            }
            current = found;
        }

        let result_name = query
            .alias
            .unwrap_or_else(|| *query.pieces.last().expect("non-empty query path"));
        let symbol = if self.ctx.symbols.get(current).name == result_name {
            current
        } else {
            self.shallow_copy_symbol(current, result_name)
        };

        self.merge_symbol_into_imports(module, symbol, result_name, location, "Query");
        if is_export {
            self.merge_symbol_into_exports(module, symbol, result_name, location);
        }
    }

    /// Clone a symbol under a new name, sharing its contents.
    fn shallow_copy_symbol(&mut self, symbol: SymbolId, name: Atom) -> SymbolId {
        match self.ctx.symbols.get(symbol).kind.clone() {
            SymbolKind::Entity(decls) => {
                let copy = self.ctx.symbols.create_entity(name);
                for decl in decls {
                    self.ctx.symbols.add_decl(copy, decl);
                }
                copy
            }
            SymbolKind::Namespace(children) => {
                let copy = self.ctx.symbols.create_namespace(name);
                for child in children {
                    self.ctx.symbols.add_child(copy, child);
                }
                copy
            }
        }
    }

    fn merge_symbol_into_imports(
        &mut self,
        module: ModuleId,
        symbol: SymbolId,
        name: Atom,
        location: sable_common::Location,
        what: &str,
    ) {
        let imports = self.ctx.module(module).imports.expect("imports namespace");
        match self.ctx.symbols.lookup(imports, name) {
            None => self.ctx.symbols.add_child(imports, symbol),
            Some(existing) => {
                let name_str = self.ctx.strings.resolve(name).to_string();
                if self.ctx.symbols.get(symbol).is_namespace() {
                    self.ctx.diag.error(
                        location,
                        format!(
                            "{what} imports symbol '{name_str}', which is a namespace. This symbol has already been declared, and namespace names cannot be overloaded."
                        ),
                    );
                } else if self.ctx.symbols.get(existing).is_namespace() {
                    self.ctx.diag.error(
                        location,
                        format!(
                            "{what} imports symbol '{name_str}', which was previously imported as a namespace. Namespace names cannot be overloaded."
                        ),
                    );
                } else {
                    let decls = self.ctx.symbols.decls(symbol).to_vec();
                    for decl in decls {
                        self.ctx.symbols.add_decl(existing, decl);
                    }
                }
            }
        }
    }

    fn merge_symbol_into_exports(
        &mut self,
        module: ModuleId,
        symbol: SymbolId,
        name: Atom,
        location: sable_common::Location,
    ) {
        let exports = self.ctx.module(module).exports.expect("exports namespace");
        match self.ctx.symbols.lookup(exports, name) {
            None => self.ctx.symbols.add_child(exports, symbol),
            Some(existing) => {
                if self.ctx.symbols.get(existing).is_namespace()
                    || self.ctx.symbols.get(symbol).is_namespace()
                {
                    let name = self.ctx.strings.resolve(name).to_string();
                    self.ctx.diag.error(
                        location,
                        format!("Redeclaration of symbol '{name}', previously declared as a namespace."),
                    );
                } else {
                    let decls = self.ctx.symbols.decls(symbol).to_vec();
                    for decl in decls {
                        self.ctx.symbols.add_decl(existing, decl);
                    }
                }
            }
        }
    }

    /// Enter a non-import top-level declaration into the module's root
    /// scope and, when exported, into its exports namespace.
    fn declare_top_level(&mut self, module: ModuleId, node: NodeIndex, data: &NodeData) {
        let Some(name) = data.declared_name() else {
            return;
        };

        let namespace = match data {
            NodeData::Function { .. } | NodeData::Binding { .. } => Namespace::Value,
            NodeData::Struct { .. } | NodeData::Enum { .. } | NodeData::Alias { .. } => {
                Namespace::Type
            }
            _ => return,
        };

        let root = self.ctx.module(module).root_scope;
        self.ctx
            .module_mut(module)
            .scope_mut(root)
            .declare(namespace, name, node);

        let exported = data
            .attrs()
            .is_some_and(|attrs| attrs.linkage == sable_common::Linkage::Exported);
        if !exported {
            return;
        }

        let exports = self.ctx.module(module).exports.expect("exports namespace");
        let entity = match self.ctx.symbols.lookup(exports, name) {
            Some(existing) if existing != exports => {
                if self.ctx.symbols.get(existing).is_namespace() {
                    let location = self.ctx.location(module, node);
                    let name = self.ctx.strings.resolve(name).to_string();
                    self.ctx.diag.error(
                        location,
                        format!("Redeclaration of symbol '{name}', previously declared as a namespace."),
                    );
                    return;
                }
                existing
            }
            _ => {
                let entity = self.ctx.symbols.create_entity(name);
                self.ctx.symbols.add_child(exports, entity);
                entity
            }
        };
        self.ctx
            .symbols
            .add_decl(entity, DeclRef::new(module, node));
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
