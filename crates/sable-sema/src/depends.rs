//! Dependency generation over top-level declarations (analysis step 3),
//! and the name-lookup helper shared with expression analysis.
//!
//! Every top-level declaration becomes a node in the declaration
//! dependency graph; edges are added for each named type reference in
//! declared types, struct field types and defaults. Lookup failures are
//! reported but never abort the walk.

use sable_common::{Atom, Location};
use sable_syntax::{
    DeclRef, ModuleId, Namespace, NodeData, NodeIndex, ScopeId, TypeExpr,
};
use smallvec::SmallVec;

use crate::Sema;

impl<'a> Sema<'a> {
    // ========================================================================
    // Step 3: dependency generation
    // ========================================================================

    pub(crate) fn generate_dependencies(&mut self, module: ModuleId) {
        if self.ctx.module(module).dependencies_generated {
            return;
        }

        let top_level = self.ctx.module(module).top_level.clone();
        for node in top_level {
            let decl = DeclRef::new(module, node);
            let data = self.ctx.module(module).arena.get(node).data.clone();
            match data {
                NodeData::Import { .. } => {}
                NodeData::Binding { type_expr, .. } => {
                    self.ctx.decl_graph.ensure_tracked(decl);
                    self.add_type_expr_dependencies(module, decl, type_expr);
                }
                NodeData::Function {
                    params,
                    return_type,
                    ..
                } => {
                    self.ctx.decl_graph.ensure_tracked(decl);
                    self.add_type_expr_dependencies(module, decl, return_type);
                    for param in params {
                        if let NodeData::Parameter { type_expr, .. } =
                            self.ctx.module(module).arena.get(param).data.clone()
                        {
                            self.add_type_expr_dependencies(module, decl, type_expr);
                        }
                    }
                }
                NodeData::Struct { fields, variants, .. } => {
                    self.ctx.decl_graph.ensure_tracked(decl);
                    self.add_struct_dependencies(module, decl, &fields, &variants);
                }
                NodeData::Enum { underlying, .. } => {
                    self.ctx.decl_graph.ensure_tracked(decl);
                    if let Some(underlying) = underlying {
                        self.add_type_expr_dependencies(module, decl, underlying);
                    }
                }
                NodeData::Alias { type_expr, .. } => {
                    self.ctx.decl_graph.ensure_tracked(decl);
                    self.add_type_expr_dependencies(module, decl, type_expr);
                }
                NodeData::Test { .. } => {
                    self.ctx.decl_graph.ensure_tracked(decl);
                }
                _ => {}
            }
        }

        self.ctx.module_mut(module).dependencies_generated = true;
    }

    fn add_struct_dependencies(
        &mut self,
        module: ModuleId,
        decl: DeclRef,
        fields: &[NodeIndex],
        variants: &[NodeIndex],
    ) {
        for &field in fields {
            if let NodeData::StructField { type_expr, .. } =
                self.ctx.module(module).arena.get(field).data.clone()
            {
                self.add_type_expr_dependencies(module, decl, type_expr);
            }
        }
        for &variant in variants {
            if let NodeData::Struct { fields, variants, .. } =
                self.ctx.module(module).arena.get(variant).data.clone()
            {
                self.add_struct_dependencies(module, decl, &fields, &variants);
            }
        }
    }

    /// Add an edge `dep_parent -> referenced declaration` for every
    /// named type reachable from a type expression.
    fn add_type_expr_dependencies(
        &mut self,
        module: ModuleId,
        dep_parent: DeclRef,
        type_node: NodeIndex,
    ) {
        let expr = match &self.ctx.module(module).arena.get(type_node).data {
            NodeData::TypeExpr { expr, .. } => expr.clone(),
            // Value expressions in type position carry no type deps.
            _ => return,
        };

        match expr {
            TypeExpr::Infer
            | TypeExpr::Void
            | TypeExpr::Noreturn
            | TypeExpr::Bool
            | TypeExpr::Int { .. }
            | TypeExpr::Float { .. } => {}
            TypeExpr::Nilable { elem }
            | TypeExpr::Slice { elem }
            | TypeExpr::Reference { elem, .. }
            | TypeExpr::Pointer { elem, .. }
            | TypeExpr::Buffer { elem, .. } => {
                self.add_type_expr_dependencies(module, dep_parent, elem);
            }
            TypeExpr::Array { elem, .. } => {
                self.add_type_expr_dependencies(module, dep_parent, elem);
            }
            TypeExpr::ErrorPair { value, error } => {
                self.add_type_expr_dependencies(module, dep_parent, value);
                self.add_type_expr_dependencies(module, dep_parent, error);
            }
            TypeExpr::Function {
                return_type,
                params,
                ..
            } => {
                self.add_type_expr_dependencies(module, dep_parent, return_type);
                for param in params {
                    self.add_type_expr_dependencies(module, dep_parent, param);
                }
            }
            TypeExpr::Nameref { pieces, .. } => {
                let location = self.ctx.location(module, type_node);
                let scope = self.ctx.module(module).root_scope;
                if let Some(decls) =
                    self.lookup_declaration(module, scope, &pieces, Namespace::Type, location)
                {
                    for referenced in decls {
                        self.ctx.decl_graph.add_dependency(dep_parent, referenced);
                    }
                } else {
                    self.ctx
                        .module_mut(module)
                        .arena
                        .get_mut(type_node)
                        .set_errored();
                }
            }
        }
    }

    // ========================================================================
    // Name lookup
    // ========================================================================

    /// Look a (possibly dotted) name up: single identifiers walk the
    /// scope chain first and fall back to the module's imports; dotted
    /// paths walk namespace symbols in the imports table. Failures are
    /// reported here and return `None`.
    pub(crate) fn lookup_declaration(
        &mut self,
        module: ModuleId,
        scope: ScopeId,
        pieces: &[Atom],
        ns: Namespace,
        location: Location,
    ) -> Option<SmallVec<[DeclRef; 2]>> {
        debug_assert!(!pieces.is_empty());

        if pieces.len() == 1 {
            let found = self.ctx.module(module).lookup(scope, ns, pieces[0]);
            if !found.is_empty() {
                return Some(
                    found
                        .iter()
                        .map(|&node| DeclRef::new(module, node))
                        .collect(),
                );
            }
        }

        // Fall back to the module's imports.
        let Some(imports) = self.ctx.module(module).imports else {
            let name = self.ctx.strings.resolve(pieces[0]).to_string();
            self.ctx.diag.error(
                location,
                format!("Unable to resolve identifier '{name}' in this context."),
            );
            return None;
        };

        let mut search_namespace = imports;
        for (i, &piece) in pieces.iter().enumerate() {
            let Some(matching) = self.ctx.symbols.lookup(search_namespace, piece) else {
                let name = self.ctx.strings.resolve(piece).to_string();
                self.ctx.diag.error(
                    location,
                    format!("Unable to resolve identifier '{name}' in this context."),
                );
                return None;
            };

            if self.ctx.symbols.get(matching).is_entity() {
                if i + 1 == pieces.len() {
                    return Some(self.ctx.symbols.decls(matching).iter().copied().collect());
                }
                let name = self.ctx.strings.resolve(piece).to_string();
                self.ctx.diag.error(
                    location,
                    format!("Entity '{name}' is not a namespace in this context."),
                );
                return None;
            }
            search_namespace = matching;
        }

        // The path ended on a namespace, which is not a value or a type.
        let name = self
            .ctx
            .strings
            .resolve(*pieces.last().expect("non-empty path"))
            .to_string();
        self.ctx.diag.error(
            location,
            format!("'{name}' is a namespace and cannot be used here."),
        );
        None
    }
}
