//! Declared-type resolution (analysis step 4).
//!
//! In topological order, each top-level declaration gets its *declared*
//! type resolved - bodies wait for step 5. Struct types are materialised
//! here: field types resolve, field defaults evaluate to constants,
//! nested variants build recursively, and layout caches size/align.
//! Function declared types are assembled from the return and parameter
//! types; a function named exactly `main` with no explicit foreign name
//! acquires the C calling convention and exported linkage.

use sable_common::{Atom, CallConv, Linkage};
use sable_syntax::{
    DeclRef, ModuleId, Namespace, NodeData, NodeIndex, QualType, ScopeId, SemaState, StructType,
    TypeExpr, TypeId, TypeKind, ValueCategory,
};
use tracing::trace;

use crate::Sema;

impl<'a> Sema<'a> {
    pub(crate) fn resolve_top_level_type(&mut self, decl: DeclRef) {
        if self.ctx.node(decl).is_errored() {
            return;
        }
        let module = decl.module;
        let scope = self.ctx.module(module).root_scope;
        self.scope = scope;
        let data = self.ctx.node(decl).data.clone();

        match data {
            NodeData::Function {
                name,
                mut attrs,
                params,
                return_type,
                variadic,
                ..
            } => {
                let return_qt = self.resolve_type_expr(module, scope, return_type);

                let mut param_types: Vec<QualType> = Vec::with_capacity(params.len());
                for &param in &params {
                    let (type_expr, mutable) =
                        match &self.ctx.module(module).arena.get(param).data {
                            NodeData::Parameter {
                                type_expr, mutable, ..
                            } => (*type_expr, *mutable),
                            _ => continue,
                        };
                    let resolved = self.resolve_type_expr(module, scope, type_expr);
                    let qt = QualType {
                        ty: resolved.ty,
                        mutable: mutable || resolved.mutable,
                    };
                    param_types.push(qt);
                    let param_node = self.ctx.module_mut(module).arena.get_mut(param);
                    param_node.ty = qt;
                    param_node.category = ValueCategory::Lvalue;
                }

                // `main` with no foreign name gets the C ABI and is
                // visible to the linker.
                if self.ctx.strings.resolve(name) == "main" && attrs.foreign_name.is_none() {
                    attrs.calling_convention = CallConv::C;
                    attrs.linkage = Linkage::Exported;
                }
                if attrs.calling_convention == CallConv::Default {
                    attrs.calling_convention = CallConv::Sable;
                }

                let fn_type = self.ctx.types.intern(TypeKind::Function {
                    return_type: return_qt,
                    params: param_types,
                    calling_convention: attrs.calling_convention,
                    variadic,
                });

                let node = self.ctx.node_mut(decl);
                node.ty = QualType::of(fn_type);
                if let NodeData::Function { attrs: a, .. } = &mut node.data {
                    *a = attrs;
                }
                trace!(decl = ?decl, "function type resolved");
            }
            NodeData::Binding { type_expr, .. } => {
                let resolved = self.resolve_type_expr(module, scope, type_expr);
                if resolved.ty != TypeId::UNKNOWN {
                    // Bindings declare modifiable storage.
                    self.ctx.node_mut(decl).ty = QualType::of_mut(resolved.ty);
                }
            }
            NodeData::Struct {
                name,
                fields,
                variants,
                ..
            } => {
                let ty = self.build_struct_type(module, decl, name, &fields, &variants, None);
                self.ctx.decl_types.insert(decl, QualType::of(ty));
                self.ctx.node_mut(decl).ty = QualType::of(TypeId::TYPE);
            }
            NodeData::Alias {
                name,
                is_strict,
                type_expr,
                ..
            } => {
                let underlying = self.resolve_type_expr(module, scope, type_expr);
                let ty = self.ctx.types.declare(TypeKind::Alias {
                    decl,
                    name,
                    underlying,
                    strict: is_strict,
                });
                self.ctx.decl_types.insert(decl, QualType::of(ty));
                self.ctx.node_mut(decl).ty = QualType::of(TypeId::TYPE);
            }
            NodeData::Enum {
                name,
                underlying,
                variants,
                ..
            } => {
                let underlying = match underlying {
                    Some(node) => self.resolve_type_expr(module, scope, node).ty,
                    None => self.ctx.types.prims().int_,
                };
                if !variants.is_empty() {
                    let location = self.ctx.node_location(decl);
                    self.ctx
                        .diag
                        .error(location, "enum variant declarations are not supported yet");
                    self.ctx.node_mut(decl).set_errored();
                    for &variant in &variants {
                        self.ctx.module_mut(module).arena.get_mut(variant).set_errored();
                    }
                }
                let ty = self.ctx.types.declare(TypeKind::Enum {
                    decl,
                    name,
                    underlying,
                });
                self.ctx.decl_types.insert(decl, QualType::of(ty));
                self.ctx.node_mut(decl).ty = QualType::of(TypeId::TYPE);
            }
            _ => {}
        }
    }

    /// Materialise a struct type from its declaration: resolve every
    /// field, evaluate field defaults to constants, build nested
    /// variants recursively, then cache the layout.
    fn build_struct_type(
        &mut self,
        module: ModuleId,
        decl: DeclRef,
        name: Atom,
        fields: &[NodeIndex],
        variants: &[NodeIndex],
        parent: Option<TypeId>,
    ) -> TypeId {
        let scope = self.ctx.module(module).root_scope;
        let ty = self.ctx.types.declare(TypeKind::Struct(StructType {
            decl: Some(decl),
            name,
            parent,
            fields: Vec::new(),
            variants: Vec::new(),
            size_bytes: 0,
            align_bytes: 1,
        }));

        let mut field_types: Vec<(Atom, QualType)> = Vec::with_capacity(fields.len());
        for &field in fields {
            let (field_name, type_expr, initializer) =
                match &self.ctx.module(module).arena.get(field).data {
                    NodeData::StructField {
                        name,
                        type_expr,
                        initializer,
                    } => (*name, *type_expr, *initializer),
                    _ => continue,
                };

            let field_ty = self.resolve_type_expr(module, scope, type_expr);
            field_types.push((field_name, field_ty));
            let field_node = self.ctx.module_mut(module).arena.get_mut(field);
            field_node.ty = field_ty;
            field_node.state = SemaState::Done;

            if let Some(init) = initializer {
                let analysed = self.analyse_node(module, init, Some(field_ty));
                let converted = self.convert_or_error(module, analysed, field_ty);
                if self.evaluate(module, converted).is_none() {
                    let location = self.ctx.location(module, converted);
                    self.ctx.diag.error(
                        location,
                        "Struct field initialisers must be compile-time constants.",
                    );
                    self.ctx
                        .module_mut(module)
                        .arena
                        .get_mut(converted)
                        .set_errored();
                }
                if let NodeData::StructField { initializer, .. } =
                    &mut self.ctx.module_mut(module).arena.get_mut(field).data
                {
                    *initializer = Some(converted);
                }
            }
        }

        let mut variant_types: Vec<TypeId> = Vec::with_capacity(variants.len());
        for &variant in variants {
            if let NodeData::Struct {
                name: variant_name,
                fields: variant_fields,
                variants: nested,
                ..
            } = self.ctx.module(module).arena.get(variant).data.clone()
            {
                let variant_decl = DeclRef::new(module, variant);
                let variant_ty = self.build_struct_type(
                    module,
                    variant_decl,
                    variant_name,
                    &variant_fields,
                    &nested,
                    Some(ty),
                );
                self.ctx
                    .decl_types
                    .insert(variant_decl, QualType::of(variant_ty));
                let variant_node = self.ctx.module_mut(module).arena.get_mut(variant);
                variant_node.ty = QualType::of(TypeId::TYPE);
                variant_node.state = SemaState::Done;
                variant_types.push(variant_ty);
            }
        }

        let (laid_out, size_bytes, align_bytes) =
            crate::layout::compute_struct_layout(&mut self.ctx.types, &field_types);
        self.ctx
            .types
            .set_struct_layout(ty, laid_out, size_bytes, align_bytes);
        if let TypeKind::Struct(st) = self.ctx.types.kind(ty) {
            debug_assert!(st.size_bytes % st.align_bytes.max(1) == 0);
        }
        if !variant_types.is_empty() {
            // Layout replaced the field list; re-attach the variants.
            if let Some(st) = self.struct_kind_mut(ty) {
                st.variants = variant_types;
            }
        }
        ty
    }

    fn struct_kind_mut(&mut self, ty: TypeId) -> Option<&mut StructType> {
        // Small accessor to keep the borrow local.
        match self.ctx.types.kind(ty) {
            TypeKind::Struct(_) => {}
            _ => return None,
        }
        match self.ctx.types.kind_mut(ty) {
            TypeKind::Struct(st) => Some(st),
            _ => None,
        }
    }

    // ========================================================================
    // Type expressions
    // ========================================================================

    /// Resolve a syntactic type expression to a semantic type. The
    /// result is cached on the node; the node's own type becomes `TYPE`.
    pub(crate) fn resolve_type_expr(
        &mut self,
        module: ModuleId,
        scope: ScopeId,
        idx: NodeIndex,
    ) -> QualType {
        {
            let node = self.ctx.module(module).arena.get(idx);
            if node.state == SemaState::Done {
                if let NodeData::TypeExpr { resolved, .. } = &node.data {
                    return *resolved;
                }
            }
            if node.is_errored() {
                return QualType::of(TypeId::POISON);
            }
        }

        let expr = match &self.ctx.module(module).arena.get(idx).data {
            NodeData::TypeExpr { expr, .. } => expr.clone(),
            _ => {
                let location = self.ctx.location(module, idx);
                self.ctx
                    .diag
                    .error(location, "Expected a type expression here.");
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return QualType::of(TypeId::POISON);
            }
        };

        let resolved = match expr {
            TypeExpr::Infer => QualType::of(TypeId::UNKNOWN),
            TypeExpr::Void => QualType::of(TypeId::VOID),
            TypeExpr::Noreturn => QualType::of(TypeId::NORETURN),
            TypeExpr::Bool => QualType::of(self.ctx.types.prims().bool_),
            TypeExpr::Int { signed, width: 0 } => {
                let prims = self.ctx.types.prims();
                QualType::of(if signed { prims.int_ } else { prims.uint })
            }
            TypeExpr::Int { signed, width } => QualType::of(self.ctx.types.intern(TypeKind::Int {
                signed,
                width,
                platform: false,
            })),
            TypeExpr::Float { width: 0 } => QualType::of(self.ctx.types.prims().float_),
            TypeExpr::Float { width } => QualType::of(self.ctx.types.intern(TypeKind::Float {
                width,
                platform: false,
            })),
            TypeExpr::Nilable { elem } => {
                let elem = self.resolve_type_expr(module, scope, elem);
                QualType::of(self.ctx.types.intern(TypeKind::Nilable { elem }))
            }
            TypeExpr::Slice { elem } => {
                let elem = self.resolve_type_expr(module, scope, elem);
                QualType::of(self.ctx.types.intern(TypeKind::Slice { elem }))
            }
            TypeExpr::Reference { elem, elem_mutable } => {
                let elem = self.container_element(module, scope, elem, elem_mutable);
                QualType::of(self.ctx.types.intern(TypeKind::Reference { elem }))
            }
            TypeExpr::Pointer { elem, elem_mutable } => {
                let elem = self.container_element(module, scope, elem, elem_mutable);
                QualType::of(self.ctx.types.intern(TypeKind::Pointer { elem }))
            }
            TypeExpr::Buffer { elem, elem_mutable } => {
                let elem = self.container_element(module, scope, elem, elem_mutable);
                QualType::of(self.ctx.types.intern(TypeKind::Buffer { elem }))
            }
            TypeExpr::Array { elem, lengths } => {
                let elem = self.resolve_type_expr(module, scope, elem);
                let mut resolved_lengths = Vec::with_capacity(lengths.len());
                for length in lengths {
                    resolved_lengths.push(self.resolve_array_length(module, length));
                }
                QualType::of(self.ctx.types.intern(TypeKind::Array {
                    elem,
                    lengths: resolved_lengths,
                }))
            }
            TypeExpr::ErrorPair { value, error } => {
                let value = self.resolve_type_expr(module, scope, value);
                let error = self.resolve_type_expr(module, scope, error);
                QualType::of(self.ctx.types.intern(TypeKind::ErrorPair { value, error }))
            }
            TypeExpr::Function {
                return_type,
                params,
                calling_convention,
                variadic,
            } => {
                let return_type = self.resolve_type_expr(module, scope, return_type);
                let params = params
                    .iter()
                    .map(|&p| self.resolve_type_expr(module, scope, p))
                    .collect();
                let calling_convention = if calling_convention == CallConv::Default {
                    CallConv::Sable
                } else {
                    calling_convention
                };
                QualType::of(self.ctx.types.intern(TypeKind::Function {
                    return_type,
                    params,
                    calling_convention,
                    variadic,
                }))
            }
            TypeExpr::Nameref {
                pieces,
                template_args,
            } => self.resolve_type_nameref(module, scope, idx, &pieces, &template_args),
        };

        let node = self.ctx.module_mut(module).arena.get_mut(idx);
        node.ty = QualType::of(TypeId::TYPE);
        node.state = SemaState::Done;
        if let NodeData::TypeExpr { resolved: slot, .. } = &mut node.data {
            *slot = resolved;
        }
        resolved
    }

    fn container_element(
        &mut self,
        module: ModuleId,
        scope: ScopeId,
        elem: NodeIndex,
        elem_mutable: bool,
    ) -> QualType {
        let resolved = self.resolve_type_expr(module, scope, elem);
        QualType {
            ty: resolved.ty,
            mutable: elem_mutable || resolved.mutable,
        }
    }

    fn resolve_array_length(&mut self, module: ModuleId, length: NodeIndex) -> u64 {
        let analysed = self.analyse_node(module, length, None);
        match self.evaluate(module, analysed) {
            Some(sable_syntax::ConstValue::Int(v)) if v >= 0 => v as u64,
            _ => {
                let location = self.ctx.location(module, analysed);
                self.ctx.diag.error(
                    location,
                    "Array lengths must be non-negative compile-time integer constants.",
                );
                self.ctx
                    .module_mut(module)
                    .arena
                    .get_mut(analysed)
                    .set_errored();
                0
            }
        }
    }

    fn resolve_type_nameref(
        &mut self,
        module: ModuleId,
        scope: ScopeId,
        idx: NodeIndex,
        pieces: &[Atom],
        template_args: &[NodeIndex],
    ) -> QualType {
        let location = self.ctx.location(module, idx);
        let Some(decls) =
            self.lookup_declaration(module, scope, pieces, Namespace::Type, location)
        else {
            self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
            return QualType::of(TypeId::POISON);
        };
        let decl = decls[0];

        if !template_args.is_empty() {
            return self.reject_template_instantiation(module, idx, decl, template_args.len());
        }

        let data = &self.ctx.node(decl).data;
        match data {
            NodeData::Struct { .. } | NodeData::Enum { .. } | NodeData::Alias { .. } => self
                .ctx
                .decl_types
                .get(&decl)
                .copied()
                .unwrap_or(QualType::of(TypeId::POISON)),
            NodeData::TemplateTypeParam { name } => {
                let name = *name;
                if let Some(&cached) = self.ctx.decl_types.get(&decl) {
                    cached
                } else {
                    let ty = self.ctx.types.declare(TypeKind::TemplateParam { decl, name });
                    self.ctx.decl_types.insert(decl, QualType::of(ty));
                    QualType::of(ty)
                }
            }
            _ => {
                let name = self.ctx.decl_name(decl);
                self.ctx
                    .diag
                    .error(location, format!("'{name}' is not a type."));
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                QualType::of(TypeId::POISON)
            }
        }
    }

    /// Template references check arity, then fail cleanly: instantiation
    /// is not implemented.
    pub(crate) fn reject_template_instantiation(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        decl: DeclRef,
        arg_count: usize,
    ) -> QualType {
        let location = self.ctx.location(module, idx);
        let param_count = match &self.ctx.node(decl).data {
            NodeData::Function {
                template_params, ..
            }
            | NodeData::Struct {
                template_params, ..
            } => template_params.len(),
            _ => 0,
        };

        if arg_count != param_count {
            self.ctx.diag.error(
                location,
                format!("Expected {param_count} template arguments, got {arg_count}."),
            );
        } else {
            self.ctx
                .diag
                .error(location, "template instantiation is not supported yet");
        }
        self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
        QualType::of(TypeId::POISON)
    }
}
