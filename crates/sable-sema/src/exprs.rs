//! Expression analysis.
//!
//! Each expression kind determines its result type, sets its value
//! category, inserts implicit casts where an expected type differs, and
//! records evaluated constants for compile-time expressions. Failures
//! poison the node and never cascade.

use sable_common::Atom;
use sable_syntax::{
    BinaryOp, CastKind, DeclRef, ModuleId, Namespace, Node, NodeData, NodeFlags, NodeIndex,
    QualType, SemaState, TypeId, TypeKind, UnaryOp, ValueCategory,
};
use smallvec::SmallVec;

use crate::Sema;

impl<'a> Sema<'a> {
    pub(crate) fn analyse_expr(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        expected: Option<QualType>,
    ) -> NodeIndex {
        let data = self.ctx.module(module).arena.get(idx).data.clone();
        match data {
            NodeData::NameRef {
                pieces,
                template_args,
                resolved,
            } => self.analyse_name_ref(module, idx, &pieces, &template_args, resolved),
            NodeData::Member { receiver, field, .. } => {
                self.analyse_member(module, idx, receiver, field)
            }
            NodeData::Index { receiver, indices } => {
                self.analyse_index(module, idx, receiver, &indices)
            }
            NodeData::Slice {
                receiver,
                offset,
                length,
            } => self.analyse_slice(module, idx, receiver, offset, length),
            NodeData::Call { callee, args } => self.analyse_call(module, idx, callee, &args),
            NodeData::Ctor { type_expr, inits } => {
                self.analyse_ctor(module, idx, type_expr, &inits, expected)
            }
            NodeData::New { type_expr, inits } => self.analyse_new(module, idx, type_expr, &inits),
            NodeData::Delete { expr } => {
                let analysed = self.analyse_node(module, expr, None);
                if let NodeData::Delete { expr } =
                    &mut self.ctx.module_mut(module).arena.get_mut(idx).data
                {
                    *expr = analysed;
                }
                self.set_ty(module, idx, QualType::of(TypeId::VOID));
                idx
            }
            NodeData::Unary { op, operand } => self.analyse_unary(module, idx, op, operand),
            NodeData::Binary { op, lhs, rhs } => self.analyse_binary(module, idx, op, lhs, rhs),
            NodeData::Cast {
                kind,
                type_expr,
                operand,
            } => self.analyse_cast(module, idx, kind, type_expr, operand),
            NodeData::PatternMatch { value } => {
                self.analyse_node(module, value, None);
                self.report_unsupported(module, idx, "pattern matching is not supported yet");
                idx
            }
            NodeData::Unwrap { operand } => self.analyse_unwrap(module, idx, operand),
            NodeData::Try { operand } | NodeData::Catch { operand, .. } => {
                self.analyse_node(module, operand, None);
                self.report_unsupported(
                    module,
                    idx,
                    "error-propagation expressions are not supported yet",
                );
                idx
            }
            NodeData::LitBool { .. } => {
                let bool_ = self.ctx.types.prims().bool_;
                self.set_ty(module, idx, QualType::of(bool_));
                idx
            }
            NodeData::LitInt { .. } => {
                let int_ = self.ctx.types.prims().int_;
                self.set_ty(module, idx, QualType::of(int_));
                idx
            }
            NodeData::LitFloat { .. } => {
                let float_ = self.ctx.types.prims().float_;
                self.set_ty(module, idx, QualType::of(float_));
                idx
            }
            NodeData::LitString { .. } => {
                let i8 = self.ctx.types.prims().i8;
                let buffer = self.ctx.types.intern(TypeKind::Buffer {
                    elem: QualType::of(i8),
                });
                self.set_ty(module, idx, QualType::of(buffer));
                idx
            }
            NodeData::LitNil => {
                let nilable = self.ctx.types.intern(TypeKind::Nilable {
                    elem: QualType::of(TypeId::UNKNOWN),
                });
                self.set_ty(module, idx, QualType::of(nilable));
                idx
            }
            NodeData::EvaluatedConstant { .. } => idx,
            // Constructor initialisers are analysed by their constructor.
            NodeData::CtorInit { .. } => idx,
            NodeData::Sizeof { arg } | NodeData::Alignof { arg } => {
                self.analyse_node(module, arg, None);
                let uint = self.ctx.types.prims().uint;
                self.set_ty(module, idx, QualType::of(uint));
                idx
            }
            NodeData::Offsetof { arg, field } => {
                self.analyse_node(module, arg, None);
                let uint = self.ctx.types.prims().uint;
                self.set_ty(module, idx, QualType::of(uint));
                if self.evaluate(module, idx).is_none() {
                    let field = self.ctx.strings.resolve(field).to_string();
                    let location = self.ctx.location(module, idx);
                    self.ctx.diag.error(
                        location,
                        format!("offsetof requires a struct type with a field named '{field}'."),
                    );
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                }
                idx
            }
            NodeData::TemplateParamRef { .. } => {
                self.ctx.module_mut(module).arena.get_mut(idx).flags |=
                    NodeFlags::TEMPLATE_DEPENDENT;
                self.report_unsupported(module, idx, "template instantiation is not supported yet");
                idx
            }
            other => {
                let location = self.ctx.location(module, idx);
                self.ctx.diag.ice(
                    location,
                    format!("unhandled node kind in expression analysis: {other:?}"),
                );
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                idx
            }
        }
    }

    fn report_unsupported(&mut self, module: ModuleId, idx: NodeIndex, message: &str) {
        let location = self.ctx.location(module, idx);
        self.ctx.diag.error(location, message);
        self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
    }

    // ========================================================================
    // Names
    // ========================================================================

    fn analyse_name_ref(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        pieces: &[Atom],
        template_args: &[NodeIndex],
        resolved: Option<DeclRef>,
    ) -> NodeIndex {
        let location = self.ctx.location(module, idx);
        let decls: SmallVec<[DeclRef; 2]> = match resolved {
            Some(decl) => SmallVec::from_slice(&[decl]),
            None => {
                let scope = self.scope;
                match self.lookup_declaration(module, scope, pieces, Namespace::Value, location) {
                    Some(decls) => decls,
                    None => {
                        self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                        return idx;
                    }
                }
            }
        };

        if decls.len() > 1 {
            // An overload set; resolution happens at the call site.
            let span = self.ctx.module(module).arena.get(idx).span;
            let mut overloads = Node::new(
                NodeData::Overloads {
                    decls: decls.to_vec(),
                },
                span,
            );
            overloads.flags |= NodeFlags::COMPILER_GENERATED;
            overloads.state = SemaState::Done;
            let overload_set = self.ctx.types.intern(TypeKind::OverloadSet);
            overloads.ty = QualType::of(overload_set);
            let overloads_idx = self.ctx.module_mut(module).arena.add(overloads);

            let node = self.ctx.module_mut(module).arena.get_mut(idx);
            node.ty = QualType::of(overload_set);
            if let NodeData::NameRef { resolved, .. } = &mut node.data {
                *resolved = Some(DeclRef::new(module, overloads_idx));
            }
            return idx;
        }

        let decl = decls[0];
        if !template_args.is_empty() {
            self.reject_template_instantiation(module, idx, decl, template_args.len());
            return idx;
        }

        let (ty, category) = match &self.ctx.node(decl).data {
            NodeData::Binding { .. } | NodeData::Parameter { .. } => {
                (self.ctx.node(decl).ty, ValueCategory::Lvalue)
            }
            NodeData::Function { .. } => (self.ctx.node(decl).ty, ValueCategory::Rvalue),
            NodeData::Struct { .. } | NodeData::Enum { .. } | NodeData::Alias { .. } => {
                let name = self.ctx.decl_name(decl);
                self.ctx
                    .diag
                    .error(location, format!("'{name}' is a type and cannot be used as a value."));
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }
            _ => {
                let name = self.ctx.decl_name(decl);
                self.ctx
                    .diag
                    .error(location, format!("'{name}' cannot be used as a value here."));
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }
        };

        let node = self.ctx.module_mut(module).arena.get_mut(idx);
        node.ty = ty;
        node.category = category;
        if let NodeData::NameRef { resolved, .. } = &mut node.data {
            *resolved = Some(decl);
        }
        idx
    }

    // ========================================================================
    // Member access and indexing
    // ========================================================================

    fn analyse_member(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        receiver: NodeIndex,
        field: Atom,
    ) -> NodeIndex {
        let analysed = self.analyse_node(module, receiver, None);
        let receiver = self.implicit_dereference(module, analysed);
        let receiver_node = self.ctx.module(module).arena.get(receiver);
        let receiver_ty = receiver_node.ty;
        let receiver_lvalue = receiver_node.is_lvalue();

        if self.ctx.types.is_poison(receiver_ty.ty) {
            self.write_member_back(module, idx, receiver, 0);
            self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
            return idx;
        }

        let canonical = self.ctx.types.canonical(receiver_ty.ty);
        let found = match self.ctx.types.kind(canonical) {
            TypeKind::Struct(st) => st
                .fields
                .iter()
                .find(|f| !f.is_padding && f.name == field)
                .map(|f| (f.ty, f.offset_bytes)),
            _ => {
                let ty = self.ctx.display_type(receiver_ty);
                let location = self.ctx.location(module, idx);
                self.ctx.diag.error(
                    location,
                    format!("Cannot access a member of non-struct type {ty}."),
                );
                self.write_member_back(module, idx, receiver, 0);
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }
        };

        let Some((field_ty, offset)) = found else {
            let ty = self.ctx.display_type(receiver_ty);
            let field = self.ctx.strings.resolve(field).to_string();
            let location = self.ctx.location(module, idx);
            self.ctx
                .diag
                .error(location, format!("Type {ty} has no member '{field}'."));
            self.write_member_back(module, idx, receiver, 0);
            self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
            return idx;
        };

        self.write_member_back(module, idx, receiver, offset);
        let node = self.ctx.module_mut(module).arena.get_mut(idx);
        node.ty = QualType {
            ty: field_ty.ty,
            mutable: field_ty.mutable || receiver_ty.mutable,
        };
        node.category = if receiver_lvalue {
            ValueCategory::Lvalue
        } else {
            ValueCategory::Rvalue
        };
        idx
    }

    fn write_member_back(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        receiver: NodeIndex,
        offset: u64,
    ) {
        if let NodeData::Member {
            receiver: r,
            offset_bytes,
            ..
        } = &mut self.ctx.module_mut(module).arena.get_mut(idx).data
        {
            *r = receiver;
            *offset_bytes = offset;
        }
    }

    fn analyse_index(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        receiver: NodeIndex,
        indices: &[NodeIndex],
    ) -> NodeIndex {
        let analysed = self.analyse_node(module, receiver, None);
        // References to containers index through to the container.
        let mut receiver = self.lvalue_to_rvalue(module, analysed, false);
        let receiver_qt = self.ctx.module(module).arena.get(receiver).ty;
        let canonical = self.ctx.types.canonical(receiver_qt.ty);

        let int_ = self.ctx.types.prims().int_;
        let uint = self.ctx.types.prims().uint;

        let (elem, category) = match self.ctx.types.kind(canonical).clone() {
            TypeKind::Array { elem, lengths } => {
                if indices.len() != lengths.len() {
                    let location = self.ctx.location(module, idx);
                    self.ctx.diag.error(
                        location,
                        format!(
                            "Expected {} indices to this array, got {}.",
                            lengths.len(),
                            indices.len()
                        ),
                    );
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                }
                let converted = self.convert_indices(module, indices, QualType::of(int_));
                self.write_index_back(module, idx, receiver, converted);
                (
                    QualType {
                        ty: elem.ty,
                        mutable: elem.mutable || receiver_qt.mutable,
                    },
                    ValueCategory::Lvalue,
                )
            }
            TypeKind::Buffer { elem } => {
                // Buffers index as values.
                receiver = self.lvalue_to_rvalue(module, receiver, true);
                if indices.len() != 1 {
                    let location = self.ctx.location(module, idx);
                    self.ctx.diag.error(
                        location,
                        format!("Expected exactly 1 index to this buffer, got {}.", indices.len()),
                    );
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                }
                let converted = self.convert_indices(module, indices, QualType::of(uint));
                self.write_index_back(module, idx, receiver, converted);
                (elem, ValueCategory::Lvalue)
            }
            TypeKind::Slice { elem } => {
                if indices.len() != 1 {
                    let location = self.ctx.location(module, idx);
                    self.ctx.diag.error(
                        location,
                        format!("Expected exactly 1 index to this slice, got {}.", indices.len()),
                    );
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                }
                let converted = self.convert_indices(module, indices, QualType::of(uint));
                self.write_index_back(module, idx, receiver, converted);
                (elem, ValueCategory::Lvalue)
            }
            TypeKind::Poison => {
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }
            _ => {
                let ty = self.ctx.display_type(receiver_qt);
                let location = self.ctx.location(module, idx);
                self.ctx
                    .diag
                    .error(location, format!("Cannot index a value of type {ty}."));
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }
        };

        let node = self.ctx.module_mut(module).arena.get_mut(idx);
        node.ty = elem;
        node.category = category;
        idx
    }

    fn convert_indices(
        &mut self,
        module: ModuleId,
        indices: &[NodeIndex],
        to: QualType,
    ) -> Vec<NodeIndex> {
        indices
            .iter()
            .map(|&index| {
                let analysed = self.analyse_node(module, index, Some(to));
                self.convert_or_error(module, analysed, to)
            })
            .collect()
    }

    fn write_index_back(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        receiver: NodeIndex,
        indices: Vec<NodeIndex>,
    ) {
        if let NodeData::Index {
            receiver: r,
            indices: i,
        } = &mut self.ctx.module_mut(module).arena.get_mut(idx).data
        {
            *r = receiver;
            *i = indices;
        }
    }

    fn analyse_slice(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        receiver: NodeIndex,
        offset: Option<NodeIndex>,
        length: Option<NodeIndex>,
    ) -> NodeIndex {
        let analysed = self.analyse_node(module, receiver, None);
        let receiver = self.lvalue_to_rvalue(module, analysed, false);
        let receiver_qt = self.ctx.module(module).arena.get(receiver).ty;
        let canonical = self.ctx.types.canonical(receiver_qt.ty);

        let elem = match self.ctx.types.kind(canonical) {
            TypeKind::Array { elem, .. }
            | TypeKind::Buffer { elem }
            | TypeKind::Slice { elem } => *elem,
            TypeKind::Poison => {
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }
            _ => {
                let ty = self.ctx.display_type(receiver_qt);
                let location = self.ctx.location(module, idx);
                self.ctx
                    .diag
                    .error(location, format!("Cannot slice a value of type {ty}."));
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }
        };

        let uint = QualType::of(self.ctx.types.prims().uint);
        let new_offset = offset.map(|o| {
            let analysed = self.analyse_node(module, o, Some(uint));
            self.convert_or_error(module, analysed, uint)
        });
        let new_length = length.map(|l| {
            let analysed = self.analyse_node(module, l, Some(uint));
            self.convert_or_error(module, analysed, uint)
        });

        let slice = self.ctx.types.intern(TypeKind::Slice { elem });
        let node = self.ctx.module_mut(module).arena.get_mut(idx);
        if let NodeData::Slice {
            receiver: r,
            offset: o,
            length: l,
        } = &mut node.data
        {
            *r = receiver;
            *o = new_offset;
            *l = new_length;
        }
        node.ty = QualType::of(slice);
        idx
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn analyse_call(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        callee: NodeIndex,
        args: &[NodeIndex],
    ) -> NodeIndex {
        let callee = self.analyse_node(module, callee, None);
        let callee = self.lvalue_to_rvalue(module, callee, false);
        let callee_qt = self.ctx.module(module).arena.get(callee).ty;
        let mut canonical = self.ctx.types.canonical(callee_qt.ty);

        if self.ctx.module(module).arena.get(callee).is_errored() {
            self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
            return idx;
        }

        // Calling through a function pointer dereferences it.
        if let TypeKind::Pointer { elem } = self.ctx.types.kind(canonical) {
            if self.ctx.types.is_function(elem.ty) {
                canonical = self.ctx.types.canonical(elem.ty);
            }
        }

        // Overload sets pick the candidate with the cheapest conversions.
        if matches!(self.ctx.types.kind(canonical), TypeKind::OverloadSet) {
            match self.resolve_overload(module, idx, callee, args) {
                Some(fn_ty) => canonical = fn_ty,
                None => {
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                    return idx;
                }
            }
        }

        let (return_type, params, variadic) = match self.ctx.types.kind(canonical) {
            TypeKind::Function {
                return_type,
                params,
                variadic,
                ..
            } => (*return_type, params.clone(), *variadic),
            TypeKind::Poison => {
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }
            _ => {
                let ty = self.ctx.display_type(callee_qt);
                let location = self.ctx.location(module, idx);
                self.ctx
                    .diag
                    .error(location, format!("Cannot call a value of type {ty}."));
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }
        };

        let c_variadic = variadic == sable_common::Variadic::C;
        let arity_ok = if c_variadic {
            args.len() >= params.len()
        } else {
            args.len() == params.len()
        };
        if !arity_ok {
            let location = self.ctx.location(module, idx);
            self.ctx.diag.error(
                location,
                format!("Expected {} arguments to call, got {}.", params.len(), args.len()),
            );
            self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
            return idx;
        }

        let mut new_args = Vec::with_capacity(args.len());
        for (i, &arg) in args.iter().enumerate() {
            if let Some(&param_ty) = params.get(i) {
                let analysed = self.analyse_node(module, arg, Some(param_ty));
                new_args.push(self.convert_or_error(module, analysed, param_ty));
            } else {
                let analysed = self.analyse_node(module, arg, None);
                new_args.push(self.convert_to_c_varargs_or_error(module, analysed));
            }
        }

        let node = self.ctx.module_mut(module).arena.get_mut(idx);
        if let NodeData::Call { callee: c, args: a } = &mut node.data {
            *c = callee;
            *a = new_args;
        }
        node.ty = return_type.as_immutable();
        node.category = ValueCategory::Rvalue;
        idx
    }

    /// Pick the overload whose parameters the arguments convert to most
    /// cheaply. Returns the chosen function type.
    fn resolve_overload(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        callee: NodeIndex,
        args: &[NodeIndex],
    ) -> Option<TypeId> {
        let overloads = self.overload_decls(module, callee)?;

        let mut best: Option<(i32, TypeId, DeclRef)> = None;
        let mut ambiguous = false;
        for decl in overloads {
            let fn_ty = self.ctx.node(decl).ty.ty;
            let (params, variadic) = match self.ctx.types.kind(self.ctx.types.canonical(fn_ty)) {
                TypeKind::Function {
                    params, variadic, ..
                } => (params.clone(), *variadic),
                _ => continue,
            };

            let arity_ok = if variadic == sable_common::Variadic::C {
                args.len() >= params.len()
            } else {
                args.len() == params.len()
            };
            if !arity_ok {
                continue;
            }

            let mut total = 0;
            let mut viable = true;
            for (i, &arg) in args.iter().enumerate() {
                let Some(&param_ty) = params.get(i) else {
                    continue;
                };
                // Arguments must be analysed before they can be scored.
                let analysed = self.analyse_node(module, arg, None);
                let score = self.convert_score(module, analysed, param_ty);
                if score < 0 {
                    viable = false;
                    break;
                }
                total += score;
            }
            if !viable {
                continue;
            }

            match best {
                None => best = Some((total, self.ctx.types.canonical(fn_ty), decl)),
                Some((best_score, ..)) if total < best_score => {
                    ambiguous = false;
                    best = Some((total, self.ctx.types.canonical(fn_ty), decl));
                }
                Some((best_score, ..)) if total == best_score => ambiguous = true,
                Some(_) => {}
            }
        }

        let location = self.ctx.location(module, idx);
        match best {
            None => {
                self.ctx
                    .diag
                    .error(location, "No overload matches this call.");
                None
            }
            Some(_) if ambiguous => {
                self.ctx
                    .diag
                    .error(location, "Call to overloaded function is ambiguous.");
                None
            }
            Some((_, fn_ty, decl)) => {
                // Rebind the callee to the chosen declaration.
                let callee_node = self.ctx.module_mut(module).arena.get_mut(callee);
                callee_node.ty = QualType::of(fn_ty);
                if let NodeData::NameRef { resolved, .. } = &mut callee_node.data {
                    *resolved = Some(decl);
                }
                Some(fn_ty)
            }
        }
    }

    fn overload_decls(&self, module: ModuleId, callee: NodeIndex) -> Option<Vec<DeclRef>> {
        let resolved = match &self.ctx.module(module).arena.get(callee).data {
            NodeData::NameRef { resolved, .. } => (*resolved)?,
            _ => return None,
        };
        match &self.ctx.node(resolved).data {
            NodeData::Overloads { decls } => Some(decls.clone()),
            _ => None,
        }
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    fn analyse_ctor(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        type_expr: Option<NodeIndex>,
        inits: &[NodeIndex],
        expected: Option<QualType>,
    ) -> NodeIndex {
        let target = match type_expr {
            Some(te) => {
                let scope = self.scope;
                let resolved = self.resolve_type_expr(module, scope, te);
                if resolved.ty == TypeId::UNKNOWN {
                    expected.unwrap_or(QualType::of(TypeId::UNKNOWN))
                } else {
                    resolved
                }
            }
            None => expected.unwrap_or(QualType::of(TypeId::UNKNOWN)),
        };

        if target.ty == TypeId::UNKNOWN {
            self.report_unsupported(
                module,
                idx,
                "Cannot infer the constructed type in this position.",
            );
            return idx;
        }
        if self.ctx.types.is_poison(target.ty) {
            self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
            return idx;
        }

        let canonical = self.ctx.types.canonical(target.ty);
        let fields: Vec<(QualType, u64)> = match self.ctx.types.kind(canonical) {
            TypeKind::Struct(st) => st
                .fields
                .iter()
                .filter(|f| !f.is_padding)
                .map(|f| (f.ty, f.offset_bytes))
                .collect(),
            _ => {
                let ty = self.ctx.display_type(target);
                let location = self.ctx.location(module, idx);
                self.ctx
                    .diag
                    .error(location, format!("Cannot construct a value of type {ty}."));
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }
        };

        if inits.len() > fields.len() {
            let location = self.ctx.location(module, idx);
            self.ctx.diag.error(
                location,
                format!(
                    "Expected at most {} initialisers, got {}.",
                    fields.len(),
                    inits.len()
                ),
            );
            self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
        }

        for (i, &init) in inits.iter().enumerate() {
            let (designator, value) = match &self.ctx.module(module).arena.get(init).data {
                NodeData::CtorInit {
                    designator, value, ..
                } => (*designator, *value),
                _ => continue,
            };

            if designator.is_some() {
                let location = self.ctx.location(module, init);
                self.ctx
                    .diag
                    .error(location, "initialiser designations are not supported");
                self.ctx
                    .module_mut(module)
                    .arena
                    .get_mut(init)
                    .set_errored();
                continue;
            }

            let Some(&(field_ty, offset)) = fields.get(i) else {
                continue;
            };
            let analysed = self.analyse_node(module, value, Some(field_ty.as_immutable()));
            let converted = self.convert_or_error(module, analysed, field_ty.as_immutable());

            let init_node = self.ctx.module_mut(module).arena.get_mut(init);
            init_node.state = SemaState::Done;
            if let NodeData::CtorInit {
                value,
                offset_bytes,
                ..
            } = &mut init_node.data
            {
                *value = converted;
                *offset_bytes = offset;
            }
        }

        self.set_ty(module, idx, target.as_immutable());
        idx
    }

    fn analyse_new(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        type_expr: NodeIndex,
        inits: &[NodeIndex],
    ) -> NodeIndex {
        let scope = self.scope;
        let resolved = self.resolve_type_expr(module, scope, type_expr);

        if !inits.is_empty() && self.ctx.types.is_struct(resolved.ty) {
            // Reuse the constructor path for the pointee initialisers.
            let span = self.ctx.module(module).arena.get(idx).span;
            let ctor = self.ctx.module_mut(module).arena.alloc_synthesised(
                NodeData::Ctor {
                    type_expr: Some(type_expr),
                    inits: inits.to_vec(),
                },
                span,
            );
            self.analyse_node(module, ctor, Some(resolved));
        }

        let pointer = self.ctx.types.intern(TypeKind::Pointer {
            elem: QualType::of_mut(resolved.ty),
        });
        self.set_ty(module, idx, QualType::of(pointer));
        idx
    }

    // ========================================================================
    // Unary and binary operators
    // ========================================================================

    fn analyse_unary(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        op: UnaryOp,
        operand: NodeIndex,
    ) -> NodeIndex {
        let analysed = self.analyse_node(module, operand, None);

        match op {
            UnaryOp::Neg | UnaryOp::Compl => {
                let operand = self.lvalue_to_rvalue(module, analysed, true);
                let qt = self.ctx.module(module).arena.get(operand).ty;
                let ok = match op {
                    UnaryOp::Neg => self.ctx.types.is_numeric(qt.ty),
                    _ => self.ctx.types.is_int(qt.ty),
                };
                if !ok && !self.ctx.types.is_poison(qt.ty) {
                    let spelling = if op == UnaryOp::Neg { "-" } else { "~" };
                    let ty = self.ctx.display_type(qt);
                    let location = self.ctx.location(module, idx);
                    self.ctx.diag.error(
                        location,
                        format!("Operator '{spelling}' is not defined for type {ty}."),
                    );
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                    self.write_unary_back(module, idx, operand);
                    return idx;
                }
                self.write_unary_back(module, idx, operand);
                self.set_ty(module, idx, qt.as_immutable());
            }
            UnaryOp::Not => {
                let bool_ty = QualType::of(self.ctx.types.prims().bool_);
                let operand = self.convert_or_error(module, analysed, bool_ty);
                self.write_unary_back(module, idx, operand);
                self.set_ty(module, idx, bool_ty);
            }
            UnaryOp::AddressOf => {
                let operand = self.lvalue_to_rvalue(module, analysed, false);
                if !self.ctx.module(module).arena.get(operand).is_lvalue() {
                    let location = self.ctx.location(module, idx);
                    self.ctx
                        .diag
                        .error(location, "Cannot take the address of this expression.");
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                    self.write_unary_back(module, idx, operand);
                    return idx;
                }
                let elem = self.ctx.module(module).arena.get(operand).ty;
                let pointer = self.ctx.types.intern(TypeKind::Pointer { elem });
                self.write_unary_back(module, idx, operand);
                self.set_ty(module, idx, QualType::of(pointer));
            }
            UnaryOp::Deref => {
                let operand = self.lvalue_to_rvalue(module, analysed, true);
                let qt = self.ctx.module(module).arena.get(operand).ty;
                let canonical = self.ctx.types.canonical(qt.ty);
                match self.ctx.types.kind(canonical) {
                    TypeKind::Pointer { elem } => {
                        let elem = *elem;
                        self.write_unary_back(module, idx, operand);
                        let node = self.ctx.module_mut(module).arena.get_mut(idx);
                        node.ty = elem;
                        node.category = ValueCategory::Lvalue;
                    }
                    TypeKind::Poison => {
                        self.write_unary_back(module, idx, operand);
                        self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                    }
                    _ => {
                        let ty = self.ctx.display_type(qt);
                        let location = self.ctx.location(module, idx);
                        self.ctx.diag.error(
                            location,
                            format!("Cannot dereference a value of type {ty}."),
                        );
                        self.write_unary_back(module, idx, operand);
                        self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                    }
                }
            }
        }
        idx
    }

    fn write_unary_back(&mut self, module: ModuleId, idx: NodeIndex, operand: NodeIndex) {
        if let NodeData::Unary { operand: o, .. } =
            &mut self.ctx.module_mut(module).arena.get_mut(idx).data
        {
            *o = operand;
        }
    }

    fn analyse_binary(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        op: BinaryOp,
        lhs: NodeIndex,
        rhs: NodeIndex,
    ) -> NodeIndex {
        let bool_ty = QualType::of(self.ctx.types.prims().bool_);

        if op.is_logical() {
            let lhs = self.analyse_node(module, lhs, Some(bool_ty));
            let lhs = self.convert_or_error(module, lhs, bool_ty);
            let rhs = self.analyse_node(module, rhs, Some(bool_ty));
            let rhs = self.convert_or_error(module, rhs, bool_ty);
            self.write_binary_back(module, idx, lhs, rhs);
            self.set_ty(module, idx, bool_ty);
            return idx;
        }

        let lhs = self.analyse_node(module, lhs, None);
        let rhs = self.analyse_node(module, rhs, None);
        let lhs = self.lvalue_to_rvalue(module, lhs, true);
        let rhs = self.lvalue_to_rvalue(module, rhs, true);
        let lhs_qt = self.ctx.module(module).arena.get(lhs).ty;
        let rhs_qt = self.ctx.module(module).arena.get(rhs).ty;

        if self.ctx.types.is_poison(lhs_qt.ty) || self.ctx.types.is_poison(rhs_qt.ty) {
            self.write_binary_back(module, idx, lhs, rhs);
            self.set_ty(module, idx, QualType::of(TypeId::POISON));
            return idx;
        }

        if op.is_arithmetic() || op.is_bitwise() {
            let wants_int = op.is_bitwise();
            let lhs_ok = if wants_int {
                self.ctx.types.is_int(lhs_qt.ty)
            } else {
                self.ctx.types.is_numeric(lhs_qt.ty)
            };
            let rhs_ok = if wants_int {
                self.ctx.types.is_int(rhs_qt.ty)
            } else {
                self.ctx.types.is_numeric(rhs_qt.ty)
            };

            if !lhs_ok || !rhs_ok {
                let spelling = op.spelling();
                let lhs_ty = self.ctx.display_type(lhs_qt);
                let rhs_ty = self.ctx.display_type(rhs_qt);
                let location = self.ctx.location(module, idx);
                self.ctx.diag.error(
                    location,
                    format!("Operator '{spelling}' is not defined for types {lhs_ty} and {rhs_ty}."),
                );
                self.write_binary_back(module, idx, lhs, rhs);
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }

            match self.convert_to_common_type(module, lhs, rhs) {
                Some((lhs, rhs, common)) => {
                    self.write_binary_back(module, idx, lhs, rhs);
                    self.set_ty(module, idx, common);
                }
                None => {
                    let lhs_ty = self.ctx.display_type(lhs_qt);
                    let rhs_ty = self.ctx.display_type(rhs_qt);
                    let location = self.ctx.location(module, idx);
                    self.ctx.diag.error(
                        location,
                        format!("Operands of types {lhs_ty} and {rhs_ty} have no common type."),
                    );
                    self.write_binary_back(module, idx, lhs, rhs);
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                }
            }
            return idx;
        }

        debug_assert!(op.is_comparison());
        let both_bool = self.ctx.types.is_bool(lhs_qt.ty) && self.ctx.types.is_bool(rhs_qt.ty);
        let both_numeric =
            self.ctx.types.is_numeric(lhs_qt.ty) && self.ctx.types.is_numeric(rhs_qt.ty);
        let both_pointer =
            self.ctx.types.is_pointer(lhs_qt.ty) && self.ctx.types.is_pointer(rhs_qt.ty);
        let both_buffer =
            self.ctx.types.is_buffer(lhs_qt.ty) && self.ctx.types.is_buffer(rhs_qt.ty);

        if both_numeric {
            match self.convert_to_common_type(module, lhs, rhs) {
                Some((lhs, rhs, _)) => self.write_binary_back(module, idx, lhs, rhs),
                None => {
                    let lhs_ty = self.ctx.display_type(lhs_qt);
                    let rhs_ty = self.ctx.display_type(rhs_qt);
                    let location = self.ctx.location(module, idx);
                    self.ctx.diag.error(
                        location,
                        format!("Operands of types {lhs_ty} and {rhs_ty} have no common type."),
                    );
                    self.write_binary_back(module, idx, lhs, rhs);
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                    return idx;
                }
            }
        } else if both_pointer {
            if !op.is_equality() {
                let spelling = op.spelling();
                let location = self.ctx.location(module, idx);
                self.ctx.diag.error(
                    location,
                    format!("Pointers cannot be compared with '{spelling}'; only equality is defined."),
                );
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
            }
            self.write_binary_back(module, idx, lhs, rhs);
        } else if both_bool || both_buffer {
            self.write_binary_back(module, idx, lhs, rhs);
        } else {
            let lhs_ty = self.ctx.display_type(lhs_qt);
            let rhs_ty = self.ctx.display_type(rhs_qt);
            let location = self.ctx.location(module, idx);
            self.ctx.diag.error(
                location,
                format!("Cannot compare values of types {lhs_ty} and {rhs_ty}."),
            );
            self.write_binary_back(module, idx, lhs, rhs);
            self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
            return idx;
        }

        self.set_ty(module, idx, bool_ty);
        idx
    }

    fn write_binary_back(&mut self, module: ModuleId, idx: NodeIndex, lhs: NodeIndex, rhs: NodeIndex) {
        if let NodeData::Binary { lhs: l, rhs: r, .. } =
            &mut self.ctx.module_mut(module).arena.get_mut(idx).data
        {
            *l = lhs;
            *r = rhs;
        }
    }

    // ========================================================================
    // Casts and unwraps
    // ========================================================================

    fn analyse_cast(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        kind: CastKind,
        type_expr: Option<NodeIndex>,
        operand: NodeIndex,
    ) -> NodeIndex {
        match kind {
            // Synthesised casts are created fully analysed; nothing to
            // re-check if one arrives here.
            CastKind::Implicit
            | CastKind::LvalueToRvalue
            | CastKind::LvalueToReference
            | CastKind::ReferenceToLvalue => idx,
            CastKind::Soft | CastKind::Hard => {
                let target = match type_expr {
                    Some(te) => {
                        let scope = self.scope;
                        self.resolve_type_expr(module, scope, te)
                    }
                    None => QualType::of(TypeId::POISON),
                };
                let analysed = self.analyse_node(module, operand, Some(target));
                let (converted, ok) = self.convert(module, analysed, target);

                if ok {
                    self.write_cast_back(module, idx, converted);
                    self.set_ty(module, idx, target.as_immutable());
                    return idx;
                }

                if kind == CastKind::Hard {
                    let value = self.lvalue_to_rvalue(module, converted, true);
                    let from = self.ctx.module(module).arena.get(value).ty;
                    let permitted = (self.ctx.types.is_numeric(from.ty)
                        && self.ctx.types.is_numeric(target.ty))
                        || (self.ctx.types.is_pointer(from.ty)
                            && self.ctx.types.is_pointer(target.ty))
                        || (self.ctx.types.is_buffer(from.ty)
                            && self.ctx.types.is_buffer(target.ty));
                    if permitted {
                        self.write_cast_back(module, idx, value);
                        self.set_ty(module, idx, target.as_immutable());
                        return idx;
                    }
                }

                let from = self.ctx.module(module).arena.get(converted).ty;
                let from_str = self.ctx.display_type(from);
                let to_str = self.ctx.display_type(target);
                let location = self.ctx.location(module, idx);
                self.ctx
                    .diag
                    .error(location, format!("Cannot cast {from_str} to {to_str}."));
                self.write_cast_back(module, idx, converted);
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                idx
            }
        }
    }

    fn write_cast_back(&mut self, module: ModuleId, idx: NodeIndex, operand: NodeIndex) {
        if let NodeData::Cast { operand: o, .. } =
            &mut self.ctx.module_mut(module).arena.get_mut(idx).data
        {
            *o = operand;
        }
    }

    fn analyse_unwrap(&mut self, module: ModuleId, idx: NodeIndex, operand: NodeIndex) -> NodeIndex {
        let analysed = self.analyse_node(module, operand, None);
        let operand = self.lvalue_to_rvalue(module, analysed, true);
        let qt = self.ctx.module(module).arena.get(operand).ty;
        let canonical = self.ctx.types.canonical(qt.ty);

        let result = match self.ctx.types.kind(canonical) {
            TypeKind::Nilable { elem } => Some(*elem),
            TypeKind::ErrorPair { value, .. } => Some(*value),
            TypeKind::Poison => {
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                return idx;
            }
            _ => None,
        };

        match result {
            Some(elem) => {
                if let NodeData::Unwrap { operand: o } =
                    &mut self.ctx.module_mut(module).arena.get_mut(idx).data
                {
                    *o = operand;
                }
                self.set_ty(module, idx, elem.as_immutable());
            }
            None => {
                let ty = self.ctx.display_type(qt);
                let location = self.ctx.location(module, idx);
                self.ctx
                    .diag
                    .error(location, format!("Cannot unwrap a value of type {ty}."));
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
            }
        }
        idx
    }

    // ========================================================================
    // Implicit dereference
    // ========================================================================

    /// Prepare an operand for use as a place value: follow references
    /// with a reference-to-lvalue cast, then strip pointer layers by
    /// synthesising dereference nodes.
    pub(crate) fn implicit_dereference(&mut self, module: ModuleId, mut idx: NodeIndex) -> NodeIndex {
        idx = self.lvalue_to_rvalue(module, idx, false);
        loop {
            let qt = self.ctx.module(module).arena.get(idx).ty;
            let canonical = self.ctx.types.canonical(qt.ty);
            let elem = match self.ctx.types.kind(canonical) {
                TypeKind::Pointer { elem } => *elem,
                _ => break,
            };
            let span = self.ctx.module(module).arena.get(idx).span;
            let mut deref = Node::new(
                NodeData::Unary {
                    op: UnaryOp::Deref,
                    operand: idx,
                },
                span,
            );
            deref.flags |= NodeFlags::COMPILER_GENERATED;
            deref.ty = elem;
            deref.category = ValueCategory::Lvalue;
            deref.state = SemaState::Done;
            idx = self.ctx.module_mut(module).arena.add(deref);
        }
        idx
    }
}
