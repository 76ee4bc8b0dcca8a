//! Full node analysis (analysis step 5): declarations and statements.
//!
//! Every node moves `Unanalysed -> InProgress -> Done`; re-entry while
//! in progress is a compiler bug and surfaces as an internal compiler
//! error diagnostic. Expression kinds are handled in the sibling
//! expressions module.

use sable_syntax::{
    ConstValue, ModuleId, Namespace, NodeData, NodeIndex, QualType, SemaState, TypeId, TypeKind,
};
use tracing::trace;

use crate::Sema;

impl<'a> Sema<'a> {
    /// Analyse one node (and its children), returning the node that
    /// should replace it in the parent - conversions may wrap it.
    pub(crate) fn analyse_node(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        expected: Option<QualType>,
    ) -> NodeIndex {
        match self.ctx.module(module).arena.get(idx).state {
            SemaState::Done => return idx,
            SemaState::InProgress => {
                let location = self.ctx.location(module, idx);
                self.ctx
                    .diag
                    .ice(location, "node analysis re-entered while in progress");
                return idx;
            }
            SemaState::Unanalysed => {}
        }
        self.ctx.module_mut(module).arena.get_mut(idx).state = SemaState::InProgress;
        trace!(node = idx.0, "analysing node");

        let result = self.analyse_node_impl(module, idx, expected);

        let node = self.ctx.module_mut(module).arena.get_mut(idx);
        if node.state == SemaState::InProgress {
            node.state = SemaState::Done;
        }
        result
    }

    fn analyse_node_impl(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        expected: Option<QualType>,
    ) -> NodeIndex {
        let data = self.ctx.module(module).arena.get(idx).data.clone();
        match data {
            // ================================================================
            // Declarations
            // ================================================================
            NodeData::Import { .. } => {
                self.set_ty(module, idx, QualType::of(TypeId::VOID));
                idx
            }
            NodeData::Function { params, body, .. } => {
                self.analyse_function(module, idx, &params, body);
                idx
            }
            NodeData::Parameter { default, .. } => {
                let ty = self.ctx.module(module).arena.get(idx).ty;
                if let Some(default) = default {
                    let analysed = self.analyse_node(module, default, Some(ty));
                    let converted = self.convert_or_error(module, analysed, ty);
                    if let NodeData::Parameter { default, .. } =
                        &mut self.ctx.module_mut(module).arena.get_mut(idx).data
                    {
                        *default = Some(converted);
                    }
                }
                idx
            }
            NodeData::Binding {
                name,
                type_expr,
                initializer,
                ..
            } => {
                self.analyse_binding(module, idx, name, type_expr, initializer);
                idx
            }
            NodeData::Struct { .. } | NodeData::Enum { .. } | NodeData::Alias { .. } => {
                // Types were materialised during type resolution.
                idx
            }
            NodeData::StructField { .. }
            | NodeData::EnumVariant { .. }
            | NodeData::TemplateTypeParam { .. }
            | NodeData::TemplateValueParam { .. }
            | NodeData::Overloads { .. } => idx,
            NodeData::Test { body, .. } => {
                self.return_stack.push(QualType::of(TypeId::VOID));
                let old_scope = self.scope;
                self.scope = self.ctx.module_mut(module).push_scope(old_scope, true);
                self.analyse_node(module, body, None);
                self.scope = old_scope;
                self.return_stack.pop();
                self.set_ty(module, idx, QualType::of(TypeId::VOID));
                idx
            }

            // ================================================================
            // Statements
            // ================================================================
            NodeData::Compound { children, .. } => {
                let old_scope = self.scope;
                let scope = self.ctx.module_mut(module).push_scope(old_scope, false);
                self.scope = scope;

                let mut noreturn = false;
                let mut new_children = Vec::with_capacity(children.len());
                for child in children {
                    let analysed = self.analyse_node(module, child, None);
                    if self.is_noreturn(module, analysed) {
                        noreturn = true;
                    }
                    new_children.push(analysed);
                }

                self.scope = old_scope;
                let node = self.ctx.module_mut(module).arena.get_mut(idx);
                if let NodeData::Compound {
                    children,
                    scope: scope_slot,
                } = &mut node.data
                {
                    *children = new_children;
                    *scope_slot = Some(scope);
                }
                let ty = if noreturn {
                    TypeId::NORETURN
                } else {
                    TypeId::VOID
                };
                self.set_ty(module, idx, QualType::of(ty));
                idx
            }
            NodeData::Assign { lhs, rhs } => {
                self.analyse_assign(module, idx, lhs, rhs);
                idx
            }
            NodeData::If {
                conditions,
                passes,
                fail,
            } => {
                let bool_ty = QualType::of(self.ctx.types.prims().bool_);
                let mut new_conditions = Vec::with_capacity(conditions.len());
                for condition in conditions {
                    let analysed = self.analyse_node(module, condition, Some(bool_ty));
                    new_conditions.push(self.convert_or_error(module, analysed, bool_ty));
                }

                let mut all_noreturn = true;
                let mut new_passes = Vec::with_capacity(passes.len());
                for pass in passes {
                    let analysed = self.analyse_node(module, pass, None);
                    all_noreturn &= self.is_noreturn(module, analysed);
                    new_passes.push(analysed);
                }
                let new_fail = fail.map(|f| {
                    let analysed = self.analyse_node(module, f, None);
                    all_noreturn &= self.is_noreturn(module, analysed);
                    analysed
                });
                if fail.is_none() {
                    all_noreturn = false;
                }

                if let NodeData::If {
                    conditions, passes, fail, ..
                } = &mut self.ctx.module_mut(module).arena.get_mut(idx).data
                {
                    *conditions = new_conditions;
                    *passes = new_passes;
                    *fail = new_fail;
                }
                let ty = if all_noreturn {
                    TypeId::NORETURN
                } else {
                    TypeId::VOID
                };
                self.set_ty(module, idx, QualType::of(ty));
                idx
            }
            NodeData::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                let old_scope = self.scope;
                self.scope = self.ctx.module_mut(module).push_scope(old_scope, false);

                let new_initializer = initializer.map(|i| self.analyse_node(module, i, None));
                let bool_ty = QualType::of(self.ctx.types.prims().bool_);
                let new_condition = condition.map(|c| {
                    let analysed = self.analyse_node(module, c, Some(bool_ty));
                    self.convert_or_error(module, analysed, bool_ty)
                });
                let new_increment = increment.map(|i| self.analyse_node(module, i, None));
                self.analyse_node(module, body, None);

                self.scope = old_scope;
                let diverges = self.loop_runs_forever(module, new_condition, body);
                if let NodeData::For {
                    initializer,
                    condition,
                    increment,
                    ..
                } = &mut self.ctx.module_mut(module).arena.get_mut(idx).data
                {
                    *initializer = new_initializer;
                    *condition = new_condition;
                    *increment = new_increment;
                }
                let ty = if diverges {
                    TypeId::NORETURN
                } else {
                    TypeId::VOID
                };
                self.set_ty(module, idx, QualType::of(ty));
                idx
            }
            NodeData::While { condition, body } => {
                let bool_ty = QualType::of(self.ctx.types.prims().bool_);
                let new_condition = condition.map(|c| {
                    let analysed = self.analyse_node(module, c, Some(bool_ty));
                    self.convert_or_error(module, analysed, bool_ty)
                });
                self.analyse_node(module, body, None);

                let diverges = self.loop_runs_forever(module, new_condition, body);
                if let NodeData::While { condition, .. } =
                    &mut self.ctx.module_mut(module).arena.get_mut(idx).data
                {
                    *condition = new_condition;
                }
                let ty = if diverges {
                    TypeId::NORETURN
                } else {
                    TypeId::VOID
                };
                self.set_ty(module, idx, QualType::of(ty));
                idx
            }
            NodeData::DoWhile { body, condition } => {
                self.analyse_node(module, body, None);
                let bool_ty = QualType::of(self.ctx.types.prims().bool_);
                let analysed = self.analyse_node(module, condition, Some(bool_ty));
                let new_condition = self.convert_or_error(module, analysed, bool_ty);
                if let NodeData::DoWhile { condition, .. } =
                    &mut self.ctx.module_mut(module).arena.get_mut(idx).data
                {
                    *condition = new_condition;
                }
                self.set_ty(module, idx, QualType::of(TypeId::VOID));
                idx
            }
            NodeData::Switch { value, cases } => {
                let analysed = self.analyse_node(module, value, None);
                let value_idx = self.lvalue_to_rvalue(module, analysed, true);
                let value_ty = self.ctx.module(module).arena.get(value_idx).ty;
                if !self.ctx.types.is_int(value_ty.ty)
                    && !self.ctx.types.is_poison(value_ty.ty)
                {
                    let ty = self.ctx.display_type(value_ty);
                    let location = self.ctx.location(module, value_idx);
                    self.ctx.diag.error(
                        location,
                        format!("Switch values must have an integer type, not {ty}."),
                    );
                }

                for case in &cases {
                    self.analyse_case(module, *case, value_ty);
                }
                if let NodeData::Switch { value, .. } =
                    &mut self.ctx.module_mut(module).arena.get_mut(idx).data
                {
                    *value = value_idx;
                }
                self.set_ty(module, idx, QualType::of(TypeId::VOID));
                idx
            }
            NodeData::Case { .. } => {
                // Analysed through the enclosing switch.
                idx
            }
            NodeData::Return { value } => {
                self.analyse_return(module, idx, value);
                idx
            }
            NodeData::Yield { value } => {
                let analysed = self.analyse_node(module, value, expected);
                let result = self.lvalue_to_rvalue(module, analysed, true);
                let ty = self.ctx.module(module).arena.get(result).ty;
                if let NodeData::Yield { value } =
                    &mut self.ctx.module_mut(module).arena.get_mut(idx).data
                {
                    *value = result;
                }
                self.set_ty(module, idx, ty);
                idx
            }
            NodeData::Break { .. } | NodeData::Continue { .. } | NodeData::Goto { .. } => {
                self.set_ty(module, idx, QualType::of(TypeId::NORETURN));
                idx
            }
            NodeData::Label { .. } => {
                self.set_ty(module, idx, QualType::of(TypeId::VOID));
                idx
            }
            NodeData::Defer { body } => {
                self.analyse_node(module, body, None);
                self.set_ty(module, idx, QualType::of(TypeId::VOID));
                idx
            }
            NodeData::Discard { expr } => {
                let analysed = self.analyse_node(module, expr, None);
                if let NodeData::Discard { expr } =
                    &mut self.ctx.module_mut(module).arena.get_mut(idx).data
                {
                    *expr = analysed;
                }
                self.set_ty(module, idx, QualType::of(TypeId::VOID));
                idx
            }
            NodeData::Assert { condition, .. } => {
                let bool_ty = QualType::of(self.ctx.types.prims().bool_);
                let analysed = self.analyse_node(module, condition, Some(bool_ty));
                let converted = self.convert_or_error(module, analysed, bool_ty);
                if let NodeData::Assert { condition, .. } =
                    &mut self.ctx.module_mut(module).arena.get_mut(idx).data
                {
                    *condition = converted;
                }
                self.set_ty(module, idx, QualType::of(TypeId::VOID));
                idx
            }

            // ================================================================
            // Type expressions
            // ================================================================
            NodeData::TypeExpr { .. } => {
                let scope = self.scope;
                self.resolve_type_expr(module, scope, idx);
                idx
            }

            // ================================================================
            // Expressions
            // ================================================================
            _ => self.analyse_expr(module, idx, expected),
        }
    }

    fn analyse_function(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        params: &[NodeIndex],
        body: Option<NodeIndex>,
    ) {
        let old_scope = self.scope;
        let fn_scope = self.ctx.module_mut(module).push_scope(old_scope, true);
        self.scope = fn_scope;

        for &param in params {
            if let Some(name) = self.ctx.module(module).arena.get(param).data.declared_name() {
                self.ctx
                    .module_mut(module)
                    .scope_mut(fn_scope)
                    .declare(Namespace::Value, name, param);
            }
            self.analyse_node(module, param, None);
        }

        let return_type = match self.ctx.types.kind(self.ctx.module(module).arena.get(idx).ty.ty)
        {
            TypeKind::Function { return_type, .. } => *return_type,
            _ => QualType::of(TypeId::POISON),
        };
        self.return_stack.push(return_type);
        if let Some(body) = body {
            self.analyse_node(module, body, None);
        }
        self.return_stack.pop();
        self.scope = old_scope;
    }

    fn analyse_binding(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        name: sable_common::Atom,
        type_expr: NodeIndex,
        initializer: Option<NodeIndex>,
    ) {
        // Local bindings resolve their declared type here; top-level
        // ones did so during type resolution.
        let mut declared = self.ctx.module(module).arena.get(idx).ty;
        if declared.ty == TypeId::UNKNOWN {
            let scope = self.scope;
            let resolved = self.resolve_type_expr(module, scope, type_expr);
            if resolved.ty != TypeId::UNKNOWN {
                declared = QualType::of_mut(resolved.ty);
            }
        }

        let new_initializer = match initializer {
            Some(init) if declared.ty != TypeId::UNKNOWN => {
                let analysed = self.analyse_node(module, init, Some(declared));
                Some(self.convert_or_error(module, analysed, declared))
            }
            Some(init) => {
                // `var` - infer from the initialiser.
                let analysed = self.analyse_node(module, init, None);
                let decayed = self.lvalue_to_rvalue(module, analysed, true);
                let inferred = self.ctx.module(module).arena.get(decayed).ty;
                declared = QualType::of_mut(inferred.ty);
                Some(decayed)
            }
            None => {
                if declared.ty == TypeId::UNKNOWN {
                    let location = self.ctx.location(module, idx);
                    self.ctx.diag.error(
                        location,
                        "A binding with an inferred type requires an initialiser.",
                    );
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                    declared = QualType::of(TypeId::POISON);
                }
                None
            }
        };

        let node = self.ctx.module_mut(module).arena.get_mut(idx);
        node.ty = declared;
        node.category = sable_syntax::ValueCategory::Lvalue;
        if let NodeData::Binding { initializer, .. } = &mut node.data {
            *initializer = new_initializer;
        }

        // Locals enter the enclosing scope; top-level bindings are
        // already in the module's root scope.
        if self.scope != self.ctx.module(module).root_scope {
            let scope = self.scope;
            self.ctx
                .module_mut(module)
                .scope_mut(scope)
                .declare(Namespace::Value, name, idx);
        }
    }

    fn analyse_assign(&mut self, module: ModuleId, idx: NodeIndex, lhs: NodeIndex, rhs: NodeIndex) {
        let lhs = self.analyse_node(module, lhs, None);
        let lhs = self.implicit_dereference(module, lhs);
        let lhs_node = self.ctx.module(module).arena.get(lhs);
        let lhs_ty = lhs_node.ty;

        if !lhs_node.is_errored() && (!lhs_node.is_lvalue() || !lhs_ty.mutable) {
            let location = self.ctx.location(module, lhs);
            self.ctx
                .diag
                .error(location, "Left-hand side of assignment is not mutable");
            self.ctx.module_mut(module).arena.get_mut(lhs).set_errored();
        }

        let target = self.ctx.types.strip_references(lhs_ty).as_immutable();
        let analysed = self.analyse_node(module, rhs, Some(target));
        let rhs = self.convert_or_error(module, analysed, target);

        let node = self.ctx.module_mut(module).arena.get_mut(idx);
        if let NodeData::Assign { lhs: l, rhs: r } = &mut node.data {
            *l = lhs;
            *r = rhs;
        }
        node.ty = QualType::of(TypeId::VOID);
    }

    fn analyse_return(&mut self, module: ModuleId, idx: NodeIndex, value: Option<NodeIndex>) {
        let expected = self.return_stack.last().copied();
        let location = self.ctx.location(module, idx);

        let new_value = match (value, expected) {
            (_, None) => {
                self.ctx
                    .diag
                    .error(location, "Cannot return from outside a function.");
                self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                value
            }
            (Some(value), Some(expected)) => {
                if self.ctx.types.is_void(expected.ty) || self.ctx.types.is_noreturn(expected.ty)
                {
                    self.ctx
                        .diag
                        .error(location, "Cannot return a value from a void function.");
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                }
                let analysed = self.analyse_node(module, value, Some(expected));
                Some(self.convert_or_error(module, analysed, expected))
            }
            (None, Some(expected)) => {
                if !self.ctx.types.is_void(expected.ty)
                    && !self.ctx.types.is_noreturn(expected.ty)
                {
                    let ty = self.ctx.display_type(expected);
                    self.ctx.diag.error(
                        location,
                        format!("Expected a value of type {ty} to return."),
                    );
                    self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
                }
                None
            }
        };

        let node = self.ctx.module_mut(module).arena.get_mut(idx);
        if let NodeData::Return { value } = &mut node.data {
            *value = new_value;
        }
        node.ty = QualType::of(TypeId::NORETURN);
    }

    fn analyse_case(&mut self, module: ModuleId, case: NodeIndex, value_ty: QualType) {
        let (pattern, body) = match &self.ctx.module(module).arena.get(case).data {
            NodeData::Case { pattern, body } => (*pattern, body.clone()),
            _ => return,
        };

        let new_pattern = pattern.map(|p| {
            let analysed = self.analyse_node(module, p, Some(value_ty.as_immutable()));
            let converted = self.convert_or_error(module, analysed, value_ty.as_immutable());
            if self.evaluate(module, converted).is_none() {
                let location = self.ctx.location(module, converted);
                self.ctx.diag.error(
                    location,
                    "Case patterns must be compile-time integer constants.",
                );
            }
            converted
        });

        for stmt in body {
            self.analyse_node(module, stmt, None);
        }
        if let NodeData::Case { pattern, .. } =
            &mut self.ctx.module_mut(module).arena.get_mut(case).data
        {
            *pattern = new_pattern;
        }
        let node = self.ctx.module_mut(module).arena.get_mut(case);
        node.ty = QualType::of(TypeId::VOID);
        node.state = SemaState::Done;
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    pub(crate) fn set_ty(&mut self, module: ModuleId, idx: NodeIndex, ty: QualType) {
        self.ctx.module_mut(module).arena.get_mut(idx).ty = ty;
    }

    pub(crate) fn is_noreturn(&self, module: ModuleId, idx: NodeIndex) -> bool {
        self.ctx
            .types
            .is_noreturn(self.ctx.module(module).arena.get(idx).ty.ty)
    }

    /// A loop diverges when its condition is absent or constant-true and
    /// no `break` can escape its body.
    fn loop_runs_forever(
        &mut self,
        module: ModuleId,
        condition: Option<NodeIndex>,
        body: NodeIndex,
    ) -> bool {
        let always_true = match condition {
            None => true,
            Some(c) => matches!(self.evaluate(module, c), Some(ConstValue::Bool(true))),
        };
        always_true && !self.contains_escaping_break(module, body)
    }

    /// Whether a `break` in this subtree would escape the enclosing
    /// loop. Nested loops and switches capture their own breaks.
    fn contains_escaping_break(&self, module: ModuleId, idx: NodeIndex) -> bool {
        let arena = &self.ctx.module(module).arena;
        match &arena.get(idx).data {
            NodeData::Break { .. } => true,
            NodeData::While { .. }
            | NodeData::DoWhile { .. }
            | NodeData::For { .. }
            | NodeData::Switch { .. } => false,
            NodeData::Compound { children, .. } => children
                .iter()
                .any(|&c| self.contains_escaping_break(module, c)),
            NodeData::If { passes, fail, .. } => {
                passes
                    .iter()
                    .any(|&p| self.contains_escaping_break(module, p))
                    || fail.is_some_and(|f| self.contains_escaping_break(module, f))
            }
            NodeData::Defer { body } => self.contains_escaping_break(module, *body),
            _ => false,
        }
    }
}
