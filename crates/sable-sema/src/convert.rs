//! Implicit conversions.
//!
//! `convert_impl` mirrors the conversion algorithm the language has
//! always used: error absorption first, then qualifier normalisation,
//! reference/pointer shape rules, lvalue-to-rvalue decay (+1 score),
//! compile-time literal folding by significant bits, and finally the
//! general numeric widenings (+1 score each). Scores order overload
//! candidates; negative results are `impossible` (-1) or
//! `contains-errors` (-2).

use sable_syntax::{
    CastKind, ConstValue, ModuleId, Node, NodeData, NodeFlags, NodeIndex, QualType, SemaState,
    TypeId, TypeKind, ValueCategory,
};

use crate::Sema;

pub(crate) const CONVERT_CONTAINS_ERRORS: i32 = -2;
pub(crate) const CONVERT_IMPOSSIBLE: i32 = -1;
pub(crate) const CONVERT_NOOP: i32 = 0;

/// Position (1-based) of the most significant bit differing from the
/// sign bit, with 1 as the minimum - so `0` and `-1` both report 1
/// significant bit.
#[must_use]
pub fn significant_bits(value: i64) -> u32 {
    let sign = value < 0;
    for pos in (1..=63u32).rev() {
        let bit = (value >> (pos - 1)) & 1 != 0;
        if bit != sign {
            return pos;
        }
    }
    1
}

impl<'a> Sema<'a> {
    /// Convert `idx` to `to`, inserting implicit casts. Returns the
    /// (possibly wrapped) node and whether the conversion succeeded.
    /// Nodes that already errored convert successfully as a no-op so a
    /// single failure never cascades.
    pub(crate) fn convert(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        to: QualType,
    ) -> (NodeIndex, bool) {
        if self.ctx.module(module).arena.get(idx).is_errored() {
            return (idx, true);
        }
        let (idx, score) = self.convert_impl(module, idx, to, true);
        (idx, score >= 0 || score == CONVERT_CONTAINS_ERRORS)
    }

    /// Convert or report `Expression of type X is not convertible to Y`.
    pub(crate) fn convert_or_error(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        to: QualType,
    ) -> NodeIndex {
        let (idx, ok) = self.convert(module, idx, to);
        if !ok {
            let from = self.ctx.module(module).arena.get(idx).ty;
            let from_str = self.ctx.display_type(from);
            let to_str = self.ctx.display_type(to);
            let location = self.ctx.location(module, idx);
            self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
            self.ctx.diag.error(
                location,
                format!("Expression of type {from_str} is not convertible to {to_str}"),
            );
        }
        idx
    }

    /// Score a conversion without mutating the tree.
    pub(crate) fn convert_score(&mut self, module: ModuleId, idx: NodeIndex, to: QualType) -> i32 {
        self.convert_impl(module, idx, to, false).1
    }

    fn convert_impl(
        &mut self,
        module: ModuleId,
        mut idx: NodeIndex,
        to: QualType,
        perform: bool,
    ) -> (NodeIndex, i32) {
        // Copies never keep the outermost modifiability.
        let to = to.as_immutable();
        let node = self.ctx.module(module).arena.get(idx);
        let mut from = node.ty.as_immutable();

        if self.ctx.types.is_poison(from.ty) || self.ctx.types.is_poison(to.ty) {
            return (idx, CONVERT_NOOP);
        }
        if node.is_errored() {
            return (idx, CONVERT_CONTAINS_ERRORS);
        }

        if self.type_equals_convertible(from, to) {
            return (idx, CONVERT_NOOP);
        }

        let mut score = 0;
        if self.ctx.module(module).arena.get(idx).is_lvalue() {
            score = 1;
        }

        if self.ctx.types.is_reference(from.ty) && self.ctx.types.is_reference(to.ty) {
            if self.container_elements_convertible(from.ty, to.ty) {
                return (idx, CONVERT_NOOP);
            }
            return (idx, CONVERT_IMPOSSIBLE);
        }

        if perform {
            idx = self.lvalue_to_rvalue(module, idx, true);
            from = self.ctx.module(module).arena.get(idx).ty.as_immutable();
        } else {
            from = self.ctx.types.strip_references(from).as_immutable();
        }

        if self.type_equals_convertible(from, to) {
            return (idx, CONVERT_NOOP);
        }

        if self.ctx.types.is_pointer(from.ty)
            && (self.ctx.types.is_reference(to.ty) || self.ctx.types.is_pointer(to.ty))
        {
            if self.container_elements_convertible(from.ty, to.ty) {
                return (idx, CONVERT_NOOP);
            }
            return (idx, CONVERT_IMPOSSIBLE);
        }

        let to_size = u32::try_from(self.ctx.types.size_in_bits(to.ty)).unwrap_or(u32::MAX);

        // Compile-time constants fold directly into the target type when
        // the value fits.
        if let Some(value) = self.evaluate(module, idx) {
            match value {
                ConstValue::Int(v) if self.ctx.types.is_numeric(to.ty) => {
                    if self.ctx.types.is_float(to.ty) {
                        if perform {
                            idx = self.insert_implicit_cast(module, idx, to);
                            idx = self.wrap_evaluated_constant(
                                module,
                                idx,
                                ConstValue::Float(v as f64),
                            );
                        }
                        return (idx, score);
                    }

                    let signed = self.ctx.types.is_signed_int(to.ty);
                    let negative_into_unsigned = v < 0 && !signed;
                    let available = if signed {
                        to_size.saturating_sub(1)
                    } else {
                        to_size
                    };
                    if !negative_into_unsigned && significant_bits(v) <= available {
                        if perform {
                            idx = self.insert_implicit_cast(module, idx, to);
                            idx = self.wrap_evaluated_constant(module, idx, ConstValue::Int(v));
                        }
                        return (idx, score);
                    }
                }
                ConstValue::Float(f) if self.ctx.types.is_float(to.ty) => {
                    if perform {
                        idx = self.insert_implicit_cast(module, idx, to);
                        idx = self.wrap_evaluated_constant(module, idx, ConstValue::Float(f));
                    }
                    return (idx, score);
                }
                _ => {}
            }
        }

        let from_size = u32::try_from(self.ctx.types.size_in_bits(from.ty)).unwrap_or(0);

        if self.ctx.types.is_int(from.ty) && self.ctx.types.is_int(to.ty) {
            if from_size <= to_size {
                if perform {
                    idx = self.insert_implicit_cast(module, idx, to);
                }
                return (idx, 1 + score);
            }
            return (idx, CONVERT_IMPOSSIBLE);
        }

        if self.ctx.types.is_int(from.ty) && self.ctx.types.is_float(to.ty) {
            if perform {
                idx = self.insert_implicit_cast(module, idx, to);
            }
            return (idx, 1 + score);
        }

        if self.ctx.types.is_float(from.ty) && self.ctx.types.is_float(to.ty) {
            if from_size <= to_size {
                if perform {
                    idx = self.insert_implicit_cast(module, idx, to);
                }
                return (idx, 1 + score);
            }
            return (idx, CONVERT_IMPOSSIBLE);
        }

        (idx, CONVERT_IMPOSSIBLE)
    }

    /// Equality modulo outer mutability: identical types, or containers
    /// of the same shape whose elements are equal and where the target
    /// does not gain modifiability.
    fn type_equals_convertible(&self, from: QualType, to: QualType) -> bool {
        let from_ty = self.ctx.types.canonical(from.ty);
        let to_ty = self.ctx.types.canonical(to.ty);
        if from_ty == to_ty {
            return true;
        }
        self.container_elements_convertible(from_ty, to_ty)
            && std::mem::discriminant(self.ctx.types.kind(from_ty))
                == std::mem::discriminant(self.ctx.types.kind(to_ty))
    }

    /// Both types are pointer-like containers whose element types are
    /// equal and whose element mutability is not gained by the target.
    fn container_elements_convertible(&self, from: TypeId, to: TypeId) -> bool {
        let from_elem = match self.ctx.types.kind(self.ctx.types.canonical(from)) {
            TypeKind::Reference { elem }
            | TypeKind::Pointer { elem }
            | TypeKind::Buffer { elem } => *elem,
            _ => return false,
        };
        let to_elem = match self.ctx.types.kind(self.ctx.types.canonical(to)) {
            TypeKind::Reference { elem }
            | TypeKind::Pointer { elem }
            | TypeKind::Buffer { elem } => *elem,
            _ => return false,
        };
        from_elem.ty == to_elem.ty && (from_elem.mutable == to_elem.mutable || !to_elem.mutable)
    }

    // ========================================================================
    // Cast synthesis
    // ========================================================================

    /// Wrap `idx` in a compiler-generated implicit cast to `to`.
    pub(crate) fn insert_implicit_cast(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        to: QualType,
    ) -> NodeIndex {
        self.insert_cast(module, idx, CastKind::Implicit, to.as_immutable(), ValueCategory::Rvalue)
    }

    fn insert_cast(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        kind: CastKind,
        ty: QualType,
        category: ValueCategory,
    ) -> NodeIndex {
        let span = self.ctx.module(module).arena.get(idx).span;
        let mut node = Node::new(
            NodeData::Cast {
                kind,
                type_expr: None,
                operand: idx,
            },
            span,
        );
        node.flags |= NodeFlags::COMPILER_GENERATED;
        node.ty = ty;
        node.category = category;
        node.state = SemaState::Done;
        self.ctx.module_mut(module).arena.add(node)
    }

    /// Wrap a folded expression, preserving the original tree and the
    /// immutable constant result.
    pub(crate) fn wrap_evaluated_constant(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
        value: ConstValue,
    ) -> NodeIndex {
        let (span, ty) = {
            let node = self.ctx.module(module).arena.get(idx);
            (node.span, node.ty)
        };
        let mut node = Node::new(NodeData::EvaluatedConstant { expr: idx, value }, span);
        node.flags |= NodeFlags::COMPILER_GENERATED;
        node.ty = ty;
        node.state = SemaState::Done;
        self.ctx.module_mut(module).arena.add(node)
    }

    /// Strip references with reference-to-lvalue casts and, when
    /// `materialise` is set, decay a final lvalue to an rvalue.
    pub(crate) fn lvalue_to_rvalue(
        &mut self,
        module: ModuleId,
        mut idx: NodeIndex,
        materialise: bool,
    ) -> NodeIndex {
        loop {
            let qt = self.ctx.module(module).arena.get(idx).ty;
            if !self.ctx.types.is_reference(qt.ty) {
                break;
            }
            let elem = self
                .ctx
                .types
                .element(qt.ty)
                .expect("references have an element type");
            idx = self.insert_cast(
                module,
                idx,
                CastKind::ReferenceToLvalue,
                elem,
                ValueCategory::Lvalue,
            );
        }

        if materialise && self.ctx.module(module).arena.get(idx).is_lvalue() {
            let ty = self.ctx.module(module).arena.get(idx).ty.as_immutable();
            idx = self.insert_cast(
                module,
                idx,
                CastKind::LvalueToRvalue,
                ty,
                ValueCategory::Rvalue,
            );
        }
        idx
    }

    // ========================================================================
    // Common types and C varargs
    // ========================================================================

    /// Convert two operands to a common type, preferring the direction
    /// with the cheaper conversion. Returns the converted operands and
    /// the common type, or `None` when neither direction works.
    pub(crate) fn convert_to_common_type(
        &mut self,
        module: ModuleId,
        a: NodeIndex,
        b: NodeIndex,
    ) -> Option<(NodeIndex, NodeIndex, QualType)> {
        let a_ty = self.ctx.module(module).arena.get(a).ty;
        let b_ty = self.ctx.module(module).arena.get(b).ty;

        let a_to_b = self.convert_score(module, a, b_ty);
        let b_to_a = self.convert_score(module, b, a_ty);

        if a_to_b >= 0 && (b_to_a < 0 || a_to_b <= b_to_a) {
            let (a, _) = self.convert(module, a, b_ty);
            let b = self.lvalue_to_rvalue(module, b, true);
            return Some((a, b, b_ty.as_immutable()));
        }
        if b_to_a >= 0 {
            let (b, _) = self.convert(module, b, a_ty);
            let a = self.lvalue_to_rvalue(module, a, true);
            return Some((a, b, a_ty.as_immutable()));
        }
        if a_to_b == CONVERT_CONTAINS_ERRORS || b_to_a == CONVERT_CONTAINS_ERRORS {
            return Some((a, b, QualType::of(TypeId::POISON)));
        }
        None
    }

    /// Promote a trailing C-variadic argument: `int`-category integers
    /// narrower than the target's C `int` widen to it, floats narrower
    /// than C `double` widen to it, and anything else must fit in a
    /// pointer.
    pub(crate) fn convert_to_c_varargs_or_error(
        &mut self,
        module: ModuleId,
        idx: NodeIndex,
    ) -> NodeIndex {
        let idx = self.lvalue_to_rvalue(module, idx, true);
        let qt = self.ctx.module(module).arena.get(idx).ty;
        let size = u32::try_from(self.ctx.types.size_in_bits(qt.ty)).unwrap_or(0);

        if self.ctx.types.is_int(qt.ty) {
            let ffi_int = self.ctx.target.ffi.size_of_int;
            if size < ffi_int {
                let signed = self.ctx.types.is_signed_int(qt.ty);
                let widened = self.ctx.types.intern(TypeKind::Int {
                    signed,
                    width: ffi_int,
                    platform: false,
                });
                return self.insert_implicit_cast(module, idx, QualType::of(widened));
            }
        }

        if self.ctx.types.is_float(qt.ty) {
            let ffi_double = self.ctx.target.ffi.size_of_double;
            if size < ffi_double {
                let widened = self.ctx.types.intern(TypeKind::Float {
                    width: ffi_double,
                    platform: false,
                });
                return self.insert_implicit_cast(module, idx, QualType::of(widened));
            }
        }

        if size <= self.ctx.target.size_of_pointer {
            return idx;
        }

        let ty_str = self.ctx.display_type(qt);
        let location = self.ctx.location(module, idx);
        self.ctx.module_mut(module).arena.get_mut(idx).set_errored();
        self.ctx.diag.error(
            location,
            format!("Cannot pass a value of type {ty_str} to a C-variadic call."),
        );
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::significant_bits;

    #[test]
    fn zero_and_minus_one_have_one_significant_bit() {
        assert_eq!(significant_bits(0), 1);
        assert_eq!(significant_bits(-1), 1);
    }

    #[test]
    fn positive_values_count_up_to_their_top_set_bit() {
        assert_eq!(significant_bits(1), 1);
        assert_eq!(significant_bits(2), 2);
        assert_eq!(significant_bits(100), 7);
        assert_eq!(significant_bits(127), 7);
        assert_eq!(significant_bits(128), 8);
        assert_eq!(significant_bits(200), 8);
        assert_eq!(significant_bits(255), 8);
        assert_eq!(significant_bits(256), 9);
    }

    #[test]
    fn negative_values_count_to_the_highest_non_sign_bit() {
        assert_eq!(significant_bits(-2), 1);
        assert_eq!(significant_bits(-128), 7);
        assert_eq!(significant_bits(-129), 8);
        assert_eq!(significant_bits(i64::MIN), 63);
        assert_eq!(significant_bits(i64::MAX), 63);
    }
}
