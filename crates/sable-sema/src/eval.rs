//! Compile-time constant evaluation.
//!
//! Literal nodes evaluate to their literal value; `sizeof`, `alignof`
//! and `offsetof` evaluate from the cached layout; arithmetic over
//! already-constant integers folds on demand (the conversion algorithm
//! asks for it). Everything else is non-constant and evaluates to
//! `None` - the caller decides whether that is an error.

use sable_syntax::{BinaryOp, ConstValue, ModuleId, NodeData, NodeIndex, TypeKind, UnaryOp};

use crate::Sema;

impl<'a> Sema<'a> {
    /// Evaluate a node to a constant, or `None` when it is not a
    /// compile-time constant.
    pub(crate) fn evaluate(&mut self, module: ModuleId, idx: NodeIndex) -> Option<ConstValue> {
        let data = self.ctx.module(module).arena.get(idx).data.clone();
        match data {
            NodeData::EvaluatedConstant { value, .. } => Some(value),
            NodeData::LitBool { value } => Some(ConstValue::Bool(value)),
            NodeData::LitInt { value } => Some(ConstValue::Int(value)),
            NodeData::LitFloat { value } => Some(ConstValue::Float(value)),
            NodeData::LitString { value } => Some(ConstValue::String(value)),
            NodeData::LitNil => Some(ConstValue::Nil),
            // Implicit casts and decay preserve constant-ness.
            NodeData::Cast { operand, .. } => {
                let inner = self.evaluate(module, operand)?;
                let to = self.ctx.module(module).arena.get(idx).ty;
                match inner {
                    ConstValue::Int(v) if self.ctx.types.is_float(to.ty) => {
                        Some(ConstValue::Float(v as f64))
                    }
                    other => Some(other),
                }
            }
            NodeData::Unary { op, operand } => {
                let inner = self.evaluate(module, operand)?;
                match (op, inner) {
                    (UnaryOp::Neg, ConstValue::Int(v)) => Some(ConstValue::Int(v.wrapping_neg())),
                    (UnaryOp::Neg, ConstValue::Float(v)) => Some(ConstValue::Float(-v)),
                    (UnaryOp::Compl, ConstValue::Int(v)) => Some(ConstValue::Int(!v)),
                    (UnaryOp::Not, ConstValue::Bool(v)) => Some(ConstValue::Bool(!v)),
                    _ => None,
                }
            }
            NodeData::Binary { op, lhs, rhs } => {
                let lhs = self.evaluate(module, lhs)?;
                let rhs = self.evaluate(module, rhs)?;
                fold_int_binary(op, lhs, rhs)
            }
            NodeData::Sizeof { arg } => {
                let ty = self.operand_type(module, arg)?;
                Some(ConstValue::Int(
                    i64::try_from(self.ctx.types.size_in_bytes(ty)).ok()?,
                ))
            }
            NodeData::Alignof { arg } => {
                let ty = self.operand_type(module, arg)?;
                Some(ConstValue::Int(
                    i64::try_from(self.ctx.types.align_in_bytes(ty)).ok()?,
                ))
            }
            NodeData::Offsetof { arg, field } => {
                let ty = self.operand_type(module, arg)?;
                let canonical = self.ctx.types.canonical(ty);
                match self.ctx.types.kind(canonical) {
                    TypeKind::Struct(st) => st
                        .fields
                        .iter()
                        .find(|f| !f.is_padding && f.name == field)
                        .map(|f| ConstValue::Int(i64::try_from(f.offset_bytes).unwrap_or(0))),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The semantic type a `sizeof`/`alignof`/`offsetof` argument names:
    /// the resolved type for type expressions, the expression's own type
    /// otherwise.
    fn operand_type(
        &mut self,
        module: ModuleId,
        arg: NodeIndex,
    ) -> Option<sable_syntax::TypeId> {
        match &self.ctx.module(module).arena.get(arg).data {
            NodeData::TypeExpr { resolved, .. } => Some(resolved.ty),
            _ => Some(self.ctx.module(module).arena.get(arg).ty.ty),
        }
    }
}

fn fold_int_binary(op: BinaryOp, lhs: ConstValue, rhs: ConstValue) -> Option<ConstValue> {
    let (a, b) = match (lhs, rhs) {
        (ConstValue::Int(a), ConstValue::Int(b)) => (a, b),
        _ => return None,
    };
    let value = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::Shl => a.wrapping_shl(u32::try_from(b).ok()?),
        BinaryOp::Shr => a.wrapping_shr(u32::try_from(b).ok()?),
        BinaryOp::Eq => return Some(ConstValue::Bool(a == b)),
        BinaryOp::Ne => return Some(ConstValue::Bool(a != b)),
        BinaryOp::Lt => return Some(ConstValue::Bool(a < b)),
        BinaryOp::Le => return Some(ConstValue::Bool(a <= b)),
        BinaryOp::Gt => return Some(ConstValue::Bool(a > b)),
        BinaryOp::Ge => return Some(ConstValue::Bool(a >= b)),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => return None,
    };
    Some(ConstValue::Int(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_folds() {
        assert_eq!(
            fold_int_binary(BinaryOp::Add, ConstValue::Int(2), ConstValue::Int(3)),
            Some(ConstValue::Int(5))
        );
        assert_eq!(
            fold_int_binary(BinaryOp::Shl, ConstValue::Int(1), ConstValue::Int(4)),
            Some(ConstValue::Int(16))
        );
    }

    #[test]
    fn division_by_zero_is_not_a_constant() {
        assert_eq!(
            fold_int_binary(BinaryOp::Div, ConstValue::Int(1), ConstValue::Int(0)),
            None
        );
    }

    #[test]
    fn comparisons_fold_to_bools() {
        assert_eq!(
            fold_int_binary(BinaryOp::Lt, ConstValue::Int(1), ConstValue::Int(2)),
            Some(ConstValue::Bool(true))
        );
    }
}
