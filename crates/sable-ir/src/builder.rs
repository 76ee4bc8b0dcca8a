//! The instruction builder.
//!
//! A builder is a cursor over one module: it tracks the current
//! insertion function, block, and index within that block, and exposes a
//! typed constructor per instruction. It owns nothing.
//!
//! After every insertion the builder re-indexes the current function's
//! non-void instructions so SSA values carry dense increasing indices
//! beginning at the parameter count; the indices exist solely for the
//! textual form.

use sable_common::{Atom, CallConv, Location};
use tracing::trace;

use crate::module::Module;
use crate::types::{IrType, TypeStore, TypeId};
use crate::value::{
    BinaryOp, BuiltinKind, CastOp, FloatPredicate, IntPredicate, UnaryOp, Value, ValueId,
    ValueKind,
};

/// Cursor-style instruction constructor for one module.
pub struct Builder<'a> {
    module: &'a mut Module,
    types: &'a mut TypeStore,
    function: Option<ValueId>,
    block: Option<ValueId>,
    insert_index: usize,
}

impl<'a> Builder<'a> {
    #[must_use]
    pub fn new(module: &'a mut Module, types: &'a mut TypeStore) -> Self {
        Builder {
            module,
            types,
            function: None,
            block: None,
            insert_index: 0,
        }
    }

    #[must_use]
    pub fn module(&self) -> &Module {
        self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        self.module
    }

    pub fn types_mut(&mut self) -> &mut TypeStore {
        self.types
    }

    #[must_use]
    pub fn current_function(&self) -> Option<ValueId> {
        self.function
    }

    #[must_use]
    pub fn current_block(&self) -> Option<ValueId> {
        self.block
    }

    // ========================================================================
    // Cursor positioning
    // ========================================================================

    /// Position the cursor after the last instruction of `block`.
    pub fn position_at_end(&mut self, block: ValueId) {
        let value = self.module.value(block);
        let (parent, len) = match &value.kind {
            ValueKind::Block {
                parent_function,
                instructions,
                ..
            } => (*parent_function, instructions.len()),
            other => panic!("position_at_end on non-block {other:?}"),
        };
        self.function = Some(parent);
        self.block = Some(block);
        self.insert_index = len;
    }

    fn position_relative(&mut self, instruction: ValueId, offset: usize) {
        let block = self
            .module
            .value(instruction)
            .parent_block
            .expect("instruction is not inserted in a block");
        let index = self
            .module
            .block_instructions(block)
            .iter()
            .position(|&i| i == instruction)
            .expect("instruction not present in its parent block");
        self.position_at_end(block);
        self.insert_index = index + offset;
    }

    /// Position the cursor immediately before `instruction`.
    pub fn position_before(&mut self, instruction: ValueId) {
        self.position_relative(instruction, 0);
    }

    /// Position the cursor immediately after `instruction`.
    pub fn position_after(&mut self, instruction: ValueId) {
        self.position_relative(instruction, 1);
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Place `value` at the cursor and advance it. Non-void indices of
    /// the whole function are refreshed afterwards.
    pub fn insert(&mut self, value: Value) -> ValueId {
        assert!(
            value.kind.is_instruction(),
            "only instructions can be inserted"
        );
        let block = self.block.expect("builder has no insertion block");
        let id = self.module.push_value(value);
        self.module.value_mut(id).parent_block = Some(block);

        match &mut self.module.value_mut(block).kind {
            ValueKind::Block { instructions, .. } => {
                instructions.insert(self.insert_index, id);
            }
            other => panic!("insertion block is not a block: {other:?}"),
        }
        self.insert_index += 1;

        self.recalculate_instruction_indices();
        trace!(value = id.0, "inserted instruction");
        id
    }

    /// Assign dense indices to every non-void instruction of the current
    /// function, starting at the parameter count. Void-typed
    /// instructions carry index 0.
    fn recalculate_instruction_indices(&mut self) {
        let function = self.function.expect("builder has no insertion function");
        let mut index = i64::try_from(self.module.function_params(function).len()).unwrap_or(0);

        let blocks: Vec<ValueId> = self.module.function_blocks(function).to_vec();
        for block in blocks {
            let instructions: Vec<ValueId> = self.module.block_instructions(block).to_vec();
            for instruction in instructions {
                let is_void = self.types.is_void(self.module.value(instruction).ty);
                let value = self.module.value_mut(instruction);
                if is_void {
                    value.index = 0;
                } else {
                    value.index = index;
                    index += 1;
                }
            }
        }
    }

    fn instruction(&mut self, location: Location, kind: ValueKind, ty: TypeId) -> ValueId {
        self.insert(Value::new(kind, location, ty))
    }

    // ========================================================================
    // Instruction constructors
    // ========================================================================

    pub fn build_nop(&mut self, location: Location) -> ValueId {
        let void_ = self.types.void_();
        self.instruction(location, ValueKind::Nop, void_)
    }

    /// Stack allocation; always `ptr`-typed, the element type is carried
    /// on the instruction.
    pub fn build_alloca(
        &mut self,
        location: Location,
        element_type: TypeId,
        element_count: u64,
    ) -> ValueId {
        let ptr = self.types.ptr();
        self.instruction(
            location,
            ValueKind::Alloca {
                element_type,
                element_count,
            },
            ptr,
        )
    }

    pub fn build_load(&mut self, location: Location, address: ValueId, ty: TypeId) -> ValueId {
        assert!(
            self.types.is_ptr(self.module.value(address).ty),
            "load address must be ptr-typed"
        );
        self.instruction(location, ValueKind::Load { address }, ty)
    }

    pub fn build_store(&mut self, location: Location, address: ValueId, value: ValueId) -> ValueId {
        assert!(
            self.types.is_ptr(self.module.value(address).ty),
            "store address must be ptr-typed"
        );
        let void_ = self.types.void_();
        self.instruction(location, ValueKind::Store { address, value }, void_)
    }

    /// Pointer + integer offset -> pointer.
    pub fn build_ptradd(
        &mut self,
        location: Location,
        address: ValueId,
        offset: ValueId,
    ) -> ValueId {
        assert!(
            self.types.is_ptr(self.module.value(address).ty),
            "ptradd address must be ptr-typed"
        );
        assert!(
            self.types.is_integer(self.module.value(offset).ty),
            "ptradd offset must be integer-typed"
        );
        let ptr = self.types.ptr();
        self.instruction(location, ValueKind::PtrAdd { address, offset }, ptr)
    }

    pub fn build_call(
        &mut self,
        location: Location,
        callee: ValueId,
        callee_type: TypeId,
        args: Vec<ValueId>,
        name: Option<Atom>,
    ) -> ValueId {
        let (return_type, param_types, calling_convention, variadic) =
            match self.types.kind(callee_type) {
                IrType::Function {
                    return_type,
                    params,
                    calling_convention,
                    variadic,
                } => (*return_type, params.clone(), *calling_convention, *variadic),
                other => panic!("call callee type is not a function: {other:?}"),
            };

        if variadic {
            assert!(args.len() >= param_types.len(), "call argument count");
        } else {
            assert_eq!(args.len(), param_types.len(), "call argument count");
        }
        for (arg, &param_ty) in args.iter().zip(param_types.iter()) {
            assert_eq!(
                self.module.value(*arg).ty,
                param_ty,
                "call argument type mismatch"
            );
        }

        let id = self.instruction(
            location,
            ValueKind::Call {
                callee,
                callee_type,
                args,
                calling_convention,
            },
            return_type,
        );
        self.module.value_mut(id).name = name;
        id
    }

    pub fn build_return(&mut self, location: Location, value: ValueId) -> ValueId {
        let void_ = self.types.void_();
        self.instruction(location, ValueKind::Return { value: Some(value) }, void_)
    }

    pub fn build_return_void(&mut self, location: Location) -> ValueId {
        let void_ = self.types.void_();
        self.instruction(location, ValueKind::Return { value: None }, void_)
    }

    pub fn build_unreachable(&mut self, location: Location) -> ValueId {
        let void_ = self.types.void_();
        self.instruction(location, ValueKind::Unreachable, void_)
    }

    pub fn build_branch(&mut self, location: Location, target: ValueId) -> ValueId {
        assert!(self.module.value(target).is_block(), "branch target");
        let void_ = self.types.void_();
        self.instruction(location, ValueKind::Branch { target }, void_)
    }

    pub fn build_cond_branch(
        &mut self,
        location: Location,
        condition: ValueId,
        pass: ValueId,
        fail: ValueId,
    ) -> ValueId {
        assert!(
            self.types.is_integer(self.module.value(condition).ty),
            "cond-branch condition must be integer-typed"
        );
        assert!(self.module.value(pass).is_block(), "cond-branch pass target");
        assert!(self.module.value(fail).is_block(), "cond-branch fail target");
        let void_ = self.types.void_();
        self.instruction(
            location,
            ValueKind::CondBranch {
                condition,
                pass,
                fail,
            },
            void_,
        )
    }

    pub fn build_phi(&mut self, location: Location, ty: TypeId) -> ValueId {
        self.instruction(
            location,
            ValueKind::Phi {
                incoming: Vec::new(),
            },
            ty,
        )
    }

    /// Append an incoming `(value, block)` pair to a phi, preserving
    /// insertion order.
    pub fn phi_add_incoming(&mut self, phi: ValueId, value: ValueId, block: ValueId) {
        assert_eq!(
            self.module.value(value).ty,
            self.module.value(phi).ty,
            "phi incoming value type"
        );
        assert!(self.module.value(block).is_block(), "phi incoming block");
        match &mut self.module.value_mut(phi).kind {
            ValueKind::Phi { incoming } => incoming.push((value, block)),
            other => panic!("phi_add_incoming on non-phi {other:?}"),
        }
    }

    pub fn build_unary(&mut self, location: Location, op: UnaryOp, operand: ValueId) -> ValueId {
        let ty = self.module.value(operand).ty;
        self.instruction(location, ValueKind::Unary { op, operand }, ty)
    }

    pub fn build_binary(
        &mut self,
        location: Location,
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
    ) -> ValueId {
        let lhs_ty = self.module.value(lhs).ty;
        let rhs_ty = self.module.value(rhs).ty;
        assert_eq!(lhs_ty, rhs_ty, "binary operand types must match");
        if op.is_float_op() {
            assert!(self.types.is_float(lhs_ty), "float op on non-float operands");
        } else {
            assert!(
                self.types.is_integer(lhs_ty),
                "integer op on non-integer operands"
            );
        }
        self.instruction(location, ValueKind::Binary { op, lhs, rhs }, lhs_ty)
    }

    /// Integer comparison; the result is `int1`.
    pub fn build_icmp(
        &mut self,
        location: Location,
        predicate: IntPredicate,
        lhs: ValueId,
        rhs: ValueId,
    ) -> ValueId {
        let lhs_ty = self.module.value(lhs).ty;
        let rhs_ty = self.module.value(rhs).ty;
        assert_eq!(lhs_ty, rhs_ty, "icmp operand types must match");
        let int1 = self.types.int(1);
        self.instruction(
            location,
            ValueKind::ICmp {
                predicate,
                lhs,
                rhs,
            },
            int1,
        )
    }

    /// Float comparison; the result is `int1`.
    pub fn build_fcmp(
        &mut self,
        location: Location,
        predicate: FloatPredicate,
        lhs: ValueId,
        rhs: ValueId,
    ) -> ValueId {
        let lhs_ty = self.module.value(lhs).ty;
        let rhs_ty = self.module.value(rhs).ty;
        assert_eq!(lhs_ty, rhs_ty, "fcmp operand types must match");
        assert!(self.types.is_float(lhs_ty), "fcmp on non-float operands");
        let int1 = self.types.int(1);
        self.instruction(
            location,
            ValueKind::FCmp {
                predicate,
                lhs,
                rhs,
            },
            int1,
        )
    }

    pub fn build_cast(
        &mut self,
        location: Location,
        op: CastOp,
        operand: ValueId,
        to: TypeId,
    ) -> ValueId {
        let from = self.module.value(operand).ty;
        match op {
            CastOp::Zext | CastOp::Sext | CastOp::Trunc => {
                assert!(
                    self.types.is_integer(from) && self.types.is_integer(to),
                    "integer cast on non-integer types"
                );
            }
            CastOp::FpExt | CastOp::FpTrunc => {
                assert!(
                    self.types.is_float(from) && self.types.is_float(to),
                    "float cast on non-float types"
                );
            }
            CastOp::FpToUi | CastOp::FpToSi => {
                assert!(self.types.is_float(from) && self.types.is_integer(to));
            }
            CastOp::UiToFp | CastOp::SiToFp => {
                assert!(self.types.is_integer(from) && self.types.is_float(to));
            }
            CastOp::Bitcast => {}
        }
        self.instruction(location, ValueKind::Cast { op, operand }, to)
    }

    pub fn build_bitcast(&mut self, location: Location, operand: ValueId, to: TypeId) -> ValueId {
        self.build_cast(location, CastOp::Bitcast, operand, to)
    }

    /// `builtin @memset(address, value, count)`; produces no value.
    pub fn build_builtin_memset(
        &mut self,
        location: Location,
        address: ValueId,
        value: ValueId,
        count: ValueId,
    ) -> ValueId {
        assert!(self.types.is_ptr(self.module.value(address).ty));
        let void_ = self.types.void_();
        self.instruction(
            location,
            ValueKind::Builtin {
                kind: BuiltinKind::Memset,
                args: vec![address, value, count],
            },
            void_,
        )
    }

    /// `builtin @memcopy(source, destination, count)`; produces no value.
    pub fn build_builtin_memcopy(
        &mut self,
        location: Location,
        source: ValueId,
        destination: ValueId,
        count: ValueId,
    ) -> ValueId {
        assert!(self.types.is_ptr(self.module.value(source).ty));
        assert!(self.types.is_ptr(self.module.value(destination).ty));
        let void_ = self.types.void_();
        self.instruction(
            location,
            ValueKind::Builtin {
                kind: BuiltinKind::Memcopy,
                args: vec![source, destination, count],
            },
            void_,
        )
    }

    /// Convenience constant constructors that forward to the module.
    pub fn int_constant(&mut self, location: Location, ty: TypeId, value: i64) -> ValueId {
        self.module.int_constant(location, ty, value)
    }

    pub fn float_constant(&mut self, location: Location, ty: TypeId, value: f64) -> ValueId {
        self.module.float_constant(location, ty, value)
    }

    /// Get the call convention declared by a function type. Used by IR
    /// generation when lowering calls.
    #[must_use]
    pub fn calling_convention_of(&self, function_type: TypeId) -> Option<CallConv> {
        match self.types.kind(function_type) {
            IrType::Function {
                calling_convention, ..
            } => Some(*calling_convention),
            _ => None,
        }
    }
}
