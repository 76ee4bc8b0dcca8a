//! IR modules.
//!
//! A module owns every value it produces in one flat vector (constants,
//! functions, blocks, parameters, globals and instructions) plus the
//! ordered lists of its functions and globals. Functions own their
//! parameters and blocks; blocks own their instructions in order.

use sable_common::{Atom, Linkage, Location};

use crate::types::{TypeStore, TypeId};
use crate::value::{Value, ValueId, ValueKind};

/// One IR translation unit.
#[derive(Debug)]
pub struct Module {
    pub name: Atom,
    values: Vec<Value>,
    pub functions: Vec<ValueId>,
    pub globals: Vec<ValueId>,
}

impl Module {
    #[must_use]
    pub fn new(name: Atom) -> Self {
        Module {
            name,
            values: Vec::new(),
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    /// Append a value to the module's flat value vector.
    pub fn push_value(&mut self, value: Value) -> ValueId {
        let id = ValueId(u32::try_from(self.values.len()).unwrap_or(u32::MAX));
        self.values.push(value);
        id
    }

    #[must_use]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.0 as usize]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.0 as usize]
    }

    /// Number of values ever produced in this module.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    // ========================================================================
    // Constants
    // ========================================================================

    pub fn int_constant(&mut self, location: Location, ty: TypeId, value: i64) -> ValueId {
        self.push_value(Value::new(ValueKind::IntConstant(value), location, ty))
    }

    pub fn float_constant(&mut self, location: Location, ty: TypeId, value: f64) -> ValueId {
        self.push_value(Value::new(ValueKind::FloatConstant(value), location, ty))
    }

    pub fn array_constant(
        &mut self,
        location: Location,
        ty: TypeId,
        data: Vec<u8>,
        is_string: bool,
    ) -> ValueId {
        self.push_value(Value::new(
            ValueKind::ArrayConstant { data, is_string },
            location,
            ty,
        ))
    }

    pub fn void_constant(&mut self, location: Location, types: &TypeStore) -> ValueId {
        self.push_value(Value::new(
            ValueKind::VoidConstant,
            location,
            types.void_(),
        ))
    }

    pub fn poison(&mut self, location: Location, ty: TypeId) -> ValueId {
        self.push_value(Value::new(ValueKind::Poison, location, ty))
    }

    // ========================================================================
    // Functions, blocks and globals
    // ========================================================================

    /// Create a function value of the given function type. Parameter
    /// values are created eagerly, typed from the function type.
    pub fn create_function(
        &mut self,
        location: Location,
        name: Atom,
        function_type: TypeId,
        linkage: Linkage,
        types: &TypeStore,
    ) -> ValueId {
        let param_types: Vec<TypeId> = match types.kind(function_type) {
            crate::types::IrType::Function { params, .. } => params.clone(),
            other => {
                debug_assert!(false, "create_function with non-function type {other:?}");
                Vec::new()
            }
        };

        let mut params = Vec::with_capacity(param_types.len());
        for (index, &ty) in param_types.iter().enumerate() {
            let mut param = Value::new(ValueKind::Parameter { index }, location, ty);
            param.index = i64::try_from(index).unwrap_or(0);
            params.push(self.push_value(param));
        }

        let function = Value::new(
            ValueKind::Function {
                params,
                blocks: Vec::new(),
            },
            location,
            function_type,
        )
        .with_name(Some(name))
        .with_linkage(linkage);

        let id = self.push_value(function);
        self.functions.push(id);
        id
    }

    /// Append a block to a function. The first block appended is the
    /// entry block.
    pub fn append_block(
        &mut self,
        function: ValueId,
        location: Location,
        name: Option<Atom>,
        types: &TypeStore,
    ) -> ValueId {
        let position = self.function_blocks(function).len();
        let block = Value::new(
            ValueKind::Block {
                parent_function: function,
                position,
                instructions: Vec::new(),
            },
            location,
            types.void_(),
        )
        .with_name(name);
        let id = self.push_value(block);

        match &mut self.value_mut(function).kind {
            ValueKind::Function { blocks, .. } => blocks.push(id),
            other => debug_assert!(false, "append_block on non-function {other:?}"),
        }
        id
    }

    /// Parameters of a function value.
    #[must_use]
    pub fn function_params(&self, function: ValueId) -> &[ValueId] {
        match &self.value(function).kind {
            ValueKind::Function { params, .. } => params,
            _ => &[],
        }
    }

    /// Blocks of a function value, in append order.
    #[must_use]
    pub fn function_blocks(&self, function: ValueId) -> &[ValueId] {
        match &self.value(function).kind {
            ValueKind::Function { blocks, .. } => blocks,
            _ => &[],
        }
    }

    /// Instructions of a block, in order.
    #[must_use]
    pub fn block_instructions(&self, block: ValueId) -> &[ValueId] {
        match &self.value(block).kind {
            ValueKind::Block { instructions, .. } => instructions,
            _ => &[],
        }
    }

    /// A block is terminated iff its last instruction is a terminator.
    #[must_use]
    pub fn is_block_terminated(&self, block: ValueId) -> bool {
        self.block_instructions(block)
            .last()
            .is_some_and(|&instr| self.value(instr).kind.is_terminator())
    }

    /// Create an internal-linkage global holding a NUL-terminated string
    /// constant, returning a `ptr`-typed global value suitable for
    /// `call` and `ptradd` operands.
    pub fn create_global_string(
        &mut self,
        location: Location,
        content: &str,
        types: &mut TypeStore,
    ) -> ValueId {
        let mut data = content.as_bytes().to_vec();
        data.push(0);

        let i8 = types.int(8);
        let array_type = types.array(data.len() as u64, i8);
        let element_count = data.len() as u64;
        let init = self.array_constant(location, array_type, data, true);

        let mut global = Value::new(
            ValueKind::GlobalVariable {
                init,
                element_type: array_type,
                element_count,
            },
            location,
            types.ptr(),
        )
        .with_linkage(Linkage::Internal);
        global.index = i64::try_from(self.globals.len()).unwrap_or(0);

        let id = self.push_value(global);
        self.globals.push(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_strings_are_nul_terminated_ptr_values() {
        let mut types = TypeStore::new();
        let mut module = Module::new(Atom(0));
        let global = module.create_global_string(Location::detached(), "Hello, world!", &mut types);

        let value = module.value(global);
        assert!(types.is_ptr(value.ty));
        assert_eq!(value.linkage, Linkage::Internal);

        match &value.kind {
            ValueKind::GlobalVariable {
                init,
                element_type,
                element_count,
            } => {
                assert_eq!(*element_count, 14);
                match types.kind(*element_type) {
                    crate::types::IrType::Array { length, .. } => assert_eq!(*length, 14),
                    other => panic!("expected array element type, got {other:?}"),
                }
                match &module.value(*init).kind {
                    ValueKind::ArrayConstant { data, is_string } => {
                        assert!(*is_string);
                        assert_eq!(data.last(), Some(&0));
                        assert_eq!(&data[..13], b"Hello, world!");
                    }
                    other => panic!("expected array constant, got {other:?}"),
                }
            }
            other => panic!("expected global variable, got {other:?}"),
        }
    }

    #[test]
    fn first_appended_block_is_the_entry() {
        let mut types = TypeStore::new();
        let mut module = Module::new(Atom(0));
        let void_ = types.void_();
        let fn_type = types.function(void_, Vec::new(), sable_common::CallConv::Sable, false);
        let function = module.create_function(
            Location::detached(),
            Atom(1),
            fn_type,
            Linkage::Internal,
            &types,
        );

        let entry = module.append_block(function, Location::detached(), None, &types);
        let second = module.append_block(function, Location::detached(), None, &types);
        assert_eq!(module.function_blocks(function), &[entry, second]);
        assert!(!module.is_block_terminated(entry));
    }
}
