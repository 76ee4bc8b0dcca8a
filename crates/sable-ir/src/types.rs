//! IR value types.
//!
//! IR types are opaque and structural: `void`, an opaque `ptr` with no
//! pointee, sized integers and floats, arrays, structs and function
//! types. The `void`/`ptr` singletons and integer/float widths are
//! memoised per store; arrays, structs and functions are allocated per
//! request and kept alive by the store.

use rustc_hash::FxHashMap;
use sable_common::{Atom, CallConv};

/// Handle to a type in a [`TypeStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

/// The shape of an IR type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IrType {
    Void,
    /// Opaque pointer; no pointee type.
    Pointer,
    Integer {
        width: u32,
    },
    Float {
        /// 32 or 64.
        width: u32,
    },
    Array {
        length: u64,
        element: TypeId,
    },
    Struct {
        /// Named structs print as `@name` and are listed in the module
        /// header; unnamed ones print literally.
        name: Option<Atom>,
        fields: Vec<TypeId>,
    },
    Function {
        return_type: TypeId,
        params: Vec<TypeId>,
        calling_convention: CallConv,
        variadic: bool,
    },
}

/// Owns every IR type of a compilation context.
#[derive(Debug)]
pub struct TypeStore {
    types: Vec<IrType>,
    void_: TypeId,
    ptr: TypeId,
    ints: FxHashMap<u32, TypeId>,
    float32: TypeId,
    float64: TypeId,
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeStore {
    #[must_use]
    pub fn new() -> Self {
        let mut store = TypeStore {
            types: Vec::new(),
            void_: TypeId(0),
            ptr: TypeId(0),
            ints: FxHashMap::default(),
            float32: TypeId(0),
            float64: TypeId(0),
        };
        store.void_ = store.push(IrType::Void);
        store.ptr = store.push(IrType::Pointer);
        store.float32 = store.push(IrType::Float { width: 32 });
        store.float64 = store.push(IrType::Float { width: 64 });
        store
    }

    fn push(&mut self, ty: IrType) -> TypeId {
        let id = TypeId(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        self.types.push(ty);
        id
    }

    #[must_use]
    pub fn kind(&self, id: TypeId) -> &IrType {
        &self.types[id.0 as usize]
    }

    /// The unique `void` type.
    #[must_use]
    pub fn void_(&self) -> TypeId {
        self.void_
    }

    /// The unique opaque pointer type.
    #[must_use]
    pub fn ptr(&self) -> TypeId {
        self.ptr
    }

    /// The integer type of the given bit width; memoised.
    pub fn int(&mut self, width: u32) -> TypeId {
        debug_assert!(width > 0);
        if let Some(&id) = self.ints.get(&width) {
            return id;
        }
        let id = self.push(IrType::Integer { width });
        self.ints.insert(width, id);
        id
    }

    #[must_use]
    pub fn float32(&self) -> TypeId {
        self.float32
    }

    #[must_use]
    pub fn float64(&self) -> TypeId {
        self.float64
    }

    /// A fresh array type. Not deduplicated.
    pub fn array(&mut self, length: u64, element: TypeId) -> TypeId {
        self.push(IrType::Array { length, element })
    }

    /// A fresh (possibly named) struct type. Not deduplicated.
    pub fn struct_(&mut self, name: Option<Atom>, fields: Vec<TypeId>) -> TypeId {
        self.push(IrType::Struct { name, fields })
    }

    /// A fresh function type. Not deduplicated.
    pub fn function(
        &mut self,
        return_type: TypeId,
        params: Vec<TypeId>,
        calling_convention: CallConv,
        variadic: bool,
    ) -> TypeId {
        self.push(IrType::Function {
            return_type,
            params,
            calling_convention,
            variadic,
        })
    }

    #[must_use]
    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.kind(id), IrType::Void)
    }

    #[must_use]
    pub fn is_ptr(&self, id: TypeId) -> bool {
        matches!(self.kind(id), IrType::Pointer)
    }

    #[must_use]
    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(self.kind(id), IrType::Integer { .. })
    }

    #[must_use]
    pub fn is_float(&self, id: TypeId) -> bool {
        matches!(self.kind(id), IrType::Float { .. })
    }

    #[must_use]
    pub fn is_function(&self, id: TypeId) -> bool {
        matches!(self.kind(id), IrType::Function { .. })
    }

    /// Return type of a function type.
    #[must_use]
    pub fn return_type(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            IrType::Function { return_type, .. } => Some(*return_type),
            _ => None,
        }
    }

    /// Every named struct type, in creation order.
    pub fn named_structs(&self) -> impl Iterator<Item = (TypeId, Atom, &[TypeId])> {
        self.types.iter().enumerate().filter_map(|(i, t)| match t {
            IrType::Struct {
                name: Some(name),
                fields,
            } => Some((
                TypeId(u32::try_from(i).unwrap_or(u32::MAX)),
                *name,
                fields.as_slice(),
            )),
            _ => None,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_memoised() {
        let mut store = TypeStore::new();
        assert_eq!(store.void_(), store.void_());
        assert_eq!(store.int(32), store.int(32));
        assert_ne!(store.int(32), store.int(64));
        assert_ne!(store.float32(), store.float64());
    }

    #[test]
    fn arrays_are_allocated_per_request() {
        let mut store = TypeStore::new();
        let i8 = store.int(8);
        let a = store.array(14, i8);
        let b = store.array(14, i8);
        assert_ne!(a, b);
        assert_eq!(store.kind(a), store.kind(b));
    }

    #[test]
    fn named_structs_are_listed() {
        let mut store = TypeStore::new();
        let i32_ = store.int(32);
        store.struct_(None, vec![i32_]);
        store.struct_(Some(Atom(5)), vec![i32_, i32_]);
        let named: Vec<_> = store.named_structs().collect();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].1, Atom(5));
    }
}
