//! The language-level type system.
//!
//! Semantic types are interned in a context-wide [`TypeInterner`] and
//! addressed by [`TypeId`]. Structural shapes (ints, pointers, arrays,
//! function types, ...) are hash-consed; nominal types (structs, enums,
//! aliases, template parameters) are materialised once per declaration
//! and never merged.
//!
//! Expression and element types are [`QualType`]s: a `TypeId` plus a
//! modifiability bit, so a `mut`-reference to `T` is a distinct shape
//! from a plain reference to `T`.

use rustc_hash::FxHashMap;
use sable_common::{Atom, CallConv, Interner, Target, Variadic};

use crate::node::DeclRef;

/// A handle to an interned semantic type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// The error-absorbing type; conversions into and out of poison are
    /// silent no-ops.
    pub const POISON: TypeId = TypeId(0);
    /// Not yet analysed.
    pub const UNKNOWN: TypeId = TypeId(1);
    /// The type of type expressions.
    pub const TYPE: TypeId = TypeId(2);
    pub const VOID: TypeId = TypeId(3);
    pub const NORETURN: TypeId = TypeId(4);
}

/// A type plus outer modifiability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QualType {
    pub ty: TypeId,
    pub mutable: bool,
}

impl QualType {
    #[inline]
    #[must_use]
    pub const fn of(ty: TypeId) -> Self {
        QualType { ty, mutable: false }
    }

    #[inline]
    #[must_use]
    pub const fn of_mut(ty: TypeId) -> Self {
        QualType { ty, mutable: true }
    }

    /// The same type with outer modifiability removed. Copies never keep
    /// the source's modifiability.
    #[inline]
    #[must_use]
    pub const fn as_immutable(self) -> Self {
        QualType {
            ty: self.ty,
            mutable: false,
        }
    }
}

impl From<TypeId> for QualType {
    fn from(ty: TypeId) -> Self {
        QualType::of(ty)
    }
}

/// A field of a struct type, including synthesised padding fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: Atom,
    pub ty: QualType,
    /// Byte offset from the start of the struct; cached by layout.
    pub offset_bytes: u64,
    /// True for synthesised `i8[n]` padding fields.
    pub is_padding: bool,
}

/// A struct type materialised from a declaration (or a nested variant).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructType {
    /// The declaration this type was materialised from, if any.
    pub decl: Option<DeclRef>,
    pub name: Atom,
    /// Enclosing struct type for nested variants.
    pub parent: Option<TypeId>,
    pub fields: Vec<StructField>,
    /// Nested variant struct types.
    pub variants: Vec<TypeId>,
    /// Cached by layout; `size_bytes % align_bytes == 0`.
    pub size_bytes: u64,
    pub align_bytes: u64,
}

/// The shape of a semantic type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Poison,
    Unknown,
    /// The type of type expressions.
    Type,
    Void,
    Noreturn,
    Bool {
        width: u32,
        /// Spelled `bool` (platform-sized) rather than `b<width>`.
        platform: bool,
    },
    Int {
        signed: bool,
        width: u32,
        /// Spelled `int`/`uint` rather than `i<width>`/`u<width>`.
        platform: bool,
    },
    Float {
        width: u32,
        platform: bool,
    },
    /// A value-or-error pair type.
    ErrorPair {
        value: QualType,
        error: QualType,
    },
    /// The transient type of a reference to an overload set, before
    /// overload resolution picks a declaration.
    OverloadSet,
    Nilable {
        elem: QualType,
    },
    /// Fixed-length (possibly multi-rank) array.
    Array {
        elem: QualType,
        lengths: Vec<u64>,
    },
    Slice {
        elem: QualType,
    },
    /// Automatically dereferenced pointer-like type.
    Reference {
        elem: QualType,
    },
    /// Single-object pointer; no arithmetic.
    Pointer {
        elem: QualType,
    },
    /// Pointer with arithmetic and indexing.
    Buffer {
        elem: QualType,
    },
    Function {
        return_type: QualType,
        params: Vec<QualType>,
        calling_convention: CallConv,
        variadic: Variadic,
    },
    Struct(StructType),
    Enum {
        decl: DeclRef,
        name: Atom,
        underlying: TypeId,
    },
    Alias {
        decl: DeclRef,
        name: Atom,
        underlying: QualType,
        /// Strict aliases do not convert freely to their underlying type.
        strict: bool,
    },
    TemplateParam {
        decl: DeclRef,
        name: Atom,
    },
}

impl TypeKind {
    /// Nominal kinds are materialised per declaration and never merged.
    #[must_use]
    const fn is_nominal(&self) -> bool {
        matches!(
            self,
            TypeKind::Struct(_)
                | TypeKind::Enum { .. }
                | TypeKind::Alias { .. }
                | TypeKind::TemplateParam { .. }
        )
    }
}

/// Well-known target-dependent types, created once per context.
#[derive(Clone, Copy, Debug)]
pub struct Primitives {
    pub bool_: TypeId,
    /// Platform-width signed `int`.
    pub int_: TypeId,
    /// Platform-width unsigned `uint`.
    pub uint: TypeId,
    /// Platform `float`.
    pub float_: TypeId,
    /// `i8`, the element of padding arrays and string data.
    pub i8: TypeId,
}

/// Context-wide storage and uniquing for semantic types.
#[derive(Debug)]
pub struct TypeInterner {
    types: Vec<TypeKind>,
    dedup: FxHashMap<TypeKind, TypeId>,
    target: Target,
    prims: Primitives,
}

impl TypeInterner {
    #[must_use]
    pub fn new(target: Target) -> Self {
        let mut interner = TypeInterner {
            types: Vec::new(),
            dedup: FxHashMap::default(),
            target,
            prims: Primitives {
                bool_: TypeId::UNKNOWN,
                int_: TypeId::UNKNOWN,
                uint: TypeId::UNKNOWN,
                float_: TypeId::UNKNOWN,
                i8: TypeId::UNKNOWN,
            },
        };

        // Fixed order backing the TypeId constants.
        let poison = interner.intern(TypeKind::Poison);
        let unknown = interner.intern(TypeKind::Unknown);
        let ty = interner.intern(TypeKind::Type);
        let void = interner.intern(TypeKind::Void);
        let noreturn = interner.intern(TypeKind::Noreturn);
        debug_assert_eq!(poison, TypeId::POISON);
        debug_assert_eq!(unknown, TypeId::UNKNOWN);
        debug_assert_eq!(ty, TypeId::TYPE);
        debug_assert_eq!(void, TypeId::VOID);
        debug_assert_eq!(noreturn, TypeId::NORETURN);

        interner.prims = Primitives {
            bool_: interner.intern(TypeKind::Bool {
                width: target.lang.size_of_bool,
                platform: true,
            }),
            int_: interner.intern(TypeKind::Int {
                signed: true,
                width: target.lang.size_of_int,
                platform: true,
            }),
            uint: interner.intern(TypeKind::Int {
                signed: false,
                width: target.lang.size_of_int,
                platform: true,
            }),
            float_: interner.intern(TypeKind::Float {
                width: target.lang.size_of_float,
                platform: true,
            }),
            i8: interner.intern(TypeKind::Int {
                signed: true,
                width: 8,
                platform: false,
            }),
        };

        interner
    }

    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    #[must_use]
    pub fn prims(&self) -> &Primitives {
        &self.prims
    }

    /// Intern a structural type, reusing an existing id when the shape
    /// was seen before. Nominal kinds always get a fresh id.
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if !kind.is_nominal() {
            if let Some(&id) = self.dedup.get(&kind) {
                return id;
            }
        }
        let id = TypeId(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        if !kind.is_nominal() {
            self.dedup.insert(kind.clone(), id);
        }
        self.types.push(kind);
        id
    }

    /// Materialise a nominal type; never merged with an equal shape.
    pub fn declare(&mut self, kind: TypeKind) -> TypeId {
        debug_assert!(kind.is_nominal());
        let id = TypeId(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        self.types.push(kind);
        id
    }

    #[must_use]
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.types[id.0 as usize]
    }

    /// Mutable access to a nominal type's kind. Structural types are
    /// shared through the dedup table and must not be mutated.
    pub fn kind_mut(&mut self, id: TypeId) -> &mut TypeKind {
        debug_assert!(self.types[id.0 as usize].is_nominal());
        &mut self.types[id.0 as usize]
    }

    /// Replace a struct type's fields and cached layout. Only valid for
    /// ids produced by [`TypeInterner::declare`] with a struct kind.
    pub fn set_struct_layout(
        &mut self,
        id: TypeId,
        fields: Vec<StructField>,
        size_bytes: u64,
        align_bytes: u64,
    ) {
        match &mut self.types[id.0 as usize] {
            TypeKind::Struct(st) => {
                st.fields = fields;
                st.size_bytes = size_bytes;
                st.align_bytes = align_bytes;
            }
            other => debug_assert!(false, "set_struct_layout on non-struct {other:?}"),
        }
    }

    /// Number of stored types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // ========================================================================
    // Canonicalisation and classifiers
    // ========================================================================

    /// Follow (non-strict) aliases to the underlying type.
    #[must_use]
    pub fn canonical(&self, id: TypeId) -> TypeId {
        let mut current = id;
        loop {
            match self.kind(current) {
                TypeKind::Alias {
                    underlying,
                    strict: false,
                    ..
                } => current = underlying.ty,
                _ => return current,
            }
        }
    }

    #[must_use]
    pub fn is_poison(&self, id: TypeId) -> bool {
        id == TypeId::POISON
    }

    #[must_use]
    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.kind(self.canonical(id)), TypeKind::Void)
    }

    #[must_use]
    pub fn is_noreturn(&self, id: TypeId) -> bool {
        matches!(self.kind(self.canonical(id)), TypeKind::Noreturn)
    }

    #[must_use]
    pub fn is_bool(&self, id: TypeId) -> bool {
        matches!(self.kind(self.canonical(id)), TypeKind::Bool { .. })
    }

    #[must_use]
    pub fn is_int(&self, id: TypeId) -> bool {
        matches!(self.kind(self.canonical(id)), TypeKind::Int { .. })
    }

    #[must_use]
    pub fn is_signed_int(&self, id: TypeId) -> bool {
        matches!(
            self.kind(self.canonical(id)),
            TypeKind::Int { signed: true, .. }
        )
    }

    #[must_use]
    pub fn is_float(&self, id: TypeId) -> bool {
        matches!(self.kind(self.canonical(id)), TypeKind::Float { .. })
    }

    /// Numeric means int or float; `bool` is not numeric.
    #[must_use]
    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.is_int(id) || self.is_float(id)
    }

    #[must_use]
    pub fn is_reference(&self, id: TypeId) -> bool {
        matches!(self.kind(self.canonical(id)), TypeKind::Reference { .. })
    }

    #[must_use]
    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.kind(self.canonical(id)), TypeKind::Pointer { .. })
    }

    #[must_use]
    pub fn is_buffer(&self, id: TypeId) -> bool {
        matches!(self.kind(self.canonical(id)), TypeKind::Buffer { .. })
    }

    #[must_use]
    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.kind(self.canonical(id)), TypeKind::Array { .. })
    }

    #[must_use]
    pub fn is_struct(&self, id: TypeId) -> bool {
        matches!(self.kind(self.canonical(id)), TypeKind::Struct(_))
    }

    #[must_use]
    pub fn is_function(&self, id: TypeId) -> bool {
        matches!(self.kind(self.canonical(id)), TypeKind::Function { .. })
    }

    /// The element type of a reference/pointer/buffer/slice/array/nilable.
    #[must_use]
    pub fn element(&self, id: TypeId) -> Option<QualType> {
        match self.kind(self.canonical(id)) {
            TypeKind::Reference { elem }
            | TypeKind::Pointer { elem }
            | TypeKind::Buffer { elem }
            | TypeKind::Slice { elem }
            | TypeKind::Array { elem, .. }
            | TypeKind::Nilable { elem } => Some(*elem),
            _ => None,
        }
    }

    /// Strip any number of outer reference shapes.
    #[must_use]
    pub fn strip_references(&self, qt: QualType) -> QualType {
        let mut current = qt;
        loop {
            match self.kind(self.canonical(current.ty)) {
                TypeKind::Reference { elem } => current = *elem,
                _ => return current,
            }
        }
    }

    // ========================================================================
    // Sizing
    // ========================================================================

    /// Size of a value of this type, in bits.
    #[must_use]
    pub fn size_in_bits(&self, id: TypeId) -> u64 {
        match self.kind(self.canonical(id)) {
            TypeKind::Poison
            | TypeKind::Unknown
            | TypeKind::Type
            | TypeKind::Void
            | TypeKind::Noreturn
            | TypeKind::OverloadSet
            | TypeKind::TemplateParam { .. } => 0,
            TypeKind::Bool { width, .. }
            | TypeKind::Int { width, .. }
            | TypeKind::Float { width, .. } => u64::from(*width),
            TypeKind::ErrorPair { value, error } => {
                self.size_in_bits(value.ty) + self.size_in_bits(error.ty)
            }
            TypeKind::Nilable { elem } => {
                self.size_in_bits(elem.ty) + u64::from(self.target.lang.size_of_bool)
            }
            TypeKind::Array { elem, lengths } => {
                let count: u64 = lengths.iter().product();
                self.size_in_bytes(elem.ty) * count * 8
            }
            TypeKind::Slice { .. } => u64::from(self.target.size_of_pointer) * 2,
            TypeKind::Reference { .. }
            | TypeKind::Pointer { .. }
            | TypeKind::Buffer { .. }
            | TypeKind::Function { .. } => u64::from(self.target.size_of_pointer),
            TypeKind::Struct(st) => st.size_bytes * 8,
            TypeKind::Enum { underlying, .. } => self.size_in_bits(*underlying),
            TypeKind::Alias { underlying, .. } => self.size_in_bits(underlying.ty),
        }
    }

    /// Alignment of a value of this type, in bits.
    #[must_use]
    pub fn align_in_bits(&self, id: TypeId) -> u64 {
        match self.kind(self.canonical(id)) {
            TypeKind::Poison
            | TypeKind::Unknown
            | TypeKind::Type
            | TypeKind::Void
            | TypeKind::Noreturn
            | TypeKind::OverloadSet
            | TypeKind::TemplateParam { .. } => 8,
            TypeKind::Bool { width, .. }
            | TypeKind::Int { width, .. }
            | TypeKind::Float { width, .. } => u64::from((*width).max(8)),
            TypeKind::ErrorPair { value, error } => self
                .align_in_bits(value.ty)
                .max(self.align_in_bits(error.ty)),
            TypeKind::Nilable { elem } | TypeKind::Array { elem, .. } => {
                self.align_in_bits(elem.ty)
            }
            TypeKind::Slice { .. }
            | TypeKind::Reference { .. }
            | TypeKind::Pointer { .. }
            | TypeKind::Buffer { .. }
            | TypeKind::Function { .. } => u64::from(self.target.align_of_pointer),
            TypeKind::Struct(st) => st.align_bytes.max(1) * 8,
            TypeKind::Enum { underlying, .. } => self.align_in_bits(*underlying),
            TypeKind::Alias { underlying, .. } => self.align_in_bits(underlying.ty),
        }
    }

    /// Size in whole bytes (bits rounded up).
    #[must_use]
    pub fn size_in_bytes(&self, id: TypeId) -> u64 {
        self.size_in_bits(id).div_ceil(8)
    }

    /// Alignment in whole bytes (bits rounded up).
    #[must_use]
    pub fn align_in_bytes(&self, id: TypeId) -> u64 {
        self.align_in_bits(id).div_ceil(8)
    }

    // ========================================================================
    // Display
    // ========================================================================

    /// Render a type the way diagnostics spell it.
    #[must_use]
    pub fn display(&self, id: TypeId, interner: &Interner) -> String {
        self.display_qual(QualType::of(id), interner)
    }

    /// Render a qualified type the way diagnostics spell it.
    #[must_use]
    pub fn display_qual(&self, qt: QualType, interner: &Interner) -> String {
        let inner = match self.kind(qt.ty) {
            TypeKind::Poison => "poison".to_string(),
            TypeKind::Unknown => "unknown".to_string(),
            TypeKind::Type => "type".to_string(),
            TypeKind::Void => "void".to_string(),
            TypeKind::Noreturn => "noreturn".to_string(),
            TypeKind::Bool { width, platform } => {
                if *platform {
                    "bool".to_string()
                } else {
                    format!("b{width}")
                }
            }
            TypeKind::Int {
                signed,
                width,
                platform,
            } => match (platform, signed) {
                (true, true) => "int".to_string(),
                (true, false) => "uint".to_string(),
                (false, true) => format!("i{width}"),
                (false, false) => format!("u{width}"),
            },
            TypeKind::Float { width, platform } => {
                if *platform {
                    "float".to_string()
                } else {
                    format!("f{width}")
                }
            }
            TypeKind::ErrorPair { value, error } => format!(
                "{}!{}",
                self.display_qual(*error, interner),
                self.display_qual(*value, interner)
            ),
            TypeKind::OverloadSet => "overload set".to_string(),
            TypeKind::Nilable { elem } => format!("{}?", self.display_qual(*elem, interner)),
            TypeKind::Array { elem, lengths } => {
                let dims = lengths
                    .iter()
                    .map(|l| l.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}[{dims}]", self.display_qual(*elem, interner))
            }
            TypeKind::Slice { elem } => format!("{}[]", self.display_qual(*elem, interner)),
            TypeKind::Reference { elem } => format!("&{}", self.display_qual(*elem, interner)),
            TypeKind::Pointer { elem } => format!("*{}", self.display_qual(*elem, interner)),
            TypeKind::Buffer { elem } => format!("[*]{}", self.display_qual(*elem, interner)),
            TypeKind::Function {
                return_type,
                params,
                ..
            } => {
                let params = params
                    .iter()
                    .map(|p| self.display_qual(*p, interner))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "{}({params})",
                    self.display_qual(*return_type, interner)
                )
            }
            TypeKind::Struct(st) => {
                let name = interner.resolve(st.name);
                if name.is_empty() {
                    "struct".to_string()
                } else {
                    format!("struct {name}")
                }
            }
            TypeKind::Enum { name, .. } => format!("enum {}", interner.resolve(*name)),
            TypeKind::Alias { name, .. } => interner.resolve(*name).to_string(),
            TypeKind::TemplateParam { name, .. } => interner.resolve(*name).to_string(),
        };

        if qt.mutable {
            format!("mut {inner}")
        } else {
            inner
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interner() -> TypeInterner {
        TypeInterner::new(Target::default())
    }

    #[test]
    fn well_known_ids_are_stable() {
        let types = interner();
        assert!(matches!(types.kind(TypeId::POISON), TypeKind::Poison));
        assert!(matches!(types.kind(TypeId::TYPE), TypeKind::Type));
        assert!(matches!(types.kind(TypeId::VOID), TypeKind::Void));
        assert!(matches!(types.kind(TypeId::NORETURN), TypeKind::Noreturn));
    }

    #[test]
    fn structural_types_are_deduplicated() {
        let mut types = interner();
        let a = types.intern(TypeKind::Int {
            signed: true,
            width: 32,
            platform: false,
        });
        let b = types.intern(TypeKind::Int {
            signed: true,
            width: 32,
            platform: false,
        });
        assert_eq!(a, b);

        let ptr_a = types.intern(TypeKind::Pointer {
            elem: QualType::of(a),
        });
        let ptr_b = types.intern(TypeKind::Pointer {
            elem: QualType::of(b),
        });
        assert_eq!(ptr_a, ptr_b);
    }

    #[test]
    fn nominal_types_are_never_merged() {
        let mut types = interner();
        let decl = DeclRef::synthetic();
        let a = types.declare(TypeKind::Struct(StructType {
            decl: Some(decl),
            name: Atom::EMPTY,
            parent: None,
            fields: Vec::new(),
            variants: Vec::new(),
            size_bytes: 0,
            align_bytes: 1,
        }));
        let b = types.declare(TypeKind::Struct(StructType {
            decl: Some(decl),
            name: Atom::EMPTY,
            parent: None,
            fields: Vec::new(),
            variants: Vec::new(),
            size_bytes: 0,
            align_bytes: 1,
        }));
        assert_ne!(a, b);
    }

    #[test]
    fn platform_int_differs_from_sized_int() {
        let mut types = interner();
        let i64_ = types.intern(TypeKind::Int {
            signed: true,
            width: 64,
            platform: false,
        });
        assert_ne!(types.prims().int_, i64_);
        assert_eq!(types.size_in_bits(types.prims().int_), 64);
        assert_eq!(types.size_in_bits(i64_), 64);
    }

    #[test]
    fn display_spells_primitives_like_source() {
        let mut types = interner();
        let strings = Interner::new();
        assert_eq!(types.display(types.prims().int_, &strings), "int");
        assert_eq!(types.display(types.prims().bool_, &strings), "bool");
        let i8 = types.prims().i8;
        assert_eq!(types.display(i8, &strings), "i8");
        let buf = types.intern(TypeKind::Buffer {
            elem: QualType::of(i8),
        });
        assert_eq!(types.display(buf, &strings), "[*]i8");
        let mref = types.intern(TypeKind::Reference {
            elem: QualType::of_mut(i8),
        });
        assert_eq!(types.display(mref, &strings), "&mut i8");
    }

    #[test]
    fn aliases_canonicalise_to_their_underlying_type() {
        let mut types = interner();
        let int_ = types.prims().int_;
        let alias = types.declare(TypeKind::Alias {
            decl: DeclRef::synthetic(),
            name: Atom::EMPTY,
            underlying: QualType::of(int_),
            strict: false,
        });
        assert_eq!(types.canonical(alias), int_);
        assert!(types.is_int(alias));

        let strict = types.declare(TypeKind::Alias {
            decl: DeclRef::synthetic(),
            name: Atom::EMPTY,
            underlying: QualType::of(int_),
            strict: true,
        });
        assert_eq!(types.canonical(strict), strict);
    }

    #[test]
    fn array_sizes_multiply_out() {
        let mut types = interner();
        let i8 = types.prims().i8;
        let arr = types.intern(TypeKind::Array {
            elem: QualType::of(i8),
            lengths: vec![4, 8],
        });
        assert_eq!(types.size_in_bytes(arr), 32);
        assert_eq!(types.align_in_bytes(arr), 1);
    }
}
