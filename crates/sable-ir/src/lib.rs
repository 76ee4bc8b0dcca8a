//! Typed intermediate representation for the Sable compiler.
//!
//! This crate provides:
//! - `TypeStore` / `TypeId` - opaque IR value types
//! - `Module` / `Value` / `ValueId` - the per-module value graph
//! - `Builder` - cursor-style instruction construction
//! - `validate` - the block-termination validation pass
//! - `print_module` - the textual IR form used by tests and debugging
//!
//! IR generation (out of tree) drives the builder against analysed
//! modules; backends consume either the value graph or the textual form.

pub mod types;
pub use types::{IrType, TypeId, TypeStore};

pub mod value;
pub use value::{
    BinaryOp, BuiltinKind, CastOp, FloatPredicate, IntPredicate, UnaryOp, Value, ValueId,
    ValueKind,
};

pub mod module;
pub use module::Module;

pub mod builder;
pub use builder::Builder;

pub mod validate;
pub use validate::validate_module;

pub mod print;
pub use print::print_module;
