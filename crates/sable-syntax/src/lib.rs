//! AST and language-level type system for the Sable compiler.
//!
//! This crate provides:
//! - `NodeArena` / `Node` - the per-module AST node store
//! - `Module` - a translation unit and its arenas
//! - `Scope` - lexical value/type scopes
//! - `Symbol` / `SymbolArena` - import/export symbol tables
//! - `TypeInterner` / `TypeId` / `QualType` - semantic types
//!
//! The parser (out of tree) fills a `Module` with nodes; the analyser in
//! `sable-sema` drives every node to its analysed state.

pub mod node;
pub use node::{
    CastKind, ConstValue, DeclAttrs, DeclRef, ImportQuery, ModuleId, Node, NodeArena, NodeData,
    NodeFlags, NodeIndex, SemaState, TypeExpr, ValueCategory,
};

pub mod ops;
pub use ops::{BinaryOp, UnaryOp};

pub mod module;
pub use module::Module;

pub mod scope;
pub use scope::{Namespace, Scope, ScopeId};

pub mod symbol;
pub use symbol::{Symbol, SymbolArena, SymbolId, SymbolKind};

pub mod types;
pub use types::{
    Primitives, QualType, StructField, StructType, TypeId, TypeInterner, TypeKind,
};
