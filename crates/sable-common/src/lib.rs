//! Common types and utilities for the Sable compiler.
//!
//! This crate provides foundational types used across all sablec crates:
//! - String interning (`Atom`, `Interner`)
//! - Source spans and locations (`Span`, `Spanned`, `Location`)
//! - Source registry with line maps (`SourceMap`, `SourceFile`)
//! - The diagnostics engine (`DiagnosticEngine`, `Severity`)
//! - Typed index arenas (`Arena`)
//! - The generic dependency graph (`DependencyGraph`)
//! - The compilation target descriptor (`Target`)

// String interning for identifier deduplication
pub mod interner;
pub use interner::{Atom, Interner};

// Common enums - Shared constants to break circular dependencies
pub mod common;
pub use common::{CallConv, Linkage, Mangling, Variadic};

// Span - Source location tracking (byte offsets)
pub mod span;
pub use span::{Location, SourceId, Span, Spanned};

// Source registry and offset -> line/column conversion
pub mod source;
pub use source::{LineMap, SourceFile, SourceMap};

// Diagnostics engine
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticEngine, Severity};

// Typed index arenas
pub mod arena;
pub use arena::Arena;

// Dependency tracking with cycle detection and topological ordering
pub mod depgraph;
pub use depgraph::{DependencyGraph, DependencyOrder};

// Compilation target description
pub mod target;
pub use target::{FfiWidths, LangWidths, Target};
