//! The compilation context.
//!
//! One `Context` per invocation owns everything: sources, interned
//! strings, diagnostics, the target, the semantic type interner, the
//! symbol arena, every module, the two dependency graphs, and the IR
//! type store plus produced IR modules. Dropping the context tears the
//! whole compilation down.

use rustc_hash::FxHashMap;
use sable_common::{
    DependencyGraph, DiagnosticEngine, Interner, Location, SourceId, SourceMap, Target,
};
use sable_syntax::{
    DeclRef, Module, ModuleId, Node, NodeIndex, QualType, SymbolArena, TypeInterner,
};

/// Options fixed at context creation.
#[derive(Clone, Copy, Debug)]
pub struct ContextOptions {
    /// ANSI colour in diagnostics and IR dumps.
    pub use_color: bool,
    /// Render diagnostics with raw byte offsets instead of line/column.
    pub use_byte_positions: bool,
    /// Interner deduplication bound, in bytes.
    pub max_interned_len: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            use_color: false,
            use_byte_positions: false,
            max_interned_len: sable_common::interner::DEFAULT_MAX_INTERNED_LEN,
        }
    }
}

/// Resolves module references to parsed modules.
///
/// The analyser first looks for an already-registered module; only when
/// that fails does it call the loader, which may parse a new source and
/// register a new module. The core itself never touches the filesystem.
pub trait ModuleLoader {
    /// Load (parse) the module named `name`, imported from `importer`.
    /// Returns the new module's id, or `None` when it cannot be found.
    fn load(&mut self, ctx: &mut Context, importer: ModuleId, name: &str) -> Option<ModuleId>;
}

/// The loader used when every module is registered up front; never
/// finds anything.
pub struct NoLoader;

impl ModuleLoader for NoLoader {
    fn load(&mut self, _ctx: &mut Context, _importer: ModuleId, _name: &str) -> Option<ModuleId> {
        None
    }
}

/// Process-wide state for one compilation.
pub struct Context {
    pub options: ContextOptions,
    pub sources: SourceMap,
    pub strings: Interner,
    pub diag: DiagnosticEngine,
    pub target: Target,
    pub types: TypeInterner,
    pub symbols: SymbolArena,
    modules: Vec<Module>,
    /// Semantic types materialised for type declarations
    /// (struct/enum/alias), by declaration.
    pub decl_types: FxHashMap<DeclRef, QualType>,
    /// Module-import ordering.
    pub import_graph: DependencyGraph<ModuleId>,
    /// Top-level declaration ordering.
    pub decl_graph: DependencyGraph<DeclRef>,
    /// IR types produced for this compilation.
    pub ir_types: sable_ir::TypeStore,
    /// IR modules produced for this compilation.
    pub ir_modules: Vec<sable_ir::Module>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ContextOptions::default(), Target::default())
    }

    #[must_use]
    pub fn with_options(options: ContextOptions, target: Target) -> Self {
        let mut diag = DiagnosticEngine::new();
        diag.use_color = options.use_color;
        diag.use_byte_positions = options.use_byte_positions;
        Context {
            options,
            sources: SourceMap::new(),
            strings: Interner::with_bound(options.max_interned_len),
            diag,
            target,
            types: TypeInterner::new(target),
            symbols: SymbolArena::new(),
            modules: Vec::new(),
            decl_types: FxHashMap::default(),
            import_graph: DependencyGraph::new(),
            decl_graph: DependencyGraph::new(),
            ir_types: sable_ir::TypeStore::new(),
            ir_modules: Vec::new(),
        }
    }

    /// Register a source file.
    pub fn add_source(&mut self, name: impl Into<String>, text: impl Into<String>) -> SourceId {
        self.sources.add(name, text)
    }

    /// Create an empty module for a registered source. The parser fills
    /// it in before analysis runs.
    pub fn add_module(&mut self, source: SourceId) -> ModuleId {
        let id = ModuleId(u32::try_from(self.modules.len()).unwrap_or(u32::MAX));
        self.modules.push(Module::new(id, source));
        id
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0 as usize]
    }

    #[must_use]
    pub fn module_ids(&self) -> Vec<ModuleId> {
        (0..self.modules.len())
            .map(|i| ModuleId(u32::try_from(i).unwrap_or(u32::MAX)))
            .collect()
    }

    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Find the module built from the given source.
    #[must_use]
    pub fn module_for_source(&self, source: SourceId) -> Option<ModuleId> {
        self.modules
            .iter()
            .find(|m| m.source == source)
            .map(|m| m.id)
    }

    #[must_use]
    pub fn node(&self, decl: DeclRef) -> &Node {
        self.module(decl.module).arena.get(decl.node)
    }

    pub fn node_mut(&mut self, decl: DeclRef) -> &mut Node {
        self.module_mut(decl.module).arena.get_mut(decl.node)
    }

    /// The location of a node, for diagnostics.
    #[must_use]
    pub fn location(&self, module: ModuleId, node: NodeIndex) -> Location {
        let m = self.module(module);
        Location::new(m.source, m.arena.get(node).span)
    }

    #[must_use]
    pub fn node_location(&self, decl: DeclRef) -> Location {
        self.location(decl.module, decl.node)
    }

    /// A whole-module location (for import-cycle diagnostics).
    #[must_use]
    pub fn module_location(&self, module: ModuleId) -> Location {
        Location::new(self.module(module).source, sable_common::Span::empty_at(0))
    }

    /// The source file name of a module.
    #[must_use]
    pub fn module_source_name(&self, module: ModuleId) -> String {
        self.sources
            .get(self.module(module).source)
            .map_or_else(String::new, |f| f.name.clone())
    }

    /// The declared name of a declaration, for diagnostics.
    #[must_use]
    pub fn decl_name(&self, decl: DeclRef) -> String {
        self.node(decl)
            .data
            .declared_name()
            .map_or_else(String::new, |atom| self.strings.resolve(atom).to_string())
    }

    /// Render a semantic type for diagnostics.
    #[must_use]
    pub fn display_type(&self, qt: QualType) -> String {
        self.types.display_qual(qt, &self.strings)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modules_are_registered_against_sources() {
        let mut ctx = Context::new();
        let source = ctx.add_source("main.sb", "");
        let module = ctx.add_module(source);
        assert_eq!(ctx.module(module).source, source);
        assert_eq!(ctx.module_for_source(source), Some(module));
        assert_eq!(ctx.module_count(), 1);
    }

    #[test]
    fn the_context_owns_ir_state_too() {
        let mut ctx = Context::new();
        let name = ctx.strings.intern("m");
        ctx.ir_modules.push(sable_ir::Module::new(name));
        assert_eq!(ctx.ir_modules.len(), 1);
        assert!(ctx.ir_types.is_ptr(ctx.ir_types.ptr()));
    }
}
