//! Semantic analyser for the Sable compiler.
//!
//! The analyser drives parsed modules to their analysed state in five
//! steps:
//!
//! 1. resolve import declarations to module references (parsing new
//!    files is delegated to a [`ModuleLoader`]);
//! 2. build every module's import/export symbol tables, in module
//!    dependency order;
//! 3. generate the dependency graph over top-level declarations;
//! 4. resolve declared types in topological order;
//! 5. fully analyse every node in the same order.
//!
//! Import cycles and declaration cycles are the only fatal failures;
//! everything else recovers locally by poisoning the failing node.

pub mod context;
pub use context::{Context, ContextOptions, ModuleLoader, NoLoader};

mod analyse;
mod convert;
mod decls;
mod depends;
mod eval;
mod exprs;
mod imports;
mod layout;

pub use convert::significant_bits;
pub use layout::compute_struct_layout;

use sable_common::DependencyOrder;
use sable_syntax::DeclRef;
use tracing::debug;

/// The analyser's transient state: a cursor over one context.
pub(crate) struct Sema<'a> {
    pub ctx: &'a mut Context,
    /// The lexical scope statements and expressions resolve against.
    pub scope: sable_syntax::ScopeId,
    /// Return types of the function declarations being analysed,
    /// innermost last.
    pub return_stack: Vec<sable_syntax::QualType>,
}

/// Run semantic analysis over every module in `ctx`.
///
/// On return, every reachable node is either `Done` or error-dependent;
/// diagnostics are buffered on the context. Cyclic imports or cyclic
/// declarations stop the analysis after reporting a single fatal
/// diagnostic.
pub fn analyse(ctx: &mut Context, loader: &mut dyn ModuleLoader) {
    let mut sema = Sema {
        ctx,
        scope: sable_syntax::ScopeId(0),
        return_stack: Vec::new(),
    };

    // Step 1: make every referenced module available and record the
    // import edges.
    sema.resolve_all_imports(loader);

    let module_order = match sema.ctx.import_graph.ordered_entities() {
        DependencyOrder::Ordered(order) => order,
        DependencyOrder::Cycle { from, to } => {
            let from_name = sema.ctx.module_source_name(from);
            let to_name = sema.ctx.module_source_name(to);
            let location = sema.ctx.module_location(from);
            sema.ctx.diag.fatal(
                location,
                format!(
                    "Cyclic dependency detected. Module '{from_name}' depends on '{to_name}', and vice versa."
                ),
            );
            return;
        }
    };

    // Step 2: import/export symbol tables, importees first.
    for module in module_order {
        sema.build_symbol_tables(module);
    }

    // Step 3: dependency edges between top-level declarations.
    let module_ids: Vec<_> = sema.ctx.module_ids();
    for module in module_ids {
        sema.generate_dependencies(module);
    }

    let decl_order: Vec<DeclRef> = match sema.ctx.decl_graph.ordered_entities() {
        DependencyOrder::Ordered(order) => order,
        DependencyOrder::Cycle { from, to } => {
            let from_name = sema.ctx.decl_name(from);
            let to_name = sema.ctx.decl_name(to);
            let from_location = sema.ctx.node_location(from);
            let to_location = sema.ctx.node_location(to);
            sema.ctx.diag.fatal(
                from_location,
                format!(
                    "Cyclic dependency detected. '{from_name}' depends on '{to_name}', and vice versa."
                ),
            );
            sema.ctx
                .diag
                .note(to_location, format!("'{to_name}' declared here."));
            return;
        }
    };

    debug!(decls = decl_order.len(), "declaration order resolved");

    // Step 4: declared types only, dependencies first.
    for &decl in &decl_order {
        sema.scope = sema.ctx.module(decl.module).root_scope;
        sema.resolve_top_level_type(decl);
    }

    // Step 5: full analysis, same order.
    for &decl in &decl_order {
        sema.scope = sema.ctx.module(decl.module).root_scope;
        sema.analyse_node(decl.module, decl.node, None);
    }
}
