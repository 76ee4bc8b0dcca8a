//! IR validation.
//!
//! The only pass inside the core: every block of every function must end
//! in a terminator (`return`, `branch`, `cond-branch`, `unreachable`).

use sable_common::DiagnosticEngine;

use crate::module::Module;
use crate::value::ValueId;

/// Verify that every block of every function in `module` is terminated.
/// Unterminated blocks are reported through the diagnostics engine.
pub fn validate_module(module: &Module, diag: &mut DiagnosticEngine) {
    for &function in &module.functions {
        validate_function(module, function, diag);
    }
}

fn validate_function(module: &Module, function: ValueId, diag: &mut DiagnosticEngine) {
    for &block in module.function_blocks(function) {
        if !module.is_block_terminated(block) {
            diag.error(
                module.value(block).location,
                "Unterminated block in Sable IR",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::types::TypeStore;
    use sable_common::{Atom, CallConv, Linkage, Location};

    #[test]
    fn unterminated_blocks_are_reported() {
        let mut types = TypeStore::new();
        let mut module = Module::new(Atom(0));
        let void_ = types.void_();
        let fn_type = types.function(void_, Vec::new(), CallConv::Sable, false);
        let function = module.create_function(
            Location::detached(),
            Atom(1),
            fn_type,
            Linkage::Internal,
            &types,
        );
        let entry = module.append_block(function, Location::detached(), None, &types);

        let mut builder = Builder::new(&mut module, &mut types);
        builder.position_at_end(entry);
        builder.build_nop(Location::detached());

        let mut diag = DiagnosticEngine::new();
        validate_module(&module, &mut diag);
        assert!(diag.has_reported_errors());

        // Terminate it and the error goes away.
        let mut builder = Builder::new(&mut module, &mut types);
        builder.position_at_end(entry);
        builder.build_return_void(Location::detached());

        let mut diag = DiagnosticEngine::new();
        validate_module(&module, &mut diag);
        assert!(!diag.has_reported_errors());
    }
}
