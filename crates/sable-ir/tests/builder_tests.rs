//! Builder behaviour: cursor positioning, dense SSA indexing, operand
//! checking and phi construction.

use sable_common::{CallConv, Interner, Linkage, Location};
use sable_ir::{Builder, IntPredicate, Module, TypeStore, ValueKind, validate_module};

fn loc() -> Location {
    Location::detached()
}

#[test]
fn non_void_indices_are_dense_and_start_at_param_count() {
    let mut strings = Interner::new();
    let mut types = TypeStore::new();
    let mut module = Module::new(strings.intern("m"));

    let int32 = types.int(32);
    let fn_type = types.function(int32, vec![int32, int32], CallConv::Sable, false);
    let function = module.create_function(
        loc(),
        strings.intern("sum3"),
        fn_type,
        Linkage::Exported,
        &types,
    );
    let entry = module.append_block(function, loc(), None, &types);

    let params: Vec<_> = module.function_params(function).to_vec();
    assert_eq!(params.len(), 2);

    let mut builder = Builder::new(&mut module, &mut types);
    builder.position_at_end(entry);
    let a = builder.build_binary(loc(), sable_ir::BinaryOp::Add, params[0], params[1]);
    builder.build_nop(loc());
    let b = builder.build_binary(loc(), sable_ir::BinaryOp::Add, a, params[0]);
    builder.build_return(loc(), b);

    // Two parameters, so instruction indices begin at 2. Void-typed
    // instructions (nop, return) carry index 0.
    assert_eq!(module.value(a).index, 2);
    assert_eq!(module.value(b).index, 3);

    let instructions = module.block_instructions(entry);
    assert_eq!(instructions.len(), 4);
    assert_eq!(module.value(instructions[1]).index, 0);
    assert_eq!(module.value(instructions[3]).index, 0);
}

#[test]
fn inserting_before_renumbers_later_instructions() {
    let mut strings = Interner::new();
    let mut types = TypeStore::new();
    let mut module = Module::new(strings.intern("m"));

    let int32 = types.int(32);
    let fn_type = types.function(int32, vec![int32], CallConv::Sable, false);
    let function = module.create_function(
        loc(),
        strings.intern("f"),
        fn_type,
        Linkage::Internal,
        &types,
    );
    let entry = module.append_block(function, loc(), None, &types);
    let param = module.function_params(function)[0];

    let mut builder = Builder::new(&mut module, &mut types);
    builder.position_at_end(entry);
    let first = builder.build_binary(loc(), sable_ir::BinaryOp::Add, param, param);
    builder.build_return(loc(), first);
    assert_eq!(module.value(first).index, 1);

    let mut builder = Builder::new(&mut module, &mut types);
    builder.position_before(first);
    let earlier = builder.build_binary(loc(), sable_ir::BinaryOp::Mul, param, param);

    // The new instruction takes the old index; the later one moves up.
    assert_eq!(module.value(earlier).index, 1);
    assert_eq!(module.value(first).index, 2);

    let order: Vec<_> = module
        .block_instructions(entry)
        .iter()
        .map(|&i| module.value(i).index)
        .collect();
    assert_eq!(order, vec![1, 2, 0]);
}

#[test]
fn alloca_is_ptr_typed_and_carries_its_element_type() {
    let mut strings = Interner::new();
    let mut types = TypeStore::new();
    let mut module = Module::new(strings.intern("m"));

    let void_ = types.void_();
    let int64 = types.int(64);
    let fn_type = types.function(void_, Vec::new(), CallConv::Sable, false);
    let function = module.create_function(
        loc(),
        strings.intern("locals"),
        fn_type,
        Linkage::Internal,
        &types,
    );
    let entry = module.append_block(function, loc(), None, &types);

    let mut builder = Builder::new(&mut module, &mut types);
    builder.position_at_end(entry);
    let slot = builder.build_alloca(loc(), int64, 1);
    let value = builder.int_constant(loc(), int64, 42);
    builder.build_store(loc(), slot, value);
    let loaded = builder.build_load(loc(), slot, int64);
    builder.build_return_void(loc());

    assert!(types.is_ptr(module.value(slot).ty));
    match module.value(slot).kind {
        ValueKind::Alloca {
            element_type,
            element_count,
        } => {
            assert_eq!(element_type, int64);
            assert_eq!(element_count, 1);
        }
        ref other => panic!("expected alloca, got {other:?}"),
    }
    assert_eq!(module.value(loaded).ty, int64);
}

#[test]
fn phi_keeps_incoming_pairs_in_insertion_order() {
    let mut strings = Interner::new();
    let mut types = TypeStore::new();
    let mut module = Module::new(strings.intern("m"));

    let int1 = types.int(1);
    let int32 = types.int(32);
    let fn_type = types.function(int32, vec![int1], CallConv::Sable, false);
    let function = module.create_function(
        loc(),
        strings.intern("select"),
        fn_type,
        Linkage::Exported,
        &types,
    );

    let entry = module.append_block(function, loc(), Some(strings.intern("entry")), &types);
    let then_block = module.append_block(function, loc(), Some(strings.intern("then")), &types);
    let else_block = module.append_block(function, loc(), Some(strings.intern("else")), &types);
    let join = module.append_block(function, loc(), Some(strings.intern("join")), &types);
    let condition = module.function_params(function)[0];

    let one = module.int_constant(loc(), int32, 1);
    let two = module.int_constant(loc(), int32, 2);

    let mut builder = Builder::new(&mut module, &mut types);
    builder.position_at_end(entry);
    builder.build_cond_branch(loc(), condition, then_block, else_block);
    builder.position_at_end(then_block);
    builder.build_branch(loc(), join);
    builder.position_at_end(else_block);
    builder.build_branch(loc(), join);
    builder.position_at_end(join);
    let phi = builder.build_phi(loc(), int32);
    builder.phi_add_incoming(phi, one, then_block);
    builder.phi_add_incoming(phi, two, else_block);
    builder.build_return(loc(), phi);

    match &module.value(phi).kind {
        ValueKind::Phi { incoming } => {
            assert_eq!(incoming.as_slice(), &[(one, then_block), (two, else_block)]);
        }
        other => panic!("expected phi, got {other:?}"),
    }

    let mut diag = sable_common::DiagnosticEngine::new();
    validate_module(&module, &mut diag);
    assert!(!diag.has_reported_errors());
}

#[test]
fn icmp_results_are_int1() {
    let mut strings = Interner::new();
    let mut types = TypeStore::new();
    let mut module = Module::new(strings.intern("m"));

    let int64 = types.int(64);
    let fn_type = types.function(types.void_(), vec![int64, int64], CallConv::Sable, false);
    let function = module.create_function(
        loc(),
        strings.intern("cmp"),
        fn_type,
        Linkage::Internal,
        &types,
    );
    let entry = module.append_block(function, loc(), None, &types);
    let params: Vec<_> = module.function_params(function).to_vec();

    let mut builder = Builder::new(&mut module, &mut types);
    builder.position_at_end(entry);
    let eq = builder.build_icmp(loc(), IntPredicate::Eq, params[0], params[1]);
    builder.build_return_void(loc());

    let int1 = types.int(1);
    assert_eq!(module.value(eq).ty, int1);
}

#[test]
fn every_value_stays_reachable_from_the_module() {
    let mut strings = Interner::new();
    let mut types = TypeStore::new();
    let mut module = Module::new(strings.intern("m"));

    let int32 = types.int(32);
    let fn_type = types.function(int32, Vec::new(), CallConv::Sable, false);
    let function = module.create_function(
        loc(),
        strings.intern("f"),
        fn_type,
        Linkage::Internal,
        &types,
    );
    let entry = module.append_block(function, loc(), None, &types);

    let mut builder = Builder::new(&mut module, &mut types);
    builder.position_at_end(entry);
    let zero = builder.int_constant(loc(), int32, 0);
    builder.build_return(loc(), zero);

    // Function, block, constant and instruction all live in the module's
    // flat value vector.
    let produced = module.value_count();
    assert!(produced >= 4);
    for i in 0..produced {
        let _ = module.value(sable_ir::ValueId(u32::try_from(i).unwrap()));
    }
}
