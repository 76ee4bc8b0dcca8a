//! Golden tests for the textual IR form.

use sable_common::{CallConv, Interner, Linkage, Location};
use sable_ir::{Builder, Module, TypeStore, print_module};

fn loc() -> Location {
    Location::detached()
}

/// A module exporting `main` which calls an imported C-variadic
/// `printf` with a string literal and returns 0.
fn build_hello(strings: &mut Interner, types: &mut TypeStore) -> Module {
    let mut module = Module::new(strings.intern("hello"));

    let int32 = types.int(32);
    let ptr = types.ptr();

    let printf_type = types.function(int32, vec![ptr], CallConv::C, true);
    let printf = module.create_function(
        loc(),
        strings.intern("printf"),
        printf_type,
        Linkage::Imported,
        types,
    );

    let main_type = types.function(int32, Vec::new(), CallConv::C, false);
    let main = module.create_function(
        loc(),
        strings.intern("main"),
        main_type,
        Linkage::Exported,
        types,
    );
    let entry = module.append_block(main, loc(), Some(strings.intern("entry")), types);

    let greeting = module.create_global_string(loc(), "Hello, world!", types);

    let mut builder = Builder::new(&mut module, types);
    builder.position_at_end(entry);
    builder.build_call(loc(), printf, printf_type, vec![greeting], None);
    let zero = builder.int_constant(loc(), int32, 0);
    builder.build_return(loc(), zero);

    module
}

#[test]
fn hello_world_prints_the_expected_module() {
    let mut strings = Interner::new();
    let mut types = TypeStore::new();
    let module = build_hello(&mut strings, &mut types);

    let printed = print_module(&module, &types, &strings, false);
    let expected = "\
; Sable IR Module: hello
define @global.0 = int8[14] \"Hello, world!\\00\"

declare ccc @printf(ptr %0) variadic -> int32

define exported ccc @main() -> int32 {
%entry:
  %0 = call ccc int32 @printf(ptr @global.0)
  return int32 0
}
";
    assert_eq!(printed, expected);
}

#[test]
fn printing_is_deterministic() {
    let mut strings = Interner::new();
    let mut types = TypeStore::new();
    let module = build_hello(&mut strings, &mut types);

    let first = print_module(&module, &types, &strings, false);
    let second = print_module(&module, &types, &strings, false);
    assert_eq!(first, second);
}

#[test]
fn phi_prints_incoming_pairs_in_insertion_order() {
    let mut strings = Interner::new();
    let mut types = TypeStore::new();
    let mut module = Module::new(strings.intern("phis"));

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

    let printed = print_module(&module, &types, &strings, false);
    let expected = "\
; Sable IR Module: phis
define exported sablecc @select(int1 %0) -> int32 {
%entry:
  branch %0, %then, %else
%then:
  branch %join
%else:
  branch %join
%join:
  %1 = phi int32 [ 1, %then ], [ 2, %else ]
  return int32 %1
}
";
    assert_eq!(printed, expected);
}

#[test]
fn unnamed_blocks_get_positional_labels() {
    let mut strings = Interner::new();
    let mut types = TypeStore::new();
    let mut module = Module::new(strings.intern("bb"));

    let void_ = types.void_();
    let fn_type = types.function(void_, Vec::new(), CallConv::Sable, false);
    let function = module.create_function(
        loc(),
        strings.intern("f"),
        fn_type,
        Linkage::Internal,
        &types,
    );
    let first = module.append_block(function, loc(), None, &types);
    let second = module.append_block(function, loc(), None, &types);

    let mut builder = Builder::new(&mut module, &mut types);
    builder.position_at_end(first);
    builder.build_branch(loc(), second);
    builder.position_at_end(second);
    builder.build_return_void(loc());

    let printed = print_module(&module, &types, &strings, false);
    assert!(printed.contains("%_bb0:\n  branch %_bb1\n%_bb1:\n  return\n"));
}

#[test]
fn non_ascii_string_bytes_are_escaped() {
    let mut strings = Interner::new();
    let mut types = TypeStore::new();
    let mut module = Module::new(strings.intern("esc"));
    module.create_global_string(loc(), "a\nb", &mut types);

    let printed = print_module(&module, &types, &strings, false);
    assert!(printed.contains("define @global.0 = int8[4] \"a\\0Ab\\00\""));
}
