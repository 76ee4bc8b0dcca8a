//! End-to-end analyser behaviour over hand-built modules.

mod common;

use common::{AstBuilder, has_diagnostic, rendered_diagnostics};
use sable_common::{CallConv, Linkage};
use sable_sema::{Context, NoLoader, analyse};
use sable_syntax::{NodeData, SemaState, TypeExpr, TypeKind};

#[test]
fn small_int_initialisers_fold_into_evaluated_constants() {
    let mut ctx = Context::new();
    let binding = {
        let mut ast = AstBuilder::new(&mut ctx, "m.sb", "var x: i8 = 100;");
        let i8 = ast.ty_int(8);
        let init = ast.lit_int(100);
        ast.binding("x", i8, Some(init))
    };
    let module = ctx.module_ids()[0];

    analyse(&mut ctx, &mut NoLoader);

    assert!(
        !ctx.diag.has_reported_errors(),
        "unexpected diagnostics: {:?}",
        rendered_diagnostics(&ctx)
    );

    let initializer = match &ctx.module(module).arena.get(binding).data {
        NodeData::Binding { initializer, .. } => initializer.expect("initialiser survives"),
        other => panic!("expected binding, got {other:?}"),
    };
    let init_node = ctx.module(module).arena.get(initializer);
    match &init_node.data {
        NodeData::EvaluatedConstant { value, .. } => {
            assert_eq!(*value, sable_syntax::ConstValue::Int(100));
        }
        other => panic!("expected an evaluated constant wrapper, got {other:?}"),
    }
    assert_eq!(ctx.display_type(init_node.ty), "i8");
}

#[test]
fn oversized_int_initialisers_are_rejected_by_significant_bits() {
    let mut ctx = Context::new();
    {
        let mut ast = AstBuilder::new(&mut ctx, "m.sb", "var x: i8 = 200;");
        let i8 = ast.ty_int(8);
        let init = ast.lit_int(200);
        ast.binding("x", i8, Some(init));
    }

    analyse(&mut ctx, &mut NoLoader);

    assert!(has_diagnostic(
        &ctx,
        "Expression of type int is not convertible to i8"
    ));
}

#[test]
fn boundary_values_still_fit_their_declared_width() {
    let mut ctx = Context::new();
    {
        let mut ast = AstBuilder::new(&mut ctx, "m.sb", "");
        let i8_a = ast.ty_int(8);
        let max = ast.lit_int(127);
        ast.binding("a", i8_a, Some(max));
        let i8_b = ast.ty_int(8);
        let min = ast.lit_int(-128);
        ast.binding("b", i8_b, Some(min));
    }

    analyse(&mut ctx, &mut NoLoader);
    assert!(
        !ctx.diag.has_reported_errors(),
        "unexpected diagnostics: {:?}",
        rendered_diagnostics(&ctx)
    );
}

#[test]
fn call_arity_mismatches_are_reported() {
    let mut ctx = Context::new();
    {
        let mut ast = AstBuilder::new(&mut ctx, "m.sb", "");
        // f(a: i32, b: i32) -> void, declaration only.
        let a_ty = ast.ty_int(32);
        let b_ty = ast.ty_int(32);
        let a = ast.param("a", a_ty);
        let b = ast.param("b", b_ty);
        let void_ = ast.ty_void();
        ast.function("f", vec![a, b], void_, None);

        // main calls f(1).
        let callee = ast.name_ref(&["f"]);
        let one = ast.lit_int(1);
        let call = ast.node(NodeData::Call {
            callee,
            args: vec![one],
        });
        let body = ast.compound(vec![call]);
        let ret = ast.ty_void();
        ast.function("entry", Vec::new(), ret, Some(body));
    }

    analyse(&mut ctx, &mut NoLoader);

    assert!(has_diagnostic(&ctx, "Expected 2 arguments to call, got 1."));
}

#[test]
fn assigning_to_an_immutable_parameter_is_an_error_and_analysis_continues() {
    let mut ctx = Context::new();
    {
        let mut ast = AstBuilder::new(&mut ctx, "m.sb", "");
        let x_ty = ast.ty_int(32);
        let x = ast.param("x", x_ty);

        let lhs = ast.name_ref(&["x"]);
        let rhs = ast.lit_int(1);
        let assign = ast.node(NodeData::Assign { lhs, rhs });

        // A later statement that must still be analysed.
        let later_ty = ast.ty_int(8);
        let later_init = ast.lit_int(300);
        let later_name = ast.atom("y");
        let later = ast.node(NodeData::Binding {
            name: later_name,
            attrs: sable_syntax::DeclAttrs::default(),
            type_expr: later_ty,
            initializer: Some(later_init),
        });

        let body = ast.compound(vec![assign, later]);
        let ret = ast.ty_void();
        ast.function("g", vec![x], ret, Some(body));
    }

    analyse(&mut ctx, &mut NoLoader);

    assert!(has_diagnostic(
        &ctx,
        "Left-hand side of assignment is not mutable"
    ));
    // Analysis continued past the failed assignment.
    assert!(has_diagnostic(
        &ctx,
        "Expression of type int is not convertible to i8"
    ));
}

#[test]
fn main_acquires_the_c_calling_convention_and_exported_linkage() {
    let mut ctx = Context::new();
    let main = {
        let mut ast = AstBuilder::new(&mut ctx, "m.sb", "");
        let ret_ty = ast.ty_int(32);
        let zero = ast.lit_int(0);
        let ret = ast.node(NodeData::Return { value: Some(zero) });
        let body = ast.compound(vec![ret]);
        ast.function("main", Vec::new(), ret_ty, Some(body))
    };
    let module = ctx.module_ids()[0];

    analyse(&mut ctx, &mut NoLoader);

    assert!(
        !ctx.diag.has_reported_errors(),
        "unexpected diagnostics: {:?}",
        rendered_diagnostics(&ctx)
    );
    match &ctx.module(module).arena.get(main).data {
        NodeData::Function { attrs, .. } => {
            assert_eq!(attrs.calling_convention, CallConv::C);
            assert_eq!(attrs.linkage, Linkage::Exported);
        }
        other => panic!("expected function, got {other:?}"),
    }
}

#[test]
fn returning_a_value_from_a_void_function_is_an_error() {
    let mut ctx = Context::new();
    {
        let mut ast = AstBuilder::new(&mut ctx, "m.sb", "");
        let zero = ast.lit_int(0);
        let ret = ast.node(NodeData::Return { value: Some(zero) });
        let body = ast.compound(vec![ret]);
        let void_ = ast.ty_void();
        ast.function("f", Vec::new(), void_, Some(body));
    }

    analyse(&mut ctx, &mut NoLoader);
    assert!(has_diagnostic(
        &ctx,
        "Cannot return a value from a void function."
    ));
}

#[test]
fn declaration_order_does_not_matter_for_struct_fields() {
    let mut ctx = Context::new();
    let (user_struct, point_struct) = {
        let mut ast = AstBuilder::new(&mut ctx, "m.sb", "");

        // `User` is declared first but depends on `Point`.
        let point_ty = ast.ty_named("Point");
        let p_name = ast.atom("p");
        let p_field = ast.node(NodeData::StructField {
            name: p_name,
            type_expr: point_ty,
            initializer: None,
        });
        let tag_ty = ast.ty_int(8);
        let tag_name = ast.atom("tag");
        let tag_field = ast.node(NodeData::StructField {
            name: tag_name,
            type_expr: tag_ty,
            initializer: None,
        });
        let user_name = ast.atom("User");
        let user = ast.node(NodeData::Struct {
            name: user_name,
            attrs: sable_syntax::DeclAttrs::default(),
            template_params: Vec::new(),
            fields: vec![p_field, tag_field],
            variants: Vec::new(),
        });
        ast.top(user);

        let x_ty = ast.ty_int(64);
        let x_name = ast.atom("x");
        let x_field = ast.node(NodeData::StructField {
            name: x_name,
            type_expr: x_ty,
            initializer: None,
        });
        let y_ty = ast.ty_int(64);
        let y_name = ast.atom("y");
        let y_field = ast.node(NodeData::StructField {
            name: y_name,
            type_expr: y_ty,
            initializer: None,
        });
        let point_name = ast.atom("Point");
        let point = ast.node(NodeData::Struct {
            name: point_name,
            attrs: sable_syntax::DeclAttrs::default(),
            template_params: Vec::new(),
            fields: vec![x_field, y_field],
            variants: Vec::new(),
        });
        ast.top(point);

        (user, point)
    };
    let module = ctx.module_ids()[0];

    analyse(&mut ctx, &mut NoLoader);

    assert!(
        !ctx.diag.has_reported_errors(),
        "unexpected diagnostics: {:?}",
        rendered_diagnostics(&ctx)
    );

    let user_decl = sable_syntax::DeclRef::new(module, user_struct);
    let point_decl = sable_syntax::DeclRef::new(module, point_struct);
    let user_ty = ctx.decl_types[&user_decl];
    let point_ty = ctx.decl_types[&point_decl];

    assert_eq!(ctx.types.size_in_bytes(point_ty.ty), 16);
    // Point (16) + tag (1) + 7 bytes of tail padding.
    assert_eq!(ctx.types.size_in_bytes(user_ty.ty), 24);
    assert_eq!(ctx.types.align_in_bytes(user_ty.ty), 8);

    match ctx.types.kind(user_ty.ty) {
        TypeKind::Struct(st) => {
            assert_eq!(st.size_bytes % st.align_bytes, 0);
            for field in st.fields.iter().filter(|f| !f.is_padding) {
                let falign = ctx.types.align_in_bytes(field.ty.ty);
                assert_eq!(field.offset_bytes % falign, 0);
            }
        }
        other => panic!("expected struct kind, got {other:?}"),
    }
}

#[test]
fn analysis_is_deterministic_across_identical_runs() {
    let build = || {
        let mut ctx = Context::new();
        {
            let mut ast = AstBuilder::new(&mut ctx, "m.sb", "var x: i8 = 200;");
            let i8 = ast.ty_int(8);
            let init = ast.lit_int(200);
            ast.binding("x", i8, Some(init));
            let u = ast.ty_int(8);
            let v = ast.lit_int(5);
            ast.binding("y", u, Some(v));
        }
        analyse(&mut ctx, &mut NoLoader);
        rendered_diagnostics(&ctx)
    };

    assert_eq!(build(), build());
}

#[test]
fn every_top_level_node_finishes_analysis() {
    let mut ctx = Context::new();
    {
        let mut ast = AstBuilder::new(&mut ctx, "m.sb", "");
        let i8 = ast.ty_int(8);
        let bad = ast.lit_int(200);
        ast.binding("x", i8, Some(bad));
        let ret = ast.ty_void();
        let body = ast.compound(Vec::new());
        ast.function("f", Vec::new(), ret, Some(body));
    }
    let module = ctx.module_ids()[0];

    analyse(&mut ctx, &mut NoLoader);

    // After analysis no node is in progress: everything is done or
    // error-dependent.
    for (_, node) in ctx.module(module).arena.iter() {
        assert_ne!(node.state, SemaState::InProgress);
        if node.state == SemaState::Unanalysed {
            assert!(
                node.data.is_type_expr() || node.is_errored() || !node.data.is_decl(),
                "unanalysed declaration left behind: {:?}",
                node.data
            );
        }
    }
}

#[test]
fn designated_initialisers_report_a_clean_error() {
    let mut ctx = Context::new();
    {
        let mut ast = AstBuilder::new(&mut ctx, "m.sb", "");
        let x_ty = ast.ty_int(32);
        let x_name = ast.atom("x");
        let x_field = ast.node(NodeData::StructField {
            name: x_name,
            type_expr: x_ty,
            initializer: None,
        });
        let s_name = ast.atom("S");
        let s = ast.node(NodeData::Struct {
            name: s_name,
            attrs: sable_syntax::DeclAttrs::default(),
            template_params: Vec::new(),
            fields: vec![x_field],
            variants: Vec::new(),
        });
        ast.top(s);

        let designator = ast.atom("x");
        let one = ast.lit_int(1);
        let init = ast.node(NodeData::CtorInit {
            designator: Some(designator),
            value: one,
            offset_bytes: 0,
        });
        let s_type = ast.ty_named("S");
        let ctor = ast.node(NodeData::Ctor {
            type_expr: Some(s_type),
            inits: vec![init],
        });
        let var_ty = ast.type_expr(TypeExpr::Infer);
        let b_name = ast.atom("v");
        let binding = ast.node(NodeData::Binding {
            name: b_name,
            attrs: sable_syntax::DeclAttrs::default(),
            type_expr: var_ty,
            initializer: Some(ctor),
        });
        ast.top(binding);
    }

    analyse(&mut ctx, &mut NoLoader);
    assert!(has_diagnostic(
        &ctx,
        "initialiser designations are not supported"
    ));
}
