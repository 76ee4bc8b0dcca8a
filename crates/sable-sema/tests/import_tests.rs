//! Import resolution, symbol tables and cross-module name lookup.

mod common;

use common::{AstBuilder, has_diagnostic, rendered_diagnostics};
use sable_common::{Severity, Span};
use sable_sema::{Context, NoLoader, analyse};
use sable_syntax::{ImportQuery, NodeData};

/// lib.sb: an exported function `f(a: i32) -> void`.
fn build_lib(ctx: &mut Context) {
    let mut ast = AstBuilder::new(ctx, "lib.sb", "");
    let a_ty = ast.ty_int(32);
    let a = ast.param("a", a_ty);
    let void_ = ast.ty_void();
    let attrs = ast.exported();
    ast.function_with(
        "f",
        vec![a],
        void_,
        None,
        attrs,
        sable_common::Variadic::None,
    );
}

#[test]
fn whole_module_imports_resolve_through_the_derived_namespace() {
    let mut ctx = Context::new();
    build_lib(&mut ctx);
    {
        let mut ast = AstBuilder::new(&mut ctx, "main.sb", "");
        ast.import("lib.sb");

        let callee = ast.name_ref(&["lib", "f"]);
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
    assert!(
        !ctx.diag.has_reported_errors(),
        "unexpected diagnostics: {:?}",
        rendered_diagnostics(&ctx)
    );
}

#[test]
fn named_import_queries_bring_single_symbols_into_scope() {
    let mut ctx = Context::new();
    build_lib(&mut ctx);
    {
        let mut ast = AstBuilder::new(&mut ctx, "main.sb", "");
        let f = ast.atom("f");
        let module_name = ast.atom("lib.sb");
        let import = ast.node(NodeData::Import {
            module_name,
            name_is_identifier: false,
            alias: None,
            queries: vec![ImportQuery {
                is_wildcard: false,
                pieces: vec![f],
                alias: None,
                span: Span::empty_at(0),
            }],
            attrs: sable_syntax::DeclAttrs::default(),
            referenced_module: None,
        });
        ast.top(import);

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
    assert!(
        !ctx.diag.has_reported_errors(),
        "unexpected diagnostics: {:?}",
        rendered_diagnostics(&ctx)
    );
}

#[test]
fn wildcard_queries_import_every_export() {
    let mut ctx = Context::new();
    build_lib(&mut ctx);
    {
        let mut ast = AstBuilder::new(&mut ctx, "main.sb", "");
        let module_name = ast.atom("lib.sb");
        let import = ast.node(NodeData::Import {
            module_name,
            name_is_identifier: false,
            alias: None,
            queries: vec![ImportQuery {
                is_wildcard: true,
                pieces: Vec::new(),
                alias: None,
                span: Span::empty_at(0),
            }],
            attrs: sable_syntax::DeclAttrs::default(),
            referenced_module: None,
        });
        ast.top(import);

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
    assert!(
        !ctx.diag.has_reported_errors(),
        "unexpected diagnostics: {:?}",
        rendered_diagnostics(&ctx)
    );
}

#[test]
fn missing_modules_are_reported_per_import() {
    let mut ctx = Context::new();
    {
        let mut ast = AstBuilder::new(&mut ctx, "main.sb", "");
        ast.import("nowhere.sb");
    }

    analyse(&mut ctx, &mut NoLoader);
    assert!(has_diagnostic(
        &ctx,
        "Cannot find module file to import: 'nowhere.sb'"
    ));
}

#[test]
fn missing_query_targets_are_reported() {
    let mut ctx = Context::new();
    build_lib(&mut ctx);
    {
        let mut ast = AstBuilder::new(&mut ctx, "main.sb", "");
        let g = ast.atom("g");
        let module_name = ast.atom("lib.sb");
        let import = ast.node(NodeData::Import {
            module_name,
            name_is_identifier: false,
            alias: None,
            queries: vec![ImportQuery {
                is_wildcard: false,
                pieces: vec![g],
                alias: None,
                span: Span::empty_at(0),
            }],
            attrs: sable_syntax::DeclAttrs::default(),
            referenced_module: None,
        });
        ast.top(import);
    }

    analyse(&mut ctx, &mut NoLoader);
    assert!(has_diagnostic(
        &ctx,
        "No exported symbol 'g' in the imported module."
    ));
}

#[test]
fn import_cycles_are_fatal_and_stop_analysis() {
    let mut ctx = Context::new();
    {
        let mut ast = AstBuilder::new(&mut ctx, "a.sb", "");
        ast.import("b.sb");
        let i8 = ast.ty_int(8);
        let bad = ast.lit_int(200);
        ast.binding("x", i8, Some(bad));
    }
    {
        let mut ast = AstBuilder::new(&mut ctx, "b.sb", "");
        ast.import("a.sb");
    }
    let modules = ctx.module_ids();

    analyse(&mut ctx, &mut NoLoader);

    assert_eq!(ctx.diag.count(Severity::Fatal), 1);
    assert!(has_diagnostic(&ctx, "Cyclic dependency detected."));

    // Analysis never reached symbol tables or type resolution: the
    // would-be conversion error was not reported and no exports exist.
    assert!(!has_diagnostic(&ctx, "not convertible"));
    for module in modules {
        assert!(ctx.module(module).exports.is_none());
    }
    assert!(ctx.ir_modules.is_empty());
}

#[test]
fn unknown_identifiers_are_reported_but_do_not_abort() {
    let mut ctx = Context::new();
    {
        let mut ast = AstBuilder::new(&mut ctx, "main.sb", "");
        let callee = ast.name_ref(&["ghost"]);
        let call = ast.node(NodeData::Call {
            callee,
            args: Vec::new(),
        });
        let body = ast.compound(vec![call]);
        let ret = ast.ty_void();
        ast.function("entry", Vec::new(), ret, Some(body));

        // A second function analysed after the failure.
        let i8 = ast.ty_int(8);
        let bad = ast.lit_int(200);
        ast.binding("x", i8, Some(bad));
    }

    analyse(&mut ctx, &mut NoLoader);

    assert!(has_diagnostic(
        &ctx,
        "Unable to resolve identifier 'ghost' in this context."
    ));
    assert!(has_diagnostic(
        &ctx,
        "Expression of type int is not convertible to i8"
    ));
}
