//! Shared AST-building helpers for the analyser tests.
//!
//! These construct modules the way the out-of-tree parser would:
//! nodes in the module arena, top-level declarations listed in order,
//! every node starting `Unanalysed`.

// Not every helper is used by every test binary.
#![allow(dead_code)]

use sable_common::{Atom, Linkage, Span, Variadic};
use sable_sema::Context;
use sable_syntax::{
    DeclAttrs, ModuleId, NodeData, NodeIndex, QualType, TypeExpr, TypeId,
};

pub struct AstBuilder<'a> {
    pub ctx: &'a mut Context,
    pub module: ModuleId,
}

impl<'a> AstBuilder<'a> {
    pub fn new(ctx: &'a mut Context, name: &str, text: &str) -> Self {
        let source = ctx.add_source(name, text);
        let module = ctx.add_module(source);
        AstBuilder { ctx, module }
    }

    pub fn atom(&mut self, s: &str) -> Atom {
        self.ctx.strings.intern(s)
    }

    pub fn node(&mut self, data: NodeData) -> NodeIndex {
        self.ctx
            .module_mut(self.module)
            .arena
            .alloc(data, Span::empty_at(0))
    }

    pub fn top(&mut self, node: NodeIndex) {
        self.ctx.module_mut(self.module).top_level.push(node);
    }

    pub fn type_expr(&mut self, expr: TypeExpr) -> NodeIndex {
        self.node(NodeData::TypeExpr {
            expr,
            resolved: QualType::of(TypeId::UNKNOWN),
        })
    }

    pub fn ty_int(&mut self, width: u32) -> NodeIndex {
        self.type_expr(TypeExpr::Int {
            signed: true,
            width,
        })
    }

    pub fn ty_void(&mut self) -> NodeIndex {
        self.type_expr(TypeExpr::Void)
    }

    pub fn ty_named(&mut self, name: &str) -> NodeIndex {
        let piece = self.atom(name);
        self.type_expr(TypeExpr::Nameref {
            pieces: vec![piece],
            template_args: Vec::new(),
        })
    }

    pub fn lit_int(&mut self, value: i64) -> NodeIndex {
        self.node(NodeData::LitInt { value })
    }

    pub fn name_ref(&mut self, pieces: &[&str]) -> NodeIndex {
        let pieces = pieces.iter().map(|p| self.ctx.strings.intern(p)).collect();
        self.node(NodeData::NameRef {
            pieces,
            template_args: Vec::new(),
            resolved: None,
        })
    }

    pub fn binding(&mut self, name: &str, type_expr: NodeIndex, init: Option<NodeIndex>) -> NodeIndex {
        let name = self.atom(name);
        let binding = self.node(NodeData::Binding {
            name,
            attrs: DeclAttrs::default(),
            type_expr,
            initializer: init,
        });
        self.top(binding);
        binding
    }

    pub fn param(&mut self, name: &str, type_expr: NodeIndex) -> NodeIndex {
        let name = self.atom(name);
        self.node(NodeData::Parameter {
            name,
            type_expr,
            mutable: false,
            default: None,
        })
    }

    pub fn compound(&mut self, children: Vec<NodeIndex>) -> NodeIndex {
        self.node(NodeData::Compound {
            children,
            scope: None,
        })
    }

    pub fn function(
        &mut self,
        name: &str,
        params: Vec<NodeIndex>,
        return_type: NodeIndex,
        body: Option<NodeIndex>,
    ) -> NodeIndex {
        self.function_with(name, params, return_type, body, DeclAttrs::default(), Variadic::None)
    }

    pub fn function_with(
        &mut self,
        name: &str,
        params: Vec<NodeIndex>,
        return_type: NodeIndex,
        body: Option<NodeIndex>,
        attrs: DeclAttrs,
        variadic: Variadic,
    ) -> NodeIndex {
        let name = self.atom(name);
        let function = self.node(NodeData::Function {
            name,
            attrs,
            template_params: Vec::new(),
            params,
            return_type,
            variadic,
            body,
        });
        self.top(function);
        function
    }

    pub fn exported(&mut self) -> DeclAttrs {
        DeclAttrs {
            linkage: Linkage::Exported,
            ..DeclAttrs::default()
        }
    }

    pub fn import(&mut self, path: &str) -> NodeIndex {
        let module_name = self.atom(path);
        let import = self.node(NodeData::Import {
            module_name,
            name_is_identifier: false,
            alias: None,
            queries: Vec::new(),
            attrs: DeclAttrs::default(),
            referenced_module: None,
        });
        self.top(import);
        import
    }
}

/// Rendered diagnostics, one per line, uncoloured.
pub fn rendered_diagnostics(ctx: &Context) -> Vec<String> {
    ctx.diag
        .diagnostics()
        .iter()
        .map(|d| ctx.diag.render(d, &ctx.sources))
        .collect()
}

pub fn has_diagnostic(ctx: &Context, needle: &str) -> bool {
    rendered_diagnostics(ctx).iter().any(|d| d.contains(needle))
}
