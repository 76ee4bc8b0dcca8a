//! AST node store.
//!
//! Every node of a module lives in that module's [`NodeArena`] and is
//! addressed by a [`NodeIndex`]. A node carries its payload ([`NodeData`]),
//! source span, semantic type, analysis state, value category and
//! dependence flags. The parser creates nodes in the `Unanalysed` state;
//! the analyser drives each one to `Done` (or marks it error-dependent).

use bitflags::bitflags;
use sable_common::{Atom, CallConv, Linkage, Mangling, Span, Variadic};

use crate::ops::{BinaryOp, UnaryOp};
use crate::scope::ScopeId;
use crate::types::{QualType, TypeId};

/// Identifies a module within the compilation context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

/// Index of a node within its owning module's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

/// A node addressed across modules: the owning module plus the node's
/// index in that module's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclRef {
    pub module: ModuleId,
    pub node: NodeIndex,
}

impl DeclRef {
    #[must_use]
    pub const fn new(module: ModuleId, node: NodeIndex) -> Self {
        DeclRef { module, node }
    }

    /// A reference used by compiler-created types not tied to any
    /// declaration (tests, padding fields).
    #[must_use]
    pub const fn synthetic() -> Self {
        DeclRef {
            module: ModuleId(u32::MAX),
            node: NodeIndex(u32::MAX),
        }
    }
}

/// Analysis state of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SemaState {
    #[default]
    Unanalysed,
    /// Currently being analysed; re-entry is a compiler bug.
    InProgress,
    Done,
}

/// Whether an expression designates a place or a value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValueCategory {
    #[default]
    Rvalue,
    Lvalue,
}

bitflags! {
    /// Dependence and provenance bits, inherited bottom-up during
    /// analysis.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Synthesised by the compiler, not written in source.
        const COMPILER_GENERATED = 1 << 0;
        /// This node or a child of it failed analysis.
        const ERROR_DEPENDENT = 1 << 1;
        /// Depends on an unsubstituted template parameter.
        const TEMPLATE_DEPENDENT = 1 << 2;
    }
}

/// Attributes attached to a declaration by the parser.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclAttrs {
    pub linkage: Linkage,
    /// If set, the symbol is emitted under this name. Also disables
    /// mangling.
    pub foreign_name: Option<Atom>,
    pub mangling: Mangling,
    pub calling_convention: CallConv,
    /// Call results may be discarded without `discard`.
    pub is_discardable: bool,
    pub is_inline: bool,
}

/// One query of an import declaration: either a wildcard or a path of
/// identifiers with an optional alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportQuery {
    pub is_wildcard: bool,
    /// Identifier path walked through namespace symbols.
    pub pieces: Vec<Atom>,
    pub alias: Option<Atom>,
    pub span: Span,
}

/// The kind a cast node performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastKind {
    /// Inserted by conversion; always valid by construction.
    Implicit,
    LvalueToRvalue,
    LvalueToReference,
    ReferenceToLvalue,
    /// `as` cast; checked by the conversion algorithm.
    Soft,
    /// `as!` cast; additionally permits any numeric<->numeric,
    /// pointer<->pointer and buffer<->buffer conversion.
    Hard,
}

/// The result of compile-time evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Void,
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Atom),
}

/// A syntactic type expression, resolved to a semantic type during
/// analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    /// `var` - the type is inferred from an initialiser.
    Infer,
    Void,
    Noreturn,
    Bool,
    Int {
        signed: bool,
        /// 0 means the platform width (`int` / `uint`).
        width: u32,
    },
    Float {
        /// 0 means the platform width (`float`).
        width: u32,
    },
    /// A named type, possibly with template arguments.
    Nameref {
        pieces: Vec<Atom>,
        template_args: Vec<NodeIndex>,
    },
    Nilable {
        elem: NodeIndex,
    },
    Array {
        elem: NodeIndex,
        /// Constant length expressions, one per rank.
        lengths: Vec<NodeIndex>,
    },
    Slice {
        elem: NodeIndex,
    },
    Reference {
        elem: NodeIndex,
        elem_mutable: bool,
    },
    Pointer {
        elem: NodeIndex,
        elem_mutable: bool,
    },
    Buffer {
        elem: NodeIndex,
        elem_mutable: bool,
    },
    ErrorPair {
        value: NodeIndex,
        error: NodeIndex,
    },
    Function {
        return_type: NodeIndex,
        params: Vec<NodeIndex>,
        calling_convention: CallConv,
        variadic: Variadic,
    },
}

/// Node payload. Declarations, statements, expressions and type
/// expressions are all nodes; the variant is the node's kind.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    // ========================================================================
    // Declarations
    // ========================================================================
    Import {
        /// The module path as written (a string literal).
        module_name: Atom,
        /// The path was written as a bare identifier; reserved syntax.
        name_is_identifier: bool,
        /// Explicit alias; otherwise derived from the file name.
        alias: Option<Atom>,
        queries: Vec<ImportQuery>,
        attrs: DeclAttrs,
        /// Filled during import resolution.
        referenced_module: Option<ModuleId>,
    },
    Function {
        name: Atom,
        attrs: DeclAttrs,
        template_params: Vec<NodeIndex>,
        params: Vec<NodeIndex>,
        return_type: NodeIndex,
        variadic: Variadic,
        body: Option<NodeIndex>,
    },
    Parameter {
        name: Atom,
        type_expr: NodeIndex,
        mutable: bool,
        default: Option<NodeIndex>,
    },
    /// A `var`/`let`-style binding, at top level or in a function body.
    Binding {
        name: Atom,
        attrs: DeclAttrs,
        type_expr: NodeIndex,
        initializer: Option<NodeIndex>,
    },
    Struct {
        name: Atom,
        attrs: DeclAttrs,
        template_params: Vec<NodeIndex>,
        fields: Vec<NodeIndex>,
        /// Nested variant struct declarations.
        variants: Vec<NodeIndex>,
    },
    StructField {
        name: Atom,
        type_expr: NodeIndex,
        initializer: Option<NodeIndex>,
    },
    Enum {
        name: Atom,
        attrs: DeclAttrs,
        underlying: Option<NodeIndex>,
        variants: Vec<NodeIndex>,
    },
    EnumVariant {
        name: Atom,
        value: Option<NodeIndex>,
    },
    Alias {
        name: Atom,
        attrs: DeclAttrs,
        is_strict: bool,
        type_expr: NodeIndex,
    },
    TemplateTypeParam {
        name: Atom,
    },
    TemplateValueParam {
        name: Atom,
        type_expr: NodeIndex,
        default: Option<NodeIndex>,
    },
    Test {
        name: Option<Atom>,
        body: NodeIndex,
    },
    /// Wraps the declarations of an overload set once a name reference
    /// resolves to more than one entity.
    Overloads {
        decls: Vec<DeclRef>,
    },

    // ========================================================================
    // Statements
    // ========================================================================
    Compound {
        children: Vec<NodeIndex>,
        scope: Option<ScopeId>,
    },
    Assign {
        lhs: NodeIndex,
        rhs: NodeIndex,
    },
    If {
        /// Parallel arrays: `conditions[i]` guards `passes[i]`.
        conditions: Vec<NodeIndex>,
        passes: Vec<NodeIndex>,
        fail: Option<NodeIndex>,
    },
    For {
        initializer: Option<NodeIndex>,
        condition: Option<NodeIndex>,
        increment: Option<NodeIndex>,
        body: NodeIndex,
    },
    While {
        condition: Option<NodeIndex>,
        body: NodeIndex,
    },
    DoWhile {
        body: NodeIndex,
        condition: NodeIndex,
    },
    Switch {
        value: NodeIndex,
        cases: Vec<NodeIndex>,
    },
    Case {
        /// `None` is the default case.
        pattern: Option<NodeIndex>,
        body: Vec<NodeIndex>,
    },
    Return {
        value: Option<NodeIndex>,
    },
    Yield {
        value: NodeIndex,
    },
    Break {
        label: Option<Atom>,
    },
    Continue {
        label: Option<Atom>,
    },
    Goto {
        label: Atom,
    },
    Label {
        name: Atom,
    },
    Defer {
        body: NodeIndex,
    },
    Discard {
        expr: NodeIndex,
    },
    Assert {
        condition: NodeIndex,
        message: Option<Atom>,
    },

    // ========================================================================
    // Expressions
    // ========================================================================
    NameRef {
        pieces: Vec<Atom>,
        template_args: Vec<NodeIndex>,
        /// Filled by name resolution.
        resolved: Option<DeclRef>,
    },
    Member {
        receiver: NodeIndex,
        field: Atom,
        /// Byte offset of the field, cached during analysis.
        offset_bytes: u64,
    },
    Index {
        receiver: NodeIndex,
        indices: Vec<NodeIndex>,
    },
    Slice {
        receiver: NodeIndex,
        offset: Option<NodeIndex>,
        length: Option<NodeIndex>,
    },
    Call {
        callee: NodeIndex,
        args: Vec<NodeIndex>,
    },
    /// Constructor expression `T { ... }`; the type defaults to the
    /// expected type when written `var`.
    Ctor {
        type_expr: Option<NodeIndex>,
        inits: Vec<NodeIndex>,
    },
    CtorInit {
        /// Field designator; designated initialisers are recognised but
        /// not supported.
        designator: Option<Atom>,
        value: NodeIndex,
        /// Byte offset of the initialised field, cached during analysis.
        offset_bytes: u64,
    },
    New {
        type_expr: NodeIndex,
        inits: Vec<NodeIndex>,
    },
    Delete {
        expr: NodeIndex,
    },
    Unary {
        op: UnaryOp,
        operand: NodeIndex,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeIndex,
        rhs: NodeIndex,
    },
    Cast {
        kind: CastKind,
        /// Explicit target type for soft/hard casts.
        type_expr: Option<NodeIndex>,
        operand: NodeIndex,
    },
    PatternMatch {
        value: NodeIndex,
    },
    /// `x!` - unwrap a nilable or error-pair value.
    Unwrap {
        operand: NodeIndex,
    },
    Try {
        operand: NodeIndex,
    },
    Catch {
        operand: NodeIndex,
        body: NodeIndex,
    },
    LitBool {
        value: bool,
    },
    LitInt {
        value: i64,
    },
    LitFloat {
        value: f64,
    },
    LitString {
        value: Atom,
    },
    LitNil,
    /// Wraps a constant-folded expression together with its value. The
    /// original expression is preserved unchanged.
    EvaluatedConstant {
        expr: NodeIndex,
        value: ConstValue,
    },
    Sizeof {
        arg: NodeIndex,
    },
    Alignof {
        arg: NodeIndex,
    },
    Offsetof {
        arg: NodeIndex,
        field: Atom,
    },
    /// A reference to a template value parameter inside a template body.
    TemplateParamRef {
        decl: DeclRef,
    },

    // ========================================================================
    // Type expressions
    // ========================================================================
    TypeExpr {
        expr: TypeExpr,
        /// Filled during type resolution; `UNKNOWN` until then.
        resolved: QualType,
    },
}

impl NodeData {
    #[must_use]
    pub const fn is_type_expr(&self) -> bool {
        matches!(self, NodeData::TypeExpr { .. })
    }

    #[must_use]
    pub const fn is_decl(&self) -> bool {
        matches!(
            self,
            NodeData::Import { .. }
                | NodeData::Function { .. }
                | NodeData::Parameter { .. }
                | NodeData::Binding { .. }
                | NodeData::Struct { .. }
                | NodeData::StructField { .. }
                | NodeData::Enum { .. }
                | NodeData::EnumVariant { .. }
                | NodeData::Alias { .. }
                | NodeData::TemplateTypeParam { .. }
                | NodeData::TemplateValueParam { .. }
                | NodeData::Test { .. }
                | NodeData::Overloads { .. }
        )
    }

    /// The declared name of a declaration node, if it has one.
    #[must_use]
    pub fn declared_name(&self) -> Option<Atom> {
        match self {
            NodeData::Function { name, .. }
            | NodeData::Parameter { name, .. }
            | NodeData::Binding { name, .. }
            | NodeData::Struct { name, .. }
            | NodeData::StructField { name, .. }
            | NodeData::Enum { name, .. }
            | NodeData::EnumVariant { name, .. }
            | NodeData::Alias { name, .. }
            | NodeData::TemplateTypeParam { name }
            | NodeData::TemplateValueParam { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Declaration attributes, if this node kind carries them.
    #[must_use]
    pub fn attrs(&self) -> Option<&DeclAttrs> {
        match self {
            NodeData::Import { attrs, .. }
            | NodeData::Function { attrs, .. }
            | NodeData::Binding { attrs, .. }
            | NodeData::Struct { attrs, .. }
            | NodeData::Enum { attrs, .. }
            | NodeData::Alias { attrs, .. } => Some(attrs),
            _ => None,
        }
    }
}

/// One AST node.
#[derive(Clone, Debug)]
pub struct Node {
    pub data: NodeData,
    pub span: Span,
    /// Semantic type of the expression; `TYPE` for type expressions.
    pub ty: QualType,
    pub state: SemaState,
    pub category: ValueCategory,
    pub flags: NodeFlags,
}

impl Node {
    #[must_use]
    pub fn new(data: NodeData, span: Span) -> Self {
        Node {
            data,
            span,
            ty: QualType::of(TypeId::UNKNOWN),
            state: SemaState::Unanalysed,
            category: ValueCategory::Rvalue,
            flags: NodeFlags::empty(),
        }
    }

    #[must_use]
    pub fn is_errored(&self) -> bool {
        self.flags.contains(NodeFlags::ERROR_DEPENDENT)
    }

    pub fn set_errored(&mut self) {
        self.flags |= NodeFlags::ERROR_DEPENDENT;
        self.ty = QualType::of(TypeId::POISON);
    }

    #[must_use]
    pub fn is_lvalue(&self) -> bool {
        self.category == ValueCategory::Lvalue
    }
}

/// Per-module node storage.
///
/// Nodes are appended and never removed; a `NodeIndex` stays valid for
/// the life of the module.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Append a node, returning its index.
    pub fn add(&mut self, node: Node) -> NodeIndex {
        let index = NodeIndex(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        index
    }

    /// Append a node built from payload and span.
    pub fn alloc(&mut self, data: NodeData, span: Span) -> NodeIndex {
        self.add(Node::new(data, span))
    }

    /// Append a compiler-generated node.
    pub fn alloc_synthesised(&mut self, data: NodeData, span: Span) -> NodeIndex {
        let mut node = Node::new(data, span);
        node.flags |= NodeFlags::COMPILER_GENERATED;
        self.add(node)
    }

    #[must_use]
    pub fn get(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0 as usize]
    }

    pub fn get_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.nodes[index.0 as usize]
    }

    #[must_use]
    pub fn try_get(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index.0 as usize)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeIndex(u32::try_from(i).unwrap_or(u32::MAX)), n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_keep_their_indices() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(NodeData::LitInt { value: 1 }, Span::NONE);
        let b = arena.alloc(NodeData::LitInt { value: 2 }, Span::NONE);
        assert_ne!(a, b);
        assert!(matches!(arena.get(a).data, NodeData::LitInt { value: 1 }));
        assert!(matches!(arena.get(b).data, NodeData::LitInt { value: 2 }));
    }

    #[test]
    fn new_nodes_start_unanalysed() {
        let node = Node::new(NodeData::LitNil, Span::NONE);
        assert_eq!(node.state, SemaState::Unanalysed);
        assert_eq!(node.category, ValueCategory::Rvalue);
        assert_eq!(node.ty.ty, TypeId::UNKNOWN);
        assert!(!node.is_errored());
    }

    #[test]
    fn set_errored_poisons_the_type() {
        let mut node = Node::new(NodeData::LitNil, Span::NONE);
        node.set_errored();
        assert!(node.is_errored());
        assert_eq!(node.ty.ty, TypeId::POISON);
    }

    #[test]
    fn declared_names_come_from_payloads() {
        let data = NodeData::TemplateTypeParam { name: Atom(7) };
        assert_eq!(data.declared_name(), Some(Atom(7)));
        assert!(NodeData::LitNil.declared_name().is_none());
    }
}
