//! Textual IR printing.
//!
//! Emits a human-readable form of an IR module: a comment line naming
//! the module, named struct definitions, globals, then functions with
//! labelled blocks and indented instructions. The output is stable for
//! identical inputs and is what golden-file tests compare against.

use colored::Colorize;
use sable_common::{Interner, Linkage};

use crate::module::Module;
use crate::types::{IrType, TypeStore, TypeId};
use crate::value::{Value, ValueId, ValueKind};

/// Print `module` to its textual form.
#[must_use]
pub fn print_module(
    module: &Module,
    types: &TypeStore,
    strings: &Interner,
    use_color: bool,
) -> String {
    let mut printer = Printer {
        module,
        types,
        strings,
        use_color,
        out: String::new(),
    };
    printer.print_module();
    printer.out
}

struct Printer<'a> {
    module: &'a Module,
    types: &'a TypeStore,
    strings: &'a Interner,
    use_color: bool,
    out: String,
}

impl<'a> Printer<'a> {
    fn keyword(&self, s: &str) -> String {
        if self.use_color {
            s.red().to_string()
        } else {
            s.to_string()
        }
    }

    fn name(&self, s: &str) -> String {
        if self.use_color {
            s.green().to_string()
        } else {
            s.to_string()
        }
    }

    fn constant(&self, s: &str) -> String {
        if self.use_color {
            s.blue().to_string()
        } else {
            s.to_string()
        }
    }

    fn comment(&self, s: &str) -> String {
        if self.use_color {
            s.white().to_string()
        } else {
            s.to_string()
        }
    }

    fn print_module(&mut self) {
        let header = format!("; Sable IR Module: {}", self.strings.resolve(self.module.name));
        self.out.push_str(&self.comment(&header));
        self.out.push('\n');

        let named: Vec<(TypeId, String)> = self
            .types
            .named_structs()
            .map(|(id, name, _)| (id, self.strings.resolve(name).to_string()))
            .collect();
        for (id, name) in named {
            let def = format!(
                "{} {} {} {}",
                self.keyword("define"),
                self.name(&format!("@{name}")),
                "=",
                self.struct_type_literally(id)
            );
            self.out.push_str(&def);
            self.out.push('\n');
        }

        for (i, &global) in self.module.globals.iter().enumerate() {
            if i > 0 {
                self.out.push('\n');
            }
            self.print_global(global);
        }
        if !self.module.globals.is_empty() {
            self.out.push('\n');
        }

        for (i, &function) in self.module.functions.iter().enumerate() {
            if i > 0 {
                self.out.push('\n');
            }
            self.print_function(function);
        }
    }

    fn print_linkage(&mut self, linkage: Linkage) {
        match linkage {
            Linkage::Exported | Linkage::Reexported => {
                let kw = self.keyword(linkage.keyword());
                self.out.push_str(&kw);
                self.out.push(' ');
            }
            _ => {}
        }
    }

    fn print_global(&mut self, global: ValueId) {
        let value = self.module.value(global);
        self.out.push_str(&self.keyword("define"));
        self.out.push(' ');
        self.print_linkage(value.linkage);

        let name = self.global_name(value);
        self.out.push_str(&self.name(&name));
        self.out.push_str(" = ");

        if let ValueKind::GlobalVariable { init, .. } = &value.kind {
            let init = self.value_string(*init, true);
            self.out.push_str(&init);
        }
        self.out.push('\n');
    }

    fn print_function(&mut self, function: ValueId) {
        let value = self.module.value(function);
        let (return_type, param_types, calling_convention, variadic) =
            match self.types.kind(value.ty) {
                IrType::Function {
                    return_type,
                    params,
                    calling_convention,
                    variadic,
                } => (*return_type, params.clone(), *calling_convention, *variadic),
                other => panic!("function value with non-function type {other:?}"),
            };

        let blocks = self.module.function_blocks(function).to_vec();
        let is_declare = blocks.is_empty();

        let head = if is_declare { "declare" } else { "define" };
        self.out.push_str(&self.keyword(head));
        self.out.push(' ');
        self.print_linkage(value.linkage);

        self.out.push_str(calling_convention.keyword());
        self.out.push(' ');

        let fn_name = value
            .name
            .map(|n| self.strings.resolve(n).to_string())
            .unwrap_or_default();
        self.out.push_str(&self.name(&format!("@{fn_name}")));
        self.out.push('(');
        for (i, &param_ty) in param_types.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            let ty = self.type_string(param_ty);
            self.out.push_str(&ty);
            self.out.push(' ');
            self.out.push_str(&self.name(&format!("%{i}")));
        }
        self.out.push(')');

        if variadic {
            self.out.push(' ');
            self.out.push_str(&self.keyword("variadic"));
        }

        if !self.types.is_void(return_type) {
            self.out.push_str(" -> ");
            let ty = self.type_string(return_type);
            self.out.push_str(&ty);
        }

        if is_declare {
            self.out.push('\n');
            return;
        }
        self.out.push_str(" {\n");

        for &block in &blocks {
            let label = self.block_label(block);
            self.out.push_str(&self.name(&label));
            self.out.push_str(":\n");
            for &instruction in self.module.block_instructions(block) {
                self.print_instruction(instruction);
            }
        }
        self.out.push_str("}\n");
    }

    fn print_instruction(&mut self, instruction: ValueId) {
        let value = self.module.value(instruction);
        self.out.push_str("  ");

        if !self.types.is_void(value.ty) {
            let result = self.value_ref(value);
            self.out.push_str(&self.name(&result));
            self.out.push_str(" = ");
        }

        let body = self.instruction_string(value);
        self.out.push_str(&body);
        self.out.push('\n');
    }

    fn instruction_string(&self, value: &Value) -> String {
        match &value.kind {
            ValueKind::Nop => self.keyword("nop"),
            ValueKind::Alloca {
                element_type,
                element_count,
            } => {
                let mut s = format!("{} {}", self.keyword("alloca"), self.type_string(*element_type));
                if *element_count != 1 {
                    s.push_str(&format!(", {}", self.constant(&element_count.to_string())));
                }
                s
            }
            ValueKind::Store { address, value } => format!(
                "{} {}, {}",
                self.keyword("store"),
                self.value_string(*address, false),
                self.value_string(*value, true)
            ),
            ValueKind::Load { address } => format!(
                "{} {}, {}",
                self.keyword("load"),
                self.type_string(value.ty),
                self.value_string(*address, false)
            ),
            ValueKind::Branch { target } => format!(
                "{} {}",
                self.keyword("branch"),
                self.value_string(*target, false)
            ),
            ValueKind::CondBranch {
                condition,
                pass,
                fail,
            } => format!(
                "{} {}, {}, {}",
                self.keyword("branch"),
                self.value_string(*condition, false),
                self.value_string(*pass, false),
                self.value_string(*fail, false)
            ),
            ValueKind::Phi { incoming } => {
                let mut s = format!("{} {}", self.keyword("phi"), self.type_string(value.ty));
                for (i, (incoming_value, incoming_block)) in incoming.iter().enumerate() {
                    if i > 0 {
                        s.push(',');
                    }
                    s.push_str(&format!(
                        " [ {}, {} ]",
                        self.value_string(*incoming_value, false),
                        self.value_string(*incoming_block, false)
                    ));
                }
                s
            }
            ValueKind::Return { value: Some(v) } => format!(
                "{} {}",
                self.keyword("return"),
                self.value_string(*v, true)
            ),
            ValueKind::Return { value: None } => self.keyword("return"),
            ValueKind::Unreachable => self.keyword("unreachable"),
            ValueKind::Call {
                callee,
                args,
                calling_convention,
                ..
            } => {
                let mut s = format!(
                    "{} {} {} {}(",
                    self.keyword("call"),
                    calling_convention.keyword(),
                    self.type_string(value.ty),
                    self.value_string(*callee, false)
                );
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        s.push_str(", ");
                    }
                    s.push_str(&self.value_string(arg, true));
                }
                s.push(')');
                s
            }
            ValueKind::Builtin { kind, args } => {
                let mut s = format!(
                    "{} {}(",
                    self.keyword("builtin"),
                    self.name(&format!("@{}", kind.name()))
                );
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        s.push_str(", ");
                    }
                    s.push_str(&self.value_string(arg, true));
                }
                s.push(')');
                s
            }
            ValueKind::PtrAdd { address, offset } => format!(
                "{} ptr {}, {}",
                self.keyword("ptradd"),
                self.value_string(*address, false),
                self.value_string(*offset, true)
            ),
            ValueKind::Cast { op, operand } => format!(
                "{} {}, {}",
                self.keyword(op.keyword()),
                self.type_string(value.ty),
                self.value_string(*operand, true)
            ),
            ValueKind::Unary { op, operand } => format!(
                "{} {}",
                self.keyword(op.keyword()),
                self.value_string(*operand, true)
            ),
            ValueKind::Binary { op, lhs, rhs } => format!(
                "{} {}, {}",
                self.keyword(op.keyword()),
                self.value_string(*lhs, true),
                self.value_string(*rhs, false)
            ),
            ValueKind::ICmp {
                predicate,
                lhs,
                rhs,
            } => format!(
                "{} {}, {}",
                self.keyword(&format!("icmp {}", predicate.keyword())),
                self.value_string(*lhs, true),
                self.value_string(*rhs, false)
            ),
            ValueKind::FCmp {
                predicate,
                lhs,
                rhs,
            } => format!(
                "{} {}, {}",
                self.keyword(&format!("fcmp {}", predicate.keyword())),
                self.value_string(*lhs, true),
                self.value_string(*rhs, false)
            ),
            other => panic!("not an instruction: {other:?}"),
        }
    }

    // ========================================================================
    // Value and type rendering
    // ========================================================================

    fn global_name(&self, value: &Value) -> String {
        match value.name {
            Some(name) => format!("@{}", self.strings.resolve(name)),
            None => format!("@global.{}", value.index),
        }
    }

    fn block_label(&self, block: ValueId) -> String {
        let value = self.module.value(block);
        match (value.name, &value.kind) {
            (Some(name), _) => format!("%{}", self.strings.resolve(name)),
            (None, ValueKind::Block { position, .. }) => format!("%_bb{position}"),
            _ => "%_bb?".to_string(),
        }
    }

    /// `%name` or `%index` for an instruction or parameter result.
    fn value_ref(&self, value: &Value) -> String {
        match value.name {
            Some(name) => format!("%{}", self.strings.resolve(name)),
            None => format!("%{}", value.index),
        }
    }

    fn value_string(&self, id: ValueId, print_type: bool) -> String {
        let value = self.module.value(id);
        let mut s = String::new();
        if print_type {
            s.push_str(&self.type_string(value.ty));
            s.push(' ');
        }

        match &value.kind {
            ValueKind::Function { .. } => {
                let name = value
                    .name
                    .map(|n| self.strings.resolve(n).to_string())
                    .unwrap_or_default();
                s.push_str(&self.name(&format!("@{name}")));
            }
            ValueKind::Block { .. } => {
                s.push_str(&self.name(&self.block_label(id)));
            }
            ValueKind::GlobalVariable { .. } => {
                s.push_str(&self.name(&self.global_name(value)));
            }
            ValueKind::IntConstant(v) => {
                s.push_str(&self.constant(&v.to_string()));
            }
            ValueKind::FloatConstant(v) => {
                s.push_str(&self.constant(&format!("{v}")));
            }
            ValueKind::VoidConstant => {
                s.push_str(&self.keyword("void"));
            }
            ValueKind::Poison => {
                s.push_str(&self.keyword("poison"));
            }
            ValueKind::ArrayConstant { data, is_string } => {
                if *is_string {
                    let mut quoted = String::from("\"");
                    for &byte in data {
                        if byte < 32 || byte > 127 {
                            quoted.push_str(&format!("\\{byte:02X}"));
                        } else {
                            quoted.push(byte as char);
                        }
                    }
                    quoted.push('"');
                    s.push_str(&self.constant(&quoted));
                } else {
                    let rendered = data
                        .iter()
                        .map(|b| b.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    s.push_str(&format!("[ {rendered} ]"));
                }
            }
            _ => {
                s.push_str(&self.name(&self.value_ref(value)));
            }
        }

        s
    }

    fn struct_type_literally(&self, id: TypeId) -> String {
        let fields = match self.types.kind(id) {
            IrType::Struct { fields, .. } => fields,
            other => panic!("not a struct type: {other:?}"),
        };
        let mut s = format!("{} {{", self.keyword("struct"));
        for (i, &field) in fields.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            } else {
                s.push(' ');
            }
            s.push_str(&self.type_string(field));
        }
        s.push_str(" }");
        s
    }

    fn type_string(&self, id: TypeId) -> String {
        match self.types.kind(id) {
            IrType::Void => self.keyword("void"),
            IrType::Pointer => self.keyword("ptr"),
            IrType::Integer { width } => self.keyword(&format!("int{width}")),
            IrType::Float { width } => self.keyword(&format!("float{width}")),
            IrType::Array { length, element } => {
                format!(
                    "{}[{}]",
                    self.type_string(*element),
                    self.constant(&length.to_string())
                )
            }
            IrType::Struct { name, .. } => match name {
                Some(name) => self.name(&format!("@{}", self.strings.resolve(*name))),
                None => self.struct_type_literally(id),
            },
            IrType::Function {
                return_type,
                params,
                ..
            } => {
                let params = params
                    .iter()
                    .map(|&p| self.type_string(p))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({params})", self.type_string(*return_type))
            }
        }
    }
}
