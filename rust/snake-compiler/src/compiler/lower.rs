//! AST → instruction lowering.

use crate::compiler::ast::*;
use snake_core::lir::{Function, Instruction, Module, OpCode};
use snake_core::types::Type;
use tracing::debug;

/// Lowers a parsed program. Owns the loop-label counter, so labels are unique
/// across every function and the top level of one compilation.
#[derive(Debug, Default)]
pub struct Compiler {
    next_label: usize,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a whole program into its top-level sequence and function table.
    /// A later definition of the same function name replaces an earlier one.
    pub fn translate(&mut self, program: &Program) -> Module {
        let mut module = Module::default();
        for item in &program.items {
            match item {
                Item::Function(def) => {
                    let func = self.compile_function(def);
                    module.functions.insert(func.name.clone(), func);
                }
                Item::Stmt(stmt) => self.compile_stmt(stmt, &mut module.main),
            }
        }
        debug!(
            instructions = module.main.len(),
            functions = module.functions.len(),
            "translated program"
        );
        module
    }

    pub fn compile_function(&mut self, def: &FunctionDef) -> Function {
        let mut instructions = Vec::new();
        for stmt in &def.body {
            self.compile_stmt(stmt, &mut instructions);
        }
        let func = Function {
            name: def.name.clone(),
            input: lower_type(&def.input),
            output: lower_type(&def.output),
            instructions,
        };
        debug!(
            name = %func.name,
            input = %func.input,
            output = %func.output,
            len = func.instructions.len(),
            "compiled function"
        );
        func
    }

    fn fresh_label(&mut self) -> String {
        let label = format!("L{}", self.next_label);
        self.next_label += 1;
        label
    }

    pub fn compile_stmt(&mut self, stmt: &Stmt, out: &mut Vec<Instruction>) {
        match stmt {
            Stmt::Op(op, _) => out.push(Instruction::new(opcode_for(*op))),
            Stmt::Return(_) => out.push(Instruction::new(OpCode::Return)),
            Stmt::Call(name, _) => out.push(Instruction::with_arg(OpCode::Call, name.clone())),
            Stmt::While { body, .. } => {
                let label = self.fresh_label();
                out.push(Instruction::with_arg(OpCode::WhileStart, label.clone()));
                for inner in body {
                    self.compile_stmt(inner, out);
                }
                out.push(Instruction::with_arg(OpCode::WhileEnd, label));
            }
            Stmt::Value(value) => out.extend(compile_value(value)),
        }
    }
}

/// The construction sequence for a literal value.
///
/// Composite literals push their children in reverse so that the first child
/// ends up on top of the stack when the construction instruction runs.
pub fn compile_value(node: &ValueNode) -> Vec<Instruction> {
    let mut out = Vec::new();
    emit_value(node, &mut out);
    out
}

fn emit_value(node: &ValueNode, out: &mut Vec<Instruction>) {
    match &node.kind {
        ValueKind::Number(text) => out.push(Instruction::with_arg(OpCode::PushNum, text.clone())),
        ValueKind::Char(c) => out.push(Instruction::with_arg(OpCode::PushChar, c.to_string())),
        ValueKind::Bool(b) => out.push(Instruction::with_arg(OpCode::PushBool, b.to_string())),
        ValueKind::Ident(name) => out.push(Instruction::with_arg(OpCode::PushIdent, name.clone())),
        ValueKind::Str(text) if text.is_empty() => {
            out.push(Instruction::new(OpCode::PushEmptyString))
        }
        ValueKind::Str(text) => {
            for c in text.chars().rev() {
                out.push(Instruction::with_arg(OpCode::PushChar, c.to_string()));
            }
            out.push(Instruction::new(OpCode::Aggregate));
        }
        ValueKind::List(items) => {
            for item in items.iter().rev() {
                emit_value(item, out);
            }
            out.push(Instruction::new(OpCode::Aggregate));
        }
        ValueKind::Tuple(first, second) => {
            emit_value(second, out);
            emit_value(first, out);
            out.push(Instruction::new(OpCode::MakeTuple));
        }
    }
}

pub fn lower_type(ty: &TypeExpr) -> Type {
    match ty {
        TypeExpr::Raw(RawType::Number, _) => Type::Number,
        TypeExpr::Raw(RawType::Character, _) => Type::Character,
        TypeExpr::Raw(RawType::Boolean, _) => Type::Boolean,
        TypeExpr::List(elem, _) => Type::list(lower_type(elem)),
        TypeExpr::Tuple(first, second, _) => Type::tuple(lower_type(first), lower_type(second)),
    }
}

pub fn opcode_for(op: Operator) -> OpCode {
    match op {
        Operator::Pop => OpCode::Pop,
        Operator::Dup => OpCode::Dup,
        Operator::Swap => OpCode::Swap,
        Operator::Add => OpCode::Add,
        Operator::Sub => OpCode::Sub,
        Operator::Mul => OpCode::Mul,
        Operator::Div => OpCode::Div,
        Operator::Pow => OpCode::Pow,
        Operator::Eq => OpCode::Equal,
        Operator::Gt => OpCode::Greater,
        Operator::Lt => OpCode::Less,
        Operator::Not => OpCode::Not,
        Operator::And => OpCode::And,
        Operator::Or => OpCode::Or,
        Operator::Concat => OpCode::Concat,
        Operator::RemoveAt => OpCode::RemoveAt,
        Operator::InsertAt => OpCode::InsertAt,
        Operator::Aggregate => OpCode::Aggregate,
        Operator::Unzip => OpCode::Unzip,
        Operator::Print => OpCode::Print,
        Operator::Input => OpCode::Input,
        Operator::Round => OpCode::Round,
        Operator::ToStr => OpCode::ToStr,
        Operator::ToChr => OpCode::ToChar,
        Operator::ToBool => OpCode::ToBool,
        Operator::ParseStr => OpCode::ParseStr,
        Operator::MakeTuple => OpCode::MakeTuple,
        Operator::Assign => OpCode::Assign,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::lex;
    use crate::compiler::parser::parse;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    fn translate(src: &str) -> Module {
        Compiler::new().translate(&parse(lex(src).unwrap()).unwrap())
    }

    fn ops(instrs: &[Instruction]) -> Vec<OpCode> {
        instrs.iter().map(|i| i.op).collect()
    }

    #[test]
    fn test_operators_lower_to_distinct_opcodes() {
        let mapped: HashSet<OpCode> = Operator::iter().map(opcode_for).collect();
        assert_eq!(mapped.len(), Operator::iter().count());
    }

    #[test]
    fn test_list_literal_reversed_then_aggregate() {
        let module = translate("[1 2 3]");
        let args: Vec<_> = module.main.iter().filter_map(|i| i.arg.as_deref()).collect();
        assert_eq!(args, vec!["3", "2", "1"]);
        assert_eq!(module.main.last().map(|i| i.op), Some(OpCode::Aggregate));
    }

    #[test]
    fn test_string_literal() {
        let module = translate("'ab'");
        assert_eq!(
            module.main,
            vec![
                Instruction::with_arg(OpCode::PushChar, "b"),
                Instruction::with_arg(OpCode::PushChar, "a"),
                Instruction::new(OpCode::Aggregate),
            ]
        );
        assert_eq!(ops(&translate("''").main), vec![OpCode::PushEmptyString]);
    }

    #[test]
    fn test_tuple_literal_second_then_first() {
        let module = translate("(1 ?t)");
        assert_eq!(
            module.main,
            vec![
                Instruction::with_arg(OpCode::PushBool, "true"),
                Instruction::with_arg(OpCode::PushNum, "1"),
                Instruction::new(OpCode::MakeTuple),
            ]
        );
    }

    #[test]
    fn test_loop_labels_unique_across_functions() {
        let module = translate(r"\ f : # > # { [?] { [?] { } } << } [?] { }");
        let f = &module.functions["f"];
        let labels: Vec<_> = f
            .instructions
            .iter()
            .chain(module.main.iter())
            .filter(|i| i.op == OpCode::WhileStart)
            .filter_map(|i| i.arg.clone())
            .collect();
        assert_eq!(labels, vec!["L0", "L1", "L2"]);
        assert_eq!(
            ops(&f.instructions),
            vec![
                OpCode::WhileStart,
                OpCode::WhileStart,
                OpCode::WhileEnd,
                OpCode::WhileEnd,
                OpCode::Return,
            ]
        );
        assert_eq!(f.instructions[2].arg.as_deref(), Some("L1"));
        assert_eq!(f.instructions[3].arg.as_deref(), Some("L0"));
    }

    #[test]
    fn test_function_types() {
        let module = translate(r"\ g : ([@] #) > [??] { << }");
        let g = &module.functions["g"];
        assert_eq!(g.input, Type::tuple(Type::string(), Type::Number));
        assert_eq!(g.output, Type::list(Type::Boolean));
    }

    #[test]
    fn test_fresh_compiler_restarts_labels() {
        let a = translate("[?] { }");
        let b = translate("[?] { }");
        assert_eq!(a.main[0].arg, b.main[0].arg);
    }
}
