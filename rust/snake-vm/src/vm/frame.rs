//! Activation frames for the VM.

use super::VmError;
use snake_core::lir::{Function, Instruction, OpCode};
use snake_core::types::Type;
use snake_core::values::{Value, VarRef};
use std::collections::HashMap;
use std::rc::Rc;

/// A compiled function as the VM holds it: the instruction sequence is
/// shared by every frame that runs it.
#[derive(Debug, Clone)]
pub struct Callable {
    pub name: String,
    pub input: Type,
    pub output: Type,
    pub code: Rc<[Instruction]>,
}

impl From<Function> for Callable {
    fn from(func: Function) -> Self {
        Self {
            name: func.name,
            input: func.input,
            output: func.output,
            code: func.instructions.into(),
        }
    }
}

/// One activation: operand stack, variable table, code, and program counter.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Function name, or `main` for the top level.
    pub name: String,
    pub stack: Vec<Value>,
    pub vars: HashMap<String, VarRef>,
    pub code: Rc<[Instruction]>,
    /// `None` for the top level, which accepts any returned value.
    pub return_type: Option<Type>,
    pub pc: usize,
}

impl Frame {
    pub fn main(code: Rc<[Instruction]>) -> Self {
        Self {
            name: "main".to_string(),
            stack: Vec::new(),
            vars: HashMap::new(),
            code,
            return_type: None,
            pc: 0,
        }
    }

    /// A frame for `callee`, seeded with its single argument.
    pub fn call(callee: &Callable, arg: Value) -> Self {
        Self {
            name: callee.name.clone(),
            stack: vec![arg],
            vars: HashMap::new(),
            code: Rc::clone(&callee.code),
            return_type: Some(callee.output.clone()),
            pc: 0,
        }
    }

    pub fn current(&self) -> Option<&Instruction> {
        self.code.get(self.pc)
    }

    /// The top `n` operands, deepest first, without consuming them.
    pub fn operands(&self, op: OpCode, n: usize) -> Result<&[Value], VmError> {
        let len = self.stack.len();
        if len < n {
            return Err(VmError::StackUnderflow {
                op,
                needed: n,
                found: len,
            });
        }
        Ok(&self.stack[len - n..])
    }

    /// Remove and return the top `n` values, deepest first.
    pub fn take(&mut self, n: usize) -> Vec<Value> {
        let at = self.stack.len().saturating_sub(n);
        self.stack.split_off(at)
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// The binder for `name`, created unbound on first reference.
    pub fn var(&mut self, name: &str) -> VarRef {
        self.vars
            .entry(name.to_string())
            .or_insert_with(|| VarRef::new(name))
            .clone()
    }

    /// Index of the loop end carrying `label`, searching forward from the pc.
    pub fn find_loop_end(&self, label: &str) -> Option<usize> {
        self.code
            .iter()
            .enumerate()
            .skip(self.pc)
            .find(|(_, instr)| is_marker(instr, OpCode::WhileEnd, label))
            .map(|(idx, _)| idx)
    }

    /// Index of the loop start carrying `label`, searching backward from the pc.
    pub fn find_loop_start(&self, label: &str) -> Option<usize> {
        self.code
            .iter()
            .enumerate()
            .take(self.pc + 1)
            .rev()
            .find(|(_, instr)| is_marker(instr, OpCode::WhileStart, label))
            .map(|(idx, _)| idx)
    }
}

fn is_marker(instr: &Instruction, op: OpCode, label: &str) -> bool {
    instr.op == op && instr.arg.as_deref() == Some(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(instrs: Vec<Instruction>) -> Rc<[Instruction]> {
        instrs.into()
    }

    #[test]
    fn test_operands_checks_depth_without_popping() {
        let mut frame = Frame::main(code(vec![]));
        frame.push(Value::Number(1.0));
        let err = frame.operands(OpCode::Add, 2).unwrap_err();
        assert!(matches!(
            err,
            VmError::StackUnderflow {
                op: OpCode::Add,
                needed: 2,
                found: 1
            }
        ));
        assert_eq!(frame.stack.len(), 1);
    }

    #[test]
    fn test_take_returns_deepest_first() {
        let mut frame = Frame::main(code(vec![]));
        for n in 1..=3 {
            frame.push(Value::Number(n as f64));
        }
        let taken = frame.take(2);
        assert_eq!(taken, vec![Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(frame.stack, vec![Value::Number(1.0)]);
    }

    #[test]
    fn test_var_is_created_once() {
        let mut frame = Frame::main(code(vec![]));
        let a = frame.var("x");
        let b = frame.var("x");
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&frame.var("y")));
    }

    #[test]
    fn test_loop_marker_search() {
        let mut frame = Frame::main(code(vec![
            Instruction::with_arg(OpCode::WhileStart, "L0"),
            Instruction::with_arg(OpCode::WhileStart, "L1"),
            Instruction::with_arg(OpCode::WhileEnd, "L1"),
            Instruction::with_arg(OpCode::WhileEnd, "L0"),
        ]));
        assert_eq!(frame.find_loop_end("L0"), Some(3));
        frame.pc = 3;
        assert_eq!(frame.find_loop_start("L0"), Some(0));
        assert_eq!(frame.find_loop_start("L9"), None);
    }

    #[test]
    fn test_call_frame_seeded_with_argument() {
        let callee = Callable::from(Function {
            name: "inc".into(),
            input: Type::Number,
            output: Type::Number,
            instructions: vec![Instruction::new(OpCode::Return)],
        });
        let frame = Frame::call(&callee, Value::Number(1.0));
        assert_eq!(frame.stack, vec![Value::Number(1.0)]);
        assert_eq!(frame.return_type, Some(Type::Number));
        assert_eq!(frame.pc, 0);
    }
}
