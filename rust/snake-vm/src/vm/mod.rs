//! Stack VM dispatch loop for executing compiled Snakescript.

mod frame;
mod ops;

pub use frame::{Callable, Frame};

use snake_core::lir::{Instruction, Module, OpCode};
use snake_core::types::TypeMismatch;
use snake_core::values::Value;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum VmError {
    #[error("stack underflow: {op} needs {needed} operand(s), found {found}")]
    StackUnderflow {
        op: OpCode,
        needed: usize,
        found: usize,
    },
    #[error("type mismatch: {0}")]
    TypeMismatch(#[from] TypeMismatch),
    #[error("call to undefined function '{0}'")]
    UnresolvedCall(String),
    #[error("cannot parse '{text}' as a literal value: {reason}")]
    MalformedLiteralInput { text: String, reason: String },
    #[error("no matching loop marker for label '{0}'")]
    MalformedJump(String),
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: f64, len: usize },
    #[error("{0} is not a valid character code")]
    InvalidCharCode(f64),
    #[error("variable '{0}' is used before it is assigned")]
    UnboundVariable(String),
    #[error("call depth exceeded {0}")]
    CallDepthExceeded(usize),
    #[error("instruction limit exceeded: {0}")]
    InstructionLimitExceeded(u64),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed instruction {op}: {reason}")]
    MalformedInstruction { op: OpCode, reason: String },
    #[error("no active frame: the program has halted")]
    Halted,
}

/// Optional execution limits. Both are unlimited by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmOptions {
    /// Maximum number of nested function calls.
    pub max_call_depth: Option<usize>,
    /// Maximum number of executed instructions.
    pub max_instructions: Option<u64>,
}

/// Control-flow outcome of one instruction.
#[derive(Debug)]
pub enum Step {
    /// Continue with the next instruction.
    Next,
    /// Continue at this index of the active frame.
    Jump(usize),
    /// Suspend the active frame and enter this one.
    Call(Frame),
    /// Leave the active frame, handing this value to the caller.
    Return(Value),
}

pub struct VM<'io> {
    pub(crate) functions: HashMap<String, Callable>,
    pub(crate) current: Option<Frame>,
    pub(crate) call_stack: Vec<Frame>,
    /// The top-level frame once the program has halted.
    finished: Option<Frame>,
    pub(crate) input: Box<dyn BufRead + 'io>,
    pub(crate) output: Box<dyn Write + 'io>,
    pub(crate) options: VmOptions,
    executed: u64,
}

impl<'io> VM<'io> {
    /// Load a module. Execution starts at instruction 0 of its top level.
    pub fn new(module: Module, input: impl BufRead + 'io, output: impl Write + 'io) -> Self {
        let functions = module
            .functions
            .into_values()
            .map(|f| (f.name.clone(), Callable::from(f)))
            .collect();
        Self {
            functions,
            current: Some(Frame::main(module.main.into())),
            call_stack: Vec::new(),
            finished: None,
            input: Box::new(input),
            output: Box::new(output),
            options: VmOptions::default(),
            executed: 0,
        }
    }

    pub fn with_options(mut self, options: VmOptions) -> Self {
        self.options = options;
        self
    }

    pub fn is_halted(&self) -> bool {
        self.current.is_none()
    }

    /// Operand stack of the active frame, or of the top level after halting.
    pub fn stack(&self) -> &[Value] {
        self.current
            .as_ref()
            .or(self.finished.as_ref())
            .map(|f| f.stack.as_slice())
            .unwrap_or(&[])
    }

    /// Number of suspended caller frames.
    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn instructions_executed(&self) -> u64 {
        self.executed
    }

    /// Run until the call stack is empty.
    pub fn run(&mut self) -> Result<(), VmError> {
        while self.step()? {}
        self.output.flush()?;
        Ok(())
    }

    /// Execute one instruction, or unwind one finished frame. Returns `false`
    /// once the program has halted.
    pub fn step(&mut self) -> Result<bool, VmError> {
        let Some(frame) = self.current.as_ref() else {
            return Ok(false);
        };
        let Some(instr) = frame.current().cloned() else {
            self.leave_frame(None);
            return Ok(!self.is_halted());
        };

        self.executed += 1;
        if let Some(max) = self.options.max_instructions {
            if self.executed > max {
                return Err(VmError::InstructionLimitExceeded(max));
            }
        }
        trace!(
            frame = %frame.name,
            pc = frame.pc,
            depth = self.call_depth(),
            instr = %instr,
            "step"
        );

        match self.execute(&instr)? {
            Step::Next => self.frame_mut()?.pc += 1,
            Step::Jump(target) => self.frame_mut()?.pc = target,
            Step::Call(callee) => {
                let mut caller = self.current.take().ok_or(VmError::Halted)?;
                caller.pc += 1;
                debug!(function = %callee.name, depth = self.call_depth() + 1, "call");
                self.call_stack.push(caller);
                self.current = Some(callee);
            }
            Step::Return(value) => self.leave_frame(Some(value)),
        }
        Ok(!self.is_halted())
    }

    /// Pop the active frame. The caller, if any, becomes active and receives `value`.
    fn leave_frame(&mut self, value: Option<Value>) {
        let Some(done) = self.current.take() else {
            return;
        };
        match self.call_stack.pop() {
            Some(mut caller) => {
                debug!(function = %done.name, depth = self.call_depth(), "return");
                if let Some(value) = value {
                    caller.push(value);
                }
                self.current = Some(caller);
            }
            None => {
                debug!(executed = self.executed, "halt");
                self.finished = Some(done);
            }
        }
    }

    pub(crate) fn frame_mut(&mut self) -> Result<&mut Frame, VmError> {
        self.current.as_mut().ok_or(VmError::Halted)
    }

    /// Execute a single instruction against the active frame.
    pub fn execute(&mut self, instr: &Instruction) -> Result<Step, VmError> {
        match instr.op {
            OpCode::PushNum => self.push_number(instr),
            OpCode::PushChar => self.push_char(instr),
            OpCode::PushBool => self.push_bool(instr),
            OpCode::PushIdent => {
                let name = operand(instr)?;
                let frame = self.frame_mut()?;
                let var = frame.var(name);
                frame.push(Value::Var(var));
                Ok(Step::Next)
            }
            OpCode::PushEmptyString => {
                self.frame_mut()?.push(Value::string(""));
                Ok(Step::Next)
            }

            OpCode::Aggregate => self.aggregate(),
            OpCode::MakeTuple => self.make_tuple(),

            OpCode::Pop => {
                let frame = self.frame_mut()?;
                frame.operands(OpCode::Pop, 1)?;
                frame.take(1);
                Ok(Step::Next)
            }
            OpCode::Dup => {
                let frame = self.frame_mut()?;
                let top = frame.operands(OpCode::Dup, 1)?[0].clone();
                frame.push(top);
                Ok(Step::Next)
            }
            OpCode::Swap => {
                let frame = self.frame_mut()?;
                frame.operands(OpCode::Swap, 2)?;
                let len = frame.stack.len();
                frame.stack.swap(len - 1, len - 2);
                Ok(Step::Next)
            }

            OpCode::Add => self.arithmetic(OpCode::Add, |a, b| a + b),
            OpCode::Sub => self.arithmetic(OpCode::Sub, |a, b| a - b),
            OpCode::Mul => self.arithmetic(OpCode::Mul, |a, b| a * b),
            OpCode::Div => self.arithmetic(OpCode::Div, |a, b| a / b),
            OpCode::Pow => self.arithmetic(OpCode::Pow, f64::powf),

            OpCode::Equal => self.compare(OpCode::Equal),
            OpCode::Greater => self.compare(OpCode::Greater),
            OpCode::Less => self.compare(OpCode::Less),
            OpCode::And => self.logic(OpCode::And, |a, b| a && b),
            OpCode::Or => self.logic(OpCode::Or, |a, b| a || b),
            OpCode::Not => self.not(),

            OpCode::Concat => self.concat(),
            OpCode::RemoveAt => self.remove_at(),
            OpCode::InsertAt => self.insert_at(),
            OpCode::Unzip => self.unzip(),

            OpCode::Print => self.print(),
            OpCode::Input => self.input(),

            OpCode::Round => self.round(),
            OpCode::ToStr => {
                let frame = self.frame_mut()?;
                frame.operands(OpCode::ToStr, 1)?;
                let value = frame.take(1).remove(0);
                frame.push(Value::string(&value.to_string()));
                Ok(Step::Next)
            }
            OpCode::ToChar => self.to_char(),
            OpCode::ToBool => {
                let frame = self.frame_mut()?;
                frame.operands(OpCode::ToBool, 1)?;
                let value = frame.take(1).remove(0);
                frame.push(Value::Boolean(value.is_truthy()));
                Ok(Step::Next)
            }
            OpCode::ParseStr => self.parse_str(),

            OpCode::Assign => self.assign(),
            OpCode::Call => self.call(operand(instr)?),
            OpCode::Return => self.ret(),
            OpCode::WhileStart => self.while_start(operand(instr)?),
            OpCode::WhileEnd => {
                let label = operand(instr)?;
                let frame = self.frame_mut()?;
                frame
                    .find_loop_start(label)
                    .map(Step::Jump)
                    .ok_or_else(|| VmError::MalformedJump(label.to_string()))
            }
        }
    }
}

/// The text operand of an instruction that requires one.
pub(crate) fn operand(instr: &Instruction) -> Result<&str, VmError> {
    instr
        .arg
        .as_deref()
        .ok_or_else(|| VmError::MalformedInstruction {
            op: instr.op,
            reason: "missing operand".to_string(),
        })
}
