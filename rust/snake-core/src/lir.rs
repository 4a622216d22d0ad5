//! Stack-machine instruction set shared by the compiler and the VM.
//! One opcode per instruction plus an optional text operand.

use crate::types::Type;
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumCount, EnumIter};

/// Opcodes for the Snakescript stack VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "snake_case")]
pub enum OpCode {
    // Literal pushes
    PushNum,         // arg: number source text
    PushChar,        // arg: the character
    PushBool,        // arg: "true" | "false"
    PushIdent,       // arg: variable name
    PushEmptyString,

    // Data construction
    Aggregate, // collect the run of values sharing the top's type into a list
    MakeTuple, // pop item1, pop item2

    // Stack
    Pop,
    Dup,
    Swap,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Pow,

    // Comparison / logic
    Equal,
    Greater,
    Less,
    And,
    Or,
    Not,

    // Lists and tuples
    Concat,
    RemoveAt,
    InsertAt,
    Unzip,

    // I/O
    Print,
    Input,

    // Conversion
    Round,
    ToStr,
    ToChar,
    ToBool,
    ParseStr,

    // Variables and control flow
    Assign,
    Call,       // arg: function name
    Return,
    WhileStart, // arg: loop label
    WhileEnd,   // arg: loop label
}

/// A single instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: OpCode,
    pub arg: Option<String>,
}

impl Instruction {
    pub fn new(op: OpCode) -> Self {
        Self { op, arg: None }
    }

    pub fn with_arg(op: OpCode, arg: impl Into<String>) -> Self {
        Self {
            op,
            arg: Some(arg.into()),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.arg, self.op) {
            (Some(arg), OpCode::PushChar) => write!(f, "{} {:?}", self.op, arg),
            (Some(arg), _) => write!(f, "{} {}", self.op, arg),
            (None, _) => write!(f, "{}", self.op),
        }
    }
}

/// A compiled function. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub input: Type,
    pub output: Type,
    pub instructions: Vec<Instruction>,
}

/// A compiled program: the top-level instruction sequence and its function table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub main: Vec<Instruction>,
    pub functions: BTreeMap<String, Function>,
}

fn write_listing(f: &mut fmt::Formatter<'_>, instructions: &[Instruction]) -> fmt::Result {
    for (idx, instr) in instructions.iter().enumerate() {
        writeln!(f, "  {:04}  {}", idx, instr)?;
    }
    Ok(())
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn {} : {} > {}", self.name, self.input, self.output)?;
        write_listing(f, &self.instructions)
    }
}

/// Disassembly listing: `main` first, then functions in name order.
impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "main")?;
        write_listing(f, &self.main)?;
        for func in self.functions.values() {
            writeln!(f)?;
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}
