use crate::compiler::tokens::Span;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// A complete Snakescript program (one desnaked source file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub items: Vec<Item>,
    pub span: Span,
}

/// Top-level items, in source order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Item {
    Function(FunctionDef),
    Stmt(Stmt),
}

impl Item {
    pub fn span(&self) -> Span {
        match self {
            Item::Function(f) => f.span,
            Item::Stmt(s) => s.span(),
        }
    }
}

/// `\ name : input > output { body }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub input: TypeExpr,
    pub output: TypeExpr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawType {
    Number,
    Character,
    Boolean,
}

/// Type annotation as written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    Raw(RawType, Span),
    List(Box<TypeExpr>, Span),
    Tuple(Box<TypeExpr>, Box<TypeExpr>, Span),
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Raw(_, s) | TypeExpr::List(_, s) | TypeExpr::Tuple(_, _, s) => *s,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Op(Operator, Span),
    While { body: Vec<Stmt>, span: Span },
    Call(String, Span),
    Return(Span),
    Value(ValueNode),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Op(_, s) | Stmt::Call(_, s) | Stmt::Return(s) => *s,
            Stmt::While { span, .. } => *span,
            Stmt::Value(v) => v.span,
        }
    }
}

/// Single-token operator statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize, Deserialize)]
pub enum Operator {
    Pop,
    Dup,
    Swap,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Gt,
    Lt,
    Not,
    And,
    Or,
    Concat,
    RemoveAt,
    InsertAt,
    Aggregate,
    Unzip,
    Print,
    Input,
    Round,
    ToStr,
    ToChr,
    ToBool,
    ParseStr,
    MakeTuple,
    Assign,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueNode {
    pub kind: ValueKind,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ValueKind {
    /// Number literal, kept as source text
    Number(String),
    Char(char),
    Bool(bool),
    Str(String),
    Ident(String),
    List(Vec<ValueNode>),
    Tuple(Box<ValueNode>, Box<ValueNode>),
}
