use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location in the desnaked program text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the start in the source
    pub start: usize,
    /// Byte offset of the end (exclusive) in the source
    pub end: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column number
    pub col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        Self {
            start,
            end,
            line,
            col,
        }
    }

    pub fn dummy() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 0,
            col: 0,
        }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line.min(other.line),
            col: if self.line <= other.line {
                self.col
            } else {
                other.col
            },
        }
    }
}

/// Token types for Snakescript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    NumLit(String),
    CharLit(char),
    StrLit(String),
    BoolLit(bool),
    Ident(String),

    // Raw type names
    NumType,  // #
    CharType, // @
    BoolType, // ??

    // Control
    While,  // [?]
    Return, // <<

    // Stack
    Pop,  // >>
    Dup,  // ><
    Swap, // <>

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Caret,

    // Comparison / logic
    BoolEq,  // ?=
    BoolGt,  // ?>
    BoolLt,  // ?<
    BoolNot, // ?!
    BoolAnd, // ?&
    BoolOr,  // ?|

    // Lists and tuples
    Concat,    // ++
    RemoveAt,  // --
    InsertAt,  // @@
    Aggregate, // []
    Unzip,     // ][
    MakeTuple, // ()

    // I/O and conversion
    Print,    // .
    Input,    // ,
    Round,    // ^^
    ToStr,    // $
    ToChar,   // `
    ToBool,   // ?
    ParseStr, // !?

    Assign, // =

    // Definitions and delimiters
    Backslash,
    Colon,
    To, // >
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::NumLit(n) => return write!(f, "{}", n),
            TokenKind::CharLit(c) => return write!(f, "'{}'", c.escape_default()),
            TokenKind::StrLit(s) => return write!(f, "'{}'", s.escape_default()),
            TokenKind::BoolLit(true) => "?t",
            TokenKind::BoolLit(false) => "?f",
            TokenKind::Ident(s) => return write!(f, "{}", s),
            TokenKind::NumType => "#",
            TokenKind::CharType => "@",
            TokenKind::BoolType => "??",
            TokenKind::While => "[?]",
            TokenKind::Return => "<<",
            TokenKind::Pop => ">>",
            TokenKind::Dup => "><",
            TokenKind::Swap => "<>",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Caret => "^",
            TokenKind::BoolEq => "?=",
            TokenKind::BoolGt => "?>",
            TokenKind::BoolLt => "?<",
            TokenKind::BoolNot => "?!",
            TokenKind::BoolAnd => "?&",
            TokenKind::BoolOr => "?|",
            TokenKind::Concat => "++",
            TokenKind::RemoveAt => "--",
            TokenKind::InsertAt => "@@",
            TokenKind::Aggregate => "[]",
            TokenKind::Unzip => "][",
            TokenKind::MakeTuple => "()",
            TokenKind::Print => ".",
            TokenKind::Input => ",",
            TokenKind::Round => "^^",
            TokenKind::ToStr => "$",
            TokenKind::ToChar => "`",
            TokenKind::ToBool => "?",
            TokenKind::ParseStr => "!?",
            TokenKind::Assign => "=",
            TokenKind::Backslash => "\\",
            TokenKind::Colon => ":",
            TokenKind::To => ">",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}
