//! Snakescript Compiler
//!
//! Turns snake-style source text into a [`Module`]: desnake → lex → parse → lower.

pub mod compiler;
pub mod diagnostics;

use compiler::ast::{Item, Program, Stmt};
use compiler::lexer::{DesnakeError, LexError};
use compiler::lower::{compile_value, Compiler};
use compiler::parser::ParseError;
use compiler::tokens::Token;
use snake_core::lir::{Instruction, Module};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("desnaking error: {0}")]
    Desnake(#[from] DesnakeError),
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("expected a single literal value, found {found}")]
    NotALiteral { found: String },
}

/// Tokenize desnaked source.
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    Ok(compiler::lexer::lex(source)?)
}

/// Lex and parse desnaked source.
pub fn parse_program(source: &str) -> Result<Program, CompileError> {
    let tokens = tokenize(source)?;
    Ok(compiler::parser::parse(tokens)?)
}

/// Compile desnaked source.
pub fn compile(source: &str) -> Result<Module, CompileError> {
    let program = parse_program(source)?;
    Ok(Compiler::new().translate(&program))
}

/// Compile a snake-style source file: desnake first, then [`compile`].
pub fn compile_snake(source: &str) -> Result<Module, CompileError> {
    let code = compiler::lexer::desnake(source)?;
    compile(&code)
}

/// Compile text that must consist of exactly one literal value (number,
/// character, boolean, string, list, tuple, or identifier) into its
/// construction sequence. The text is not desnaked.
pub fn compile_literal(text: &str) -> Result<Vec<Instruction>, CompileError> {
    let program = parse_program(text)?;
    match program.items.as_slice() {
        [Item::Stmt(Stmt::Value(node))] => Ok(compile_value(node)),
        [] => Err(CompileError::NotALiteral {
            found: "empty input".into(),
        }),
        [Item::Function(_)] => Err(CompileError::NotALiteral {
            found: "a function definition".into(),
        }),
        [Item::Stmt(_)] => Err(CompileError::NotALiteral {
            found: "a statement".into(),
        }),
        items => Err(CompileError::NotALiteral {
            found: format!("{} items", items.len()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snake_core::lir::OpCode;

    #[test]
    fn test_compile_literal_accepts_values() {
        let instrs = compile_literal("[1 2]").unwrap();
        assert_eq!(instrs.last().map(|i| i.op), Some(OpCode::Aggregate));
        assert_eq!(
            compile_literal("?t").unwrap(),
            vec![Instruction::with_arg(OpCode::PushBool, "true")]
        );
    }

    #[test]
    fn test_compile_literal_rejects_other_shapes() {
        assert!(matches!(
            compile_literal("1 2"),
            Err(CompileError::NotALiteral { found }) if found == "2 items"
        ));
        assert!(matches!(
            compile_literal("+"),
            Err(CompileError::NotALiteral { found }) if found == "a statement"
        ));
        assert!(matches!(
            compile_literal(""),
            Err(CompileError::NotALiteral { .. })
        ));
        assert!(matches!(compile_literal("~"), Err(CompileError::Lex(_))));
    }

    #[test]
    fn test_compile_snake_desnakes() {
        let line1 = format!("{:<80}", "'hi' .");
        let module = compile_snake(&line1).unwrap();
        assert_eq!(module.main.len(), 4);
        assert!(matches!(
            compile_snake("'hi' ."),
            Err(CompileError::Desnake(DesnakeError { line: 1, .. }))
        ));
    }
}
