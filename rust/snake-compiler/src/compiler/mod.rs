pub mod ast;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod tokens;
