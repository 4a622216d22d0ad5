use crate::compiler::tokens::{Span, Token, TokenKind};
use thiserror::Error;

/// Every stored line of a snake-style source file has exactly this many characters.
pub const LINE_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, col {col}")]
    UnexpectedChar { ch: char, line: usize, col: usize },
    #[error("unterminated literal at line {line}, col {col}")]
    UnterminatedLiteral { line: usize, col: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("incorrect number of characters per line: expected {expected} characters on line {line}, found {found}")]
pub struct DesnakeError {
    pub line: usize,
    pub expected: usize,
    pub found: usize,
}

/// Undo the boustrophedon layout of a source file.
///
/// Every line must be exactly [`LINE_WIDTH`] characters wide, except for an
/// empty final line. Lines are numbered from 1 and every even-numbered line
/// is stored right-to-left, so it is reversed back. A trailing `\r` is not
/// counted towards the width.
pub fn desnake(code: &str) -> Result<String, DesnakeError> {
    let lines: Vec<&str> = code.split('\n').collect();
    let last = lines.len() - 1;
    let mut out = Vec::with_capacity(lines.len());
    for (idx, raw) in lines.iter().enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let width = line.chars().count();
        if idx == last && width == 0 {
            out.push(String::new());
            continue;
        }
        if width != LINE_WIDTH {
            return Err(DesnakeError {
                line: idx + 1,
                expected: LINE_WIDTH,
                found: width,
            });
        }
        if idx % 2 == 0 {
            out.push(line.to_string());
        } else {
            out.push(line.chars().rev().collect());
        }
    }
    Ok(out.join("\n"))
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    byte_offset: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            byte_offset: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.source.get(self.pos + 2).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        self.byte_offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    /// Consume `n` characters and emit `kind` spanning them.
    fn symbol(&mut self, kind: TokenKind, n: usize) -> Token {
        let (start, line, col) = (self.byte_offset, self.line, self.col);
        for _ in 0..n {
            self.advance();
        }
        Token::new(kind, Span::new(start, self.byte_offset, line, col))
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
                continue;
            }
            let next = self.peek();
            let tok = match ch {
                '\'' => self.lex_quoted()?,
                '0'..='9' => self.lex_number(),
                '.' if next.is_some_and(|c| c.is_ascii_digit()) => self.lex_number(),
                c if c.is_ascii_alphabetic() || c == '_' => self.lex_ident(),
                '#' => self.symbol(TokenKind::NumType, 1),
                '@' => match next {
                    Some('@') => self.symbol(TokenKind::InsertAt, 2),
                    _ => self.symbol(TokenKind::CharType, 1),
                },
                '?' => match next {
                    Some('?') => self.symbol(TokenKind::BoolType, 2),
                    Some('t') => self.symbol(TokenKind::BoolLit(true), 2),
                    Some('f') => self.symbol(TokenKind::BoolLit(false), 2),
                    Some('=') => self.symbol(TokenKind::BoolEq, 2),
                    Some('>') => self.symbol(TokenKind::BoolGt, 2),
                    Some('<') => self.symbol(TokenKind::BoolLt, 2),
                    Some('!') => self.symbol(TokenKind::BoolNot, 2),
                    Some('&') => self.symbol(TokenKind::BoolAnd, 2),
                    Some('|') => self.symbol(TokenKind::BoolOr, 2),
                    _ => self.symbol(TokenKind::ToBool, 1),
                },
                '[' => match (next, self.peek2()) {
                    (Some('?'), Some(']')) => self.symbol(TokenKind::While, 3),
                    (Some(']'), _) => self.symbol(TokenKind::Aggregate, 2),
                    _ => self.symbol(TokenKind::LBracket, 1),
                },
                ']' => match next {
                    Some('[') => self.symbol(TokenKind::Unzip, 2),
                    _ => self.symbol(TokenKind::RBracket, 1),
                },
                '<' => match next {
                    Some('<') => self.symbol(TokenKind::Return, 2),
                    Some('>') => self.symbol(TokenKind::Swap, 2),
                    _ => return Err(self.unexpected(ch)),
                },
                '>' => match next {
                    Some('>') => self.symbol(TokenKind::Pop, 2),
                    Some('<') => self.symbol(TokenKind::Dup, 2),
                    _ => self.symbol(TokenKind::To, 1),
                },
                '^' => match next {
                    Some('^') => self.symbol(TokenKind::Round, 2),
                    _ => self.symbol(TokenKind::Caret, 1),
                },
                '+' => match next {
                    Some('+') => self.symbol(TokenKind::Concat, 2),
                    _ => self.symbol(TokenKind::Plus, 1),
                },
                '-' => match next {
                    Some('-') => self.symbol(TokenKind::RemoveAt, 2),
                    _ => self.symbol(TokenKind::Minus, 1),
                },
                '(' => match next {
                    Some(')') => self.symbol(TokenKind::MakeTuple, 2),
                    _ => self.symbol(TokenKind::LParen, 1),
                },
                '!' => match next {
                    Some('?') => self.symbol(TokenKind::ParseStr, 2),
                    _ => return Err(self.unexpected(ch)),
                },
                '*' => self.symbol(TokenKind::Star, 1),
                '/' => self.symbol(TokenKind::Slash, 1),
                '.' => self.symbol(TokenKind::Print, 1),
                ',' => self.symbol(TokenKind::Input, 1),
                '$' => self.symbol(TokenKind::ToStr, 1),
                '`' => self.symbol(TokenKind::ToChar, 1),
                '=' => self.symbol(TokenKind::Assign, 1),
                '\\' => self.symbol(TokenKind::Backslash, 1),
                ':' => self.symbol(TokenKind::Colon, 1),
                ')' => self.symbol(TokenKind::RParen, 1),
                '{' => self.symbol(TokenKind::LBrace, 1),
                '}' => self.symbol(TokenKind::RBrace, 1),
                _ => return Err(self.unexpected(ch)),
            };
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn unexpected(&self, ch: char) -> LexError {
        LexError::UnexpectedChar {
            ch,
            line: self.line,
            col: self.col,
        }
    }

    fn lex_ident(&mut self) -> Token {
        let (start, line, col) = (self.byte_offset, self.line, self.col);
        let mut name = String::new();
        while let Some(c) = self.current() {
            if !(c.is_ascii_alphabetic() || c == '_') {
                break;
            }
            name.push(c);
            self.advance();
        }
        Token::new(TokenKind::Ident(name), Span::new(start, self.byte_offset, line, col))
    }

    fn take_digits(&mut self, text: &mut String) {
        while let Some(c) = self.current() {
            if !c.is_ascii_digit() {
                break;
            }
            text.push(c);
            self.advance();
        }
    }

    /// `12`, `1.5`, `.5`, `2e10`. A dot or exponent is taken only when digits
    /// follow it, so `1.` is a number and a print.
    fn lex_number(&mut self) -> Token {
        let (start, line, col) = (self.byte_offset, self.line, self.col);
        let mut text = String::new();
        self.take_digits(&mut text);
        if self.current() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            self.take_digits(&mut text);
        }
        if self.current() == Some('e') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push('e');
            self.advance();
            self.take_digits(&mut text);
        }
        Token::new(TokenKind::NumLit(text), Span::new(start, self.byte_offset, line, col))
    }

    /// A quoted literal. One character (after escapes) is a character literal,
    /// anything else is a string.
    fn lex_quoted(&mut self) -> Result<Token, LexError> {
        let (start, line, col) = (self.byte_offset, self.line, self.col);
        self.advance();
        let mut chars = Vec::new();
        loop {
            match self.advance() {
                None => return Err(LexError::UnterminatedLiteral { line, col }),
                Some('\'') => break,
                Some('\\') => {
                    let escaped = self
                        .advance()
                        .ok_or(LexError::UnterminatedLiteral { line, col })?;
                    chars.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                Some(c) => chars.push(c),
            }
        }
        let kind = match chars.as_slice() {
            [c] => TokenKind::CharLit(*c),
            _ => TokenKind::StrLit(chars.into_iter().collect()),
        };
        Ok(Token::new(kind, Span::new(start, self.byte_offset, line, col)))
    }
}

/// Tokenize already-desnaked source.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}
