use crate::compiler::ast::*;
use crate::compiler::tokens::{Span, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected token {found} at line {line}, col {col}; expected {expected}")]
    Unexpected {
        found: String,
        expected: String,
        line: usize,
        col: usize,
    },
    #[error("unexpected end of input; expected {expected}")]
    UnexpectedEof { expected: String },
    #[error("nesting deeper than {limit} levels at line {line}, col {col}")]
    TooDeep {
        limit: usize,
        line: usize,
        col: usize,
    },
}

impl ParseError {
    /// Position of the offending token, if there was one.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            ParseError::Unexpected { line, col, .. } | ParseError::TooDeep { line, col, .. } => {
                Some((*line, *col))
            }
            ParseError::UnexpectedEof { .. } => None,
        }
    }
}

/// Deepest allowed nesting of brackets, parentheses and loop bodies.
pub const MAX_NESTING: usize = 256;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Run `f` one nesting level deeper, opened by the token at `at`.
    fn nested<T>(
        &mut self,
        at: Span,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::TooDeep {
                limit: MAX_NESTING,
                line: at.line,
                col: at.col,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.current().map(|t| &t.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self, expected: &str) -> Result<Token, ParseError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ParseError::UnexpectedEof {
                expected: expected.to_string(),
            })?;
        self.pos += 1;
        Ok(tok)
    }

    fn unexpected(tok: &Token, expected: &str) -> ParseError {
        ParseError::Unexpected {
            found: tok.kind.to_string(),
            expected: expected.to_string(),
            line: tok.span.line,
            col: tok.span.col,
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        let expected = kind.to_string();
        let tok = self.advance(&expected)?;
        if std::mem::discriminant(&tok.kind) == std::mem::discriminant(kind) {
            Ok(tok)
        } else {
            Err(Self::unexpected(&tok, &expected))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        let tok = self.advance("identifier")?;
        match tok.kind {
            TokenKind::Ident(name) => Ok((name, tok.span)),
            _ => Err(Self::unexpected(&tok, "identifier")),
        }
    }

    // ── Top-level parsing ──

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let span_start = self.current().map(|t| t.span).unwrap_or_else(Span::dummy);
        let mut items = Vec::new();
        while !self.at_end() {
            let item = match self.peek_kind() {
                Some(TokenKind::Backslash) => Item::Function(self.parse_function()?),
                _ => Item::Stmt(self.parse_stmt()?),
            };
            items.push(item);
        }
        let span = match items.last() {
            Some(last) => span_start.merge(last.span()),
            None => span_start,
        };
        Ok(Program { items, span })
    }

    fn parse_function(&mut self) -> Result<FunctionDef, ParseError> {
        let start = self.expect(&TokenKind::Backslash)?.span;
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::Colon)?;
        let input = self.parse_type()?;
        self.expect(&TokenKind::To)?;
        let output = self.parse_type()?;
        let (body, end) = self.parse_body()?;
        Ok(FunctionDef {
            name,
            input,
            output,
            body,
            span: start.merge(end),
        })
    }

    fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        let tok = self.advance("type")?;
        match tok.kind {
            TokenKind::NumType => Ok(TypeExpr::Raw(RawType::Number, tok.span)),
            TokenKind::CharType => Ok(TypeExpr::Raw(RawType::Character, tok.span)),
            TokenKind::BoolType => Ok(TypeExpr::Raw(RawType::Boolean, tok.span)),
            TokenKind::LBracket => self.nested(tok.span, |p| {
                let elem = p.parse_type()?;
                let end = p.expect(&TokenKind::RBracket)?.span;
                Ok(TypeExpr::List(Box::new(elem), tok.span.merge(end)))
            }),
            TokenKind::LParen => self.nested(tok.span, |p| {
                let first = p.parse_type()?;
                let second = p.parse_type()?;
                let end = p.expect(&TokenKind::RParen)?.span;
                Ok(TypeExpr::Tuple(
                    Box::new(first),
                    Box::new(second),
                    tok.span.merge(end),
                ))
            }),
            _ => Err(Self::unexpected(&tok, "type")),
        }
    }

    /// `{ stmt* }`, returning the statements and the closing brace's span.
    fn parse_body(&mut self) -> Result<(Vec<Stmt>, Span), ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::RBrace) => {
                    let end = self.expect(&TokenKind::RBrace)?.span;
                    return Ok((body, end));
                }
                Some(_) => body.push(self.parse_stmt()?),
                None => {
                    return Err(ParseError::UnexpectedEof {
                        expected: "}".into(),
                    })
                }
            }
        }
    }

    // ── Statements ──

    pub fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let Some(tok) = self.current().cloned() else {
            return Err(ParseError::UnexpectedEof {
                expected: "statement".into(),
            });
        };
        if let Some(op) = operator_for(&tok.kind) {
            self.pos += 1;
            return Ok(Stmt::Op(op, tok.span));
        }
        match tok.kind {
            TokenKind::While => {
                self.pos += 1;
                let (body, end) = self.nested(tok.span, Self::parse_body)?;
                Ok(Stmt::While {
                    body,
                    span: tok.span.merge(end),
                })
            }
            TokenKind::Return => {
                self.pos += 1;
                Ok(Stmt::Return(tok.span))
            }
            TokenKind::LParen
                if matches!(self.peek_kind_at(1), Some(TokenKind::Ident(_)))
                    && matches!(self.peek_kind_at(2), Some(TokenKind::RParen)) =>
            {
                self.pos += 1;
                let (name, _) = self.expect_ident()?;
                let end = self.expect(&TokenKind::RParen)?.span;
                Ok(Stmt::Call(name, tok.span.merge(end)))
            }
            _ => Ok(Stmt::Value(self.parse_value()?)),
        }
    }

    // ── Values ──

    pub fn parse_value(&mut self) -> Result<ValueNode, ParseError> {
        let tok = self.advance("value")?;
        let kind = match tok.kind {
            TokenKind::NumLit(text) => ValueKind::Number(text),
            TokenKind::CharLit(c) => ValueKind::Char(c),
            TokenKind::BoolLit(b) => ValueKind::Bool(b),
            TokenKind::StrLit(s) => ValueKind::Str(s),
            TokenKind::Ident(name) => ValueKind::Ident(name),
            TokenKind::LBracket => return self.nested(tok.span, |p| p.parse_list(tok.span)),
            TokenKind::LParen => {
                return self.nested(tok.span, |p| {
                    let first = p.parse_value()?;
                    let second = p.parse_value()?;
                    let end = p.expect(&TokenKind::RParen)?.span;
                    Ok(ValueNode {
                        kind: ValueKind::Tuple(Box::new(first), Box::new(second)),
                        span: tok.span.merge(end),
                    })
                })
            }
            _ => return Err(Self::unexpected(&tok, "value")),
        };
        Ok(ValueNode {
            kind,
            span: tok.span,
        })
    }

    /// The rest of a list literal after its opening bracket.
    fn parse_list(&mut self, start: Span) -> Result<ValueNode, ParseError> {
        let mut items = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::RBracket) => break,
                Some(_) => items.push(self.parse_value()?),
                None => {
                    return Err(ParseError::UnexpectedEof {
                        expected: "]".into(),
                    })
                }
            }
        }
        let end = self.expect(&TokenKind::RBracket)?;
        if items.is_empty() {
            // An empty literal has no element type to build a list from.
            return Err(Self::unexpected(&end, "list element"));
        }
        Ok(ValueNode {
            kind: ValueKind::List(items),
            span: start.merge(end.span),
        })
    }
}

fn operator_for(kind: &TokenKind) -> Option<Operator> {
    let op = match kind {
        TokenKind::Pop => Operator::Pop,
        TokenKind::Dup => Operator::Dup,
        TokenKind::Swap => Operator::Swap,
        TokenKind::Plus => Operator::Add,
        TokenKind::Minus => Operator::Sub,
        TokenKind::Star => Operator::Mul,
        TokenKind::Slash => Operator::Div,
        TokenKind::Caret => Operator::Pow,
        TokenKind::BoolEq => Operator::Eq,
        TokenKind::BoolGt => Operator::Gt,
        TokenKind::BoolLt => Operator::Lt,
        TokenKind::BoolNot => Operator::Not,
        TokenKind::BoolAnd => Operator::And,
        TokenKind::BoolOr => Operator::Or,
        TokenKind::Concat => Operator::Concat,
        TokenKind::RemoveAt => Operator::RemoveAt,
        TokenKind::InsertAt => Operator::InsertAt,
        TokenKind::Aggregate => Operator::Aggregate,
        TokenKind::Unzip => Operator::Unzip,
        TokenKind::Print => Operator::Print,
        TokenKind::Input => Operator::Input,
        TokenKind::Round => Operator::Round,
        TokenKind::ToStr => Operator::ToStr,
        TokenKind::ToChar => Operator::ToChr,
        TokenKind::ToBool => Operator::ToBool,
        TokenKind::ParseStr => Operator::ParseStr,
        TokenKind::MakeTuple => Operator::MakeTuple,
        TokenKind::Assign => Operator::Assign,
        _ => return None,
    };
    Some(op)
}

/// Parse a token stream into a program.
pub fn parse(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse_program()
}
