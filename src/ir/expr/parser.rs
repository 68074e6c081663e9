//! Pratt parser turning expression tokens into an [`Expr`] tree.

use super::lexer::{lex, Spanned, Token};
use super::{BinaryOp, Expr, UnaryOp, UNARY_PRECEDENCE};
use crate::ir::error::ModelError;

pub fn parse(source: &str) -> Result<Expr, ModelError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.expression(0)?;
    if let Some(extra) = parser.peek_spanned() {
        return Err(parser.error_at(extra.span.start, "unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Spanned<Token>>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_spanned(&self) -> Option<&Spanned<Token>> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.span.start)
            .unwrap_or(self.source.len())
    }

    fn error_at(&self, offset: usize, message: &str) -> ModelError {
        ModelError::Parse {
            input: self.source.to_string(),
            offset,
            message: message.to_string(),
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ModelError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error_at(self.offset(), &format!("expected {}", what)))
        }
    }

    /// Parse an expression whose operators bind at least as tight as `min_bp`.
    fn expression(&mut self, min_bp: u8) -> Result<Expr, ModelError> {
        let mut lhs = self.prefix()?;

        while let Some(op) = self.peek().and_then(binary_op) {
            let bp = op.precedence();
            if bp < min_bp {
                break;
            }
            self.pos += 1;
            let next_min = if op == BinaryOp::Pow { bp } else { bp + 1 };
            let rhs = self.expression(next_min)?;
            if op.is_relational() {
                if let Some(next) = self.peek().and_then(binary_op) {
                    if next.is_relational() {
                        return Err(self.error_at(
                            self.offset(),
                            "relational operators cannot be chained",
                        ));
                    }
                }
            }
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, ModelError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Minus) => {
                let operand = self.expression(UNARY_PRECEDENCE)?;
                Ok(Expr::unary(UnaryOp::Neg, operand))
            }
            Some(Token::Plus) => self.expression(UNARY_PRECEDENCE),
            Some(Token::Bang) => {
                let operand = self.expression(UNARY_PRECEDENCE)?;
                Ok(Expr::unary(UnaryOp::Not, operand))
            }
            Some(Token::LParen) => {
                let inner = self.expression(0)?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    Ok(Expr::Call {
                        function: name,
                        args,
                    })
                } else if name.contains('.') {
                    Err(self.error_at(
                        offset,
                        &format!("dotted name '{}' is only valid as a function name", name),
                    ))
                } else {
                    Ok(Expr::Symbol(name))
                }
            }
            Some(_) => Err(self.error_at(offset, "expected an operand")),
            None => Err(self.error_at(offset, "unexpected end of input")),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ModelError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression(0)?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(self.error_at(self.offset(), "expected ',' or ')'")),
            }
        }
    }
}

fn binary_op(token: &Token) -> Option<BinaryOp> {
    let op = match token {
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        Token::Caret => BinaryOp::Pow,
        Token::Lt => BinaryOp::Lt,
        Token::Le => BinaryOp::Le,
        Token::Gt => BinaryOp::Gt,
        Token::Ge => BinaryOp::Ge,
        Token::AndAnd => BinaryOp::And,
        Token::OrOr => BinaryOp::Or,
        _ => return None,
    };
    Some(op)
}
