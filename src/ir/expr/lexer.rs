//! Lexer for expression text.
//!
//! Uses Logos for tokenization.

use logos::{Logos, Span};

use crate::ir::error::ModelError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", finite_number)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", finite_number)]
    Number(f64),

    /// Identifier, possibly dotted (`random.uniform`).
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    #[token("**")]
    Caret,

    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    #[token("&&")]
    #[token("&")]
    AndAnd,
    #[token("||")]
    #[token("|")]
    OrOr,
    #[token("!")]
    Bang,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
}

/// Literals that overflow `f64` are rejected; they would print as `inf`.
fn finite_number(lex: &mut logos::Lexer<Token>) -> Option<f64> {
    lex.slice().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// A token with its byte span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
}

/// Tokenize `source`, failing on the first unrecognized character.
pub fn lex(source: &str) -> Result<Vec<Spanned<Token>>, ModelError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(Spanned {
                token,
                span: lexer.span(),
            }),
            Err(()) => {
                let slice = lexer.slice();
                let message = if slice.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
                    format!("number literal '{}' is out of range", slice)
                } else {
                    format!("unexpected character(s) '{}'", slice)
                };
                return Err(ModelError::Parse {
                    input: source.to_string(),
                    offset: lexer.span().start,
                    message,
                });
            }
        }
    }
    Ok(tokens)
}
