//! Symbolic expressions used by aliases, time derivatives, triggers and
//! state assignments.
//!
//! Expressions are immutable trees. They can be parsed from text
//! ([`Expr::parse`]), queried for the symbols and functions they reference,
//! renamed, evaluated against a symbol table and a function table, and
//! compared for equality modulo the order of commutative operands.

mod canonical;
mod eval;
pub mod lexer;
mod parser;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ir::error::ModelError;

pub use eval::SymbolValues;

/// Symbols every expression may reference without a declaration.
pub const BUILTIN_SYMBOLS: [&str; 3] = ["pi", "e", "t"];

pub fn is_builtin_symbol(name: &str) -> bool {
    BUILTIN_SYMBOLS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Binding power; higher binds tighter.
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div => 5,
            BinaryOp::Pow => 7,
        }
    }

    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Mul | BinaryOp::And | BinaryOp::Or
        )
    }

    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

pub(crate) const UNARY_PRECEDENCE: u8 = 6;

/// An expression tree.
///
/// Equality is canonical: `a + b == b + a`, `x > y == y < x`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Expr {
    Number(f64),
    Bool(bool),
    Symbol(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Parse expression text.
    pub fn parse(source: &str) -> Result<Expr, ModelError> {
        parser::parse(source)
    }

    pub fn number(value: f64) -> Expr {
        Expr::Number(value)
    }

    pub fn symbol(name: &str) -> Expr {
        Expr::Symbol(name.to_string())
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(function: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            function: function.to_string(),
            args,
        }
    }

    /// Fold `exprs` with `op`, left-associative. `None` when empty.
    pub fn fold(op: BinaryOp, exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs
            .into_iter()
            .reduce(|acc, next| Expr::binary(op, acc, next))
    }

    /// Free symbols, excluding function names and the builtins `pi`, `e`, `t`.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        self.walk(&mut |expr| {
            if let Expr::Symbol(name) = expr {
                if !is_builtin_symbol(name) {
                    symbols.insert(name.clone());
                }
            }
        });
        symbols
    }

    /// Names of all functions called anywhere in the expression.
    pub fn referenced_functions(&self) -> BTreeSet<String> {
        let mut functions = BTreeSet::new();
        self.walk(&mut |expr| {
            if let Expr::Call { function, .. } = expr {
                functions.insert(function.clone());
            }
        });
        functions
    }

    /// Pre-order traversal.
    pub fn walk<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        match self {
            Expr::Number(_) | Expr::Bool(_) | Expr::Symbol(_) => {}
            Expr::Unary { operand, .. } => operand.walk(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.walk(f);
                }
            }
        }
    }

    /// Rename free symbols. Function names are never touched.
    pub fn substitute(&self, name_map: &HashMap<String, String>) -> Expr {
        self.map_symbols(&mut |name| name_map.get(name).map(|n| Expr::Symbol(n.clone())))
    }

    /// Replace symbols by whole expressions. Replacement is simultaneous:
    /// inserted expressions are not scanned again.
    pub fn replace_symbols(&self, replacements: &HashMap<String, Expr>) -> Expr {
        self.map_symbols(&mut |name| replacements.get(name).cloned())
    }

    fn map_symbols<F: FnMut(&str) -> Option<Expr>>(&self, f: &mut F) -> Expr {
        match self {
            Expr::Number(_) | Expr::Bool(_) => self.clone(),
            Expr::Symbol(name) => f(name).unwrap_or_else(|| self.clone()),
            Expr::Unary { op, operand } => Expr::unary(*op, operand.map_symbols(f)),
            Expr::Binary { op, lhs, rhs } => {
                Expr::binary(*op, lhs.map_symbols(f), rhs.map_symbols(f))
            }
            Expr::Call { function, args } => Expr::Call {
                function: function.clone(),
                args: args.iter().map(|a| a.map_symbols(f)).collect(),
            },
        }
    }

    /// Remove additive zeros and multiplicative ones.
    pub fn simplify_identities(&self) -> Expr {
        match self {
            Expr::Unary { op, operand } => Expr::unary(*op, operand.simplify_identities()),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = lhs.simplify_identities();
                let rhs = rhs.simplify_identities();
                match op {
                    BinaryOp::Add | BinaryOp::Sub if rhs.is_number(0.0) => lhs,
                    BinaryOp::Add if lhs.is_number(0.0) => rhs,
                    BinaryOp::Mul | BinaryOp::Div if rhs.is_number(1.0) => lhs,
                    BinaryOp::Mul if lhs.is_number(1.0) => rhs,
                    _ => Expr::binary(*op, lhs, rhs),
                }
            }
            Expr::Call { function, args } => Expr::Call {
                function: function.clone(),
                args: args.iter().map(Expr::simplify_identities).collect(),
            },
            _ => self.clone(),
        }
    }

    fn is_number(&self, value: f64) -> bool {
        matches!(self, Expr::Number(n) if *n == value)
    }

    /// Whether the root of the expression produces a boolean.
    pub fn is_condition(&self) -> bool {
        match self {
            Expr::Bool(_) => true,
            Expr::Unary { op, .. } => *op == UnaryOp::Not,
            Expr::Binary { op, .. } => op.is_relational() || op.is_logical(),
            _ => false,
        }
    }

    /// Mismatched operand kinds below the root, e.g. `(a < b) + 1` or `!x`.
    pub fn kind_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.check_kinds(&mut errors);
        errors
    }

    fn check_kinds(&self, errors: &mut Vec<String>) {
        match self {
            Expr::Number(_) | Expr::Bool(_) | Expr::Symbol(_) => {}
            Expr::Unary { op, operand } => {
                let wants_condition = *op == UnaryOp::Not;
                if operand.is_condition() != wants_condition {
                    errors.push(format!("operand of '{}' in '{}'", op_text(*op), self));
                }
                operand.check_kinds(errors);
            }
            Expr::Binary { op, lhs, rhs } => {
                let wants_condition = op.is_logical();
                for side in [lhs, rhs] {
                    if side.is_condition() != wants_condition {
                        errors.push(format!("operand '{}' of '{}'", side, op.symbol()));
                    }
                    side.check_kinds(errors);
                }
            }
            Expr::Call { function, args } => {
                for arg in args {
                    if arg.is_condition() {
                        errors.push(format!("argument '{}' of '{}'", arg, function));
                    }
                    arg.check_kinds(errors);
                }
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Number(n) if *n < 0.0 || (*n == 0.0 && n.is_sign_negative()) => {
                UNARY_PRECEDENCE
            }
            Expr::Unary { .. } => UNARY_PRECEDENCE,
            Expr::Binary { op, .. } => op.precedence(),
            _ => u8::MAX,
        }
    }

    fn fmt_with(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        let wrap = self.precedence() < min_precedence;
        if wrap {
            write!(f, "(")?;
        }
        match self {
            Expr::Number(n) => write!(f, "{}", n)?,
            Expr::Bool(b) => write!(f, "{}", b)?,
            Expr::Symbol(name) => write!(f, "{}", name)?,
            Expr::Unary { op, operand } => {
                write!(f, "{}", op_text(*op))?;
                operand.fmt_with(f, UNARY_PRECEDENCE)?;
            }
            Expr::Binary { op, lhs, rhs } => {
                let p = op.precedence();
                let (left_min, right_min) = if *op == BinaryOp::Pow {
                    (p + 1, p)
                } else if op.is_relational() {
                    (p + 1, p + 1)
                } else {
                    (p, p + 1)
                };
                lhs.fmt_with(f, left_min)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_with(f, right_min)?;
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    arg.fmt_with(f, 0)?;
                }
                write!(f, ")")?;
            }
        }
        if wrap {
            write!(f, ")")?;
        }
        Ok(())
    }
}

fn op_text(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Not => "!",
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with(f, 0)
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl FromStr for Expr {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expr::parse(s)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Number(value)
    }
}

impl From<Expr> for String {
    fn from(expr: Expr) -> Self {
        expr.to_string()
    }
}

impl TryFrom<String> for Expr {
    type Error = ModelError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Expr::parse(&source)
    }
}
