//! Canonical form of expressions.
//!
//! Two expressions that differ only in the order of operands of commutative
//! operators, in `>`/`<` orientation or in `a - b` vs `a + -b` have the same
//! canonical form. Canonical forms are compared through their printed text.

use super::{BinaryOp, Expr, UnaryOp};

impl Expr {
    pub fn canonical(&self) -> Expr {
        match self {
            Expr::Number(n) => Expr::Number(if *n == 0.0 { 0.0 } else { *n }),
            Expr::Bool(_) | Expr::Symbol(_) => self.clone(),
            Expr::Unary { op, operand } => {
                let operand = operand.canonical();
                match (op, operand) {
                    (UnaryOp::Neg, Expr::Number(n)) => Expr::Number(-n).canonical(),
                    (UnaryOp::Neg, Expr::Unary {
                        op: UnaryOp::Neg,
                        operand: inner,
                    }) => *inner,
                    (UnaryOp::Not, Expr::Unary {
                        op: UnaryOp::Not,
                        operand: inner,
                    }) => *inner,
                    (UnaryOp::Not, Expr::Bool(b)) => Expr::Bool(!b),
                    (op, operand) => Expr::unary(*op, operand),
                }
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::Sub => Expr::binary(
                    BinaryOp::Add,
                    (**lhs).clone(),
                    Expr::unary(UnaryOp::Neg, (**rhs).clone()),
                )
                .canonical(),
                BinaryOp::Gt => Expr::binary(BinaryOp::Lt, (**rhs).clone(), (**lhs).clone())
                    .canonical(),
                BinaryOp::Ge => Expr::binary(BinaryOp::Le, (**rhs).clone(), (**lhs).clone())
                    .canonical(),
                op if op.is_commutative() => {
                    let mut operands = Vec::new();
                    collect_chain(*op, lhs, &mut operands);
                    collect_chain(*op, rhs, &mut operands);
                    let mut keyed: Vec<(String, Expr)> = operands
                        .into_iter()
                        .map(|e| (e.to_string(), e))
                        .collect();
                    keyed.sort_by(|a, b| a.0.cmp(&b.0));
                    // A chain always has at least two operands.
                    Expr::fold(*op, keyed.into_iter().map(|(_, e)| e))
                        .unwrap_or_else(|| self.clone())
                }
                op => Expr::binary(*op, lhs.canonical(), rhs.canonical()),
            },
            Expr::Call { function, args } => Expr::Call {
                function: function.clone(),
                args: args.iter().map(Expr::canonical).collect(),
            },
        }
    }

    /// Text of the canonical form; equal keys mean equal expressions.
    pub fn canonical_key(&self) -> String {
        self.canonical().to_string()
    }
}

/// Collect canonical operands of a chain of the same commutative operator.
/// The raw tree is walked first and only the operands are canonicalized,
/// once each. Subtractions inside a sum join the chain as negated operands.
fn collect_chain(op: BinaryOp, expr: &Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Binary { op: inner, lhs, rhs } if *inner == op => {
            collect_chain(op, lhs, out);
            collect_chain(op, rhs, out);
        }
        Expr::Binary {
            op: BinaryOp::Sub,
            lhs,
            rhs,
        } if op == BinaryOp::Add => {
            collect_chain(op, lhs, out);
            split_canonical(op, Expr::unary(UnaryOp::Neg, (**rhs).clone()).canonical(), out);
        }
        other => split_canonical(op, other.canonical(), out),
    }
}

/// Push the operands of an already canonical expression. An operand whose
/// canonical form is itself an `op` chain (`--(a + b)`) is spliced in.
fn split_canonical(op: BinaryOp, canonical: Expr, out: &mut Vec<Expr>) {
    match canonical {
        Expr::Binary { op: inner, lhs, rhs } if inner == op => {
            split_canonical(op, *lhs, out);
            split_canonical(op, *rhs, out);
        }
        other => out.push(other),
    }
}
