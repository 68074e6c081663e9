//! Numeric and boolean evaluation of expressions.

use std::collections::HashMap;

use rand::rngs::StdRng;

use super::{BinaryOp, Expr, UnaryOp};
use crate::ir::error::ModelError;
use crate::ir::functions::{FunctionKind, FunctionTable};

/// Values of the symbols an expression may reference.
pub type SymbolValues = HashMap<String, f64>;

/// Intermediate value: expressions mix numbers and booleans.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Number(f64),
    Bool(bool),
}

impl Value {
    fn number(self, context: &Expr) -> Result<f64, ModelError> {
        match self {
            Value::Number(n) => Ok(n),
            Value::Bool(_) => Err(kind_error(context, "a numeric")),
        }
    }

    fn boolean(self, context: &Expr) -> Result<bool, ModelError> {
        match self {
            Value::Bool(b) => Ok(b),
            Value::Number(_) => Err(kind_error(context, "a boolean")),
        }
    }
}

fn kind_error(expr: &Expr, expected: &str) -> ModelError {
    ModelError::ExpressionKind {
        site: "evaluated operand".to_string(),
        expected: expected.to_string(),
        expression: expr.to_string(),
    }
}

struct Evaluator<'a> {
    symbols: &'a SymbolValues,
    functions: &'a FunctionTable,
    rng: Option<&'a mut StdRng>,
}

impl Expr {
    /// Evaluate to a number. Builtins `pi` and `e` resolve automatically;
    /// time `t` must be present in `symbols`.
    pub fn evaluate(
        &self,
        symbols: &SymbolValues,
        functions: &FunctionTable,
    ) -> Result<f64, ModelError> {
        let mut evaluator = Evaluator {
            symbols,
            functions,
            rng: None,
        };
        evaluator.eval(self)?.number(self)
    }

    /// Evaluate a number, drawing from `rng` for `random.*` calls.
    pub fn evaluate_with_rng(
        &self,
        symbols: &SymbolValues,
        functions: &FunctionTable,
        rng: &mut StdRng,
    ) -> Result<f64, ModelError> {
        let mut evaluator = Evaluator {
            symbols,
            functions,
            rng: Some(rng),
        };
        evaluator.eval(self)?.number(self)
    }

    /// Evaluate a trigger condition.
    pub fn evaluate_condition(
        &self,
        symbols: &SymbolValues,
        functions: &FunctionTable,
    ) -> Result<bool, ModelError> {
        let mut evaluator = Evaluator {
            symbols,
            functions,
            rng: None,
        };
        evaluator.eval(self)?.boolean(self)
    }
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value, ModelError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Symbol(name) => self.lookup(name).map(Value::Number),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Neg => Ok(Value::Number(-value.number(operand)?)),
                    UnaryOp::Not => Ok(Value::Bool(!value.boolean(operand)?)),
                }
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Call { function, args } => self.call(function, args),
        }
    }

    fn lookup(&self, name: &str) -> Result<f64, ModelError> {
        if let Some(value) = self.symbols.get(name) {
            return Ok(*value);
        }
        match name {
            "pi" => Ok(std::f64::consts::PI),
            "e" => Ok(std::f64::consts::E),
            _ => Err(ModelError::UnresolvedSymbol {
                symbol: name.to_string(),
                site: "evaluation".to_string(),
            }),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, ModelError> {
        // Logical operators short-circuit.
        match op {
            BinaryOp::And => {
                let result = self.eval(lhs)?.boolean(lhs)? && self.eval(rhs)?.boolean(rhs)?;
                return Ok(Value::Bool(result));
            }
            BinaryOp::Or => {
                let result = self.eval(lhs)?.boolean(lhs)? || self.eval(rhs)?.boolean(rhs)?;
                return Ok(Value::Bool(result));
            }
            _ => {}
        }
        let a = self.eval(lhs)?.number(lhs)?;
        let b = self.eval(rhs)?.number(rhs)?;
        Ok(numeric(op, a, b))
    }

    fn call(&mut self, function: &str, args: &[Expr]) -> Result<Value, ModelError> {
        let signature = self
            .functions
            .get(function)
            .ok_or_else(|| ModelError::UnknownFunction {
                function: function.to_string(),
            })?;
        if !signature.accepts(args.len()) {
            return Err(ModelError::ArityMismatch {
                function: function.to_string(),
                expected: signature.arity.unwrap_or(1),
                found: args.len(),
            });
        }
        let kind = signature.kind;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?.number(arg)?);
        }
        match kind {
            FunctionKind::Pure(f) => Ok(Value::Number(f(&values))),
            FunctionKind::Random(distribution) => match self.rng.as_deref_mut() {
                Some(rng) => Ok(Value::Number(distribution.sample(&values, rng))),
                None => Err(ModelError::UnseededRandom {
                    function: function.to_string(),
                }),
            },
        }
    }
}

fn numeric(op: BinaryOp, a: f64, b: f64) -> Value {
    match op {
        BinaryOp::Add => Value::Number(a + b),
        BinaryOp::Sub => Value::Number(a - b),
        BinaryOp::Mul => Value::Number(a * b),
        BinaryOp::Div => Value::Number(a / b),
        BinaryOp::Pow => Value::Number(a.powf(b)),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Le => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Ge => Value::Bool(a >= b),
        BinaryOp::And => Value::Bool(a != 0.0 && b != 0.0),
        BinaryOp::Or => Value::Bool(a != 0.0 || b != 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn values(pairs: &[(&str, f64)]) -> SymbolValues {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_evaluate() {
        let functions = FunctionTable::builtin();
        let expr = Expr::parse("(-V + I * R) / tau").unwrap();
        let v = expr
            .evaluate(
                &values(&[("V", 1.0), ("I", 2.0), ("R", 3.0), ("tau", 5.0)]),
                &functions,
            )
            .unwrap();
        assert_eq!(v, 1.0);

        let expr = Expr::parse("exp(0) + 2 ^ 3 + max(1, 4, 2)").unwrap();
        assert_eq!(expr.evaluate(&SymbolValues::new(), &functions).unwrap(), 13.0);
    }

    #[test]
    fn test_builtin_constants() {
        let functions = FunctionTable::builtin();
        let expr = Expr::parse("cos(pi) + t").unwrap();
        let v = expr.evaluate(&values(&[("t", 1.0)]), &functions).unwrap();
        assert!(v.abs() < 1e-12);
        assert!(matches!(
            expr.evaluate(&SymbolValues::new(), &functions),
            Err(ModelError::UnresolvedSymbol { symbol, .. }) if symbol == "t"
        ));
    }

    #[test]
    fn test_evaluate_errors() {
        let functions = FunctionTable::builtin();
        let missing = Expr::parse("a + b").unwrap();
        assert!(matches!(
            missing.evaluate(&values(&[("a", 1.0)]), &functions),
            Err(ModelError::UnresolvedSymbol { symbol, .. }) if symbol == "b"
        ));
        let unknown = Expr::parse("foo(1)").unwrap();
        assert!(matches!(
            unknown.evaluate(&SymbolValues::new(), &functions),
            Err(ModelError::UnknownFunction { .. })
        ));
        let arity = Expr::parse("sin(1, 2)").unwrap();
        assert!(matches!(
            arity.evaluate(&SymbolValues::new(), &functions),
            Err(ModelError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_condition() {
        let functions = FunctionTable::builtin();
        let trigger = Expr::parse("V > theta && !(t < t_ref)").unwrap();
        let env = values(&[("V", -50.0), ("theta", -55.0), ("t", 2.0), ("t_ref", 1.0)]);
        assert!(trigger.evaluate_condition(&env, &functions).unwrap());
        assert!(trigger.evaluate(&env, &functions).is_err());
    }

    #[test]
    fn test_random_needs_rng() {
        let functions = FunctionTable::builtin();
        let expr = Expr::parse("random.uniform(0, 1)").unwrap();
        assert!(matches!(
            expr.evaluate(&SymbolValues::new(), &functions),
            Err(ModelError::UnseededRandom { .. })
        ));
        let mut rng = StdRng::seed_from_u64(1);
        let x = expr
            .evaluate_with_rng(&SymbolValues::new(), &functions, &mut rng)
            .unwrap();
        assert!((0.0..1.0).contains(&x));
    }
}
