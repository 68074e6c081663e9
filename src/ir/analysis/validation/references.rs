//! Reference checking for component expressions.
//!
//! Every free symbol of every right-hand side must resolve to a parameter,
//! state variable, alias, constant, receive or reduce port, or builtin.
//! Every called function must exist in the function table with a matching
//! number of arguments.

use std::collections::HashSet;

use super::CheckResult;
use crate::compiler::CompileContext;
use crate::ir::analysis::symbol_table::SymbolTable;
use crate::ir::ast::{AnalogMode, Component, ExprSite};
use crate::ir::error::ModelError;
use crate::ir::expr::Expr;

/// Check a component for undefined symbols and functions.
pub fn check_symbol_references(component: &Component, ctx: &CompileContext) -> CheckResult {
    let mut result = CheckResult::new();
    let table = SymbolTable::for_component(component);

    for (site, expr) in component.expressions() {
        check_expression(&site, expr, &table, ctx, &mut result);
    }

    // A send port publishes the value of an alias or state variable.
    let exposable: HashSet<&str> = component
        .aliases
        .iter()
        .map(|a| a.name.as_str())
        .chain(component.state_variables.iter().map(|s| s.name.as_str()))
        .collect();
    for port in &component.analog_ports {
        if port.mode == AnalogMode::Send && !exposable.contains(port.name.as_str()) {
            result.add_error(ModelError::UnresolvedSymbol {
                symbol: port.name.clone(),
                site: "send port (no alias or state variable of that name)".to_string(),
            });
        }
    }

    result
}

fn check_expression(
    site: &ExprSite,
    expr: &Expr,
    table: &SymbolTable,
    ctx: &CompileContext,
    result: &mut CheckResult,
) {
    for symbol in expr.free_symbols() {
        if !table.contains(&symbol) {
            result.add_error(ModelError::UnresolvedSymbol {
                symbol,
                site: site.to_string(),
            });
        }
    }

    let mut calls: Vec<(String, usize)> = Vec::new();
    expr.walk(&mut |node| {
        if let Expr::Call { function, args } = node {
            calls.push((function.clone(), args.len()));
        }
    });
    for (function, count) in calls {
        match ctx.functions.get(&function) {
            None => result.add_error(ModelError::UnknownFunction { function }),
            Some(signature) if !signature.accepts(count) => {
                result.add_error(ModelError::ArityMismatch {
                    expected: signature.arity.unwrap_or(1),
                    function,
                    found: count,
                })
            }
            Some(_) => {}
        }
    }
}

/// Triggers must be boolean; every other right-hand side must be numeric.
pub fn check_expression_kinds(component: &Component) -> CheckResult {
    let mut result = CheckResult::new();
    for (site, expr) in component.expressions() {
        let expects_condition = site.expects_condition();
        if expr.is_condition() != expects_condition {
            result.add_error(ModelError::ExpressionKind {
                site: site.to_string(),
                expected: if expects_condition { "a boolean" } else { "a numeric" }.to_string(),
                expression: expr.to_string(),
            });
        }
        for inner in expr.kind_errors() {
            result.add_error(ModelError::ExpressionKind {
                site: site.to_string(),
                expected: "a well-typed".to_string(),
                expression: inner,
            });
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::{Alias, AnalogPort, OnCondition, Parameter, Regime, StateVariable};
    use crate::ir::error::ErrorKind;

    fn expr(s: &str) -> Expr {
        Expr::parse(s).unwrap()
    }

    #[test]
    fn test_unresolved_symbol_is_named() {
        let mut c = Component::new("c");
        c.parameters.push(Parameter::new("G"));
        c.aliases.push(Alias::new("H", expr("G + I")));
        let result = check_symbol_references(&c, &CompileContext::default());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0] {
            ModelError::UnresolvedSymbol { symbol, site } => {
                assert_eq!(symbol, "I");
                assert_eq!(site, "alias 'H'");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_ports_builtins_and_functions_resolve() {
        let mut c = Component::new("c");
        c.state_variables.push(StateVariable::new("V"));
        c.parameters.push(Parameter::new("tau"));
        c.analog_ports.push(AnalogPort::receive("I_in"));
        c.analog_ports.push(AnalogPort::send("V"));
        c.regimes.push(
            Regime::new("r").with_time_derivative("V", expr("(-V + I_in) / tau + sin(2 * pi * t)")),
        );
        assert!(check_symbol_references(&c, &CompileContext::default()).is_ok());
    }

    #[test]
    fn test_functions_are_checked() {
        let mut c = Component::new("c");
        c.aliases.push(Alias::new("a", expr("foo(1) + atan2(1)")));
        c.analog_ports.push(AnalogPort::send("missing"));
        let kinds: Vec<ErrorKind> = check_symbol_references(&c, &CompileContext::default())
            .errors
            .iter()
            .map(ModelError::kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::UnknownFunction,
                ErrorKind::ArityMismatch,
                ErrorKind::UnresolvedSymbol
            ]
        );
    }

    #[test]
    fn test_expression_kinds() {
        let mut c = Component::new("c");
        c.aliases.push(Alias::new("flag", expr("V > 0")));
        c.regimes.push(
            Regime::new("r")
                .with_on_condition(OnCondition::new(expr("V + 1")))
                .with_on_condition(OnCondition::new(expr("V > theta"))),
        );
        let result = check_expression_kinds(&c);
        assert_eq!(result.errors.len(), 2);
    }
}
