//! This module defines the `Visitor` and `MutVisitor` traits for walking the
//! component object model.
//!
//! - `Visitor` is used for read-only traversal (symbol collection, analysis).
//! - `MutVisitor` is used for transformations (renaming, substitution).
//!
//! Both provide `enter_*`/`exit_*` hooks with empty default bodies. Traversal
//! of a [`Component`] covers its own declarations and regimes only; subnodes
//! are visited by whoever needs them, since most passes track the namespace
//! address while recursing.

use crate::ir::ast::{
    Alias, Component, OnCondition, OnEvent, OutputEvent, Regime, StateAssignment, TimeDerivative,
};
use crate::ir::expr::Expr;

pub trait Visitor {
    fn enter_component(&mut self, _node: &Component) {}
    fn exit_component(&mut self, _node: &Component) {}

    fn enter_alias(&mut self, _node: &Alias) {}
    fn exit_alias(&mut self, _node: &Alias) {}

    fn enter_regime(&mut self, _node: &Regime) {}
    fn exit_regime(&mut self, _node: &Regime) {}

    fn enter_time_derivative(&mut self, _node: &TimeDerivative) {}
    fn exit_time_derivative(&mut self, _node: &TimeDerivative) {}

    fn enter_on_condition(&mut self, _node: &OnCondition) {}
    fn exit_on_condition(&mut self, _node: &OnCondition) {}

    fn enter_on_event(&mut self, _node: &OnEvent) {}
    fn exit_on_event(&mut self, _node: &OnEvent) {}

    fn enter_state_assignment(&mut self, _node: &StateAssignment) {}
    fn exit_state_assignment(&mut self, _node: &StateAssignment) {}

    fn enter_output_event(&mut self, _node: &OutputEvent) {}

    fn enter_expression(&mut self, _node: &Expr) {}
}

/// Trait for model nodes that can accept an immutable visitor.
pub trait Visitable {
    fn accept<V: Visitor>(&self, visitor: &mut V);
}

pub trait MutVisitor {
    fn enter_component(&mut self, _node: &mut Component) {}
    fn exit_component(&mut self, _node: &mut Component) {}

    fn exit_alias(&mut self, _node: &mut Alias) {}

    fn enter_regime(&mut self, _node: &mut Regime) {}
    fn exit_regime(&mut self, _node: &mut Regime) {}

    fn exit_time_derivative(&mut self, _node: &mut TimeDerivative) {}

    fn exit_on_condition(&mut self, _node: &mut OnCondition) {}
    fn exit_on_event(&mut self, _node: &mut OnEvent) {}

    fn exit_state_assignment(&mut self, _node: &mut StateAssignment) {}

    fn exit_output_event(&mut self, _node: &mut OutputEvent) {}

    /// Expressions are immutable trees; replace the node to transform it.
    fn exit_expression(&mut self, _node: &mut Expr) {}
}

/// Trait for model nodes that can accept a mutable visitor.
pub trait MutVisitable {
    fn accept_mut<V: MutVisitor>(&mut self, visitor: &mut V);
}

impl Visitable for Component {
    fn accept<V: Visitor>(&self, visitor: &mut V) {
        visitor.enter_component(self);
        for alias in &self.aliases {
            alias.accept(visitor);
        }
        for regime in &self.regimes {
            regime.accept(visitor);
        }
        visitor.exit_component(self);
    }
}

impl Visitable for Alias {
    fn accept<V: Visitor>(&self, visitor: &mut V) {
        visitor.enter_alias(self);
        visitor.enter_expression(&self.rhs);
        visitor.exit_alias(self);
    }
}

impl Visitable for Regime {
    fn accept<V: Visitor>(&self, visitor: &mut V) {
        visitor.enter_regime(self);
        for td in &self.time_derivatives {
            visitor.enter_time_derivative(td);
            visitor.enter_expression(&td.rhs);
            visitor.exit_time_derivative(td);
        }
        for oc in &self.on_conditions {
            oc.accept(visitor);
        }
        for oe in &self.on_events {
            oe.accept(visitor);
        }
        visitor.exit_regime(self);
    }
}

impl Visitable for OnCondition {
    fn accept<V: Visitor>(&self, visitor: &mut V) {
        visitor.enter_on_condition(self);
        visitor.enter_expression(&self.trigger);
        visit_effects(&self.state_assignments, &self.output_events, visitor);
        visitor.exit_on_condition(self);
    }
}

impl Visitable for OnEvent {
    fn accept<V: Visitor>(&self, visitor: &mut V) {
        visitor.enter_on_event(self);
        visit_effects(&self.state_assignments, &self.output_events, visitor);
        visitor.exit_on_event(self);
    }
}

fn visit_effects<V: Visitor>(
    assignments: &[StateAssignment],
    outputs: &[OutputEvent],
    visitor: &mut V,
) {
    for sa in assignments {
        visitor.enter_state_assignment(sa);
        visitor.enter_expression(&sa.rhs);
        visitor.exit_state_assignment(sa);
    }
    for out in outputs {
        visitor.enter_output_event(out);
    }
}

impl MutVisitable for Component {
    fn accept_mut<V: MutVisitor>(&mut self, visitor: &mut V) {
        visitor.enter_component(self);
        for alias in &mut self.aliases {
            visitor.exit_expression(&mut alias.rhs);
            visitor.exit_alias(alias);
        }
        for regime in &mut self.regimes {
            regime.accept_mut(visitor);
        }
        visitor.exit_component(self);
    }
}

impl MutVisitable for Regime {
    fn accept_mut<V: MutVisitor>(&mut self, visitor: &mut V) {
        visitor.enter_regime(self);
        for td in &mut self.time_derivatives {
            visitor.exit_expression(&mut td.rhs);
            visitor.exit_time_derivative(td);
        }
        for oc in &mut self.on_conditions {
            visitor.exit_expression(&mut oc.trigger);
            visit_effects_mut(&mut oc.state_assignments, &mut oc.output_events, visitor);
            visitor.exit_on_condition(oc);
        }
        for oe in &mut self.on_events {
            visit_effects_mut(&mut oe.state_assignments, &mut oe.output_events, visitor);
            visitor.exit_on_event(oe);
        }
        visitor.exit_regime(self);
    }
}

fn visit_effects_mut<V: MutVisitor>(
    assignments: &mut [StateAssignment],
    outputs: &mut [OutputEvent],
    visitor: &mut V,
) {
    for sa in assignments {
        visitor.exit_expression(&mut sa.rhs);
        visitor.exit_state_assignment(sa);
    }
    for out in outputs {
        visitor.exit_output_event(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[derive(Default)]
    struct SymbolCollector {
        symbols: BTreeSet<String>,
        regimes: usize,
    }

    impl Visitor for SymbolCollector {
        fn enter_regime(&mut self, _node: &Regime) {
            self.regimes += 1;
        }

        fn enter_expression(&mut self, node: &Expr) {
            self.symbols.extend(node.free_symbols());
        }
    }

    struct Doubler;

    impl MutVisitor for Doubler {
        fn exit_expression(&mut self, node: &mut Expr) {
            *node = Expr::binary(crate::ir::expr::BinaryOp::Mul, Expr::Number(2.0), node.clone());
        }
    }

    fn component() -> Component {
        let mut c = Component::new("c");
        c.aliases
            .push(Alias::new("I", Expr::parse("g * (E - V)").unwrap()));
        c.regimes.push(
            Regime::new("r")
                .with_time_derivative("V", Expr::parse("I / C").unwrap())
                .with_on_condition(
                    OnCondition::new(Expr::parse("V > theta").unwrap())
                        .assign("V", Expr::parse("V_reset").unwrap()),
                ),
        );
        c
    }

    #[test]
    fn test_visitor_sees_every_expression() {
        let mut collector = SymbolCollector::default();
        component().accept(&mut collector);
        assert_eq!(collector.regimes, 1);
        let symbols: Vec<&str> = collector.symbols.iter().map(String::as_str).collect();
        assert_eq!(symbols, vec!["C", "E", "I", "V", "V_reset", "g", "theta"]);
    }

    #[test]
    fn test_mut_visitor_rewrites_expressions() {
        let mut c = component();
        c.accept_mut(&mut Doubler);
        assert_eq!(c.aliases[0].rhs.to_string(), "2 * (g * (E - V))");
        assert_eq!(
            c.regimes[0].time_derivatives[0].rhs.to_string(),
            "2 * (I / C)"
        );
    }
}
