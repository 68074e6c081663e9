//! Renaming of component-local names.
//!
//! [`ScopeRenamer`] rewrites every reference to a local name: symbols in
//! expressions, time-derivative and assignment targets, output event ports
//! and handler source ports. Regime names are rewritten separately through
//! an optional regime map so that transitions follow their targets.
//!
//! [`prefix_component`] is the namespace step of flattening: it moves a
//! flat child component into the scope of its parent by prefixing every
//! local name with `<subnode><separator>` and re-tokenising regime names.

use std::collections::HashMap;

use crate::ir::ast::{
    Alias, Component, OnCondition, OnEvent, OutputEvent, Regime, StateAssignment, TimeDerivative,
};
use crate::ir::expr::Expr;
use crate::ir::visitor::{MutVisitable, MutVisitor};

/// Joins the tokens of a combined regime name.
pub const REGIME_TOKEN_JOINER: char = '|';

/// Separates the subnode path of a regime token from the regime name.
pub const REGIME_PATH_SEPARATOR: char = ':';

#[derive(Debug, Clone, Default)]
pub struct ScopeRenamer {
    /// Local name to new name. Names not present are left alone.
    pub names: HashMap<String, String>,
    /// Regime name to new regime name.
    pub regimes: HashMap<String, String>,
}

impl ScopeRenamer {
    fn name(&self, name: &mut String) {
        if let Some(new) = self.names.get(name.as_str()) {
            *name = new.clone();
        }
    }

    fn regime(&self, name: &mut String) {
        if let Some(new) = self.regimes.get(name.as_str()) {
            *name = new.clone();
        }
    }
}

impl MutVisitor for ScopeRenamer {
    fn enter_regime(&mut self, node: &mut Regime) {
        self.regime(&mut node.name);
    }

    fn exit_alias(&mut self, node: &mut Alias) {
        self.name(&mut node.name);
    }

    fn exit_time_derivative(&mut self, node: &mut TimeDerivative) {
        self.name(&mut node.variable);
    }

    fn exit_on_condition(&mut self, node: &mut OnCondition) {
        if let Some(target) = node.target_regime.as_mut() {
            self.regime(target);
        }
    }

    fn exit_on_event(&mut self, node: &mut OnEvent) {
        self.name(&mut node.source_port);
        if let Some(target) = node.target_regime.as_mut() {
            self.regime(target);
        }
    }

    fn exit_state_assignment(&mut self, node: &mut StateAssignment) {
        self.name(&mut node.variable);
    }

    fn exit_output_event(&mut self, node: &mut OutputEvent) {
        self.name(&mut node.port);
    }

    fn exit_expression(&mut self, node: &mut Expr) {
        *node = node.substitute(&self.names);
    }
}

/// Clone `component`, renaming local names through `renames`.
///
/// Declarations, ports and every reference to them are renamed together,
/// as are connection endpoints that name a local port. Subnodes are left
/// untouched.
pub fn clone_with_renames(component: &Component, renames: &HashMap<String, String>) -> Component {
    let mut renamer = ScopeRenamer {
        names: renames.clone(),
        regimes: HashMap::new(),
    };
    let mut out = component.clone();
    rename_declarations(&mut out, &renamer);
    out.accept_mut(&mut renamer);
    for connection in &mut out.port_connections {
        for address in [&mut connection.from, &mut connection.to] {
            if address.segments.is_empty() {
                if let Some(symbol) = address.symbol.as_mut() {
                    renamer.name(symbol);
                }
            }
        }
    }
    out
}

fn rename_declarations(component: &mut Component, renamer: &ScopeRenamer) {
    for p in &mut component.parameters {
        renamer.name(&mut p.name);
    }
    for s in &mut component.state_variables {
        renamer.name(&mut s.name);
    }
    for c in &mut component.constants {
        renamer.name(&mut c.name);
    }
    for p in &mut component.analog_ports {
        renamer.name(&mut p.name);
    }
    for p in &mut component.event_ports {
        renamer.name(&mut p.name);
    }
}

/// Every name declared locally by `component`.
pub fn local_names(component: &Component) -> Vec<&str> {
    component
        .parameters
        .iter()
        .map(|p| p.name.as_str())
        .chain(component.state_variables.iter().map(|s| s.name.as_str()))
        .chain(component.aliases.iter().map(|a| a.name.as_str()))
        .chain(component.constants.iter().map(|c| c.name.as_str()))
        .chain(component.analog_ports.iter().map(|p| p.name.as_str()))
        .chain(component.event_ports.iter().map(|p| p.name.as_str()))
        .collect()
}

/// Move one regime token into the scope of `subnode`.
///
/// `r` becomes `subnode:r` and `x.y:r` becomes `subnode.x.y:r`.
pub fn prefix_regime_token(subnode: &str, token: &str) -> String {
    if token.contains(REGIME_PATH_SEPARATOR) {
        format!("{}.{}", subnode, token)
    } else {
        format!("{}{}{}", subnode, REGIME_PATH_SEPARATOR, token)
    }
}

/// Re-tokenise a (possibly combined) regime name for `subnode`.
pub fn prefix_regime_name(subnode: &str, name: &str) -> String {
    name.split(REGIME_TOKEN_JOINER)
        .map(|token| prefix_regime_token(subnode, token))
        .collect::<Vec<_>>()
        .join(REGIME_TOKEN_JOINER.to_string().as_str())
}

/// Prefix every local name and regime of a flat component with
/// `<subnode><separator>`, ready to be merged into its parent.
pub fn prefix_component(component: &Component, subnode: &str, separator: &str) -> Component {
    let names: HashMap<String, String> = local_names(component)
        .into_iter()
        .map(|name| (name.to_string(), format!("{}{}{}", subnode, separator, name)))
        .collect();
    let regimes: HashMap<String, String> = component
        .regimes
        .iter()
        .map(|r| (r.name.clone(), prefix_regime_name(subnode, &r.name)))
        .collect();

    let mut renamer = ScopeRenamer { names, regimes };
    let mut out = component.clone();
    rename_declarations(&mut out, &renamer);
    out.accept_mut(&mut renamer);
    out
}
