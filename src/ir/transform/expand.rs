//! Alias and port expansion.
//!
//! Expansion replaces alias references by their definitions so that every
//! right-hand side is written in terms of parameters, state variables,
//! constants, receive ports and builtins only.

use std::collections::HashMap;

use log::debug;

use crate::ir::analysis::validation::alias_evaluation_order;
use crate::ir::ast::{AnalogMode, Component};
use crate::ir::error::ModelError;
use crate::ir::expr::Expr;
use crate::ir::visitor::{MutVisitable, MutVisitor};

/// Replaces symbols by expressions in every right-hand side it visits.
///
/// With `simplify` set, expressions that had a replacement are also
/// stripped of identity terms.
#[derive(Debug, Clone, Default)]
pub struct SymbolReplacer {
    pub replacements: HashMap<String, Expr>,
    pub simplify: bool,
}

impl SymbolReplacer {
    pub fn new(replacements: HashMap<String, Expr>) -> Self {
        Self {
            replacements,
            simplify: false,
        }
    }

    pub fn simplifying(mut self) -> Self {
        self.simplify = true;
        self
    }
}

impl MutVisitor for SymbolReplacer {
    fn exit_expression(&mut self, node: &mut Expr) {
        if self.replacements.is_empty() {
            return;
        }
        let touched = node
            .free_symbols()
            .iter()
            .any(|s| self.replacements.contains_key(s));
        if !touched {
            return;
        }
        let replaced = node.replace_symbols(&self.replacements);
        *node = if self.simplify {
            replaced.simplify_identities()
        } else {
            replaced
        };
    }
}

/// Fully expanded definition of every alias, keyed by alias name.
pub fn alias_definitions(component: &Component) -> Result<HashMap<String, Expr>, ModelError> {
    let mut definitions: HashMap<String, Expr> = HashMap::new();
    for alias in alias_evaluation_order(component)? {
        let expanded = alias.rhs.replace_symbols(&definitions);
        definitions.insert(alias.name.clone(), expanded);
    }
    Ok(definitions)
}

/// Clone `component` with every alias reference replaced by its definition.
///
/// The alias declarations stay, with expanded right-hand sides, so send
/// ports that expose them still resolve.
pub fn expand_aliases(component: &Component) -> Result<Component, ModelError> {
    let definitions = alias_definitions(component)?;
    debug!(
        "expanding {} alias(es) of '{}'",
        definitions.len(),
        component.name
    );
    let mut out = component.clone();
    out.accept_mut(&mut SymbolReplacer::new(definitions));
    Ok(out)
}

/// Expression published by the analog send port `port`, with aliases
/// expanded.
pub fn expand_port_definition(component: &Component, port: &str) -> Result<Expr, ModelError> {
    let unknown = |reason: &str| ModelError::UnknownPort {
        port: port.to_string(),
        reason: reason.to_string(),
    };
    let declared = component
        .analog_port(port)
        .ok_or_else(|| unknown("no such analog port"))?;
    if declared.mode != AnalogMode::Send {
        return Err(unknown("not a send port"));
    }
    let definitions = alias_definitions(component)?;
    Ok(definitions
        .get(port)
        .cloned()
        .unwrap_or_else(|| Expr::symbol(port)))
}
