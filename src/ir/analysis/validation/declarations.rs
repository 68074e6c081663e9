//! Name uniqueness and namespace rules.

use std::collections::HashMap;

use super::CheckResult;
use crate::compiler::CompileContext;
use crate::ir::analysis::symbol_table::{SymbolKind, SymbolTable};
use crate::ir::ast::{AnalogMode, Component};
use crate::ir::error::ModelError;
use crate::ir::transform::rename::{REGIME_PATH_SEPARATOR, REGIME_TOKEN_JOINER};

fn duplicate(name: &str, first: &str, second: &str) -> ModelError {
    ModelError::DuplicateName {
        name: name.to_string(),
        first: first.to_string(),
        second: second.to_string(),
    }
}

/// Regime names are tokens joined by `|`; a token of a flattened child
/// reads `path:regime`. Flattening relies on every name mapping to a
/// distinct token set, so a component with subnodes may only use plain
/// names, and a flat component's tokens must be non-empty, unique and
/// sorted, the way flattening writes them.
fn check_regime_name(name: &str, flat: bool) -> Result<(), String> {
    if !flat {
        if name.is_empty() {
            return Err("regime names must not be empty".to_string());
        }
        if name.contains([REGIME_PATH_SEPARATOR, REGIME_TOKEN_JOINER]) {
            return Err(format!(
                "a component with subnodes may not use '{}' or '{}' in regime names",
                REGIME_PATH_SEPARATOR, REGIME_TOKEN_JOINER
            ));
        }
        return Ok(());
    }
    let tokens: Vec<&str> = name.split(REGIME_TOKEN_JOINER).collect();
    if tokens.iter().any(|token| token.is_empty()) {
        return Err("empty regime token".to_string());
    }
    if tokens.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err("combined regime tokens must be unique and sorted".to_string());
    }
    Ok(())
}

/// Check that declarations, ports, regimes and subnodes have distinct names.
///
/// A send port is not a declaration of its own: it exposes the alias or
/// state variable of the same name, so that pairing is not a clash.
///
/// Subnode names must not contain the namespace separator, and no local
/// name may start with `<subnode><separator>`. Together with local
/// uniqueness this keeps flattened names collision-free.
pub fn check_name_uniqueness(component: &Component, ctx: &CompileContext) -> CheckResult {
    let mut result = CheckResult::new();

    let table = SymbolTable::for_component(component);
    for (name, first, second) in table.duplicates() {
        result.add_error(duplicate(name, &first.to_string(), &second.to_string()));
    }

    let mut analog: HashMap<&str, AnalogMode> = HashMap::new();
    for port in &component.analog_ports {
        if analog.insert(port.name.as_str(), port.mode).is_some() {
            result.add_error(duplicate(&port.name, "analog port", "analog port"));
        }
    }

    let mut events: HashMap<&str, ()> = HashMap::new();
    for port in &component.event_ports {
        if events.insert(port.name.as_str(), ()).is_some() {
            result.add_error(duplicate(&port.name, "event port", "event port"));
            continue;
        }
        if analog.contains_key(port.name.as_str()) {
            result.add_error(duplicate(&port.name, "analog port", "event port"));
        } else if let Some(kind) = table.lookup(&port.name) {
            result.add_error(duplicate(&port.name, &kind.to_string(), "event port"));
        }
    }

    let mut regimes: HashMap<&str, ()> = HashMap::new();
    for regime in &component.regimes {
        if regimes.insert(regime.name.as_str(), ()).is_some() {
            result.add_error(duplicate(&regime.name, "regime", "regime"));
        }
        if let Err(reason) = check_regime_name(&regime.name, component.is_flat()) {
            result.add_error(ModelError::InvalidRegimeName {
                regime: regime.name.clone(),
                reason,
            });
        }
    }

    let separator = ctx.separator.as_str();
    let local_names: Vec<&str> = component
        .parameters
        .iter()
        .map(|p| p.name.as_str())
        .chain(component.state_variables.iter().map(|s| s.name.as_str()))
        .chain(component.aliases.iter().map(|a| a.name.as_str()))
        .chain(component.constants.iter().map(|c| c.name.as_str()))
        .chain(component.analog_ports.iter().map(|p| p.name.as_str()))
        .chain(component.event_ports.iter().map(|p| p.name.as_str()))
        .collect();

    for subnode in component.subnodes.keys() {
        if subnode.is_empty()
            || subnode.contains(separator)
            || subnode.contains(['.', REGIME_PATH_SEPARATOR, REGIME_TOKEN_JOINER])
        {
            result.add_error(ModelError::NamespaceConflict {
                name: subnode.clone(),
                subnode: subnode.clone(),
            });
            continue;
        }
        // Subnode names never become symbols, so shadowing a builtin is fine.
        let declared = table
            .lookup(subnode)
            .filter(|kind| *kind != SymbolKind::Builtin);
        if let Some(kind) = declared {
            result.add_error(duplicate(subnode, &kind.to_string(), "subnode"));
        } else if analog.contains_key(subnode.as_str()) || events.contains_key(subnode.as_str())
        {
            result.add_error(duplicate(subnode, "port", "subnode"));
        }
        let prefix = format!("{}{}", subnode, separator);
        let mut reported: Vec<&str> = Vec::new();
        for name in &local_names {
            if name.starts_with(&prefix) && !reported.contains(name) {
                reported.push(name);
                result.add_error(ModelError::NamespaceConflict {
                    name: name.to_string(),
                    subnode: subnode.clone(),
                });
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::{Alias, AnalogPort, EventPort, Parameter, Regime, StateVariable};
    use crate::ir::error::ErrorKind;
    use crate::ir::expr::Expr;

    fn kinds(result: &CheckResult) -> Vec<ErrorKind> {
        result.errors.iter().map(ModelError::kind).collect()
    }

    #[test]
    fn test_send_port_may_share_alias_name() {
        let mut c = Component::new("c");
        c.state_variables.push(StateVariable::new("V"));
        c.aliases.push(Alias::new("I", Expr::parse("V").unwrap()));
        c.analog_ports.push(AnalogPort::send("V"));
        c.analog_ports.push(AnalogPort::send("I"));
        assert!(check_name_uniqueness(&c, &CompileContext::default()).is_ok());
    }

    #[test]
    fn test_collisions() {
        let mut c = Component::new("c");
        c.parameters.push(Parameter::new("x"));
        c.state_variables.push(StateVariable::new("x"));
        c.parameters.push(Parameter::new("t"));
        c.event_ports.push(EventPort::send("x"));
        c.analog_ports.push(AnalogPort::receive("spike"));
        c.event_ports.push(EventPort::receive("spike"));
        c.regimes.push(Regime::new("r"));
        c.regimes.push(Regime::new("r"));
        let result = check_name_uniqueness(&c, &CompileContext::default());
        assert_eq!(
            kinds(&result),
            vec![ErrorKind::DuplicateName; 5],
            "{:?}",
            result.errors
        );
    }

    #[test]
    fn test_regime_names() {
        let mut leaf = Component::new("leaf");
        for name in ["r", "c1:r1|c2:r1|d:r1", "on|s:r1", "b|a", "a||b", "x:r|x:r"] {
            leaf.regimes.push(Regime::new(name));
        }
        let result = check_name_uniqueness(&leaf, &CompileContext::default());
        let rejected: Vec<&str> = result
            .errors
            .iter()
            .map(|e| match e {
                ModelError::InvalidRegimeName { regime, .. } => regime.as_str(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(rejected, vec!["b|a", "a||b", "x:r|x:r"]);

        let mut net = Component::new("net");
        net.regimes.push(Regime::new("c:r"));
        net.regimes.push(Regime::new("plain.name"));
        net.insert_subnode("c", &Component::new("cell"));
        net.insert_subnode("a|b", &Component::new("cell"));
        let result = check_name_uniqueness(&net, &CompileContext::default());
        assert_eq!(
            kinds(&result),
            vec![ErrorKind::InvalidRegimeName, ErrorKind::NamespaceConflict]
        );
    }

    #[test]
    fn test_subnode_may_shadow_builtin() {
        let mut net = Component::new("net");
        net.insert_subnode("e", &Component::new("cell"));
        net.insert_subnode("t", &Component::new("cell"));
        assert!(check_name_uniqueness(&net, &CompileContext::default()).is_ok());

        net.parameters.push(Parameter::new("g"));
        net.insert_subnode("g", &Component::new("cell"));
        let result = check_name_uniqueness(&net, &CompileContext::default());
        assert_eq!(kinds(&result), vec![ErrorKind::DuplicateName]);
    }

    #[test]
    fn test_namespace_rules() {
        let mut c = Component::new("net");
        c.parameters.push(Parameter::new("c1_g"));
        c.insert_subnode("c1", &Component::new("cell"));
        c.insert_subnode("bad_name", &Component::new("cell"));
        let result = check_name_uniqueness(&c, &CompileContext::default());
        assert_eq!(
            kinds(&result),
            vec![ErrorKind::NamespaceConflict, ErrorKind::NamespaceConflict]
        );
    }
}
