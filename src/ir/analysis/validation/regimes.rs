//! Regime graph and transition checks.

use std::collections::{HashMap, HashSet};

use super::CheckResult;
use crate::ir::ast::{Component, EventMode, OutputEvent, StateAssignment};
use crate::ir::error::ModelError;

/// Every transition target names a regime of the same component.
pub fn check_regime_graph(component: &Component) -> CheckResult {
    let mut result = CheckResult::new();
    let names: HashSet<&str> = component.regimes.iter().map(|r| r.name.as_str()).collect();

    for regime in &component.regimes {
        for target in regime.targets() {
            if !names.contains(target) {
                result.add_error(ModelError::UnknownRegime {
                    regime: target.to_string(),
                    site: format!("a transition of regime '{}'", regime.name),
                });
            }
        }
    }
    result
}

/// OnEvent sources are receive event ports; output events go to send ports.
pub fn check_event_port_references(component: &Component) -> CheckResult {
    let mut result = CheckResult::new();
    let modes: HashMap<&str, EventMode> = component
        .event_ports
        .iter()
        .map(|p| (p.name.as_str(), p.mode))
        .collect();

    let check_outputs = |outputs: &[OutputEvent], regime: &str, result: &mut CheckResult| {
        for out in outputs {
            match modes.get(out.port.as_str()) {
                Some(EventMode::Send) => {}
                Some(EventMode::Receive) => result.add_error(ModelError::UnknownPort {
                    port: out.port.clone(),
                    reason: format!(
                        "output event in regime '{}' targets a receive port",
                        regime
                    ),
                }),
                None => result.add_error(ModelError::UnknownPort {
                    port: out.port.clone(),
                    reason: format!("output event in regime '{}' has no such port", regime),
                }),
            }
        }
    };

    for regime in &component.regimes {
        for oc in &regime.on_conditions {
            check_outputs(&oc.output_events, &regime.name, &mut result);
        }
        for oe in &regime.on_events {
            match modes.get(oe.source_port.as_str()) {
                Some(EventMode::Receive) => {}
                Some(EventMode::Send) => result.add_error(ModelError::UnknownPort {
                    port: oe.source_port.clone(),
                    reason: format!("handler in regime '{}' listens on a send port", regime.name),
                }),
                None => result.add_error(ModelError::UnknownPort {
                    port: oe.source_port.clone(),
                    reason: format!("handler in regime '{}' has no such port", regime.name),
                }),
            }
            check_outputs(&oe.output_events, &regime.name, &mut result);
        }
    }
    result
}

/// At most one OnEvent per source port within a regime.
pub fn check_one_handler_per_event(component: &Component) -> CheckResult {
    let mut result = CheckResult::new();
    for regime in &component.regimes {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut reported: HashSet<&str> = HashSet::new();
        for oe in &regime.on_events {
            let port = oe.source_port.as_str();
            if !seen.insert(port) && reported.insert(port) {
                result.add_error(ModelError::DuplicateEventHandler {
                    regime: regime.name.clone(),
                    port: port.to_string(),
                });
            }
        }
    }
    result
}

/// Assignments and time derivatives only target declared state variables,
/// and each state variable has at most one time derivative per regime.
pub fn check_state_assignment_targets(component: &Component) -> CheckResult {
    let mut result = CheckResult::new();
    let states = component.state_variable_names();

    let check_assignments =
        |assignments: &[StateAssignment], regime: &str, result: &mut CheckResult| {
            for sa in assignments {
                if !states.contains(sa.variable.as_str()) {
                    result.add_error(ModelError::InvalidAssignmentTarget {
                        variable: sa.variable.clone(),
                        site: format!("state assignment in regime '{}'", regime),
                    });
                }
            }
        };

    for regime in &component.regimes {
        let mut derived: HashSet<&str> = HashSet::new();
        for td in &regime.time_derivatives {
            if !states.contains(td.variable.as_str()) {
                result.add_error(ModelError::InvalidAssignmentTarget {
                    variable: td.variable.clone(),
                    site: format!("time derivative in regime '{}'", regime.name),
                });
            }
            if !derived.insert(td.variable.as_str()) {
                result.add_error(ModelError::DuplicateTimeDerivative {
                    regime: regime.name.clone(),
                    variable: td.variable.clone(),
                });
            }
        }
        for oc in &regime.on_conditions {
            check_assignments(&oc.state_assignments, &regime.name, &mut result);
        }
        for oe in &regime.on_events {
            check_assignments(&oe.state_assignments, &regime.name, &mut result);
        }
    }
    result
}
