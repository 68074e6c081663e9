//! Port connection legality.
//!
//! A connection runs from a send port to a receive or reduce port of the
//! same kind (analog or event). Analog endpoints must have the same
//! physical dimension. A receive port accepts at most one incoming
//! connection, counted over every level of the hierarchy; a reduce port
//! accepts any number.

use std::collections::HashMap;

use super::CheckResult;
use crate::ir::ast::{AnalogMode, AnalogPort, Component, EventMode, EventPort, PortConnection};
use crate::ir::error::ModelError;
use crate::ir::namespace::NamespaceAddress;

/// A port found by resolving a namespace address.
#[derive(Debug, Clone, Copy)]
pub enum PortRef<'a> {
    Analog(&'a AnalogPort),
    Event(&'a EventPort),
}

impl PortRef<'_> {
    pub fn is_send(&self) -> bool {
        match self {
            PortRef::Analog(p) => p.mode == AnalogMode::Send,
            PortRef::Event(p) => p.mode == EventMode::Send,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PortRef::Analog(p) => format!("analog {} port", p.mode),
            PortRef::Event(p) => format!("event {} port", p.mode),
        }
    }
}

/// Find the port `address` points at, relative to `component`.
pub fn resolve_port<'a>(
    component: &'a Component,
    address: &NamespaceAddress,
) -> Result<PortRef<'a>, ModelError> {
    let unknown = |reason: String| ModelError::UnknownPort {
        port: address.to_string(),
        reason,
    };
    let owner = component
        .descendant(&address.segments)
        .ok_or_else(|| unknown("no such subnode".to_string()))?;
    let name = address
        .symbol
        .as_deref()
        .ok_or_else(|| unknown("address names no port".to_string()))?;
    if let Some(port) = owner.analog_port(name) {
        return Ok(PortRef::Analog(port));
    }
    if let Some(port) = owner.event_port(name) {
        return Ok(PortRef::Event(port));
    }
    Err(unknown(format!("'{}' declares no such port", owner.name)))
}

fn illegal(connection: &PortConnection, reason: &str) -> ModelError {
    ModelError::IllegalPortConnection {
        from: connection.from.to_string(),
        to: connection.to.to_string(),
        reason: reason.to_string(),
    }
}

/// Incoming connection counts per port, for connections declared strictly
/// below `component`, keyed by address relative to `component`.
fn nested_fan_in(component: &Component) -> HashMap<NamespaceAddress, usize> {
    let mut counts = HashMap::new();
    fn walk(node: &Component, path: &[String], counts: &mut HashMap<NamespaceAddress, usize>) {
        for (name, child) in &node.subnodes {
            let mut child_path = path.to_vec();
            child_path.push(name.clone());
            for connection in &child.port_connections {
                let mut target = connection.to.clone();
                for segment in child_path.iter().rev() {
                    target = target.prefix(segment);
                }
                *counts.entry(target).or_insert(0) += 1;
            }
            walk(child, &child_path, counts);
        }
    }
    walk(component, &[], &mut counts);
    counts
}

/// Check every connection declared by `component`.
pub fn check_port_connections(component: &Component) -> CheckResult {
    let mut result = CheckResult::new();
    if component.port_connections.is_empty() {
        return result;
    }
    let mut fan_in = nested_fan_in(component);

    for connection in &component.port_connections {
        let from = match resolve_port(component, &connection.from) {
            Ok(port) => port,
            Err(e) => {
                result.add_error(e);
                continue;
            }
        };
        let to = match resolve_port(component, &connection.to) {
            Ok(port) => port,
            Err(e) => {
                result.add_error(e);
                continue;
            }
        };

        if !from.is_send() {
            result.add_error(illegal(
                connection,
                &format!("source is a {}, not a send port", from.describe()),
            ));
            continue;
        }
        if to.is_send() {
            result.add_error(illegal(connection, "destination is a send port"));
            continue;
        }

        match (from, to) {
            (PortRef::Analog(src), PortRef::Analog(dst)) => {
                if !src.dimension.is_compatible(&dst.dimension) {
                    result.add_error(illegal(
                        connection,
                        &format!(
                            "dimension mismatch ({} vs {})",
                            src.dimension, dst.dimension
                        ),
                    ));
                }
                let count = fan_in.entry(connection.to.clone()).or_insert(0);
                *count += 1;
                if dst.mode == AnalogMode::Receive && *count > 1 {
                    result.add_error(illegal(
                        connection,
                        "receive port already has an incoming connection",
                    ));
                }
            }
            (PortRef::Event(_), PortRef::Event(_)) => {
                let count = fan_in.entry(connection.to.clone()).or_insert(0);
                *count += 1;
                if *count > 1 {
                    result.add_error(illegal(
                        connection,
                        "receive port already has an incoming connection",
                    ));
                }
            }
            _ => result.add_error(illegal(
                connection,
                "cannot connect an analog port to an event port",
            )),
        }
    }
    result
}
