//! Port connection resolution for one level of the hierarchy.
//!
//! Connections are resolved against the unflattened component (to learn
//! port kinds and modes) and rendered in flat names, which is how the
//! already flattened and prefixed children refer to them.

use std::collections::{HashMap, HashSet};

use log::debug;
use ordermap::OrderMap;

use crate::ir::analysis::validation::{resolve_port, PortRef};
use crate::ir::ast::{AnalogMode, Component, EventMode, PortConnection, ReduceOp};
use crate::ir::error::ModelError;
use crate::ir::expr::Expr;

/// How an incoming analog port is driven at this level.
#[derive(Debug, Clone)]
enum Inbound {
    Receive(Expr),
    Reduce(ReduceOp, Vec<Expr>),
}

/// Event routes between constituents of one level.
#[derive(Debug, Clone, Default)]
pub(super) struct EventRouting {
    /// Send port to the receive ports it is connected to, in connection order.
    pub routes: HashMap<String, Vec<String>>,
    /// Receive port to the index of the constituent that handles it.
    pub owners: HashMap<String, usize>,
}

impl EventRouting {
    pub fn receivers(&self, port: &str) -> &[String] {
        self.routes.get(port).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record which constituent owns each receive event port.
    pub fn assign_owners(&mut self, constituents: &[&Component]) {
        for (index, constituent) in constituents.iter().enumerate() {
            for port in &constituent.event_ports {
                if port.mode == EventMode::Receive {
                    self.owners.insert(port.name.clone(), index);
                }
            }
        }
    }
}

/// Everything the connections of one component imply for its flat form.
#[derive(Debug, Clone, Default)]
pub(super) struct Wiring {
    inbound: OrderMap<String, Inbound>,
    pub events: EventRouting,
    /// Receive ports (analog and event) driven at this level.
    pub consumed: HashSet<String>,
}

impl Wiring {
    pub fn resolve(component: &Component, separator: &str) -> Result<Wiring, ModelError> {
        let mut wiring = Wiring::default();
        for connection in &component.port_connections {
            let from = resolve_port(component, &connection.from)?;
            let to = resolve_port(component, &connection.to)?;
            let source = connection.from.to_flat_symbol(separator);
            let target = connection.to.to_flat_symbol(separator);

            match (from, to) {
                (PortRef::Analog(_), PortRef::Analog(port)) => match port.mode {
                    AnalogMode::Receive => {
                        wiring
                            .inbound
                            .insert(target.clone(), Inbound::Receive(Expr::symbol(&source)));
                        wiring.consumed.insert(target);
                    }
                    AnalogMode::Reduce(op) => {
                        let entry = wiring
                            .inbound
                            .entry(target)
                            .or_insert_with(|| Inbound::Reduce(op, Vec::new()));
                        if let Inbound::Reduce(_, senders) = entry {
                            senders.push(Expr::symbol(&source));
                        }
                    }
                    AnalogMode::Send => {}
                },
                (PortRef::Event(_), PortRef::Event(_)) => {
                    wiring
                        .events
                        .routes
                        .entry(source)
                        .or_default()
                        .push(target.clone());
                    wiring.consumed.insert(target);
                }
                _ => {}
            }
        }
        debug!(
            "'{}': {} connection(s), {} consumed receive port(s)",
            component.name,
            component.port_connections.len(),
            wiring.consumed.len()
        );
        Ok(wiring)
    }

    /// Substitutions for the analog ports driven at this level.
    ///
    /// A reduce port keeps a reference to itself (`R -> S1 + ... + R`) so it
    /// can still be driven from above, unless it is in `sealed`.
    pub fn analog_replacements(&self, sealed: &HashSet<String>) -> HashMap<String, Expr> {
        self.inbound
            .iter()
            .map(|(port, inbound)| {
                let value = match inbound {
                    Inbound::Receive(source) => source.clone(),
                    Inbound::Reduce(op, senders) => {
                        let mut terms = senders.clone();
                        if !sealed.contains(port) {
                            terms.push(Expr::symbol(port));
                        }
                        Expr::fold(op.binary_op(), terms)
                            .unwrap_or_else(|| Expr::number(op.identity()))
                    }
                };
                (port.clone(), value)
            })
            .collect()
    }
}

/// The subnode that holds both endpoints of `connection` below its own
/// interface, with the connection rewritten relative to that subnode.
fn shared_subnode(connection: &PortConnection) -> Option<(String, PortConnection)> {
    let (from_head, from) = connection.from.split_first()?;
    let (to_head, to) = connection.to.split_first()?;
    if from_head != to_head || (from.segments.is_empty() && to.segments.is_empty()) {
        return None;
    }
    Some((from_head.to_string(), PortConnection { from, to }))
}

/// Move every connection whose endpoints both lie inside one subnode down
/// into that subnode, at every level.
///
/// A connection is then resolved at the level where its endpoints belong
/// to different constituents, so event handlers it drives can be chained
/// and regime coordinates stay separate.
pub(super) fn localize_connections(component: &mut Component) {
    let connections = std::mem::take(&mut component.port_connections);
    for connection in connections {
        let target = shared_subnode(&connection).and_then(|(name, local)| {
            component
                .subnodes
                .get_mut(&name)
                .map(|child| (child, local))
        });
        match target {
            Some((child, local)) => {
                debug!(
                    "moving connection {} into subnode '{}' as {}",
                    connection, child.name, local
                );
                child.port_connections.push(local);
            }
            None => component.port_connections.push(connection),
        }
    }
    for child in component.subnodes.values_mut() {
        localize_connections(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::{AnalogPort, EventPort};

    fn cell() -> Component {
        let mut c = Component::new("cell");
        c.analog_ports.push(AnalogPort::send("V"));
        c.analog_ports.push(AnalogPort::receive("I_in"));
        c.analog_ports.push(AnalogPort::reduce("I_syn", ReduceOp::Add));
        c.event_ports.push(EventPort::send("spike"));
        c.event_ports.push(EventPort::receive("kick"));
        c
    }

    #[test]
    fn test_resolve_wiring() {
        let mut net = Component::new("net");
        net.insert_subnode("a", &cell());
        net.insert_subnode("b", &cell());
        net.connect("a.V", "b.I_in");
        net.connect("a.V", "b.I_syn");
        net.connect("b.V", "b.I_syn");
        net.connect("a.spike", "b.kick");

        let wiring = Wiring::resolve(&net, "_").unwrap();
        let consumed: HashSet<&str> = wiring.consumed.iter().map(String::as_str).collect();
        assert_eq!(consumed, HashSet::from(["b_I_in", "b_kick"]));
        assert_eq!(wiring.events.receivers("a_spike"), ["b_kick".to_string()]);
        assert!(wiring.events.receivers("b_spike").is_empty());

        let open = wiring.analog_replacements(&HashSet::new());
        assert_eq!(open["b_I_in"], Expr::parse("a_V").unwrap());
        assert_eq!(open["b_I_syn"], Expr::parse("a_V + b_V + b_I_syn").unwrap());

        let sealed = wiring.analog_replacements(&HashSet::from(["b_I_syn".to_string()]));
        assert_eq!(sealed["b_I_syn"], Expr::parse("a_V + b_V").unwrap());
    }

    #[test]
    fn test_localize_connections() {
        let mut pair = Component::new("pair");
        pair.insert_subnode("a", &cell());
        pair.insert_subnode("b", &cell());
        let mut net = Component::new("net");
        net.insert_subnode("p", &pair);
        net.insert_subnode("q", &cell());
        net.connect("p.a.spike", "p.b.kick");
        net.connect("q.V", "p.a.I_in");
        net.connect("p.V", "p.I_syn");

        localize_connections(&mut net);
        let rendered = |c: &Component| -> Vec<String> {
            c.port_connections.iter().map(|pc| pc.to_string()).collect()
        };
        assert_eq!(rendered(&net), vec!["q.V -> p.a.I_in", "p.V -> p.I_syn"]);
        assert_eq!(rendered(&net.subnodes["p"]), vec!["a.spike -> b.kick"]);
    }
}
