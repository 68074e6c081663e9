//! The component object model.
//!
//! A [`Component`] describes a piecewise-continuous dynamical system:
//! declarations (parameters, state variables, aliases, constants, ports),
//! a set of [`Regime`]s holding time derivatives and transitions, and
//! optionally named subnodes wired together through port connections.
//!
//! Everything is plain owned data. Inserting a subnode clones it, so two
//! parents never share a child.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use ordermap::OrderMap;
use serde::{Deserialize, Serialize};

use crate::ir::expr::Expr;
use crate::ir::namespace::NamespaceAddress;
use crate::ir::units::{Dimension, Unit};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub dimension: Arc<Dimension>,
}

impl Parameter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dimension: Arc::default(),
        }
    }

    pub fn with_dimension(name: &str, dimension: Arc<Dimension>) -> Self {
        Self {
            name: name.to_string(),
            dimension,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVariable {
    pub name: String,
    #[serde(default)]
    pub dimension: Arc<Dimension>,
}

impl StateVariable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dimension: Arc::default(),
        }
    }

    pub fn with_dimension(name: &str, dimension: Arc<Dimension>) -> Self {
        Self {
            name: name.to_string(),
            dimension,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub units: Arc<Unit>,
}

impl Constant {
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            units: Arc::default(),
        }
    }
}

/// A named algebraic definition `lhs := rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub rhs: Expr,
}

impl Alias {
    pub fn new(name: &str, rhs: Expr) -> Self {
        Self {
            name: name.to_string(),
            rhs,
        }
    }
}

/// Associative operator a reduce port folds its senders with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReduceOp {
    #[default]
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "*")]
    Mul,
}

impl ReduceOp {
    pub fn identity(&self) -> f64 {
        match self {
            ReduceOp::Add => 0.0,
            ReduceOp::Mul => 1.0,
        }
    }

    pub fn binary_op(&self) -> crate::ir::expr::BinaryOp {
        match self {
            ReduceOp::Add => crate::ir::expr::BinaryOp::Add,
            ReduceOp::Mul => crate::ir::expr::BinaryOp::Mul,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalogMode {
    Send,
    Receive,
    Reduce(ReduceOp),
}

impl AnalogMode {
    pub fn is_send(&self) -> bool {
        matches!(self, AnalogMode::Send)
    }

    /// Receive and reduce ports are read as free symbols.
    pub fn is_incoming(&self) -> bool {
        !self.is_send()
    }
}

impl fmt::Display for AnalogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalogMode::Send => write!(f, "send"),
            AnalogMode::Receive => write!(f, "receive"),
            AnalogMode::Reduce(ReduceOp::Add) => write!(f, "reduce(+)"),
            AnalogMode::Reduce(ReduceOp::Mul) => write!(f, "reduce(*)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogPort {
    pub name: String,
    #[serde(default)]
    pub dimension: Arc<Dimension>,
    pub mode: AnalogMode,
}

impl AnalogPort {
    pub fn send(name: &str) -> Self {
        Self::new(name, AnalogMode::Send)
    }

    pub fn receive(name: &str) -> Self {
        Self::new(name, AnalogMode::Receive)
    }

    pub fn reduce(name: &str, op: ReduceOp) -> Self {
        Self::new(name, AnalogMode::Reduce(op))
    }

    pub fn new(name: &str, mode: AnalogMode) -> Self {
        Self {
            name: name.to_string(),
            dimension: Arc::default(),
            mode,
        }
    }

    pub fn with_dimension(mut self, dimension: Arc<Dimension>) -> Self {
        self.dimension = dimension;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventMode {
    Send,
    Receive,
}

impl fmt::Display for EventMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventMode::Send => write!(f, "send"),
            EventMode::Receive => write!(f, "receive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPort {
    pub name: String,
    pub mode: EventMode,
}

impl EventPort {
    pub fn send(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: EventMode::Send,
        }
    }

    pub fn receive(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: EventMode::Receive,
        }
    }
}

/// `d(variable)/dt = rhs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDerivative {
    pub variable: String,
    pub rhs: Expr,
}

impl TimeDerivative {
    pub fn new(variable: &str, rhs: Expr) -> Self {
        Self {
            variable: variable.to_string(),
            rhs,
        }
    }
}

/// `variable := rhs` at the instant of a transition. All right-hand sides
/// of one transition see the pre-transition state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateAssignment {
    pub variable: String,
    pub rhs: Expr,
}

impl StateAssignment {
    pub fn new(variable: &str, rhs: Expr) -> Self {
        Self {
            variable: variable.to_string(),
            rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputEvent {
    pub port: String,
}

impl OutputEvent {
    pub fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
        }
    }
}

/// Transition fired when `trigger` becomes true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnCondition {
    pub trigger: Expr,
    /// `None` stays in the current regime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_regime: Option<String>,
    #[serde(default)]
    pub state_assignments: Vec<StateAssignment>,
    #[serde(default)]
    pub output_events: Vec<OutputEvent>,
}

impl OnCondition {
    pub fn new(trigger: Expr) -> Self {
        Self {
            trigger,
            target_regime: None,
            state_assignments: Vec::new(),
            output_events: Vec::new(),
        }
    }

    pub fn to_regime(mut self, regime: &str) -> Self {
        self.target_regime = Some(regime.to_string());
        self
    }

    pub fn assign(mut self, variable: &str, rhs: Expr) -> Self {
        self.state_assignments
            .push(StateAssignment::new(variable, rhs));
        self
    }

    pub fn emit(mut self, port: &str) -> Self {
        self.output_events.push(OutputEvent::new(port));
        self
    }
}

/// Transition fired when an event arrives on `source_port`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnEvent {
    pub source_port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_regime: Option<String>,
    #[serde(default)]
    pub state_assignments: Vec<StateAssignment>,
    #[serde(default)]
    pub output_events: Vec<OutputEvent>,
}

impl OnEvent {
    pub fn new(source_port: &str) -> Self {
        Self {
            source_port: source_port.to_string(),
            target_regime: None,
            state_assignments: Vec::new(),
            output_events: Vec::new(),
        }
    }

    pub fn to_regime(mut self, regime: &str) -> Self {
        self.target_regime = Some(regime.to_string());
        self
    }

    pub fn assign(mut self, variable: &str, rhs: Expr) -> Self {
        self.state_assignments
            .push(StateAssignment::new(variable, rhs));
        self
    }

    pub fn emit(mut self, port: &str) -> Self {
        self.output_events.push(OutputEvent::new(port));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Regime {
    pub name: String,
    #[serde(default)]
    pub time_derivatives: Vec<TimeDerivative>,
    #[serde(default)]
    pub on_conditions: Vec<OnCondition>,
    #[serde(default)]
    pub on_events: Vec<OnEvent>,
}

impl Regime {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_time_derivative(mut self, variable: &str, rhs: Expr) -> Self {
        self.time_derivatives
            .push(TimeDerivative::new(variable, rhs));
        self
    }

    pub fn with_on_condition(mut self, transition: OnCondition) -> Self {
        self.on_conditions.push(transition);
        self
    }

    pub fn with_on_event(mut self, transition: OnEvent) -> Self {
        self.on_events.push(transition);
        self
    }

    pub fn time_derivative(&self, variable: &str) -> Option<&TimeDerivative> {
        self.time_derivatives
            .iter()
            .find(|td| td.variable == variable)
    }

    pub fn on_event(&self, port: &str) -> Option<&OnEvent> {
        self.on_events.iter().find(|oe| oe.source_port == port)
    }

    /// Names of regimes this regime can transition to (explicit targets only).
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.on_conditions
            .iter()
            .filter_map(|oc| oc.target_regime.as_deref())
            .chain(
                self.on_events
                    .iter()
                    .filter_map(|oe| oe.target_regime.as_deref()),
            )
    }
}

/// Directed connection from a send port to a receive or reduce port.
/// Paths are relative to the component that owns the connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortConnection {
    pub from: NamespaceAddress,
    pub to: NamespaceAddress,
}

impl PortConnection {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: NamespaceAddress::parse(from),
            to: NamespaceAddress::parse(to),
        }
    }
}

impl fmt::Display for PortConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// A component class: a possibly hierarchical hybrid dynamical system.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub state_variables: Vec<StateVariable>,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(default)]
    pub analog_ports: Vec<AnalogPort>,
    #[serde(default)]
    pub event_ports: Vec<EventPort>,
    #[serde(default)]
    pub regimes: Vec<Regime>,
    #[serde(default)]
    pub subnodes: OrderMap<String, Component>,
    #[serde(default)]
    pub port_connections: Vec<PortConnection>,
}

impl Component {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Insert a copy of `child` under `name`, replacing any previous subnode.
    pub fn insert_subnode(&mut self, name: &str, child: &Component) {
        self.subnodes.insert(name.to_string(), child.clone());
    }

    pub fn connect(&mut self, from: &str, to: &str) {
        self.port_connections.push(PortConnection::new(from, to));
    }

    pub fn is_flat(&self) -> bool {
        self.subnodes.is_empty()
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn state_variable(&self, name: &str) -> Option<&StateVariable> {
        self.state_variables.iter().find(|s| s.name == name)
    }

    pub fn alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.iter().find(|a| a.name == name)
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.constants.iter().find(|c| c.name == name)
    }

    pub fn analog_port(&self, name: &str) -> Option<&AnalogPort> {
        self.analog_ports.iter().find(|p| p.name == name)
    }

    pub fn event_port(&self, name: &str) -> Option<&EventPort> {
        self.event_ports.iter().find(|p| p.name == name)
    }

    pub fn regime(&self, name: &str) -> Option<&Regime> {
        self.regimes.iter().find(|r| r.name == name)
    }

    pub fn state_variable_names(&self) -> HashSet<&str> {
        self.state_variables
            .iter()
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Follow a path of subnode names.
    pub fn descendant(&self, path: &[String]) -> Option<&Component> {
        let mut node = self;
        for segment in path {
            node = node.subnodes.get(segment)?;
        }
        Some(node)
    }

    /// Every expression of the component with a description of where it
    /// lives, in declaration order.
    pub fn expressions(&self) -> Vec<(ExprSite, &Expr)> {
        let mut out = Vec::new();
        for alias in &self.aliases {
            out.push((ExprSite::Alias(alias.name.clone()), &alias.rhs));
        }
        for regime in &self.regimes {
            for td in &regime.time_derivatives {
                out.push((
                    ExprSite::TimeDerivative {
                        regime: regime.name.clone(),
                        variable: td.variable.clone(),
                    },
                    &td.rhs,
                ));
            }
            for oc in &regime.on_conditions {
                out.push((
                    ExprSite::Trigger {
                        regime: regime.name.clone(),
                    },
                    &oc.trigger,
                ));
                for sa in &oc.state_assignments {
                    out.push((
                        ExprSite::StateAssignment {
                            regime: regime.name.clone(),
                            variable: sa.variable.clone(),
                        },
                        &sa.rhs,
                    ));
                }
            }
            for oe in &regime.on_events {
                for sa in &oe.state_assignments {
                    out.push((
                        ExprSite::StateAssignment {
                            regime: regime.name.clone(),
                            variable: sa.variable.clone(),
                        },
                        &sa.rhs,
                    ));
                }
            }
        }
        out
    }

    /// Number of nodes in the subnode tree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self
            .subnodes
            .values()
            .map(Component::node_count)
            .sum::<usize>()
    }
}

/// Where an expression lives inside a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprSite {
    Alias(String),
    TimeDerivative { regime: String, variable: String },
    Trigger { regime: String },
    StateAssignment { regime: String, variable: String },
}

impl ExprSite {
    /// Whether the expression at this site must be boolean.
    pub fn expects_condition(&self) -> bool {
        matches!(self, ExprSite::Trigger { .. })
    }
}

impl fmt::Display for ExprSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprSite::Alias(name) => write!(f, "alias '{}'", name),
            ExprSite::TimeDerivative { regime, variable } => {
                write!(f, "time derivative of '{}' in regime '{}'", variable, regime)
            }
            ExprSite::Trigger { regime } => write!(f, "trigger in regime '{}'", regime),
            ExprSite::StateAssignment { regime, variable } => {
                write!(f, "assignment to '{}' in regime '{}'", variable, regime)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(s: &str) -> Expr {
        Expr::parse(s).unwrap()
    }

    #[test]
    fn test_subnode_insertion_clones() {
        let mut child = Component::new("cell");
        child.aliases.push(Alias::new("I", expr("g * V")));
        let mut parent = Component::new("net");
        parent.insert_subnode("c1", &child);
        child.aliases.clear();
        assert_eq!(parent.subnodes["c1"].aliases.len(), 1);
    }

    #[test]
    fn test_expressions_lists_every_site() {
        let mut component = Component::new("iaf");
        component.aliases.push(Alias::new("I", expr("g * V")));
        component.regimes.push(
            Regime::new("sub")
                .with_time_derivative("V", expr("-V / tau + I"))
                .with_on_condition(
                    OnCondition::new(expr("V > theta"))
                        .assign("V", expr("V_reset"))
                        .emit("spike"),
                ),
        );
        let sites: Vec<String> = component
            .expressions()
            .into_iter()
            .map(|(site, _)| site.to_string())
            .collect();
        assert_eq!(
            sites,
            vec![
                "alias 'I'",
                "time derivative of 'V' in regime 'sub'",
                "trigger in regime 'sub'",
                "assignment to 'V' in regime 'sub'",
            ]
        );
    }

    #[test]
    fn test_json_round_trip() {
        let mut component = Component::new("iaf");
        component
            .analog_ports
            .push(AnalogPort::reduce("I_syn", ReduceOp::Add));
        component.regimes.push(
            Regime::new("sub").with_on_event(OnEvent::new("spikein").to_regime("sub")),
        );
        let json = serde_json::to_string(&component).unwrap();
        let back: Component = serde_json::from_str(&json).unwrap();
        assert_eq!(back, component);
    }
}
