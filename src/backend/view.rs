//! A read-only view of a flat component, shaped for code generators and
//! simulators.

use std::fmt;
use std::sync::Arc;

use ordermap::OrderMap;
use serde::Serialize;

use crate::ir::ast::{
    AnalogPort, Component, EventPort, OutputEvent, Regime, StateAssignment, TimeDerivative,
};
use crate::ir::error::ModelError;
use crate::ir::expr::Expr;
use crate::ir::units::Dimension;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Parameter,
    StateVariable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    pub dimension: Arc<Dimension>,
}

/// What makes a transition fire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "on", rename_all = "snake_case")]
pub enum Trigger {
    Condition(Expr),
    Event(String),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Condition(expr) => write!(f, "when {}", expr),
            Trigger::Event(port) => write!(f, "on {}", port),
        }
    }
}

/// A transition with its target resolved: staying put names the source
/// regime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub trigger: Trigger,
    pub target: String,
    pub state_assignments: Vec<StateAssignment>,
    pub output_events: Vec<String>,
}

pub struct FlatView<'a> {
    component: &'a Component,
    layout: OrderMap<String, usize>,
}

impl<'a> FlatView<'a> {
    /// Fails with `NotFlat` when `component` still has subnodes.
    pub fn new(component: &'a Component) -> Result<Self, ModelError> {
        if !component.is_flat() {
            return Err(ModelError::NotFlat {
                component: component.name.clone(),
            });
        }
        let layout = component
            .state_variables
            .iter()
            .enumerate()
            .map(|(i, sv)| (sv.name.clone(), i))
            .collect();
        Ok(Self { component, layout })
    }

    pub fn component(&self) -> &'a Component {
        self.component
    }

    pub fn name(&self) -> &str {
        &self.component.name
    }

    /// Parameters, then state variables, in declaration order.
    pub fn declarations(&self) -> Vec<Declaration> {
        let parameters = self.component.parameters.iter().map(|p| Declaration {
            name: p.name.clone(),
            kind: DeclarationKind::Parameter,
            dimension: p.dimension.clone(),
        });
        let states = self.component.state_variables.iter().map(|s| Declaration {
            name: s.name.clone(),
            kind: DeclarationKind::StateVariable,
            dimension: s.dimension.clone(),
        });
        parameters.chain(states).collect()
    }

    /// Index of every state variable in a state vector.
    pub fn state_layout(&self) -> &OrderMap<String, usize> {
        &self.layout
    }

    pub fn regime(&self, name: &str) -> Result<&'a Regime, ModelError> {
        self.component
            .regime(name)
            .ok_or_else(|| ModelError::UnknownRegime {
                regime: name.to_string(),
                site: format!("view of '{}'", self.component.name),
            })
    }

    pub fn regime_names(&self) -> impl Iterator<Item = &'a str> {
        self.component.regimes.iter().map(|r| r.name.as_str())
    }

    /// One derivative per state variable, in layout order. State variables
    /// the regime leaves alone get `0`.
    pub fn time_derivatives(&self, regime: &str) -> Result<Vec<TimeDerivative>, ModelError> {
        let regime = self.regime(regime)?;
        Ok(self
            .layout
            .keys()
            .map(|variable| match regime.time_derivative(variable) {
                Some(td) => td.clone(),
                None => TimeDerivative::new(variable, Expr::number(0.0)),
            })
            .collect())
    }

    /// On-conditions, then on-events, in declaration order.
    pub fn transitions(&self, regime: &str) -> Result<Vec<Transition>, ModelError> {
        let regime = self.regime(regime)?;
        let target = |t: &Option<String>| t.clone().unwrap_or_else(|| regime.name.clone());
        let outputs = |events: &[OutputEvent]| -> Vec<String> {
            events.iter().map(|e| e.port.clone()).collect()
        };
        let conditions = regime.on_conditions.iter().map(|oc| Transition {
            trigger: Trigger::Condition(oc.trigger.clone()),
            target: target(&oc.target_regime),
            state_assignments: oc.state_assignments.clone(),
            output_events: outputs(&oc.output_events),
        });
        let events = regime.on_events.iter().map(|oe| Transition {
            trigger: Trigger::Event(oe.source_port.clone()),
            target: target(&oe.target_regime),
            state_assignments: oe.state_assignments.clone(),
            output_events: outputs(&oe.output_events),
        });
        Ok(conditions.chain(events).collect())
    }

    pub fn analog_ports(&self) -> &'a [AnalogPort] {
        &self.component.analog_ports
    }

    pub fn event_ports(&self) -> &'a [EventPort] {
        &self.component.event_ports
    }
}
