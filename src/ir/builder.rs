//! Component construction with interface inference.
//!
//! [`ComponentBuilder`] collects declarations and regimes, infers the
//! parameters and state variables that were not given explicitly, checks
//! explicitly given ones against the inferred sets and finally runs the
//! validation pipeline. All problems are reported together.
//!
//! ```
//! use ninemlc::ir::ast::Regime;
//! use ninemlc::ir::builder::ComponentBuilder;
//! use ninemlc::ir::expr::Expr;
//!
//! let expr = |s: &str| Expr::parse(s).unwrap();
//! let leak = ComponentBuilder::new("Leak")
//!     .regime(Regime::new("r").with_time_derivative("V", expr("-V / tau")))
//!     .build()
//!     .unwrap();
//! assert_eq!(leak.parameters[0].name, "tau");
//! assert_eq!(leak.state_variables[0].name, "V");
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use ordermap::OrderMap;

use crate::compiler::CompileContext;
use crate::ir::analysis::validation::validate;
use crate::ir::ast::{
    Alias, AnalogPort, Component, Constant, EventPort, Parameter, PortConnection, Regime,
    StateAssignment, StateVariable, TimeDerivative,
};
use crate::ir::error::ModelError;
use crate::ir::expr::{is_builtin_symbol, Expr};
use crate::ir::units::Dimension;
use crate::ir::visitor::{Visitable, Visitor};

/// Collects every free symbol and every assigned state variable name.
#[derive(Default)]
struct InterfaceCollector {
    free: BTreeSet<String>,
    assigned: Vec<String>,
}

impl InterfaceCollector {
    fn assign(&mut self, name: &str) {
        if !self.assigned.iter().any(|n| n == name) {
            self.assigned.push(name.to_string());
        }
    }
}

impl Visitor for InterfaceCollector {
    fn enter_time_derivative(&mut self, node: &TimeDerivative) {
        self.assign(&node.variable);
    }

    fn enter_state_assignment(&mut self, node: &StateAssignment) {
        self.assign(&node.variable);
    }

    fn enter_expression(&mut self, node: &Expr) {
        self.free.extend(node.free_symbols());
    }
}

/// State variables implied by the regimes: every time-derivative variable
/// and every assignment target, in order of first appearance.
pub fn infer_state_variables(component: &Component) -> Vec<String> {
    let mut collector = InterfaceCollector::default();
    component.accept(&mut collector);
    collector.assigned
}

/// Parameters implied by the expressions: free symbols that are not state
/// variables, aliases, receive/reduce ports, constants or builtins.
pub fn infer_parameters(component: &Component) -> BTreeSet<String> {
    let mut collector = InterfaceCollector::default();
    component.accept(&mut collector);

    let mut bound: HashSet<&str> = HashSet::new();
    bound.extend(component.state_variables.iter().map(|s| s.name.as_str()));
    bound.extend(collector.assigned.iter().map(String::as_str));
    bound.extend(component.aliases.iter().map(|a| a.name.as_str()));
    bound.extend(component.constants.iter().map(|c| c.name.as_str()));
    bound.extend(
        component
            .analog_ports
            .iter()
            .filter(|p| p.mode.is_incoming())
            .map(|p| p.name.as_str()),
    );

    collector
        .free
        .iter()
        .filter(|s| !bound.contains(s.as_str()) && !is_builtin_symbol(s))
        .cloned()
        .collect()
}

fn set_difference(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Vec<String> {
    a.difference(b).cloned().collect()
}

#[derive(Debug, Clone, Default)]
pub struct ComponentBuilder {
    name: String,
    parameters: Option<Vec<Parameter>>,
    state_variables: Option<Vec<StateVariable>>,
    aliases: Vec<Alias>,
    constants: Vec<Constant>,
    analog_ports: Vec<AnalogPort>,
    event_ports: Vec<EventPort>,
    regimes: Vec<Regime>,
    subnodes: OrderMap<String, Component>,
    port_connections: Vec<PortConnection>,
    dimensions: HashMap<String, Arc<Dimension>>,
    errors: Vec<ModelError>,
}

impl ComponentBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Declare the parameters explicitly. They must match the inferred set.
    pub fn parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.parameters = Some(
            names
                .into_iter()
                .map(|n| Parameter::new(n.as_ref()))
                .collect(),
        );
        self
    }

    /// Declare the state variables explicitly. They must match the inferred set.
    pub fn state_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.state_variables = Some(
            names
                .into_iter()
                .map(|n| StateVariable::new(n.as_ref()))
                .collect(),
        );
        self
    }

    /// Dimension given to the parameter or state variable `name`.
    pub fn dimension(mut self, name: &str, dimension: Arc<Dimension>) -> Self {
        self.dimensions.insert(name.to_string(), dimension);
        self
    }

    /// Add an alias from expression text; parse errors are reported by `build`.
    pub fn alias(mut self, name: &str, rhs: &str) -> Self {
        match Expr::parse(rhs) {
            Ok(rhs) => self.aliases.push(Alias::new(name, rhs)),
            Err(e) => self.errors.push(e),
        }
        self
    }

    pub fn alias_expr(mut self, name: &str, rhs: Expr) -> Self {
        self.aliases.push(Alias::new(name, rhs));
        self
    }

    pub fn constant(mut self, constant: Constant) -> Self {
        self.constants.push(constant);
        self
    }

    pub fn analog_port(mut self, port: AnalogPort) -> Self {
        self.analog_ports.push(port);
        self
    }

    pub fn event_port(mut self, port: EventPort) -> Self {
        self.event_ports.push(port);
        self
    }

    pub fn regime(mut self, regime: Regime) -> Self {
        self.regimes.push(regime);
        self
    }

    /// Insert a copy of `child` under `name`.
    pub fn subnode(mut self, name: &str, child: &Component) -> Self {
        self.subnodes.insert(name.to_string(), child.clone());
        self
    }

    /// Connect two ports given as dotted paths relative to this component.
    pub fn connect(mut self, from: &str, to: &str) -> Self {
        self.port_connections.push(PortConnection::new(from, to));
        self
    }

    /// Infer, check and validate with the default context.
    pub fn build(self) -> Result<Component, ModelError> {
        self.build_with(&CompileContext::default())
    }

    pub fn build_with(self, ctx: &CompileContext) -> Result<Component, ModelError> {
        let ComponentBuilder {
            name,
            parameters,
            state_variables,
            aliases,
            constants,
            analog_ports,
            event_ports,
            regimes,
            subnodes,
            port_connections,
            dimensions,
            mut errors,
        } = self;

        let mut component = Component {
            name,
            parameters: Vec::new(),
            state_variables: Vec::new(),
            aliases,
            constants,
            analog_ports,
            event_ports,
            regimes,
            subnodes,
            port_connections,
        };
        let dimension_of = |name: &str| dimensions.get(name).cloned().unwrap_or_default();

        let inferred_states = infer_state_variables(&component);
        component.state_variables = match state_variables {
            Some(explicit) => {
                let declared: BTreeSet<String> =
                    explicit.iter().map(|s| s.name.clone()).collect();
                let inferred: BTreeSet<String> = inferred_states.iter().cloned().collect();
                if declared != inferred {
                    errors.push(ModelError::StateVariableMismatch {
                        missing: set_difference(&inferred, &declared),
                        unexpected: set_difference(&declared, &inferred),
                    });
                }
                explicit
                    .into_iter()
                    .map(|s| StateVariable::with_dimension(&s.name, dimension_of(&s.name)))
                    .collect()
            }
            None => inferred_states
                .iter()
                .map(|n| StateVariable::with_dimension(n, dimension_of(n)))
                .collect(),
        };

        let inferred_params = infer_parameters(&component);
        component.parameters = match parameters {
            Some(explicit) => {
                let declared: BTreeSet<String> =
                    explicit.iter().map(|p| p.name.clone()).collect();
                if declared != inferred_params {
                    errors.push(ModelError::ParameterMismatch {
                        missing: set_difference(&inferred_params, &declared),
                        unexpected: set_difference(&declared, &inferred_params),
                    });
                }
                explicit
                    .into_iter()
                    .map(|p| Parameter::with_dimension(&p.name, dimension_of(&p.name)))
                    .collect()
            }
            None => inferred_params
                .iter()
                .map(|n| Parameter::with_dimension(n, dimension_of(n)))
                .collect(),
        };
        debug!(
            "built component '{}': {} parameter(s), {} state variable(s)",
            component.name,
            component.parameters.len(),
            component.state_variables.len()
        );

        let report = validate(&component, ctx);
        for violation in report.violations {
            errors.push(violation.error.in_subnode(violation.address));
        }

        match ModelError::from_batch(errors) {
            None => Ok(component),
            Some(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::{EventPort, OnCondition, OnEvent, ReduceOp};
    use crate::ir::error::ErrorKind;

    fn expr(s: &str) -> Expr {
        Expr::parse(s).unwrap()
    }

    fn iaf() -> ComponentBuilder {
        ComponentBuilder::new("IaF")
            .alias("I_leak", "g * (E - V)")
            .analog_port(AnalogPort::reduce("I_syn", ReduceOp::Add))
            .analog_port(AnalogPort::send("V"))
            .event_port(EventPort::send("spikeout"))
            .regime(
                Regime::new("sub")
                    .with_time_derivative("V", expr("(I_leak + I_syn) / C"))
                    .with_on_condition(
                        OnCondition::new(expr("V > theta"))
                            .assign("V", expr("V_reset"))
                            .emit("spikeout"),
                    ),
            )
    }

    #[test]
    fn test_infers_parameters_and_state_variables() {
        let c = iaf().build().unwrap();
        let params: Vec<&str> = c.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(params, vec!["C", "E", "V_reset", "g", "theta"]);
        let states: Vec<&str> = c.state_variables.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(states, vec!["V"]);
    }

    #[test]
    fn test_explicit_parameters_must_match() {
        let err = iaf()
            .parameters(["C", "E", "g", "theta", "tau"])
            .build()
            .unwrap_err();
        let mismatch = err
            .leaves()
            .into_iter()
            .find(|e| e.kind() == ErrorKind::ParameterMismatch)
            .cloned();
        match mismatch {
            Some(ModelError::ParameterMismatch {
                missing,
                unexpected,
            }) => {
                assert_eq!(missing, vec!["V_reset"]);
                assert_eq!(unexpected, vec!["tau"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
        // V_reset is not declared, so it also fails to resolve.
        assert!(err.contains(ErrorKind::UnresolvedSymbol));
    }

    #[test]
    fn test_explicit_state_variables_must_match() {
        let err = iaf().state_variables(["V", "U"]).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateVariableMismatch);
    }

    #[test]
    fn test_unresolved_symbol_reported_with_mismatch() {
        let err = ComponentBuilder::new("c")
            .parameters(["G"])
            .alias("H", "G + I")
            .build()
            .unwrap_err();
        assert!(err.contains(ErrorKind::ParameterMismatch));
        let unresolved: Vec<String> = err
            .leaves()
            .into_iter()
            .filter_map(|e| match e {
                ModelError::UnresolvedSymbol { symbol, .. } => Some(symbol.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(unresolved, vec!["I"]);
    }

    #[test]
    fn test_recursive_alias_rejected() {
        let err = ComponentBuilder::new("c")
            .alias("A", "B + 1")
            .alias("B", "A + 1")
            .build()
            .unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::RecursiveAlias]);
    }

    #[test]
    fn test_duplicate_handler_rejected() {
        let err = ComponentBuilder::new("c")
            .event_port(EventPort::receive("spikein"))
            .regime(
                Regime::new("r")
                    .with_on_event(OnEvent::new("spikein").assign("x", expr("x + 1")))
                    .with_on_event(OnEvent::new("spikein").assign("x", expr("0"))),
            )
            .build()
            .unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::DuplicateEventHandler]);
    }

    #[test]
    fn test_parse_errors_are_batched() {
        let err = ComponentBuilder::new("c")
            .alias("A", "1 +")
            .alias("B", "A +")
            .build()
            .unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::Parse, ErrorKind::Parse]);
    }

    #[test]
    fn test_dimension_hints() {
        let time = Arc::new(Dimension::new("time", [0, 0, 1, 0, 0, 0, 0]));
        let c = ComponentBuilder::new("decay")
            .regime(Regime::new("r").with_time_derivative("x", expr("-x / tau")))
            .dimension("tau", Arc::clone(&time))
            .build()
            .unwrap();
        assert_eq!(c.parameter("tau").unwrap().dimension, time);
        assert!(c.state_variable("x").unwrap().dimension.is_dimensionless());
    }
}
