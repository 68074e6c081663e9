//! Validation pipeline.
//!
//! Validation is a fixed, ordered list of independent passes. Every pass
//! inspects one component without mutating it and returns a
//! [`CheckResult`]. All passes always run; their errors are collected into a
//! [`ValidationReport`] tagged with the pass and the namespace address of the
//! component they were found in. Subnodes are validated recursively.
//!
//! Passes:
//! 1. `NameUniqueness`
//! 2. `AliasAcyclicity`
//! 3. `SymbolResolution`
//! 4. `RegimeGraph`
//! 5. `EventPortReferences`
//! 6. `OneHandlerPerEvent`
//! 7. `PortConnectionLegality`
//! 8. `StateAssignmentTargets`
//! 9. `ExpressionKinds`

mod aliases;
mod connections;
mod declarations;
mod references;
mod regimes;

use std::fmt;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use crate::compiler::CompileContext;
use crate::ir::ast::Component;
use crate::ir::error::{ErrorKind, ModelError};
use crate::ir::namespace::NamespaceAddress;

pub use aliases::{alias_evaluation_order, check_alias_acyclicity};
pub use connections::{check_port_connections, resolve_port, PortRef};
pub use declarations::check_name_uniqueness;
pub use references::{check_expression_kinds, check_symbol_references};
pub use regimes::{
    check_event_port_references, check_one_handler_per_event, check_regime_graph,
    check_state_assignment_targets,
};

/// Errors found by one pass over one component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckResult {
    pub errors: Vec<ModelError>,
}

impl CheckResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ModelError) {
        self.errors.push(error);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: CheckResult) {
        self.errors.extend(other.errors);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValidationPass {
    NameUniqueness,
    AliasAcyclicity,
    SymbolResolution,
    RegimeGraph,
    EventPortReferences,
    OneHandlerPerEvent,
    PortConnectionLegality,
    StateAssignmentTargets,
    ExpressionKinds,
}

/// All passes, in the order they report.
pub const PASSES: [ValidationPass; 9] = [
    ValidationPass::NameUniqueness,
    ValidationPass::AliasAcyclicity,
    ValidationPass::SymbolResolution,
    ValidationPass::RegimeGraph,
    ValidationPass::EventPortReferences,
    ValidationPass::OneHandlerPerEvent,
    ValidationPass::PortConnectionLegality,
    ValidationPass::StateAssignmentTargets,
    ValidationPass::ExpressionKinds,
];

impl ValidationPass {
    pub fn run(&self, component: &Component, ctx: &CompileContext) -> CheckResult {
        match self {
            ValidationPass::NameUniqueness => check_name_uniqueness(component, ctx),
            ValidationPass::AliasAcyclicity => check_alias_acyclicity(component),
            ValidationPass::SymbolResolution => check_symbol_references(component, ctx),
            ValidationPass::RegimeGraph => check_regime_graph(component),
            ValidationPass::EventPortReferences => check_event_port_references(component),
            ValidationPass::OneHandlerPerEvent => check_one_handler_per_event(component),
            ValidationPass::PortConnectionLegality => check_port_connections(component),
            ValidationPass::StateAssignmentTargets => check_state_assignment_targets(component),
            ValidationPass::ExpressionKinds => check_expression_kinds(component),
        }
    }
}

impl fmt::Display for ValidationPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One error found by one pass in the component at `address`.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub pass: ValidationPass,
    pub address: NamespaceAddress,
    pub error: ModelError,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.is_root() {
            write!(f, "[{}] {}", self.pass, self.error)
        } else {
            write!(f, "[{}] in '{}': {}", self.pass, self.address, self.error)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn add(&mut self, pass: ValidationPass, address: &NamespaceAddress, result: CheckResult) {
        for error in result.errors {
            self.violations.push(Violation {
                pass,
                address: address.clone(),
                error,
            });
        }
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.violations.iter().map(|v| v.error.kind()).collect()
    }

    pub fn has(&self, kind: ErrorKind) -> bool {
        self.violations.iter().any(|v| v.error.kind() == kind)
    }

    /// Convert into a `ValidationFailed` error when anything was found.
    pub fn into_result(self, component: &str) -> Result<(), ModelError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(ModelError::ValidationFailed {
                component: component.to_string(),
                report: self,
            })
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}", violation)?;
        }
        Ok(())
    }
}

/// Run every pass over `component` and all of its subnodes.
pub fn validate(component: &Component, ctx: &CompileContext) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_node(component, ctx, &NamespaceAddress::root(), &mut report);
    report
}

fn validate_node(
    component: &Component,
    ctx: &CompileContext,
    address: &NamespaceAddress,
    report: &mut ValidationReport,
) {
    for (pass, result) in run_passes(component, ctx) {
        report.add(pass, address, result);
    }
    for (name, child) in &component.subnodes {
        validate_node(child, ctx, &address.child(name), report);
    }
}

fn run_passes(component: &Component, ctx: &CompileContext) -> Vec<(ValidationPass, CheckResult)> {
    #[cfg(not(target_arch = "wasm32"))]
    if ctx.parallel {
        return PASSES
            .par_iter()
            .map(|pass| (*pass, pass.run(component, ctx)))
            .collect();
    }
    PASSES
        .iter()
        .map(|pass| (*pass, pass.run(component, ctx)))
        .collect()
}
