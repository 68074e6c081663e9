//! Error types for the component model, validation and flattening.
//!
//! Every failure the library can report is a [`ModelError`]. Errors raised
//! while processing a subnode are wrapped in [`ModelError::InSubnode`] so the
//! caller learns the namespace address they originated from. Use
//! [`ModelError::kinds`] to inspect a possibly-wrapped error.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ir::analysis::validation::ValidationReport;
use crate::ir::namespace::NamespaceAddress;

/// Errors produced while building, validating or flattening components.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error(
        "declared parameters do not match the inferred ones (missing: {missing:?}, unexpected: {unexpected:?})"
    )]
    ParameterMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error(
        "declared state variables do not match the inferred ones (missing: {missing:?}, unexpected: {unexpected:?})"
    )]
    StateVariableMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("recursive alias definition: {}", cycle.join(" -> "))]
    RecursiveAlias { cycle: Vec<String> },

    #[error("unresolved symbol '{symbol}' in {site}")]
    UnresolvedSymbol { symbol: String, site: String },

    #[error("unknown function '{function}'")]
    UnknownFunction { function: String },

    #[error("function '{function}' expects {expected} argument(s), found {found}")]
    ArityMismatch {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("function '{function}' draws random numbers and needs a seeded generator")]
    UnseededRandom { function: String },

    #[error("unknown regime '{regime}' referenced from {site}")]
    UnknownRegime { regime: String, site: String },

    #[error("invalid regime name '{regime}': {reason}")]
    InvalidRegimeName { regime: String, reason: String },

    #[error("unknown port '{port}': {reason}")]
    UnknownPort { port: String, reason: String },

    #[error("regime '{regime}' has more than one handler for event port '{port}'")]
    DuplicateEventHandler { regime: String, port: String },

    #[error("illegal port connection {from} -> {to}: {reason}")]
    IllegalPortConnection {
        from: String,
        to: String,
        reason: String,
    },

    #[error("'{variable}' is not a state variable ({site})")]
    InvalidAssignmentTarget { variable: String, site: String },

    #[error("regime '{regime}' defines more than one time derivative for '{variable}'")]
    DuplicateTimeDerivative { regime: String, variable: String },

    #[error("name '{name}' is declared as both {first} and {second}")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },

    #[error("name '{name}' conflicts with the namespace of subnode '{subnode}'")]
    NamespaceConflict { name: String, subnode: String },

    #[error("{site} must be {expected} expression: {expression}")]
    ExpressionKind {
        site: String,
        expected: String,
        expression: String,
    },

    #[error("flattening would produce {count} regimes, more than the limit of {limit}")]
    RegimeExplosion { count: u128, limit: usize },

    #[error("flattened component '{component}' failed re-validation:\n{report}")]
    InternalFlatteningInvariantViolation {
        component: String,
        report: ValidationReport,
    },

    #[error("component '{component}' is invalid:\n{report}")]
    ValidationFailed {
        component: String,
        report: ValidationReport,
    },

    #[error("state vector of '{component}' has {found} entries, expected {expected}")]
    StateLengthMismatch {
        component: String,
        expected: usize,
        found: usize,
    },

    #[error("component '{component}' still has subnodes; flatten it first")]
    NotFlat { component: String },

    #[error("parse error at offset {offset} in '{input}': {message}")]
    Parse {
        input: String,
        offset: usize,
        message: String,
    },

    #[error("in subnode '{address}': {source}")]
    InSubnode {
        address: NamespaceAddress,
        #[source]
        source: Box<ModelError>,
    },

    #[error("{}", display_all(.0))]
    Multiple(Vec<ModelError>),
}

fn display_all(errors: &[ModelError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fieldless discriminant of [`ModelError`], convenient for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    ParameterMismatch,
    StateVariableMismatch,
    RecursiveAlias,
    UnresolvedSymbol,
    UnknownFunction,
    ArityMismatch,
    UnseededRandom,
    UnknownRegime,
    InvalidRegimeName,
    UnknownPort,
    DuplicateEventHandler,
    IllegalPortConnection,
    InvalidAssignmentTarget,
    DuplicateTimeDerivative,
    DuplicateName,
    NamespaceConflict,
    ExpressionKind,
    RegimeExplosion,
    InternalFlatteningInvariantViolation,
    ValidationFailed,
    StateLengthMismatch,
    NotFlat,
    Parse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ModelError {
    /// Kind of this error. Wrappers report the kind of what they wrap;
    /// `Multiple` reports the kind of its first member.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::ParameterMismatch { .. } => ErrorKind::ParameterMismatch,
            ModelError::StateVariableMismatch { .. } => ErrorKind::StateVariableMismatch,
            ModelError::RecursiveAlias { .. } => ErrorKind::RecursiveAlias,
            ModelError::UnresolvedSymbol { .. } => ErrorKind::UnresolvedSymbol,
            ModelError::UnknownFunction { .. } => ErrorKind::UnknownFunction,
            ModelError::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            ModelError::UnseededRandom { .. } => ErrorKind::UnseededRandom,
            ModelError::UnknownRegime { .. } => ErrorKind::UnknownRegime,
            ModelError::InvalidRegimeName { .. } => ErrorKind::InvalidRegimeName,
            ModelError::UnknownPort { .. } => ErrorKind::UnknownPort,
            ModelError::DuplicateEventHandler { .. } => ErrorKind::DuplicateEventHandler,
            ModelError::IllegalPortConnection { .. } => ErrorKind::IllegalPortConnection,
            ModelError::InvalidAssignmentTarget { .. } => ErrorKind::InvalidAssignmentTarget,
            ModelError::DuplicateTimeDerivative { .. } => ErrorKind::DuplicateTimeDerivative,
            ModelError::DuplicateName { .. } => ErrorKind::DuplicateName,
            ModelError::NamespaceConflict { .. } => ErrorKind::NamespaceConflict,
            ModelError::ExpressionKind { .. } => ErrorKind::ExpressionKind,
            ModelError::RegimeExplosion { .. } => ErrorKind::RegimeExplosion,
            ModelError::InternalFlatteningInvariantViolation { .. } => {
                ErrorKind::InternalFlatteningInvariantViolation
            }
            ModelError::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            ModelError::StateLengthMismatch { .. } => ErrorKind::StateLengthMismatch,
            ModelError::NotFlat { .. } => ErrorKind::NotFlat,
            ModelError::Parse { .. } => ErrorKind::Parse,
            ModelError::InSubnode { source, .. } => source.kind(),
            ModelError::Multiple(errors) => errors
                .first()
                .map(ModelError::kind)
                .unwrap_or(ErrorKind::ValidationFailed),
        }
    }

    /// Every leaf error kind contained in this error, including the
    /// violations of a failed validation report.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        let mut kinds = Vec::new();
        self.collect_kinds(&mut kinds);
        kinds
    }

    fn collect_kinds(&self, kinds: &mut Vec<ErrorKind>) {
        match self {
            ModelError::InSubnode { source, .. } => source.collect_kinds(kinds),
            ModelError::Multiple(errors) => {
                for e in errors {
                    e.collect_kinds(kinds);
                }
            }
            ModelError::ValidationFailed { report, .. }
            | ModelError::InternalFlatteningInvariantViolation { report, .. } => {
                kinds.push(self.kind());
                for violation in &report.violations {
                    violation.error.collect_kinds(kinds);
                }
            }
            other => kinds.push(other.kind()),
        }
    }

    /// Whether this error is, or contains, an error of the given kind.
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.kinds().contains(&kind)
    }

    /// All leaf errors, unwrapping `Multiple`, subnode wrappers and reports.
    pub fn leaves(&self) -> Vec<&ModelError> {
        match self {
            ModelError::InSubnode { source, .. } => source.leaves(),
            ModelError::Multiple(errors) => errors.iter().flat_map(|e| e.leaves()).collect(),
            ModelError::ValidationFailed { report, .. }
            | ModelError::InternalFlatteningInvariantViolation { report, .. } => report
                .violations
                .iter()
                .flat_map(|v| v.error.leaves())
                .collect(),
            other => vec![other],
        }
    }

    /// Attach the address of the subnode this error came from.
    pub fn in_subnode(self, address: NamespaceAddress) -> ModelError {
        if address.is_root() {
            return self;
        }
        ModelError::InSubnode {
            address,
            source: Box::new(self),
        }
    }

    /// Collapse a batch: nothing, a single error, or `Multiple`.
    pub fn from_batch(mut errors: Vec<ModelError>) -> Option<ModelError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ModelError::Multiple(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_unwrap_wrappers() {
        let err = ModelError::Multiple(vec![
            ModelError::UnresolvedSymbol {
                symbol: "I".to_string(),
                site: "alias 'H'".to_string(),
            },
            ModelError::RecursiveAlias {
                cycle: vec!["A".to_string(), "B".to_string(), "A".to_string()],
            },
        ])
        .in_subnode(NamespaceAddress::parse("b.c1"));

        assert_eq!(err.kind(), ErrorKind::UnresolvedSymbol);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::UnresolvedSymbol, ErrorKind::RecursiveAlias]
        );
        assert!(err.to_string().starts_with("in subnode 'b.c1'"));
    }

    #[test]
    fn test_root_address_is_not_wrapped() {
        let err = ModelError::UnknownFunction {
            function: "foo".to_string(),
        }
        .in_subnode(NamespaceAddress::root());
        assert!(matches!(err, ModelError::UnknownFunction { .. }));
    }

    #[test]
    fn test_from_batch() {
        assert!(ModelError::from_batch(vec![]).is_none());
        let single = ModelError::from_batch(vec![ModelError::NotFlat {
            component: "x".to_string(),
        }]);
        assert!(matches!(single, Some(ModelError::NotFlat { .. })));
    }
}
