//! Rendering of model errors against the source file they came from.
//!
//! Labels point at the first place the offending name appears in the input,
//! searched after the name of the subnode the error was reported in.

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::{Error as FilesError, SimpleFiles};
use codespan_reporting::term::termcolor::{ColorChoice, NoColor, StandardStream, WriteColor};
use codespan_reporting::term::{self, Config};

use crate::ir::error::ModelError;

/// A single source file and the diagnostics reported against it.
pub struct SourceDiagnostics {
    files: SimpleFiles<String, String>,
    file_id: usize,
}

impl SourceDiagnostics {
    pub fn new(name: &str, source: &str) -> Self {
        let mut files = SimpleFiles::new();
        let file_id = files.add(name.to_string(), source.to_string());
        Self { files, file_id }
    }

    fn source(&self) -> &str {
        self.files
            .get(self.file_id)
            .map(|f| f.source().as_str())
            .unwrap_or("")
    }

    /// One diagnostic per underlying error.
    pub fn from_model_error(&self, error: &ModelError) -> Vec<Diagnostic<usize>> {
        let mut located = Vec::new();
        collect(error, None, &mut located);
        located
            .into_iter()
            .map(|(address, leaf)| self.leaf_diagnostic(address.as_deref(), leaf))
            .collect()
    }

    fn leaf_diagnostic(&self, address: Option<&str>, error: &ModelError) -> Diagnostic<usize> {
        let mut diagnostic = Diagnostic::error()
            .with_message(error.to_string())
            .with_code(format!("{:?}", error.kind()));
        let source = self.source();
        // Start looking inside the subnode the error belongs to.
        let start = address
            .and_then(|a| a.rsplit('.').next())
            .and_then(|segment| find_name(source, segment, 0))
            .map(|range| range.end)
            .unwrap_or(0);
        let range = subject(error).and_then(|name| {
            find_name(source, name, start).or_else(|| find_name(source, name, 0))
        });
        if let Some(range) = range {
            diagnostic = diagnostic.with_labels(vec![Label::primary(self.file_id, range)]);
        }
        if let Some(address) = address {
            diagnostic = diagnostic.with_notes(vec![format!("in subnode '{}'", address)]);
        }
        diagnostic
    }

    /// A diagnostic for input that is not a valid component description.
    pub fn from_json_error(&self, error: &serde_json::Error) -> Diagnostic<usize> {
        let source = self.source();
        let mut offset: usize = source
            .split_inclusive('\n')
            .take(error.line().saturating_sub(1))
            .map(str::len)
            .sum();
        offset = (offset + error.column().saturating_sub(1)).min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        Diagnostic::error()
            .with_message("invalid component description")
            .with_code("Json")
            .with_labels(vec![
                Label::primary(self.file_id, offset..offset).with_message(error.to_string())
            ])
    }

    pub fn emit(
        &self,
        writer: &mut dyn WriteColor,
        diagnostics: &[Diagnostic<usize>],
    ) -> Result<(), FilesError> {
        let config = Config::default();
        for diagnostic in diagnostics {
            term::emit(writer, &config, &self.files, diagnostic)?;
        }
        Ok(())
    }

    pub fn emit_stderr(&self, diagnostics: &[Diagnostic<usize>]) -> Result<(), FilesError> {
        let writer = StandardStream::stderr(ColorChoice::Auto);
        let mut lock = writer.lock();
        self.emit(&mut lock, diagnostics)
    }

    /// Render without colors, mostly for tests and logs.
    pub fn render(&self, diagnostics: &[Diagnostic<usize>]) -> Result<String, FilesError> {
        let mut writer = NoColor::new(Vec::new());
        self.emit(&mut writer, diagnostics)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }
}

/// Unwrap reports and subnode wrappers, remembering where each error came from.
fn collect<'a>(
    error: &'a ModelError,
    address: Option<String>,
    out: &mut Vec<(Option<String>, &'a ModelError)>,
) {
    match error {
        ModelError::Multiple(errors) => {
            for e in errors {
                collect(e, address.clone(), out);
            }
        }
        ModelError::InSubnode { address, source } => {
            collect(source, Some(address.to_string()), out);
        }
        ModelError::ValidationFailed { report, .. }
        | ModelError::InternalFlatteningInvariantViolation { report, .. } => {
            for violation in &report.violations {
                let at = if violation.address.is_root() {
                    address.clone()
                } else {
                    Some(violation.address.to_string())
                };
                collect(&violation.error, at, out);
            }
        }
        other => out.push((address, other)),
    }
}

/// The name an error is about, if it has one.
fn subject(error: &ModelError) -> Option<&str> {
    match error {
        ModelError::ParameterMismatch {
            missing,
            unexpected,
        }
        | ModelError::StateVariableMismatch {
            missing,
            unexpected,
        } => missing.first().or(unexpected.first()).map(String::as_str),
        ModelError::RecursiveAlias { cycle } => cycle.first().map(String::as_str),
        ModelError::UnresolvedSymbol { symbol, .. } => Some(symbol.as_str()),
        ModelError::UnknownFunction { function }
        | ModelError::ArityMismatch { function, .. }
        | ModelError::UnseededRandom { function } => Some(function.as_str()),
        ModelError::UnknownRegime { regime, .. }
        | ModelError::InvalidRegimeName { regime, .. } => Some(regime.as_str()),
        ModelError::UnknownPort { port, .. } | ModelError::DuplicateEventHandler { port, .. } => {
            Some(port.as_str())
        }
        ModelError::IllegalPortConnection { from, .. } => Some(from.as_str()),
        ModelError::InvalidAssignmentTarget { variable, .. }
        | ModelError::DuplicateTimeDerivative { variable, .. } => Some(variable.as_str()),
        ModelError::DuplicateName { name, .. } | ModelError::NamespaceConflict { name, .. } => {
            Some(name.as_str())
        }
        ModelError::ExpressionKind { expression, .. } => Some(expression.as_str()),
        ModelError::NotFlat { component } | ModelError::StateLengthMismatch { component, .. } => {
            Some(component.as_str())
        }
        ModelError::Parse { input, .. } => Some(input.as_str()),
        ModelError::RegimeExplosion { .. }
        | ModelError::InternalFlatteningInvariantViolation { .. }
        | ModelError::ValidationFailed { .. }
        | ModelError::InSubnode { .. }
        | ModelError::Multiple(_) => None,
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Byte range of `name` in `source` at or after `from`: quoted first,
/// then as a whole word.
fn find_name(source: &str, name: &str, from: usize) -> Option<std::ops::Range<usize>> {
    if name.is_empty() || from > source.len() {
        return None;
    }
    let haystack = &source[from..];
    let quoted = format!("\"{}\"", name);
    if let Some(i) = haystack.find(&quoted) {
        let start = from + i + 1;
        return Some(start..start + name.len());
    }
    let bytes = source.as_bytes();
    haystack.match_indices(name).find_map(|(i, _)| {
        let start = from + i;
        let end = start + name.len();
        let before = start == 0 || !is_ident_byte(bytes[start - 1]);
        let after = end == bytes.len() || !is_ident_byte(bytes[end]);
        (before && after).then_some(start..end)
    })
}
