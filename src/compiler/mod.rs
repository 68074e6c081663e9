//! The compilation pipeline: parse a component, validate it and flatten it.
//!
//! ```
//! use ninemlc::ir::ast::{Component, Regime};
//! use ninemlc::ir::expr::Expr;
//! use ninemlc::Compiler;
//!
//! let mut leak = Component::new("Leak");
//! leak.parameters.push(ninemlc::ir::ast::Parameter::new("tau"));
//! leak.state_variables.push(ninemlc::ir::ast::StateVariable::new("V"));
//! leak.regimes.push(Regime::new("r").with_time_derivative("V", Expr::parse("-V / tau").unwrap()));
//!
//! let result = Compiler::new().compile(&leak).unwrap();
//! assert_eq!(result.flat().regimes.len(), 1);
//! ```

mod context;
pub mod diagnostics;

pub use context::{CompileContext, DEFAULT_MAX_REGIMES, MAX_REGIMES_ENV};

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use log::{debug, info};

use crate::ir::analysis::validation::{validate, ValidationReport};
use crate::ir::ast::Component;
use crate::ir::error::ModelError;
use crate::ir::transform::flatten::{fingerprint, flatten};

/// The output of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    flat: Component,
    fingerprint: String,
    /// Name of the component before flattening.
    pub source_name: String,
}

impl CompilationResult {
    /// The flattened component.
    pub fn flat(&self) -> &Component {
        &self.flat
    }

    pub fn into_flat(self) -> Component {
        self.flat
    }

    /// md5 of the flattened component's JSON form.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(&self.flat).context("failed to serialize flat component")
    }
}

/// Builder for one run of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    ctx: CompileContext,
    verbose: bool,
}

impl Compiler {
    /// A compiler with the default context, honouring `NINEMLC_MAX_REGIMES`.
    pub fn new() -> Self {
        Self {
            ctx: CompileContext::from_env(),
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn max_regimes(mut self, max_regimes: usize) -> Self {
        self.ctx.max_regimes = max_regimes;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.ctx.parallel = parallel;
        self
    }

    pub fn separator(mut self, separator: &str) -> Self {
        self.ctx.separator = separator.to_string();
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.ctx.seed = Some(seed);
        self
    }

    /// Replace the whole context.
    pub fn context(mut self, ctx: CompileContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn ctx(&self) -> &CompileContext {
        &self.ctx
    }

    /// Run every validation pass without flattening.
    pub fn validate(&self, component: &Component) -> ValidationReport {
        validate(component, &self.ctx)
    }

    /// Validate and flatten `component`.
    pub fn compile(&self, component: &Component) -> Result<CompilationResult, ModelError> {
        let start = Instant::now();
        let flat = flatten(component, &self.ctx)?;
        let fingerprint = fingerprint(&flat);
        if self.verbose {
            info!(
                "compiled '{}' in {:?} (fingerprint {})",
                component.name,
                start.elapsed(),
                fingerprint
            );
        } else {
            debug!("compiled '{}' in {:?}", component.name, start.elapsed());
        }
        Ok(CompilationResult {
            flat,
            fingerprint,
            source_name: component.name.clone(),
        })
    }

    /// Parse a JSON component description from `source` and compile it.
    /// `file_name` only appears in error messages.
    pub fn compile_str(&self, source: &str, file_name: &str) -> anyhow::Result<CompilationResult> {
        let component = parse_component(source, file_name)?;
        self.compile(&component)
            .with_context(|| format!("failed to compile '{}' from {}", component.name, file_name))
    }

    pub fn compile_file(&self, path: impl AsRef<Path>) -> anyhow::Result<CompilationResult> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.compile_str(&source, &path.display().to_string())
    }
}

/// Parse the JSON form of a component.
pub fn parse_component(source: &str, file_name: &str) -> anyhow::Result<Component> {
    serde_json::from_str(source).with_context(|| format!("failed to parse component from {}", file_name))
}
