//! Configuration shared by every stage of the pipeline.
//!
//! A `CompileContext` is built once and passed by reference into
//! validation, flattening and evaluation. It is never mutated afterwards.

use std::sync::Arc;

use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::ir::functions::FunctionTable;
use crate::ir::namespace::DEFAULT_SEPARATOR;
use crate::ir::units::{DimensionTable, UnitTable};

/// Default bound on the number of regimes a flattened component may have.
pub const DEFAULT_MAX_REGIMES: usize = 4096;

/// Environment variable overriding [`CompileContext::max_regimes`].
pub const MAX_REGIMES_ENV: &str = "NINEMLC_MAX_REGIMES";

#[derive(Debug, Clone)]
pub struct CompileContext {
    pub functions: Arc<FunctionTable>,
    pub dimensions: Arc<DimensionTable>,
    pub units: Arc<UnitTable>,
    /// Flattening fails with `RegimeExplosion` above this many regimes.
    pub max_regimes: usize,
    /// Joins namespace segments in flattened names.
    pub separator: String,
    /// Use rayon for sibling subnodes and validation passes.
    pub parallel: bool,
    /// Seed for stochastic evaluation; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for CompileContext {
    fn default() -> Self {
        Self {
            functions: FunctionTable::builtin(),
            dimensions: DimensionTable::standard(),
            units: UnitTable::standard(),
            max_regimes: DEFAULT_MAX_REGIMES,
            separator: DEFAULT_SEPARATOR.to_string(),
            parallel: true,
            seed: None,
        }
    }
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with `NINEMLC_MAX_REGIMES` applied when set.
    pub fn from_env() -> Self {
        let mut ctx = Self::default();
        if let Ok(value) = std::env::var(MAX_REGIMES_ENV) {
            match value.trim().parse::<usize>() {
                Ok(limit) => ctx.max_regimes = limit,
                Err(_) => warn!(
                    "ignoring {}={:?}: not a non-negative integer",
                    MAX_REGIMES_ENV, value
                ),
            }
        }
        ctx
    }

    pub fn with_functions(mut self, functions: Arc<FunctionTable>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_dimensions(mut self, dimensions: Arc<DimensionTable>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_units(mut self, units: Arc<UnitTable>) -> Self {
        self.units = units;
        self
    }

    pub fn with_max_regimes(mut self, max_regimes: usize) -> Self {
        self.max_regimes = max_regimes;
        self
    }

    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// A generator for `random.*` calls.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_defaults() {
        let ctx = CompileContext::default();
        assert_eq!(ctx.max_regimes, DEFAULT_MAX_REGIMES);
        assert_eq!(ctx.separator, "_");
        assert!(ctx.functions.contains("sin"));
        assert!(ctx.dimensions.get("voltage").is_some());
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let ctx = CompileContext::new().with_seed(11);
        let a: f64 = ctx.rng().gen();
        let b: f64 = ctx.rng().gen();
        assert_eq!(a, b);
    }
}
