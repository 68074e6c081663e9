//! Right-hand side evaluation of a flat component's ODEs.
//!
//! This evaluates `dx/dt` for one regime at one point; stepping the system
//! forward in time is left to the caller.

use std::sync::Arc;

use log::trace;
use ndarray::Array1;
use rand::rngs::StdRng;

use super::view::FlatView;
use crate::compiler::CompileContext;
use crate::ir::analysis::validation::alias_evaluation_order;
use crate::ir::ast::Alias;
use crate::ir::error::ModelError;
use crate::ir::expr::{Expr, SymbolValues};
use crate::ir::functions::FunctionTable;

/// Name the current time is bound to.
pub const TIME_SYMBOL: &str = "t";

pub struct RhsEvaluator<'v, 'a> {
    view: &'v FlatView<'a>,
    aliases: Vec<&'a Alias>,
    functions: Arc<FunctionTable>,
    rng: Option<StdRng>,
}

impl<'v, 'a> RhsEvaluator<'v, 'a> {
    /// `random.*` calls are only allowed when `ctx` carries a seed.
    pub fn new(view: &'v FlatView<'a>, ctx: &CompileContext) -> Result<Self, ModelError> {
        Ok(Self {
            view,
            aliases: alias_evaluation_order(view.component())?,
            functions: ctx.functions.clone(),
            rng: ctx.seed.map(|_| ctx.rng()),
        })
    }

    fn evaluate(&mut self, expr: &Expr, symbols: &SymbolValues) -> Result<f64, ModelError> {
        match self.rng.as_mut() {
            Some(rng) => expr.evaluate_with_rng(symbols, &self.functions, rng),
            None => expr.evaluate(symbols, &self.functions),
        }
    }

    /// Every symbol the component can reference at this point: inputs,
    /// constants, state, time and aliases.
    pub fn symbol_values(
        &mut self,
        state: &Array1<f64>,
        inputs: &SymbolValues,
        t: f64,
    ) -> Result<SymbolValues, ModelError> {
        let layout = self.view.state_layout();
        if state.len() != layout.len() {
            return Err(ModelError::StateLengthMismatch {
                component: self.view.name().to_string(),
                expected: layout.len(),
                found: state.len(),
            });
        }
        let mut symbols = inputs.clone();
        for constant in &self.view.component().constants {
            symbols.insert(constant.name.clone(), constant.value);
        }
        for (name, &index) in layout {
            symbols.insert(name.clone(), state[index]);
        }
        symbols.insert(TIME_SYMBOL.to_string(), t);

        let aliases = self.aliases.clone();
        for alias in aliases {
            let value = self.evaluate(&alias.rhs, &symbols)?;
            symbols.insert(alias.name.clone(), value);
        }
        Ok(symbols)
    }

    /// `dx/dt` in `regime`, laid out like `state`.
    pub fn derivative_rhs(
        &mut self,
        regime: &str,
        state: &Array1<f64>,
        inputs: &SymbolValues,
        t: f64,
    ) -> Result<Array1<f64>, ModelError> {
        let derivatives = self.view.time_derivatives(regime)?;
        let symbols = self.symbol_values(state, inputs, t)?;
        let mut out = Array1::zeros(derivatives.len());
        for (i, td) in derivatives.iter().enumerate() {
            out[i] = self.evaluate(&td.rhs, &symbols)?;
        }
        trace!("rhs of '{}' at t={}: {}", regime, t, out);
        Ok(out)
    }

    /// Indices of the on-conditions of `regime` whose trigger holds.
    pub fn triggered(
        &mut self,
        regime: &str,
        state: &Array1<f64>,
        inputs: &SymbolValues,
        t: f64,
    ) -> Result<Vec<usize>, ModelError> {
        let regime = self.view.regime(regime)?;
        let symbols = self.symbol_values(state, inputs, t)?;
        let mut fired = Vec::new();
        for (i, oc) in regime.on_conditions.iter().enumerate() {
            if oc.trigger.evaluate_condition(&symbols, &self.functions)? {
                fired.push(i);
            }
        }
        Ok(fired)
    }
}
