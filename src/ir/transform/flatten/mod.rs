//! Flattening of a component hierarchy into a single flat component.
//!
//! The main function in this module is [`flatten`]. It validates its input,
//! flattens every subnode bottom-up and merges each level into its parent:
//!
//! - Every name of a flattened child is moved into the parent's namespace
//!   (`<child><sep><name>`), and its regime names are re-tokenised.
//! - The regimes of the parent and of all children with regimes are
//!   combined into their product (see `product`).
//! - A connection between two ports inside the same subnode is first moved
//!   down into that subnode, so it is resolved where its endpoints are
//!   separate constituents.
//! - Port connections of the level are resolved by substitution (see
//!   `connections`). Connected receive ports disappear. Reduce ports fold
//!   their senders and stay open until the outermost level, where every
//!   reduce port that came from a subnode is sealed with the identity of
//!   its operator.
//!
//! The result is validated again; a failure there is reported as
//! `InternalFlatteningInvariantViolation`, never as a user error.
//!
//! # Submodules
//! - `connections`: port connection resolution for one level
//! - `hash`: md5 fingerprints of components
//! - `product`: regime product and event daisy-chaining

mod connections;
mod hash;
mod product;

pub use hash::fingerprint;
pub use product::regime_count;

use std::collections::{HashMap, HashSet};

use log::{debug, error, info};
#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use connections::{localize_connections, Wiring};
use product::combine_regimes;

use crate::compiler::CompileContext;
use crate::ir::analysis::validation::validate;
use crate::ir::ast::{AnalogMode, Component};
use crate::ir::error::ModelError;
use crate::ir::expr::Expr;
use crate::ir::namespace::NamespaceAddress;
use crate::ir::transform::expand::SymbolReplacer;
use crate::ir::transform::rename::prefix_component;
use crate::ir::visitor::MutVisitable;

/// Flatten `component` into an equivalent component without subnodes.
///
/// A component that already has no subnodes is returned unchanged, so
/// flattening is idempotent.
pub fn flatten(component: &Component, ctx: &CompileContext) -> Result<Component, ModelError> {
    validate(component, ctx).into_result(&component.name)?;
    if component.is_flat() {
        debug!("'{}' has no subnodes, nothing to flatten", component.name);
        return Ok(component.clone());
    }

    let mut localized = component.clone();
    localize_connections(&mut localized);
    let flat = flatten_node(&localized, ctx, &NamespaceAddress::root())?;

    check_flattened(&component.name, &flat, ctx)?;
    info!(
        "flattened '{}': {} node(s) -> {} regime(s), {} state variable(s), {} parameter(s)",
        component.name,
        component.node_count(),
        flat.regimes.len(),
        flat.state_variables.len(),
        flat.parameters.len()
    );
    Ok(flat)
}

/// Re-validate the output of flattening `name`. Any violation is a bug in
/// flattening, never a user error.
fn check_flattened(name: &str, flat: &Component, ctx: &CompileContext) -> Result<(), ModelError> {
    let report = validate(flat, ctx);
    if report.is_ok() {
        return Ok(());
    }
    error!(
        "flattening '{}' produced an invalid component:\n{}",
        name, report
    );
    Err(ModelError::InternalFlatteningInvariantViolation {
        component: name.to_string(),
        report,
    })
}

fn flatten_node(
    component: &Component,
    ctx: &CompileContext,
    address: &NamespaceAddress,
) -> Result<Component, ModelError> {
    if component.is_flat() {
        return Ok(component.clone());
    }
    let children = flatten_children(component, ctx, address)?;
    merge_level(component, &children, ctx, address.is_root())
        .map_err(|e| e.in_subnode(address.clone()))
}

/// Flatten and prefix every subnode, in subnode order.
fn flatten_children(
    component: &Component,
    ctx: &CompileContext,
    address: &NamespaceAddress,
) -> Result<Vec<Component>, ModelError> {
    let flatten_one = |(name, child): (&String, &Component)| -> Result<Component, ModelError> {
        let flat = flatten_node(child, ctx, &address.child(name))?;
        Ok(prefix_component(&flat, name, &ctx.separator))
    };

    #[cfg(not(target_arch = "wasm32"))]
    if ctx.parallel {
        let subnodes: Vec<(&String, &Component)> = component.subnodes.iter().collect();
        return subnodes.into_par_iter().map(flatten_one).collect();
    }
    component.subnodes.iter().map(flatten_one).collect()
}

/// Merge `component`'s own content with its flattened, prefixed children.
fn merge_level(
    component: &Component,
    children: &[Component],
    ctx: &CompileContext,
    outermost: bool,
) -> Result<Component, ModelError> {
    let mut wiring = Wiring::resolve(component, &ctx.separator)?;

    let mut flat = Component::new(&component.name);
    for part in std::iter::once(component).chain(children) {
        flat.parameters.extend(part.parameters.iter().cloned());
        flat.state_variables
            .extend(part.state_variables.iter().cloned());
        flat.aliases.extend(part.aliases.iter().cloned());
        flat.constants.extend(part.constants.iter().cloned());
        flat.analog_ports.extend(
            part.analog_ports
                .iter()
                .filter(|p| !wiring.consumed.contains(&p.name))
                .cloned(),
        );
        flat.event_ports.extend(
            part.event_ports
                .iter()
                .filter(|p| !wiring.consumed.contains(&p.name))
                .cloned(),
        );
    }

    let constituents: Vec<&Component> = std::iter::once(component)
        .chain(children)
        .filter(|c| !c.regimes.is_empty())
        .collect();
    wiring.events.assign_owners(&constituents);
    flat.regimes = combine_regimes(
        &constituents,
        &wiring.events,
        &wiring.consumed,
        ctx.max_regimes,
    )?;

    // Reduce ports of subnodes can no longer be driven once the outermost
    // level is merged.
    let mut sealed: HashMap<String, Expr> = HashMap::new();
    if outermost {
        for port in children.iter().flat_map(|c| &c.analog_ports) {
            if let AnalogMode::Reduce(op) = port.mode {
                sealed.insert(port.name.clone(), Expr::number(op.identity()));
            }
        }
    }
    let sealed_names: HashSet<String> = sealed.keys().cloned().collect();
    let mut replacements = wiring.analog_replacements(&sealed_names);
    for (port, identity) in sealed {
        replacements.entry(port).or_insert(identity);
    }
    flat.analog_ports.retain(|p| !sealed_names.contains(&p.name));
    debug!(
        "'{}': {} substitution(s), {} sealed reduce port(s)",
        component.name,
        replacements.len(),
        sealed_names.len()
    );

    let mut replacer = SymbolReplacer::new(replacements);
    if outermost {
        replacer = replacer.simplifying();
    }
    flat.accept_mut(&mut replacer);
    Ok(flat)
}

#[cfg(test)]
mod tests;
