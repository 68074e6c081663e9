//! Regime product of the constituents of one hierarchy level.
//!
//! A combined regime holds one regime of every constituent. Its name is the
//! sorted list of the constituents' regime tokens joined with `|`. Each
//! transition of a constituent moves only that constituent's coordinate,
//! except where it emits an event that is wired to a handler: that handler
//! runs as part of the same transition.

use std::collections::{BTreeSet, HashSet, VecDeque};

use log::debug;

use super::connections::EventRouting;
use crate::ir::ast::{Component, OnCondition, OnEvent, OutputEvent, Regime, StateAssignment};
use crate::ir::error::ModelError;
use crate::ir::transform::rename::REGIME_TOKEN_JOINER;

/// Number of combined regimes, or `RegimeExplosion` above `limit`.
pub fn regime_count(sizes: &[usize], limit: usize) -> Result<usize, ModelError> {
    let count = sizes
        .iter()
        .try_fold(1u128, |acc, &n| acc.checked_mul(n as u128))
        .unwrap_or(u128::MAX);
    if count > limit as u128 {
        return Err(ModelError::RegimeExplosion { count, limit });
    }
    // Bounded by `limit`, so it fits.
    Ok(count as usize)
}

/// Canonical name of the combination `indices`.
fn combined_name(constituents: &[&Component], indices: &[usize]) -> String {
    let tokens: BTreeSet<&str> = constituents
        .iter()
        .zip(indices)
        .flat_map(|(c, &i)| c.regimes[i].name.split(REGIME_TOKEN_JOINER))
        .collect();
    tokens
        .into_iter()
        .collect::<Vec<_>>()
        .join(REGIME_TOKEN_JOINER.to_string().as_str())
}

/// Advance `indices` like an odometer, last position fastest.
fn next_combination(indices: &mut [usize], sizes: &[usize]) -> bool {
    for position in (0..indices.len()).rev() {
        indices[position] += 1;
        if indices[position] < sizes[position] {
            return true;
        }
        indices[position] = 0;
    }
    false
}

/// The effects of one combined transition.
struct Firing {
    target: Option<Vec<usize>>,
    state_assignments: Vec<StateAssignment>,
    output_events: Vec<OutputEvent>,
}

/// Fire a transition of constituent `origin` from the combination `current`
/// and follow its output events through the event routing. Every routed
/// handler runs at most once per transition, looked up in the regime its
/// constituent is in before the transition.
fn fire(
    constituents: &[&Component],
    routing: &EventRouting,
    current: &[usize],
    origin: usize,
    target_regime: Option<&str>,
    state_assignments: &[StateAssignment],
    output_events: &[OutputEvent],
) -> Firing {
    let mut next = current.to_vec();
    let mut moved = false;
    let mut move_to = |next: &mut Vec<usize>, constituent: usize, regime: &str| {
        if let Some(i) = constituents[constituent]
            .regimes
            .iter()
            .position(|r| r.name == regime)
        {
            next[constituent] = i;
        }
        moved = true;
    };
    if let Some(regime) = target_regime {
        move_to(&mut next, origin, regime);
    }

    let mut assignments = state_assignments.to_vec();
    let mut emitted: Vec<OutputEvent> = Vec::new();
    let mut fired: HashSet<&str> = HashSet::new();
    let mut pending: VecDeque<OutputEvent> = output_events.iter().cloned().collect();

    while let Some(event) = pending.pop_front() {
        for receiver in routing.receivers(&event.port) {
            let Some(&owner) = routing.owners.get(receiver) else {
                continue;
            };
            if !fired.insert(receiver.as_str()) {
                continue;
            }
            let regime = &constituents[owner].regimes[current[owner]];
            if let Some(handler) = regime.on_event(receiver) {
                assignments.extend(handler.state_assignments.iter().cloned());
                pending.extend(handler.output_events.iter().cloned());
                if let Some(target) = handler.target_regime.as_deref() {
                    move_to(&mut next, owner, target);
                }
            }
        }
        emitted.push(event);
    }

    Firing {
        target: moved.then_some(next),
        state_assignments: assignments,
        output_events: emitted,
    }
}

/// Build the combined regimes of `constituents`.
///
/// Handlers listening on a port in `consumed` are only reachable through
/// `routing` and are not kept as handlers of their own.
pub(super) fn combine_regimes(
    constituents: &[&Component],
    routing: &EventRouting,
    consumed: &HashSet<String>,
    max_regimes: usize,
) -> Result<Vec<Regime>, ModelError> {
    if constituents.is_empty() {
        return Ok(Vec::new());
    }
    let sizes: Vec<usize> = constituents.iter().map(|c| c.regimes.len()).collect();
    let count = regime_count(&sizes, max_regimes)?;
    debug!("regime product {:?} -> {} combined regime(s)", sizes, count);

    let mut regimes = Vec::with_capacity(count);
    let mut indices = vec![0usize; constituents.len()];
    loop {
        let mut regime = Regime::new(&combined_name(constituents, &indices));

        for (origin, constituent) in constituents.iter().enumerate() {
            let local = &constituent.regimes[indices[origin]];
            regime
                .time_derivatives
                .extend(local.time_derivatives.iter().cloned());

            for oc in &local.on_conditions {
                let firing = fire(
                    constituents,
                    routing,
                    &indices,
                    origin,
                    oc.target_regime.as_deref(),
                    &oc.state_assignments,
                    &oc.output_events,
                );
                regime.on_conditions.push(OnCondition {
                    trigger: oc.trigger.clone(),
                    target_regime: firing
                        .target
                        .map(|next| combined_name(constituents, &next)),
                    state_assignments: firing.state_assignments,
                    output_events: firing.output_events,
                });
            }

            for oe in &local.on_events {
                if consumed.contains(&oe.source_port) {
                    continue;
                }
                let firing = fire(
                    constituents,
                    routing,
                    &indices,
                    origin,
                    oe.target_regime.as_deref(),
                    &oe.state_assignments,
                    &oe.output_events,
                );
                regime.on_events.push(OnEvent {
                    source_port: oe.source_port.clone(),
                    target_regime: firing
                        .target
                        .map(|next| combined_name(constituents, &next)),
                    state_assignments: firing.state_assignments,
                    output_events: firing.output_events,
                });
            }
        }

        regimes.push(regime);
        if !next_combination(&mut indices, &sizes) {
            break;
        }
    }
    Ok(regimes)
}
