//! Structural equivalence of components.
//!
//! Two components are equivalent when they declare the same things (in any
//! order, with expressions compared in canonical form) and their regime
//! graphs are isomorphic. Regime names may differ; declaration and port
//! names may not.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::ir::ast::{Component, OutputEvent, Regime, StateAssignment};

/// A transition without its target, in a name-independent form.
fn effects_key(assignments: &[StateAssignment], outputs: &[OutputEvent]) -> String {
    let assignments: BTreeSet<String> = assignments
        .iter()
        .map(|sa| format!("{}:={}", sa.variable, sa.rhs.canonical_key()))
        .collect();
    let outputs: BTreeSet<&str> = outputs.iter().map(|o| o.port.as_str()).collect();
    format!("{:?} emit {:?}", assignments, outputs)
}

/// (transition key, target index) for every transition of `regime`.
/// A transition without a target stays in `index`.
fn transitions(regime: &Regime, index: usize, positions: &HashMap<&str, usize>) -> Vec<(String, usize)> {
    let target = |t: Option<&String>| {
        t.and_then(|name| positions.get(name.as_str()).copied())
            .unwrap_or(index)
    };
    let mut out: Vec<(String, usize)> = regime
        .on_conditions
        .iter()
        .map(|oc| {
            (
                format!(
                    "when {} {}",
                    oc.trigger.canonical_key(),
                    effects_key(&oc.state_assignments, &oc.output_events)
                ),
                target(oc.target_regime.as_ref()),
            )
        })
        .chain(regime.on_events.iter().map(|oe| {
            (
                format!(
                    "on {} {}",
                    oe.source_port,
                    effects_key(&oe.state_assignments, &oe.output_events)
                ),
                target(oe.target_regime.as_ref()),
            )
        }))
        .collect();
    out.sort();
    out
}

/// Name-independent summary of a regime, ignoring where transitions go.
fn regime_signature(regime: &Regime) -> String {
    let derivatives: BTreeSet<String> = regime
        .time_derivatives
        .iter()
        .map(|td| format!("{}'={}", td.variable, td.rhs.canonical_key()))
        .collect();
    let moves: Vec<String> = transitions(regime, 0, &HashMap::new())
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    format!("{:?} {:?}", derivatives, moves)
}

/// Whether both components declare the same interface and content.
pub fn declarations_equivalent(a: &Component, b: &Component) -> bool {
    fn keys<T, F: Fn(&T) -> String>(items: &[T], key: F) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for item in items {
            *counts.entry(key(item)).or_insert(0) += 1;
        }
        counts
    }

    keys(&a.parameters, |p| format!("{} {:?}", p.name, p.dimension.exponents))
        == keys(&b.parameters, |p| format!("{} {:?}", p.name, p.dimension.exponents))
        && keys(&a.state_variables, |s| format!("{} {:?}", s.name, s.dimension.exponents))
            == keys(&b.state_variables, |s| format!("{} {:?}", s.name, s.dimension.exponents))
        && keys(&a.aliases, |al| format!("{}={}", al.name, al.rhs.canonical_key()))
            == keys(&b.aliases, |al| format!("{}={}", al.name, al.rhs.canonical_key()))
        && keys(&a.constants, |c| format!("{}={:?}", c.name, c.value))
            == keys(&b.constants, |c| format!("{}={:?}", c.name, c.value))
        && keys(&a.analog_ports, |p| {
            format!("{} {} {:?}", p.name, p.mode, p.dimension.exponents)
        }) == keys(&b.analog_ports, |p| {
            format!("{} {} {:?}", p.name, p.mode, p.dimension.exponents)
        })
        && keys(&a.event_ports, |p| format!("{} {}", p.name, p.mode))
            == keys(&b.event_ports, |p| format!("{} {}", p.name, p.mode))
        && keys(&a.port_connections, |c| c.to_string())
            == keys(&b.port_connections, |c| c.to_string())
}

/// A mapping from the regimes of `a` to the regimes of `b` (by index) that
/// preserves every transition, if one exists.
pub fn regime_isomorphism(a: &Component, b: &Component) -> Option<Vec<usize>> {
    if a.regimes.len() != b.regimes.len() {
        return None;
    }
    let positions = |c: &Component| -> HashMap<String, usize> {
        c.regimes
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect()
    };
    let (pos_a, pos_b) = (positions(a), positions(b));
    fn borrow(m: &HashMap<String, usize>) -> HashMap<&str, usize> {
        m.iter().map(|(k, v)| (k.as_str(), *v)).collect()
    }
    let (pos_a, pos_b) = (borrow(&pos_a), borrow(&pos_b));

    let edges_a: Vec<Vec<(String, usize)>> = a
        .regimes
        .iter()
        .enumerate()
        .map(|(i, r)| transitions(r, i, &pos_a))
        .collect();
    let edges_b: Vec<Vec<(String, usize)>> = b
        .regimes
        .iter()
        .enumerate()
        .map(|(i, r)| transitions(r, i, &pos_b))
        .collect();
    let sig_b: Vec<String> = b.regimes.iter().map(regime_signature).collect();
    let candidates: Vec<Vec<usize>> = a
        .regimes
        .iter()
        .map(|r| {
            let sig = regime_signature(r);
            (0..b.regimes.len()).filter(|&j| sig_b[j] == sig).collect()
        })
        .collect();

    let mut mapping: Vec<Option<usize>> = vec![None; a.regimes.len()];
    let mut used = vec![false; b.regimes.len()];
    if search(0, &candidates, &edges_a, &edges_b, &mut mapping, &mut used) {
        Some(mapping.into_iter().flatten().collect())
    } else {
        None
    }
}

fn preserves_edges(
    i: usize,
    mapping: &[Option<usize>],
    edges_a: &[Vec<(String, usize)>],
    edges_b: &[Vec<(String, usize)>],
) -> bool {
    let Some(j) = mapping[i] else {
        return false;
    };
    let mut mapped: Vec<(String, usize)> = Vec::with_capacity(edges_a[i].len());
    for (key, target) in &edges_a[i] {
        match mapping[*target] {
            Some(t) => mapped.push((key.clone(), t)),
            // Target not placed yet; checked once it is.
            None => return true,
        }
    }
    mapped.sort();
    mapped == edges_b[j]
}

fn search(
    i: usize,
    candidates: &[Vec<usize>],
    edges_a: &[Vec<(String, usize)>],
    edges_b: &[Vec<(String, usize)>],
    mapping: &mut Vec<Option<usize>>,
    used: &mut Vec<bool>,
) -> bool {
    if i == candidates.len() {
        return (0..mapping.len()).all(|k| preserves_edges(k, mapping, edges_a, edges_b));
    }
    for &j in &candidates[i] {
        if used[j] {
            continue;
        }
        mapping[i] = Some(j);
        used[j] = true;
        let consistent = (0..=i).all(|k| preserves_edges(k, mapping, edges_a, edges_b));
        if consistent && search(i + 1, candidates, edges_a, edges_b, mapping, used) {
            return true;
        }
        mapping[i] = None;
        used[j] = false;
    }
    false
}

/// Declarations equal as sets, subnodes pairwise equivalent and regime
/// graphs isomorphic.
pub fn equivalent(a: &Component, b: &Component) -> bool {
    if !declarations_equivalent(a, b) || a.subnodes.len() != b.subnodes.len() {
        return false;
    }
    let subnodes_match = a.subnodes.iter().all(|(name, child)| {
        b.subnodes
            .get(name)
            .is_some_and(|other| equivalent(child, other))
    });
    subnodes_match && regime_isomorphism(a, b).is_some()
}
