//! Alias dependency graph: cycle detection and evaluation order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::CheckResult;
use crate::ir::ast::{Alias, Component};
use crate::ir::error::ModelError;

/// Alias name -> names of the aliases its rhs references.
fn dependency_graph(component: &Component) -> BTreeMap<&str, BTreeSet<String>> {
    let names: BTreeSet<&str> = component.aliases.iter().map(|a| a.name.as_str()).collect();
    let mut graph = BTreeMap::new();
    for alias in &component.aliases {
        let deps: BTreeSet<String> = alias
            .rhs
            .free_symbols()
            .into_iter()
            .filter(|s| names.contains(s.as_str()))
            .collect();
        graph.entry(alias.name.as_str()).or_insert(deps);
    }
    graph
}

/// Strongly connected components (Tarjan), visited in name order.
fn strongly_connected<'a>(graph: &BTreeMap<&'a str, BTreeSet<String>>) -> Vec<Vec<&'a str>> {
    struct State<'a> {
        index: usize,
        indices: HashMap<&'a str, usize>,
        lowlink: HashMap<&'a str, usize>,
        stack: Vec<&'a str>,
        on_stack: BTreeSet<&'a str>,
        components: Vec<Vec<&'a str>>,
    }

    fn connect<'a>(
        node: &'a str,
        graph: &BTreeMap<&'a str, BTreeSet<String>>,
        state: &mut State<'a>,
    ) {
        state.indices.insert(node, state.index);
        state.lowlink.insert(node, state.index);
        state.index += 1;
        state.stack.push(node);
        state.on_stack.insert(node);

        if let Some(deps) = graph.get(node) {
            for dep in deps {
                let Some((next, _)) = graph.get_key_value(dep.as_str()) else {
                    continue;
                };
                let next: &'a str = *next;
                if !state.indices.contains_key(next) {
                    connect(next, graph, state);
                    let low = state.lowlink[node].min(state.lowlink[next]);
                    state.lowlink.insert(node, low);
                } else if state.on_stack.contains(next) {
                    let low = state.lowlink[node].min(state.indices[next]);
                    state.lowlink.insert(node, low);
                }
            }
        }

        if state.lowlink[node] == state.indices[node] {
            let mut members = Vec::new();
            while let Some(top) = state.stack.pop() {
                state.on_stack.remove(top);
                members.push(top);
                if top == node {
                    break;
                }
            }
            members.sort();
            state.components.push(members);
        }
    }

    let mut state = State {
        index: 0,
        indices: HashMap::new(),
        lowlink: HashMap::new(),
        stack: Vec::new(),
        on_stack: BTreeSet::new(),
        components: Vec::new(),
    };
    for node in graph.keys() {
        if !state.indices.contains_key(node) {
            connect(*node, graph, &mut state);
        }
    }
    state.components
}

/// A concrete cycle through `members`, starting and ending at the smallest.
fn cycle_path(members: &[&str], graph: &BTreeMap<&str, BTreeSet<String>>) -> Vec<String> {
    let start = members[0];
    let mut path = vec![start.to_string()];
    let mut current = start;
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    visited.insert(start);
    loop {
        let deps = match graph.get(current) {
            Some(deps) => deps,
            None => break,
        };
        if deps.contains(start) {
            path.push(start.to_string());
            break;
        }
        let next = members
            .iter()
            .find(|m| deps.contains(**m) && !visited.contains(**m));
        match next {
            Some(next) => {
                visited.insert(*next);
                path.push(next.to_string());
                current = *next;
            }
            // Dead end inside the component; report the members instead.
            None => {
                path = members.iter().map(|m| m.to_string()).collect();
                path.push(start.to_string());
                break;
            }
        }
    }
    path
}

/// Alias definitions must not depend on themselves, directly or indirectly.
pub fn check_alias_acyclicity(component: &Component) -> CheckResult {
    let mut result = CheckResult::new();
    let graph = dependency_graph(component);
    let mut cycles: Vec<Vec<String>> = strongly_connected(&graph)
        .into_iter()
        .filter(|members| {
            members.len() > 1
                || graph
                    .get(members[0])
                    .is_some_and(|deps| deps.contains(members[0]))
        })
        .map(|members| cycle_path(&members, &graph))
        .collect();
    cycles.sort();
    for cycle in cycles {
        result.add_error(ModelError::RecursiveAlias { cycle });
    }
    result
}

/// Aliases ordered so every alias comes after the aliases it references.
/// Ties keep declaration order.
pub fn alias_evaluation_order(component: &Component) -> Result<Vec<&Alias>, ModelError> {
    let check = check_alias_acyclicity(component);
    if let Some(error) = check.errors.into_iter().next() {
        return Err(error);
    }
    let graph = dependency_graph(component);
    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut order: Vec<&Alias> = Vec::with_capacity(component.aliases.len());
    while order.len() < component.aliases.len() {
        let before = order.len();
        for alias in &component.aliases {
            if placed.contains(alias.name.as_str()) {
                continue;
            }
            let ready = graph
                .get(alias.name.as_str())
                .map_or(true, |deps| deps.iter().all(|d| placed.contains(d.as_str())));
            if ready {
                placed.insert(alias.name.as_str());
                order.push(alias);
            }
        }
        if order.len() == before {
            // Only reachable with duplicate alias names.
            break;
        }
    }
    Ok(order)
}
