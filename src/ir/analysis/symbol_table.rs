//! Typed symbol table for one component.
//!
//! Built once per component from its declarations. Maps every name an
//! expression may reference to what kind of declaration introduced it, so
//! passes can resolve symbols without re-scanning the declaration lists.

use std::collections::HashMap;
use std::fmt;

use ordermap::OrderMap;

use crate::ir::ast::{AnalogMode, Component};
use crate::ir::expr::BUILTIN_SYMBOLS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Parameter,
    StateVariable,
    Alias,
    Constant,
    ReceivePort,
    ReducePort,
    Builtin,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SymbolKind::Parameter => "parameter",
            SymbolKind::StateVariable => "state variable",
            SymbolKind::Alias => "alias",
            SymbolKind::Constant => "constant",
            SymbolKind::ReceivePort => "receive port",
            SymbolKind::ReducePort => "reduce port",
            SymbolKind::Builtin => "builtin",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: OrderMap<String, SymbolKind>,
    /// Second and later declarations of an already-known name.
    duplicates: Vec<(String, SymbolKind, SymbolKind)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self::default();
        for name in BUILTIN_SYMBOLS {
            table.symbols.insert(name.to_string(), SymbolKind::Builtin);
        }
        table
    }

    /// Symbols of `component`. Send ports are not symbols of their own: they
    /// expose an alias or state variable of the same name.
    pub fn for_component(component: &Component) -> Self {
        let mut table = Self::new();
        for p in &component.parameters {
            table.add_symbol(&p.name, SymbolKind::Parameter);
        }
        for s in &component.state_variables {
            table.add_symbol(&s.name, SymbolKind::StateVariable);
        }
        for a in &component.aliases {
            table.add_symbol(&a.name, SymbolKind::Alias);
        }
        for c in &component.constants {
            table.add_symbol(&c.name, SymbolKind::Constant);
        }
        for port in &component.analog_ports {
            match port.mode {
                AnalogMode::Send => {}
                AnalogMode::Receive => table.add_symbol(&port.name, SymbolKind::ReceivePort),
                AnalogMode::Reduce(_) => table.add_symbol(&port.name, SymbolKind::ReducePort),
            }
        }
        table
    }

    /// Add a symbol. A name that is already present keeps its first kind and
    /// the clash is remembered in [`SymbolTable::duplicates`].
    pub fn add_symbol(&mut self, name: &str, kind: SymbolKind) {
        if let Some(existing) = self.symbols.get(name) {
            self.duplicates.push((name.to_string(), *existing, kind));
        } else {
            self.symbols.insert(name.to_string(), kind);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolKind> {
        self.symbols.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.lookup(name) == Some(SymbolKind::Builtin)
    }

    pub fn duplicates(&self) -> &[(String, SymbolKind, SymbolKind)] {
        &self.duplicates
    }

    /// Names of a given kind, in declaration order.
    pub fn names_of(&self, kind: SymbolKind) -> Vec<&str> {
        self.symbols
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn counts(&self) -> HashMap<SymbolKind, usize> {
        let mut counts = HashMap::new();
        for kind in self.symbols.values() {
            *counts.entry(*kind).or_insert(0) += 1;
        }
        counts
    }
}
