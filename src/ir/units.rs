//! Physical dimensions and units.
//!
//! Only lookup is supported: there is no unit-conversion arithmetic. A
//! dimension is a vector of exponents over the seven base dimensions and is
//! shared between declarations through `Arc`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

/// Names of the base dimensions, in exponent order.
pub const BASE_DIMENSIONS: [&str; 7] = [
    "mass",
    "length",
    "time",
    "current",
    "amount",
    "temperature",
    "luminous_intensity",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(default)]
    pub exponents: [i32; 7],
}

impl Default for Dimension {
    fn default() -> Self {
        Self::dimensionless()
    }
}

impl Dimension {
    pub fn new(name: &str, exponents: [i32; 7]) -> Self {
        Self {
            name: name.to_string(),
            exponents,
        }
    }

    pub fn dimensionless() -> Self {
        Self::new("dimensionless", [0; 7])
    }

    pub fn is_dimensionless(&self) -> bool {
        self.exponents == [0; 7]
    }

    /// Same physical dimension, regardless of the name it was given.
    pub fn is_compatible(&self, other: &Dimension) -> bool {
        self.exponents == other.exponents
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = BASE_DIMENSIONS
            .iter()
            .zip(self.exponents.iter())
            .filter(|(_, e)| **e != 0)
            .map(|(base, e)| format!("{}^{}", base, e))
            .collect();
        if terms.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} [{}]", self.name, terms.join(" "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub symbol: String,
    pub dimension: Arc<Dimension>,
    /// Power-of-ten scale relative to SI.
    #[serde(default)]
    pub power: i32,
    #[serde(default)]
    pub offset: f64,
}

impl Default for Unit {
    fn default() -> Self {
        Self {
            name: "unitless".to_string(),
            symbol: String::new(),
            dimension: Arc::new(Dimension::dimensionless()),
            power: 0,
            offset: 0.0,
        }
    }
}

impl Unit {
    pub fn new(name: &str, symbol: &str, dimension: Arc<Dimension>, power: i32) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            dimension,
            power,
            offset: 0.0,
        }
    }
}

/// Dimensions keyed by name.
#[derive(Debug, Clone, Default)]
pub struct DimensionTable {
    dimensions: BTreeMap<String, Arc<Dimension>>,
}

impl DimensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensions commonly used by neuron and synapse models.
    pub fn standard() -> Arc<DimensionTable> {
        STANDARD_DIMENSIONS.clone()
    }

    pub fn insert(&mut self, dimension: Dimension) -> Arc<Dimension> {
        let shared = Arc::new(dimension);
        self.dimensions
            .insert(shared.name.clone(), Arc::clone(&shared));
        shared
    }

    pub fn get(&self, name: &str) -> Option<Arc<Dimension>> {
        self.dimensions.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// Units keyed by name.
#[derive(Debug, Clone, Default)]
pub struct UnitTable {
    units: BTreeMap<String, Arc<Unit>>,
}

impl UnitTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard() -> Arc<UnitTable> {
        STANDARD_UNITS.clone()
    }

    pub fn insert(&mut self, unit: Unit) -> Arc<Unit> {
        let shared = Arc::new(unit);
        self.units.insert(shared.name.clone(), Arc::clone(&shared));
        shared
    }

    pub fn get(&self, name: &str) -> Option<Arc<Unit>> {
        self.units.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

static STANDARD_DIMENSIONS: LazyLock<Arc<DimensionTable>> = LazyLock::new(|| {
    let mut table = DimensionTable::new();
    for (name, exponents) in [
        ("dimensionless", [0, 0, 0, 0, 0, 0, 0]),
        ("time", [0, 0, 1, 0, 0, 0, 0]),
        ("per_time", [0, 0, -1, 0, 0, 0, 0]),
        ("voltage", [1, 2, -3, -1, 0, 0, 0]),
        ("current", [0, 0, 0, 1, 0, 0, 0]),
        ("capacitance", [-1, -2, 4, 2, 0, 0, 0]),
        ("conductance", [-1, -2, 3, 2, 0, 0, 0]),
        ("resistance", [1, 2, -3, -2, 0, 0, 0]),
        ("voltage_per_time", [1, 2, -4, -1, 0, 0, 0]),
        ("current_per_time", [0, 0, -1, 1, 0, 0, 0]),
        ("concentration", [0, -3, 0, 0, 1, 0, 0]),
        ("temperature", [0, 0, 0, 0, 0, 1, 0]),
    ] {
        table.insert(Dimension::new(name, exponents));
    }
    Arc::new(table)
});

static STANDARD_UNITS: LazyLock<Arc<UnitTable>> = LazyLock::new(|| {
    let dimensions = DimensionTable::standard();
    let mut table = UnitTable::new();
    for (name, symbol, dimension, power) in [
        ("unitless", "", "dimensionless", 0),
        ("s", "s", "time", 0),
        ("ms", "ms", "time", -3),
        ("Hz", "Hz", "per_time", 0),
        ("V", "V", "voltage", 0),
        ("mV", "mV", "voltage", -3),
        ("A", "A", "current", 0),
        ("nA", "nA", "current", -9),
        ("pA", "pA", "current", -12),
        ("F", "F", "capacitance", 0),
        ("nF", "nF", "capacitance", -9),
        ("pF", "pF", "capacitance", -12),
        ("S", "S", "conductance", 0),
        ("nS", "nS", "conductance", -9),
        ("uS", "uS", "conductance", -6),
        ("Ohm", "Ohm", "resistance", 0),
        ("MOhm", "MOhm", "resistance", 6),
        ("mM", "mM", "concentration", 0),
        ("K", "K", "temperature", 0),
    ] {
        // Every unit above names a dimension of the standard table.
        if let Some(dimension) = dimensions.get(dimension) {
            table.insert(Unit::new(name, symbol, dimension, power));
        }
    }
    Arc::new(table)
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_tables() {
        let dimensions = DimensionTable::standard();
        let voltage = dimensions.get("voltage").unwrap();
        assert_eq!(voltage.exponents, [1, 2, -3, -1, 0, 0, 0]);
        assert!(dimensions.get("furlong").is_none());

        let units = UnitTable::standard();
        let mv = units.get("mV").unwrap();
        assert_eq!(mv.power, -3);
        assert!(Arc::ptr_eq(&mv.dimension, &units.get("V").unwrap().dimension));
    }

    #[test]
    fn test_compatibility_ignores_name() {
        let a = Dimension::new("voltage", [1, 2, -3, -1, 0, 0, 0]);
        let b = Dimension::new("potential", [1, 2, -3, -1, 0, 0, 0]);
        assert!(a.is_compatible(&b));
        assert_ne!(a, b);
        assert!(Dimension::default().is_dimensionless());
    }

    #[test]
    fn test_display() {
        let time = Dimension::new("time", [0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(time.to_string(), "time [time^1]");
        assert_eq!(Dimension::dimensionless().to_string(), "dimensionless");
    }
}
