//! Builtin functions callable from expressions.
//!
//! The function table is the only way an expression can call out. Math
//! functions are pure; the `random.*` samplers draw from an explicit
//! seeded generator supplied by the caller.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use rand::rngs::StdRng;
use rand::Rng;

/// How a function computes its value.
#[derive(Debug, Clone, Copy)]
pub enum FunctionKind {
    Pure(fn(&[f64]) -> f64),
    Random(Distribution),
}

/// The random distributions available as `random.<name>(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    Uniform,
    Normal,
    Exponential,
    Poisson,
    Binomial,
}

impl Distribution {
    pub fn sample(&self, args: &[f64], rng: &mut StdRng) -> f64 {
        match self {
            Distribution::Uniform => {
                let (low, high) = (args[0], args[1]);
                low + (high - low) * rng.gen::<f64>()
            }
            Distribution::Normal => {
                // Box-Muller
                let (mu, sigma) = (args[0], args[1]);
                let u1: f64 = 1.0 - rng.gen::<f64>();
                let u2: f64 = rng.gen::<f64>();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                mu + sigma * z
            }
            Distribution::Exponential => {
                let rate = args[0];
                -(1.0 - rng.gen::<f64>()).ln() / rate
            }
            Distribution::Poisson => {
                // Knuth's multiplication method; fine for the small rates used in models.
                let limit = (-args[0]).exp();
                let mut k = 0.0;
                let mut p = 1.0;
                loop {
                    p *= rng.gen::<f64>();
                    if p <= limit {
                        return k;
                    }
                    k += 1.0;
                }
            }
            Distribution::Binomial => {
                let (n, p) = (args[0].max(0.0).round() as u64, args[1]);
                (0..n).filter(|_| rng.gen::<f64>() < p).count() as f64
            }
        }
    }
}

/// Signature of a callable function.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    /// Number of arguments; `None` accepts one or more.
    pub arity: Option<usize>,
    pub kind: FunctionKind,
}

impl FunctionSignature {
    pub fn accepts(&self, count: usize) -> bool {
        match self.arity {
            Some(n) => n == count,
            None => count >= 1,
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(self.kind, FunctionKind::Random(_))
    }
}

/// Named functions available to expressions.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: BTreeMap<String, FunctionSignature>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin math functions and random samplers.
    pub fn builtin() -> Arc<FunctionTable> {
        BUILTIN_FUNCTIONS.clone()
    }

    pub fn insert(&mut self, name: &str, arity: Option<usize>, kind: FunctionKind) {
        self.functions.insert(
            name.to_string(),
            FunctionSignature {
                name: name.to_string(),
                arity,
                kind,
            },
        );
    }

    /// Register a pure function.
    pub fn with_pure(mut self, name: &str, arity: usize, f: fn(&[f64]) -> f64) -> Self {
        self.insert(name, Some(arity), FunctionKind::Pure(f));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn variadic_min(args: &[f64]) -> f64 {
    args.iter().copied().fold(f64::INFINITY, f64::min)
}

fn variadic_max(args: &[f64]) -> f64 {
    args.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn sign(args: &[f64]) -> f64 {
    if args[0] > 0.0 {
        1.0
    } else if args[0] < 0.0 {
        -1.0
    } else {
        0.0
    }
}

static BUILTIN_FUNCTIONS: LazyLock<Arc<FunctionTable>> = LazyLock::new(|| {
    let unary: [(&str, fn(&[f64]) -> f64); 17] = [
        ("sin", |a| a[0].sin()),
        ("cos", |a| a[0].cos()),
        ("tan", |a| a[0].tan()),
        ("asin", |a| a[0].asin()),
        ("acos", |a| a[0].acos()),
        ("atan", |a| a[0].atan()),
        ("sinh", |a| a[0].sinh()),
        ("cosh", |a| a[0].cosh()),
        ("tanh", |a| a[0].tanh()),
        ("exp", |a| a[0].exp()),
        ("log", |a| a[0].ln()),
        ("log10", |a| a[0].log10()),
        ("sqrt", |a| a[0].sqrt()),
        ("abs", |a| a[0].abs()),
        ("floor", |a| a[0].floor()),
        ("ceil", |a| a[0].ceil()),
        ("sign", sign),
    ];
    let mut table = FunctionTable::new();
    for (name, f) in unary {
        table.insert(name, Some(1), FunctionKind::Pure(f));
    }
    table.insert("atan2", Some(2), FunctionKind::Pure(|a| a[0].atan2(a[1])));
    table.insert("pow", Some(2), FunctionKind::Pure(|a| a[0].powf(a[1])));
    table.insert("min", None, FunctionKind::Pure(variadic_min));
    table.insert("max", None, FunctionKind::Pure(variadic_max));

    let samplers = [
        ("random.uniform", 2, Distribution::Uniform),
        ("random.normal", 2, Distribution::Normal),
        ("random.exponential", 1, Distribution::Exponential),
        ("random.poisson", 1, Distribution::Poisson),
        ("random.binomial", 2, Distribution::Binomial),
    ];
    for (name, arity, distribution) in samplers {
        table.insert(name, Some(arity), FunctionKind::Random(distribution));
    }
    Arc::new(table)
});

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_builtin_table() {
        let table = FunctionTable::builtin();
        assert!(table.contains("exp"));
        assert!(table.contains("random.uniform"));
        assert!(!table.contains("exp2"));
        assert!(table.get("atan2").unwrap().accepts(2));
        assert!(!table.get("atan2").unwrap().accepts(1));
        assert!(table.get("max").unwrap().accepts(3));
        assert!(table.get("random.normal").unwrap().is_random());
    }

    #[test]
    fn test_samplers_are_reproducible() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for dist in [
            Distribution::Uniform,
            Distribution::Normal,
            Distribution::Binomial,
        ] {
            let args = [1.0, 0.5];
            assert_eq!(dist.sample(&args, &mut a), dist.sample(&args, &mut b));
        }
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let x = Distribution::Uniform.sample(&[2.0, 3.0], &mut rng);
            assert!((2.0..3.0).contains(&x));
        }
        let k = Distribution::Poisson.sample(&[3.0], &mut rng);
        assert!(k >= 0.0 && k.fract() == 0.0);
    }
}
