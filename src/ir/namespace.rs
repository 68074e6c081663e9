//! Hierarchical addresses of symbols inside nested components.
//!
//! An address is a path of subnode names followed by an optional symbol, e.g.
//! `b.c1.cIn1` addresses port `cIn1` of subnode `c1` of subnode `b`. When a
//! hierarchy is flattened the address is rendered as a single flat symbol by
//! joining every part with a separator (`b_c1_cIn1`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default separator used when rendering flat symbol names.
pub const DEFAULT_SEPARATOR: &str = "_";

#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespaceAddress {
    pub segments: Vec<String>,
    pub symbol: Option<String>,
}

impl NamespaceAddress {
    /// The address of the component itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Address of a symbol declared directly in the component.
    pub fn local(symbol: &str) -> Self {
        Self {
            segments: Vec::new(),
            symbol: Some(symbol.to_string()),
        }
    }

    /// Parse a dotted path. The last part is the symbol, everything before
    /// it names subnodes. Use [`NamespaceAddress::subnode`] for a path that
    /// only contains subnode names.
    pub fn parse(path: &str) -> Self {
        let mut parts: Vec<String> = path
            .split('.')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        let symbol = parts.pop();
        Self {
            segments: parts,
            symbol,
        }
    }

    /// Address of a subnode (no symbol).
    pub fn subnode(path: &[&str]) -> Self {
        Self {
            segments: path.iter().map(|s| s.to_string()).collect(),
            symbol: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty() && self.symbol.is_none()
    }

    /// A new address with `segment` prepended.
    pub fn prefix(&self, segment: &str) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.push(segment.to_string());
        segments.extend(self.segments.iter().cloned());
        Self {
            segments,
            symbol: self.symbol.clone(),
        }
    }

    /// Address of the subnode `name` below this one. Any symbol is dropped.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self {
            segments,
            symbol: None,
        }
    }

    /// This address with its symbol replaced.
    pub fn with_symbol(&self, symbol: &str) -> Self {
        Self {
            segments: self.segments.clone(),
            symbol: Some(symbol.to_string()),
        }
    }

    /// Split off the first segment: `b.c1.x` -> (`b`, `c1.x`).
    pub fn split_first(&self) -> Option<(&str, NamespaceAddress)> {
        let (first, rest) = self.segments.split_first()?;
        Some((
            first.as_str(),
            NamespaceAddress {
                segments: rest.to_vec(),
                symbol: self.symbol.clone(),
            },
        ))
    }

    /// Join all parts with `separator`.
    pub fn to_flat_symbol(&self, separator: &str) -> String {
        let mut parts: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        if let Some(symbol) = &self.symbol {
            parts.push(symbol);
        }
        parts.join(separator)
    }
}

impl fmt::Display for NamespaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        if let Some(symbol) = &self.symbol {
            parts.push(symbol);
        }
        if parts.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", parts.join("."))
        }
    }
}

impl From<NamespaceAddress> for String {
    fn from(address: NamespaceAddress) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for NamespaceAddress {
    type Error = String;

    fn try_from(path: String) -> Result<Self, Self::Error> {
        if path.trim().is_empty() {
            return Err("empty namespace address".to_string());
        }
        if path == "<root>" {
            return Ok(Self::root());
        }
        Ok(Self::parse(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_flatten() {
        let address = NamespaceAddress::parse("b.c1.cIn1");
        assert_eq!(address.segments, vec!["b", "c1"]);
        assert_eq!(address.symbol.as_deref(), Some("cIn1"));
        assert_eq!(address.to_flat_symbol(DEFAULT_SEPARATOR), "b_c1_cIn1");
        assert_eq!(address.to_string(), "b.c1.cIn1");
    }

    #[test]
    fn test_prefix_and_child() {
        let address = NamespaceAddress::local("V").prefix("c1").prefix("b");
        assert_eq!(address.to_string(), "b.c1.V");

        let sub = NamespaceAddress::root().child("b").child("c1");
        assert_eq!(sub, NamespaceAddress::subnode(&["b", "c1"]));
        assert_eq!(sub.with_symbol("V"), address);
    }

    #[test]
    fn test_split_first() {
        let address = NamespaceAddress::parse("b.c1.cIn1");
        let (head, rest) = address.split_first().unwrap();
        assert_eq!(head, "b");
        assert_eq!(rest.to_string(), "c1.cIn1");
        assert!(NamespaceAddress::local("x").split_first().is_none());
    }

    #[test]
    fn test_distinct_addresses_give_distinct_flat_symbols() {
        let addresses = ["a.b.x", "a.bx", "ab.x", "a.x", "x", "b.a.x"];
        let flat: std::collections::HashSet<String> = addresses
            .iter()
            .map(|a| NamespaceAddress::parse(a).to_flat_symbol(DEFAULT_SEPARATOR))
            .collect();
        assert_eq!(flat.len(), addresses.len());
    }
}
