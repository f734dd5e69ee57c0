//! Resource quantities.
//!
//! Only as much of the Kubernetes quantity grammar as the provisioner needs:
//! a numeric value, so a request can be tested for positivity and summed.

use serde::{Deserialize, Serialize};

/// A resource quantity in its serialized form (`"4"`, `"500m"`, `"1Gi"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(String);

impl Quantity {
    /// Wrap a quantity string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, or `None` if the string is not a valid quantity.
    pub fn value(&self) -> Option<f64> {
        parse_quantity(self.0.trim())
    }

    /// True if the quantity parses and is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.value().is_some_and(|v| v > 0.0)
    }
}

impl From<&str> for Quantity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u32> for Quantity {
    fn from(n: u32) -> Self {
        Self::new(n.to_string())
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_quantity(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);

    let unsigned = number.strip_prefix(['+', '-']).unwrap_or(number);
    if unsigned.is_empty() || !unsigned.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if unsigned.contains(['+', '-']) {
        return None;
    }
    let base: f64 = number.parse().ok()?;

    Some(base * suffix_multiplier(suffix)?)
}

fn suffix_multiplier(suffix: &str) -> Option<f64> {
    let m = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024.0_f64.powi(2),
        "Gi" => 1024.0_f64.powi(3),
        "Ti" => 1024.0_f64.powi(4),
        "Pi" => 1024.0_f64.powi(5),
        "Ei" => 1024.0_f64.powi(6),
        exp => {
            let digits = exp.strip_prefix(['e', 'E'])?;
            let power: i32 = digits.parse().ok()?;
            10f64.powi(power)
        }
    };
    Some(m)
}
