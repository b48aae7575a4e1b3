//! Heuristic values.
//!
//! Readability, SEO score, cost and savings are all derived from rules of
//! thumb rather than measured. Wrapping them keeps downstream consumers from
//! mistaking a placeholder for ground truth.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an [`Estimate`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateBasis {
    /// Text heuristic (syllable counts, keyword presence, ...).
    Heuristic,
    /// Token count times a fixed price table.
    PriceTable,
    /// Not computed; the value is a neutral default.
    Default,
}

/// A derived, non-measured value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate<T> {
    pub value: T,
    pub basis: EstimateBasis,
}

impl<T> Estimate<T> {
    pub fn heuristic(value: T) -> Self {
        Self {
            value,
            basis: EstimateBasis::Heuristic,
        }
    }

    pub fn priced(value: T) -> Self {
        Self {
            value,
            basis: EstimateBasis::PriceTable,
        }
    }

    pub fn default_value(value: T) -> Self {
        Self {
            value,
            basis: EstimateBasis::Default,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Estimate<U> {
        Estimate {
            value: f(self.value),
            basis: self.basis,
        }
    }
}

impl Estimate<f64> {
    pub fn zero_cost() -> Self {
        Self::priced(0.0)
    }
}

impl<T: fmt::Display> fmt::Display for Estimate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_keeps_basis_through_map() {
        let e = Estimate::heuristic(71.4_f64).map(|v| v.round() as u8);
        assert_eq!(e.value, 71);
        assert_eq!(e.basis, EstimateBasis::Heuristic);
        assert_eq!(e.to_string(), "~71");
    }

    #[test]
    fn test_estimate_serializes_with_basis() {
        let json = serde_json::to_value(Estimate::zero_cost()).unwrap();
        assert_eq!(json["value"], 0.0);
        assert_eq!(json["basis"], "price_table");
    }
}
