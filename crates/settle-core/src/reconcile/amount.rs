//! Amount comparison between a statement total and a bill payment
//!
//! Tolerances are the larger of a percentage of the bill and an absolute
//! floor, so small bills are not held to sub-cent precision and large bills
//! are not matched by a flat amount that would be meaningless at their scale.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Confidence tier of a statement-total vs bill comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    ExactMatch,
    HighConfidence,
    MediumConfidence,
    NoMatch,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactMatch => "exact_match",
            Self::HighConfidence => "high_confidence",
            Self::MediumConfidence => "medium_confidence",
            Self::NoMatch => "no_match",
        }
    }

    /// Whether a lone candidate in this tier may be linked without asking
    pub fn is_auto_linkable(&self) -> bool {
        !matches!(self, Self::NoMatch)
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            Self::ExactMatch | Self::HighConfidence => Confidence::High,
            Self::MediumConfidence => Confidence::Medium,
            Self::NoMatch => Confidence::Low,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse confidence surfaced to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Tolerance policy for tiering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tolerances {
    /// Fraction of the bill accepted as high confidence (0.005 = 0.5%)
    pub high_pct: Decimal,
    /// Absolute floor for high confidence
    pub high_floor: Decimal,
    /// Fraction of the bill accepted as medium confidence (0.02 = 2%)
    pub medium_pct: Decimal,
    /// Absolute floor for medium confidence
    pub medium_floor: Decimal,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            high_pct: dec!(0.005),
            high_floor: dec!(5.00),
            medium_pct: dec!(0.02),
            medium_floor: dec!(20.00),
        }
    }
}

/// Result of comparing a statement total against a bill amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountComparison {
    /// |cc_total - bill_amount|
    pub delta_abs: Decimal,
    /// delta_abs / bill_amount (0 when the bill is zero)
    pub delta_pct: Decimal,
    pub tier: Tier,
}

/// Compare a statement total with a bill amount and classify the difference
///
/// Signs are ignored; both sides are compared as magnitudes.
pub fn compare(cc_total: Decimal, bill_amount: Decimal, tolerances: &Tolerances) -> AmountComparison {
    let cc_total = cc_total.abs();
    let bill_amount = bill_amount.abs();
    let delta_abs = (cc_total - bill_amount).abs();

    if bill_amount.is_zero() {
        return AmountComparison {
            delta_abs,
            delta_pct: Decimal::ZERO,
            tier: Tier::NoMatch,
        };
    }

    let delta_pct = delta_abs / bill_amount;
    let high_limit = (bill_amount * tolerances.high_pct).max(tolerances.high_floor);
    let medium_limit = (bill_amount * tolerances.medium_pct).max(tolerances.medium_floor);

    let tier = if delta_abs.is_zero() {
        Tier::ExactMatch
    } else if delta_abs <= high_limit {
        Tier::HighConfidence
    } else if delta_abs <= medium_limit {
        Tier::MediumConfidence
    } else {
        Tier::NoMatch
    };

    AmountComparison {
        delta_abs,
        delta_pct,
        tier,
    }
}
