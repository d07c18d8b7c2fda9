//! Configurable matching policy.
//!
//! The boundaries between matched, uncertain, and unmatched are product
//! decisions, not constants of the algorithm, so every threshold the
//! engine consults lives here and can be overridden per deployment.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::matching::tolerance::cent;

/// Thresholds and behavior switches for an engine run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Minimum accumulated score for a candidate to be retained as a
    /// match. The default of 10 equals the score of a single
    /// default-weight rule.
    pub match_threshold: u8,
    /// Tolerance for the full-amount check and aggregation sums
    pub amount_tolerance: BigDecimal,
    /// Tolerance for offsetting-pair amount comparison; the pair balance
    /// is checked strictly below this value
    pub inverse_tolerance: BigDecimal,
    /// Whether a run attempts many-to-one aggregation on its own, or only
    /// explicit manual linking may combine invoices
    pub auto_aggregate: bool,
    /// Invoice pool size up to which aggregation searches all subsets;
    /// larger pools switch to greedy accumulation
    pub exhaustive_aggregation_limit: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            match_threshold: 10,
            amount_tolerance: cent(),
            inverse_tolerance: cent(),
            auto_aggregate: true,
            exhaustive_aggregation_limit: 8,
        }
    }
}
