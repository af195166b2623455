use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::{HIGH_CONFIDENCE_SCORE, MEDIUM_CONFIDENCE_SCORE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    pub fn from_score(score: u8) -> Self {
        if score >= HIGH_CONFIDENCE_SCORE {
            ConfidenceBand::High
        } else if score >= MEDIUM_CONFIDENCE_SCORE {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Transient, per-request scoring output. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    pub strategy_id: i32,
    pub strategy_name: String,
    pub risk_level: u8,
    /// 0..=100
    pub score: u8,
    pub confidence_band: ConfidenceBand,
    pub expected_annual_return: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_band_cutoffs() {
        assert_eq!(ConfidenceBand::from_score(100), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_score(80), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_score(79), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_score(60), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_score(59), ConfidenceBand::Low);
        assert_eq!(ConfidenceBand::from_score(0), ConfidenceBand::Low);
    }
}
