use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Where a strategy's current rate came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RateSourceTag {
    /// Accepted from the named rate-source adapter
    Adapter(String),
    /// Seeded from the ledger, never refreshed by an adapter
    Fallback,
    /// Every adapter failed on the last sync; previous rate retained
    Stale,
}

impl RateSourceTag {
    pub fn as_str(&self) -> &str {
        match self {
            RateSourceTag::Adapter(name) => name,
            RateSourceTag::Fallback => "fallback",
            RateSourceTag::Stale => "stale",
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, RateSourceTag::Stale)
    }
}

impl From<String> for RateSourceTag {
    fn from(value: String) -> Self {
        match value.as_str() {
            "fallback" => RateSourceTag::Fallback,
            "stale" => RateSourceTag::Stale,
            _ => RateSourceTag::Adapter(value),
        }
    }
}

impl From<RateSourceTag> for String {
    fn from(value: RateSourceTag) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RateSourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_level(risk_level: u8) -> Self {
        match risk_level {
            0..=3 => RiskBand::Low,
            4..=6 => RiskBand::Medium,
            _ => RiskBand::High,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskBand::Low => "Low Risk",
            RiskBand::Medium => "Medium Risk",
            RiskBand::High => "High Risk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyCategory {
    Conservative,
    Balanced,
    Aggressive,
    Custom,
}

impl StrategyCategory {
    pub fn classify(rate_bps: u32, risk_level: u8) -> Self {
        if rate_bps < 800 && risk_level <= 3 {
            StrategyCategory::Conservative
        } else if (800..1500).contains(&rate_bps) && risk_level <= 6 {
            StrategyCategory::Balanced
        } else if rate_bps >= 1500 {
            StrategyCategory::Aggressive
        } else {
            StrategyCategory::Custom
        }
    }
}

/// A yield-bearing product. Never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: i32,
    pub name: String,
    /// Routing key for rate-source adapters, e.g. "stableearn"
    pub category: String,
    pub rate_bps: u32,
    pub risk_level: u8,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub active: bool,
    pub rate_source: RateSourceTag,
    pub rate_updated_at: DateTime<Utc>,
}

impl Strategy {
    /// Active strategy seeded with a fallback-tagged rate
    pub fn new(
        id: i32,
        name: impl Into<String>,
        rate_bps: u32,
        risk_level: u8,
        min_amount: Decimal,
        max_amount: Decimal,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        let strategy = Self {
            id,
            category: derive_category(&name),
            name,
            rate_bps,
            risk_level,
            min_amount,
            max_amount,
            active: true,
            rate_source: RateSourceTag::Fallback,
            rate_updated_at: Utc::now(),
        };
        strategy.validate()?;
        Ok(strategy)
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        if !category.trim().is_empty() {
            self.category = category;
        }
        self
    }

    pub fn with_rate(mut self, rate_bps: u32, source: RateSourceTag, updated_at: DateTime<Utc>) -> Self {
        self.rate_bps = rate_bps;
        self.rate_source = source;
        self.rate_updated_at = updated_at;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Empty("strategy name"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::Empty("strategy category"));
        }
        if !(1..=10).contains(&self.risk_level) {
            return Err(DomainError::OutOfRange {
                field: "risk_level",
                detail: format!("{} not in 1..=10", self.risk_level),
            });
        }
        if self.min_amount < Decimal::ZERO {
            return Err(DomainError::OutOfRange {
                field: "min_amount",
                detail: format!("{} is negative", self.min_amount),
            });
        }
        if self.min_amount > self.max_amount {
            return Err(DomainError::AmountBounds { min: self.min_amount, max: self.max_amount });
        }
        Ok(())
    }

    pub fn risk_band(&self) -> RiskBand {
        RiskBand::from_level(self.risk_level)
    }

    pub fn classification(&self) -> StrategyCategory {
        StrategyCategory::classify(self.rate_bps, self.risk_level)
    }

    /// e.g. 520 bps -> "5.20%"
    pub fn rate_formatted(&self) -> String {
        let percent = Decimal::from(self.rate_bps) / Decimal::from(100);
        format!("{:.2}%", percent)
    }
}

/// "High Yield Pro" -> "highyieldpro"
pub fn derive_category(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_strategy_derives_category() {
        let strategy = Strategy::new(3, "High Yield Pro", 2650, 8, dec!(100), dec!(100000)).unwrap();
        assert_eq!(strategy.category, "highyieldpro");
        assert_eq!(strategy.rate_source, RateSourceTag::Fallback);
        assert!(strategy.active);
    }

    #[test]
    fn test_rejects_inverted_amount_bounds() {
        let err = Strategy::new(1, "Stable Earn", 520, 2, dec!(100), dec!(10)).unwrap_err();
        assert_eq!(err, DomainError::AmountBounds { min: dec!(100), max: dec!(10) });
    }

    #[test]
    fn test_rejects_risk_level_out_of_range() {
        assert!(Strategy::new(1, "Stable Earn", 520, 0, dec!(10), dec!(100)).is_err());
        assert!(Strategy::new(1, "Stable Earn", 520, 11, dec!(10), dec!(100)).is_err());
    }

    #[test]
    fn test_rate_source_tag_string_roundtrip() {
        assert_eq!(RateSourceTag::from("stale".to_string()), RateSourceTag::Stale);
        assert_eq!(RateSourceTag::from("fallback".to_string()), RateSourceTag::Fallback);
        assert_eq!(
            RateSourceTag::from("compound".to_string()),
            RateSourceTag::Adapter("compound".to_string())
        );
        let json = serde_json::to_string(&RateSourceTag::Stale).unwrap();
        assert_eq!(json, "\"stale\"");
    }

    #[test]
    fn test_classification_and_formatting() {
        let stable = Strategy::new(1, "Stable Earn", 520, 2, dec!(10), dec!(10000)).unwrap();
        assert_eq!(stable.classification(), StrategyCategory::Conservative);
        assert_eq!(stable.rate_formatted(), "5.20%");
        assert_eq!(stable.risk_band(), RiskBand::Low);

        let growth = Strategy::new(2, "Growth Plus", 1180, 5, dec!(50), dec!(50000)).unwrap();
        assert_eq!(growth.classification(), StrategyCategory::Balanced);
        assert_eq!(growth.risk_band(), RiskBand::Medium);

        assert_eq!(StrategyCategory::classify(2650, 8), StrategyCategory::Aggressive);
        assert_eq!(StrategyCategory::classify(900, 9), StrategyCategory::Custom);
    }
}
