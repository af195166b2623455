use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::constants::DEFAULT_RISK_TOLERANCE;
use crate::error::DomainError;
use super::deposit::DepositPosition;

/// Per-request view of a user's risk posture. Derived from the latest
/// positions on every request and never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRiskProfile {
    pub owner_id: String,
    pub risk_tolerance: u8,
    pub intended_amount: Decimal,
    /// Distinct strategies over open positions, 0..=1
    pub diversification: f64,
    pub total_principal: Decimal,
    pub held_strategy_ids: BTreeSet<i32>,
}

impl UserRiskProfile {
    pub fn derive(
        owner_id: impl Into<String>,
        risk_tolerance: Option<u8>,
        intended_amount: Decimal,
        positions: &[DepositPosition],
    ) -> Result<Self, DomainError> {
        let risk_tolerance = risk_tolerance.unwrap_or(DEFAULT_RISK_TOLERANCE);
        if !(1..=10).contains(&risk_tolerance) {
            return Err(DomainError::OutOfRange {
                field: "risk_tolerance",
                detail: format!("{} not in 1..=10", risk_tolerance),
            });
        }
        if intended_amount < Decimal::ZERO {
            return Err(DomainError::OutOfRange {
                field: "intended_amount",
                detail: format!("{} is negative", intended_amount),
            });
        }

        let open: Vec<&DepositPosition> = positions
            .iter()
            .filter(|p| p.is_open() && p.principal > Decimal::ZERO)
            .collect();
        let held_strategy_ids: BTreeSet<i32> = open.iter().map(|p| p.strategy_id).collect();
        let total_principal: Decimal = open.iter().map(|p| p.principal).sum();
        let diversification = if open.is_empty() {
            0.0
        } else {
            held_strategy_ids.len() as f64 / open.len() as f64
        };

        Ok(Self {
            owner_id: owner_id.into(),
            risk_tolerance,
            intended_amount,
            diversification,
            total_principal,
            held_strategy_ids,
        })
    }

    pub fn holds(&self, strategy_id: i32) -> bool {
        self.held_strategy_ids.contains(&strategy_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn position(id: i32, strategy_id: i32, principal: Decimal) -> DepositPosition {
        DepositPosition::open(id, "0xabc", strategy_id, principal, Utc::now()).unwrap()
    }

    #[test]
    fn test_defaults_tolerance_when_unknown() {
        let profile = UserRiskProfile::derive("0xabc", None, dec!(100), &[]).unwrap();
        assert_eq!(profile.risk_tolerance, 5);
        assert_eq!(profile.diversification, 0.0);
        assert_eq!(profile.total_principal, Decimal::ZERO);
    }

    #[test]
    fn test_diversification_counts_distinct_open_strategies() {
        let mut closed = position(4, 3, dec!(10));
        closed.closed = true;
        let positions = vec![
            position(1, 1, dec!(100)),
            position(2, 1, dec!(50)),
            position(3, 2, dec!(25)),
            closed,
        ];
        let profile = UserRiskProfile::derive("0xabc", Some(7), dec!(10), &positions).unwrap();
        assert_eq!(profile.total_principal, dec!(175));
        assert!((profile.diversification - 2.0 / 3.0).abs() < 1e-12);
        assert!(profile.holds(1) && profile.holds(2) && !profile.holds(3));
    }

    #[test]
    fn test_rejects_invalid_tolerance() {
        assert!(UserRiskProfile::derive("0xabc", Some(0), dec!(10), &[]).is_err());
        assert!(UserRiskProfile::derive("0xabc", Some(11), dec!(10), &[]).is_err());
    }
}
