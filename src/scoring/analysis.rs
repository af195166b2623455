use rust_decimal::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::domain::{DepositPosition, RiskBand, Strategy};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl RiskDistribution {
    pub fn record(&mut self, band: RiskBand) {
        match band {
            RiskBand::Low => self.low += 1,
            RiskBand::Medium => self.medium += 1,
            RiskBand::High => self.high += 1,
        }
    }
}

/// Portfolio-level risk summary shown next to an owner's positions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    /// Band label of the principal-weighted risk, or "No data"
    pub risk_profile: String,
    pub risk_tolerance: u8,
    /// Principal-weighted risk level, two decimals
    pub average_risk: Decimal,
    /// Distinct strategies held over all known strategies, 0..=100
    pub diversification_percent: u8,
    pub strategies_used: usize,
    pub total_deposited: Decimal,
    pub risk_distribution: RiskDistribution,
    pub guidance: Vec<String>,
}

impl RiskAnalysis {
    /// Positions whose strategy is unknown count towards the total but not
    /// towards the weighted risk.
    pub fn analyze(positions: &[DepositPosition], strategies: &[Strategy], risk_tolerance: u8) -> Self {
        let open: Vec<&DepositPosition> = positions.iter().filter(|p| p.is_open()).collect();
        if open.is_empty() {
            return Self {
                risk_profile: "No data".to_string(),
                risk_tolerance,
                average_risk: Decimal::ZERO,
                diversification_percent: 0,
                strategies_used: 0,
                total_deposited: Decimal::ZERO,
                risk_distribution: RiskDistribution::default(),
                guidance: vec!["Start with a low-risk strategy to build experience".to_string()],
            };
        }

        let by_id: HashMap<i32, &Strategy> = strategies.iter().map(|s| (s.id, s)).collect();
        let total_deposited: Decimal = open.iter().map(|p| p.principal).sum();

        let mut weighted = Decimal::ZERO;
        let mut weighted_principal = Decimal::ZERO;
        let mut distribution = RiskDistribution::default();
        for position in &open {
            let Some(strategy) = by_id.get(&position.strategy_id) else {
                continue;
            };
            weighted += Decimal::from(strategy.risk_level) * position.principal;
            weighted_principal += position.principal;
            distribution.record(strategy.risk_band());
        }
        let average_risk = if weighted_principal.is_zero() {
            Decimal::ZERO
        } else {
            (weighted / weighted_principal).round_dp(2)
        };

        let used: BTreeSet<i32> = open.iter().map(|p| p.strategy_id).collect();
        let diversification = if strategies.is_empty() {
            100.0
        } else {
            (used.len() as f64 / strategies.len() as f64 * 100.0).min(100.0)
        };

        let rounded_risk = average_risk
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u8()
            .unwrap_or(0);
        let risk_profile = RiskBand::from_level(rounded_risk)
            .label()
            .to_string();

        Self {
            risk_profile,
            risk_tolerance,
            average_risk,
            diversification_percent: whole_percent(diversification),
            strategies_used: used.len(),
            total_deposited,
            risk_distribution: distribution,
            guidance: guidance(average_risk, diversification, risk_tolerance),
        }
    }
}

/// Rounds onto 0..=100; out-of-range input saturates instead of wrapping
fn whole_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn guidance(average_risk: Decimal, diversification: f64, risk_tolerance: u8) -> Vec<String> {
    let mut notes = Vec::new();
    if diversification < 30.0 {
        notes.push("Consider diversifying across more strategies to reduce risk");
    }
    if average_risk > Decimal::from(risk_tolerance) {
        notes.push("Your current portfolio exceeds your risk tolerance");
    }
    if average_risk < Decimal::from(3) {
        notes.push("You might benefit from slightly higher-yield strategies");
    } else if average_risk > Decimal::from(7) {
        notes.push("Consider balancing with some lower-risk strategies");
    }
    if notes.is_empty() {
        notes.push("Your portfolio is well-balanced");
    }
    notes.into_iter().map(String::from).collect()
}
