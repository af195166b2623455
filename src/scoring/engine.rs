use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::{BPS_DENOMINATOR, RISK_TOLERANCE_MARGIN};
use crate::domain::{ConfidenceBand, RecommendationResult, Strategy, UserRiskProfile};

/// Which third factor is weighted alongside risk match and yield
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    /// Affordability of the intended amount
    #[default]
    Recommendation,
    /// Bonus for strategies the user does not hold yet
    Opportunity,
}

fn risk_match(risk_level: u8, risk_tolerance: u8) -> f64 {
    let distance = (i32::from(risk_level) - i32::from(risk_tolerance)).abs();
    (100.0 - f64::from(distance) * 10.0).max(0.0)
}

fn yield_score(rate_bps: u32) -> f64 {
    (f64::from(rate_bps) / 30.0).min(100.0)
}

fn affordability(intended_amount: Decimal, min_amount: Decimal) -> f64 {
    if intended_amount >= min_amount { 100.0 } else { 50.0 }
}

fn diversification_bonus(profile: &UserRiskProfile, strategy_id: i32) -> f64 {
    if profile.holds(strategy_id) { 0.0 } else { 20.0 }
}

/// Active and no riskier than tolerance plus the margin
pub fn is_eligible(profile: &UserRiskProfile, strategy: &Strategy) -> bool {
    strategy.active && strategy.risk_level <= profile.risk_tolerance.saturating_add(RISK_TOLERANCE_MARGIN)
}

/// Weighted score rounded half away from zero, always within 0..=100
pub fn score_strategy(profile: &UserRiskProfile, strategy: &Strategy, mode: ScoreMode) -> u8 {
    let third = match mode {
        ScoreMode::Recommendation => affordability(profile.intended_amount, strategy.min_amount),
        ScoreMode::Opportunity => diversification_bonus(profile, strategy.id),
    };
    let raw = risk_match(strategy.risk_level, profile.risk_tolerance) * 0.4
        + yield_score(strategy.rate_bps) * 0.4
        + third * 0.2;
    raw.round().clamp(0.0, 100.0) as u8
}

pub fn expected_annual_return(amount: Decimal, rate_bps: u32) -> Decimal {
    amount
        .checked_mul(Decimal::from(rate_bps))
        .map(|v| v / Decimal::from(BPS_DENOMINATOR))
        .unwrap_or(Decimal::ZERO)
}

/// Score descending, then lower risk, then lower id
pub fn rank(results: &mut [RecommendationResult]) {
    results.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.risk_level.cmp(&b.risk_level))
            .then_with(|| a.strategy_id.cmp(&b.strategy_id))
    });
}

pub(crate) fn to_result(profile: &UserRiskProfile, strategy: &Strategy, score: u8) -> RecommendationResult {
    RecommendationResult {
        strategy_id: strategy.id,
        strategy_name: strategy.name.clone(),
        risk_level: strategy.risk_level,
        score,
        confidence_band: ConfidenceBand::from_score(score),
        expected_annual_return: expected_annual_return(profile.intended_amount, strategy.rate_bps),
    }
}

/// Deterministic ranked recommendations. Needs nothing beyond the profile and
/// the strategy rows, so it always works standalone.
pub fn score(profile: &UserRiskProfile, strategies: &[Strategy], mode: ScoreMode) -> Vec<RecommendationResult> {
    let mut results: Vec<RecommendationResult> = strategies
        .iter()
        .filter(|s| is_eligible(profile, s))
        .map(|s| to_result(profile, s, score_strategy(profile, s, mode)))
        .collect();
    rank(&mut results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use crate::domain::DepositPosition;

    fn profile(tolerance: u8, amount: Decimal) -> UserRiskProfile {
        UserRiskProfile::derive("0xabc", Some(tolerance), amount, &[]).unwrap()
    }

    fn strategy(id: i32, rate_bps: u32, risk_level: u8, min: Decimal) -> Strategy {
        Strategy::new(id, format!("Strategy {id}"), rate_bps, risk_level, min, dec!(100000)).unwrap()
    }

    #[test]
    fn test_tolerance_filter_scenario() {
        let strategies = vec![strategy(1, 520, 2, dec!(10)), strategy(2, 2650, 8, dec!(100))];
        let results = score(&profile(5, dec!(50)), &strategies, ScoreMode::Recommendation);

        assert_eq!(results.len(), 1);
        let only = &results[0];
        assert_eq!(only.strategy_id, 1);
        // 70*0.4 + 17.33*0.4 + 100*0.2 = 54.93
        assert_eq!(only.score, 55);
        assert_eq!(only.confidence_band, ConfidenceBand::Low);
        assert_eq!(only.expected_annual_return, dec!(2.6));
    }

    #[test]
    fn test_unaffordable_strategy_scores_lower() {
        let cheap = strategy(1, 1200, 5, dec!(10));
        let pricey = strategy(2, 1200, 5, dec!(1000));
        let p = profile(5, dec!(100));
        // 100*0.4 + 40*0.4 + {100|50}*0.2
        assert_eq!(score_strategy(&p, &cheap, ScoreMode::Recommendation), 76);
        assert_eq!(score_strategy(&p, &pricey, ScoreMode::Recommendation), 66);
    }

    #[test]
    fn test_opportunity_mode_rewards_unheld_strategies() {
        let positions = vec![DepositPosition::open(1, "0xabc", 1, dec!(100), Utc::now()).unwrap()];
        let p = UserRiskProfile::derive("0xabc", Some(5), dec!(100), &positions).unwrap();
        let held = strategy(1, 1200, 5, dec!(10));
        let fresh = strategy(2, 1200, 5, dec!(10));

        assert_eq!(score_strategy(&p, &held, ScoreMode::Opportunity), 56);
        assert_eq!(score_strategy(&p, &fresh, ScoreMode::Opportunity), 60);
        // Same strategy, different third factor
        assert_ne!(
            score_strategy(&p, &held, ScoreMode::Opportunity),
            score_strategy(&p, &held, ScoreMode::Recommendation)
        );
    }

    #[test]
    fn test_scores_stay_in_bounds() {
        for tolerance in 1..=10u8 {
            for risk in 1..=10u8 {
                for rate in [0u32, 1, 299, 3000, 10_000, u32::MAX] {
                    let s = strategy(1, rate, risk, dec!(10));
                    for mode in [ScoreMode::Recommendation, ScoreMode::Opportunity] {
                        let value = score_strategy(&profile(tolerance, dec!(5)), &s, mode);
                        assert!(value <= 100);
                        let band = ConfidenceBand::from_score(value);
                        assert_eq!(band == ConfidenceBand::High, value >= 80);
                    }
                }
            }
        }
    }

    #[test]
    fn test_ties_break_by_risk_then_id() {
        // Risk 4 and 6 are equidistant from tolerance 5
        let strategies = vec![
            strategy(9, 900, 6, dec!(1)),
            strategy(3, 900, 4, dec!(1)),
            strategy(1, 900, 4, dec!(1)),
            strategy(2, 900, 4, dec!(1)).deactivated(),
        ];
        let p = profile(5, dec!(10));
        let first = score(&p, &strategies, ScoreMode::Recommendation);
        let ids: Vec<i32> = first.iter().map(|r| r.strategy_id).collect();
        assert_eq!(ids, vec![1, 3, 9]);

        let second = score(&p, &strategies, ScoreMode::Recommendation);
        assert_eq!(first, second);
    }
}
