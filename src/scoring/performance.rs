use rust_decimal::prelude::*;
use serde::Serialize;

use super::analysis::RiskDistribution;
use crate::domain::{Strategy, StrategyCategory};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyPerformance {
    pub id: i32,
    pub name: String,
    pub rate_bps: u32,
    pub risk_level: u8,
    /// Rate earned per unit of risk, one decimal
    pub performance: Decimal,
    pub classification: StrategyCategory,
    pub active: bool,
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    /// Best performance first
    pub strategies: Vec<StrategyPerformance>,
    /// Mean over active strategies, whole bps
    pub average_rate_bps: u32,
    pub active_strategies: usize,
    /// Highest-performing active strategy
    pub best_performer: Option<StrategyPerformance>,
    pub risk_distribution: RiskDistribution,
}

/// `rate_bps / risk_level`, rounded half away from zero to one decimal
pub fn performance_score(rate_bps: u32, risk_level: u8) -> Decimal {
    if risk_level == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(rate_bps) / Decimal::from(risk_level))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Ranks every strategy by performance. Ties go to the lower risk level,
/// then the lower id.
pub fn summarize(strategies: &[Strategy]) -> PerformanceSummary {
    let mut ranked: Vec<StrategyPerformance> = strategies
        .iter()
        .map(|s| StrategyPerformance {
            id: s.id,
            name: s.name.clone(),
            rate_bps: s.rate_bps,
            risk_level: s.risk_level,
            performance: performance_score(s.rate_bps, s.risk_level),
            classification: s.classification(),
            active: s.active,
            stale: s.rate_source.is_stale(),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.performance
            .cmp(&a.performance)
            .then(a.risk_level.cmp(&b.risk_level))
            .then(a.id.cmp(&b.id))
    });

    let mut risk_distribution = RiskDistribution::default();
    for strategy in strategies {
        risk_distribution.record(strategy.risk_band());
    }

    let active: Vec<&Strategy> = strategies.iter().filter(|s| s.active).collect();
    let average_rate_bps = if active.is_empty() {
        0
    } else {
        let total: Decimal = active.iter().map(|s| Decimal::from(s.rate_bps)).sum();
        (total / Decimal::from(active.len()))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
            .unwrap_or(0)
    };

    PerformanceSummary {
        best_performer: ranked.iter().find(|p| p.active).cloned(),
        strategies: ranked,
        average_rate_bps,
        active_strategies: active.len(),
        risk_distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn strategies() -> Vec<Strategy> {
        vec![
            Strategy::new(1, "Stable Earn", 520, 2, dec!(10), dec!(10000)).unwrap(),
            Strategy::new(2, "Growth Plus", 1180, 5, dec!(50), dec!(50000)).unwrap(),
            Strategy::new(3, "High Yield Pro", 2650, 8, dec!(100), dec!(100000)).unwrap(),
        ]
    }

    #[test]
    fn test_performance_score_rounds_to_one_decimal() {
        assert_eq!(performance_score(520, 2), dec!(260));
        assert_eq!(performance_score(1180, 5), dec!(236));
        assert_eq!(performance_score(2650, 8), dec!(331.3));
        assert_eq!(performance_score(1000, 3), dec!(333.3));
    }

    #[test]
    fn test_summary_ranks_and_tallies() {
        let summary = summarize(&strategies());

        let order: Vec<i32> = summary.strategies.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert_eq!(summary.best_performer.as_ref().map(|p| p.id), Some(3));
        assert_eq!(summary.strategies[0].classification, StrategyCategory::Aggressive);
        // (520 + 1180 + 2650) / 3 = 1450
        assert_eq!(summary.average_rate_bps, 1450);
        assert_eq!(summary.active_strategies, 3);
        assert_eq!(summary.risk_distribution, RiskDistribution { low: 1, medium: 1, high: 1 });
    }

    #[test]
    fn test_inactive_strategies_are_listed_but_not_best() {
        let mut rows = strategies();
        rows[2] = rows[2].clone().deactivated();
        let summary = summarize(&rows);

        assert_eq!(summary.strategies.len(), 3);
        assert_eq!(summary.strategies[0].id, 3);
        assert!(!summary.strategies[0].active);
        assert_eq!(summary.best_performer.as_ref().map(|p| p.id), Some(1));
        assert_eq!(summary.average_rate_bps, 850);
        assert_eq!(summary.risk_distribution.high, 1);
    }

    #[test]
    fn test_equal_performance_prefers_lower_risk() {
        let rows = vec![
            Strategy::new(7, "Twin B", 1000, 4, dec!(1), dec!(10)).unwrap(),
            Strategy::new(5, "Twin A", 500, 2, dec!(1), dec!(10)).unwrap(),
        ];
        let order: Vec<i32> = summarize(&rows).strategies.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![5, 7]);
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert!(summary.strategies.is_empty());
        assert!(summary.best_performer.is_none());
        assert_eq!(summary.average_rate_bps, 0);
    }
}
