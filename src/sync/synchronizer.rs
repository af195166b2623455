use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::{RateSourceTag, Strategy};
use crate::error::{CoreError, Degradation, SourceError};
use crate::rate_source::{MarketConditions, RateQuote, RateSource, volatility_multiplier};
use crate::store::{PersistPolicy, StrategyStore};

const MARKET_CONDITIONS_SOURCE: &str = "market_conditions";

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    /// Upper bound on a single adapter call
    pub adapter_timeout: Duration,
    /// Accepted rates are clamped into `0..=max_rate_bps`
    pub max_rate_bps: u32,
    pub persist: PersistPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            adapter_timeout: Duration::from_secs(8),
            max_rate_bps: 10_000,
            persist: PersistPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub volatility_multiplier: Decimal,
    /// Strategies that received a fresh adapter rate
    pub updated: Vec<i32>,
    /// Strategies whose every adapter failed; prior rate retained
    pub stale: Vec<i32>,
    /// Strategies whose row write failed, with the reason
    pub failed: Vec<(i32, String)>,
    pub degradations: Vec<Degradation>,
}

impl SyncReport {
    pub fn degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Liquidity-weighted average of the successful quotes for one category
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRate {
    pub average_bps: Decimal,
    /// Adapter with the heaviest liquidity weight; earliest registered wins ties
    pub dominant: String,
    pub contributors: usize,
}

/// Quotes must be in adapter registration order for the tie-break to hold.
pub fn merge_quotes(quotes: &[(String, RateQuote)]) -> Option<MergedRate> {
    let mut weighted_sum = Decimal::ZERO;
    let mut total_weight = Decimal::ZERO;
    let mut dominant: Option<(&str, u32)> = None;

    for (name, quote) in quotes {
        let weight = quote.liquidity.weight();
        weighted_sum += Decimal::from(quote.rate_bps) * Decimal::from(weight);
        total_weight += Decimal::from(weight);
        if dominant.is_none_or(|(_, best)| weight > best) {
            dominant = Some((name, weight));
        }
    }

    let (dominant, _) = dominant?;
    if total_weight.is_zero() {
        return None;
    }
    Some(MergedRate {
        average_bps: weighted_sum / total_weight,
        dominant: dominant.to_string(),
        contributors: quotes.len(),
    })
}

/// Scales a merged rate and clamps it into the accepted range
pub fn apply_volatility(average_bps: Decimal, multiplier: Decimal, max_rate_bps: u32) -> u32 {
    let scaled = average_bps
        .checked_mul(multiplier)
        .unwrap_or(Decimal::MAX)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    scaled
        .clamp(Decimal::ZERO, Decimal::from(max_rate_bps))
        .to_u32()
        .unwrap_or(max_rate_bps)
}

struct CategoryOutcome {
    category: String,
    merged: Option<MergedRate>,
    failures: Vec<(String, SourceError)>,
}

pub struct RateSynchronizer {
    strategies: Arc<dyn StrategyStore>,
    sources: Vec<Arc<dyn RateSource>>,
    market: Arc<dyn MarketConditions>,
    settings: SyncSettings,
}

impl RateSynchronizer {
    pub fn new(
        strategies: Arc<dyn StrategyStore>,
        sources: Vec<Arc<dyn RateSource>>,
        market: Arc<dyn MarketConditions>,
        settings: SyncSettings,
    ) -> Self {
        Self { strategies, sources, market, settings }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Refreshes the rate of every active strategy.
    ///
    /// Adapter failures degrade the report but never fail the run. Not
    /// reentrant: callers must not overlap two runs (the job registry
    /// guarantees this).
    #[instrument(skip(self), fields(sources = self.sources.len()))]
    pub async fn sync_all(&self) -> Result<SyncReport, CoreError> {
        let started_at = Utc::now();
        let mut degradations = Vec::new();

        let mut by_category: BTreeMap<String, Vec<Strategy>> = BTreeMap::new();
        for strategy in self.strategies.load_strategies().await? {
            if strategy.active {
                by_category.entry(strategy.category.clone()).or_default().push(strategy);
            }
        }

        let multiplier = match self.fetch_volatility().await {
            Ok(index) => volatility_multiplier(index),
            Err(e) => {
                warn!(error = %e, "Market conditions unavailable, using neutral volatility multiplier");
                degradations.push(Degradation::SourceUnavailable {
                    category: MARKET_CONDITIONS_SOURCE.to_string(),
                    source: MARKET_CONDITIONS_SOURCE.to_string(),
                    reason: e.to_string(),
                });
                Decimal::ONE
            }
        };

        let outcomes = join_all(by_category.keys().map(|category| self.fetch_category(category))).await;

        let now = Utc::now();
        let mut rows = Vec::new();
        let mut updated = Vec::new();
        let mut stale = Vec::new();

        for outcome in outcomes {
            for (source, error) in &outcome.failures {
                degradations.push(Degradation::SourceUnavailable {
                    category: outcome.category.clone(),
                    source: source.clone(),
                    reason: error.to_string(),
                });
            }
            let Some(strategies) = by_category.remove(&outcome.category) else {
                continue;
            };
            match &outcome.merged {
                Some(merged) => {
                    let accepted = apply_volatility(merged.average_bps, multiplier, self.settings.max_rate_bps);
                    debug!(
                        category = %outcome.category,
                        average_bps = %merged.average_bps,
                        accepted,
                        dominant = %merged.dominant,
                        "Accepted merged rate"
                    );
                    for strategy in strategies {
                        updated.push(strategy.id);
                        rows.push(strategy.with_rate(accepted, RateSourceTag::Adapter(merged.dominant.clone()), now));
                    }
                }
                None => {
                    warn!(category = %outcome.category, "No rate source succeeded, keeping previous rates");
                    for strategy in strategies {
                        degradations.push(Degradation::StaleData {
                            strategy_id: strategy.id,
                            category: outcome.category.clone(),
                        });
                        stale.push(strategy.id);
                        let (rate, updated_at) = (strategy.rate_bps, strategy.rate_updated_at);
                        rows.push(strategy.with_rate(rate, RateSourceTag::Stale, updated_at));
                    }
                }
            }
        }

        let report = self.strategies.upsert_strategies(&rows, &self.settings.persist).await;
        if report.is_total_outage() {
            return Err(CoreError::PersistenceOutage {
                attempted: report.attempted,
                first_error: report.first_error(),
            });
        }
        for (id, reason) in &report.failed {
            degradations.push(Degradation::PersistenceFailure { id: *id, reason: reason.clone() });
        }
        let failed = report.failed;
        updated.retain(|id| !failed.iter().any(|(failed_id, _)| failed_id == id));
        stale.retain(|id| !failed.iter().any(|(failed_id, _)| failed_id == id));

        let sync_report = SyncReport {
            started_at,
            finished_at: Utc::now(),
            volatility_multiplier: multiplier,
            updated,
            stale,
            failed,
            degradations,
        };
        info!(
            updated = sync_report.updated.len(),
            stale = sync_report.stale.len(),
            failed = sync_report.failed.len(),
            multiplier = %multiplier,
            "Rate sync finished"
        );
        Ok(sync_report)
    }

    async fn fetch_volatility(&self) -> Result<Decimal, SourceError> {
        match tokio::time::timeout(self.settings.adapter_timeout, self.market.volatility_index()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout),
        }
    }

    async fn fetch_category(&self, category: &str) -> CategoryOutcome {
        let timeout = self.settings.adapter_timeout;
        let supporting: Vec<&Arc<dyn RateSource>> =
            self.sources.iter().filter(|s| s.supports(category)).collect();

        let results = join_all(supporting.iter().map(|source| async move {
            let result = match tokio::time::timeout(timeout, source.fetch_rate(category)).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout),
            };
            (source.name().to_string(), result)
        }))
        .await;

        let mut quotes = Vec::new();
        let mut failures = Vec::new();
        for (name, result) in results {
            match result {
                Ok(quote) => quotes.push((name, quote)),
                Err(e) => {
                    warn!(category, source = %name, error = %e, "Rate source failed");
                    failures.push((name, e));
                }
            }
        }

        CategoryOutcome {
            category: category.to_string(),
            merged: merge_quotes(&quotes),
            failures,
        }
    }
}
