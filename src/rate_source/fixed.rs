use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{LiquidityTier, MarketConditions, RateQuote, RateSource};
use crate::constants::NEUTRAL_VOLATILITY_INDEX;
use crate::error::SourceError;

/// In-process adapter serving configured quotes. Used when no market API is
/// configured and as a deterministic collaborator in tests.
#[derive(Debug)]
pub struct FixedRateSource {
    name: String,
    quotes: HashMap<String, (u32, LiquidityTier)>,
    failure: Option<SourceError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FixedRateSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quotes: HashMap::new(),
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_quote(mut self, category: impl Into<String>, rate_bps: u32, liquidity: LiquidityTier) -> Self {
        self.quotes.insert(category.into(), (rate_bps, liquidity));
        self
    }

    /// Every fetch returns `error`
    pub fn failing(mut self, error: SourceError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Sleeps before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for FixedRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, category: &str) -> bool {
        self.failure.is_some() || self.quotes.contains_key(category)
    }

    async fn fetch_rate(&self, category: &str) -> Result<RateQuote, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let (rate_bps, liquidity) = self
            .quotes
            .get(category)
            .copied()
            .ok_or_else(|| SourceError::Unavailable(format!("no quote for {}", category)))?;
        Ok(RateQuote { rate_bps, liquidity, sampled_at: Utc::now() })
    }
}

/// Reference quotes for the three seeded strategy categories
pub fn dev_sources() -> Vec<Arc<dyn RateSource>> {
    vec![
        Arc::new(FixedRateSource::new("compound").with_quote("stableearn", 500, LiquidityTier::High)),
        Arc::new(FixedRateSource::new("uniswap").with_quote("growthplus", 1200, LiquidityTier::Medium)),
        Arc::new(FixedRateSource::new("curve").with_quote("highyieldpro", 2500, LiquidityTier::Medium)),
    ]
}

#[derive(Debug, Clone)]
pub struct FixedMarketConditions {
    index: Result<Decimal, SourceError>,
}

impl FixedMarketConditions {
    pub fn new(index: Decimal) -> Self {
        Self { index: Ok(index) }
    }

    pub fn failing(error: SourceError) -> Self {
        Self { index: Err(error) }
    }
}

impl Default for FixedMarketConditions {
    fn default() -> Self {
        Self::new(Decimal::from(NEUTRAL_VOLATILITY_INDEX))
    }
}

#[async_trait]
impl MarketConditions for FixedMarketConditions {
    async fn volatility_index(&self) -> Result<Decimal, SourceError> {
        self.index.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_source_quotes_known_categories_only() {
        let source = FixedRateSource::new("compound").with_quote("stableearn", 500, LiquidityTier::High);
        assert!(source.supports("stableearn"));
        assert!(!source.supports("growthplus"));

        let quote = source.fetch_rate("stableearn").await.unwrap();
        assert_eq!(quote.rate_bps, 500);
        assert!(matches!(source.fetch_rate("growthplus").await, Err(SourceError::Unavailable(_))));
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_dev_sources_cover_seeded_categories() {
        let sources = dev_sources();
        for category in ["stableearn", "growthplus", "highyieldpro"] {
            assert_eq!(sources.iter().filter(|s| s.supports(category)).count(), 1);
        }
    }
}
