//! Rate-source adapters and the market-conditions collaborator.
//!
//! Adapters are pure fetches: they never retry and never let a transport or
//! parsing fault escape, every failure comes back as a [`SourceError`].

pub mod fixed;
pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_VOLATILITY_INDEX, NEUTRAL_VOLATILITY_INDEX, VOLATILITY_SCALE};
use crate::error::SourceError;

pub use fixed::{FixedMarketConditions, FixedRateSource};
pub use http::{HttpMarketConditions, HttpRateSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidityTier {
    High,
    Medium,
    Low,
}

impl LiquidityTier {
    /// Weight of a quote in the liquidity-weighted average
    pub fn weight(&self) -> u32 {
        match self {
            LiquidityTier::High => 3,
            LiquidityTier::Medium => 2,
            LiquidityTier::Low => 1,
        }
    }

    /// Unknown labels count as the thinnest tier
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => LiquidityTier::High,
            "medium" => LiquidityTier::Medium,
            _ => LiquidityTier::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateQuote {
    pub rate_bps: u32,
    pub liquidity: LiquidityTier,
    pub sampled_at: DateTime<Utc>,
}

#[async_trait]
pub trait RateSource: Send + Sync {
    /// Name written into `Strategy.rate_source` when this adapter dominates
    fn name(&self) -> &str;

    /// Whether this adapter quotes the given strategy category
    fn supports(&self, category: &str) -> bool;

    async fn fetch_rate(&self, category: &str) -> Result<RateQuote, SourceError>;
}

#[async_trait]
pub trait MarketConditions: Send + Sync {
    /// Market volatility on a 0..=100 scale
    async fn volatility_index(&self) -> Result<Decimal, SourceError>;
}

/// Multiplier applied to accepted rates. 1.0 at the neutral index, falling as
/// volatility rises, bounded to 0.5..=1.5.
pub fn volatility_multiplier(index: Decimal) -> Decimal {
    let index = index.clamp(Decimal::ZERO, Decimal::from(MAX_VOLATILITY_INDEX));
    let shift = (index - Decimal::from(NEUTRAL_VOLATILITY_INDEX)) / Decimal::from(VOLATILITY_SCALE);
    (Decimal::ONE - shift).clamp(Decimal::new(5, 1), Decimal::new(15, 1))
}
