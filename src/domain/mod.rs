pub mod strategy;
pub mod deposit;
pub mod profile;
pub mod recommendation;

pub use strategy::{RateSourceTag, RiskBand, Strategy, StrategyCategory};
pub use deposit::DepositPosition;
pub use profile::UserRiskProfile;
pub use recommendation::{ConfidenceBand, RecommendationResult};
