//! Risk-adjusted strategy scoring, the optional advanced recommender,
//! portfolio risk analysis and strategy performance ranking.

pub mod analysis;
pub mod engine;
pub mod performance;
pub mod recommender;

pub use analysis::{RiskAnalysis, RiskDistribution};
pub use engine::{ScoreMode, expected_annual_return, is_eligible, rank, score, score_strategy};
pub use performance::{PerformanceSummary, StrategyPerformance, performance_score, summarize};
pub use recommender::{
    AdvancedPick, AdvancedRecommender, HttpRecommender, RecommendationSource, Recommendations, Recommender,
};
