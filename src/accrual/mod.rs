//! Time-based reward accrual over open deposit positions.

pub mod engine;
pub mod formula;
pub mod projection;

pub use engine::{AccrualEngine, AccrualReport, PositionOutcome, accrue_position};
pub use formula::{accrued_reward, preview_reward};
pub use projection::{RewardProjection, project_reward};
