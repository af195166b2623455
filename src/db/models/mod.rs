pub mod strategies;
pub mod deposit_positions;
