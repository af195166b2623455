pub mod health;
pub mod jobs;
pub mod portfolio;
pub mod projections;
pub mod recommendations;
pub mod strategies;
