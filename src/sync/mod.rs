//! Periodic refresh of strategy rates from the rate-source adapters.

pub mod synchronizer;

pub use synchronizer::{MergedRate, RateSynchronizer, SyncReport, SyncSettings, apply_volatility, merge_quotes};
