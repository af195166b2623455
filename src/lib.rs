pub mod config;
pub mod constants;
pub mod logging;
pub mod error;
pub mod domain;
pub mod db;
pub mod store;
pub mod ledger;
pub mod rate_source;
pub mod sync;
pub mod accrual;
pub mod scoring;
pub mod scheduler;
pub mod api;
pub mod app;
