//! Job registry owning the cadence of the background jobs.
//!
//! Each job is single-flight: a trigger that arrives while the previous run is
//! still going is dropped and counted, never queued.

pub mod job;
pub mod registry;
pub mod tasks;

pub use job::{JobRunStatus, JobStatusView, ScheduledTask, TriggerOutcome};
pub use registry::JobRegistry;
pub use tasks::{AccrualTask, RateSyncTask};
