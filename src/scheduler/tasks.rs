use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use tracing::warn;

use super::job::ScheduledTask;
use crate::accrual::AccrualEngine;
use crate::sync::RateSynchronizer;

pub struct RateSyncTask(pub Arc<RateSynchronizer>);

#[async_trait]
impl ScheduledTask for RateSyncTask {
    async fn run(&self) -> eyre::Result<()> {
        let report = self.0.sync_all().await?;
        if report.degraded() {
            warn!(
                degradations = report.degradations.len(),
                stale = ?report.stale,
                failed = ?report.failed,
                "Rate sync completed in degraded mode"
            );
        }
        Ok(())
    }
}

pub struct AccrualTask(pub Arc<AccrualEngine>);

#[async_trait]
impl ScheduledTask for AccrualTask {
    async fn run(&self) -> eyre::Result<()> {
        // Whole seconds, so no sub-second reward is lost when the checkpoint moves
        let now = Utc::now().trunc_subsecs(0);
        let report = self.0.accrue(now).await?;
        if !report.degradations.is_empty() {
            warn!(
                flagged = ?report.flagged,
                skipped = ?report.skipped,
                failed = ?report.failed,
                "Accrual completed with degradations"
            );
        }
        Ok(())
    }
}
