//! Persistence seam for strategy and deposit rows.
//!
//! Every row write is a single statement, so a row is never observed half
//! updated. Batches are continue-on-error: one failing row does not block its
//! siblings, and nothing already written is rolled back.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::domain::{DepositPosition, Strategy};
use crate::error::StoreError;

pub use memory::MemoryStore;

/// Bounds applied to batched writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistPolicy {
    pub row_timeout: Duration,
    /// Remaining rows are abandoned after this many failures in a row
    pub max_consecutive_failures: u32,
}

impl Default for PersistPolicy {
    fn default() -> Self {
        Self {
            row_timeout: Duration::from_secs(10),
            max_consecutive_failures: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchWriteReport {
    pub attempted: usize,
    pub written: Vec<i32>,
    pub failed: Vec<(i32, String)>,
    /// Failures where the store refused a single row (closed, regressed,
    /// invalid); these say nothing about storage availability
    pub row_rejections: usize,
    /// True when the batch was cut short by repeated failures
    pub aborted: bool,
}

impl BatchWriteReport {
    /// Nothing could be written and at least one row failed for a storage
    /// reason. A batch refused row by row is not an outage.
    pub fn is_total_outage(&self) -> bool {
        self.written.is_empty() && self.failed.len() > self.row_rejections
    }

    pub fn first_error(&self) -> String {
        self.failed
            .first()
            .map(|(_, reason)| reason.clone())
            .unwrap_or_default()
    }
}

/// Applies [`PersistPolicy`] to a sequence of row writes
pub struct BatchWriter<'p> {
    policy: &'p PersistPolicy,
    report: BatchWriteReport,
    consecutive_failures: u32,
}

impl<'p> BatchWriter<'p> {
    pub fn new(policy: &'p PersistPolicy, attempted: usize) -> Self {
        Self {
            policy,
            report: BatchWriteReport { attempted, ..Default::default() },
            consecutive_failures: 0,
        }
    }

    pub fn should_abort(&self) -> bool {
        self.consecutive_failures >= self.policy.max_consecutive_failures
    }

    pub async fn write<F>(&mut self, id: i32, write: F)
    where
        F: Future<Output = Result<(), StoreError>>,
    {
        let result = match tokio::time::timeout(self.policy.row_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.policy.row_timeout)),
        };
        match result {
            Ok(()) => {
                self.consecutive_failures = 0;
                self.report.written.push(id);
            }
            Err(e) if e.is_row_level() => {
                self.consecutive_failures = 0;
                self.report.row_rejections += 1;
                warn!(row_id = id, error = %e, "Row write rejected");
                self.report.failed.push((id, e.to_string()));
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(row_id = id, error = %e, "Row write failed");
                self.report.failed.push((id, e.to_string()));
            }
        }
    }

    pub fn abort_remaining(&mut self, ids: impl IntoIterator<Item = i32>) {
        self.report.aborted = true;
        let mut abandoned = 0;
        for id in ids {
            self.report.failed.push((id, "batch aborted after repeated failures".to_string()));
            abandoned += 1;
        }
        warn!(
            abandoned_rows = abandoned,
            consecutive_failures = self.consecutive_failures,
            "Aborting remaining batch after repeated write failures"
        );
    }

    pub fn finish(self) -> BatchWriteReport {
        self.report
    }
}

#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// All strategies, active or not
    async fn load_strategies(&self) -> Result<Vec<Strategy>, StoreError>;

    /// Insert or fully replace one strategy row
    async fn upsert_strategy(&self, strategy: &Strategy) -> Result<(), StoreError>;

    async fn upsert_strategies(&self, rows: &[Strategy], policy: &PersistPolicy) -> BatchWriteReport {
        let mut writer = BatchWriter::new(policy, rows.len());
        for (idx, row) in rows.iter().enumerate() {
            if writer.should_abort() {
                writer.abort_remaining(rows[idx..].iter().map(|s| s.id));
                break;
            }
            writer.write(row.id, self.upsert_strategy(row)).await;
        }
        writer.finish()
    }
}

#[async_trait]
pub trait DepositStore: Send + Sync {
    async fn load_open_positions(&self) -> Result<Vec<DepositPosition>, StoreError>;

    async fn load_positions_for_owner(&self, owner_id: &str) -> Result<Vec<DepositPosition>, StoreError>;

    /// Imports a position that is not yet known; existing ids are left untouched
    async fn insert_position(&self, position: &DepositPosition) -> Result<(), StoreError>;

    /// Writes reward fields. Rejected if the stored checkpoint is already
    /// later than the new one or the position has been closed.
    async fn update_accrual(&self, position: &DepositPosition) -> Result<(), StoreError>;

    async fn update_accruals(&self, rows: &[DepositPosition], policy: &PersistPolicy) -> BatchWriteReport {
        let mut writer = BatchWriter::new(policy, rows.len());
        for (idx, row) in rows.iter().enumerate() {
            if writer.should_abort() {
                writer.abort_remaining(rows[idx..].iter().map(|p| p.id));
                break;
            }
            writer.write(row.id, self.update_accrual(row)).await;
        }
        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    /// Delegates to a memory store but fails writes for chosen ids
    struct FlakyStore {
        inner: MemoryStore,
        failing: HashSet<i32>,
        rejecting: HashSet<i32>,
    }

    impl FlakyStore {
        fn new(failing: &[i32], rejecting: &[i32]) -> Self {
            Self {
                inner: MemoryStore::new(),
                failing: failing.iter().copied().collect(),
                rejecting: rejecting.iter().copied().collect(),
            }
        }
    }

    #[async_trait]
    impl StrategyStore for FlakyStore {
        async fn load_strategies(&self) -> Result<Vec<Strategy>, StoreError> {
            self.inner.load_strategies().await
        }

        async fn upsert_strategy(&self, strategy: &Strategy) -> Result<(), StoreError> {
            if self.failing.contains(&strategy.id) {
                return Err(StoreError::Timeout(Duration::from_secs(10)));
            }
            if self.rejecting.contains(&strategy.id) {
                return Err(StoreError::Rejected(format!("row {} locked", strategy.id)));
            }
            self.inner.upsert_strategy(strategy).await
        }
    }

    fn strategies(ids: &[i32]) -> Vec<Strategy> {
        ids.iter()
            .map(|&id| Strategy::new(id, format!("Strategy {id}"), 500, 3, dec!(1), dec!(10)).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_batch_continues_past_single_failure() {
        let store = FlakyStore::new(&[2], &[]);
        let report = store.upsert_strategies(&strategies(&[1, 2, 3]), &PersistPolicy::default()).await;

        assert_eq!(report.written, vec![1, 3]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 2);
        assert!(!report.aborted);
        assert!(!report.is_total_outage());
        assert_eq!(store.inner.load_strategies().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_aborts_after_consecutive_failures() {
        let store = FlakyStore::new(&[1, 2, 3, 4], &[]);
        let policy = PersistPolicy { max_consecutive_failures: 2, ..PersistPolicy::default() };
        let report = store.upsert_strategies(&strategies(&[1, 2, 3, 4, 5]), &policy).await;

        assert!(report.aborted);
        assert!(report.is_total_outage());
        // 1 and 2 attempted, 3..=5 abandoned without being tried
        let failed_ids: Vec<i32> = report.failed.iter().map(|(id, _)| *id).collect();
        assert_eq!(failed_ids, vec![1, 2, 3, 4, 5]);
        assert!(store.inner.load_strategies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_rows_are_not_an_outage() {
        let store = FlakyStore::new(&[], &[1, 2, 3, 4]);
        let policy = PersistPolicy { max_consecutive_failures: 2, ..PersistPolicy::default() };
        let report = store.upsert_strategies(&strategies(&[1, 2, 3, 4]), &policy).await;

        // Every row was tried; refusals do not trip the abort either
        assert!(!report.aborted);
        assert_eq!(report.row_rejections, 4);
        assert_eq!(report.failed.len(), 4);
        assert!(report.written.is_empty());
        assert!(!report.is_total_outage());
    }

    #[tokio::test]
    async fn test_storage_failures_alongside_rejections_are_an_outage() {
        let store = FlakyStore::new(&[2, 3], &[1]);
        let report = store.upsert_strategies(&strategies(&[1, 2, 3]), &PersistPolicy::default()).await;
        assert_eq!(report.row_rejections, 1);
        assert!(report.is_total_outage());
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_an_outage() {
        let store = MemoryStore::new();
        let report = store.upsert_strategies(&[], &PersistPolicy::default()).await;
        assert!(!report.is_total_outage());
    }
}
