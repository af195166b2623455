use std::sync::Arc;
use tracing::warn;

use crate::error::StoreError;
use crate::domain::DepositPosition;
use crate::ledger::{LedgerClient, seed_owner_if_cold};
use crate::scheduler::JobRegistry;
use crate::scoring::Recommender;
use crate::store::{DepositStore, StrategyStore};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub strategies: Arc<dyn StrategyStore>,
    pub deposits: Arc<dyn DepositStore>,
    /// Seeds an owner's positions on first read when the store has none
    pub ledger: Option<Arc<dyn LedgerClient>>,
    pub recommender: Recommender,
    pub scheduler: Arc<JobRegistry>,
}

impl AppState {
    /// Open positions for `owner_id`, importing them from the ledger first if
    /// the store has never seen this owner. Ledger trouble is logged, not
    /// surfaced.
    pub async fn owner_positions(&self, owner_id: &str) -> Result<Vec<DepositPosition>, StoreError> {
        if let Some(ledger) = &self.ledger {
            if let Err(e) = seed_owner_if_cold(ledger.as_ref(), self.deposits.as_ref(), owner_id).await {
                warn!(owner_id, error = %e, "Ledger import failed, serving stored positions only");
            }
        }
        self.deposits.load_positions_for_owner(owner_id).await
    }
}
