//! Read-only ledger collaborator used to seed a cold store.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::domain::{DepositPosition, Strategy};
use crate::error::{CoreError, DomainError, LedgerError};
use crate::store::{DepositStore, PersistPolicy, StrategyStore};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStrategy {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(alias = "apy")]
    pub rate_bps: u32,
    pub risk_level: u8,
    pub min_deposit: Decimal,
    pub max_deposit: Decimal,
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDeposit {
    pub id: i32,
    pub strategy_id: i32,
    pub amount: Decimal,
    /// Unix seconds
    pub deposit_time: i64,
    /// Unix seconds of the last reward checkpoint
    pub last_reward_time: i64,
    #[serde(default)]
    pub accumulated_rewards: Decimal,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn get_all_strategies(&self) -> Result<Vec<LedgerStrategy>, LedgerError>;
    async fn get_user_deposits(&self, owner_id: &str) -> Result<Vec<LedgerDeposit>, LedgerError>;
}

#[derive(Debug, Deserialize)]
struct LedgerSnapshot {
    strategies: Vec<LedgerStrategy>,
    #[serde(default)]
    deposits: HashMap<String, Vec<LedgerDeposit>>,
}

/// Ledger snapshot loaded from a JSON file
#[derive(Debug, Default)]
pub struct FileLedger {
    strategies: Vec<LedgerStrategy>,
    deposits: HashMap<String, Vec<LedgerDeposit>>,
}

impl FileLedger {
    #[instrument]
    pub fn load_from_file(path: &Path) -> Result<Self, LedgerError> {
        let file_content = fs::read_to_string(path)
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        let ledger = Self::from_json(&file_content)?;
        info!(
            strategy_count = ledger.strategies.len(),
            owner_count = ledger.deposits.len(),
            "Ledger snapshot loaded from file"
        );
        Ok(ledger)
    }

    pub fn from_json(raw: &str) -> Result<Self, LedgerError> {
        let snapshot: LedgerSnapshot =
            serde_json::from_str(raw).map_err(|e| LedgerError::Malformed(e.to_string()))?;
        Ok(Self {
            strategies: snapshot.strategies,
            deposits: snapshot.deposits,
        })
    }
}

#[async_trait]
impl LedgerClient for FileLedger {
    async fn get_all_strategies(&self) -> Result<Vec<LedgerStrategy>, LedgerError> {
        Ok(self.strategies.clone())
    }

    async fn get_user_deposits(&self, owner_id: &str) -> Result<Vec<LedgerDeposit>, LedgerError> {
        Ok(self.deposits.get(owner_id).cloned().unwrap_or_default())
    }
}

impl LedgerStrategy {
    pub fn to_strategy(&self, seeded_at: DateTime<Utc>) -> Result<Strategy, DomainError> {
        let mut strategy = Strategy::new(
            self.id,
            self.name.clone(),
            self.rate_bps,
            self.risk_level,
            self.min_deposit,
            self.max_deposit,
        )?;
        if let Some(category) = &self.category {
            strategy = strategy.with_category(category.clone());
        }
        if !self.active {
            strategy = strategy.deactivated();
        }
        strategy.rate_updated_at = seeded_at;
        Ok(strategy)
    }
}

impl LedgerDeposit {
    /// `None` for withdrawn (zero-amount) deposits
    pub fn to_position(&self, owner_id: &str) -> Result<Option<DepositPosition>, DomainError> {
        if self.amount <= Decimal::ZERO {
            return Ok(None);
        }
        let opened_at = unix_to_utc(self.deposit_time)?;
        let checkpoint = unix_to_utc(self.last_reward_time)?.max(opened_at);
        let position = DepositPosition::open(self.id, owner_id, self.strategy_id, self.amount, opened_at)?
            .with_checkpoint(checkpoint, self.accumulated_rewards)?;
        Ok(Some(position))
    }
}

fn unix_to_utc(seconds: i64) -> Result<DateTime<Utc>, DomainError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| DomainError::OutOfRange {
            field: "timestamp",
            detail: format!("{} is not a valid unix time", seconds),
        })
}

/// Seeds strategies from the ledger when the store has none. Returns the
/// number of strategies written.
#[instrument(skip_all)]
pub async fn seed_strategies_if_cold(
    ledger: &dyn LedgerClient,
    store: &dyn StrategyStore,
    policy: &PersistPolicy,
) -> Result<usize, CoreError> {
    if !store.load_strategies().await?.is_empty() {
        debug!("Strategy store already populated, skipping ledger seed");
        return Ok(0);
    }

    let seeded_at = Utc::now();
    let strategies: Vec<Strategy> = ledger
        .get_all_strategies()
        .await?
        .iter()
        .filter_map(|s| {
            s.to_strategy(seeded_at)
                .map_err(|e| warn!(strategy_id = s.id, error = %e, "Skipping invalid ledger strategy"))
                .ok()
        })
        .collect();

    let report = store.upsert_strategies(&strategies, policy).await;
    if report.is_total_outage() {
        return Err(CoreError::PersistenceOutage {
            attempted: report.attempted,
            first_error: report.first_error(),
        });
    }
    info!(
        seeded = report.written.len(),
        failed = report.failed.len(),
        "Seeded strategies from ledger"
    );
    Ok(report.written.len())
}

/// Imports an owner's deposits from the ledger when the store holds none for
/// that owner. Returns the number of positions imported.
#[instrument(skip(ledger, store))]
pub async fn seed_owner_if_cold(
    ledger: &dyn LedgerClient,
    store: &dyn DepositStore,
    owner_id: &str,
) -> Result<usize, CoreError> {
    if !store.load_positions_for_owner(owner_id).await?.is_empty() {
        return Ok(0);
    }

    let mut imported = 0;
    for deposit in ledger.get_user_deposits(owner_id).await? {
        let position = match deposit.to_position(owner_id) {
            Ok(Some(position)) => position,
            Ok(None) => continue,
            Err(e) => {
                warn!(position_id = deposit.id, error = %e, "Skipping invalid ledger deposit");
                continue;
            }
        };
        match store.insert_position(&position).await {
            Ok(()) => imported += 1,
            Err(e) => warn!(position_id = position.id, error = %e, "Failed to import ledger deposit"),
        }
    }
    if imported > 0 {
        info!(imported, "Imported owner deposits from ledger");
    }
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RateSourceTag;
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    const SNAPSHOT: &str = r#"{
        "strategies": [
            {"id": 1, "name": "Stable Earn", "apy": 520, "riskLevel": 2,
             "minDeposit": "10.000000", "maxDeposit": "10000.000000", "active": true},
            {"id": 2, "name": "Growth Plus", "apy": 1180, "riskLevel": 5,
             "minDeposit": "50", "maxDeposit": "50000", "active": false},
            {"id": 9, "name": "Broken", "apy": 100, "riskLevel": 2,
             "minDeposit": "500", "maxDeposit": "5", "active": true}
        ],
        "deposits": {
            "0xabc": [
                {"id": 10, "strategyId": 1, "amount": "1000.000000", "depositTime": 1735689600,
                 "lastRewardTime": 1735693200, "accumulatedRewards": "5.234567"},
                {"id": 11, "strategyId": 1, "amount": "0", "depositTime": 1735689600,
                 "lastRewardTime": 1735689600}
            ]
        }
    }"#;

    #[tokio::test]
    async fn test_seeds_valid_strategies_once() {
        let ledger = FileLedger::from_json(SNAPSHOT).unwrap();
        let store = MemoryStore::new();

        let seeded = seed_strategies_if_cold(&ledger, &store, &PersistPolicy::default()).await.unwrap();
        assert_eq!(seeded, 2);

        let strategies = store.load_strategies().await.unwrap();
        assert!(strategies.iter().all(|s| s.rate_source == RateSourceTag::Fallback));
        assert!(!strategies.iter().find(|s| s.id == 2).unwrap().active);

        // Warm store is left alone
        let seeded_again = seed_strategies_if_cold(&ledger, &store, &PersistPolicy::default()).await.unwrap();
        assert_eq!(seeded_again, 0);
    }

    #[tokio::test]
    async fn test_imports_owner_positions_skipping_withdrawn() {
        let ledger = FileLedger::from_json(SNAPSHOT).unwrap();
        let store = MemoryStore::new();
        seed_strategies_if_cold(&ledger, &store, &PersistPolicy::default()).await.unwrap();

        let imported = seed_owner_if_cold(&ledger, &store, "0xabc").await.unwrap();
        assert_eq!(imported, 1);

        let positions = store.load_positions_for_owner("0xabc").await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].principal, dec!(1000));
        assert_eq!(positions[0].accumulated_reward, dec!(5.234567));
        assert_eq!(positions[0].last_checkpoint.timestamp(), 1735693200);

        assert_eq!(seed_owner_if_cold(&ledger, &store, "0xabc").await.unwrap(), 0);
        assert_eq!(seed_owner_if_cold(&ledger, &store, "0xnobody").await.unwrap(), 0);
    }

    #[test]
    fn test_rejects_malformed_snapshot() {
        assert!(matches!(FileLedger::from_json("{\"nope\": 1}"), Err(LedgerError::Malformed(_))));
    }
}
