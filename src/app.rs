//! Composition root: wires stores, collaborators, engines and jobs from a
//! [`Config`].

use eyre::{Result, WrapErr};
use std::sync::Arc;
use tracing::{info, warn};

use crate::accrual::AccrualEngine;
use crate::api::AppState;
use crate::config::Config;
use crate::constants::{ACCRUAL_JOB, RATE_SYNC_JOB};
use crate::db::db_manager::DbManager;
use crate::ledger::{FileLedger, LedgerClient, seed_strategies_if_cold};
use crate::rate_source::fixed::dev_sources;
use crate::rate_source::{FixedMarketConditions, HttpMarketConditions, HttpRateSource, MarketConditions, RateSource};
use crate::scheduler::{AccrualTask, JobRegistry, RateSyncTask};
use crate::scoring::{HttpRecommender, Recommender};
use crate::store::{DepositStore, MemoryStore, PersistPolicy, StrategyStore};
use crate::sync::{RateSynchronizer, SyncSettings};

pub struct Services {
    pub state: Arc<AppState>,
    pub scheduler: Arc<JobRegistry>,
}

pub async fn build(cfg: &Config) -> Result<Services> {
    let persist = PersistPolicy {
        row_timeout: cfg.persist_timeout,
        max_consecutive_failures: cfg.persist_max_consecutive_failures,
    };

    let (strategies, deposits): (Arc<dyn StrategyStore>, Arc<dyn DepositStore>) = match &cfg.database_url {
        Some(url) => {
            let db = Arc::new(
                DbManager::init(url, cfg.persist_timeout)
                    .await
                    .wrap_err("Failed to initialize database")?,
            );
            info!("Using Postgres store");
            (db.clone() as Arc<dyn StrategyStore>, db as Arc<dyn DepositStore>)
        }
        None => {
            let memory = Arc::new(MemoryStore::new());
            info!("DATABASE_URL not set, using in-memory store");
            (memory.clone() as Arc<dyn StrategyStore>, memory as Arc<dyn DepositStore>)
        }
    };

    let ledger: Option<Arc<dyn LedgerClient>> = if cfg.ledger_seed_path.exists() {
        Some(Arc::new(FileLedger::load_from_file(&cfg.ledger_seed_path)?))
    } else {
        warn!(path = %cfg.ledger_seed_path.display(), "Ledger seed file not found, cold stores stay empty");
        None
    };
    if let Some(ledger) = &ledger {
        let seeded = seed_strategies_if_cold(ledger.as_ref(), strategies.as_ref(), &persist)
            .await
            .wrap_err("Failed to seed strategies from ledger")?;
        info!(seeded, "Strategy store ready");
    }

    let sources: Vec<Arc<dyn RateSource>> = if cfg.rate_endpoints.is_empty() {
        info!("No rate source endpoints configured, using fixed reference quotes");
        dev_sources()
    } else {
        cfg.rate_endpoints
            .iter()
            .map(|endpoint| {
                HttpRateSource::new(endpoint.name.clone(), endpoint.base_url.clone(), cfg.adapter_timeout)
                    .map(|source| Arc::new(source) as Arc<dyn RateSource>)
                    .wrap_err_with(|| format!("Failed to build rate source {}", endpoint.name))
            })
            .collect::<Result<_>>()?
    };

    let market: Arc<dyn MarketConditions> = match &cfg.market_conditions_url {
        Some(url) => Arc::new(HttpMarketConditions::new(url.clone(), cfg.adapter_timeout)?),
        None => Arc::new(FixedMarketConditions::default()),
    };

    let recommender = match &cfg.advanced_recommender_url {
        Some(url) => Recommender::with_advanced(Arc::new(HttpRecommender::new(url.clone(), cfg.adapter_timeout)?)),
        None => Recommender::heuristic(),
    };

    let synchronizer = RateSynchronizer::new(
        strategies.clone(),
        sources,
        market,
        SyncSettings { adapter_timeout: cfg.adapter_timeout, max_rate_bps: cfg.max_rate_bps, persist },
    );
    info!(sources = ?synchronizer.source_names(), "Rate synchronizer ready");
    let accrual = AccrualEngine::new(deposits.clone(), strategies.clone(), persist);

    let mut registry = JobRegistry::new();
    registry.register(RATE_SYNC_JOB, cfg.rate_sync_interval, Arc::new(RateSyncTask(Arc::new(synchronizer))))?;
    registry.register(ACCRUAL_JOB, cfg.accrual_interval, Arc::new(AccrualTask(Arc::new(accrual))))?;
    let scheduler = Arc::new(registry);

    let state = Arc::new(AppState {
        strategies,
        deposits,
        ledger,
        recommender,
        scheduler: scheduler.clone(),
    });
    Ok(Services { state, scheduler })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RateSourceTag;
    use crate::scheduler::JobRunStatus;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(move |key| map.get(key).cloned()).unwrap()
    }

    #[tokio::test]
    async fn test_build_in_memory_from_seed_file() {
        let services = build(&config(&[("LEDGER_SEED_PATH", "data/ledger_seed.json")])).await.unwrap();
        assert_eq!(services.scheduler.job_names(), vec![ACCRUAL_JOB, RATE_SYNC_JOB]);

        let seeded = services.state.strategies.load_strategies().await.unwrap();
        assert_eq!(seeded.len(), 3);
        assert!(seeded.iter().all(|s| s.rate_source == RateSourceTag::Fallback));

        services.scheduler.run_once(RATE_SYNC_JOB).await.unwrap();
        assert_eq!(
            services.scheduler.job_status(RATE_SYNC_JOB).unwrap().last_status,
            Some(JobRunStatus::Success)
        );
        let refreshed = services.state.strategies.load_strategies().await.unwrap();
        let stable = refreshed.iter().find(|s| s.id == 1).unwrap();
        assert_eq!(stable.rate_bps, 500);
        assert_eq!(stable.rate_source, RateSourceTag::Adapter("compound".to_string()));
    }

    #[tokio::test]
    async fn test_build_without_seed_file() {
        let services = build(&config(&[("LEDGER_SEED_PATH", "does/not/exist.json")])).await.unwrap();
        assert!(services.state.ledger.is_none());
        assert!(services.state.strategies.load_strategies().await.unwrap().is_empty());
    }
}
