use dotenvy::dotenv;
use eyre::{Result, WrapErr, eyre};
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// A named HTTP rate source, configured as `name=url`
#[derive(Debug, Clone, PartialEq)]
pub struct RateEndpoint {
    pub name: String,
    pub base_url: Url,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub ledger_seed_path: PathBuf,
    pub rate_endpoints: Vec<RateEndpoint>,
    pub market_conditions_url: Option<Url>,
    pub advanced_recommender_url: Option<Url>,
    pub adapter_timeout: Duration,
    pub persist_timeout: Duration,
    pub persist_max_consecutive_failures: u32,
    pub rate_sync_interval: Duration,
    pub accrual_interval: Duration,
    pub max_rate_bps: u32,
    pub api_bind_addr: SocketAddr,
}

impl Config {
    /// Loads `.env` (if present) and reads the process environment
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let ledger_seed_path = lookup("LEDGER_SEED_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/ledger_seed.json"));

        let rate_endpoints = match lookup("RATE_SOURCE_ENDPOINTS") {
            Some(raw) => parse_endpoints(&raw)?,
            None => Vec::new(),
        };

        let market_conditions_url = parse_optional_url(&lookup, "MARKET_CONDITIONS_URL")?;
        let advanced_recommender_url = parse_optional_url(&lookup, "ADVANCED_RECOMMENDER_URL")?;

        let max_rate_bps: u32 = parse_or(&lookup, "MAX_RATE_BPS", 10_000)?;
        let persist_max_consecutive_failures: u32 = parse_or(&lookup, "PERSIST_MAX_CONSECUTIVE_FAILURES", 3)?;
        if persist_max_consecutive_failures == 0 {
            return Err(eyre!("PERSIST_MAX_CONSECUTIVE_FAILURES must be at least 1"));
        }

        Ok(Config {
            database_url,
            ledger_seed_path,
            rate_endpoints,
            market_conditions_url,
            advanced_recommender_url,
            adapter_timeout: Duration::from_secs(parse_or(&lookup, "ADAPTER_TIMEOUT_SECS", 8)?),
            persist_timeout: Duration::from_secs(parse_or(&lookup, "PERSIST_TIMEOUT_SECS", 10)?),
            persist_max_consecutive_failures,
            rate_sync_interval: Duration::from_secs(parse_or(&lookup, "RATE_SYNC_INTERVAL_SECS", 300)?),
            accrual_interval: Duration::from_secs(parse_or(&lookup, "ACCRUAL_INTERVAL_SECS", 3600)?),
            max_rate_bps,
            api_bind_addr: parse_or(&lookup, "API_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| eyre!("Invalid {} value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_optional_url<F>(lookup: &F, key: &str) -> Result<Option<Url>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => Url::parse(raw.trim())
            .map(Some)
            .wrap_err_with(|| format!("Invalid {} value '{}'", key, raw)),
        None => Ok(None),
    }
}

fn parse_endpoints(raw: &str) -> Result<Vec<RateEndpoint>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, url) = entry
                .split_once('=')
                .ok_or_else(|| eyre!("Rate source entry '{}' must look like name=url", entry))?;
            let base_url = Url::parse(url.trim())
                .wrap_err_with(|| format!("Invalid URL for rate source '{}'", name))?;
            Ok(RateEndpoint { name: name.trim().to_string(), base_url })
        })
        .collect()
}
