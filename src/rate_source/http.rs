use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{DefaultDirectRateLimiter, Quota};
use nonzero_ext::*;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::{LiquidityTier, MarketConditions, RateQuote, RateSource};
use crate::constants::RATE_SOURCE_REQUESTS_PER_SECOND;
use crate::error::SourceError;

struct SourceRateLimiter {
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl reqwest_ratelimit::RateLimiter for SourceRateLimiter {
    async fn acquire_permit(&self) {
        self.rate_limiter.until_ready().await;
    }
}

/// Client shared by the HTTP collaborators: hard per-request timeout plus a
/// per-host request quota. No retry layer, retries belong to the scheduler.
pub(crate) fn build_client(timeout: Duration) -> Result<ClientWithMiddleware, reqwest::Error> {
    let reqwest_client = reqwest::Client::builder().timeout(timeout).build()?;

    let per_second = NonZeroU32::new(RATE_SOURCE_REQUESTS_PER_SECOND).unwrap_or(nonzero!(1u32));
    let rate_limiter = SourceRateLimiter {
        rate_limiter: Arc::new(DefaultDirectRateLimiter::direct(Quota::per_second(per_second))),
    };

    Ok(ClientBuilder::new(reqwest_client)
        .with(reqwest_ratelimit::all(rate_limiter))
        .build())
}

/// `Url::join` drops the last path segment unless the base ends in `/`
pub(crate) fn as_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn classify(e: reqwest_middleware::Error) -> SourceError {
    match e {
        reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => SourceError::Timeout,
        other => SourceError::Unavailable(other.to_string()),
    }
}

pub(crate) async fn get_json<T: for<'de> Deserialize<'de>>(client: &ClientWithMiddleware, url: Url) -> Result<T, SourceError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(classify)?
        .error_for_status()
        .map_err(|e| SourceError::Unavailable(e.to_string()))?;
    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            SourceError::Timeout
        } else {
            SourceError::Unavailable(format!("malformed payload: {}", e))
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatePayload {
    #[serde(alias = "apy", alias = "rate_bps")]
    rate_bps: u32,
    #[serde(default)]
    liquidity: Option<String>,
    #[serde(default)]
    sampled_at: Option<DateTime<Utc>>,
}

/// Market API exposing `GET {base}/rates/{category}`
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    name: String,
    base_url: Url,
    categories: Option<HashSet<String>>,
    http_client: ClientWithMiddleware,
}

impl HttpRateSource {
    pub fn new(name: impl Into<String>, base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            name: name.into(),
            base_url: as_base(base_url),
            categories: None,
            http_client: build_client(timeout)?,
        })
    }

    /// Restricts the adapter to the listed categories. Without this it is
    /// asked about every category.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    fn rate_url(&self, category: &str) -> Result<Url, SourceError> {
        self.base_url
            .join(&format!("rates/{}", category))
            .map_err(|e| SourceError::Unavailable(format!("bad rate url: {}", e)))
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, category: &str) -> bool {
        self.categories.as_ref().is_none_or(|set| set.contains(category))
    }

    #[instrument(skip(self), fields(source = %self.name))]
    async fn fetch_rate(&self, category: &str) -> Result<RateQuote, SourceError> {
        let payload: RatePayload = get_json(&self.http_client, self.rate_url(category)?).await?;
        debug!(?payload, "Received rate quote");
        Ok(RateQuote {
            rate_bps: payload.rate_bps,
            liquidity: payload
                .liquidity
                .as_deref()
                .map(LiquidityTier::from_label)
                .unwrap_or(LiquidityTier::Low),
            sampled_at: payload.sampled_at.unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConditionsPayload {
    volatility_index: Decimal,
}

/// Market-conditions API exposing `GET {base}/market-conditions`
#[derive(Debug, Clone)]
pub struct HttpMarketConditions {
    url: Url,
    http_client: ClientWithMiddleware,
}

impl HttpMarketConditions {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let base_url = as_base(base_url);
        let url = base_url.join("market-conditions").unwrap_or(base_url);
        Ok(Self { url, http_client: build_client(timeout)? })
    }
}

#[async_trait]
impl MarketConditions for HttpMarketConditions {
    #[instrument(skip(self))]
    async fn volatility_index(&self) -> Result<Decimal, SourceError> {
        let payload: ConditionsPayload = get_json(&self.http_client, self.url.clone()).await?;
        Ok(payload.volatility_index)
    }
}
