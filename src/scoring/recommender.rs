use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};
use url::Url;

use super::engine::{ScoreMode, is_eligible, rank, score, to_result};
use crate::domain::{RecommendationResult, Strategy, UserRiskProfile};
use crate::error::RecommenderError;
use crate::rate_source::http::{as_base, build_client};

/// One strategy score proposed by the advanced recommender
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedPick {
    pub strategy_id: i32,
    pub score: f64,
}

#[async_trait]
pub trait AdvancedRecommender: Send + Sync {
    async fn recommend(
        &self,
        profile: &UserRiskProfile,
        strategies: &[Strategy],
        mode: ScoreMode,
    ) -> Result<Vec<AdvancedPick>, RecommenderError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendRequest<'a> {
    profile: &'a UserRiskProfile,
    strategies: &'a [Strategy],
    mode: ScoreMode,
}

#[derive(Deserialize)]
struct RecommendResponse {
    recommendations: Vec<AdvancedPick>,
}

/// External model service exposing `POST {base}/recommend`
#[derive(Debug, Clone)]
pub struct HttpRecommender {
    url: Url,
    http_client: ClientWithMiddleware,
}

impl HttpRecommender {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let base_url = as_base(base_url);
        let url = base_url.join("recommend").unwrap_or(base_url);
        Ok(Self { url, http_client: build_client(timeout)? })
    }
}

#[async_trait]
impl AdvancedRecommender for HttpRecommender {
    #[instrument(skip_all, fields(owner_id = %profile.owner_id))]
    async fn recommend(
        &self,
        profile: &UserRiskProfile,
        strategies: &[Strategy],
        mode: ScoreMode,
    ) -> Result<Vec<AdvancedPick>, RecommenderError> {
        let response = self
            .http_client
            .post(self.url.clone())
            .json(&RecommendRequest { profile, strategies, mode })
            .send()
            .await
            .map_err(|e| RecommenderError::Unreachable(e.to_string()))?
            .error_for_status()
            .map_err(|e| RecommenderError::Unreachable(e.to_string()))?;
        let body: RecommendResponse = response
            .json()
            .await
            .map_err(|e| RecommenderError::BadResponse(e.to_string()))?;
        Ok(body.recommendations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    Advanced,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub source: RecommendationSource,
    pub results: Vec<RecommendationResult>,
}

/// Front door for scoring: the advanced recommender when configured and
/// healthy, the heuristic engine otherwise.
#[derive(Clone, Default)]
pub struct Recommender {
    advanced: Option<Arc<dyn AdvancedRecommender>>,
}

impl Recommender {
    pub fn heuristic() -> Self {
        Self::default()
    }

    pub fn with_advanced(advanced: Arc<dyn AdvancedRecommender>) -> Self {
        Self { advanced: Some(advanced) }
    }

    pub async fn recommend(
        &self,
        profile: &UserRiskProfile,
        strategies: &[Strategy],
        mode: ScoreMode,
    ) -> Recommendations {
        if let Some(advanced) = &self.advanced {
            match advanced.recommend(profile, strategies, mode).await {
                Ok(picks) => match sanitize(profile, strategies, picks) {
                    Some(results) => {
                        return Recommendations { source: RecommendationSource::Advanced, results };
                    }
                    None => warn!(owner_id = %profile.owner_id, "Advanced recommender returned no usable picks, using heuristic"),
                },
                Err(e) => warn!(owner_id = %profile.owner_id, error = %e, "Advanced recommender failed, using heuristic"),
            }
        }
        Recommendations {
            source: RecommendationSource::Heuristic,
            results: score(profile, strategies, mode),
        }
    }
}

/// Drops picks for unknown or ineligible strategies and duplicates, clamps
/// scores, recomputes bands and re-ranks. `None` when nothing usable is left
/// but the heuristic would have produced results.
fn sanitize(
    profile: &UserRiskProfile,
    strategies: &[Strategy],
    picks: Vec<AdvancedPick>,
) -> Option<Vec<RecommendationResult>> {
    let eligible: HashMap<i32, &Strategy> = strategies
        .iter()
        .filter(|s| is_eligible(profile, s))
        .map(|s| (s.id, s))
        .collect();
    let mut seen = HashSet::new();
    let mut results: Vec<RecommendationResult> = picks
        .into_iter()
        .filter(|pick| pick.score.is_finite() && seen.insert(pick.strategy_id))
        .filter_map(|pick| {
            let strategy = eligible.get(&pick.strategy_id)?;
            let score = pick.score.round().clamp(0.0, 100.0) as u8;
            Some(to_result(profile, strategy, score))
        })
        .collect();

    if results.is_empty() && !eligible.is_empty() {
        return None;
    }
    rank(&mut results);
    Some(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfidenceBand;
    use rust_decimal_macros::dec;

    struct Scripted(Result<Vec<AdvancedPick>, fn() -> RecommenderError>);

    #[async_trait]
    impl AdvancedRecommender for Scripted {
        async fn recommend(
            &self,
            _profile: &UserRiskProfile,
            _strategies: &[Strategy],
            _mode: ScoreMode,
        ) -> Result<Vec<AdvancedPick>, RecommenderError> {
            self.0.clone().map_err(|make| make())
        }
    }

    fn strategies() -> Vec<Strategy> {
        vec![
            Strategy::new(1, "Stable Earn", 520, 2, dec!(10), dec!(10000)).unwrap(),
            Strategy::new(2, "Growth Plus", 1180, 5, dec!(50), dec!(50000)).unwrap(),
            Strategy::new(3, "High Yield Pro", 2650, 8, dec!(100), dec!(100000)).unwrap(),
        ]
    }

    fn profile() -> UserRiskProfile {
        UserRiskProfile::derive("0xabc", Some(5), dec!(500), &[]).unwrap()
    }

    #[test]
    fn test_http_recommender_keeps_base_path() {
        let timeout = Duration::from_secs(1);
        let nested = HttpRecommender::new(Url::parse("http://ml.internal:9000/api").unwrap(), timeout).unwrap();
        assert_eq!(nested.url.as_str(), "http://ml.internal:9000/api/recommend");

        let slashed = HttpRecommender::new(Url::parse("http://ml.internal:9000/api/").unwrap(), timeout).unwrap();
        assert_eq!(slashed.url.as_str(), "http://ml.internal:9000/api/recommend");

        let root = HttpRecommender::new(Url::parse("http://ml.internal:9000").unwrap(), timeout).unwrap();
        assert_eq!(root.url.as_str(), "http://ml.internal:9000/recommend");
    }

    fn pick(strategy_id: i32, score: f64) -> AdvancedPick {
        AdvancedPick { strategy_id, score }
    }

    #[tokio::test]
    async fn test_without_advanced_uses_heuristic() {
        let out = Recommender::heuristic().recommend(&profile(), &strategies(), ScoreMode::Recommendation).await;
        assert_eq!(out.source, RecommendationSource::Heuristic);
        assert_eq!(out.results, score(&profile(), &strategies(), ScoreMode::Recommendation));
    }

    #[tokio::test]
    async fn test_unreachable_advanced_falls_back() {
        let advanced = Scripted(Err(|| RecommenderError::Unreachable("connection refused".to_string())));
        let out = Recommender::with_advanced(Arc::new(advanced))
            .recommend(&profile(), &strategies(), ScoreMode::Recommendation)
            .await;
        assert_eq!(out.source, RecommendationSource::Heuristic);
        assert_eq!(out.results.len(), 2);
    }

    #[tokio::test]
    async fn test_advanced_output_is_sanitized() {
        let advanced = Scripted(Ok(vec![
            pick(1, 250.0),
            pick(2, 61.4),
            pick(3, 99.0), // filtered by tolerance
            pick(42, 90.0), // unknown
            pick(1, 10.0), // duplicate
            pick(2, f64::NAN),
        ]));
        let out = Recommender::with_advanced(Arc::new(advanced))
            .recommend(&profile(), &strategies(), ScoreMode::Recommendation)
            .await;

        assert_eq!(out.source, RecommendationSource::Advanced);
        let summary: Vec<(i32, u8, ConfidenceBand)> =
            out.results.iter().map(|r| (r.strategy_id, r.score, r.confidence_band)).collect();
        assert_eq!(summary, vec![(1, 100, ConfidenceBand::High), (2, 61, ConfidenceBand::Medium)]);
    }

    #[tokio::test]
    async fn test_empty_advanced_output_falls_back() {
        let advanced = Scripted(Ok(vec![pick(42, 90.0)]));
        let out = Recommender::with_advanced(Arc::new(advanced))
            .recommend(&profile(), &strategies(), ScoreMode::Opportunity)
            .await;
        assert_eq!(out.source, RecommendationSource::Heuristic);
    }
}
