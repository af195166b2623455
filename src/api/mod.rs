//! HTTP boundary over the stores, the recommender and the job registry.

pub mod error;
pub mod handlers;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use handlers::{health, jobs, portfolio, projections, recommendations, strategies};

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/strategies", get(strategies::list_strategies))
        .route("/api/v1/strategies/performance", get(strategies::strategy_performance))
        .route("/api/v1/recommendations", post(recommendations::create_recommendations))
        .route("/api/v1/portfolio/{owner_id}", get(portfolio::get_portfolio))
        .route("/api/v1/projections", post(projections::create_projection))
        .route("/api/v1/jobs", get(jobs::list_jobs))
        .route("/api/v1/jobs/{name}/trigger", post(jobs::trigger_job))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `shutdown` flips to true
pub async fn serve(state: Arc<AppState>, addr: SocketAddr, mut shutdown: watch::Receiver<bool>) -> eyre::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;
    info!("API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration as ChronoDuration, Utc};
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::domain::{RateSourceTag, Strategy};
    use crate::ledger::{FileLedger, LedgerClient};
    use crate::scheduler::{JobRegistry, ScheduledTask};
    use crate::scoring::Recommender;
    use crate::store::{MemoryStore, StrategyStore};

    struct NoopTask;

    #[async_trait]
    impl ScheduledTask for NoopTask {
        async fn run(&self) -> eyre::Result<()> {
            Ok(())
        }
    }

    fn ledger_json() -> String {
        let opened = (Utc::now() - ChronoDuration::days(2)).timestamp();
        let checkpoint = (Utc::now() - ChronoDuration::days(1)).timestamp();
        json!({
            "strategies": [],
            "deposits": {
                "0xabc": [
                    {"id": 1, "strategyId": 2, "amount": "1000", "depositTime": opened,
                     "lastRewardTime": checkpoint, "accumulatedRewards": "0.5"},
                    {"id": 2, "strategyId": 1, "amount": "200", "depositTime": opened,
                     "lastRewardTime": opened}
                ]
            }
        })
        .to_string()
    }

    async fn test_state() -> Arc<AppState> {
        let store = Arc::new(MemoryStore::new());
        let rows = [
            Strategy::new(1, "Stable Earn", 520, 2, dec!(10), dec!(10000)).unwrap(),
            Strategy::new(2, "Growth Plus", 1180, 5, dec!(50), dec!(50000)).unwrap(),
            Strategy::new(3, "High Yield Pro", 2650, 8, dec!(100), dec!(100000)).unwrap(),
        ];
        for row in rows {
            let row = if row.id == 2 {
                let rate = row.rate_bps;
                let at = row.rate_updated_at;
                row.with_rate(rate, RateSourceTag::Stale, at)
            } else {
                row
            };
            store.upsert_strategy(&row).await.unwrap();
        }

        let ledger: Arc<dyn LedgerClient> = Arc::new(FileLedger::from_json(&ledger_json()).unwrap());
        let mut registry = JobRegistry::new();
        registry.register("rate_sync", Duration::from_secs(300), Arc::new(NoopTask)).unwrap();

        Arc::new(AppState {
            strategies: store.clone(),
            deposits: store,
            ledger: Some(ledger),
            recommender: Recommender::heuristic(),
            scheduler: Arc::new(registry),
        })
    }

    async fn send(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_jobs() {
        let (status, body) = send(test_state().await, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["jobs"]["rate_sync"]["lastStatus"].is_null());
    }

    #[tokio::test]
    async fn test_strategies_are_annotated() {
        let (status, body) = send(test_state().await, get("/api/v1/strategies")).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["name"], "Stable Earn");
        assert_eq!(rows[0]["rateFormatted"], "5.20%");
        assert_eq!(rows[0]["riskText"], "Low Risk");
        assert_eq!(rows[0]["rateSource"], "fallback");
        assert_eq!(rows[0]["stale"], false);
        assert_eq!(rows[1]["rateSource"], "stale");
        assert_eq!(rows[1]["stale"], true);
        assert!(rows[0]["rateUpdatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_strategy_performance_ranking() {
        let (status, body) = send(test_state().await, get("/api/v1/strategies/performance")).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = body["strategies"].as_array().unwrap().iter().map(|p| p["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(body["strategies"][0]["classification"], "Aggressive");
        assert_eq!(body["strategies"][2]["stale"], true);
        assert_eq!(body["bestPerformer"]["id"], 3);
        assert_eq!(body["averageRateBps"], 1450);
        assert_eq!(body["riskDistribution"], json!({"low": 1, "medium": 1, "high": 1}));
    }

    #[tokio::test]
    async fn test_projection_uses_accrual_formula() {
        let state = test_state().await;
        let (status, body) = send(
            state.clone(),
            post_json("/api/v1/projections", json!({"strategyId": 1, "amount": "1000"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["durationDays"], 30);
        assert_eq!(body["rateBps"], 520);
        let expected = crate::accrual::accrued_reward(dec!(1000), 520, dec!(2592000)).unwrap();
        assert_eq!(body["projectedReward"], json!(expected.to_string()));
        assert_eq!(body["stale"], false);

        let (status, body) = send(
            state.clone(),
            post_json("/api/v1/projections", json!({"strategyId": 2, "amount": "50", "durationDays": 365})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stale"], true);
    }

    #[tokio::test]
    async fn test_projection_validation() {
        let state = test_state().await;
        let (status, body) = send(
            state.clone(),
            post_json("/api/v1/projections", json!({"strategyId": 42, "amount": "10"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        for request in [
            json!({"strategyId": 1, "amount": "0"}),
            json!({"strategyId": 1, "amount": "10", "durationDays": 0}),
            json!({"strategyId": 1, "amount": "10", "durationDays": 5000}),
        ] {
            let (status, _) = send(state.clone(), post_json("/api/v1/projections", request)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[tokio::test]
    async fn test_recommendations_scenario() {
        let request = post_json(
            "/api/v1/recommendations",
            json!({"ownerId": "0xnew", "intendedAmount": "50", "riskTolerance": 5}),
        );
        let (status, body) = send(test_state().await, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "heuristic");
        let recs = body["recommendations"].as_array().unwrap();
        let ids: Vec<i64> = recs.iter().map(|r| r["strategyId"].as_i64().unwrap()).collect();
        // Risk 8 exceeds tolerance + 2
        assert!(!ids.contains(&3));
        assert_eq!(body["staleStrategyIds"], json!([2]));
    }

    #[tokio::test]
    async fn test_recommendations_validation() {
        let state = test_state().await;
        let (status, body) = send(
            state.clone(),
            post_json("/api/v1/recommendations", json!({"ownerId": "0xabc", "intendedAmount": "0"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            state.clone(),
            post_json(
                "/api/v1/recommendations",
                json!({"ownerId": "0xabc", "intendedAmount": "10", "riskTolerance": 11}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(state, post_json("/api/v1/recommendations", json!({"nope": true}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_JSON");
    }

    #[tokio::test]
    async fn test_portfolio_imports_from_ledger_and_previews_reward() {
        let state = test_state().await;
        let (status, body) = send(state.clone(), get("/api/v1/portfolio/0xabc")).await;
        assert_eq!(status, StatusCode::OK);

        let positions = body["positions"].as_array().unwrap();
        assert_eq!(positions.len(), 2);
        let growth = positions.iter().find(|p| p["id"] == 1).unwrap();
        assert_eq!(growth["accumulatedReward"], "0.5");
        assert_eq!(growth["stale"], true);
        let live: f64 = growth["liveReward"].as_str().unwrap().parse().unwrap();
        // One day at 11.80% on 1000, on top of the persisted 0.5
        assert!((live - (0.5 + 1000.0 * 0.118 / 365.25)).abs() < 1e-3);
        assert_eq!(body["riskAnalysis"]["strategiesUsed"], 2);

        // Reads never persist the preview
        let stored = state.deposits.load_positions_for_owner("0xabc").await.unwrap();
        assert!(stored.iter().any(|p| p.id == 1 && p.accumulated_reward == dec!(0.5)));
    }

    #[tokio::test]
    async fn test_portfolio_for_unknown_owner_is_empty() {
        let (status, body) = send(test_state().await, get("/api/v1/portfolio/0xnobody")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["positions"], json!([]));
        assert_eq!(body["riskAnalysis"]["riskProfile"], "No data");
    }

    #[tokio::test]
    async fn test_job_trigger_and_unknown_job() {
        let state = test_state().await;
        let (status, body) = send(state.clone(), post_json("/api/v1/jobs/rate_sync/trigger", json!({}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["outcome"], "started");

        let (status, body) = send(state, post_json("/api/v1/jobs/nope/trigger", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
