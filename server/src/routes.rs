use std::sync::Arc;

use amounts::format_countdown;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use indexer::epoch::{epoch_start, next_epoch_start, seconds_until_next_epoch};
use indexer::{JobError, JobReport};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::trigger::SnapshotTrigger;

#[derive(Clone)]
pub struct AppState {
    pub trigger: Arc<dyn SnapshotTrigger>,
}

/// Body returned by the snapshot trigger
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    epoch_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gauges_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SnapshotResponse {
    fn recorded(report: &JobReport) -> Self {
        let message = if report.gauges_found == 0 {
            "No gauges to process".to_string()
        } else {
            format!("Recorded {} gauge snapshots", report.gauges_processed)
        };

        Self {
            success: true,
            message: Some(message),
            epoch_start: Some(report.epoch_start),
            gauges_processed: Some(report.gauges_processed),
            error: None,
        }
    }

    fn failed(error: &JobError) -> Self {
        Self {
            success: false,
            message: None,
            epoch_start: None,
            gauges_processed: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct EpochResponse {
    epoch_start: i64,
    next_epoch_start: i64,
    seconds_remaining: u64,
    time_remaining: String,
}

/// Defines the application routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/record-gauge-history", post(record_gauge_history))
        .route("/epoch", get(current_epoch))
        .route("/health", get(health))
        .with_state(state)
        // enable tracing for all tower http requests
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}

/// Runs one gauge history snapshot
async fn record_gauge_history(
    State(state): State<AppState>,
) -> (StatusCode, Json<SnapshotResponse>) {
    tracing::info!("starting gauge history snapshot");

    match state.trigger.trigger().await {
        Ok(report) => (StatusCode::OK, Json(SnapshotResponse::recorded(&report))),
        Err(e) => {
            tracing::error!("error in record-gauge-history: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SnapshotResponse::failed(&e)),
            )
        }
    }
}

async fn current_epoch() -> Json<EpochResponse> {
    let now = chrono::Utc::now().timestamp();
    let seconds_remaining = seconds_until_next_epoch(now);

    Json(EpochResponse {
        epoch_start: epoch_start(now),
        next_epoch_start: next_epoch_start(now),
        seconds_remaining,
        time_remaining: format_countdown(seconds_remaining),
    })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use database::MemoryStore;
    use ethers::types::{Address, U256};
    use indexer::{ConfigError, MockGaugeChain, SnapshotJob};
    use serde_json::Value;
    use tower::ServiceExt;

    struct FailingTrigger;

    #[async_trait]
    impl SnapshotTrigger for FailingTrigger {
        async fn trigger(&self) -> Result<JobReport, JobError> {
            Err(JobError::Config(ConfigError::MissingCredentials))
        }
    }

    fn app(trigger: impl SnapshotTrigger + 'static) -> Router {
        router(AppState {
            trigger: Arc::new(trigger),
        })
    }

    fn job(chain: MockGaugeChain) -> SnapshotJob {
        SnapshotJob::new(Arc::new(chain), Arc::new(MemoryStore::new()))
            .with_call_timeout(Duration::from_secs(1))
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn records_snapshots() {
        let chain = MockGaugeChain::new()
            .with_gauge(Address::from_low_u64_be(1), U256::exp10(18))
            .with_gauge(Address::from_low_u64_be(2), U256::exp10(19));

        let (status, body) = call(app(job(chain)), "POST", "/record-gauge-history").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Recorded 2 gauge snapshots");
        assert_eq!(body["gauges_processed"], 2);
        assert!(body["epoch_start"].as_i64().unwrap() % 604_800 == 0);
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn reports_empty_registry() {
        let (status, body) = call(
            app(job(MockGaugeChain::new())),
            "POST",
            "/record-gauge-history",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "No gauges to process");
        assert_eq!(body["gauges_processed"], 0);
    }

    #[tokio::test]
    async fn failures_return_500() {
        let (status, body) = call(app(FailingTrigger), "POST", "/record-gauge-history").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("missing persistence credentials"));
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn enumeration_failure_returns_500() {
        let chain = MockGaugeChain::new().failing_enumeration();

        let (status, body) = call(app(job(chain)), "POST", "/record-gauge-history").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("failed to enumerate gauges"));
    }

    #[tokio::test]
    async fn epoch_countdown() {
        let (status, body) = call(app(FailingTrigger), "GET", "/epoch").await;

        assert_eq!(status, StatusCode::OK);
        let start = body["epoch_start"].as_i64().unwrap();
        assert_eq!(body["next_epoch_start"].as_i64().unwrap(), start + 604_800);
        assert!(body["seconds_remaining"].as_u64().unwrap() <= 604_800);
        assert!(body["time_remaining"].is_string());
    }

    #[tokio::test]
    async fn health_check() {
        let (status, body) = call(app(FailingTrigger), "GET", "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
