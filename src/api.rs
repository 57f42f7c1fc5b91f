//! # Webhook HTTP API
//!
//! | Method | Path                   | Description                          |
//! |--------|------------------------|--------------------------------------|
//! | GET    | `/`                    | Liveness probe                       |
//! | GET    | `/metrics`             | Prometheus text exposition           |
//! | POST   | `/webhook/transaction` | Analyze a transaction and notify     |

use crate::analysis::RiskAnalyzer;
use crate::error::{ClassifiedError, ErrorKind, TransactionValidationError};
use crate::metrics::ServiceMetrics;
use crate::notifier::{NotificationSink, NotifyError};
use crate::types::analysis::RiskAnalysis;
use crate::types::transaction::Transaction;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Header carrying the shared inbound secret
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared application state. Cheap to clone, everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<RiskAnalyzer>,
    pub notifier: Arc<dyn NotificationSink>,
    pub metrics: Arc<ServiceMetrics>,
    pub api_key: Arc<str>,
}

/// Build the router with all routes and request tracing
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/webhook/transaction", post(transaction_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Errors surfaced by the webhook handler
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionValidationError),

    #[error("analysis failed: {0}")]
    Analysis(#[from] ClassifiedError),

    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),
}

impl ApiError {
    /// - Unauthorized: 401
    /// - Invalid payload or transaction: 422
    /// - RateLimited analysis: 429
    /// - Other analysis failures and notification failures: 502
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidPayload(_) | ApiError::InvalidTransaction(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Analysis(err) => match err.kind() {
                ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::TransientProviderError | ErrorKind::MalformedOutput => {
                    StatusCode::BAD_GATEWAY
                }
                // configuration is checked at startup; reaching here is a bug
                ErrorKind::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Notify(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = match &self {
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::Analysis(err) => err.to_string(),
            other => other.to_string(),
        };
        (self.status_code(), Json(json!({ "detail": detail }))).into_response()
    }
}

/// Successful webhook response
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub transaction_id: String,
    pub analysis: RiskAnalysis,
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "message": "txn-risk-service is up!" }))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn transaction_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Transaction>, JsonRejection>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let start_time = Instant::now();
    let result = handle_transaction(&state, &headers, payload).await;
    state.metrics.record_request_duration(start_time.elapsed());
    result
}

async fn handle_transaction(
    state: &AppState,
    headers: &HeaderMap,
    payload: Result<Json<Transaction>, JsonRejection>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided != Some(&*state.api_key) {
        warn!("Rejected webhook with missing or invalid API key");
        return Err(ApiError::Unauthorized);
    }

    let Json(transaction) = payload.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    transaction.validate()?;

    let analysis = match state.analyzer.analyze(&transaction).await {
        Ok(analysis) => analysis,
        Err(err) => {
            state.metrics.record_failure(err.kind());
            error!(
                stage = "analysis",
                transaction_id = %transaction.transaction_id,
                error_kind = %err.kind(),
                retryable = err.kind().is_retryable(),
                error = %err.message(),
                "Risk analysis failed"
            );
            return Err(err.into());
        }
    };
    state.metrics.record_analysis(&transaction, &analysis);

    info!(
        transaction_id = %transaction.transaction_id,
        risk_score = analysis.risk_score(),
        recommended_action = %analysis.recommended_action(),
        degraded = analysis.is_degraded(),
        "Analysis complete"
    );

    if let Err(e) = state.notifier.notify(&transaction, &analysis).await {
        state.metrics.record_notify_failure();
        error!(
            stage = "notify",
            transaction_id = %transaction.transaction_id,
            error = %e,
            "Admin notification failed"
        );
        return Err(e.into());
    }

    Ok(Json(WebhookResponse {
        status: "received",
        transaction_id: transaction.transaction_id,
        analysis,
    }))
}
