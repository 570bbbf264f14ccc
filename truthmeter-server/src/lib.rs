//! HTTP interface for the analysis pipeline.
//!
//! Routes:
//! - `POST /api/analyze` runs the primary analyzer
//! - `GET /api/test` pings the primary provider
//! - `POST|OPTIONS /functions/v1/analyze-content` runs the alternate analyzer
//! - `GET|DELETE /api/history`, `GET /api/history/stats`
//!
//! Every response carries permissive CORS headers and every route answers
//! `OPTIONS` preflight with 200.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::HeaderName, HeaderValue, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use truthmeter_analysis::{
    AnalysisHistoryEntry, AnalysisRequest, AnalysisResult, Analyzer, HistoryReport, HistoryStore,
};
use truthmeter_common::TruthMeterError;

pub const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
pub const ALLOW_METHODS: &str = "GET, POST, DELETE, OPTIONS";

#[derive(Clone)]
pub struct AppState {
    /// Backs `/api/analyze` and `/api/test`.
    pub primary: Arc<Analyzer>,
    /// Backs `/functions/v1/analyze-content`.
    pub alternate: Arc<Analyzer>,
    pub history: Arc<dyn HistoryStore>,
}

/// `{ "error": message }` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<TruthMeterError> for ApiError {
    fn from(e: TruthMeterError) -> Self {
        tracing::error!(error = %e, "api.request_failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.public_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn decode_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "api.body_rejected");
        ApiError::bad_request("Invalid JSON body")
    })
}

#[derive(Debug, Deserialize)]
struct AnalyzeBody {
    #[serde(default)]
    content: String,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct AnalyzeContentBody {
    #[serde(default)]
    content: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/analyze",
            post(analyze_handler).options(preflight_handler),
        )
        .route("/api/test", get(test_handler).options(preflight_handler))
        .route(
            "/functions/v1/analyze-content",
            post(analyze_content_handler).options(preflight_handler),
        )
        .route(
            "/api/history",
            get(list_history)
                .delete(clear_history)
                .options(preflight_handler),
        )
        .route(
            "/api/history/stats",
            get(history_stats).options(preflight_handler),
        )
        .fallback(not_found)
        .layer(map_response(with_cors))
        .with_state(state)
}

async fn with_cors(mut res: Response) -> Response {
    let headers = res.headers_mut();
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static(ALLOW_METHODS),
    );
    res
}

async fn analyze_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<AnalysisResult>> {
    let body: AnalyzeBody = decode_body(&body)?;
    let outcome = state
        .primary
        .analyze(&AnalysisRequest::new(body.content, body.model))
        .await?;
    Ok(Json(outcome.result))
}

async fn test_handler(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let completion = state.primary.backend().ping().await?;
    tracing::info!(provider = %state.primary.backend().provider(), "api.test.ok");
    Ok(Json(json!({
        "success": true,
        "message": "API key is working!",
        "response": completion,
    })))
}

async fn not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "Not found".to_string(),
    }
}

async fn preflight_handler() -> &'static str {
    "ok"
}

async fn analyze_content_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<AnalysisResult>> {
    let body: AnalyzeContentBody = decode_body(&body)?;
    let content = body
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Content is required"))?;

    let label = state.alternate.backend().model_name().to_string();
    let outcome = state
        .alternate
        .analyze(&AnalysisRequest::new(content, label))
        .await?;
    Ok(Json(outcome.result))
}

async fn list_history(State(state): State<AppState>) -> Json<Vec<AnalysisHistoryEntry>> {
    Json(state.history.list().await)
}

async fn clear_history(State(state): State<AppState>) -> StatusCode {
    state.history.clear().await;
    StatusCode::NO_CONTENT
}

async fn history_stats(State(state): State<AppState>) -> Json<HistoryReport> {
    Json(HistoryReport::from_entries(&state.history.list().await))
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "server.listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("server.shutdown");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests;
