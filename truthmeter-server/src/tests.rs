use super::*;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header::CONTENT_TYPE, Request};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;
use truthmeter_analysis::history::{MemoryStorage, RecordHistory};
use truthmeter_common::{ProviderKind, Result};
use truthmeter_config::{AnalysisConfig, PricingConfig};
use truthmeter_llm::traits::ProviderBackend;
use truthmeter_llm::Completion;

const BODY_LIMIT: usize = 1_048_576;

const GOOD_REPLY: &str = r#"Analysis: {"overallAccuracy":20,"metrics":{"factualCorrectness":10,"logicalConsistency":60,"clarity":80,"depth":40},"whatWentWrong":["Paris is the capital of France, not Germany"],"whatWentRight":["Grammatically correct"],"detailedAnalysis":"Contains a factual error.","confidence":90}"#;

struct StubBackend {
    kind: ProviderKind,
    reply: Option<&'static str>,
    calls: AtomicUsize,
}

impl StubBackend {
    fn new(kind: ProviderKind, reply: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            reply,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ProviderBackend for StubBackend {
    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Some(text) => Ok(Completion::text(text)),
            None => Err(TruthMeterError::ProviderUnavailable {
                provider: self.kind,
                env_var: match self.kind {
                    ProviderKind::Anthropic => "CLAUDE_API_KEY".into(),
                    ProviderKind::Gemini => "GEMINI_API_KEY".into(),
                },
            }),
        }
    }

    fn provider(&self) -> ProviderKind {
        self.kind
    }

    fn model_name(&self) -> &str {
        match self.kind {
            ProviderKind::Anthropic => "claude-stub",
            ProviderKind::Gemini => "gemini-stub",
        }
    }

    fn max_output_tokens(&self) -> u32 {
        1200
    }
}

struct Harness {
    app: Router,
    primary: Arc<StubBackend>,
    alternate: Arc<StubBackend>,
    history: Arc<dyn HistoryStore>,
}

fn harness(primary_reply: Option<&'static str>, alternate_reply: Option<&'static str>) -> Harness {
    let primary = StubBackend::new(ProviderKind::Anthropic, primary_reply);
    let alternate = StubBackend::new(ProviderKind::Gemini, alternate_reply);
    let history: Arc<dyn HistoryStore> = Arc::new(RecordHistory::new(
        MemoryStorage::new(),
        "ai-truth-meter-history",
        100,
    ));
    let analysis = AnalysisConfig::default();
    let pricing = PricingConfig::default();
    let state = AppState {
        primary: Arc::new(Analyzer::new(
            primary.clone(),
            history.clone(),
            &analysis,
            &pricing,
        )),
        alternate: Arc::new(Analyzer::new(
            alternate.clone(),
            history.clone(),
            &analysis,
            &pricing,
        )),
        history: history.clone(),
    };
    Harness {
        app: build_router(state),
        primary,
        alternate,
        history,
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn assert_cors(response: &Response) {
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        HeaderValue::from_static("*")
    );
    assert_eq!(
        response.headers()["access-control-allow-headers"],
        HeaderValue::from_static(ALLOW_HEADERS)
    );
}

#[tokio::test]
async fn analyze_returns_sanitized_result_and_records_history() {
    let h = harness(Some(GOOD_REPLY), None);

    let response = h
        .app
        .oneshot(json_request(
            "POST",
            "/api/analyze",
            json!({"content": "Paris is the capital of Germany.", "model": "gpt-4o"}),
        ))
        .await
        .expect("router call");

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    let body = json_body(response).await;
    assert_eq!(body["overallAccuracy"], 20);
    assert_eq!(body["metrics"]["clarity"], 80);
    assert_eq!(body["whatWentRight"], json!(["Grammatically correct"]));
    assert_eq!(h.primary.calls.load(Ordering::SeqCst), 1);

    let entries = h.history.list().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].source_model_label, "gpt-4o");
}

#[tokio::test]
async fn analyze_failure_is_generic_500() {
    let h = harness(Some("no json here"), None);

    let response = h
        .app
        .oneshot(json_request(
            "POST",
            "/api/analyze",
            json!({"content": "x", "model": "gpt-4o"}),
        ))
        .await
        .expect("router call");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&response);
    assert_eq!(
        json_body(response).await,
        json!({"error": "No valid JSON found in response"})
    );
}

#[tokio::test]
async fn analyze_rejects_garbage_body() {
    let h = harness(Some(GOOD_REPLY), None);
    let request = Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("build request");

    let response = h.app.oneshot(request).await.expect("router call");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.primary.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_endpoint_reports_working_key() {
    let h = harness(Some("Hello"), None);

    let response = h
        .app
        .oneshot(empty_request("GET", "/api/test"))
        .await
        .expect("router call");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "API key is working!");
    assert_eq!(body["response"]["text"], "Hello");
}

#[tokio::test]
async fn test_endpoint_without_key_is_500() {
    let h = harness(None, None);

    let response = h
        .app
        .oneshot(empty_request("GET", "/api/test"))
        .await
        .expect("router call");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Claude API key not found (set CLAUDE_API_KEY)"})
    );
}

#[tokio::test]
async fn preflight_is_ok_with_cors() {
    let h = harness(None, None);

    let response = h
        .app
        .oneshot(empty_request("OPTIONS", "/functions/v1/analyze-content"))
        .await
        .expect("router call");

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    let bytes = to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn every_route_answers_preflight() {
    for uri in [
        "/api/analyze",
        "/api/test",
        "/api/history",
        "/api/history/stats",
    ] {
        let h = harness(None, None);
        let request = Request::builder()
            .method("OPTIONS")
            .uri(uri)
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .expect("build request");

        let response = h.app.oneshot(request).await.expect("router call");

        assert_eq!(response.status(), StatusCode::OK, "preflight for {uri}");
        assert_cors(&response);
        assert_eq!(
            response.headers()["access-control-allow-methods"],
            HeaderValue::from_static(ALLOW_METHODS)
        );
        assert_eq!(h.primary.calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn analyze_content_uses_alternate_backend() {
    let h = harness(None, Some(GOOD_REPLY));

    let response = h
        .app
        .oneshot(json_request(
            "POST",
            "/functions/v1/analyze-content",
            json!({"content": "Paris is the capital of Germany."}),
        ))
        .await
        .expect("router call");

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    assert_eq!(json_body(response).await["confidence"], 90);
    assert_eq!(h.alternate.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.primary.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn analyze_content_requires_content() {
    let h = harness(None, Some(GOOD_REPLY));

    let response = h
        .app
        .oneshot(json_request(
            "POST",
            "/functions/v1/analyze-content",
            json!({"content": "   "}),
        ))
        .await
        .expect("router call");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_cors(&response);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Content is required"})
    );
    assert_eq!(h.alternate.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn analyze_content_without_key_is_500() {
    let h = harness(None, None);

    let response = h
        .app
        .oneshot(json_request(
            "POST",
            "/functions/v1/analyze-content",
            json!({"content": "something"}),
        ))
        .await
        .expect("router call");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&response);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Gemini API key not found (set GEMINI_API_KEY)"})
    );
}

#[tokio::test]
async fn history_list_stats_and_clear() {
    let h = harness(Some(GOOD_REPLY), None);

    for label in ["gpt-4o", "gpt-4o", "claude"] {
        let response = h
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/analyze",
                json!({"content": "Paris is the capital of Germany.", "model": label}),
            ))
            .await
            .expect("router call");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = h
        .app
        .clone()
        .oneshot(empty_request("GET", "/api/history"))
        .await
        .expect("router call");
    let entries = json_body(response).await;
    assert_eq!(entries.as_array().map(Vec::len), Some(3));
    assert_eq!(entries[0]["sourceModelLabel"], "claude");

    let response = h
        .app
        .clone()
        .oneshot(empty_request("GET", "/api/history/stats"))
        .await
        .expect("router call");
    let stats = json_body(response).await;
    assert_eq!(stats["totalAnalyses"], 3);
    assert_eq!(stats["averageAccuracy"], 20.0);
    assert_eq!(stats["accuracyBands"]["low"], 3);
    assert_eq!(stats["byModel"][0]["sourceModelLabel"], "gpt-4o");

    let response = h
        .app
        .clone()
        .oneshot(empty_request("DELETE", "/api/history"))
        .await
        .expect("router call");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_cors(&response);
    assert!(h.history.list().await.is_empty());
}

#[tokio::test]
async fn unknown_route_still_gets_cors() {
    let h = harness(None, None);
    let response = h
        .app
        .oneshot(empty_request("GET", "/nope"))
        .await
        .expect("router call");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_cors(&response);
}
