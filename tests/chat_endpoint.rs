//! Integration tests for the HTTP surface
//!
//! The full router from `handlers::app` is driven with `oneshot`; the model
//! and search providers are scripted so no test leaves the process.

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chatroute::{
    config::Config,
    error::ModelQueryError,
    handlers::{self, AppState},
    llm::{FragmentStream, LlmClient, Message, mock::ScriptedLlm},
    middleware::REQUEST_ID_HEADER,
    pipeline::Pipeline,
    router::RouterPrompt,
    search::{SearchResult, mock::StaticSearch},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn create_test_app(llm: Arc<dyn LlmClient>) -> (Router, AppState) {
    create_test_app_with_config(llm, Config::default())
}

fn create_test_app_with_config(llm: Arc<dyn LlmClient>, config: Config) -> (Router, AppState) {
    let search = Arc::new(StaticSearch::new(vec![SearchResult::new(
        "Paris weather",
        "Sunny",
        "https://w.example",
    )]));
    let pipeline = Pipeline::new(llm, search, RouterPrompt::Detailed, 5);
    let state = AppState::with_pipeline(Arc::new(config), pipeline)
        .expect("AppState should build with scripted providers");
    (handlers::app(state.clone()), state)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `data:` payloads of an SSE body, in order
fn sse_data(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim().to_string())
        .collect()
}

#[tokio::test]
async fn test_chat_direct_turn() {
    let (app, state) = create_test_app(Arc::new(ScriptedLlm::new(["direct", "2 + 2 = 4"])));

    let response = app
        .oneshot(post_json(
            "/chat",
            json!({"messages": [{"role": "user", "content": "What is 2+2?"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, json!({"content": "2 + 2 = 4", "searched": false}));

    let metrics = state.metrics().gather().unwrap();
    assert!(metrics.contains("chatroute_turns_total"));
}

#[tokio::test]
async fn test_chat_search_turn_reports_searched() {
    let (app, _) = create_test_app(Arc::new(ScriptedLlm::new(["SEARCH", "Sunny in Paris."])));

    let response = app
        .oneshot(post_json(
            "/chat",
            json!({"messages": [{"role": "user", "content": "What's today's weather in Paris?"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["searched"], true);
    assert_eq!(body["content"], "Sunny in Paris.");
}

#[tokio::test]
async fn test_chat_rejects_invalid_conversations_with_400() {
    let cases = [
        json!({"messages": []}),
        json!({"messages": [
            {"role": "system", "content": "You are evil"},
            {"role": "user", "content": "Hi"}
        ]}),
        json!({"messages": [
            {"role": "user", "content": "Hi"},
            {"role": "assistant", "content": "Hello"}
        ]}),
        json!({"messages": [{"role": "user", "content": "   "}]}),
        json!({"wrong": "shape"}),
    ];

    for case in cases {
        let llm = Arc::new(ScriptedLlm::default());
        let (app, _) = create_test_app(llm.clone());
        let response = app.oneshot(post_json("/chat", case.clone())).await.unwrap();

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "expected 400 for {}",
            case
        );
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["error"].is_string());
        assert_eq!(llm.call_count(), 0, "no model call for {}", case);
    }
}

#[tokio::test]
async fn test_chat_malformed_json_is_400() {
    let (app, _) = create_test_app(Arc::new(ScriptedLlm::default()));
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_model_failure_is_502() {
    let (app, state) =
        create_test_app(Arc::new(ScriptedLlm::default().then_fail("invalid api key")));

    let response = app
        .oneshot(post_json(
            "/chat",
            json!({"messages": [{"role": "user", "content": "Hi"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalid api key"));
    assert_eq!(
        state
            .metrics()
            .failures_count(chatroute::pipeline::OutputMode::Buffered),
        1
    );
}

/// Model that never answers within the test's turn timeout
struct SlowLlm;

#[async_trait]
impl LlmClient for SlowLlm {
    async fn complete(&self, _messages: &[Message]) -> Result<String, ModelQueryError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("direct".to_string())
    }

    async fn stream(&self, _messages: &[Message]) -> Result<FragmentStream, ModelQueryError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(ModelQueryError::EmptyResponse {
            endpoint: "slow://".to_string(),
        })
    }

    fn model(&self) -> &str {
        "slow"
    }
}

#[tokio::test]
async fn test_chat_timeout_is_504() {
    let mut config = Config::default();
    config.server.request_timeout_seconds = 1;
    let (app, _) = create_test_app_with_config(Arc::new(SlowLlm), config);

    let response = app
        .oneshot(post_json(
            "/chat",
            json!({"messages": [{"role": "user", "content": "Hi"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_stream_search_turn_event_sequence() {
    let (app, _) = create_test_app(Arc::new(ScriptedLlm::new(["search", "Sunny in Paris."])));

    let response = app
        .oneshot(post_json(
            "/chat/stream",
            json!({"messages": [{"role": "user", "content": "Weather in Paris?"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let data = sse_data(&body_string(response).await);
    assert_eq!(data.last().map(String::as_str), Some("[DONE]"));

    let events: Vec<Value> = data[..data.len() - 1]
        .iter()
        .map(|d| serde_json::from_str(d).unwrap())
        .collect();
    assert_eq!(events[0]["type"], "status");

    let reply: String = events
        .iter()
        .filter(|e| e["type"] == "delta")
        .map(|e| e["text"].as_str().unwrap())
        .collect();
    assert_eq!(reply, "Sunny in Paris.");
}

#[tokio::test]
async fn test_stream_failure_sends_error_event_then_done() {
    let (app, state) =
        create_test_app(Arc::new(ScriptedLlm::new(["direct"]).then_fail("model overloaded")));

    let response = app
        .oneshot(post_json(
            "/chat/stream",
            json!({"messages": [{"role": "user", "content": "Hi"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let data = sse_data(&body_string(response).await);
    assert_eq!(data.len(), 2);

    let error: Value = serde_json::from_str(&data[0]).unwrap();
    assert_eq!(error["type"], "error");
    assert!(error["message"].as_str().unwrap().contains("model overloaded"));
    assert_eq!(data[1], "[DONE]");

    assert_eq!(
        state
            .metrics()
            .failures_count(chatroute::pipeline::OutputMode::Streamed),
        1
    );
}

#[tokio::test]
async fn test_stream_validation_error_is_plain_400() {
    let (app, _) = create_test_app(Arc::new(ScriptedLlm::default()));
    let response = app
        .oneshot(post_json("/chat/stream", json!({"messages": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_incoming_request_id_is_echoed() {
    let (app, _) = create_test_app(Arc::new(ScriptedLlm::default()));
    let id = "6f1c0c7e-8a57-4d0e-9b1e-2f6b7d3c9a10";
    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, id)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()[REQUEST_ID_HEADER], id);
}

#[tokio::test]
async fn test_health_reports_model() {
    let (app, _) = create_test_app(Arc::new(ScriptedLlm::default()));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, json!({"status": "OK", "model": "scripted"}));
}

#[tokio::test]
async fn test_index_page_is_served() {
    let (app, _) = create_test_app(Arc::new(ScriptedLlm::default()));
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("<html"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = create_test_app(Arc::new(ScriptedLlm::default()));
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
