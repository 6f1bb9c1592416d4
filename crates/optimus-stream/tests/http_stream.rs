//! HTTP behaviour of the agent client against a mock backend.
//!
//! Run with:
//!   cargo test -p optimus-stream --test http_stream

use std::sync::Arc;

use futures::TryStreamExt as _;
use optimus_core::{find_model_option, Role};
use optimus_stream::{
    AgentClient, AgentQueryRequest, AgentTransport, Applied, ClientConfig, OneShotTransport,
    SessionController, SessionState, StepKind, StreamError, FALLBACK_STREAM_ERROR,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STREAM_BODY: &str = concat!(
    "data: {\"type\":\"agent_step\",\"step\":{\"node\":\"agent\",\"label\":\"Calling sql_query\",\"status\":\"in_progress\",\"kind\":\"tool_call\",\"tool_name\":\"sql_query\",\"tool_call_id\":\"call_1\",\"messages\":[]}}\n\n",
    "data: {not valid json\n\n",
    "data: {\"type\":\"final_answer\",\"content\":\"Order #123 is Delivered.\"}\n\n",
);

fn client_for(server: &MockServer) -> AgentClient {
    let config = ClientConfig::with_api_base(format!("{}/api/v1", server.uri()));
    AgentClient::new(&config).unwrap()
}

fn request() -> AgentQueryRequest {
    AgentQueryRequest::new("Where is order #123?", find_model_option("gpt-5")).unwrap()
}

async fn settle(controller: &mut SessionController) -> Applied {
    loop {
        let update = controller.next_update().await.unwrap();
        let applied = controller.apply(update);
        if applied.is_terminal() {
            return applied;
        }
    }
}

#[tokio::test]
async fn streams_steps_and_final_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/agent/stream"))
        .and(header("accept", "text/event-stream"))
        .and(body_json(json!({
            "query": "Where is order #123?",
            "model_provider": "openai",
            "model_name": "gpt-5",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(STREAM_BODY, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let transport: Arc<dyn AgentTransport> = Arc::new(client_for(&server));
    let mut controller = SessionController::new(transport, 16);
    let handle = controller
        .submit("  Where is order #123?  ", find_model_option("gpt-5"))
        .unwrap();

    let applied = settle(&mut controller).await;
    assert!(matches!(applied, Applied::Completed { committed: Some(_) }));

    let snap = handle.snapshot();
    assert_eq!(snap.state, SessionState::Completed);
    assert_eq!(snap.timeline.len(), 1);
    assert_eq!(snap.timeline.steps()[0].kind, StepKind::ToolCall);
    assert_eq!(snap.timeline.steps()[0].tool_name.as_deref(), Some("sql_query"));
    assert_eq!(snap.timeline.streaming_answer(), "Order #123 is Delivered.");
    assert!(snap.timeline.is_finalized());

    let last = controller.transcript().last().unwrap();
    assert_eq!(last.role(), Role::Assistant);
    assert_eq!(last.content(), "Order #123 is Delivered.");
}

#[tokio::test]
async fn server_error_surfaces_body_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/agent/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let transport: Arc<dyn AgentTransport> = Arc::new(client_for(&server));
    let mut controller = SessionController::new(transport, 16);
    let handle = controller.submit("hello", find_model_option("gpt-5")).unwrap();

    let applied = settle(&mut controller).await;
    assert_eq!(
        applied,
        Applied::Failed {
            message: "internal error".to_string()
        }
    );
    assert_eq!(handle.snapshot().state, SessionState::Failed);
    assert_eq!(controller.transcript().len(), 1);
}

#[tokio::test]
async fn server_error_without_body_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/agent/stream"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client_for(&server).stream(&request()).await.err().unwrap();
    assert!(matches!(err, StreamError::Status { status: 503, .. }));
    assert_eq!(err.to_string(), FALLBACK_STREAM_ERROR);
}

#[tokio::test]
async fn empty_success_body_is_missing_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/agent/stream"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = client_for(&server).stream(&request()).await.err().unwrap();
    assert!(matches!(err, StreamError::MissingBody));
}

#[tokio::test]
async fn raw_stream_yields_body_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/agent/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(STREAM_BODY, "text/event-stream"))
        .mount(&server)
        .await;

    let stream = client_for(&server).stream(&request()).await.unwrap();
    let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
    let body: Vec<u8> = chunks.concat();
    assert_eq!(body, STREAM_BODY.as_bytes());
}

#[tokio::test]
async fn one_shot_query_returns_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/agent/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Return window is 30 days."
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client.query(&request()).await.unwrap();
    assert_eq!(response.message, "Return window is 30 days.");

    let transport: Arc<dyn AgentTransport> = Arc::new(OneShotTransport::new(client));
    let mut controller = SessionController::new(transport, 16);
    let handle = controller.submit("returns?", find_model_option("gpt-5")).unwrap();

    assert!(matches!(
        settle(&mut controller).await,
        Applied::Completed { committed: Some(_) }
    ));
    assert_eq!(
        handle.snapshot().timeline.streaming_answer(),
        "Return window is 30 days."
    );
}

#[tokio::test]
async fn query_with_unexpected_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/agent/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client_for(&server).query(&request()).await.unwrap_err();
    assert!(matches!(err, StreamError::Parse(_)));
}

#[tokio::test]
async fn health_reports_reachability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    assert!(client_for(&server).health().await);

    let config = ClientConfig::with_api_base(format!("{}/missing", server.uri()));
    assert!(!AgentClient::new(&config).unwrap().health().await);
}
