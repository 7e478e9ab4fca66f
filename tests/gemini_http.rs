//! Gemini adapter tests against a wiremock server.
//!
//! These cover the wire format of `generateContent`, status mapping, and a
//! full send-message → execute-code round through the router.

use promptcanvas::agent::config::ModelConfig;
use promptcanvas::agent::prompt::build_request;
use promptcanvas::agent::providers::ModelBackend;
use promptcanvas::agent::providers::gemini::GeminiBackend;
use promptcanvas::agent::router::Dispatch;
use promptcanvas::agent::{
    AgentError, AssistantReply, InboundEvent, OutboundEvent, Role, Router, Session,
};
use promptcanvas::host::EmbeddedHost;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/test-model:generateContent";

fn backend_for(server: &MockServer) -> GeminiBackend {
    let config = ModelConfig {
        model: "test-model".into(),
        base_url: Some(format!("{}{}", server.uri(), GENERATE_PATH)),
        ..ModelConfig::default()
    };
    GeminiBackend::new(&config, "test-key".into()).expect("backend should build")
}

fn candidate(text: &str) -> serde_json::Value {
    json!({
        "candidates": [
            { "content": { "role": "model", "parts": [{ "text": text }] }, "finishReason": "STOP" }
        ]
    })
}

#[tokio::test]
async fn request_carries_key_history_and_schema() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [
                { "role": "user", "parts": [{ "text": "INSTRUCTION" }] },
                { "role": "user", "parts": [{ "text": "draw a red square" }] }
            ],
            "generationConfig": {
                "topK": 40,
                "responseMimeType": "application/json",
                "responseSchema": { "required": ["message"] }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(r#"{"message":"ok"}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut session = Session::new();
    let request = build_request(&mut session, "INSTRUCTION", "draw a red square");
    let text = backend.generate(request).await.expect("request should succeed");
    assert_eq!(text, r#"{"message":"ok"}"#);
}

#[tokio::test]
async fn overload_and_rate_limit_map_to_distinct_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE" }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut session = Session::new();

    let first = backend
        .generate(build_request(&mut session, "I", "one"))
        .await
        .unwrap_err();
    assert!(matches!(first, AgentError::ServiceUnavailable));

    let second = backend
        .generate(build_request(&mut session, "I", "two"))
        .await
        .unwrap_err();
    assert!(matches!(second, AgentError::RateLimited));
    assert_ne!(first.to_string(), second.to_string());
}

#[tokio::test]
async fn missing_candidate_text_is_an_invalid_shape() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut session = Session::new();
    let err = backend
        .generate(build_request(&mut session, "I", "hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::InvalidResponseShape));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_failure_without_the_key() {
    let config = ModelConfig {
        base_url: Some("http://127.0.0.1:9/v1beta/models/x:generateContent".into()),
        ..ModelConfig::default()
    };
    let backend = GeminiBackend::new(&config, "SECRET-KEY-123".into()).unwrap();
    let mut session = Session::new();
    let err = backend
        .generate(build_request(&mut session, "I", "hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Transport(_)));

    // The key rides in the query string; neither the UI text nor the debug form may carry it.
    let shown = err.to_string();
    assert!(shown.starts_with("Network request to the model API failed"));
    assert!(!shown.contains("SECRET-KEY-123"), "{shown}");
    assert!(!format!("{err:?}").contains("SECRET-KEY-123"));
}

#[tokio::test]
async fn router_round_trip_from_chat_to_execution() {
    let server = MockServer::start().await;
    let reply = r#"{"message":"Returning the answer","function":"(async () => 6 * 7)();"}"#;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(reply)))
        .expect(1)
        .mount(&server)
        .await;

    let host = EmbeddedHost::start(Vec::new()).expect("host should start");
    let mut router = Router::new("INSTRUCTION", Box::new(backend_for(&server)), Box::new(host));

    let dispatch = router
        .handle(InboundEvent::SendMessage {
            message: "what is six times seven?".into(),
        })
        .await;
    let Dispatch::Reply(OutboundEvent::AiResponse { data, is_retry }) = dispatch else {
        panic!("expected ai-response");
    };
    assert!(!is_retry);
    assert_eq!(
        data,
        AssistantReply::new("Returning the answer", "(async () => 6 * 7)();")
    );

    let roles: Vec<Role> = router.session().turns().iter().map(|turn| turn.role()).collect();
    assert_eq!(roles, vec![Role::User, Role::Model]);

    let executed = router
        .handle(InboundEvent::ExecuteCode {
            code: data.function,
            message_id: json!("msg-1"),
        })
        .await;
    assert_eq!(
        executed,
        Dispatch::Reply(OutboundEvent::ExecutionSuccess {
            message_id: json!("msg-1"),
            return_value: json!(42),
        })
    );
}

#[tokio::test]
async fn failed_status_leaves_only_the_user_turn() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "internal" }
        })))
        .mount(&server)
        .await;

    let host = EmbeddedHost::start(Vec::new()).unwrap();
    let mut router = Router::new("INSTRUCTION", Box::new(backend_for(&server)), Box::new(host));

    let dispatch = router
        .handle(InboundEvent::SendMessage {
            message: "hello".into(),
        })
        .await;
    assert_eq!(
        dispatch,
        Dispatch::Reply(OutboundEvent::ApiError {
            error: "API request failed (500): internal".into(),
        })
    );
    assert_eq!(router.session().len(), 1);
}
