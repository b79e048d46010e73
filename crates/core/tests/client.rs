//! HTTP-level tests for the completion client, using wiremock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use quill_core::client::{ClientConfig, GeminiClient};
use quill_core::{Message, QuillError, Role};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: String) -> GeminiClient {
    GeminiClient::new(ClientConfig {
        api_key: "test-key".to_string(),
        base_url,
        ..ClientConfig::default()
    })
}

fn history() -> Vec<Message> {
    vec![Message::new(Role::User, "Hello")]
}

fn chunk(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }] }
        }]
    })
}

#[tokio::test]
async fn streams_sse_body_and_forwards_deltas() {
    let server = MockServer::start().await;
    let body = format!("data: {}\n\ndata: {}\n", chunk("Hello"), chunk(" there"));

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:streamGenerateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(server.uri());
    let mut seen = Vec::new();

    let aggregate = client
        .send(&history(), None, |delta| seen.push(delta.to_string()))
        .await
        .expect("send should succeed");

    assert_eq!(aggregate, "Hello there");
    assert_eq!(seen, vec!["Hello", " there"]);
}

#[tokio::test]
async fn whole_json_document_body_is_decoded_in_one_pass() {
    let server = MockServer::start().await;
    let body = serde_json::json!([chunk("a"), chunk("b"), chunk("c")]);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = test_client(server.uri());
    let mut seen = Vec::new();

    let aggregate = client
        .send(&history(), None, |delta| seen.push(delta.to_string()))
        .await
        .expect("send should succeed");

    assert_eq!(aggregate, "abc");
    assert_eq!(seen, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn error_status_surfaces_the_service_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": { "code": 400, "message": "API key not valid" }
        })))
        .mount(&server)
        .await;

    let client = test_client(server.uri());
    let result = client.send(&history(), None, |_| {}).await;

    match result {
        Err(QuillError::Request(msg)) => assert_eq!(msg, "API key not valid"),
        other => panic!("expected Request error, got {other:?}"),
    }
}

#[tokio::test]
async fn error_status_without_parseable_body_is_generic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = test_client(server.uri());
    let result = client.send(&history(), None, |_| {}).await;

    match result {
        Err(QuillError::Request(msg)) => assert!(msg.contains("500"), "got: {msg}"),
        other => panic!("expected Request error, got {other:?}"),
    }
}

#[tokio::test]
async fn success_with_no_extractable_text_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
        )
        .mount(&server)
        .await;

    let client = test_client(server.uri());
    let result = client.send(&history(), None, |_| {}).await;

    assert!(matches!(result, Err(QuillError::Decode)));
}

#[tokio::test]
async fn missing_api_key_fails_before_any_request() {
    let server = MockServer::start().await;

    // No network traffic is allowed at all.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = GeminiClient::new(ClientConfig {
        api_key: "  ".to_string(),
        base_url: server.uri(),
        ..ClientConfig::default()
    });

    let result = client.send(&history(), None, |_| {}).await;
    assert!(matches!(result, Err(QuillError::Configuration(_))));
}

#[tokio::test]
async fn cancel_interrupts_an_in_flight_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chunk("too late"))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let client = Arc::new(test_client(server.uri()));
    let task = tokio::spawn({
        let client = client.clone();
        async move {
            let history = history();
            client.send(&history, None, |_| {}).await
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    client.cancel();
    client.cancel(); // idempotent

    let result = task.await.expect("task should not panic");
    assert!(matches!(result, Err(QuillError::Cancelled)));
}

#[tokio::test]
async fn a_second_send_cancels_the_first() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chunk("reply"))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = Arc::new(test_client(server.uri()));
    let first = tokio::spawn({
        let client = client.clone();
        async move {
            let history = history();
            client.send(&history, None, |_| {}).await
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = client.send(&history(), None, |_| {}).await;

    let first = first.await.expect("task should not panic");
    assert!(matches!(first, Err(QuillError::Cancelled)));
    assert_eq!(second.expect("second send should succeed"), "reply");
}

#[tokio::test]
async fn cancel_after_completion_is_a_noop() {
    let server = MockServer::start().await;
    let counter = Arc::new(Mutex::new(0));

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chunk("done")))
        .mount(&server)
        .await;

    let client = test_client(server.uri());
    let seen = counter.clone();
    let aggregate = client
        .send(&history(), None, |_| *seen.lock().unwrap() += 1)
        .await
        .expect("send should succeed");
    assert_eq!(aggregate, "done");

    client.cancel();

    // A fresh send still works; the previous token is gone.
    let aggregate = client
        .send(&history(), None, |_| {})
        .await
        .expect("send should succeed");
    assert_eq!(aggregate, "done");
    assert_eq!(*counter.lock().unwrap(), 1);
}
