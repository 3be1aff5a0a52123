//! `ensure_and_run_webhook` against a wiremock server.

use std::time::Duration;

use meldai::{Client, Config, EnsureAndRunRequest, Error, Mode, ResponseShape, RunOutput};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = "meld_sk_test_key";

fn client_for(base_url: String, api_key: Option<&str>) -> Client {
    let cfg = Config {
        api_key: api_key.map(str::to_string),
        base_url: Some(base_url),
        ..Default::default()
    };
    Client::from_resolved(
        cfg.resolve_with(|_| None)
            .expect("config should resolve"),
    )
}

fn client_for_server(server: &MockServer) -> Client {
    client_for(server.uri(), Some(TEST_KEY))
}

fn translate_request() -> EnsureAndRunRequest {
    EnsureAndRunRequest::new(
        "translate-to-french",
        json!({ "text": "Good morning!" }),
        json!({ "translation": "" }),
    )
}

#[derive(Debug, Deserialize, JsonSchema, PartialEq)]
struct Article {
    title: String,
    body: String,
}

#[tokio::test]
async fn sync_run_parses_json_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/meld-run/sync"))
        .and(header("authorization", "Bearer meld_sk_test_key"))
        .and(header("content-type", "application/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"title": "Test", "body": "Test body"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let output = client
        .melds()
        .ensure_and_run_webhook(translate_request())
        .await
        .expect("run should succeed");

    assert_eq!(
        output,
        RunOutput::Json(json!({"title": "Test", "body": "Test body"}))
    );
}

#[tokio::test]
async fn typed_run_decodes_into_caller_type() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/meld-run/sync"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"title": "Test", "body": "Test body"})),
        )
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let article: Article = client
        .melds()
        .ensure_and_run_webhook_as(
            EnsureAndRunRequest::new(
                "translate-to-french",
                json!({ "text": "Hello world" }),
                ResponseShape::from_type::<Article>(),
            )
            .with_template(json!({ "instructions": "Convert text to formal French." })),
        )
        .await
        .expect("run should succeed");

    assert_eq!(
        article,
        Article {
            title: "Test".into(),
            body: "Test body".into()
        }
    );
}

#[tokio::test]
async fn plain_text_response_is_returned_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/meld-run/sync"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("plain text response", "text/plain"),
        )
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let output = client
        .melds()
        .ensure_and_run_webhook(translate_request())
        .await
        .expect("run should succeed");

    assert_eq!(output.as_text(), Some("plain text response"));
}

#[tokio::test]
async fn request_body_carries_literal_shape_unchanged() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/meld-run/sync"))
        .and(body_json(json!({
            "name": "translate-to-french",
            "input": { "text": "Good morning!" },
            "responseObject": { "translation": "" },
            "metadata": { "userId": 123 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"translation": "Bonjour"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    client
        .melds()
        .ensure_and_run_webhook(translate_request().with_metadata(json!({ "userId": 123 })))
        .await
        .expect("run should succeed");
}

#[tokio::test]
async fn schema_shape_is_sent_as_named_json_schema() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/meld-run/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    client
        .melds()
        .ensure_and_run_webhook(EnsureAndRunRequest::new(
            "article",
            json!({ "topic": "rust" }),
            ResponseShape::from_type::<Article>(),
        ))
        .await
        .expect("run should succeed");

    let received = server.received_requests().await.expect("recording enabled");
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).expect("json body");
    assert_eq!(body["responseObject"]["$ref"], "#/definitions/responseObject");
    assert_eq!(
        body["responseObject"]["definitions"]["responseObject"]["properties"]["title"]["type"],
        "string"
    );
}

#[tokio::test]
async fn async_mode_posts_to_callback_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/meld-run"))
        .and(body_json(json!({
            "name": "translate-to-french",
            "input": { "text": "Good morning!" },
            "responseObject": { "translation": "" },
            "callbackUrl": "https://example.com/cb"
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"runId": "run_1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let ack = client
        .melds()
        .ensure_and_run_webhook(
            translate_request()
                .with_mode(Mode::Async)
                .with_callback_url("https://example.com/cb"),
        )
        .await
        .expect("run should be accepted");

    assert_eq!(ack.as_json().and_then(|v| v["runId"].as_str()), Some("run_1"));
}

#[tokio::test]
async fn localhost_base_drops_api_prefix() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/meld-run/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri().replace("127.0.0.1", "localhost");
    let client = client_for(base, Some(TEST_KEY));
    client
        .melds()
        .ensure_and_run_webhook(translate_request())
        .await
        .expect("run should succeed");
}

#[tokio::test]
async fn api_error_carries_status_run_id_and_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/meld-run/sync"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"message": "API Error", "statusCode": 400}))
                .insert_header("X-Run-Id", "req-123"),
        )
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let err = client
        .melds()
        .ensure_and_run_webhook(translate_request())
        .await
        .expect_err("400 should fail");

    assert_eq!(err.status(), Some(400));
    assert_eq!(err.run_id(), Some("req-123"));
    match err {
        Error::Api(api) => {
            assert_eq!(api.message, "API Error");
            assert_eq!(
                api.data,
                Some(RunOutput::Json(json!({"message": "API Error", "statusCode": 400})))
            );
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn api_error_without_message_uses_status_template() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/meld-run/sync"))
        .respond_with(ResponseTemplate::new(503).set_body_raw("unavailable", "text/html"))
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let err = client
        .melds()
        .ensure_and_run_webhook(translate_request())
        .await
        .expect_err("503 should fail");

    match err {
        Error::Api(api) => {
            assert_eq!(api.status, 503);
            assert_eq!(api.message, "Meld API request failed with status 503");
            assert_eq!(api.run_id, None);
            assert_eq!(api.data, Some(RunOutput::Text("unavailable".into())));
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_api_key_fails_without_network_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(server.uri(), None);
    let err = client
        .melds()
        .ensure_and_run_webhook(translate_request())
        .await
        .expect_err("missing key should fail");

    assert!(matches!(err, Error::Config(ref msg) if msg.contains("MELD_API_KEY")));
}

#[tokio::test]
async fn async_without_callback_fails_without_network_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let err = client
        .melds()
        .ensure_and_run_webhook(translate_request().with_mode(Mode::Async))
        .await
        .expect_err("async without callback should fail");

    match err {
        Error::Validation(v) => assert_eq!(v.message, "callbackUrl is required for async mode"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_request_is_rejected_before_credential_check() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(server.uri(), None);
    let err = client
        .melds()
        .ensure_and_run_webhook(translate_request().with_mode(Mode::Async))
        .await
        .expect_err("invalid request without key should fail");

    match err {
        Error::Validation(v) => assert_eq!(v.message, "callbackUrl is required for async mode"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_server_times_out_with_408() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/meld-run/sync"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"late": true}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let err = client
        .melds()
        .ensure_and_run_webhook(translate_request().with_timeout(Duration::from_millis(50)))
        .await
        .expect_err("slow response should time out");

    assert!(err.is_timeout());
    assert_eq!(err.status(), Some(408));
    match err {
        Error::Transport(te) => assert_eq!(te.message, "Request timed out"),
        other => panic!("expected transport error, got {other:?}"),
    }
}
