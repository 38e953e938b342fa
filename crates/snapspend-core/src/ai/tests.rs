//! Gateway tests against the mock Gemini server

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};

use super::retry::RecordingSleeper;
use super::{AIBackend, GeminiBackend};
use crate::config::GatewayConfig;
use crate::error::Error;
use crate::models::{Category, ChatTurn, Receipt};
use crate::prompts::PromptLibrary;
use crate::test_utils::{error_body, ok, overloaded, rate_limited, MockGeminiServer};

fn backend(server: &MockGeminiServer, sleeper: Arc<RecordingSleeper>) -> GeminiBackend {
    let config = GatewayConfig::default()
        .with_base_url(&server.url())
        .with_api_key("test-key");
    GeminiBackend::new(config)
        .with_sleeper(sleeper)
        .with_prompts(PromptLibrary::embedded_only())
}

fn receipt(n: i64) -> Receipt {
    Receipt {
        id: format!("r{}", n),
        owner_id: "default_user".into(),
        image_path: format!("receipts/{}.jpg", n),
        total_amount: 5.0,
        date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        time: "08:00".into(),
        store_name: format!("Shop{}", n),
        category: Category::Transport,
        items: vec![],
        created_at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() + ChronoDuration::minutes(n),
    }
}

const RECEIPT_REPLY: &str = r#"Here is what I found:
```json
{"totalAmount": "R$ 12,50", "date": "2024-03-10", "time": "18:05",
 "storeName": "Padaria {Central}", "category": "alimentação",
 "items": [{"name": "Pão", "quantity": 4, "price": 0.75}]}
```"#;

#[tokio::test]
async fn test_extract_receipt_request_shape_and_parse() {
    let server = MockGeminiServer::start(vec![ok(RECEIPT_REPLY)]).await;
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = backend(&server, sleeper.clone());

    let receipt = client
        .extract_receipt(b"\xff\xd8\xffjpeg", "image/jpeg")
        .await
        .unwrap();

    assert_eq!(receipt.total_amount, Some(12.5));
    assert_eq!(receipt.store_name.as_deref(), Some("Padaria {Central}"));
    assert_eq!(receipt.category, Some(Category::Food));
    assert_eq!(receipt.items[0].unit_price, 0.75);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].path,
        "/v1beta/models/gemini-2.0-flash-exp:generateContent"
    );
    assert_eq!(requests[0].query.as_deref(), Some("key=test-key"));

    let body = &requests[0].body;
    let parts = &body["contents"][0]["parts"];
    assert!(parts[0]["text"].as_str().unwrap().contains("totalAmount"));
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
    assert_eq!(parts[1]["inlineData"]["data"], "/9j/anBlZw==");

    let generation = &body["generationConfig"];
    assert!((generation["temperature"].as_f64().unwrap() - 0.4).abs() < 1e-6);
    assert_eq!(generation["topK"], 32);
    assert_eq!(generation["maxOutputTokens"], 2048);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_extract_retries_rate_limit_with_floor() {
    let server =
        MockGeminiServer::start(vec![rate_limited(), rate_limited(), ok(RECEIPT_REPLY)]).await;
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = backend(&server, sleeper.clone());

    let receipt = client.extract_receipt(b"img", "image/jpeg").await.unwrap();

    assert_eq!(receipt.total_amount, Some(12.5));
    assert_eq!(server.request_count(), 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_secs(5), Duration::from_secs(5)]
    );
}

#[tokio::test]
async fn test_extract_exhausts_on_persistent_503() {
    let server = MockGeminiServer::start(vec![overloaded(), overloaded(), overloaded()]).await;
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = backend(&server, sleeper.clone());

    let err = client
        .extract_receipt(b"img", "image/jpeg")
        .await
        .unwrap_err();

    match err {
        Error::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, Error::ServiceUnavailable { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(server.request_count(), 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_millis(2000), Duration::from_millis(4000)]
    );
}

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let server = MockGeminiServer::start(vec![(
        400,
        error_body(400, "Invalid JSON payload received.", "INVALID_ARGUMENT"),
    )])
    .await;
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = backend(&server, sleeper.clone());

    let err = client
        .extract_receipt(b"img", "image/jpeg")
        .await
        .unwrap_err();

    match err {
        Error::ClientError { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Malformed request. Check the message format.");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(server.request_count(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_model_not_found() {
    let server = MockGeminiServer::start(vec![(
        404,
        error_body(404, "models/nope is not found", "NOT_FOUND"),
    )])
    .await;
    let client = backend(&server, Arc::new(RecordingSleeper::new())).with_model("nope");

    let err = client.generate_insights(&[]).await.unwrap_err();
    assert!(err.to_string().contains("Model not found"));
    assert_eq!(
        server.requests()[0].path,
        "/v1beta/models/nope:generateContent"
    );
}

#[tokio::test]
async fn test_extract_malformed_reply() {
    let server = MockGeminiServer::start(vec![ok("Sorry, the photo is too blurry.")]).await;
    let client = backend(&server, Arc::new(RecordingSleeper::new()));

    let err = client
        .extract_receipt(b"img", "image/jpeg")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)));
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn test_envelope_without_candidates() {
    let server = MockGeminiServer::start(vec![(200, r#"{"candidates": []}"#.to_string())]).await;
    let client = backend(&server, Arc::new(RecordingSleeper::new()));

    let err = client.generate_insights(&[]).await.unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)));
}

#[tokio::test]
async fn test_insights_returned_verbatim() {
    let reply = "📊 Overview\n\n1. You spent most on food.\n";
    let server = MockGeminiServer::start(vec![ok(reply)]).await;
    let client = backend(&server, Arc::new(RecordingSleeper::new()));

    let text = client.generate_insights(&[receipt(1)]).await.unwrap();
    assert_eq!(text, reply);

    let body = &server.requests()[0].body;
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Total spent: R$ 5.00"));
    assert!(prompt.contains("Number of purchases: 1"));
    assert!(
        (body["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6
    );
}

#[tokio::test]
async fn test_insights_with_no_receipts() {
    let server = MockGeminiServer::start(vec![ok("Nothing to analyse yet.")]).await;
    let client = backend(&server, Arc::new(RecordingSleeper::new()));

    let text = client.generate_insights(&[]).await.unwrap();
    assert_eq!(text, "Nothing to analyse yet.");
    let body = &server.requests()[0].body;
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Number of purchases: 0"));
}

#[tokio::test]
async fn test_chat_single_turn_without_history() {
    let server = MockGeminiServer::start(vec![ok("You spent R$ 5.00.")]).await;
    let client = backend(&server, Arc::new(RecordingSleeper::new()));

    let reply = client
        .chat("How much did I spend?", &[receipt(1)], &[])
        .await
        .unwrap();
    assert_eq!(reply, "You spent R$ 5.00.");

    let body = &server.requests()[0].body;
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0]["role"], "user");
    let text = contents[0]["parts"][0]["text"].as_str().unwrap();
    assert!(text.contains("1. [2024-02-01] Shop1 - R$ 5.00 (transport)"));
    assert!(text.ends_with("\n\nHow much did I spend?"));
}

#[tokio::test]
async fn test_chat_replays_history() {
    let server = MockGeminiServer::start(vec![ok("Sure.")]).await;
    let client = backend(&server, Arc::new(RecordingSleeper::new()));
    let history = vec![ChatTurn::user("Hi"), ChatTurn::assistant("Hello! How can I help?")];

    client
        .chat("Show my transport spending", &[receipt(1)], &history)
        .await
        .unwrap();

    let body = &server.requests()[0].body;
    let contents = body["contents"].as_array().unwrap();
    let roles: Vec<&str> = contents
        .iter()
        .map(|c| c["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["user", "user", "model", "user"]);
    assert_eq!(contents[2]["parts"][0]["text"], "Hello! How can I help?");
    assert_eq!(contents[3]["parts"][0]["text"], "Show my transport spending");
}

#[tokio::test]
async fn test_chat_context_capped_at_fifty_receipts() {
    let server = MockGeminiServer::start(vec![ok("ok")]).await;
    let client = backend(&server, Arc::new(RecordingSleeper::new()));
    let receipts: Vec<Receipt> = (1..=60).map(receipt).collect();

    client.chat("Summary?", &receipts, &[]).await.unwrap();

    let body = &server.requests()[0].body;
    let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(text.contains("Total receipts: 60"));
    assert!(text.contains("Total amount spent: R$ 300.00"));
    assert!(text.contains("DETAILED RECEIPTS (50 most recent)"));
    assert!(text.contains("1. [2024-02-01] Shop60 "));
    assert!(text.contains("50. [2024-02-01] Shop11 "));
    assert!(!text.contains("51. "));
    assert!(!text.contains("Shop10 "));
}

#[tokio::test]
async fn test_chat_recovers_from_single_503() {
    let server = MockGeminiServer::start(vec![overloaded(), ok("Back online.")]).await;
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = backend(&server, sleeper.clone());

    let reply = client.chat("hi", &[], &[]).await.unwrap();
    assert_eq!(reply, "Back online.");
    assert_eq!(sleeper.delays(), vec![Duration::from_millis(1000)]);
}

#[tokio::test]
async fn test_quota_probe_success() {
    let server = MockGeminiServer::start(vec![ok("OK\n")]).await;
    let client = backend(&server, Arc::new(RecordingSleeper::new()));

    let status = client.check_quota().await.unwrap();
    assert_eq!(status.reply, "OK");
    assert_eq!(status.model, "gemini-2.0-flash-exp");

    let body = &server.requests()[0].body;
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Say \"OK\"");
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 5);
}

#[tokio::test]
async fn test_quota_probe_does_not_retry() {
    let server = MockGeminiServer::start(vec![rate_limited(), ok("OK")]).await;
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = backend(&server, sleeper.clone());

    let err = client.check_quota().await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }));
    assert!(err.to_string().contains("15 req/min or 1500 req/day"));
    assert_eq!(server.request_count(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_missing_api_key_sends_nothing() {
    let server = MockGeminiServer::start(vec![ok("unused")]).await;
    let config = GatewayConfig::default().with_base_url(&server.url());
    let client = GeminiBackend::new(config).with_prompts(PromptLibrary::embedded_only());

    let err = client.generate_insights(&[]).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn test_request_timeout_comes_from_config() {
    // Accepts connections and never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = GatewayConfig::default()
        .with_base_url(&format!("http://{}", addr))
        .with_api_key("test-key")
        .with_timeout(Duration::from_millis(200));
    assert_eq!(config.timeout, Duration::from_millis(200));
    let client = GeminiBackend::new(config)
        .with_sleeper(Arc::new(RecordingSleeper::new()))
        .with_prompts(PromptLibrary::embedded_only());

    let err = tokio::time::timeout(Duration::from_secs(10), client.generate_insights(&[]))
        .await
        .expect("configured timeout was not applied")
        .unwrap_err();
    assert!(matches!(err, Error::Network(ref e) if e.is_timeout()));

    silent.abort();
}
