//! AI completion route integration tests
//!
//! Providers are scripted; streamed answers arrive in small chunks so
//! escapes split across chunk boundaries are exercised.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use helpers::{json_request, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_ai_routes_require_session() {
    let app = TestApp::new().await;

    for uri in [
        "/api/ai/chat/chatgpt",
        "/api/ai/chat/claude",
        "/api/ai/completion/company",
        "/api/ai/completion/suggested-topics",
        "/api/ai/completion/query",
    ] {
        let (status, body) = app.send(json_request(uri, None, json!({ "prompt": "hi" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"], "Unauthorized");
    }
    assert!(app.openai.requests().is_empty());
}

#[tokio::test]
async fn test_chat_streams_provider_text() {
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;
    app.anthropic.push("Acme Bank is a digital bank headquartered in Madrid.");

    let (status, text) = app
        .send_text(json_request(
            "/api/ai/chat/claude",
            Some(&token),
            json!({ "prompt": "Who is Acme Bank?" }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Acme Bank is a digital bank headquartered in Madrid.");

    let requests = app.anthropic.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].web_search);
    assert_eq!(requests[0].messages[0].content, "Who is Acme Bank?");
}

#[tokio::test]
async fn test_chat_requires_prompt() {
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;

    let (status, body) = app
        .send(json_request("/api/ai/chat/chatgpt", Some(&token), json!({ "prompt": "  " })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Prompt is required");
}

#[tokio::test]
async fn test_company_profile_validates_url() {
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;

    let (status, body) = app
        .send(json_request("/api/ai/completion/company", Some(&token), json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Company website url is required");

    let (status, body) = app
        .send(json_request(
            "/api/ai/completion/company",
            Some(&token),
            json!({ "websiteUrl": "not a url" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid company website url");
}

#[tokio::test]
async fn test_company_profile_decodes_and_drops_unknown_sector() {
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;
    app.openai.push(
        r#"```json
{"name":"Caf\u0000e9 Madrid","country":"Spain","language":"Spanish","sector":"coffee","description":"Coffee chain","website":"https://cafe.example"}
```"#,
    );

    let (status, body) = app
        .send(json_request(
            "/api/ai/completion/company",
            Some(&token),
            json!({ "websiteUrl": "cafe.example" }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "Café Madrid");
    assert!(body["sector"].is_null());

    // The normalized URL reaches the prompt
    let requests = app.openai.requests();
    let last = requests[0].messages.last().unwrap();
    assert!(last.content.ends_with("https://cafe.example"));
}

#[tokio::test]
async fn test_suggested_topics_stream_decodes_split_escapes() {
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;
    // Chunks of 7 characters split each escape
    app.openai
        .push(r#"{"topic_1":"Inversi\u00f3n","description_1":"\u00bfQu\u00e9 fondos?"}"#);

    let (status, text) = app
        .send_text(json_request(
            "/api/ai/completion/suggested-topics",
            Some(&token),
            json!({ "name": "Acme Bank", "websiteUrl": "https://acmebank.example" }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, r#"{"topic_1":"Inversión","description_1":"¿Qué fondos?"}"#);
}

#[tokio::test]
async fn test_suggested_topics_validates_url() {
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;

    let (status, body) = app
        .send(json_request(
            "/api/ai/completion/suggested-topics",
            Some(&token),
            json!({ "name": "Acme Bank" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Company website url is required");

    let (status, body) = app
        .send(json_request(
            "/api/ai/completion/suggested-topics",
            Some(&token),
            json!({ "name": "Acme Bank", "websiteUrl": "not a url" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid company website url");

    // Rejected before any provider call
    assert!(app.openai.requests().is_empty());
}

#[tokio::test]
async fn test_suggested_topics_prompt_gets_normalized_url() {
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;
    app.openai.push(r#"{"topic_1":"Savings"}"#);

    let (status, _) = app
        .send_text(json_request(
            "/api/ai/completion/suggested-topics",
            Some(&token),
            json!({ "name": "Acme Bank", "websiteUrl": "acmebank.example" }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let requests = app.openai.requests();
    let prompt = &requests[0].messages.last().unwrap().content;
    assert!(prompt.contains("https://acmebank.example"));
}

#[tokio::test]
async fn test_suggested_topics_stream_stays_valid_json() {
    // Given: the model escapes quotes inside a string value
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;
    app.openai.push(r#"{"topics":["a \u0022b\u0022"]}"#);

    // When: the document is streamed in small chunks
    let (status, text) = app
        .send_text(json_request(
            "/api/ai/completion/suggested-topics",
            Some(&token),
            json!({ "name": "Acme Bank", "websiteUrl": "acmebank.example" }),
        ))
        .await;

    // Then: the collected body still parses
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["topics"][0], r#"a "b""#);
}

#[tokio::test]
async fn test_suggested_topics_json_mode() {
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;
    app.openai.push(
        json!({
            "topic_1": "Savings",
            "description_1": "Savings accounts",
            "queries_1": [{ "text": "Best savings rates?", "queryType": "sector" }],
            "topic_2": "Mortgages",
            "description_2": "Home loans"
        })
        .to_string(),
    );

    let request = Request::builder()
        .method("POST")
        .uri("/api/ai/completion/suggested-topics")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json")
        .body(Body::from(
            json!({ "name": "Acme Bank", "websiteUrl": "acmebank.example" }).to_string(),
        ))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let topics = body["topics"].as_array().unwrap();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0]["name"], "Savings");
    assert_eq!(topics[0]["queries"][0]["queryType"], "sector");
    assert_eq!(topics[1]["queries"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_single_query_generation() {
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;

    let (status, body) = app
        .send(json_request(
            "/api/ai/completion/query",
            Some(&token),
            json!({ "companyName": "Acme Bank" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Company name and topic name are required");

    app.openai
        .push(r#"{"text":"Which app has the best budgeting tools?","queryType":"sector"}"#);
    let (status, body) = app
        .send(json_request(
            "/api/ai/completion/query",
            Some(&token),
            json!({
                "companyName": "Acme Bank",
                "topicName": "Mobile Banking",
                "existingQueries": [
                    "How do I transfer money?",
                    { "text": "Does Acme Bank support Apple Pay?", "queryType": "product" }
                ]
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["text"], "Which app has the best budgeting tools?");
    assert_eq!(body["queryType"], "sector");

    let requests = app.openai.requests();
    let prompt = &requests[0].messages.last().unwrap().content;
    assert!(prompt.contains("Does Acme Bank support Apple Pay?"));
}

#[tokio::test]
async fn test_provider_failure_is_bad_gateway() {
    // No scripted response: the provider errors
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;

    let (status, body) = app
        .send(json_request(
            "/api/ai/completion/company",
            Some(&token),
            json!({ "websiteUrl": "acmebank.example" }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
}
