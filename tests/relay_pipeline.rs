//! 端到端管道测试
//!
//! 在进程内启动一个假上游服务与中继路由，验证完整的翻译链路：
//! 归一化 → 模型映射 → 上游调用 → SSE 解析 → 内容转换 → 发射。

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use zai_relay::config::RelayConfig;
use zai_relay::server::{build_router, AppState};
use zai_relay::transform::ThinkMode;

/// 假上游：记录最近一次收到的请求体，按首条消息内容选择剧本
#[derive(Clone, Default)]
struct FakeUpstream {
    last_request: Arc<Mutex<Option<Value>>>,
}

fn sse_body(lines: &[Value]) -> Response {
    let body: String = lines.iter().map(|l| format!("data: {l}\n")).collect();
    Response::builder()
        .header("Content-Type", "text/event-stream")
        .body(Body::from(body))
        .unwrap()
}

async fn fake_chat(State(upstream): State<FakeUpstream>, Json(body): Json<Value>) -> Response {
    let scenario = body["messages"][0]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();
    *upstream.last_request.lock().unwrap() = Some(body);

    match scenario.as_str() {
        "upstream-error" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        "no-done" => sse_body(&[
            json!({"data": {"phase": "answer", "delta_content": "partial"}}),
        ]),
        "protocol-error" => sse_body(&[
            json!({"data": {"phase": "answer", "delta_content": "before"}}),
            json!({"error": {"code": 500, "detail": "secret detail"}}),
        ]),
        _ => sse_body(&[
            json!({"data": {"phase": "thinking", "delta_content": "<details><summary>s</summary>\n> hello\n> world</details>"}}),
            json!({"data": {"phase": "answer", "delta_content": " done", "done": true}}),
        ]),
    }
}

async fn fake_models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [
            {
                "id": "GLM-4.5",
                "name": "GLM-4.5",
                "object": "model",
                "owned_by": "z.ai",
                "info": {"is_active": true, "created_at": 1700000000}
            }
        ]
    }))
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

struct TestRelay {
    base: String,
    upstream: FakeUpstream,
    client: reqwest::Client,
}

async fn start_relay() -> TestRelay {
    let upstream = FakeUpstream::default();
    let upstream_router = Router::new()
        .route("/api/chat/completions", post(fake_chat))
        .route("/api/models", get(fake_models))
        .with_state(upstream.clone());
    let upstream_addr = spawn(upstream_router).await;

    let config = RelayConfig {
        upstream_url: format!("http://{upstream_addr}/api/chat/completions"),
        models_url: format!("http://{upstream_addr}/api/models"),
        upstream_token: "integration-token".to_string(),
        anon_token_enabled: false,
        think_mode: ThinkMode::Strip,
        ..RelayConfig::default()
    };
    let relay_addr = spawn(build_router(AppState::new(config))).await;

    TestRelay {
        base: format!("http://{relay_addr}"),
        upstream,
        client: reqwest::Client::new(),
    }
}

impl TestRelay {
    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{path}", self.base))
            .header("Authorization", "Bearer sk-test")
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    fn last_upstream_request(&self) -> Value {
        self.upstream.last_request.lock().unwrap().clone().unwrap()
    }
}

fn chat_body(model: &str, content: &str, stream: bool) -> Value {
    json!({
        "model": model,
        "messages": [{"role": "user", "content": content}],
        "stream": stream
    })
}

fn frames_of(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

fn frame_json(frame: &str) -> Value {
    serde_json::from_str(frame.strip_prefix("data: ").unwrap()).unwrap()
}

#[tokio::test]
async fn buffered_response_aggregates_and_echoes_requested_model() {
    let relay = start_relay().await;
    let response = relay
        .post("/v1/chat/completions", chat_body("unknown-id", "hi", false))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["model"], "unknown-id");
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], "hello\nworld done");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["total_tokens"], 0);

    // 未知模型映射到默认上游模型，但 model_item.name 保留原始 ID
    let upstream = relay.last_upstream_request();
    assert_eq!(upstream["model"], "0727-360B-API");
    assert_eq!(upstream["model_item"]["id"], "0727-360B-API");
    assert_eq!(upstream["model_item"]["name"], "unknown-id");
    // 上游恒为流式
    assert_eq!(upstream["stream"], true);
}

#[tokio::test]
async fn known_model_passes_through_to_upstream() {
    let relay = start_relay().await;
    relay
        .post("/v1/chat/completions", chat_body("GLM-4.5", "hi", false))
        .await;
    assert_eq!(relay.last_upstream_request()["model"], "GLM-4.5");
}

#[tokio::test]
async fn streaming_emits_role_content_finish_sentinel() {
    let relay = start_relay().await;
    let response = relay
        .post("/v1/chat/completions", chat_body("GLM-4.5", "hi", true))
        .await;

    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let body = response.text().await.unwrap();
    let frames = frames_of(&body);
    assert_eq!(frames.len(), 5);

    assert_eq!(frame_json(&frames[0])["choices"][0]["delta"]["role"], "assistant");
    assert_eq!(frame_json(&frames[1])["choices"][0]["delta"]["content"], "hello\nworld");
    assert_eq!(frame_json(&frames[2])["choices"][0]["delta"]["content"], " done");
    assert_eq!(frame_json(&frames[3])["choices"][0]["finish_reason"], "stop");
    assert_eq!(frames[4], "data: [DONE]");

    // 每个块都回显请求的模型 ID
    for frame in &frames[..4] {
        assert_eq!(frame_json(frame)["model"], "GLM-4.5");
    }
}

#[tokio::test]
async fn stream_default_applies_when_client_omits_flag() {
    let relay = start_relay().await;
    let response = relay
        .post(
            "/v1/chat/completions",
            json!({"model": "GLM-4.5", "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;

    // 默认配置下未指定 stream 走流式
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));
}

#[tokio::test]
async fn missing_auth_rejected_with_401() {
    let relay = start_relay().await;
    let response = relay
        .client
        .post(format!("{}/v1/chat/completions", relay.base))
        .json(&chat_body("GLM-4.5", "hi", false))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn invalid_json_rejected_with_400() {
    let relay = start_relay().await;
    let response = relay
        .client
        .post(format!("{}/v1/chat/completions", relay.base))
        .header("Authorization", "Bearer sk-test")
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Invalid JSON");
}

#[tokio::test]
async fn upstream_http_error_surfaces_as_opaque_502() {
    let relay = start_relay().await;
    let response = relay
        .post(
            "/v1/chat/completions",
            chat_body("GLM-4.5", "upstream-error", false),
        )
        .await;

    assert_eq!(response.status(), 502);
    let body = response.text().await.unwrap();
    assert!(body.contains("Upstream error"));
    // 上游响应体不外泄
    assert!(!body.contains("boom"));
}

#[tokio::test]
async fn upstream_protocol_error_terminates_stream_gracefully() {
    let relay = start_relay().await;
    let response = relay
        .post(
            "/v1/chat/completions",
            chat_body("GLM-4.5", "protocol-error", true),
        )
        .await;

    // 协议级错误不是 HTTP 错误：正常 200 + finish + [DONE]
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    let frames = frames_of(&body);

    assert_eq!(frame_json(&frames[1])["choices"][0]["delta"]["content"], "before");
    assert_eq!(frame_json(&frames[2])["choices"][0]["finish_reason"], "stop");
    assert_eq!(frames.last().unwrap(), "data: [DONE]");
    assert!(!body.contains("secret detail"));
}

#[tokio::test]
async fn upstream_close_without_done_streaming_regression() {
    // 上游连接在无终止事件时关闭：不补发 finish 块与 [DONE]
    let relay = start_relay().await;
    let response = relay
        .post("/v1/chat/completions", chat_body("GLM-4.5", "no-done", true))
        .await;

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    let frames = frames_of(&body);

    assert_eq!(frames.len(), 2);
    assert_eq!(frame_json(&frames[1])["choices"][0]["delta"]["content"], "partial");
    assert!(!body.contains("[DONE]"));
    assert!(!body.contains("finish_reason"));
}

#[tokio::test]
async fn upstream_close_without_done_buffered_returns_partial_content() {
    let relay = start_relay().await;
    let response = relay
        .post("/v1/chat/completions", chat_body("GLM-4.5", "no-done", false))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["choices"][0]["message"]["content"], "partial");
}

#[tokio::test]
async fn completions_endpoint_maps_prompt_to_user_message() {
    let relay = start_relay().await;
    let response = relay
        .post(
            "/v1/completions",
            json!({"model": "GLM-4.5", "prompt": "hi", "stream": false}),
        )
        .await;

    assert_eq!(response.status(), 200);
    let upstream = relay.last_upstream_request();
    assert_eq!(upstream["messages"][0]["role"], "user");
    assert_eq!(upstream["messages"][0]["content"], "hi");
}

#[tokio::test]
async fn thinking_flag_forwarded_in_features() {
    let relay = start_relay().await;
    relay
        .post(
            "/v1/chat/completions",
            json!({
                "model": "GLM-4.5",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false,
                "enable_thinking": false
            }),
        )
        .await;

    let upstream = relay.last_upstream_request();
    assert_eq!(upstream["features"]["enable_thinking"], false);
    assert_eq!(upstream["background_tasks"]["title_generation"], false);
    assert_eq!(upstream["background_tasks"]["tags_generation"], false);
}

#[tokio::test]
async fn models_endpoint_lists_directory() {
    let relay = start_relay().await;
    let response = relay
        .client
        .get(format!("{}/v1/models", relay.base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["object"], "list");
    assert_eq!(body["data"][0]["id"], "GLM-4.5");
}

#[tokio::test]
async fn alias_routes_reach_same_pipeline() {
    let relay = start_relay().await;
    for path in ["/api/v1/chat/completions", "/hf/v1/chat/completions"] {
        let response = relay.post(path, chat_body("GLM-4.5", "hi", false)).await;
        assert_eq!(response.status(), 200, "alias route {path} failed");
    }
}
