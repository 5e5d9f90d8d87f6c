//! HTTP 请求处理器
//!
//! OpenAI 兼容端点的入口：鉴权、归一化，然后驱动翻译管道。

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::emitter::{collect_completion, sse_response_stream};
use crate::error::RelayError;
use crate::models::ModelsResponse;
use crate::openai::{CanonicalRequest, ChatRequest};
use crate::server::AppState;
use crate::upstream::client::call_upstream;
use crate::upstream::request::{build_upstream_request, SessionContext};

/// 健康检查
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// 根路径重定向到上游站点
pub async fn root_redirect() -> Redirect {
    Redirect::to("https://z.ai/")
}

/// GET /v1/models
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let data = state.models.models().await;
    Json(ModelsResponse {
        object: "list".to_string(),
        data,
    })
}

/// 校验 Bearer 凭证存在
///
/// 只检查存在性，不校验取值，以兼容任意 OpenAI 客户端。
fn require_bearer(headers: &HeaderMap) -> Result<(), RelayError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(RelayError::MissingAuth)?;
    let token = value.strip_prefix("Bearer ").ok_or(RelayError::MissingAuth)?;
    if token.is_empty() {
        return Err(RelayError::MissingAuth);
    }
    Ok(())
}

/// POST /v1/chat/completions 与 /v1/completions
///
/// completions 的 prompt 字段在归一化阶段映射为消息，两个端点
/// 共用同一条管道。
pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    require_bearer(&headers)?;

    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        log::debug!("[Relay] JSON解析失败: {e}");
        RelayError::InvalidRequest("Invalid JSON".to_string())
    })?;

    run_pipeline(state, request).await
}

/// 翻译管道：归一化 → 模型解析 → 上游调用 → 发射
async fn run_pipeline(state: AppState, request: ChatRequest) -> Result<Response, RelayError> {
    let config = &state.config;
    let CanonicalRequest {
        model,
        messages,
        stream,
        thinking_enabled,
    } = request.normalize(config);

    let upstream_model_id = state.models.resolve_upstream_id(&model).await;
    let ctx = SessionContext::generate();
    log::debug!(
        "[Relay] 请求解析成功 - 模型: {model} (映射后: {upstream_model_id}), 流式: {stream}, 消息数: {} (chat_id={})",
        messages.len(),
        ctx.chat_id
    );

    let upstream_request = build_upstream_request(
        &upstream_model_id,
        &model,
        messages,
        thinking_enabled,
        &ctx,
    );

    // 每次对话单独取 token，不跨请求缓存
    let token = state.token.acquire().await;
    let response = call_upstream(&state.http, config, &upstream_request, &ctx, &token).await?;

    if stream {
        let frames = sse_response_stream(response.bytes_stream(), model, config.think_mode);
        let response = Response::builder()
            .header(header::CONTENT_TYPE, "text/event-stream; charset=utf-8")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .body(Body::from_stream(frames))
            .unwrap();
        Ok(response)
    } else {
        let completion =
            collect_completion(response.bytes_stream(), &model, config.think_mode).await;
        Ok(Json(completion).into_response())
    }
}
