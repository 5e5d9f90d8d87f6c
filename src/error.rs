//! 中继错误类型
//!
//! 统一的错误枚举，按 OpenAI 风格序列化为 JSON 错误响应。
//! 上游错误细节只进日志，不回传给客户端。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// 中继层错误
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// 请求体不是合法 JSON
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// 缺少或无效的 Authorization 头
    #[error("missing or invalid authorization header")]
    MissingAuth,

    /// 上游连接失败
    #[error("upstream connection failed: {0}")]
    UpstreamConnect(String),

    /// 上游请求超时
    #[error("upstream request timed out: {0}")]
    UpstreamTimeout(String),

    /// 上游返回非 2xx 状态
    #[error("upstream returned status {status}")]
    UpstreamStatus { status: u16, body: Option<String> },
}

impl RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MissingAuth => StatusCode::UNAUTHORIZED,
            Self::UpstreamConnect(_) | Self::UpstreamTimeout(_) | Self::UpstreamStatus { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// 回传给客户端的文案；上游细节不外泄
    fn client_message(&self) -> String {
        match self {
            Self::InvalidRequest(msg) => msg.clone(),
            Self::MissingAuth => "Missing or invalid Authorization header".to_string(),
            Self::UpstreamConnect(_) | Self::UpstreamTimeout(_) => {
                "Failed to call upstream".to_string()
            }
            Self::UpstreamStatus { .. } => "Upstream error".to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        if let Self::UpstreamStatus { status, body } = &self {
            log::debug!("[Relay] 上游错误响应: status={status}, body={body:?}");
        }
        let body = Json(json!({
            "error": {
                "message": self.client_message(),
                "type": "invalid_request_error",
            }
        }));
        (self.status_code(), body).into_response()
    }
}
