//! 上游网络调用
//!
//! 携带浏览器指纹头与会话级 Referer 向上游发起流式请求。
//! 每个入站请求恰好一次上游调用，不重试。

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};

use super::request::{SessionContext, UpstreamRequest};
use crate::config::RelayConfig;
use crate::error::RelayError;

/// 上游站点 Origin
pub const ORIGIN_BASE: &str = "https://chat.z.ai";

/// 前端版本号（抓包值）
pub const X_FE_VERSION: &str = "prod-fe-1.0.70";

/// 浏览器 User-Agent（抓包值）
pub const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36 Edg/139.0.0.0";

pub const SEC_CH_UA: &str =
    "\"Not;A=Brand\";v=\"99\", \"Microsoft Edge\";v=\"139\", \"Chromium\";v=\"139\"";
pub const SEC_CH_UA_MOBILE: &str = "?0";
pub const SEC_CH_UA_PLATFORM: &str = "\"Windows\"";

/// 浏览器指纹请求头（固定值）
pub fn fingerprint_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("User-Agent", HeaderValue::from_static(BROWSER_UA));
    headers.insert("X-FE-Version", HeaderValue::from_static(X_FE_VERSION));
    headers.insert("sec-ch-ua", HeaderValue::from_static(SEC_CH_UA));
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static(SEC_CH_UA_MOBILE));
    headers.insert(
        "sec-ch-ua-platform",
        HeaderValue::from_static(SEC_CH_UA_PLATFORM),
    );
    headers.insert("Origin", HeaderValue::from_static(ORIGIN_BASE));
    headers
}

/// 调用上游 chat completions
pub async fn call_upstream(
    client: &Client,
    config: &RelayConfig,
    request: &UpstreamRequest,
    ctx: &SessionContext,
    token: &str,
) -> Result<Response, RelayError> {
    log::debug!(
        "[Upstream] 调用上游: {} (chat_id={})",
        config.upstream_url,
        ctx.chat_id
    );

    let response = client
        .post(&config.upstream_url)
        .headers(fingerprint_headers())
        .header("Content-Type", "application/json")
        .header("Accept", "application/json, text/event-stream")
        .header("Accept-Language", "zh-CN")
        .header("Authorization", format!("Bearer {token}"))
        .header("Referer", format!("{ORIGIN_BASE}/c/{}", ctx.chat_id))
        .json(request)
        .send()
        .await
        .map_err(|e| {
            log::error!("[Upstream] 请求失败: {e}");
            if e.is_timeout() {
                RelayError::UpstreamTimeout(e.to_string())
            } else {
                RelayError::UpstreamConnect(e.to_string())
            }
        })?;

    let status = response.status();
    log::debug!("[Upstream] 上游响应状态: {status}");

    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.ok();
        Err(RelayError::UpstreamStatus {
            status: status.as_u16(),
            body,
        })
    }
}
