//! 上游凭证获取
//!
//! 每次对话向上游申请一个独立的匿名 token，避免会话间共享记忆；
//! 获取失败或功能关闭时回退到配置的固定 token。

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::upstream::client::{fingerprint_headers, ORIGIN_BASE};

/// 匿名 token 响应
#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: String,
}

/// token 提供者
#[derive(Debug, Clone)]
pub struct TokenProvider {
    client: Client,
    fallback_token: String,
    anon_enabled: bool,
}

impl TokenProvider {
    pub fn new(client: Client, config: &RelayConfig) -> Self {
        Self {
            client,
            fallback_token: config.upstream_token.clone(),
            anon_enabled: config.anon_token_enabled,
        }
    }

    /// 获取本次对话使用的 token
    ///
    /// 每个请求调用一次，不跨请求缓存。
    pub async fn acquire(&self) -> String {
        if self.anon_enabled {
            match self.fetch_anonymous().await {
                Ok(token) => {
                    log::debug!("[Token] 匿名token获取成功: {}...", truncate(&token, 10));
                    return token;
                }
                Err(e) => {
                    log::debug!("[Token] 匿名token获取失败，回退固定token: {e}");
                }
            }
        }
        self.fallback_token.clone()
    }

    async fn fetch_anonymous(&self) -> Result<String, String> {
        let response = self
            .client
            .get(format!("{ORIGIN_BASE}/api/v1/auths/"))
            .timeout(Duration::from_secs(10))
            .headers(fingerprint_headers())
            .header("Accept", "*/*")
            .header("Accept-Language", "zh-CN,zh;q=0.9")
            .header("Referer", format!("{ORIGIN_BASE}/"))
            .send()
            .await
            .map_err(|e| format!("请求失败: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("anon token status={status}"));
        }

        let body: AuthResponse = response
            .json()
            .await
            .map_err(|e| format!("解析失败: {e}"))?;
        if body.token.is_empty() {
            return Err("anon token empty".to_string());
        }
        Ok(body.token)
    }
}

fn truncate(s: &str, n: usize) -> &str {
    if s.len() > n {
        &s[..n]
    } else {
        s
    }
}
