//! 模型目录
//!
//! 从上游拉取可用模型列表并缓存在读多写少的快照里。请求的模型 ID
//! 在目录命中时原样透传给上游，未命中时替换为配置的默认上游模型；
//! 替换只影响上游载荷，客户端可见的 ID 始终是请求原值。

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::RelayConfig;
use crate::token::TokenProvider;
use crate::upstream::client::fingerprint_headers;

/// 对外的模型条目
#[derive(Debug, Clone, Serialize)]
pub struct Model {
    pub id: String,
    pub object: String,
    pub name: String,
    pub created: i64,
    pub owned_by: String,
}

/// GET /v1/models 响应
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<Model>,
}

/// 上游模型列表响应
#[derive(Debug, Deserialize)]
struct UpstreamModelsResponse {
    #[serde(default)]
    data: Vec<UpstreamModel>,
}

#[derive(Debug, Deserialize)]
struct UpstreamModel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    info: UpstreamModelInfo,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamModelInfo {
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    created_at: i64,
}

/// 模型目录：启动后按需拉取，成功后缓存快照
pub struct ModelDirectory {
    client: reqwest::Client,
    token: TokenProvider,
    models_url: String,
    default_upstream_model_id: String,
    cache: RwLock<Option<Vec<Model>>>,
}

impl ModelDirectory {
    pub fn new(client: reqwest::Client, token: TokenProvider, config: &RelayConfig) -> Self {
        Self {
            client,
            token,
            models_url: config.models_url.clone(),
            default_upstream_model_id: config.default_upstream_model_id.clone(),
            cache: RwLock::new(None),
        }
    }

    /// 当前模型列表：优先缓存，缺失时拉取，失败时回退默认列表
    ///
    /// 默认列表不写入缓存，下次仍会尝试拉取。
    pub async fn models(&self) -> Vec<Model> {
        let cached = self.cache.read().await.clone();
        if let Some(models) = cached {
            return models;
        }

        match self.fetch().await {
            Ok(models) if !models.is_empty() => {
                log::debug!("[Models] 获取到{}个模型", models.len());
                *self.cache.write().await = Some(models.clone());
                models
            }
            Ok(_) => self.default_models(),
            Err(e) => {
                log::debug!("[Models] 获取模型列表失败: {e}");
                self.default_models()
            }
        }
    }

    /// 把请求的模型 ID 解析为上游 ID
    pub async fn resolve_upstream_id(&self, requested: &str) -> String {
        let models = self.models().await;
        resolve_against(requested, &models, &self.default_upstream_model_id)
    }

    async fn fetch(&self) -> Result<Vec<Model>, String> {
        let token = self.token.acquire().await;
        let mut request = self
            .client
            .get(&self.models_url)
            .timeout(Duration::from_secs(10))
            .headers(fingerprint_headers())
            .header("Accept", "*/*")
            .header("Accept-Language", "zh-CN,zh;q=0.9");
        if !token.is_empty() {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|e| format!("请求失败: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("模型列表响应状态异常: {status}"));
        }

        let upstream: UpstreamModelsResponse = response
            .json()
            .await
            .map_err(|e| format!("解析失败: {e}"))?;
        Ok(to_models(upstream.data))
    }

    fn default_models(&self) -> Vec<Model> {
        vec![Model {
            id: self.default_upstream_model_id.clone(),
            object: "model".to_string(),
            name: "GLM-4.5".to_string(),
            created: chrono::Utc::now().timestamp(),
            owned_by: "z.ai".to_string(),
        }]
    }
}

/// 纯解析逻辑：目录命中原样返回，未命中回退默认上游 ID
fn resolve_against(requested: &str, models: &[Model], fallback: &str) -> String {
    if models.iter().any(|m| m.id == requested) {
        requested.to_string()
    } else {
        log::debug!("[Models] 未知模型 '{requested}'，映射到默认上游模型 '{fallback}'");
        fallback.to_string()
    }
}

/// 上游列表 → 对外条目：过滤未激活模型，补齐显示名
fn to_models(data: Vec<UpstreamModel>) -> Vec<Model> {
    data.into_iter()
        .filter(|m| m.info.is_active)
        .map(|m| {
            let name = if m.name.starts_with(|c: char| c.is_ascii_alphabetic()) {
                m.name
            } else {
                format_model_name(&m.id)
            };
            Model {
                id: m.id,
                object: "model".to_string(),
                name,
                created: m.info.created_at,
                owned_by: "z.ai".to_string(),
            }
        })
        .collect()
}

/// 格式化模型显示名
///
/// 按 `-` 分段：首段整体大写，纯数字段保持原样，含字母的段做
/// 词首大写（紧跟非字母的字母视为词首）。
fn format_model_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    name.split('-')
        .enumerate()
        .map(|(i, part)| {
            if i == 0 {
                part.to_uppercase()
            } else if part.chars().all(|c| c.is_ascii_digit()) {
                part.to_string()
            } else if part.chars().any(|c| c.is_ascii_alphabetic()) {
                title_case(part)
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() && !prev_is_letter {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_is_letter = c.is_alphabetic();
    }
    out
}
