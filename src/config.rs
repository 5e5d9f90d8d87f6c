//! 运行时配置
//!
//! 从环境变量读取配置，全部字段带有与上游站点匹配的默认值。

use crate::transform::ThinkMode;

/// 中继服务配置
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// 上游 chat completions 地址
    pub upstream_url: String,
    /// 上游模型列表地址
    pub models_url: String,
    /// 监听端口
    pub port: u16,
    /// 固定上游 token（匿名 token 获取失败或关闭时使用）
    pub upstream_token: String,
    /// 未知模型映射到的默认上游模型 ID
    pub default_upstream_model_id: String,
    /// 客户端未指定 stream 时的默认值
    pub default_stream: bool,
    /// 客户端未指定 enable_thinking 时的默认值
    pub enable_thinking: bool,
    /// 思考内容处理策略
    pub think_mode: ThinkMode,
    /// 是否为每次对话获取独立的匿名 token
    pub anon_token_enabled: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream_url: "https://chat.z.ai/api/chat/completions".to_string(),
            models_url: "https://chat.z.ai/api/models".to_string(),
            port: 7860,
            upstream_token: String::new(),
            default_upstream_model_id: "0727-360B-API".to_string(),
            default_stream: true,
            enable_thinking: true,
            think_mode: ThinkMode::Strip,
            anon_token_enabled: true,
        }
    }
}

impl RelayConfig {
    /// 从环境变量读取配置，未设置的字段使用默认值
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upstream_url: env_or("UPSTREAM_URL", &defaults.upstream_url),
            models_url: env_or("MODELS_URL", &defaults.models_url),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.trim_start_matches(':').parse().ok())
                .unwrap_or(defaults.port),
            upstream_token: env_or("ZAI_TOKEN", ""),
            default_upstream_model_id: env_or(
                "DEFAULT_UPSTREAM_MODEL_ID",
                &defaults.default_upstream_model_id,
            ),
            default_stream: env_bool("DEFAULT_STREAM", defaults.default_stream),
            enable_thinking: env_bool("ENABLE_THINKING", defaults.enable_thinking),
            think_mode: std::env::var("THINK_TAGS_MODE")
                .ok()
                .and_then(|v| ThinkMode::parse(&v))
                .unwrap_or(defaults.think_mode),
            anon_token_enabled: env_bool("ANON_TOKEN_ENABLED", defaults.anon_token_enabled),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v == "true",
        _ => default,
    }
}
