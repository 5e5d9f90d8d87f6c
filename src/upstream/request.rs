//! 上游请求构造
//!
//! 把归一化后的请求组装成上游 chat completions 载荷。会话 ID 与
//! 消息 ID 每次请求生成一次，请求结束即丢弃。

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::openai::Message;

/// 会话上下文
///
/// 用于构造上游 Referer 路径与关联日志，不跨请求复用。
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub chat_id: String,
    pub message_id: String,
}

impl SessionContext {
    /// 基于高精度时间戳生成
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            chat_id: format!("{}-{}", now.as_nanos(), now.as_secs()),
            message_id: now.as_nanos().to_string(),
        }
    }
}

/// 上游请求载荷
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamRequest {
    pub stream: bool,
    pub model: String,
    pub messages: Vec<Message>,
    pub params: Value,
    pub features: Features,
    pub background_tasks: BackgroundTasks,
    pub chat_id: String,
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<String>,
    pub model_item: ModelItem,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_servers: Vec<String>,
    pub variables: HashMap<String, String>,
}

/// 功能开关
#[derive(Debug, Clone, Serialize)]
pub struct Features {
    pub enable_thinking: bool,
}

/// 后台任务开关：全部关闭，避免上游额外生成标题/标签
#[derive(Debug, Clone, Serialize)]
pub struct BackgroundTasks {
    pub title_generation: bool,
    pub tags_generation: bool,
}

/// 上游 model_item 字段
///
/// id 用映射后的上游模型，name 保留客户端请求的原始 ID。
#[derive(Debug, Clone, Serialize)]
pub struct ModelItem {
    pub id: String,
    pub name: String,
    pub owned_by: String,
}

/// 组装上游请求
///
/// stream 恒为 true：需要非流式响应时在下游聚合，上游始终走流式。
pub fn build_upstream_request(
    upstream_model_id: &str,
    requested_model: &str,
    messages: Vec<Message>,
    thinking_enabled: bool,
    ctx: &SessionContext,
) -> UpstreamRequest {
    let mut variables = HashMap::new();
    variables.insert("{{USER_NAME}}".to_string(), "User".to_string());
    variables.insert("{{USER_LOCATION}}".to_string(), "Unknown".to_string());
    variables.insert(
        "{{CURRENT_DATETIME}}".to_string(),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    );

    UpstreamRequest {
        stream: true,
        model: upstream_model_id.to_string(),
        messages,
        params: json!({}),
        features: Features {
            enable_thinking: thinking_enabled,
        },
        background_tasks: BackgroundTasks {
            title_generation: false,
            tags_generation: false,
        },
        chat_id: ctx.chat_id.clone(),
        id: ctx.message_id.clone(),
        mcp_servers: Vec::new(),
        model_item: ModelItem {
            id: upstream_model_id.to_string(),
            name: requested_model.to_string(),
            owned_by: "openai".to_string(),
        },
        tool_servers: Vec::new(),
        variables,
    }
}
