//! OpenAI 兼容层
//!
//! 对外的 Chat Completions 请求/响应结构，以及进入管道前的请求归一化
//! （prompt→messages 映射、stream 与 enable_thinking 缺省值解析）。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RelayConfig;

/// 聊天消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// completions 接口的 prompt 字段：单个字符串或数组
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Text(String),
    Parts(Vec<Value>),
}

impl Prompt {
    /// 展开为单条用户消息的文本
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Parts(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        Value::String(s) => text.push_str(&s),
                        other => text.push_str(&other.to_string()),
                    }
                    text.push('\n');
                }
                text
            }
        }
    }
}

/// 入站 Chat Completions 请求
///
/// `stream` 与 `enable_thinking` 为 None 表示客户端未指定，
/// 在归一化阶段用服务默认值补齐。
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub prompt: Option<Prompt>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub enable_thinking: Option<bool>,
}

/// 归一化后的请求：所有缺省值已解析
#[derive(Debug, Clone)]
pub struct CanonicalRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    pub thinking_enabled: bool,
}

impl ChatRequest {
    /// 归一化入站请求
    ///
    /// messages 为空时把 prompt 映射为单条 user 消息。
    pub fn normalize(self, config: &RelayConfig) -> CanonicalRequest {
        let mut messages = self.messages;
        if messages.is_empty() {
            if let Some(prompt) = self.prompt {
                messages.push(Message {
                    role: "user".to_string(),
                    content: prompt.into_text(),
                });
            }
        }
        CanonicalRequest {
            model: self.model,
            messages,
            stream: self.stream.unwrap_or(config.default_stream),
            thinking_enabled: self.enable_thinking.unwrap_or(config.enable_thinking),
        }
    }
}

/// 出站响应：完整响应与流式增量块共用一个结构
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// 用量统计：不做计量，恒为零
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl OpenAIResponse {
    /// 流式增量块；model 回显客户端请求的原始 ID
    pub fn chunk(model: &str, delta: Delta, finish_reason: Option<&str>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: format!("chatcmpl-{now}"),
            object: "chat.completion.chunk".to_string(),
            created: now,
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: None,
                delta: Some(delta),
                finish_reason: finish_reason.map(str::to_string),
            }],
            usage: None,
        }
    }

    /// 非流式完整响应
    pub fn completion(model: &str, content: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: format!("chatcmpl-{now}"),
            object: "chat.completion".to_string(),
            created: now,
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: Some(Message {
                    role: "assistant".to_string(),
                    content,
                }),
                delta: None,
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(Usage::default()),
        }
    }
}
