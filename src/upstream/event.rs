//! 上游 SSE 事件解析
//!
//! 上游以 `data: {json}` 行帧推送事件。本模块把响应字节流解码为判别
//! 事件，处理三处可能嵌套的错误位置与终止信号。格式错误的行整行
//! 丢弃，不中断会话。

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;

/// 解析后的上游事件
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// 增量内容（text 非空）
    ContentDelta { phase: Phase, text: String },
    /// 上游显式结束
    Done,
    /// 上游携带的错误；细节只进日志，不回传客户端
    Error { code: i64, detail: String },
}

/// 内容阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Thinking,
    Answer,
    Done,
    Other,
}

impl Phase {
    fn parse(s: &str) -> Self {
        match s {
            "thinking" => Self::Thinking,
            "answer" => Self::Answer,
            "done" => Self::Done,
            _ => Self::Other,
        }
    }
}

/// 上游事件的原始 JSON 形状
#[derive(Debug, Default, Deserialize)]
struct UpstreamData {
    #[serde(default)]
    data: UpstreamPayload,
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamPayload {
    #[serde(default)]
    delta_content: String,
    #[serde(default)]
    phase: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<UpstreamError>,
    /// 错误还可能再嵌套一层（data.data.error）
    #[serde(default)]
    data: Option<InnerPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct InnerPayload {
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Debug, Clone, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    detail: String,
}

impl UpstreamData {
    /// 三处错误位置按优先级链式提取，取第一个存在的
    fn effective_error(&self) -> Option<&UpstreamError> {
        self.error
            .as_ref()
            .or(self.data.error.as_ref())
            .or_else(|| self.data.data.as_ref().and_then(|inner| inner.error.as_ref()))
    }
}

/// 解析一行上游 SSE
///
/// 只认 `"data: "` 前缀，前缀后为空则忽略。一个事件可能同时携带
/// 增量内容与终止标志，按序展开为至多两个事件（内容在前）。
pub fn parse_line(line: &str) -> Vec<UpstreamEvent> {
    let Some(payload) = line.strip_prefix("data: ") else {
        return Vec::new();
    };
    if payload.is_empty() {
        return Vec::new();
    }

    let data: UpstreamData = match serde_json::from_str(payload) {
        Ok(d) => d,
        Err(e) => {
            log::debug!("[UpstreamEvent] SSE 数据解析失败: {e}");
            return Vec::new();
        }
    };

    if let Some(err) = data.effective_error() {
        return vec![UpstreamEvent::Error {
            code: err.code,
            detail: err.detail.clone(),
        }];
    }

    let mut events = Vec::new();
    let phase = Phase::parse(&data.data.phase);
    if !data.data.delta_content.is_empty() {
        events.push(UpstreamEvent::ContentDelta {
            phase,
            text: data.data.delta_content,
        });
    }
    if data.data.done || phase == Phase::Done {
        events.push(UpstreamEvent::Done);
    }
    events
}

/// 把上游响应体解码为事件流
///
/// 终止事件（Done/Error）之后立即停止读取，即使缓冲中还有剩余行。
/// 连接在没有终止事件的情况下关闭时，流直接结束，不补发任何事件。
pub fn upstream_events(
    body: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = UpstreamEvent> + Send {
    async_stream::stream! {
        let mut buffer = String::new();
        let mut terminated = false;
        tokio::pin!(body);

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    log::warn!("[UpstreamEvent] 读取上游流失败: {e}");
                    break;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').to_string();
                buffer.drain(..=pos);

                for event in parse_line(&line) {
                    let terminal =
                        matches!(event, UpstreamEvent::Done | UpstreamEvent::Error { .. });
                    yield event;
                    if terminal {
                        terminated = true;
                        break;
                    }
                }
                if terminated {
                    break;
                }
            }
            if terminated {
                break;
            }
        }
    }
}
