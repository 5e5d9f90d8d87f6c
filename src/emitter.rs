//! 响应发射器
//!
//! 把上游事件流重新发射为 OpenAI 形状：流式逐块转发，非流式聚合为
//! 单个完整响应。两种模式经由同一个 `render_delta` 处理增量，
//! 保证转换后的内容完全一致。

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::openai::{Delta, OpenAIResponse};
use crate::transform::{transform_thinking, ThinkMode};
use crate::upstream::event::{upstream_events, Phase, UpstreamEvent};

/// 流式终止标记行
const DONE_SENTINEL: &str = "data: [DONE]\n\n";

/// 应用内容转换；结果为空时不发射
///
/// thinking 阶段走归一化转换，其余阶段原样透传。
pub fn render_delta(phase: Phase, text: &str, mode: ThinkMode) -> Option<String> {
    let out = if phase == Phase::Thinking {
        transform_thinking(text, mode)
    } else {
        text.to_string()
    };
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// SSE 帧编码：`data: {json}\n\n`
fn sse_frame(chunk: &OpenAIResponse) -> Bytes {
    let json = serde_json::to_string(chunk).unwrap_or_default();
    Bytes::from(format!("data: {json}\n\n"))
}

/// 流式发射器
///
/// 读取上游字节之前先发射一个仅含 assistant 角色的块打开下游流，
/// 此后每个非空增量恰好一个内容块，终止事件时发射 finish 块与
/// `[DONE]` 标记。上游在没有终止事件的情况下关闭连接时直接结束，
/// 不补发 finish（该行为有回归测试锁定）。
///
/// 客户端断开会使本流被丢弃，挂起的上游读取随之取消，上游连接
/// 立即归还。
pub fn sse_response_stream(
    body: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    model: String,
    mode: ThinkMode,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
    async_stream::stream! {
        let role_chunk = OpenAIResponse::chunk(
            &model,
            Delta {
                role: Some("assistant".to_string()),
                content: None,
            },
            None,
        );
        yield Ok(sse_frame(&role_chunk));

        let events = upstream_events(body);
        tokio::pin!(events);

        while let Some(event) = events.next().await {
            match event {
                UpstreamEvent::ContentDelta { phase, text } => {
                    if let Some(content) = render_delta(phase, &text, mode) {
                        let chunk = OpenAIResponse::chunk(
                            &model,
                            Delta {
                                role: None,
                                content: Some(content),
                            },
                            None,
                        );
                        yield Ok(sse_frame(&chunk));
                    }
                }
                terminal => {
                    if let UpstreamEvent::Error { code, detail } = &terminal {
                        log::warn!("[Emitter] 上游错误: code={code}, detail={detail}");
                    }
                    let finish = OpenAIResponse::chunk(&model, Delta::default(), Some("stop"));
                    yield Ok(sse_frame(&finish));
                    yield Ok(Bytes::from(DONE_SENTINEL));
                    break;
                }
            }
        }
        // 上游未发终止事件即关闭：不发射 finish 块与 [DONE]
    }
}

/// 非流式发射器：按到达顺序拼接全部增量后构造单个完整响应
///
/// 上游在没有终止事件的情况下关闭连接时，已累积的内容照常返回。
pub async fn collect_completion(
    body: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    model: &str,
    mode: ThinkMode,
) -> OpenAIResponse {
    let events = upstream_events(body);
    tokio::pin!(events);

    let mut content = String::new();
    while let Some(event) = events.next().await {
        match event {
            UpstreamEvent::ContentDelta { phase, text } => {
                if let Some(out) = render_delta(phase, &text, mode) {
                    content.push_str(&out);
                }
            }
            UpstreamEvent::Error { code, detail } => {
                log::warn!("[Emitter] 上游错误: code={code}, detail={detail}");
                break;
            }
            UpstreamEvent::Done => break,
        }
    }

    log::debug!("[Emitter] 内容收集完成，最终长度: {}", content.len());
    OpenAIResponse::completion(model, content)
}
