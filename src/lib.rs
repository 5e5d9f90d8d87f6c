//! zai-relay 库入口
//!
//! OpenAI 兼容的 Z.AI 中继服务：把 OpenAI Chat Completions 请求翻译为
//! 上游私有协议，并把上游 SSE 流重新发射为 OpenAI 格式（流式或聚合）。

pub mod config;
pub mod emitter;
pub mod error;
pub mod handlers;
pub mod models;
pub mod openai;
pub mod server;
pub mod token;
pub mod transform;
pub mod upstream;

pub use config::RelayConfig;
pub use error::RelayError;
