//! 思考内容转换
//!
//! 上游在 thinking 阶段输出带 `<details>`/`<summary>` 包裹和引用前缀的
//! Markdown，本模块按配置策略归一化。流式与非流式两条响应路径共用
//! 这一份实现，两边各自维护一份转换逻辑迟早会漂移。
//!
//! 处理顺序固定：
//! 1. 去除 `<summary>…</summary>`（可跨行）
//! 2. 清理残留包裹标签 `</thinking>`、`<Full>`、`</Full>`
//! 3. 去前后空白
//! 4. 按策略处理 `<details>` 包裹
//! 5. 去掉行首引用前缀 `"> "`
//! 6. 再次去前后空白

use regex::Regex;
use std::sync::LazyLock;

/// 思考内容处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThinkMode {
    /// 去除 `<details>` 包裹标签
    #[default]
    Strip,
    /// 重写为 `<think>` 标签
    Think,
    /// 标签保留原样
    Raw,
}

impl ThinkMode {
    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strip" => Some(Self::Strip),
            "think" => Some(Self::Think),
            "raw" => Some(Self::Raw),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strip => "strip",
            Self::Think => "think",
            Self::Raw => "raw",
        }
    }
}

static SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<summary>.*?</summary>").unwrap());

static DETAILS_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<details[^>]*>").unwrap());

/// 归一化 thinking 阶段的增量内容
///
/// 纯函数：相同输入与策略恒产生相同输出。strip 模式下输出对自身
/// 再次转换是恒等的。
pub fn transform_thinking(text: &str, mode: ThinkMode) -> String {
    let s = SUMMARY_RE.replace_all(text, "");
    let s = s
        .replace("</thinking>", "")
        .replace("<Full>", "")
        .replace("</Full>", "");
    let s = s.trim();
    let s = match mode {
        ThinkMode::Think => DETAILS_OPEN_RE
            .replace_all(s, "<think>")
            .replace("</details>", "</think>"),
        ThinkMode::Strip => DETAILS_OPEN_RE.replace_all(s, "").replace("</details>", ""),
        ThinkMode::Raw => s.to_string(),
    };
    let s = s.strip_prefix("> ").unwrap_or(s.as_str()).replace("\n> ", "\n");
    s.trim().to_string()
}
