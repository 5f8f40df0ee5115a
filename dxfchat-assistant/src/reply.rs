//! 解析模型回复：`EXPLANATION:` 段落加 `CODE:` 之后的代码块。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// 没有 `EXPLANATION:` 标记时使用的说明。
pub const DEFAULT_EXPLANATION: &str = "Executing requested changes.";

const EXPLANATION_MARKER: &str = "EXPLANATION:";
const CODE_MARKER: &str = "CODE:";

/// 未闭合的代码块取到文本末尾。
static JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```json[ \t]*\r?\n?(.*?)(?:```|\z)").expect("JSON 代码块正则无效")
});
/// 任意代码块，忽略围栏行上的语言标记。
static ANY_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)(?:```|\z)").expect("代码块正则无效")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedEdit {
    pub explanation: String,
    /// 编辑脚本原文；模型没有给出代码时为 `None`。
    pub code: Option<String>,
}

pub fn parse_reply(text: &str) -> PlannedEdit {
    let (explanation, code) = if text.contains(EXPLANATION_MARKER) {
        let mut parts = text.splitn(2, CODE_MARKER);
        let head = parts.next().unwrap_or_default();
        let explanation = head.replace(EXPLANATION_MARKER, "").trim().to_string();
        let code = parts
            .next()
            .map(|rest| fenced(rest).unwrap_or_else(|| rest.trim().to_string()));
        (explanation, code)
    } else {
        (DEFAULT_EXPLANATION.to_string(), fenced(text))
    };

    PlannedEdit {
        explanation,
        code: code.filter(|code| !code.is_empty()),
    }
}

fn fenced(text: &str) -> Option<String> {
    let fence: &Regex = if text.contains("```json") {
        &JSON_FENCE
    } else {
        &ANY_FENCE
    };
    let captures = fence.captures(text)?;
    captures.get(1).map(|body| body.as_str().trim().to_string())
}
