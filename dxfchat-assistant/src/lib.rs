pub mod anthropic;
pub mod prompt;
pub mod reply;

pub use anthropic::AnthropicPlanner;
pub use prompt::{PromptContext, build_system_prompt};
pub use reply::{DEFAULT_EXPLANATION, PlannedEdit, parse_reply};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("环境变量 {0} 未设置，无法调用模型")]
    MissingApiKey(String),
    #[error("模型请求失败: {0}")]
    Request(#[from] reqwest::Error),
    #[error("模型接口返回 {status}: {body}")]
    Status { status: u16, body: String },
    #[error("模型回复中没有文本内容")]
    EmptyResponse,
}

/// 将自然语言请求转换为编辑脚本。
#[async_trait]
pub trait EditPlanner: Send + Sync {
    async fn plan(
        &self,
        context: &PromptContext,
        message: &str,
    ) -> Result<PlannedEdit, AssistantError>;
}
