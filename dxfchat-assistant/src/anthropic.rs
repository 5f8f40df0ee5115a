//! Anthropic Messages API 客户端。

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use dxfchat_config::AssistantConfig;

use crate::prompt::{PromptContext, build_system_prompt};
use crate::reply::{PlannedEdit, parse_reply};
use crate::{AssistantError, EditPlanner};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicPlanner {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: Option<String>,
    api_key_env: String,
}

impl AnthropicPlanner {
    /// 按配置创建客户端，密钥从 `api_key_env` 指定的环境变量读取。
    /// 密钥缺失不会报错，调用时返回 [`AssistantError::MissingApiKey`]。
    pub fn from_config(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let api_key = env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!(env = %config.api_key_env, "未找到模型密钥，聊天请求将失败");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key,
            api_key_env: config.api_key_env.clone(),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// 发送一轮对话，返回所有文本块拼接后的内容。
    pub async fn complete(&self, system: &str, message: &str) -> Result<String, AssistantError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AssistantError::MissingApiKey(self.api_key_env.clone()))?;

        debug!(model = %self.model, chars = message.len(), "调用模型");
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: [Message {
                role: "user",
                content: message,
            }],
        };
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "模型接口返回错误");
            return Err(AssistantError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: MessagesResponse = response.json().await?;
        let text: Vec<String> = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(AssistantError::EmptyResponse);
        }
        Ok(text.join("\n"))
    }
}

#[async_trait]
impl EditPlanner for AnthropicPlanner {
    async fn plan(
        &self,
        context: &PromptContext,
        message: &str,
    ) -> Result<PlannedEdit, AssistantError> {
        let system = build_system_prompt(context);
        let reply = self.complete(&system, message).await?;
        let edit = parse_reply(&reply);
        debug!(has_code = edit.code.is_some(), "模型回复已解析");
        Ok(edit)
    }
}
