//! 对话编辑流程：生成编辑脚本、在当前图纸上执行、返回结果。

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use dxfchat_assistant::PromptContext;
use dxfchat_engine::command::EditBus;
use dxfchat_engine::workspace::Workspace;

use crate::AppState;
use crate::error::ApiError;

pub const NO_DOCUMENT_FOR_CHAT: &str = "No DXF file loaded. Please upload a file first.";
pub const NO_CODE_RESPONSE: &str =
    "I couldn't generate code for that request. Please try rephrasing.";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub code: String,
    pub executed: bool,
    pub result: String,
    pub svg_updated: bool,
}

/// 由当前工作区与已注册操作生成提示词上下文。
pub fn prompt_context(workspace: &Workspace, bus: &EditBus) -> PromptContext {
    PromptContext {
        layers: workspace
            .layer_summaries()
            .into_iter()
            .map(|layer| (layer.name, layer.entity_count))
            .collect(),
        entity_kinds: workspace
            .entity_kind_counts()
            .into_iter()
            .map(|(kind, count)| (kind.as_dxf_name().to_string(), count))
            .collect(),
        operations: bus
            .operation_usages()
            .into_iter()
            .map(|(name, usage)| (name.to_string(), usage.to_string()))
            .collect(),
    }
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    // 调用模型期间不持有锁
    let context = {
        let workspace = state.workspace.read().await;
        if !workspace.is_loaded() {
            return Err(ApiError::bad_request(NO_DOCUMENT_FOR_CHAT));
        }
        prompt_context(&workspace, &state.bus)
    };

    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message must not be empty"));
    }

    let planned = state.planner.plan(&context, message).await.map_err(|err| {
        warn!(error = %err, "生成编辑脚本失败");
        ApiError::internal(format!("Chat processing failed: {err}"))
    })?;

    let Some(code) = planned.code else {
        info!("模型未给出编辑脚本");
        let response = if planned.explanation.is_empty() {
            NO_CODE_RESPONSE.to_string()
        } else {
            planned.explanation
        };
        return Ok(Json(ChatResponse {
            response,
            code: String::new(),
            executed: false,
            result: String::new(),
            svg_updated: false,
        }));
    };

    let mut workspace = state.workspace.write().await;
    let outcome = workspace
        .require_document_mut()
        .and_then(|document| state.bus.run(&code, document));

    let response = match outcome {
        Ok(report) => {
            info!(
                before = report.entities_before,
                after = report.entities_after,
                "对话编辑已应用"
            );
            ChatResponse {
                response: planned.explanation,
                code,
                executed: true,
                result: report.summary(),
                svg_updated: true,
            }
        }
        Err(err) => ChatResponse {
            response: format!("Error executing code: {err}"),
            code,
            executed: false,
            result: err.to_string(),
            svg_updated: false,
        },
    };
    Ok(Json(response))
}
