use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use dxfchat_assistant::AssistantError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("监听 {address} 失败: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP 服务异常退出: {0}")]
    Serve(#[source] std::io::Error),
    #[error("初始化模型客户端失败: {0}")]
    Assistant(#[from] AssistantError),
}

/// 返回给前端的错误，响应体为 `{"detail": "..."}`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
