use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, info, warn};
use dxfchat_engine::workspace::{ExportFormat, LayerSummary};
use dxfchat_io::DxfFacade;
use dxfchat_render::{render_pdf, render_svg};

use crate::AppState;
use crate::error::ApiError;

pub const NO_DOCUMENT: &str = "No DXF file loaded";
const FRONTEND_MISSING: &str = "<h1>Frontend not found</h1>";
const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub svg: String,
    pub layers: Vec<LayerSummary>,
}

#[derive(Debug, Serialize)]
pub struct LayersResponse {
    pub layers: Vec<LayerSummary>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub document_loaded: bool,
    pub uptime_secs: u64,
}

/// 返回 `<static_dir>/index.html`。
pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    let path = state.config.server.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(page).into_response(),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "前端页面不存在");
            (StatusCode::NOT_FOUND, Html(FRONTEND_MISSING)).into_response()
        }
    }
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::new(err.status(), format!("Invalid upload: {err}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::new(err.status(), format!("Invalid upload: {err}")))?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::bad_request("No file uploaded"));
    };
    if !filename.to_ascii_lowercase().ends_with(".dxf") {
        return Err(ApiError::bad_request("File must be a DXF file"));
    }

    let (document, report) = DxfFacade::new()
        .read_bytes_with_report(&bytes)
        .map_err(|err| {
            warn!(filename = %filename, error = %err, "DXF 解析失败");
            ApiError::internal(format!("Failed to process DXF: {err}"))
        })?;
    if report.skipped_total() > 0 {
        info!(filename = %filename, skipped = ?report.skipped, "部分实体类型不受支持，已跳过");
    }

    let svg = render_svg(&document, &state.config.render.preview);
    let mut workspace = state.workspace.write().await;
    workspace.load(document, filename.clone());
    Ok(Json(UploadResponse {
        success: true,
        filename,
        svg,
        layers: workspace.layer_summaries(),
    }))
}

pub async fn svg(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let workspace = state.workspace.read().await;
    let document = workspace
        .document()
        .ok_or_else(|| ApiError::not_found(NO_DOCUMENT))?;
    let svg = render_svg(document, &state.config.render.preview);
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

pub async fn layers(State(state): State<Arc<AppState>>) -> Result<Json<LayersResponse>, ApiError> {
    let workspace = state.workspace.read().await;
    if !workspace.is_loaded() {
        return Err(ApiError::not_found(NO_DOCUMENT));
    }
    Ok(Json(LayersResponse {
        layers: workspace.layer_summaries(),
    }))
}

pub async fn export_dxf(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let workspace = state.workspace.read().await;
    let (Some(document), Some(filename)) = (
        workspace.document(),
        workspace.export_filename(ExportFormat::Dxf),
    ) else {
        return Err(ApiError::not_found(NO_DOCUMENT));
    };
    let body = DxfFacade::new().write_string(document);
    info!(filename = %filename, bytes = body.len(), "导出 DXF");
    Ok(attachment("application/dxf", &filename, body.into_bytes()))
}

pub async fn export_pdf(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let workspace = state.workspace.read().await;
    let (Some(document), Some(filename)) = (
        workspace.document(),
        workspace.export_filename(ExportFormat::Pdf),
    ) else {
        return Err(ApiError::not_found(NO_DOCUMENT));
    };
    let body = render_pdf(document, &state.config.render.pdf);
    info!(filename = %filename, bytes = body.len(), "导出 PDF");
    Ok(attachment("application/pdf", &filename, body))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let document_loaded = state.workspace.read().await.is_loaded();
    Json(HealthResponse {
        status: "ok".to_string(),
        document_loaded,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

fn attachment(content_type: &'static str, filename: &str, body: Vec<u8>) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        filename.replace(['"', '\\', '\r', '\n'], "_")
    );
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
