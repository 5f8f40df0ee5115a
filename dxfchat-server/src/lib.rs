//! HTTP 服务：上传图纸、预览、对话编辑与导出。

pub mod chat;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use dxfchat_assistant::{AnthropicPlanner, EditPlanner};
use dxfchat_config::AppConfig;
use dxfchat_engine::command::EditBus;
use dxfchat_engine::workspace::Workspace;

pub use error::{ApiError, ServerError};

/// 各请求共享的状态。工作区同一时间只持有一份图纸，后写入者覆盖先写入者。
pub struct AppState {
    pub workspace: RwLock<Workspace>,
    pub planner: Arc<dyn EditPlanner>,
    pub bus: EditBus,
    pub config: Arc<AppConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, planner: Arc<dyn EditPlanner>) -> Self {
        Self {
            workspace: RwLock::new(Workspace::new()),
            planner,
            bus: EditBus::new(),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_bytes;
    Router::new()
        .route("/", get(routes::index))
        .route("/api/upload", post(routes::upload))
        .route("/api/svg", get(routes::svg))
        .route("/api/layers", get(routes::layers))
        .route("/api/chat", post(chat::chat))
        .route("/api/export/dxf", get(routes::export_dxf))
        .route("/api/export/pdf", get(routes::export_pdf))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 按配置启动服务，直到收到 Ctrl-C。
pub async fn serve(config: AppConfig) -> Result<(), ServerError> {
    let planner = AnthropicPlanner::from_config(&config.assistant)?;
    info!(model = planner.model(), "模型客户端就绪");

    let address = config.server.bind_address();
    let static_dir = config.server.static_dir.clone();
    let state = Arc::new(AppState::new(config, Arc::new(planner)));
    let router = build_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    info!(address = %address, static_dir = %static_dir.display(), "DXF 聊天编辑服务已启动");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("收到退出信号，正在关闭服务"),
        Err(err) => {
            warn!(error = %err, "监听退出信号失败");
            std::future::pending::<()>().await;
        }
    }
}
