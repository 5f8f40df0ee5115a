use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;
use dxfchat_assistant::{AssistantError, EditPlanner, PlannedEdit, PromptContext};
use dxfchat_config::AppConfig;
use dxfchat_engine::sample;
use dxfchat_io::DxfFacade;
use dxfchat_server::chat::{NO_CODE_RESPONSE, NO_DOCUMENT_FOR_CHAT};
use dxfchat_server::{AppState, build_router};

const BOUNDARY: &str = "dxfchat-test-boundary";

/// 返回预设结果的规划器，并记录收到的上下文。
struct StubPlanner {
    reply: Option<PlannedEdit>,
    seen: Mutex<Vec<(PromptContext, String)>>,
}

impl StubPlanner {
    fn replying(explanation: &str, code: Option<&str>) -> Self {
        Self {
            reply: Some(PlannedEdit {
                explanation: explanation.to_string(),
                code: code.map(str::to_string),
            }),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: None,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EditPlanner for StubPlanner {
    async fn plan(
        &self,
        context: &PromptContext,
        message: &str,
    ) -> Result<PlannedEdit, AssistantError> {
        self.seen
            .lock()
            .unwrap()
            .push((context.clone(), message.to_string()));
        self.reply.clone().ok_or(AssistantError::EmptyResponse)
    }
}

fn app_with(planner: Arc<StubPlanner>, config: AppConfig) -> Router {
    build_router(Arc::new(AppState::new(config, planner)))
}

fn router(planner: Arc<StubPlanner>) -> Router {
    app_with(planner, AppConfig::default())
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.expect("请求失败")
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("读取响应体")
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("JSON 响应")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn upload_request(filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn chat_request(message: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "message": message }).to_string()))
        .unwrap()
}

fn sample_dxf() -> Vec<u8> {
    DxfFacade::new()
        .write_string(&sample::floorplan())
        .into_bytes()
}

async fn upload_sample(app: &Router) -> Value {
    let response = send(app, upload_request("plan.dxf", &sample_dxf())).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

fn layer_count(layers: &Value, name: &str) -> Option<u64> {
    layers
        .as_array()?
        .iter()
        .find(|layer| layer["name"] == name)
        .and_then(|layer| layer["entity_count"].as_u64())
}

#[tokio::test]
async fn health_reports_document_state() {
    let app = router(Arc::new(StubPlanner::failing()));
    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["document_loaded"], false);
    assert!(body["uptime_secs"].is_u64());

    upload_sample(&app).await;
    let body = body_json(send(&app, get("/health")).await).await;
    assert_eq!(body["document_loaded"], true);
}

#[tokio::test]
async fn document_routes_require_upload() {
    let app = router(Arc::new(StubPlanner::failing()));
    for uri in ["/api/svg", "/api/layers", "/api/export/dxf", "/api/export/pdf"] {
        let response = send(&app, get(uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body_json(response).await["detail"], "No DXF file loaded");
    }

    let response = send(&app, chat_request("delete the doors")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], NO_DOCUMENT_FOR_CHAT);
}

#[tokio::test]
async fn missing_document_is_reported_before_blank_message() {
    let app = router(Arc::new(StubPlanner::failing()));
    let response = send(&app, chat_request("   ")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], NO_DOCUMENT_FOR_CHAT);

    upload_sample(&app).await;
    let response = send(&app, chat_request("   ")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Message must not be empty");
}

#[tokio::test]
async fn upload_rejects_other_extensions() {
    let app = router(Arc::new(StubPlanner::failing()));
    let response = send(&app, upload_request("plan.dwg", &sample_dxf())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "File must be a DXF file");
}

#[tokio::test]
async fn upload_reports_parse_failures() {
    let app = router(Arc::new(StubPlanner::failing()));
    let response = send(&app, upload_request("broken.DXF", b"not a drawing")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body_json(response).await["detail"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    assert!(detail.starts_with("Failed to process DXF: "), "{detail}");

    let health = body_json(send(&app, get("/health")).await).await;
    assert_eq!(health["document_loaded"], false);
}

#[tokio::test]
async fn upload_returns_preview_and_layers() {
    let app = router(Arc::new(StubPlanner::failing()));
    let body = upload_sample(&app).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["filename"], "plan.dxf");
    assert!(body["svg"].as_str().unwrap_or_default().starts_with("<svg"));
    assert_eq!(layer_count(&body["layers"], "DIMENSIONS"), Some(8));
    assert_eq!(layer_count(&body["layers"], "WALLS"), Some(4));

    let response = send(&app, get("/api/svg")).await;
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/svg+xml"
    );
    let svg = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(svg.contains(">KITCHEN<"));

    let layers = body_json(send(&app, get("/api/layers")).await).await;
    assert_eq!(layer_count(&layers["layers"], "TEXT"), Some(4));
}

#[tokio::test]
async fn chat_applies_generated_script() {
    let planner = Arc::new(StubPlanner::replying(
        "Removing all dimensions.",
        Some(r#"[{"op": "delete", "layer": "DIMENSIONS"}]"#),
    ));
    let app = router(planner.clone());
    upload_sample(&app).await;

    let response = send(&app, chat_request("  remove the dimensions ")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["response"], "Removing all dimensions.");
    assert_eq!(body["executed"], true);
    assert_eq!(body["svg_updated"], true);
    assert_eq!(body["result"], "8 element(s) removed");
    assert_eq!(body["code"], r#"[{"op": "delete", "layer": "DIMENSIONS"}]"#);

    let layers = body_json(send(&app, get("/api/layers")).await).await;
    assert_eq!(layer_count(&layers["layers"], "DIMENSIONS"), Some(0));

    let seen = planner.seen.lock().unwrap();
    let (context, message) = &seen[0];
    assert_eq!(message, "remove the dimensions");
    assert!(context.layers.contains(&("DIMENSIONS".to_string(), 8)));
    assert!(context.entity_kinds.iter().any(|(kind, _)| kind == "LWPOLYLINE"));
    assert!(context.operations.iter().any(|(name, _)| name == "set_text"));
}

#[tokio::test]
async fn chat_without_code_explains() {
    let app = router(Arc::new(StubPlanner::replying("", None)));
    upload_sample(&app).await;
    let body = body_json(send(&app, chat_request("make it nicer")).await).await;
    assert_eq!(body["response"], NO_CODE_RESPONSE);
    assert_eq!(body["executed"], false);
    assert_eq!(body["code"], "");

    let app = router(Arc::new(StubPlanner::replying(
        "There are no windows in this drawing.",
        None,
    )));
    upload_sample(&app).await;
    let body = body_json(send(&app, chat_request("delete windows")).await).await;
    assert_eq!(body["response"], "There are no windows in this drawing.");
    assert_eq!(body["svg_updated"], false);
}

#[tokio::test]
async fn failed_script_leaves_document_untouched() {
    let code = r#"[{"op": "delete", "layer": "TEXT"}, {"op": "add_circle", "center": [0, 0], "radius": -1}]"#;
    let app = router(Arc::new(StubPlanner::replying("Trying.", Some(code))));
    upload_sample(&app).await;
    let before = body_bytes(send(&app, get("/api/svg")).await).await;

    let body = body_json(send(&app, chat_request("break it")).await).await;
    assert_eq!(body["executed"], false);
    assert_eq!(body["svg_updated"], false);
    assert_eq!(body["code"], code);
    let response = body["response"].as_str().unwrap_or_default();
    assert!(response.starts_with("Error executing code: "), "{response}");
    assert!(body["result"].as_str().unwrap_or_default().contains("#2"));

    let after = body_bytes(send(&app, get("/api/svg")).await).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn planner_failure_is_server_error() {
    let app = router(Arc::new(StubPlanner::failing()));
    upload_sample(&app).await;
    let response = send(&app, chat_request("hello")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body_json(response).await["detail"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    assert!(detail.starts_with("Chat processing failed: "), "{detail}");
}

#[tokio::test]
async fn exports_use_upload_name() {
    let app = router(Arc::new(StubPlanner::failing()));
    upload_sample(&app).await;

    let response = send(&app, get("/api/export/dxf")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/dxf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"plan_edited.dxf\""
    );
    let exported = body_bytes(response).await;
    let reloaded = DxfFacade::new().read_bytes(&exported).expect("导出的 DXF 可再次读取");
    assert_eq!(reloaded.entity_count(), sample::floorplan().entity_count());

    let response = send(&app, get("/api/export/pdf")).await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"plan.pdf\""
    );
    assert!(body_bytes(response).await.starts_with(b"%PDF-1.4"));
}

#[tokio::test]
async fn index_serves_frontend_when_present() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.server.static_dir = dir.path().to_path_buf();
    let app = app_with(Arc::new(StubPlanner::failing()), config);

    let response = send(&app, get("/")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(body, "<h1>Frontend not found</h1>");

    std::fs::write(dir.path().join("index.html"), "<h1>DXF Chat</h1>").unwrap();
    let response = send(&app, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(body, "<h1>DXF Chat</h1>");
}
