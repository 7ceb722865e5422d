#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use nucleus_client::ClientConfig;

pub const API_KEY: &str = "test-key";
pub const PROJECT_ID: u64 = 1;
/// Asset whose findings endpoint answers 500.
pub const BROKEN_ASSET: u64 = 13;
/// Finding number the server refuses to update.
pub const MISSING_FINDING: &str = "VULN-404";

// Mock Nucleus API with per-route hit counters
#[derive(Default)]
pub struct MockApi {
    pub project_hits: AtomicUsize,
    pub asset_list_hits: AtomicUsize,
    pub search_hits: AtomicUsize,
    pub asset_finding_hits: AtomicUsize,
    pub finding_updates: AtomicUsize,
    pub next_asset_id: AtomicU64,
    pub assets: Mutex<Vec<Value>>,
    /// Artificial latency for GET /projects.
    pub projects_delay_ms: AtomicU64,
    /// Artificial latency for GET /projects/{id}/assets. The list is read
    /// when the request arrives, before the delay.
    pub assets_delay_ms: AtomicU64,
}

impl MockApi {
    pub fn hits(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

type Shared = Arc<MockApi>;

fn authorized(headers: &HeaderMap) -> Result<(), Response> {
    match headers.get("x-apikey").and_then(|v| v.to_str().ok()) {
        Some(API_KEY) => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid api key"}))).into_response()),
    }
}

async fn projects(State(api): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    api.project_hits.fetch_add(1, Ordering::SeqCst);
    let delay = api.projects_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    Json(json!([
        {"project_id": PROJECT_ID, "project_name": "Production"},
        {"project_id": 2, "project_name": "Staging", "project_description": "pre-prod"}
    ]))
    .into_response()
}

async fn metrics(Path(project_id): Path<u64>) -> Response {
    if project_id != PROJECT_ID {
        return (StatusCode::NOT_FOUND, "no such project").into_response();
    }
    Json(json!({
        "finding_count_critical": 2,
        "finding_count_high": 5,
        "finding_count_medium": 11,
        "finding_count_low": 20
    }))
    .into_response()
}

async fn list_assets(State(api): State<Shared>, Path(_project_id): Path<u64>) -> Json<Value> {
    api.asset_list_hits.fetch_add(1, Ordering::SeqCst);
    let assets = api.assets.lock().unwrap().clone();
    let delay = api.assets_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    Json(Value::Array(assets))
}

async fn create_asset(
    State(api): State<Shared>,
    Path(_project_id): Path<u64>,
    Json(mut body): Json<Value>,
) -> Response {
    if body.get("asset_name").and_then(Value::as_str).is_none() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "asset_name required"}))).into_response();
    }
    let asset_id = api.next_asset_id.fetch_add(1, Ordering::SeqCst) + 100;
    body["asset_id"] = json!(asset_id);
    api.assets.lock().unwrap().push(body);
    (StatusCode::CREATED, Json(json!({"asset_id": asset_id}))).into_response()
}

async fn update_asset(
    State(api): State<Shared>,
    Path((_project_id, asset_id)): Path<(u64, u64)>,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut assets = api.assets.lock().unwrap();
    let Some(asset) = assets.iter_mut().find(|a| a["asset_id"] == json!(asset_id)) else {
        return StatusCode::NOT_FOUND;
    };
    if let (Some(asset), Some(fields)) = (asset.as_object_mut(), body.as_object()) {
        for (k, v) in fields {
            asset.insert(k.clone(), v.clone());
        }
    }
    StatusCode::NO_CONTENT
}

fn finding(number: &str, severity: &str, asset_id: Option<u64>) -> Value {
    json!({
        "finding_number": number,
        "finding_name": format!("Finding {}", number),
        "finding_severity": severity,
        "finding_status": "Active",
        "finding_discovered": "2024-05-01T08:30:00Z",
        "asset_id": asset_id
    })
}

async fn search_findings(State(api): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    api.search_hits.fetch_add(1, Ordering::SeqCst);
    let severity = body["filters"][0]["value"].as_str().unwrap_or("Critical").to_string();
    Json(json!([
        finding("VULN-001", &severity, None),
        finding("VULN-002", &severity, Some(100))
    ]))
}

async fn asset_findings(
    State(api): State<Shared>,
    Path((_project_id, asset_id)): Path<(u64, u64)>,
) -> Response {
    api.asset_finding_hits.fetch_add(1, Ordering::SeqCst);
    if asset_id == BROKEN_ASSET {
        return (StatusCode::INTERNAL_SERVER_ERROR, "scanner backend unavailable").into_response();
    }
    Json(json!([finding(&format!("A{}-1", asset_id), "High", Some(asset_id))])).into_response()
}

async fn update_finding(State(api): State<Shared>, Json(body): Json<Value>) -> Response {
    api.finding_updates.fetch_add(1, Ordering::SeqCst);
    if body["finding_number"] == json!(MISSING_FINDING) {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "finding not found"}))).into_response();
    }
    StatusCode::OK.into_response()
}

async fn risk_score(Path(_project_id): Path<u64>) -> Json<Value> {
    Json(json!({"risk_score": 73.5}))
}

pub fn router(api: Shared) -> Router {
    Router::new()
        .route("/projects", get(projects))
        .route("/projects/{project_id}/metrics", get(metrics))
        .route("/projects/{project_id}/assets", get(list_assets).post(create_asset))
        .route(
            "/projects/{project_id}/assets/{asset_id}",
            axum::routing::put(update_asset),
        )
        .route("/projects/{project_id}/findings/search", post(search_findings))
        .route("/projects/{project_id}/findings", axum::routing::put(update_finding))
        .route(
            "/projects/{project_id}/assets/{asset_id}/findings",
            get(asset_findings),
        )
        .route("/projects/{project_id}/risk_score", get(risk_score))
        .with_state(api)
}

/// Serve the mock on an ephemeral port of the current runtime.
pub async fn spawn_mock() -> (SocketAddr, Shared) {
    let api = Arc::new(MockApi::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(Arc::clone(&api));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, api)
}

/// Serve the mock from a background thread with its own runtime, for
/// blocking-client tests.
pub fn spawn_mock_thread() -> (SocketAddr, Shared) {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let (addr, api) = spawn_mock().await;
            tx.send((addr, api)).unwrap();
            std::future::pending::<()>().await;
        });
    });
    rx.recv().unwrap()
}

pub fn config_for(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(API_KEY).base_url(format!("http://{}", addr))
}
