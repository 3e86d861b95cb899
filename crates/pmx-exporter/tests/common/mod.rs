#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use pmx_exporter::app;
use pmx_exporter::config::ExporterConfig;
use pmx_exporter::state::AppState;
use pmx_unisphere::throttle::{RequestThrottle, ThrottledClient};
use pmx_unisphere::unisphere::UnisphereClient;
use pmx_unisphere::ApiClient;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tower::util::ServiceExt;

pub const SYMM_ID: &str = "000197900123";
pub const USER: &str = "monitor";
pub const PASSWORD: &str = "secret";
const API_PATH: &str = "/univmax/restapi";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// Behaviour of the fake Unisphere, adjustable while it runs.
pub struct FakeState {
    pub arrays: Mutex<Vec<String>>,
    pub storage_groups: Mutex<Vec<String>>,
    /// Latest `HostIOs` per storage group; others report `HostIOs = 1`.
    pub host_ios: Mutex<HashMap<String, f64>>,
    /// Storage groups whose metrics query answers 500.
    pub failing: Mutex<HashSet<String>>,
    /// Storage groups whose metrics query answers 204.
    pub no_content: Mutex<HashSet<String>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeState {
    pub fn set_storage_groups(&self, ids: &[&str]) {
        *self.storage_groups.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            arrays: Mutex::new(vec![SYMM_ID.to_string(), "000197900456".to_string()]),
            storage_groups: Mutex::new(vec!["oracle_sg".to_string(), "vmware_sg".to_string()]),
            host_ios: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            no_content: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

/// In-process stand-in for the Unisphere REST API, served over plain HTTP.
pub struct FakeUnisphere {
    pub addr: SocketAddr,
    pub state: Arc<FakeState>,
    handle: JoinHandle<()>,
}

impl FakeUnisphere {
    pub async fn start() -> Result<Self> {
        let state = Arc::new(FakeState::default());
        let router = Router::new().fallback(handle).with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for FakeUnisphere {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(path) = uri.path().strip_prefix(API_PATH) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    match (method, path) {
        (Method::GET, "/performance/Array/keys") => {
            let arrays = state.arrays.lock().unwrap().clone();
            let info: Vec<Value> = arrays
                .iter()
                .map(|id| json!({"symmetrixId": id, "firstAvailableDate": 0, "lastAvailableDate": 0}))
                .collect();
            axum::Json(json!({ "arrayInfo": info })).into_response()
        }
        (Method::POST, "/performance/StorageGroup/keys") => {
            let groups = state.storage_groups.lock().unwrap().clone();
            let info: Vec<Value> = groups
                .iter()
                .map(|id| json!({"storageGroupId": id, "firstAvailableDate": 0, "lastAvailableDate": 0}))
                .collect();
            axum::Json(json!({ "storageGroupInfo": info })).into_response()
        }
        (Method::POST, "/performance/StorageGroup/metrics") => {
            let id = body["storageGroupId"].as_str().unwrap_or_default().to_string();
            if state.failing.lock().unwrap().contains(&id) {
                return (StatusCode::INTERNAL_SERVER_ERROR, "backend failure").into_response();
            }
            if state.no_content.lock().unwrap().contains(&id) {
                return StatusCode::NO_CONTENT.into_response();
            }
            let host_ios = state.host_ios.lock().unwrap().get(&id).copied().unwrap_or(1.0);
            axum::Json(json!({
                "resultList": {
                    "result": [
                        {"timestamp": 1_700_000_000_000i64, "HostIOs": 0, "PercentHit": 0},
                        {"timestamp": 1_700_000_300_000i64, "HostIOs": host_ios, "PercentHit": 97.5, "label": id}
                    ],
                    "from": 1, "to": 2
                },
                "count": 2,
                "id": "1f8c",
                "expirationTime": 0,
                "maxPageSize": 1000
            }))
            .into_response()
        }
        _ => (StatusCode::NOT_FOUND, "no such endpoint").into_response(),
    }
}

pub fn config_for(address: &str, target: &str, refresh: bool) -> Result<ExporterConfig> {
    ExporterConfig::parse(&format!(
        r#"
        [unisphere]
        address = "{address}"
        user = "{USER}"
        password = "{PASSWORD}"
        symm_id = "{SYMM_ID}"
        request_timeout_secs = 5

        [exporter]
        target = "{target}"
        refresh = {refresh}
        port = 0
        "#
    ))
}

/// Client stack the binary builds: the real HTTP client behind the throttle.
pub fn client_for(config: &ExporterConfig) -> Result<Arc<dyn ApiClient>> {
    let unisphere = UnisphereClient::new(&config.client_settings())?;
    Ok(Arc::new(ThrottledClient::new(
        Arc::new(unisphere),
        Arc::new(RequestThrottle::default()),
    )))
}

pub async fn build_app(fake: &FakeUnisphere, target: &str, refresh: bool) -> Result<(AppState, Router)> {
    let config = config_for(&fake.address(), target, refresh)?;
    let state = AppState::bootstrap(&config, client_for(&config)?).await?;
    Ok((state.clone(), app::build_http_app(state)))
}

pub async fn get_text(app: &Router, uri: &str) -> Result<(StatusCode, HeaderMap, String)> {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, headers, String::from_utf8(body.to_vec())?))
}

/// Sample lines (not comments) of an exposition body.
pub fn samples(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}
