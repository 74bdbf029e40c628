use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::AppConfig;
use crate::discovery;
use crate::dispatch::{Dispatcher, InvokeOutcome, InvokeRequest};
use crate::error::Result;
use crate::store::RequestStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub http: reqwest::Client,
    pub store: RequestStore,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let http = reqwest::Client::new();
        let store = RequestStore::new(&config.store.requests_dir);
        let dispatcher = Dispatcher::new(
            http.clone(),
            store.clone(),
            config.remote.default_server_url.clone(),
        );
        Self {
            config,
            http,
            store,
            dispatcher,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "defaultServerUrl": state.config.remote.default_server_url }))
}

pub async fn list_requests(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let files = state.store.list()?;
    Ok(Json(json!({ "files": files })))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.store.read(&name)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryQuery {
    pub server_url: Option<String>,
}

pub async fn get_discovery(
    State(state): State<AppState>,
    Query(query): Query<DiscoveryQuery>,
) -> Result<impl IntoResponse> {
    let base = query
        .server_url
        .as_deref()
        .unwrap_or(&state.config.remote.default_server_url);
    let outcome = discovery::probe(&state.http, base).await?;
    Ok(Json(json!({ "url": outcome.url, "data": outcome.raw })))
}

pub async fn post_invoke(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> Result<InvokeOutcome> {
    state.dispatcher.dispatch(request).await
}

/// The invocation outcome answers with the remote's status code so the
/// caller sees exactly what the CRD server said.
impl IntoResponse for InvokeOutcome {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
