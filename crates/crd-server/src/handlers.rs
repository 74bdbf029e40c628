use std::sync::Arc;

use anyhow::Context;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value, json};

use crd_core::{
    CodeTable, ContextPayload, DecisionResponse, DiscoveryDocument, RuleSet, ServiceManifest,
    SourceInfo, evaluate,
};

use crate::config::AppConfig;
use crate::error::Result;

pub const SERVICE_ID: &str = "order-sign-crd";

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub rules: Arc<RuleSet>,
    pub codes: Arc<CodeTable>,
    pub source: SourceInfo,
}

impl AppState {
    /// Build process-wide state, loading rule and code tables from the
    /// configured files when present, built-ins otherwise.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let rules = match &config.tables.rules_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read rules file {path}"))?;
                RuleSet::from_json_str(&raw)
                    .with_context(|| format!("Failed to parse rules file {path}"))?
            }
            None => RuleSet::builtin(),
        };
        let codes = match &config.tables.codes_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read codes file {path}"))?;
                CodeTable::from_json_str(&raw)
                    .with_context(|| format!("Failed to parse codes file {path}"))?
            }
            None => CodeTable::builtin(),
        };
        let source = SourceInfo {
            label: config.card_source.label.clone(),
            url: config.card_source.url.clone(),
        };
        Ok(Self {
            config,
            rules: Arc::new(rules),
            codes: Arc::new(codes),
            source,
        })
    }
}

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "crd-server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}

/// The discovery document is fixed: one order-sign service.
pub async fn get_discovery() -> Json<DiscoveryDocument> {
    let mut prefetch = IndexMap::new();
    prefetch.insert(
        "patient".to_string(),
        "Patient/{{context.patientId}}".to_string(),
    );
    prefetch.insert(
        "coverage".to_string(),
        "Coverage?patient={{context.patientId}}".to_string(),
    );
    Json(DiscoveryDocument {
        services: vec![ServiceManifest {
            id: Some(SERVICE_ID.to_string()),
            hook: Some("order-sign".to_string()),
            title: Some("Coverage Requirements Discovery".to_string()),
            description: Some(
                "Evaluates prior authorization requirements for draft orders".to_string(),
            ),
            prefetch,
        }],
        cds_services: Vec::new(),
    })
}

pub async fn post_invoke(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<DecisionResponse>> {
    let payload: ContextPayload =
        serde_json::from_value(body).map_err(crd_core::CoreError::from)?;
    tracing::debug!(
        hook = payload.hook.as_deref().unwrap_or("<none>"),
        "decision request received"
    );
    let response = evaluate(&payload, &state.rules, &state.codes, &state.source)?;
    Ok(Json(response))
}
