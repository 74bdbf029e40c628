use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use crd_core::model::{ContextPayload, ServiceManifest};

use crate::discovery;
use crate::error::{ClientError, Result};
use crate::prefetch::{align_to_manifest, align_with_fixed_keys};
use crate::store::RequestStore;

/// Filled into `context.userId` when the payload names no user.
const DEFAULT_USER: &str = "Practitioner/example";

/// An invocation request as posted to the API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    pub filename: Option<String>,
    pub service_id: Option<String>,
    pub service_id_override: Option<String>,
    pub server_url: Option<String>,
    #[serde(default)]
    pub build_prefetch: bool,
    pub service_meta: Option<ServiceManifest>,
    pub auth_token: Option<String>,
    pub payload: Option<Value>,
}

/// The outcome reported back to the caller, mirroring the remote status.
#[derive(Debug, Clone, Serialize)]
pub struct InvokeOutcome {
    pub url: String,
    pub status: u16,
    pub ok: bool,
    pub data: Value,
}

/// Prepares and posts CDS service invocations.
#[derive(Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    store: RequestStore,
    default_base: String,
}

impl Dispatcher {
    pub fn new(http: reqwest::Client, store: RequestStore, default_base: impl Into<String>) -> Self {
        Self {
            http,
            store,
            default_base: default_base.into(),
        }
    }

    /// Resolve, align and post one invocation.
    ///
    /// The remote's status is reported in the outcome, not raised as an
    /// error; only local failures (bad target, missing payload, network
    /// trouble) surface as `Err`.
    pub async fn dispatch(&self, request: InvokeRequest) -> Result<InvokeOutcome> {
        let base = discovery::normalize_base(
            request.server_url.as_deref().unwrap_or(&self.default_base),
        );
        let target = resolve_target(
            base,
            request.service_id.as_deref(),
            request.service_id_override.as_deref(),
        )?;

        let raw_payload = self.resolve_payload(&request)?;
        let mut payload: ContextPayload =
            serde_json::from_value(raw_payload).map_err(|e| ClientError::bad_request(e.to_string()))?;

        // fhirServer is deprecated in CDS Hooks 2; remote servers reject it.
        payload.extra.shift_remove("fhirServer");
        if payload.context.user_id.is_none() {
            payload.context.user_id = Some(DEFAULT_USER.to_string());
        }

        let manifest = match request.service_meta {
            Some(meta) => Some(meta),
            None if target.absolute => self.discover_manifest(&target.url).await,
            None => None,
        };

        let aligned = match manifest {
            Some(ref manifest) => align_to_manifest(manifest, &payload, request.build_prefetch),
            None if request.build_prefetch => align_with_fixed_keys(&payload),
            None => payload,
        };

        info!(url = %target.url, build_prefetch = request.build_prefetch, "invoking CDS service");
        let mut post = self
            .http
            .post(&target.url)
            .header("Accept", "application/json")
            .json(&aligned);
        if let Some(token) = request.auth_token.as_deref() {
            post = post.bearer_auth(token);
        }
        let response = post.send().await.context("Failed to reach CRD server")?;
        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read CRD server response")?;
        let data = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }));

        Ok(InvokeOutcome {
            url: target.url,
            status: status.as_u16(),
            ok: status.is_success(),
            data,
        })
    }

    fn resolve_payload(&self, request: &InvokeRequest) -> Result<Value> {
        if let Some(name) = request.filename.as_deref() {
            return self.store.read(name).map_err(|e| match e {
                // At invocation time a missing file is the caller's
                // mistake, not a lookup miss.
                ClientError::NotFound(message) => ClientError::BadRequest(message),
                other => other,
            });
        }
        request
            .payload
            .clone()
            .ok_or_else(|| ClientError::bad_request("Provide either filename or payload"))
    }

    /// Best-effort manifest lookup for an absolute target URL: probe the
    /// host's discovery endpoints and match the trailing path segment as
    /// the service id. Failure only disables alignment-by-manifest.
    async fn discover_manifest(&self, target_url: &str) -> Option<ServiceManifest> {
        let parsed = Url::parse(target_url).ok()?;
        let origin = parsed.origin().ascii_serialization();
        let service_id = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())?
            .to_string();
        match discovery::probe(&self.http, &origin).await {
            Ok(outcome) => {
                let found = outcome.document.find_service(&service_id).cloned();
                debug!(
                    origin = %origin,
                    service_id = %service_id,
                    matched = found.is_some(),
                    "manifest auto-discovery"
                );
                found
            }
            Err(e) => {
                debug!(origin = %origin, error = %e, "manifest auto-discovery failed");
                None
            }
        }
    }
}

#[derive(Debug)]
struct Target {
    url: String,
    absolute: bool,
}

/// The override beats the service id; either may be an absolute URL,
/// which is used verbatim. A bare id is appended to the base.
fn resolve_target(base: &str, service_id: Option<&str>, override_id: Option<&str>) -> Result<Target> {
    let chosen = override_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or(service_id.filter(|s| !s.is_empty()))
        .ok_or_else(|| ClientError::bad_request("serviceId (or full URL) is required"))?;

    let lowered = chosen.to_ascii_lowercase();
    let absolute = lowered.starts_with("http://") || lowered.starts_with("https://");
    let url = if absolute {
        chosen.to_string()
    } else {
        format!("{base}/cds-services/{chosen}")
    };
    Ok(Target { url, absolute })
}
