use serde_json::Value;
use tracing::debug;

use crd_core::model::DiscoveryDocument;

use crate::error::{ClientError, Result};

/// A successful discovery probe: the URL that answered, the raw document
/// for pass-through, and the parsed manifest list.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub url: String,
    pub raw: Value,
    pub document: DiscoveryDocument,
}

/// The discovery endpoints probed under a base URL, in order.
pub fn discovery_attempts(base: &str) -> [String; 2] {
    [
        format!("{base}/.well-known/cds-services"),
        format!("{base}/cds-services"),
    ]
}

pub fn normalize_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

/// Probe a CRD server's discovery endpoints.
///
/// The well-known path is tried first, then the bare one. The first JSON
/// body carrying a `services` or `cds-services` key wins. When both
/// attempts fail the error reports every URL tried and the last failure,
/// whether that was a transport error or an unusable response.
pub async fn probe(http: &reqwest::Client, base: &str) -> Result<DiscoveryOutcome> {
    let base = normalize_base(base);
    let attempts = discovery_attempts(base);
    let mut last_err = String::new();

    for url in &attempts {
        match fetch_document(http, url).await {
            Ok(Some(outcome)) => return Ok(outcome),
            Ok(None) => last_err = "response carried no service list".to_string(),
            Err(message) => last_err = message,
        }
        debug!(url = %url, error = %last_err, "discovery attempt failed");
    }

    Err(ClientError::DiscoveryFailed {
        base: base.to_string(),
        tried: attempts.to_vec(),
        last_err,
    })
}

/// One attempt. `Ok(None)` means the endpoint answered 2xx with JSON that
/// is not a discovery document; `Err` carries the failure description.
async fn fetch_document(
    http: &reqwest::Client,
    url: &str,
) -> std::result::Result<Option<DiscoveryOutcome>, String> {
    let response = http
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| e.to_string())?;
    let status = response.status();
    let raw: Value = response.json().await.map_err(|e| e.to_string())?;

    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }
    if raw.get("services").is_none() && raw.get("cds-services").is_none() {
        return Ok(None);
    }
    let document: DiscoveryDocument =
        serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
    Ok(Some(DiscoveryOutcome {
        url: url.to_string(),
        raw,
        document,
    }))
}
