use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::model::ContextPayload;

/// The clinical order resource a decision annotates.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftResource {
    pub resource_type: String,
    pub id: String,
    /// Extensions carried by the located resource; empty when the
    /// resource was synthesized from a prefetch entry.
    pub extension: Vec<Value>,
}

/// Id used when a prefetch resource qualifies as the draft order but
/// carries no id of its own.
const SYNTHESIZED_ID: &str = "idfromcontext";

/// Locate the draft order the decision applies to.
///
/// Strategies run in priority order: the first system action's resource,
/// the first draft-orders entry, then the first prefetch entry's
/// resource (with a synthesized id when absent). The first strategy that
/// produces a result wins; `None` means the request has no usable draft
/// order.
pub fn locate_draft_resource(payload: &ContextPayload) -> Option<DraftResource> {
    const STRATEGIES: [fn(&ContextPayload) -> Option<DraftResource>; 3] =
        [from_system_actions, from_draft_orders, from_prefetch];
    STRATEGIES.iter().find_map(|locate| locate(payload))
}

fn from_system_actions(payload: &ContextPayload) -> Option<DraftResource> {
    let resource = payload.system_actions.first()?.resource.as_ref()?;
    typed_with_id(resource)
}

fn from_draft_orders(payload: &ContextPayload) -> Option<DraftResource> {
    let resource = payload.draft_order_resources().next()?;
    typed_with_id(resource)
}

fn from_prefetch(payload: &ContextPayload) -> Option<DraftResource> {
    let resource = payload.prefetch.as_ref()?.values().next()?;
    let resource_type = resource.get("resourceType").and_then(Value::as_str)?;
    let id = resource
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(SYNTHESIZED_ID);
    Some(DraftResource {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        extension: Vec::new(),
    })
}

/// A resource qualifies only with both `resourceType` and `id`.
fn typed_with_id(resource: &Value) -> Option<DraftResource> {
    let resource_type = resource.get("resourceType").and_then(Value::as_str)?;
    let id = resource.get("id").and_then(Value::as_str)?;
    let extension = resource
        .get("extension")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Some(DraftResource {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        extension,
    })
}

/// Check the draft resource's optional prior-authorization override flag.
///
/// Absence of the extension is valid (no flag). A matching extension must
/// carry a boolean `valueBoolean`; anything else is a hard validation
/// failure and the whole request must be rejected.
pub fn validate_pa_flag(resource: &DraftResource) -> Result<Option<bool>> {
    let pa_ext = resource.extension.iter().find(|ext| {
        ext.get("url")
            .and_then(Value::as_str)
            .is_some_and(|url| url.contains("pa-requirement-flag") || url == "pa-needed")
    });
    let Some(ext) = pa_ext else {
        return Ok(None);
    };
    match ext.get("valueBoolean") {
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        _ => Err(CoreError::InvalidPaFlag),
    }
}

/// Encounter classification derived from the draft-orders bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterClass {
    Inpatient,
    Outpatient,
    Other,
    Unknown,
}

/// Classify the first Encounter in the bundle by its class code,
/// case-insensitively. No Encounter entry yields `Unknown`.
pub fn classify_encounter(draft_orders: Option<&Value>) -> EncounterClass {
    let encounter = draft_orders
        .and_then(|b| b.get("entry"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|e| e.get("resource"))
        .find(|r| r.get("resourceType").and_then(Value::as_str) == Some("Encounter"));
    let Some(encounter) = encounter else {
        return EncounterClass::Unknown;
    };
    let code = encounter
        .get("class")
        .and_then(|c| c.get("code"))
        .and_then(Value::as_str)
        .map(str::to_lowercase)
        .unwrap_or_default();
    match code.as_str() {
        "imp" | "inpatient" => EncounterClass::Inpatient,
        "amb" | "outpatient" | "outp" => EncounterClass::Outpatient,
        _ => EncounterClass::Other,
    }
}
