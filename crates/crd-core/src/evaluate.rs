use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::codes::{CodeTable, CodingSystem};
use crate::error::{CoreError, Result};
use crate::extract::extract_codes;
use crate::model::{
    Card, CardLink, CardSource, ContextPayload, DecisionResponse, Indicator, Suggestion,
    SuggestionAction, SystemAction,
};
use crate::orders::{EncounterClass, classify_encounter, locate_draft_resource, validate_pa_flag};
use crate::rules::RuleSet;

const SUPPORTED_HOOK: &str = "order-sign";
const COVERAGE_INFO_EXT: &str =
    "http://hl7.org/fhir/us/davinci-crd/StructureDefinition/ext-coverage-information";
const TEMP_CODE_SYSTEM: &str = "http://hl7.org/fhir/us/davinci-crd/CodeSystem/temp";

/// Subject references carrying this value mean the caller had no patient.
const PATIENT_PLACEHOLDER: &str = "Patient/null";

/// Identity of the deciding service, shown in every card's source block.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub label: String,
    pub url: String,
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self {
            label: "CRD Reference Server".to_string(),
            url: "http://localhost:3011".to_string(),
        }
    }
}

/// Run the full decision pipeline over one invocation payload.
///
/// Rejections (bad hook, unrecognized code, malformed PA flag, no draft
/// order) surface as errors and abort processing. Missing patient or
/// coverage information is clinical guidance, not a failure: those paths
/// return an advisory-card response with no system actions.
pub fn evaluate(
    payload: &ContextPayload,
    rules: &RuleSet,
    codes: &CodeTable,
    source: &SourceInfo,
) -> Result<DecisionResponse> {
    let hook = payload.hook.as_deref().ok_or(CoreError::MissingHook)?;
    if hook != SUPPORTED_HOOK {
        return Err(CoreError::unsupported_hook(hook));
    }

    let Some(patient_ref) = resolve_patient_reference(payload) else {
        debug!("no patient reference resolvable from context or prefetch");
        return Ok(DecisionResponse::advisory(Card::advisory(
            "Missing patient reference",
            Indicator::Critical,
            "The CRD request did not include a valid patient reference.",
            CardSource {
                label: source.label.clone(),
                url: Some(source.url.clone()),
                topic: None,
            },
        )));
    };

    let Some(coverage_id) = resolve_coverage_id(payload) else {
        debug!(patient = %patient_ref, "no coverage resource in prefetch");
        return Ok(DecisionResponse::advisory(Card::advisory(
            "Cannot evaluate prior authorization rules",
            Indicator::Warning,
            "No Coverage information provided for this patient.",
            CardSource {
                label: source.label.clone(),
                url: None,
                topic: None,
            },
        )));
    };

    let extracted = extract_codes(payload);
    let code = extracted
        .first()
        .map(|c| c.to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    if !codes.is_valid(&code) {
        return Err(CoreError::invalid_code(code));
    }

    let mut rule = rules.resolve(&code);

    let draft = locate_draft_resource(payload).ok_or(CoreError::MissingDraftOrder)?;
    validate_pa_flag(&draft)?;

    let encounter = classify_encounter(payload.context.draft_orders.as_ref());
    if encounter == EncounterClass::Inpatient && rule.requires_authorization() {
        rule = rule.with_inpatient_exception();
    }
    debug!(code = %code, pa_needed = %rule.pa_needed, "rule resolved");

    let requires_auth = rule.pa_message.contains("requires");
    let system_uri = CodingSystem::infer(&code).uri();

    let card = Card {
        uuid: Some(format!("uuid-{code}")),
        summary: if requires_auth {
            "Prior Authorization Required".to_string()
        } else {
            "No Prior Auth Needed".to_string()
        },
        indicator: if requires_auth {
            Indicator::Warning
        } else {
            Indicator::Info
        },
        detail: Some(format!(
            "Coverage info for patient {patient_ref}. Code: {code}"
        )),
        source: CardSource {
            label: source.label.clone(),
            url: Some(source.url.clone()),
            topic: Some(json!({
                "system": TEMP_CODE_SYSTEM,
                "code": "guideline",
                "display": "Coverage Requirement",
            })),
        },
        links: vec![CardLink {
            label: "Coverage Guidelines".to_string(),
            url: format!("https://example.org/guidelines/{code}"),
            link_type: "absolute".to_string(),
        }],
        suggestions: if requires_auth {
            vec![Suggestion {
                label: "Submit Prior Auth (PAS)".to_string(),
                actions: vec![SuggestionAction {
                    action_type: "create".to_string(),
                    description: "Submit a PAS Claim Bundle".to_string(),
                    resource: json!({
                        "resourceType": "Claim",
                        "id": format!("claim-{code}"),
                    }),
                }],
            }]
        } else {
            Vec::new()
        },
    };

    let patched = json!({
        "resourceType": draft.resource_type,
        "id": draft.id,
        "extension": [{
            "url": COVERAGE_INFO_EXT,
            "extension": [
                { "url": "coverage", "valueReference": { "reference": format!("Coverage/{coverage_id}") } },
                { "url": "covered", "valueCode": "covered" },
                { "url": "pa-needed", "valueCode": rule.pa_needed },
                { "url": "doc-needed", "valueCode": rule.doc_needed },
                { "url": "doc-purpose", "valueCode": rule.doc_purpose },
                { "url": "info-needed", "valueCode": rule.info_needed },
                { "url": "billingCode", "valueCoding": { "system": system_uri, "code": code } },
                {
                    "url": "reason",
                    "valueCodeableConcept": {
                        "coding": [{
                            "system": TEMP_CODE_SYSTEM,
                            "code": "auth-out-network",
                            "display": "Authorization needed out-of-network",
                        }],
                        "text": "In-network required unless exigent circumstances",
                    }
                },
            ],
        }],
        "status": "draft",
        "intent": "original-order",
        "code": { "coding": [{ "system": system_uri, "code": code }] },
        "subject": { "reference": patient_ref },
        "authoredOn": now_rfc3339(),
    });

    Ok(DecisionResponse {
        cards: vec![card],
        system_actions: vec![SystemAction::update(patched)],
    })
}

/// Patient reference, from three sources in priority order: the explicit
/// context id, the device-request prefetch subject (unless it carries the
/// null placeholder), then the prefetch patient resource id.
fn resolve_patient_reference(payload: &ContextPayload) -> Option<String> {
    if let Some(id) = payload.context.patient_id.as_deref() {
        return Some(patient_reference(id));
    }
    let device_subject = payload
        .prefetch_entry("deviceRequest")
        .and_then(|r| r.get("subject"))
        .and_then(|s| s.get("reference"))
        .and_then(Value::as_str)
        .filter(|r| *r != PATIENT_PLACEHOLDER);
    if let Some(reference) = device_subject {
        return Some(reference.to_string());
    }
    payload
        .prefetch_entry("patient")
        .and_then(|p| p.get("id"))
        .and_then(Value::as_str)
        .map(patient_reference)
}

fn patient_reference(id: &str) -> String {
    format!("Patient/{}", id.strip_prefix("Patient/").unwrap_or(id))
}

/// Id of the first Coverage resource in the coverage-bundle prefetch.
fn resolve_coverage_id(payload: &ContextPayload) -> Option<String> {
    payload
        .prefetch_entry("coverageBundle")
        .and_then(|b| b.get("entry"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|e| e.get("resource"))
        .find(|r| r.get("resourceType").and_then(Value::as_str) == Some("Coverage"))
        .and_then(|r| r.get("id"))
        .and_then(Value::as_str)
        .map(String::from)
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
