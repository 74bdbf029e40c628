use indexmap::IndexMap;
use serde_json::{Value, json};

use crd_core::model::{ContextPayload, ServiceManifest};
use crd_core::searchset_bundle;

/// The four prefetch keys filled when no manifest declares its own.
pub const FIXED_PREFETCH_KEYS: [&str; 4] = [
    "serviceRequestBundle",
    "deviceRequestBundle",
    "medicationRequestBundle",
    "coverageBundle",
];

/// What a prefetch key is asking for, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchTopic {
    ServiceRequest,
    DeviceRequest,
    MedicationRequest,
    Coverage,
    Other,
}

impl PrefetchTopic {
    /// Classify a key by canonicalizing it (lowercase, letters only) and
    /// matching by substring containment, most specific first.
    pub fn classify(key: &str) -> Self {
        let canonical: String = key
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_lowercase();
        if canonical.contains("servicerequest") {
            Self::ServiceRequest
        } else if canonical.contains("devicerequest") {
            Self::DeviceRequest
        } else if canonical.contains("medicationrequest") {
            Self::MedicationRequest
        } else if canonical.contains("coverage") {
            Self::Coverage
        } else {
            Self::Other
        }
    }
}

/// Synthesize the searchset Bundle a prefetch key would have fetched.
///
/// Deterministic for a given payload: the patient comes from
/// `context.patientId` (or the demo id), the matching draft order is
/// pulled from `context.draftOrders`, and the rest is a fixed cast of
/// demonstration resources. Keys naming no known topic get a patient-only
/// bundle.
pub fn infer_bundle_for_key(key: &str, payload: &ContextPayload) -> Value {
    let patient_id = payload
        .context
        .patient_id
        .as_deref()
        .unwrap_or("demo-patient");
    let patient = json!({
        "resourceType": "Patient",
        "id": patient_id,
        "name": [{ "text": "Test Patient" }],
    });

    match PrefetchTopic::classify(key) {
        PrefetchTopic::ServiceRequest => {
            let sr = find_draft(payload, "ServiceRequest");
            searchset_bundle(with_practitioner_cast(vec![sr, patient]))
        }
        PrefetchTopic::DeviceRequest => {
            let dr = find_draft(payload, "DeviceRequest");
            let mut device = json!({ "resourceType": "Device", "id": "dev1" });
            if let Some(code) = dr.get("codeCodeableConcept") {
                device["type"] = code.clone();
            }
            searchset_bundle(with_practitioner_cast(vec![dr, device, patient]))
        }
        PrefetchTopic::MedicationRequest => {
            let mr = find_draft(payload, "MedicationRequest");
            searchset_bundle(with_practitioner_cast(vec![mr, patient]))
        }
        PrefetchTopic::Coverage => {
            let coverage = json!({
                "resourceType": "Coverage",
                "id": "cov1",
                "status": "active",
                "beneficiary": { "reference": format!("Patient/{patient_id}") },
                "payor": [{ "reference": "Organization/payer1" }],
            });
            let payer = json!({
                "resourceType": "Organization",
                "id": "payer1",
                "name": "Example Health Plan",
            });
            searchset_bundle(vec![coverage, patient, payer])
        }
        PrefetchTopic::Other => searchset_bundle(vec![patient]),
    }
}

/// First draft-orders resource of the requested type, or null so the
/// bundle wrapper drops it.
fn find_draft(payload: &ContextPayload, resource_type: &str) -> Value {
    payload
        .draft_order_resources()
        .find(|r| r.get("resourceType").and_then(Value::as_str) == Some(resource_type))
        .cloned()
        .unwrap_or(Value::Null)
}

fn with_practitioner_cast(mut resources: Vec<Value>) -> Vec<Value> {
    resources.push(json!({
        "resourceType": "PractitionerRole",
        "id": "prr1",
        "practitioner": { "reference": "Practitioner/p1" },
        "organization": { "reference": "Organization/o1" },
    }));
    resources.push(json!({
        "resourceType": "Practitioner",
        "id": "p1",
        "name": [{ "text": "Alice Smith, MD" }],
    }));
    resources.push(json!({
        "resourceType": "Organization",
        "id": "o1",
        "name": "Good Health Clinic",
    }));
    resources
}

/// Align a payload's prefetch to a discovery manifest.
///
/// Returns a new payload; the input is never mutated. Declared keys whose
/// entries are already non-null are kept as-is. Missing or null entries
/// are filled with an inferred bundle when `build_prefetch` is set,
/// otherwise left declared-but-null. Undeclared entries are never
/// removed. A manifest declaring no prefetch keys leaves the payload
/// untouched.
pub fn align_to_manifest(
    manifest: &ServiceManifest,
    payload: &ContextPayload,
    build_prefetch: bool,
) -> ContextPayload {
    let mut aligned = payload.clone();
    if manifest.prefetch.is_empty() {
        return aligned;
    }
    let prefetch = aligned.prefetch.get_or_insert_with(IndexMap::new);
    for key in manifest.prefetch.keys() {
        let present = prefetch.get(key).is_some_and(|v| !v.is_null());
        if present {
            continue;
        }
        let value = if build_prefetch {
            infer_bundle_for_key(key, payload)
        } else {
            Value::Null
        };
        prefetch.insert(key.clone(), value);
    }
    aligned
}

/// Fill the fixed four-key prefetch list, used when no manifest is
/// available and the caller asked for built prefetch. Existing non-null
/// entries win.
pub fn align_with_fixed_keys(payload: &ContextPayload) -> ContextPayload {
    let mut aligned = payload.clone();
    let prefetch = aligned.prefetch.get_or_insert_with(IndexMap::new);
    for key in FIXED_PREFETCH_KEYS {
        let present = prefetch.get(key).is_some_and(|v| !v.is_null());
        if !present {
            prefetch.insert(key.to_string(), infer_bundle_for_key(key, payload));
        }
    }
    aligned
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_include;
    use indexmap::IndexMap;

    fn payload(value: Value) -> ContextPayload {
        serde_json::from_value(value).unwrap()
    }

    fn order_sign_payload() -> ContextPayload {
        payload(json!({
            "hook": "order-sign",
            "context": {
                "patientId": "pat-7",
                "draftOrders": {
                    "resourceType": "Bundle",
                    "entry": [
                        {
                            "resource": {
                                "resourceType": "ServiceRequest",
                                "id": "sr-1",
                                "code": { "coding": [{ "code": "70551" }] }
                            }
                        },
                        {
                            "resource": {
                                "resourceType": "DeviceRequest",
                                "id": "dr-1",
                                "codeCodeableConcept": { "coding": [{ "code": "E0601" }] }
                            }
                        }
                    ]
                }
            }
        }))
    }

    #[test]
    fn test_topic_classification() {
        assert_eq!(
            PrefetchTopic::classify("serviceRequestBundle"),
            PrefetchTopic::ServiceRequest
        );
        assert_eq!(
            PrefetchTopic::classify("device-request"),
            PrefetchTopic::DeviceRequest
        );
        assert_eq!(
            PrefetchTopic::classify("medicationRequest"),
            PrefetchTopic::MedicationRequest
        );
        assert_eq!(PrefetchTopic::classify("coverage"), PrefetchTopic::Coverage);
        assert_eq!(PrefetchTopic::classify("patient"), PrefetchTopic::Other);
    }

    #[test]
    fn test_service_request_bundle_contains_order_and_cast() {
        let bundle = infer_bundle_for_key("serviceRequestBundle", &order_sign_payload());
        let types: Vec<&str> = bundle["entry"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["resource"]["resourceType"].as_str().unwrap())
            .collect();
        assert_eq!(
            types,
            vec![
                "ServiceRequest",
                "Patient",
                "PractitionerRole",
                "Practitioner",
                "Organization"
            ]
        );
        assert_eq!(bundle["entry"][0]["fullUrl"], "ServiceRequest/sr-1");
    }

    #[test]
    fn test_device_bundle_copies_code_onto_device() {
        let bundle = infer_bundle_for_key("deviceRequestBundle", &order_sign_payload());
        let device = bundle["entry"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| &e["resource"])
            .find(|r| r["resourceType"] == "Device")
            .unwrap();
        assert_json_include!(
            actual: device,
            expected: json!({
                "id": "dev1",
                "type": { "coding": [{ "code": "E0601" }] }
            })
        );
    }

    #[test]
    fn test_missing_draft_order_is_dropped_from_bundle() {
        let p = payload(json!({ "context": { "patientId": "pat-7" } }));
        let bundle = infer_bundle_for_key("medicationRequestBundle", &p);
        let types: Vec<&str> = bundle["entry"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["resource"]["resourceType"].as_str().unwrap())
            .collect();
        assert!(!types.contains(&"MedicationRequest"));
        assert_eq!(bundle["total"], 4);
    }

    #[test]
    fn test_coverage_bundle_references_patient() {
        let bundle = infer_bundle_for_key("coverageBundle", &order_sign_payload());
        assert_eq!(
            bundle["entry"][0]["resource"]["beneficiary"]["reference"],
            "Patient/pat-7"
        );
        assert_eq!(bundle["entry"][2]["resource"]["name"], "Example Health Plan");
    }

    #[test]
    fn test_unknown_key_gets_patient_only_bundle() {
        let p = payload(json!({ "context": {} }));
        let bundle = infer_bundle_for_key("encounter", &p);
        assert_eq!(bundle["total"], 1);
        assert_eq!(bundle["entry"][0]["resource"]["id"], "demo-patient");
    }

    #[test]
    fn test_inference_is_deterministic() {
        let p = order_sign_payload();
        assert_eq!(
            infer_bundle_for_key("coverageBundle", &p),
            infer_bundle_for_key("coverageBundle", &p)
        );
    }

    fn manifest(keys: &[&str]) -> ServiceManifest {
        ServiceManifest {
            id: Some("order-sign-crd".into()),
            hook: Some("order-sign".into()),
            title: None,
            description: None,
            prefetch: keys
                .iter()
                .map(|k| (k.to_string(), format!("{k}?patient={{{{context.patientId}}}}")))
                .collect(),
        }
    }

    #[test]
    fn test_align_never_overwrites_non_null_entry() {
        let mut p = order_sign_payload();
        let mut prefetch = IndexMap::new();
        prefetch.insert("coverageBundle".to_string(), json!({ "resourceType": "Bundle", "id": "mine" }));
        p.prefetch = Some(prefetch);

        let aligned = align_to_manifest(&manifest(&["coverageBundle"]), &p, true);
        assert_eq!(
            aligned.prefetch.unwrap()["coverageBundle"]["id"],
            "mine"
        );
    }

    #[test]
    fn test_align_without_build_leaves_declared_keys_null() {
        let aligned = align_to_manifest(
            &manifest(&["patient", "coverageBundle"]),
            &order_sign_payload(),
            false,
        );
        let prefetch = aligned.prefetch.unwrap();
        assert!(prefetch["patient"].is_null());
        assert!(prefetch["coverageBundle"].is_null());
    }

    #[test]
    fn test_align_with_build_fills_declared_keys() {
        let aligned = align_to_manifest(
            &manifest(&["coverageBundle"]),
            &order_sign_payload(),
            true,
        );
        let prefetch = aligned.prefetch.unwrap();
        assert_eq!(prefetch["coverageBundle"]["resourceType"], "Bundle");
        assert_eq!(prefetch["coverageBundle"]["type"], "searchset");
    }

    #[test]
    fn test_align_fills_null_entry_when_building() {
        let mut p = order_sign_payload();
        let mut prefetch = IndexMap::new();
        prefetch.insert("coverageBundle".to_string(), Value::Null);
        p.prefetch = Some(prefetch);

        let aligned = align_to_manifest(&manifest(&["coverageBundle"]), &p, true);
        assert!(!aligned.prefetch.unwrap()["coverageBundle"].is_null());
    }

    #[test]
    fn test_align_keeps_undeclared_entries() {
        let mut p = order_sign_payload();
        let mut prefetch = IndexMap::new();
        prefetch.insert("extraKey".to_string(), json!({ "kept": true }));
        p.prefetch = Some(prefetch);

        let aligned = align_to_manifest(&manifest(&["coverageBundle"]), &p, false);
        assert_eq!(aligned.prefetch.unwrap()["extraKey"]["kept"], true);
    }

    #[test]
    fn test_empty_manifest_leaves_payload_untouched() {
        let p = order_sign_payload();
        let aligned = align_to_manifest(&manifest(&[]), &p, true);
        assert_eq!(aligned, p);
    }

    #[test]
    fn test_align_does_not_mutate_input() {
        let p = order_sign_payload();
        let _ = align_to_manifest(&manifest(&["coverageBundle"]), &p, true);
        assert!(p.prefetch.is_none());
    }

    #[test]
    fn test_fixed_keys_alignment_fills_all_four() {
        let aligned = align_with_fixed_keys(&order_sign_payload());
        let prefetch = aligned.prefetch.unwrap();
        for key in FIXED_PREFETCH_KEYS {
            let bundle = &prefetch[key];
            assert_eq!(bundle["resourceType"], "Bundle", "missing bundle for {key}");
            assert!(!bundle.is_null());
        }
    }
}
