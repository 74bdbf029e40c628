use serde_json::Value;

use crate::model::ContextPayload;

/// Resource fields that may carry a codeable concept, in inspection order.
const CODE_FIELDS: [&str; 6] = [
    "code",
    "codeCodeableConcept",
    "productCodeableConcept",
    "medicationCodeableConcept",
    "reasonCode",
    "orderDetail",
];

/// Collect every billing/medication code present in the request document.
///
/// Walks the fixed collection points in discovery order: draft-order
/// bundle entries, the `deviceRequest` and `medicationRequest` prefetch
/// resources, then system-action resources. Order matters downstream
/// (only the first code is evaluated). Never fails; an empty document
/// yields an empty sequence.
pub fn extract_codes(payload: &ContextPayload) -> Vec<String> {
    let mut codes = Vec::new();
    for resource in collection_points(payload) {
        collect_resource_codes(resource, &mut codes);
    }
    codes
}

/// The code-bearing resources of the document, in fixed discovery order.
fn collection_points(payload: &ContextPayload) -> Vec<&Value> {
    let mut points: Vec<&Value> = payload.draft_order_resources().collect();
    points.extend(payload.prefetch_entry("deviceRequest"));
    points.extend(payload.prefetch_entry("medicationRequest"));
    points.extend(payload.system_actions.iter().filter_map(|a| a.resource.as_ref()));
    points
}

fn collect_resource_codes(resource: &Value, codes: &mut Vec<String>) {
    if !resource.is_object() {
        return;
    }
    for field in CODE_FIELDS {
        if let Some(value) = resource.get(field) {
            collect_codeable(value, codes);
        }
    }
    // `type` participates only when it is a collection; a scalar type is
    // not a codeable concept on the resources we inspect.
    if let Some(value) = resource.get("type") {
        if value.is_array() {
            collect_codeable(value, codes);
        }
    }
}

/// A codeable value is either a single concept or a collection of them.
/// Concepts with a `coding` list contribute every coding's `code`;
/// otherwise a plain `code` field is taken as-is.
fn collect_codeable(value: &Value, codes: &mut Vec<String>) {
    let items: &[Value] = match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    };
    for item in items {
        if let Some(codings) = item.get("coding").and_then(Value::as_array) {
            for coding in codings {
                if let Some(code) = coding.get("code").and_then(Value::as_str) {
                    codes.push(code.to_string());
                }
            }
        } else if let Some(code) = item.get("code").and_then(Value::as_str) {
            codes.push(code.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> ContextPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_document_yields_empty_sequence() {
        assert!(extract_codes(&ContextPayload::default()).is_empty());
        assert!(extract_codes(&payload(json!({ "hook": "order-sign" }))).is_empty());
    }

    #[test]
    fn test_service_request_coding_is_first() {
        let p = payload(json!({
            "context": {
                "draftOrders": {
                    "entry": [{
                        "resource": {
                            "resourceType": "ServiceRequest",
                            "id": "sr1",
                            "code": { "coding": [{ "code": "70551" }] }
                        }
                    }]
                }
            }
        }));
        let codes = extract_codes(&p);
        assert_eq!(codes.first().map(String::as_str), Some("70551"));
    }

    #[test]
    fn test_plain_code_without_coding_list() {
        let p = payload(json!({
            "context": {
                "draftOrders": {
                    "entry": [{
                        "resource": {
                            "resourceType": "ServiceRequest",
                            "id": "sr1",
                            "orderDetail": [{ "code": "E0601" }]
                        }
                    }]
                }
            }
        }));
        assert_eq!(extract_codes(&p), vec!["E0601"]);
    }

    #[test]
    fn test_prefetch_and_system_action_points() {
        let p = payload(json!({
            "prefetch": {
                "deviceRequest": {
                    "resourceType": "DeviceRequest",
                    "codeCodeableConcept": { "coding": [{ "code": "E0424" }] }
                },
                "medicationRequest": {
                    "resourceType": "MedicationRequest",
                    "medicationCodeableConcept": { "coding": [{ "code": "617314" }] }
                }
            },
            "systemActions": [{
                "type": "update",
                "resource": {
                    "resourceType": "ServiceRequest",
                    "reasonCode": [{ "coding": [{ "code": "99213" }] }]
                }
            }]
        }));
        assert_eq!(extract_codes(&p), vec!["E0424", "617314", "99213"]);
    }

    #[test]
    fn test_type_field_only_as_array() {
        let array_type = payload(json!({
            "prefetch": {
                "deviceRequest": {
                    "type": [{ "coding": [{ "code": "E0260" }] }]
                }
            }
        }));
        assert_eq!(extract_codes(&array_type), vec!["E0260"]);

        let scalar_type = payload(json!({
            "prefetch": {
                "deviceRequest": {
                    "type": { "coding": [{ "code": "E0260" }] }
                }
            }
        }));
        assert!(extract_codes(&scalar_type).is_empty());
    }

    #[test]
    fn test_discovery_order_draft_orders_first() {
        let p = payload(json!({
            "context": {
                "draftOrders": {
                    "entry": [{
                        "resource": { "code": { "coding": [{ "code": "70551" }] } }
                    }]
                }
            },
            "prefetch": {
                "deviceRequest": { "codeCodeableConcept": { "coding": [{ "code": "E0601" }] } }
            }
        }));
        assert_eq!(extract_codes(&p), vec!["70551", "E0601"]);
    }

    #[test]
    fn test_codings_without_code_are_skipped() {
        let p = payload(json!({
            "prefetch": {
                "deviceRequest": {
                    "code": { "coding": [{ "system": "x" }, { "code": "70551" }] }
                }
            }
        }));
        assert_eq!(extract_codes(&p), vec!["70551"]);
    }
}
