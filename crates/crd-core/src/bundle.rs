use serde_json::{Value, json};

/// Wrap resources into a FHIR `searchset` Bundle.
///
/// Null resources are filtered out. `fullUrl` is emitted as
/// `{resourceType}/{id}` only when the resource carries an id.
pub fn searchset_bundle(resources: Vec<Value>) -> Value {
    let entries: Vec<Value> = resources
        .into_iter()
        .filter(|r| !r.is_null())
        .map(entry_for)
        .collect();
    json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": entries.len(),
        "entry": entries,
    })
}

fn entry_for(resource: Value) -> Value {
    let full_url = match (
        resource.get("resourceType").and_then(Value::as_str),
        resource.get("id").and_then(Value::as_str),
    ) {
        (Some(rt), Some(id)) => Some(format!("{rt}/{id}")),
        _ => None,
    };
    match full_url {
        Some(url) => json!({ "fullUrl": url, "resource": resource }),
        None => json!({ "resource": resource }),
    }
}
