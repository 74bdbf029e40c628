use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A CDS Hooks invocation payload.
///
/// Only the fields the pipeline inspects are typed; everything else is
/// carried through the `extra` maps untouched so a round-tripped payload
/// keeps fields we do not understand. `prefetch` distinguishes an absent
/// map from present-but-null entries: a declared key may legitimately map
/// to `null` when the caller had nothing to supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContextPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
    #[serde(rename = "hookInstance", skip_serializing_if = "Option::is_none")]
    pub hook_instance: Option<String>,
    #[serde(default)]
    pub context: HookContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch: Option<IndexMap<String, Value>>,
    #[serde(
        rename = "systemActions",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub system_actions: Vec<SystemAction>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ContextPayload {
    /// Look up a prefetch entry by key. Returns `None` both when the key
    /// is absent and when the whole prefetch map is missing.
    pub fn prefetch_entry(&self, key: &str) -> Option<&Value> {
        self.prefetch.as_ref().and_then(|p| p.get(key))
    }

    /// Resources of the draft-orders bundle, in entry order.
    pub fn draft_order_resources(&self) -> impl Iterator<Item = &Value> {
        self.context
            .draft_orders
            .as_ref()
            .and_then(|b| b.get("entry"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|e| e.get("resource"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HookContext {
    #[serde(rename = "patientId", skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "draftOrders", skip_serializing_if = "Option::is_none")]
    pub draft_orders: Option<Value>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// A machine-applied resource patch, either received in a payload or
/// returned in a decision response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SystemAction {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl SystemAction {
    pub fn update(resource: Value) -> Self {
        Self {
            action_type: Some("update".to_string()),
            resource: Some(resource),
            extra: IndexMap::new(),
        }
    }
}

/// A remote CDS service as declared in a discovery document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ServiceManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub prefetch: IndexMap<String, String>,
}

/// A discovery response; servers in the wild use either the standard
/// `services` key or the legacy `cds-services` spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DiscoveryDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceManifest>,
    #[serde(
        rename = "cds-services",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub cds_services: Vec<ServiceManifest>,
}

impl DiscoveryDocument {
    pub fn all_services(&self) -> impl Iterator<Item = &ServiceManifest> {
        self.services.iter().chain(self.cds_services.iter())
    }

    pub fn find_service(&self, id: &str) -> Option<&ServiceManifest> {
        self.all_services().find(|s| s.id.as_deref() == Some(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSource {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardLink {
    pub label: String,
    pub url: String,
    #[serde(rename = "type")]
    pub link_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub description: String,
    pub resource: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    pub actions: Vec<SuggestionAction>,
}

/// A human-readable advisory returned to the ordering system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub summary: String,
    pub indicator: Indicator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub source: CardSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<CardLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
}

impl Card {
    /// An advisory-only card: no uuid, links, or suggestions.
    pub fn advisory(
        summary: impl Into<String>,
        indicator: Indicator,
        detail: impl Into<String>,
        source: CardSource,
    ) -> Self {
        Self {
            uuid: None,
            summary: summary.into(),
            indicator,
            detail: Some(detail.into()),
            source,
            links: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

/// The full decision-support response: cards plus optional system actions.
/// Built fresh per request; never merged with prior state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DecisionResponse {
    pub cards: Vec<Card>,
    #[serde(
        rename = "systemActions",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub system_actions: Vec<SystemAction>,
}

impl DecisionResponse {
    pub fn advisory(card: Card) -> Self {
        Self {
            cards: vec![card],
            system_actions: Vec::new(),
        }
    }
}
