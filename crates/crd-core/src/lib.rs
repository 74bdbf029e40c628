pub mod bundle;
pub mod codes;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod model;
pub mod orders;
pub mod rules;

pub use bundle::searchset_bundle;
pub use codes::{CodeTable, CodingSystem};
pub use error::{CoreError, Result};
pub use evaluate::{SourceInfo, evaluate};
pub use extract::extract_codes;
pub use model::{
    Card, CardLink, CardSource, ContextPayload, DecisionResponse, DiscoveryDocument, HookContext,
    Indicator, ServiceManifest, Suggestion, SuggestionAction, SystemAction,
};
pub use orders::{DraftResource, EncounterClass, classify_encounter, locate_draft_resource};
pub use rules::{RuleRecord, RuleSet};
