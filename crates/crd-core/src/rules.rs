use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A prior-authorization rule for a single billing or medication code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub pa_message: String,
    pub pa_needed: String,
    pub doc_needed: String,
    pub doc_purpose: String,
    pub info_needed: String,
}

impl RuleRecord {
    fn new(
        pa_message: &str,
        pa_needed: &str,
        doc_needed: &str,
        doc_purpose: &str,
        info_needed: &str,
    ) -> Self {
        Self {
            pa_message: pa_message.to_string(),
            pa_needed: pa_needed.to_string(),
            doc_needed: doc_needed.to_string(),
            doc_purpose: doc_purpose.to_string(),
            info_needed: info_needed.to_string(),
        }
    }

    /// The rule asks for prior authorization up front.
    pub fn requires_authorization(&self) -> bool {
        self.pa_needed == "auth-needed"
    }

    /// Rewrite the rule for an inpatient encounter: inpatient admissions
    /// waive prior authorization, so the record becomes a no-auth variant
    /// with an exception note appended to the message.
    pub fn with_inpatient_exception(&self) -> Self {
        Self {
            pa_message: format!("{} (inpatient exception: no PA required)", self.pa_message),
            pa_needed: "no-auth".to_string(),
            doc_needed: "none".to_string(),
            doc_purpose: "NA".to_string(),
            info_needed: "NA".to_string(),
        }
    }
}

/// The three rule tables the resolver consults, in lookup order:
/// procedure (CPT/HCPCS), medication, then RxNorm. Constructed once at
/// process start and handed to the evaluator; never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub procedure: IndexMap<String, RuleRecord>,
    #[serde(default)]
    pub medication: IndexMap<String, RuleRecord>,
    #[serde(default)]
    pub rxnorm: IndexMap<String, RuleRecord>,
}

impl RuleSet {
    /// The shipped demonstration tables.
    pub fn builtin() -> Self {
        let procedure = IndexMap::from([
            (
                "70551".to_string(),
                RuleRecord::new(
                    "MRI Brain requires prior authorization.",
                    "auth-needed",
                    "clinical",
                    "withpa",
                    "performer",
                ),
            ),
            (
                "99213".to_string(),
                RuleRecord::new(
                    "Office visit (low complexity) does not require PA.",
                    "no-auth",
                    "admin",
                    "withclaim",
                    "location",
                ),
            ),
            (
                "E0260".to_string(),
                RuleRecord::new(
                    "Hospital bed rental requires PA.",
                    "auth-needed",
                    "patient",
                    "retain-doc",
                    "timeframe",
                ),
            ),
            (
                "E0424".to_string(),
                RuleRecord::new(
                    "Stationary compressed gas oxygen system requires PA.",
                    "auth-needed",
                    "clinical",
                    "withpa",
                    "contract-window",
                ),
            ),
            (
                "E0601".to_string(),
                RuleRecord::new(
                    "CPAP device requires PA and supporting documentation.",
                    "auth-needed",
                    "patient",
                    "withorder",
                    "detail-code",
                ),
            ),
            (
                "G0180".to_string(),
                RuleRecord::new(
                    "Home health certification require PA.",
                    "auth-needed",
                    "admin",
                    "OTH",
                    "OTH",
                ),
            ),
            (
                "92015".to_string(),
                RuleRecord::new(
                    "92015 does not require prior authorization.",
                    "no-auth",
                    "none",
                    "NA",
                    "NA",
                ),
            ),
            (
                "97802".to_string(),
                RuleRecord::new(
                    "97802 does not require prior authorization.",
                    "no-auth",
                    "none",
                    "NA",
                    "NA",
                ),
            ),
        ]);
        let medication = IndexMap::from([
            (
                "617314".to_string(),
                RuleRecord::new(
                    "Prior authorization required for Adalimumab",
                    "yes",
                    "yes",
                    "PA",
                    "clinical documentation including diagnosis and previous therapy",
                ),
            ),
            (
                "83367".to_string(),
                RuleRecord::new(
                    "No prior authorization required for Atorvastatin",
                    "no",
                    "none",
                    "NA",
                    "NA",
                ),
            ),
        ]);
        let rxnorm = IndexMap::from([
            (
                "1993270".to_string(),
                RuleRecord::new(
                    "Semaglutide (Ozempic) requires prior authorization.",
                    "auth-needed",
                    "clinical",
                    "withpa",
                    "diagnosis",
                ),
            ),
            (
                "617314".to_string(),
                RuleRecord::new(
                    "Amoxicillin does not require prior authorization.",
                    "no-auth",
                    "admin",
                    "withclaim",
                    "OTH",
                ),
            ),
            (
                "744624".to_string(),
                RuleRecord::new(
                    "Adalimumab requires prior authorization and step therapy documentation.",
                    "auth-needed",
                    "clinical",
                    "withpa",
                    "diagnosis-history",
                ),
            ),
        ]);
        Self {
            procedure,
            medication,
            rxnorm,
        }
    }

    /// Load a rule set from its JSON representation.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Resolve the rule for a code. Tables are consulted in a fixed
    /// order, so a code present in more than one table (617314 lives in
    /// both the medication and RxNorm tables) resolves from the earlier
    /// one. Unknown codes get a conditional default rather than a miss.
    pub fn resolve(&self, code: &str) -> RuleRecord {
        self.procedure
            .get(code)
            .or_else(|| self.medication.get(code))
            .or_else(|| self.rxnorm.get(code))
            .cloned()
            .unwrap_or_else(Self::default_rule)
    }

    fn default_rule() -> RuleRecord {
        RuleRecord::new(
            "No prior authorization required",
            "conditional",
            "conditional",
            "OTH",
            "OTH",
        )
    }
}
