use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::Result;

/// The coding system a billing/medication code belongs to, inferred from
/// lexical shape alone. The inference is intentionally independent of the
/// membership table: a code that is valid under one system but shaped like
/// another will be labeled by shape (e.g. a 5-digit RxNorm id resolves as
/// CPT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingSystem {
    Hcpcs,
    Cpt,
    RxNorm,
    Unknown,
}

impl CodingSystem {
    /// Resolve a code's system by shape: one letter plus four digits is
    /// HCPCS, five digits CPT, six or seven digits RxNorm.
    pub fn infer(code: &str) -> Self {
        static HCPCS: OnceLock<Regex> = OnceLock::new();
        static CPT: OnceLock<Regex> = OnceLock::new();
        static RXNORM: OnceLock<Regex> = OnceLock::new();

        let hcpcs = HCPCS.get_or_init(|| Regex::new(r"^[A-Z]\d{4}$").unwrap());
        let cpt = CPT.get_or_init(|| Regex::new(r"^\d{5}$").unwrap());
        let rxnorm = RXNORM.get_or_init(|| Regex::new(r"^\d{6,7}$").unwrap());

        if hcpcs.is_match(code) {
            Self::Hcpcs
        } else if cpt.is_match(code) {
            Self::Cpt
        } else if rxnorm.is_match(code) {
            Self::RxNorm
        } else {
            Self::Unknown
        }
    }

    /// Canonical system URI for use in codings.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Hcpcs => "https://www.cms.gov/medicare/coding/hcpcs-release-code-sets",
            Self::Cpt => "http://www.ama-assn.org/go/cpt",
            Self::RxNorm => "http://www.nlm.nih.gov/research/umls/rxnorm",
            Self::Unknown => "http://example.org/unknown-system",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CodeTableFile {
    #[serde(rename = "CPT", default)]
    cpt: Vec<String>,
    #[serde(rename = "HCPCS", default)]
    hcpcs: Vec<String>,
    #[serde(rename = "RxNorm", default)]
    rxnorm: Vec<String>,
}

/// Membership sets for the codes this service recognizes. Read-only after
/// construction; built once at process start and passed into the
/// evaluator.
#[derive(Debug, Clone, Default)]
pub struct CodeTable {
    cpt: BTreeSet<String>,
    hcpcs: BTreeSet<String>,
    rxnorm: BTreeSet<String>,
}

impl CodeTable {
    /// The shipped code sets: every code the built-in rule tables know,
    /// plus the no-auth demonstration codes.
    pub fn builtin() -> Self {
        Self {
            cpt: ["70551", "99213", "92015", "97802"]
                .into_iter()
                .map(String::from)
                .collect(),
            hcpcs: ["E0260", "E0424", "E0601", "G0180"]
                .into_iter()
                .map(String::from)
                .collect(),
            rxnorm: ["1993270", "617314", "744624", "83367"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Load a code table from its JSON representation:
    /// `{"CPT": [...], "HCPCS": [...], "RxNorm": [...]}`.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: CodeTableFile = serde_json::from_str(raw)?;
        Ok(Self {
            cpt: file.cpt.into_iter().collect(),
            hcpcs: file.hcpcs.into_iter().collect(),
            rxnorm: file.rxnorm.into_iter().collect(),
        })
    }

    /// Membership test across all three sets.
    pub fn is_valid(&self, code: &str) -> bool {
        if code.is_empty() {
            return false;
        }
        self.cpt.contains(code) || self.hcpcs.contains(code) || self.rxnorm.contains(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_inference_by_shape() {
        assert_eq!(CodingSystem::infer("E0260"), CodingSystem::Hcpcs);
        assert_eq!(CodingSystem::infer("G0180"), CodingSystem::Hcpcs);
        assert_eq!(CodingSystem::infer("70551"), CodingSystem::Cpt);
        assert_eq!(CodingSystem::infer("617314"), CodingSystem::RxNorm);
        assert_eq!(CodingSystem::infer("1993270"), CodingSystem::RxNorm);
        assert_eq!(CodingSystem::infer("ABC"), CodingSystem::Unknown);
        assert_eq!(CodingSystem::infer(""), CodingSystem::Unknown);
        assert_eq!(CodingSystem::infer("12345678"), CodingSystem::Unknown);
    }

    #[test]
    fn test_five_digit_rxnorm_is_shaped_like_cpt() {
        // 83367 is an RxNorm id in the membership table but resolves as
        // CPT by shape. The two checks are independent.
        let table = CodeTable::builtin();
        assert!(table.is_valid("83367"));
        assert_eq!(CodingSystem::infer("83367"), CodingSystem::Cpt);
    }

    #[test]
    fn test_system_uris() {
        assert_eq!(
            CodingSystem::Cpt.uri(),
            "http://www.ama-assn.org/go/cpt"
        );
        assert_eq!(
            CodingSystem::Unknown.uri(),
            "http://example.org/unknown-system"
        );
    }

    #[test]
    fn test_builtin_membership() {
        let table = CodeTable::builtin();
        assert!(table.is_valid("70551"));
        assert!(table.is_valid("E0601"));
        assert!(table.is_valid("1993270"));
        assert!(!table.is_valid("00000"));
        assert!(!table.is_valid(""));
    }

    #[test]
    fn test_from_json_str() {
        let table = CodeTable::from_json_str(
            r#"{"CPT": ["11111"], "HCPCS": ["A1234"], "RxNorm": ["222222"]}"#,
        )
        .unwrap();
        assert!(table.is_valid("11111"));
        assert!(table.is_valid("A1234"));
        assert!(table.is_valid("222222"));
        assert!(!table.is_valid("70551"));

        assert!(CodeTable::from_json_str("not json").is_err());
    }
}
