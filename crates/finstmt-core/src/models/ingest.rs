use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// **Canonical fact stream models**
///
/// One JSON document per filing, produced by the external XBRL parser.
/// These are pure serde DTOs; the loader resolves them against the
/// warehouse dimensions.

/// Top-level per-filing document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingDocument {
    /// Ticker symbol
    pub company: String,
    #[serde(default)]
    pub filing_type: Option<String>,
    /// Fiscal year the filing covers
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub metadata: FilingMetadata,
    #[serde(default)]
    pub facts: Vec<RawFact>,
    #[serde(default)]
    pub relationships: RawRelationships,
}

/// Filing-level metadata block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilingMetadata {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub filing_type: Option<String>,
    #[serde(default)]
    pub taxonomy: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// One fact as emitted by the parser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFact {
    pub concept: String,
    #[serde(default)]
    pub taxonomy: Option<String>,
    #[serde(default)]
    pub normalized_label: Option<String>,
    #[serde(default)]
    pub concept_type: Option<String>,
    #[serde(default)]
    pub concept_balance: Option<String>,
    #[serde(default)]
    pub concept_period_type: Option<String>,
    #[serde(default)]
    pub concept_data_type: Option<String>,
    #[serde(default)]
    pub concept_abstract: bool,
    /// Statement routing derived from the role URI during parsing;
    /// the most authoritative statement-type source
    #[serde(default)]
    pub statement_type: Option<String>,
    #[serde(default)]
    pub value_numeric: Option<f64>,
    #[serde(default)]
    pub value_text: Option<String>,
    #[serde(default)]
    pub unit_measure: Option<String>,
    #[serde(default)]
    pub decimals: Option<i32>,
    #[serde(default)]
    pub scale_int: Option<i32>,
    #[serde(default)]
    pub xbrl_format: Option<String>,
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub fact_id: Option<String>,
    #[serde(default)]
    pub source_line: Option<i32>,
    #[serde(default)]
    pub order_index: Option<i32>,
    #[serde(default = "default_true")]
    pub is_primary: bool,
    /// "duration" or "instant"
    #[serde(default)]
    pub period_type: Option<String>,
    #[serde(default)]
    pub period_start: Option<NaiveDate>,
    #[serde(default)]
    pub period_end: Option<NaiveDate>,
    #[serde(default)]
    pub instant_date: Option<NaiveDate>,
    /// axis name -> {"member": ...}; empty map = consolidated fact.
    /// BTreeMap keeps the key order stable for hashing.
    #[serde(default)]
    pub dimensions: BTreeMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl RawFact {
    /// Consolidated facts carry no dimensions
    pub fn is_consolidated(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// The date that identifies this fact's period for grouping
    pub fn period_key_date(&self) -> Option<NaiveDate> {
        self.instant_date.or(self.period_end)
    }
}

/// Relationship arcs extracted from the filing's linkbases
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRelationships {
    #[serde(default)]
    pub calculation: Vec<RawCalculationArc>,
    #[serde(default)]
    pub presentation: Vec<RawPresentationArc>,
    #[serde(default)]
    pub footnotes: Vec<RawFootnote>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCalculationArc {
    pub parent_concept: String,
    pub child_concept: String,
    #[serde(default)]
    pub parent_namespace: Option<String>,
    #[serde(default)]
    pub child_namespace: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub order_index: Option<i32>,
    #[serde(default)]
    pub arcrole: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPresentationArc {
    #[serde(default)]
    pub parent_concept: Option<String>,
    pub child_concept: String,
    #[serde(default)]
    pub parent_namespace: Option<String>,
    #[serde(default)]
    pub child_namespace: Option<String>,
    #[serde(default)]
    pub order_index: Option<i32>,
    #[serde(default)]
    pub preferred_label: Option<String>,
    #[serde(default)]
    pub statement_type: Option<String>,
    #[serde(default)]
    pub role_uri: Option<String>,
    #[serde(default)]
    pub arcrole: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFootnote {
    #[serde(default)]
    pub fact_id_xbrl: Option<String>,
    #[serde(default)]
    pub concept_name: Option<String>,
    #[serde(default)]
    pub footnote_text: Option<String>,
    #[serde(default)]
    pub footnote_label: Option<String>,
    #[serde(default)]
    pub footnote_role: Option<String>,
    #[serde(default)]
    pub footnote_lang: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filing_document_parses_minimal_json() {
        // REQUIREMENT: The canonical fact stream deserializes with most
        // fields absent
        // PURPOSE: Verify serde defaults and the period/consolidation helpers
        let doc: FilingDocument = serde_json::from_str(
            r#"{
                "company": "NVO",
                "filing_type": "ESEF",
                "year": 2024,
                "metadata": {"company_name": "Novo Nordisk A/S"},
                "facts": [
                    {
                        "concept": "Revenue",
                        "taxonomy": "ifrs",
                        "value_numeric": 290403000000.0,
                        "unit_measure": "DKK",
                        "period_type": "duration",
                        "period_start": "2024-01-01",
                        "period_end": "2024-12-31"
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.company, "NVO");
        assert_eq!(doc.facts.len(), 1);
        let fact = &doc.facts[0];
        assert!(fact.is_consolidated());
        assert!(fact.is_primary);
        assert_eq!(
            fact.period_key_date(),
            Some(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
        );
    }

    #[test]
    fn dimensional_fact_is_not_consolidated() {
        // REQUIREMENT: Facts with dimensions are never consolidated totals
        // PURPOSE: Verify is_consolidated keys off the dimensions map
        let fact: RawFact = serde_json::from_str(
            r#"{
                "concept": "Equity",
                "dimensions": {"ComponentsOfEquityAxis": {"member": "RetainedEarningsMember"}}
            }"#,
        )
        .unwrap();
        assert!(!fact.is_consolidated());
    }
}
