use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use finstmt_core::error::{AppError, AppResult};

/// One parent -> child arc from a calculation linkbase file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyRelationship {
    pub parent_concept: String,
    pub child_concept: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub order: Option<f64>,
}

fn default_weight() -> f64 {
    1.0
}

/// `<taxonomy>-calc.json`: the calculation linkbase extracted to JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalcLinkbaseFile {
    #[serde(default)]
    pub taxonomy: Option<String>,
    #[serde(default)]
    pub relationships: Vec<TaxonomyRelationship>,
}

/// One concept label entry from a labels file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyConceptLabel {
    pub concept_name: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// `<taxonomy>-labels.json`: label linkbase plus the optional
/// semantic-equivalence groups derived from the reference linkbase
/// (canonical concept -> equivalent concept names).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsFile {
    #[serde(default)]
    pub taxonomy: Option<String>,
    #[serde(default)]
    pub concepts: Vec<TaxonomyConceptLabel>,
    #[serde(default)]
    pub semantic_equivalence: HashMap<String, Vec<String>>,
}

/// Strip a namespace prefix: "us-gaap:Revenue" -> "Revenue"
pub fn strip_namespace(concept: &str) -> &str {
    concept.rsplit(':').next().unwrap_or(concept)
}

/// Read and parse one calculation linkbase file.
///
/// A missing file is `TaxonomyMissing` (recoverable: the caller downgrades
/// to pattern matching); invalid JSON is `TaxonomyCorrupt` (fatal).
pub fn read_calc_file(path: &Path) -> AppResult<CalcLinkbaseFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::TaxonomyMissing(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::TaxonomyCorrupt(format!("{}: {}", path.display(), e)))
}

/// Read and parse one labels file.
pub fn read_labels_file(path: &Path) -> AppResult<LabelsFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::TaxonomyMissing(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::TaxonomyCorrupt(format!("{}: {}", path.display(), e)))
}

/// Find every file matching the given suffix directly in `dir` or one
/// level below it (taxonomies may be grouped into per-year directories).
pub fn find_linkbase_files(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return found,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Ok(subentries) = std::fs::read_dir(&path) {
                for sub in subentries.flatten() {
                    let sub_path = sub.path();
                    if is_suffix_match(&sub_path, suffix) {
                        found.push(sub_path);
                    }
                }
            }
        } else if is_suffix_match(&path, suffix) {
            found.push(path);
        }
    }

    found.sort();
    found
}

fn is_suffix_match(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(suffix))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_namespace_prefixes() {
        // REQUIREMENT: Linkbase arcs name concepts with namespace prefixes
        // PURPOSE: Verify prefixes strip and bare names pass through
        assert_eq!(strip_namespace("us-gaap:Revenues"), "Revenues");
        assert_eq!(strip_namespace("ifrs-full:Equity"), "Equity");
        assert_eq!(strip_namespace("Assets"), "Assets");
    }

    #[test]
    fn calc_file_parses() {
        // REQUIREMENT: The calc linkbase JSON lists parent/child/weight arcs
        // PURPOSE: Verify the serde model matches the file format
        let file: CalcLinkbaseFile = serde_json::from_str(
            r#"{
                "taxonomy": "US-GAAP",
                "relationships": [
                    {"parent_concept": "us-gaap:Assets",
                     "child_concept": "us-gaap:AssetsCurrent",
                     "weight": 1.0, "order": 1.0}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(file.relationships.len(), 1);
        assert_eq!(file.relationships[0].weight, 1.0);
    }

    #[test]
    fn labels_file_parses_with_equivalence() {
        // REQUIREMENT: Labels files optionally carry semantic-equivalence groups
        // PURPOSE: Verify both the concept list and the synonym map parse
        let file: LabelsFile = serde_json::from_str(
            r#"{
                "concepts": [
                    {"concept_name": "Revenues", "label": "Revenues"},
                    {"concept_name": "Revenue", "label": "Revenues"}
                ],
                "semantic_equivalence": {
                    "Revenue": ["Revenues", "SalesRevenueNet"]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(file.concepts.len(), 2);
        assert_eq!(file.semantic_equivalence["Revenue"].len(), 2);
    }
}
