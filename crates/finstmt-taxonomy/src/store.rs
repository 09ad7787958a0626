use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{info, warn};

use finstmt_core::error::{AppError, AppResult};

use crate::files::{
    find_linkbase_files, read_calc_file, read_labels_file, strip_namespace,
};

/// Parent link for one child concept in the calculation linkbase
#[derive(Debug, Clone, PartialEq)]
pub struct ParentLink {
    pub parent: String,
    pub weight: f64,
    pub order: Option<f64>,
}

/// Normalize a taxonomy identifier to its family.
///
/// Concept names are only unique within a framework: US-GAAP and IFRS
/// both define a `Revenue`, so every store lookup is scoped by family.
/// Year suffixes collapse ("us-gaap-2024" and "us-gaap" are the same
/// vocabulary) and ESEF extends IFRS.
pub fn taxonomy_family(taxonomy: &str) -> &'static str {
    let lower = taxonomy.to_lowercase();
    if lower.contains("gaap") || lower.contains("fasb") {
        "US-GAAP"
    } else if lower.contains("ifrs") || lower.contains("esef") {
        "IFRS"
    } else {
        "other"
    }
}

/// **TaxonomyStore**
///
/// In-memory view of every loaded taxonomy: calculation arcs, preferred
/// labels, and semantic-equivalence synonym groups, all keyed by
/// `(taxonomy family, concept name)` so mixed US-GAAP/IFRS corpora never
/// conflate same-named concepts. Loaded once at startup, read-only
/// afterwards, shared across workers behind an `Arc`.
///
/// The store is an explicit handle passed into the stages that need it;
/// nothing here is process-global.
#[derive(Debug, Default)]
pub struct TaxonomyStore {
    /// (family, child concept) -> its parent arc (namespace-stripped)
    child_to_parent: HashMap<(String, String), ParentLink>,
    /// (family, concept) pairs that parent at least one arc
    parents: HashSet<(String, String)>,
    /// (family, parent concept) -> number of children
    parent_child_counts: HashMap<(String, String), usize>,
    /// (family, concept) -> preferred label text
    labels: HashMap<(String, String), String>,
    /// (family, concept) -> canonical concept (synonym groups)
    synonyms: HashMap<(String, String), String>,
    /// taxonomy names that contributed relationships
    loaded_taxonomies: Vec<String>,
}

impl TaxonomyStore {
    /// Load every `*-calc.json` / `*-labels.json` under the taxonomy
    /// directory. A missing directory or file degrades to an empty store
    /// with a WARNING (hierarchy falls back to pattern matching); a file
    /// that exists but fails to parse aborts startup.
    pub fn load_from_dir(taxonomy_dir: &Path) -> AppResult<Self> {
        let mut store = TaxonomyStore::default();

        if !taxonomy_dir.exists() {
            warn!(
                "Taxonomy directory {} not found; hierarchy will use pattern-matching fallback",
                taxonomy_dir.display()
            );
            return Ok(store);
        }

        let calc_files = find_linkbase_files(taxonomy_dir, "-calc.json");
        if calc_files.is_empty() {
            warn!(
                "No taxonomy calculation files in {}; hierarchy will use pattern-matching fallback",
                taxonomy_dir.display()
            );
        }

        for path in &calc_files {
            let file = match read_calc_file(path) {
                Ok(file) => file,
                Err(AppError::TaxonomyMissing(msg)) => {
                    warn!("Skipping unreadable taxonomy file: {}", msg);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let taxonomy = file
                .taxonomy
                .clone()
                .unwrap_or_else(|| path.file_stem().unwrap_or_default().to_string_lossy().into_owned());
            let family = taxonomy_family(&taxonomy).to_string();

            let mut arc_count = 0usize;
            for rel in &file.relationships {
                let parent = strip_namespace(&rel.parent_concept).to_string();
                let child = strip_namespace(&rel.child_concept).to_string();
                if parent.is_empty() || child.is_empty() {
                    continue;
                }

                store.parents.insert((family.clone(), parent.clone()));
                *store
                    .parent_child_counts
                    .entry((family.clone(), parent.clone()))
                    .or_insert(0) += 1;
                // First linkbase of a family to claim a child wins;
                // later years must not silently re-parent concepts.
                store
                    .child_to_parent
                    .entry((family.clone(), child))
                    .or_insert(ParentLink {
                        parent,
                        weight: rel.weight,
                        order: rel.order,
                    });
                arc_count += 1;
            }

            info!(
                "Loaded {} calculation arcs from taxonomy '{}' (family {})",
                arc_count, taxonomy, family
            );
            store.loaded_taxonomies.push(taxonomy);
        }

        store.load_labels(taxonomy_dir)?;
        Ok(store)
    }

    fn load_labels(&mut self, taxonomy_dir: &Path) -> AppResult<()> {
        let labels_files = find_linkbase_files(taxonomy_dir, "-labels.json");
        let mut semantic_equivalence_used = false;

        for path in &labels_files {
            let file = match read_labels_file(path) {
                Ok(file) => file,
                Err(AppError::TaxonomyMissing(msg)) => {
                    warn!("Skipping unreadable labels file: {}", msg);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let taxonomy = file
                .taxonomy
                .clone()
                .unwrap_or_else(|| path.file_stem().unwrap_or_default().to_string_lossy().into_owned());
            let family = taxonomy_family(&taxonomy).to_string();

            for concept in &file.concepts {
                if let Some(label) = &concept.label {
                    let name = strip_namespace(&concept.concept_name).to_string();
                    self.labels
                        .entry((family.clone(), name))
                        .or_insert_with(|| label.clone());
                }
            }

            // Semantic equivalence from the reference linkbase is the
            // authoritative synonym source.
            if !file.semantic_equivalence.is_empty() {
                semantic_equivalence_used = true;
                for (canonical, equivalents) in &file.semantic_equivalence {
                    let canonical = strip_namespace(canonical).to_string();
                    for concept in equivalents {
                        let concept = strip_namespace(concept).to_string();
                        if concept != canonical {
                            self.synonyms
                                .insert((family.clone(), concept), canonical.clone());
                        }
                    }
                }
            }
        }

        if semantic_equivalence_used {
            info!(
                "Built {} synonym mappings from reference-linkbase semantic equivalence",
                self.synonyms.len()
            );
        } else if !self.labels.is_empty() {
            // Fallback: concepts sharing a case-insensitive label within
            // one family are synonyms; the shortest name is canonical.
            let mut by_label: HashMap<(String, String), Vec<&String>> = HashMap::new();
            for ((family, concept), label) in &self.labels {
                by_label
                    .entry((family.clone(), label.trim().to_lowercase()))
                    .or_default()
                    .push(concept);
            }

            for ((family, _), concepts) in &by_label {
                if concepts.len() < 2 {
                    continue;
                }
                let canonical = concepts
                    .iter()
                    .min_by_key(|c| c.len())
                    .map(|c| (*c).clone())
                    .unwrap_or_default();
                for concept in concepts {
                    if **concept != canonical {
                        self.synonyms
                            .insert((family.clone(), (*concept).clone()), canonical.clone());
                    }
                }
            }

            info!(
                "Built {} synonym mappings from label text (fallback)",
                self.synonyms.len()
            );
        }

        Ok(())
    }

    fn key(taxonomy: &str, concept: &str) -> (String, String) {
        (
            taxonomy_family(taxonomy).to_string(),
            strip_namespace(concept).to_string(),
        )
    }

    /// Parent arc for a child concept within the given taxonomy
    pub fn parent_of(&self, taxonomy: &str, concept: &str) -> Option<&ParentLink> {
        self.child_to_parent.get(&Self::key(taxonomy, concept))
    }

    /// Whether the concept parents any arc in the given taxonomy
    pub fn is_parent(&self, taxonomy: &str, concept: &str) -> bool {
        self.parents.contains(&Self::key(taxonomy, concept))
    }

    /// Whether the concept is a child of any arc in the given taxonomy
    pub fn is_child(&self, taxonomy: &str, concept: &str) -> bool {
        self.child_to_parent.contains_key(&Self::key(taxonomy, concept))
    }

    /// Number of children declared under a parent concept
    pub fn child_count(&self, taxonomy: &str, concept: &str) -> usize {
        self.parent_child_counts
            .get(&Self::key(taxonomy, concept))
            .copied()
            .unwrap_or(0)
    }

    /// Preferred label for a concept
    pub fn label_of(&self, taxonomy: &str, concept: &str) -> Option<&str> {
        self.labels
            .get(&Self::key(taxonomy, concept))
            .map(|s| s.as_str())
    }

    /// Canonical concept for a synonym within the given taxonomy
    pub fn canonical_of(&self, taxonomy: &str, concept: &str) -> Option<&str> {
        self.synonyms
            .get(&Self::key(taxonomy, concept))
            .map(|s| s.as_str())
    }

    /// All (family, synonym, canonical) triples
    pub fn synonym_pairs(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.synonyms
            .iter()
            .map(|((family, synonym), canonical)| {
                (family.as_str(), synonym.as_str(), canonical.as_str())
            })
    }

    /// All calculation arcs as (family, child, link) triples
    pub fn arcs(&self) -> impl Iterator<Item = (&str, &str, &ParentLink)> {
        self.child_to_parent
            .iter()
            .map(|((family, child), link)| (family.as_str(), child.as_str(), link))
    }

    pub fn taxonomies(&self) -> &[String] {
        &self.loaded_taxonomies
    }

    pub fn is_empty(&self) -> bool {
        self.child_to_parent.is_empty()
    }

    /// Test/support constructor: arcs under one taxonomy family, for
    /// stages that need a store without linkbase files on disk.
    pub fn from_arcs(taxonomy: &str, arcs: Vec<(String, String, f64)>) -> Self {
        let family = taxonomy_family(taxonomy).to_string();
        let mut store = TaxonomyStore::default();
        for (parent, child, weight) in arcs {
            store.parents.insert((family.clone(), parent.clone()));
            *store
                .parent_child_counts
                .entry((family.clone(), parent.clone()))
                .or_insert(0) += 1;
            store.child_to_parent.insert(
                (family.clone(), child),
                ParentLink {
                    parent,
                    weight,
                    order: None,
                },
            );
        }
        store
    }

    /// Test/support: register a synonym pair under a taxonomy family.
    pub fn insert_synonym(&mut self, taxonomy: &str, synonym: &str, canonical: &str) {
        self.synonyms.insert(
            (
                taxonomy_family(taxonomy).to_string(),
                strip_namespace(synonym).to_string(),
            ),
            strip_namespace(canonical).to_string(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> TaxonomyStore {
        TaxonomyStore::from_arcs(
            "us-gaap-2024",
            vec![
                ("Assets".to_string(), "AssetsCurrent".to_string(), 1.0),
                ("Assets".to_string(), "AssetsNoncurrent".to_string(), 1.0),
                (
                    "AssetsCurrent".to_string(),
                    "CashAndCashEquivalentsAtCarryingValue".to_string(),
                    1.0,
                ),
            ],
        )
    }

    #[test]
    fn taxonomy_families_collapse_years_and_esef() {
        // REQUIREMENT: Concept names are unique only within a framework
        // PURPOSE: Verify year variants collapse to one family and ESEF
        // resolves to IFRS so lookups are scoped correctly
        assert_eq!(taxonomy_family("us-gaap-2024"), "US-GAAP");
        assert_eq!(taxonomy_family("US-GAAP"), "US-GAAP");
        assert_eq!(taxonomy_family("ifrs-2023"), "IFRS");
        assert_eq!(taxonomy_family("esef-2024"), "IFRS");
        assert_eq!(taxonomy_family("dei"), "other");
    }

    #[test]
    fn parent_lookup_is_taxonomy_scoped() {
        // REQUIREMENT: Calculation arcs must not leak across taxonomies
        // PURPOSE: Verify the same concept name resolves within its own
        // family and misses in every other family
        let store = sample_store();

        let link = store.parent_of("us-gaap", "us-gaap:AssetsCurrent").unwrap();
        assert_eq!(link.parent, "Assets");
        assert_eq!(link.weight, 1.0);

        // The IFRS family has no such arc even though the name matches
        assert!(store.parent_of("ifrs", "AssetsCurrent").is_none());
        assert!(!store.is_parent("ifrs", "Assets"));
    }

    #[test]
    fn parent_and_child_roles() {
        // REQUIREMENT: Hierarchy classification needs parent/child roles
        // PURPOSE: Verify role queries reflect the loaded arcs
        let store = sample_store();
        assert!(store.is_parent("us-gaap", "Assets"));
        assert!(store.is_child("us-gaap", "AssetsCurrent"));
        assert!(store.is_parent("us-gaap", "AssetsCurrent"));
        assert!(!store.is_parent("us-gaap", "CashAndCashEquivalentsAtCarryingValue"));
        assert_eq!(store.child_count("us-gaap", "Assets"), 2);
    }

    #[test]
    fn synonyms_are_taxonomy_scoped() {
        // REQUIREMENT: Synonym groups come from one framework's
        // reference linkbase
        // PURPOSE: Verify a synonym registered under IFRS does not
        // rewrite the same-named US-GAAP concept
        let mut store = sample_store();
        store.insert_synonym("ifrs-2024", "Turnover", "Revenue");

        assert_eq!(store.canonical_of("ifrs", "Turnover"), Some("Revenue"));
        assert_eq!(store.canonical_of("us-gaap", "Turnover"), None);
    }

    #[test]
    fn missing_directory_yields_empty_store() {
        // REQUIREMENT: A missing taxonomy directory degrades, not fails
        // PURPOSE: Verify the store loads empty so the hierarchy pass
        // can fall back to pattern matching
        let store = TaxonomyStore::load_from_dir(Path::new("/nonexistent/taxonomies")).unwrap();
        assert!(store.is_empty());
    }
}
