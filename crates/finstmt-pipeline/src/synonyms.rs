//! Applies taxonomy-derived synonym groups to `dim_concepts`.
//!
//! Concepts sharing authoritative references (or, failing that, identical
//! label text) adopt the canonical concept's normalized label, collapsing
//! spelling variants the curated map does not enumerate. Synonym groups
//! belong to one taxonomy family; a US-GAAP concept is never rewritten by
//! an IFRS group that happens to reuse the name.

use std::collections::HashMap;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::info;
use uuid::Uuid;

use finstmt_core::database::DatabasePool;
use finstmt_core::error::AppResult;
use finstmt_core::schema::dim_concepts;
use finstmt_taxonomy::{taxonomy_family, TaxonomyStore};

/// Rewrite each synonym concept's normalized label to its canonical
/// concept's label, within the synonym group's taxonomy family. Returns
/// the number of concepts updated.
///
/// Canonicals that are not in the warehouse yet (or not normalized yet)
/// are skipped; the pass is safe to re-run.
pub async fn apply_taxonomy_synonyms(
    pool: &DatabasePool,
    store: &TaxonomyStore,
) -> AppResult<usize> {
    let mut conn = pool.get().await?;

    let concepts: Vec<(Uuid, String, String, Option<String>)> = dim_concepts::table
        .select((
            dim_concepts::id,
            dim_concepts::taxonomy,
            dim_concepts::concept_name,
            dim_concepts::normalized_label,
        ))
        .load(&mut conn)
        .await?;

    // Canonical labels per (family, concept name); first normalized row
    // of a family wins.
    let mut canonical_labels: HashMap<(&str, &str), &str> = HashMap::new();
    for (_, taxonomy, concept_name, normalized_label) in &concepts {
        if let Some(label) = normalized_label {
            canonical_labels
                .entry((taxonomy_family(taxonomy), concept_name.as_str()))
                .or_insert(label.as_str());
        }
    }

    let mut updates: Vec<(Uuid, String)> = Vec::new();
    for (concept_id, taxonomy, concept_name, normalized_label) in &concepts {
        let Some(canonical) = store.canonical_of(taxonomy, concept_name) else {
            continue;
        };
        let family = taxonomy_family(taxonomy);
        let Some(canonical_label) = canonical_labels.get(&(family, canonical)) else {
            continue;
        };
        if normalized_label.as_deref() != Some(*canonical_label) {
            updates.push((*concept_id, (*canonical_label).to_string()));
        }
    }

    let mut updated = 0usize;
    for (concept_id, label) in updates {
        updated += diesel::update(dim_concepts::table.filter(dim_concepts::id.eq(concept_id)))
            .set(dim_concepts::normalized_label.eq(label))
            .execute(&mut conn)
            .await?;
    }

    if updated > 0 {
        info!("Applied taxonomy synonyms to {} concepts", updated);
    }

    Ok(updated)
}
