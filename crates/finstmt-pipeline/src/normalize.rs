//! Applies the normalization tables to `dim_concepts`.
//!
//! Every concept used by at least one fact ends up with exactly one
//! normalized label and one statement type. Re-running the pass is
//! idempotent: fallback-generated labels never overwrite a label that is
//! already present, so authoritative assignments survive later runs.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::info;
use uuid::Uuid;

use finstmt_core::database::DatabasePool;
use finstmt_core::error::AppResult;
use finstmt_core::schema::dim_concepts;
use finstmt_taxonomy::TaxonomyStore;

use crate::mappings::{assign_statement_type, normalized_label_for};

/// Outcome counts for one normalization pass
#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizationStats {
    pub concepts_seen: usize,
    pub labels_assigned: usize,
    pub labels_upgraded: usize,
    pub statement_types_assigned: usize,
}

/// Assign `normalized_label` and `statement_type` to every concept.
///
/// Labels already in the warehouse are only replaced by authoritative
/// resolutions (curated map, context overrides, component rules); the
/// auto-fallback never downgrades an existing label.
pub async fn normalize_concepts(
    pool: &DatabasePool,
    store: &TaxonomyStore,
) -> AppResult<NormalizationStats> {
    let mut conn = pool.get().await?;

    let concepts: Vec<(Uuid, String, String, Option<String>, Option<String>)> = dim_concepts::table
        .select((
            dim_concepts::id,
            dim_concepts::taxonomy,
            dim_concepts::concept_name,
            dim_concepts::normalized_label,
            dim_concepts::statement_type,
        ))
        .load(&mut conn)
        .await?;

    let mut stats = NormalizationStats {
        concepts_seen: concepts.len(),
        ..Default::default()
    };

    for (concept_id, taxonomy, concept_name, existing_label, existing_statement) in concepts {
        let (computed_label, resolution) = normalized_label_for(&concept_name, &taxonomy, store);

        let new_label = match &existing_label {
            None => {
                stats.labels_assigned += 1;
                Some(computed_label.clone())
            }
            Some(current) if *current != computed_label && resolution.is_authoritative() => {
                stats.labels_upgraded += 1;
                Some(computed_label.clone())
            }
            _ => None,
        };

        let effective_label = new_label
            .clone()
            .or(existing_label)
            .unwrap_or(computed_label);

        let new_statement = if existing_statement.is_none() {
            stats.statement_types_assigned += 1;
            Some(assign_statement_type(
                None,
                Some(&effective_label),
                &concept_name,
            ))
        } else {
            None
        };

        match (new_label, new_statement) {
            (Some(label), Some(statement)) => {
                diesel::update(dim_concepts::table.filter(dim_concepts::id.eq(concept_id)))
                    .set((
                        dim_concepts::normalized_label.eq(label),
                        dim_concepts::statement_type.eq(statement),
                    ))
                    .execute(&mut conn)
                    .await?;
            }
            (Some(label), None) => {
                diesel::update(dim_concepts::table.filter(dim_concepts::id.eq(concept_id)))
                    .set(dim_concepts::normalized_label.eq(label))
                    .execute(&mut conn)
                    .await?;
            }
            (None, Some(statement)) => {
                diesel::update(dim_concepts::table.filter(dim_concepts::id.eq(concept_id)))
                    .set(dim_concepts::statement_type.eq(statement))
                    .execute(&mut conn)
                    .await?;
            }
            (None, None) => {}
        }
    }

    info!(
        "Normalized {} concepts ({} new labels, {} upgraded, {} statement types)",
        stats.concepts_seen,
        stats.labels_assigned,
        stats.labels_upgraded,
        stats.statement_types_assigned
    );

    Ok(stats)
}
