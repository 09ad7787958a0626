//! Hierarchy populator: parent links, calculation weights, and the
//! 4-level classification over `dim_concepts`.
//!
//! Priority order: taxonomy calculation linkbases, then filing-level
//! arcs, then pattern matching for concepts neither source reaches.
//! Classification runs over an arena of concepts indexed by position;
//! parent cycles are detected and skipped with a WARNING.

use std::collections::{HashMap, HashSet};

use bigdecimal::BigDecimal;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::{info, warn};
use uuid::Uuid;

use finstmt_core::database::DatabasePool;
use finstmt_core::error::AppResult;
use finstmt_core::schema::{dim_concepts, fact_financial_metrics, rel_calculation_hierarchy};
use finstmt_taxonomy::{taxonomy_family, TaxonomyStore};

use crate::loader::to_f64;

/// Universal metrics that must classify at level 3 or higher regardless
/// of what the tree position says.
pub static UNIVERSAL_METRICS_LEVEL_3: &[&str] = &[
    "revenue",
    "net_income",
    "stockholders_equity",
    "total_equity",
    "current_assets",
    "current_liabilities",
    "noncurrent_assets",
    "noncurrent_liabilities",
    "operating_income",
    "operating_cash_flow",
    "accounts_receivable",
    "accounts_payable",
    "inventory",
    "cash_and_equivalents",
    "short_term_debt",
    "long_term_debt",
];

/// Statement totals pinned to level 4
pub static STATEMENT_TOTALS_LEVEL_4: &[&str] = &[
    "total_assets",
    "total_liabilities",
    "total_revenue",
    "total_equity",
    "total_stockholders_equity",
];

/// What the hierarchy pass did
#[derive(Debug, Default, Clone)]
pub struct HierarchyReport {
    pub taxonomy_links_set: usize,
    pub filing_links_set: usize,
    pub levels_classified: usize,
    pub levels_pattern_fallback: usize,
    pub cycles_skipped: usize,
    pub calculated_parent_facts: usize,
    pub validation_errors: Vec<String>,
}

/// Run the full hierarchy pass.
pub async fn populate_hierarchy(
    pool: &DatabasePool,
    store: &TaxonomyStore,
) -> AppResult<HierarchyReport> {
    let mut report = HierarchyReport::default();

    report.taxonomy_links_set = apply_taxonomy_links(pool, store).await?;
    report.filing_links_set = apply_filing_links(pool).await?;

    let (classified, cycles) = classify_and_store_levels(pool).await?;
    report.levels_classified = classified;
    report.cycles_skipped = cycles;

    force_universal_metric_levels(pool).await?;
    report.levels_pattern_fallback = pattern_fallback_levels(pool).await?;

    report.calculated_parent_facts = calculate_missing_parent_facts(pool).await?;
    report.validation_errors = validate_parent_child_sums(pool).await?;

    info!(
        "Hierarchy: {} taxonomy links, {} filing links, {} classified, {} fallback, {} calculated parents",
        report.taxonomy_links_set,
        report.filing_links_set,
        report.levels_classified,
        report.levels_pattern_fallback,
        report.calculated_parent_facts
    );

    Ok(report)
}

/// Set `parent_concept_id`/`calculation_weight` from the taxonomy store
/// for warehouse concepts whose parent is still unset.
///
/// Concept names are resolved per taxonomy family: a US-GAAP arc only
/// links US-GAAP `dim_concepts` rows, so same-named IFRS concepts in a
/// mixed corpus are untouched by it.
async fn apply_taxonomy_links(pool: &DatabasePool, store: &TaxonomyStore) -> AppResult<usize> {
    if store.is_empty() {
        warn!("Taxonomy store is empty; relying on filing arcs and pattern fallback");
        return Ok(0);
    }

    let mut conn = pool.get().await?;

    let concept_rows: Vec<(Uuid, String, String)> = dim_concepts::table
        .select((
            dim_concepts::id,
            dim_concepts::taxonomy,
            dim_concepts::concept_name,
        ))
        .load(&mut conn)
        .await?;

    let mut id_by_key: HashMap<(&'static str, &str), Uuid> = HashMap::new();
    for (id, taxonomy, name) in &concept_rows {
        let key = (taxonomy_family(taxonomy), name.as_str());
        if let Some(existing) = id_by_key.insert(key, *id) {
            if existing != *id {
                // Two taxonomy identifiers of the same family (casing or
                // year variants) carry this name; arcs attach to the
                // first row only.
                warn!(
                    "Concept name '{}' appears under multiple {} taxonomy identifiers",
                    name, key.0
                );
                id_by_key.insert(key, existing);
            }
        }
    }

    let mut updated = 0usize;
    for (family, child_name, link) in store.arcs() {
        let (Some(&child_id), Some(&parent_id)) = (
            id_by_key.get(&(taxonomy_family(family), child_name)),
            id_by_key.get(&(taxonomy_family(family), link.parent.as_str())),
        ) else {
            continue;
        };
        if child_id == parent_id {
            continue;
        }

        let weight = bigdecimal_from(link.weight);
        updated += diesel::update(
            dim_concepts::table
                .filter(dim_concepts::id.eq(child_id))
                .filter(dim_concepts::parent_concept_id.is_null()),
        )
        .set((
            dim_concepts::parent_concept_id.eq(parent_id),
            dim_concepts::calculation_weight.eq(weight),
        ))
        .execute(&mut conn)
        .await?;
    }

    Ok(updated)
}

/// Fill parents from filing-level calculation arcs for concepts the
/// taxonomy linkbases did not reach.
async fn apply_filing_links(pool: &DatabasePool) -> AppResult<usize> {
    let mut conn = pool.get().await?;

    let arcs: Vec<(Uuid, Uuid, BigDecimal)> = rel_calculation_hierarchy::table
        .select((
            rel_calculation_hierarchy::child_concept_id,
            rel_calculation_hierarchy::parent_concept_id,
            rel_calculation_hierarchy::weight,
        ))
        .load(&mut conn)
        .await?;

    let mut updated = 0usize;
    for (child_id, parent_id, weight) in arcs {
        if child_id == parent_id {
            continue;
        }
        updated += diesel::update(
            dim_concepts::table
                .filter(dim_concepts::id.eq(child_id))
                .filter(dim_concepts::parent_concept_id.is_null()),
        )
        .set((
            dim_concepts::parent_concept_id.eq(parent_id),
            dim_concepts::calculation_weight.eq(weight),
        ))
        .execute(&mut conn)
        .await?;
    }

    Ok(updated)
}

/// Tree-position classification:
/// - Level 4: no parent, parent to others (statement totals)
/// - Level 1: has parent, not a parent (details)
/// - Level 2: has parent that is level 4, and is a parent (subtotals)
/// - Level 3: deeper intermediate nodes (sections/universal metrics)
///
/// Concepts on a parent cycle are skipped and reported.
pub fn classify_levels(
    concepts: &[(Uuid, Option<Uuid>)],
) -> (HashMap<Uuid, i32>, Vec<Uuid>) {
    let index_of: HashMap<Uuid, usize> = concepts
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (*id, i))
        .collect();

    let parent_idx: Vec<Option<usize>> = concepts
        .iter()
        .map(|(_, parent)| parent.and_then(|p| index_of.get(&p).copied()))
        .collect();

    let is_parent: HashSet<usize> = parent_idx.iter().flatten().copied().collect();

    // Cycle detection along parent chains
    let mut on_cycle = vec![false; concepts.len()];
    for start in 0..concepts.len() {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut current = Some(start);
        while let Some(idx) = current {
            if !seen.insert(idx) {
                // On the cycle: reachable from the repeat node and able
                // to reach it back. Ancestors hanging off the cycle are
                // not members.
                for &member in &seen {
                    if reaches(&parent_idx, member, idx) && reaches(&parent_idx, idx, member) {
                        on_cycle[member] = true;
                    }
                }
                on_cycle[idx] = true;
                break;
            }
            current = parent_idx[idx];
        }
    }

    let mut levels: HashMap<Uuid, i32> = HashMap::new();
    let mut level_by_idx: Vec<Option<i32>> = vec![None; concepts.len()];

    // Level 4 and level 1 depend only on local shape
    for idx in 0..concepts.len() {
        if on_cycle[idx] {
            continue;
        }
        match (parent_idx[idx], is_parent.contains(&idx)) {
            (None, true) => level_by_idx[idx] = Some(4),
            (Some(_), false) => level_by_idx[idx] = Some(1),
            _ => {}
        }
    }

    // Level 2: direct subtotal under a statement total
    for idx in 0..concepts.len() {
        if on_cycle[idx] || level_by_idx[idx].is_some() {
            continue;
        }
        if let Some(parent) = parent_idx[idx] {
            if is_parent.contains(&idx) && level_by_idx[parent] == Some(4) {
                level_by_idx[idx] = Some(2);
            }
        }
    }

    // Level 3: remaining intermediate nodes
    for idx in 0..concepts.len() {
        if on_cycle[idx] || level_by_idx[idx].is_some() {
            continue;
        }
        if parent_idx[idx].is_some() && is_parent.contains(&idx) {
            level_by_idx[idx] = Some(3);
        }
    }

    for (idx, level) in level_by_idx.iter().enumerate() {
        if let Some(level) = level {
            levels.insert(concepts[idx].0, *level);
        }
    }

    let cycles = concepts
        .iter()
        .enumerate()
        .filter(|(idx, _)| on_cycle[*idx])
        .map(|(_, (id, _))| *id)
        .collect();

    (levels, cycles)
}

fn reaches(parent_idx: &[Option<usize>], from: usize, target: usize) -> bool {
    let mut current = Some(from);
    let mut steps = 0;
    while let Some(idx) = current {
        if idx == target {
            return true;
        }
        steps += 1;
        if steps > parent_idx.len() {
            return false;
        }
        current = parent_idx[idx];
    }
    false
}

async fn classify_and_store_levels(pool: &DatabasePool) -> AppResult<(usize, usize)> {
    let mut conn = pool.get().await?;

    let concepts: Vec<(Uuid, Option<Uuid>)> = dim_concepts::table
        .select((dim_concepts::id, dim_concepts::parent_concept_id))
        .load(&mut conn)
        .await?;

    let (levels, cycles) = classify_levels(&concepts);

    for concept_id in &cycles {
        warn!(
            "Concept {} participates in a parent cycle; hierarchy level skipped",
            concept_id
        );
    }

    for (concept_id, level) in &levels {
        diesel::update(dim_concepts::table.filter(dim_concepts::id.eq(concept_id)))
            .set(dim_concepts::hierarchy_level.eq(level))
            .execute(&mut conn)
            .await?;
    }

    Ok((levels.len(), cycles.len()))
}

/// Universal metrics and statement totals are pinned to at least level
/// 3/4 even when their tree position said lower.
async fn force_universal_metric_levels(pool: &DatabasePool) -> AppResult<()> {
    let mut conn = pool.get().await?;

    for metric in UNIVERSAL_METRICS_LEVEL_3 {
        diesel::update(
            dim_concepts::table
                .filter(dim_concepts::normalized_label.eq(*metric))
                .filter(
                    dim_concepts::hierarchy_level
                        .is_null()
                        .or(dim_concepts::hierarchy_level.lt(3)),
                ),
        )
        .set(dim_concepts::hierarchy_level.eq(3))
        .execute(&mut conn)
        .await?;
    }

    for metric in STATEMENT_TOTALS_LEVEL_4 {
        diesel::update(
            dim_concepts::table
                .filter(dim_concepts::normalized_label.eq(*metric))
                .filter(
                    dim_concepts::hierarchy_level
                        .is_null()
                        .or(dim_concepts::hierarchy_level.lt(4)),
                ),
        )
        .set(dim_concepts::hierarchy_level.eq(4))
        .execute(&mut conn)
        .await?;
    }

    Ok(())
}

/// Classify every concept the taxonomy did not reach from name/label
/// patterns.
pub fn pattern_fallback_level(concept_name: &str, normalized_label: Option<&str>) -> i32 {
    let name = concept_name.to_lowercase();
    let label = normalized_label.unwrap_or("").to_lowercase();

    if UNIVERSAL_METRICS_LEVEL_3.contains(&label.as_str()) {
        return 3;
    }
    if STATEMENT_TOTALS_LEVEL_4.contains(&label.as_str()) {
        return 4;
    }
    if label.contains("total") {
        return 4;
    }

    const SECTION_TERMS: &[&str] = &["current", "noncurrent", "gross", "net", "total"];
    const DETAIL_TERMS: &[&str] = &["accrued", "other", "trade", "related"];
    if SECTION_TERMS
        .iter()
        .any(|term| name.contains(term) || label.contains(term))
        && !DETAIL_TERMS.iter().any(|term| name.contains(term))
    {
        return 3;
    }

    const SUBTOTAL_TERMS: &[&str] = &[
        "accrued", "other", "trade", "employee", "customer", "related", "operating",
        "nonoperating",
    ];
    if SUBTOTAL_TERMS.iter().any(|term| name.contains(term)) {
        return 2;
    }

    1
}

async fn pattern_fallback_levels(pool: &DatabasePool) -> AppResult<usize> {
    let mut conn = pool.get().await?;

    let unclassified: Vec<(Uuid, String, Option<String>)> = dim_concepts::table
        .filter(dim_concepts::hierarchy_level.is_null())
        .select((
            dim_concepts::id,
            dim_concepts::concept_name,
            dim_concepts::normalized_label,
        ))
        .load(&mut conn)
        .await?;

    let mut updated = 0usize;
    for (concept_id, concept_name, normalized_label) in unclassified {
        let level = pattern_fallback_level(&concept_name, normalized_label.as_deref());
        updated += diesel::update(dim_concepts::table.filter(dim_concepts::id.eq(concept_id)))
            .set(dim_concepts::hierarchy_level.eq(level))
            .execute(&mut conn)
            .await?;
    }

    Ok(updated)
}

/// Insert `parent = Σ (weight × child)` facts where every child of a
/// parent is reported but the parent itself is not. Inserted rows carry
/// `is_calculated = TRUE` and never overwrite reported facts.
async fn calculate_missing_parent_facts(pool: &DatabasePool) -> AppResult<usize> {
    let mut conn = pool.get().await?;

    let concepts: Vec<(Uuid, Option<Uuid>, Option<BigDecimal>)> = dim_concepts::table
        .filter(dim_concepts::parent_concept_id.is_not_null())
        .select((
            dim_concepts::id,
            dim_concepts::parent_concept_id,
            dim_concepts::calculation_weight,
        ))
        .load(&mut conn)
        .await?;

    let mut children_by_parent: HashMap<Uuid, Vec<(Uuid, BigDecimal)>> = HashMap::new();
    for (child_id, parent_id, weight) in concepts {
        let Some(parent_id) = parent_id else { continue };
        children_by_parent
            .entry(parent_id)
            .or_default()
            .push((child_id, weight.unwrap_or_else(|| BigDecimal::from(1))));
    }

    let facts: Vec<(Uuid, Uuid, Uuid, Uuid, Option<BigDecimal>)> = fact_financial_metrics::table
        .filter(fact_financial_metrics::dimension_id.is_null())
        .filter(fact_financial_metrics::value_numeric.is_not_null())
        .select((
            fact_financial_metrics::company_id,
            fact_financial_metrics::period_id,
            fact_financial_metrics::filing_id,
            fact_financial_metrics::concept_id,
            fact_financial_metrics::value_numeric,
        ))
        .load(&mut conn)
        .await?;

    // (company, period) -> concept -> value, plus a filing to attach to
    let mut values: HashMap<(Uuid, Uuid), HashMap<Uuid, BigDecimal>> = HashMap::new();
    let mut filing_for: HashMap<(Uuid, Uuid), Uuid> = HashMap::new();
    for (company_id, period_id, filing_id, concept_id, value) in facts {
        let Some(value) = value else { continue };
        values
            .entry((company_id, period_id))
            .or_default()
            .insert(concept_id, value);
        filing_for.entry((company_id, period_id)).or_insert(filing_id);
    }

    let mut inserted = 0usize;
    for ((company_id, period_id), concept_values) in &values {
        for (parent_id, children) in &children_by_parent {
            if concept_values.contains_key(parent_id) {
                continue;
            }
            // All children must be reported before the parent is derived
            let mut sum = BigDecimal::from(0);
            let mut all_present = true;
            for (child_id, weight) in children {
                match concept_values.get(child_id) {
                    Some(value) => sum += value * weight,
                    None => {
                        all_present = false;
                        break;
                    }
                }
            }
            if !all_present {
                continue;
            }

            let filing_id = filing_for[&(*company_id, *period_id)];
            inserted += diesel::insert_into(fact_financial_metrics::table)
                .values((
                    fact_financial_metrics::company_id.eq(company_id),
                    fact_financial_metrics::concept_id.eq(parent_id),
                    fact_financial_metrics::period_id.eq(period_id),
                    fact_financial_metrics::filing_id.eq(filing_id),
                    fact_financial_metrics::value_numeric.eq(Some(sum)),
                    fact_financial_metrics::is_primary.eq(true),
                    fact_financial_metrics::is_calculated.eq(true),
                    fact_financial_metrics::extraction_method.eq("calculated_from_children"),
                ))
                .on_conflict((
                    fact_financial_metrics::filing_id,
                    fact_financial_metrics::concept_id,
                    fact_financial_metrics::period_id,
                    fact_financial_metrics::dimension_id,
                ))
                .do_nothing()
                .execute(&mut conn)
                .await?;
        }
    }

    Ok(inserted)
}

/// Where both a reported parent and its children exist, the reported
/// value must equal the weighted child sum within 1%.
async fn validate_parent_child_sums(pool: &DatabasePool) -> AppResult<Vec<String>> {
    let mut conn = pool.get().await?;

    let concepts: Vec<(Uuid, String, Option<Uuid>, Option<BigDecimal>)> = dim_concepts::table
        .select((
            dim_concepts::id,
            dim_concepts::concept_name,
            dim_concepts::parent_concept_id,
            dim_concepts::calculation_weight,
        ))
        .load(&mut conn)
        .await?;

    let concept_name: HashMap<Uuid, String> = concepts
        .iter()
        .map(|(id, name, _, _)| (*id, name.clone()))
        .collect();

    let mut children_by_parent: HashMap<Uuid, Vec<(Uuid, BigDecimal)>> = HashMap::new();
    for (child_id, _, parent_id, weight) in &concepts {
        let Some(parent_id) = parent_id else { continue };
        children_by_parent
            .entry(*parent_id)
            .or_default()
            .push((*child_id, weight.clone().unwrap_or_else(|| BigDecimal::from(1))));
    }

    let facts: Vec<(Uuid, Uuid, Uuid, Option<BigDecimal>, bool)> = fact_financial_metrics::table
        .filter(fact_financial_metrics::dimension_id.is_null())
        .filter(fact_financial_metrics::value_numeric.is_not_null())
        .select((
            fact_financial_metrics::company_id,
            fact_financial_metrics::period_id,
            fact_financial_metrics::concept_id,
            fact_financial_metrics::value_numeric,
            fact_financial_metrics::is_calculated,
        ))
        .load(&mut conn)
        .await?;

    let mut values: HashMap<(Uuid, Uuid), HashMap<Uuid, (BigDecimal, bool)>> = HashMap::new();
    for (company_id, period_id, concept_id, value, is_calculated) in facts {
        let Some(value) = value else { continue };
        values
            .entry((company_id, period_id))
            .or_default()
            .insert(concept_id, (value, is_calculated));
    }

    let mut errors = Vec::new();
    for ((company_id, period_id), concept_values) in &values {
        for (parent_id, children) in &children_by_parent {
            let Some((reported, is_calculated)) = concept_values.get(parent_id) else {
                continue;
            };
            if *is_calculated {
                continue;
            }

            let mut sum = BigDecimal::from(0);
            let mut any_child = false;
            for (child_id, weight) in children {
                if let Some((value, _)) = concept_values.get(child_id) {
                    sum += value * weight;
                    any_child = true;
                }
            }
            if !any_child {
                continue;
            }

            let (Some(reported_f), Some(sum_f)) = (to_f64(reported), to_f64(&sum)) else {
                continue;
            };
            if reported_f == 0.0 {
                continue;
            }
            let diff_pct = ((reported_f - sum_f).abs() / reported_f.abs()) * 100.0;
            if diff_pct > 1.0 {
                errors.push(format!(
                    "{} (company {}, period {}): reported {:.0} vs children {:.0} ({:.2}% off)",
                    concept_name
                        .get(parent_id)
                        .map(|s| s.as_str())
                        .unwrap_or("?"),
                    company_id,
                    period_id,
                    reported_f,
                    sum_f,
                    diff_pct
                ));
            }
        }
    }

    if !errors.is_empty() {
        warn!("{} parent-child summation mismatches", errors.len());
    }

    Ok(errors)
}

fn bigdecimal_from(value: f64) -> BigDecimal {
    use bigdecimal::FromPrimitive;
    BigDecimal::from_f64(value).unwrap_or_else(|| BigDecimal::from(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_four_level_tree() {
        // REQUIREMENT: Tree position drives the 4-level classification
        // PURPOSE: Verify total/subtotal/section/detail levels on a chain
        let total = Uuid::new_v4(); // Assets: no parent, is parent
        let subtotal = Uuid::new_v4(); // AssetsCurrent: parent Assets, is parent
        let section = Uuid::new_v4(); // CashGroup: parent AssetsCurrent, is parent
        let detail = Uuid::new_v4(); // Cash: parent CashGroup, leaf

        let concepts = vec![
            (total, None),
            (subtotal, Some(total)),
            (section, Some(subtotal)),
            (detail, Some(section)),
        ];

        let (levels, cycles) = classify_levels(&concepts);
        assert!(cycles.is_empty());
        assert_eq!(levels[&total], 4);
        assert_eq!(levels[&subtotal], 2);
        assert_eq!(levels[&section], 3);
        assert_eq!(levels[&detail], 1);
    }

    #[test]
    fn isolated_concepts_stay_unclassified() {
        // REQUIREMENT: Concepts outside any tree fall to pattern matching
        // PURPOSE: Verify classification leaves isolated nodes unassigned
        let isolated = Uuid::new_v4();
        let (levels, cycles) = classify_levels(&[(isolated, None)]);
        assert!(levels.is_empty());
        assert!(cycles.is_empty());
    }

    #[test]
    fn parent_cycles_are_skipped() {
        // REQUIREMENT: Parent cycles across linkbases are detected and skipped
        // PURPOSE: Verify cycle members stay unclassified while nodes
        // hanging off the cycle still classify
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let leaf = Uuid::new_v4();

        let concepts = vec![(a, Some(b)), (b, Some(a)), (leaf, Some(a))];
        let (levels, cycles) = classify_levels(&concepts);

        assert!(cycles.contains(&a));
        assert!(cycles.contains(&b));
        assert!(!levels.contains_key(&a));
        assert!(!levels.contains_key(&b));
        // The leaf hangs off the cycle but is not itself on it
        assert_eq!(levels.get(&leaf), Some(&1));
    }

    #[test]
    fn pattern_fallback_matches_original_rules() {
        // REQUIREMENT: Concepts the taxonomy misses classify by name patterns
        // PURPOSE: Verify universal metrics, totals, sections, subtotals,
        // and details each take their level
        assert_eq!(pattern_fallback_level("Revenues", Some("revenue")), 3);
        assert_eq!(pattern_fallback_level("Assets", Some("total_assets")), 4);
        assert_eq!(pattern_fallback_level("SomeTotalThing", Some("total_weird_metric")), 4);
        assert_eq!(
            pattern_fallback_level("DeferredRevenueCurrent", Some("deferred_revenue_current")),
            3
        );
        assert_eq!(
            pattern_fallback_level("AccruedPayrollTaxes", Some("accrued_payroll_taxes")),
            2
        );
        assert_eq!(
            pattern_fallback_level("LeaseIncentives", Some("lease_incentives")),
            1
        );
    }
}
