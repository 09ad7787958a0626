//! Calculated-totals engine: supplies missing universal totals from
//! component sums and accounting identities, without inventing data.
//!
//! Inserted facts carry `is_calculated = TRUE` and `scale_int = 0`, use
//! the same natural key as reported facts, and never overwrite reported
//! values; re-running the engine inserts nothing new.

use std::collections::{HashMap, HashSet};

use bigdecimal::BigDecimal;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::info;
use uuid::Uuid;

use finstmt_core::database::DatabasePool;
use finstmt_core::error::AppResult;
use finstmt_core::schema::{dim_companies, dim_concepts, fact_financial_metrics};

/// Per-company view of consolidated fact values, indexed for the
/// strategy checks.
#[derive(Debug, Default)]
pub struct CompanyFacts {
    /// normalized label -> period -> (value, distinct reporting concepts)
    by_label: HashMap<String, HashMap<Uuid, (BigDecimal, usize)>>,
    /// concept names the company reports at all
    concept_names: HashSet<String>,
    /// period -> a filing that covers it
    filing_for_period: HashMap<Uuid, Uuid>,
}

impl CompanyFacts {
    pub fn has_label(&self, label: &str) -> bool {
        self.by_label.contains_key(label)
    }

    pub fn has_any_label(&self, labels: &[&str]) -> bool {
        labels.iter().any(|label| self.has_label(label))
    }

    pub fn has_concept(&self, concept_name: &str) -> bool {
        self.concept_names.contains(concept_name)
    }

    fn value(&self, label: &str, period: Uuid) -> Option<&BigDecimal> {
        self.by_label
            .get(label)
            .and_then(|periods| periods.get(&period))
            .map(|(value, _)| value)
    }

    fn first_value(&self, labels: &[&str], period: Uuid) -> Option<&BigDecimal> {
        labels.iter().find_map(|label| self.value(label, period))
    }

    fn periods_with_any(&self, labels: &[&str]) -> Vec<Uuid> {
        let mut periods: HashSet<Uuid> = HashSet::new();
        for label in labels {
            if let Some(by_period) = self.by_label.get(*label) {
                periods.extend(by_period.keys().copied());
            }
        }
        let mut sorted: Vec<Uuid> = periods.into_iter().collect();
        sorted.sort();
        sorted
    }

    /// Sum labels matched by `predicate` per period, with the count of
    /// distinct contributing concepts.
    fn sum_matching<F>(&self, predicate: F) -> HashMap<Uuid, (BigDecimal, usize)>
    where
        F: Fn(&str) -> bool,
    {
        let mut sums: HashMap<Uuid, (BigDecimal, usize)> = HashMap::new();
        for (label, by_period) in &self.by_label {
            if !predicate(label) {
                continue;
            }
            for (period, (value, concepts)) in by_period {
                let entry = sums
                    .entry(*period)
                    .or_insert((BigDecimal::from(0), 0));
                entry.0 += value;
                entry.1 += concepts;
            }
        }
        sums
    }
}

/// Build the per-company fact index (consolidated, numeric facts only)
async fn company_facts(
    pool: &DatabasePool,
    company_id: Uuid,
    concept_info: &HashMap<Uuid, (String, Option<String>)>,
) -> AppResult<CompanyFacts> {
    let mut conn = pool.get().await?;

    let rows: Vec<(Uuid, Uuid, Uuid, Option<BigDecimal>)> = fact_financial_metrics::table
        .filter(fact_financial_metrics::company_id.eq(company_id))
        .filter(fact_financial_metrics::dimension_id.is_null())
        .filter(fact_financial_metrics::value_numeric.is_not_null())
        .select((
            fact_financial_metrics::concept_id,
            fact_financial_metrics::period_id,
            fact_financial_metrics::filing_id,
            fact_financial_metrics::value_numeric,
        ))
        .load(&mut conn)
        .await?;

    let mut facts = CompanyFacts::default();
    for (concept_id, period_id, filing_id, value) in rows {
        let Some(value) = value else { continue };
        let Some((concept_name, normalized_label)) = concept_info.get(&concept_id) else {
            continue;
        };
        facts.concept_names.insert(concept_name.clone());
        facts.filing_for_period.entry(period_id).or_insert(filing_id);

        if let Some(label) = normalized_label {
            let entry = facts
                .by_label
                .entry(label.clone())
                .or_default()
                .entry(period_id)
                .or_insert((BigDecimal::from(0), 0));
            entry.0 += &value;
            entry.1 += 1;
        }
    }

    Ok(facts)
}

/// Run every strategy for every company. Returns metric -> rows created.
pub async fn calculate_missing_totals(pool: &DatabasePool) -> AppResult<HashMap<String, usize>> {
    let mut conn = pool.get().await?;

    let companies: Vec<(Uuid, String)> = dim_companies::table
        .select((dim_companies::id, dim_companies::ticker))
        .load(&mut conn)
        .await?;

    let concepts: Vec<(Uuid, String, Option<String>)> = dim_concepts::table
        .select((
            dim_concepts::id,
            dim_concepts::concept_name,
            dim_concepts::normalized_label,
        ))
        .load(&mut conn)
        .await?;
    let concept_info: HashMap<Uuid, (String, Option<String>)> = concepts
        .into_iter()
        .map(|(id, name, label)| (id, (name, label)))
        .collect();
    drop(conn);

    let mut results: HashMap<String, usize> = HashMap::new();

    for (company_id, ticker) in companies {
        let facts = company_facts(pool, company_id, &concept_info).await?;

        let created = calculate_revenue(pool, company_id, &facts).await?;
        if created > 0 {
            info!("{}: created {} calculated revenue totals", ticker, created);
            *results.entry("revenue".to_string()).or_default() += created;
        }

        let created = calculate_current_liabilities(pool, company_id, &facts).await?;
        let bank_created = calculate_bank_current_liabilities(pool, company_id, &facts).await?;
        if created + bank_created > 0 {
            info!(
                "{}: created {} calculated current_liabilities totals",
                ticker,
                created + bank_created
            );
            *results.entry("current_liabilities".to_string()).or_default() +=
                created + bank_created;
        }

        let created = calculate_noncurrent_liabilities(pool, company_id, &facts).await?;
        if created > 0 {
            info!(
                "{}: created {} calculated noncurrent_liabilities totals",
                ticker, created
            );
            *results
                .entry("noncurrent_liabilities".to_string())
                .or_default() += created;
        }

        let created = calculate_total_liabilities(pool, company_id, &facts).await?;
        if created > 0 {
            info!(
                "{}: created {} calculated total_liabilities totals",
                ticker, created
            );
            *results.entry("total_liabilities".to_string()).or_default() += created;
        }

        let created = calculate_stockholders_equity(pool, company_id, &facts).await?;
        if created > 0 {
            info!(
                "{}: created {} calculated stockholders_equity totals",
                ticker, created
            );
            *results.entry("stockholders_equity".to_string()).or_default() += created;
        }

        let created = calculate_accounts_payable_from_accrued(pool, company_id, &facts).await?;
        if created > 0 {
            info!(
                "{}: created {} calculated accounts_payable totals",
                ticker, created
            );
            *results.entry("accounts_payable".to_string()).or_default() += created;
        }
    }

    Ok(results)
}

/// revenue = Σ revenue components, when >= 2 components report
async fn calculate_revenue(
    pool: &DatabasePool,
    company_id: Uuid,
    facts: &CompanyFacts,
) -> AppResult<usize> {
    if facts.has_any_label(&["revenue", "revenue_from_contracts"]) {
        return Ok(0);
    }

    const COMPONENTS: &[&str] = &[
        "revenue_from_sale_of_goods",
        "other_revenue",
        "revenue_from_contracts",
        "revenue_from_collaborative_arrangements",
    ];

    let mut sums: HashMap<Uuid, (BigDecimal, usize)> = HashMap::new();
    for label in COMPONENTS {
        if let Some(by_period) = facts.by_label.get(*label) {
            for (period, (value, concepts)) in by_period {
                let entry = sums.entry(*period).or_insert((BigDecimal::from(0), 0));
                entry.0 += value;
                entry.1 += concepts;
            }
        }
    }

    insert_totals_where(pool, company_id, facts, "revenue", sums, |count, _| count >= 2).await
}

/// current_liabilities = Σ Current*Liabilit* components (>= 3 of them)
async fn calculate_current_liabilities(
    pool: &DatabasePool,
    company_id: Uuid,
    facts: &CompanyFacts,
) -> AppResult<usize> {
    if facts.has_label("current_liabilities") {
        return Ok(0);
    }

    let sums = facts.sum_matching(|label| {
        label != "current_liabilities" && label.contains("current") && label.contains("liabilit")
    });

    insert_totals_where(pool, company_id, facts, "current_liabilities", sums, |count, _| {
        count >= 3
    })
    .await
}

/// Banks: deposit liabilities are the current-liability components
async fn calculate_bank_current_liabilities(
    pool: &DatabasePool,
    company_id: Uuid,
    facts: &CompanyFacts,
) -> AppResult<usize> {
    if facts.has_any_label(&[
        "current_liabilities",
        "liabilities_current",
        "current_liabilities_ifrs_variant",
    ]) {
        return Ok(0);
    }

    let sums = facts.sum_matching(|label| {
        (label.contains("deposit") && label.contains("liabilit"))
            || label.contains("interest_bearing_deposit")
            || label.contains("noninterest_bearing_deposit")
    });

    insert_totals_where(pool, company_id, facts, "current_liabilities", sums, |_, value| {
        *value > BigDecimal::from(0)
    })
    .await
}

/// noncurrent_liabilities from components, else total - current
async fn calculate_noncurrent_liabilities(
    pool: &DatabasePool,
    company_id: Uuid,
    facts: &CompanyFacts,
) -> AppResult<usize> {
    if facts.has_label("noncurrent_liabilities") {
        return Ok(0);
    }

    let component_sums = facts.sum_matching(|label| {
        label != "noncurrent_liabilities"
            && label.contains("noncurrent")
            && label.contains("liabilit")
    });

    if !component_sums.is_empty() {
        return insert_totals_where(
            pool,
            company_id,
            facts,
            "noncurrent_liabilities",
            component_sums,
            |count, _| count >= 1,
        )
        .await;
    }

    // Identity: noncurrent = total - current
    const TOTAL: &[&str] = &["total_liabilities", "liabilities"];
    const CURRENT: &[&str] = &["current_liabilities", "liabilities_current"];

    let mut sums: HashMap<Uuid, (BigDecimal, usize)> = HashMap::new();
    for period in facts.periods_with_any(TOTAL) {
        let (Some(total), Some(current)) = (
            facts.first_value(TOTAL, period),
            facts.first_value(CURRENT, period),
        ) else {
            continue;
        };
        let noncurrent = total - current;
        if noncurrent > BigDecimal::from(0) {
            sums.insert(period, (noncurrent, 2));
        }
    }

    insert_totals_where(pool, company_id, facts, "noncurrent_liabilities", sums, |_, _| true)
        .await
}

/// total_liabilities = current + noncurrent, else assets - equity
async fn calculate_total_liabilities(
    pool: &DatabasePool,
    company_id: Uuid,
    facts: &CompanyFacts,
) -> AppResult<usize> {
    if facts.has_any_label(&["total_liabilities", "liabilities"]) {
        return Ok(0);
    }

    const CURRENT: &[&str] = &["current_liabilities", "liabilities_current"];
    const NONCURRENT: &[&str] = &["noncurrent_liabilities", "liabilities_noncurrent"];

    let mut sums: HashMap<Uuid, (BigDecimal, usize)> = HashMap::new();
    for period in facts.periods_with_any(CURRENT) {
        let (Some(current), Some(noncurrent)) = (
            facts.first_value(CURRENT, period),
            facts.first_value(NONCURRENT, period),
        ) else {
            continue;
        };
        let total = current + noncurrent;
        if total > BigDecimal::from(0) {
            sums.insert(period, (total, 2));
        }
    }

    if !sums.is_empty() {
        return insert_totals_where(pool, company_id, facts, "total_liabilities", sums, |_, _| {
            true
        })
        .await;
    }

    const ASSETS: &[&str] = &["total_assets", "total_assets_equation"];
    const EQUITY: &[&str] = &[
        "stockholders_equity",
        "equity_attributable_to_parent",
        "equity_total",
        "equity",
    ];

    let mut sums: HashMap<Uuid, (BigDecimal, usize)> = HashMap::new();
    for period in facts.periods_with_any(ASSETS) {
        let (Some(assets), Some(equity)) = (
            facts.first_value(ASSETS, period),
            facts.first_value(EQUITY, period),
        ) else {
            continue;
        };
        let total = assets - equity;
        if total > BigDecimal::from(0) {
            sums.insert(period, (total, 2));
        }
    }

    insert_totals_where(pool, company_id, facts, "total_liabilities", sums, |_, _| true).await
}

/// stockholders_equity = assets - liabilities
async fn calculate_stockholders_equity(
    pool: &DatabasePool,
    company_id: Uuid,
    facts: &CompanyFacts,
) -> AppResult<usize> {
    if facts.has_any_label(&[
        "stockholders_equity",
        "equity_attributable_to_parent",
        "equity_total",
        "equity",
    ]) {
        return Ok(0);
    }

    const ASSETS: &[&str] = &["total_assets", "total_assets_equation"];
    const LIABILITIES: &[&str] = &["total_liabilities", "liabilities"];

    let mut sums: HashMap<Uuid, (BigDecimal, usize)> = HashMap::new();
    for period in facts.periods_with_any(ASSETS) {
        let (Some(assets), Some(liabilities)) = (
            facts.first_value(ASSETS, period),
            facts.first_value(LIABILITIES, period),
        ) else {
            continue;
        };
        let equity = assets - liabilities;
        if equity > BigDecimal::from(0) {
            sums.insert(period, (equity, 2));
        }
    }

    // Prefer the most specific equity concept present in the warehouse
    let concept_id = first_concept_for_labels(
        pool,
        &[
            "stockholders_equity",
            "equity_attributable_to_parent",
            "equity_total",
            "equity",
        ],
    )
    .await?;
    let Some(concept_id) = concept_id else {
        return Ok(0);
    };

    insert_totals(pool, company_id, facts, concept_id, sums).await
}

/// Banks without any AccountsPayableCurrent concept: the accrued-and-
/// other-liabilities amount stands in for accounts payable.
async fn calculate_accounts_payable_from_accrued(
    pool: &DatabasePool,
    company_id: Uuid,
    facts: &CompanyFacts,
) -> AppResult<usize> {
    if facts.has_any_label(&["accounts_payable", "accounts_payable_current"]) {
        return Ok(0);
    }
    if !facts.has_label("accrued_liabilities_and_other_liabilities") {
        return Ok(0);
    }
    // With AccountsPayableCurrent present the mapping would duplicate it
    if facts.has_concept("AccountsPayableCurrent") {
        return Ok(0);
    }

    let sums: HashMap<Uuid, (BigDecimal, usize)> = facts
        .by_label
        .get("accrued_liabilities_and_other_liabilities")
        .map(|by_period| {
            by_period
                .iter()
                .filter(|(_, (value, _))| *value > BigDecimal::from(0))
                .map(|(period, entry)| (*period, entry.clone()))
                .collect()
        })
        .unwrap_or_default();

    insert_totals_where(pool, company_id, facts, "accounts_payable", sums, |_, _| true).await
}

/// Canonical concept for a normalized label, in preference order
async fn first_concept_for_labels(
    pool: &DatabasePool,
    labels: &[&str],
) -> AppResult<Option<Uuid>> {
    let mut conn = pool.get().await?;
    for label in labels {
        let found: Option<Uuid> = dim_concepts::table
            .filter(dim_concepts::normalized_label.eq(*label))
            .select(dim_concepts::id)
            .first(&mut conn)
            .await
            .optional()?;
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

async fn insert_totals_where<F>(
    pool: &DatabasePool,
    company_id: Uuid,
    facts: &CompanyFacts,
    metric_label: &str,
    sums: HashMap<Uuid, (BigDecimal, usize)>,
    accept: F,
) -> AppResult<usize>
where
    F: Fn(usize, &BigDecimal) -> bool,
{
    let filtered: HashMap<Uuid, (BigDecimal, usize)> = sums
        .into_iter()
        .filter(|(_, (value, count))| accept(*count, value))
        .collect();

    if filtered.is_empty() {
        return Ok(0);
    }

    let Some(concept_id) = first_concept_for_labels(pool, &[metric_label]).await? else {
        return Ok(0);
    };

    insert_totals(pool, company_id, facts, concept_id, filtered).await
}

/// Insert one `is_calculated` fact per period under the canonical
/// concept. The natural-key conflict check makes re-runs no-ops.
async fn insert_totals(
    pool: &DatabasePool,
    company_id: Uuid,
    facts: &CompanyFacts,
    concept_id: Uuid,
    sums: HashMap<Uuid, (BigDecimal, usize)>,
) -> AppResult<usize> {
    let mut conn = pool.get().await?;
    let mut inserted = 0usize;

    for (period_id, (value, _)) in sums {
        let Some(&filing_id) = facts.filing_for_period.get(&period_id) else {
            continue;
        };

        inserted += diesel::insert_into(fact_financial_metrics::table)
            .values((
                fact_financial_metrics::company_id.eq(company_id),
                fact_financial_metrics::concept_id.eq(concept_id),
                fact_financial_metrics::period_id.eq(period_id),
                fact_financial_metrics::filing_id.eq(filing_id),
                fact_financial_metrics::value_numeric.eq(Some(value)),
                fact_financial_metrics::scale_int.eq(Some(0)),
                fact_financial_metrics::is_primary.eq(true),
                fact_financial_metrics::is_calculated.eq(true),
                fact_financial_metrics::extraction_method.eq("calculated_total"),
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

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts_with(labels: &[(&str, &[(Uuid, f64, usize)])]) -> CompanyFacts {
        use bigdecimal::FromPrimitive;
        let mut facts = CompanyFacts::default();
        for (label, entries) in labels {
            let mut by_period = HashMap::new();
            for (period, value, count) in *entries {
                by_period.insert(*period, (BigDecimal::from_f64(*value).unwrap(), *count));
            }
            facts.by_label.insert(label.to_string(), by_period);
        }
        facts
    }

    #[test]
    fn sum_matching_counts_distinct_concepts() {
        // REQUIREMENT: Component sums gate on how many concepts contribute
        // PURPOSE: Verify the per-period sum and distinct-concept count
        let period = Uuid::new_v4();
        let facts = facts_with(&[
            ("accrued_current_liabilities", &[(period, 100.0, 1)]),
            ("tax_current_liabilities", &[(period, 50.0, 1)]),
            ("other_current_liabilities", &[(period, 25.0, 1)]),
            ("revenue", &[(period, 900.0, 1)]),
        ]);

        let sums = facts.sum_matching(|label| {
            label.contains("current") && label.contains("liabilit")
        });
        let (value, count) = &sums[&period];
        assert_eq!(count, &3);
        assert_eq!(value, &BigDecimal::from(175));
    }

    #[test]
    fn first_value_respects_preference_order() {
        // REQUIREMENT: Identity strategies prefer the most specific label
        // PURPOSE: Verify first_value walks the label list in order
        let period = Uuid::new_v4();
        let facts = facts_with(&[
            ("equity_total", &[(period, 10.0, 1)]),
            ("stockholders_equity", &[(period, 20.0, 1)]),
        ]);

        let value = facts
            .first_value(&["stockholders_equity", "equity_total"], period)
            .unwrap();
        assert_eq!(value, &BigDecimal::from(20));
    }

    #[test]
    fn has_any_label_checks_presence() {
        // REQUIREMENT: Totals are only calculated for companies missing them
        // PURPOSE: Verify the presence check the strategies gate on
        let period = Uuid::new_v4();
        let facts = facts_with(&[("revenue", &[(period, 1.0, 1)])]);
        assert!(facts.has_any_label(&["revenue", "net_income"]));
        assert!(!facts.has_any_label(&["net_income"]));
    }
}
