//! Relationship synthesis: standard-template calculation arcs and
//! presentation rows for filings whose linkbases do not cover a concept.
//!
//! XBRL relationships always win; dimensional breakdowns are filtering,
//! not calculation arcs, and are never synthesized into the hierarchy.
//! Standard-template arcs carry `is_synthetic = true` and a reduced
//! confidence so downstream consumers can tell them apart.

use std::collections::{HashMap, HashSet};

use bigdecimal::BigDecimal;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::info;
use uuid::Uuid;

use finstmt_core::database::DatabasePool;
use finstmt_core::error::AppResult;
use finstmt_core::models::{NewCalculationArc, NewPresentationArc};
use finstmt_core::schema::{
    dim_concepts, fact_financial_metrics, rel_presentation_hierarchy,
};

/// A loaded fact with enough context for synthesis decisions
#[derive(Debug, Clone)]
pub struct LoadedFact {
    pub concept_id: Uuid,
    pub concept_name: String,
    pub normalized_label: Option<String>,
    pub dimension_id: Option<Uuid>,
    pub value_numeric: Option<BigDecimal>,
}

/// Standard calculation hierarchies by statement, as
/// parent label -> [(child label, weight)]. Applied only where the
/// filing's facts carry the labels and XBRL arcs do not already relate
/// them.
static STANDARD_CALC_HIERARCHIES: &[(&str, &[(&str, &[(&str, f64)])])] = &[
    (
        "income_statement",
        &[
            ("gross_profit", &[("revenue", 1.0), ("cost_of_revenue", -1.0)]),
            (
                "operating_income",
                &[("gross_profit", 1.0), ("operating_expenses", -1.0)],
            ),
            (
                "operating_expenses",
                &[
                    ("research_development", 1.0),
                    ("selling_and_marketing_expense", 1.0),
                    ("general_and_administrative_expense", 1.0),
                ],
            ),
        ],
    ),
    (
        "balance_sheet",
        &[
            (
                "total_assets",
                &[("current_assets", 1.0), ("noncurrent_assets", 1.0)],
            ),
            (
                "current_assets",
                &[
                    ("cash_and_equivalents", 1.0),
                    ("accounts_receivable", 1.0),
                    ("inventory", 1.0),
                ],
            ),
            (
                "noncurrent_assets",
                &[
                    ("property_plant_equipment", 1.0),
                    ("intangible_assets", 1.0),
                    ("goodwill", 1.0),
                ],
            ),
            (
                "total_liabilities",
                &[("current_liabilities", 1.0), ("noncurrent_liabilities", 1.0)],
            ),
            (
                "current_liabilities",
                &[
                    ("accounts_payable", 1.0),
                    ("accrued_liabilities_current", 1.0),
                    ("short_term_debt", 1.0),
                ],
            ),
            (
                "noncurrent_liabilities",
                &[("long_term_debt", 1.0), ("deferred_tax_liabilities", 1.0)],
            ),
            (
                "total_equity",
                &[
                    ("common_stock_value", 1.0),
                    ("retained_earnings", 1.0),
                    ("accumulated_other_comprehensive_income", 1.0),
                ],
            ),
        ],
    ),
    (
        "cash_flow",
        &[(
            "cash_change_in_period",
            &[
                ("operating_cash_flow", 1.0),
                ("investing_cash_flow", 1.0),
                ("financing_cash_flow", 1.0),
            ],
        )],
    ),
];

/// Confidence assigned to standard-template arcs
const STANDARD_ARC_CONFIDENCE: f64 = 0.8;

/// Merge XBRL arcs with standard-template arcs synthesized over the
/// filing's facts. XBRL pairs win; standard arcs only fill gaps.
pub fn merge_calculation_arcs(
    filing_id: Uuid,
    xbrl_arcs: Vec<NewCalculationArc>,
    loaded_facts: &[LoadedFact],
) -> Vec<NewCalculationArc> {
    let mut seen_pairs: HashSet<(Uuid, Uuid)> = xbrl_arcs
        .iter()
        .map(|arc| (arc.parent_concept_id, arc.child_concept_id))
        .collect();

    let mut merged = xbrl_arcs;
    for arc in synthesize_standard_calc_arcs(filing_id, loaded_facts) {
        let pair = (arc.parent_concept_id, arc.child_concept_id);
        if seen_pairs.insert(pair) {
            merged.push(arc);
        }
    }
    merged
}

/// Emit standard-template arcs for labels the filing actually reports
fn synthesize_standard_calc_arcs(
    filing_id: Uuid,
    loaded_facts: &[LoadedFact],
) -> Vec<NewCalculationArc> {
    // First consolidated concept per normalized label
    let mut by_label: HashMap<&str, Uuid> = HashMap::new();
    for fact in loaded_facts {
        if fact.dimension_id.is_some() {
            continue;
        }
        if let Some(label) = fact.normalized_label.as_deref() {
            by_label.entry(label).or_insert(fact.concept_id);
        }
    }

    let mut arcs = Vec::new();
    let mut order = 0;

    for (_, hierarchy) in STANDARD_CALC_HIERARCHIES {
        for (parent_label, children) in *hierarchy {
            let Some(&parent_concept_id) = by_label.get(parent_label) else {
                continue;
            };
            for (child_label, weight) in *children {
                let Some(&child_concept_id) = by_label.get(child_label) else {
                    continue;
                };
                if parent_concept_id == child_concept_id {
                    continue;
                }

                arcs.push(NewCalculationArc {
                    filing_id,
                    parent_concept_id,
                    child_concept_id,
                    weight: bigdecimal_from(*weight),
                    order_index: Some(order),
                    arcrole: None,
                    priority: 0,
                    source: "standard".to_string(),
                    is_synthetic: true,
                    confidence: bigdecimal_from(STANDARD_ARC_CONFIDENCE),
                });
                order += 1;
            }
        }
    }

    arcs
}

fn bigdecimal_from(value: f64) -> BigDecimal {
    use bigdecimal::FromPrimitive;
    BigDecimal::from_f64(value).unwrap_or_else(|| BigDecimal::from(0))
}

/// Standard presentation templates: statement -> sections -> items with
/// in-section order. The template order becomes
/// `section_order * 1000 + item_order`.
static STANDARD_PRESENTATION_TEMPLATES: &[(&str, &[(&str, i32, &[(&str, i32)])])] = &[
    (
        "balance_sheet",
        &[
            (
                "noncurrent_assets",
                1,
                &[
                    ("intangible_assets", 1),
                    ("property_plant_equipment", 2),
                    ("investments_in_associated_companies", 3),
                    ("deferred_tax_assets", 4),
                    ("other_receivables_and_prepayments", 5),
                    ("other_financial_assets", 6),
                    ("other_noncurrent_assets", 7),
                    ("noncurrent_assets", 8),
                    ("total_noncurrent_assets", 8),
                ],
            ),
            (
                "current_assets",
                2,
                &[
                    ("inventory", 1),
                    ("inventories", 1),
                    ("trade_receivables", 2),
                    ("accounts_receivable", 2),
                    ("tax_receivables", 3),
                    ("other_receivables_and_prepayments", 4),
                    ("marketable_securities", 5),
                    ("derivative_financial_instruments", 6),
                    ("cash_and_equivalents", 7),
                    ("cash_at_bank", 7),
                    ("current_assets", 8),
                    ("total_current_assets", 8),
                ],
            ),
            (
                "equity",
                3,
                &[
                    ("share_capital", 1),
                    ("common_stock_value", 1),
                    ("treasury_shares", 2),
                    ("retained_earnings", 3),
                    ("other_reserves", 4),
                    ("accumulated_other_comprehensive_income", 4),
                    ("total_equity", 5),
                    ("stockholders_equity", 5),
                ],
            ),
            (
                "noncurrent_liabilities",
                4,
                &[
                    ("borrowings", 1),
                    ("long_term_debt", 1),
                    ("deferred_tax_liabilities", 2),
                    ("retirement_benefit_obligations", 3),
                    ("other_liabilities", 4),
                    ("provisions_noncurrent", 5),
                    ("noncurrent_liabilities", 6),
                    ("total_noncurrent_liabilities", 6),
                ],
            ),
            (
                "current_liabilities",
                5,
                &[
                    ("short_term_debt", 1),
                    ("trade_payables", 2),
                    ("accounts_payable", 2),
                    ("tax_payables", 3),
                    ("other_liabilities", 4),
                    ("derivative_financial_instruments", 5),
                    ("provisions", 6),
                    ("current_liabilities", 7),
                    ("total_current_liabilities", 7),
                ],
            ),
            (
                "totals",
                6,
                &[
                    ("total_assets", 1),
                    ("total_liabilities", 2),
                    ("total_liabilities_and_equity", 3),
                ],
            ),
        ],
    ),
    (
        "income_statement",
        &[
            (
                "revenue",
                1,
                &[
                    ("revenue", 1),
                    ("net_sales", 1),
                    ("revenue_from_contracts", 1),
                    ("revenue_from_sale_of_goods", 1),
                    ("other_revenue", 2),
                ],
            ),
            (
                "costs",
                2,
                &[
                    ("cost_of_sales", 1),
                    ("cost_of_revenue", 1),
                    ("cost_of_goods_and_services_sold", 1),
                ],
            ),
            ("gross_profit", 3, &[("gross_profit", 1)]),
            (
                "operating_expenses",
                4,
                &[
                    ("selling_expense_and_distribution_costs", 1),
                    ("sales_and_distribution_costs", 1),
                    ("selling_general_admin", 1),
                    ("research_development", 2),
                    ("administrative_expense", 3),
                    ("administrative_costs", 3),
                    ("other_operating_income_expense", 4),
                ],
            ),
            (
                "operating_income",
                5,
                &[("operating_income", 1), ("operating_profit", 1)],
            ),
            (
                "financial_items",
                6,
                &[
                    ("finance_income", 1),
                    ("financial_income", 1),
                    ("interest_income", 1),
                    ("finance_costs", 2),
                    ("financial_expenses", 2),
                    ("interest_expense", 2),
                ],
            ),
            (
                "income_before_tax",
                7,
                &[
                    ("income_before_tax", 1),
                    ("profit_before_tax", 1),
                    ("profit_before_income_taxes", 1),
                ],
            ),
            (
                "tax",
                8,
                &[
                    ("income_tax_expense_continuing_operations", 1),
                    ("income_tax_expense", 1),
                    ("income_taxes", 1),
                ],
            ),
            (
                "net_income",
                9,
                &[
                    ("net_income_including_noncontrolling_interest", 1),
                    ("net_income", 1),
                    ("net_profit", 1),
                    ("net_income_to_common", 2),
                ],
            ),
            (
                "eps",
                10,
                &[
                    ("basic_earnings_loss_per_share", 1),
                    ("eps_basic", 1),
                    ("diluted_earnings_loss_per_share", 2),
                    ("eps_diluted", 2),
                    ("shares_basic", 3),
                    ("shares_diluted", 4),
                ],
            ),
        ],
    ),
    (
        "comprehensive_income",
        &[
            ("net_profit", 1, &[("net_profit", 1), ("net_income", 1)]),
            (
                "oci_not_reclassified",
                2,
                &[
                    ("remeasurements_of_retirement_benefit_obligations", 1),
                    (
                        "items_that_will_not_be_reclassified_subsequently_to_the_income_statement",
                        2,
                    ),
                ],
            ),
            (
                "oci_reclassified",
                3,
                &[
                    ("exchange_rate_adjustments_of_investments_in_subsidiaries", 1),
                    ("cash_flow_hedges", 2),
                    ("realisation_of_previously_deferred_gains_losses", 3),
                    ("deferred_gains_losses_related_to_acquisition_of_businesses", 4),
                    ("deferred_gains_losses_on_hedges_open_at_year_end", 5),
                    ("tax_and_other_items", 6),
                    (
                        "items_that_will_be_reclassified_subsequently_to_the_income_statement",
                        7,
                    ),
                ],
            ),
            (
                "oci_total",
                4,
                &[("other_comprehensive_income", 1), ("oci_total", 1)],
            ),
            (
                "total_comprehensive_income",
                5,
                &[("total_comprehensive_income", 1)],
            ),
        ],
    ),
    (
        "cash_flow",
        &[
            (
                "operating_activities",
                1,
                &[
                    ("net_income", 1),
                    ("depreciation_and_amortization", 2),
                    ("stock_based_compensation", 3),
                    ("change_in_working_capital", 4),
                    ("change_in_receivables", 5),
                    ("change_in_inventory", 6),
                    ("change_in_payables", 7),
                    ("interest_received", 8),
                    ("interest_paid", 9),
                    ("income_taxes_paid", 10),
                    ("operating_cash_flow", 11),
                ],
            ),
            (
                "investing_activities",
                2,
                &[
                    ("capex", 1),
                    ("purchase_of_intangible_assets", 2),
                    ("acquisition_of_businesses", 3),
                    ("purchase_of_investments", 4),
                    ("sale_of_investments", 5),
                    ("investing_cash_flow", 6),
                ],
            ),
            (
                "financing_activities",
                3,
                &[
                    ("dividends_paid", 1),
                    ("stock_repurchased", 2),
                    ("proceeds_from_borrowings", 3),
                    ("repayment_of_borrowings", 4),
                    ("proceeds_from_equity", 5),
                    ("financing_cash_flow", 6),
                ],
            ),
            (
                "net_change",
                4,
                &[
                    ("net_change_in_cash", 1),
                    ("cash_at_beginning", 2),
                    ("cash_at_end", 3),
                ],
            ),
        ],
    ),
];

/// Labels that must never fuzzy-match a template entry: disclosure and
/// ratio variants would otherwise attach to main statement positions.
static TEMPLATE_FUZZY_EXCLUSIONS: &[&str] = &[
    "description_of_accounting_policy",
    "policy",
    "disclosure",
    "note",
    "explanatory",
    "reconciliation",
    "adjustment",
    "reconcile",
    "tax_rate_effect",
    "effective_tax_rate",
    "statutory_tax_rate",
    "percentage",
    "percent",
    "ratio",
    "growth_percent",
    "classified_as",
    "_paid",
    "_received",
    "_current_period",
    "_prior_period",
    "_gross",
    "_net",
    "_detail",
    "_breakdown",
    "_component",
    "_other",
    "auditors_remuneration",
    "professional_fees",
    "provisions_for",
    "discount_rate",
    "deferred_tax_expense_income_recognised",
];

/// Template position for a label: `section_order * 1000 + item_order`.
/// Exact matches first; the fuzzy pass only fires for labels that carry
/// the template key as a primary term and are not in the exclusion list.
pub fn template_order(normalized_label: &str, statement_type: &str) -> Option<i32> {
    let template = STANDARD_PRESENTATION_TEMPLATES
        .iter()
        .find(|(statement, _)| *statement == statement_type)
        .map(|(_, sections)| *sections)?;

    let label = normalized_label.to_lowercase();

    for (_, section_order, items) in template {
        if let Some((_, item_order)) = items.iter().find(|(key, _)| *key == label) {
            return Some(section_order * 1000 + item_order);
        }
    }

    if TEMPLATE_FUZZY_EXCLUSIONS.iter().any(|term| label.contains(term)) {
        return None;
    }

    for (_, section_order, items) in template {
        for (key, item_order) in *items {
            if label.starts_with(&format!("{}_", key))
                || label.ends_with(&format!("_{}", key))
                || label.contains(&format!("_{}_", key))
            {
                return Some(section_order * 1000 + item_order);
            }
        }
    }

    None
}

/// Insert standard presentation rows for concepts in a filing that carry
/// consolidated facts but appear in no presentation hierarchy. Returns
/// how many rows were inserted.
pub async fn populate_standard_presentation(
    pool: &DatabasePool,
    filing_id: Uuid,
) -> AppResult<usize> {
    let mut conn = pool.get().await?;

    // Concepts already covered by any presentation arc in this filing
    let covered: HashSet<Uuid> = rel_presentation_hierarchy::table
        .filter(rel_presentation_hierarchy::filing_id.eq(filing_id))
        .select(rel_presentation_hierarchy::child_concept_id)
        .load::<Uuid>(&mut conn)
        .await?
        .into_iter()
        .collect();

    let fact_concepts: Vec<Uuid> = fact_financial_metrics::table
        .filter(fact_financial_metrics::filing_id.eq(filing_id))
        .filter(fact_financial_metrics::dimension_id.is_null())
        .select(fact_financial_metrics::concept_id)
        .distinct()
        .load(&mut conn)
        .await?;

    let concepts: Vec<(Uuid, Option<String>, Option<String>, Option<Uuid>)> = dim_concepts::table
        .filter(dim_concepts::id.eq_any(&fact_concepts))
        .select((
            dim_concepts::id,
            dim_concepts::normalized_label,
            dim_concepts::statement_type,
            dim_concepts::parent_concept_id,
        ))
        .load(&mut conn)
        .await?;

    let mut inserted = 0usize;
    for (concept_id, normalized_label, statement_type, parent_concept_id) in concepts {
        if covered.contains(&concept_id) {
            continue;
        }
        let (Some(label), Some(statement)) = (normalized_label, statement_type) else {
            continue;
        };
        if !matches!(
            statement.as_str(),
            "income_statement" | "balance_sheet" | "cash_flow"
        ) {
            continue;
        }
        let Some(order_index) = template_order(&label, &statement) else {
            continue;
        };

        let arc = NewPresentationArc {
            filing_id,
            parent_concept_id,
            child_concept_id: concept_id,
            order_index: Some(order_index),
            preferred_label: None,
            statement_type: statement,
            role_uri: None,
            arcrole: None,
            priority: 0,
            source: "standard".to_string(),
            is_synthetic: true,
        };

        inserted += diesel::insert_into(rel_presentation_hierarchy::table)
            .values(&arc)
            .on_conflict((
                rel_presentation_hierarchy::filing_id,
                rel_presentation_hierarchy::parent_concept_id,
                rel_presentation_hierarchy::child_concept_id,
                rel_presentation_hierarchy::order_index,
            ))
            .do_nothing()
            .execute(&mut conn)
            .await?;
    }

    if inserted > 0 {
        info!(
            "Inserted {} standard presentation rows for filing {}",
            inserted, filing_id
        );
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(label: &str, concept_id: Uuid) -> LoadedFact {
        LoadedFact {
            concept_id,
            concept_name: label.to_string(),
            normalized_label: Some(label.to_string()),
            dimension_id: None,
            value_numeric: Some(BigDecimal::from(1)),
        }
    }

    #[test]
    fn standard_arcs_cover_reported_labels_only() {
        // REQUIREMENT: Template arcs only relate labels the filing reports
        // PURPOSE: Verify synthesis emits arcs for present labels and
        // marks them synthetic
        let filing_id = Uuid::new_v4();
        let revenue = Uuid::new_v4();
        let cost = Uuid::new_v4();
        let gross = Uuid::new_v4();

        let facts = vec![
            fact("revenue", revenue),
            fact("cost_of_revenue", cost),
            fact("gross_profit", gross),
        ];

        let arcs = merge_calculation_arcs(filing_id, vec![], &facts);
        assert_eq!(arcs.len(), 2);
        assert!(arcs.iter().all(|arc| arc.is_synthetic));
        assert!(arcs
            .iter()
            .any(|arc| arc.parent_concept_id == gross && arc.child_concept_id == cost));
    }

    #[test]
    fn xbrl_arcs_suppress_matching_standard_arcs() {
        // REQUIREMENT: XBRL relationships always win over synthesized ones
        // PURPOSE: Verify the merge keeps one arc per pair with XBRL first
        let filing_id = Uuid::new_v4();
        let revenue = Uuid::new_v4();
        let cost = Uuid::new_v4();
        let gross = Uuid::new_v4();

        let facts = vec![
            fact("revenue", revenue),
            fact("cost_of_revenue", cost),
            fact("gross_profit", gross),
        ];

        let xbrl = vec![NewCalculationArc {
            filing_id,
            parent_concept_id: gross,
            child_concept_id: revenue,
            weight: BigDecimal::from(1),
            order_index: Some(0),
            arcrole: None,
            priority: 0,
            source: "xbrl".to_string(),
            is_synthetic: false,
            confidence: BigDecimal::from(1),
        }];

        let arcs = merge_calculation_arcs(filing_id, xbrl, &facts);
        let gross_revenue: Vec<_> = arcs
            .iter()
            .filter(|arc| arc.parent_concept_id == gross && arc.child_concept_id == revenue)
            .collect();
        assert_eq!(gross_revenue.len(), 1);
        assert_eq!(gross_revenue[0].source, "xbrl");
    }

    #[test]
    fn template_order_exact_match() {
        // REQUIREMENT: Template positions encode section*1000 + item
        // PURPOSE: Verify exact label matches land on their positions
        assert_eq!(template_order("revenue", "income_statement"), Some(1001));
        assert_eq!(template_order("total_assets", "balance_sheet"), Some(6001));
        assert_eq!(
            template_order("operating_cash_flow", "cash_flow"),
            Some(1011)
        );
    }

    #[test]
    fn template_order_rejects_disclosure_variants() {
        // REQUIREMENT: Disclosure/ratio variants never take main positions
        // PURPOSE: Verify the fuzzy-match exclusion list blocks them
        assert_eq!(
            template_order(
                "description_of_accounting_policy_for_revenue",
                "income_statement"
            ),
            None
        );
        assert_eq!(
            template_order("revenue_growth_percent", "income_statement"),
            None
        );
    }

    #[test]
    fn template_order_fuzzy_matches_primary_terms() {
        // REQUIREMENT: Label variants of a template item share its position
        // PURPOSE: Verify the primary-term fuzzy match and its miss case
        assert_eq!(
            template_order("revenue_from_licenses", "income_statement"),
            Some(1001)
        );
        assert_eq!(template_order("unrelated_thing", "income_statement"), None);
    }
}
