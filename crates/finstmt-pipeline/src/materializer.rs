//! Statement fact materializer: denormalizes `rel_statement_items` and
//! the fact table into the five per-statement tables the UI reads.
//!
//! Runs per filing with delete-and-rebuild semantics. Signs are corrected
//! here (OCI reclassifications, tax-on-OCI, equity outflows), synthetic
//! rows are valued (beginning cash, beginning/ending equity balances),
//! and the equity statement is pivoted into its component matrix.

use std::collections::{HashMap, HashSet};

use bigdecimal::BigDecimal;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::info;
use uuid::Uuid;

use finstmt_core::database::DatabasePool;
use finstmt_core::enums::EquityComponent;
use finstmt_core::error::AppResult;
use finstmt_core::models::period::duration_days;
use finstmt_core::models::{
    NewBalanceSheetFact, NewCashFlowFact, NewComprehensiveIncomeFact, NewEquityStatementFact,
    NewIncomeStatementFact,
};
use finstmt_core::schema::{
    dim_concepts, dim_filings, dim_time_periods, dim_xbrl_dimensions, fact_balance_sheet,
    fact_cash_flow, fact_comprehensive_income, fact_equity_statement, fact_financial_metrics,
    fact_income_statement, rel_statement_items,
};

const EQUITY_AXIS: &str = "ComponentsOfEquityAxis";
const ZERO_EPSILON: f64 = 0.001;

/// Balance-sheet cash labels used for beginning-of-year cash synthesis
const CASH_LABELS: &[&str] = &[
    "cash_and_equivalents",
    "balances_with_banks",
    "cash_and_cash_equivalents",
];

/// Labels whose equity-statement values come from the materialized
/// comprehensive-income table, so the universal sign corrections carry
/// through.
const CI_SOURCED_LABELS: &[&str] = &[
    "other_comprehensive_income",
    "oci_total",
    "total_comprehensive_income",
    "comprehensive_income",
];

/// Rows per statement produced by one materialization run
#[derive(Debug, Default, Clone)]
pub struct MaterializeSummary {
    pub income_statement: usize,
    pub balance_sheet: usize,
    pub cash_flow: usize,
    pub comprehensive_income: usize,
    pub equity_statement: usize,
}

/// Comprehensive-income items whose reported sign must be flipped:
/// reclassification adjustments on cash-flow hedges (before tax) reverse
/// previously deferred amounts, and tax presented in OCI carries the
/// opposite sign of its pretax component.
pub fn comprehensive_income_sign_flipped(normalized_label: &str) -> bool {
    let label = normalized_label.to_lowercase();

    (label.contains("reclassification_adjustments")
        && label.contains("cash_flow_hedges")
        && label.contains("before_tax"))
        || label.contains("income_tax_and_other_relating_to_components_of_other_comprehensive_income")
        || label.contains("income_tax_relating_to_components_of_other_comprehensive_income")
}

/// Income-statement rows that are really comprehensive-income or
/// cash-flow content and must not render in the income statement.
pub fn excluded_from_income_statement(normalized_label: &str) -> bool {
    let label = normalized_label.to_lowercase();

    const EXCLUDED: &[&str] = &[
        "comprehensive_income",
        "oci",
        "remeasurement",
        "exchange_differences",
        "cash_flow_hedge",
        "reclassification",
        "fair_value_hedge",
        "defined_benefit",
        "increase_decrease_in_cash",
        "effect_of_exchange_rate_changes_on_cash",
    ];
    EXCLUDED.iter().any(|pattern| label.contains(pattern))
}

/// Sign correction for an equity-statement movement row.
///
/// Outflows from equity (dividends, treasury purchases, hedge-reserve
/// transfers, capital reductions) are negative; tax on share-based
/// payments reverses sign; total comprehensive income is defined
/// positive. Capital reduction flips positive in the treasury-shares
/// column, where it reduces a negative balance.
pub fn equity_sign_corrected(
    normalized_label: &str,
    component: Option<EquityComponent>,
    value: &BigDecimal,
) -> BigDecimal {
    let label = normalized_label.to_lowercase();

    if label == "total_comprehensive_income" || label == "comprehensive_income" {
        return value.abs();
    }
    if label == "dividends_paid" {
        return -value.abs();
    }
    if label == "purchase_of_treasury_shares"
        || label.contains("payments_to_acquire_or_redeem_entitys_shares")
    {
        return -value.abs();
    }
    if label.contains("amount_removed_from_reserve_of_cash_flow_hedges") {
        return -value.abs();
    }
    if label == "reduction_of_issued_capital"
        || (label.contains("reduction") && label.contains("capital"))
    {
        return match component {
            Some(EquityComponent::TreasuryShares) => value.abs(),
            _ => -value.abs(),
        };
    }
    if label.contains("tax_on_sharebased")
        || label.contains("decrease_increase_through_tax_on_sharebased")
    {
        return -value.clone();
    }

    value.clone()
}

#[derive(Debug, Clone)]
struct ItemRow {
    concept_id: Uuid,
    statement_type: String,
    display_order: i32,
    is_header: bool,
    side: Option<String>,
}

#[derive(Debug, Clone)]
struct ConceptMeta {
    normalized_label: String,
    parent_concept_id: Option<Uuid>,
    hierarchy_level: Option<i32>,
}

#[derive(Debug, Clone)]
struct FactRow {
    concept_id: Uuid,
    period_id: Uuid,
    dimension_id: Option<Uuid>,
    value_numeric: Option<BigDecimal>,
    unit_measure: Option<String>,
}

#[derive(Debug, Clone)]
struct PeriodMeta {
    period_type: String,
    start_date: Option<chrono::NaiveDate>,
    end_date: Option<chrono::NaiveDate>,
    instant_date: Option<chrono::NaiveDate>,
    fiscal_quarter: Option<i32>,
}

impl PeriodMeta {
    /// Annual-duration filter for the equity statement: quarterly rows
    /// and sub-30-day stubs would duplicate the annual rows.
    fn is_annual_duration(&self) -> bool {
        if self.period_type != "duration" {
            return false;
        }
        if matches!(self.fiscal_quarter, Some(q) if q != 0) {
            return false;
        }
        match duration_days(self.start_date, self.end_date) {
            Some(days) => days >= 30,
            None => true,
        }
    }
}

struct Context {
    filing_id: Uuid,
    company_id: Uuid,
    items: Vec<ItemRow>,
    concepts: HashMap<Uuid, ConceptMeta>,
    facts: Vec<FactRow>,
    periods: HashMap<Uuid, PeriodMeta>,
    /// dimension id -> member of ComponentsOfEquityAxis (when carried)
    equity_members: HashMap<Uuid, String>,
    /// dominant currency unit in the filing, for synthesized rows
    default_unit: Option<String>,
}

impl Context {
    fn label(&self, concept_id: Uuid) -> &str {
        self.concepts
            .get(&concept_id)
            .map(|meta| meta.normalized_label.as_str())
            .unwrap_or("")
    }

    fn consolidated_facts(&self, concept_id: Uuid) -> Vec<&FactRow> {
        self.facts
            .iter()
            .filter(|fact| fact.concept_id == concept_id && fact.dimension_id.is_none())
            .collect()
    }

    fn duration_periods(&self) -> Vec<Uuid> {
        let mut periods: Vec<Uuid> = self
            .facts
            .iter()
            .map(|fact| fact.period_id)
            .filter(|period_id| {
                self.periods
                    .get(period_id)
                    .map(|p| p.period_type == "duration")
                    .unwrap_or(false)
            })
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        periods.sort();
        periods
    }

    fn annual_duration_periods(&self) -> Vec<Uuid> {
        let mut periods: Vec<Uuid> = self
            .facts
            .iter()
            .map(|fact| fact.period_id)
            .filter(|period_id| {
                self.periods
                    .get(period_id)
                    .map(|p| p.is_annual_duration())
                    .unwrap_or(false)
            })
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        periods.sort();
        periods
    }

    fn instant_periods(&self) -> Vec<Uuid> {
        let mut periods: Vec<Uuid> = self
            .facts
            .iter()
            .map(|fact| fact.period_id)
            .filter(|period_id| {
                self.periods
                    .get(period_id)
                    .map(|p| p.period_type == "instant")
                    .unwrap_or(false)
            })
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        periods.sort();
        periods
    }

    /// Null out parent references that would point *after* the child in
    /// display order within the same statement.
    fn validated_parent(&self, item: &ItemRow) -> Option<Uuid> {
        let parent_id = self.concepts.get(&item.concept_id)?.parent_concept_id?;
        let parent_order = self
            .items
            .iter()
            .find(|other| {
                other.statement_type == item.statement_type && other.concept_id == parent_id
            })
            .map(|other| other.display_order)?;
        if parent_order > item.display_order {
            None
        } else {
            Some(parent_id)
        }
    }

    fn hierarchy_level(&self, concept_id: Uuid) -> Option<i32> {
        self.concepts
            .get(&concept_id)
            .and_then(|meta| meta.hierarchy_level)
    }
}

async fn build_context(conn: &mut AsyncPgConnection, filing_id: Uuid) -> AppResult<Context> {
    let company_id: Uuid = dim_filings::table
        .filter(dim_filings::id.eq(filing_id))
        .select(dim_filings::company_id)
        .first(conn)
        .await?;

    let items: Vec<(Uuid, String, i32, bool, Option<String>)> = rel_statement_items::table
        .filter(rel_statement_items::filing_id.eq(filing_id))
        .filter(rel_statement_items::is_main_item.eq(true))
        .select((
            rel_statement_items::concept_id,
            rel_statement_items::statement_type,
            rel_statement_items::display_order,
            rel_statement_items::is_header,
            rel_statement_items::side,
        ))
        .load(conn)
        .await?;
    let items: Vec<ItemRow> = items
        .into_iter()
        .map(|(concept_id, statement_type, display_order, is_header, side)| ItemRow {
            concept_id,
            statement_type,
            display_order,
            is_header,
            side,
        })
        .collect();

    let item_concept_ids: Vec<Uuid> = items.iter().map(|item| item.concept_id).collect();

    let facts: Vec<(Uuid, Uuid, Option<Uuid>, Option<BigDecimal>, Option<String>)> =
        fact_financial_metrics::table
            .filter(fact_financial_metrics::filing_id.eq(filing_id))
            .select((
                fact_financial_metrics::concept_id,
                fact_financial_metrics::period_id,
                fact_financial_metrics::dimension_id,
                fact_financial_metrics::value_numeric,
                fact_financial_metrics::unit_measure,
            ))
            .load(conn)
            .await?;
    let facts: Vec<FactRow> = facts
        .into_iter()
        .map(
            |(concept_id, period_id, dimension_id, value_numeric, unit_measure)| FactRow {
                concept_id,
                period_id,
                dimension_id,
                value_numeric,
                unit_measure,
            },
        )
        .collect();

    let mut concept_ids: HashSet<Uuid> = item_concept_ids.iter().copied().collect();
    concept_ids.extend(facts.iter().map(|fact| fact.concept_id));
    let concept_ids: Vec<Uuid> = concept_ids.into_iter().collect();

    let concepts: HashMap<Uuid, ConceptMeta> = dim_concepts::table
        .filter(dim_concepts::id.eq_any(&concept_ids))
        .select((
            dim_concepts::id,
            dim_concepts::normalized_label,
            dim_concepts::parent_concept_id,
            dim_concepts::hierarchy_level,
        ))
        .load::<(Uuid, Option<String>, Option<Uuid>, Option<i32>)>(conn)
        .await?
        .into_iter()
        .map(|(id, label, parent, level)| {
            (
                id,
                ConceptMeta {
                    normalized_label: label.unwrap_or_default(),
                    parent_concept_id: parent,
                    hierarchy_level: level,
                },
            )
        })
        .collect();

    let period_ids: Vec<Uuid> = facts
        .iter()
        .map(|fact| fact.period_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let periods: HashMap<Uuid, PeriodMeta> = dim_time_periods::table
        .filter(dim_time_periods::id.eq_any(&period_ids))
        .select((
            dim_time_periods::id,
            dim_time_periods::period_type,
            dim_time_periods::start_date,
            dim_time_periods::end_date,
            dim_time_periods::instant_date,
            dim_time_periods::fiscal_quarter,
        ))
        .load::<(
            Uuid,
            String,
            Option<chrono::NaiveDate>,
            Option<chrono::NaiveDate>,
            Option<chrono::NaiveDate>,
            Option<i32>,
        )>(conn)
        .await?
        .into_iter()
        .map(|(id, period_type, start_date, end_date, instant_date, fiscal_quarter)| {
            (
                id,
                PeriodMeta {
                    period_type,
                    start_date,
                    end_date,
                    instant_date,
                    fiscal_quarter,
                },
            )
        })
        .collect();

    let dimension_ids: Vec<Uuid> = facts
        .iter()
        .filter_map(|fact| fact.dimension_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let equity_members: HashMap<Uuid, String> = dim_xbrl_dimensions::table
        .filter(dim_xbrl_dimensions::id.eq_any(&dimension_ids))
        .select((dim_xbrl_dimensions::id, dim_xbrl_dimensions::dimension_json))
        .load::<(Uuid, serde_json::Value)>(conn)
        .await?
        .into_iter()
        .filter_map(|(id, json)| {
            json.get(EQUITY_AXIS)
                .and_then(|details| details.get("member"))
                .and_then(|member| member.as_str())
                .map(|member| (id, member.to_string()))
        })
        .collect();

    // Dominant currency of the filing, for rows synthesized without a
    // source fact to copy the unit from.
    let mut unit_counts: HashMap<String, usize> = HashMap::new();
    for fact in &facts {
        if let Some(unit) = &fact.unit_measure {
            *unit_counts.entry(unit.clone()).or_default() += 1;
        }
    }
    let default_unit = unit_counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(unit, _)| unit);

    Ok(Context {
        filing_id,
        company_id,
        items,
        concepts,
        facts,
        periods,
        equity_members,
        default_unit,
    })
}

/// Materialize all five statement tables for one filing.
pub async fn materialize_statements(
    pool: &DatabasePool,
    filing_id: Uuid,
) -> AppResult<MaterializeSummary> {
    let mut conn = pool.get().await?;
    let ctx = build_context(&mut conn, filing_id).await?;

    let mut summary = MaterializeSummary::default();
    summary.income_statement = materialize_income_statement(&mut conn, &ctx).await?;
    summary.balance_sheet = materialize_balance_sheet(&mut conn, &ctx).await?;
    // Comprehensive income must precede the equity statement, which
    // sources its OCI rows from the materialized table; the balance
    // sheet must precede cash flow for beginning-cash lookups.
    summary.comprehensive_income = materialize_comprehensive_income(&mut conn, &ctx).await?;
    summary.cash_flow = materialize_cash_flow(&mut conn, &ctx).await?;
    summary.equity_statement = materialize_equity_statement(&mut conn, &ctx).await?;

    info!(
        "Materialized statements for filing {}: IS {}, BS {}, CI {}, CF {}, EQ {}",
        filing_id,
        summary.income_statement,
        summary.balance_sheet,
        summary.comprehensive_income,
        summary.cash_flow,
        summary.equity_statement
    );

    Ok(summary)
}

async fn materialize_income_statement(
    conn: &mut AsyncPgConnection,
    ctx: &Context,
) -> AppResult<usize> {
    diesel::delete(
        fact_income_statement::table.filter(fact_income_statement::filing_id.eq(ctx.filing_id)),
    )
    .execute(conn)
    .await?;

    let mut rows: Vec<NewIncomeStatementFact> = Vec::new();
    let mut seen: HashSet<(Uuid, Uuid)> = HashSet::new();

    for item in ctx
        .items
        .iter()
        .filter(|item| item.statement_type == "income_statement")
    {
        let label = ctx.label(item.concept_id);
        if !item.is_header && excluded_from_income_statement(label) {
            continue;
        }

        let parent = ctx.validated_parent(item);
        let level = ctx.hierarchy_level(item.concept_id);

        let facts = ctx.consolidated_facts(item.concept_id);
        let has_values = facts.iter().any(|fact| fact.value_numeric.is_some());

        if has_values {
            for fact in facts {
                if fact.value_numeric.is_none() {
                    continue;
                }
                if !seen.insert((item.concept_id, fact.period_id)) {
                    continue;
                }
                rows.push(NewIncomeStatementFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id: fact.period_id,
                    value_numeric: fact.value_numeric.clone(),
                    unit_measure: fact.unit_measure.clone(),
                    display_order: item.display_order,
                    is_header: item.is_header,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                });
            }
        } else if item.is_header {
            for period_id in ctx.duration_periods() {
                if !seen.insert((item.concept_id, period_id)) {
                    continue;
                }
                rows.push(NewIncomeStatementFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id,
                    value_numeric: None,
                    unit_measure: None,
                    display_order: item.display_order,
                    is_header: true,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                });
            }
        }
    }

    let inserted = diesel::insert_into(fact_income_statement::table)
        .values(&rows)
        .execute(conn)
        .await?;
    Ok(inserted)
}

async fn materialize_balance_sheet(
    conn: &mut AsyncPgConnection,
    ctx: &Context,
) -> AppResult<usize> {
    diesel::delete(
        fact_balance_sheet::table.filter(fact_balance_sheet::filing_id.eq(ctx.filing_id)),
    )
    .execute(conn)
    .await?;

    let mut rows: Vec<NewBalanceSheetFact> = Vec::new();
    let mut seen: HashSet<(Uuid, Uuid)> = HashSet::new();

    for item in ctx
        .items
        .iter()
        .filter(|item| item.statement_type == "balance_sheet")
    {
        let parent = ctx.validated_parent(item);
        let level = ctx.hierarchy_level(item.concept_id);

        let facts = ctx.consolidated_facts(item.concept_id);
        let has_values = facts.iter().any(|fact| fact.value_numeric.is_some());

        if has_values {
            for fact in facts {
                if fact.value_numeric.is_none() {
                    continue;
                }
                if !seen.insert((item.concept_id, fact.period_id)) {
                    continue;
                }
                rows.push(NewBalanceSheetFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id: fact.period_id,
                    value_numeric: fact.value_numeric.clone(),
                    unit_measure: fact.unit_measure.clone(),
                    display_order: item.display_order,
                    is_header: item.is_header,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                    side: item.side.clone(),
                });
            }
        } else if item.is_header {
            // Side headers render once per balance-sheet date
            for period_id in ctx.instant_periods() {
                if !seen.insert((item.concept_id, period_id)) {
                    continue;
                }
                rows.push(NewBalanceSheetFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id,
                    value_numeric: None,
                    unit_measure: None,
                    display_order: item.display_order,
                    is_header: true,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                    side: item.side.clone(),
                });
            }
        }
    }

    let inserted = diesel::insert_into(fact_balance_sheet::table)
        .values(&rows)
        .execute(conn)
        .await?;
    Ok(inserted)
}

async fn materialize_comprehensive_income(
    conn: &mut AsyncPgConnection,
    ctx: &Context,
) -> AppResult<usize> {
    diesel::delete(
        fact_comprehensive_income::table
            .filter(fact_comprehensive_income::filing_id.eq(ctx.filing_id)),
    )
    .execute(conn)
    .await?;

    let mut rows: Vec<NewComprehensiveIncomeFact> = Vec::new();
    let mut seen: HashSet<(Uuid, Uuid)> = HashSet::new();

    for item in ctx
        .items
        .iter()
        .filter(|item| item.statement_type == "comprehensive_income")
    {
        let label = ctx.label(item.concept_id).to_lowercase();
        // Cash-flow rows mis-routed into comprehensive income
        if label.contains("increase_decrease_in_cash")
            || label.contains("effect_of_exchange_rate_changes_on_cash")
        {
            continue;
        }

        let parent = ctx.validated_parent(item);
        let level = ctx.hierarchy_level(item.concept_id);
        let flip = comprehensive_income_sign_flipped(&label);

        let facts = ctx.consolidated_facts(item.concept_id);
        let has_values = facts.iter().any(|fact| fact.value_numeric.is_some());

        if has_values {
            for fact in facts {
                let Some(value) = &fact.value_numeric else { continue };
                if !seen.insert((item.concept_id, fact.period_id)) {
                    continue;
                }
                let value = if flip { -value.clone() } else { value.clone() };
                rows.push(NewComprehensiveIncomeFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id: fact.period_id,
                    value_numeric: Some(value),
                    unit_measure: fact.unit_measure.clone(),
                    display_order: item.display_order,
                    is_header: item.is_header,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                });
            }
        } else if item.is_header {
            for period_id in ctx.duration_periods() {
                if !seen.insert((item.concept_id, period_id)) {
                    continue;
                }
                rows.push(NewComprehensiveIncomeFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id,
                    value_numeric: None,
                    unit_measure: None,
                    display_order: item.display_order,
                    is_header: true,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                });
            }
        }
    }

    let inserted = diesel::insert_into(fact_comprehensive_income::table)
        .values(&rows)
        .execute(conn)
        .await?;
    Ok(inserted)
}

async fn materialize_cash_flow(conn: &mut AsyncPgConnection, ctx: &Context) -> AppResult<usize> {
    diesel::delete(fact_cash_flow::table.filter(fact_cash_flow::filing_id.eq(ctx.filing_id)))
        .execute(conn)
        .await?;

    let mut rows: Vec<NewCashFlowFact> = Vec::new();
    let mut seen: HashSet<(Uuid, Uuid)> = HashSet::new();

    for item in ctx
        .items
        .iter()
        .filter(|item| item.statement_type == "cash_flow")
    {
        let label = ctx.label(item.concept_id).to_string();
        let parent = ctx.validated_parent(item);
        let level = ctx.hierarchy_level(item.concept_id);

        if label == "cash_and_cash_equivalents_at_the_beginning_of_the_year" {
            // Synthesized row: value from the prior-year balance sheet
            // (or the filing's own comparative instant), NULL when
            // neither is loaded. The row always renders.
            let (value, unit, period_id) = beginning_cash(conn, ctx).await?;
            let Some(period_id) = period_id else { continue };
            if seen.insert((item.concept_id, period_id)) {
                rows.push(NewCashFlowFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id,
                    value_numeric: value,
                    unit_measure: unit.or_else(|| ctx.default_unit.clone()),
                    display_order: item.display_order,
                    is_header: false,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                });
            }
            continue;
        }

        let facts = ctx.consolidated_facts(item.concept_id);
        let has_values = facts.iter().any(|fact| fact.value_numeric.is_some());

        if has_values {
            for fact in facts {
                if fact.value_numeric.is_none() {
                    continue;
                }
                if !seen.insert((item.concept_id, fact.period_id)) {
                    continue;
                }
                rows.push(NewCashFlowFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id: fact.period_id,
                    value_numeric: fact.value_numeric.clone(),
                    unit_measure: fact.unit_measure.clone(),
                    display_order: item.display_order,
                    is_header: item.is_header,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                });
            }
        } else if item.is_header {
            for period_id in ctx.duration_periods() {
                if !seen.insert((item.concept_id, period_id)) {
                    continue;
                }
                rows.push(NewCashFlowFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id,
                    value_numeric: None,
                    unit_measure: None,
                    display_order: item.display_order,
                    is_header: true,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                });
            }
        }
    }

    let inserted = diesel::insert_into(fact_cash_flow::table)
        .values(&rows)
        .execute(conn)
        .await?;
    Ok(inserted)
}

/// The filing's principal annual duration period: the longest duration
/// with the latest end date.
fn main_duration_period(ctx: &Context) -> Option<Uuid> {
    ctx.annual_duration_periods()
        .into_iter()
        .max_by_key(|period_id| {
            let meta = &ctx.periods[period_id];
            (
                meta.end_date,
                duration_days(meta.start_date, meta.end_date).unwrap_or(0),
            )
        })
}

/// Beginning-of-year cash, in preference order: a prior filing's
/// end-of-year cash instant matching the current duration's start date,
/// else the filing's own earliest in-year cash instant. Returns
/// (value, unit, period to attach the row to).
async fn beginning_cash(
    conn: &mut AsyncPgConnection,
    ctx: &Context,
) -> AppResult<(Option<BigDecimal>, Option<String>, Option<Uuid>)> {
    let Some(main_period) = main_duration_period(ctx) else {
        return Ok((None, None, None));
    };
    let start_date = ctx.periods[&main_period].start_date;

    let cash_concept_ids: Vec<Uuid> = dim_concepts::table
        .filter(dim_concepts::normalized_label.eq_any(CASH_LABELS))
        .select(dim_concepts::id)
        .load(conn)
        .await?;
    if cash_concept_ids.is_empty() {
        return Ok((None, None, Some(main_period)));
    }

    // Strategy 1: any filing of the company with a cash instant exactly
    // at the duration start (the prior year's closing balance sheet).
    if let Some(start_date) = start_date {
        let instant_periods: Vec<Uuid> = dim_time_periods::table
            .filter(dim_time_periods::period_type.eq("instant"))
            .filter(dim_time_periods::instant_date.eq(start_date))
            .select(dim_time_periods::id)
            .load(conn)
            .await?;

        if !instant_periods.is_empty() {
            let found: Option<(Option<BigDecimal>, Option<String>)> = fact_financial_metrics::table
                .filter(fact_financial_metrics::company_id.eq(ctx.company_id))
                .filter(fact_financial_metrics::concept_id.eq_any(&cash_concept_ids))
                .filter(fact_financial_metrics::period_id.eq_any(&instant_periods))
                .filter(fact_financial_metrics::dimension_id.is_null())
                .filter(fact_financial_metrics::value_numeric.is_not_null())
                .select((
                    fact_financial_metrics::value_numeric,
                    fact_financial_metrics::unit_measure,
                ))
                .first(conn)
                .await
                .optional()?;

            if let Some((value, unit)) = found {
                return Ok((value, unit, Some(main_period)));
            }
        }
    }

    // Strategy 2: the filing embeds comparative balance sheets; use the
    // earliest in-filing cash instant.
    let cash_ids: HashSet<Uuid> = cash_concept_ids.into_iter().collect();
    let mut candidates: Vec<(chrono::NaiveDate, &FactRow)> = ctx
        .facts
        .iter()
        .filter(|fact| {
            fact.dimension_id.is_none()
                && fact.value_numeric.is_some()
                && cash_ids.contains(&fact.concept_id)
        })
        .filter_map(|fact| {
            ctx.periods
                .get(&fact.period_id)
                .and_then(|meta| meta.instant_date)
                .map(|date| (date, fact))
        })
        .collect();
    candidates.sort_by_key(|(date, _)| *date);

    if let Some((_, fact)) = candidates.as_slice().first() {
        return Ok((
            fact.value_numeric.clone(),
            fact.unit_measure.clone(),
            Some(main_period),
        ));
    }

    Ok((None, None, Some(main_period)))
}

fn is_effectively_zero(value: &BigDecimal) -> bool {
    crate::loader::to_f64(value)
        .map(|v| v.abs() <= ZERO_EPSILON)
        .unwrap_or(true)
}

async fn materialize_equity_statement(
    conn: &mut AsyncPgConnection,
    ctx: &Context,
) -> AppResult<usize> {
    diesel::delete(
        fact_equity_statement::table.filter(fact_equity_statement::filing_id.eq(ctx.filing_id)),
    )
    .execute(conn)
    .await?;

    let annual_periods: HashSet<Uuid> = ctx.annual_duration_periods().into_iter().collect();
    let mut rows: Vec<NewEquityStatementFact> = Vec::new();
    let mut seen: HashSet<(Uuid, Uuid, Option<String>)> = HashSet::new();

    for item in ctx
        .items
        .iter()
        .filter(|item| item.statement_type == "equity_statement")
    {
        let label = ctx.label(item.concept_id).to_string();
        let parent = ctx.validated_parent(item);
        let level = ctx.hierarchy_level(item.concept_id);

        if label == "balance_at_the_beginning_of_the_year_equity"
            || label == "balance_at_the_end_of_the_year_equity"
        {
            let is_beginning = label.starts_with("balance_at_the_beginning");
            for period_id in &annual_periods {
                let meta = &ctx.periods[period_id];
                let match_date = if is_beginning {
                    meta.start_date
                } else {
                    meta.end_date
                };
                for component in components_and_total() {
                    let value = equity_balance_at(conn, ctx, match_date, component).await?;
                    let key = (
                        item.concept_id,
                        *period_id,
                        component.map(|c| c.as_str().to_string()),
                    );
                    if !seen.insert(key.clone()) {
                        continue;
                    }
                    rows.push(NewEquityStatementFact {
                        filing_id: ctx.filing_id,
                        concept_id: item.concept_id,
                        period_id: *period_id,
                        value_numeric: value.clone().map(|(v, _)| v),
                        unit_measure: value
                            .map(|(_, unit)| unit)
                            .flatten()
                            .or_else(|| ctx.default_unit.clone()),
                        display_order: item.display_order,
                        is_header: false,
                        hierarchy_level: level,
                        parent_concept_id: parent,
                        equity_component: key.2,
                    });
                }
            }
            continue;
        }

        if item.is_header {
            for period_id in &annual_periods {
                if !seen.insert((item.concept_id, *period_id, None)) {
                    continue;
                }
                rows.push(NewEquityStatementFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id: *period_id,
                    value_numeric: None,
                    unit_measure: None,
                    display_order: item.display_order,
                    is_header: true,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                    equity_component: None,
                });
            }
            continue;
        }

        if CI_SOURCED_LABELS.contains(&label.as_str()) {
            // Sourced from the materialized comprehensive-income table
            // so the OCI sign corrections propagate.
            let ci_rows: Vec<(Uuid, Option<BigDecimal>, Option<String>)> =
                fact_comprehensive_income::table
                    .filter(fact_comprehensive_income::filing_id.eq(ctx.filing_id))
                    .filter(fact_comprehensive_income::concept_id.eq(item.concept_id))
                    .select((
                        fact_comprehensive_income::period_id,
                        fact_comprehensive_income::value_numeric,
                        fact_comprehensive_income::unit_measure,
                    ))
                    .load(conn)
                    .await?;

            for (period_id, value, unit) in ci_rows {
                if !annual_periods.contains(&period_id) {
                    continue;
                }
                let Some(value) = value else { continue };
                if is_effectively_zero(&value) {
                    continue;
                }
                if !seen.insert((item.concept_id, period_id, None)) {
                    continue;
                }
                let corrected = equity_sign_corrected(&label, None, &value);
                rows.push(NewEquityStatementFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id,
                    value_numeric: Some(corrected),
                    unit_measure: unit,
                    display_order: item.display_order,
                    is_header: false,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                    equity_component: None,
                });
            }
            continue;
        }

        // Movement rows: component breakdowns win over the consolidated
        // total; a zero/missing total with dimensional facts falls back
        // to the aggregated dimensional sum.
        let component_facts: Vec<(&FactRow, EquityComponent)> = ctx
            .facts
            .iter()
            .filter(|fact| fact.concept_id == item.concept_id)
            .filter_map(|fact| {
                let dimension_id = fact.dimension_id?;
                let member = ctx.equity_members.get(&dimension_id)?;
                let component = EquityComponent::from_member(member)?;
                let value = fact.value_numeric.as_ref()?;
                if is_effectively_zero(value) {
                    return None;
                }
                Some((fact, component))
            })
            .collect();

        if !component_facts.is_empty() {
            // Aggregate per (period, component)
            let mut sums: HashMap<(Uuid, EquityComponent), (BigDecimal, Option<String>)> =
                HashMap::new();
            for (fact, component) in &component_facts {
                if !annual_periods.contains(&fact.period_id) {
                    continue;
                }
                let Some(value) = fact.value_numeric.clone() else { continue };
                let entry = sums
                    .entry((fact.period_id, *component))
                    .or_insert((BigDecimal::from(0), fact.unit_measure.clone()));
                entry.0 += value;
            }

            for ((period_id, component), (value, unit)) in sums {
                let corrected = equity_sign_corrected(&label, Some(component), &value);
                let key = (
                    item.concept_id,
                    period_id,
                    Some(component.as_str().to_string()),
                );
                if !seen.insert(key.clone()) {
                    continue;
                }
                rows.push(NewEquityStatementFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id,
                    value_numeric: Some(corrected),
                    unit_measure: unit,
                    display_order: item.display_order,
                    is_header: false,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                    equity_component: key.2,
                });
            }
            continue;
        }

        let consolidated: Vec<&FactRow> = ctx
            .consolidated_facts(item.concept_id)
            .into_iter()
            .filter(|fact| annual_periods.contains(&fact.period_id))
            .collect();
        let has_nonzero_total = consolidated.iter().any(|fact| {
            fact.value_numeric
                .as_ref()
                .map(|value| !is_effectively_zero(value))
                .unwrap_or(false)
        });

        if has_nonzero_total {
            for fact in consolidated {
                let Some(value) = &fact.value_numeric else { continue };
                if is_effectively_zero(value) {
                    continue;
                }
                if !seen.insert((item.concept_id, fact.period_id, None)) {
                    continue;
                }
                let corrected = equity_sign_corrected(&label, None, value);
                rows.push(NewEquityStatementFact {
                    filing_id: ctx.filing_id,
                    concept_id: item.concept_id,
                    period_id: fact.period_id,
                    value_numeric: Some(corrected),
                    unit_measure: fact.unit_measure.clone(),
                    display_order: item.display_order,
                    is_header: false,
                    hierarchy_level: level,
                    parent_concept_id: parent,
                    equity_component: None,
                });
            }
            continue;
        }

        // Consolidated total zero or absent: aggregate non-equity-axis
        // dimensional facts into a total row.
        let mut sums: HashMap<Uuid, (BigDecimal, Option<String>)> = HashMap::new();
        for fact in ctx.facts.iter().filter(|fact| {
            fact.concept_id == item.concept_id
                && fact.dimension_id.is_some()
                && fact
                    .dimension_id
                    .map(|id| !ctx.equity_members.contains_key(&id))
                    .unwrap_or(false)
        }) {
            if !annual_periods.contains(&fact.period_id) {
                continue;
            }
            let Some(value) = &fact.value_numeric else { continue };
            if is_effectively_zero(value) {
                continue;
            }
            let entry = sums
                .entry(fact.period_id)
                .or_insert((BigDecimal::from(0), fact.unit_measure.clone()));
            entry.0 += value;
        }

        for (period_id, (value, unit)) in sums {
            if is_effectively_zero(&value) {
                continue;
            }
            if !seen.insert((item.concept_id, period_id, None)) {
                continue;
            }
            let corrected = equity_sign_corrected(&label, None, &value);
            rows.push(NewEquityStatementFact {
                filing_id: ctx.filing_id,
                concept_id: item.concept_id,
                period_id,
                value_numeric: Some(corrected),
                unit_measure: unit,
                display_order: item.display_order,
                is_header: false,
                hierarchy_level: level,
                parent_concept_id: parent,
                equity_component: None,
            });
        }
    }

    let inserted = diesel::insert_into(fact_equity_statement::table)
        .values(&rows)
        .execute(conn)
        .await?;
    Ok(inserted)
}

fn components_and_total() -> [Option<EquityComponent>; 5] {
    [
        Some(EquityComponent::ShareCapital),
        Some(EquityComponent::TreasuryShares),
        Some(EquityComponent::RetainedEarnings),
        Some(EquityComponent::OtherReserves),
        None,
    ]
}

/// Balance-sheet equity value at an instant date, by component.
///
/// The total column matches consolidated `equity_total`/`total_equity`
/// facts; component columns match facts carrying the matching
/// `ComponentsOfEquityAxis` member. Searches every loaded filing of the
/// company, so prior-year balances resolve when the prior filing is in
/// the warehouse. Returns None when the date is unavailable, which is
/// expected for a company's earliest filing.
async fn equity_balance_at(
    conn: &mut AsyncPgConnection,
    ctx: &Context,
    match_date: Option<chrono::NaiveDate>,
    component: Option<EquityComponent>,
) -> AppResult<Option<(BigDecimal, Option<String>)>> {
    let Some(match_date) = match_date else {
        return Ok(None);
    };

    let instant_periods: Vec<Uuid> = dim_time_periods::table
        .filter(dim_time_periods::period_type.eq("instant"))
        .filter(dim_time_periods::instant_date.eq(match_date))
        .select(dim_time_periods::id)
        .load(conn)
        .await?;
    if instant_periods.is_empty() {
        return Ok(None);
    }

    let labels: Vec<&str> = match component {
        None => vec!["equity_total", "total_equity"],
        Some(EquityComponent::ShareCapital) => vec!["share_capital", "equity_total"],
        Some(EquityComponent::TreasuryShares) => vec!["treasury_shares", "equity_total"],
        Some(EquityComponent::RetainedEarnings) => vec!["retained_earnings", "equity_total"],
        Some(EquityComponent::OtherReserves) => vec!["other_reserves", "equity_total"],
    };
    let concept_ids: Vec<Uuid> = dim_concepts::table
        .filter(dim_concepts::normalized_label.eq_any(&labels))
        .select(dim_concepts::id)
        .load(conn)
        .await?;
    if concept_ids.is_empty() {
        return Ok(None);
    }

    let candidates: Vec<(Option<Uuid>, Option<BigDecimal>, Option<String>)> =
        fact_financial_metrics::table
            .filter(fact_financial_metrics::company_id.eq(ctx.company_id))
            .filter(fact_financial_metrics::concept_id.eq_any(&concept_ids))
            .filter(fact_financial_metrics::period_id.eq_any(&instant_periods))
            .filter(fact_financial_metrics::value_numeric.is_not_null())
            .select((
                fact_financial_metrics::dimension_id,
                fact_financial_metrics::value_numeric,
                fact_financial_metrics::unit_measure,
            ))
            .load(conn)
            .await?;

    let member_for: HashMap<Uuid, String> = {
        let dimension_ids: Vec<Uuid> = candidates
            .iter()
            .filter_map(|(dimension_id, _, _)| *dimension_id)
            .collect();
        if dimension_ids.is_empty() {
            HashMap::new()
        } else {
            dim_xbrl_dimensions::table
                .filter(dim_xbrl_dimensions::id.eq_any(&dimension_ids))
                .select((dim_xbrl_dimensions::id, dim_xbrl_dimensions::dimension_json))
                .load::<(Uuid, serde_json::Value)>(conn)
                .await?
                .into_iter()
                .filter_map(|(id, json)| {
                    json.get(EQUITY_AXIS)
                        .and_then(|details| details.get("member"))
                        .and_then(|member| member.as_str())
                        .map(|member| (id, member.to_string()))
                })
                .collect()
        }
    };

    for (dimension_id, value, unit) in candidates {
        let Some(value) = value else { continue };
        let matches = match component {
            None => dimension_id.is_none(),
            Some(component) => dimension_id
                .and_then(|id| member_for.get(&id))
                .and_then(|member| EquityComponent::from_member(member))
                .map(|found| found == component)
                .unwrap_or(false),
        };
        if matches {
            return Ok(Some((value, unit)));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::FromPrimitive;

    fn decimal(value: f64) -> BigDecimal {
        BigDecimal::from_f64(value).unwrap()
    }

    #[test]
    fn reclassification_before_tax_flips_sign() {
        // REQUIREMENT: Before-tax hedge reclassifications and tax-on-OCI
        // rows reverse sign in the comprehensive-income table
        // PURPOSE: Verify the flip patterns and that others keep their sign
        assert!(comprehensive_income_sign_flipped(
            "reclassification_adjustments_on_cash_flow_hedges_before_tax"
        ));
        // After-tax reclassifications keep their reported sign
        assert!(!comprehensive_income_sign_flipped(
            "reclassification_adjustments_on_cash_flow_hedges_after_tax"
        ));
        assert!(comprehensive_income_sign_flipped(
            "income_tax_relating_to_components_of_other_comprehensive_income"
        ));
        assert!(!comprehensive_income_sign_flipped("oci_total"));
    }

    #[test]
    fn income_statement_excludes_oci_and_cash_rows() {
        // REQUIREMENT: OCI and cash-flow content never renders in the
        // income statement
        // PURPOSE: Verify the label exclusion list and its pass-throughs
        assert!(excluded_from_income_statement("oci_total"));
        assert!(excluded_from_income_statement(
            "remeasurements_of_defined_benefit_plans"
        ));
        assert!(excluded_from_income_statement(
            "increase_decrease_in_cash_and_cash_equivalents"
        ));
        assert!(!excluded_from_income_statement("revenue"));
        assert!(!excluded_from_income_statement("net_income"));
    }

    #[test]
    fn equity_outflows_are_negative() {
        // REQUIREMENT: Outflows from equity present as negative movements
        // PURPOSE: Verify dividends, treasury purchases, and hedge-reserve
        // transfers force a negative sign
        let value = decimal(1500.0);
        assert_eq!(
            equity_sign_corrected("dividends_paid", None, &value),
            decimal(-1500.0)
        );
        assert_eq!(
            equity_sign_corrected("purchase_of_treasury_shares", None, &value),
            decimal(-1500.0)
        );
        assert_eq!(
            equity_sign_corrected(
                "amount_removed_from_reserve_of_cash_flow_hedges",
                None,
                &value
            ),
            decimal(-1500.0)
        );
    }

    #[test]
    fn total_comprehensive_income_is_forced_positive() {
        // REQUIREMENT: Total comprehensive income is defined positive
        // PURPOSE: Verify the absolute-value rule on the equity row
        assert_eq!(
            equity_sign_corrected("total_comprehensive_income", None, &decimal(-99087.0)),
            decimal(99087.0)
        );
    }

    #[test]
    fn capital_reduction_component_signs() {
        // REQUIREMENT: A capital reduction is positive in the treasury-shares
        // column and negative everywhere else
        // PURPOSE: Verify the component-specific sign exception
        let value = decimal(500.0);
        // Treasury shares column: a reduction shrinks a negative balance
        assert_eq!(
            equity_sign_corrected(
                "reduction_of_issued_capital",
                Some(EquityComponent::TreasuryShares),
                &value
            ),
            decimal(500.0)
        );
        assert_eq!(
            equity_sign_corrected(
                "reduction_of_issued_capital",
                Some(EquityComponent::ShareCapital),
                &value
            ),
            decimal(-500.0)
        );
        assert_eq!(
            equity_sign_corrected("reduction_of_issued_capital", None, &value),
            decimal(-500.0)
        );
    }

    #[test]
    fn tax_on_sharebased_payment_reverses_sign() {
        // REQUIREMENT: Tax on share-based payments carries the opposite sign
        // PURPOSE: Verify the reversal in both directions, not an abs()
        assert_eq!(
            equity_sign_corrected("decrease_increase_through_tax_on_sharebased_payment", None, &decimal(-120.0)),
            decimal(120.0)
        );
        assert_eq!(
            equity_sign_corrected("decrease_increase_through_tax_on_sharebased_payment", None, &decimal(80.0)),
            decimal(-80.0)
        );
    }

    #[test]
    fn share_based_payments_keep_reported_sign() {
        // REQUIREMENT: Share-based payment movements keep their reported sign
        // PURPOSE: Verify the sign corrector leaves them untouched
        assert_eq!(
            equity_sign_corrected(
                "increase_decrease_through_sharebased_payment_transactions",
                None,
                &decimal(450.0)
            ),
            decimal(450.0)
        );
    }

    #[test]
    fn annual_duration_filter() {
        // REQUIREMENT: The equity statement keeps only annual durations
        // PURPOSE: Verify quarterly, stub, and instant periods are filtered
        let annual = PeriodMeta {
            period_type: "duration".to_string(),
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: chrono::NaiveDate::from_ymd_opt(2024, 12, 31),
            instant_date: None,
            fiscal_quarter: None,
        };
        assert!(annual.is_annual_duration());

        let quarterly = PeriodMeta {
            fiscal_quarter: Some(2),
            ..annual.clone()
        };
        assert!(!quarterly.is_annual_duration());

        let stub = PeriodMeta {
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15),
            fiscal_quarter: None,
            ..annual.clone()
        };
        assert!(!stub.is_annual_duration());

        let instant = PeriodMeta {
            period_type: "instant".to_string(),
            ..annual.clone()
        };
        assert!(!instant.is_annual_duration());
    }
}
