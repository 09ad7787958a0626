//! Statement organizer: builds `rel_statement_items` for a filing.
//!
//! Decides which concepts are main statement rows (role-URI driven),
//! which statement they belong to (with OCI re-routing), their display
//! order, header flags, and the balance-sheet side; then synthesizes the
//! section headers and calculated rows the statements need. Items are
//! rebuilt per filing: delete then insert.

use std::collections::{HashMap, HashSet};

use bigdecimal::BigDecimal;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::info;
use uuid::Uuid;

use finstmt_core::database::DatabasePool;
use finstmt_core::enums::BalanceSheetSide;
use finstmt_core::error::AppResult;
use finstmt_core::models::NewStatementItem;
use finstmt_core::schema::{
    dim_concepts, fact_financial_metrics, rel_presentation_hierarchy, rel_statement_items,
};

use crate::ordering::{self, STANDARD_TEMPLATE_OFFSET};

/// Core income-statement rows that stay in the income statement even
/// when a combined role reports them alongside comprehensive income.
pub static CORE_INCOME_STATEMENT_LABELS: &[&str] = &[
    "revenue",
    "sales",
    "cost_of_sales",
    "gross_profit",
    "operating_income",
    "operating_profit",
    "income_before_tax",
    "net_income",
    "net_income_including_noncontrolling_interest",
    "net_profit",
    "basic_earnings_loss_per_share",
    "diluted_earnings_loss_per_share",
    "selling_expense_and_distribution_costs",
    "research_development",
    "administrative_expense",
    "finance_income",
    "finance_costs",
    "income_tax_expense_continuing_operations",
    "other_operating_income_expense",
];

const DETAIL_PATTERNS: &[&str] = &[
    "detail",
    "disclosure",
    "reconciliation",
    "breakdown",
    "note",
    "table",
    "policy",
];

/// Is this presentation row a main statement item (vs detail/disclosure)?
///
/// Standard-template rows are always main items. For XBRL rows the role
/// URI must match the statement family and carry no detail markers.
pub fn is_main_statement_item(
    role_uri: Option<&str>,
    source: &str,
    statement_type: &str,
    normalized_label: Option<&str>,
) -> bool {
    if source == "standard" {
        return true;
    }

    // Comprehensive income accepts NULL role URIs: rows routed here from
    // other statements arrive without one.
    let uri = match role_uri {
        Some(uri) if !uri.is_empty() => uri.to_lowercase(),
        _ => return statement_type == "comprehensive_income",
    };

    match statement_type {
        "income_statement" => {
            if !(uri.contains("incomestatement") || uri.contains("statementofcomprehensiveincome"))
            {
                return false;
            }
            if uri.contains("balancesheet") || (uri.contains("balance") && uri.contains("sheet")) {
                return false;
            }
            if uri.contains("cashflow") || uri.contains("equity") {
                return false;
            }
            if DETAIL_PATTERNS.iter().any(|p| uri.contains(p)) {
                return false;
            }
            if uri.contains("/segment") || uri.contains("segmentinformation") {
                return false;
            }

            if uri.contains("incomestatementandstatementofcomprehensiveincome") {
                // Sub-paths under the combined role indicate detail views
                return !uri.contains("/role/incomestatementandstatementofcomprehensiveincome/");
            }
            if uri.contains("/role/incomestatement") || uri.contains("/role/statementofcomprehensiveincome")
            {
                return !(uri.contains("/role/incomestatement/")
                    || uri.contains("/role/statementofcomprehensiveincome/"));
            }
            false
        }
        "balance_sheet" => {
            if !(uri.contains("balancesheet")
                || (uri.contains("balance") && uri.contains("sheet"))
                || uri.contains("statementoffinancialposition"))
            {
                return false;
            }
            if uri.contains("cashflow") {
                return false;
            }
            !(uri.contains("detail") || uri.contains("disclosure"))
        }
        "cash_flow" => {
            if !(uri.contains("cashflow") || uri.contains("statementofcashflows")) {
                return false;
            }
            !(uri.contains("detail") || uri.contains("disclosure"))
        }
        "comprehensive_income" => !(uri.contains("detail") || uri.contains("disclosure")),
        "equity_statement" => {
            if !(uri.contains("equitystatement")
                || uri.contains("statementofchangesinequity")
                || uri.contains("changesinequity"))
            {
                return false;
            }
            if uri.contains("detail") || uri.contains("disclosure") {
                return false;
            }
            // Total equity is a balance-sheet resident, not a movement
            if let Some(label) = normalized_label {
                let label = label.to_lowercase();
                if label.contains("equity_total") || label == "total_equity" {
                    return false;
                }
            }
            true
        }
        _ => false,
    }
}

/// Re-route concepts flagged as comprehensive-income content by their
/// role URI, unless they are core income-statement rows.
pub fn reroute_statement_type(
    statement_type: &str,
    role_uri: Option<&str>,
    normalized_label: Option<&str>,
) -> String {
    let uri = role_uri.unwrap_or("").to_lowercase();

    let is_explicit_oci_role = uri.contains("statementofcomprehensiveincome")
        && match uri.rsplit_once("incomestatementandstatement") {
            Some((_, tail)) => tail.contains("statementofcomprehensiveincome"),
            None => true,
        };
    let is_equity_statement_oci = uri.contains("equitystatement") && uri.contains("comprehensive");

    if (is_explicit_oci_role || is_equity_statement_oci)
        && matches!(statement_type, "income_statement" | "other" | "cash_flow")
    {
        let label = normalized_label.unwrap_or("").to_lowercase();
        if !CORE_INCOME_STATEMENT_LABELS.contains(&label.as_str()) {
            return "comprehensive_income".to_string();
        }
    }

    statement_type.to_string()
}

/// Role preference when the same concept appears in several roles.
/// Lower is better.
pub fn role_priority(statement_type: &str, role_uri: Option<&str>) -> i32 {
    let uri = match role_uri {
        Some(uri) => uri.to_lowercase(),
        None => return 7,
    };
    let clean = !uri.contains("segment") && !uri.contains("detail") && !uri.contains("disclosure");

    if statement_type == "income_statement" && uri.contains("incomestatementandstatement") && clean
    {
        return 1;
    }
    if statement_type == "income_statement" && uri.contains("incomestatement") && clean {
        return 2;
    }
    if uri.contains("statementofcomprehensiveincome") {
        return 3;
    }
    if uri.contains("incomestatementandstatement") {
        return 4;
    }
    if clean {
        return 5;
    }
    6
}

/// Balance-sheet side from concept naming. Returns None for concepts
/// that belong to neither side; those are not main balance-sheet rows.
pub fn balance_sheet_side(normalized_label: &str, concept_name: &str) -> Option<BalanceSheetSide> {
    let label = normalized_label.to_lowercase();
    let concept = concept_name.to_lowercase();
    let combined = format!("{} {}", label, concept);

    const ASSET_PATTERNS: &[&str] = &[
        "asset", "receivable", "inventor", "prepayment", "cash", "bank", "securit",
        "investment", "equipment", "plant", "property", "intangible", "goodwill",
        "deferred_tax_asset", "current_tax_asset", "derivative_financial_asset",
        "financial_asset", "marketable_security",
    ];
    const LIABILITY_PATTERNS: &[&str] = &[
        "liabilit", "payable", "borrowing", "debt", "deferred_tax_liability",
        "current_tax_liability", "provision", "obligation", "derivative_financial_liability",
        "financial_liability",
    ];
    const EQUITY_PATTERNS: &[&str] = &[
        "equity", "share_capital", "issued_capital", "treasury_share", "retained_earnings",
        "reserve", "stockholders_equity", "equity_attributable", "noncontrolling_interest",
    ];

    // Investments in associates are assets despite the equity-method name
    if combined.contains("investment") && combined.contains("associate") {
        return Some(BalanceSheetSide::Assets);
    }

    if ASSET_PATTERNS.iter().any(|p| combined.contains(p))
        && !combined.contains("liabilit")
        && !combined.contains("equity")
        && !combined.contains("payable")
    {
        return Some(BalanceSheetSide::Assets);
    }

    if LIABILITY_PATTERNS.iter().any(|p| combined.contains(p))
        || EQUITY_PATTERNS.iter().any(|p| combined.contains(p))
    {
        return Some(BalanceSheetSide::LiabilitiesEquity);
    }

    if label.contains("total_assets") || label.contains("assets_total") {
        return Some(BalanceSheetSide::Assets);
    }
    if label.contains("total_liabilities")
        || label.contains("liabilities_total")
        || label.contains("equity_and_liabilities")
        || label.contains("liabilities_and_stockholders_equity")
        || label.contains("total_equity")
        || label.contains("equity_total")
    {
        return Some(BalanceSheetSide::LiabilitiesEquity);
    }

    None
}

#[derive(Debug, Clone)]
struct ItemDraft {
    concept_id: Uuid,
    statement_type: String,
    display_order: i32,
    is_header: bool,
    role_uri: Option<String>,
    source: String,
    side: Option<String>,
    normalized_label: Option<String>,
}

/// Populate `rel_statement_items` for one filing. Returns the item count.
pub async fn populate_statement_items(pool: &DatabasePool, filing_id: Uuid) -> AppResult<usize> {
    let mut conn = pool.get().await?;

    // Presentation rows with a usable order
    let arcs: Vec<(Option<Uuid>, Uuid, String, Option<i32>, Option<String>, String)> =
        rel_presentation_hierarchy::table
            .filter(rel_presentation_hierarchy::filing_id.eq(filing_id))
            .filter(rel_presentation_hierarchy::order_index.is_not_null())
            .select((
                rel_presentation_hierarchy::parent_concept_id,
                rel_presentation_hierarchy::child_concept_id,
                rel_presentation_hierarchy::statement_type,
                rel_presentation_hierarchy::order_index,
                rel_presentation_hierarchy::role_uri,
                rel_presentation_hierarchy::source,
            ))
            .load(&mut conn)
            .await?;

    let concept_ids: Vec<Uuid> = arcs.iter().map(|(_, child, ..)| *child).collect();
    let concept_meta: HashMap<Uuid, (String, Option<String>)> = dim_concepts::table
        .filter(dim_concepts::id.eq_any(&concept_ids))
        .select((
            dim_concepts::id,
            dim_concepts::concept_name,
            dim_concepts::normalized_label,
        ))
        .load::<(Uuid, String, Option<String>)>(&mut conn)
        .await?
        .into_iter()
        .map(|(id, name, label)| (id, (name, label)))
        .collect();

    // Headers: parents in the filing's presentation tree with no
    // consolidated numeric fact.
    let parents_with_children: HashSet<Uuid> =
        arcs.iter().filter_map(|(parent, ..)| *parent).collect();
    let concepts_with_values: HashSet<Uuid> = fact_financial_metrics::table
        .filter(fact_financial_metrics::filing_id.eq(filing_id))
        .filter(fact_financial_metrics::dimension_id.is_null())
        .filter(fact_financial_metrics::value_numeric.is_not_null())
        .select(fact_financial_metrics::concept_id)
        .distinct()
        .load::<Uuid>(&mut conn)
        .await?
        .into_iter()
        .collect();

    // Statements already covered by XBRL presentation; template rows for
    // those statements are suppressed.
    let xbrl_statements: HashSet<String> = arcs
        .iter()
        .filter(|(_, _, _, _, _, source)| source.as_str() == "xbrl")
        .map(|(_, _, statement, _, _, _)| statement.clone())
        .collect();

    // Pick the best role per (concept, statement): role priority first,
    // then order. In combined roles the income-statement half appears
    // later, so the income statement prefers the higher raw order.
    let mut best: HashMap<(Uuid, String), (i32, i32, Option<String>, String, i32)> = HashMap::new();
    for (_, child, statement, order_index, role_uri, source) in &arcs {
        let order = order_index.unwrap_or(0);
        let priority = role_priority(statement, role_uri.as_deref());
        let tie_break = if statement.as_str() == "income_statement" {
            -order
        } else {
            order
        };

        let key = (*child, statement.clone());
        let better = match best.get(&key) {
            Some((existing_priority, existing_tie, ..)) => {
                (priority, tie_break) < (*existing_priority, *existing_tie)
            }
            None => true,
        };
        if better {
            best.insert(key, (priority, tie_break, role_uri.clone(), source.clone(), order));
        }
    }

    let mut items: Vec<ItemDraft> = Vec::new();
    for ((concept_id, raw_statement), (_, _, role_uri, source, order)) in &best {
        if source.as_str() == "standard" && xbrl_statements.contains(raw_statement) {
            continue;
        }

        let (concept_name, normalized_label) = concept_meta
            .get(concept_id)
            .cloned()
            .unwrap_or((String::new(), None));

        let statement = reroute_statement_type(
            raw_statement,
            role_uri.as_deref(),
            normalized_label.as_deref(),
        );

        if !is_main_statement_item(
            role_uri.as_deref(),
            source,
            &statement,
            normalized_label.as_deref(),
        ) {
            continue;
        }

        if source.as_str() == "standard" {
            if let Some(uri) = role_uri {
                let uri = uri.to_lowercase();
                if ["detail", "disclosure", "reconciliation", "note", "schedule"]
                    .iter()
                    .any(|p| uri.contains(p))
                {
                    continue;
                }
            }
        }

        let display_order = if source.as_str() == "xbrl" {
            ordering::display_order(
                *order,
                normalized_label.as_deref().unwrap_or(""),
                &statement,
            )
        } else {
            STANDARD_TEMPLATE_OFFSET + order
        };

        let is_header = parents_with_children.contains(concept_id)
            && !concepts_with_values.contains(concept_id);

        let side = if statement == "balance_sheet" {
            balance_sheet_side(normalized_label.as_deref().unwrap_or(""), &concept_name)
                .map(|side| side.as_str().to_string())
        } else {
            None
        };

        items.push(ItemDraft {
            concept_id: *concept_id,
            statement_type: statement,
            display_order,
            is_header,
            role_uri: role_uri.clone(),
            source: source.clone(),
            side,
            normalized_label,
        });
    }

    add_synthetic_rows(&mut conn, &mut items).await?;

    // Deduplicate per (concept, statement)
    let mut seen: HashSet<(Uuid, String)> = HashSet::new();
    items.retain(|item| seen.insert((item.concept_id, item.statement_type.clone())));

    // Rebuild: delete-and-insert per filing
    diesel::delete(rel_statement_items::table.filter(rel_statement_items::filing_id.eq(filing_id)))
        .execute(&mut conn)
        .await?;

    let rows: Vec<NewStatementItem> = items
        .iter()
        .map(|item| NewStatementItem {
            filing_id,
            concept_id: item.concept_id,
            statement_type: item.statement_type.clone(),
            display_order: item.display_order,
            is_header: item.is_header,
            is_main_item: true,
            role_uri: item.role_uri.clone(),
            source: item.source.clone(),
            side: item.side.clone(),
        })
        .collect();

    let inserted = diesel::insert_into(rel_statement_items::table)
        .values(&rows)
        .execute(&mut conn)
        .await?;

    info!("Populated {} statement items for filing {}", inserted, filing_id);
    Ok(inserted)
}

/// All the synthetic rows: statement headers, the comprehensive-income
/// net-profit reference, and the calculated beginning/ending rows.
async fn add_synthetic_rows(
    conn: &mut AsyncPgConnection,
    items: &mut Vec<ItemDraft>,
) -> AppResult<()> {
    let has_in = |items: &[ItemDraft], statement: &str| -> bool {
        items.iter().any(|item| item.statement_type == statement)
    };
    let labels_in = |items: &[ItemDraft], statement: &str| -> Vec<String> {
        items
            .iter()
            .filter(|item| item.statement_type == statement)
            .filter_map(|item| item.normalized_label.clone())
            .map(|label| label.to_lowercase())
            .collect()
    };

    // Comprehensive income starts with net profit, referencing the
    // income statement's concept.
    if has_in(items, "comprehensive_income") {
        let net_income: Option<Uuid> = dim_concepts::table
            .filter(dim_concepts::normalized_label.eq("net_income_including_noncontrolling_interest"))
            .select(dim_concepts::id)
            .first(conn)
            .await
            .optional()?;
        if let Some(concept_id) = net_income {
            items.push(ItemDraft {
                concept_id,
                statement_type: "comprehensive_income".to_string(),
                display_order: 0,
                is_header: false,
                role_uri: None,
                source: "xbrl".to_string(),
                side: None,
                normalized_label: Some("net_income_including_noncontrolling_interest".to_string()),
            });
        }
    }

    // Earnings per share header, when the income statement has EPS rows
    let has_eps = labels_in(items, "income_statement")
        .iter()
        .any(|label| label.contains("earnings") && label.contains("share"));
    if has_eps {
        let concept_id = get_or_create_synthetic_concept(
            conn,
            "EarningsPerShareHeader",
            "earnings_per_share_header",
            "Earnings per share",
            "income_statement",
        )
        .await?;
        items.push(header_draft(concept_id, "income_statement", 14, "earnings_per_share_header"));
    }

    // Other comprehensive income header, above the first OCI row
    let has_oci_items = items.iter().any(|item| {
        item.statement_type == "comprehensive_income" && item.display_order > 0
    });
    if has_oci_items {
        let concept_id = get_or_create_synthetic_concept(
            conn,
            "OtherComprehensiveIncomeHeader",
            "other_comprehensive_income_header",
            "Other comprehensive income",
            "comprehensive_income",
        )
        .await?;
        items.push(header_draft(
            concept_id,
            "comprehensive_income",
            1,
            "other_comprehensive_income_header",
        ));
    }

    // Cash flow hedges header, above the hedge rows
    let has_hedge_items = labels_in(items, "comprehensive_income").iter().any(|label| {
        label.contains("cash_flow_hedge")
            || label.contains("reclassification_adjustments_on_cash_flow_hedges")
    });
    if has_hedge_items {
        let concept_id = get_or_create_synthetic_concept(
            conn,
            "CashFlowHedgesHeader",
            "cash_flow_hedges_header",
            "Cash flow hedges",
            "comprehensive_income",
        )
        .await?;
        items.push(header_draft(concept_id, "comprehensive_income", 4, "cash_flow_hedges_header"));
    }

    // Balance sheet side headers
    let has_assets = items.iter().any(|item| {
        item.statement_type == "balance_sheet" && item.side.as_deref() == Some("assets")
    });
    if has_assets {
        let concept_id = get_or_create_synthetic_concept(
            conn,
            "AssetsHeader",
            "assets_header",
            "Assets",
            "balance_sheet",
        )
        .await?;
        let mut draft = header_draft(concept_id, "balance_sheet", 0, "assets_header");
        draft.side = Some("assets".to_string());
        items.push(draft);
    }

    let liabilities_orders: Vec<i32> = items
        .iter()
        .filter(|item| {
            item.statement_type == "balance_sheet"
                && item.side.as_deref() == Some("liabilities_equity")
        })
        .map(|item| item.display_order)
        .collect();
    if !liabilities_orders.is_empty() {
        let min_order = liabilities_orders.iter().min().copied().unwrap_or(1);
        let concept_id = get_or_create_synthetic_concept(
            conn,
            "EquityAndLiabilitiesHeader",
            "equity_and_liabilities_header",
            "Equity and liabilities",
            "balance_sheet",
        )
        .await?;
        let mut draft = header_draft(
            concept_id,
            "balance_sheet",
            min_order - 1,
            "equity_and_liabilities_header",
        );
        draft.side = Some("liabilities_equity".to_string());
        items.push(draft);
    }

    // Cash flow: non-cash adjustments header and the calculated
    // beginning-of-year cash row (valued at materialization time).
    let cash_flow_labels = labels_in(items, "cash_flow");
    let has_adjustments = cash_flow_labels.iter().any(|label| {
        label.contains("adjustment") || label.contains("depreciation") || label.contains("working_capital")
    });
    if has_adjustments {
        let concept_id = get_or_create_synthetic_concept(
            conn,
            "AdjustmentOfNonCashItemsHeader",
            "adjustment_of_non_cash_items_header",
            "Adjustment of non-cash items",
            "cash_flow",
        )
        .await?;
        items.push(header_draft(concept_id, "cash_flow", 1, "adjustment_of_non_cash_items_header"));
    }

    if has_in(items, "cash_flow") {
        let concept_id = get_or_create_synthetic_concept(
            conn,
            "CashAndCashEquivalentsAtTheBeginningOfTheYear",
            "cash_and_cash_equivalents_at_the_beginning_of_the_year",
            "Cash and cash equivalents at the beginning of the year",
            "cash_flow",
        )
        .await?;
        items.push(ItemDraft {
            concept_id,
            statement_type: "cash_flow".to_string(),
            display_order: 24,
            is_header: false,
            role_uri: None,
            source: "calculated".to_string(),
            side: None,
            normalized_label: Some(
                "cash_and_cash_equivalents_at_the_beginning_of_the_year".to_string(),
            ),
        });
    }

    // Equity statement: owners-transaction header and the calculated
    // beginning/ending balances.
    let equity_labels = labels_in(items, "equity_statement");
    let has_transactions = items.iter().any(|item| {
        item.statement_type == "equity_statement" && item.display_order >= 6
    }) && equity_labels.iter().any(|label| {
        label.contains("dividend")
            || label.contains("sharebased")
            || label.contains("treasury")
            || label.contains("reduction")
    });
    if has_transactions {
        let concept_id = get_or_create_synthetic_concept(
            conn,
            "TransactionsWithOwnersHeader",
            "transactions_with_owners_header",
            "Transactions with owners",
            "equity_statement",
        )
        .await?;
        items.push(header_draft(concept_id, "equity_statement", 5, "transactions_with_owners_header"));
    }

    if has_in(items, "equity_statement") {
        let beginning = get_or_create_synthetic_concept(
            conn,
            "BalanceAtBeginningOfYearEquity",
            "balance_at_the_beginning_of_the_year_equity",
            "Balance at the beginning of the year",
            "equity_statement",
        )
        .await?;
        items.push(ItemDraft {
            concept_id: beginning,
            statement_type: "equity_statement".to_string(),
            display_order: 0,
            is_header: false,
            role_uri: None,
            source: "calculated".to_string(),
            side: None,
            normalized_label: Some("balance_at_the_beginning_of_the_year_equity".to_string()),
        });

        let ending = get_or_create_synthetic_concept(
            conn,
            "BalanceAtEndOfYearEquity",
            "balance_at_the_end_of_the_year_equity",
            "Balance at the end of the year",
            "equity_statement",
        )
        .await?;
        items.push(ItemDraft {
            concept_id: ending,
            statement_type: "equity_statement".to_string(),
            display_order: 11,
            is_header: false,
            role_uri: None,
            source: "calculated".to_string(),
            side: None,
            normalized_label: Some("balance_at_the_end_of_the_year_equity".to_string()),
        });
    }

    Ok(())
}

fn header_draft(concept_id: Uuid, statement_type: &str, display_order: i32, label: &str) -> ItemDraft {
    ItemDraft {
        concept_id,
        statement_type: statement_type.to_string(),
        display_order,
        is_header: true,
        role_uri: None,
        source: "xbrl".to_string(),
        side: None,
        normalized_label: Some(label.to_string()),
    }
}

/// Find or create a pipeline-owned concept (synthetic headers and
/// calculated rows), keyed by its normalized label.
async fn get_or_create_synthetic_concept(
    conn: &mut AsyncPgConnection,
    concept_name: &str,
    normalized_label: &str,
    preferred_label: &str,
    statement_type: &str,
) -> AppResult<Uuid> {
    let existing: Option<Uuid> = dim_concepts::table
        .filter(dim_concepts::normalized_label.eq(normalized_label))
        .select(dim_concepts::id)
        .first(conn)
        .await
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let is_header = normalized_label.ends_with("_header");
    let id = diesel::insert_into(dim_concepts::table)
        .values((
            dim_concepts::taxonomy.eq("synthetic"),
            dim_concepts::concept_name.eq(concept_name),
            dim_concepts::normalized_label.eq(normalized_label),
            dim_concepts::preferred_label.eq(preferred_label),
            dim_concepts::concept_type.eq(if is_header { "string" } else { "monetary" }),
            dim_concepts::period_type.eq(if is_header { "duration" } else { "instant" }),
            dim_concepts::data_type.eq(if is_header {
                "string"
            } else {
                "xbrli:monetaryItemType"
            }),
            dim_concepts::is_abstract.eq(is_header),
            dim_concepts::statement_type.eq(statement_type),
        ))
        .returning(dim_concepts::id)
        .get_result(conn)
        .await?;

    Ok(id)
}

/// Does any consolidated numeric fact exist for a concept in a filing?
/// (Exposed for the materializer's header handling.)
pub async fn has_consolidated_fact(
    conn: &mut AsyncPgConnection,
    filing_id: Uuid,
    concept_id: Uuid,
) -> AppResult<bool> {
    let value: Option<Option<BigDecimal>> = fact_financial_metrics::table
        .filter(fact_financial_metrics::filing_id.eq(filing_id))
        .filter(fact_financial_metrics::concept_id.eq(concept_id))
        .filter(fact_financial_metrics::dimension_id.is_null())
        .select(fact_financial_metrics::value_numeric)
        .first(conn)
        .await
        .optional()?;
    Ok(matches!(value, Some(Some(_))))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOVO_IS_ROLE: &str =
        "http://novonordisk.com/role/IncomestatementandStatementofcomprehensiveincome";
    const NOVO_BS_ROLE: &str = "http://novonordisk.com/role/Balancesheet";
    const NOVO_CF_ROLE: &str = "http://novonordisk.com/role/Cashflowstatement";
    const NOVO_EQ_ROLE: &str = "http://novonordisk.com/role/Statementofchangesinequity";

    #[test]
    fn combined_income_role_is_main() {
        // REQUIREMENT: Combined income/comprehensive roles are main statements
        // PURPOSE: Verify the IFRS combined-role pattern passes selection
        assert!(is_main_statement_item(
            Some(NOVO_IS_ROLE),
            "xbrl",
            "income_statement",
            Some("revenue")
        ));
    }

    #[test]
    fn segment_and_detail_roles_are_excluded() {
        // REQUIREMENT: Detail, disclosure, and segment roles never produce
        // main statement rows
        // PURPOSE: Verify the exclusion patterns fire for both statements
        assert!(!is_main_statement_item(
            Some("http://example.com/role/SegmentInformationDetails"),
            "xbrl",
            "income_statement",
            None
        ));
        assert!(!is_main_statement_item(
            Some("http://example.com/role/BalancesheetDetails"),
            "xbrl",
            "balance_sheet",
            None
        ));
    }

    #[test]
    fn null_role_only_allowed_for_comprehensive_income() {
        // REQUIREMENT: Rows routed into comprehensive income arrive without
        // a role URI; everything else needs one
        // PURPOSE: Verify the NULL-role carve-out is statement-specific
        assert!(is_main_statement_item(None, "xbrl", "comprehensive_income", None));
        assert!(!is_main_statement_item(None, "xbrl", "income_statement", None));
        assert!(!is_main_statement_item(None, "xbrl", "balance_sheet", None));
    }

    #[test]
    fn standard_source_is_always_main() {
        // REQUIREMENT: Standard-template rows are accepted wholesale
        // PURPOSE: Verify the template source bypasses role-URI checks
        assert!(is_main_statement_item(None, "standard", "balance_sheet", None));
    }

    #[test]
    fn total_equity_is_not_an_equity_statement_item() {
        // REQUIREMENT: Total equity lives on the balance sheet, not among
        // the equity-statement movements
        // PURPOSE: Verify the label exclusion inside the equity-role match
        assert!(!is_main_statement_item(
            Some(NOVO_EQ_ROLE),
            "xbrl",
            "equity_statement",
            Some("total_equity")
        ));
        assert!(is_main_statement_item(
            Some(NOVO_EQ_ROLE),
            "xbrl",
            "equity_statement",
            Some("dividends_paid")
        ));
    }

    #[test]
    fn cash_flow_role_matching() {
        // REQUIREMENT: Cash flow rows come only from cash-flow roles
        // PURPOSE: Verify the family pattern accepts its role and rejects others
        assert!(is_main_statement_item(
            Some(NOVO_CF_ROLE),
            "xbrl",
            "cash_flow",
            None
        ));
        assert!(!is_main_statement_item(
            Some(NOVO_BS_ROLE),
            "xbrl",
            "cash_flow",
            None
        ));
    }

    #[test]
    fn oci_items_reroute_but_core_income_rows_stay() {
        // REQUIREMENT: OCI-flagged rows move to comprehensive income unless
        // they are core income-statement items
        // PURPOSE: Verify the reroute and its whitelist exception
        let oci_role = "http://example.com/role/Statementofcomprehensiveincome";

        assert_eq!(
            reroute_statement_type("income_statement", Some(oci_role), Some("oci_total")),
            "comprehensive_income"
        );
        // Core income-statement rows stay put even in a combined role
        assert_eq!(
            reroute_statement_type("income_statement", Some(oci_role), Some("revenue")),
            "income_statement"
        );
        assert_eq!(
            reroute_statement_type("balance_sheet", Some(oci_role), Some("oci_total")),
            "balance_sheet"
        );
    }

    #[test]
    fn role_priority_prefers_main_statement_roles() {
        // REQUIREMENT: When a concept appears in several roles, the main
        // statement role wins the dedup
        // PURPOSE: Verify the priority ordering combined < segment < none
        let combined = role_priority("income_statement", Some(NOVO_IS_ROLE));
        let segment = role_priority(
            "income_statement",
            Some("http://example.com/role/SegmentInformation"),
        );
        let missing = role_priority("income_statement", None);
        assert!(combined < segment);
        assert!(segment < missing);
    }

    #[test]
    fn balance_sheet_sides_partition_cleanly() {
        // REQUIREMENT: Every main balance-sheet row carries a side
        // PURPOSE: Verify asset, liability, equity, and total patterns
        // partition, and unmatched labels get no side
        assert_eq!(
            balance_sheet_side("cash_and_equivalents", "CashAndCashEquivalents"),
            Some(BalanceSheetSide::Assets)
        );
        assert_eq!(
            balance_sheet_side("inventory", "Inventories"),
            Some(BalanceSheetSide::Assets)
        );
        assert_eq!(
            balance_sheet_side("trade_payables", "TradePayables"),
            Some(BalanceSheetSide::LiabilitiesEquity)
        );
        assert_eq!(
            balance_sheet_side("retained_earnings", "RetainedEarnings"),
            Some(BalanceSheetSide::LiabilitiesEquity)
        );
        assert_eq!(
            balance_sheet_side("total_assets", "Assets"),
            Some(BalanceSheetSide::Assets)
        );
        assert_eq!(
            balance_sheet_side("equity_and_liabilities", "EquityAndLiabilities"),
            Some(BalanceSheetSide::LiabilitiesEquity)
        );
        assert_eq!(balance_sheet_side("some_ratio", "SomeRatio"), None);
    }

    #[test]
    fn investments_in_associates_are_assets() {
        // REQUIREMENT: Equity-method investments sit on the assets side
        // PURPOSE: Verify the associates special case beats the equity pattern
        assert_eq!(
            balance_sheet_side(
                "investments_in_associated_companies",
                "InvestmentsInAssociates"
            ),
            Some(BalanceSheetSide::Assets)
        );
    }
}
