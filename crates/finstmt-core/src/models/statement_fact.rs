use bigdecimal::BigDecimal;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{
    fact_balance_sheet, fact_cash_flow, fact_comprehensive_income, fact_equity_statement,
    fact_income_statement,
};

/// **Statement Fact Models**
///
/// Denormalized per-statement tables holding exactly the rows a UI
/// renders, in display order, signs applied, synthetic rows valued.
/// One table per statement type; the balance sheet adds `side` and the
/// equity statement adds `equity_component`.
///
/// Rebuilt per filing: the materializer deletes the filing's rows and
/// re-inserts (upsert on the per-table natural key).

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = fact_income_statement)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IncomeStatementFact {
    pub id: Uuid,
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub period_id: Uuid,
    pub value_numeric: Option<BigDecimal>,
    pub unit_measure: Option<String>,
    pub display_order: i32,
    pub is_header: bool,
    pub hierarchy_level: Option<i32>,
    pub parent_concept_id: Option<Uuid>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = fact_income_statement)]
pub struct NewIncomeStatementFact {
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub period_id: Uuid,
    pub value_numeric: Option<BigDecimal>,
    pub unit_measure: Option<String>,
    pub display_order: i32,
    pub is_header: bool,
    pub hierarchy_level: Option<i32>,
    pub parent_concept_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = fact_balance_sheet)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BalanceSheetFact {
    pub id: Uuid,
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub period_id: Uuid,
    pub value_numeric: Option<BigDecimal>,
    pub unit_measure: Option<String>,
    pub display_order: i32,
    pub is_header: bool,
    pub hierarchy_level: Option<i32>,
    pub parent_concept_id: Option<Uuid>,
    /// "assets" or "liabilities_equity"
    pub side: Option<String>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = fact_balance_sheet)]
pub struct NewBalanceSheetFact {
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub period_id: Uuid,
    pub value_numeric: Option<BigDecimal>,
    pub unit_measure: Option<String>,
    pub display_order: i32,
    pub is_header: bool,
    pub hierarchy_level: Option<i32>,
    pub parent_concept_id: Option<Uuid>,
    pub side: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = fact_cash_flow)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CashFlowFact {
    pub id: Uuid,
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub period_id: Uuid,
    pub value_numeric: Option<BigDecimal>,
    pub unit_measure: Option<String>,
    pub display_order: i32,
    pub is_header: bool,
    pub hierarchy_level: Option<i32>,
    pub parent_concept_id: Option<Uuid>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = fact_cash_flow)]
pub struct NewCashFlowFact {
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub period_id: Uuid,
    pub value_numeric: Option<BigDecimal>,
    pub unit_measure: Option<String>,
    pub display_order: i32,
    pub is_header: bool,
    pub hierarchy_level: Option<i32>,
    pub parent_concept_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = fact_comprehensive_income)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ComprehensiveIncomeFact {
    pub id: Uuid,
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub period_id: Uuid,
    pub value_numeric: Option<BigDecimal>,
    pub unit_measure: Option<String>,
    pub display_order: i32,
    pub is_header: bool,
    pub hierarchy_level: Option<i32>,
    pub parent_concept_id: Option<Uuid>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = fact_comprehensive_income)]
pub struct NewComprehensiveIncomeFact {
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub period_id: Uuid,
    pub value_numeric: Option<BigDecimal>,
    pub unit_measure: Option<String>,
    pub display_order: i32,
    pub is_header: bool,
    pub hierarchy_level: Option<i32>,
    pub parent_concept_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = fact_equity_statement)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EquityStatementFact {
    pub id: Uuid,
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub period_id: Uuid,
    pub value_numeric: Option<BigDecimal>,
    pub unit_measure: Option<String>,
    pub display_order: i32,
    pub is_header: bool,
    pub hierarchy_level: Option<i32>,
    pub parent_concept_id: Option<Uuid>,
    /// NULL = the total column of the equity matrix
    pub equity_component: Option<String>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = fact_equity_statement)]
pub struct NewEquityStatementFact {
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub period_id: Uuid,
    pub value_numeric: Option<BigDecimal>,
    pub unit_measure: Option<String>,
    pub display_order: i32,
    pub is_header: bool,
    pub hierarchy_level: Option<i32>,
    pub parent_concept_id: Option<Uuid>,
    pub equity_component: Option<String>,
}
