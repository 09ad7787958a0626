use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::rel_statement_items;

/// **StatementItem Model**
///
/// The curated presentation layer: one row per
/// `(filing, concept, statement)` declaring where a concept renders.
/// Detail/disclosure concepts are excluded; synthetic section headers and
/// calculated rows (beginning cash, beginning/ending equity) are created
/// here and valued at materialization time.
///
/// # Database Schema
/// Maps to the `rel_statement_items` table; rebuilt per filing on re-run.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = rel_statement_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StatementItem {
    pub id: Uuid,
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub statement_type: String,
    pub display_order: i32,
    /// Section title row: rendered without value cells
    pub is_header: bool,
    pub is_main_item: bool,
    pub role_uri: Option<String>,
    /// "xbrl", "standard", or "calculated"
    pub source: String,
    /// Balance sheet only: "assets" or "liabilities_equity"
    pub side: Option<String>,
}

/// Insert DTO for `rel_statement_items`.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = rel_statement_items)]
pub struct NewStatementItem {
    pub filing_id: Uuid,
    pub concept_id: Uuid,
    pub statement_type: String,
    pub display_order: i32,
    pub is_header: bool,
    pub is_main_item: bool,
    pub role_uri: Option<String>,
    pub source: String,
    pub side: Option<String>,
}
