use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::fact_financial_metrics;

/// **FinancialFact Model**
///
/// One tagged value from a filing, keyed by
/// `(filing, concept, period, dimension)` where a NULL dimension means the
/// consolidated (company-wide) fact.
///
/// # Use Cases
/// - The single source fact table every downstream stage reads
/// - Calculated rows (`is_calculated = true`) live alongside reported ones
///   under the same natural key and never overwrite a reported value
///
/// # Database Schema
/// Maps to the `fact_financial_metrics` table, indexed on the natural key
/// (NULLS NOT DISTINCT so consolidated facts participate in it).
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = fact_financial_metrics)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FinancialFact {
    /// Unique identifier for this fact record
    pub id: Uuid,

    /// Company the fact belongs to
    pub company_id: Uuid,

    /// Concept that was tagged
    pub concept_id: Uuid,

    /// Reporting period
    pub period_id: Uuid,

    /// Filing that carried the fact
    pub filing_id: Uuid,

    /// Dimension qualifier; NULL = consolidated
    pub dimension_id: Option<Uuid>,

    /// Numeric value (monetary, shares, per-share)
    pub value_numeric: Option<BigDecimal>,

    /// Text value for non-numeric facts
    pub value_text: Option<String>,

    /// Unit of measure (DKK, USD, shares, ...)
    pub unit_measure: Option<String>,

    /// XBRL decimals attribute
    pub decimals: Option<i32>,

    /// Power-of-ten scale the value was reported at
    pub scale_int: Option<i32>,

    /// iXBRL format attribute
    pub xbrl_format: Option<String>,

    /// XBRL context id in the source document
    pub context_id: Option<String>,

    /// Fact id in the source document
    pub fact_id_xbrl: Option<String>,

    /// Line in the source document, for traceability
    pub source_line: Option<i32>,

    /// Document order, when the parser captured it
    pub order_index: Option<i32>,

    /// Whether this is the primary occurrence of a repeated fact
    pub is_primary: bool,

    /// True for pipeline-computed facts; reported values are never
    /// overwritten by calculated ones
    pub is_calculated: bool,

    /// Provenance tag for calculated facts (e.g. "calculated_from_children")
    pub extraction_method: Option<String>,

    /// Timestamp when this record was first inserted
    pub created_at: DateTime<Utc>,
}

/// **NewFinancialFact Model**
///
/// Insert DTO for `fact_financial_metrics`.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = fact_financial_metrics)]
pub struct NewFinancialFact {
    pub company_id: Uuid,
    pub concept_id: Uuid,
    pub period_id: Uuid,
    pub filing_id: Uuid,
    pub dimension_id: Option<Uuid>,
    pub value_numeric: Option<BigDecimal>,
    pub value_text: Option<String>,
    pub unit_measure: Option<String>,
    pub decimals: Option<i32>,
    pub scale_int: Option<i32>,
    pub xbrl_format: Option<String>,
    pub context_id: Option<String>,
    pub fact_id_xbrl: Option<String>,
    pub source_line: Option<i32>,
    pub order_index: Option<i32>,
    pub is_primary: bool,
    pub is_calculated: bool,
    pub extraction_method: Option<String>,
}
