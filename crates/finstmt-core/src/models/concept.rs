use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::dim_concepts;

/// **Concept Model**
///
/// One taxonomy concept as used by at least one filing. Concepts persist
/// across filings: the `(taxonomy, concept_name)` pair is the natural key,
/// and the normalization passes mutate `normalized_label` /
/// `statement_type` in place.
///
/// # Use Cases
/// - Cross-company metric lookup by `normalized_label`
/// - Hierarchy classification (`parent_concept_id`, `calculation_weight`,
///   `hierarchy_level`)
/// - Statement routing via `statement_type`
///
/// # Database Schema
/// Maps to the `dim_concepts` table. `normalized_label` is only written by
/// the normalization passes; once an authoritative mapping set it, later
/// fallback passes must not overwrite it.
///
/// # Examples
/// ```rust,no_run
/// use finstmt_core::models::Concept;
/// use uuid::Uuid;
/// use chrono::Utc;
///
/// let revenue = Concept {
///     id: Uuid::new_v4(),
///     taxonomy: "US-GAAP".to_string(),
///     concept_name: "Revenues".to_string(),
///     normalized_label: Some("revenue".to_string()),
///     preferred_label: Some("Revenues".to_string()),
///     concept_type: Some("monetary".to_string()),
///     balance_type: Some("credit".to_string()),
///     period_type: Some("duration".to_string()),
///     data_type: Some("xbrli:monetaryItemType".to_string()),
///     is_abstract: false,
///     statement_type: Some("income_statement".to_string()),
///     parent_concept_id: None,
///     calculation_weight: None,
///     hierarchy_level: Some(3),
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
/// ```
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = dim_concepts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Concept {
    /// Unique identifier for this concept record
    pub id: Uuid,

    /// Taxonomy identifier: "US-GAAP", "IFRS", "DEI", "SEC", "custom",
    /// or "synthetic" for pipeline-created header concepts
    pub taxonomy: String,

    /// XBRL concept name without namespace prefix
    pub concept_name: String,

    /// Stable cross-company key assigned by the normalizer
    pub normalized_label: Option<String>,

    /// Human-readable label from the label linkbase
    pub preferred_label: Option<String>,

    /// Concept kind: monetary, shares, perShare, string, ...
    pub concept_type: Option<String>,

    /// XBRL balance attribute: debit or credit
    pub balance_type: Option<String>,

    /// XBRL period attribute: duration or instant
    pub period_type: Option<String>,

    /// Full XBRL data type (e.g. "xbrli:monetaryItemType")
    pub data_type: Option<String>,

    /// Abstract concepts carry no values; they structure presentation
    pub is_abstract: bool,

    /// Statement this concept belongs to, per the normalizer
    pub statement_type: Option<String>,

    /// Parent in the calculation hierarchy (taxonomy-authoritative)
    pub parent_concept_id: Option<Uuid>,

    /// Weight of this concept in its parent's summation (+1 or -1)
    pub calculation_weight: Option<BigDecimal>,

    /// 1 = detail, 2 = subtotal, 3 = section/universal metric,
    /// 4 = statement total
    pub hierarchy_level: Option<i32>,

    /// Timestamp when this record was first inserted
    pub created_at: DateTime<Utc>,

    /// Timestamp when this record was last modified
    pub updated_at: DateTime<Utc>,
}

/// **NewConcept Model**
///
/// Insert DTO for `dim_concepts`.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize, Validate)]
#[diesel(table_name = dim_concepts)]
pub struct NewConcept {
    /// Taxonomy identifier
    #[validate(length(min = 1, max = 50))]
    pub taxonomy: String,

    /// XBRL concept name
    #[validate(length(min = 1, max = 500))]
    pub concept_name: String,

    /// Normalized label (may be assigned later by the normalizer)
    pub normalized_label: Option<String>,

    /// Preferred label
    pub preferred_label: Option<String>,

    /// Concept kind
    pub concept_type: Option<String>,

    /// Balance attribute
    pub balance_type: Option<String>,

    /// Period attribute
    pub period_type: Option<String>,

    /// Full XBRL data type
    pub data_type: Option<String>,

    /// Abstract flag
    pub is_abstract: bool,

    /// Statement type
    pub statement_type: Option<String>,
}
