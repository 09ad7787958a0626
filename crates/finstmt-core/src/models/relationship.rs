use bigdecimal::BigDecimal;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{rel_calculation_hierarchy, rel_footnote_references, rel_presentation_hierarchy};

/// **CalculationArc Model**
///
/// One `parent = Σ (weight × child)` arc scoped to a filing. `source`
/// distinguishes XBRL-extracted arcs from synthesized ones; synthesized
/// arcs carry a reduced `confidence`.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = rel_calculation_hierarchy)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CalculationArc {
    pub id: Uuid,
    pub filing_id: Uuid,
    pub parent_concept_id: Uuid,
    pub child_concept_id: Uuid,
    /// +1 for additive children, -1 for subtractive
    pub weight: BigDecimal,
    pub order_index: Option<i32>,
    pub arcrole: Option<String>,
    pub priority: i32,
    /// "xbrl", "dimensional", or "standard"
    pub source: String,
    pub is_synthetic: bool,
    /// 1.0 for XBRL arcs, 0.8 for standard-template arcs
    pub confidence: BigDecimal,
}

/// Insert DTO for `rel_calculation_hierarchy`.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = rel_calculation_hierarchy)]
pub struct NewCalculationArc {
    pub filing_id: Uuid,
    pub parent_concept_id: Uuid,
    pub child_concept_id: Uuid,
    pub weight: BigDecimal,
    pub order_index: Option<i32>,
    pub arcrole: Option<String>,
    pub priority: i32,
    pub source: String,
    pub is_synthetic: bool,
    pub confidence: BigDecimal,
}

/// **PresentationArc Model**
///
/// One display-ordering arc scoped to a filing. The `role_uri` identifies
/// which statement or disclosure section the arc came from; the organizer
/// keys its main-item selection off this URI.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = rel_presentation_hierarchy)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PresentationArc {
    pub id: Uuid,
    pub filing_id: Uuid,
    pub parent_concept_id: Option<Uuid>,
    pub child_concept_id: Uuid,
    pub order_index: Option<i32>,
    pub preferred_label: Option<String>,
    pub statement_type: String,
    pub role_uri: Option<String>,
    pub arcrole: Option<String>,
    pub priority: i32,
    pub source: String,
    pub is_synthetic: bool,
}

/// Insert DTO for `rel_presentation_hierarchy`.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = rel_presentation_hierarchy)]
pub struct NewPresentationArc {
    pub filing_id: Uuid,
    pub parent_concept_id: Option<Uuid>,
    pub child_concept_id: Uuid,
    pub order_index: Option<i32>,
    pub preferred_label: Option<String>,
    pub statement_type: String,
    pub role_uri: Option<String>,
    pub arcrole: Option<String>,
    pub priority: i32,
    pub source: String,
    pub is_synthetic: bool,
}

/// **FootnoteReference Model**
///
/// A footnote attached to a fact or concept in a filing.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = rel_footnote_references)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FootnoteReference {
    pub id: Uuid,
    pub filing_id: Uuid,
    pub fact_id: Option<Uuid>,
    pub concept_id: Option<Uuid>,
    pub footnote_text: Option<String>,
    pub footnote_label: Option<String>,
    pub footnote_role: Option<String>,
    pub footnote_lang: String,
}

/// Insert DTO for `rel_footnote_references`.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = rel_footnote_references)]
pub struct NewFootnoteReference {
    pub filing_id: Uuid,
    pub fact_id: Option<Uuid>,
    pub concept_id: Option<Uuid>,
    pub footnote_text: Option<String>,
    pub footnote_label: Option<String>,
    pub footnote_role: Option<String>,
    pub footnote_lang: String,
}
