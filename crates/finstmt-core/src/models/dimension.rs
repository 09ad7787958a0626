use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::dim_xbrl_dimensions;

/// **XbrlDimension Model**
///
/// One deduplicated XBRL dimension combination (axis → member pairs).
/// Facts without dimensions represent consolidated company-wide totals and
/// carry a NULL dimension reference instead of a row here.
///
/// # Database Schema
/// Maps to the `dim_xbrl_dimensions` table. `dimension_hash` is the SHA-256
/// digest of the key-sorted JSON and is the dedup key; `axis_name` /
/// `member_name` denormalize the first axis for cheap filtering.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = dim_xbrl_dimensions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct XbrlDimension {
    /// Unique identifier for this dimension record
    pub id: Uuid,

    /// Full axis → {member, ...} JSON as emitted by the parser
    pub dimension_json: serde_json::Value,

    /// Stable digest of the canonicalized JSON (dedup key)
    pub dimension_hash: String,

    /// First axis name, for convenience queries
    pub axis_name: Option<String>,

    /// First member name, for convenience queries
    pub member_name: Option<String>,

    /// Timestamp when this record was first inserted
    pub created_at: DateTime<Utc>,
}

impl XbrlDimension {
    /// Member of the given axis, if this dimension carries it
    pub fn member_of(&self, axis: &str) -> Option<&str> {
        self.dimension_json
            .get(axis)
            .and_then(|details| details.get("member"))
            .and_then(|m| m.as_str())
    }

    /// Whether this dimension carries the given axis at all
    pub fn has_axis(&self, axis: &str) -> bool {
        self.dimension_json.get(axis).is_some()
    }
}

/// **NewXbrlDimension Model**
///
/// Insert DTO for `dim_xbrl_dimensions`.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = dim_xbrl_dimensions)]
pub struct NewXbrlDimension {
    pub dimension_json: serde_json::Value,
    pub dimension_hash: String,
    pub axis_name: Option<String>,
    pub member_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dimension(json: serde_json::Value) -> XbrlDimension {
        XbrlDimension {
            id: Uuid::new_v4(),
            dimension_json: json,
            dimension_hash: "abc".to_string(),
            axis_name: None,
            member_name: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn member_of_reads_axis_member() {
        // REQUIREMENT: Equity pivoting reads axis members out of the JSON
        // PURPOSE: Verify member_of/has_axis on the stored dimension shape
        let d = dimension(json!({
            "ComponentsOfEquityAxis": {"member": "TreasurySharesMember"}
        }));
        assert_eq!(
            d.member_of("ComponentsOfEquityAxis"),
            Some("TreasurySharesMember")
        );
        assert_eq!(d.member_of("GeographicalAreasAxis"), None);
        assert!(d.has_axis("ComponentsOfEquityAxis"));
        assert!(!d.has_axis("GeographicalAreasAxis"));
    }
}
