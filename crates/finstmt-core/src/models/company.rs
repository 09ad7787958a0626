use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::dim_companies;

/// **Company Model**
///
/// A filer in the warehouse. Companies are created on first filing and
/// shared by every subsequent filing for the same ticker.
///
/// # Use Cases
/// - Anchoring filings and facts to a single cross-year entity
/// - Deciding which taxonomies the corpus needs (by accounting standard)
/// - Per-company validation and completeness reporting
///
/// # Database Schema
/// Maps to the `dim_companies` table. `ticker` is the natural key; the
/// `accounting_standard` may upgrade from the US-GAAP default to IFRS when
/// a 20-F/ESEF filing arrives.
///
/// # Examples
/// ```rust,no_run
/// use finstmt_core::models::Company;
/// use uuid::Uuid;
/// use chrono::Utc;
///
/// let company = Company {
///     id: Uuid::new_v4(),
///     ticker: "NVO".to_string(),
///     company_name: "Novo Nordisk A/S".to_string(),
///     accounting_standard: "IFRS".to_string(),
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
/// ```
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = dim_companies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Company {
    /// Unique identifier for this company record
    pub id: Uuid,

    /// Stock ticker symbol; the natural key for get-or-create
    pub ticker: String,

    /// Display name as reported in filing metadata
    pub company_name: String,

    /// Accounting framework: "US-GAAP" or "IFRS"
    pub accounting_standard: String,

    /// Timestamp when this record was first inserted
    pub created_at: DateTime<Utc>,

    /// Timestamp when this record was last modified
    pub updated_at: DateTime<Utc>,
}

/// **NewCompany Model**
///
/// Insert DTO for `dim_companies`; excludes generated columns.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize, Validate)]
#[diesel(table_name = dim_companies)]
pub struct NewCompany {
    /// Ticker symbol
    #[validate(length(min = 1, max = 20))]
    pub ticker: String,

    /// Display name
    #[validate(length(min = 1, max = 255))]
    pub company_name: String,

    /// Accounting framework
    #[validate(length(min = 1, max = 20))]
    pub accounting_standard: String,
}
