use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::dim_filings;

/// **Filing Model**
///
/// One processed filing. The natural key is
/// `(company_id, filing_type, fiscal_year_end)`; re-running the pipeline
/// over the same corpus reuses existing filing rows.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = dim_filings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Filing {
    /// Unique identifier for this filing record
    pub id: Uuid,

    /// Company that submitted the filing
    pub company_id: Uuid,

    /// Filing type: 10-K, 20-F, ESEF, ...
    pub filing_type: String,

    /// Last day of the fiscal year the filing covers
    pub fiscal_year_end: NaiveDate,

    /// Where the raw filing was acquired from
    pub source_url: Option<String>,

    /// Score from the raw-facts validation pass
    pub validation_score: Option<BigDecimal>,

    /// Score from the completeness checks
    pub completeness_score: Option<BigDecimal>,

    /// Timestamp when this record was first inserted
    pub created_at: DateTime<Utc>,
}

/// **NewFiling Model**
///
/// Insert DTO for `dim_filings`.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize, Validate)]
#[diesel(table_name = dim_filings)]
pub struct NewFiling {
    pub company_id: Uuid,

    #[validate(length(min = 1, max = 20))]
    pub filing_type: String,

    pub fiscal_year_end: NaiveDate,

    pub source_url: Option<String>,

    pub validation_score: Option<BigDecimal>,

    pub completeness_score: Option<BigDecimal>,
}
