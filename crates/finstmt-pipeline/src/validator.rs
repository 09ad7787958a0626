//! Validation framework: raw-fact checks before load and warehouse-wide
//! checks after the pipeline completes.
//!
//! Each rule is a function producing `ValidationResult`s; a report
//! aggregates them into a weighted score (ERROR 3, WARNING 2, INFO 1)
//! with a 0.90 pass threshold. The validator never aborts the pipeline;
//! blocking happens only at the loader's pre-commit check.

use std::collections::{HashMap, HashSet};

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use finstmt_core::database::DatabasePool;
use finstmt_core::enums::Severity;
use finstmt_core::error::AppResult;
use finstmt_core::models::RawFact;
use finstmt_core::schema::{dim_companies, dim_concepts, fact_financial_metrics};

use crate::loader::to_f64;

/// Normalization-conflict thresholds: some conflicts are intentional
/// (curated entries accepting several names), so only excess fails.
const CONFLICT_WARN_THRESHOLD: usize = 60;
const CONFLICT_FAIL_THRESHOLD: usize = 100;

/// Companies need at least this many facts to count as adequately loaded
const MIN_COMPANY_FACTS: i64 = 100;

/// Result of a single validation rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub rule_name: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance_pct: Option<f64>,
}

impl ValidationResult {
    pub fn new(rule_name: &str, passed: bool, severity: Severity, message: String) -> Self {
        ValidationResult {
            rule_name: rule_name.to_string(),
            passed,
            severity,
            message,
            details: None,
            expected_value: None,
            actual_value: None,
            tolerance_pct: None,
        }
    }
}

/// Complete validation report with weighted scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// "raw_facts" or "database"
    pub validation_type: String,
    /// Company/filing identifier or "all"
    pub target: String,
    pub results: Vec<ValidationResult>,
    pub overall_score: f64,
    pub passed: bool,
    pub validation_timestamp: DateTime<Utc>,
}

impl ValidationReport {
    pub fn new(validation_type: &str, target: &str) -> Self {
        ValidationReport {
            validation_type: validation_type.to_string(),
            target: target.to_string(),
            results: Vec::new(),
            overall_score: 0.0,
            passed: false,
            validation_timestamp: Utc::now(),
        }
    }

    pub fn add_result(&mut self, result: ValidationResult) {
        self.results.push(result);
    }

    /// Weighted score: ERROR 3, WARNING 2, INFO 1; passed at >= 0.90
    pub fn calculate_score(&mut self) {
        if self.results.is_empty() {
            self.overall_score = 0.0;
            self.passed = false;
            return;
        }

        let mut total_weight = 0u32;
        let mut passed_weight = 0u32;
        for result in &self.results {
            let weight = result.severity.weight();
            total_weight += weight;
            if result.passed {
                passed_weight += weight;
            }
        }

        self.overall_score = if total_weight > 0 {
            f64::from(passed_weight) / f64::from(total_weight)
        } else {
            0.0
        };
        self.passed = self.overall_score >= 0.90;
    }

    pub fn errors(&self) -> Vec<&ValidationResult> {
        self.results
            .iter()
            .filter(|r| r.severity == Severity::Error && !r.passed)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationResult> {
        self.results
            .iter()
            .filter(|r| r.severity == Severity::Warning && !r.passed)
            .collect()
    }
}

/// **RawFactsValidator**
///
/// Validates a filing's fact stream before it is loaded: accounting
/// identities per period, EPS sanity, critical-concept presence, and
/// duplicate detection.
pub struct RawFactsValidator {
    pub tolerance_pct: f64,
}

impl Default for RawFactsValidator {
    fn default() -> Self {
        RawFactsValidator { tolerance_pct: 1.0 }
    }
}

impl RawFactsValidator {
    pub fn validate_filing(
        &self,
        facts: &[RawFact],
        company: &str,
        filing_type: &str,
        fiscal_year_end: &str,
    ) -> ValidationReport {
        let mut report = ValidationReport::new(
            "raw_facts",
            &format!("{}/{}/{}", company, filing_type, fiscal_year_end),
        );

        let by_period = group_by_period(facts);
        for (period, period_facts) in &by_period {
            if let Some(result) = self.check_balance_sheet_equation(period_facts, period) {
                report.add_result(result);
            }
            if let Some(result) = self.check_eps(period_facts, period) {
                report.add_result(result);
            }
        }

        for result in check_completeness(facts) {
            report.add_result(result);
        }
        report.add_result(check_duplicates(facts));

        report.calculate_score();
        report
    }

    fn check_balance_sheet_equation(
        &self,
        facts: &[&RawFact],
        period: &str,
    ) -> Option<ValidationResult> {
        let assets = find_value(facts, &["Assets", "AssetsTotal"])?;
        let liabilities = find_value(facts, &["Liabilities", "LiabilitiesTotal"])?;
        let equity = find_value(facts, &["StockholdersEquity", "Equity"])?;

        let expected = liabilities + equity;
        let diff = (assets - expected).abs();
        let diff_pct = if assets != 0.0 {
            diff / assets.abs() * 100.0
        } else {
            100.0
        };
        let passed = diff_pct <= self.tolerance_pct;

        let mut result = ValidationResult::new(
            "balance_sheet_equation",
            passed,
            if passed { Severity::Info } else { Severity::Error },
            format!("Balance sheet equation (period {})", period),
        );
        result.details = Some(serde_json::json!({
            "assets": assets,
            "liabilities": liabilities,
            "equity": equity,
            "difference_pct": diff_pct,
        }));
        result.expected_value = Some(expected);
        result.actual_value = Some(assets);
        result.tolerance_pct = Some(self.tolerance_pct);
        Some(result)
    }

    fn check_eps(&self, facts: &[&RawFact], period: &str) -> Option<ValidationResult> {
        let net_income = find_value(facts, &["NetIncomeLoss", "NetIncome"])?;
        let shares = find_value(facts, &["WeightedAverageNumberOfSharesOutstandingBasic"])?;
        let reported_eps = find_value(facts, &["EarningsPerShareBasic"])?;

        let calculated_eps = if shares != 0.0 { net_income / shares } else { 0.0 };
        let diff_pct = if reported_eps != 0.0 {
            (calculated_eps - reported_eps).abs() / reported_eps.abs() * 100.0
        } else {
            100.0
        };
        let tolerance = self.tolerance_pct.max(3.0);
        let passed = diff_pct <= tolerance;

        let mut result = ValidationResult::new(
            "eps_calculation",
            passed,
            if passed { Severity::Info } else { Severity::Warning },
            format!("EPS calculation (period {})", period),
        );
        result.details = Some(serde_json::json!({
            "net_income": net_income,
            "shares": shares,
            "reported_eps": reported_eps,
            "calculated_eps": calculated_eps,
            "difference_pct": diff_pct,
        }));
        result.expected_value = Some(calculated_eps);
        result.actual_value = Some(reported_eps);
        result.tolerance_pct = Some(tolerance);
        Some(result)
    }
}

fn group_by_period<'a>(facts: &'a [RawFact]) -> HashMap<String, Vec<&'a RawFact>> {
    let mut grouped: HashMap<String, Vec<&RawFact>> = HashMap::new();
    for fact in facts {
        if let Some(date) = fact.period_key_date() {
            grouped.entry(date.to_string()).or_default().push(fact);
        }
    }
    grouped
}

fn find_value(facts: &[&RawFact], concept_names: &[&str]) -> Option<f64> {
    for name in concept_names {
        for fact in facts {
            if fact.concept.eq_ignore_ascii_case(name) && fact.is_consolidated() {
                if let Some(value) = fact.value_numeric {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn check_completeness(facts: &[RawFact]) -> Vec<ValidationResult> {
    const CRITICAL: &[(&str, &[&str])] = &[
        ("revenue", &["Revenue", "Revenues", "SalesRevenueNet"]),
        ("net_income", &["NetIncomeLoss", "NetIncome", "ProfitLoss"]),
        ("assets", &["Assets", "AssetsTotal"]),
        ("equity", &["StockholdersEquity", "Equity"]),
        (
            "cash",
            &["Cash", "CashAndCashEquivalentsAtCarryingValue", "CashAndCashEquivalents"],
        ),
    ];

    let all: Vec<&RawFact> = facts.iter().collect();
    CRITICAL
        .iter()
        .map(|(category, names)| {
            let found = find_value(&all, names).is_some();
            ValidationResult::new(
                &format!("has_{}", category),
                found,
                if found { Severity::Info } else { Severity::Warning },
                format!("Critical concept: {}", category),
            )
        })
        .collect()
}

fn check_duplicates(facts: &[RawFact]) -> ValidationResult {
    let mut seen: HashSet<(String, Option<String>, Option<String>, String, Option<String>)> =
        HashSet::new();
    let mut duplicates = 0usize;

    for fact in facts {
        let key = (
            fact.concept.clone(),
            fact.period_end.map(|d| d.to_string()),
            fact.instant_date.map(|d| d.to_string()),
            serde_json::to_string(&fact.dimensions).unwrap_or_default(),
            fact.value_text.clone(),
        );
        if !seen.insert(key) {
            duplicates += 1;
        }
    }

    let passed = duplicates == 0;
    let mut result = ValidationResult::new(
        "no_duplicates",
        passed,
        Severity::Info,
        "Duplicate fact detection".to_string(),
    );
    result.details = Some(serde_json::json!({ "duplicate_count": duplicates }));
    result
}

/// Taxonomy-required totals by accounting role: the balance-sheet
/// equation, the income-statement totals, and the standard components a
/// complete filing reports.
pub static REQUIRED_METRICS: &[&str] = &[
    "total_assets",
    "total_liabilities",
    "stockholders_equity",
    "revenue",
    "net_income",
    "current_liabilities",
    "noncurrent_liabilities",
    "accounts_receivable",
    "accounts_payable",
    "cash_and_equivalents",
    "operating_cash_flow",
];

/// Which required metrics a company covers, from its (concept_name,
/// normalized_label) pairs. Banks satisfy several metrics through their
/// own vocabulary: financing receivables stand in for accounts
/// receivable, deposit liabilities for current liabilities,
/// accrued-and-other for accounts payable, cash-and-due-from-banks for
/// cash.
pub fn required_metric_coverage(
    concepts: &[(String, Option<String>)],
) -> HashMap<&'static str, bool> {
    let mut coverage: HashMap<&'static str, bool> =
        REQUIRED_METRICS.iter().map(|metric| (*metric, false)).collect();

    let is_bank = concepts.iter().any(|(name, label)| {
        let name = name.to_lowercase();
        let label = label.as_deref().unwrap_or("").to_lowercase();
        name.contains("depositliabilities") || label.contains("deposit_liabilities")
    });

    for (concept_name, normalized_label) in concepts {
        let concept = concept_name.to_lowercase();
        let label = normalized_label.as_deref().unwrap_or("").to_lowercase();

        if label.contains("revenue") || concept.contains("revenue") {
            coverage.insert("revenue", true);
        }
        if label.contains("net_income")
            || label.contains("profit_loss")
            || concept.contains("netincome")
            || concept.contains("profitloss")
        {
            coverage.insert("net_income", true);
        }
        if label == "total_assets"
            || label == "assets"
            || (concept.starts_with("assets") && concept.contains("total"))
            || concept == "assets"
        {
            coverage.insert("total_assets", true);
        }
        if (label == "total_liabilities"
            || label == "liabilities"
            || (concept.starts_with("liabilities") && concept.contains("total"))
            || concept == "liabilities")
            && !label.contains("current")
        {
            coverage.insert("total_liabilities", true);
        }
        if label.contains("stockholders_equity")
            || label == "equity"
            || label.contains("equity")
            || concept.contains("stockholdersequity")
            || concept == "equity"
        {
            coverage.insert("stockholders_equity", true);
        }
        if label.contains("current_liabilities")
            || label.contains("liabilities_current")
            || concept.contains("currentliabilities")
            || concept.contains("liabilitiescurrent")
            // Banks: deposit liabilities are current-liability components
            || label.contains("interest_bearing_deposit_liabilities")
            || label.contains("noninterest_bearing_deposit_liabilities")
            || concept.contains("interestbearingdepositliabilities")
            || concept.contains("noninterestbearingdepositliabilities")
        {
            coverage.insert("current_liabilities", true);
        }
        if label.contains("noncurrent_liabilities")
            || label.contains("liabilities_noncurrent")
            || concept.contains("noncurrentliabilities")
            || concept.contains("liabilitiesnoncurrent")
        {
            coverage.insert("noncurrent_liabilities", true);
        }
        if label.contains("accounts_receivable")
            || concept.contains("accountsreceivable")
            // Banks: financing receivables are the receivable equivalent
            || (label.contains("financing_receivable")
                && !label.contains("allowance")
                && !label.contains("credit_loss"))
            || (concept.contains("financingreceivable")
                && !concept.contains("allowance")
                && !concept.contains("creditloss"))
        {
            coverage.insert("accounts_receivable", true);
        }
        if label.contains("accounts_payable")
            || concept.contains("accountspayable")
            // Banks: accrued-and-other stands in for accounts payable
            || ((label.contains("accrued_liabilities_and_other_liabilities")
                || concept.contains("accruedliabilitiesandotherliabilities"))
                && is_bank)
        {
            coverage.insert("accounts_payable", true);
        }
        if label.contains("cash_and_equivalents")
            || label.contains("cash_and_cash_equivalents")
            || concept.contains("cashandcashequivalents")
            || concept.contains("cashandduefrombanks")
        {
            coverage.insert("cash_and_equivalents", true);
        }
        if label.contains("operating_cash_flow")
            || label.contains("net_cash_provided_by_used_in_operating_activities")
            || concept.contains("netcashprovidedbyusedinoperatingactivities")
        {
            coverage.insert("operating_cash_flow", true);
        }
    }

    // Derived coverage: current + noncurrent implies total, and for
    // banks total + current implies noncurrent.
    if !coverage["total_liabilities"]
        && coverage["current_liabilities"]
        && coverage["noncurrent_liabilities"]
    {
        coverage.insert("total_liabilities", true);
    }
    if !coverage["noncurrent_liabilities"]
        && coverage["total_liabilities"]
        && coverage["current_liabilities"]
    {
        coverage.insert("noncurrent_liabilities", true);
    }

    coverage
}

/// **DatabaseValidator**
///
/// Warehouse-wide checks run after pipeline completion.
pub struct DatabaseValidator;

impl DatabaseValidator {
    pub async fn validate_all(pool: &DatabasePool) -> AppResult<ValidationReport> {
        let mut report = ValidationReport::new("database", "all");

        report.add_result(check_normalization_conflicts(pool).await?);
        report.add_result(check_user_facing_duplicates(pool).await?);
        for result in check_company_data(pool).await? {
            report.add_result(result);
        }
        for result in check_metric_coverage(pool).await? {
            report.add_result(result);
        }
        for result in check_universal_metrics(pool).await? {
            report.add_result(result);
        }

        report.calculate_score();
        Ok(report)
    }
}

/// Count of normalized labels carried by more than one concept.
/// Warn past 60, fail past 100.
async fn check_normalization_conflicts(pool: &DatabasePool) -> AppResult<ValidationResult> {
    let mut conn = pool.get().await?;

    let labels: Vec<Option<String>> = dim_concepts::table
        .select(dim_concepts::normalized_label)
        .load(&mut conn)
        .await?;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in labels.into_iter().flatten() {
        *counts.entry(label).or_default() += 1;
    }
    let conflicts = counts.values().filter(|count| **count > 1).count();

    let (passed, severity) = if conflicts > CONFLICT_FAIL_THRESHOLD {
        (false, Severity::Error)
    } else if conflicts > CONFLICT_WARN_THRESHOLD {
        (false, Severity::Warning)
    } else {
        (true, Severity::Info)
    };

    let mut result = ValidationResult::new(
        "normalization_conflicts",
        passed,
        severity,
        "Normalization conflicts".to_string(),
    );
    result.details = Some(serde_json::json!({ "conflict_count": conflicts }));
    result.actual_value = Some(conflicts as f64);
    Ok(result)
}

/// (company, normalized_label, fiscal_year) tuples backed by more than
/// one distinct consolidated concept: a duplicate row a user would see.
async fn check_user_facing_duplicates(pool: &DatabasePool) -> AppResult<ValidationResult> {
    let mut conn = pool.get().await?;

    let facts: Vec<(Uuid, Uuid, Uuid)> = fact_financial_metrics::table
        .filter(fact_financial_metrics::dimension_id.is_null())
        .select((
            fact_financial_metrics::company_id,
            fact_financial_metrics::concept_id,
            fact_financial_metrics::period_id,
        ))
        .load(&mut conn)
        .await?;

    let concept_ids: Vec<Uuid> = facts
        .iter()
        .map(|(_, concept_id, _)| *concept_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let labels: HashMap<Uuid, String> = dim_concepts::table
        .filter(dim_concepts::id.eq_any(&concept_ids))
        .select((dim_concepts::id, dim_concepts::normalized_label))
        .load::<(Uuid, Option<String>)>(&mut conn)
        .await?
        .into_iter()
        .filter_map(|(id, label)| label.map(|label| (id, label)))
        .collect();

    let period_years: HashMap<Uuid, Option<i32>> = {
        use finstmt_core::schema::dim_time_periods;
        let period_ids: Vec<Uuid> = facts
            .iter()
            .map(|(_, _, period_id)| *period_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        dim_time_periods::table
            .filter(dim_time_periods::id.eq_any(&period_ids))
            .select((dim_time_periods::id, dim_time_periods::fiscal_year))
            .load::<(Uuid, Option<i32>)>(&mut conn)
            .await?
            .into_iter()
            .collect()
    };

    let mut concepts_per_key: HashMap<(Uuid, String, i32), HashSet<Uuid>> = HashMap::new();
    for (company_id, concept_id, period_id) in facts {
        let Some(label) = labels.get(&concept_id) else { continue };
        // Note/disclosure fallback labels never render as metrics
        if label.ends_with("_note") || label.contains("_disclosure") {
            continue;
        }
        let Some(year) = period_years.get(&period_id).copied().flatten() else {
            continue;
        };
        concepts_per_key
            .entry((company_id, label.clone(), year))
            .or_default()
            .insert(concept_id);
    }

    let duplicates = concepts_per_key
        .values()
        .filter(|concepts| concepts.len() > 1)
        .count();
    let passed = duplicates == 0;

    let mut result = ValidationResult::new(
        "user_facing_duplicates",
        passed,
        if passed { Severity::Info } else { Severity::Error },
        "User-facing duplicates".to_string(),
    );
    result.details = Some(serde_json::json!({ "duplicate_count": duplicates }));
    result.actual_value = Some(duplicates as f64);
    Ok(result)
}

/// Every company should have at least one filing and an adequate number
/// of facts.
async fn check_company_data(pool: &DatabasePool) -> AppResult<Vec<ValidationResult>> {
    let mut conn = pool.get().await?;

    let companies: Vec<(Uuid, String)> = dim_companies::table
        .select((dim_companies::id, dim_companies::ticker))
        .load(&mut conn)
        .await?;

    let mut results = Vec::new();
    for (company_id, ticker) in companies {
        let fact_count: i64 = fact_financial_metrics::table
            .filter(fact_financial_metrics::company_id.eq(company_id))
            .count()
            .get_result(&mut conn)
            .await?;

        let has_data = fact_count > 0;
        let adequate = fact_count >= MIN_COMPANY_FACTS;
        let severity = if !has_data {
            Severity::Error
        } else if !adequate {
            Severity::Warning
        } else {
            Severity::Info
        };

        let mut result = ValidationResult::new(
            &format!("company_has_data_{}", ticker),
            has_data && adequate,
            severity,
            format!("Company data: {}", ticker),
        );
        result.details = Some(serde_json::json!({ "facts": fact_count }));
        results.push(result);
    }

    Ok(results)
}

/// Per-metric coverage across companies: 80% of companies should carry
/// each critical normalized label.
async fn check_metric_coverage(pool: &DatabasePool) -> AppResult<Vec<ValidationResult>> {
    const CRITICAL_METRICS: &[&str] =
        &["revenue", "net_income", "total_assets", "stockholders_equity"];

    let mut conn = pool.get().await?;

    let total_companies: i64 = dim_companies::table.count().get_result(&mut conn).await?;
    if total_companies == 0 {
        return Ok(vec![]);
    }

    let mut results = Vec::new();
    for metric in CRITICAL_METRICS {
        let concept_ids: Vec<Uuid> = dim_concepts::table
            .filter(dim_concepts::normalized_label.eq(*metric))
            .select(dim_concepts::id)
            .load(&mut conn)
            .await?;

        let companies_with: i64 = if concept_ids.is_empty() {
            0
        } else {
            let company_ids: Vec<Uuid> = fact_financial_metrics::table
                .filter(fact_financial_metrics::concept_id.eq_any(&concept_ids))
                .select(fact_financial_metrics::company_id)
                .distinct()
                .load::<Uuid>(&mut conn)
                .await?;
            company_ids.len() as i64
        };

        let coverage = companies_with as f64 / total_companies as f64;
        let passed = coverage >= 0.8;

        let mut result = ValidationResult::new(
            &format!("metric_coverage_{}", metric),
            passed,
            if passed { Severity::Info } else { Severity::Warning },
            format!("Metric coverage: {}", metric),
        );
        result.details = Some(serde_json::json!({
            "companies_with_metric": companies_with,
            "total_companies": total_companies,
            "coverage_pct": coverage * 100.0,
        }));
        results.push(result);
    }

    Ok(results)
}

/// Taxonomy-driven universal metrics: every company must cover each
/// required total directly, via a synonym, or via its bank-equivalent
/// vocabulary.
async fn check_universal_metrics(pool: &DatabasePool) -> AppResult<Vec<ValidationResult>> {
    let mut conn = pool.get().await?;

    let companies: Vec<(Uuid, String)> = dim_companies::table
        .select((dim_companies::id, dim_companies::ticker))
        .load(&mut conn)
        .await?;

    let mut results = Vec::new();
    for (company_id, ticker) in companies {
        let concept_ids: Vec<Uuid> = fact_financial_metrics::table
            .filter(fact_financial_metrics::company_id.eq(company_id))
            .filter(fact_financial_metrics::dimension_id.is_null())
            .filter(fact_financial_metrics::value_numeric.is_not_null())
            .select(fact_financial_metrics::concept_id)
            .distinct()
            .load(&mut conn)
            .await?;

        let concepts: Vec<(String, Option<String>)> = dim_concepts::table
            .filter(dim_concepts::id.eq_any(&concept_ids))
            .select((dim_concepts::concept_name, dim_concepts::normalized_label))
            .load(&mut conn)
            .await?;

        let coverage = required_metric_coverage(&concepts);
        let missing: Vec<&str> = REQUIRED_METRICS
            .iter()
            .filter(|metric| !coverage.get(*metric).copied().unwrap_or(false))
            .copied()
            .collect();

        let passed = missing.is_empty();
        let mut result = ValidationResult::new(
            &format!("universal_metrics_{}", ticker),
            passed,
            if passed { Severity::Info } else { Severity::Warning },
            format!("Universal metric completeness: {}", ticker),
        );
        result.details = Some(serde_json::json!({ "missing": missing }));
        results.push(result);
    }

    Ok(results)
}

/// Check Assets = Liabilities + Equity across the whole warehouse, per
/// (company, fiscal year), on consolidated facts.
pub async fn check_warehouse_balance(pool: &DatabasePool) -> AppResult<Vec<ValidationResult>> {
    use finstmt_core::schema::dim_time_periods;

    let mut conn = pool.get().await?;

    let assets_ids: Vec<Uuid> = dim_concepts::table
        .filter(dim_concepts::normalized_label.eq("total_assets"))
        .select(dim_concepts::id)
        .load(&mut conn)
        .await?;
    let liabilities_equity_ids: Vec<Uuid> = dim_concepts::table
        .filter(dim_concepts::normalized_label.eq("total_assets_equation"))
        .select(dim_concepts::id)
        .load(&mut conn)
        .await?;

    if assets_ids.is_empty() || liabilities_equity_ids.is_empty() {
        return Ok(vec![]);
    }

    let mut all_ids = assets_ids.clone();
    all_ids.extend(liabilities_equity_ids.iter().copied());

    let facts: Vec<(Uuid, Uuid, Uuid, Option<BigDecimal>)> = fact_financial_metrics::table
        .filter(fact_financial_metrics::dimension_id.is_null())
        .filter(fact_financial_metrics::concept_id.eq_any(&all_ids))
        .select((
            fact_financial_metrics::company_id,
            fact_financial_metrics::concept_id,
            fact_financial_metrics::period_id,
            fact_financial_metrics::value_numeric,
        ))
        .load(&mut conn)
        .await?;

    let period_years: HashMap<Uuid, Option<i32>> = {
        let period_ids: Vec<Uuid> = facts
            .iter()
            .map(|(_, _, period_id, _)| *period_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        dim_time_periods::table
            .filter(dim_time_periods::id.eq_any(&period_ids))
            .select((dim_time_periods::id, dim_time_periods::fiscal_year))
            .load::<(Uuid, Option<i32>)>(&mut conn)
            .await?
            .into_iter()
            .collect()
    };

    let tickers: HashMap<Uuid, String> = dim_companies::table
        .select((dim_companies::id, dim_companies::ticker))
        .load::<(Uuid, String)>(&mut conn)
        .await?
        .into_iter()
        .collect();

    let assets_set: HashSet<Uuid> = assets_ids.into_iter().collect();
    let mut by_key: HashMap<(Uuid, i32), (Option<f64>, Option<f64>)> = HashMap::new();
    for (company_id, concept_id, period_id, value) in facts {
        let Some(year) = period_years.get(&period_id).copied().flatten() else {
            continue;
        };
        let Some(value) = value.as_ref().and_then(to_f64) else { continue };
        let entry = by_key.entry((company_id, year)).or_insert((None, None));
        if assets_set.contains(&concept_id) {
            entry.0 = Some(value);
        } else {
            entry.1 = Some(value);
        }
    }

    let mut results = Vec::new();
    for ((company_id, year), (assets, liabilities_equity)) in by_key {
        let (Some(assets), Some(liabilities_equity)) = (assets, liabilities_equity) else {
            continue;
        };
        if assets == 0.0 {
            continue;
        }
        let diff_pct = (assets - liabilities_equity).abs() / assets.abs() * 100.0;
        let passed = diff_pct <= 1.0;
        let ticker = tickers
            .get(&company_id)
            .map(|t| t.as_str())
            .unwrap_or("?");

        let mut result = ValidationResult::new(
            &format!("warehouse_balance_{}_{}", ticker, year),
            passed,
            if passed { Severity::Info } else { Severity::Error },
            format!("Balance sheet equation: {} FY{}", ticker, year),
        );
        result.expected_value = Some(liabilities_equity);
        result.actual_value = Some(assets);
        result.tolerance_pct = Some(1.0);
        results.push(result);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fact(concept: &str, value: f64, instant: Option<NaiveDate>) -> RawFact {
        RawFact {
            concept: concept.to_string(),
            value_numeric: Some(value),
            instant_date: instant,
            period_end: if instant.is_none() {
                NaiveDate::from_ymd_opt(2024, 12, 31)
            } else {
                None
            },
            ..Default::default()
        }
    }

    fn balance_facts(assets: f64, liabilities: f64, equity: f64) -> Vec<RawFact> {
        let date = NaiveDate::from_ymd_opt(2024, 12, 31);
        vec![
            fact("Assets", assets, date),
            fact("Liabilities", liabilities, date),
            fact("StockholdersEquity", equity, date),
        ]
    }

    #[test]
    fn balanced_sheet_passes() {
        // REQUIREMENT: Assets = Liabilities + Equity within 1% passes
        // PURPOSE: Verify the raw-facts balance rule on a balanced filing
        let validator = RawFactsValidator::default();
        let report =
            validator.validate_filing(&balance_facts(100.0, 60.0, 40.0), "NVO", "ESEF", "2024-12-31");
        let balance = report
            .results
            .iter()
            .find(|r| r.rule_name == "balance_sheet_equation")
            .unwrap();
        assert!(balance.passed);
    }

    #[test]
    fn unbalanced_sheet_is_an_error() {
        // REQUIREMENT: A broken balance-sheet equation is ERROR severity
        // PURPOSE: Verify the rule fails with the severity the loader
        // blocks on
        let validator = RawFactsValidator::default();
        let report =
            validator.validate_filing(&balance_facts(100.0, 60.0, 30.0), "NVO", "ESEF", "2024-12-31");
        let balance = report
            .results
            .iter()
            .find(|r| r.rule_name == "balance_sheet_equation")
            .unwrap();
        assert!(!balance.passed);
        assert_eq!(balance.severity, Severity::Error);
    }

    #[test]
    fn eps_sanity_uses_three_percent_tolerance() {
        // REQUIREMENT: EPS must approximate net income over basic shares
        // within 3%
        // PURPOSE: Verify the widened EPS tolerance and WARNING severity
        let validator = RawFactsValidator::default();
        let mut facts = vec![
            fact("NetIncomeLoss", 1000.0, None),
            fact("WeightedAverageNumberOfSharesOutstandingBasic", 100.0, None),
            fact("EarningsPerShareBasic", 10.2, None),
        ];
        let report = validator.validate_filing(&facts, "X", "10-K", "2024-12-31");
        let eps = report
            .results
            .iter()
            .find(|r| r.rule_name == "eps_calculation")
            .unwrap();
        assert!(eps.passed); // within 3%

        facts[2].value_numeric = Some(12.0);
        let report = validator.validate_filing(&facts, "X", "10-K", "2024-12-31");
        let eps = report
            .results
            .iter()
            .find(|r| r.rule_name == "eps_calculation")
            .unwrap();
        assert!(!eps.passed);
        assert_eq!(eps.severity, Severity::Warning);
    }

    #[test]
    fn duplicate_facts_are_counted() {
        // REQUIREMENT: Duplicate facts by (concept, period, dimensions,
        // text) are detected
        // PURPOSE: Verify the duplicate rule fires on a repeated fact
        let date = NaiveDate::from_ymd_opt(2024, 12, 31);
        let facts = vec![
            fact("Assets", 100.0, date),
            fact("Assets", 100.0, date),
        ];
        let result = check_duplicates(&facts);
        assert!(!result.passed);
    }

    #[test]
    fn weighted_score_thresholds() {
        // REQUIREMENT: Reports score ERROR 3 / WARNING 2 / INFO 1 and pass
        // at 0.90
        // PURPOSE: Verify the weighted arithmetic on mixed results
        let mut report = ValidationReport::new("database", "all");
        // One failed error (weight 3) against nine passed infos (9):
        // 9/12 = 0.75 < 0.90
        report.add_result(ValidationResult::new(
            "err",
            false,
            Severity::Error,
            "e".to_string(),
        ));
        for i in 0..9 {
            report.add_result(ValidationResult::new(
                &format!("info_{}", i),
                true,
                Severity::Info,
                "i".to_string(),
            ));
        }
        report.calculate_score();
        assert!(!report.passed);
        assert!((report.overall_score - 0.75).abs() < 1e-9);

        // All passed: score 1.0
        let mut report = ValidationReport::new("database", "all");
        report.add_result(ValidationResult::new("ok", true, Severity::Error, "m".to_string()));
        report.calculate_score();
        assert!(report.passed);
        assert_eq!(report.overall_score, 1.0);
    }

    #[test]
    fn bank_vocabulary_satisfies_universal_metrics() {
        // REQUIREMENT: Bank-equivalent concepts satisfy the taxonomy-driven
        // universal metrics (financing receivables, deposits, accrued-and-
        // other, cash-and-due-from-banks)
        // PURPOSE: Verify a bank's concept set reports no missing metrics
        let concepts = vec![
            ("CashAndDueFromBanks".to_string(), Some("cash_and_equivalents".to_string())),
            (
                "FinancingReceivableExcludingAccruedInterestBeforeAllowanceForCreditLoss"
                    .to_string(),
                Some("accounts_receivable".to_string()),
            ),
            (
                "InterestBearingDepositLiabilitiesDomestic".to_string(),
                Some("interest_bearing_deposit_liabilities_domestic".to_string()),
            ),
            ("Liabilities".to_string(), Some("total_liabilities".to_string())),
            ("Assets".to_string(), Some("total_assets".to_string())),
            ("StockholdersEquity".to_string(), Some("stockholders_equity".to_string())),
            ("Revenues".to_string(), Some("revenue".to_string())),
            ("NetIncomeLoss".to_string(), Some("net_income".to_string())),
            (
                "AccruedLiabilitiesAndOtherLiabilities".to_string(),
                Some("accrued_liabilities_and_other_liabilities".to_string()),
            ),
            (
                "NetCashProvidedByUsedInOperatingActivities".to_string(),
                Some("operating_cash_flow".to_string()),
            ),
        ];

        let coverage = required_metric_coverage(&concepts);
        assert!(coverage["cash_and_equivalents"]);
        assert!(coverage["accounts_receivable"]);
        assert!(coverage["current_liabilities"]);
        assert!(coverage["accounts_payable"]); // accrued-and-other, bank rule
        // Derived: total + current -> noncurrent
        assert!(coverage["noncurrent_liabilities"]);
        let missing: Vec<_> = REQUIRED_METRICS
            .iter()
            .filter(|metric| !coverage[**metric])
            .collect();
        assert!(missing.is_empty(), "missing: {:?}", missing);
    }

    #[test]
    fn allowance_variants_do_not_count_as_receivables() {
        // REQUIREMENT: Allowance/credit-loss variants are not receivables
        // PURPOSE: Verify the financing-receivable match excludes them
        let concepts = vec![(
            "FinancingReceivableAllowanceForCreditLoss".to_string(),
            Some("financing_receivable_allowance_for_credit_loss".to_string()),
        )];
        let coverage = required_metric_coverage(&concepts);
        assert!(!coverage["accounts_receivable"]);
    }
}
