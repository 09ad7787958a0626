//! Integration tests for the database-touching pipeline stages, run
//! against an ephemeral Postgres warehouse (`TestContainer`). Tests skip
//! themselves when neither `DATABASE_URL` nor a container runtime is
//! available.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use finstmt_core::error::AppError;
use finstmt_core::models::{FilingDocument, FilingMetadata, NewConcept, RawFact};
use finstmt_core::schema::{dim_companies, dim_concepts, fact_financial_metrics};
use finstmt_core::test_utils::TestContainer;
use finstmt_pipeline::hierarchy::populate_hierarchy;
use finstmt_pipeline::load_filing;
use finstmt_pipeline::synonyms::apply_taxonomy_synonyms;
use finstmt_taxonomy::TaxonomyStore;

/// Clean warehouse or skip: the caller returns early on None.
async fn test_db() -> Option<TestContainer> {
    let Some(db) = TestContainer::try_new().await else {
        eprintln!("skipping: no test database available");
        return None;
    };
    db.clean_database().await.ok()?;
    Some(db)
}

fn instant_fact(concept: &str, value: f64, date: NaiveDate) -> RawFact {
    RawFact {
        concept: concept.to_string(),
        taxonomy: Some("us-gaap".to_string()),
        value_numeric: Some(value),
        unit_measure: Some("USD".to_string()),
        period_type: Some("instant".to_string()),
        instant_date: Some(date),
        ..Default::default()
    }
}

fn duration_fact(concept: &str, value: f64, start: NaiveDate, end: NaiveDate) -> RawFact {
    RawFact {
        concept: concept.to_string(),
        taxonomy: Some("us-gaap".to_string()),
        value_numeric: Some(value),
        unit_measure: Some("USD".to_string()),
        period_type: Some("duration".to_string()),
        period_start: Some(start),
        period_end: Some(end),
        ..Default::default()
    }
}

fn doc(ticker: &str, filing_type: &str, facts: Vec<RawFact>) -> FilingDocument {
    FilingDocument {
        company: ticker.to_string(),
        filing_type: Some(filing_type.to_string()),
        year: Some(2024),
        metadata: FilingMetadata {
            company_name: Some(format!("{} Inc.", ticker)),
            ..Default::default()
        },
        facts,
        relationships: Default::default(),
    }
}

fn balanced_facts() -> Vec<RawFact> {
    let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    vec![
        instant_fact("Assets", 1000.0, date),
        instant_fact("LiabilitiesAndStockholdersEquity", 1000.0, date),
        instant_fact("Liabilities", 600.0, date),
        instant_fact("StockholdersEquity", 400.0, date),
        duration_fact("Revenues", 900.0, start, date),
    ]
}

#[tokio::test]
#[serial_test::serial]
async fn loader_is_idempotent_across_reruns() {
    // REQUIREMENT: Re-running the loader over the same input yields the
    // same fact set (round-trip property of the fact upsert)
    // PURPOSE: Exercise get-or-create dimensions and the natural-key
    // upsert against a real warehouse
    let Some(db) = test_db().await else { return };
    let document = doc("ACME", "10-K", balanced_facts());

    let first = load_filing(db.pool(), &document)
        .await
        .expect("first load should succeed");
    let second = load_filing(db.pool(), &document)
        .await
        .expect("second load should succeed");

    assert_eq!(first.filing_id, second.filing_id);
    assert_eq!(first.company_id, second.company_id);

    let mut conn = db.pool().get().await.unwrap();
    let fact_count: i64 = fact_financial_metrics::table
        .filter(fact_financial_metrics::filing_id.eq(first.filing_id))
        .count()
        .get_result(&mut conn)
        .await
        .unwrap();
    assert_eq!(fact_count, balanced_facts().len() as i64);
}

#[tokio::test]
#[serial_test::serial]
async fn unbalanced_filing_rolls_back_wholesale() {
    // REQUIREMENT: Assets != Liabilities + Equity beyond 1% rejects the
    // filing with no partial state persisted
    // PURPOSE: Verify the pre-commit check raises BalanceSheetViolation
    // and the transaction rollback removes every row, company included
    let Some(db) = test_db().await else { return };

    let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let document = doc(
        "BADCO",
        "10-K",
        vec![
            instant_fact("Assets", 1000.0, date),
            instant_fact("LiabilitiesAndStockholdersEquity", 700.0, date),
        ],
    );

    let err = load_filing(db.pool(), &document)
        .await
        .expect_err("unbalanced filing must be rejected");
    assert!(matches!(err, AppError::BalanceSheetViolation(_)));

    let mut conn = db.pool().get().await.unwrap();
    let companies: i64 = dim_companies::table
        .filter(dim_companies::ticker.eq("BADCO"))
        .count()
        .get_result(&mut conn)
        .await
        .unwrap();
    assert_eq!(companies, 0);
}

#[tokio::test]
#[serial_test::serial]
async fn accounting_standard_upgrades_to_ifrs() {
    // REQUIREMENT: A 20-F/ESEF filing upgrades the company's standard to
    // IFRS; the upgrade is idempotent and one-way
    // PURPOSE: Exercise get_or_create_company's update path across two
    // filings of the same ticker
    let Some(db) = test_db().await else { return };

    load_filing(db.pool(), &doc("NVO", "10-K", balanced_facts()))
        .await
        .expect("10-K load should succeed");

    let mut ifrs_doc = doc("NVO", "20-F", balanced_facts());
    ifrs_doc.year = Some(2023);
    load_filing(db.pool(), &ifrs_doc)
        .await
        .expect("20-F load should succeed");

    let mut conn = db.pool().get().await.unwrap();
    let standard: String = dim_companies::table
        .filter(dim_companies::ticker.eq("NVO"))
        .select(dim_companies::accounting_standard)
        .first(&mut conn)
        .await
        .unwrap();
    assert_eq!(standard, "IFRS");
}

#[tokio::test]
#[serial_test::serial]
async fn hierarchy_links_classify_and_derive_parent_facts() {
    // REQUIREMENT: Taxonomy arcs set parent links, tree position drives
    // the level classification, and a parent with all children reported
    // gets a calculated fact
    // PURPOSE: Exercise apply_taxonomy_links, classify_levels storage,
    // and calculate_missing_parent_facts against loaded facts
    let Some(db) = test_db().await else { return };

    let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    // Assets appears only with a dimension, so the consolidated parent
    // fact is missing while both children are reported.
    let mut dimensional_assets = instant_fact("Assets", 990.0, date);
    dimensional_assets.dimensions.insert(
        "GeographicalAreasAxis".to_string(),
        serde_json::json!({"member": "UnitedStatesMember"}),
    );
    let document = doc(
        "HIER",
        "10-K",
        vec![
            instant_fact("AssetsCurrent", 600.0, date),
            instant_fact("AssetsNoncurrent", 400.0, date),
            dimensional_assets,
        ],
    );
    load_filing(db.pool(), &document)
        .await
        .expect("load should succeed");

    let store = TaxonomyStore::from_arcs(
        "us-gaap-2024",
        vec![
            ("Assets".to_string(), "AssetsCurrent".to_string(), 1.0),
            ("Assets".to_string(), "AssetsNoncurrent".to_string(), 1.0),
        ],
    );
    let report = populate_hierarchy(db.pool(), &store)
        .await
        .expect("hierarchy pass should succeed");

    assert_eq!(report.taxonomy_links_set, 2);
    assert!(report.calculated_parent_facts >= 1);
    assert!(report.validation_errors.is_empty());

    let mut conn = db.pool().get().await.unwrap();
    let (assets_id, assets_level): (Uuid, Option<i32>) = dim_concepts::table
        .filter(dim_concepts::concept_name.eq("Assets"))
        .select((dim_concepts::id, dim_concepts::hierarchy_level))
        .first(&mut conn)
        .await
        .unwrap();
    assert_eq!(assets_level, Some(4));

    let child_level: Option<i32> = dim_concepts::table
        .filter(dim_concepts::concept_name.eq("AssetsCurrent"))
        .select(dim_concepts::hierarchy_level)
        .first(&mut conn)
        .await
        .unwrap();
    assert_eq!(child_level, Some(1));

    let (value, is_calculated): (Option<BigDecimal>, bool) = fact_financial_metrics::table
        .filter(fact_financial_metrics::concept_id.eq(assets_id))
        .filter(fact_financial_metrics::dimension_id.is_null())
        .select((
            fact_financial_metrics::value_numeric,
            fact_financial_metrics::is_calculated,
        ))
        .first(&mut conn)
        .await
        .unwrap();
    assert!(is_calculated);
    assert_eq!(value, Some(BigDecimal::from(1000)));
}

#[tokio::test]
#[serial_test::serial]
async fn synonym_application_is_taxonomy_scoped() {
    // REQUIREMENT: Synonym groups rewrite labels only within their own
    // taxonomy family in a mixed US-GAAP/IFRS corpus
    // PURPOSE: Exercise apply_taxonomy_synonyms with same-named concepts
    // under two frameworks
    let Some(db) = test_db().await else { return };
    let mut conn = db.pool().get().await.unwrap();

    let rows = vec![
        concept_row("IFRS", "Turnover", "turnover"),
        concept_row("IFRS", "Revenue", "revenue"),
        concept_row("us-gaap", "Turnover", "us_turnover"),
    ];
    diesel::insert_into(dim_concepts::table)
        .values(&rows)
        .execute(&mut conn)
        .await
        .unwrap();
    drop(conn);

    let mut store = TaxonomyStore::from_arcs("ifrs", vec![]);
    store.insert_synonym("ifrs-2024", "Turnover", "Revenue");

    let updated = apply_taxonomy_synonyms(db.pool(), &store)
        .await
        .expect("synonym pass should succeed");
    assert_eq!(updated, 1);

    let mut conn = db.pool().get().await.unwrap();
    let ifrs_label: Option<String> = dim_concepts::table
        .filter(dim_concepts::taxonomy.eq("IFRS"))
        .filter(dim_concepts::concept_name.eq("Turnover"))
        .select(dim_concepts::normalized_label)
        .first(&mut conn)
        .await
        .unwrap();
    assert_eq!(ifrs_label.as_deref(), Some("revenue"));

    // The same-named US-GAAP concept keeps its own label
    let gaap_label: Option<String> = dim_concepts::table
        .filter(dim_concepts::taxonomy.eq("us-gaap"))
        .filter(dim_concepts::concept_name.eq("Turnover"))
        .select(dim_concepts::normalized_label)
        .first(&mut conn)
        .await
        .unwrap();
    assert_eq!(gaap_label.as_deref(), Some("us_turnover"));
}

fn concept_row(taxonomy: &str, concept_name: &str, normalized_label: &str) -> NewConcept {
    NewConcept {
        taxonomy: taxonomy.to_string(),
        concept_name: concept_name.to_string(),
        normalized_label: Some(normalized_label.to_string()),
        preferred_label: None,
        concept_type: Some("monetary".to_string()),
        balance_type: None,
        period_type: Some("duration".to_string()),
        data_type: None,
        is_abstract: false,
        statement_type: Some("income_statement".to_string()),
    }
}
