//! Pipeline entry point: loads extracted filing documents into the
//! warehouse, runs the normalization/hierarchy/totals passes, organizes
//! and materializes the statements, and validates the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use finstmt_core::database::{create_pool, run_migrations, DatabasePool};
use finstmt_core::enums::Severity;
use finstmt_core::models::FilingDocument;
use finstmt_core::Config;
use finstmt_pipeline::validator::{
    check_warehouse_balance, DatabaseValidator, RawFactsValidator, ValidationResult,
};
use finstmt_pipeline::{hierarchy, normalize, synonyms, synthesize, totals};
use finstmt_taxonomy::{download, TaxonomyStore};

#[derive(Parser)]
#[command(name = "finstmt", about = "Financial statement warehouse pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a directory of extracted filing JSON documents and run the
    /// full pipeline
    Load {
        /// Directory of per-filing *_facts.json documents; defaults to
        /// DATA_DIR
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Run warehouse validation and write the consolidated report
    Validate,
    /// Re-run statement organization and materialization for one filing
    Replay {
        /// Filing id to rebuild
        #[arg(long)]
        filing_id: uuid::Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    let pool = create_pool(&config.database_url(), config.database.max_connections)
        .await
        .context("creating database pool")?;
    run_migrations(&config.database_url())
        .await
        .context("running migrations")?;
    match cli.command {
        Command::Load { data_dir } => {
            let data_dir = data_dir.unwrap_or_else(|| config.pipeline.data_dir.clone());
            run_pipeline(&pool, &config, &data_dir).await?;
        }
        Command::Validate => {
            run_validation(&pool, &config, Vec::new()).await?;
        }
        Command::Replay { filing_id } => {
            replay_filing(&pool, filing_id).await?;
        }
    }

    Ok(())
}

/// Read every filing document in the data directory
fn read_filing_documents(data_dir: &Path) -> Result<Vec<FilingDocument>> {
    let mut documents = Vec::new();

    let entries = std::fs::read_dir(data_dir)
        .with_context(|| format!("reading data directory {}", data_dir.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();
        let is_facts_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with("_facts.json") || name.ends_with(".json"))
            .unwrap_or(false);
        if !is_facts_file {
            continue;
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        match serde_json::from_str::<FilingDocument>(&content) {
            Ok(doc) => documents.push(doc),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    Ok(documents)
}

async fn run_pipeline(pool: &DatabasePool, config: &Config, data_dir: &Path) -> Result<()> {
    let documents = read_filing_documents(data_dir)?;
    if documents.is_empty() {
        warn!("No filing documents found in {}", data_dir.display());
        return Ok(());
    }
    info!("Found {} filings to load", documents.len());

    // Taxonomy store loads once; download any linkbases the corpus needs
    let standards: Vec<String> = documents
        .iter()
        .map(|doc| {
            let filing_type = doc.filing_type.as_deref().unwrap_or("");
            if filing_type.contains("20-F") || filing_type.contains("ESEF") {
                "IFRS".to_string()
            } else {
                "US-GAAP".to_string()
            }
        })
        .collect();
    if let Err(e) = download::download_missing(&config.pipeline.taxonomy_dir, &standards).await {
        warn!("Taxonomy download failed, continuing with local files: {}", e);
    }
    let store = Arc::new(TaxonomyStore::load_from_dir(&config.pipeline.taxonomy_dir)?);

    // Phase 1: load filings, parallel across filings with a bounded
    // worker pool; one connection per worker.
    let semaphore = Arc::new(Semaphore::new(config.pipeline.workers.max(1)));
    let mut join_set: JoinSet<Option<uuid::Uuid>> = JoinSet::new();

    for doc in documents {
        let pool = pool.clone();
        let semaphore = semaphore.clone();
        join_set.spawn(async move {
            let _permit = semaphore.acquire().await.ok()?;

            let ticker = doc.company.clone();
            let raw_report = RawFactsValidator::default().validate_filing(
                &doc.facts,
                &ticker,
                doc.filing_type.as_deref().unwrap_or("?"),
                &doc.year.map(|y| y.to_string()).unwrap_or_default(),
            );
            info!(
                "{}: raw-facts validation score {:.1}% ({} errors, {} warnings)",
                ticker,
                raw_report.overall_score * 100.0,
                raw_report.errors().len(),
                raw_report.warnings().len()
            );

            match finstmt_pipeline::load_filing(&pool, &doc).await {
                Ok(summary) => Some(summary.filing_id),
                Err(e) => {
                    // A rejected filing rolls back wholesale; the
                    // pipeline continues with the rest of the corpus.
                    error!("{}: filing rejected: {}", ticker, e);
                    None
                }
            }
        });
    }

    let mut filing_ids = Vec::new();
    while let Some(result) = join_set.join_next().await {
        if let Ok(Some(filing_id)) = result {
            filing_ids.push(filing_id);
        }
    }
    info!("Loaded {} filings", filing_ids.len());
    log_corpus_stats(pool).await?;

    // Phase 2: corpus-wide passes (shared dimensions, so sequential)
    let hierarchy_report = hierarchy::populate_hierarchy(pool, &store).await?;
    normalize::normalize_concepts(pool, &store).await?;
    synonyms::apply_taxonomy_synonyms(pool, &store).await?;

    let calculated = totals::calculate_missing_totals(pool).await?;
    for (metric, count) in &calculated {
        info!("Calculated {} missing totals for {}", count, metric);
    }

    // Phase 3: statement organization and materialization, parallel
    // across filings again.
    let mut join_set: JoinSet<()> = JoinSet::new();
    for filing_id in filing_ids {
        let pool = pool.clone();
        let semaphore = semaphore.clone();
        join_set.spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else { return };
            if let Err(e) = build_statements(&pool, filing_id).await {
                error!("Filing {}: statement build failed: {}", filing_id, e);
            }
        });
    }
    while join_set.join_next().await.is_some() {}

    // Phase 4: terminal validation pass, carrying the hierarchy pass's
    // parent-vs-children mismatches as ERROR results.
    run_validation(pool, config, hierarchy_error_results(&hierarchy_report)).await?;

    Ok(())
}

/// Parent-summation mismatches from the hierarchy pass, as ERROR results
/// for the consolidated report.
fn hierarchy_error_results(report: &hierarchy::HierarchyReport) -> Vec<ValidationResult> {
    report
        .validation_errors
        .iter()
        .enumerate()
        .map(|(index, message)| {
            ValidationResult::new(
                &format!("parent_child_summation_{}", index),
                false,
                Severity::Error,
                message.clone(),
            )
        })
        .collect()
}

/// Corpus-level statistics after a load: fact totals and the
/// dimensional/consolidated split.
async fn log_corpus_stats(pool: &DatabasePool) -> Result<()> {
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;
    use finstmt_core::schema::{dim_companies, fact_financial_metrics};

    let mut conn = pool.get().await?;

    let total_facts: i64 = fact_financial_metrics::table
        .count()
        .get_result(&mut conn)
        .await?;
    let dimensional_facts: i64 = fact_financial_metrics::table
        .filter(fact_financial_metrics::dimension_id.is_not_null())
        .count()
        .get_result(&mut conn)
        .await?;
    let companies: i64 = dim_companies::table.count().get_result(&mut conn).await?;

    info!(
        "Warehouse: {} facts across {} companies ({} dimensional, {} consolidated)",
        total_facts,
        companies,
        dimensional_facts,
        total_facts - dimensional_facts
    );
    Ok(())
}

async fn build_statements(
    pool: &DatabasePool,
    filing_id: uuid::Uuid,
) -> finstmt_core::AppResult<()> {
    synthesize::populate_standard_presentation(pool, filing_id).await?;
    finstmt_pipeline::populate_statement_items(pool, filing_id).await?;
    finstmt_pipeline::materialize_statements(pool, filing_id).await?;
    Ok(())
}

async fn replay_filing(pool: &DatabasePool, filing_id: uuid::Uuid) -> Result<()> {
    info!("Replaying statement build for filing {}", filing_id);
    build_statements(pool, filing_id).await?;
    Ok(())
}

async fn run_validation(
    pool: &DatabasePool,
    config: &Config,
    extra_results: Vec<ValidationResult>,
) -> Result<()> {
    let mut report = DatabaseValidator::validate_all(pool).await?;
    for result in check_warehouse_balance(pool).await? {
        report.add_result(result);
    }
    for result in extra_results {
        report.add_result(result);
    }
    report.calculate_score();

    let errors = report.errors();
    let warnings = report.warnings();
    if report.passed {
        info!("Validation passed (score {:.1}%)", report.overall_score * 100.0);
    } else {
        warn!(
            "Validation completed with issues: {} errors, {} warnings, score {:.1}%",
            errors.len(),
            warnings.len(),
            report.overall_score * 100.0
        );
        for err in errors.iter().take(5) {
            warn!("  ERROR {}: {}", err.rule_name, err.message);
        }
    }

    std::fs::create_dir_all(&config.pipeline.report_dir)?;
    let report_path = config.pipeline.report_dir.join(format!(
        "validation-{}.json",
        report.validation_timestamp.format("%Y%m%dT%H%M%S")
    ));
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
    info!("Validation report written to {}", report_path.display());

    Ok(())
}
