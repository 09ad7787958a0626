//! # Finstmt Pipeline
//!
//! The transformation stages between a parsed filing document and the
//! per-statement tables a UI renders: normalization, warehouse loading,
//! hierarchy population, calculated totals, statement organization,
//! statement-fact materialization, and validation.
//!
//! Stages are async functions over the shared connection pool; pure
//! decision logic (orderings, side assignment, sign rules, label
//! resolution) lives in plain functions so it tests without a database.

pub mod hierarchy;
pub mod loader;
pub mod mappings;
pub mod materializer;
pub mod normalize;
pub mod ordering;
pub mod organizer;
pub mod synonyms;
pub mod synthesize;
pub mod totals;
pub mod validator;

pub use loader::{load_filing, LoadSummary};
pub use materializer::{materialize_statements, MaterializeSummary};
pub use normalize::{normalize_concepts, NormalizationStats};
pub use organizer::populate_statement_items;
pub use validator::{DatabaseValidator, RawFactsValidator, ValidationReport, ValidationResult};
