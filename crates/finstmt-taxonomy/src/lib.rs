//! # Finstmt Taxonomy
//!
//! The taxonomy store: calculation and label linkbases for the taxonomies
//! a corpus uses (US-GAAP, IFRS, ESEF), loaded once at startup from
//! pre-extracted JSON files and shared read-only across every pipeline
//! stage. Also provides the downloader that fetches missing linkbase
//! files.

pub mod download;
pub mod files;
pub mod store;

pub use files::{CalcLinkbaseFile, LabelsFile, TaxonomyConceptLabel, TaxonomyRelationship};
pub use store::{taxonomy_family, ParentLink, TaxonomyStore};
