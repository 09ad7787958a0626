//! # Finstmt Core
//!
//! Warehouse schema, data models, database pool, configuration, and shared
//! error types for the finstmt statement pipeline. This crate is the
//! foundation layer the taxonomy store, pipeline stages, and CLI build on.

pub mod config;
pub mod database;
pub mod enums;
pub mod error;
pub mod models;
pub mod schema;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use database::{create_pool, run_migrations, DatabasePool};
pub use error::{AppError, AppResult};

// Re-export all models for convenience
pub use models::*;
