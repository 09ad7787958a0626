use thiserror::Error;

/// Application-specific error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Database pool error: {0}")]
    DatabasePool(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Validation errors: {0}")]
    ValidationErrors(#[from] validator::ValidationErrors),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A requested taxonomy linkbase file could not be opened.
    /// Downgrades hierarchy population to the pattern-matching fallback.
    #[error("Taxonomy missing: {0}")]
    TaxonomyMissing(String),

    /// A taxonomy linkbase file exists but is not valid JSON. Fatal at
    /// startup: the store would silently misclassify every concept.
    #[error("Taxonomy corrupt: {0}")]
    TaxonomyCorrupt(String),

    /// Assets != Liabilities + Equity beyond tolerance after loading a
    /// filing. The filing's transaction is rolled back in full.
    #[error("Balance sheet violation: {0}")]
    BalanceSheetViolation(String),

    /// The fact natural key fired during load. The upsert wins; this kind
    /// only surfaces when a caller asks for strict insert semantics.
    #[error("Duplicate fact conflict: {0}")]
    DuplicateFactConflict(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Parser error: {0}")]
    ParserError(String),
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Convert from bb8 pool error
impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for AppError {
    fn from(err: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        AppError::DatabasePool(err.to_string())
    }
}

/// Convert from diesel migration error
impl From<diesel_migrations::MigrationError> for AppError {
    fn from(err: diesel_migrations::MigrationError) -> Self {
        AppError::MigrationError(err.to_string())
    }
}

/// Convert from chrono parse error
impl From<chrono::ParseError> for AppError {
    fn from(err: chrono::ParseError) -> Self {
        AppError::InvalidDateFormat(err.to_string())
    }
}

/// Convert from uuid parse error
impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::ValidationError(format!("Invalid UUID: {}", err))
    }
}

/// Convert from bigdecimal parse error
impl From<bigdecimal::ParseBigDecimalError> for AppError {
    fn from(err: bigdecimal::ParseBigDecimalError) -> Self {
        AppError::ValidationError(format!("Invalid decimal: {}", err))
    }
}

/// Convert from config error
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Utility functions for common error scenarios
impl AppError {
    pub fn not_found<T: std::fmt::Display>(resource: T) -> Self {
        AppError::NotFound(format!("{} not found", resource))
    }

    pub fn internal_error<T: std::fmt::Display>(message: T) -> Self {
        AppError::InternalError(message.to_string())
    }

    pub fn validation_error<T: std::fmt::Display>(message: T) -> Self {
        AppError::ValidationError(message.to_string())
    }

    /// Log the error with appropriate level and context
    /// This should be called before returning the error to ensure it's logged
    pub fn log_with_context(&self, context: &str) {
        match self {
            // Critical errors that need immediate attention
            AppError::Database(_)
            | AppError::DatabasePool(_)
            | AppError::MigrationError(_)
            | AppError::InternalError(_)
            | AppError::TaxonomyCorrupt(_)
            | AppError::BalanceSheetViolation(_) => {
                tracing::error!("{} - {}: {}", context, self.error_type(), self);
            }
            // External service errors
            AppError::ExternalApiError(_) => {
                tracing::error!("{} - {}: {}", context, self.error_type(), self);
            }
            // Degraded-but-recoverable conditions
            AppError::TaxonomyMissing(_) => {
                tracing::warn!("{} - {}: {}", context, self.error_type(), self);
            }
            // Client/data errors (warnings)
            AppError::ValidationError(_)
            | AppError::ValidationErrors(_)
            | AppError::InvalidDateFormat(_)
            | AppError::ParserError(_)
            | AppError::ConfigError(_) => {
                tracing::warn!("{} - {}: {}", context, self.error_type(), self);
            }
            // Expected-in-normal-operation conditions (info level)
            AppError::NotFound(_) | AppError::DuplicateFactConflict(_) => {
                tracing::info!("{} - {}: {}", context, self.error_type(), self);
            }
            _ => {
                tracing::error!("{} - {}: {}", context, self.error_type(), self);
            }
        }
    }

    /// Get a human-readable error type for logging
    fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DatabaseError",
            AppError::DatabasePool(_) => "DatabasePoolError",
            AppError::JsonSerialization(_) => "JsonSerializationError",
            AppError::Io(_) => "IoError",
            AppError::ValidationError(_) => "ValidationError",
            AppError::ValidationErrors(_) => "ValidationErrors",
            AppError::ConfigError(_) => "ConfigError",
            AppError::InvalidDateFormat(_) => "InvalidDateFormat",
            AppError::MigrationError(_) => "MigrationError",
            AppError::InternalError(_) => "InternalError",
            AppError::NotFound(_) => "NotFound",
            AppError::TaxonomyMissing(_) => "TaxonomyMissing",
            AppError::TaxonomyCorrupt(_) => "TaxonomyCorrupt",
            AppError::BalanceSheetViolation(_) => "BalanceSheetViolation",
            AppError::DuplicateFactConflict(_) => "DuplicateFactConflict",
            AppError::ExternalApiError(_) => "ExternalApiError",
            AppError::ParserError(_) => "ParserError",
        }
    }
}
