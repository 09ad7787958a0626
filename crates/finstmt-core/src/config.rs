use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Application configuration
///
/// Loaded from environment variables (with `.env` support). The database
/// parameters intentionally mirror the standard `POSTGRES_*` variable set
/// so the same environment works for the warehouse and for any SQL client
/// pointed at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory of extracted per-filing JSON fact streams
    pub data_dir: PathBuf,
    /// Directory holding `<taxonomy>-calc.json` / `<taxonomy>-labels.json`
    pub taxonomy_dir: PathBuf,
    /// Directory where validation reports are written
    pub report_dir: PathBuf,
    /// Worker pool size; defaults to the number of CPU cores
    pub workers: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Config {
            database: DatabaseConfig {
                host: env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: env::var("POSTGRES_PORT")
                    .unwrap_or_else(|_| "5432".to_string())
                    .parse()
                    .unwrap_or(5432),
                user: env::var("POSTGRES_USER").unwrap_or_else(|_| "finstmt".to_string()),
                password: env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "finstmt".to_string()),
                database: env::var("POSTGRES_DB").unwrap_or_else(|_| "finstmt".to_string()),
                max_connections: env::var("POSTGRES_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .unwrap_or(20),
            },
            pipeline: PipelineConfig {
                data_dir: env::var("DATA_DIR")
                    .unwrap_or_else(|_| "data/processed".to_string())
                    .into(),
                taxonomy_dir: env::var("TAXONOMY_DIR")
                    .unwrap_or_else(|_| "data/taxonomies".to_string())
                    .into(),
                report_dir: env::var("REPORT_DIR")
                    .unwrap_or_else(|_| "data/reports".to_string())
                    .into(),
                workers: env::var("PIPELINE_WORKERS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default_workers),
            },
        }
    }

    /// Postgres connection URL in the form diesel-async expects
    pub fn database_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.database.user,
            self.database.password,
            self.database.host,
            self.database.port,
            self.database.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_is_well_formed() {
        // REQUIREMENT: The pool and migrations share one connection URL
        // PURPOSE: Verify the URL assembles from the POSTGRES_* parts
        let config = Config {
            database: DatabaseConfig {
                host: "db".to_string(),
                port: 5433,
                user: "u".to_string(),
                password: "p".to_string(),
                database: "warehouse".to_string(),
                max_connections: 5,
            },
            pipeline: PipelineConfig {
                data_dir: "data".into(),
                taxonomy_dir: "tax".into(),
                report_dir: "reports".into(),
                workers: 2,
            },
        };
        assert_eq!(config.database_url(), "postgresql://u:p@db:5433/warehouse");
    }
}
