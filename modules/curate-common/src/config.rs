use std::env;
use std::str::FromStr;

use tracing::info;

use crate::error::CommonError;

/// The largest batch the record store accepts in a single write call.
pub const STORE_MAX_BATCH_WRITE: usize = 25;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Store
    pub table_name: String,

    // Scanning
    pub scan_page_size: usize,
    pub resolve_concurrency: usize,
    pub work_batch_size: usize,

    // Bulk writes
    pub batch_write_size: usize,
    pub batch_write_max_attempts: u32,
    pub batch_write_backoff_ms: u64,
    pub write_concurrency: usize,

    // Interactive updates
    pub update_max_attempts: u32,
    pub update_jitter_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: "resources".to_string(),
            scan_page_size: 500,
            resolve_concurrency: 8,
            work_batch_size: 10,
            batch_write_size: STORE_MAX_BATCH_WRITE,
            batch_write_max_attempts: 5,
            batch_write_backoff_ms: 50,
            write_concurrency: 4,
            update_max_attempts: 3,
            update_jitter_ms: 50,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    /// Every variable is optional; invalid numbers are an error.
    pub fn from_env() -> Result<Self, CommonError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let batch_write_size: usize =
            parsed_env("CURATE_BATCH_WRITE_SIZE", defaults.batch_write_size)?;

        Ok(Self {
            table_name: env::var("CURATE_TABLE_NAME").unwrap_or(defaults.table_name),
            scan_page_size: positive(
                "CURATE_SCAN_PAGE_SIZE",
                parsed_env("CURATE_SCAN_PAGE_SIZE", defaults.scan_page_size)?,
            )?,
            resolve_concurrency: positive(
                "CURATE_RESOLVE_CONCURRENCY",
                parsed_env("CURATE_RESOLVE_CONCURRENCY", defaults.resolve_concurrency)?,
            )?,
            work_batch_size: positive(
                "CURATE_WORK_BATCH_SIZE",
                parsed_env("CURATE_WORK_BATCH_SIZE", defaults.work_batch_size)?,
            )?,
            batch_write_size: positive("CURATE_BATCH_WRITE_SIZE", batch_write_size)?
                .min(STORE_MAX_BATCH_WRITE),
            batch_write_max_attempts: positive(
                "CURATE_BATCH_WRITE_MAX_ATTEMPTS",
                parsed_env(
                    "CURATE_BATCH_WRITE_MAX_ATTEMPTS",
                    defaults.batch_write_max_attempts,
                )?,
            )?,
            batch_write_backoff_ms: parsed_env(
                "CURATE_BATCH_WRITE_BACKOFF_MS",
                defaults.batch_write_backoff_ms,
            )?,
            write_concurrency: positive(
                "CURATE_WRITE_CONCURRENCY",
                parsed_env("CURATE_WRITE_CONCURRENCY", defaults.write_concurrency)?,
            )?,
            update_max_attempts: positive(
                "CURATE_UPDATE_MAX_ATTEMPTS",
                parsed_env("CURATE_UPDATE_MAX_ATTEMPTS", defaults.update_max_attempts)?,
            )?,
            update_jitter_ms: parsed_env("CURATE_UPDATE_JITTER_MS", defaults.update_jitter_ms)?,
        })
    }

    /// Log the effective configuration. Nothing here is secret, but the table
    /// name is the only field that identifies an environment.
    pub fn log_redacted(&self) {
        info!(
            table_name = self.table_name.as_str(),
            scan_page_size = self.scan_page_size,
            resolve_concurrency = self.resolve_concurrency,
            work_batch_size = self.work_batch_size,
            batch_write_size = self.batch_write_size,
            batch_write_max_attempts = self.batch_write_max_attempts,
            batch_write_backoff_ms = self.batch_write_backoff_ms,
            write_concurrency = self.write_concurrency,
            update_max_attempts = self.update_max_attempts,
            update_jitter_ms = self.update_jitter_ms,
            "Loaded configuration"
        );
    }
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> Result<T, CommonError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CommonError::Config(format!("{key} must be a number, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn positive<T: PartialOrd + Default>(key: &str, value: T) -> Result<T, CommonError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(CommonError::Config(format!("{key} must be greater than zero")))
    }
}
