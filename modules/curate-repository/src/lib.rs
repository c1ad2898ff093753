//! Entity persistence with optimistic concurrency.
//!
//! Every write stamps a fresh `row_version` and is conditional on the version
//! the writer last read, so at most one of two racing writers wins. Bulk
//! imports go through `write_batch`, which chunks to the store's batch limit
//! and retries only the items the store reports as unprocessed.

pub mod config;
pub mod dao;
pub mod error;
pub mod repository;

pub use config::{BatchWriteConfig, RetryPolicy};
pub use error::RepositoryError;
pub use repository::{BatchWriteReport, EntityRepository};
