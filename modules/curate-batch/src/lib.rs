//! Batch reconciliation: walk the store page by page, turn each item into a
//! work message, resolve index keys back to primary records, and run the
//! registered job for each item.
//!
//! Two queues connect the stages. The scan queue carries `ScanRequest`s, each
//! one page of progress; the work queue carries `WorkItem`s. Every work
//! message is reported on its own, so one bad item never fails its neighbours.

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod filter;
pub mod jobs;
pub mod pipeline;
pub mod queue;
pub mod resolve;
pub mod types;

pub use config::PipelineConfig;
pub use driver::{Driver, RunSummary};
pub use error::{ItemError, PipelineError};
pub use executor::{ItemOutcome, JobContext, JobExecutor, JobRegistry, ResolvedItem};
pub use filter::ScanFilter;
pub use pipeline::{BatchPipeline, PipelineDeps, ScanPageOutcome};
pub use queue::{MemoryWorkQueue, QueueMessage, SendBatchOutput, WorkQueue, QUEUE_MAX_BATCH};
pub use types::{BatchResponse, ItemFailure, ScanRequest, WorkItem, WorkKey};
