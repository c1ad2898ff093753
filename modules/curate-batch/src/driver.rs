//! Driver: runs a scan to completion in-process.
//!
//! Stands in for the hosting platform. Each scan request taken off the scan
//! queue is one invocation; after each page the work queue is drained in
//! batches of `work_batch_size`. Pages run strictly one after another. A page
//! that fails is put back on the scan queue before the error is returned, so
//! a later run resumes from it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::pipeline::BatchPipeline;
use crate::queue::{MemoryWorkQueue, QueueMessage, WorkQueue};
use crate::types::{ItemFailure, ScanRequest};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub pages: usize,
    pub scanned: usize,
    pub enqueued: usize,
    pub unparseable: usize,
    pub filtered_out: usize,
    pub processed: usize,
    pub failed: usize,
    #[serde(skip)]
    pub failures: Vec<ItemFailure>,
}

pub struct Driver {
    pipeline: BatchPipeline,
    scan_queue: Arc<MemoryWorkQueue>,
    work_queue: Arc<MemoryWorkQueue>,
}

impl Driver {
    /// `scan_queue` and `work_queue` must be the queues `pipeline` sends to.
    pub fn new(
        pipeline: BatchPipeline,
        scan_queue: Arc<MemoryWorkQueue>,
        work_queue: Arc<MemoryWorkQueue>,
    ) -> Self {
        Self {
            pipeline,
            scan_queue,
            work_queue,
        }
    }

    pub fn pipeline(&self) -> &BatchPipeline {
        &self.pipeline
    }

    /// Chain scan pages until the scan is exhausted, draining work after
    /// each page. Failed work items are collected, not redelivered.
    pub async fn run_to_completion(&self, request: ScanRequest) -> Result<RunSummary, PipelineError> {
        let sent = self
            .scan_queue
            .send_batch(vec![QueueMessage::of(&request)])
            .await
            .map_err(|e| PipelineError::Queue(e.to_string()))?;
        if !sent.failed.is_empty() {
            return Err(PipelineError::Enqueue {
                failed: sent.failed.len(),
                total: 1,
            });
        }

        let mut summary = RunSummary::default();
        let batch_size = self.pipeline.config().work_batch_size.max(1);

        while let Some(message) = self.scan_queue.receive(1).pop() {
            let request: ScanRequest = serde_json::from_value(message.body.clone())
                .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;
            let page = match self.pipeline.run_scan_page(&request).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(job_type = %request.job_type, error = %e, "Scan page failed, requeueing");
                    self.scan_queue.redeliver(message);
                    return Err(e);
                }
            };

            summary.pages += 1;
            summary.scanned += page.scanned;
            summary.enqueued += page.enqueued;
            summary.unparseable += page.unparseable;
            summary.filtered_out += page.filtered_out;

            loop {
                let batch = self.work_queue.receive(batch_size);
                if batch.is_empty() {
                    break;
                }
                let response = self.pipeline.process_work(batch).await;
                summary.processed += response.succeeded();
                summary.failed += response.failures.len();
                summary.failures.extend(response.failures);
            }
        }

        info!(
            job_type = %request.job_type,
            pages = summary.pages,
            scanned = summary.scanned,
            processed = summary.processed,
            failed = summary.failed,
            "Scan run complete"
        );
        Ok(summary)
    }
}
