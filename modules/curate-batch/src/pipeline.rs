//! BatchPipeline: the scan stage and the work stage.

use std::collections::BTreeMap;
use std::sync::Arc;

use curate_notify::ChangeRouter;
use curate_repository::{dao, EntityRepository, RetryPolicy};
use curate_store::{Record, RecordStore, ScanParams};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::config::PipelineConfig;
use crate::error::{ItemError, PipelineError};
use crate::executor::{JobContext, JobRegistry, ResolvedItem};
use crate::queue::{QueueMessage, WorkQueue};
use crate::resolve::KeyResolver;
use crate::types::{BatchResponse, ItemFailure, ScanRequest, WorkItem, WorkKey};

/// Long-lived collaborators of the pipeline.
#[derive(Clone, TypedBuilder)]
pub struct PipelineDeps {
    pub store: Arc<dyn RecordStore>,
    pub repository: EntityRepository,
    pub router: Arc<ChangeRouter>,
    pub registry: Arc<JobRegistry>,
    /// Receives one `WorkItem` per scanned item.
    pub work_queue: Arc<dyn WorkQueue>,
    /// Receives the continuation `ScanRequest` of each truncated page.
    pub scan_queue: Arc<dyn WorkQueue>,
    #[builder(default)]
    pub config: PipelineConfig,
    #[builder(default)]
    pub retry: RetryPolicy,
}

/// What one scan page did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPageOutcome {
    /// Items the store returned.
    pub scanned: usize,
    /// Work messages sent.
    pub enqueued: usize,
    /// Items dropped because they could not be parsed for filtering.
    pub unparseable: usize,
    /// Items that parsed but did not match the filter.
    pub filtered_out: usize,
    /// The request for the next page, already on the scan queue.
    pub continuation: Option<ScanRequest>,
}

pub struct BatchPipeline {
    deps: PipelineDeps,
    resolver: KeyResolver,
    ctx: JobContext,
}

impl BatchPipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        let resolver = KeyResolver::new(deps.store.clone(), deps.config.resolve_concurrency);
        let ctx = JobContext {
            repository: deps.repository.clone(),
            router: deps.router.clone(),
            retry: deps.retry.clone(),
        };
        Self {
            deps,
            resolver,
            ctx,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.deps.config
    }

    // -- Scan stage ----------------------------------------------------------

    /// Read one page, enqueue a work item per surviving item, then enqueue the
    /// continuation if the page was truncated.
    ///
    /// Work items are sent before the continuation, so the marker never runs
    /// ahead of the work it stands for. Any error leaves the request to be
    /// redelivered; re-running a page only produces duplicate work items,
    /// which executors tolerate.
    pub async fn run_scan_page(&self, request: &ScanRequest) -> Result<ScanPageOutcome, PipelineError> {
        let limit = request
            .page_size
            .unwrap_or(self.deps.config.scan_page_size)
            .max(1);
        let page = self
            .deps
            .store
            .scan(ScanParams {
                index: request.index_name.clone(),
                attribute_filter: BTreeMap::new(),
                limit,
                start: request.start_marker.clone(),
            })
            .await?;

        let mut outcome = ScanPageOutcome {
            scanned: page.items.len(),
            ..ScanPageOutcome::default()
        };

        let mut messages = Vec::new();
        for record in &page.items {
            if let Some(filter) = request.filter.as_ref().filter(|f| !f.is_empty()) {
                match dao::from_record(record) {
                    Ok(entity) if filter.matches(&entity) => {}
                    Ok(_) => {
                        outcome.filtered_out += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!(key = %record.key, error = %e, "Excluding unparseable item from scan");
                        outcome.unparseable += 1;
                        continue;
                    }
                }
            }

            let Some(key) = work_key(record, request.index_name.as_deref()) else {
                warn!(key = %record.key, "Scanned item carries no key for the scanned index");
                outcome.unparseable += 1;
                continue;
            };
            messages.push(QueueMessage::of(&WorkItem {
                key,
                job_type: request.job_type.clone(),
                parameters: request.parameters.clone(),
            }));
        }

        let total = messages.len();
        let sent = self
            .deps
            .work_queue
            .send_batch(messages)
            .await
            .map_err(|e| PipelineError::Queue(e.to_string()))?;
        if !sent.failed.is_empty() {
            return Err(PipelineError::Enqueue {
                failed: sent.failed.len(),
                total,
            });
        }
        outcome.enqueued = sent.successful.len();

        if let Some(marker) = page.last_evaluated {
            let next = request.continue_from(marker);
            let sent = self
                .deps
                .scan_queue
                .send_batch(vec![QueueMessage::of(&next)])
                .await
                .map_err(|e| PipelineError::Queue(e.to_string()))?;
            if !sent.failed.is_empty() {
                return Err(PipelineError::Enqueue {
                    failed: sent.failed.len(),
                    total: 1,
                });
            }
            outcome.continuation = Some(next);
        }

        info!(
            job_type = %request.job_type,
            scanned = outcome.scanned,
            enqueued = outcome.enqueued,
            unparseable = outcome.unparseable,
            filtered_out = outcome.filtered_out,
            continues = outcome.continuation.is_some(),
            "Scan page complete"
        );
        Ok(outcome)
    }

    // -- Work stage ----------------------------------------------------------

    /// Parse, resolve, and dispatch a batch of work messages. Every message
    /// either succeeds or appears in `failures`; nothing aborts the batch.
    pub async fn process_work(&self, messages: Vec<QueueMessage>) -> BatchResponse {
        let mut response = BatchResponse {
            received: messages.len(),
            failures: Vec::new(),
        };

        // Parse
        let mut parsed = Vec::with_capacity(messages.len());
        for message in messages {
            match serde_json::from_value::<WorkItem>(message.body) {
                Ok(item) => parsed.push((message.message_id, item)),
                Err(e) => response.failures.push(ItemFailure {
                    message_id: message.message_id,
                    key: None,
                    error: ItemError::Parse(e.to_string()),
                }),
            }
        }

        // Resolve
        let records = self
            .resolver
            .resolve_all(parsed.iter().map(|(_, item)| &item.key))
            .await;
        let mut groups: BTreeMap<String, Vec<ResolvedItem>> = BTreeMap::new();
        for ((message_id, item), record) in parsed.into_iter().zip(records) {
            match record {
                Ok(record) => groups
                    .entry(item.job_type.clone())
                    .or_default()
                    .push(ResolvedItem {
                        message_id,
                        item,
                        record,
                    }),
                Err(error) => response.failures.push(ItemFailure {
                    message_id,
                    key: Some(item.key.key()),
                    error,
                }),
            }
        }

        // Dispatch
        for (job_type, items) in groups {
            response.failures.extend(self.dispatch(&job_type, items).await);
        }

        for failure in &response.failures {
            warn!(
                message_id = %failure.message_id,
                key = %failure.key.as_ref().map(ToString::to_string).unwrap_or_default(),
                error = %failure.error,
                "Work item failed"
            );
        }
        debug!(
            received = response.received,
            failed = response.failures.len(),
            "Work batch processed"
        );
        response
    }

    /// Run one job type's items, returning the failures.
    async fn dispatch(&self, job_type: &str, items: Vec<ResolvedItem>) -> Vec<ItemFailure> {
        let Some(executor) = self.deps.registry.get(job_type) else {
            return items
                .into_iter()
                .map(|item| failure(item, ItemError::UnknownJobType(job_type.to_string())))
                .collect();
        };

        let outcomes = match executor.execute(&self.ctx, &items).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(%job_type, items = items.len(), error = %e, "Executor failed the whole batch");
                let reason = e.to_string();
                return items
                    .into_iter()
                    .map(|item| failure(item, ItemError::Job(reason.clone())))
                    .collect();
            }
        };

        let mut outcomes: BTreeMap<String, Result<(), ItemError>> = outcomes.into_iter().collect();
        items
            .into_iter()
            .filter_map(|item| match outcomes.remove(&item.message_id) {
                Some(Ok(())) => None,
                Some(Err(error)) => Some(failure(item, error)),
                None => Some(failure(
                    item,
                    ItemError::Job(format!("executor '{job_type}' reported no outcome")),
                )),
            })
            .collect()
    }
}

fn failure(item: ResolvedItem, error: ItemError) -> ItemFailure {
    ItemFailure {
        message_id: item.message_id,
        key: Some(item.record.key),
        error,
    }
}

/// The key a work item should carry for a scanned record: the index key when
/// scanning an index (resolved later), the primary key otherwise.
fn work_key(record: &Record, index_name: Option<&str>) -> Option<WorkKey> {
    match index_name {
        None => Some(WorkKey::primary(&record.key)),
        Some(index) => record
            .index_key(index)
            .map(|index_key| WorkKey::on_index(index, index_key)),
    }
}
