//! Job executors and the registry that maps job types to them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use curate_domain::Entity;
use curate_notify::ChangeRouter;
use curate_repository::{dao, EntityRepository, RetryPolicy};
use curate_store::Record;
use tracing::warn;

use crate::error::ItemError;
use crate::jobs::{MigrateJob, ReindexJob, UpdateAffiliationJob};
use crate::types::WorkItem;

/// A work item whose key has been confirmed against its primary record.
#[derive(Debug, Clone)]
pub struct ResolvedItem {
    pub message_id: String,
    pub item: WorkItem,
    pub record: Record,
}

impl ResolvedItem {
    /// Parse the primary record into its entity.
    pub fn entity(&self) -> Result<Entity, ItemError> {
        dao::from_record(&self.record).map_err(ItemError::from)
    }
}

/// Outcome for one message id.
pub type ItemOutcome = (String, Result<(), ItemError>);

/// Collaborators every executor may use.
#[derive(Clone)]
pub struct JobContext {
    pub repository: EntityRepository,
    pub router: Arc<ChangeRouter>,
    pub retry: RetryPolicy,
}

impl JobContext {
    /// Publish the change between a record and the entity that replaced it.
    pub async fn notify_change(&self, old: &Record, new: &Entity) -> Result<(), ItemError> {
        let new = dao::to_record(new);
        self.router
            .route(Some(old), Some(&new))
            .await
            .map(|_| ())
            .map_err(|e| ItemError::Job(e.to_string()))
    }
}

/// Runs one job type over a batch of resolved items.
///
/// Return one outcome per item. An `Err` from `execute` itself means the
/// whole batch failed (for example a downstream outage) and every item in it
/// is reported failed. Items missing from the returned outcomes are also
/// reported failed.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    fn job_type(&self) -> &'static str;

    async fn execute(&self, ctx: &JobContext, items: &[ResolvedItem]) -> anyhow::Result<Vec<ItemOutcome>>;
}

/// Explicit job-type → executor map, built once at startup.
#[derive(Default, Clone)]
pub struct JobRegistry {
    executors: BTreeMap<String, Arc<dyn JobExecutor>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The maintenance jobs every deployment carries.
    pub fn standard() -> Self {
        Self::new()
            .with(MigrateJob)
            .with(ReindexJob)
            .with(UpdateAffiliationJob)
    }

    pub fn with(mut self, executor: impl JobExecutor + 'static) -> Self {
        self.register(Arc::new(executor));
        self
    }

    pub fn register(&mut self, executor: Arc<dyn JobExecutor>) {
        let job_type = executor.job_type().to_string();
        if self.executors.insert(job_type.clone(), executor).is_some() {
            warn!(%job_type, "Replaced an already registered executor");
        }
    }

    pub fn get(&self, job_type: &str) -> Option<&Arc<dyn JobExecutor>> {
        self.executors.get(job_type)
    }

    pub fn job_types(&self) -> Vec<&str> {
        self.executors.keys().map(String::as_str).collect()
    }
}
