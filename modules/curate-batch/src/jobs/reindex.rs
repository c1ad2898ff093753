use async_trait::async_trait;

use crate::error::ItemError;
use crate::executor::{ItemOutcome, JobContext, JobExecutor, ResolvedItem};

/// Publish every record as freshly created so downstream indexes rebuild it.
pub struct ReindexJob;

#[async_trait]
impl JobExecutor for ReindexJob {
    fn job_type(&self) -> &'static str {
        "reindex"
    }

    async fn execute(&self, ctx: &JobContext, items: &[ResolvedItem]) -> anyhow::Result<Vec<ItemOutcome>> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let outcome = ctx
                .router
                .route(None, Some(&item.record))
                .await
                .map(|_| ())
                .map_err(|e| ItemError::Job(e.to_string()));
            outcomes.push((item.message_id.clone(), outcome));
        }
        Ok(outcomes)
    }
}
