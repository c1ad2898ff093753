use async_trait::async_trait;

use crate::error::ItemError;
use crate::executor::{ItemOutcome, JobContext, JobExecutor, ResolvedItem};

/// Re-save each entity through the optimistic update path, so it is
/// rewritten in the current serialization with a fresh row version.
/// Lost races are retried against the latest stored state. Content is
/// unchanged, so the change notification is suppressed.
pub struct MigrateJob;

impl MigrateJob {
    async fn migrate(ctx: &JobContext, item: &ResolvedItem) -> Result<(), ItemError> {
        let entity = item.entity()?;
        let saved = ctx
            .repository
            .update_with_retry(entity.kind(), entity.id(), &ctx.retry, Ok)
            .await?;
        ctx.notify_change(&item.record, &saved).await
    }
}

#[async_trait]
impl JobExecutor for MigrateJob {
    fn job_type(&self) -> &'static str {
        "migrate"
    }

    async fn execute(&self, ctx: &JobContext, items: &[ResolvedItem]) -> anyhow::Result<Vec<ItemOutcome>> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push((item.message_id.clone(), Self::migrate(ctx, item).await));
        }
        Ok(outcomes)
    }
}
