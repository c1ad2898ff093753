use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ItemError;
use crate::executor::{ItemOutcome, JobContext, JobExecutor, ResolvedItem};

/// Parameters of `update-affiliation`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AffiliationChange {
    pub from: String,
    pub to: String,
}

impl AffiliationChange {
    pub fn parse(parameters: &serde_json::Value) -> Result<Self, ItemError> {
        let change: Self = serde_json::from_value(parameters.clone())
            .map_err(|e| ItemError::Parse(format!("update-affiliation parameters: {e}")))?;
        if change.from.is_empty() {
            return Err(ItemError::Parse(
                "update-affiliation parameters: 'from' must not be empty".into(),
            ));
        }
        // A moved affiliation would still sit under `from` and move again on
        // redelivery.
        if change.to.starts_with(change.from.as_str()) {
            return Err(ItemError::Parse(format!(
                "update-affiliation parameters: 'to' ({}) must not extend 'from' ({})",
                change.to, change.from
            )));
        }
        Ok(change)
    }

    /// The rewritten affiliation, or `None` when `affiliation` is not under `from`.
    pub fn apply(&self, affiliation: &str) -> Option<String> {
        affiliation
            .strip_prefix(self.from.as_str())
            .map(|rest| format!("{}{rest}", self.to))
    }
}

/// Move owners from one organisation prefix to another.
pub struct UpdateAffiliationJob;

impl UpdateAffiliationJob {
    async fn update(ctx: &JobContext, item: &ResolvedItem) -> Result<(), ItemError> {
        let change = AffiliationChange::parse(&item.item.parameters)?;
        let entity = item.entity()?;
        if change.apply(&entity.owner().affiliation).is_none() {
            debug!(key = %item.record.key, "Affiliation outside prefix, nothing to do");
            return Ok(());
        }

        let updated = ctx
            .repository
            .update_with_retry(entity.kind(), entity.id(), &ctx.retry, |mut current| {
                if let Some(affiliation) = change.apply(&current.owner().affiliation) {
                    current.owner_mut().affiliation = affiliation;
                }
                Ok(current)
            })
            .await?;

        ctx.notify_change(&item.record, &updated).await
    }
}

#[async_trait]
impl JobExecutor for UpdateAffiliationJob {
    fn job_type(&self) -> &'static str {
        "update-affiliation"
    }

    async fn execute(&self, ctx: &JobContext, items: &[ResolvedItem]) -> anyhow::Result<Vec<ItemOutcome>> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push((item.message_id.clone(), Self::update(ctx, item).await));
        }
        Ok(outcomes)
    }
}
