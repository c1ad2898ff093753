use async_trait::async_trait;
use tracing::info;

use super::backend::EventBus;
use crate::types::Topic;

/// Logs each notification instead of delivering it. Used by the worker binary.
pub struct LoggingBus;

#[async_trait]
impl EventBus for LoggingBus {
    async fn publish(&self, topic: Topic, payload: serde_json::Value) -> anyhow::Result<()> {
        info!(%topic, bytes = payload.to_string().len(), "Notification published");
        Ok(())
    }
}
