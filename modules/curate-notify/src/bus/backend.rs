use std::sync::Arc;

use async_trait::async_trait;

use crate::types::Topic;

/// Downstream transport for change notifications.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: Topic, payload: serde_json::Value) -> anyhow::Result<()>;
}

#[async_trait]
impl<B: EventBus + ?Sized> EventBus for Arc<B> {
    async fn publish(&self, topic: Topic, payload: serde_json::Value) -> anyhow::Result<()> {
        (**self).publish(topic, payload).await
    }
}
