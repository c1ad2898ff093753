use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::backend::EventBus;
use crate::types::Topic;

/// Collects notifications in memory. `fail_publishes` simulates an outage.
#[derive(Default)]
pub struct MemoryEventBus {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    published: Vec<(Topic, serde_json::Value)>,
    failing: bool,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn published(&self) -> Vec<(Topic, serde_json::Value)> {
        self.inner().published.clone()
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.inner().published.iter().map(|(topic, _)| *topic).collect()
    }

    pub fn fail_publishes(&self, failing: bool) {
        self.inner().failing = failing;
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, topic: Topic, payload: serde_json::Value) -> anyhow::Result<()> {
        let mut inner = self.inner();
        if inner.failing {
            anyhow::bail!("event bus unavailable");
        }
        inner.published.push((topic, payload));
        Ok(())
    }
}
