//! Work queue seam plus an in-memory implementation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The most messages one `send_chunk` call accepts.
pub const QUEUE_MAX_BATCH: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub message_id: String,
    pub body: serde_json::Value,
}

impl QueueMessage {
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            body,
        }
    }

    pub fn of<T: Serialize>(body: &T) -> Self {
        Self::new(serde_json::to_value(body).expect("queue message serialization should never fail"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendBatchOutput {
    pub successful: Vec<String>,
    pub failed: Vec<String>,
}

/// At-least-once queue. Consumers must be idempotent.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Send at most `QUEUE_MAX_BATCH` messages in one call.
    async fn send_chunk(&self, messages: Vec<QueueMessage>) -> anyhow::Result<SendBatchOutput>;

    /// Send any number of messages, split into queue-sized chunks.
    async fn send_batch(&self, messages: Vec<QueueMessage>) -> anyhow::Result<SendBatchOutput> {
        let mut output = SendBatchOutput::default();
        let mut messages = messages.into_iter().peekable();
        while messages.peek().is_some() {
            let chunk: Vec<_> = messages.by_ref().take(QUEUE_MAX_BATCH).collect();
            let sent = self.send_chunk(chunk).await?;
            output.successful.extend(sent.successful);
            output.failed.extend(sent.failed);
        }
        Ok(output)
    }
}

#[async_trait]
impl<Q: WorkQueue + ?Sized> WorkQueue for Arc<Q> {
    async fn send_chunk(&self, messages: Vec<QueueMessage>) -> anyhow::Result<SendBatchOutput> {
        (**self).send_chunk(messages).await
    }
}

// ---------------------------------------------------------------------------
// MemoryWorkQueue
// ---------------------------------------------------------------------------

/// FIFO queue in memory. `reject_next` makes the next N messages come back
/// failed from `send_chunk`; `set_unavailable` fails whole calls.
#[derive(Default)]
pub struct MemoryWorkQueue {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    messages: VecDeque<QueueMessage>,
    reject_remaining: usize,
    unavailable: bool,
    chunks_sent: usize,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take up to `max` messages off the front.
    pub fn receive(&self, max: usize) -> Vec<QueueMessage> {
        let mut inner = self.inner();
        let take = max.min(inner.messages.len());
        inner.messages.drain(..take).collect()
    }

    /// Put a message back, as a visibility timeout would.
    pub fn redeliver(&self, message: QueueMessage) {
        self.inner().messages.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.inner().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().messages.is_empty()
    }

    pub fn chunks_sent(&self) -> usize {
        self.inner().chunks_sent
    }

    pub fn reject_next(&self, messages: usize) {
        self.inner().reject_remaining = messages;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner().unavailable = unavailable;
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn send_chunk(&self, messages: Vec<QueueMessage>) -> anyhow::Result<SendBatchOutput> {
        let mut inner = self.inner();
        if inner.unavailable {
            anyhow::bail!("work queue unavailable");
        }
        if messages.len() > QUEUE_MAX_BATCH {
            anyhow::bail!(
                "batch of {} exceeds the queue limit of {QUEUE_MAX_BATCH}",
                messages.len()
            );
        }
        inner.chunks_sent += 1;

        let mut output = SendBatchOutput::default();
        for message in messages {
            if inner.reject_remaining > 0 {
                inner.reject_remaining -= 1;
                warn!(message_id = %message.message_id, "Simulating rejected send");
                output.failed.push(message.message_id);
            } else {
                output.successful.push(message.message_id.clone());
                inner.messages.push_back(message);
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_batch_splits_into_queue_sized_chunks() {
        let queue = MemoryWorkQueue::new();
        let messages: Vec<_> = (0..23).map(|i| QueueMessage::new(json!({ "n": i }))).collect();

        let output = queue.send_batch(messages).await.unwrap();

        assert_eq!(output.successful.len(), 23);
        assert_eq!(queue.chunks_sent(), 3);
        assert_eq!(queue.receive(5).len(), 5);
        assert_eq!(queue.len(), 18);
    }

    #[tokio::test]
    async fn rejected_sends_are_reported_per_message() {
        let queue = MemoryWorkQueue::new();
        queue.reject_next(2);
        let messages: Vec<_> = (0..4).map(|i| QueueMessage::new(json!(i))).collect();
        let first_two: Vec<_> = messages[..2].iter().map(|m| m.message_id.clone()).collect();

        let output = queue.send_batch(messages).await.unwrap();

        assert_eq!(output.failed, first_two);
        assert_eq!(output.successful.len(), 2);
        assert_eq!(queue.len(), 2);
    }
}
