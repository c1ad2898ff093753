//! Queue message shapes. These are the externally visible contracts.

use curate_store::{Cursor, Key};
use serde::{Deserialize, Serialize};

use crate::error::ItemError;
use crate::filter::ScanFilter;

/// One page of scan progress: `{ jobType, startMarker?, indexName?, filter? }`.
///
/// Resubmitting a request with its `startMarker` resumes the scan after the
/// last item that marker's page examined. Omitting it starts from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub job_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_marker: Option<Cursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ScanFilter>,
    /// Passed through to every work item this scan produces.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub parameters: serde_json::Value,
    /// Overrides the configured page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

impl ScanRequest {
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            start_marker: None,
            index_name: None,
            filter: None,
            parameters: serde_json::Value::Null,
            page_size: None,
        }
    }

    pub fn on_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn with_filter(mut self, filter: ScanFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// The request for the page after the one that returned `marker`.
    pub fn continue_from(&self, marker: Cursor) -> Self {
        Self {
            start_marker: Some(marker),
            ..self.clone()
        }
    }
}

/// Either a primary key, or an index key still to be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkKey {
    pub pk: String,
    pub sk: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
}

impl WorkKey {
    pub fn primary(key: &Key) -> Self {
        Self {
            pk: key.pk.clone(),
            sk: key.sk.clone(),
            index_name: None,
        }
    }

    pub fn on_index(index_name: impl Into<String>, key: &Key) -> Self {
        Self {
            pk: key.pk.clone(),
            sk: key.sk.clone(),
            index_name: Some(index_name.into()),
        }
    }

    pub fn key(&self) -> Key {
        Key::new(&self.pk, &self.sk)
    }

    pub fn is_resolved(&self) -> bool {
        self.index_name.is_none()
    }
}

/// `{ key: {pk, sk, indexName?}, jobType, parameters }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub key: WorkKey,
    pub job_type: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// One failed work message.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub message_id: String,
    /// The offending key, when the message got far enough to have one.
    pub key: Option<Key>,
    pub error: ItemError,
}

/// Per-message outcome of one `process_work` call. Messages not listed in
/// `failures` were processed and may be deleted from the queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResponse {
    pub received: usize,
    pub failures: Vec<ItemFailure>,
}

impl BatchResponse {
    pub fn failed_message_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.message_id.as_str()).collect()
    }

    pub fn succeeded(&self) -> usize {
        self.received - self.failures.len()
    }
}
