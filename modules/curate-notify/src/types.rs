use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed set of downstream topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    ResourceUpdated,
    ResourceDeleted,
    TicketUpdated,
    FileUpdated,
    FileDeleted,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::ResourceUpdated => "resource-updated",
            Topic::ResourceDeleted => "resource-deleted",
            Topic::TicketUpdated => "ticket-updated",
            Topic::FileUpdated => "file-updated",
            Topic::FileDeleted => "file-deleted",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message shape handed to the event bus: `{ topic, oldData?, newData? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub topic: Topic,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_data: Option<serde_json::Value>,
}

impl Notification {
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("Notification serialization should never fail")
    }
}
