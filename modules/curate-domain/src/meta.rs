use chrono::{DateTime, Utc};
use curate_common::EventId;
use serde::{Deserialize, Serialize};

/// Fields every event carries regardless of variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventMeta {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
    /// Acting user or agent. Absent for system-initiated events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
}

impl EventMeta {
    pub fn now() -> Self {
        Self {
            event_id: EventId::new(),
            occurred_at: Utc::now(),
            actor: None,
            institution: None,
        }
    }

    pub fn by(actor: impl Into<String>) -> Self {
        Self::now().with_actor(actor)
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.institution = Some(institution.into());
        self
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}
