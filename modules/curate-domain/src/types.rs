use serde::{Deserialize, Serialize};

/// Who owns an entity, and the organisation the owner acts for.
///
/// `affiliation` is an organisation identifier such as
/// `https://org.example/20754.1.0.0`; batch filters match on its prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub username: String,
    pub affiliation: String,
}

impl Owner {
    pub fn new(username: impl Into<String>, affiliation: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            affiliation: affiliation.into(),
        }
    }
}

/// Where imported metadata came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportSource {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl ImportSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_id: None,
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}
