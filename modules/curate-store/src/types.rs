//! Core types for the record store. Domain-agnostic.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The largest number of records a single `batch_write` call accepts.
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

/// A partition key + sort key pair. Used for primary keys and index keys alike.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    pub pk: String,
    pub sk: String,
}

impl Key {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.pk, self.sk)
    }
}

/// A stored item: primary key, secondary-index keys, structured attributes, blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Key,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub index_keys: BTreeMap<String, Key>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    pub data: serde_json::Value,
}

impl Record {
    pub fn new(key: Key, data: serde_json::Value) -> Self {
        Self {
            key,
            index_keys: BTreeMap::new(),
            attributes: BTreeMap::new(),
            data,
        }
    }

    pub fn with_index(mut self, index: impl Into<String>, key: Key) -> Self {
        self.index_keys.insert(index.into(), key);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn index_key(&self, index: &str) -> Option<&Key> {
        self.index_keys.get(index)
    }
}

/// Precondition for a conditional `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// No record exists under the key.
    NotExists,
    /// A record exists and its attribute has exactly this value.
    AttributeEquals { name: String, value: String },
}

impl Condition {
    pub fn attribute_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AttributeEquals {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Continuation marker: the last item a page examined.
///
/// Opaque to callers. Serializable so a scan can resume in a different process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub(crate) primary: Key,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) index: Option<Key>,
}

/// Scan parameters. `attribute_filter` is an equality match on structured
/// attributes, applied after `limit` items were examined (as wide-column
/// stores do), so a page may hold fewer than `limit` items and still continue.
#[derive(Debug, Clone, Default)]
pub struct ScanParams {
    pub index: Option<String>,
    pub attribute_filter: BTreeMap<String, String>,
    pub limit: usize,
    pub start: Option<Cursor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SortKeyCondition {
    #[default]
    Any,
    Equals(String),
    BeginsWith(String),
}

impl SortKeyCondition {
    pub fn matches(&self, sk: &str) -> bool {
        match self {
            SortKeyCondition::Any => true,
            SortKeyCondition::Equals(expected) => sk == expected,
            SortKeyCondition::BeginsWith(prefix) => sk.starts_with(prefix.as_str()),
        }
    }
}

/// Query parameters: one partition (of the table or of a named index).
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub index: Option<String>,
    pub pk: String,
    pub sk: SortKeyCondition,
    pub limit: usize,
    pub start: Option<Cursor>,
}

impl QueryParams {
    /// Exact lookup of one index key pair.
    pub fn index_key(index: impl Into<String>, key: &Key, limit: usize) -> Self {
        Self {
            index: Some(index.into()),
            pk: key.pk.clone(),
            sk: SortKeyCondition::Equals(key.sk.clone()),
            limit,
            start: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Record>,
    pub last_evaluated: Option<Cursor>,
}

impl Page {
    pub fn is_truncated(&self) -> bool {
        self.last_evaluated.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchWriteOutput {
    pub unprocessed: Vec<Record>,
    pub consumed_capacity: f64,
}
