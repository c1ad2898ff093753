//! Declarative scan filters, evaluated against the typed entity after fetch.

use std::collections::BTreeSet;

use curate_domain::Entity;
use serde::{Deserialize, Serialize};

/// Every populated criterion must hold. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFilter {
    /// Stored status names, e.g. `PUBLISHED`.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub statuses: BTreeSet<String>,
    /// Publication years. Only resources carry one.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub years: BTreeSet<i32>,
    /// Name of an import source the entity came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation_prefix: Option<String>,
}

impl ScanFilter {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(entity.status_name()) {
            return false;
        }

        if !self.years.is_empty() {
            let year = match entity {
                Entity::Resource(resource) => resource.publication_year,
                _ => None,
            };
            if !year.is_some_and(|year| self.years.contains(&year)) {
                return false;
            }
        }

        if let Some(source) = &self.import_source {
            let found = match entity {
                Entity::Resource(resource) => {
                    resource.import_sources.iter().any(|s| &s.source == source)
                }
                Entity::File(file) => file
                    .import_source
                    .as_ref()
                    .is_some_and(|s| &s.source == source),
                Entity::Ticket(_) => false,
            };
            if !found {
                return false;
            }
        }

        if let Some(prefix) = &self.affiliation_prefix {
            if !entity.owner().affiliation.starts_with(prefix.as_str()) {
                return false;
            }
        }

        true
    }
}
