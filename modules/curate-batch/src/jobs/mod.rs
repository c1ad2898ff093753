//! Standard maintenance jobs.

mod migrate;
mod reindex;
mod update_affiliation;

pub use migrate::MigrateJob;
pub use reindex::ReindexJob;
pub use update_affiliation::{AffiliationChange, UpdateAffiliationJob};
