//! Names of the structured (non-blob) attributes every entity record carries.
//!
//! The store treats these as opaque strings. The repository writes them and
//! the notification router reads them, so both sides agree on one spelling.

pub const ENTITY_TYPE: &str = "entity_type";
pub const STATUS: &str = "status";
pub const ROW_VERSION: &str = "row_version";
pub const DIGEST: &str = "digest";
