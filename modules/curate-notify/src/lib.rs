//! Change notifications: classify an (old, new) record pair into a topic and
//! publish it, unless the write changed nothing a reader could observe.
//!
//! Classification reads structured attributes only (`entity_type`, `status`,
//! `digest`), never the data blob.

pub mod bus;
pub mod error;
pub mod router;
pub mod types;

pub use bus::{EventBus, LoggingBus, MemoryEventBus, NoopBus};
pub use error::NotifyError;
pub use router::ChangeRouter;
pub use types::{Notification, Topic};
