//! Entities, their closed sets of lifecycle events, and the pure transition
//! functions that fold events into current state.
//!
//! Status is never stored on its own: it is read off the latest applied
//! event, so an entity's history replayed in order always lands on the same
//! status as the stored entity.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod file;
pub mod log;
pub mod meta;
pub mod resource;
pub mod ticket;
pub mod types;

pub use aggregate::{Aggregate, LifecycleEvent, Transition};
pub use entity::Entity;
pub use error::TransitionError;
pub use file::{FileEntry, FileEvent, FileStatus, NewFile};
pub use log::{LogEntry, LogTopic};
pub use meta::EventMeta;
pub use resource::{NewResource, Resource, ResourceEvent, ResourceStatus};
pub use ticket::{Ticket, TicketEvent, TicketStatus};
pub use types::{ImportSource, Owner};
