pub mod backend;
pub mod logging;
pub mod memory;
pub mod noop;

pub use backend::EventBus;
pub use logging::LoggingBus;
pub use memory::MemoryEventBus;
pub use noop::NoopBus;
