mod log;
mod queue;
mod types;

pub use log::EventLog;
pub use queue::{EventQueue, PendingEvent};
pub use types::{EventKind, Reliability, WorldEvent};
