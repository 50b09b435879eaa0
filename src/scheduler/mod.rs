pub mod config;
pub mod controller;
mod dispatcher;
pub mod registry;
pub mod running;

pub use config::SchedulerConfig;
pub use controller::{EventScheduler, SchedulerStats};
pub use registry::{EventRegistry, ScheduledEvent};
pub use running::{RunningEntry, RunningSet};
