// ============================================================================
// sqlevents - persistent event scheduler core for embeddable SQL engines
// ============================================================================
//
// Events are named schedules of SQL execution attached to databases: one-shot
// at an absolute instant, or recurring on a fixed interval within an optional
// activation window. The scheduler keeps a time-sorted queue of enabled
// events, sleeps until the earliest one, runs its body through the engine's
// executor under the definer identity, and re-arms or retires it. SQL
// parsing, privileges and the catalog storage itself live in the host engine
// and are reached through the traits in `interface`.

pub mod core;
pub mod interface;
pub mod scheduler;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{
    Definer, EventDefinition, EventInterval, EventSchedule, EventStatus, IntervalUnit, Result,
    SchedulerError,
};
pub use crate::interface::{Clock, EventDatabase, EventExecutor, SystemClock};
pub use crate::scheduler::{
    EventRegistry, EventScheduler, RunningEntry, RunningSet, ScheduledEvent, SchedulerConfig,
    SchedulerStats,
};
pub use crate::storage::MemoryEventDatabase;
