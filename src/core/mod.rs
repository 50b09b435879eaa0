pub mod error;
pub mod types;

pub use error::{Result, SchedulerError};
pub use types::{
    Definer, EventDefinition, EventInterval, EventSchedule, EventStatus, IntervalUnit,
};
