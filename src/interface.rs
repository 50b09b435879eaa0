use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::{EventDefinition, Result};

/// A database that owns a persistent event catalog.
///
/// The scheduler holds snapshots only; every durable mutation (status
/// transitions, `last_executed` updates, drops after completion) goes
/// through this trait. Engines implement it on top of their catalog
/// storage; [`crate::storage::MemoryEventDatabase`] is the in-memory
/// stand-in.
#[async_trait]
pub trait EventDatabase: Send + Sync {
    /// Name of the database, the first half of qualified event names.
    fn name(&self) -> &str;

    /// Look up a single event definition.
    async fn get_event(&self, name: &str) -> Result<Option<EventDefinition>>;

    /// All event definitions of this database.
    async fn get_events(&self) -> Result<Vec<EventDefinition>>;

    /// Overwrite the stored definition of `name`.
    async fn update_event(&self, name: &str, definition: EventDefinition) -> Result<()>;

    /// Remove `name` from the catalog.
    async fn drop_event(&self, name: &str) -> Result<()>;
}

/// Runs an event body against a database under the definer identity.
///
/// Implemented by the SQL execution engine. Failures are reported back so
/// the scheduler can log them; they never affect re-arming.
#[async_trait]
pub trait EventExecutor: Send + Sync {
    async fn execute(&self, username: &str, address: &str, database: &str, body: &str)
        -> Result<()>;
}

/// Source of wall-clock time, injectable so tests can drive the scheduler
/// on a simulated clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
