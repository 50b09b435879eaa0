use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::core::{Definer, EventDefinition, EventStatus, Result};
use crate::interface::EventDatabase;

/// An enabled event together with its resolved next firing instant.
///
/// Identity is the qualified name; the registry never holds two entries
/// with the same qualified name at once.
#[derive(Clone)]
pub struct ScheduledEvent {
    pub database: Arc<dyn EventDatabase>,
    pub definition: EventDefinition,
    pub next_execution_at: DateTime<Utc>,
    pub username: String,
    pub address: String,
}

impl ScheduledEvent {
    /// Builds a registry entry from a catalog snapshot.
    ///
    /// Returns `None` for definitions the registry must not hold: anything
    /// not `Enabled`, and enabled events whose schedule already ended. An
    /// ended event is transitioned in the catalog on the spot: disabled
    /// when it is preserve-on-completion, dropped otherwise.
    pub async fn from_definition(
        database: Arc<dyn EventDatabase>,
        mut definition: EventDefinition,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledEvent>> {
        if definition.status != EventStatus::Enabled {
            return Ok(None);
        }

        let (next_execution_at, ended) = definition.next_execution_time(now)?;
        if ended {
            if definition.on_completion_preserve {
                definition.status = EventStatus::Disabled;
                let name = definition.name.clone();
                database.update_event(&name, definition).await?;
            } else {
                database.drop_event(&definition.name).await?;
            }
            return Ok(None);
        }

        let definer = Definer::parse(&definition.definer)?;
        Ok(Some(ScheduledEvent {
            database,
            definition,
            next_execution_at,
            username: definer.username,
            address: definer.address,
        }))
    }

    /// `database.event`, the key identifying this event everywhere.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database.name(), self.definition.name)
    }
}

/// Time-ordered queue of enabled events.
///
/// A mutex-protected vector kept sorted ascending by `next_execution_at`
/// (stable, so same-instant events keep insertion order). The expected
/// population is small, tens to low thousands, so sort-on-insert with
/// linear removals beats a heap plus a name index.
pub struct EventRegistry {
    events: Mutex<Vec<ScheduledEvent>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Firing instant of the earliest queued event.
    pub fn head(&self) -> Result<Option<DateTime<Utc>>> {
        let events = self.events.lock()?;
        Ok(events.first().map(|e| e.next_execution_at))
    }

    /// Removes and returns the earliest queued event.
    pub fn pop(&self) -> Result<Option<ScheduledEvent>> {
        let mut events = self.events.lock()?;
        if events.is_empty() {
            return Ok(None);
        }
        Ok(Some(events.remove(0)))
    }

    /// Queues an event. The caller guarantees no entry with the same
    /// qualified name is currently queued.
    pub fn add(&self, event: ScheduledEvent) -> Result<()> {
        let mut events = self.events.lock()?;
        events.push(event);
        events.sort_by_key(|e| e.next_execution_at);
        Ok(())
    }

    /// Removes the entry with the given qualified name, if queued.
    pub fn remove(&self, qualified_name: &str) -> Result<()> {
        let mut events = self.events.lock()?;
        if let Some(pos) = events.iter().position(|e| e.qualified_name() == qualified_name) {
            events.remove(pos);
        }
        Ok(())
    }

    /// Removes every queued event belonging to `database`.
    pub fn remove_database(&self, database: &str) -> Result<()> {
        let mut events = self.events.lock()?;
        events.retain(|e| e.database.name() != database);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.events.lock()?.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}
