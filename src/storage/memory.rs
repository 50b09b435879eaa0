use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{EventDefinition, Result};
use crate::interface::EventDatabase;

/// In-memory event catalog.
///
/// The stand-in for a real storage backend, used by the demo binary and
/// the integration tests. Engines implement [`EventDatabase`] on top of
/// their durable catalog instead.
pub struct MemoryEventDatabase {
    name: String,
    events: Mutex<HashMap<String, EventDefinition>>,
}

impl MemoryEventDatabase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: Mutex::new(HashMap::new()),
        }
    }

    /// Seeds a definition, replacing any previous one with the same name.
    pub fn insert(&self, definition: EventDefinition) -> Result<()> {
        let mut events = self.events.lock()?;
        events.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventDatabase for MemoryEventDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_event(&self, name: &str) -> Result<Option<EventDefinition>> {
        let events = self.events.lock()?;
        Ok(events.get(name).cloned())
    }

    async fn get_events(&self) -> Result<Vec<EventDefinition>> {
        let events = self.events.lock()?;
        Ok(events.values().cloned().collect())
    }

    async fn update_event(&self, name: &str, definition: EventDefinition) -> Result<()> {
        let mut events = self.events.lock()?;
        // The stored key follows the definition name, so a rename lands
        // under the new name.
        events.remove(name);
        events.insert(definition.name.clone(), definition);
        Ok(())
    }

    async fn drop_event(&self, name: &str) -> Result<()> {
        self.events.lock()?.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EventSchedule, EventStatus};
    use chrono::{TimeZone, Utc};

    fn definition(name: &str) -> EventDefinition {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        EventDefinition::new(
            name,
            "root@localhost",
            "SELECT 1",
            EventSchedule::OneShot {
                execute_at: created,
            },
            created,
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = MemoryEventDatabase::new("mydb");
        assert_eq!(db.name(), "mydb");
        assert!(db.is_empty());

        db.insert(definition("e1")).unwrap();
        let stored = db.get_event("e1").await.unwrap().unwrap();
        assert_eq!(stored.name, "e1");
        assert!(db.get_event("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_event_handles_rename() {
        let db = MemoryEventDatabase::new("mydb");
        db.insert(definition("old")).unwrap();

        let renamed = definition("new").status(EventStatus::Disabled);
        db.update_event("old", renamed).await.unwrap();

        assert!(db.get_event("old").await.unwrap().is_none());
        let stored = db.get_event("new").await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Disabled);
    }

    #[tokio::test]
    async fn test_drop_event_is_silent_for_missing() {
        let db = MemoryEventDatabase::new("mydb");
        db.insert(definition("e1")).unwrap();
        db.drop_event("e1").await.unwrap();
        db.drop_event("e1").await.unwrap();
        assert!(db.is_empty());
    }

    #[tokio::test]
    async fn test_get_events_returns_all() {
        let db = MemoryEventDatabase::new("mydb");
        db.insert(definition("a")).unwrap();
        db.insert(definition("b")).unwrap();
        let mut names: Vec<String> = db
            .get_events()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }
}
