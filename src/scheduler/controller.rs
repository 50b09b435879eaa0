use std::fmt;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::{Definer, EventDefinition, Result, SchedulerError};
use crate::interface::{Clock, EventDatabase, EventExecutor, SystemClock};

use super::config::SchedulerConfig;
use super::dispatcher::Dispatcher;
use super::registry::{EventRegistry, ScheduledEvent};
use super::running::RunningSet;

/// Lifecycle of the scheduler. One-way: a stopped scheduler stays stopped.
enum State {
    Created,
    Running {
        shutdown: watch::Sender<bool>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// The externally visible façade of the event scheduler.
///
/// DDL handlers call [`add_event`](Self::add_event),
/// [`update_event`](Self::update_event), [`remove_event`](Self::remove_event)
/// and the database-level variants; the engine calls
/// [`start`](Self::start) once the catalog is available and
/// [`stop`](Self::stop) on shutdown.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use sqlevents::{
///     EventDatabase, EventExecutor, EventScheduler, MemoryEventDatabase, Result,
///     SchedulerConfig,
/// };
///
/// struct LogExecutor;
///
/// #[async_trait::async_trait]
/// impl EventExecutor for LogExecutor {
///     async fn execute(&self, _user: &str, _host: &str, db: &str, body: &str) -> Result<()> {
///         println!("{}: {}", db, body);
///         Ok(())
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let scheduler = EventScheduler::new(Arc::new(LogExecutor), SchedulerConfig::default())?;
/// let db = Arc::new(MemoryEventDatabase::new("inventory"));
/// scheduler.start(&[db as Arc<dyn EventDatabase>]).await?;
/// scheduler.stop().await?;
/// # Ok::<(), sqlevents::SchedulerError>(())
/// # }).unwrap();
/// ```
pub struct EventScheduler {
    registry: Arc<EventRegistry>,
    running: Arc<RunningSet>,
    executor: Arc<dyn EventExecutor>,
    clock: Arc<dyn Clock>,
    wakeup: Arc<Notify>,
    workers: Arc<Semaphore>,
    state: Mutex<State>,
}

/// Point-in-time scheduler counters.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerStats {
    pub queued_events: usize,
    pub running_events: usize,
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} queued, {} running",
            self.queued_events, self.running_events
        )
    }
}

impl EventScheduler {
    /// Create a scheduler on the system wall clock.
    pub fn new(executor: Arc<dyn EventExecutor>, config: SchedulerConfig) -> Result<Self> {
        Self::with_clock(executor, Arc::new(SystemClock), config)
    }

    /// Like [`new`](Self::new), with an injected clock. Tests use this to
    /// drive the scheduler on simulated time.
    pub fn with_clock(
        executor: Arc<dyn EventExecutor>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: Arc::new(EventRegistry::new()),
            running: Arc::new(RunningSet::new()),
            executor,
            clock,
            wakeup: Arc::new(Notify::new()),
            workers: Arc::new(Semaphore::new(config.max_workers)),
            state: Mutex::new(State::Created),
        })
    }

    /// Loads every enabled event of the given databases and starts the
    /// dispatch loop. Idempotent; a stopped scheduler stays stopped.
    pub async fn start(&self, databases: &[Arc<dyn EventDatabase>]) -> Result<()> {
        let mut state = self.state.lock().await;
        match *state {
            State::Created => {}
            State::Running { .. } | State::Stopped => return Ok(()),
        }

        for database in databases {
            self.load_database(Arc::clone(database)).await?;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = Arc::new(Dispatcher {
            registry: Arc::clone(&self.registry),
            running: Arc::clone(&self.running),
            executor: Arc::clone(&self.executor),
            clock: Arc::clone(&self.clock),
            wakeup: Arc::clone(&self.wakeup),
            workers: Arc::clone(&self.workers),
        });
        let handle = tokio::spawn(dispatcher.run(shutdown_rx));
        *state = State::Running {
            shutdown: shutdown_tx,
            handle,
        };
        info!(
            "event scheduler started with {} queued events",
            self.registry.len()
        );
        Ok(())
    }

    /// Signals the dispatcher to exit and clears the in-memory state.
    /// In-flight executions finish on their own; their completion paths
    /// find no running entry and discard the re-arm.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let State::Running { shutdown, handle } =
            std::mem::replace(&mut *state, State::Stopped)
        {
            let _ = shutdown.send(true);
            if let Err(e) = handle.await {
                warn!("dispatcher task ended abnormally: {}", e);
            }
            info!("event scheduler stopped");
        }
        self.registry.clear()?;
        self.running.clear_all()?;
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, State::Running { .. })
    }

    /// Registers a newly created event.
    ///
    /// Disabled definitions are ignored; an enabled-but-already-ended
    /// definition is transitioned in the catalog on the spot and not
    /// queued. A malformed definer is reported to the caller.
    pub async fn add_event(
        &self,
        database: Arc<dyn EventDatabase>,
        definition: EventDefinition,
    ) -> Result<()> {
        Definer::parse(&definition.definer)?;
        if !self.is_running().await {
            return Ok(());
        }
        let now = self.clock.now();
        if let Some(event) = ScheduledEvent::from_definition(database, definition, now).await? {
            self.registry.add(event)?;
            self.wakeup.notify_one();
        }
        Ok(())
    }

    /// Replaces the scheduled copy of an event after `ALTER EVENT`.
    ///
    /// A currently running execution keeps going but is tombstoned so it
    /// cannot re-queue the stale definition; the new definition is queued
    /// under its (possibly renamed) qualified name.
    pub async fn update_event(
        &self,
        database: Arc<dyn EventDatabase>,
        old_name: &str,
        definition: EventDefinition,
    ) -> Result<()> {
        Definer::parse(&definition.definer)?;
        if !self.is_running().await {
            return Ok(());
        }

        let old_qualified = format!("{}.{}", database.name(), old_name);
        if let Some(entry) = self.running.get(&old_qualified) {
            if entry.running {
                self.running.set(&old_qualified, true, false)?;
            }
        }
        self.registry.remove(&old_qualified)?;

        let now = self.clock.now();
        if let Some(event) = ScheduledEvent::from_definition(database, definition, now).await? {
            self.registry.add(event)?;
        }
        self.wakeup.notify_one();
        Ok(())
    }

    /// Drops an event from the queue after `DROP EVENT`. A running
    /// execution is tombstoned instead of interrupted.
    pub fn remove_event(&self, database: &str, name: &str) -> Result<()> {
        let qualified = format!("{}.{}", database, name);
        if let Some(entry) = self.running.get(&qualified) {
            if entry.running {
                self.running.set(&qualified, true, false)?;
            }
        }
        self.registry.remove(&qualified)?;
        self.wakeup.notify_one();
        Ok(())
    }

    /// Queues every enabled event of a database that became visible.
    pub async fn add_database(&self, database: Arc<dyn EventDatabase>) -> Result<()> {
        if !self.is_running().await {
            return Ok(());
        }
        self.load_database(database).await?;
        self.wakeup.notify_one();
        Ok(())
    }

    /// Purges a dropped database: running executions are tombstoned,
    /// queued events removed.
    pub fn remove_database(&self, database: &str) -> Result<()> {
        self.running.clear_database(database)?;
        self.registry.remove_database(database)?;
        self.wakeup.notify_one();
        Ok(())
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queued_events: self.registry.len(),
            running_events: self.running.len(),
        }
    }

    /// Catalog-load protocol: every enabled, not-yet-ended event of the
    /// database goes into the registry; ended events are transitioned in
    /// the catalog; a bad definer skips that one event.
    async fn load_database(&self, database: Arc<dyn EventDatabase>) -> Result<()> {
        let now = self.clock.now();
        let definitions = database.get_events().await?;
        for definition in definitions {
            let name = format!("{}.{}", database.name(), definition.name);
            match ScheduledEvent::from_definition(Arc::clone(&database), definition, now).await {
                Ok(Some(event)) => self.registry.add(event)?,
                Ok(None) => {}
                Err(
                    e @ (SchedulerError::InvalidDefiner(_) | SchedulerError::InvalidSchedule(_)),
                ) => {
                    warn!("skipping event '{}': {}", name, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
