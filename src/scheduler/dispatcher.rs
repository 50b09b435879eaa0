use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::core::{EventStatus, Result};
use crate::interface::{Clock, EventExecutor};

use super::registry::{EventRegistry, ScheduledEvent};
use super::running::RunningSet;

/// The single control loop that sleeps until the earliest queued event
/// and launches executions when their instant arrives.
///
/// No mutex is held across a sleep or a dispatch; the registry and running
/// set are consulted and released before anything is awaited.
pub(crate) struct Dispatcher {
    pub(crate) registry: Arc<EventRegistry>,
    pub(crate) running: Arc<RunningSet>,
    pub(crate) executor: Arc<dyn EventExecutor>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) wakeup: Arc<Notify>,
    pub(crate) workers: Arc<Semaphore>,
}

impl Dispatcher {
    /// Runs until the shutdown channel flips to true.
    ///
    /// Wake-up notifications coalesce: any controller mutation that may
    /// have moved the queue head lands here as one `notified()` completion
    /// and the sleep interval is recomputed.
    pub(crate) async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("event dispatcher started");
        loop {
            let head = match self.registry.head() {
                Ok(head) => head,
                Err(e) => {
                    error!("event queue unavailable: {}", e);
                    break;
                }
            };

            match head {
                Some(due_at) => {
                    let delay = until(due_at, self.clock.now());
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                        _ = self.wakeup.notified() => {}
                        _ = tokio::time::sleep(delay) => Arc::clone(&self).fire_due(),
                    }
                }
                None => {
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                        _ = self.wakeup.notified() => {}
                    }
                }
            }
        }
        info!("event dispatcher stopped");
    }

    /// Pops and launches every event whose firing instant has arrived.
    fn fire_due(self: Arc<Self>) {
        loop {
            let now = self.clock.now();
            match self.registry.head() {
                Ok(Some(due_at)) if due_at <= now => {}
                _ => return,
            }
            match self.registry.pop() {
                Ok(Some(event)) => Arc::clone(&self).launch(event, now),
                Ok(None) => return,
                Err(e) => {
                    error!("event queue unavailable: {}", e);
                    return;
                }
            }
        }
    }

    fn launch(self: Arc<Self>, event: ScheduledEvent, now: DateTime<Utc>) {
        let name = event.qualified_name();
        if let Some(entry) = self.running.get(&name) {
            if entry.running {
                warn!("event '{}' is still executing, skipping this firing", name);
                self.requeue_skipped(event, now);
                return;
            }
        }
        if let Err(e) = self.running.set(&name, true, true) {
            error!("failed to mark '{}' as running: {}", name, e);
            return;
        }

        tokio::spawn(async move {
            self.execute_and_rearm(event).await;
        });
    }

    /// Re-arms a firing skipped because the previous execution of the same
    /// event is still in flight. The in-flight completion owns any
    /// end-of-schedule catalog transition, so an ended entry is dropped.
    fn requeue_skipped(&self, mut event: ScheduledEvent, now: DateTime<Utc>) {
        match event.definition.next_execution_time(now) {
            Ok((next, false)) => {
                // A one-shot slot lies in the past; retry in a second
                // rather than spinning on an always-due head.
                event.next_execution_at = if next <= now {
                    now + Duration::seconds(1)
                } else {
                    next
                };
                if let Err(e) = self.registry.add(event) {
                    error!("failed to requeue skipped event: {}", e);
                }
            }
            Ok((_, true)) => {}
            Err(e) => warn!("dropping skipped firing, schedule unusable: {}", e),
        }
    }

    async fn execute_and_rearm(self: Arc<Self>, event: ScheduledEvent) {
        let name = event.qualified_name();
        let permit = match Arc::clone(&self.workers).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let started_at = self.clock.now();
        debug!("executing event '{}'", name);
        if let Err(e) = self
            .executor
            .execute(
                &event.username,
                &event.address,
                event.database.name(),
                &event.definition.body,
            )
            .await
        {
            error!("event '{}' execution failed: {}", name, e);
        }
        drop(permit);

        let re_add = self
            .running
            .get(&name)
            .map(|entry| entry.re_add)
            .unwrap_or(false);
        if re_add {
            if let Err(e) = self.rearm(event, started_at).await {
                error!("failed to re-arm event '{}': {}", name, e);
            }
        }
        if let Err(e) = self.running.clear(&name) {
            error!("failed to clear running entry for '{}': {}", name, e);
        }
    }

    /// Post-execution protocol: advance the schedule or retire the event,
    /// and persist `last_executed` plus any status change.
    async fn rearm(&self, mut event: ScheduledEvent, started_at: DateTime<Utc>) -> Result<()> {
        let mut ended = true;
        if !event.definition.is_one_shot() {
            let (next, schedule_ended) = event.definition.next_execution_time(self.clock.now())?;
            ended = schedule_ended;
            if !ended {
                event.next_execution_at = next;
            }
        }

        if ended && !event.definition.on_completion_preserve {
            let name = event.definition.name.clone();
            event.database.drop_event(&name).await?;
            return Ok(());
        }
        if ended {
            event.definition.status = EventStatus::Disabled;
        }

        event.definition.last_executed = Some(started_at);
        let name = event.definition.name.clone();
        if let Err(e) = event
            .database
            .update_event(&name, event.definition.clone())
            .await
        {
            error!("failed to persist execution metadata for '{}': {}", name, e);
        }

        if !ended {
            self.registry.add(event)?;
            self.wakeup.notify_one();
        }
        Ok(())
    }
}

fn until(due_at: DateTime<Utc>, now: DateTime<Utc>) -> StdDuration {
    (due_at - now).to_std().unwrap_or(StdDuration::ZERO)
}
