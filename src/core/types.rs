use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::{Result, SchedulerError};

/// How far in the past a one-shot instant may lie and still count as due.
///
/// Matches the scheduling granularity: a firing observed exactly on time
/// must not be declared dead by the completion path.
const ONE_SHOT_GRACE_SECONDS: i64 = 1;

/// Activation status of an event as stored in the catalog.
///
/// Only `Enabled` events are dispatched. `DisabledOnSlave` exists for
/// replicated setups where events run on the primary only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Enabled,
    Disabled,
    DisabledOnSlave,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Enabled => write!(f, "ENABLE"),
            EventStatus::Disabled => write!(f, "DISABLE"),
            EventStatus::DisabledOnSlave => write!(f, "DISABLE ON SLAVE"),
        }
    }
}

impl FromStr for EventStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENABLE" => Ok(EventStatus::Enabled),
            "DISABLE" => Ok(EventStatus::Disabled),
            "DISABLE ON SLAVE" => Ok(EventStatus::DisabledOnSlave),
            other => Err(SchedulerError::Catalog(format!(
                "unknown event status '{}'",
                other
            ))),
        }
    }
}

/// Fixed-length units accepted in an `EVERY` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

impl IntervalUnit {
    fn seconds(&self) -> i64 {
        match self {
            IntervalUnit::Second => 1,
            IntervalUnit::Minute => 60,
            IntervalUnit::Hour => 3_600,
            IntervalUnit::Day => 86_400,
            IntervalUnit::Week => 604_800,
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalUnit::Second => write!(f, "SECOND"),
            IntervalUnit::Minute => write!(f, "MINUTE"),
            IntervalUnit::Hour => write!(f, "HOUR"),
            IntervalUnit::Day => write!(f, "DAY"),
            IntervalUnit::Week => write!(f, "WEEK"),
        }
    }
}

/// Interval between two firings of a recurring event, e.g. `EVERY 2 SECOND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInterval {
    pub quantity: u32,
    pub unit: IntervalUnit,
}

impl EventInterval {
    pub fn new(quantity: u32, unit: IntervalUnit) -> Self {
        Self { quantity, unit }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.quantity as i64 * self.unit.seconds())
    }
}

impl fmt::Display for EventInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quantity, self.unit)
    }
}

/// When an event fires: once at an absolute instant, or repeatedly on a
/// fixed interval within an optional activation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSchedule {
    OneShot {
        execute_at: DateTime<Utc>,
    },
    Recurring {
        every: EventInterval,
        starts: DateTime<Utc>,
        ends: Option<DateTime<Utc>>,
    },
}

/// Snapshot of one event row in the catalog.
///
/// The scheduler works on snapshots only; the catalog behind an
/// `EventDatabase` implementation stays the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub name: String,
    pub definer: String,
    pub body: String,
    pub comment: String,
    pub status: EventStatus,
    pub schedule: EventSchedule,
    pub on_completion_preserve: bool,
    pub created: DateTime<Utc>,
    pub last_altered: DateTime<Utc>,
    pub last_executed: Option<DateTime<Utc>>,
}

impl EventDefinition {
    /// Create a definition with the defaults of a plain `CREATE EVENT`:
    /// status enabled and not preserved on completion.
    pub fn new(
        name: &str,
        definer: &str,
        body: &str,
        schedule: EventSchedule,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.to_string(),
            definer: definer.to_string(),
            body: body.to_string(),
            comment: String::new(),
            status: EventStatus::Enabled,
            schedule,
            on_completion_preserve: false,
            created,
            last_altered: created,
            last_executed: None,
        }
    }

    /// Set the status
    pub fn status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the comment
    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    /// Set `ON COMPLETION PRESERVE`
    pub fn on_completion_preserve(mut self, preserve: bool) -> Self {
        self.on_completion_preserve = preserve;
        self
    }

    pub fn is_one_shot(&self) -> bool {
        matches!(self.schedule, EventSchedule::OneShot { .. })
    }

    /// Computes the next firing instant at or after `now`.
    ///
    /// Returns `(next, ended)` where `ended` means the schedule has no
    /// firings left. A one-shot instant tolerates being up to one second
    /// in the past. For a recurring event the result is always strictly
    /// after `now`, so a completing execution can never re-arm into its
    /// own slot; firing exactly at `ends` is allowed.
    pub fn next_execution_time(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, bool)> {
        match &self.schedule {
            EventSchedule::OneShot { execute_at } => {
                let ended = *execute_at <= now - Duration::seconds(ONE_SHOT_GRACE_SECONDS);
                Ok((*execute_at, ended))
            }
            EventSchedule::Recurring {
                every,
                starts,
                ends,
            } => {
                let step = every.as_duration().num_seconds();
                if step <= 0 {
                    return Err(SchedulerError::InvalidSchedule(format!(
                        "event '{}' has a zero-length interval",
                        self.name
                    )));
                }
                let next = if now < *starts {
                    *starts
                } else {
                    let elapsed = (now - *starts).num_seconds();
                    *starts + Duration::seconds((elapsed / step + 1) * step)
                };
                match ends {
                    Some(ends) if next > *ends => Ok((next, true)),
                    _ => Ok((next, false)),
                }
            }
        }
    }

    /// Renders the `CREATE EVENT` statement shown by `SHOW CREATE EVENT`.
    pub fn create_event_sql(&self) -> String {
        let definer = match Definer::parse(&self.definer) {
            Ok(d) => d.to_string(),
            Err(_) => self.definer.clone(),
        };
        let mut stmt = format!("CREATE DEFINER = {} EVENT `{}` ON SCHEDULE ", definer, self.name);
        match &self.schedule {
            EventSchedule::OneShot { execute_at } => {
                stmt.push_str(&format!("AT '{}'", format_instant(execute_at)));
            }
            EventSchedule::Recurring {
                every,
                starts,
                ends,
            } => {
                stmt.push_str(&format!("EVERY {} STARTS '{}'", every, format_instant(starts)));
                if let Some(ends) = ends {
                    stmt.push_str(&format!(" ENDS '{}'", format_instant(ends)));
                }
            }
        }
        if self.on_completion_preserve {
            stmt.push_str(" ON COMPLETION PRESERVE");
        } else {
            stmt.push_str(" ON COMPLETION NOT PRESERVE");
        }
        stmt.push_str(&format!(" {}", self.status));
        if !self.comment.is_empty() {
            stmt.push_str(&format!(" COMMENT '{}'", self.comment.replace('\'', "''")));
        }
        stmt.push_str(&format!(" DO {}", self.body));
        stmt
    }
}

fn format_instant(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// The `user@host` identity an event body runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definer {
    pub username: String,
    pub address: String,
}

impl Definer {
    /// Parses a definer string such as `` `root`@`localhost` ``.
    ///
    /// One layer of matching backticks and one layer of matching single
    /// quotes are stripped from each half. Anything without exactly one
    /// `@`, or with an empty half, is rejected.
    pub fn parse(definer: &str) -> Result<Self> {
        let parts: Vec<&str> = definer.split('@').collect();
        if parts.len() != 2 {
            return Err(SchedulerError::InvalidDefiner(definer.to_string()));
        }

        let username = strip_quotes(parts[0]);
        let address = strip_quotes(parts[1]);
        if username.is_empty() || address.is_empty() {
            return Err(SchedulerError::InvalidDefiner(definer.to_string()));
        }

        Ok(Self { username, address })
    }
}

impl fmt::Display for Definer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`@`{}`", self.username, self.address)
    }
}

fn strip_quotes(part: &str) -> String {
    let part = part
        .strip_prefix('`')
        .and_then(|p| p.strip_suffix('`'))
        .unwrap_or(part);
    let part = part
        .strip_prefix('\'')
        .and_then(|p| p.strip_suffix('\''))
        .unwrap_or(part);
    part.to_string()
}
