use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use sqlevents::{
    EventDatabase, EventDefinition, EventExecutor, EventInterval, EventSchedule, EventScheduler,
    EventStatus, IntervalUnit, MemoryEventDatabase, Result, SchedulerConfig,
};

struct PrintExecutor;

#[async_trait]
impl EventExecutor for PrintExecutor {
    async fn execute(
        &self,
        username: &str,
        address: &str,
        database: &str,
        body: &str,
    ) -> Result<()> {
        println!("   ▶ [{}] {}@{}: {}", database, username, address, body);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("🚀 sqlevents - event scheduler demo");
    println!("{}", "=".repeat(60));

    let db = Arc::new(MemoryEventDatabase::new("inventory"));
    let now = Utc::now();
    db.insert(
        EventDefinition::new(
            "heartbeat",
            "`admin`@`localhost`",
            "UPDATE stats SET beats = beats + 1",
            EventSchedule::Recurring {
                every: EventInterval::new(1, IntervalUnit::Second),
                starts: now,
                ends: Some(now + Duration::seconds(5)),
            },
            now,
        )
        .on_completion_preserve(true)
        .comment("demo heartbeat"),
    )?;

    let scheduler = EventScheduler::new(Arc::new(PrintExecutor), SchedulerConfig::default())?;
    scheduler
        .start(&[Arc::clone(&db) as Arc<dyn EventDatabase>])
        .await?;
    println!("✅ scheduler started ({})", scheduler.stats());

    tokio::time::sleep(StdDuration::from_secs(7)).await;

    if let Some(stored) = db.get_event("heartbeat").await? {
        println!("\n📜 {}", stored.create_event_sql());
        if stored.status == EventStatus::Disabled {
            println!("   schedule window closed, event preserved as DISABLE");
        }
    }

    scheduler.stop().await?;
    println!("🛑 scheduler stopped ({})", scheduler.stats());
    Ok(())
}
