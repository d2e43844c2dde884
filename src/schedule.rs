//! Daily job scheduling.
//!
//! A [`DailyTrigger`] names a wall-clock time; [`run_daily`] sleeps until the
//! next occurrence, runs the job to completion, and re-arms. Jobs never
//! overlap because the next fire time is only computed once the previous run
//! has returned.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::error::Result;
use crate::notify::{self, MessageSender};
use crate::storage::SharedStore;

/// Work run by the scheduler.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    pub at: NaiveTime,
}

impl DailyTrigger {
    pub fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    /// The first occurrence of `at` strictly after `now`.
    pub fn next_fire(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.at);
        if today > now {
            today
        } else {
            today + TimeDelta::days(1)
        }
    }
}

/// Run `job` every day at `trigger` until `cancel` fires.
pub async fn run_daily(
    trigger: DailyTrigger,
    clock: Arc<dyn Clock>,
    job: Arc<dyn Job>,
    cancel: CancellationToken,
) {
    info!("Scheduled '{}' daily at {}", job.name(), trigger.at.format("%H:%M"));
    let mut after = clock.now();

    loop {
        let next = trigger.next_fire(after);
        let wait = (next - clock.now()).to_std().unwrap_or_default();
        debug!("Next '{}' run at {next} (in {}s)", job.name(), wait.as_secs());

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        info!("Running scheduled job '{}'", job.name());
        if let Err(e) = job.run().await {
            error!("Scheduled job '{}' failed: {e}", job.name());
        }
        // A clock that lags behind the sleep must not fire the same slot twice.
        after = next.max(clock.now());
    }

    info!("Scheduler for '{}' stopped", job.name());
}

/// The daily due-date reminder.
pub struct ReminderJob {
    store: SharedStore,
    sender: Arc<dyn MessageSender>,
}

impl ReminderJob {
    pub fn new(store: SharedStore, sender: Arc<dyn MessageSender>) -> Self {
        Self { store, sender }
    }
}

#[async_trait]
impl Job for ReminderJob {
    fn name(&self) -> &str {
        "due-date reminders"
    }

    async fn run(&self) -> Result<()> {
        notify::run_job(self.store.as_ref(), self.sender.as_ref()).await?;
        Ok(())
    }
}
