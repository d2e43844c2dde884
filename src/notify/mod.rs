//! Due-date reminders.
//!
//! Picks the incomplete records falling due within a window, renders them as
//! one plain-text digest per lead time, and hands each digest to a
//! [`MessageSender`].

mod line;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::sheet::SheetBackend;
use crate::storage::Store;
use crate::todo::{Priority, Todo};

pub use line::{LineSender, LINE_PUSH_ENDPOINT};

/// Lead times (days before the due date) notified on each run, in order.
pub const DEFAULT_LEAD_TIMES: [u32; 3] = [3, 1, 0];

/// Delivery channel for a rendered digest.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `text`. Returns `false` on any failure; failures are logged by
    /// the sender, never raised.
    async fn send(&self, text: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyOutcome {
    Sent,
    Failed,
    /// Nothing fell due in the window; the sender was not called.
    NothingDue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadTimeResult {
    pub days_before: u32,
    pub label: String,
    pub outcome: NotifyOutcome,
}

/// Incomplete records due between `today` and `today + days_before`,
/// inclusive. Records without a parseable due date are skipped.
pub fn select_upcoming<'a>(records: &'a [Todo], days_before: u32, today: NaiveDate) -> Vec<&'a Todo> {
    let horizon = today + TimeDelta::days(i64::from(days_before));
    records
        .iter()
        .filter(|t| !t.is_complete())
        .filter(|t| t.due().is_some_and(|due| today <= due && due <= horizon))
        .collect()
}

fn priority_glyph(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "🔴",
        Priority::Medium => "🟡",
        Priority::Low => "🟢",
    }
}

fn horizon_text(days_before: u32) -> String {
    match days_before {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n => format!("{n} days later"),
    }
}

/// Render the digest for one lead time. Empty when `records` is empty.
pub fn format_digest(records: &[&Todo], days_before: u32) -> String {
    if records.is_empty() {
        return String::new();
    }

    let mut out = format!("📋 Todo due reminder ({})\n\n", horizon_text(days_before));
    for todo in records {
        out.push_str(&format!(
            "{} {}\n   Due: {}\n   Priority: {}\n\n",
            priority_glyph(todo.priority),
            todo.title,
            todo.due_date,
            todo.priority
        ));
    }
    out
}

pub fn lead_time_label(days_before: u32) -> String {
    match days_before {
        0 => "same day".to_string(),
        1 => "1 day before".to_string(),
        n => format!("{n} days before"),
    }
}

/// Send one digest per lead time, in order.
pub async fn notify_due(
    records: &[Todo],
    sender: &dyn MessageSender,
    today: NaiveDate,
    lead_times: &[u32],
) -> Vec<LeadTimeResult> {
    let mut results = Vec::with_capacity(lead_times.len());
    for &days_before in lead_times {
        let upcoming = select_upcoming(records, days_before, today);
        let outcome = if upcoming.is_empty() {
            NotifyOutcome::NothingDue
        } else if sender.send(&format_digest(&upcoming, days_before)).await {
            NotifyOutcome::Sent
        } else {
            NotifyOutcome::Failed
        };
        results.push(LeadTimeResult {
            days_before,
            label: lead_time_label(days_before),
            outcome,
        });
    }
    results
}

/// Read every record and notify the default lead times as of the store's
/// clock.
pub async fn run_job<B: SheetBackend + ?Sized>(
    store: &Store<B>,
    sender: &dyn MessageSender,
) -> Result<Vec<LeadTimeResult>> {
    let _run = store.lock_reminders().await;
    let today = store.clock().today();
    let records = store.list().await?;
    info!("Checking {} record(s) for reminders as of {today}", records.len());

    let results = notify_due(&records, sender, today, &DEFAULT_LEAD_TIMES).await;
    for r in &results {
        match r.outcome {
            NotifyOutcome::Failed => warn!("Reminder {}: delivery failed", r.label),
            outcome => info!("Reminder {}: {outcome:?}", r.label),
        }
    }
    Ok(results)
}
