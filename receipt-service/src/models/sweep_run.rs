//! Sweep run audit model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a sweep was kicked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepTrigger {
    Scheduled,
    Review,
    Manual,
}

impl SweepTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepTrigger::Scheduled => "scheduled",
            SweepTrigger::Review => "review",
            SweepTrigger::Manual => "manual",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "review" => SweepTrigger::Review,
            "manual" => SweepTrigger::Manual,
            _ => SweepTrigger::Scheduled,
        }
    }
}

/// One evaluation pass over all tenancies for a reference date.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SweepRun {
    pub run_id: Uuid,
    pub triggered_by: String,
    pub reference_date: NaiveDate,
    pub tenancies_processed: i32,
    pub receipts_generated: i32,
    pub tenancies_skipped: i32,
    pub tenancies_failed: i32,
    pub started_utc: DateTime<Utc>,
    pub completed_utc: Option<DateTime<Utc>>,
}
