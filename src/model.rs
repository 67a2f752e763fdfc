//! Core data model: tasks, timers, time entries, and the approval queue view.
//!
//! Ownership is strict — a task exclusively owns its entries and its active
//! timer. Services hand out clones of the stored records; the store copy is
//! canonical.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ─── Status enums ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!(
                "unknown task status '{other}' (expected todo, in_progress, review, completed, cancelled)"
            )),
        }
    }
}

/// Lifecycle of a time entry through the approval workflow.
///
/// Draft → Submitted → Approved | Rejected; Approved → Invoiced.
/// Rejected returns to Draft only through an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Invoiced,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Invoiced => "invoiced",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Records ──────────────────────────────────────────────────────────────────

/// Unit of work. Top-level when `parent_id` is `None`, a subtask otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub parent_id: Option<String>,
    /// 0–100. Derived from subtask completion for parents with subtasks,
    /// manually set otherwise.
    pub progress: u8,
    pub estimated_hours: f64,
    /// Sum of this task's entry durations, recomputed on every entry
    /// mutation. Never drifts from `entries`.
    pub actual_hours: f64,
    pub billable: bool,
    pub hourly_rate: f64,
    pub owner: Option<String>,
    pub active_timer: Option<Timer>,
    /// Insertion order is chronological.
    pub entries: Vec<TimeEntry>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Recompute `actual_hours` from the current entry set.
    pub fn recompute_actual_hours(&mut self) {
        let total: f64 = self.entries.iter().map(|e| e.duration).sum();
        self.actual_hours = crate::billing::round2(total);
    }

    pub fn entry(&self, entry_id: &str) -> Option<&TimeEntry> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    pub fn entry_mut(&mut self, entry_id: &str) -> Option<&mut TimeEntry> {
        self.entries.iter_mut().find(|e| e.id == entry_id)
    }
}

/// In-progress measurement session. At most one exists across all tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: String,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    pub description: String,
    pub is_paused: bool,
    /// Set only while paused; folded into `paused_ms` on resume.
    pub pause_started_at: Option<DateTime<Utc>>,
    /// Accumulated paused time. Monotonically non-decreasing.
    pub paused_ms: i64,
}

impl Timer {
    /// Total paused time as of `now`, including a still-open pause interval.
    pub fn effective_paused_ms(&self, now: DateTime<Utc>) -> i64 {
        let open = self
            .pause_started_at
            .map(|p| (now - p).num_milliseconds().max(0))
            .unwrap_or(0);
        self.paused_ms + open
    }

    /// Running time as of `now`, excluding pauses. Never negative.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        let total = (now - self.started_at).num_milliseconds();
        (total - self.effective_paused_ms(now)).max(0)
    }
}

/// A recorded unit of elapsed work. Created by stopping a timer or by manual
/// entry; after creation only the approval workflow and the Draft/Rejected
/// edit path may change it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    pub task_id: String,
    /// Present for timer-produced and span-mode entries; absent for
    /// direct-duration manual entries.
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Hours, rounded to 2 decimals, never negative.
    pub duration: f64,
    pub description: String,
    /// Calendar date the work is attributed to.
    pub date: NaiveDate,
    /// Copied from the task at creation time.
    pub billable: bool,
    /// Copied from the task at creation time. Deliberately not re-read on
    /// later rate changes — the amount on record is the amount that was true
    /// when the work was logged.
    pub hourly_rate: f64,
    pub total_amount: f64,
    pub status: EntryStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

// ─── Inputs ───────────────────────────────────────────────────────────────────

/// Input for creating a task. Everything but the title is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub parent_id: Option<String>,
    pub estimated_hours: Option<f64>,
    pub billable: Option<bool>,
    pub hourly_rate: Option<f64>,
    pub owner: Option<String>,
    pub progress: Option<u8>,
}

/// Input for a manual time entry. Exactly one input mode must be used:
/// a direct `duration`, or a `started_at`/`ended_at` span.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeEntry {
    pub duration: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub description: String,
    /// Overrides the task's `billable` flag for this entry when set.
    pub billable: Option<bool>,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

/// Partial edit of a Draft or Rejected entry. `None` fields are untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    pub duration: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub billable: Option<bool>,
    pub date: Option<NaiveDate>,
}

// ─── Views ────────────────────────────────────────────────────────────────────

/// A submitted entry joined with its task context, for approval screens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalQueueEntry {
    pub entry: TimeEntry,
    pub task_title: String,
    pub owner: Option<String>,
}

/// Per-entry outcome of a bulk approval operation. `error` is `None` on
/// success; a failed entry never rolls back the others.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub entry_id: String,
    pub status: Option<EntryStatus>,
    pub error: Option<String>,
}

impl BulkOutcome {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

// ─── IDs ──────────────────────────────────────────────────────────────────────

pub(crate) fn short_id(prefix: &str) -> String {
    format!("{prefix}-{}", &uuid::Uuid::new_v4().to_string()[..8])
}
