//! Manual time-entry CRUD: create, edit, delete.
//!
//! An entry is created in exactly one input mode: a direct duration in
//! hours, or a start/end span the duration is derived from. After creation
//! only the approval workflow and the Draft/Rejected edit path may touch it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::billing;
use crate::error::{Result, WorklogError};
use crate::events::{EngineEvent, EventBroadcaster};
use crate::model::{short_id, EntryPatch, EntryStatus, NewTimeEntry, Task, TimeEntry};
use crate::store::SharedStore;

pub struct EntryService {
    store: SharedStore,
    events: Arc<EventBroadcaster>,
}

impl EntryService {
    pub fn new(store: SharedStore, events: Arc<EventBroadcaster>) -> Self {
        Self { store, events }
    }

    /// Create an entry on `task_id` from a direct duration or a span.
    ///
    /// `billable` defaults to the task's flag; `date` defaults to today.
    /// The task's rate is copied onto the entry and the amount computed from
    /// it, so later rate changes never rewrite this record.
    pub async fn create(&self, task_id: &str, input: NewTimeEntry) -> Result<Task> {
        let mut task = self
            .store
            .get(task_id)
            .await?
            .ok_or_else(|| WorklogError::task_not_found(task_id))?;

        let entry = build_entry(&task, input)?;
        let entry_id = entry.id.clone();
        task.entries.push(entry);
        task.recompute_actual_hours();
        self.store.upsert(task.clone()).await?;

        info!(task_id = %task_id, entry_id = %entry_id, "time entry created");
        self.events.broadcast(EngineEvent::EntryCreated {
            task_id: task_id.to_string(),
            entry_id,
        });
        Ok(task)
    }

    /// Convenience wrapper: log `hours` directly against a task.
    pub async fn add_manual(&self, task_id: &str, hours: f64, description: &str) -> Result<Task> {
        self.create(
            task_id,
            NewTimeEntry {
                duration: Some(hours),
                description: description.to_string(),
                ..Default::default()
            },
        )
        .await
    }

    /// Edit a Draft or Rejected entry.
    ///
    /// Editing a Rejected entry returns it to Draft and clears the rejection
    /// reason — the edit-then-resubmit path. It does not jump back to
    /// Submitted. Submitted, Approved, and Invoiced entries are immutable
    /// here.
    pub async fn update(&self, task_id: &str, entry_id: &str, patch: EntryPatch) -> Result<Task> {
        let mut task = self
            .store
            .get(task_id)
            .await?
            .ok_or_else(|| WorklogError::task_not_found(task_id))?;
        let entry = task
            .entry_mut(entry_id)
            .ok_or_else(|| entry_not_found(task_id, entry_id))?;

        if !matches!(entry.status, EntryStatus::Draft | EntryStatus::Rejected) {
            return Err(WorklogError::validation(format!(
                "cannot edit entry {entry_id} while {}",
                entry.status
            )));
        }

        apply_patch(entry, patch)?;
        if entry.status == EntryStatus::Rejected {
            entry.status = EntryStatus::Draft;
            entry.rejection_reason = None;
        }
        entry.total_amount = billing::amount(entry.duration, entry.billable, entry.hourly_rate);

        task.recompute_actual_hours();
        self.store.upsert(task.clone()).await?;

        debug!(task_id = %task_id, entry_id = %entry_id, "time entry updated");
        self.events.broadcast(EngineEvent::EntryUpdated {
            task_id: task_id.to_string(),
            entry_id: entry_id.to_string(),
        });
        Ok(task)
    }

    /// Delete an entry. Invoiced entries are permanent and refuse deletion.
    pub async fn delete(&self, task_id: &str, entry_id: &str) -> Result<Task> {
        let mut task = self
            .store
            .get(task_id)
            .await?
            .ok_or_else(|| WorklogError::task_not_found(task_id))?;
        let pos = task
            .entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(|| entry_not_found(task_id, entry_id))?;

        if task.entries[pos].status == EntryStatus::Invoiced {
            return Err(WorklogError::validation(format!(
                "cannot delete entry {entry_id}: invoiced entries are permanent"
            )));
        }

        task.entries.remove(pos);
        task.recompute_actual_hours();
        self.store.upsert(task.clone()).await?;

        info!(task_id = %task_id, entry_id = %entry_id, "time entry deleted");
        self.events.broadcast(EngineEvent::EntryDeleted {
            task_id: task_id.to_string(),
            entry_id: entry_id.to_string(),
        });
        Ok(task)
    }
}

fn entry_not_found(task_id: &str, entry_id: &str) -> WorklogError {
    WorklogError::EntryNotFound {
        task_id: Some(task_id.to_string()),
        entry_id: entry_id.to_string(),
    }
}

/// Validate one input mode and build the entry record.
fn build_entry(task: &Task, input: NewTimeEntry) -> Result<TimeEntry> {
    let has_span_field = input.started_at.is_some() || input.ended_at.is_some();

    let (duration, started_at, ended_at) = match (input.duration, has_span_field) {
        (Some(_), true) => {
            return Err(WorklogError::validation(
                "provide either a duration or a start/end span, not both",
            ));
        }
        (Some(hours), false) => (direct_duration(hours)?, None, None),
        (None, true) => {
            let (start, end) = span_bounds(input.started_at, input.ended_at)?;
            (billing::duration_hours(start, end, 0), Some(start), Some(end))
        }
        (None, false) => {
            return Err(WorklogError::validation(
                "an entry needs a duration or a start/end span",
            ));
        }
    };

    let billable = input.billable.unwrap_or(task.billable);
    Ok(TimeEntry {
        id: short_id("entry"),
        task_id: task.id.clone(),
        started_at,
        ended_at,
        duration,
        description: input.description,
        date: input.date.unwrap_or_else(|| Utc::now().date_naive()),
        billable,
        hourly_rate: task.hourly_rate,
        total_amount: billing::amount(duration, billable, task.hourly_rate),
        status: EntryStatus::Draft,
        rejection_reason: None,
        submitted_at: None,
        approved_at: None,
    })
}

fn apply_patch(entry: &mut TimeEntry, patch: EntryPatch) -> Result<()> {
    let has_span_field = patch.started_at.is_some() || patch.ended_at.is_some();
    if patch.duration.is_some() && has_span_field {
        return Err(WorklogError::validation(
            "provide either a duration or a start/end span, not both",
        ));
    }

    if let Some(hours) = patch.duration {
        entry.duration = direct_duration(hours)?;
        // Switching to direct mode drops the recorded span.
        entry.started_at = None;
        entry.ended_at = None;
    } else if has_span_field {
        let (start, end) = span_bounds(
            patch.started_at.or(entry.started_at),
            patch.ended_at.or(entry.ended_at),
        )?;
        entry.started_at = Some(start);
        entry.ended_at = Some(end);
        entry.duration = billing::duration_hours(start, end, 0);
    }

    if let Some(description) = patch.description {
        entry.description = description;
    }
    if let Some(billable) = patch.billable {
        entry.billable = billable;
    }
    if let Some(date) = patch.date {
        entry.date = date;
    }
    Ok(())
}

fn direct_duration(hours: f64) -> Result<f64> {
    if !(hours.is_finite() && hours > 0.0) {
        return Err(WorklogError::validation(
            "duration must be a positive number of hours",
        ));
    }
    Ok(billing::round2(hours))
}

fn span_bounds(
    started_at: Option<chrono::DateTime<Utc>>,
    ended_at: Option<chrono::DateTime<Utc>>,
) -> Result<(chrono::DateTime<Utc>, chrono::DateTime<Utc>)> {
    match (started_at, ended_at) {
        (Some(start), Some(end)) if end > start => Ok((start, end)),
        (Some(_), Some(_)) => Err(WorklogError::validation("span end must be after its start")),
        _ => Err(WorklogError::validation(
            "a span entry needs both a start and an end",
        )),
    }
}
