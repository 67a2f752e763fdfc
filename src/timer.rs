// SPDX-License-Identifier: MIT
//! Timer lifecycle: start, pause, resume, stop.
//!
//! At most one timer exists across all tasks. The registry owns that
//! invariant: it keeps the id of the current holder behind a mutex, and every
//! lifecycle operation runs its whole read-modify-write against the store
//! inside that critical section. Under concurrent `start` calls the last one
//! to complete wins and unconditionally clears the earlier timer.
//!
//! Stopping is the only path that persists an entry. A timer displaced by a
//! `start` on another task is discarded, not recorded.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, WorklogError};
use crate::events::{EngineEvent, EventBroadcaster};
use crate::model::{short_id, Task, TimeEntry, Timer};
use crate::store::SharedStore;
use crate::{billing, model::EntryStatus};

pub struct TimerRegistry {
    store: SharedStore,
    events: Arc<EventBroadcaster>,
    /// Id of the task currently holding the timer. Every lifecycle operation
    /// serializes on this lock and writes the store before releasing it.
    active: Mutex<Option<String>>,
}

impl TimerRegistry {
    pub fn new(store: SharedStore, events: Arc<EventBroadcaster>) -> Self {
        Self {
            store,
            events,
            active: Mutex::new(None),
        }
    }

    /// Rebuild the registry slot from persisted records.
    ///
    /// A reloaded snapshot may carry an active timer; hand-edited or corrupt
    /// files may carry several. The most recently started one survives,
    /// anything else is cleared.
    pub async fn restore(store: SharedStore, events: Arc<EventBroadcaster>) -> Result<Self> {
        let mut holders: Vec<Task> = store
            .list()
            .await?
            .into_iter()
            .filter(|t| t.active_timer.is_some())
            .collect();
        holders.sort_by_key(|t| t.active_timer.as_ref().map(|timer| timer.started_at));

        let keeper = holders.pop();
        for mut stale in holders {
            warn!(task_id = %stale.id, "clearing stale timer from loaded snapshot");
            stale.active_timer = None;
            store.upsert(stale).await?;
        }

        let active = keeper.map(|t| t.id);
        if let Some(task_id) = &active {
            info!(task_id = %task_id, "restored active timer");
        }
        Ok(Self {
            store,
            events,
            active: Mutex::new(active),
        })
    }

    /// Task currently holding the timer, if any.
    pub async fn active_task_id(&self) -> Option<String> {
        self.active.lock().await.clone()
    }

    /// Start a timer on `task_id`, displacing any timer elsewhere.
    ///
    /// Starting on the task that already holds the timer replaces its timer
    /// with a fresh one.
    pub async fn start(&self, task_id: &str, description: Option<String>) -> Result<Task> {
        let mut active = self.active.lock().await;

        // Resolve the task first: an unknown id must not displace the
        // current holder.
        let mut task = self
            .store
            .get(task_id)
            .await?
            .ok_or_else(|| WorklogError::task_not_found(task_id))?;

        if let Some(prev_id) = active.as_deref() {
            if prev_id != task_id {
                if let Some(mut prev) = self.store.get(prev_id).await? {
                    debug!(task_id = %prev_id, "displacing timer");
                    prev.active_timer = None;
                    self.store.upsert(prev).await?;
                }
            }
        }

        let timer = Timer {
            id: short_id("timer"),
            task_id: task_id.to_string(),
            started_at: Utc::now(),
            description: description.unwrap_or_default(),
            is_paused: false,
            pause_started_at: None,
            paused_ms: 0,
        };
        let timer_id = timer.id.clone();
        task.active_timer = Some(timer);
        self.store.upsert(task.clone()).await?;
        *active = Some(task_id.to_string());

        info!(task_id = %task_id, timer_id = %timer_id, "timer started");
        self.events.broadcast(EngineEvent::TimerStarted {
            task_id: task_id.to_string(),
            timer_id,
        });
        Ok(task)
    }

    /// Pause the running timer on `task_id`.
    pub async fn pause(&self, task_id: &str) -> Result<Task> {
        let _active = self.active.lock().await;

        let mut task = self
            .store
            .get(task_id)
            .await?
            .ok_or_else(|| WorklogError::task_not_found(task_id))?;
        let timer = task
            .active_timer
            .as_mut()
            .ok_or_else(|| no_active_timer(task_id, "no timer is running"))?;
        if timer.is_paused {
            return Err(no_active_timer(task_id, "timer is already paused"));
        }

        timer.is_paused = true;
        timer.pause_started_at = Some(Utc::now());
        self.store.upsert(task.clone()).await?;

        debug!(task_id = %task_id, "timer paused");
        self.events.broadcast(EngineEvent::TimerPaused {
            task_id: task_id.to_string(),
        });
        Ok(task)
    }

    /// Resume a paused timer, folding the pause interval into `paused_ms`.
    pub async fn resume(&self, task_id: &str) -> Result<Task> {
        let _active = self.active.lock().await;

        let mut task = self
            .store
            .get(task_id)
            .await?
            .ok_or_else(|| WorklogError::task_not_found(task_id))?;
        let timer = task
            .active_timer
            .as_mut()
            .ok_or_else(|| no_active_timer(task_id, "no timer is running"))?;
        if !timer.is_paused {
            return Err(no_active_timer(task_id, "timer is not paused"));
        }

        let now = Utc::now();
        if let Some(pause_started) = timer.pause_started_at.take() {
            timer.paused_ms += (now - pause_started).num_milliseconds().max(0);
        }
        timer.is_paused = false;
        self.store.upsert(task.clone()).await?;

        debug!(task_id = %task_id, "timer resumed");
        self.events.broadcast(EngineEvent::TimerResumed {
            task_id: task_id.to_string(),
        });
        Ok(task)
    }

    /// Stop the timer and persist a Draft entry for the measured time.
    ///
    /// Duration is the wall-clock span minus paused time, in hours rounded to
    /// 2 decimals and clamped to zero. Billing uses the task's `billable` and
    /// `hourly_rate` as of now; `description` overrides the one given at
    /// start.
    pub async fn stop(&self, task_id: &str, description: Option<String>) -> Result<Task> {
        let mut active = self.active.lock().await;

        let mut task = self
            .store
            .get(task_id)
            .await?
            .ok_or_else(|| WorklogError::task_not_found(task_id))?;
        let timer = task
            .active_timer
            .take()
            .ok_or_else(|| no_active_timer(task_id, "no timer is running"))?;

        let now = Utc::now();
        // A stop while paused counts the open pause interval as paused.
        let paused_ms = timer.effective_paused_ms(now);
        let duration = billing::duration_hours(timer.started_at, now, paused_ms);

        let entry = TimeEntry {
            id: short_id("entry"),
            task_id: task_id.to_string(),
            started_at: Some(timer.started_at),
            ended_at: Some(now),
            duration,
            description: description.unwrap_or(timer.description),
            date: now.date_naive(),
            billable: task.billable,
            hourly_rate: task.hourly_rate,
            total_amount: billing::amount(duration, task.billable, task.hourly_rate),
            status: EntryStatus::Draft,
            rejection_reason: None,
            submitted_at: None,
            approved_at: None,
        };
        let entry_id = entry.id.clone();
        task.entries.push(entry);
        task.recompute_actual_hours();
        self.store.upsert(task.clone()).await?;
        if active.as_deref() == Some(task_id) {
            *active = None;
        }

        info!(task_id = %task_id, entry_id = %entry_id, duration, "timer stopped");
        self.events.broadcast(EngineEvent::TimerStopped {
            task_id: task_id.to_string(),
            entry_id,
            duration,
        });
        Ok(task)
    }
}

fn no_active_timer(task_id: &str, reason: &str) -> WorklogError {
    WorklogError::NoActiveTimer {
        task_id: task_id.to_string(),
        reason: reason.to_string(),
    }
}
