// SPDX-License-Identifier: MIT
//! Subtask progress rollup.
//!
//! Parents with subtasks get their `progress` derived from subtask
//! completion. Parents without subtasks keep whatever was set manually — the
//! aggregator never touches them, no matter how often it runs.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, WorklogError};
use crate::events::{EngineEvent, EventBroadcaster};
use crate::model::{Task, TaskStatus};
use crate::store::SharedStore;

/// Percentage of completed subtasks, rounded to the nearest whole percent.
pub fn completion_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((100.0 * completed as f64) / total as f64).round() as u8
}

pub struct ProgressAggregator {
    store: SharedStore,
    events: Arc<EventBroadcaster>,
}

impl ProgressAggregator {
    pub fn new(store: SharedStore, events: Arc<EventBroadcaster>) -> Self {
        Self { store, events }
    }

    /// Recompute a parent's progress from its subtasks.
    ///
    /// Runs after every subtask create/update/delete/status change. A parent
    /// with zero subtasks is returned untouched.
    pub async fn update_task_progress(&self, parent_id: &str) -> Result<Task> {
        let mut parent = self
            .store
            .get(parent_id)
            .await?
            .ok_or_else(|| WorklogError::task_not_found(parent_id))?;

        let subtasks: Vec<Task> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|t| t.parent_id.as_deref() == Some(parent_id))
            .collect();
        if subtasks.is_empty() {
            return Ok(parent);
        }

        let completed = subtasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        let progress = completion_percent(completed, subtasks.len());
        if progress != parent.progress {
            parent.progress = progress;
            self.store.upsert(parent.clone()).await?;
            debug!(task_id = %parent_id, progress, "progress rolled up");
            self.events.broadcast(EngineEvent::ProgressUpdated {
                task_id: parent_id.to_string(),
                progress,
            });
        }
        Ok(parent)
    }
}
