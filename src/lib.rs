pub mod approval;
pub mod billing;
pub mod config;
pub mod entries;
pub mod error;
pub mod events;
pub mod model;
pub mod progress;
pub mod store;
pub mod timer;

pub use error::{Result, WorklogError};

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use approval::ApprovalService;
use entries::EntryService;
use events::{EngineEvent, EventBroadcaster};
use model::{short_id, NewTask, Task, TaskStatus};
use progress::ProgressAggregator;
use store::{MemoryStore, SharedStore};
use timer::TimerRegistry;

/// The assembled engine: shared store, event broadcaster, and the services
/// built over them. Construct once and share; every service is `&self`.
pub struct Engine {
    store: SharedStore,
    pub events: Arc<EventBroadcaster>,
    pub timers: TimerRegistry,
    pub entries: EntryService,
    pub approvals: ApprovalService,
    pub progress: ProgressAggregator,
}

impl Engine {
    /// Assemble the engine over an existing store. Restores a persisted
    /// active timer into the registry, so a reloaded snapshot keeps ticking.
    pub async fn new(store: SharedStore, events: Arc<EventBroadcaster>) -> Result<Self> {
        let timers = TimerRegistry::restore(store.clone(), events.clone()).await?;
        Ok(Self::assemble(store, events, timers))
    }

    /// Fresh engine over an empty in-memory store.
    pub fn in_memory() -> Self {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let events = Arc::new(EventBroadcaster::new());
        let timers = TimerRegistry::new(store.clone(), events.clone());
        Self::assemble(store, events, timers)
    }

    fn assemble(store: SharedStore, events: Arc<EventBroadcaster>, timers: TimerRegistry) -> Self {
        Self {
            entries: EntryService::new(store.clone(), events.clone()),
            approvals: ApprovalService::new(store.clone(), events.clone()),
            progress: ProgressAggregator::new(store.clone(), events.clone()),
            timers,
            store,
            events,
        }
    }

    // ─── Task surface ─────────────────────────────────────────────────────────
    // The engine consumes tasks from the surrounding product; this is the
    // slice of that surface the services need to be exercised end to end.

    pub async fn create_task(&self, input: NewTask) -> Result<Task> {
        if input.title.trim().is_empty() {
            return Err(WorklogError::validation("a task needs a title"));
        }
        if let Some(hours) = input.estimated_hours {
            if !(hours.is_finite() && hours >= 0.0) {
                return Err(WorklogError::validation(
                    "estimated hours must be zero or more",
                ));
            }
        }
        if let Some(rate) = input.hourly_rate {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(WorklogError::validation("hourly rate must be zero or more"));
            }
        }
        if let Some(progress) = input.progress {
            if progress > 100 {
                return Err(WorklogError::validation("progress must be 0-100"));
            }
        }
        if let Some(parent_id) = input.parent_id.as_deref() {
            if self.store.get(parent_id).await?.is_none() {
                return Err(WorklogError::task_not_found(parent_id));
            }
        }

        let task = Task {
            id: short_id("task"),
            title: input.title,
            status: TaskStatus::Todo,
            parent_id: input.parent_id,
            progress: input.progress.unwrap_or(0),
            estimated_hours: input.estimated_hours.unwrap_or(0.0),
            actual_hours: 0.0,
            billable: input.billable.unwrap_or(false),
            hourly_rate: input.hourly_rate.unwrap_or(0.0),
            owner: input.owner,
            active_timer: None,
            entries: Vec::new(),
            created_at: Utc::now(),
        };
        self.store.upsert(task.clone()).await?;

        info!(task_id = %task.id, title = %task.title, "task created");
        self.events.broadcast(EngineEvent::TaskCreated {
            task_id: task.id.clone(),
        });

        // A new subtask changes its parent's denominator.
        if let Some(parent_id) = task.parent_id.as_deref() {
            self.progress.update_task_progress(parent_id).await?;
        }
        Ok(task)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.store
            .get(task_id)
            .await?
            .ok_or_else(|| WorklogError::task_not_found(task_id))
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.store.list().await
    }

    /// Set a task's status and roll the change up into its parent's
    /// progress.
    pub async fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<Task> {
        let mut task = self.get_task(task_id).await?;
        let from = task.status;
        task.status = status;
        self.store.upsert(task.clone()).await?;

        if from != status {
            info!(task_id = %task_id, from = %from, to = %status, "task status changed");
            self.events.broadcast(EngineEvent::TaskStatusChanged {
                task_id: task_id.to_string(),
                from,
                to: status,
            });
        }

        if let Some(parent_id) = task.parent_id.as_deref() {
            self.progress.update_task_progress(parent_id).await?;
        }
        Ok(task)
    }
}
