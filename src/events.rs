//! Typed engine events for outer layers (UI toasts, dashboards, sync).
//!
//! Subscribers attach through [`EventBroadcaster::subscribe`]; the engine
//! never calls out into consumers.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::{EntryStatus, TaskStatus};

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    TaskCreated { task_id: String },
    TaskStatusChanged { task_id: String, from: TaskStatus, to: TaskStatus },
    TimerStarted { task_id: String, timer_id: String },
    TimerPaused { task_id: String },
    TimerResumed { task_id: String },
    TimerStopped { task_id: String, entry_id: String, duration: f64 },
    EntryCreated { task_id: String, entry_id: String },
    EntryUpdated { task_id: String, entry_id: String },
    EntryDeleted { task_id: String, entry_id: String },
    ApprovalChanged { entry_id: String, from: EntryStatus, to: EntryStatus },
    ProgressUpdated { task_id: String, progress: u8 },
}

/// Broadcasts engine events to all subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<EngineEvent>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        // broadcast::channel panics on zero capacity
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send an event to all subscribers.
    pub fn broadcast(&self, event: EngineEvent) {
        // A send with zero receivers is not a failure.
        let _ = self.tx.send(event);
    }

    /// Subscribe to all engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}
