//! Central error taxonomy for the engine.
//!
//! Every operation reports failure through [`WorklogError`]; variants carry
//! the ids and source state a caller needs to decide whether a retry makes
//! sense. Bulk approval operations never surface these as a whole — they
//! collect per-entry outcomes instead.

use crate::model::EntryStatus;

pub type Result<T> = std::result::Result<T, WorklogError>;

#[derive(Debug, thiserror::Error)]
pub enum WorklogError {
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("time entry not found: {entry_id} (task {})", .task_id.as_deref().unwrap_or("unknown"))]
    EntryNotFound {
        /// Set when the lookup was scoped to one task; approval operations
        /// resolve entries across all tasks and leave this `None`.
        task_id: Option<String>,
        entry_id: String,
    },

    #[error("no active timer on task {task_id}: {reason}")]
    NoActiveTimer { task_id: String, reason: String },

    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("cannot {action} entry {entry_id} from status {from}")]
    InvalidTransition {
        entry_id: String,
        from: EntryStatus,
        action: &'static str,
    },

    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorklogError {
    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::TaskNotFound {
            task_id: task_id.to_string(),
        }
    }
}
