//! Repository abstraction over task records.
//!
//! Services depend only on [`TaskStore`]; swapping the in-memory mock layer
//! for the JSON-snapshot layer (or a future database) never touches them.

pub mod memory;
pub mod snapshot;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Task;

pub use memory::MemoryStore;
pub use snapshot::SnapshotStore;

/// Common interface for all task repositories.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch one task by id.
    async fn get(&self, id: &str) -> Result<Option<Task>>;

    /// All tasks, ordered by `created_at` then id for stable listings.
    async fn list(&self) -> Result<Vec<Task>>;

    /// Insert or replace a task record.
    async fn upsert(&self, task: Task) -> Result<()>;

    /// Remove a task. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

pub type SharedStore = Arc<dyn TaskStore>;

/// Sort used by every `list` implementation.
pub(crate) fn sort_for_listing(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
