//! JSON-snapshot task repository backing the CLI.
//!
//! Same semantics as [`MemoryStore`](super::MemoryStore) plus a pretty-printed
//! snapshot file rewritten on every mutation. This is convenience persistence
//! for a single-user tool, not a durability layer — there is no journal and
//! no fsync discipline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, WorklogError};
use crate::model::Task;
use crate::store::TaskStore;

pub const SCHEMA_VERSION: u32 = 1;

/// On-disk layout of the snapshot file.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    schema_version: u32,
    tasks: Vec<Task>,
}

#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    tasks: RwLock<HashMap<String, Task>>,
}

impl SnapshotStore {
    /// Open a snapshot file, creating an empty store if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tasks = load_snapshot(&path)?;
        debug!(path = %path.display(), tasks = tasks.len(), "snapshot loaded");
        Ok(Self {
            path,
            tasks: RwLock::new(tasks.into_iter().map(|t| (t.id.clone(), t)).collect()),
        })
    }

    /// Rewrite the snapshot from the given record set.
    ///
    /// Called with the write lock held so two mutations cannot interleave
    /// their file writes out of order.
    fn persist(&self, tasks: &HashMap<String, Task>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut records: Vec<Task> = tasks.values().cloned().collect();
        super::sort_for_listing(&mut records);
        let stored = SnapshotFile {
            schema_version: SCHEMA_VERSION,
            tasks: records,
        };
        let content = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

fn load_snapshot(path: &Path) -> Result<Vec<Task>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let stored: SnapshotFile = serde_json::from_str(&content)?;
    if stored.schema_version == 0 || stored.schema_version > SCHEMA_VERSION {
        return Err(WorklogError::validation(format!(
            "snapshot schema_version {} is not supported (current: {})",
            stored.schema_version, SCHEMA_VERSION
        )));
    }
    Ok(stored.tasks)
}

#[async_trait]
impl TaskStore for SnapshotStore {
    async fn get(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        super::sort_for_listing(&mut tasks);
        Ok(tasks)
    }

    async fn upsert(&self, task: Task) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id.clone(), task);
        self.persist(&tasks)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut tasks = self.tasks.write().await;
        let existed = tasks.remove(id).is_some();
        if existed {
            self.persist(&tasks)?;
        }
        Ok(existed)
    }
}
