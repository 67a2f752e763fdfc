//! In-memory task repository, the mock data layer for tests and demos.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::Task;
use crate::store::TaskStore;

#[derive(Default)]
pub struct MemoryStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        super::sort_for_listing(&mut tasks);
        Ok(tasks)
    }

    async fn upsert(&self, task: Task) -> Result<()> {
        self.tasks.write().await.insert(task.id.clone(), task);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.tasks.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Task, TaskStatus};
    use chrono::{Duration, Utc};

    fn make_task(id: &str, offset_secs: i64) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            status: TaskStatus::Todo,
            parent_id: None,
            progress: 0,
            estimated_hours: 0.0,
            actual_hours: 0.0,
            billable: false,
            hourly_rate: 0.0,
            owner: None,
            active_timer: None,
            entries: Vec::new(),
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = MemoryStore::new();
        store.upsert(make_task("task-a", 0)).await.unwrap();

        let got = store.get("task-a").await.unwrap();
        assert_eq!(got.map(|t| t.id), Some("task-a".to_string()));
        assert!(store.get("task-z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_orders_by_created_at() {
        let store = MemoryStore::new();
        store.upsert(make_task("task-late", 60)).await.unwrap();
        store.upsert(make_task("task-early", -60)).await.unwrap();

        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["task-early", "task-late"]);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryStore::new();
        store.upsert(make_task("task-a", 0)).await.unwrap();

        assert!(store.delete("task-a").await.unwrap());
        assert!(!store.delete("task-a").await.unwrap());
        assert!(store.is_empty().await);
    }
}
