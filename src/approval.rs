//! Approval workflow over time entries.
//!
//! Draft → Submitted → Approved | Rejected; Approved → Invoiced. A rejected
//! entry re-enters the flow only by being edited back to Draft (see
//! [`EntryService::update`](crate::entries::EntryService::update)).
//!
//! Bulk operations are best-effort and not atomic: one bad entry never rolls
//! back the rest, the caller gets a per-entry outcome list.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{Result, WorklogError};
use crate::events::{EngineEvent, EventBroadcaster};
use crate::model::{ApprovalQueueEntry, BulkOutcome, EntryStatus, Task, TimeEntry};
use crate::store::SharedStore;

/// Valid entry status transitions.
pub fn valid_transition(from: EntryStatus, to: EntryStatus) -> bool {
    matches!(
        (from, to),
        (EntryStatus::Draft, EntryStatus::Submitted)
            | (EntryStatus::Submitted, EntryStatus::Approved)
            | (EntryStatus::Submitted, EntryStatus::Rejected)
            | (EntryStatus::Approved, EntryStatus::Invoiced)
            | (EntryStatus::Rejected, EntryStatus::Draft) // via edit
    )
}

pub struct ApprovalService {
    store: SharedStore,
    events: Arc<EventBroadcaster>,
}

impl ApprovalService {
    pub fn new(store: SharedStore, events: Arc<EventBroadcaster>) -> Self {
        Self { store, events }
    }

    /// Submit a Draft entry for approval.
    pub async fn submit(&self, entry_id: &str) -> Result<TimeEntry> {
        self.transition(entry_id, EntryStatus::Submitted, "submit", None)
            .await
    }

    /// Approve a Submitted entry.
    pub async fn approve(&self, entry_id: &str) -> Result<TimeEntry> {
        self.transition(entry_id, EntryStatus::Approved, "approve", None)
            .await
    }

    /// Reject a Submitted entry. The reason is mandatory and non-blank.
    pub async fn reject(&self, entry_id: &str, reason: &str) -> Result<TimeEntry> {
        validate_reason(reason)?;
        self.transition(
            entry_id,
            EntryStatus::Rejected,
            "reject",
            Some(reason.to_string()),
        )
        .await
    }

    /// Mark an Approved entry as invoiced. Invoicing itself happens outside
    /// this crate; only the transition lives here.
    pub async fn mark_invoiced(&self, entry_id: &str) -> Result<TimeEntry> {
        self.transition(entry_id, EntryStatus::Invoiced, "invoice", None)
            .await
    }

    /// Approve a batch. Failures are reported per entry, never as a whole.
    pub async fn bulk_approve(&self, entry_ids: &[String]) -> Vec<BulkOutcome> {
        let mut outcomes = Vec::with_capacity(entry_ids.len());
        for entry_id in entry_ids {
            outcomes.push(outcome(entry_id, self.approve(entry_id).await));
        }
        outcomes
    }

    /// Reject a batch with one shared reason, validated once up front.
    pub async fn bulk_reject(&self, entry_ids: &[String], reason: &str) -> Result<Vec<BulkOutcome>> {
        validate_reason(reason)?;
        let mut outcomes = Vec::with_capacity(entry_ids.len());
        for entry_id in entry_ids {
            outcomes.push(outcome(entry_id, self.reject(entry_id, reason).await));
        }
        Ok(outcomes)
    }

    /// All Submitted entries joined with task context, oldest submission
    /// first.
    pub async fn queue(&self) -> Result<Vec<ApprovalQueueEntry>> {
        let mut queue = Vec::new();
        for task in self.store.list().await? {
            for entry in &task.entries {
                if entry.status == EntryStatus::Submitted {
                    queue.push(ApprovalQueueEntry {
                        entry: entry.clone(),
                        task_title: task.title.clone(),
                        owner: task.owner.clone(),
                    });
                }
            }
        }
        queue.sort_by_key(|q| q.entry.submitted_at.unwrap_or(DateTime::<Utc>::MIN_UTC));
        Ok(queue)
    }

    async fn transition(
        &self,
        entry_id: &str,
        to: EntryStatus,
        action: &'static str,
        reason: Option<String>,
    ) -> Result<TimeEntry> {
        let (mut task, pos) = self.find_task_for_entry(entry_id).await?;
        let entry = &mut task.entries[pos];

        let from = entry.status;
        if !valid_transition(from, to) {
            return Err(WorklogError::InvalidTransition {
                entry_id: entry_id.to_string(),
                from,
                action,
            });
        }

        entry.status = to;
        match to {
            EntryStatus::Submitted => entry.submitted_at = Some(Utc::now()),
            EntryStatus::Approved => {
                entry.approved_at = Some(Utc::now());
                entry.rejection_reason = None;
            }
            EntryStatus::Rejected => {
                entry.rejection_reason = reason;
                entry.approved_at = None;
            }
            EntryStatus::Invoiced | EntryStatus::Draft => {}
        }

        let updated = entry.clone();
        self.store.upsert(task).await?;

        info!(entry_id = %entry_id, from = %from, to = %to, "entry transitioned");
        self.events.broadcast(EngineEvent::ApprovalChanged {
            entry_id: entry_id.to_string(),
            from,
            to,
        });
        Ok(updated)
    }

    /// Resolve an entry id to its owning task. Approval callers hold entry
    /// ids without task context, so this scans.
    async fn find_task_for_entry(&self, entry_id: &str) -> Result<(Task, usize)> {
        for task in self.store.list().await? {
            if let Some(pos) = task.entries.iter().position(|e| e.id == entry_id) {
                return Ok((task, pos));
            }
        }
        Err(WorklogError::EntryNotFound {
            task_id: None,
            entry_id: entry_id.to_string(),
        })
    }
}

fn validate_reason(reason: &str) -> Result<()> {
    if reason.trim().is_empty() {
        return Err(WorklogError::validation("a rejection needs a reason"));
    }
    Ok(())
}

fn outcome(entry_id: &str, result: Result<TimeEntry>) -> BulkOutcome {
    match result {
        Ok(entry) => BulkOutcome {
            entry_id: entry_id.to_string(),
            status: Some(entry.status),
            error: None,
        },
        Err(err) => BulkOutcome {
            entry_id: entry_id.to_string(),
            status: None,
            error: Some(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{short_id, TaskStatus};
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn make_entry(id: &str, status: EntryStatus) -> TimeEntry {
        TimeEntry {
            id: id.to_string(),
            task_id: "task-a".to_string(),
            started_at: None,
            ended_at: None,
            duration: 1.0,
            description: "work".to_string(),
            date: Utc::now().date_naive(),
            billable: true,
            hourly_rate: 50.0,
            total_amount: 50.0,
            status,
            rejection_reason: None,
            submitted_at: matches!(status, EntryStatus::Submitted).then(Utc::now),
            approved_at: None,
        }
    }

    async fn setup(entries: Vec<TimeEntry>) -> (SharedStore, ApprovalService) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        store
            .upsert(Task {
                id: "task-a".to_string(),
                title: "api work".to_string(),
                status: TaskStatus::InProgress,
                parent_id: None,
                progress: 0,
                estimated_hours: 0.0,
                actual_hours: 0.0,
                billable: true,
                hourly_rate: 50.0,
                owner: Some("kim".to_string()),
                active_timer: None,
                entries,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let service = ApprovalService::new(store.clone(), Arc::new(EventBroadcaster::new()));
        (store, service)
    }

    #[tokio::test]
    async fn submit_moves_draft_to_submitted_with_timestamp() {
        let (_store, service) = setup(vec![make_entry("entry-1", EntryStatus::Draft)]).await;
        let entry = service.submit("entry-1").await.unwrap();
        assert_eq!(entry.status, EntryStatus::Submitted);
        assert!(entry.submitted_at.is_some());
    }

    #[tokio::test]
    async fn submit_is_rejected_outside_draft() {
        let (_store, service) = setup(vec![make_entry("entry-1", EntryStatus::Submitted)]).await;
        let err = service.submit("entry-1").await.unwrap_err();
        match err {
            WorklogError::InvalidTransition { from, action, .. } => {
                assert_eq!(from, EntryStatus::Submitted);
                assert_eq!(action, "submit");
            }
            other => panic!("expected InvalidTransition, got {other}"),
        }
    }

    #[tokio::test]
    async fn approve_requires_submitted() {
        let (_store, service) = setup(vec![
            make_entry("entry-1", EntryStatus::Draft),
            make_entry("entry-2", EntryStatus::Submitted),
        ])
        .await;

        assert!(matches!(
            service.approve("entry-1").await.unwrap_err(),
            WorklogError::InvalidTransition { .. }
        ));
        let entry = service.approve("entry-2").await.unwrap();
        assert_eq!(entry.status, EntryStatus::Approved);
        assert!(entry.approved_at.is_some());
    }

    #[tokio::test]
    async fn reject_requires_a_non_blank_reason() {
        let (_store, service) = setup(vec![make_entry("entry-1", EntryStatus::Submitted)]).await;

        let err = service.reject("entry-1", "   ").await.unwrap_err();
        assert!(matches!(err, WorklogError::Validation { .. }));

        let entry = service.reject("entry-1", "needs detail").await.unwrap();
        assert_eq!(entry.status, EntryStatus::Rejected);
        assert_eq!(entry.rejection_reason.as_deref(), Some("needs detail"));
    }

    #[tokio::test]
    async fn rejected_is_terminal_for_approval_actions() {
        let (_store, service) = setup(vec![make_entry("entry-1", EntryStatus::Rejected)]).await;
        assert!(matches!(
            service.approve("entry-1").await.unwrap_err(),
            WorklogError::InvalidTransition { .. }
        ));
        assert!(matches!(
            service.submit("entry-1").await.unwrap_err(),
            WorklogError::InvalidTransition { .. }
        ));
    }

    #[tokio::test]
    async fn mark_invoiced_requires_approved() {
        let (_store, service) = setup(vec![
            make_entry("entry-1", EntryStatus::Approved),
            make_entry("entry-2", EntryStatus::Submitted),
        ])
        .await;

        let entry = service.mark_invoiced("entry-1").await.unwrap();
        assert_eq!(entry.status, EntryStatus::Invoiced);
        assert!(matches!(
            service.mark_invoiced("entry-2").await.unwrap_err(),
            WorklogError::InvalidTransition { .. }
        ));
    }

    #[tokio::test]
    async fn bulk_approve_keeps_going_past_failures() {
        let (store, service) = setup(vec![
            make_entry("entry-a", EntryStatus::Submitted),
            make_entry("entry-b", EntryStatus::Draft),
            make_entry("entry-c", EntryStatus::Submitted),
        ])
        .await;

        let ids: Vec<String> = ["entry-a", "entry-b", "entry-c"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let outcomes = service.bulk_approve(&ids).await;

        assert!(outcomes[0].ok());
        assert!(!outcomes[1].ok(), "draft entry must fail");
        assert!(outcomes[2].ok(), "failure must not stop later entries");

        let task = store.get("task-a").await.unwrap().unwrap();
        assert_eq!(task.entry("entry-a").unwrap().status, EntryStatus::Approved);
        assert_eq!(task.entry("entry-b").unwrap().status, EntryStatus::Draft);
        assert_eq!(task.entry("entry-c").unwrap().status, EntryStatus::Approved);
    }

    #[tokio::test]
    async fn bulk_reject_validates_reason_before_touching_anything() {
        let (store, service) = setup(vec![make_entry("entry-a", EntryStatus::Submitted)]).await;

        let err = service
            .bulk_reject(&["entry-a".to_string()], "")
            .await
            .unwrap_err();
        assert!(matches!(err, WorklogError::Validation { .. }));

        let task = store.get("task-a").await.unwrap().unwrap();
        assert_eq!(task.entry("entry-a").unwrap().status, EntryStatus::Submitted);
    }

    #[tokio::test]
    async fn queue_orders_by_submission_time_oldest_first() {
        let now = Utc::now();
        let mut oldest = make_entry("entry-old", EntryStatus::Submitted);
        oldest.submitted_at = Some(now - Duration::hours(3));
        let mut middle = make_entry("entry-mid", EntryStatus::Submitted);
        middle.submitted_at = Some(now - Duration::hours(2));
        let mut newest = make_entry("entry-new", EntryStatus::Submitted);
        newest.submitted_at = Some(now - Duration::hours(1));
        let draft = make_entry("entry-draft", EntryStatus::Draft);

        // Stored out of order on purpose.
        let (_store, service) = setup(vec![newest, draft, oldest, middle]).await;

        let queue = service.queue().await.unwrap();
        let ids: Vec<&str> = queue.iter().map(|q| q.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["entry-old", "entry-mid", "entry-new"]);
        assert_eq!(queue[0].task_title, "api work");
        assert_eq!(queue[0].owner.as_deref(), Some("kim"));
    }

    #[tokio::test]
    async fn unknown_entry_is_not_found() {
        let (_store, service) = setup(Vec::new()).await;
        let err = service.submit(&short_id("entry")).await.unwrap_err();
        assert!(matches!(
            err,
            WorklogError::EntryNotFound { task_id: None, .. }
        ));
    }
}
