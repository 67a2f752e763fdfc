use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use worklog::{
    config::EngineConfig,
    events::EventBroadcaster,
    model::{EntryPatch, NewTask, NewTimeEntry, Task, TaskStatus},
    store::{SharedStore, SnapshotStore},
    Engine,
};

#[derive(Parser)]
#[command(
    name = "worklog",
    about = "Worklog — work timers, billable time entries, and approvals",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Data directory for the task snapshot and config.toml
    #[arg(long, env = "WORKLOG_DATA_DIR", global = true)]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "WORKLOG_LOG", global = true)]
    log: Option<String>,

    /// Print results only, no confirmation lines.
    ///
    /// Errors still go to stderr, and --json output is never suppressed.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Manage tasks.
    ///
    /// Tasks own their time entries and at most one active timer. A task
    /// created with --parent becomes a subtask and feeds its parent's
    /// progress rollup.
    ///
    /// Examples:
    ///   worklog task add "API integration" --billable --rate 50
    ///   worklog task list
    ///   worklog task status task-1a2b3c4d completed
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Drive the active timer.
    ///
    /// At most one timer runs across all tasks; starting a timer on one task
    /// silently discards a timer running anywhere else. Only `stop` records
    /// a time entry.
    ///
    /// Examples:
    ///   worklog timer start task-1a2b3c4d --description "morning block"
    ///   worklog timer pause task-1a2b3c4d
    ///   worklog timer stop task-1a2b3c4d
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },
    /// Log, edit, and delete time entries.
    ///
    /// Entries take exactly one input mode: --hours, or --from/--to.
    /// Editing is limited to draft and rejected entries; editing a rejected
    /// entry returns it to draft for resubmission.
    ///
    /// Examples:
    ///   worklog entry add task-1a2b3c4d --hours 1.5 --description standup
    ///   worklog entry edit task-1a2b3c4d entry-9f8e7d6c --hours 2
    ///   worklog entry delete task-1a2b3c4d entry-9f8e7d6c
    Entry {
        #[command(subcommand)]
        action: EntryAction,
    },
    /// Run the approval workflow.
    ///
    /// draft → submitted → approved/rejected, approved → invoiced.
    /// Approve and reject accept several entry ids and report a per-entry
    /// outcome without stopping at the first failure.
    ///
    /// Examples:
    ///   worklog approval submit entry-9f8e7d6c
    ///   worklog approval queue
    ///   worklog approval reject entry-9f8e7d6c entry-5a4b3c2d --reason "wrong task"
    Approval {
        #[command(subcommand)]
        action: ApprovalAction,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Create a task (or a subtask with --parent).
    Add {
        title: String,
        /// Parent task id; makes this a subtask.
        #[arg(long)]
        parent: Option<String>,
        /// Estimated hours.
        #[arg(long)]
        estimate: Option<f64>,
        /// Bill entries on this task by default.
        #[arg(long)]
        billable: bool,
        /// Hourly rate applied to billable entries.
        #[arg(long)]
        rate: Option<f64>,
        /// Assignee shown in the approval queue.
        #[arg(long)]
        owner: Option<String>,
    },
    /// List all tasks.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one task with its entries.
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Set a task's status (todo, in_progress, review, completed, cancelled).
    Status { id: String, status: TaskStatus },
}

#[derive(Subcommand)]
enum TimerAction {
    /// Start a timer, displacing any timer on another task.
    Start {
        task: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Pause the running timer.
    Pause { task: String },
    /// Resume a paused timer.
    Resume { task: String },
    /// Stop the timer and record a draft entry.
    Stop {
        task: String,
        /// Overrides the description given at start.
        #[arg(long)]
        description: Option<String>,
    },
    /// Show the active timer, if any.
    Status,
}

#[derive(Subcommand)]
enum EntryAction {
    /// Log a manual entry against a task.
    Add {
        task: String,
        /// Direct duration in hours (decimal).
        #[arg(long)]
        hours: Option<f64>,
        /// Span start (RFC 3339, e.g. 2026-08-23T09:00:00Z).
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        /// Span end (RFC 3339).
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        #[arg(long, default_value = "")]
        description: String,
        /// Override the task's billable flag for this entry.
        #[arg(long)]
        billable: Option<bool>,
        /// Date the work is attributed to (YYYY-MM-DD, default today).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Edit a draft or rejected entry.
    Edit {
        task: String,
        entry: String,
        #[arg(long)]
        hours: Option<f64>,
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        billable: Option<bool>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete an entry (invoiced entries are permanent).
    Delete { task: String, entry: String },
}

#[derive(Subcommand)]
enum ApprovalAction {
    /// Submit a draft entry for approval.
    Submit { entry: String },
    /// Approve submitted entries. Several ids run as a best-effort batch.
    Approve {
        #[arg(required = true)]
        entries: Vec<String>,
    },
    /// Reject submitted entries with a reason.
    Reject {
        #[arg(required = true)]
        entries: Vec<String>,
        #[arg(long)]
        reason: String,
    },
    /// Mark an approved entry as invoiced.
    Invoice { entry: String },
    /// Show submitted entries, oldest first.
    Queue {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = EngineConfig::new(args.data_dir, args.log);
    setup_logging(&config.log, &config.log_format);

    let store: SharedStore = Arc::new(SnapshotStore::open(config.snapshot_path())?);
    let events = Arc::new(EventBroadcaster::with_capacity(config.event_capacity));
    let engine = Engine::new(store, events).await?;

    let quiet = args.quiet;
    match args.command {
        Command::Task { action } => run_task(&engine, action, quiet).await?,
        Command::Timer { action } => run_timer(&engine, action, quiet).await?,
        Command::Entry { action } => run_entry(&engine, action, quiet).await?,
        Command::Approval { action } => run_approval(&engine, action, quiet).await?,
    }
    Ok(())
}

async fn run_task(engine: &Engine, action: TaskAction, quiet: bool) -> Result<()> {
    match action {
        TaskAction::Add {
            title,
            parent,
            estimate,
            billable,
            rate,
            owner,
        } => {
            let task = engine
                .create_task(NewTask {
                    title,
                    parent_id: parent,
                    estimated_hours: estimate,
                    billable: Some(billable),
                    hourly_rate: rate,
                    owner,
                    progress: None,
                })
                .await?;
            if !quiet {
                println!("Created: {} — {}", task.id, task.title);
            }
        }

        TaskAction::List { json } => {
            let tasks = engine.list_tasks().await?;
            if json {
                println!("{}", serde_json::to_string(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                println!(
                    "{:<16} {:<12} {:>4}% {:>7} {:>7}  TITLE",
                    "ID", "STATUS", "PROG", "EST", "ACTUAL"
                );
                println!("{}", "-".repeat(72));
                for t in &tasks {
                    println!(
                        "{:<16} {:<12} {:>4}% {:>7.2} {:>7.2}  {}",
                        t.id, t.status, t.progress, t.estimated_hours, t.actual_hours, t.title
                    );
                }
                println!("\n{} task(s)", tasks.len());
            }
        }

        TaskAction::Show { id, json } => {
            let task = engine.get_task(&id).await?;
            if json {
                println!("{}", serde_json::to_string(&task)?);
            } else {
                print_task_detail(&task);
            }
        }

        TaskAction::Status { id, status } => {
            let task = engine.set_task_status(&id, status).await?;
            if !quiet {
                println!("{}: {}", task.id, task.status);
            }
        }
    }
    Ok(())
}

async fn run_timer(engine: &Engine, action: TimerAction, quiet: bool) -> Result<()> {
    match action {
        TimerAction::Start { task, description } => {
            let task = engine.timers.start(&task, description).await?;
            if !quiet {
                println!("Timer started on {} — {}", task.id, task.title);
            }
        }
        TimerAction::Pause { task } => {
            engine.timers.pause(&task).await?;
            if !quiet {
                println!("Paused.");
            }
        }
        TimerAction::Resume { task } => {
            engine.timers.resume(&task).await?;
            if !quiet {
                println!("Resumed.");
            }
        }
        TimerAction::Stop { task, description } => {
            let task = engine.timers.stop(&task, description).await?;
            // stop always appends the entry it just recorded
            if let Some(entry) = task.entries.last() {
                if !quiet {
                    println!(
                        "Stopped: {:.2}h recorded on {} ({})",
                        entry.duration, task.id, entry.id
                    );
                }
            }
        }
        TimerAction::Status => match engine.timers.active_task_id().await {
            None => println!("No active timer."),
            Some(task_id) => {
                let task = engine.get_task(&task_id).await?;
                match &task.active_timer {
                    Some(timer) => {
                        let state = if timer.is_paused { "paused" } else { "running" };
                        println!(
                            "{} on {} — {} ({})",
                            state,
                            task.id,
                            task.title,
                            fmt_elapsed(timer.elapsed_ms(Utc::now()))
                        );
                    }
                    None => println!("No active timer."),
                }
            }
        },
    }
    Ok(())
}

async fn run_entry(engine: &Engine, action: EntryAction, quiet: bool) -> Result<()> {
    match action {
        EntryAction::Add {
            task,
            hours,
            from,
            to,
            description,
            billable,
            date,
        } => {
            let task = engine
                .entries
                .create(
                    &task,
                    NewTimeEntry {
                        duration: hours,
                        started_at: from,
                        ended_at: to,
                        description,
                        billable,
                        date,
                    },
                )
                .await?;
            if let Some(entry) = task.entries.last() {
                if !quiet {
                    println!(
                        "Logged {:.2}h on {} ({}) — total {:.2}h",
                        entry.duration, task.id, entry.id, task.actual_hours
                    );
                }
            }
        }

        EntryAction::Edit {
            task,
            entry,
            hours,
            from,
            to,
            description,
            billable,
            date,
        } => {
            let task = engine
                .entries
                .update(
                    &task,
                    &entry,
                    EntryPatch {
                        duration: hours,
                        started_at: from,
                        ended_at: to,
                        description,
                        billable,
                        date,
                    },
                )
                .await?;
            if !quiet {
                println!("Updated {} — total {:.2}h", entry, task.actual_hours);
            }
        }

        EntryAction::Delete { task, entry } => {
            let task = engine.entries.delete(&task, &entry).await?;
            if !quiet {
                println!("Deleted {} — total {:.2}h", entry, task.actual_hours);
            }
        }
    }
    Ok(())
}

async fn run_approval(engine: &Engine, action: ApprovalAction, quiet: bool) -> Result<()> {
    match action {
        ApprovalAction::Submit { entry } => {
            let entry = engine.approvals.submit(&entry).await?;
            if !quiet {
                println!("Submitted {}", entry.id);
            }
        }

        ApprovalAction::Approve { entries } => {
            if let [entry] = entries.as_slice() {
                let entry = engine.approvals.approve(entry).await?;
                if !quiet {
                    println!("Approved {}", entry.id);
                }
            } else {
                let outcomes = engine.approvals.bulk_approve(&entries).await;
                print_outcomes(&outcomes);
            }
        }

        ApprovalAction::Reject { entries, reason } => {
            if let [entry] = entries.as_slice() {
                let entry = engine.approvals.reject(entry, &reason).await?;
                if !quiet {
                    println!("Rejected {}", entry.id);
                }
            } else {
                let outcomes = engine.approvals.bulk_reject(&entries, &reason).await?;
                print_outcomes(&outcomes);
            }
        }

        ApprovalAction::Invoice { entry } => {
            let entry = engine.approvals.mark_invoiced(&entry).await?;
            if !quiet {
                println!("Invoiced {}", entry.id);
            }
        }

        ApprovalAction::Queue { json } => {
            let queue = engine.approvals.queue().await?;
            if json {
                println!("{}", serde_json::to_string(&queue)?);
            } else if queue.is_empty() {
                println!("Approval queue is empty.");
            } else {
                println!(
                    "{:<16} {:<20} {:<10} {:>6} {:>9}  SUBMITTED",
                    "ENTRY", "TASK", "OWNER", "HOURS", "AMOUNT"
                );
                println!("{}", "-".repeat(80));
                for item in &queue {
                    println!(
                        "{:<16} {:<20} {:<10} {:>6.2} {:>9.2}  {}",
                        item.entry.id,
                        truncate(&item.task_title, 20),
                        item.owner.as_deref().unwrap_or("-"),
                        item.entry.duration,
                        item.entry.total_amount,
                        item.entry
                            .submitted_at
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
                println!("\n{} entry(ies) waiting", queue.len());
            }
        }
    }
    Ok(())
}

fn print_task_detail(task: &Task) {
    println!("{} — {}", task.id, task.title);
    println!("  status:    {}", task.status);
    if let Some(parent) = &task.parent_id {
        println!("  parent:    {parent}");
    }
    if let Some(owner) = &task.owner {
        println!("  owner:     {owner}");
    }
    println!("  progress:  {}%", task.progress);
    println!(
        "  hours:     {:.2} actual / {:.2} estimated",
        task.actual_hours, task.estimated_hours
    );
    if task.billable {
        println!("  rate:      {:.2}/h", task.hourly_rate);
    }
    if let Some(timer) = &task.active_timer {
        let state = if timer.is_paused { "paused" } else { "running" };
        println!(
            "  timer:     {state} ({})",
            fmt_elapsed(timer.elapsed_ms(Utc::now()))
        );
    }
    if !task.entries.is_empty() {
        println!("  entries:");
        for e in &task.entries {
            println!(
                "    {:<16} {} {:>6.2}h {:>9.2} {:<10} {}",
                e.id, e.date, e.duration, e.total_amount, e.status, e.description
            );
        }
    }
}

fn print_outcomes(outcomes: &[worklog::model::BulkOutcome]) {
    let mut succeeded = 0;
    for outcome in outcomes {
        match &outcome.error {
            None => {
                succeeded += 1;
                println!("ok   {}", outcome.entry_id);
            }
            Some(err) => println!("fail {} — {}", outcome.entry_id, err),
        }
    }
    println!("\n{succeeded}/{} succeeded", outcomes.len());
}

fn fmt_elapsed(ms: i64) -> String {
    let secs = ms / 1_000;
    let (h, m, s) = (secs / 3_600, (secs % 3_600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else {
        format!("{m}m {s:02}s")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

/// Initialise tracing to stderr so log lines never mix into table or JSON
/// output on stdout.
fn setup_logging(log_level: &str, log_format: &str) {
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
