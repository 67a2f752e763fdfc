//! Criterion benchmarks for hot paths in the worklog engine.
//!
//! Run with:
//!   cargo bench
//!
//! Covers:
//!   - Billing math (duration + amount per entry mutation)
//!   - Snapshot serialization (whole-store rewrite on every mutation)
//!   - Approval queue assembly (collect + sort across tasks)

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use worklog::{
    billing,
    model::{EntryStatus, Task, TaskStatus, TimeEntry},
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn sample_entry(task_id: &str, n: usize) -> TimeEntry {
    let start = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap() + Duration::minutes(n as i64);
    TimeEntry {
        id: format!("entry-{n:04}"),
        task_id: task_id.to_string(),
        started_at: Some(start),
        ended_at: Some(start + Duration::minutes(45)),
        duration: 0.75,
        description: format!("work item {n}"),
        date: start.date_naive(),
        billable: true,
        hourly_rate: 85.0,
        total_amount: 63.75,
        status: EntryStatus::Submitted,
        rejection_reason: None,
        submitted_at: Some(start + Duration::hours(8)),
        approved_at: None,
    }
}

fn sample_task(entry_count: usize) -> Task {
    let id = "task-bench01".to_string();
    let entries: Vec<TimeEntry> = (0..entry_count).map(|n| sample_entry(&id, n)).collect();
    Task {
        id,
        title: "Quarterly platform migration".to_string(),
        status: TaskStatus::InProgress,
        parent_id: None,
        progress: 40,
        estimated_hours: 120.0,
        actual_hours: 0.75 * entry_count as f64,
        billable: true,
        hourly_rate: 85.0,
        owner: Some("robin".to_string()),
        active_timer: None,
        entries,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
    }
}

// ─── Billing math ────────────────────────────────────────────────────────────

fn bench_billing(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
    let end = start + Duration::minutes(142);

    c.bench_function("billing_duration_hours", |b| {
        b.iter(|| {
            let h = billing::duration_hours(black_box(start), black_box(end), black_box(90_000));
            black_box(h);
        });
    });

    c.bench_function("billing_amount", |b| {
        b.iter(|| {
            let a = billing::amount(black_box(2.37), black_box(true), black_box(85.0));
            black_box(a);
        });
    });

    c.bench_function("billing_recompute_100_entries", |b| {
        let task = sample_task(100);
        b.iter(|| {
            let total: f64 = task
                .entries
                .iter()
                .map(|e| billing::amount(e.duration, e.billable, e.hourly_rate))
                .sum();
            black_box(billing::round2(total));
        });
    });
}

// ─── Snapshot serialization ──────────────────────────────────────────────────
//
// The snapshot store rewrites the full task set on every mutation, so
// serialization cost scales with history size.

fn bench_snapshot_codec(c: &mut Criterion) {
    let small = sample_task(5);
    let large = sample_task(200);
    let large_json = serde_json::to_string_pretty(&large).unwrap();

    c.bench_function("snapshot_serialize_task_5_entries", |b| {
        b.iter(|| {
            let s = serde_json::to_string_pretty(black_box(&small)).unwrap();
            black_box(s);
        });
    });

    c.bench_function("snapshot_serialize_task_200_entries", |b| {
        b.iter(|| {
            let s = serde_json::to_string_pretty(black_box(&large)).unwrap();
            black_box(s);
        });
    });

    c.bench_function("snapshot_parse_task_200_entries", |b| {
        b.iter(|| {
            let t: Task = serde_json::from_str(black_box(&large_json)).unwrap();
            black_box(t);
        });
    });
}

// ─── Approval queue assembly ─────────────────────────────────────────────────

fn bench_queue_assembly(c: &mut Criterion) {
    let tasks: Vec<Task> = (0..20)
        .map(|i| {
            let mut t = sample_task(25);
            t.id = format!("task-{i:02}");
            t
        })
        .collect();

    c.bench_function("queue_collect_and_sort_500_entries", |b| {
        b.iter(|| {
            let mut pending: Vec<&TimeEntry> = tasks
                .iter()
                .flat_map(|t| t.entries.iter())
                .filter(|e| e.status == EntryStatus::Submitted)
                .collect();
            pending.sort_by_key(|e| e.submitted_at);
            black_box(pending.len());
        });
    });
}

// ─── Entry point ─────────────────────────────────────────────────────────────

criterion_group!(
    benches,
    bench_billing,
    bench_snapshot_codec,
    bench_queue_assembly
);
criterion_main!(benches);
