// Journal integration tests
// SQLite persistence of runs and events using an in-memory database

mod common;

use repomend::model::{EventCategory, RepairEvent};
use repomend::repository::{Journal, RunSummary, SCHEMA_VERSION};

fn summary(repository: &str, started_at: i64) -> RunSummary {
    RunSummary {
        repository: repository.to_string(),
        started_at,
        finished_at: started_at + 1500,
        dry_run: false,
        issues_found: 2,
        issues_remaining: 0,
        success: true,
    }
}

#[tokio::test]
async fn test_schema_init() {
    let journal = Journal::new(":memory:").await.unwrap();

    // First init creates the schema
    assert!(journal.init_schema().await.unwrap());
    // Second init finds it in place
    assert!(!journal.init_schema().await.unwrap());

    let version = journal.get_metadata("schema_version").await;
    assert_eq!(version.as_deref(), Some(SCHEMA_VERSION));
}

#[tokio::test]
async fn test_record_and_read_back_run() {
    let journal = common::create_test_journal().await;
    let events = vec![
        RepairEvent::new(EventCategory::Issue, "refs/heads/broken")
            .detail("null-reference: points at the zero hash")
            .failed(),
        RepairEvent::new(EventCategory::Reference, "refs/heads/broken")
            .before("0000000000000000000000000000000000000000")
            .after("1111111111111111111111111111111111111111")
            .detail("repointed"),
    ];

    let run_id = journal.record_run(&summary("/tmp/repo", 1_000), &events).await.unwrap();

    let runs = journal.recent_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, run_id);
    assert_eq!(runs[0].summary, summary("/tmp/repo", 1_000));
    assert_eq!(runs[0].event_count, 2);

    let stored = journal.run_events(run_id).await.unwrap();
    assert_eq!(stored, events);
}

#[tokio::test]
async fn test_recent_runs_newest_first() {
    let journal = common::create_test_journal().await;
    for i in 0..5 {
        journal
            .record_run(&summary(&format!("/repo/{}", i), i * 10_000), &[])
            .await
            .unwrap();
    }

    let runs = journal.recent_runs(3).await.unwrap();
    let repos: Vec<_> = runs.iter().map(|r| r.summary.repository.as_str()).collect();
    assert_eq!(repos, vec!["/repo/4", "/repo/3", "/repo/2"]);
    assert!(runs.iter().all(|r| r.event_count == 0));
}

#[tokio::test]
async fn test_many_events_span_batches() {
    let journal = common::create_test_journal().await;
    let events: Vec<_> = (0..450)
        .map(|i| RepairEvent::new(EventCategory::Rewrite, format!("commit-{}", i)))
        .collect();

    let run_id = journal.record_run(&summary("/repo", 0), &events).await.unwrap();
    let stored = journal.run_events(run_id).await.unwrap();
    assert_eq!(stored.len(), 450);
    assert_eq!(stored[449].subject, "commit-449");
}
