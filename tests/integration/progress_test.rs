//! Session and progress integration tests.

use pretty_assertions::assert_eq;
use sql_quest::db::SandboxConfig;
use sql_quest::persistence::ProgressStore;
use sql_quest::scenario::Scenario;
use sql_quest::session::Session;
use tempfile::tempdir;

async fn open_session(path: &std::path::Path) -> Session {
    let store = ProgressStore::open(path).await.unwrap();
    Session::open(
        Scenario::black_pearl().unwrap(),
        SandboxConfig::default(),
        Some(store),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_playing_through_every_level() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("progress.db");
    let session = open_session(&path).await;

    let levels: Vec<(String, String)> = session
        .scenario()
        .levels
        .iter()
        .map(|l| (l.level_id.clone(), l.correct_query.clone()))
        .collect();

    for (level_id, sql) in &levels {
        let submission = session.submit(level_id, sql).await.unwrap();
        assert!(submission.passed(), "level {level_id}");
        assert!(submission.newly_completed, "level {level_id}");
    }

    let expected: Vec<String> = levels
        .iter()
        .map(|(id, _)| format!("black-pearl/{id}"))
        .collect();
    assert_eq!(session.progress().unwrap().completed_levels().await.unwrap(), expected);
    session.close().await;
}

#[tokio::test]
async fn test_progress_is_visible_after_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("progress.db");

    let session = open_session(&path).await;
    let sql = session.level("bp-6").unwrap().correct_query.clone();
    assert!(session.submit("bp-6", &sql).await.unwrap().passed());
    session.close().await;

    let session = open_session(&path).await;
    let done: Vec<String> = session
        .level_statuses()
        .await
        .unwrap()
        .into_iter()
        .filter(|(_, done)| *done)
        .map(|(level, _)| level.level_id.clone())
        .collect();
    assert_eq!(done, vec!["bp-6"]);
    session.close().await;
}

#[tokio::test]
async fn test_failed_and_erroring_submissions_record_nothing() {
    let dir = tempdir().unwrap();
    let session = open_session(&dir.path().join("progress.db")).await;

    let failed = session
        .submit("bp-1", "SELECT log_timestamp, details FROM ship_logs")
        .await
        .unwrap();
    assert!(!failed.passed());

    let errored = session.submit("bp-1", "SELECT * FROM logbook").await.unwrap();
    assert!(errored.outcome.is_err());

    assert!(session.progress().unwrap().completed_levels().await.unwrap().is_empty());
    session.close().await;
}
