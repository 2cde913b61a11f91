//! Sandbox integration tests against the black-pearl fixture.

use std::time::Duration;

use pretty_assertions::assert_eq;
use sql_quest::db::{Cell, QueryExecutor, QueryResult, SandboxConfig, SqliteSandbox};
use sql_quest::error::ExecutionErrorKind;
use sql_quest::scenario::Scenario;

async fn black_pearl_sandbox(config: SandboxConfig) -> (Scenario, SqliteSandbox) {
    let scenario = Scenario::black_pearl().unwrap();
    let sandbox = SqliteSandbox::new(scenario.fixture_sql(), config)
        .await
        .unwrap();
    (scenario, sandbox)
}

fn count(result: &QueryResult) -> Cell {
    result.values[0][0].clone()
}

#[tokio::test]
async fn test_reference_query_reproduces_expected_result() {
    let (scenario, sandbox) = black_pearl_sandbox(SandboxConfig::default()).await;
    let level = scenario.level("bp-2").unwrap();

    let result = sandbox.run(&level.correct_query).await.unwrap();
    assert_eq!(result, level.expected_result);
}

#[tokio::test]
async fn test_fixture_row_counts() {
    let (_, sandbox) = black_pearl_sandbox(SandboxConfig::default()).await;

    for (table, expected) in [("pirates", 13.0), ("ships", 6.0), ("ports", 5.0)] {
        let result = sandbox
            .run(&format!("SELECT COUNT(*) FROM {table}"))
            .await
            .unwrap();
        assert_eq!(count(&result), Cell::Number(expected), "table {table}");
    }
}

#[tokio::test]
async fn test_delete_does_not_leak_into_next_run() {
    let (scenario, sandbox) = black_pearl_sandbox(SandboxConfig::default()).await;

    let deleted = sandbox.run("DELETE FROM ledger_entries").await.unwrap();
    assert!(deleted.columns.is_empty());

    let level = scenario.level("bp-9").unwrap();
    let result = sandbox.run(&level.correct_query).await.unwrap();
    assert_eq!(result, level.expected_result);
}

#[tokio::test]
async fn test_update_does_not_leak_into_next_run() {
    let (_, sandbox) = black_pearl_sandbox(SandboxConfig::default()).await;

    sandbox
        .run("UPDATE pirates SET status = 'retired' WHERE name = 'Barbarossa'")
        .await
        .unwrap();

    let result = sandbox
        .run("SELECT status FROM pirates WHERE name = 'Barbarossa'")
        .await
        .unwrap();
    assert_eq!(result.values, vec![vec![Cell::from("undead")]]);
}

#[tokio::test]
async fn test_drop_table_is_undone() {
    let (scenario, sandbox) = black_pearl_sandbox(SandboxConfig::default()).await;

    sandbox.run("DROP TABLE crew_manifests").await.unwrap();

    let level = scenario.level("bp-7").unwrap();
    let result = sandbox.run(&level.correct_query).await.unwrap();
    assert_eq!(result.row_count(), 2);
}

#[tokio::test]
async fn test_commit_cannot_persist_changes() {
    let (_, sandbox) = black_pearl_sandbox(SandboxConfig::default()).await;

    // The COMMIT may or may not be accepted; either way nothing persists.
    let _ = sandbox.run("DELETE FROM ledger_entries; COMMIT;").await;

    let result = sandbox.run("SELECT COUNT(*) FROM ledger_entries").await.unwrap();
    assert_eq!(count(&result), Cell::Number(15.0));
}

#[tokio::test]
async fn test_engine_errors_keep_their_text() {
    let (_, sandbox) = black_pearl_sandbox(SandboxConfig::default()).await;

    let err = sandbox.run("SELECT * FROM pirate").await.unwrap_err();
    assert_eq!(err.kind, ExecutionErrorKind::Reference);
    assert!(err.message.contains("no such table: pirate"));

    let err = sandbox.run("SELEC name FROM pirates").await.unwrap_err();
    assert_eq!(err.kind, ExecutionErrorKind::Syntax);
}

#[tokio::test]
async fn test_foreign_keys_are_enforced() {
    let (_, sandbox) = black_pearl_sandbox(SandboxConfig::default()).await;

    let err = sandbox
        .run("INSERT INTO crew_manifests (pirate_id, ship_id, role) VALUES (999, 101, 'Stowaway')")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ExecutionErrorKind::Constraint);
}

#[tokio::test]
async fn test_runaway_query_times_out_and_sandbox_recovers() {
    let config = SandboxConfig {
        timeout: Duration::from_millis(200),
        ..SandboxConfig::default()
    };
    let (scenario, sandbox) = black_pearl_sandbox(config).await;

    let err = sandbox
        .run("WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT COUNT(*) FROM c")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ExecutionErrorKind::Timeout);

    let level = scenario.level("bp-6").unwrap();
    let result = sandbox.run(&level.correct_query).await.unwrap();
    assert_eq!(result, level.expected_result);
}
