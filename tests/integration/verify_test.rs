//! Verification integration tests: the real sandbox plus the comparator.

use pretty_assertions::assert_eq;
use sql_quest::db::{QueryExecutor, SandboxConfig, SqliteSandbox};
use sql_quest::scenario::Scenario;
use sql_quest::verify::{compare, compare_with, FailReason, Verdict, Verifier};

async fn setup() -> (Scenario, SqliteSandbox) {
    let scenario = Scenario::black_pearl().unwrap();
    let sandbox = SqliteSandbox::new(scenario.fixture_sql(), SandboxConfig::default())
        .await
        .unwrap();
    (scenario, sandbox)
}

async fn verify(level_id: &str, sql: &str) -> Verdict {
    let (scenario, sandbox) = setup().await;
    let level = scenario.level(level_id).unwrap();
    Verifier::new(&sandbox)
        .verify_level(sql, level)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_audit_passes_every_level() {
    let (scenario, sandbox) = setup().await;
    let report = Verifier::new(&sandbox).audit(&scenario).await;

    let failures: Vec<_> = report.failures().map(|e| e.level_id.clone()).collect();
    assert_eq!(failures, Vec::<String>::new());
    assert_eq!(report.entries.len(), 10);
    assert!(report.all_passed());
}

#[test]
fn test_every_expected_result_matches_itself() {
    let scenario = Scenario::black_pearl().unwrap();
    for level in &scenario.levels {
        assert_eq!(
            compare_with(&level.expected_result, &level.expected_result, level.row_order),
            Verdict::Pass,
            "level {}",
            level.level_id
        );
        assert!(compare(&level.expected_result, &level.expected_result).is_pass());
    }
}

#[tokio::test]
async fn test_extra_column_is_a_column_count_mismatch() {
    let verdict = verify(
        "bp-5",
        "SELECT name, status, known_affiliation FROM pirates WHERE name = 'Barbarossa'",
    )
    .await;
    assert_eq!(
        verdict.reason(),
        Some(&FailReason::ColumnCountMismatch {
            expected: 2,
            actual: 3
        })
    );
}

#[tokio::test]
async fn test_swapped_columns_are_a_column_name_mismatch() {
    let verdict = verify(
        "bp-5",
        "SELECT known_affiliation, status FROM pirates WHERE name = 'Barbarossa'",
    )
    .await;
    assert_eq!(
        verdict.reason(),
        Some(&FailReason::ColumnNameMismatch {
            position: 0,
            expected: "status".to_string(),
            actual: "known_affiliation".to_string(),
        })
    );
}

#[tokio::test]
async fn test_column_names_ignore_case() {
    let verdict = verify(
        "bp-5",
        "SELECT status AS STATUS, known_affiliation AS Known_Affiliation FROM pirates WHERE name = 'Barbarossa'",
    )
    .await;
    assert!(verdict.is_pass());
}

#[tokio::test]
async fn test_missing_filter_is_a_row_count_mismatch() {
    let verdict = verify(
        "bp-2",
        "SELECT ship_name, ship_class FROM ships",
    )
    .await;
    assert_eq!(
        verdict.reason(),
        Some(&FailReason::RowCountMismatch {
            expected: 1,
            actual: 6
        })
    );
    assert!(verdict.detail().unwrap().contains("add a LIMIT"));
}

#[tokio::test]
async fn test_empty_result_hint() {
    let verdict = verify(
        "bp-5",
        "SELECT status, known_affiliation FROM pirates WHERE name = 'Nobody'",
    )
    .await;
    assert!(verdict.detail().unwrap().starts_with("Your query returned no rows"));
}

#[tokio::test]
async fn test_wrong_order_fails_an_ordered_level() {
    let verdict = verify(
        "bp-3",
        "SELECT item_description, entry_timestamp FROM ledger_entries \
         WHERE ship_id = 101 AND status = 'cursed' ORDER BY entry_timestamp DESC",
    )
    .await;
    match verdict.reason() {
        Some(FailReason::CellMismatch { row, column, .. }) => {
            assert_eq!(*row, 0);
            assert_eq!(column, "entry_timestamp");
        }
        other => panic!("expected a cell mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_any_order_passes_an_unordered_level() {
    let verdict = verify(
        "bp-7",
        "SELECT name FROM pirates WHERE name IN ('Pintel', 'Ragetti') ORDER BY name DESC",
    )
    .await;
    assert!(verdict.is_pass());
}

#[tokio::test]
async fn test_float_and_integer_totals_are_equal() {
    let verdict = verify(
        "bp-9",
        "SELECT SUM(value_doubloons) * 1.0 AS total_cursed_value \
         FROM ledger_entries WHERE ship_id = 101 AND status = 'cursed'",
    )
    .await;
    assert!(verdict.is_pass());
}

#[tokio::test]
async fn test_mutation_on_read_only_level_is_rejected() {
    let verdict = verify("bp-5", "DELETE FROM ledger_entries").await;
    assert_eq!(
        verdict.reason(),
        Some(&FailReason::MutatingStatement {
            statement: "DELETE".to_string()
        })
    );
}

#[tokio::test]
async fn test_unparseable_write_batch_on_read_only_level_is_rejected() {
    let (scenario, sandbox) = setup().await;
    let level = scenario.level("bp-5").unwrap();
    let count = "SELECT COUNT(*) FROM ledger_entries";
    let before = sandbox.run(count).await.unwrap();

    let verdict = Verifier::new(&sandbox)
        .verify_level(
            "DELETE FROM ledger_entries; \
             SELECT status, known_affiliation FROM pirates WHERE name GLOB 'Barbaross?'",
            level,
        )
        .await
        .unwrap();

    assert!(matches!(
        verdict.reason(),
        Some(FailReason::MutatingStatement { .. })
    ));
    assert_eq!(sandbox.run(count).await.unwrap(), before);
}
