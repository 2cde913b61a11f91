//! Rendering of CLI results as text or JSON.

use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::scenario::{Level, Scenario};
use crate::session::Submission;
use crate::verify::{AuditReport, Verdict};

/// Renders the level list with completion marks.
pub fn render_levels(scenario: &Scenario, statuses: &[(&Level, bool)], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = format!("{} ({})\n", scenario.title, scenario.id);
            for (level, done) in statuses {
                let mark = if *done { "x" } else { " " };
                out.push_str(&format!("  [{mark}] {:<6} {}\n", level.level_id, level.title));
            }
            out
        }
        OutputFormat::Json => to_json(&json!({
            "scenario": scenario.id,
            "title": scenario.title,
            "levels": statuses
                .iter()
                .map(|(level, done)| json!({
                    "level_id": level.level_id,
                    "title": level.title,
                    "task": level.task,
                    "completed": done,
                }))
                .collect::<Vec<_>>(),
        })),
    }
}

/// Renders the fixture schema.
pub fn render_schema(scenario: &Scenario, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{}\n", scenario.schema_sql.trim_end()),
        OutputFormat::Json => to_json(&json!({
            "scenario": scenario.id,
            "schema": scenario.schema_sql,
        })),
    }
}

/// Renders a submission: the success message, the hint, or the raw engine error.
pub fn render_submission(level: &Level, submission: &Submission, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => match &submission.outcome {
            Ok(Verdict::Pass) => {
                let mut out = format!("Correct! {}\n\n{}\n", level.title, level.success_message);
                if submission.newly_completed {
                    out.push_str(&format!("\nLevel {} completed.\n", level.level_id));
                }
                out
            }
            Ok(Verdict::Fail { detail, .. }) => {
                format!("Not quite. {detail}\nHint: {}\n", level.hint)
            }
            Err(e) => format!("{e}\n"),
        },
        OutputFormat::Json => {
            let body = match &submission.outcome {
                Ok(verdict) => json!({
                    "level_id": submission.level_id,
                    "verdict": verdict,
                    "message": match verdict {
                        Verdict::Pass => level.success_message.as_str(),
                        Verdict::Fail { .. } => level.hint.as_str(),
                    },
                    "newly_completed": submission.newly_completed,
                }),
                Err(e) => json!({
                    "level_id": submission.level_id,
                    "error": e,
                }),
            };
            to_json(&body)
        }
    }
}

/// Renders an audit report.
pub fn render_audit(report: &AuditReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = format!("Audit of '{}'\n", report.scenario_id);
            for entry in &report.entries {
                let line = match &entry.outcome {
                    Ok(Verdict::Pass) => "ok".to_string(),
                    Ok(Verdict::Fail { detail, .. }) => format!("FAILED: {detail}"),
                    Err(e) => format!("ERROR: {e}"),
                };
                out.push_str(&format!("  {:<6} {line}\n", entry.level_id));
            }
            let failed = report.failures().count();
            if failed == 0 {
                out.push_str(&format!("All {} levels passed.\n", report.entries.len()));
            } else {
                out.push_str(&format!(
                    "{failed} of {} levels failed.\n",
                    report.entries.len()
                ));
            }
            out
        }
        OutputFormat::Json => to_json(&json!({
            "scenario": report.scenario_id,
            "passed": report.all_passed(),
            "levels": report
                .entries
                .iter()
                .map(|entry| match &entry.outcome {
                    Ok(verdict) => json!({ "level_id": entry.level_id, "verdict": verdict }),
                    Err(e) => json!({ "level_id": entry.level_id, "error": e }),
                })
                .collect::<Vec<_>>(),
        })),
    }
}

fn to_json(value: &Value) -> String {
    format!("{}\n", serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
}
