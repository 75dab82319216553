use intake_core::config::StoreConfig;
use intake_core::models::{IntakeSubmission, StoreReport, WriteOutcome};

use crate::commands::common::{open_service, read_input};
use crate::error::CliError;

pub async fn run_submit(input: &str, as_json: bool, config: &StoreConfig) -> Result<(), CliError> {
    let batch = parse_submissions(&read_input(input)?)?;
    tracing::debug!("Submitting {} intake submissions", batch.len());

    let service = open_service(config).await?;
    let report = service.store_answers(batch).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Accept either a single submission object or an array of them.
pub fn parse_submissions(raw: &str) -> Result<Vec<IntakeSubmission>, CliError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}

pub fn format_report_lines(report: &StoreReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .outcomes
        .iter()
        .map(|outcome| match &outcome.outcome {
            WriteOutcome::Applied => format!(
                "applied  question {} in {} at {}",
                outcome.question_id, outcome.context, outcome.incoming
            ),
            WriteOutcome::Stale { stored } => format!(
                "stale    question {} in {} at {} (stored {stored})",
                outcome.question_id, outcome.context, outcome.incoming
            ),
        })
        .collect();
    lines.push(format!(
        "{} applied, {} stale",
        report.applied_count(),
        report.stale().count()
    ));
    lines
}
