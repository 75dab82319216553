use std::collections::BTreeMap;

use intake_core::config::StoreConfig;
use intake_core::models::{Answer, PatientId};

use crate::cli::ContextArgs;
use crate::commands::common::{
    format_answer_lines, open_service, parse_before, resolve_context, resolve_question_ids,
};
use crate::error::CliError;

pub async fn run_answers(
    context: &ContextArgs,
    tags: &[String],
    as_json: bool,
    config: &StoreConfig,
) -> Result<(), CliError> {
    let context = resolve_context(context)?;
    let service = open_service(config).await?;
    let questions = resolve_question_ids(&service, tags).await?;

    let mut answers = service
        .load_answers(questions.iter().map(|(_, id)| *id).collect(), context)
        .await?;
    let by_tag: BTreeMap<String, Vec<Answer>> = questions
        .into_iter()
        .map(|(tag, id)| (tag, answers.remove(&id).unwrap_or_default()))
        .collect();

    print_answers(&by_tag, as_json)
}

pub async fn run_previous(
    patient: i64,
    before: Option<&str>,
    tags: &[String],
    as_json: bool,
    config: &StoreConfig,
) -> Result<(), CliError> {
    let before_ms = parse_before(before)?;
    let service = open_service(config).await?;

    let previous = service
        .load_previous_answers(tags.to_vec(), PatientId::new(patient), before_ms)
        .await?;
    let by_tag: BTreeMap<String, Vec<Answer>> = previous.into_iter().collect();

    print_answers(&by_tag, as_json)
}

fn print_answers(by_tag: &BTreeMap<String, Vec<Answer>>, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(by_tag)?);
        return Ok(());
    }

    if by_tag.is_empty() {
        println!("No answers found.");
    }
    for (tag, answers) in by_tag {
        for line in format_answer_lines(tag, answers) {
            println!("{line}");
        }
    }
    Ok(())
}
