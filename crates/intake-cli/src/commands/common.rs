use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use intake_core::config::{StoreConfig, ENV_BUSY_TIMEOUT_MS, ENV_DB_PATH};
use intake_core::models::{Answer, AnswerContext, CaseId, DoctorId, PatientId, QuestionId, VisitId};
use intake_core::services::IntakeService;

use crate::cli::ContextArgs;
use crate::error::CliError;

/// Resolve the effective store config: file, then env, then `--db-path`.
pub fn load_config(
    config_path: Option<&Path>,
    db_path: Option<PathBuf>,
) -> Result<StoreConfig, CliError> {
    let mut config = match config_path {
        Some(path) => {
            let mut config = StoreConfig::load_from_path(path)?;
            config.apply_overrides(
                std::env::var(ENV_DB_PATH).ok(),
                std::env::var(ENV_BUSY_TIMEOUT_MS).ok(),
            )?;
            config
        }
        None => StoreConfig::load()?,
    };

    if let Some(path) = db_path {
        config.database_path = Some(path);
    }
    Ok(config)
}

pub async fn open_service(config: &StoreConfig) -> Result<IntakeService, CliError> {
    Ok(IntakeService::open(config.clone()).await?)
}

pub fn resolve_context(args: &ContextArgs) -> Result<AnswerContext, CliError> {
    match (args.patient, args.doctor, args.visit, args.case) {
        (Some(patient), None, Some(visit), None) => Ok(AnswerContext::Patient {
            patient_id: PatientId::new(patient),
            visit_id: VisitId::new(visit),
        }),
        (None, Some(doctor), Some(visit), None) => Ok(AnswerContext::Diagnosis {
            doctor_id: DoctorId::new(doctor),
            visit_id: VisitId::new(visit),
        }),
        (None, Some(doctor), None, Some(case)) => Ok(AnswerContext::CaseReview {
            doctor_id: DoctorId::new(doctor),
            case_id: CaseId::new(case),
        }),
        _ => Err(CliError::InvalidContext(
            "use --patient with --visit, --doctor with --visit, or --doctor with --case".into(),
        )),
    }
}

pub async fn resolve_question_id(service: &IntakeService, tag: &str) -> Result<QuestionId, CliError> {
    service
        .question_by_tag(tag.to_string())
        .await?
        .map(|question| question.id)
        .ok_or_else(|| CliError::UnknownQuestion(tag.to_string()))
}

/// Look up question IDs for tags, failing on the first unknown tag.
pub async fn resolve_question_ids(
    service: &IntakeService,
    tags: &[String],
) -> Result<Vec<(String, QuestionId)>, CliError> {
    let mut resolved = Vec::with_capacity(tags.len());
    for tag in tags {
        resolved.push((tag.clone(), resolve_question_id(service, tag).await?));
    }
    Ok(resolved)
}

/// Read the whole input file, or stdin for `-`.
pub fn read_input(input: &str) -> Result<String, CliError> {
    let raw = if input == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(input)?
    };

    if raw.trim().is_empty() {
        return Err(CliError::EmptyInput);
    }
    Ok(raw)
}

/// Parse an RFC 3339 cutoff into Unix ms; `None` means now.
pub fn parse_before(raw: Option<&str>) -> Result<i64, CliError> {
    raw.map_or_else(
        || Ok(Utc::now().timestamp_millis()),
        |raw| {
            DateTime::parse_from_rfc3339(raw.trim())
                .map(|time| time.timestamp_millis())
                .map_err(|_| CliError::InvalidTime(raw.to_string()))
        },
    )
}

fn answer_label(answer: &Answer) -> String {
    match (&answer.potential_answer, &answer.answer_text) {
        (Some(option), Some(text)) => format!("{option}: {text}"),
        (Some(option), None) => option.clone(),
        (None, Some(text)) => text.clone(),
        (None, None) => "(empty)".to_string(),
    }
}

pub fn format_answer_lines(tag: &str, answers: &[Answer]) -> Vec<String> {
    let mut lines = vec![format!("{tag}:")];
    if answers.is_empty() {
        lines.push("  (no answers)".to_string());
    }
    for answer in answers {
        lines.push(format!("  - {}", answer_label(answer)));
        for sub_answer in &answer.sub_answers {
            lines.push(format!(
                "      {} = {}",
                sub_answer.question_id,
                answer_label(sub_answer)
            ));
        }
    }
    lines
}
