use std::collections::BTreeMap;

use intake_core::config::StoreConfig;
use intake_core::models::{
    LogicalClock, NewPhotoSection, PatientId, PatientVisit, PhotoIntakeSection, VisitId,
    WriteOutcome,
};
use serde::Deserialize;

use crate::cli::PhotoCommands;
use crate::commands::common::{open_service, read_input, resolve_question_id, resolve_question_ids};
use crate::error::CliError;

/// Photo sections for one question, as read from `photos submit` input.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhotoSubmission {
    /// Question tag
    pub question: String,
    pub patient_id: PatientId,
    pub visit_id: VisitId,
    pub clock: LogicalClock,
    #[serde(default)]
    pub sections: Vec<NewPhotoSection>,
}

pub async fn run_photos(command: PhotoCommands, config: &StoreConfig) -> Result<(), CliError> {
    match command {
        PhotoCommands::Submit { input } => {
            let submission: PhotoSubmission = serde_json::from_str(&read_input(&input)?)?;
            let service = open_service(config).await?;
            let question_id = resolve_question_id(&service, &submission.question).await?;

            let outcome = service
                .store_photo_sections(
                    question_id,
                    PatientVisit::new(submission.patient_id, submission.visit_id),
                    submission.clock,
                    submission.sections,
                )
                .await?;
            match outcome {
                WriteOutcome::Applied => println!("applied"),
                WriteOutcome::Stale { stored } => println!("stale (stored {stored})"),
            }
        }
        PhotoCommands::List {
            patient,
            visit,
            tags,
            json,
        } => {
            let service = open_service(config).await?;
            let questions = resolve_question_ids(&service, &tags).await?;
            let mut sections = service
                .load_photo_sections(
                    questions.iter().map(|(_, id)| *id).collect(),
                    PatientVisit::new(PatientId::new(patient), VisitId::new(visit)),
                )
                .await?;
            let by_tag: BTreeMap<String, Vec<PhotoIntakeSection>> = questions
                .into_iter()
                .map(|(tag, id)| (tag, sections.remove(&id).unwrap_or_default()))
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&by_tag)?);
            } else {
                for (tag, sections) in &by_tag {
                    for line in format_section_lines(tag, sections) {
                        println!("{line}");
                    }
                }
            }
        }
    }
    Ok(())
}

pub fn format_section_lines(tag: &str, sections: &[PhotoIntakeSection]) -> Vec<String> {
    let mut lines = vec![format!("{tag}:")];
    if sections.is_empty() {
        lines.push("  (no photos)".to_string());
    }
    for section in sections {
        lines.push(format!("  {} ({} photos)", section.name, section.photos.len()));
        for slot in &section.photos {
            lines.push(format!("    [{}] {}: {}", slot.slot_id, slot.name, slot.photo_id));
        }
    }
    lines
}
