use intake_core::config::StoreConfig;

use crate::cli::QuestionCommands;
use crate::commands::common::{open_service, resolve_question_id};
use crate::error::CliError;

pub async fn run_question(command: QuestionCommands, config: &StoreConfig) -> Result<(), CliError> {
    let service = open_service(config).await?;

    match command {
        QuestionCommands::Add {
            tag,
            question_type,
            parent,
        } => {
            let parent_id = match parent {
                Some(parent) => Some(resolve_question_id(&service, &parent).await?),
                None => None,
            };
            let question = service
                .create_question(tag, question_type, parent_id)
                .await?;
            println!("{}", question.id);
        }
        QuestionCommands::Option { tag, text, summary } => {
            let question_id = resolve_question_id(&service, &tag).await?;
            let option = service
                .create_potential_answer(question_id, text, summary)
                .await?;
            println!("{}", option.id);
        }
    }

    Ok(())
}
