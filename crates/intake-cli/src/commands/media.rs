use intake_core::config::StoreConfig;

use crate::cli::MediaCommands;
use crate::commands::common::open_service;
use crate::error::CliError;

pub async fn run_media(command: MediaCommands, config: &StoreConfig) -> Result<(), CliError> {
    match command {
        MediaCommands::Register {
            uploader,
            url,
            mime,
        } => {
            let service = open_service(config).await?;
            let media = service.register_media(uploader, url, mime).await?;
            println!("{}", media.id);
        }
    }
    Ok(())
}
