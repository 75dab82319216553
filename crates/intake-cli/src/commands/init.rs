use intake_core::config::StoreConfig;

use crate::commands::common::open_service;
use crate::error::CliError;

pub async fn run_init(config: &StoreConfig) -> Result<(), CliError> {
    let service = open_service(config).await?;
    println!("{}", service.db_path().display());
    Ok(())
}
