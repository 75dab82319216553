//! Intake CLI - store and inspect visit intake answers
//!
//! Seeds the question catalog, applies clock-gated answer submissions, and
//! prints stored, previous, and photo answers.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::answers::{run_answers, run_previous};
use crate::commands::common::load_config;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::init::run_init;
use crate::commands::media::run_media;
use crate::commands::photos::run_photos;
use crate::commands::question::run_question;
use crate::commands::submit::run_submit;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so `--json` output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("intake=info,intake_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let config = load_config(cli.config.as_deref(), cli.db_path)?;
    match cli.command {
        Commands::Init => run_init(&config).await?,
        Commands::Question { command } => run_question(command, &config).await?,
        Commands::Submit { input, json } => run_submit(&input, json, &config).await?,
        Commands::Answers {
            context,
            tags,
            json,
        } => run_answers(&context, &tags, json, &config).await?,
        Commands::Previous {
            patient,
            before,
            tags,
            json,
        } => run_previous(patient, before.as_deref(), &tags, json, &config).await?,
        Commands::Media { command } => run_media(command, &config).await?,
        Commands::Photos { command } => run_photos(command, &config).await?,
        Commands::Config { command } => run_config(&command, &config, cli.config.as_deref())?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
