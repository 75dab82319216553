use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] intake_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Unknown question tag: {0}")]
    UnknownQuestion(String),
    #[error("Invalid context: {0}")]
    InvalidContext(String),
    #[error("Invalid time {0:?}: expected RFC 3339, e.g. 2024-05-01T12:00:00Z")]
    InvalidTime(String),
    #[error("No input provided")]
    EmptyInput,
}
