use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "intake")]
#[command(about = "Store and inspect visit intake answers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or migrate the database
    Init,
    /// Manage the question catalog
    Question {
        #[command(subcommand)]
        command: QuestionCommands,
    },
    /// Apply a JSON array of submissions from a file or `-` for stdin
    Submit {
        /// Input file, or `-` for stdin
        #[arg(value_name = "FILE", default_value = "-")]
        input: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show stored answers in a context
    Answers {
        #[command(flatten)]
        context: ContextArgs,
        /// Question tags to load
        #[arg(required = true)]
        tags: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a patient's answers from their most recent earlier visit
    Previous {
        /// Patient ID
        #[arg(long)]
        patient: i64,
        /// Only consider answers given before this RFC 3339 time (default: now)
        #[arg(long, value_name = "TIME")]
        before: Option<String>,
        /// Question tags to load
        #[arg(required = true)]
        tags: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage uploaded media
    Media {
        #[command(subcommand)]
        command: MediaCommands,
    },
    /// Store and show photo intake sections
    Photos {
        #[command(subcommand)]
        command: PhotoCommands,
    },
    /// Inspect store configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

/// Selects an answer context: patient + visit, doctor + visit, or doctor + case.
#[derive(Args, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Patient ID (patient intake)
    #[arg(long, conflicts_with = "doctor")]
    pub patient: Option<i64>,
    /// Doctor ID (diagnosis or case review)
    #[arg(long)]
    pub doctor: Option<i64>,
    /// Patient visit ID
    #[arg(long, conflicts_with = "case")]
    pub visit: Option<i64>,
    /// Patient case ID (case review)
    #[arg(long)]
    pub case: Option<i64>,
}

#[derive(Subcommand)]
pub enum QuestionCommands {
    /// Add a question to the catalog
    Add {
        /// Unique question tag
        tag: String,
        /// Question type, e.g. `q_type_single_select`
        #[arg(long = "type", value_name = "TYPE")]
        question_type: String,
        /// Tag of the parent question for sub-questions
        #[arg(long, value_name = "TAG")]
        parent: Option<String>,
    },
    /// Add a selectable option to a question
    Option {
        /// Question tag
        tag: String,
        /// Option text
        text: String,
        /// Short summary shown in reports
        #[arg(long)]
        summary: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MediaCommands {
    /// Record an uploaded object so a photo section can claim it
    Register {
        /// Uploading account ID
        #[arg(long)]
        uploader: i64,
        /// Object location
        #[arg(long)]
        url: String,
        /// MIME type
        #[arg(long, default_value = "image/jpeg")]
        mime: String,
    },
}

#[derive(Subcommand)]
pub enum PhotoCommands {
    /// Replace a question's photo sections from a JSON file or `-` for stdin
    Submit {
        /// Input file, or `-` for stdin
        #[arg(value_name = "FILE", default_value = "-")]
        input: String,
    },
    /// Show photo sections for a patient visit
    List {
        /// Patient ID
        #[arg(long)]
        patient: i64,
        /// Patient visit ID
        #[arg(long)]
        visit: i64,
        /// Question tags to load
        #[arg(required = true)]
        tags: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
