//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// logtrig -- test trigger recipes and log-source definitions against sample text.
///
/// Use `logtrig <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "logtrig", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logtrig.toml configuration file.
    #[arg(short, long, default_value = "logtrig.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored text.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate and validate trigger recipes.
    Trigger(TriggerArgs),

    /// Run log-source transforms on sample input.
    Source(SourceArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- trigger ----

#[derive(Args, Debug)]
pub struct TriggerArgs {
    #[command(subcommand)]
    pub action: TriggerAction,
}

#[derive(Subcommand, Debug)]
pub enum TriggerAction {
    /// Evaluate one recipe against a sample log file.
    Test {
        /// Recipe YAML file.
        recipe: PathBuf,
        /// Sample log text file.
        sample: PathBuf,
        /// Log-source definition supplying the timestamp format.
        #[arg(long)]
        source: Option<PathBuf>,
        /// Timestamp format (overrides the source definition and config default).
        #[arg(long)]
        timestamp_format: Option<String>,
        /// Omit matches rejected by post-conditions from the trace.
        #[arg(long)]
        no_rejected: bool,
    },
    /// Load every recipe in a directory and report errors and warnings.
    Validate {
        /// Recipe directory (default: `trigger.recipe_dir` from config).
        path: Option<PathBuf>,
    },
}

// ---- source ----

#[derive(Args, Debug)]
pub struct SourceArgs {
    #[command(subcommand)]
    pub action: SourceAction,
}

#[derive(Subcommand, Debug)]
pub enum SourceAction {
    /// Trace whether a file path belongs to the source.
    Path {
        /// Log-source definition YAML file.
        definition: PathBuf,
        /// Candidate file path.
        path: String,
        /// Reference date for date tokens (yyyy-MM-dd, default: today).
        #[arg(long)]
        today: Option<String>,
    },
    /// Assemble multi-line blocks from a sample.
    Multiline {
        definition: PathBuf,
        sample: PathBuf,
    },
    /// Apply extract-append using a file path.
    Extract {
        definition: PathBuf,
        /// File path the sample was read from.
        path: String,
        sample: PathBuf,
    },
    /// Classify sample lines against a timestamp watermark.
    Watermark {
        definition: PathBuf,
        sample: PathBuf,
        /// Initial watermark, in the source's timestamp format.
        #[arg(long)]
        since: Option<String>,
    },
    /// Group sample lines.
    Group {
        definition: PathBuf,
        sample: PathBuf,
    },
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, trigger, source).
        #[arg(long)]
        section: Option<String>,
    },
}
