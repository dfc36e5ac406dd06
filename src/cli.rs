use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::MaxLength;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Analyze(AnalyzeArgs),
    Summarize(SummarizeArgs),
    Highlight(HighlightArgs),
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Local HTML file to analyze.
    #[arg(long, conflicts_with = "url")]
    pub input: Option<PathBuf>,

    /// Page URL to fetch and analyze (must be http/https).
    #[arg(long)]
    pub url: Option<String>,

    /// Settings file (YAML); enables auto-summarize when it sets the flag.
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SummarizeArgs {
    /// Local HTML file to summarize.
    #[arg(long, conflicts_with = "url")]
    pub input: Option<PathBuf>,

    /// Page URL to fetch and summarize (must be http/https).
    #[arg(long)]
    pub url: Option<String>,

    /// Settings file (YAML).
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Summary cache file (default: from settings).
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Skip the quick summary.
    #[arg(long)]
    pub no_quick: bool,

    /// Generate a detailed markdown summary.
    #[arg(long)]
    pub detailed: bool,

    /// Extract key points.
    #[arg(long)]
    pub key_points: bool,

    /// Extract action items.
    #[arg(long)]
    pub action_items: bool,

    /// Generate a simplified explanation.
    #[arg(long)]
    pub eli15: bool,

    /// Extract key concepts with definitions.
    #[arg(long)]
    pub concepts: bool,

    /// Target summary length (default: from settings).
    #[arg(long, value_enum)]
    pub max_length: Option<MaxLength>,

    /// Regenerate even when a cached summary exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct HighlightArgs {
    /// Local HTML file to highlight.
    #[arg(long, conflicts_with = "url")]
    pub input: Option<PathBuf>,

    /// Page URL to fetch and highlight (must be http/https).
    #[arg(long)]
    pub url: Option<String>,

    /// Settings file (YAML).
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    Clear(CacheArgs),
    Stats(CacheArgs),
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Settings file (YAML).
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Summary cache file (default: from settings).
    #[arg(long)]
    pub cache: Option<PathBuf>,
}
