use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    pagegist::logging::init().context("init logging")?;

    let cli = pagegist::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        pagegist::cli::Command::Analyze(args) => {
            pagegist::analyze::run(args).await.context("analyze")?;
        }
        pagegist::cli::Command::Summarize(args) => {
            pagegist::summarize::run(args).await.context("summarize")?;
        }
        pagegist::cli::Command::Highlight(args) => {
            pagegist::highlight::run(args).await.context("highlight")?;
        }
        pagegist::cli::Command::Cache { command } => {
            pagegist::cache::run(command).context("cache")?;
        }
    }

    Ok(())
}
