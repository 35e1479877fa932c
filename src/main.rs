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
    lbook::logging::init().context("init logging")?;

    let cli = lbook::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let library = lbook::library::Library::new(&cli.library);
    lbook::commands::run(library, cli.command)
        .await
        .context("run command")
}
