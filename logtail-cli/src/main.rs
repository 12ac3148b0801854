//! logtail -- follow search engine indices like a log file.
//!
//! `main` is the only place that terminates the process: every failure is
//! returned as a [`CliError`](error::CliError), reported once on stderr and
//! mapped to an exit code.

mod cli;
mod error;
mod logging;
mod run;
mod settings;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match real_main(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "logtail terminated with error");
            eprintln!("logtail: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn real_main(cli: Cli) -> Result<(), CliError> {
    let config = settings::load(&cli).await?;

    if cli.print_config {
        print!("{}", settings::redacted_toml(&config)?);
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        url = %config.search.url,
        follow = config.tail.follow,
        "logtail starting"
    );

    run::run(config).await
}
