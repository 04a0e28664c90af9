//! darcflow - command line front end for the docking workflow steps.

mod cli;
mod commands;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    let default_filter = if cli.verbose { "darcflow=debug,info" } else { "darcflow=info,warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match commands::Context::load(&cli) {
        Ok(ctx) => commands::dispatch(cli.command, &ctx).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
