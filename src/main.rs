use std::process::ExitCode;

use clap::Parser;
use forum_search::{Cli, init_tracing, run_with};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_with(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!("command failed: {err:?}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
