mod cli;
mod commands;
mod error;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let output = commands::run(&cli).await?;
    output::render(&output.data, cli.format, cli.pretty)?;

    if cli.strict && (output.failed_providers > 0 || output.invalid_queries > 0) {
        return Err(CliError::StrictModeViolation {
            failed_providers: output.failed_providers,
            invalid_queries: output.invalid_queries,
        });
    }

    if output.invalid_queries > 0 {
        return Ok(ExitCode::from(2));
    }
    if output.failed_providers > 0 {
        return Ok(ExitCode::from(3));
    }

    Ok(ExitCode::SUCCESS)
}
