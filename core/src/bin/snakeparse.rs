//! Snakeparse command line
//!
//! Discovers Snakemake workflows, parses each workflow's own arguments and
//! runs Snakemake with the resulting configuration.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

/// Variable holding the log filter, e.g. `SNAKEPARSE_LOG=debug`
const LOG_ENV: &str = "SNAKEPARSE_LOG";

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = snakeparse_core::run_from_args(args);
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
