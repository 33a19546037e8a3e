use std::{io, process::ExitCode};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod config;
mod diagnostics;
mod formula;
mod parse;
mod report;
mod semant;
mod strings;
mod util;

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false)
                .without_time(),
        )
        .with(
            EnvFilter::try_from_env(strings::LOG_ENV_VAR)
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    cli::run_cli()
}
