use crate::cli::check_command::{CheckCommand, run_check};
use argh::FromArgs;
use std::process::ExitCode;

mod check_command;

/// A natural-deduction proof checker.
#[derive(FromArgs)]
struct Args {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Check(CheckCommand),
}

pub fn run_cli() -> ExitCode {
    let args: Args = argh::from_env();

    match args.command {
        Command::Check(cmd) => run_check(cmd),
    }
}
