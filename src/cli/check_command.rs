use crate::{
    config::LrConfig,
    diagnostics::Diagnostic,
    report::{FileReport, Outcome, display_report, print_file_report},
    semant::{CheckOptions, check_source},
    strings,
};
use argh::FromArgs;
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::{info, warn};

/// Check natural-deduction proof files.
#[derive(FromArgs)]
#[argh(subcommand, name = "check")]
pub struct CheckCommand {
    /// path to lrcheck.toml config file.
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// print without colors.
    #[argh(switch)]
    plain: bool,

    /// the proof files to check.
    #[argh(positional)]
    files: Vec<PathBuf>,
}

pub fn run_check(cmd: CheckCommand) -> ExitCode {
    let config = match LrConfig::load(cmd.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", Diagnostic::err_config(&err).render(!cmd.plain));
            return ExitCode::FAILURE;
        }
    };
    let color = config.color() && !cmd.plain;

    let mut reports = Vec::new();
    for path in cmd.files {
        let outcome = check_file(&path, config.checker());
        let report = FileReport { path, outcome };
        print_file_report(&report, color);
        reports.push(report);
    }

    if display_report(&reports, color) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

pub fn check_file(path: &Path, options: &CheckOptions) -> Outcome {
    info!(path = %path.display(), "checking");

    let extension = path.extension().and_then(|e| e.to_str());
    if extension == Some(strings::SEQUENT_EXTENSION.as_str()) {
        return Outcome::Invalid(Diagnostic::err_sequent_unsupported(path));
    }
    if extension != Some(strings::NATURAL_DEDUCTION_EXTENSION.as_str()) {
        return Outcome::Invalid(Diagnostic::err_extension_not_allowed(path));
    }

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read proof");
            return Outcome::Invalid(Diagnostic::err_read_file(path, &err));
        }
    };

    match check_source(&source, options) {
        Ok(proof) => {
            info!(path = %path.display(), lines = proof.len(), "proof is valid");
            Outcome::Valid(proof)
        }
        Err(failure) => {
            info!(
                path = %path.display(),
                offset = failure.offset(),
                %failure,
                "proof is invalid"
            );
            Outcome::Invalid(Diagnostic::err_source(path, &source, &failure))
        }
    }
}
