use crate::{
    diagnostics::Diagnostic,
    semant::VerifiedProof,
    util::{
        ansi::{ANSI_BOLD, ANSI_GRAY, ANSI_GREEN, ANSI_RED, ANSI_RESET},
        plural,
    },
};
use std::path::PathBuf;

pub enum Outcome {
    Valid(VerifiedProof),
    Invalid(Diagnostic),
}

impl Outcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// The `Response:` and `Reason:` lines for this outcome.
    pub fn response(&self) -> String {
        match self {
            Self::Valid(_) => "Response: Success\nReason: proof is valid".to_string(),
            Self::Invalid(diag) => format!("Response: Failure\nReason: {}", diag.title()),
        }
    }
}

pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Outcome,
}

struct Style {
    color: bool,
}

impl Style {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

pub fn print_file_report(report: &FileReport, color: bool) {
    let style = Style { color };

    println!("{}", style.paint(ANSI_BOLD, &report.path.display().to_string()));
    println!("{}", report.outcome.response());
    if let Outcome::Invalid(diag) = &report.outcome {
        println!();
        println!("{}", diag.render(color));
    }
    println!();
}

pub fn display_report(reports: &[FileReport], color: bool) -> bool {
    let style = Style { color };
    let valid_count = reports.iter().filter(|r| r.outcome.is_valid()).count();
    let error_count = reports.len() - valid_count;

    println!("Checked {} proof{}:", reports.len(), plural(reports.len()));

    for report in reports {
        let path = report.path.display().to_string();
        match &report.outcome {
            Outcome::Valid(proof) if proof.is_empty() => {
                println!(
                    " {} {path} {}",
                    style.paint(ANSI_GREEN, "✓"),
                    style.paint(ANSI_GRAY, "(empty)")
                );
            }
            Outcome::Valid(proof) => {
                let conclusion = proof
                    .conclusion()
                    .map(|f| format!(" ⊢ {f}"))
                    .unwrap_or_default();
                println!(
                    " {} {path} {}",
                    style.paint(ANSI_GREEN, "✓"),
                    style.paint(
                        ANSI_GRAY,
                        &format!("({} line{}){conclusion}", proof.len(), plural(proof.len()))
                    ),
                );
            }
            Outcome::Invalid(_) => {
                println!(" {} {path}", style.paint(ANSI_RED, "✗"));
            }
        }
    }

    if error_count > 0 {
        println!(
            " {} {} proof{} with errors.",
            style.paint(ANSI_RED, "✗"),
            style.paint(ANSI_BOLD, &error_count.to_string()),
            plural(error_count)
        );
    } else {
        println!();
        println!("All proofs valid!");
    }

    error_count == 0
}
