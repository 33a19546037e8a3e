use crate::{
    config::ConfigError,
    parse::{LineFormatError, Span},
    semant::{CheckFailure, FailureKind, SourceFailure},
    strings,
};
use annotate_snippets::{Level, Message, Renderer, Snippet};
use std::{io, path::Path};

#[derive(Debug, Clone)]
pub struct Diagnostic {
    title: String,
    origin: Option<String>,
    source: Option<String>,
    /// Labelled error spans within `source`.
    labels: Vec<(String, Span)>,
    notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            origin: None,
            source: None,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Attaches the text that label spans point into.
    pub fn in_source(mut self, path: &Path, source: &str) -> Self {
        self.origin = Some(path.display().to_string());
        self.source = Some(source.to_string());
        self
    }

    pub fn with_error(mut self, msg: impl Into<String>, span: Span) -> Self {
        self.labels.push((msg.into(), span));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn to_message(&self) -> Message<'_> {
        let mut msg = Level::Error.title(&self.title);

        if let Some(source) = &self.source
            && !self.labels.is_empty()
        {
            let mut snippet = Snippet::source(source).fold(true);
            if let Some(origin) = &self.origin {
                snippet = snippet.origin(origin);
            }

            for (label, span) in &self.labels {
                snippet = snippet.annotation(Level::Error.span(span.bytes()).label(label));
            }

            msg = msg.snippet(snippet);
        }

        for note in &self.notes {
            msg = msg.footer(Level::Note.title(note));
        }

        msg
    }

    pub fn render(&self, color: bool) -> String {
        let renderer = if color {
            Renderer::styled()
        } else {
            Renderer::plain()
        };
        renderer.render(self.to_message()).to_string()
    }
}

impl Diagnostic {
    pub fn err_read_file(path: &Path, err: &io::Error) -> Self {
        Diagnostic::new(format!("could not read `{}`: {err}", path.display()))
    }

    pub fn err_extension_not_allowed(path: &Path) -> Self {
        Diagnostic::new(format!("file extension not allowed: `{}`", path.display())).with_note(
            format!(
                "natural-deduction proofs use the `.{}` extension",
                *strings::NATURAL_DEDUCTION_EXTENSION
            ),
        )
    }

    pub fn err_sequent_unsupported(path: &Path) -> Self {
        Diagnostic::new(format!(
            "unsupported sequent notation in `{}`",
            path.display()
        ))
    }

    pub fn err_config(err: &ConfigError) -> Self {
        Diagnostic::new(err.to_string())
    }

    pub fn err_source(path: &Path, source: &str, failure: &SourceFailure) -> Self {
        match failure {
            SourceFailure::Line { error, .. } => {
                Diagnostic::new(format!("malformed proof line: {error}"))
                    .in_source(path, source)
                    .with_error(line_format_label(error), failure.span())
            }
            SourceFailure::Check { failure: check, .. } => {
                let diag = Diagnostic::new(check.to_string())
                    .in_source(path, source)
                    .with_error(failure_label(check), failure.span());

                match &check.kind {
                    FailureKind::UnknownRule => diag.with_note(format!(
                        "`{}` is not a natural-deduction rule",
                        check.rule
                    )),
                    _ => diag,
                }
            }
        }
    }
}

fn line_format_label(err: &LineFormatError) -> &'static str {
    match err {
        LineFormatError::MalformedLineNumber { .. } => "expected `<n>.`",
        LineFormatError::MissingColon { .. } => "expected `:`",
        LineFormatError::MissingRule { .. } => "expected a rule name",
        LineFormatError::MissingFormula { .. } => "expected a formula before the rule",
    }
}

fn failure_label(failure: &CheckFailure) -> String {
    match &failure.kind {
        FailureKind::Parse(err) => format!("expected {}", err.expected),
        FailureKind::UnknownRule => "unknown rule".to_string(),
        FailureKind::RuleViolation(_) => format!("`{}` does not apply here", failure.rule),
        FailureKind::LineOrder { .. } | FailureKind::Duplicate => "out of order".to_string(),
        FailureKind::Structure(_) => "bad subproof structure".to_string(),
    }
}
