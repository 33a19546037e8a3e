use ustr::Ustr;

use crate::parse::lexer::{TokenKind, TokenStream};

/// A `[term/var]` annotation on a cited line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Substitution {
    pub term: Ustr,
    pub var: Ustr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// A single earlier line, like `2` or `2[z0/y]`.
    Line {
        line: usize,
        substitution: Option<Substitution>,
    },
    /// A whole subproof, cited as `start-end`.
    Subproof { start: usize, end: usize },
}

impl Dependency {
    /// The line number the citation starts with.
    pub fn leading_line(&self) -> usize {
        match self {
            Self::Line { line, .. } => *line,
            Self::Subproof { start, .. } => *start,
        }
    }

    pub fn substitution(&self) -> Option<Substitution> {
        match self {
            Self::Line { substitution, .. } => *substitution,
            Self::Subproof { .. } => None,
        }
    }
}

/// Splits a dependency list on commas. A piece that can't be read becomes
/// `None` so that only the rule which needs it fails.
pub fn parse_dependencies(text: &str) -> Vec<Option<Dependency>> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    text.split(',').map(parse_dependency).collect()
}

fn parse_dependency(piece: &str) -> Option<Dependency> {
    let mut stream = TokenStream::new(piece);
    let start = parse_line_number(&mut stream)?;

    let dependency = if stream.eat(TokenKind::Dash).is_some() {
        let end = parse_line_number(&mut stream)?;
        Dependency::Subproof { start, end }
    } else {
        let substitution = if stream.eat(TokenKind::LBracket).is_some() {
            let term = stream
                .eat(TokenKind::Ident)
                .or_else(|| stream.eat(TokenKind::Number))
                .or_else(|| stream.eat(TokenKind::Falsity))?;
            stream.expect(TokenKind::Slash).ok()?;
            let var = stream.expect(TokenKind::Ident).ok()?;
            stream.expect(TokenKind::RBracket).ok()?;
            Some(Substitution {
                term: Ustr::from(term.text),
                var: Ustr::from(var.text),
            })
        } else {
            None
        };
        Dependency::Line {
            line: start,
            substitution,
        }
    };

    stream.is_at_end().then_some(dependency)
}

fn parse_line_number(stream: &mut TokenStream) -> Option<usize> {
    stream.eat(TokenKind::Number)?.text.parse().ok()
}
