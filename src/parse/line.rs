use thiserror::Error;
use ustr::Ustr;

use crate::{
    parse::{
        dependency::{Dependency, parse_dependencies},
        lexer::{Token, TokenKind, TokenStream},
        location::Span,
    },
    strings,
};

/// One line of a natural-deduction proof, split into its parts but not yet
/// interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub line_number: usize,
    /// How many `|` markers precede the formula.
    pub depth: usize,
    /// A variable introduced by this line, for quantifier subproofs.
    pub flag: Option<Ustr>,
    pub formula_text: String,
    pub rule: Ustr,
    pub dependency_text: String,
    pub spans: LineSpans,
}

/// Where the parts of a line sit within the raw line text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineSpans {
    pub line: Span,
    pub formula: Span,
    pub rule: Span,
    pub dependencies: Span,
}

impl ParsedLine {
    pub fn new(
        line_number: usize,
        depth: usize,
        flag: Option<&str>,
        formula_text: &str,
        rule: &str,
        dependency_text: &str,
    ) -> Self {
        Self {
            line_number,
            depth,
            flag: flag.map(Ustr::from),
            formula_text: formula_text.to_string(),
            rule: Ustr::from(rule),
            dependency_text: dependency_text.to_string(),
            spans: LineSpans::default(),
        }
    }

    pub fn dependencies(&self) -> Vec<Option<Dependency>> {
        parse_dependencies(&self.dependency_text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineFormatError {
    #[error("a proof line must start with a line number followed by `.`")]
    MalformedLineNumber { span: Span },
    #[error("missing `:` before the dependency list")]
    MissingColon { span: Span },
    #[error("missing rule name before `:`")]
    MissingRule { span: Span },
    #[error("missing formula")]
    MissingFormula { span: Span },
}

impl LineFormatError {
    pub fn span(&self) -> Span {
        match self {
            Self::MalformedLineNumber { span }
            | Self::MissingColon { span }
            | Self::MissingRule { span }
            | Self::MissingFormula { span } => *span,
        }
    }
}

/// Splits a raw proof line of the form
/// `<n>. <indent> <flag>? <formula> <rule> : <dependencies>`.
pub fn parse_line(raw: &str) -> Result<ParsedLine, LineFormatError> {
    let mut stream = TokenStream::new(raw);
    let line_span = Span::new(0, raw.len());

    let number = stream
        .eat(TokenKind::Number)
        .and_then(|t| t.text.parse::<usize>().ok().map(|n| (n, t)));
    let Some((line_number, number_token)) = number else {
        return Err(LineFormatError::MalformedLineNumber {
            span: stream.next_span(),
        });
    };
    if stream.eat(TokenKind::Dot).is_none() {
        return Err(LineFormatError::MalformedLineNumber {
            span: number_token.span.to(stream.next_span()),
        });
    }

    let mut depth = 0;
    while stream.eat(TokenKind::Pipe).is_some() {
        depth += 1;
    }

    let body = stream.remaining();
    let Some(colon_idx) = body.iter().position(|t| t.kind == TokenKind::Colon) else {
        return Err(LineFormatError::MissingColon {
            span: Span::empty_at(raw.trim_end().len()),
        });
    };
    let colon = body[colon_idx];

    let rule = match colon_idx.checked_sub(1).map(|i| body[i]) {
        Some(t) if matches!(t.kind, TokenKind::RuleName | TokenKind::DashIdent) => t,
        Some(t) => return Err(LineFormatError::MissingRule { span: t.span }),
        None => return Err(LineFormatError::MissingRule { span: colon.span }),
    };

    let mut formula_tokens = &body[..colon_idx - 1];
    let mut flag = None;
    if let [first, second, ..] = formula_tokens
        && is_flag(first, second)
    {
        flag = Some(first.text);
        formula_tokens = &formula_tokens[1..];
    }

    let (Some(first), Some(last)) = (formula_tokens.first(), formula_tokens.last()) else {
        return Err(LineFormatError::MissingFormula { span: rule.span });
    };
    let formula_span = first.span.to(last.span);

    let deps_start = colon.span.end();
    let deps_raw = &raw[deps_start..];
    let deps_trimmed = deps_raw.trim();
    let deps_offset = deps_start + (deps_raw.len() - deps_raw.trim_start().len());

    let mut line = ParsedLine::new(
        line_number,
        depth,
        flag,
        &raw[formula_span.bytes()],
        rule.text,
        deps_trimmed,
    );
    line.spans = LineSpans {
        line: line_span,
        formula: formula_span,
        rule: rule.span,
        dependencies: Span::new(deps_offset, deps_offset + deps_trimmed.len()),
    };
    Ok(line)
}

/// A leading bare variable is a flag when the formula proper starts right
/// after it. `P(x)` and `P & Q` keep `P` as part of the formula, while
/// `z0 (P(z0))` flags `z0`.
fn is_flag(first: &Token, second: &Token) -> bool {
    let keywords = [*strings::FORALL, *strings::EXISTS, *strings::OR];
    if first.kind != TokenKind::Ident || keywords.iter().any(|k| k.as_str() == first.text) {
        return false;
    }

    match second.kind {
        TokenKind::Ident => second.text != strings::OR.as_str(),
        TokenKind::Tilde | TokenKind::Falsity => true,
        // `z0 a = b` flags `z0`, but `a = b` alone does not flag `a`.
        TokenKind::Number => true,
        TokenKind::LParen => first.span.end() < second.span.start(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{LineFormatError, parse_line};
    use ustr::Ustr;

    #[test]
    fn splits_a_quantifier_line() {
        let line = parse_line("3. | (z0,z0) A-e : 2[z0/y]").unwrap();
        assert_eq!(line.line_number, 3);
        assert_eq!(line.depth, 1);
        assert_eq!(line.flag, None);
        assert_eq!(line.formula_text, "(z0,z0)");
        assert_eq!(line.rule, Ustr::from("A-e"));
        assert_eq!(line.dependency_text, "2[z0/y]");
    }

    #[test]
    fn splits_a_premiss_without_dependencies() {
        let line = parse_line("1. P > Q -premiss :").unwrap();
        assert_eq!(line.line_number, 1);
        assert_eq!(line.depth, 0);
        assert_eq!(line.formula_text, "P > Q");
        assert_eq!(line.rule, Ustr::from("-premiss"));
        assert_eq!(line.dependency_text, "");
    }

    #[test]
    fn multi_word_formulas_are_not_flags() {
        let line = parse_line("2. P v Q v-i1 : 1").unwrap();
        assert_eq!(line.flag, None);
        assert_eq!(line.formula_text, "P v Q");

        let line = parse_line("4. A & B &-i : 2, 3").unwrap();
        assert_eq!(line.flag, None);
        assert_eq!(line.formula_text, "A & B");
        assert_eq!(line.dependency_text, "2, 3");
    }

    #[test]
    fn recognises_a_flag() {
        let line = parse_line("5. || z0 P(z0) -assumption :").unwrap();
        assert_eq!(line.depth, 2);
        assert_eq!(line.flag, Some(Ustr::from("z0")));
        assert_eq!(line.formula_text, "P(z0)");

        let line = parse_line("5. | z0 ~Q(z0) A-e : 1").unwrap();
        assert_eq!(line.flag, Some(Ustr::from("z0")));
        assert_eq!(line.formula_text, "~Q(z0)");
    }

    #[test]
    fn a_flag_may_precede_a_parenthesis() {
        let line = parse_line("2. | z0 (P(z0) v Q(z0)) & R(z0) -assumption :").unwrap();
        assert_eq!(line.flag, Some(Ustr::from("z0")));
        assert_eq!(line.formula_text, "(P(z0) v Q(z0)) & R(z0)");

        let line = parse_line("1. P(a) v Q -premiss :").unwrap();
        assert_eq!(line.flag, None);
        assert_eq!(line.formula_text, "P(a) v Q");
    }

    #[test]
    fn pipes_may_be_spaced() {
        let line = parse_line("7. |  | | R ~~-e : 6").unwrap();
        assert_eq!(line.depth, 3);
        assert_eq!(line.formula_text, "R");
    }

    #[test]
    fn spans_cover_the_parts() {
        let raw = "12.  A v B  v-i2 :  3 ";
        let line = parse_line(raw).unwrap();
        assert_eq!(&raw[line.spans.formula.bytes()], "A v B");
        assert_eq!(&raw[line.spans.rule.bytes()], "v-i2");
        assert_eq!(&raw[line.spans.dependencies.bytes()], "3");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            parse_line("P -premiss :"),
            Err(LineFormatError::MalformedLineNumber { .. })
        ));
        assert!(matches!(
            parse_line("1 P -premiss :"),
            Err(LineFormatError::MalformedLineNumber { .. })
        ));
        assert!(matches!(
            parse_line("1. P -premiss"),
            Err(LineFormatError::MissingColon { .. })
        ));
        assert!(matches!(
            parse_line("1. P Q : 1"),
            Err(LineFormatError::MissingRule { .. })
        ));
        assert!(matches!(
            parse_line("1. : 1"),
            Err(LineFormatError::MissingRule { .. })
        ));
        assert!(matches!(
            parse_line("1. -premiss :"),
            Err(LineFormatError::MissingFormula { .. })
        ));
    }

    #[test]
    fn unknown_dashed_rules_still_parse() {
        let line = parse_line("1. P -lemma :").unwrap();
        assert_eq!(line.rule, Ustr::from("-lemma"));
    }
}
