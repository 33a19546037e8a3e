use line_span::LineSpanExt;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;
use ustr::Ustr;

use crate::{
    formula::Formula,
    parse::{
        Dependency, LineFormatError, ParseError, ParsedLine, Span, parse_formula,
        parse_formula_exact, parse_line,
    },
    semant::{
        rules::{Rule, RuleCtx, Violation, check_rule},
        scope::{Scopes, StructureError, Subproof},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    /// Reject a line whose number is not greater than the previous one.
    pub strict_line_order: bool,
    /// Reject text left over after a formula.
    pub exact_formulas: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            strict_line_order: true,
            exact_formulas: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    #[error("could not parse formula: {0}")]
    Parse(ParseError),
    #[error("unknown rule")]
    UnknownRule,
    #[error("{0}")]
    RuleViolation(Violation),
    #[error("line numbers must increase, but line {previous} came before")]
    LineOrder { previous: usize },
    #[error("line number already used")]
    Duplicate,
    #[error("{0}")]
    Structure(StructureError),
}

/// The first line of a proof that does not check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number} ({rule}): {kind}")]
pub struct CheckFailure {
    /// Position of the line in the checked sequence.
    pub index: usize,
    pub line_number: usize,
    pub rule: Ustr,
    pub kind: FailureKind,
    /// Offending bytes within the raw line. Empty for lines built by hand.
    pub span: Span,
}

/// Lines verified so far, together with the subproof structure around the
/// line being checked.
#[derive(Debug, Default)]
pub struct ProofState {
    formulas: FxHashMap<usize, Formula>,
    order: Vec<usize>,
    scopes: Scopes,
    last_line: Option<usize>,
}

impl ProofState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The formula verified at `line_number`, whether or not it is in scope.
    pub fn formula(&self, line_number: usize) -> Option<&Formula> {
        self.formulas.get(&line_number)
    }

    /// The formula at `line_number` if the current line may cite it.
    pub fn visible_formula(&self, line_number: usize) -> Option<&Formula> {
        self.scopes
            .is_visible(line_number)
            .then(|| self.formulas.get(&line_number))
            .flatten()
    }

    pub fn closed_subproof(&self, start: usize, end: usize) -> Option<&Subproof> {
        self.scopes.closed_subproof(start, end)
    }

    /// Looks up the `index`-th entry of a line's parsed dependency list.
    /// Malformed pieces, lines not yet verified and lines hidden in a closed
    /// subproof are all unavailable.
    pub fn get_dependency(
        &self,
        deps: &[Option<Dependency>],
        index: usize,
    ) -> Option<&Formula> {
        let dependency = deps.get(index).copied().flatten()?;
        self.visible_formula(dependency.leading_line())
    }

    fn check_order(&self, line: &ParsedLine, options: &CheckOptions) -> Result<(), FailureKind> {
        if self.formulas.contains_key(&line.line_number) {
            return Err(FailureKind::Duplicate);
        }
        if options.strict_line_order
            && let Some(previous) = self.last_line
            && line.line_number <= previous
        {
            return Err(FailureKind::LineOrder { previous });
        }
        Ok(())
    }

    /// Checks one line against the state and records it on success.
    fn step(&mut self, line: &ParsedLine, options: &CheckOptions) -> Result<(), (FailureKind, Span)> {
        let spans = line.spans;

        self.check_order(line, options)
            .map_err(|kind| (kind, spans.line))?;

        let parsed = if options.exact_formulas {
            parse_formula_exact(&line.formula_text)
        } else {
            parse_formula(&line.formula_text)
        };
        let formula = parsed.map_err(|err| {
            let span = err.span.forward(spans.formula.start());
            (FailureKind::Parse(err), span)
        })?;

        let Some(rule) = Rule::from_name(&line.rule) else {
            return Err((FailureKind::UnknownRule, spans.rule));
        };

        self.scopes
            .enter(line, &self.formulas)
            .map_err(|err| (FailureKind::Structure(err), spans.line))?;

        let ctx = RuleCtx::new(self, line, &formula);
        check_rule(rule, &ctx).map_err(|violation| {
            let span = match violation {
                Violation::MissingDependency { .. }
                | Violation::MissingSubproof { .. }
                | Violation::MissingAssumption { .. }
                | Violation::WrongShape { .. } => spans.dependencies,
                _ => spans.formula,
            };
            (FailureKind::RuleViolation(violation), span)
        })?;

        debug!(line = line.line_number, %formula, rule = rule.name(), "verified");

        self.scopes.record(line.line_number);
        self.formulas.insert(line.line_number, formula);
        self.order.push(line.line_number);
        self.last_line = Some(line.line_number);

        Ok(())
    }

    fn finish(self) -> VerifiedProof {
        VerifiedProof {
            formulas: self.formulas,
            order: self.order,
        }
    }
}

/// Every line of an accepted proof, keyed by line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedProof {
    formulas: FxHashMap<usize, Formula>,
    order: Vec<usize>,
}

impl VerifiedProof {
    pub fn get(&self, line_number: usize) -> Option<&Formula> {
        self.formulas.get(&line_number)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The formula on the last line checked.
    pub fn conclusion(&self) -> Option<&Formula> {
        self.order.last().and_then(|&l| self.get(l))
    }
}

/// Checks `lines` in order, stopping at the first line that fails.
pub fn check(lines: &[ParsedLine], options: &CheckOptions) -> Result<VerifiedProof, CheckFailure> {
    let mut state = ProofState::new();

    for (index, line) in lines.iter().enumerate() {
        state.step(line, options).map_err(|(kind, span)| CheckFailure {
            index,
            line_number: line.line_number,
            rule: line.rule,
            kind,
            span,
        })?;
    }

    Ok(state.finish())
}

/// Why a whole proof text was rejected. Offsets are the byte offset of the
/// failing line within the text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceFailure {
    #[error("{error}")]
    Line { offset: usize, error: LineFormatError },
    #[error("{failure}")]
    Check { offset: usize, failure: CheckFailure },
}

impl SourceFailure {
    pub fn offset(&self) -> usize {
        match self {
            Self::Line { offset, .. } | Self::Check { offset, .. } => *offset,
        }
    }

    /// The offending bytes, relative to the whole text.
    pub fn span(&self) -> Span {
        match self {
            Self::Line { offset, error } => error.span().forward(*offset),
            Self::Check { offset, failure } => failure.span.forward(*offset),
        }
    }
}

/// Splits `text` into proof lines and checks them. Blank lines are skipped.
pub fn check_source(text: &str, options: &CheckOptions) -> Result<VerifiedProof, SourceFailure> {
    let mut lines = Vec::new();
    let mut offsets = Vec::new();

    for raw in text.line_spans() {
        if raw.as_str().trim().is_empty() {
            continue;
        }
        let offset = raw.start();
        let line = parse_line(raw.as_str()).map_err(|error| SourceFailure::Line { offset, error })?;
        lines.push(line);
        offsets.push(offset);
    }

    check(&lines, options).map_err(|failure| SourceFailure::Check {
        offset: offsets[failure.index],
        failure,
    })
}

#[cfg(test)]
mod tests {
    use super::{CheckOptions, FailureKind, SourceFailure, check, check_source};
    use crate::{
        formula::Formula,
        parse::{
            ParsedLine, Span,
            formula::Expected,
            lexer::{Found, TokenKind},
        },
        semant::{rules::Violation, scope::StructureError},
    };

    fn line(n: usize, formula: &str, rule: &str, deps: &str) -> ParsedLine {
        ParsedLine::new(n, 0, None, formula, rule, deps)
    }

    fn run(lines: &[ParsedLine]) -> Result<super::VerifiedProof, super::CheckFailure> {
        check(lines, &CheckOptions::default())
    }

    fn run_source(text: &str) -> Result<super::VerifiedProof, SourceFailure> {
        check_source(text, &CheckOptions::default())
    }

    fn violation(text: &str) -> Violation {
        match run_source(text).unwrap_err() {
            SourceFailure::Check { failure, .. } => match failure.kind {
                FailureKind::RuleViolation(v) => v,
                other => panic!("expected a rule violation, got {other:?}"),
            },
            other => panic!("expected a check failure, got {other:?}"),
        }
    }

    #[test]
    fn disjunction_introduction() {
        let proof = run(&[line(1, "P", "-premiss", ""), line(2, "P v Q", "v-i1", "1")]).unwrap();
        assert_eq!(proof.len(), 2);
        assert_eq!(proof.get(1), Some(&Formula::atom("P")));
        assert_eq!(
            proof.get(2),
            Some(&Formula::or(Formula::atom("P"), Formula::atom("Q")))
        );
    }

    #[test]
    fn modus_ponens() {
        let proof = run(&[
            line(1, "P > Q", "-premiss", ""),
            line(2, "P", "-premiss", ""),
            line(3, "Q", ">-e", "1,2"),
        ])
        .unwrap();
        assert_eq!(proof.conclusion(), Some(&Formula::atom("Q")));

        // The antecedent may come first.
        run(&[
            line(1, "P > Q", "-premiss", ""),
            line(2, "P", "-premiss", ""),
            line(3, "Q", ">-e", "2,1"),
        ])
        .unwrap();
    }

    #[test]
    fn implication_elimination_needs_the_antecedent() {
        let failure = run(&[
            line(1, "P > Q", "-premiss", ""),
            line(2, "R", "-premiss", ""),
            line(3, "Q", ">-e", "1,2"),
        ])
        .unwrap_err();
        assert_eq!(
            failure.kind,
            FailureKind::RuleViolation(Violation::Mismatch {
                expected: Formula::atom("P"),
                found: Formula::atom("R"),
            })
        );
    }

    #[test]
    fn conjunction_elimination_right() {
        let proof = run(&[line(1, "A & B", "-premiss", ""), line(2, "B", "&-e2", "1")]).unwrap();
        assert_eq!(proof.conclusion(), Some(&Formula::atom("B")));

        let failure = run(&[line(1, "A & B", "-premiss", ""), line(2, "A", "&-e2", "1")]).unwrap_err();
        assert_eq!(
            failure.kind,
            FailureKind::RuleViolation(Violation::Mismatch {
                expected: Formula::atom("B"),
                found: Formula::atom("A"),
            })
        );
    }

    #[test]
    fn disjunctive_syllogism() {
        for deps in ["1,2", "2,1"] {
            let proof = run(&[
                line(1, "P v Q", "-premiss", ""),
                line(2, "~P", "-premiss", ""),
                line(3, "Q", "v-mtp", deps),
            ])
            .unwrap();
            assert_eq!(proof.conclusion(), Some(&Formula::atom("Q")));
        }

        run(&[
            line(1, "P v Q", "-premiss", ""),
            line(2, "~Q", "-premiss", ""),
            line(3, "P", "v-mtp", "1,2"),
        ])
        .unwrap();

        let failure = run(&[
            line(1, "P v Q", "-premiss", ""),
            line(2, "~R", "-premiss", ""),
            line(3, "Q", "v-mtp", "1,2"),
        ])
        .unwrap_err();
        assert!(matches!(
            failure.kind,
            FailureKind::RuleViolation(Violation::Inapplicable(_))
        ));

        let failure = run(&[
            line(1, "P v Q", "-premiss", ""),
            line(2, "~P", "-premiss", ""),
            line(3, "P", "v-mtp", "1,2"),
        ])
        .unwrap_err();
        assert!(matches!(
            failure.kind,
            FailureKind::RuleViolation(Violation::Mismatch { .. })
        ));
    }

    #[test]
    fn universal_elimination_infers_the_term() {
        let proof = run(&[
            line(1, "forall(x) R(x, x)", "-premiss", ""),
            line(2, "R(a, a)", "A-e", "1"),
        ])
        .unwrap();
        assert_eq!(
            proof.conclusion(),
            Some(&Formula::predicate("R", &["a", "a"]))
        );

        let failure = run(&[
            line(1, "forall(x) R(x, x)", "-premiss", ""),
            line(2, "R(a, b)", "A-e", "1"),
        ])
        .unwrap_err();
        assert!(matches!(
            failure.kind,
            FailureKind::RuleViolation(Violation::NotAnInstance { .. })
        ));
    }

    #[test]
    fn existential_introduction_infers_the_term() {
        run(&[
            line(1, "R(a, a)", "-premiss", ""),
            line(2, "exists(x) R(x, a)", "E-i", "1"),
            line(3, "exists(y) R(y, y)", "E-i", "1"),
        ])
        .unwrap();

        let failure = run(&[
            line(1, "R(a, b)", "-premiss", ""),
            line(2, "exists(x) R(x, x)", "E-i", "1"),
        ])
        .unwrap_err();
        assert!(matches!(
            failure.kind,
            FailureKind::RuleViolation(Violation::NotAnInstance { .. })
        ));
    }

    #[test]
    fn wrong_conjunction_is_rejected() {
        let failure = run(&[line(1, "A", "-premiss", ""), line(2, "B", "&-i", "1,1")]).unwrap_err();
        assert_eq!(failure.line_number, 2);
        assert_eq!(failure.rule.as_str(), "&-i");
        assert_eq!(
            failure.kind,
            FailureKind::RuleViolation(Violation::Mismatch {
                expected: Formula::and(Formula::atom("A"), Formula::atom("A")),
                found: Formula::atom("B"),
            })
        );
    }

    #[test]
    fn unclosed_parenthesis_fails_to_parse() {
        let failure = run(&[line(1, "P(", "-premiss", "")]).unwrap_err();
        let FailureKind::Parse(err) = failure.kind else {
            panic!("expected a parse failure");
        };
        assert_eq!(err.expected, Expected::Token(TokenKind::RParen));
        assert_eq!(err.found, Found::EndOfInput);
    }

    #[test]
    fn conjunction_elimination_needs_a_conjunction() {
        let failure = run(&[line(1, "A v B", "-premiss", ""), line(2, "A", "&-e1", "1")]).unwrap_err();
        assert!(matches!(
            failure.kind,
            FailureKind::RuleViolation(Violation::WrongShape { index: 0, .. })
        ));
    }

    #[test]
    fn forward_references_are_unavailable() {
        let options = CheckOptions {
            strict_line_order: false,
            ..CheckOptions::default()
        };
        for deps in ["2", "3", "1,2"] {
            let failure = check(
                &[
                    line(1, "P", "-premiss", ""),
                    line(2, "P & P", "&-i", deps),
                    line(3, "P", "-premiss", ""),
                ],
                &options,
            )
            .unwrap_err();
            assert_eq!(failure.line_number, 2);
        }

        // Out of order, line 3 is processed first and cannot see line 1.
        let failure = check(
            &[line(3, "Q", "~~-e", "1"), line(1, "~~Q", "-premiss", "")],
            &options,
        )
        .unwrap_err();
        assert_eq!(failure.line_number, 3);
    }

    #[test]
    fn ex_falso_accepts_anything() {
        run(&[
            line(1, "0", "-premiss", ""),
            line(2, "forall(x) (R(x, y) > S)", "0-e", "1"),
        ])
        .unwrap();

        let failure = run(&[line(1, "P", "-premiss", ""), line(2, "Q", "0-e", "1")]).unwrap_err();
        assert!(matches!(failure.kind, FailureKind::RuleViolation(_)));
    }

    #[test]
    fn negation_elimination() {
        run(&[
            line(1, "~P", "-premiss", ""),
            line(2, "P", "-premiss", ""),
            line(3, "0", "~-e", "1,2"),
        ])
        .unwrap();

        let failure = run(&[
            line(1, "~P", "-premiss", ""),
            line(2, "P", "-premiss", ""),
            line(3, "Q", "~-e", "1,2"),
        ])
        .unwrap_err();
        assert_eq!(
            failure.kind,
            FailureKind::RuleViolation(Violation::ResultShape { expected: "`0`" })
        );
    }

    #[test]
    fn double_negation() {
        run(&[
            line(1, "P", "-premiss", ""),
            line(2, "~~P", "~~-i", "1"),
            line(3, "P", "~~-e", "2"),
        ])
        .unwrap();
        assert!(run(&[line(1, "~P", "-premiss", ""), line(2, "P", "~~-e", "1")]).is_err());
    }

    #[test]
    fn unknown_rules_are_rejected() {
        let failure = run(&[line(1, "P", "-lemma", "")]).unwrap_err();
        assert_eq!(failure.kind, FailureKind::UnknownRule);
    }

    #[test]
    fn line_numbers_must_increase() {
        let failure = run(&[line(2, "P", "-premiss", ""), line(1, "Q", "-premiss", "")]).unwrap_err();
        assert_eq!(failure.kind, FailureKind::LineOrder { previous: 2 });

        let relaxed = CheckOptions {
            strict_line_order: false,
            ..CheckOptions::default()
        };
        check(&[line(2, "P", "-premiss", ""), line(1, "Q", "-premiss", "")], &relaxed).unwrap();
        let failure = check(&[line(1, "P", "-premiss", ""), line(1, "Q", "-premiss", "")], &relaxed)
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Duplicate);
    }

    #[test]
    fn trailing_text_depends_on_exactness() {
        let lines = [line(1, "P Q", "-premiss", "")];
        assert!(matches!(run(&lines).unwrap_err().kind, FailureKind::Parse(_)));

        let lenient = CheckOptions {
            exact_formulas: false,
            ..CheckOptions::default()
        };
        let proof = check(&lines, &lenient).unwrap();
        assert_eq!(proof.get(1), Some(&Formula::atom("P")));
    }

    #[test]
    fn get_dependency_is_total() {
        let mut state = super::ProofState::new();
        let premiss = line(1, "P", "-premiss", "");
        state.step(&premiss, &CheckOptions::default()).unwrap();

        let deps = line(2, "P", "&-e1", "1, x, 7").dependencies();
        assert_eq!(state.get_dependency(&deps, 0), Some(&Formula::atom("P")));
        assert_eq!(state.get_dependency(&deps, 1), None);
        assert_eq!(state.get_dependency(&deps, 2), None);
        assert_eq!(state.get_dependency(&deps, 3), None);
    }

    #[test]
    fn implication_introduction() {
        run_source(include_str!("../../proofs/contraposition.nd")).unwrap();
    }

    #[test]
    fn disjunction_elimination() {
        let proof = run_source(include_str!("../../proofs/or_commutes.nd")).unwrap();
        assert_eq!(
            proof.conclusion(),
            Some(&Formula::or(Formula::atom("Q"), Formula::atom("P")))
        );
    }

    #[test]
    fn negation_introduction_and_tollens() {
        let proof = run_source(include_str!("../../proofs/modus_tollens.nd")).unwrap();
        assert_eq!(proof.len(), 8);
    }

    #[test]
    fn tollens_needs_the_negated_consequent() {
        assert!(matches!(
            violation(include_str!("../../proofs/broken_tollens.nd")),
            Violation::Inapplicable(_)
        ));
    }

    #[test]
    fn quantifier_rules() {
        run_source(include_str!("../../proofs/forall_and.nd")).unwrap();
        run_source(include_str!("../../proofs/exists_weaken.nd")).unwrap();
    }

    #[test]
    fn flagged_subproof_may_open_with_a_parenthesis() {
        let proof = run_source(include_str!("../../proofs/exists_split.nd")).unwrap();
        assert_eq!(proof.len(), 5);
        assert_eq!(proof.get(3), Some(&Formula::predicate("R", &["z0"])));
    }

    #[test]
    fn identity_rules() {
        run_source(include_str!("../../proofs/identity.nd")).unwrap();
    }

    #[test]
    fn closed_subproof_lines_cannot_be_cited() {
        let text = "\
1. | P -assumption :
2. | P v Q v-i1 : 1
3. P > (P v Q) >-i : 1-2
4. P & P &-i : 1, 1
";
        assert_eq!(
            violation(text),
            Violation::MissingDependency { index: 0 }
        );
    }

    #[test]
    fn discharge_needs_the_whole_subproof() {
        let text = "\
1. | P -assumption :
2. | P v Q v-i1 : 1
3. P > P >-i : 1-1
";
        assert_eq!(violation(text), Violation::MissingSubproof { index: 0 });
    }

    #[test]
    fn universal_introduction_needs_a_fresh_variable() {
        let text = "\
1. forall(x) P(x) -premiss :
2. Q(a) -premiss :
3. | a P(a) A-e : 1[a/x]
4. forall(y) P(y) A-i : 3-3
";
        assert_eq!(
            violation(text),
            Violation::NotFresh {
                var: ustr::Ustr::from("a")
            }
        );
    }

    #[test]
    fn existential_witness_must_not_escape() {
        let text = "\
1. exists(x) P(x) -premiss :
2. | z0 P(z0) -assumption :
3. | P(z0) v Q v-i1 : 2
4. P(z0) v Q E-e : 1, 2-3
";
        assert_eq!(
            violation(text),
            Violation::FlagEscapes {
                var: ustr::Ustr::from("z0")
            }
        );
    }

    #[test]
    fn premisses_stay_outside_subproofs() {
        let text = "\
1. | P -assumption :
2. | Q -premiss :
";
        assert_eq!(violation(text), Violation::PremissInSubproof);
    }

    #[test]
    fn subproofs_must_be_opened_properly() {
        let text = "\
1. P -premiss :
2. | P & P &-i : 1, 1
";
        let SourceFailure::Check { failure, .. } = run_source(text).unwrap_err() else {
            panic!("expected a check failure");
        };
        assert_eq!(
            failure.kind,
            FailureKind::Structure(StructureError::UnopenedSubproof)
        );
    }

    #[test]
    fn source_failures_point_into_the_text() {
        let text = "1. P -premiss :\n\n2. Q &-e1 : 1\n";
        let failure = run_source(text).unwrap_err();
        assert_eq!(failure.offset(), 17);
        assert_eq!(&text[failure.span().bytes()], "1");

        let text = "1. P -premiss :\n2. Q(a -premiss :\n";
        let failure = run_source(text).unwrap_err();
        // Right after `Q(a`, where the `)` is missing.
        assert_eq!(failure.span(), Span::empty_at(22));

        let failure = run_source("1. P -premiss\n").unwrap_err();
        assert!(matches!(failure, SourceFailure::Line { offset: 0, .. }));
    }
}
