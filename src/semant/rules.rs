use thiserror::Error;
use tracing::trace;
use ustr::Ustr;

use crate::{
    formula::Formula,
    parse::{Dependency, ParsedLine, Substitution},
    semant::{checker::ProofState, scope::Subproof},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Premiss,
    Assumption,
    AndIntro,
    AndElimLeft,
    AndElimRight,
    OrIntroLeft,
    OrIntroRight,
    OrElim,
    OrModusTollendoPonens,
    ImpliesIntro,
    ImpliesElim,
    ModusTollens,
    NotIntro,
    NotElim,
    DoubleNotIntro,
    DoubleNotElim,
    FalsityElim,
    ForAllIntro,
    ForAllElim,
    ExistsIntro,
    ExistsElim,
    IdentityIntro,
    IdentityElim,
}

const RULES: [(&str, Rule); 23] = [
    ("-premiss", Rule::Premiss),
    ("-assumption", Rule::Assumption),
    ("&-i", Rule::AndIntro),
    ("&-e1", Rule::AndElimLeft),
    ("&-e2", Rule::AndElimRight),
    ("v-i1", Rule::OrIntroLeft),
    ("v-i2", Rule::OrIntroRight),
    ("v-e", Rule::OrElim),
    ("v-mtp", Rule::OrModusTollendoPonens),
    (">-i", Rule::ImpliesIntro),
    (">-e", Rule::ImpliesElim),
    (">-mt", Rule::ModusTollens),
    ("~-i", Rule::NotIntro),
    ("~-e", Rule::NotElim),
    ("~~-i", Rule::DoubleNotIntro),
    ("~~-e", Rule::DoubleNotElim),
    ("0-e", Rule::FalsityElim),
    ("A-i", Rule::ForAllIntro),
    ("A-e", Rule::ForAllElim),
    ("E-i", Rule::ExistsIntro),
    ("E-e", Rule::ExistsElim),
    ("id-i", Rule::IdentityIntro),
    ("id-e", Rule::IdentityElim),
];

impl Rule {
    pub fn from_name(name: &str) -> Option<Self> {
        RULES
            .iter()
            .find(|(rule_name, _)| *rule_name == name)
            .map(|&(_, rule)| rule)
    }

    pub fn name(&self) -> &'static str {
        RULES
            .iter()
            .find(|(_, rule)| rule == self)
            .map_or("?", |(name, _)| name)
    }
}

/// Why a line is not a correct use of its rule. Dependency indices count
/// from zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("dependency {} is missing or not available here", .index + 1)]
    MissingDependency { index: usize },
    #[error("dependency {} must cite a closed subproof as `start-end`", .index + 1)]
    MissingSubproof { index: usize },
    #[error("the subproof cited by dependency {} must start with `-assumption`", .index + 1)]
    MissingAssumption { index: usize },
    #[error("dependency {} should be {expected}, but it is `{found}`", .index + 1)]
    WrongShape {
        index: usize,
        expected: &'static str,
        found: Formula,
    },
    #[error("the line should be {expected}")]
    ResultShape { expected: &'static str },
    #[error("expected `{expected}`, but found `{found}`")]
    Mismatch { expected: Formula, found: Formula },
    #[error("`{first}` and `{second}` do not contradict each other")]
    NoContradiction { first: Formula, second: Formula },
    #[error("{0}")]
    Inapplicable(&'static str),
    #[error("premisses must stay outside every subproof")]
    PremissInSubproof,
    #[error("the subproof must be opened with a fresh variable")]
    MissingFlag,
    #[error("variable `{var}` is already used outside the subproof")]
    NotFresh { var: Ustr },
    #[error("variable `{var}` escapes its subproof")]
    FlagEscapes { var: Ustr },
    #[error("substitution `[{term}/{var}]` does not replace the bound variable `{bound}`")]
    WrongSubstitution { term: Ustr, var: Ustr, bound: Ustr },
    #[error("`{found}` is not an instance of `{general}`")]
    NotAnInstance { general: Formula, found: Formula },
}

pub type RuleResult = Result<(), Violation>;

/// A subproof cited by a line, with its first and last formulas.
pub struct CitedSubproof<'a> {
    subproof: &'a Subproof,
    first: &'a Formula,
    last: &'a Formula,
}

/// Everything a rule check may look at: the line, its parsed formula and
/// the verified lines in scope.
pub struct RuleCtx<'a> {
    state: &'a ProofState,
    line: &'a ParsedLine,
    result: &'a Formula,
    deps: Vec<Option<Dependency>>,
}

impl<'a> RuleCtx<'a> {
    pub fn new(state: &'a ProofState, line: &'a ParsedLine, result: &'a Formula) -> Self {
        Self {
            state,
            line,
            result,
            deps: line.dependencies(),
        }
    }

    fn dependency(&self, index: usize) -> Option<Dependency> {
        self.deps.get(index).copied().flatten()
    }

    /// The formula of the `index`-th cited line.
    fn dep(&self, index: usize) -> Result<&'a Formula, Violation> {
        trace!(line = self.line.line_number, index, "looking up dependency");

        self.state
            .get_dependency(&self.deps, index)
            .ok_or(Violation::MissingDependency { index })
    }

    fn substitution(&self, index: usize) -> Option<Substitution> {
        self.dependency(index).and_then(|d| d.substitution())
    }

    fn subproof(&self, index: usize) -> Result<CitedSubproof<'a>, Violation> {
        let missing = Violation::MissingSubproof { index };
        let Some(Dependency::Subproof { start, end }) = self.dependency(index) else {
            return Err(missing);
        };

        let subproof = self.state.closed_subproof(start, end).ok_or(missing.clone())?;
        let first = self.state.formula(start).ok_or(missing.clone())?;
        let last = self.state.formula(end).ok_or(missing)?;

        Ok(CitedSubproof {
            subproof,
            first,
            last,
        })
    }

    /// A cited subproof whose first line is an assumption.
    fn hypothetical(&self, index: usize) -> Result<CitedSubproof<'a>, Violation> {
        let cited = self.subproof(index)?;
        if !cited.subproof.is_assumption() {
            return Err(Violation::MissingAssumption { index });
        }
        Ok(cited)
    }

    fn expect(&self, expected: Formula) -> RuleResult {
        if *self.result == expected {
            Ok(())
        } else {
            Err(Violation::Mismatch {
                expected,
                found: self.result.clone(),
            })
        }
    }
}

pub fn check_rule(rule: Rule, ctx: &RuleCtx) -> RuleResult {
    match rule {
        Rule::Premiss => check_premiss(ctx),
        Rule::Assumption => Ok(()),
        Rule::AndIntro => check_and_intro(ctx),
        Rule::AndElimLeft => check_and_elim(ctx, true),
        Rule::AndElimRight => check_and_elim(ctx, false),
        Rule::OrIntroLeft => check_or_intro(ctx, true),
        Rule::OrIntroRight => check_or_intro(ctx, false),
        Rule::OrElim => check_or_elim(ctx),
        Rule::OrModusTollendoPonens => check_or_mtp(ctx),
        Rule::ImpliesIntro => check_implies_intro(ctx),
        Rule::ImpliesElim => check_implies_elim(ctx),
        Rule::ModusTollens => check_modus_tollens(ctx),
        Rule::NotIntro => check_not_intro(ctx),
        Rule::NotElim => check_not_elim(ctx),
        Rule::DoubleNotIntro => check_double_not_intro(ctx),
        Rule::DoubleNotElim => check_double_not_elim(ctx),
        Rule::FalsityElim => check_falsity_elim(ctx),
        Rule::ForAllIntro => check_forall_intro(ctx),
        Rule::ForAllElim => check_forall_elim(ctx),
        Rule::ExistsIntro => check_exists_intro(ctx),
        Rule::ExistsElim => check_exists_elim(ctx),
        Rule::IdentityIntro => check_identity_intro(ctx),
        Rule::IdentityElim => check_identity_elim(ctx),
    }
}

fn check_premiss(ctx: &RuleCtx) -> RuleResult {
    if ctx.line.depth > 0 {
        return Err(Violation::PremissInSubproof);
    }
    Ok(())
}

// From A and B infer A & B.
fn check_and_intro(ctx: &RuleCtx) -> RuleResult {
    let left = ctx.dep(0)?;
    let right = ctx.dep(1)?;
    ctx.expect(Formula::and(left.clone(), right.clone()))
}

// From A & B infer A (or B).
fn check_and_elim(ctx: &RuleCtx, is_left: bool) -> RuleResult {
    let parent = ctx.dep(0)?;
    let Formula::And(left, right) = parent else {
        return Err(Violation::WrongShape {
            index: 0,
            expected: "a conjunction",
            found: parent.clone(),
        });
    };

    let expected = if is_left { left } else { right };
    ctx.expect((**expected).clone())
}

// From A infer A v B (or B v A).
fn check_or_intro(ctx: &RuleCtx, is_left: bool) -> RuleResult {
    let parent = ctx.dep(0)?;
    let Formula::Or(left, right) = ctx.result else {
        return Err(Violation::ResultShape {
            expected: "a disjunction",
        });
    };

    let side = if is_left { left } else { right };
    if **side != *parent {
        return Err(Violation::Mismatch {
            expected: parent.clone(),
            found: (**side).clone(),
        });
    }
    Ok(())
}

// From A v B, a subproof A ... C and a subproof B ... C infer C.
fn check_or_elim(ctx: &RuleCtx) -> RuleResult {
    let parent = ctx.dep(0)?;
    let Formula::Or(left, right) = parent else {
        return Err(Violation::WrongShape {
            index: 0,
            expected: "a disjunction",
            found: parent.clone(),
        });
    };

    let left_case = ctx.hypothetical(1)?;
    let right_case = ctx.hypothetical(2)?;

    for (case, disjunct) in [(&left_case, left), (&right_case, right)] {
        if case.first != &**disjunct {
            return Err(Violation::Mismatch {
                expected: (**disjunct).clone(),
                found: case.first.clone(),
            });
        }
    }

    if left_case.last != right_case.last {
        return Err(Violation::Mismatch {
            expected: left_case.last.clone(),
            found: right_case.last.clone(),
        });
    }

    ctx.expect(left_case.last.clone())
}

// From A v B and ~A infer B; from A v B and ~B infer A.
fn check_or_mtp(ctx: &RuleCtx) -> RuleResult {
    let first = ctx.dep(0)?;
    let second = ctx.dep(1)?;

    for (disjunction, negation) in [(first, second), (second, first)] {
        let (Formula::Or(left, right), Formula::Not(denied)) = (disjunction, negation) else {
            continue;
        };
        if **denied == **left {
            return ctx.expect((**right).clone());
        }
        if **denied == **right {
            return ctx.expect((**left).clone());
        }
    }

    Err(Violation::Inapplicable(
        "`v-mtp` needs a disjunction and the negation of one of its sides",
    ))
}

// From a subproof A ... B infer A > B.
fn check_implies_intro(ctx: &RuleCtx) -> RuleResult {
    let cited = ctx.hypothetical(0)?;
    ctx.expect(Formula::implies(cited.first.clone(), cited.last.clone()))
}

// From A > B and A infer B, with the two premises in either order.
fn check_implies_elim(ctx: &RuleCtx) -> RuleResult {
    let first = ctx.dep(0)?;
    let second = ctx.dep(1)?;

    let mut antecedent_mismatch = None;
    for (implication, antecedent) in [(first, second), (second, first)] {
        let Formula::Implies(left, right) = implication else {
            continue;
        };
        if **left == *antecedent {
            return ctx.expect((**right).clone());
        }
        antecedent_mismatch.get_or_insert(Violation::Mismatch {
            expected: (**left).clone(),
            found: antecedent.clone(),
        });
    }

    Err(antecedent_mismatch.unwrap_or(Violation::WrongShape {
        index: 0,
        expected: "an implication",
        found: first.clone(),
    }))
}

// From A > B and ~B infer ~A.
fn check_modus_tollens(ctx: &RuleCtx) -> RuleResult {
    let first = ctx.dep(0)?;
    let second = ctx.dep(1)?;

    for (implication, negation) in [(first, second), (second, first)] {
        let (Formula::Implies(left, right), Formula::Not(denied)) = (implication, negation)
        else {
            continue;
        };
        if **denied == **right {
            return ctx.expect(Formula::not((**left).clone()));
        }
    }

    Err(Violation::Inapplicable(
        "`>-mt` needs an implication and the negation of its consequent",
    ))
}

// From a subproof A ... 0 infer ~A.
fn check_not_intro(ctx: &RuleCtx) -> RuleResult {
    let cited = ctx.hypothetical(0)?;
    if *cited.last != Formula::Falsity {
        return Err(Violation::WrongShape {
            index: 0,
            expected: "a subproof ending in `0`",
            found: cited.last.clone(),
        });
    }
    ctx.expect(Formula::not(cited.first.clone()))
}

fn is_contradiction(a: &Formula, b: &Formula) -> bool {
    matches!(a, Formula::Not(inner) if **inner == *b)
        || matches!(b, Formula::Not(inner) if **inner == *a)
}

// From A and ~A infer 0.
fn check_not_elim(ctx: &RuleCtx) -> RuleResult {
    if *ctx.result != Formula::Falsity {
        return Err(Violation::ResultShape { expected: "`0`" });
    }

    let first = ctx.dep(0)?;
    let second = ctx.dep(1)?;
    if !is_contradiction(first, second) {
        return Err(Violation::NoContradiction {
            first: first.clone(),
            second: second.clone(),
        });
    }
    Ok(())
}

// From A infer ~~A.
fn check_double_not_intro(ctx: &RuleCtx) -> RuleResult {
    let parent = ctx.dep(0)?;
    ctx.expect(Formula::not(Formula::not(parent.clone())))
}

// From ~~A infer A.
fn check_double_not_elim(ctx: &RuleCtx) -> RuleResult {
    let parent = ctx.dep(0)?;
    let Formula::Not(outer) = parent else {
        return Err(Violation::WrongShape {
            index: 0,
            expected: "a double negation",
            found: parent.clone(),
        });
    };
    let Formula::Not(inner) = &**outer else {
        return Err(Violation::WrongShape {
            index: 0,
            expected: "a double negation",
            found: parent.clone(),
        });
    };

    ctx.expect((**inner).clone())
}

// From 0 infer anything.
fn check_falsity_elim(ctx: &RuleCtx) -> RuleResult {
    let parent = ctx.dep(0)?;
    if *parent != Formula::Falsity {
        return Err(Violation::WrongShape {
            index: 0,
            expected: "`0`",
            found: parent.clone(),
        });
    }
    Ok(())
}

fn check_substitution_var(substitution: Substitution, bound: Ustr) -> RuleResult {
    if substitution.var != bound {
        return Err(Violation::WrongSubstitution {
            term: substitution.term,
            var: substitution.var,
            bound,
        });
    }
    Ok(())
}

// From forall(x) F infer F[t/x].
fn check_forall_elim(ctx: &RuleCtx) -> RuleResult {
    let parent = ctx.dep(0)?;
    let Formula::ForAll { var, inner } = parent else {
        return Err(Violation::WrongShape {
            index: 0,
            expected: "a universal formula",
            found: parent.clone(),
        });
    };

    let not_an_instance = || Violation::NotAnInstance {
        general: parent.clone(),
        found: ctx.result.clone(),
    };

    match ctx.substitution(0) {
        Some(substitution) => {
            check_substitution_var(substitution, *var)?;
            let expected = inner
                .substitute(*var, substitution.term)
                .ok_or_else(not_an_instance)?;
            ctx.expect(expected)
        }
        None => inner
            .instantiation_of(*var, ctx.result)
            .map(|_| ())
            .ok_or_else(not_an_instance),
    }
}

// From a subproof opened with a fresh z and ending in F(z) infer
// forall(x) F(x).
fn check_forall_intro(ctx: &RuleCtx) -> RuleResult {
    let cited = ctx.subproof(0)?;
    let Some(flag) = cited.subproof.flag() else {
        return Err(Violation::MissingFlag);
    };
    if cited.subproof.is_assumption() {
        return Err(Violation::Inapplicable(
            "the subproof for `A-i` must not make an assumption",
        ));
    }
    if !cited.subproof.flag_fresh() {
        return Err(Violation::NotFresh { var: flag });
    }

    let Formula::ForAll { var, inner } = ctx.result else {
        return Err(Violation::ResultShape {
            expected: "a universal formula",
        });
    };
    if ctx.result.is_free(flag) {
        return Err(Violation::FlagEscapes { var: flag });
    }

    if inner.substitute(*var, flag).as_ref() != Some(cited.last) {
        return Err(Violation::NotAnInstance {
            general: ctx.result.clone(),
            found: cited.last.clone(),
        });
    }
    Ok(())
}

// From F[t/x] infer exists(x) F.
fn check_exists_intro(ctx: &RuleCtx) -> RuleResult {
    let parent = ctx.dep(0)?;
    let Formula::Exists { var, inner } = ctx.result else {
        return Err(Violation::ResultShape {
            expected: "an existential formula",
        });
    };

    let instance_found = match ctx.substitution(0) {
        Some(substitution) => {
            check_substitution_var(substitution, *var)?;
            inner.substitute(*var, substitution.term).as_ref() == Some(parent)
        }
        None => inner.instantiation_of(*var, parent).is_some(),
    };

    if !instance_found {
        return Err(Violation::NotAnInstance {
            general: ctx.result.clone(),
            found: parent.clone(),
        });
    }
    Ok(())
}

// From exists(x) F and a subproof assuming F[z/x] for a fresh z and ending
// in C infer C.
fn check_exists_elim(ctx: &RuleCtx) -> RuleResult {
    let parent = ctx.dep(0)?;
    let Formula::Exists { var, inner } = parent else {
        return Err(Violation::WrongShape {
            index: 0,
            expected: "an existential formula",
            found: parent.clone(),
        });
    };

    let cited = ctx.hypothetical(1)?;
    let Some(flag) = cited.subproof.flag() else {
        return Err(Violation::MissingFlag);
    };
    if !cited.subproof.flag_fresh() {
        return Err(Violation::NotFresh { var: flag });
    }

    match inner.substitute(*var, flag) {
        Some(expected) if expected == *cited.first => {}
        Some(expected) => {
            return Err(Violation::Mismatch {
                expected,
                found: cited.first.clone(),
            });
        }
        None => {
            return Err(Violation::NotAnInstance {
                general: parent.clone(),
                found: cited.first.clone(),
            });
        }
    }

    if cited.last.is_free(flag) {
        return Err(Violation::FlagEscapes { var: flag });
    }

    ctx.expect(cited.last.clone())
}

// Infer t = t.
fn check_identity_intro(ctx: &RuleCtx) -> RuleResult {
    match ctx.result.as_identity() {
        Some((left, right)) if left == right => Ok(()),
        _ => Err(Violation::ResultShape {
            expected: "an identity `t = t`",
        }),
    }
}

// From t = s and F infer F with some t replaced by s.
fn check_identity_elim(ctx: &RuleCtx) -> RuleResult {
    let identity = ctx.dep(0)?;
    let Some((lhs, rhs)) = identity.as_identity() else {
        return Err(Violation::WrongShape {
            index: 0,
            expected: "an identity",
            found: identity.clone(),
        });
    };

    let formula = ctx.dep(1)?;
    if !formula.rewrites_to(lhs, rhs, ctx.result) {
        return Err(Violation::Inapplicable(
            "the line is not the cited formula with the identity applied",
        ));
    }
    Ok(())
}
