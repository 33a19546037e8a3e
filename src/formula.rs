use itertools::Itertools;
use std::fmt;
use ustr::Ustr;

use crate::strings;

/// A formula of first-order logic as written in a proof line.
///
/// Equality is purely structural: bound variables are compared by name, so
/// `forall(x) P(x)` and `forall(y) P(y)` are different formulas.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    Falsity,
    Predicate { name: Ustr, terms: Vec<Ustr> },
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Implies(Box<Formula>, Box<Formula>),
    ForAll { var: Ustr, inner: Box<Formula> },
    Exists { var: Ustr, inner: Box<Formula> },
}

impl Formula {
    pub fn identity(left: Ustr, right: Ustr) -> Self {
        Self::Predicate {
            name: *strings::IDENTITY,
            terms: vec![left, right],
        }
    }

    pub fn not(inner: Formula) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn and(left: Formula, right: Formula) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Formula, right: Formula) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    pub fn implies(left: Formula, right: Formula) -> Self {
        Self::Implies(Box::new(left), Box::new(right))
    }

    pub fn for_all(var: impl Into<Ustr>, inner: Formula) -> Self {
        Self::ForAll {
            var: var.into(),
            inner: Box::new(inner),
        }
    }

    pub fn exists(var: impl Into<Ustr>, inner: Formula) -> Self {
        Self::Exists {
            var: var.into(),
            inner: Box::new(inner),
        }
    }

    /// The two sides of `t = s`, if this is an identity atom.
    pub fn as_identity(&self) -> Option<(Ustr, Ustr)> {
        match self {
            Self::Predicate { name, terms } if *name == *strings::IDENTITY => match terms[..] {
                [left, right] => Some((left, right)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Does `name` appear anywhere in the formula, free, bound or as a binder?
    pub fn occurs(&self, name: Ustr) -> bool {
        match self {
            Self::Falsity => false,
            Self::Predicate { terms, .. } => terms.contains(&name),
            Self::Not(inner) => inner.occurs(name),
            Self::And(l, r) | Self::Or(l, r) | Self::Implies(l, r) => {
                l.occurs(name) || r.occurs(name)
            }
            Self::ForAll { var, inner } | Self::Exists { var, inner } => {
                *var == name || inner.occurs(name)
            }
        }
    }

    pub fn is_free(&self, name: Ustr) -> bool {
        match self {
            Self::Falsity => false,
            Self::Predicate { terms, .. } => terms.contains(&name),
            Self::Not(inner) => inner.is_free(name),
            Self::And(l, r) | Self::Or(l, r) | Self::Implies(l, r) => {
                l.is_free(name) || r.is_free(name)
            }
            Self::ForAll { var, inner } | Self::Exists { var, inner } => {
                *var != name && inner.is_free(name)
            }
        }
    }

    /// Replaces the free occurrences of `var` with `term`.
    ///
    /// Returns `None` when `term` would be captured by a quantifier that
    /// binds it at a place where `var` occurs free.
    pub fn substitute(&self, var: Ustr, term: Ustr) -> Option<Formula> {
        let res = match self {
            Self::Falsity => Self::Falsity,
            Self::Predicate { name, terms } => Self::Predicate {
                name: *name,
                terms: terms
                    .iter()
                    .map(|&t| if t == var { term } else { t })
                    .collect(),
            },
            Self::Not(inner) => Self::not(inner.substitute(var, term)?),
            Self::And(l, r) => Self::and(l.substitute(var, term)?, r.substitute(var, term)?),
            Self::Or(l, r) => Self::or(l.substitute(var, term)?, r.substitute(var, term)?),
            Self::Implies(l, r) => {
                Self::implies(l.substitute(var, term)?, r.substitute(var, term)?)
            }
            Self::ForAll { var: bound, .. } | Self::Exists { var: bound, .. }
                if *bound == var =>
            {
                self.clone()
            }
            Self::ForAll { var: bound, inner } | Self::Exists { var: bound, inner } => {
                if *bound == term && inner.is_free(var) {
                    return None;
                }
                let inner = Box::new(inner.substitute(var, term)?);
                match self {
                    Self::ForAll { .. } => Self::ForAll { var: *bound, inner },
                    _ => Self::Exists { var: *bound, inner },
                }
            }
        };

        Some(res)
    }

    /// Finds the term `t` with `self[t/var] == other`.
    ///
    /// When `var` is not free in `self` any term works and `var` itself is
    /// returned.
    pub fn instantiation_of(&self, var: Ustr, other: &Formula) -> Option<Ustr> {
        let mut found = None;
        if !self.match_instance(var, other, &mut found) {
            return None;
        }

        let term = found.unwrap_or(var);
        (self.substitute(var, term)? == *other).then_some(term)
    }

    fn match_instance(&self, var: Ustr, other: &Formula, found: &mut Option<Ustr>) -> bool {
        match (self, other) {
            (Self::Falsity, Self::Falsity) => true,
            (
                Self::Predicate { name, terms },
                Self::Predicate {
                    name: other_name,
                    terms: other_terms,
                },
            ) => {
                if name != other_name || terms.len() != other_terms.len() {
                    return false;
                }
                for (&t, &o) in terms.iter().zip(other_terms) {
                    if t != var {
                        if t != o {
                            return false;
                        }
                        continue;
                    }
                    match *found {
                        Some(prev) if prev != o => return false,
                        Some(_) => {}
                        None => *found = Some(o),
                    }
                }
                true
            }
            (Self::Not(a), Self::Not(b)) => a.match_instance(var, b, found),
            (Self::And(l1, r1), Self::And(l2, r2))
            | (Self::Or(l1, r1), Self::Or(l2, r2))
            | (Self::Implies(l1, r1), Self::Implies(l2, r2)) => {
                l1.match_instance(var, l2, found) && r1.match_instance(var, r2, found)
            }
            (
                Self::ForAll { var: v1, inner: i1 },
                Self::ForAll { var: v2, inner: i2 },
            )
            | (
                Self::Exists { var: v1, inner: i1 },
                Self::Exists { var: v2, inner: i2 },
            ) => {
                if v1 != v2 {
                    return false;
                }
                if *v1 == var {
                    // `var` is shadowed below this binder.
                    return i1 == i2;
                }
                i1.match_instance(var, i2, found)
            }
            _ => false,
        }
    }

    /// Is `other` this formula with zero or more occurrences of `lhs`
    /// replaced by `rhs`?
    pub fn rewrites_to(&self, lhs: Ustr, rhs: Ustr, other: &Formula) -> bool {
        match (self, other) {
            (Self::Falsity, Self::Falsity) => true,
            (
                Self::Predicate { name, terms },
                Self::Predicate {
                    name: other_name,
                    terms: other_terms,
                },
            ) => {
                name == other_name
                    && terms.len() == other_terms.len()
                    && terms
                        .iter()
                        .zip(other_terms)
                        .all(|(&t, &o)| t == o || (t == lhs && o == rhs))
            }
            (Self::Not(a), Self::Not(b)) => a.rewrites_to(lhs, rhs, b),
            (Self::And(l1, r1), Self::And(l2, r2))
            | (Self::Or(l1, r1), Self::Or(l2, r2))
            | (Self::Implies(l1, r1), Self::Implies(l2, r2)) => {
                l1.rewrites_to(lhs, rhs, l2) && r1.rewrites_to(lhs, rhs, r2)
            }
            (
                Self::ForAll { var: v1, inner: i1 },
                Self::ForAll { var: v2, inner: i2 },
            )
            | (
                Self::Exists { var: v1, inner: i1 },
                Self::Exists { var: v2, inner: i2 },
            ) => {
                if v1 != v2 {
                    return false;
                }
                if *v1 == lhs || *v1 == rhs {
                    return i1 == i2;
                }
                i1.rewrites_to(lhs, rhs, i2)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Falsity => write!(f, "0"),
            Self::Predicate { name, terms } if *name == *strings::IDENTITY && terms.len() == 2 => {
                write!(f, "{} = {}", terms[0], terms[1])
            }
            Self::Predicate { name, terms } if terms.is_empty() => write!(f, "{name}"),
            Self::Predicate { name, terms } => write!(f, "{name}({})", terms.iter().join(", ")),
            Self::Not(inner) => write!(f, "~{inner}"),
            Self::And(l, r) => write!(f, "({l} & {r})"),
            Self::Or(l, r) => write!(f, "({l} v {r})"),
            Self::Implies(l, r) => write!(f, "({l} > {r})"),
            Self::ForAll { var, inner } => write!(f, "{}({var}) {inner}", *strings::FORALL),
            Self::Exists { var, inner } => write!(f, "{}({var}) {inner}", *strings::EXISTS),
        }
    }
}

#[cfg(test)]
impl Formula {
    pub fn atom(name: &str) -> Self {
        Self::Predicate {
            name: Ustr::from(name),
            terms: Vec::new(),
        }
    }

    pub fn predicate(name: &str, terms: &[&str]) -> Self {
        Self::Predicate {
            name: Ustr::from(name),
            terms: terms.iter().map(|&t| Ustr::from(t)).collect(),
        }
    }
}
