use rustc_hash::FxHashMap;
use thiserror::Error;
use ustr::Ustr;

use crate::{formula::Formula, parse::ParsedLine};

pub type SubproofId = usize;

/// The chain of subproofs a line sits in, outermost first.
pub type ScopePath = im::Vector<SubproofId>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("subproof depth jumps from {from} to {to}")]
    DepthJump { from: usize, to: usize },
    #[error("a subproof must start with `-assumption` or a fresh variable")]
    UnopenedSubproof,
    #[error("`-assumption` must open a new subproof")]
    AssumptionOutsideSubproof,
    #[error("a fresh variable may only be introduced when opening a subproof")]
    FlagOutsideSubproof,
}

#[derive(Debug, Clone)]
pub struct Subproof {
    flag: Option<Ustr>,
    is_assumption: bool,
    flag_fresh: bool,
    parent: ScopePath,
    /// The last line directly inside the subproof, not in a nested one.
    last_direct: Option<usize>,
}

impl Subproof {
    pub fn flag(&self) -> Option<Ustr> {
        self.flag
    }

    /// Whether the subproof was opened with `-assumption`.
    pub fn is_assumption(&self) -> bool {
        self.is_assumption
    }

    /// Whether the flag was unused by every line visible where the subproof
    /// was opened. Vacuously true when there is no flag.
    pub fn flag_fresh(&self) -> bool {
        self.flag_fresh
    }
}

/// Tracks which subproofs are open and which lines each line may see.
#[derive(Debug, Default)]
pub struct Scopes {
    subproofs: Vec<Subproof>,
    by_start: FxHashMap<usize, SubproofId>,
    open: ScopePath,
    line_paths: FxHashMap<usize, ScopePath>,
}

fn is_prefix(prefix: &ScopePath, path: &ScopePath) -> bool {
    prefix.len() <= path.len() && prefix.iter().zip(path.iter()).all(|(a, b)| a == b)
}

fn is_assumption(line: &ParsedLine) -> bool {
    line.rule.as_str() == "-assumption"
}

impl Scopes {
    /// Opens and closes subproofs so that `line` can be checked in the
    /// right scope. `formulas` holds the lines verified so far.
    pub fn enter(
        &mut self,
        line: &ParsedLine,
        formulas: &FxHashMap<usize, Formula>,
    ) -> Result<(), StructureError> {
        let depth = line.depth;
        let current = self.open.len();
        let opener = is_assumption(line) || line.flag.is_some();

        if depth > current + 1 {
            return Err(StructureError::DepthJump {
                from: current,
                to: depth,
            });
        }

        if depth == current + 1 {
            if !opener {
                return Err(StructureError::UnopenedSubproof);
            }
        } else {
            self.open.truncate(depth);
            if opener {
                if depth == 0 {
                    return Err(if is_assumption(line) {
                        StructureError::AssumptionOutsideSubproof
                    } else {
                        StructureError::FlagOutsideSubproof
                    });
                }
                // A sibling of the subproof that just ended.
                self.open.pop_back();
            } else {
                return Ok(());
            }
        }

        let parent = self.open.clone();
        let flag_fresh = match line.flag {
            Some(flag) => !self.visible_from(&parent).any(|l| {
                formulas.get(&l).is_some_and(|f| f.occurs(flag))
            }),
            None => true,
        };

        let id = self.subproofs.len();
        self.subproofs.push(Subproof {
            flag: line.flag,
            is_assumption: is_assumption(line),
            flag_fresh,
            parent,
            last_direct: None,
        });
        self.by_start.insert(line.line_number, id);
        self.open.push_back(id);

        Ok(())
    }

    /// Records that `line_number` was verified in the current scope.
    pub fn record(&mut self, line_number: usize) {
        if let Some(&id) = self.open.last() {
            self.subproofs[id].last_direct = Some(line_number);
        }
        self.line_paths.insert(line_number, self.open.clone());
    }

    /// Can the line being checked cite `line_number`?
    pub fn is_visible(&self, line_number: usize) -> bool {
        self.line_paths
            .get(&line_number)
            .is_some_and(|path| is_prefix(path, &self.open))
    }

    fn visible_from<'a>(&'a self, path: &'a ScopePath) -> impl Iterator<Item = usize> + 'a {
        self.line_paths
            .iter()
            .filter(move |(_, p)| is_prefix(p, path))
            .map(|(&l, _)| l)
    }

    /// Finds the closed subproof cited as `start-end` from the current line.
    pub fn closed_subproof(&self, start: usize, end: usize) -> Option<&Subproof> {
        let &id = self.by_start.get(&start)?;
        let subproof = &self.subproofs[id];

        let still_open = self.open.contains(&id);
        let reachable = is_prefix(&subproof.parent, &self.open);
        (!still_open && reachable && subproof.last_direct == Some(end)).then_some(subproof)
    }
}

#[cfg(test)]
mod tests {
    use super::{Scopes, StructureError};
    use crate::{formula::Formula, parse::ParsedLine};
    use rustc_hash::FxHashMap;

    fn walk(scopes: &mut Scopes, formulas: &mut FxHashMap<usize, Formula>, line: ParsedLine) {
        scopes.enter(&line, formulas).unwrap();
        scopes.record(line.line_number);
        formulas.insert(line.line_number, Formula::atom(&line.formula_text));
    }

    #[test]
    fn closed_subproofs_hide_their_lines() {
        let mut scopes = Scopes::default();
        let mut formulas = FxHashMap::default();
        walk(&mut scopes, &mut formulas, ParsedLine::new(1, 0, None, "P", "-premiss", ""));
        walk(&mut scopes, &mut formulas, ParsedLine::new(2, 1, None, "Q", "-assumption", ""));
        assert!(scopes.is_visible(1));
        assert!(scopes.is_visible(2));

        let next = ParsedLine::new(3, 0, None, "R", ">-i", "2-2");
        scopes.enter(&next, &formulas).unwrap();
        assert!(scopes.is_visible(1));
        assert!(!scopes.is_visible(2));
        assert!(scopes.closed_subproof(2, 2).is_some());
        assert!(scopes.closed_subproof(2, 3).is_none());
    }

    #[test]
    fn open_subproofs_cannot_be_cited() {
        let mut scopes = Scopes::default();
        let mut formulas = FxHashMap::default();
        walk(&mut scopes, &mut formulas, ParsedLine::new(1, 1, None, "P", "-assumption", ""));
        walk(&mut scopes, &mut formulas, ParsedLine::new(2, 1, None, "Q", "&-i", "1,1"));
        assert!(scopes.closed_subproof(1, 2).is_none());
    }

    #[test]
    fn sibling_assumption_closes_the_previous_subproof() {
        let mut scopes = Scopes::default();
        let mut formulas = FxHashMap::default();
        walk(&mut scopes, &mut formulas, ParsedLine::new(1, 1, None, "A", "-assumption", ""));
        walk(&mut scopes, &mut formulas, ParsedLine::new(2, 1, None, "B", "-assumption", ""));
        assert!(!scopes.is_visible(1));
        assert!(scopes.is_visible(2));
    }

    #[test]
    fn reports_structural_errors() {
        let mut scopes = Scopes::default();
        let formulas = FxHashMap::default();
        assert_eq!(
            scopes.enter(&ParsedLine::new(1, 2, None, "P", "-assumption", ""), &formulas),
            Err(StructureError::DepthJump { from: 0, to: 2 })
        );
        assert_eq!(
            scopes.enter(&ParsedLine::new(1, 1, None, "P", "&-i", "1,1"), &formulas),
            Err(StructureError::UnopenedSubproof)
        );
        assert_eq!(
            scopes.enter(&ParsedLine::new(1, 0, None, "P", "-assumption", ""), &formulas),
            Err(StructureError::AssumptionOutsideSubproof)
        );
        assert_eq!(
            scopes.enter(&ParsedLine::new(1, 0, Some("z0"), "P", "A-e", "1"), &formulas),
            Err(StructureError::FlagOutsideSubproof)
        );
    }

    #[test]
    fn flags_must_be_unused_outside() {
        let mut scopes = Scopes::default();
        let mut formulas = FxHashMap::default();
        scopes
            .enter(&ParsedLine::new(1, 0, None, "P(a)", "-premiss", ""), &formulas)
            .unwrap();
        scopes.record(1);
        formulas.insert(1, Formula::predicate("P", &["a"]));

        walk(&mut scopes, &mut formulas, ParsedLine::new(2, 1, Some("a"), "X", "A-e", "1"));
        walk(&mut scopes, &mut formulas, ParsedLine::new(3, 1, Some("z0"), "Y", "A-e", "1"));

        scopes
            .enter(&ParsedLine::new(4, 0, None, "Z", "A-i", "3-3"), &formulas)
            .unwrap();
        assert!(!scopes.closed_subproof(2, 2).unwrap().flag_fresh());
        assert!(scopes.closed_subproof(3, 3).unwrap().flag_fresh());
    }
}
