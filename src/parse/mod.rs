mod dependency;
pub mod formula;
pub mod lexer;
mod line;
mod location;

pub use dependency::{Dependency, Substitution};
pub use formula::{ParseError, parse_formula, parse_formula_exact};
pub use line::{LineFormatError, ParsedLine, parse_line};
pub use location::Span;
