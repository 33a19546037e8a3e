use std::fmt;
use thiserror::Error;
use ustr::Ustr;

use crate::{
    formula::Formula,
    parse::{
        lexer::{Found, TokenError, TokenKind, TokenStream},
        location::Span,
    },
    strings,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    Token(TokenKind),
    Description(&'static str),
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(kind) => write!(f, "{kind}"),
            Self::Description(desc) => f.write_str(desc),
        }
    }
}

/// A formula that could not be parsed. The span is relative to the formula
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct ParseError {
    pub expected: Expected,
    pub found: Found,
    pub span: Span,
}

impl From<TokenError> for ParseError {
    fn from(err: TokenError) -> Self {
        Self {
            expected: Expected::Token(err.expected),
            found: err.found,
            span: err.span,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses the longest formula at the start of `text`. Anything after it is
/// left alone.
pub fn parse_formula(text: &str) -> ParseResult<Formula> {
    let mut stream = TokenStream::new(text);
    parse_implication(&mut stream)
}

/// Parses `text` as exactly one formula.
pub fn parse_formula_exact(text: &str) -> ParseResult<Formula> {
    let mut stream = TokenStream::new(text);
    let formula = parse_implication(&mut stream)?;

    if !stream.is_at_end() {
        return Err(error(&stream, "end of formula"));
    }

    Ok(formula)
}

fn error(stream: &TokenStream, expected: &'static str) -> ParseError {
    ParseError {
        expected: Expected::Description(expected),
        found: stream.found(),
        span: stream.next_span(),
    }
}

fn peek_keyword(stream: &TokenStream, keyword: Ustr) -> bool {
    stream
        .peek()
        .is_some_and(|t| t.kind == TokenKind::Ident && t.text == keyword.as_str())
}

// implication := disjunction ( '>' implication )?
fn parse_implication(stream: &mut TokenStream) -> ParseResult<Formula> {
    let left = parse_disjunction(stream)?;

    if stream.eat(TokenKind::Gt).is_some() {
        let right = parse_implication(stream)?;
        return Ok(Formula::implies(left, right));
    }

    Ok(left)
}

// disjunction := conjunction ( 'v' conjunction )*
fn parse_disjunction(stream: &mut TokenStream) -> ParseResult<Formula> {
    let mut left = parse_conjunction(stream)?;

    while peek_keyword(stream, *strings::OR) {
        stream.advance();
        let right = parse_conjunction(stream)?;
        left = Formula::or(left, right);
    }

    Ok(left)
}

// conjunction := unary ( '&' unary )*
fn parse_conjunction(stream: &mut TokenStream) -> ParseResult<Formula> {
    let mut left = parse_unary(stream)?;

    while stream.eat(TokenKind::Amp).is_some() {
        let right = parse_unary(stream)?;
        left = Formula::and(left, right);
    }

    Ok(left)
}

fn parse_unary(stream: &mut TokenStream) -> ParseResult<Formula> {
    if stream.eat(TokenKind::Tilde).is_some() {
        return Ok(Formula::not(parse_unary(stream)?));
    }

    if peek_quantifier(stream, *strings::FORALL) {
        stream.advance();
        let (var, inner) = parse_quantifier(stream)?;
        return Ok(Formula::for_all(var, inner));
    }

    if peek_quantifier(stream, *strings::EXISTS) {
        stream.advance();
        let (var, inner) = parse_quantifier(stream)?;
        return Ok(Formula::exists(var, inner));
    }

    parse_primary(stream)
}

/// A quantifier keyword only counts as one when a `(` follows, so `forall`
/// on its own is still a usable proposition name.
fn peek_quantifier(stream: &TokenStream, keyword: Ustr) -> bool {
    peek_keyword(stream, keyword)
        && stream
            .peek_nth(1)
            .is_some_and(|t| t.kind == TokenKind::LParen)
}

// '(' identifier ')' unary
fn parse_quantifier(stream: &mut TokenStream) -> ParseResult<(Ustr, Formula)> {
    stream.expect(TokenKind::LParen)?;
    let var = stream.expect(TokenKind::Ident)?;
    stream.expect(TokenKind::RParen)?;
    let inner = parse_unary(stream)?;

    Ok((Ustr::from(var.text), inner))
}

fn parse_primary(stream: &mut TokenStream) -> ParseResult<Formula> {
    if stream.eat(TokenKind::LParen).is_some() {
        let formula = parse_implication(stream)?;
        stream.expect(TokenKind::RParen)?;
        return Ok(formula);
    }

    // `0 = x` is an identity, not falsity.
    let is_identity = stream
        .peek_nth(1)
        .is_some_and(|t| t.kind == TokenKind::Equals);
    if !is_identity && stream.eat(TokenKind::Falsity).is_some() {
        return Ok(Formula::Falsity);
    }

    parse_predicate(stream)
}

// predicate := identifier ( '(' (term (',' term)*)? ')' )?
//            | term '=' term
fn parse_predicate(stream: &mut TokenStream) -> ParseResult<Formula> {
    if stream.peek_nth(1).is_some_and(|t| t.kind == TokenKind::Equals) {
        let left = parse_term(stream)?;
        stream.expect(TokenKind::Equals)?;
        let right = parse_term(stream)?;
        return Ok(Formula::identity(left, right));
    }

    let Some(name) = stream.eat(TokenKind::Ident) else {
        return Err(error(stream, "`(`, `0` or a predicate"));
    };

    let mut terms = Vec::new();
    if stream.eat(TokenKind::LParen).is_some() {
        if !stream.peek_is(TokenKind::RParen) && peek_term(stream) {
            terms.push(parse_term(stream)?);
            while stream.eat(TokenKind::Comma).is_some() {
                terms.push(parse_term(stream)?);
            }
        }
        stream.expect(TokenKind::RParen)?;
    }

    Ok(Formula::Predicate {
        name: Ustr::from(name.text),
        terms,
    })
}

fn peek_term(stream: &TokenStream) -> bool {
    stream.peek().is_some_and(|t| {
        matches!(
            t.kind,
            TokenKind::Ident | TokenKind::Number | TokenKind::Falsity
        )
    })
}

fn parse_term(stream: &mut TokenStream) -> ParseResult<Ustr> {
    if !peek_term(stream) {
        return Err(error(stream, "a term"));
    }

    let Some(token) = stream.advance() else {
        return Err(error(stream, "a term"));
    };
    Ok(Ustr::from(token.text))
}
