use std::fmt;
use thiserror::Error;

use crate::parse::location::Span;

/// Rule names as they are written in proof lines, longest first so that the
/// first prefix match is also the longest one.
pub const RULE_NAMES: [&str; 21] = [
    "v-mtp", "~~-i", "~~-e", "&-e1", "&-e2", "v-i1", "v-i2", ">-mt", "id-i", "id-e", "&-i",
    "v-e", ">-i", ">-e", "~-i", "~-e", "0-e", "A-i", "A-e", "E-i", "E-e",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `|-`, only meaningful in sequent notation.
    Turnstile,
    /// A lone `0`.
    Falsity,
    Number,
    RuleName,
    /// A dash followed by a word, like `-premiss`.
    DashIdent,
    Ident,
    LParen,
    RParen,
    Comma,
    Dot,
    Colon,
    Pipe,
    LBracket,
    RBracket,
    Slash,
    Dash,
    Equals,
    Amp,
    Gt,
    Tilde,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = match self {
            Self::Turnstile => "`|-`",
            Self::Falsity => "`0`",
            Self::Number => "a number",
            Self::RuleName => "a rule name",
            Self::DashIdent => "a dashed rule name",
            Self::Ident => "an identifier",
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::Comma => "`,`",
            Self::Dot => "`.`",
            Self::Colon => "`:`",
            Self::Pipe => "`|`",
            Self::LBracket => "`[`",
            Self::RBracket => "`]`",
            Self::Slash => "`/`",
            Self::Dash => "`-`",
            Self::Equals => "`=`",
            Self::Amp => "`&`",
            Self::Gt => "`>`",
            Self::Tilde => "`~`",
        };
        f.write_str(desc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

/// What the lexer actually saw where something else was expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    Token(String),
    EndOfInput,
}

impl fmt::Display for Found {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(text) => write!(f, "`{text}`"),
            Self::EndOfInput => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct TokenError {
    pub expected: TokenKind,
    pub found: Found,
    pub span: Span,
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '\''
}

/// Splits `text` into tokens. Whitespace and characters that have no
/// meaning in either proof lines or formulas are dropped.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(ch) = text[pos..].chars().next() {
        let rest = &text[pos..];

        let (kind, len) = if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        } else if rest.starts_with("|-") {
            (TokenKind::Turnstile, 2)
        } else if let Some(rule) = match_rule_name(rest) {
            (TokenKind::RuleName, rule.len())
        } else if ch == '-' && rest[1..].starts_with(is_ident_start) {
            let len = 1 + scan_while(&rest[1..], is_ident_continue);
            (TokenKind::DashIdent, len)
        } else if ch.is_ascii_digit() {
            let len = scan_while(rest, |c| c.is_ascii_digit());
            let kind = if &rest[..len] == "0" {
                TokenKind::Falsity
            } else {
                TokenKind::Number
            };
            (kind, len)
        } else if is_ident_start(ch) {
            (TokenKind::Ident, scan_while(rest, is_ident_continue))
        } else {
            let kind = match ch {
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ',' => TokenKind::Comma,
                '.' => TokenKind::Dot,
                ':' => TokenKind::Colon,
                '|' => TokenKind::Pipe,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                '/' => TokenKind::Slash,
                '-' => TokenKind::Dash,
                '=' => TokenKind::Equals,
                '&' => TokenKind::Amp,
                '>' => TokenKind::Gt,
                '~' => TokenKind::Tilde,
                _ => {
                    pos += ch.len_utf8();
                    continue;
                }
            };
            (kind, ch.len_utf8())
        };

        tokens.push(Token {
            kind,
            text: &rest[..len],
            span: Span::new(pos, pos + len),
        });
        pos += len;
    }

    tokens
}

fn scan_while(text: &str, pred: impl Fn(char) -> bool) -> usize {
    text.char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(text.len(), |(i, _)| i)
}

fn match_rule_name(text: &str) -> Option<&'static str> {
    RULE_NAMES.into_iter().find(|rule| {
        text.starts_with(rule) && !text[rule.len()..].starts_with(is_ident_continue)
    })
}

/// A cursor over the tokens of one piece of text.
#[derive(Debug, Clone)]
pub struct TokenStream<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    text_len: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            tokens: tokenize(text),
            pos: 0,
            text_len: text.len(),
        }
    }

    pub fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    pub fn peek_nth(&self, n: usize) -> Option<Token<'a>> {
        self.tokens.get(self.pos + n).copied()
    }

    pub fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    pub fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    /// Consumes the next token if it has the given kind.
    pub fn eat(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        if self.peek_is(kind) {
            self.advance()
        } else {
            None
        }
    }

    pub fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>, TokenError> {
        self.eat(kind).ok_or_else(|| TokenError {
            expected: kind,
            found: self.found(),
            span: self.next_span(),
        })
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn found(&self) -> Found {
        match self.peek() {
            Some(token) => Found::Token(token.text.to_string()),
            None => Found::EndOfInput,
        }
    }

    /// The span of the next token, or an empty span at the end of the text.
    pub fn next_span(&self) -> Span {
        self.peek()
            .map_or(Span::empty_at(self.text_len), |token| token.span)
    }

    pub fn remaining(&self) -> &[Token<'a>] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }
}
