use std::{fmt::Debug, ops::Range};

/// A range of bytes within some piece of text. The start is inclusive and
/// the end exclusive.
///
/// Spans are relative to whatever text was handed to the lexer, so a span
/// inside a formula has to be moved by the formula's offset in its line
/// (and the line's offset in its file) before it can be shown to a user.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);

        Self { start, end }
    }

    pub fn empty_at(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn bytes(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn forward(&self, bytes: usize) -> Self {
        Self::new(self.start + bytes, self.end + bytes)
    }

    pub fn to(&self, other: Span) -> Self {
        Self::new(self.start, other.end.max(self.start))
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Span({}-{})", self.start, self.end)
    }
}
