//! Declaration-level Java syntax for the annotator.
//!
//! The parser only understands what annotation injection needs: packages,
//! imports, (nested) type declarations, fields, methods, constructors and
//! parameters, each with byte spans into the original text. Method and
//! initializer bodies are skipped by brace balancing.

pub mod java;
mod signature;

pub use signature::{normalize_type_name, MethodSignature};

/// Half-open byte range `[start, end)` into the parsed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}
