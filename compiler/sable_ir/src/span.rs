//! Source location spans.

use std::fmt;

/// A byte range in a source file.
///
/// Layout: 8 bytes. `start` is the byte offset from file start, `len` the
/// length of the range in bytes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(C)]
pub struct Span {
    pub start: u32,
    pub len: u32,
}

impl Span {
    /// Dummy span for synthesized nodes (decoded metaprogram results).
    pub const DUMMY: Span = Span { start: 0, len: 0 };

    /// Create a new span.
    #[inline]
    pub const fn new(start: u32, len: u32) -> Self {
        Span { start, len }
    }

    /// Exclusive end offset.
    #[inline]
    pub const fn end(self) -> u32 {
        self.start + self.len
    }

    /// Whether this is the dummy span.
    #[inline]
    pub const fn is_dummy(self) -> bool {
        self.start == 0 && self.len == 0
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end())
    }
}
