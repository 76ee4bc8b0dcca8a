//! Byte-range source locations.
//!
//! Everything the compiler points at - AST nodes, IR values,
//! diagnostics - is addressed by a [`Span`]: a half-open `[start, end)`
//! byte range within a single source file. A [`Location`] adds the
//! owning file so diagnostics can render `path(line,col)` through the
//! source map. Both are two or three words wide and always passed by
//! value.

use serde::{Deserialize, Serialize};

/// Identifies a source file registered with a [`crate::SourceMap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl SourceId {
    /// Sentinel for synthetic locations not tied to any source file.
    pub const NONE: SourceId = SourceId(u32::MAX);

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

/// A half-open `[start, end)` byte range.
///
/// `start == end` is an empty range; ranges never run backwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Placeholder range carried by values the compiler synthesises
    /// itself; renders nowhere.
    pub const NONE: Span = Span {
        start: u32::MAX,
        end: u32::MAX,
    };

    #[inline]
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    /// An empty range sitting at `offset`.
    #[inline]
    #[must_use]
    pub const fn empty_at(offset: u32) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    /// The range of `len` bytes beginning at `start`.
    #[inline]
    #[must_use]
    pub const fn with_len(start: u32, len: u32) -> Self {
        Span {
            start,
            end: start + len,
        }
    }

    /// Whether this is the [`Span::NONE`] placeholder.
    #[inline]
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.start == u32::MAX && self.end == u32::MAX
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `offset` falls inside the range.
    #[inline]
    #[must_use]
    pub const fn covers(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }

    /// The smallest range containing both `self` and `other`.
    #[inline]
    #[must_use]
    pub fn union(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The text the range covers. Out-of-bounds ends clamp to the
    /// source, so a stale or placeholder range yields `""` rather than
    /// panicking mid-diagnostic.
    #[inline]
    #[must_use]
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        let start = (self.start as usize).min(source.len());
        let end = (self.end as usize).clamp(start, source.len());
        source.get(start..end).unwrap_or("")
    }
}

/// Anything that knows where in the source it came from.
pub trait Spanned {
    fn span(&self) -> Span;
}

impl Spanned for Span {
    fn span(&self) -> Span {
        *self
    }
}

/// A span together with the source file it belongs to.
///
/// This is the location type diagnostics carry; it renders as
/// `path(line,col)` through the [`crate::SourceMap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub source: SourceId,
    pub span: Span,
}

impl Location {
    #[inline]
    pub const fn new(source: SourceId, span: Span) -> Self {
        Location { source, span }
    }

    /// A location not tied to any source (synthetic values, whole-module
    /// diagnostics).
    #[inline]
    pub const fn detached() -> Self {
        Location {
            source: SourceId::NONE,
            span: Span::NONE,
        }
    }
}

impl Spanned for Location {
    fn span(&self) -> Span {
        self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_commutative_and_covering() {
        let a = Span::new(4, 10);
        let b = Span::new(8, 20);
        assert_eq!(a.union(b), Span::new(4, 20));
        assert_eq!(b.union(a), Span::new(4, 20));
        assert_eq!(a.union(a), a);
    }

    #[test]
    fn covers_respects_the_half_open_end() {
        let s = Span::new(2, 5);
        assert!(!s.covers(1));
        assert!(s.covers(2));
        assert!(s.covers(4));
        assert!(!s.covers(5));
    }

    #[test]
    fn text_clamps_out_of_bounds_ranges() {
        assert_eq!(Span::new(2, 64).text("hello"), "llo");
        assert_eq!(Span::new(9, 12).text("hello"), "");
        assert_eq!(Span::NONE.text("hello"), "");
    }

    #[test]
    fn the_placeholder_is_recognised() {
        assert!(Span::NONE.is_none());
        assert!(!Span::new(0, 0).is_none());
        assert!(Location::detached().source.is_none());
    }

    #[test]
    fn with_len_and_empty_at_agree_on_lengths() {
        assert_eq!(Span::with_len(7, 3), Span::new(7, 10));
        assert_eq!(Span::empty_at(7).len(), 0);
        assert!(Span::empty_at(7).is_empty());
    }
}
