//! String interning.
//!
//! Identifiers and other short strings are deduplicated into `Atom`
//! handles. Strings longer than the interner's bound are stored but not
//! deduplicated, so two equal long strings may get distinct atoms; use
//! [`Interner::resolve`] and compare content where that matters. Atom
//! identity is only meaningful within one compilation.

use rustc_hash::FxHashMap;

/// Default upper bound for deduplicated strings, in bytes.
pub const DEFAULT_MAX_INTERNED_LEN: usize = 4096;

/// A handle to an interned string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

impl Atom {
    /// The empty string, always interned first.
    pub const EMPTY: Atom = Atom(0);
}

/// Deduplicating string storage.
#[derive(Debug)]
pub struct Interner {
    map: FxHashMap<Box<str>, Atom>,
    strings: Vec<Box<str>>,
    max_interned_len: usize,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Self::with_bound(DEFAULT_MAX_INTERNED_LEN)
    }

    /// Create an interner that deduplicates strings up to `max_interned_len`
    /// bytes; longer strings are stored without deduplication.
    #[must_use]
    pub fn with_bound(max_interned_len: usize) -> Self {
        let mut interner = Self {
            map: FxHashMap::default(),
            strings: Vec::new(),
            max_interned_len,
        };
        let empty = interner.intern("");
        debug_assert_eq!(empty, Atom::EMPTY);
        interner
    }

    /// Intern a string, returning its atom.
    pub fn intern(&mut self, s: &str) -> Atom {
        if s.len() <= self.max_interned_len {
            if let Some(&atom) = self.map.get(s) {
                return atom;
            }
        }

        let atom = Atom(u32::try_from(self.strings.len()).unwrap_or(u32::MAX));
        let boxed: Box<str> = s.into();
        if s.len() <= self.max_interned_len {
            self.map.insert(boxed.clone(), atom);
        }
        self.strings.push(boxed);
        atom
    }

    /// Resolve an atom back to its string.
    #[must_use]
    pub fn resolve(&self, atom: Atom) -> &str {
        self.strings
            .get(atom.0 as usize)
            .map_or("", |s| s.as_ref())
    }

    /// Number of distinct stored strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates() {
        let mut interner = Interner::new();
        let a = interner.intern("printf");
        let b = interner.intern("printf");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "printf");
    }

    #[test]
    fn distinct_strings_get_distinct_atoms() {
        let mut interner = Interner::new();
        let a = interner.intern("x");
        let b = interner.intern("y");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_string_is_atom_zero() {
        let mut interner = Interner::new();
        assert_eq!(interner.intern(""), Atom::EMPTY);
        assert_eq!(interner.resolve(Atom::EMPTY), "");
    }

    #[test]
    fn strings_past_the_bound_are_stored_but_not_deduplicated() {
        let mut interner = Interner::with_bound(4);
        let long = "a-very-long-literal";
        let a = interner.intern(long);
        let b = interner.intern(long);
        assert_ne!(a, b);
        assert_eq!(interner.resolve(a), long);
        assert_eq!(interner.resolve(b), long);
    }
}
