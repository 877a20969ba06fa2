//! Thread-safe string interner.
//!
//! Decoded string results and identifiers are interned once and referenced
//! by [`StrId`] afterwards, so equality is an index comparison and the
//! backing storage is shared by every worker thread.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Handle to an interned string.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct StrId(u32);

impl StrId {
    /// The empty string, pre-interned at index 0.
    pub const EMPTY: StrId = StrId(0);

    /// Raw index value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

struct InternerState {
    map: FxHashMap<&'static str, u32>,
    strings: Vec<&'static str>,
}

/// String interner with interior mutability.
///
/// Interned strings are leaked into `'static` storage; the interner lives
/// for the whole compilation, so the leak is bounded by the set of distinct
/// strings seen.
pub struct Interner {
    state: RwLock<InternerState>,
}

/// Interner shared across worker threads.
pub type SharedInterner = Arc<Interner>;

impl Interner {
    /// Create an interner with the empty string pre-interned.
    pub fn new() -> Self {
        let empty: &'static str = "";
        let mut map = FxHashMap::default();
        map.insert(empty, 0);
        Interner {
            state: RwLock::new(InternerState {
                map,
                strings: vec![empty],
            }),
        }
    }

    /// Intern a string, returning its handle.
    ///
    /// Read-locks on the hit path; only a miss takes the write lock.
    pub fn intern(&self, s: &str) -> StrId {
        {
            let state = self.state.read();
            if let Some(&idx) = state.map.get(s) {
                return StrId(idx);
            }
        }

        let mut state = self.state.write();
        // Re-check: another thread may have interned between the locks.
        if let Some(&idx) = state.map.get(s) {
            return StrId(idx);
        }

        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let idx = u32::try_from(state.strings.len()).unwrap_or_else(|_| {
            unreachable!("interner exceeded u32::MAX distinct strings")
        });
        state.strings.push(leaked);
        state.map.insert(leaked, idx);
        StrId(idx)
    }

    /// Resolve a handle back to its string.
    ///
    /// # Panics
    /// Panics if the handle was not issued by this interner.
    pub fn resolve(&self, id: StrId) -> &'static str {
        let state = self.state.read();
        state.strings[id.0 as usize]
    }

    /// Number of distinct interned strings.
    pub fn len(&self) -> usize {
        self.state.read().strings.len()
    }

    /// True if only the pre-interned empty string is present.
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn intern_is_idempotent() {
        let interner = Interner::new();
        let a = interner.intern("worker");
        let b = interner.intern("worker");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "worker");
    }

    #[test]
    fn empty_string_is_pre_interned() {
        let interner = Interner::new();
        assert_eq!(interner.intern(""), StrId::EMPTY);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let interner = Interner::new();
        let a = interner.intern("lex");
        let b = interner.intern("parse");
        assert_ne!(a, b);
        assert_eq!(interner.resolve(a), "lex");
        assert_eq!(interner.resolve(b), "parse");
    }

    #[test]
    fn concurrent_interning_converges() {
        let interner = Arc::new(Interner::new());
        let ids: Vec<StrId> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let interner = Arc::clone(&interner);
                    scope.spawn(move || interner.intern("shared"))
                })
                .collect();
            handles.into_iter().filter_map(|h| h.join().ok()).collect()
        });
        assert_eq!(ids.len(), 4);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }
}
