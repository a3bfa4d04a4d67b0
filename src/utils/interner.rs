//! Global string interner.
//!
//! Converts asset and bone names into compact integer [`Symbol`]s so the hot
//! paths (cache lookups, per-frame bone maps) compare and hash integers
//! instead of strings. Every [`AssetKey`](crate::assets::AssetKey) is an
//! interned symbol.

use std::sync::OnceLock;

use lasso::{Spur, ThreadedRodeo};

/// Symbol type alias.
///
/// A `Symbol` is a compact integer identifier that can be compared and
/// hashed in O(1).
pub type Symbol = Spur;

fn interner() -> &'static ThreadedRodeo {
    static INTERNER: OnceLock<ThreadedRodeo> = OnceLock::new();
    INTERNER.get_or_init(ThreadedRodeo::new)
}

/// Interns a string and returns its [`Symbol`].
///
/// If the string is already present in the pool, the existing symbol is
/// returned; otherwise it is added.
#[inline]
pub fn intern(s: &str) -> Symbol {
    interner().get_or_intern(s)
}

/// Looks up the [`Symbol`] of an already-interned string.
///
/// Returns `None` if the string has never been interned. Never allocates.
#[inline]
#[must_use]
pub fn get(s: &str) -> Option<Symbol> {
    interner().get(s)
}

/// Resolves a [`Symbol`] back to its string.
#[inline]
#[must_use]
pub fn resolve(sym: Symbol) -> &'static str {
    interner().resolve(&sym)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_and_resolve() {
        let s1 = intern("pelvis");
        let s2 = intern("pelvis");
        let s3 = intern("spine_01");

        assert_eq!(s1, s2);
        assert_ne!(s1, s3);

        assert_eq!(resolve(s1), "pelvis");
        assert_eq!(resolve(s3), "spine_01");
    }

    #[test]
    fn test_get() {
        let _ = intern("existing");

        assert!(get("existing").is_some());
        assert!(get("never_interned_name").is_none());
    }
}
