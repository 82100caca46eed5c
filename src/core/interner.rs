//! Identifier interning.
//!
//! Per the concurrency model the interning table is the one
//! process-wide resource touched during analysis. It is append-only, so a
//! coarse mutex taken only during insertion is sufficient -- lookups of an
//! already-interned `Id` never touch the lock.
//!
//! Case folding happens here: HLASM identifiers are case-insensitive, so the
//! table is keyed on the upper-cased spelling and the `Id` it returns is a
//! stable, totally-ordered handle suitable for use as a `HashMap`/`BTreeMap`
//! key without re-hashing strings on every lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock};

/// Maximum length of an HLASM identifier, ordinary or variable, without the
/// leading `&`/`.` sigil.
pub const MAX_ID_LEN: usize = 63;

/// An interned, case-folded identifier. Cheap to copy, compare, and hash.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u32);

struct Table {
    by_name: HashMap<String, Id>,
    by_id: Vec<String>,
}

impl Table {
    fn new() -> Self {
        Self { by_name: HashMap::new(), by_id: Vec::new() }
    }
    fn intern(&mut self, name: &str) -> Id {
        let folded = name.to_uppercase();
        if let Some(id) = self.by_name.get(&folded) {
            return *id;
        }
        let id = Id(self.by_id.len() as u32);
        self.by_id.push(folded.clone());
        self.by_name.insert(folded, id);
        id
    }
}

static TABLE: OnceLock<Mutex<Table>> = OnceLock::new();

fn table() -> &'static Mutex<Table> {
    TABLE.get_or_init(|| Mutex::new(Table::new()))
}

impl Id {
    /// Intern `name`, case-folding to upper case. Panics only if the mutex is
    /// poisoned by a prior panic while holding the lock (a fatal condition
    /// the caller cannot recover from either way).
    pub fn intern(name: &str) -> Self {
        table().lock().expect("interning table poisoned").intern(name)
    }
    /// Borrow the canonical (upper-cased) spelling of this identifier.
    ///
    /// The returned string is cloned out of the table rather than borrowed
    /// with a lifetime tied to the lock guard, keeping `Id` trivially
    /// `Copy` and lock-free to use afterward.
    pub fn text(&self) -> String {
        table().lock().expect("interning table poisoned").by_id[self.0 as usize].clone()
    }
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({}, {:?})", self.0, self.text())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Validate the shape of an identifier: alphanumeric plus `$`, `@`, `#`, `_`,
/// not starting with a digit, at most `MAX_ID_LEN` characters. Does not
/// intern; callers validate before calling `Id::intern` so a malformed name
/// can still be reported with a diagnostic instead of silently interned.
pub fn is_valid_id(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_ID_LEN {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if first.is_ascii_digit() {
        return false;
    }
    std::iter::once(first).chain(chars).all(|c| {
        c.is_ascii_alphanumeric() || c == '$' || c == '@' || c == '#' || c == '_'
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_folds_and_is_stable() {
        let a = Id::intern("label1");
        let b = Id::intern("LABEL1");
        assert_eq!(a, b);
        assert_eq!(a.text(), "LABEL1");
    }

    #[test]
    fn distinct_names_get_distinct_ids() {
        let a = Id::intern("FOO");
        let b = Id::intern("BAR");
        assert_ne!(a, b);
    }

    #[test]
    fn validates_shape() {
        assert!(is_valid_id("LABEL1"));
        assert!(is_valid_id("@X$Y#Z_1"));
        assert!(!is_valid_id("1LABEL"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id(&"A".repeat(64)));
    }
}
