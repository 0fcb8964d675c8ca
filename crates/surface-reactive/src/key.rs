#![forbid(unsafe_code)]

//! Property keys and key paths.
//!
//! A [`KeyPath`] is the sequence of property names a binding walks, resolved
//! left to right: every key but the last selects the next container, the last
//! one names the observed slot. Paths come either pre-split (`["a", "b"]`) or
//! as text (`"a.b[0].value"`), which [`KeyPath::parse`] splits on dots and
//! bracketed indices.

use std::borrow::Borrow;
use std::fmt;
use std::rc::Rc;

use crate::error::{ReactiveError, Result};

/// Name of a property slot. Cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyKey(Rc<str>);

impl PropertyKey {
    /// Create a key from any string.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Rc::from(name.as_ref()))
    }

    /// The `length` key exposed by arrays.
    #[must_use]
    pub fn length() -> Self {
        Self::new("length")
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key as an array index, if it is one in canonical form.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        parse_index(&self.0)
    }
}

/// Largest valid array index; array lengths stop at `MAX_INDEX + 1`.
pub const MAX_INDEX: usize = u32::MAX as usize - 1;

/// Parse a canonical decimal array index (`"0"`, `"17"`; not `"01"` or `"+1"`)
/// no larger than [`MAX_INDEX`].
#[must_use]
pub fn parse_index(key: &str) -> Option<usize> {
    let bytes = key.as_bytes();
    match bytes {
        [] => None,
        [b'0'] => Some(0),
        [b'0', ..] => None,
        _ if bytes.iter().all(u8::is_ascii_digit) => {
            key.parse().ok().filter(|index| *index <= MAX_INDEX)
        }
        _ => None,
    }
}

impl Borrow<str> for PropertyKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PropertyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PropertyKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PropertyKey {
    fn from(value: String) -> Self {
        Self(Rc::from(value))
    }
}

impl From<&String> for PropertyKey {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(value: &PropertyKey) -> Self {
        value.clone()
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        Self::from(index.to_string())
    }
}

/// A non-empty sequence of property keys.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    parents: Vec<PropertyKey>,
    terminal: PropertyKey,
}

impl KeyPath {
    /// Build a path from pre-split keys. Keys are taken verbatim: `"a.b"`
    /// stays a single key.
    pub fn from_keys<K: Into<PropertyKey>>(keys: impl IntoIterator<Item = K>) -> Result<Self> {
        let mut parents: Vec<PropertyKey> = keys.into_iter().map(Into::into).collect();
        let terminal = parents.pop().ok_or_else(|| ReactiveError::InvalidPath {
            path: String::new(),
            reason: "empty path",
        })?;
        Ok(Self { parents, terminal })
    }

    /// A single-key path.
    #[must_use]
    pub fn single(key: impl Into<PropertyKey>) -> Self {
        Self {
            parents: Vec::new(),
            terminal: key.into(),
        }
    }

    /// Parse a dotted path with optional bracketed segments, e.g.
    /// `"items[0].label"` or `"a.b.value"`.
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |reason| ReactiveError::InvalidPath {
            path: path.to_owned(),
            reason,
        };
        if path.is_empty() {
            return Err(invalid("empty path"));
        }

        let mut keys: Vec<PropertyKey> = Vec::new();
        let mut segment = String::new();
        let mut chars = path.chars();
        // Set right after `]`: only `.` or `[` may follow.
        let mut closed = false;
        // Set right after `.`: a segment must follow.
        let mut pending = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if segment.is_empty() && !closed {
                        return Err(invalid("empty segment"));
                    }
                    if !segment.is_empty() {
                        keys.push(PropertyKey::from(std::mem::take(&mut segment)));
                    }
                    closed = false;
                    pending = true;
                }
                '[' => {
                    if !segment.is_empty() {
                        keys.push(PropertyKey::from(std::mem::take(&mut segment)));
                    } else if pending {
                        return Err(invalid("empty segment"));
                    }
                    let mut index = String::new();
                    let mut terminated = false;
                    for c in chars.by_ref() {
                        match c {
                            ']' => {
                                terminated = true;
                                break;
                            }
                            '[' => return Err(invalid("unbalanced bracket")),
                            c => index.push(c),
                        }
                    }
                    if !terminated {
                        return Err(invalid("unbalanced bracket"));
                    }
                    if index.is_empty() {
                        return Err(invalid("empty index"));
                    }
                    keys.push(PropertyKey::from(index));
                    closed = true;
                    pending = false;
                }
                ']' => return Err(invalid("unbalanced bracket")),
                c => {
                    if closed {
                        return Err(invalid("expected '.' or '[' after ']'"));
                    }
                    segment.push(c);
                    pending = false;
                }
            }
        }

        if pending {
            return Err(invalid("empty segment"));
        }
        if !segment.is_empty() {
            keys.push(PropertyKey::from(segment));
        }
        Self::from_keys(keys).map_err(|_| invalid("empty path"))
    }

    /// Keys before the terminal one.
    #[must_use]
    pub fn parents(&self) -> &[PropertyKey] {
        &self.parents
    }

    /// The observed key.
    #[must_use]
    pub fn terminal(&self) -> &PropertyKey {
        &self.terminal
    }

    /// Number of keys (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len() + 1
    }

    /// Always false; present for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over every key in order.
    pub fn iter(&self) -> impl Iterator<Item = &PropertyKey> {
        self.parents.iter().chain(std::iter::once(&self.terminal))
    }
}

impl fmt::Debug for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in &self.parents {
            write!(f, "{key}.")?;
        }
        write!(f, "{}", self.terminal)
    }
}

/// Conversion into a [`KeyPath`]: text is parsed, key lists are taken as-is.
pub trait IntoKeyPath {
    fn into_key_path(self) -> Result<KeyPath>;
}

impl IntoKeyPath for KeyPath {
    fn into_key_path(self) -> Result<KeyPath> {
        Ok(self)
    }
}

impl IntoKeyPath for &KeyPath {
    fn into_key_path(self) -> Result<KeyPath> {
        Ok(self.clone())
    }
}

impl IntoKeyPath for &str {
    fn into_key_path(self) -> Result<KeyPath> {
        KeyPath::parse(self)
    }
}

impl IntoKeyPath for String {
    fn into_key_path(self) -> Result<KeyPath> {
        KeyPath::parse(&self)
    }
}

impl IntoKeyPath for &String {
    fn into_key_path(self) -> Result<KeyPath> {
        KeyPath::parse(self)
    }
}

impl IntoKeyPath for PropertyKey {
    fn into_key_path(self) -> Result<KeyPath> {
        Ok(KeyPath::single(self))
    }
}

impl<K: Into<PropertyKey>> IntoKeyPath for Vec<K> {
    fn into_key_path(self) -> Result<KeyPath> {
        KeyPath::from_keys(self)
    }
}

impl<K: Into<PropertyKey>, const N: usize> IntoKeyPath for [K; N] {
    fn into_key_path(self) -> Result<KeyPath> {
        KeyPath::from_keys(self)
    }
}

impl<K: Into<PropertyKey> + Clone> IntoKeyPath for &[K] {
    fn into_key_path(self) -> Result<KeyPath> {
        KeyPath::from_keys(self.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(path: &KeyPath) -> Vec<&str> {
        path.iter().map(PropertyKey::as_str).collect()
    }

    #[test]
    fn parses_dotted_path() {
        let path = KeyPath::parse("a.b.value").unwrap();
        assert_eq!(keys(&path), ["a", "b", "value"]);
        assert_eq!(path.terminal().as_str(), "value");
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn parses_bracket_indices() {
        let path = KeyPath::parse("items[0].label").unwrap();
        assert_eq!(keys(&path), ["items", "0", "label"]);

        let path = KeyPath::parse("grid[1][2]").unwrap();
        assert_eq!(keys(&path), ["grid", "1", "2"]);

        let path = KeyPath::parse("[3]").unwrap();
        assert_eq!(keys(&path), ["3"]);
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", ".", "a.", ".a", "a..b", "a[", "a]", "a[]", "a[0]b", "a.[0]", "a[[0]]"] {
            assert!(
                matches!(KeyPath::parse(bad), Err(ReactiveError::InvalidPath { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn pre_split_keys_are_verbatim() {
        let path = ["a.b", "c"].into_key_path().unwrap();
        assert_eq!(keys(&path), ["a.b", "c"]);
    }

    #[test]
    fn empty_key_list_is_rejected() {
        let empty: Vec<&str> = Vec::new();
        assert!(empty.into_key_path().is_err());
    }

    #[test]
    fn display_round_trips_dotted_form() {
        let path = KeyPath::parse("a[0].b").unwrap();
        assert_eq!(path.to_string(), "a.0.b");
    }

    #[test]
    fn canonical_indices_only() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("42"), Some(42));
        assert_eq!(parse_index("007"), None);
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("1e3"), None);
        assert_eq!(parse_index(""), None);
        assert_eq!(parse_index("4294967294"), Some(MAX_INDEX));
        assert_eq!(parse_index("4294967295"), None);
        assert_eq!(parse_index("18446744073709551615"), None);
        assert_eq!(parse_index("99999999999999999999999"), None);
        assert_eq!(PropertyKey::from(12usize).as_index(), Some(12));
        assert_eq!(PropertyKey::length().as_index(), None);
    }
}
