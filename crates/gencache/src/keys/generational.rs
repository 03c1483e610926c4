//! Generational key type

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Snapshot of dependency generations, keyed by dependency name
pub type DepGen = BTreeMap<String, u64>;

/// Cache key whose address encodes a snapshot of its dependencies'
/// generations.
///
/// The address ([`storage_key`](Self::storage_key)) is `unique_id-version`.
/// `dep_gen` is only used to decide whether a new version must be minted;
/// it is not part of the address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationalKey {
    logical_name: String,
    unique_id: Uuid,
    version: u64,
    dep_gen: DepGen,
    last_update: DateTime<Utc>,
}

impl GenerationalKey {
    /// Mint the first version of a key for `logical_name`.
    #[must_use]
    pub fn new(logical_name: impl Into<String>, dep_gen: DepGen) -> Self {
        Self {
            logical_name: logical_name.into(),
            unique_id: Uuid::new_v4(),
            version: 0,
            dep_gen,
            last_update: Utc::now(),
        }
    }

    #[must_use]
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    #[must_use]
    pub const fn unique_id(&self) -> Uuid {
        self.unique_id
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub const fn dep_gen(&self) -> &DepGen {
        &self.dep_gen
    }

    #[must_use]
    pub const fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    /// A key without dependencies is never invalidated by generation bumps.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.dep_gen.is_empty()
    }

    /// Address of the cached value in the cache store
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}-{}", self.unique_id, self.version)
    }

    /// Whether `snapshot` differs from the generations this version was
    /// built against. Added or removed dependency names count as changes.
    #[must_use]
    pub fn is_stale(&self, snapshot: &DepGen) -> bool {
        &self.dep_gen != snapshot
    }

    /// Bump the version and replace the snapshot wholesale.
    pub(crate) fn advance(&mut self, snapshot: DepGen) {
        self.version += 1;
        self.dep_gen = snapshot;
        self.last_update = Utc::now();
    }
}

impl fmt::Display for GenerationalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.unique_id, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, u64)]) -> DepGen {
        entries.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_new_key_starts_at_version_zero() {
        let key = GenerationalKey::new("SELECT 1", snapshot(&[("a", 3)]));
        assert_eq!(key.version(), 0);
        assert_eq!(key.logical_name(), "SELECT 1");
        assert_eq!(key.dep_gen().get("a"), Some(&3));
        assert!(!key.is_terminal());
    }

    #[test]
    fn test_storage_key_format() {
        let key = GenerationalKey::new("q", DepGen::new());
        assert_eq!(key.storage_key(), format!("{}-0", key.unique_id()));
        assert_eq!(key.to_string(), key.storage_key());
    }

    #[test]
    fn test_terminal_key() {
        let key = GenerationalKey::new("q", DepGen::new());
        assert!(key.is_terminal());
        assert!(!key.is_stale(&DepGen::new()));
    }

    #[test]
    fn test_is_stale_on_changed_generation() {
        let key = GenerationalKey::new("q", snapshot(&[("a", 1)]));
        assert!(!key.is_stale(&snapshot(&[("a", 1)])));
        assert!(key.is_stale(&snapshot(&[("a", 2)])));
    }

    #[test]
    fn test_is_stale_on_added_or_removed_dependency() {
        let key = GenerationalKey::new("q", snapshot(&[("a", 1), ("b", 0)]));
        assert!(key.is_stale(&snapshot(&[("a", 1)])));
        assert!(key.is_stale(&snapshot(&[("a", 1), ("b", 0), ("c", 0)])));
    }

    #[test]
    fn test_advance_replaces_snapshot_and_keeps_identity() {
        let mut key = GenerationalKey::new("q", snapshot(&[("a", 1), ("b", 4)]));
        let id = key.unique_id();
        let before = key.storage_key();

        key.advance(snapshot(&[("a", 2)]));

        assert_eq!(key.version(), 1);
        assert_eq!(key.unique_id(), id);
        assert_eq!(key.dep_gen(), &snapshot(&[("a", 2)]));
        assert_ne!(key.storage_key(), before);
    }

    #[test]
    fn test_distinct_logical_names_get_distinct_ids() {
        let a = GenerationalKey::new("a", DepGen::new());
        let b = GenerationalKey::new("b", DepGen::new());
        assert_ne!(a.unique_id(), b.unique_id());
        assert_ne!(a.storage_key(), b.storage_key());
    }
}
