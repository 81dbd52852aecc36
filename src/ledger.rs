//! Ledger collaborator: a byte-oriented key-value store with composite
//! keys and paginated range scans, plus typed helpers over serde.
//!
//! The engine runs inside the host ledger's transaction boundary and sees
//! a consistent snapshot; reads observe the transaction's own prior
//! writes, and a failed operation discards every write. [`MemoryLedger`]
//! is the reference implementation used by tests and simulations.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::DexError;

/// Separator used inside composite keys, mirroring the host ledger's
/// reserved key namespace.
pub const KEY_DELIMITER: char = '\u{0}';

/// Builds a composite key from an index key and its parts.
pub fn composite_key(index_key: &str, parts: &[&str]) -> String {
    let mut key = String::with_capacity(index_key.len() + 16);
    key.push(KEY_DELIMITER);
    key.push_str(index_key);
    key.push(KEY_DELIMITER);
    for part in parts {
        key.push_str(part);
        key.push(KEY_DELIMITER);
    }
    key
}

/// A persisted object type: its index key plus the per-instance key parts.
pub trait ChainObject: Serialize + DeserializeOwned {
    const INDEX_KEY: &'static str;

    fn key_parts(&self) -> Vec<String>;

    fn key(&self) -> String {
        let parts = self.key_parts();
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        composite_key(Self::INDEX_KEY, &refs)
    }
}

/// One page of a range scan: raw entries in key order plus the cursor at
/// which the next page resumes (empty when exhausted).
#[derive(Debug)]
pub struct LedgerPage {
    pub entries: Vec<(String, Vec<u8>)>,
    pub bookmark: String,
}

/// The store interface the engine calls out to. Object safe by design so
/// operations can hold `&mut dyn Ledger`.
pub trait Ledger {
    fn get_state(&self, key: &str) -> Option<Vec<u8>>;

    fn put_state(&mut self, key: &str, value: Vec<u8>);

    fn delete_state(&mut self, key: &str);

    /// Scans keys beginning with `prefix`, resuming at `bookmark` (empty
    /// means from the start), returning at most `page_size` entries.
    fn get_state_by_prefix_paginated(
        &self,
        prefix: &str,
        page_size: usize,
        bookmark: &str,
    ) -> Result<LedgerPage, DexError>;
}

/// Loads and deserializes an object, failing `NotFound` with `what` as the
/// subject when the key is absent.
pub fn get_object<T: ChainObject>(
    ledger: &dyn Ledger,
    key: &str,
    what: &str,
) -> Result<T, DexError> {
    let bytes = ledger
        .get_state(key)
        .ok_or_else(|| DexError::NotFound(format!("{what} not found")))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Like [`get_object`] but absence is not an error.
pub fn try_get_object<T: ChainObject>(
    ledger: &dyn Ledger,
    key: &str,
) -> Result<Option<T>, DexError> {
    match ledger.get_state(key) {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Serializes and writes an object under its own composite key.
pub fn put_object<T: ChainObject>(ledger: &mut dyn Ledger, object: &T) -> Result<(), DexError> {
    let bytes = serde_json::to_vec(object)?;
    ledger.put_state(&object.key(), bytes);
    Ok(())
}

/// Scans objects of `T` whose key starts with the given leading parts,
/// one page at a time. Returns the decoded page and the continuation
/// cursor (empty when the scan is exhausted).
pub fn get_objects_by_partial_key_paginated<T: ChainObject>(
    ledger: &dyn Ledger,
    partial_parts: &[&str],
    page_size: usize,
    bookmark: &str,
) -> Result<(Vec<T>, String), DexError> {
    // the trailing delimiter keeps "user1" from matching "user10"
    let prefix = composite_key(T::INDEX_KEY, partial_parts);
    let page = ledger.get_state_by_prefix_paginated(&prefix, page_size, bookmark)?;
    let mut objects = Vec::with_capacity(page.entries.len());
    for (_, bytes) in &page.entries {
        objects.push(serde_json::from_slice(bytes)?);
    }
    Ok((objects, page.bookmark))
}

/// BTreeMap-backed ledger for tests and local simulation. Bookmarks are
/// the key at which the next page starts.
#[derive(Default)]
pub struct MemoryLedger {
    state: BTreeMap<String, Vec<u8>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl Ledger for MemoryLedger {
    fn get_state(&self, key: &str) -> Option<Vec<u8>> {
        self.state.get(key).cloned()
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) {
        self.state.insert(key.to_string(), value);
    }

    fn delete_state(&mut self, key: &str) {
        self.state.remove(key);
    }

    fn get_state_by_prefix_paginated(
        &self,
        prefix: &str,
        page_size: usize,
        bookmark: &str,
    ) -> Result<LedgerPage, DexError> {
        if !bookmark.is_empty() && !bookmark.starts_with(prefix) {
            return Err(DexError::validation("Invalid bookmark"));
        }

        let start: &str = if bookmark.is_empty() { prefix } else { bookmark };
        let mut entries = Vec::new();
        let mut next_bookmark = String::new();

        for (key, value) in self
            .state
            .range::<str, _>((Bound::Included(start), Bound::Unbounded))
        {
            if !key.starts_with(prefix) {
                break;
            }
            if entries.len() == page_size {
                next_bookmark = key.clone();
                break;
            }
            entries.push((key.clone(), value.clone()));
        }

        Ok(LedgerPage {
            entries,
            bookmark: next_bookmark,
        })
    }
}
