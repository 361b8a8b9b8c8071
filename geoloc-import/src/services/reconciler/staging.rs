//! Creation staging with natural-key deduplication

use geoloc_common::{EntityKind, FieldMap, GeoStore, Result};
use std::collections::HashSet;
use std::hash::Hash;

/// Creation records waiting for one bulk insert
///
/// The first record staged for a natural key wins; later rows producing
/// the same key collapse into it.
#[derive(Debug)]
pub struct Staging<K> {
    kind: EntityKind,
    keys: Vec<K>,
    records: Vec<FieldMap>,
    seen: HashSet<K>,
}

impl<K> Staging<K>
where
    K: Clone + Eq + Hash,
{
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            keys: Vec::new(),
            records: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Stage a record, returning false when its key is already staged
    pub fn stage(&mut self, key: K, record: FieldMap) -> bool {
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.keys.push(key);
        self.records.push(record);
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bulk-create every staged record
    ///
    /// Returns `(key, new id)` pairs in staging order. Nothing is sent to
    /// the store when nothing was staged.
    pub async fn create_all<S>(self, store: &mut S) -> Result<Vec<(K, i64)>>
    where
        S: GeoStore + ?Sized,
    {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let ids = store.create_many(self.kind, &self.records).await?;
        Ok(self.keys.into_iter().zip(ids).collect())
    }
}
