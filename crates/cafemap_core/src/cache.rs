//! In-memory, identity-deduplicated cafe collection.
//!
//! # Responsibility
//! - Hold every known cafe keyed by provider id, in insertion order.
//! - Compute which scan candidates are new without mutating state.
//!
//! # Invariants
//! - `id` is unique across `records`.
//! - `index` mirrors exactly the ids in `records`.
//! - `merge` is all-or-nothing: a colliding batch leaves the cache untouched.

use crate::model::cafe::{CafeId, CafeRecord};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Raised when `merge` receives an id that is already cached.
///
/// This is a caller ordering bug: `diff_new` must always precede `merge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateIdError {
    pub id: CafeId,
}

impl Display for DuplicateIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cafe id already cached: {}", self.id)
    }
}

impl Error for DuplicateIdError {}

#[derive(Debug, Default, Clone)]
pub struct CafeCache {
    records: Vec<CafeRecord>,
    index: HashSet<CafeId>,
}

impl CafeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the collection wholesale with records read from the store.
    ///
    /// The store already guarantees unique ids, so no dedup happens here.
    pub fn load_all(&mut self, records: Vec<CafeRecord>) {
        self.index = records.iter().map(|record| record.id.clone()).collect();
        self.records = records;
    }

    /// Returns candidates whose id is not cached, in input order.
    ///
    /// An id repeated inside `candidates` is returned once (first occurrence).
    pub fn diff_new(&self, candidates: &[CafeRecord]) -> Vec<CafeRecord> {
        let mut seen = HashSet::new();
        candidates
            .iter()
            .filter(|record| !self.index.contains(&record.id))
            .filter(|record| seen.insert(record.id.as_str()))
            .cloned()
            .collect()
    }

    /// Appends records that `diff_new` reported as new.
    ///
    /// # Errors
    /// - `DuplicateIdError` for the first id already cached or repeated in
    ///   `new_records`; the cache is left unchanged.
    pub fn merge(&mut self, new_records: Vec<CafeRecord>) -> Result<(), DuplicateIdError> {
        let mut batch_ids = HashSet::with_capacity(new_records.len());
        for record in &new_records {
            if self.index.contains(&record.id) || !batch_ids.insert(record.id.as_str()) {
                return Err(DuplicateIdError {
                    id: record.id.clone(),
                });
            }
        }

        for record in new_records {
            self.index.insert(record.id.clone());
            self.records.push(record);
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&CafeRecord> {
        if !self.contains(id) {
            return None;
        }
        self.records.iter().find(|record| record.id == id)
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[CafeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
