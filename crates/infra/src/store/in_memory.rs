use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value as JsonValue;

use stockledger_core::{DocumentNumber, ExpectedVersion, IdPrefix};

use super::documents::collection_for;
use super::{Document, InventoryStore, UnitOfWork, WriteMode};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct Versioned {
    version: u64,
    body: JsonValue,
}

type Collections = HashMap<&'static str, BTreeMap<String, Versioned>>;
type DocKey = (&'static str, String);

#[derive(Debug, Default)]
struct Shared {
    documents: RwLock<Collections>,
    /// Per-prefix high-water mark of reserved and committed sequence numbers.
    sequences: Mutex<HashMap<IdPrefix, u64>>,
}

impl Shared {
    fn current(
        &self,
        collection: &'static str,
        key: &str,
    ) -> Result<Option<Versioned>, StoreError> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents.get(collection).and_then(|c| c.get(key)).cloned())
    }

    fn bump_sequence(&self, prefix: IdPrefix, seq: u64) {
        let mut sequences = self.sequences.lock().unwrap_or_else(PoisonError::into_inner);
        let mark = sequences.entry(prefix).or_insert(0);
        *mark = (*mark).max(seq);
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("document lock poisoned".to_string())
}

fn duplicate(collection: &str, key: &str) -> StoreError {
    StoreError::Conflict(format!("{collection}/{key} already exists"))
}

/// In-memory document store with optimistic, serializable units of work.
///
/// Intended for tests/dev and single-process deployments. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InventoryStore for InMemoryStore {
    type Tx = InMemoryUnitOfWork;

    fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(InMemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        })
    }

    fn get<D: Document>(&self, key: &str) -> Result<Option<D>, StoreError> {
        match self.shared.current(D::COLLECTION, key)? {
            Some(doc) => Ok(Some(serde_json::from_value(doc.body)?)),
            None => Ok(None),
        }
    }

    fn scan<D: Document>(&self) -> Result<Vec<D>, StoreError> {
        let documents = self.shared.documents.read().map_err(|_| poisoned())?;
        let Some(collection) = documents.get(D::COLLECTION) else {
            return Ok(Vec::new());
        };
        collection
            .values()
            .map(|doc| serde_json::from_value(doc.body.clone()).map_err(StoreError::from))
            .collect()
    }
}

#[derive(Debug)]
struct PendingWrite {
    mode: WriteMode,
    body: Option<JsonValue>,
}

/// Buffered unit of work over an `InMemoryStore`.
///
/// Every document read (or blindly overwritten) pins the version it observed;
/// `commit` re-validates all of them under the write lock before applying
/// anything.
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    reads: HashMap<DocKey, ExpectedVersion>,
    writes: BTreeMap<DocKey, PendingWrite>,
}

impl InMemoryUnitOfWork {
    /// Committed version of `doc_key`, pinned as a read dependency on first sight.
    fn observe(&mut self, doc_key: &DocKey) -> Result<Option<u64>, StoreError> {
        let version = self
            .shared
            .current(doc_key.0, &doc_key.1)?
            .map(|doc| doc.version);
        self.reads.entry(doc_key.clone()).or_insert(match version {
            Some(v) => ExpectedVersion::Exact(v),
            None => ExpectedVersion::Absent,
        });
        Ok(version)
    }
}

impl UnitOfWork for InMemoryUnitOfWork {
    fn get_raw(
        &mut self,
        collection: &'static str,
        key: &str,
    ) -> Result<Option<JsonValue>, StoreError> {
        let doc_key = (collection, key.to_string());
        if let Some(write) = self.writes.get(&doc_key) {
            return Ok(write.body.clone());
        }

        let current = self.shared.current(collection, key)?;
        self.reads.entry(doc_key).or_insert(match &current {
            Some(doc) => ExpectedVersion::Exact(doc.version),
            None => ExpectedVersion::Absent,
        });
        Ok(current.map(|doc| doc.body))
    }

    fn put_raw(
        &mut self,
        collection: &'static str,
        key: String,
        body: Option<JsonValue>,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let doc_key = (collection, key);
        let pending = self.writes.get(&doc_key).map(|w| (w.mode, w.body.is_some()));

        let mode = match (pending, mode) {
            (Some((_, true)), WriteMode::Insert) => {
                return Err(duplicate(collection, &doc_key.1));
            }
            (Some((WriteMode::Insert, _)), WriteMode::Delete) => {
                self.writes.remove(&doc_key);
                return Ok(());
            }
            // Saving a document this unit created keeps insert semantics.
            (Some((WriteMode::Insert, _)), WriteMode::Upsert) => WriteMode::Insert,
            (Some(_), WriteMode::Insert) => WriteMode::Upsert,
            (Some(_), other) => other,
            (None, other) => {
                let existing = self.observe(&doc_key)?;
                if other == WriteMode::Insert && existing.is_some() {
                    return Err(duplicate(collection, &doc_key.1));
                }
                other
            }
        };

        self.writes.insert(doc_key, PendingWrite { mode, body });
        Ok(())
    }

    fn probe(&mut self, collection: &'static str, key: &str) -> Result<bool, StoreError> {
        if let Some(write) = self.writes.get(&(collection, key.to_string())) {
            return Ok(write.body.is_some());
        }
        Ok(self.shared.current(collection, key)?.is_some())
    }

    fn highest_sequence(&mut self, prefix: IdPrefix) -> Result<Option<u64>, StoreError> {
        let reserved = self
            .shared
            .sequences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&prefix)
            .copied();
        let collection = collection_for(prefix);
        let pending = self
            .writes
            .keys()
            .filter(|(c, _)| *c == collection)
            .filter_map(|(_, key)| DocumentNumber::parse_with_prefix(key, prefix))
            .map(|n| n.seq())
            .max();
        Ok(reserved.max(pending))
    }

    fn reserve(&mut self, number: DocumentNumber) {
        self.shared.bump_sequence(number.prefix(), number.seq());
    }

    fn commit(mut self) -> Result<(), StoreError> {
        let mut documents = self.shared.documents.write().map_err(|_| poisoned())?;

        for ((collection, key), expected) in &self.reads {
            let actual = documents
                .get(collection)
                .and_then(|c| c.get(key))
                .map(|doc| doc.version);
            expected
                .check(actual)
                .map_err(|e| StoreError::Conflict(format!("{collection}/{key}: {e}")))?;
        }
        for ((collection, key), write) in &self.writes {
            let exists = documents.get(collection).is_some_and(|c| c.contains_key(key));
            if write.mode == WriteMode::Insert && exists {
                return Err(duplicate(collection, key));
            }
        }

        let mut inserted = Vec::new();
        for ((collection, key), write) in std::mem::take(&mut self.writes) {
            let docs = documents.entry(collection).or_default();
            match write.body {
                Some(body) => {
                    let version = docs.get(&key).map_or(1, |doc| doc.version + 1);
                    if write.mode == WriteMode::Insert {
                        if let Ok(number) = key.parse::<DocumentNumber>() {
                            if collection_for(number.prefix()) == collection {
                                inserted.push(number);
                            }
                        }
                    }
                    docs.insert(key, Versioned { version, body });
                }
                None => {
                    docs.remove(&key);
                }
            }
        }
        drop(documents);

        for number in inserted {
            self.shared.bump_sequence(number.prefix(), number.seq());
        }
        Ok(())
    }
}
