//! Transactional document store boundary.
//!
//! Workflows see storage only through two traits:
//!
//! - `InventoryStore`: opens units of work and serves read-only snapshots.
//! - `UnitOfWork`: buffered reads and writes that become visible together on
//!   `commit`, or not at all. Dropping a unit of work without committing it
//!   aborts it.
//!
//! Records are `Document`s: serde types addressed by a collection name and
//! their document number. Stores are free to encode them however they like;
//! the in-memory store keeps JSON values with a per-document version.
//!
//! ## Isolation
//!
//! Implementations must make a committed unit of work serializable with
//! respect to every document it read or wrote: if any of them changed since
//! it was observed, `commit` fails with `StoreError::Conflict` and nothing is
//! applied. `insert` must fail (at the latest on commit) when the key exists.

pub mod documents;
pub mod in_memory;

pub use documents::{ScrapLink, collection_for};
pub use in_memory::{InMemoryStore, InMemoryUnitOfWork};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use stockledger_core::{DocumentNumber, IdPrefix};

use crate::error::StoreError;

/// A storable record.
pub trait Document: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;
    /// Human-readable entity name used in not-found errors.
    const ENTITY: &'static str;

    fn key(&self) -> String;
}

/// How a buffered write treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create or replace.
    Upsert,
    /// Create; the key must not exist.
    Insert,
    Delete,
}

/// One atomic unit of work.
pub trait UnitOfWork {
    /// Read a raw document, seeing this unit's own pending writes.
    fn get_raw(&mut self, collection: &'static str, key: &str)
    -> Result<Option<JsonValue>, StoreError>;

    /// Buffer a write; applied on commit.
    fn put_raw(
        &mut self,
        collection: &'static str,
        key: String,
        body: Option<JsonValue>,
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    /// Whether `key` exists, without recording it as a read dependency.
    ///
    /// Used by ID probing; duplicate keys are still rejected by `insert`.
    fn probe(&mut self, collection: &'static str, key: &str) -> Result<bool, StoreError>;

    /// Highest sequence in use or reserved for `prefix`.
    fn highest_sequence(&mut self, prefix: IdPrefix) -> Result<Option<u64>, StoreError>;

    /// Reserve `number` so concurrent and later allocations start above it.
    /// Reservations survive an abort, like a database sequence.
    fn reserve(&mut self, number: DocumentNumber);

    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;

    fn load<D: Document>(&mut self, key: &str) -> Result<Option<D>, StoreError> {
        match self.get_raw(D::COLLECTION, key)? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    fn exists<D: Document>(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get_raw(D::COLLECTION, key)?.is_some())
    }

    fn save<D: Document>(&mut self, doc: &D) -> Result<(), StoreError> {
        let body = serde_json::to_value(doc)?;
        self.put_raw(D::COLLECTION, doc.key(), Some(body), WriteMode::Upsert)
    }

    fn insert<D: Document>(&mut self, doc: &D) -> Result<(), StoreError> {
        let body = serde_json::to_value(doc)?;
        self.put_raw(D::COLLECTION, doc.key(), Some(body), WriteMode::Insert)
    }

    fn delete<D: Document>(&mut self, key: &str) -> Result<(), StoreError> {
        self.put_raw(D::COLLECTION, key.to_string(), None, WriteMode::Delete)
    }
}

/// Shared store handle.
pub trait InventoryStore: Send + Sync {
    type Tx: UnitOfWork;

    fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Read one committed document outside any unit of work.
    fn get<D: Document>(&self, key: &str) -> Result<Option<D>, StoreError>;

    /// Every committed document of a collection, in key order.
    fn scan<D: Document>(&self) -> Result<Vec<D>, StoreError>;
}
