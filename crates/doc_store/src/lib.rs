//! Document store interface.
//!
//! Documents are JSON values addressed by `(collection, key)` and carry a
//! monotonically increasing version. Writes are conditional on that version,
//! which is what `run_transaction` builds its optimistic read-modify-write on.

pub mod file;
pub mod memory;
pub mod transaction;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use transaction::run_transaction;

use async_trait::async_trait;
use common::Error;
use serde_json::Value;

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub version: u64,
    pub data: Value,
}

/// Condition a `put` must satisfy to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The document must not exist yet.
    MustNotExist,
    /// The document must still be at this version.
    Version(u64),
}

impl Precondition {
    /// Precondition matching what a read returned.
    pub fn from_read(read: Option<&Versioned>) -> Self {
        match read {
            Some(doc) => Precondition::Version(doc.version),
            None => Precondition::MustNotExist,
        }
    }

    /// Check against the stored version, if any.
    pub fn check(&self, current: Option<u64>, collection: &str, key: &str) -> Result<(), Error> {
        match (self, current) {
            (Precondition::MustNotExist, None) => Ok(()),
            (Precondition::Version(want), Some(have)) if *want == have => Ok(()),
            (Precondition::MustNotExist, Some(have)) => Err(Error::StoreConflict(format!(
                "{collection}/{key} was created concurrently (now at version {have})"
            ))),
            (Precondition::Version(want), Some(have)) => Err(Error::StoreConflict(format!(
                "{collection}/{key} moved from version {want} to {have}"
            ))),
            (Precondition::Version(want), None) => Err(Error::StoreConflict(format!(
                "{collection}/{key} at version {want} no longer exists"
            ))),
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document. `Ok(None)` means it does not exist.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Versioned>, Error>;

    /// Write a document if `precondition` holds, returning the new version.
    /// A failed precondition is `Error::StoreConflict`.
    async fn put(
        &self,
        collection: &str,
        key: &str,
        data: Value,
        precondition: Precondition,
    ) -> Result<u64, Error>;

    /// Add a document under a generated key, returning that key.
    async fn append(&self, collection: &str, data: Value) -> Result<String, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_from_read() {
        assert_eq!(Precondition::from_read(None), Precondition::MustNotExist);
        let doc = Versioned {
            version: 3,
            data: Value::Null,
        };
        assert_eq!(Precondition::from_read(Some(&doc)), Precondition::Version(3));
    }

    #[test]
    fn test_precondition_check() {
        assert!(Precondition::MustNotExist.check(None, "c", "k").is_ok());
        assert!(Precondition::Version(2).check(Some(2), "c", "k").is_ok());

        for (pre, current) in [
            (Precondition::MustNotExist, Some(1)),
            (Precondition::Version(2), Some(3)),
            (Precondition::Version(2), None),
        ] {
            let err = pre.check(current, "c", "k").unwrap_err();
            assert!(err.is_conflict(), "{pre:?} vs {current:?}");
        }
    }
}
