//! Persistence: the record-store boundary and the analysis store on top of it.

pub mod analyses;
pub mod file;
pub mod memory;

pub use analyses::{AnalysisStore, SavedField};
pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;

/// Opaque per-owner blob storage.
///
/// Failures surface as [`crate::error::AnalysisError::Persistence`].
pub trait RecordStore: Send + Sync {
    fn put(&self, owner: &str, key: &str, payload: &str) -> Result<()>;

    fn get(&self, owner: &str, key: &str) -> Result<Option<String>>;

    /// `false` when nothing was stored under the key.
    fn delete(&self, owner: &str, key: &str) -> Result<bool>;
}

impl<T: RecordStore + ?Sized> RecordStore for Box<T> {
    fn put(&self, owner: &str, key: &str, payload: &str) -> Result<()> {
        (**self).put(owner, key, payload)
    }

    fn get(&self, owner: &str, key: &str) -> Result<Option<String>> {
        (**self).get(owner, key)
    }

    fn delete(&self, owner: &str, key: &str) -> Result<bool> {
        (**self).delete(owner, key)
    }
}
