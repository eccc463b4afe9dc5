//! The `StudentStore` trait and an in-memory implementation of it.
//!
//! The SQLite implementation lives in `crate::db`.

use crate::error::Res;
use crate::model::{StoredStudent, StudentRecord};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::trace;

/// Persists students keyed by their unique code.
#[async_trait::async_trait]
pub trait StudentStore: Send + Sync {
    /// Atomically replaces every stored student with `records`. When two records share a unique
    /// code the later one wins. Either the whole batch is installed or nothing changes.
    ///
    /// Returns the number of students in the store afterwards.
    async fn replace_all(&self, records: &[StudentRecord]) -> Res<usize>;

    /// Returns the stored student with exactly this `code`, if there is one.
    async fn get_by_code(&self, code: &str) -> Res<Option<StoredStudent>>;
}

/// A `StudentStore` that holds everything in memory. The whole collection is swapped under a single
/// write lock, so readers never see a partial batch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    students: RwLock<HashMap<String, StoredStudent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StudentStore for MemoryStore {
    async fn replace_all(&self, records: &[StudentRecord]) -> Res<usize> {
        let mut next = HashMap::with_capacity(records.len());
        for record in records {
            let stored = record.to_stored()?;
            next.insert(stored.unique_code.clone(), stored);
        }
        let count = next.len();
        *self.students.write().await = next;
        trace!("memory store now holds {count} students");
        Ok(count)
    }

    async fn get_by_code(&self, code: &str) -> Res<Option<StoredStudent>> {
        Ok(self.students.read().await.get(code).cloned())
    }
}
