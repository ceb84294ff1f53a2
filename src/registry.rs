//! File registry boundary: the external store of ingested file paths and ids.
//!
//! The relational registry is an external collaborator — this crate only
//! specifies its interface and provides an in-memory reference
//! implementation used by tests and the CLI. Injecting the trait (rather
//! than reaching for a global repository singleton) keeps the upload path's
//! all-or-nothing contract testable.

use crate::error::KbError;
use crate::types::FileRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Stores the id ↔ path mapping for ingested files.
#[async_trait]
pub trait FileRegistry: Send + Sync {
    /// Register a newly ingested file, returning its assigned id.
    async fn save(&self, path: &Path) -> Result<u64, KbError>;

    /// Fetch records by id; an empty filter returns every record.
    async fn list(&self, ids: &[u64]) -> Result<Vec<FileRecord>, KbError>;
}

/// In-memory [`FileRegistry`] with monotonically assigned ids.
#[derive(Default)]
pub struct InMemoryRegistry {
    inner: RwLock<Vec<FileRecord>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered files.
    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[async_trait]
impl FileRegistry for InMemoryRegistry {
    async fn save(&self, path: &Path) -> Result<u64, KbError> {
        let mut records = self.inner.write().await;
        let id = records.len() as u64 + 1;
        records.push(FileRecord {
            id,
            path: PathBuf::from(path),
            content: None,
        });
        Ok(id)
    }

    async fn list(&self, ids: &[u64]) -> Result<Vec<FileRecord>, KbError> {
        let records = self.inner.read().await;
        if ids.is_empty() {
            return Ok(records.clone());
        }
        Ok(records
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_assigned_monotonically() {
        let registry = InMemoryRegistry::new();
        let first = registry.save(Path::new("/data/a.pdf")).await.unwrap();
        let second = registry.save(Path::new("/data/b.pdf")).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn empty_filter_lists_everything() {
        let registry = InMemoryRegistry::new();
        registry.save(Path::new("/data/a.pdf")).await.unwrap();
        registry.save(Path::new("/data/b.pdf")).await.unwrap();

        let all = registry.list(&[]).await.unwrap();
        assert_eq!(all.len(), 2);

        let filtered = registry.list(&[2]).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].path, PathBuf::from("/data/b.pdf"));
    }

    #[tokio::test]
    async fn unknown_ids_yield_no_records() {
        let registry = InMemoryRegistry::new();
        registry.save(Path::new("/data/a.pdf")).await.unwrap();
        let none = registry.list(&[99]).await.unwrap();
        assert!(none.is_empty());
    }
}
