//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{rank, Collection, MetadataFilter, QueryHit, Record, VectorStore};
use crate::error::{KursError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Collections = HashMap<Collection, HashMap<String, Record>>;

/// In-memory vector store.
pub struct MemoryVectorStore {
    collections: RwLock<Collections>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|e| KursError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|e| KursError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, collection: Collection, records: &[Record]) -> Result<usize> {
        let mut store = self.write()?;
        let entries = store.entry(collection).or_default();
        for record in records {
            entries.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn query(
        &self,
        collection: Collection,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>> {
        let store = self.read()?;
        Ok(match store.get(&collection) {
            Some(entries) => rank(entries.values(), embedding, limit, filter),
            None => Vec::new(),
        })
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        let store = self.read()?;
        Ok(store.get(&collection).and_then(|e| e.get(id)).cloned())
    }

    async fn ids(&self, collection: Collection) -> Result<Vec<String>> {
        let store = self.read()?;
        let mut ids: Vec<String> = store
            .get(&collection)
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }

    async fn count(&self, collection: Collection) -> Result<usize> {
        let store = self.read()?;
        Ok(store.get(&collection).map_or(0, HashMap::len))
    }

    async fn delete_where(&self, collection: Collection, filter: &MetadataFilter) -> Result<usize> {
        let mut store = self.write()?;
        let Some(entries) = store.get_mut(&collection) else {
            return Ok(0);
        };
        let initial_len = entries.len();
        entries.retain(|_, r| !filter.matches(&r.metadata));
        Ok(initial_len - entries.len())
    }

    async fn clear(&self, collection: Collection) -> Result<()> {
        self.write()?.remove(&collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new();

        let a = Record::new("a", "Hello world", vec![1.0, 0.0, 0.0])
            .with_metadata("course_title", "A");
        let b = Record::new("b", "Goodbye world", vec![0.0, 1.0, 0.0])
            .with_metadata("course_title", "B");

        store.upsert(Collection::Content, &[a, b]).await.unwrap();
        assert_eq!(store.count(Collection::Content).await.unwrap(), 2);
        assert_eq!(store.count(Collection::Catalog).await.unwrap(), 0);

        let results = store
            .query(Collection::Content, &[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.id, "a");
        assert!(results[0].distance < results[1].distance);

        let filter = MetadataFilter::eq("course_title", "B");
        let results = store
            .query(Collection::Content, &[1.0, 0.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, "b");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = MemoryVectorStore::new();
        let first = Record::new("x", "first", vec![1.0]);
        let second = Record::new("x", "second", vec![1.0]);

        store.upsert(Collection::Catalog, &[first]).await.unwrap();
        store.upsert(Collection::Catalog, &[second]).await.unwrap();

        assert_eq!(store.count(Collection::Catalog).await.unwrap(), 1);
        let record = store.get(Collection::Catalog, "x").await.unwrap().unwrap();
        assert_eq!(record.document, "second");
    }

    #[tokio::test]
    async fn test_delete_where_and_clear() {
        let store = MemoryVectorStore::new();
        let records = vec![
            Record::new("1", "", vec![1.0]).with_metadata("course_title", "A"),
            Record::new("2", "", vec![1.0]).with_metadata("course_title", "A"),
            Record::new("3", "", vec![1.0]).with_metadata("course_title", "B"),
        ];
        store.upsert(Collection::Content, &records).await.unwrap();

        let removed = store
            .delete_where(Collection::Content, &MetadataFilter::eq("course_title", "A"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.ids(Collection::Content).await.unwrap(), vec!["3".to_string()]);

        store.clear(Collection::Content).await.unwrap();
        assert_eq!(store.count(Collection::Content).await.unwrap(), 0);
    }
}
