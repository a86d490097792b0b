//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! Metadata is stored as a JSON column and filtered after loading.

use super::{rank, Collection, Metadata, MetadataFilter, QueryHit, Record, VectorStore};
use crate::error::{KursError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    document TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) a SQLite vector store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| KursError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    /// Load every record of a collection.
    fn load(conn: &Connection, collection: Collection) -> Result<Vec<Record>> {
        let mut stmt = conn.prepare(
            "SELECT id, document, metadata, embedding FROM records WHERE collection = ?1",
        )?;

        let rows = stmt.query_map(params![collection.as_str()], |row| {
            let metadata_json: String = row.get(2)?;
            let embedding_bytes: Vec<u8> = row.get(3)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                metadata_json,
                embedding_bytes,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, document, metadata_json, embedding_bytes) = row?;
            let metadata: Metadata = serde_json::from_str(&metadata_json)?;
            records.push(Record {
                id,
                document,
                metadata,
                embedding: Self::bytes_to_embedding(&embedding_bytes),
            });
        }
        Ok(records)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, collection: Collection, records: &[Record]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let indexed_at = Utc::now().to_rfc3339();

        for record in records {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO records
                (collection, id, document, metadata, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    collection.as_str(),
                    record.id,
                    record.document,
                    serde_json::to_string(&record.metadata)?,
                    Self::embedding_to_bytes(&record.embedding),
                    indexed_at,
                ],
            )?;
        }

        tx.commit()?;
        debug!("Upserted {} records into {}", records.len(), collection);
        Ok(records.len())
    }

    #[instrument(skip(self, embedding, filter))]
    async fn query(
        &self,
        collection: Collection,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>> {
        let conn = self.lock()?;
        let records = Self::load(&conn, collection)?;
        let hits = rank(records.iter(), embedding, limit, filter);
        debug!("Found {} matching records in {}", hits.len(), collection);
        Ok(hits)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        let conn = self.lock()?;
        let row = conn.query_row(
            "SELECT document, metadata, embedding FROM records WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            },
        );

        match row {
            Ok((document, metadata_json, embedding_bytes)) => Ok(Some(Record {
                id: id.to_string(),
                document,
                metadata: serde_json::from_str(&metadata_json)?,
                embedding: Self::bytes_to_embedding(&embedding_bytes),
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn ids(&self, collection: Collection) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id FROM records WHERE collection = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![collection.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    async fn count(&self, collection: Collection) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![collection.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    #[instrument(skip(self, filter))]
    async fn delete_where(&self, collection: Collection, filter: &MetadataFilter) -> Result<usize> {
        let conn = self.lock()?;
        let doomed: Vec<String> = Self::load(&conn, collection)?
            .into_iter()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| r.id)
            .collect();

        let tx = conn.unchecked_transaction()?;
        for id in &doomed {
            tx.execute(
                "DELETE FROM records WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
            )?;
        }
        tx.commit()?;

        info!("Deleted {} records from {}", doomed.len(), collection);
        Ok(doomed.len())
    }

    async fn clear(&self, collection: Collection) -> Result<()> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM records WHERE collection = ?1",
            params![collection.as_str()],
        )?;
        info!("Cleared {} records from {}", deleted, collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = SqliteVectorStore::in_memory().unwrap();

        let content = "Course Rust 101 Lesson 1 content: hi";
        let record = Record::new("Rust 101#0", content, vec![1.0, 0.0, 0.0])
            .with_metadata("course_title", "Rust 101")
            .with_metadata("lesson_number", 1);

        store.upsert(Collection::Content, &[record.clone()]).await.unwrap();
        assert_eq!(store.count(Collection::Content).await.unwrap(), 1);
        assert_eq!(store.count(Collection::Catalog).await.unwrap(), 0);

        let fetched = store.get(Collection::Content, "Rust 101#0").await.unwrap().unwrap();
        assert_eq!(fetched, record);

        let results = store
            .query(Collection::Content, &[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].distance.abs() < 0.001);

        let miss = MetadataFilter::eq("lesson_number", 2);
        let results = store
            .query(Collection::Content, &[1.0, 0.0, 0.0], 10, Some(&miss))
            .await
            .unwrap();
        assert!(results.is_empty());

        let deleted = store
            .delete_where(Collection::Content, &MetadataFilter::eq("course_title", "Rust 101"))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.ids(Collection::Content).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vectors.db");

        {
            let store = SqliteVectorStore::new(&path).unwrap();
            let record = Record::new("Rust 101", "Rust 101", vec![0.5, 0.5])
                .with_metadata("title", "Rust 101");
            store.upsert(Collection::Catalog, &[record]).await.unwrap();
        }

        let store = SqliteVectorStore::new(&path).unwrap();
        assert_eq!(store.ids(Collection::Catalog).await.unwrap(), vec!["Rust 101".to_string()]);

        store.clear(Collection::Catalog).await.unwrap();
        assert_eq!(store.count(Collection::Catalog).await.unwrap(), 0);
    }
}
