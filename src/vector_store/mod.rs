//! Vector store abstraction for Kurs.
//!
//! Provides a trait-based interface over a vector database holding named
//! collections. Records carry free-form JSON metadata that queries can filter
//! on with equality predicates and their conjunction.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record metadata, stored alongside each embedding.
pub type Metadata = serde_json::Map<String, Value>;

/// The logical collections kept by Kurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// One entry per course, embedded on the title.
    Catalog,
    /// One entry per chunk, embedded on the prefixed chunk text.
    Content,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Catalog => "course_catalog",
            Collection::Content => "course_content",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique id within the collection.
    pub id: String,
    /// The text that was embedded.
    pub document: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

impl Record {
    pub fn new(id: impl Into<String>, document: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            document: document.into(),
            metadata: Metadata::new(),
            embedding,
        }
    }

    /// Attach a metadata value.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }
}

/// Metadata predicate applied before ranking.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    /// The metadata value under `key` equals `value`.
    Eq { key: String, value: Value },
    /// Every inner filter matches.
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    pub fn eq(key: &str, value: impl Into<Value>) -> Self {
        MetadataFilter::Eq {
            key: key.to_string(),
            value: value.into(),
        }
    }

    /// Check whether a record's metadata satisfies this filter.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            MetadataFilter::Eq { key, value } => metadata.get(key) == Some(value),
            MetadataFilter::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}

/// A query match with its distance (lower is closer).
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub record: Record,
    pub distance: f32,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records by id. Returns the number written.
    async fn upsert(&self, collection: Collection, records: &[Record]) -> Result<usize>;

    /// Nearest neighbours of `embedding`, ordered by ascending distance.
    async fn query(
        &self,
        collection: Collection,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>>;

    /// Fetch a record by id.
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>>;

    /// All record ids in a collection.
    async fn ids(&self, collection: Collection) -> Result<Vec<String>>;

    /// Number of records in a collection.
    async fn count(&self, collection: Collection) -> Result<usize>;

    /// Delete the records matching `filter`. Returns the number removed.
    async fn delete_where(&self, collection: Collection, filter: &MetadataFilter) -> Result<usize>;

    /// Remove every record in a collection.
    async fn clear(&self, collection: Collection) -> Result<()>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Rank records against a query embedding, closest first.
pub(crate) fn rank<'a>(
    records: impl Iterator<Item = &'a Record>,
    embedding: &[f32],
    limit: usize,
    filter: Option<&MetadataFilter>,
) -> Vec<QueryHit> {
    let mut hits: Vec<QueryHit> = records
        .filter(|r| filter.map_or(true, |f| f.matches(&r.metadata)))
        .map(|r| QueryHit {
            distance: cosine_distance(embedding, &r.embedding),
            record: r.clone(),
        })
        .collect();

    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    hits.truncate(limit);
    hits
}
