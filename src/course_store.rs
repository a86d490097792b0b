//! Course-aware facade over the vector store.
//!
//! Keeps two separate collections: a catalog with one entry per course,
//! embedded on the title, used to resolve fuzzy course names; and the content
//! index holding every chunk. Resolution and content search never share
//! scores.

use crate::chunking::{Course, CourseChunk, Lesson};
use crate::embedding::Embedder;
use crate::error::{KursError, Result};
use crate::vector_store::{Collection, MetadataFilter, Record, VectorStore};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default maximum number of chunks returned by a search.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Exact-match constraints for a content search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

impl SearchFilter {
    /// Build the vector store filter, or `None` to search everything.
    pub fn to_metadata_filter(&self) -> Option<MetadataFilter> {
        let course = self
            .course_title
            .as_ref()
            .map(|t| MetadataFilter::eq("course_title", t.as_str()));
        let lesson = self
            .lesson_number
            .map(|n| MetadataFilter::eq("lesson_number", n));

        match (course, lesson) {
            (Some(c), Some(l)) => Some(MetadataFilter::And(vec![c, l])),
            (Some(c), None) => Some(c),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        }
    }
}

/// A chunk returned by a content search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: CourseChunk,
    pub distance: f32,
}

/// Outcome of a content search.
///
/// A failed course resolution is not an error: it is carried in `error` so
/// the caller can show it to the model as an ordinary result.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub error: Option<String>,
}

impl SearchResults {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Catalog summary across all ingested courses.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// Facade resolving course names and running filtered semantic search.
pub struct CourseStore {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    max_resolution_distance: Option<f32>,
}

impl CourseStore {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            max_results: DEFAULT_MAX_RESULTS,
            max_resolution_distance: None,
        }
    }

    /// Set the maximum number of search results.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Reject course resolutions farther than `distance`.
    ///
    /// Without a threshold the nearest catalog entry is always accepted.
    pub fn with_max_resolution_distance(mut self, distance: Option<f32>) -> Self {
        self.max_resolution_distance = distance;
        self
    }


    /// Map a possibly partial course name to the exact stored title.
    #[instrument(skip(self))]
    pub async fn resolve_course(&self, name: &str) -> Result<Option<String>> {
        let embedding = self.embedder.embed(name).await?;
        let hits = self
            .store
            .query(Collection::Catalog, &embedding, 1, None)
            .await?;

        let Some(best) = hits.into_iter().next() else {
            return Ok(None);
        };

        if let Some(max) = self.max_resolution_distance {
            if best.distance > max {
                debug!(
                    "Nearest course '{}' at distance {:.3} exceeds threshold {:.3}",
                    best.record.id, best.distance, max
                );
                return Ok(None);
            }
        }

        Ok(best
            .record
            .metadata_str("title")
            .map(str::to_string)
            .or(Some(best.record.id)))
    }

    /// Semantic search over chunk content with optional course and lesson filters.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<SearchResults> {
        let mut filter = SearchFilter {
            course_title: None,
            lesson_number,
        };

        if let Some(name) = course_name {
            match self.resolve_course(name).await? {
                Some(title) => filter.course_title = Some(title),
                None => {
                    return Ok(SearchResults::from_error(format!(
                        "No course found matching '{}'",
                        name
                    )))
                }
            }
        }

        let embedding = self.embedder.embed(query).await?;
        let metadata_filter = filter.to_metadata_filter();
        let hits = self
            .store
            .query(
                Collection::Content,
                &embedding,
                self.max_results,
                metadata_filter.as_ref(),
            )
            .await?;

        let hits = hits
            .into_iter()
            .map(|hit| SearchHit {
                chunk: CourseChunk {
                    course_title: hit
                        .record
                        .metadata_str("course_title")
                        .unwrap_or_default()
                        .to_string(),
                    lesson_number: hit.record.metadata_u64("lesson_number").map(|n| n as u32),
                    chunk_index: hit
                        .record
                        .metadata_u64("chunk_index")
                        .unwrap_or_default() as usize,
                    content: hit.record.document,
                },
                distance: hit.distance,
            })
            .collect::<Vec<_>>();

        debug!("Search returned {} chunks", hits.len());
        Ok(SearchResults { hits, error: None })
    }

    /// Add a course to the catalog, embedded on its title.
    #[instrument(skip(self, course), fields(title = %course.title))]
    pub async fn add_course_metadata(&self, course: &Course) -> Result<()> {
        let embedding = self.embedder.embed(&course.title).await?;
        let mut record = Record::new(course.title.clone(), course.title.clone(), embedding)
            .with_metadata("title", course.title.as_str())
            .with_metadata("lesson_count", course.lessons.len())
            .with_metadata("lessons_json", serde_json::to_string(&course.lessons)?);
        if let Some(instructor) = &course.instructor {
            record = record.with_metadata("instructor", instructor.as_str());
        }
        if let Some(link) = &course.source_link {
            record = record.with_metadata("course_link", link.as_str());
        }

        self.store.upsert(Collection::Catalog, &[record]).await?;
        Ok(())
    }

    /// Embed and store all chunks of a course.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(KursError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let records: Vec<Record> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let record = Record::new(chunk.id(), chunk.content.clone(), embedding)
                    .with_metadata("course_title", chunk.course_title.as_str())
                    .with_metadata("chunk_index", chunk.chunk_index);
                match chunk.lesson_number {
                    Some(n) => record.with_metadata("lesson_number", n),
                    None => record,
                }
            })
            .collect();

        let count = self.store.upsert(Collection::Content, &records).await?;
        info!("Indexed {} chunks", count);
        Ok(count)
    }

    /// Titles of every course in the catalog.
    pub async fn existing_course_titles(&self) -> Result<Vec<String>> {
        self.store.ids(Collection::Catalog).await
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.count(Collection::Content).await
    }

    /// Whether a course with exactly this title is already stored.
    pub async fn contains_course(&self, title: &str) -> Result<bool> {
        Ok(self.store.get(Collection::Catalog, title).await?.is_some())
    }

    /// Rebuild a course's metadata from its catalog entry.
    pub async fn course_outline(&self, title: &str) -> Result<Option<Course>> {
        let Some(record) = self.store.get(Collection::Catalog, title).await? else {
            return Ok(None);
        };

        let lessons: Vec<Lesson> = match record.metadata_str("lessons_json") {
            Some(json) => serde_json::from_str(json)?,
            None => Vec::new(),
        };

        Ok(Some(Course {
            title: record.metadata_str("title").unwrap_or(&record.id).to_string(),
            instructor: record.metadata_str("instructor").map(str::to_string),
            source_link: record.metadata_str("course_link").map(str::to_string),
            lessons,
        }))
    }

    pub async fn analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.existing_course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }

    /// Remove a course and all of its chunks.
    pub async fn remove_course(&self, title: &str) -> Result<usize> {
        let removed = self
            .store
            .delete_where(Collection::Content, &MetadataFilter::eq("course_title", title))
            .await?;
        self.store
            .delete_where(Collection::Catalog, &MetadataFilter::eq("title", title))
            .await?;
        info!("Removed course '{}' ({} chunks)", title, removed);
        Ok(removed)
    }

    /// Drop both collections.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear(Collection::Catalog).await?;
        self.store.clear(Collection::Content).await?;
        info!("Cleared course catalog and content");
        Ok(())
    }
}
