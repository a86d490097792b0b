//! Top-level coordinator for Kurs.
//!
//! Wires settings into the components, ingests course documents and answers
//! queries within conversation sessions.

use crate::chunking::{Course, CourseChunk, DocumentProcessor};
use crate::config::{Prompts, Settings, VectorStoreProvider};
use crate::course_store::{CourseAnalytics, CourseStore, SearchResults};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{KursError, Result};
use crate::llm::{ChatModel, OpenAIChatModel};
use crate::rag::RagEngine;
use crate::session::SessionManager;
use crate::tools::{Source, ToolRegistry};
use crate::vector_store::{MemoryVectorStore, SqliteVectorStore, VectorStore};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// A question, optionally continuing an existing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            session_id: None,
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Answer to a [`QueryRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    /// Display labels such as `"Course - Lesson 2"`, in citation order.
    pub sources: Vec<String>,
    /// The same citations with their links.
    #[serde(default)]
    pub citations: Vec<Source>,
    /// The session the exchange was recorded in.
    pub session_id: String,
}

/// Result of ingesting one course document.
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub course: Course,
    pub chunks_added: usize,
}

/// The main orchestrator for Kurs.
pub struct Orchestrator {
    settings: Settings,
    processor: DocumentProcessor,
    course_store: Arc<CourseStore>,
    rag: RagEngine,
    sessions: SessionManager,
    /// Titles currently being ingested.
    in_flight: Mutex<HashSet<String>>,
}

impl Orchestrator {
    /// Create an orchestrator backed by OpenAI and the configured vector store.
    pub fn new(settings: Settings) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?);

        let vector_store: Arc<dyn VectorStore> = match settings.vector_store.provider {
            VectorStoreProvider::Sqlite => {
                Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?)
            }
            VectorStoreProvider::Memory => Arc::new(MemoryVectorStore::new()),
        };

        let model: Arc<dyn ChatModel> = Arc::new(
            OpenAIChatModel::new(&settings.rag.model)?
                .with_temperature(settings.rag.temperature)
                .with_max_tokens(settings.rag.max_tokens),
        );

        info!(
            "Using {} vector store with {} and {}",
            settings.vector_store.provider, settings.embedding.model, settings.rag.model
        );

        Self::with_components(settings, vector_store, embedder, model)
    }

    /// Create an orchestrator from already-built capabilities.
    pub fn with_components(
        settings: Settings,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let processor = DocumentProcessor::new(settings.chunking_config()?);

        let course_store = Arc::new(
            CourseStore::new(vector_store, embedder)
                .with_max_results(settings.vector_store.max_results)
                .with_max_resolution_distance(settings.vector_store.max_resolution_distance),
        );
        let tools = Arc::new(ToolRegistry::for_courses(course_store.clone()));
        let rag = RagEngine::with_prompts(model, tools, &prompts);
        let sessions = SessionManager::new(settings.rag.max_history);

        Ok(Self {
            settings,
            processor,
            course_store,
            rag,
            sessions,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn course_store(&self) -> &CourseStore {
        &self.course_store
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Ingest a course document from disk.
    ///
    /// Returns `None` when a course with the same title is already stored.
    #[instrument(skip(self))]
    pub async fn add_course_document(&self, path: &Path) -> Result<Option<IngestResult>> {
        let text = tokio::fs::read_to_string(path).await?;
        self.add_course_text(&text).await
    }

    /// Ingest a course document from its raw text.
    pub async fn add_course_text(&self, text: &str) -> Result<Option<IngestResult>> {
        let (course, chunks) = self.processor.process(text)?;
        let title = course.title.clone();

        {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight.contains(&title) || self.course_store.contains_course(&title).await? {
                info!("Course '{}' already exists, skipping", title);
                return Ok(None);
            }
            in_flight.insert(title.clone());
        }

        let stored = self.store_course(&course, &chunks).await;
        self.in_flight.lock().await.remove(&title);
        let chunks_added = stored?;

        info!("Added course '{}' with {} chunks", title, chunks_added);
        Ok(Some(IngestResult {
            course,
            chunks_added,
        }))
    }

    async fn store_course(&self, course: &Course, chunks: &[CourseChunk]) -> Result<usize> {
        let added = self.course_store.add_course_content(chunks).await?;
        // Catalog entry last: a course is only visible once its chunks are in.
        self.course_store.add_course_metadata(course).await?;
        Ok(added)
    }

    /// Ingest every `.txt` document in a folder.
    ///
    /// With `clear` set both collections are emptied first. Documents that
    /// fail to parse are logged and skipped. Returns `(courses_added, chunks_added)`.
    #[instrument(skip(self))]
    pub async fn add_course_folder(&self, dir: &Path, clear: bool) -> Result<(usize, usize)> {
        if !dir.is_dir() {
            return Err(KursError::InvalidInput(format!(
                "Not a directory: {}",
                dir.display()
            )));
        }

        if clear {
            info!("Clearing existing course data");
            self.course_store.clear().await?;
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file() && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
            })
            .collect();
        paths.sort();

        info!("Ingesting {} documents from {}", paths.len(), dir.display());

        let results = join_all(paths.iter().map(|path| self.add_course_document(path))).await;

        let mut courses_added = 0;
        let mut chunks_added = 0;
        for (path, result) in paths.iter().zip(results) {
            match result {
                Ok(Some(ingested)) => {
                    courses_added += 1;
                    chunks_added += ingested.chunks_added;
                }
                Ok(None) => {}
                Err(e @ (KursError::Parse(_) | KursError::Io(_))) => {
                    warn!("Skipping {}: {}", path.display(), e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok((courses_added, chunks_added))
    }

    /// Answer a question, creating a session when none is given.
    #[instrument(skip(self, request), fields(session = ?request.session_id))]
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(KursError::InvalidInput("query must not be empty".to_string()));
        }

        let session_id = match request.session_id {
            Some(id) if self.sessions.contains(&id).await => id,
            Some(id) => {
                debug!("Unknown session {}, starting a new one", id);
                self.sessions.create_session().await
            }
            None => self.sessions.create_session().await,
        };

        let history = self.sessions.formatted_history(&session_id).await;
        let response = self.rag.answer(query, history.as_deref()).await?;

        self.sessions
            .add_exchange(&session_id, query, &response.answer)
            .await;

        Ok(QueryResponse {
            answer: response.answer,
            sources: response.sources.iter().map(ToString::to_string).collect(),
            citations: response.sources,
            session_id,
        })
    }

    /// Search course content directly, without the model.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<SearchResults> {
        self.course_store.search(query, course_name, lesson_number).await
    }

    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        self.course_store.analytics().await
    }

    /// Forget a session's history.
    pub async fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.clear_session(session_id).await
    }
}
