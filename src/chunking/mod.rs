//! Course document chunking.
//!
//! Turns one course's raw structured text into context-prefixed chunks ready
//! for embedding. Parsing lives in `document`, sentence-aware splitting in
//! `sentence`.

mod document;
mod sentence;

pub use document::{parse_course_document, LessonSection, ParsedDocument};
pub use sentence::{ChunkSpan, SentenceSplitter};

use crate::error::{KursError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// A course parsed from a transcript document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Course title, the sole identity key.
    pub title: String,
    /// Instructor name.
    pub instructor: Option<String>,
    /// Link to the course page.
    pub source_link: Option<String>,
    /// Lessons ordered by number.
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Look up a lesson by its number.
    pub fn lesson(&self, number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.number == number)
    }

    /// Link for a lesson, falling back to the course link.
    pub fn link_for(&self, lesson_number: Option<u32>) -> Option<&str> {
        lesson_number
            .and_then(|n| self.lesson(n))
            .and_then(|l| l.link.as_deref())
            .or(self.source_link.as_deref())
    }
}

/// A single lesson inside a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub number: u32,
    pub title: String,
    pub link: Option<String>,
}

/// A retrievable slice of lesson text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseChunk {
    /// Context header followed by the raw lesson slice.
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    /// Ordinal across the whole course, never reset per lesson.
    pub chunk_index: usize,
}

impl CourseChunk {
    /// The original lesson text with the context header removed.
    pub fn body(&self) -> &str {
        strip_context_header(&self.content, &self.course_title, self.lesson_number)
    }

    /// Stable identifier in the content index.
    ///
    /// The title is kept verbatim; the index after the last `#` never
    /// contains one, so distinct titles never share an id.
    pub fn id(&self) -> String {
        format!("{}#{}", self.course_title, self.chunk_index)
    }
}

/// Build the header every chunk text starts with.
pub fn context_header(course_title: &str, lesson_number: Option<u32>) -> String {
    match lesson_number {
        Some(n) => format!("Course {} Lesson {} content: ", course_title, n),
        None => format!("Course {} content: ", course_title),
    }
}

/// Remove the context header from a chunk text, if present.
pub fn strip_context_header<'a>(
    content: &'a str,
    course_title: &str,
    lesson_number: Option<u32>,
) -> &'a str {
    let header = context_header(course_title, lesson_number);
    content.strip_prefix(header.as_str()).unwrap_or(content)
}

/// Chunk size and overlap, both measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkingConfig {
    /// Create a config, rejecting an overlap that is not smaller than the size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(KursError::Config("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(KursError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

/// Parses course documents and splits their lessons into chunks.
pub struct DocumentProcessor {
    config: ChunkingConfig,
    splitter: SentenceSplitter,
}

impl DocumentProcessor {
    /// Create a processor with the given chunking config.
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            config,
            splitter: SentenceSplitter::new(),
        }
    }

    /// Parse a course document and chunk every lesson in order.
    #[instrument(skip_all)]
    pub fn process(&self, text: &str) -> Result<(Course, Vec<CourseChunk>)> {
        let parsed = parse_course_document(text)?;
        let mut chunks = Vec::new();

        for section in &parsed.sections {
            let header = context_header(&parsed.course.title, section.number);
            for span in self.splitter.split(&section.body, &self.config) {
                chunks.push(CourseChunk {
                    content: format!("{}{}", header, span.text(&section.body)),
                    course_title: parsed.course.title.clone(),
                    lesson_number: section.number,
                    chunk_index: chunks.len(),
                });
            }
        }

        debug!(
            "Chunked '{}' into {} chunks across {} sections",
            parsed.course.title,
            chunks.len(),
            parsed.sections.len()
        );

        Ok((parsed.course, chunks))
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}
