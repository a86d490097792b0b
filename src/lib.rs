//! Kurs - Course transcript question answering
//!
//! A tool-calling retrieval engine over structured course transcripts.
//!
//! # Overview
//!
//! Kurs allows you to:
//! - Ingest course documents into a searchable vector database
//! - Resolve fuzzy course names ("MCP") to exact course titles
//! - Ask questions and get answers from a model that searches when it needs to
//! - Keep short per-session conversation history
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `chunking` - Course document parsing and sentence-aware chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction
//! - `course_store` - Course catalog and content search on top of the vector store
//! - `llm` - Generative model abstraction
//! - `tools` - Tools the model can call
//! - `session` - Conversation history
//! - `rag` - Two-stage tool-calling question answering
//! - `orchestrator` - Component wiring, ingestion and queries
//!
//! # Example
//!
//! ```rust,no_run
//! use kurs::config::Settings;
//! use kurs::orchestrator::{Orchestrator, QueryRequest};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let (courses, chunks) = orchestrator.add_course_folder(Path::new("docs"), false).await?;
//!     println!("Indexed {} courses ({} chunks)", courses, chunks);
//!
//!     let request = QueryRequest::new("What is covered in lesson 1 of MCP?");
//!     let response = orchestrator.query(request).await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod course_store;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod session;
pub mod tools;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{KursError, Result};
