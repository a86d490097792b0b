//! Tool-calling question answering over the course knowledge base.
//!
//! One query is at most two generation calls. The draft call offers the
//! tools; if the model asks for any, they run once and a second call with
//! tools disabled produces the final answer.

mod response;

pub use response::{RagEngine, RagResponse};
