//! Deterministic in-process doubles for the external capabilities.

use crate::embedding::Embedder;
use crate::error::{KursError, Result};
use crate::llm::{ChatModel, ChatRequest, Generation, ToolInvocation};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// Bag-of-words embedder: each lowercase word is hashed into a bucket.
///
/// Texts sharing words end up close; texts with no words in common are
/// orthogonal unless two words collide.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimensions: 512 }
    }
}

impl HashingEmbedder {
    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() as usize) % self.dimensions] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Chat model replaying a queue of canned generations.
///
/// Every request is recorded so tests can inspect what the engine sent.
#[derive(Default)]
pub struct ScriptedChatModel {
    script: Mutex<VecDeque<Result<Generation>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_text(self, text: &str) -> Self {
        self.push(Ok(Generation::Text(text.to_string())))
    }

    pub fn then_tool_call(self, id: &str, name: &str, arguments: serde_json::Value) -> Self {
        self.push(Ok(Generation::ToolCalls(vec![ToolInvocation::new(
            id,
            name,
            arguments.to_string(),
        )])))
    }

    pub fn then_error(self, message: &str) -> Self {
        self.push(Err(KursError::Generation(message.to_string())))
    }

    fn push(self, generation: Result<Generation>) -> Self {
        self.script.lock().unwrap().push_back(generation);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn generate(&self, request: &ChatRequest) -> Result<Generation> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(KursError::Generation("script exhausted".to_string())))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
