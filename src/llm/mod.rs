//! Generative model capability.
//!
//! The engine talks to the model through [`ChatModel`]: a request carries the
//! system prompt, the conversation so far and the tool schemas; the model
//! answers either with text or with a set of tool invocations.

mod openai;

pub use openai::OpenAIChatModel;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Schema of a tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool arguments.
    pub parameters: serde_json::Value,
}

/// A model-issued request to run a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Identifier the tool result must be tagged with.
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

impl ToolInvocation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// A message in a generation request, after the system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    User(String),
    Assistant(String),
    /// The model's own tool-request message, echoed back on the second call.
    ToolCalls(Vec<ToolInvocation>),
    ToolResult { invocation_id: String, content: String },
}

/// Whether the model may request tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    /// The model decides between answering and calling tools.
    #[default]
    Auto,
    /// Tools are off; the model must answer with text.
    Disabled,
}

/// A single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system: system.into(),
            messages,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
        }
    }

    /// Offer tools to the model.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    /// Whether the model is allowed to answer with tool invocations.
    pub fn tools_enabled(&self) -> bool {
        self.tool_choice == ToolChoice::Auto && !self.tools.is_empty()
    }
}

/// What the model produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Text(String),
    ToolCalls(Vec<ToolInvocation>),
}

/// Trait for generative model implementations.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one generation call.
    async fn generate(&self, request: &ChatRequest) -> Result<Generation>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tools_enabled() {
        let tool = ToolDefinition {
            name: "search_course_content".to_string(),
            description: "Search".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };

        let request = ChatRequest::new("system", vec![ChatMessage::User("hi".to_string())]);
        assert!(!request.tools_enabled());

        let request = request.with_tools(vec![tool]);
        assert!(request.tools_enabled());

        let request = request.with_tool_choice(ToolChoice::Disabled);
        assert!(!request.tools_enabled());
    }
}
