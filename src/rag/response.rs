//! RAG response generation.

use crate::config::Prompts;
use crate::error::{KursError, Result};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, Generation, ToolChoice};
use crate::tools::{Source, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// RAG engine for question answering.
pub struct RagEngine {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    history_template: String,
}

impl RagEngine {
    /// Create a new RAG engine with the default prompts.
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>) -> Self {
        Self::with_prompts(model, tools, &Prompts::default())
    }

    /// Create a RAG engine with custom prompts (with user-defined variables).
    pub fn with_prompts(
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        prompts: &Prompts,
    ) -> Self {
        Self {
            model,
            tools,
            system_prompt: prompts.system_prompt(),
            history_template: prompts.assistant.history.clone(),
        }
    }

    /// Answer a question, given the formatted history of the session.
    #[instrument(skip(self, history), fields(model = %self.model.model()))]
    pub async fn answer(&self, query: &str, history: Option<&str>) -> Result<RagResponse> {
        info!("Processing question: {}", query);

        let system =
            Prompts::system_with_history(&self.system_prompt, &self.history_template, history);
        let mut messages = vec![ChatMessage::User(format!(
            "Answer this question about course materials: {}",
            query
        ))];

        let draft = ChatRequest::new(system.clone(), messages.clone())
            .with_tools(self.tools.definitions())
            .with_tool_choice(ToolChoice::Auto);

        let invocations = match self.model.generate(&draft).await? {
            Generation::Text(answer) => {
                debug!("Answered without tools");
                return Ok(RagResponse {
                    answer,
                    sources: Vec::new(),
                });
            }
            Generation::ToolCalls(invocations) => invocations,
        };

        let mut turn = self.tools.begin_turn();
        messages.push(ChatMessage::ToolCalls(invocations.clone()));
        for invocation in &invocations {
            let content = turn.execute(invocation).await?;
            messages.push(ChatMessage::ToolResult {
                invocation_id: invocation.id.clone(),
                content,
            });
        }

        let synthesis = ChatRequest::new(system, messages)
            .with_tools(self.tools.definitions())
            .with_tool_choice(ToolChoice::Disabled);

        let answer = match self.model.generate(&synthesis).await? {
            Generation::Text(answer) => answer,
            Generation::ToolCalls(_) => {
                return Err(KursError::Generation(
                    "Model requested tools after tools were disabled".to_string(),
                ))
            }
        };

        let sources = turn.take_sources();
        debug!(
            "Answered after {} tool calls with {} sources",
            invocations.len(),
            sources.len()
        );

        Ok(RagResponse { answer, sources })
    }
}

/// A RAG response with answer and sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagResponse {
    /// The generated answer.
    pub answer: String,
    /// Sources of the content the tools returned, empty when no tool ran.
    pub sources: Vec<Source>,
}

impl RagResponse {
    /// Format the response for display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for source in &self.sources {
                output.push_str(&format!("\n{}", source));
                if let Some(link) = &source.link {
                    output.push_str(&format!("\n  {}", link));
                }
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChatModel;
    use crate::tools::tests::{course_store, MCP_TITLE};
    use serde_json::json;

    async fn engine(model: Arc<ScriptedChatModel>) -> RagEngine {
        let tools = Arc::new(ToolRegistry::for_courses(course_store().await));
        RagEngine::new(model, tools)
    }

    #[tokio::test]
    async fn test_direct_answer_uses_one_call() {
        let model = Arc::new(ScriptedChatModel::new().then_text("Paris."));
        let engine = engine(model.clone()).await;

        let response = engine.answer("What is the capital of France?", None).await.unwrap();
        assert_eq!(response.answer, "Paris.");
        assert!(response.sources.is_empty());

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tool_choice, ToolChoice::Auto);
        assert_eq!(requests[0].tools.len(), 2);
        assert!(!requests[0].system.contains("Previous conversation"));
    }

    #[tokio::test]
    async fn test_tool_round_then_synthesis() {
        let model = Arc::new(
            ScriptedChatModel::new()
                .then_tool_call(
                    "call_7",
                    "search_course_content",
                    json!({"query": "servers", "course_name": "MCP", "lesson_number": 2}),
                )
                .then_text("Servers expose tools."),
        );
        let engine = engine(model.clone()).await;

        let response = engine.answer("What do MCP servers do?", None).await.unwrap();
        assert_eq!(response.answer, "Servers expose tools.");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].to_string(), format!("{} - Lesson 2", MCP_TITLE));

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        let synthesis = &requests[1];
        assert_eq!(synthesis.tool_choice, ToolChoice::Disabled);
        assert_eq!(synthesis.system, requests[0].system);
        assert_eq!(synthesis.messages.len(), 3);
        match &synthesis.messages[2] {
            ChatMessage::ToolResult { invocation_id, content } => {
                assert_eq!(invocation_id, "call_7");
                assert!(content.starts_with(&format!("[{} - Lesson 2]", MCP_TITLE)));
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_history_goes_into_system_prompt() {
        let model = Arc::new(ScriptedChatModel::new().then_text("Sure."));
        let engine = engine(model.clone()).await;

        engine
            .answer("And lesson 2?", Some("User: What is lesson 1?\nAssistant: An intro."))
            .await
            .unwrap();

        let system = &model.requests()[0].system;
        assert!(system.ends_with(
            "\n\nPrevious conversation:\nUser: What is lesson 1?\nAssistant: An intro."
        ));
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let model = Arc::new(
            ScriptedChatModel::new()
                .then_tool_call("call_1", "get_course_outline", json!({"course_name": "MCP"}))
                .then_error("rate limited"),
        );
        let engine = engine(model).await;

        let err = engine.answer("Outline MCP", None).await.unwrap_err();
        assert!(matches!(err, KursError::Generation(_)));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fatal() {
        let model = Arc::new(
            ScriptedChatModel::new()
                .then_tool_call("call_1", "drop_tables", json!({}))
                .then_text("unreachable"),
        );
        let engine = engine(model.clone()).await;

        let err = engine.answer("anything", None).await.unwrap_err();
        assert!(matches!(err, KursError::UnknownTool(_)));
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_calls_after_synthesis_are_rejected() {
        let model = Arc::new(
            ScriptedChatModel::new()
                .then_tool_call("call_1", "search_course_content", json!({"query": "x"}))
                .then_tool_call("call_2", "search_course_content", json!({"query": "y"})),
        );
        let engine = engine(model).await;
        assert!(engine.answer("loop?", None).await.is_err());
    }

    #[test]
    fn test_format_for_display() {
        let response = RagResponse {
            answer: "Answer.".to_string(),
            sources: vec![Source {
                course_title: "Rust".to_string(),
                lesson_number: Some(1),
                link: Some("https://example.com/rust/1".to_string()),
            }],
        };
        assert_eq!(
            response.format_for_display(),
            "Answer.\n\n--- Sources ---\n\nRust - Lesson 1\n  https://example.com/rust/1"
        );
    }
}
