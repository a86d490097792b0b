//! Tools the model can call while answering a question.
//!
//! The set of tools is closed and registered at startup. A [`ToolRegistry`]
//! is shared by every query; each query opens its own [`ToolTurn`], which
//! dispatches invocations and collects the sources they produced, so
//! concurrent queries never see each other's sources.

mod outline;
mod search;

pub use outline::CourseOutlineTool;
pub use search::CourseSearchTool;

use crate::course_store::CourseStore;
use crate::error::{KursError, Result};
use crate::llm::{ToolDefinition, ToolInvocation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Citation for content a tool returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    /// Lesson link, or the course link when the lesson has none.
    pub link: Option<String>,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.lesson_number {
            Some(n) => write!(f, "{} - Lesson {}", self.course_title, n),
            None => f.write_str(&self.course_title),
        }
    }
}

/// Result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Text handed back to the model.
    pub content: String,
    pub sources: Vec<Source>,
}

impl ToolOutput {
    /// Output without sources, used for soft failures.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
        }
    }
}

/// The available tools.
pub enum Tool {
    Search(CourseSearchTool),
    Outline(CourseOutlineTool),
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Search(_) => CourseSearchTool::NAME,
            Tool::Outline(_) => CourseOutlineTool::NAME,
        }
    }

    /// Schema offered to the model.
    pub fn definition(&self) -> ToolDefinition {
        match self {
            Tool::Search(tool) => tool.definition(),
            Tool::Outline(tool) => tool.definition(),
        }
    }

    /// Run the tool with the model's raw JSON arguments.
    pub async fn execute(&self, arguments: &str) -> Result<ToolOutput> {
        match self {
            Tool::Search(tool) => tool.execute(arguments).await,
            Tool::Outline(tool) => tool.execute(arguments).await,
        }
    }
}

/// Decode tool arguments, mapping failures to [`KursError::InvalidToolArguments`].
pub(crate) fn parse_arguments<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T> {
    let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(arguments).map_err(|e| KursError::InvalidToolArguments(e.to_string()))
}

/// Name to tool lookup table.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every course tool wired to `store`.
    pub fn for_courses(store: Arc<CourseStore>) -> Self {
        let mut registry = Self::new();
        registry.register(Tool::Search(CourseSearchTool::new(store.clone())));
        registry.register(Tool::Outline(CourseOutlineTool::new(store)));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Tool) {
        let name = tool.name();
        match self.index.get(name) {
            Some(&i) => self.tools[i] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
        debug!("Registered tool {}", name);
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Schemas of all registered tools, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(Tool::definition).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Start collecting sources for a new query.
    pub fn begin_turn(&self) -> ToolTurn<'_> {
        ToolTurn {
            registry: self,
            sources: Vec::new(),
        }
    }
}

/// Dispatcher scoped to a single query.
pub struct ToolTurn<'a> {
    registry: &'a ToolRegistry,
    /// Latest sources per tool, in order of first invocation.
    sources: Vec<(&'static str, Vec<Source>)>,
}

impl ToolTurn<'_> {
    /// Run a model-issued invocation and return the text for the model.
    ///
    /// Undecodable arguments come back as text so the model can see them. An
    /// unregistered tool name means the schemas and the registry disagree and
    /// is returned as [`KursError::UnknownTool`].
    pub async fn execute(&mut self, invocation: &ToolInvocation) -> Result<String> {
        let tool = self
            .registry
            .get(&invocation.name)
            .ok_or_else(|| KursError::UnknownTool(invocation.name.clone()))?;

        info!("Calling tool {} with args: {}", invocation.name, invocation.arguments);

        let output = match tool.execute(&invocation.arguments).await {
            Ok(output) => output,
            Err(KursError::InvalidToolArguments(e)) => {
                return Ok(format!("Failed to parse tool call: {}", e));
            }
            Err(e) => return Err(e),
        };

        let name = tool.name();
        match self.sources.iter_mut().find(|(n, _)| *n == name) {
            Some((_, sources)) => *sources = output.sources,
            None => self.sources.push((name, output.sources)),
        }

        Ok(output.content)
    }

    /// Sources recorded so far in this turn.
    pub fn sources(&self) -> Vec<Source> {
        self.sources
            .iter()
            .flat_map(|(_, s)| s.iter().cloned())
            .collect()
    }

    /// Return the recorded sources and clear them.
    pub fn take_sources(&mut self) -> Vec<Source> {
        std::mem::take(&mut self.sources)
            .into_iter()
            .flat_map(|(_, s)| s)
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chunking::DocumentProcessor;
    use crate::testing::HashingEmbedder;
    use crate::vector_store::MemoryVectorStore;
    use serde_json::json;

    pub(crate) const MCP_DOC: &str = "Course Title: MCP: Build Rich-Context AI Apps with Anthropic
Course Link: https://example.com/mcp
Course Instructor: Elie Schoppik

Lesson 1: Why MCP
Lesson Link: https://example.com/mcp/1
The Model Context Protocol standardizes how applications provide context to models.

Lesson 2: Servers
Servers expose tools, resources and prompts over a transport.
";

    pub(crate) const MCP_TITLE: &str = "MCP: Build Rich-Context AI Apps with Anthropic";

    pub(crate) async fn course_store() -> Arc<CourseStore> {
        let store = CourseStore::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(HashingEmbedder::default()),
        );
        let (course, chunks) = DocumentProcessor::default().process(MCP_DOC).unwrap();
        store.add_course_metadata(&course).await.unwrap();
        store.add_course_content(&chunks).await.unwrap();
        Arc::new(store)
    }

    fn invocation(name: &str, args: serde_json::Value) -> ToolInvocation {
        ToolInvocation::new("call_1", name, args.to_string())
    }

    #[test]
    fn test_source_display() {
        let lesson = Source {
            course_title: "Rust".to_string(),
            lesson_number: Some(3),
            link: None,
        };
        assert_eq!(lesson.to_string(), "Rust - Lesson 3");

        let course = Source {
            lesson_number: None,
            ..lesson
        };
        assert_eq!(course.to_string(), "Rust");
    }

    #[tokio::test]
    async fn test_registry_definitions() {
        let registry = ToolRegistry::for_courses(course_store().await);
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["search_course_content", "get_course_outline"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_error() {
        let registry = ToolRegistry::for_courses(course_store().await);
        let mut turn = registry.begin_turn();
        let err = turn
            .execute(&invocation("delete_everything", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, KursError::UnknownTool(name) if name == "delete_everything"));
    }

    #[tokio::test]
    async fn test_bad_arguments_become_text() {
        let registry = ToolRegistry::for_courses(course_store().await);
        let mut turn = registry.begin_turn();
        let result = turn
            .execute(&invocation("search_course_content", json!({"course_name": "MCP"})))
            .await
            .unwrap();
        assert!(result.starts_with("Failed to parse tool call:"));
        assert!(turn.sources().is_empty());
    }

    #[tokio::test]
    async fn test_turn_collects_and_clears_sources() {
        let registry = ToolRegistry::for_courses(course_store().await);
        let mut turn = registry.begin_turn();

        turn.execute(&invocation(
            "search_course_content",
            json!({"query": "servers", "course_name": "MCP", "lesson_number": 2}),
        ))
        .await
        .unwrap();
        turn.execute(&invocation("get_course_outline", json!({"course_name": "MCP"})))
            .await
            .unwrap();

        let labels: Vec<String> = turn.sources().iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            vec![format!("{} - Lesson 2", MCP_TITLE), MCP_TITLE.to_string()]
        );

        assert_eq!(turn.take_sources().len(), 2);
        assert!(turn.sources().is_empty());
    }

    #[tokio::test]
    async fn test_repeat_search_overwrites_its_sources() {
        let registry = ToolRegistry::for_courses(course_store().await);
        let mut turn = registry.begin_turn();

        turn.execute(&invocation(
            "search_course_content",
            json!({"query": "servers", "lesson_number": 2}),
        ))
        .await
        .unwrap();
        turn.execute(&invocation(
            "search_course_content",
            json!({"query": "protocol", "lesson_number": 1}),
        ))
        .await
        .unwrap();

        let sources = turn.sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].lesson_number, Some(1));
    }

    #[tokio::test]
    async fn test_turns_are_isolated() {
        let registry = ToolRegistry::for_courses(course_store().await);
        let mut first = registry.begin_turn();
        let second = registry.begin_turn();

        first
            .execute(&invocation("search_course_content", json!({"query": "servers"})))
            .await
            .unwrap();

        assert!(!first.sources().is_empty());
        assert!(second.sources().is_empty());
    }
}
