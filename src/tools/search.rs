//! Semantic search over course content.

use super::{parse_arguments, Source, ToolOutput};
use crate::chunking::Course;
use crate::course_store::CourseStore;
use crate::error::Result;
use crate::llm::ToolDefinition;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    lesson_number: Option<u32>,
}

/// Searches lesson content, optionally narrowed to a course and lesson.
pub struct CourseSearchTool {
    store: Arc<CourseStore>,
}

impl CourseSearchTool {
    pub const NAME: &'static str = "search_course_content";

    pub fn new(store: Arc<CourseStore>) -> Self {
        Self { store }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description:
                "Search course materials with smart course name matching and lesson filtering"
                    .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    #[instrument(skip(self))]
    pub async fn execute(&self, arguments: &str) -> Result<ToolOutput> {
        let args: SearchArgs = parse_arguments(arguments)?;
        let results = self
            .store
            .search(&args.query, args.course_name.as_deref(), args.lesson_number)
            .await?;

        if let Some(error) = results.error {
            return Ok(ToolOutput::text(error));
        }

        if results.is_empty() {
            let mut scope = String::new();
            if let Some(course) = &args.course_name {
                scope.push_str(&format!(" in course '{}'", course));
            }
            if let Some(n) = args.lesson_number {
                scope.push_str(&format!(" in lesson {}", n));
            }
            return Ok(ToolOutput::text(format!("No relevant content found{}.", scope)));
        }

        let mut outlines: HashMap<String, Option<Course>> = HashMap::new();
        let mut blocks = Vec::with_capacity(results.hits.len());
        let mut sources = Vec::with_capacity(results.hits.len());

        for hit in &results.hits {
            let chunk = &hit.chunk;
            let header = match chunk.lesson_number {
                Some(n) => format!("[{} - Lesson {}]", chunk.course_title, n),
                None => format!("[{}]", chunk.course_title),
            };
            blocks.push(format!("{}\n{}", header, chunk.body()));

            if !outlines.contains_key(&chunk.course_title) {
                let outline = self.store.course_outline(&chunk.course_title).await?;
                outlines.insert(chunk.course_title.clone(), outline);
            }
            let link = outlines
                .get(&chunk.course_title)
                .and_then(Option::as_ref)
                .and_then(|c| c.link_for(chunk.lesson_number))
                .map(str::to_string);

            sources.push(Source {
                course_title: chunk.course_title.clone(),
                lesson_number: chunk.lesson_number,
                link,
            });
        }

        Ok(ToolOutput {
            content: blocks.join("\n\n"),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::{course_store, MCP_TITLE};
    use crate::error::KursError;
    use serde_json::json;

    #[tokio::test]
    async fn test_formats_results_with_headers() {
        let tool = CourseSearchTool::new(course_store().await);
        let output = tool
            .execute(
                &json!({"query": "protocol", "course_name": "MCP", "lesson_number": 1}).to_string(),
            )
            .await
            .unwrap();

        assert_eq!(
            output.content,
            format!(
                "[{} - Lesson 1]\nThe Model Context Protocol standardizes how applications provide context to models.",
                MCP_TITLE
            )
        );
        assert_eq!(
            output.sources,
            vec![Source {
                course_title: MCP_TITLE.to_string(),
                lesson_number: Some(1),
                link: Some("https://example.com/mcp/1".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_lesson_without_link_falls_back_to_course_link() {
        let tool = CourseSearchTool::new(course_store().await);
        let output = tool
            .execute(&json!({"query": "servers", "lesson_number": 2}).to_string())
            .await
            .unwrap();
        assert_eq!(output.sources[0].link.as_deref(), Some("https://example.com/mcp"));
    }

    #[tokio::test]
    async fn test_empty_results_message() {
        let tool = CourseSearchTool::new(course_store().await);
        let output = tool
            .execute(
                &json!({"query": "servers", "course_name": "MCP", "lesson_number": 9}).to_string(),
            )
            .await
            .unwrap();
        assert_eq!(
            output.content,
            "No relevant content found in course 'MCP' in lesson 9."
        );
        assert!(output.sources.is_empty());
    }

    #[tokio::test]
    async fn test_missing_query_is_invalid() {
        let tool = CourseSearchTool::new(course_store().await);
        let err = tool.execute("{}").await.unwrap_err();
        assert!(matches!(err, KursError::InvalidToolArguments(_)));
    }
}
