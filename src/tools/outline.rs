//! Course outline lookup.

use super::{parse_arguments, Source, ToolOutput};
use crate::course_store::CourseStore;
use crate::error::Result;
use crate::llm::ToolDefinition;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct OutlineArgs {
    course_name: String,
}

/// Returns a course's title, link, instructor and lesson list.
pub struct CourseOutlineTool {
    store: Arc<CourseStore>,
}

impl CourseOutlineTool {
    pub const NAME: &'static str = "get_course_outline";

    pub fn new(store: Arc<CourseStore>) -> Self {
        Self { store }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Get the outline of a course: its title, link, instructor and numbered lesson list"
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work)"
                    }
                },
                "required": ["course_name"]
            }),
        }
    }

    #[instrument(skip(self))]
    pub async fn execute(&self, arguments: &str) -> Result<ToolOutput> {
        let args: OutlineArgs = parse_arguments(arguments)?;
        let not_found =
            || ToolOutput::text(format!("No course found matching '{}'", args.course_name));

        let Some(title) = self.store.resolve_course(&args.course_name).await? else {
            return Ok(not_found());
        };
        let Some(course) = self.store.course_outline(&title).await? else {
            return Ok(not_found());
        };

        let mut lines = vec![format!("Course: {}", course.title)];
        if let Some(link) = &course.source_link {
            lines.push(format!("Link: {}", link));
        }
        if let Some(instructor) = &course.instructor {
            lines.push(format!("Instructor: {}", instructor));
        }
        lines.push(format!("Lessons ({}):", course.lessons.len()));
        for lesson in &course.lessons {
            lines.push(format!("  Lesson {}: {}", lesson.number, lesson.title));
        }

        Ok(ToolOutput {
            content: lines.join("\n"),
            sources: vec![Source {
                course_title: course.title.clone(),
                lesson_number: None,
                link: course.source_link.clone(),
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::{course_store, MCP_TITLE};
    use serde_json::json;

    #[tokio::test]
    async fn test_outline_lists_lessons() {
        let tool = CourseOutlineTool::new(course_store().await);
        let output = tool
            .execute(&json!({"course_name": "mcp"}).to_string())
            .await
            .unwrap();

        assert_eq!(
            output.content,
            format!(
                "Course: {}\nLink: https://example.com/mcp\nInstructor: Elie Schoppik\nLessons (2):\n  Lesson 1: Why MCP\n  Lesson 2: Servers",
                MCP_TITLE
            )
        );
        assert_eq!(output.sources.len(), 1);
        assert_eq!(output.sources[0].lesson_number, None);
    }

    #[tokio::test]
    async fn test_outline_on_empty_catalog() {
        let store = Arc::new(CourseStore::new(
            Arc::new(crate::vector_store::MemoryVectorStore::new()),
            Arc::new(crate::testing::HashingEmbedder::default()),
        ));
        let tool = CourseOutlineTool::new(store);
        let output = tool
            .execute(&json!({"course_name": "Rust"}).to_string())
            .await
            .unwrap();
        assert_eq!(output.content, "No course found matching 'Rust'");
        assert!(output.sources.is_empty());
    }
}
