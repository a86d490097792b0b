//! Prompt templates for Kurs.
//!
//! The assistant prompt can be customized by placing an `assistant.toml` file
//! in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub assistant: AssistantPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the course assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantPrompts {
    /// Fixed system instructions.
    pub system: String,
    /// Appended to the system prompt when the session has prior messages.
    pub history: String,
}

impl Default for AssistantPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an AI assistant specialized in course materials and educational content with access to tools for course information.

Tool usage:
- Use `search_course_content` for questions about specific course content or detailed educational materials
- Use `get_course_outline` for questions about a course's structure, lesson list, instructor or link
- Use at most one round of tool calls per query
- Synthesize tool results into accurate, fact-based responses
- If a tool yields no results, state this clearly without offering alternatives

Response protocol:
- General knowledge questions: answer from existing knowledge without using tools
- Course-specific questions: use the tools first, then answer
- No meta-commentary: do not mention the search, the tools or the results; give the answer directly

All responses must be:
1. Brief and focused on the question
2. Educational, maintaining instructional value
3. Clear, in accessible language
4. Supported by examples when they aid understanding

Provide only the direct answer to what was asked."#
                .to_string(),
            history: "Previous conversation:\n{{history}}".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let assistant_path = custom_path.join("assistant.toml");
            if assistant_path.exists() {
                let content = std::fs::read_to_string(&assistant_path)?;
                prompts.assistant = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// The assistant system prompt, rendered once with the config variables.
    pub fn system_prompt(&self) -> String {
        self.render_with_custom(&self.assistant.system, &HashMap::new())
    }

    /// System prompt for a turn: the fixed prompt, plus the history block when
    /// there is any history.
    pub fn system_with_history(
        system: &str,
        history_template: &str,
        history: Option<&str>,
    ) -> String {
        match history {
            Some(h) if !h.is_empty() => {
                let vars = HashMap::from([("history".to_string(), h.to_string())]);
                format!("{}\n\n{}", system, Self::render(history_template, &vars))
            }
            _ => system.to_string(),
        }
    }
}
