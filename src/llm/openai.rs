//! OpenAI chat completions implementation.

use super::{
    ChatMessage, ChatModel, ChatRequest, Generation, ToolChoice, ToolDefinition, ToolInvocation,
};
use crate::error::{KursError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
    ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequestArgs,
    FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Chat model backed by the OpenAI chat completions API.
pub struct OpenAIChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIChatModel {
    /// Create a chat model for `model` with deterministic sampling.
    pub fn new(model: &str) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: 800,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_messages(request: &ChatRequest) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(|e| KursError::Generation(e.to_string()))?
                .into(),
        ];

        for message in &request.messages {
            let built: ChatCompletionRequestMessage = match message {
                ChatMessage::User(content) => ChatCompletionRequestUserMessageArgs::default()
                    .content(content.clone())
                    .build()
                    .map_err(|e| KursError::Generation(e.to_string()))?
                    .into(),
                ChatMessage::Assistant(content) => {
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(content.clone())
                        .build()
                        .map_err(|e| KursError::Generation(e.to_string()))?
                        .into()
                }
                ChatMessage::ToolCalls(invocations) => {
                    let tool_calls: Vec<ChatCompletionMessageToolCall> = invocations
                        .iter()
                        .map(|inv| ChatCompletionMessageToolCall {
                            id: inv.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: inv.name.clone(),
                                arguments: inv.arguments.clone(),
                            },
                        })
                        .collect();
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .tool_calls(tool_calls)
                        .build()
                        .map_err(|e| KursError::Generation(e.to_string()))?
                        .into()
                }
                ChatMessage::ToolResult {
                    invocation_id,
                    content,
                } => ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(invocation_id.clone())
                    .content(content.clone())
                    .build()
                    .map_err(|e| KursError::Generation(e.to_string()))?
                    .into(),
            };
            messages.push(built);
        }

        Ok(messages)
    }
}

/// Convert a tool schema to the OpenAI function tool format.
fn to_openai_tool(definition: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: definition.name.clone(),
            description: Some(definition.description.clone()),
            parameters: Some(definition.parameters.clone()),
            strict: None,
        },
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(
        skip(self, request),
        fields(model = %self.model, messages = request.messages.len())
    )]
    async fn generate(&self, request: &ChatRequest) -> Result<Generation> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(Self::build_messages(request)?)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens);

        if !request.tools.is_empty() {
            let choice = match request.tool_choice {
                ToolChoice::Auto => ChatCompletionToolChoiceOption::Auto,
                ToolChoice::Disabled => ChatCompletionToolChoiceOption::None,
            };
            args.tools(request.tools.iter().map(to_openai_tool).collect::<Vec<_>>())
                .tool_choice(choice);
        }

        let openai_request = args
            .build()
            .map_err(|e| KursError::Generation(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| KursError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| KursError::Generation("No response from model".to_string()))?;

        match choice.message.tool_calls {
            Some(tool_calls) if !tool_calls.is_empty() && request.tools_enabled() => {
                debug!("Model requested {} tool calls", tool_calls.len());
                Ok(Generation::ToolCalls(
                    tool_calls
                        .into_iter()
                        .map(|call| ToolInvocation {
                            id: call.id,
                            name: call.function.name,
                            arguments: call.function.arguments,
                        })
                        .collect(),
                ))
            }
            _ => Ok(Generation::Text(choice.message.content.unwrap_or_default())),
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
