use crate::config::ApiKeys;
use crate::hybrid::build_retriever;
use crate::llm::{ChatMessage, ChatModel, ModelChoice, ModelReply, ToolCall, ToolDefinition};
use crate::prompt::{
    invalid_tool_call_message, FINAL_ANSWER_INSTRUCTION, ITERATION_LIMIT_MESSAGE,
    SEARCH_TOOL_DESCRIPTION, SEARCH_TOOL_NAME, SYSTEM_PROMPT,
};
use crate::traits::{Retriever, VectorStore};
use crate::{AgentError, ConfigError, ConversationTurn, Role, RetrieverOptions};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MAX_ITERATIONS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentStep {
    pub tool_call: ToolCall,
    pub observation: String,
    /// False when the call was rejected and the observation is a correction.
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub output: String,
    pub steps: Vec<AgentStep>,
}

#[derive(Deserialize)]
struct SearchArguments {
    query: String,
}

enum LoopState {
    AwaitingModel,
    ExecutingTool {
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
    Done(String),
}

/// Tool-calling agent with a single retrieval tool and a bounded reasoning loop.
pub struct AnswerAgent {
    model: Box<dyn ChatModel>,
    retriever: Box<dyn Retriever>,
    tools: Vec<ToolDefinition>,
    max_iterations: usize,
}

impl AnswerAgent {
    pub fn new(model: Box<dyn ChatModel>, retriever: Box<dyn Retriever>) -> Self {
        Self {
            model,
            retriever,
            tools: vec![search_tool_definition()],
            max_iterations: MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub async fn invoke(
        &self,
        input: &str,
        history: &[ConversationTurn],
    ) -> Result<AgentOutput, AgentError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend(history.iter().map(|turn| match turn.role {
            Role::Human => ChatMessage::user(turn.content.clone()),
            Role::Assistant => ChatMessage::assistant(turn.content.clone()),
        }));
        messages.push(ChatMessage::user(input));

        let mut steps = Vec::new();
        let mut iterations = 0usize;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel if iterations >= self.max_iterations => {
                    warn!(iterations, "iteration limit reached, generating final answer");
                    LoopState::Done(self.generate_final(&mut messages).await?)
                }
                LoopState::AwaitingModel => {
                    match self.model.complete(&messages, &self.tools).await? {
                        ModelReply::Text(text) => LoopState::Done(text),
                        ModelReply::ToolCalls { text, calls } => {
                            LoopState::ExecutingTool { text, calls }
                        }
                    }
                }
                LoopState::ExecutingTool { text, calls } => {
                    messages.push(ChatMessage::assistant_tool_calls(text, calls.clone()));
                    for call in calls {
                        let step = self.execute(call).await?;
                        messages.push(ChatMessage::tool_result(
                            step.tool_call.id.clone(),
                            step.observation.clone(),
                        ));
                        steps.push(step);
                    }
                    iterations += 1;
                    LoopState::AwaitingModel
                }
                LoopState::Done(output) => {
                    info!(
                        model = self.model.name(),
                        iterations,
                        tool_calls = steps.len(),
                        "agent finished"
                    );
                    return Ok(AgentOutput { output, steps });
                }
            };
        }
    }

    async fn execute(&self, call: ToolCall) -> Result<AgentStep, AgentError> {
        if call.name != SEARCH_TOOL_NAME {
            warn!(tool = %call.name, "model called an unknown tool");
            let observation = invalid_tool_call_message(&call.name, "no such tool");
            return Ok(AgentStep {
                tool_call: call,
                observation,
                accepted: false,
            });
        }

        let arguments = match serde_json::from_str::<SearchArguments>(&call.arguments) {
            Ok(arguments) => arguments,
            Err(error) => {
                warn!(arguments = %call.arguments, %error, "malformed tool arguments");
                let observation = invalid_tool_call_message(&call.name, &error.to_string());
                return Ok(AgentStep {
                    tool_call: call,
                    observation,
                    accepted: false,
                });
            }
        };

        debug!(query = %arguments.query, "searching medical data");
        let records = self.retriever.search(&arguments.query).await?;
        let observation = records
            .iter()
            .map(|record| record.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(AgentStep {
            tool_call: call,
            observation,
            accepted: true,
        })
    }

    async fn generate_final(&self, messages: &mut Vec<ChatMessage>) -> Result<String, AgentError> {
        messages.push(ChatMessage::user(FINAL_ANSWER_INSTRUCTION));

        let output = match self.model.complete(messages, &[]).await? {
            ModelReply::Text(text) => Some(text),
            ModelReply::ToolCalls { text, .. } => text,
        };

        Ok(output
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| ITERATION_LIMIT_MESSAGE.to_string()))
    }
}

pub fn search_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: SEARCH_TOOL_NAME.to_string(),
        description: SEARCH_TOOL_DESCRIPTION.to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Câu truy vấn tìm kiếm về thông tin y tế",
                }
            },
            "required": ["query"],
        }),
    }
}

/// Builds the agent for `choice`. The model credential is mandatory; the retriever
/// degrades to a placeholder instead of failing.
pub async fn build_agent(
    choice: ModelChoice,
    keys: &ApiKeys,
    store: Arc<dyn VectorStore>,
    options: &RetrieverOptions,
) -> Result<AnswerAgent, ConfigError> {
    let model = choice.chat_model(keys)?;
    let retriever = build_retriever(store, choice.embedding_choice(), keys, options).await;
    if retriever.is_degraded() {
        warn!(model = %choice, "agent built with a degraded retriever");
    }
    Ok(AnswerAgent::new(Box::new(model), Box::new(retriever)))
}
