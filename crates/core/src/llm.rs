use crate::config::{ApiKeys, Vendor};
use crate::embeddings::EmbeddingChoice;
use crate::{AgentError, ConfigError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON text exactly as the model produced it.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::Assistant, content)
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.unwrap_or_default(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolCalls {
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One completion. An empty `tools` slice means the model must answer in text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, AgentError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelChoice {
    Gpt4,
    Gemini,
}

impl ModelChoice {
    /// Maps a UI choice name to a model; unknown names have no model.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    pub fn vendor(self) -> Vendor {
        match self {
            ModelChoice::Gpt4 => Vendor::OpenAi,
            ModelChoice::Gemini => Vendor::Google,
        }
    }

    pub fn model(self) -> &'static str {
        match self {
            ModelChoice::Gpt4 => "gpt-4",
            ModelChoice::Gemini => "gemini-1.5-flash",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ModelChoice::Gpt4 => "OpenAI GPT-4",
            ModelChoice::Gemini => "GEMINI 1.5 Flash",
        }
    }

    /// Embedding provider of the same vendor, used to query the collection.
    pub fn embedding_choice(self) -> EmbeddingChoice {
        match self {
            ModelChoice::Gpt4 => EmbeddingChoice::OpenAi,
            ModelChoice::Gemini => EmbeddingChoice::Google,
        }
    }

    pub fn chat_model(self, keys: &ApiKeys) -> Result<OpenAiCompatibleChat, ConfigError> {
        let vendor = self.vendor();
        let api_key = keys.require(vendor)?;
        Ok(OpenAiCompatibleChat::new(
            vendor.name(),
            vendor.base_url(),
            api_key,
            self.model(),
        ))
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelChoice::Gpt4 => "gpt4",
            ModelChoice::Gemini => "gemini",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown model {0:?}, expected \"gpt4\" or \"gemini\"")]
pub struct UnknownModelChoice(String);

impl FromStr for ModelChoice {
    type Err = UnknownModelChoice;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gpt4" | "gpt-4" => Ok(ModelChoice::Gpt4),
            "gemini" => Ok(ModelChoice::Gemini),
            other => Err(UnknownModelChoice(other.to_string())),
        }
    }
}

/// Chat client for `/chat/completions` endpoints that speak the OpenAI tool-calling format.
#[derive(Clone)]
pub struct OpenAiCompatibleChat {
    client: Client,
    provider: &'static str,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl fmt::Debug for OpenAiCompatibleChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatibleChat")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiCompatibleChat {
    pub fn new(
        provider: &'static str,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.0,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        tools: &'a [ToolDefinition],
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: messages.iter().map(ApiMessage::from).collect(),
            tools: tools
                .iter()
                .map(|tool| ApiTool {
                    r#type: "function",
                    function: ApiFunction {
                        name: &tool.name,
                        description: &tool.description,
                        parameters: &tool.parameters,
                    },
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: ChatRole,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCallOut<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

impl<'a> From<&'a ChatMessage> for ApiMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self {
            role: message.role,
            content: &message.content,
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| ApiToolCallOut {
                    id: &call.id,
                    r#type: "function",
                    function: ApiFunctionCall {
                        name: &call.name,
                        arguments: &call.arguments,
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct ApiToolCallOut<'a> {
    id: &'a str,
    r#type: &'a str,
    function: ApiFunctionCall<'a>,
}

#[derive(Serialize)]
struct ApiFunctionCall<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Serialize)]
struct ApiTool<'a> {
    r#type: &'a str,
    function: ApiFunction<'a>,
}

#[derive(Serialize)]
struct ApiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: String,
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn parse_reply(provider: &str, body: &str) -> Result<ModelReply, AgentError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::EmptyResponse {
            provider: provider.to_string(),
        })?;

    let text = choice
        .message
        .content
        .filter(|content| !content.trim().is_empty());

    match choice.message.tool_calls {
        Some(calls) if !calls.is_empty() => Ok(ModelReply::ToolCalls {
            text,
            calls: calls
                .into_iter()
                .enumerate()
                .map(|(index, call)| ToolCall {
                    id: if call.id.is_empty() {
                        format!("call_{index}")
                    } else {
                        call.id
                    },
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect(),
        }),
        _ => Ok(ModelReply::Text(text.unwrap_or_default())),
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleChat {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, AgentError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages, tools))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AgentError::RateLimited {
                provider: self.provider.to_string(),
            });
        }

        if !status.is_success() {
            tracing::error!(provider = self.provider, %status, "chat request failed: {body}");
            return Err(AgentError::Provider {
                provider: self.provider.to_string(),
                details: format!("status {status}"),
            });
        }

        parse_reply(self.provider, &body)
    }

    fn name(&self) -> &str {
        self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_model() -> OpenAiCompatibleChat {
        OpenAiCompatibleChat::new("openai", "https://api.openai.com/v1/", "sk-secret", "gpt-4")
    }

    #[test]
    fn model_choice_names() {
        assert_eq!(ModelChoice::from_name("gpt4"), Some(ModelChoice::Gpt4));
        assert_eq!(ModelChoice::from_name("gemini"), Some(ModelChoice::Gemini));
        assert_eq!(ModelChoice::from_name("llama"), None);
        assert_eq!(ModelChoice::Gemini.embedding_choice(), EmbeddingChoice::Google);
    }

    #[test]
    fn model_choice_requires_its_own_credential() {
        let keys = ApiKeys::new(None, Some("g".to_string()));
        assert!(ModelChoice::Gemini.chat_model(&keys).is_ok());
        assert!(matches!(
            ModelChoice::Gpt4.chat_model(&keys),
            Err(ConfigError::MissingCredential {
                variable: "OPENAI_API_KEY",
                ..
            })
        ));
    }

    #[test]
    fn request_serializes_tools_and_scratchpad() {
        let model = test_model();
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("triệu chứng cúm?"),
            ChatMessage::assistant_tool_calls(
                None,
                vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "search_medical_data".to_string(),
                    arguments: r#"{"query":"cúm"}"#.to_string(),
                }],
            ),
            ChatMessage::tool_result("call_1", "Influenza causes fever"),
        ];
        let tools = vec![ToolDefinition {
            name: "search_medical_data".to_string(),
            description: "search".to_string(),
            parameters: json!({"type": "object"}),
        }];

        let encoded = serde_json::to_value(model.request_body(&messages, &tools)).unwrap();
        assert_eq!(encoded["model"], "gpt-4");
        assert_eq!(encoded["temperature"], 0.0);
        assert_eq!(encoded["messages"][0]["role"], "system");
        assert_eq!(encoded["messages"][2]["tool_calls"][0]["function"]["name"], "search_medical_data");
        assert_eq!(encoded["messages"][3]["role"], "tool");
        assert_eq!(encoded["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(encoded["tools"][0]["type"], "function");
        assert!(encoded["messages"][1].get("tool_calls").is_none());
    }

    #[test]
    fn request_without_tools_omits_the_field() {
        let model = test_model();
        let messages = vec![ChatMessage::user("hi")];
        let encoded = serde_json::to_value(model.request_body(&messages, &[])).unwrap();
        assert!(encoded.get("tools").is_none());
    }

    #[test]
    fn parse_text_reply() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Xin chào"}}]}"#;
        assert_eq!(
            parse_reply("openai", body).unwrap(),
            ModelReply::Text("Xin chào".to_string())
        );
    }

    #[test]
    fn parse_tool_call_reply_keeps_raw_arguments() {
        let body = r#"{"choices":[{"message":{"content":null,"tool_calls":[
            {"id":"call_9","type":"function","function":{"name":"search_medical_data","arguments":"{\"query\": \"cúm"}}
        ]}}]}"#;
        match parse_reply("openai", body).unwrap() {
            ModelReply::ToolCalls { text, calls } => {
                assert!(text.is_none());
                assert_eq!(calls[0].id, "call_9");
                assert_eq!(calls[0].arguments, "{\"query\": \"cúm");
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn parse_empty_choices_is_an_error() {
        assert!(matches!(
            parse_reply("google", r#"{"choices":[]}"#),
            Err(AgentError::EmptyResponse { .. })
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let rendered = format!("{:?}", test_model());
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("https://api.openai.com/v1\""));
    }

    #[tokio::test]
    async fn unreachable_endpoint_errors() {
        let model = OpenAiCompatibleChat::new("openai", "http://127.0.0.1:1", "sk", "gpt-4")
            .with_client(Client::builder().no_proxy().build().unwrap());
        let result = model.complete(&[ChatMessage::user("hi")], &[]).await;
        assert!(matches!(result, Err(AgentError::Http(_))));
    }
}
