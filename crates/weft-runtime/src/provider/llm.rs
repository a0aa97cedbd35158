//! LLM completion collaborator.
//!
//! The runtime never talks to a vendor API itself: it resolves node
//! configuration into [`LlmParams`], obtains a cached [`LlmHandle`] from the
//! [`LlmService`], and sends messages through whatever [`CompletionBackend`]
//! the caller plugged in.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display as StrumDisplay, EnumString};
use tokio::sync::RwLock;

use crate::{WorkflowError, WorkflowResult};

/// Supported LLM providers.
///
/// This is a closed set; an unsupported provider name is a fatal
/// configuration error at model-creation time, never retried. The legacy
/// `claude` spelling resolves to [`Anthropic`].
///
/// [`Anthropic`]: LlmProvider::Anthropic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(StrumDisplay, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum LlmProvider {
    /// OpenAI chat models.
    #[strum(to_string = "openai")]
    OpenAi,
    /// Anthropic chat models.
    #[serde(alias = "claude")]
    #[strum(to_string = "anthropic", serialize = "claude")]
    Anthropic,
}

/// Resolved LLM invocation parameters.
///
/// These identify a model handle; the optional system message lives in
/// [`LlmNodeConfig`] because it shapes messages, not the handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmParams {
    /// Provider to call.
    pub provider: LlmProvider,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Caller-supplied API key override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl LlmParams {
    /// Creates parameters for a provider/model pair.
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            api_key: None,
        }
    }

    /// Returns the handle-cache key for these parameters.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.provider,
            self.model,
            self.temperature.map(|t| t.to_string()).unwrap_or_default(),
            self.max_tokens.map(|t| t.to_string()).unwrap_or_default(),
        )
    }
}

/// LLM configuration resolved from a node's opaque `data` map.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmNodeConfig {
    /// Handle parameters.
    pub params: LlmParams,
    /// Optional system message prepended to the conversation.
    pub system_message: Option<String>,
}

impl LlmNodeConfig {
    /// Resolves LLM configuration from node data.
    ///
    /// A nested `llm` object takes precedence over top-level fields; the
    /// provider defaults to `openai` and the model to `gpt-4` when absent.
    /// An unrecognized provider name fails here, at creation time.
    pub fn from_node_data(data: &Map<String, Value>) -> WorkflowResult<Self> {
        let nested = data.get("llm").and_then(Value::as_object);
        let lookup = |key: &str| {
            nested
                .and_then(|llm| llm.get(key))
                .or_else(|| data.get(key))
        };
        let lookup_str = |key: &str| lookup(key).and_then(Value::as_str).filter(|s| !s.is_empty());

        let provider_name = lookup_str("provider").unwrap_or("openai");
        let provider = LlmProvider::from_str(provider_name).map_err(|_| {
            WorkflowError::LlmExecution {
                provider: provider_name.to_owned(),
                model: lookup_str("model").unwrap_or("gpt-4").to_owned(),
                node_id: None,
                message: format!(
                    "unsupported LLM provider '{provider_name}'; supported providers: openai, anthropic"
                ),
            }
        })?;

        Ok(Self {
            params: LlmParams {
                provider,
                model: lookup_str("model").unwrap_or("gpt-4").to_owned(),
                temperature: lookup("temperature").and_then(Value::as_f64),
                max_tokens: lookup("max_tokens")
                    .and_then(Value::as_u64)
                    .map(|t| t as u32),
                api_key: lookup_str("api_key").map(str::to_owned),
            },
            system_message: lookup_str("system_message").map(str::to_owned),
        })
    }
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// System instruction.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Builds a chat message list from arbitrary JSON input.
///
/// Strings become a single user message; objects contribute their `text`,
/// `content`, or `input` field (falling back to the serialized object);
/// arrays fan out one user message per element; anything else serializes.
pub fn build_messages(input: &Value, system_message: Option<&str>) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    if let Some(system) = system_message {
        messages.push(ChatMessage::system(system));
    }

    match input {
        Value::String(text) => messages.push(ChatMessage::user(text)),
        Value::Object(fields) => {
            let text = ["text", "content", "input"]
                .iter()
                .find_map(|key| fields.get(*key))
                .filter(|v| !v.is_null());
            match text {
                Some(value) => messages.push(ChatMessage::user(stringify(value))),
                None => messages.push(ChatMessage::user(stringify(input))),
            }
        }
        Value::Array(items) => {
            for item in items {
                messages.push(ChatMessage::user(stringify(item)));
            }
        }
        other => messages.push(ChatMessage::user(stringify(other))),
    }

    messages
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Handle to a created model.
///
/// Cheap to clone through the `Arc` returned by [`LlmService::create_model`];
/// backends key their own vendor state off the parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmHandle {
    params: LlmParams,
}

impl LlmHandle {
    /// Returns the resolved parameters.
    pub fn params(&self) -> &LlmParams {
        &self.params
    }

    /// Returns the provider name.
    pub fn provider_name(&self) -> String {
        self.params.provider.to_string()
    }

    /// Returns the model name.
    pub fn model_name(&self) -> &str {
        &self.params.model
    }
}

/// Completion collaborator plugged in by the caller.
#[async_trait::async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Sends messages to the model behind `handle` and returns its text
    /// response.
    async fn complete(&self, handle: &LlmHandle, messages: &[ChatMessage])
    -> WorkflowResult<String>;
}

/// LLM service wrapping a backend with a concurrent handle cache.
///
/// Handles are cached by `provider:model:temperature:max_tokens`. The cache
/// is safe for concurrent reads; racing writers for the same key settle on
/// last-writer-wins, which is idempotent here.
pub struct LlmService {
    backend: Arc<dyn CompletionBackend>,
    handles: RwLock<HashMap<String, Arc<LlmHandle>>>,
}

impl LlmService {
    /// Creates a service over the given backend.
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a handle for the given parameters, creating and caching it
    /// on first use.
    pub async fn create_model(&self, params: LlmParams) -> Arc<LlmHandle> {
        let key = params.cache_key();

        if let Some(handle) = self.handles.read().await.get(&key) {
            return Arc::clone(handle);
        }

        let handle = Arc::new(LlmHandle { params });
        self.handles
            .write()
            .await
            .insert(key, Arc::clone(&handle));
        handle
    }

    /// Invokes the backend with the given handle and messages.
    pub async fn invoke(
        &self,
        handle: &LlmHandle,
        messages: &[ChatMessage],
    ) -> WorkflowResult<String> {
        self.backend.complete(handle, messages).await
    }

    /// Returns the number of cached handles.
    pub async fn cached_handles(&self) -> usize {
        self.handles.read().await.len()
    }
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService").finish_non_exhaustive()
    }
}
