//! Model provider trait, the abstraction over generative model backends,
//! and the request/result types of the invocation adapter.
//!
//! A provider answers exactly one round: given messages, tool declarations
//! and generation settings it returns one assistant message. The bounded
//! tool loop that strings rounds together lives in `sentinel-flow`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::media::Media;
use crate::message::Message;
use crate::schema::Schema;
use crate::template::RenderedPrompt;
use crate::tool::ToolExecution;

/// What kind of output the model should produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    #[default]
    Text,
    Audio,
}

/// Generation settings for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub modality: Modality,

    /// Prebuilt voice name for audio output (e.g. "Algenib")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    pub fn audio(voice: impl Into<String>) -> Self {
        Self {
            modality: Modality::Audio,
            voice: Some(voice.into()),
            ..Self::default()
        }
    }
}

/// A tool declaration sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    pub description: String,

    /// JSON Schema of the tool's input
    pub parameters: Value,
}

/// One provider round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g. "gemini-2.0-flash")
    pub model: String,

    pub messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// JSON Schema the final answer must follow, if structured output is wanted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,

    #[serde(default)]
    pub config: GenerationConfig,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message (text/media parts and/or tool calls)
    pub message: Message,

    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(rhs.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(rhs.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(rhs.total_tokens);
    }
}

/// The core provider trait.
///
/// The adapter calls `complete()` once per round without knowing which
/// backend answers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// A human-readable name for this provider (e.g. "gemini").
    fn name(&self) -> &str;

    /// Send one request and get one complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

// ── Adapter request/result ────────────────────────────────────────────────

/// A request to the model invocation adapter.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Overrides the adapter's default model
    pub model: Option<String>,
    pub prompt: RenderedPrompt,
    /// Names of registered tools the model may call
    pub tools: Vec<String>,
    /// When set, the final answer is parsed as JSON and validated
    pub output_schema: Option<Schema>,
    pub config: GenerationConfig,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<RenderedPrompt>) -> Self {
        Self {
            model: None,
            prompt: prompt.into(),
            tools: Vec::new(),
            output_schema: None,
            config: GenerationConfig::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_schema(mut self, schema: impl Into<Schema>) -> Self {
        self.output_schema = Some(schema.into());
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }
}

/// The final output of an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutput {
    Text(String),
    /// Already validated against the requested output schema
    Structured(Value),
    Media(Media),
}

#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub output: InvocationOutput,
    /// Tool executions in the order they happened
    pub tool_calls: Vec<ToolExecution>,
    /// Number of provider rounds used
    pub rounds: u32,
    pub model: String,
    pub usage: Usage,
}

impl InvocationResult {
    pub fn text(&self) -> Option<&str> {
        match &self.output {
            InvocationOutput::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn structured(&self) -> Option<&Value> {
        match &self.output {
            InvocationOutput::Structured(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_structured(self) -> Option<Value> {
        match self.output {
            InvocationOutput::Structured(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self.output {
            InvocationOutput::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_media(self) -> Option<Media> {
        match self.output {
            InvocationOutput::Media(m) => Some(m),
            _ => None,
        }
    }
}
