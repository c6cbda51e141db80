//! The model invocation adapter: a bounded tool-calling loop over one
//! [`ModelProvider`].
//!
//! Each invocation:
//!
//! 1. **Builds** a user message from the rendered prompt (media references
//!    become inline media parts)
//! 2. **Declares** the requested tools
//! 3. **Calls** the provider
//! 4. **If tool calls**: validates and runs each one through the registry,
//!    appends the results and loops back to step 3
//! 5. **Otherwise** turns the final message into text, a validated
//!    structured value or raw media
//!
//! The loop stops with [`AdapterError::RoundLimitExceeded`] when the model
//! keeps asking for tools past the configured cap.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use sentinel_core::error::{AdapterError, ToolError};
use sentinel_core::event::{DomainEvent, EventBus};
use sentinel_core::media::Media;
use sentinel_core::message::{Message, Part};
use sentinel_core::model::*;
use sentinel_core::schema::Schema;
use sentinel_core::template::{PromptPart, RenderedPrompt};
use sentinel_core::tool::{ToolExecution, ToolRegistry};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 5;

/// Drives a provider through the tool loop.
#[derive(Clone)]
pub struct ModelAdapter {
    provider: Option<Arc<dyn ModelProvider>>,
    tools: Arc<ToolRegistry>,
    default_model: String,
    temperature: Option<f32>,
    max_tool_rounds: u32,
    events: EventBus,
}

impl ModelAdapter {
    pub fn new(provider: Option<Arc<dyn ModelProvider>>, tools: Arc<ToolRegistry>, default_model: impl Into<String>) -> Self {
        Self {
            provider,
            tools,
            default_model: default_model.into(),
            temperature: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            events: EventBus::default(),
        }
    }

    /// Maximum number of rounds in which the model may request tools.
    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Temperature for requests that do not set their own.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn max_tool_rounds(&self) -> u32 {
        self.max_tool_rounds
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Run one invocation to completion.
    pub async fn generate(&self, request: GenerateRequest) -> Result<InvocationResult, AdapterError> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            AdapterError::ProviderUnavailable("no model provider is configured".into())
        })?;

        let model = request.model.clone().unwrap_or_else(|| self.default_model.clone());
        let definitions = self.tools.definitions(&request.tools)?;
        let response_schema = request.output_schema.as_ref().map(Schema::to_json_schema);
        let mut config = request.config.clone();
        if config.temperature.is_none() {
            config.temperature = self.temperature;
        }

        let mut messages = vec![user_message(&request.prompt)?];
        let mut executions: Vec<ToolExecution> = Vec::new();
        let mut usage = Usage::default();
        let mut round = 0;

        loop {
            round += 1;

            debug!(model = %model, round, messages = messages.len(), "Model round");

            let response = provider
                .complete(ProviderRequest {
                    model: model.clone(),
                    messages: messages.clone(),
                    tools: definitions.clone(),
                    response_schema: response_schema.clone(),
                    config: config.clone(),
                })
                .await?;

            if let Some(u) = response.usage {
                usage += u;
            }
            self.events.publish(DomainEvent::ModelResponded {
                model: response.model.clone(),
                round,
                tool_calls: response.message.tool_calls.len(),
                timestamp: Utc::now(),
            });

            if !response.message.has_tool_calls() {
                let output = final_output(&request, &response.message)?;
                return Ok(InvocationResult {
                    output,
                    tool_calls: executions,
                    rounds: round,
                    model: response.model,
                    usage,
                });
            }

            if round > self.max_tool_rounds {
                warn!(
                    model = %model,
                    max_rounds = self.max_tool_rounds,
                    "Model still requesting tools at the round limit"
                );
                return Err(AdapterError::RoundLimitExceeded {
                    max_rounds: self.max_tool_rounds,
                });
            }

            debug!(tool_count = response.message.tool_calls.len(), "Executing tool calls");

            let calls = response.message.tool_calls.clone();
            messages.push(response.message);

            for call in calls {
                // Only tools declared for this request are callable.
                if !request.tools.iter().any(|t| *t == call.name) {
                    warn!(tool = %call.name, "Model called an undeclared tool");
                    return Err(ToolError::NotFound(call.name).into());
                }

                let start = Instant::now();
                let result = self.tools.invoke(&call.name, call.arguments.clone()).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                self.events.publish(DomainEvent::ToolExecuted {
                    tool_name: call.name.clone(),
                    success: result.is_ok(),
                    duration_ms,
                    timestamp: Utc::now(),
                });

                let output = result.inspect_err(|e| {
                    warn!(tool = %call.name, error = %e, "Tool call failed, aborting invocation");
                })?;

                messages.push(Message::tool_result(&call.id, &call.name, &output));
                executions.push(ToolExecution {
                    call_id: call.id,
                    tool_name: call.name,
                    arguments: call.arguments,
                    output,
                    duration_ms,
                });
            }
        }
    }
}

impl std::fmt::Debug for ModelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAdapter")
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("default_model", &self.default_model)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}

/// The user message for a rendered prompt. Media references must be
/// `data:` URIs.
fn user_message(prompt: &RenderedPrompt) -> Result<Message, AdapterError> {
    let parts = prompt
        .parts
        .iter()
        .map(|part| match part {
            PromptPart::Text { text } => Ok(Part::Text { text: text.clone() }),
            PromptPart::Media { url } => Media::from_data_uri(url)
                .map(Part::Media)
                .map_err(AdapterError::from),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Message::user_parts(parts))
}

fn final_output(request: &GenerateRequest, message: &Message) -> Result<InvocationOutput, AdapterError> {
    if request.config.modality == Modality::Audio {
        return match message.media() {
            Some(media) if !media.is_empty() => Ok(InvocationOutput::Media(media.clone())),
            _ => Err(AdapterError::NoOutputProduced(
                "the model returned no audio media".into(),
            )),
        };
    }

    let text = message.text();
    if text.trim().is_empty() {
        return Err(AdapterError::NoOutputProduced("the model returned an empty answer".into()));
    }

    match &request.output_schema {
        Some(schema) => {
            let value = parse_json_output(&text)?;
            let value = schema.validate(&value).map_err(AdapterError::OutputInvalid)?;
            Ok(InvocationOutput::Structured(value))
        }
        None => Ok(InvocationOutput::Text(text)),
    }
}

/// Parse a JSON answer, tolerating a surrounding Markdown code fence.
pub fn parse_json_output(text: &str) -> Result<Value, AdapterError> {
    let body = strip_code_fence(text);
    serde_json::from_str(body).map_err(|e| AdapterError::MalformedOutput(e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. "json") up to the first newline.
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FnProvider, ScriptedProvider, media_response, text_response, tool_call, tool_call_response};
    use async_trait::async_trait;
    use sentinel_core::error::ProviderError;
    use sentinel_core::schema;
    use sentinel_core::tool::Tool;
    use serde_json::json;

    struct Echo {
        input: Schema,
        output: Schema,
    }

    impl Echo {
        fn new() -> Self {
            Self {
                input: schema::object().field("word", schema::string()).into(),
                output: schema::object().field("echo", schema::string()).into(),
            }
        }
    }

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes a word"
        }
        fn input_schema(&self) -> &Schema {
            &self.input
        }
        fn output_schema(&self) -> &Schema {
            &self.output
        }
        async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
            Ok(json!({"echo": arguments["word"]}))
        }
    }

    /// Declares a number output but returns a string.
    struct Broken(Schema);

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Returns the wrong shape"
        }
        fn input_schema(&self) -> &Schema {
            &self.0
        }
        fn output_schema(&self) -> &Schema {
            &self.0
        }
        async fn call(&self, _arguments: Value) -> Result<Value, ToolError> {
            Ok(json!({"n": "seven"}))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo::new())).unwrap();
        registry
            .register(Box::new(Broken(schema::object().optional("n", schema::number()).into())))
            .unwrap();
        Arc::new(registry)
    }

    fn adapter(provider: Arc<dyn ModelProvider>) -> ModelAdapter {
        ModelAdapter::new(Some(provider), registry(), "test-model")
    }

    #[tokio::test]
    async fn plain_text_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("Hello farmer")]));
        let result = adapter(provider.clone())
            .generate(GenerateRequest::new("Say hello"))
            .await
            .unwrap();
        assert_eq!(result.text(), Some("Hello farmer"));
        assert_eq!(result.rounds, 1);
        assert!(result.tool_calls.is_empty());
        assert_eq!(result.usage.total_tokens, 15);

        let requests = provider.requests();
        assert_eq!(requests[0].model, "test-model");
        assert_eq!(requests[0].messages[0].text(), "Say hello");
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn tool_round_then_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response(vec![tool_call("echo", json!({"word": "hi"}))]),
            text_response("done"),
        ]));
        let result = adapter(provider.clone())
            .generate(GenerateRequest::new("Use echo").with_tools(["echo"]))
            .await
            .unwrap();

        assert_eq!(result.text(), Some("done"));
        assert_eq!(result.rounds, 2);
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].output, json!({"echo": "hi"}));

        let second = &provider.requests()[1];
        assert_eq!(second.tools.len(), 1);
        let tool_msg = second.messages.last().unwrap();
        assert_eq!(tool_msg.tool_name.as_deref(), Some("echo"));
        assert_eq!(tool_msg.text(), r#"{"echo":"hi"}"#);
    }

    #[tokio::test]
    async fn undeclared_tool_is_not_callable() {
        let provider = Arc::new(ScriptedProvider::new(vec![tool_call_response(vec![tool_call(
            "echo",
            json!({"word": "hi"}),
        )])]));
        let err = adapter(provider)
            .generate(GenerateRequest::new("No tools for you"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Tool(ToolError::NotFound(name)) if name == "echo"));
    }

    #[tokio::test]
    async fn unknown_declared_tool_fails_before_calling_the_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let err = adapter(provider.clone())
            .generate(GenerateRequest::new("x").with_tools(["missing"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Tool(ToolError::NotFound(_))));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn tool_errors_abort_the_loop() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response(vec![tool_call("echo", json!({"word": 42}))]),
            text_response("never reached"),
        ]));
        let err = adapter(provider.clone())
            .generate(GenerateRequest::new("x").with_tools(["echo"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Tool(ToolError::InputInvalid { .. })));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_output_violation_then_healthy_invocation() {
        let tools = registry();
        let broken = ModelAdapter::new(
            Some(Arc::new(ScriptedProvider::new(vec![tool_call_response(vec![tool_call(
                "broken",
                json!({}),
            )])]))),
            tools.clone(),
            "m",
        );
        let err = broken
            .generate(GenerateRequest::new("x").with_tools(["broken"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Tool(ToolError::OutputInvalid { .. })));

        // The shared registry is unaffected.
        let healthy = ModelAdapter::new(
            Some(Arc::new(ScriptedProvider::new(vec![
                tool_call_response(vec![tool_call("echo", json!({"word": "ok"}))]),
                text_response("fine"),
            ]))),
            tools,
            "m",
        );
        let result = healthy
            .generate(GenerateRequest::new("x").with_tools(["echo"]))
            .await
            .unwrap();
        assert_eq!(result.text(), Some("fine"));
    }

    #[tokio::test]
    async fn round_limit() {
        let always_tools = FnProvider::new(|_req| {
            Ok(tool_call_response(vec![tool_call("echo", json!({"word": "again"}))]))
        });
        let err = adapter(Arc::new(always_tools))
            .with_max_tool_rounds(2)
            .generate(GenerateRequest::new("loop").with_tools(["echo"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::RoundLimitExceeded { max_rounds: 2 }));
    }

    #[tokio::test]
    async fn zero_rounds_still_allows_a_direct_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("direct")]));
        let result = adapter(provider)
            .with_max_tool_rounds(0)
            .generate(GenerateRequest::new("x").with_tools(["echo"]))
            .await
            .unwrap();
        assert_eq!(result.text(), Some("direct"));
    }

    #[tokio::test]
    async fn structured_output_in_code_fence() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response(
            "```json\n{\"activityLevel\": \"high\", \"reasoning\": \"evening peak\"}\n```",
        )]));
        let output_schema = schema::object()
            .field("activityLevel", schema::enumeration(["low", "medium", "high"]))
            .field("reasoning", schema::string());
        let result = adapter(provider.clone())
            .generate(GenerateRequest::new("predict").with_output_schema(output_schema))
            .await
            .unwrap();
        assert_eq!(result.structured().unwrap()["activityLevel"], "high");
        assert_eq!(
            provider.requests()[0].response_schema.as_ref().unwrap()["required"],
            json!(["activityLevel", "reasoning"])
        );
    }

    #[tokio::test]
    async fn structured_output_must_parse() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("High activity expected.")]));
        let err = adapter(provider)
            .generate(GenerateRequest::new("x").with_output_schema(schema::object()))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn structured_output_must_validate() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response(
            r#"{"activityLevel": "LOW", "reasoning": "quiet"}"#,
        )]));
        let output_schema = schema::object()
            .field("activityLevel", schema::enumeration(["low", "medium", "high"]))
            .field("reasoning", schema::string());
        let err = adapter(provider)
            .generate(GenerateRequest::new("x").with_output_schema(output_schema))
            .await
            .unwrap_err();
        let AdapterError::OutputInvalid(failure) = err else {
            panic!("expected OutputInvalid, got {err:?}");
        };
        assert_eq!(failure.path, "activityLevel");
    }

    #[tokio::test]
    async fn empty_text_is_no_output() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("  ")]));
        let err = adapter(provider).generate(GenerateRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, AdapterError::NoOutputProduced(_)));
    }

    #[tokio::test]
    async fn audio_modality_returns_media() {
        let provider = Arc::new(ScriptedProvider::new(vec![media_response(
            "audio/L16;codec=pcm;rate=24000",
            vec![0, 0, 1, 0],
        )]));
        let result = adapter(provider.clone())
            .generate(GenerateRequest::new("Say it").with_config(GenerationConfig::audio("Algenib")))
            .await
            .unwrap();
        let media = result.into_media().unwrap();
        assert_eq!(media.data, vec![0, 0, 1, 0]);
        assert_eq!(provider.requests()[0].config.voice.as_deref(), Some("Algenib"));
    }

    #[tokio::test]
    async fn audio_without_media_is_no_output() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("I can't speak")]));
        let err = adapter(provider)
            .generate(GenerateRequest::new("Say it").with_config(GenerationConfig::audio("Algenib")))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::NoOutputProduced(_)));
    }

    #[tokio::test]
    async fn media_reference_becomes_inline_media() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("a beetle")]));
        let mut prompt = RenderedPrompt::from("What is this? ");
        prompt.push_media("data:image/png;base64,iVBORw==");
        adapter(provider.clone()).generate(GenerateRequest::new(prompt)).await.unwrap();

        let msg = &provider.requests()[0].messages[0];
        let media = msg.media().unwrap();
        assert_eq!(media.mime_type, "image/png");
        assert_eq!(media.data, vec![0x89, 0x50, 0x4e, 0x47]);
    }

    #[tokio::test]
    async fn malformed_media_reference() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("x")]));
        let mut prompt = RenderedPrompt::new();
        prompt.push_media("https://example.com/photo.jpg");
        let err = adapter(provider).generate(GenerateRequest::new(prompt)).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidMedia(_)));
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let provider = FnProvider::new(|_| Err(ProviderError::Timeout("120s".into())));
        let err = adapter(Arc::new(provider))
            .generate(GenerateRequest::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Provider(ProviderError::Timeout(_))));
    }

    #[tokio::test]
    async fn no_provider_is_unavailable() {
        let adapter = ModelAdapter::new(None, registry(), "m");
        let err = adapter.generate(GenerateRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, AdapterError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn request_model_and_temperature_defaults() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("a"), text_response("b")]));
        let adapter = adapter(provider.clone()).with_temperature(Some(0.2));
        adapter.generate(GenerateRequest::new("x")).await.unwrap();
        adapter
            .generate(GenerateRequest::new("x").with_model("gemini-2.5-flash-preview-tts"))
            .await
            .unwrap();
        let requests = provider.requests();
        assert_eq!(requests[0].config.temperature, Some(0.2));
        assert_eq!(requests[1].model, "gemini-2.5-flash-preview-tts");
    }

    #[tokio::test]
    async fn events_are_published() {
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response(vec![tool_call("echo", json!({"word": "hi"}))]),
            text_response("done"),
        ]));
        adapter(provider)
            .with_event_bus(events)
            .generate(GenerateRequest::new("x").with_tools(["echo"]))
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(&*first, DomainEvent::ModelResponded { round: 1, tool_calls: 1, .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(&*second, DomainEvent::ToolExecuted { success: true, .. }));
        let third = rx.recv().await.unwrap();
        assert!(matches!(&*third, DomainEvent::ModelResponded { round: 2, tool_calls: 0, .. }));
    }

    #[test]
    fn code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(parse_json_output("```json\n{\"a\": 1}\n```").unwrap(), json!({"a": 1}));
    }
}
