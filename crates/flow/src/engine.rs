//! The flow engine: validates input, runs the flow body, validates output.
//!
//! Every invocation walks the same states:
//!
//! ```text
//! Created → InputValidated → Executing → OutputValidated → Completed
//!     └──────────┴──────────────┴──────────────┴──→ Failed
//! ```
//!
//! The engine is immutable once built. Cloning it is cheap and every clone
//! shares the same flows, tools and provider.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sentinel_config::AppConfig;
use sentinel_core::error::{AdapterError, RegistryError, ToolError};
use sentinel_core::event::{DomainEvent, EventBus};
use sentinel_core::model::{GenerateRequest, InvocationResult, ModelProvider};
use sentinel_core::schema::Schema;
use sentinel_core::tool::{Tool, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::FlowError;
use crate::generate::{DEFAULT_MAX_TOOL_ROUNDS, ModelAdapter};
use crate::prompt::Prompt;

pub const DEFAULT_MAX_DEPTH: usize = 8;
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// A named, schema-typed orchestration unit.
///
/// The engine validates input before `execute` and validates the returned
/// value afterwards; bodies never see or return unchecked data.
#[async_trait]
pub trait Flow: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn input_schema(&self) -> &Schema;

    fn output_schema(&self) -> &Schema;

    /// Prompts the body runs; their tools are checked at build time.
    fn prompts(&self) -> Vec<&Prompt> {
        Vec::new()
    }

    async fn execute(&self, ctx: &FlowContext, input: Value) -> Result<Value, FlowError>;
}

/// Lifecycle of one invocation, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Created,
    InputValidated,
    Executing,
    OutputValidated,
    Completed,
    Failed,
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::InputValidated => "input_validated",
            Self::Executing => "executing",
            Self::OutputValidated => "output_validated",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Boundary shape of a finished invocation: `{"result": …}` or `{"error": "…"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlowResponse {
    Result { result: Value },
    Error { error: String },
}

impl FlowResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Summary of a registered flow, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct FlowInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

struct EngineInner {
    flows: HashMap<String, Arc<dyn Flow>>,
    tools: Arc<ToolRegistry>,
    adapter: ModelAdapter,
    events: EventBus,
    max_depth: usize,
}

#[derive(Clone)]
pub struct FlowEngine {
    inner: Arc<EngineInner>,
}

impl FlowEngine {
    pub fn builder() -> FlowEngineBuilder {
        FlowEngineBuilder::new()
    }

    /// Run a flow by name.
    pub async fn run(&self, name: &str, input: Value) -> Result<Value, FlowError> {
        self.run_at_depth(name, input, 0).await
    }

    /// Run a flow and fold the outcome into its boundary shape. Failures are
    /// logged in full; the response carries only the public message.
    pub async fn invoke(&self, name: &str, input: Value) -> FlowResponse {
        match self.run(name, input).await {
            Ok(result) => FlowResponse::Result { result },
            Err(e) => FlowResponse::Error {
                error: e.public_message(name),
            },
        }
    }

    async fn run_at_depth(&self, name: &str, input: Value, depth: usize) -> Result<Value, FlowError> {
        let flow = self
            .inner
            .flows
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::NotFound(name.to_string()))?;

        if depth > self.inner.max_depth {
            return Err(FlowError::RecursionLimit {
                max_depth: self.inner.max_depth,
            });
        }

        let invocation_id = uuid::Uuid::new_v4().to_string();
        let start = Instant::now();
        let transition = |state: InvocationState| {
            debug!(invocation_id = %invocation_id, flow = %name, depth, state = %state, "Flow state");
        };
        transition(InvocationState::Created);

        // Rejected input never starts the invocation, so it publishes nothing.
        let input = match flow.input_schema().validate(&input) {
            Ok(input) => input,
            Err(failure) => {
                transition(InvocationState::Failed);
                debug!(invocation_id = %invocation_id, flow = %name, error = %failure, "Flow rejected input");
                return Err(FlowError::InvalidInput(failure));
            }
        };
        transition(InvocationState::InputValidated);
        self.inner.events.publish(DomainEvent::FlowStarted {
            invocation_id: invocation_id.clone(),
            flow: name.to_string(),
            timestamp: Utc::now(),
        });

        let outcome = async {
            let ctx = FlowContext {
                engine: self.clone(),
                invocation_id: invocation_id.clone(),
                flow: name.to_string(),
                depth,
            };
            transition(InvocationState::Executing);
            let output = flow.execute(&ctx, input).await?;

            let output = flow.output_schema().validate(&output).map_err(|failure| {
                error!(
                    invocation_id = %invocation_id,
                    flow = %name,
                    path = %failure.path,
                    expected = %failure.expected,
                    actual = %failure.actual,
                    "Flow body returned output that violates its schema"
                );
                FlowError::InvalidOutput {
                    flow: name.to_string(),
                    failure,
                }
            })?;
            transition(InvocationState::OutputValidated);
            Ok::<Value, FlowError>(output)
        }
        .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => {
                transition(InvocationState::Completed);
                info!(invocation_id = %invocation_id, flow = %name, duration_ms, "Flow completed");
                self.inner.events.publish(DomainEvent::FlowCompleted {
                    invocation_id,
                    flow: name.to_string(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                transition(InvocationState::Failed);
                if e.is_client_error() {
                    debug!(invocation_id = %invocation_id, flow = %name, error = %e, "Flow rejected input");
                } else {
                    warn!(invocation_id = %invocation_id, flow = %name, duration_ms, error = %e, "Flow failed");
                }
                self.inner.events.publish(DomainEvent::FlowFailed {
                    invocation_id,
                    flow: name.to_string(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
        outcome
    }

    pub fn flow(&self, name: &str) -> Option<&dyn Flow> {
        self.inner.flows.get(name).map(|f| f.as_ref())
    }

    /// Registered flow names, sorted.
    pub fn flow_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.flows.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Every flow with its JSON Schemas, sorted by name.
    pub fn flows(&self) -> Vec<FlowInfo> {
        self.flow_names()
            .into_iter()
            .filter_map(|name| self.flow(name))
            .map(|flow| FlowInfo {
                name: flow.name().to_string(),
                description: flow.description().to_string(),
                input_schema: flow.input_schema().to_json_schema(),
                output_schema: flow.output_schema().to_json_schema(),
            })
            .collect()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.inner.tools
    }

    pub fn adapter(&self) -> &ModelAdapter {
        &self.inner.adapter
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn max_depth(&self) -> usize {
        self.inner.max_depth
    }
}

impl fmt::Debug for FlowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowEngine")
            .field("flows", &self.flow_names())
            .field("tools", &self.inner.tools.names())
            .field("adapter", &self.inner.adapter)
            .field("max_depth", &self.inner.max_depth)
            .finish()
    }
}

/// What a flow body can reach during one invocation.
pub struct FlowContext {
    engine: FlowEngine,
    invocation_id: String,
    flow: String,
    depth: usize,
}

impl FlowContext {
    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn flow_name(&self) -> &str {
        &self.flow
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn engine(&self) -> &FlowEngine {
        &self.engine
    }

    /// Run the model invocation adapter.
    pub async fn generate(&self, request: GenerateRequest) -> Result<InvocationResult, AdapterError> {
        self.engine.inner.adapter.generate(request).await
    }

    /// Validate `input` against the prompt, render it and run it.
    pub async fn prompt(&self, prompt: &Prompt, input: &Value) -> Result<InvocationResult, FlowError> {
        let request = prompt.request(input)?;
        debug!(invocation_id = %self.invocation_id, prompt = prompt.name(), "Running prompt");
        Ok(self.generate(request).await?)
    }

    /// Invoke a registered tool directly (validated both ways).
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let start = Instant::now();
        let result = self.engine.inner.tools.invoke(name, arguments).await;
        self.engine.inner.events.publish(DomainEvent::ToolExecuted {
            tool_name: name.to_string(),
            success: result.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        result
    }

    /// Run another flow as part of this invocation.
    pub async fn run_flow(&self, name: &str, input: Value) -> Result<Value, FlowError> {
        Box::pin(self.engine.run_at_depth(name, input, self.depth + 1)).await
    }
}

/// Collects tools, flows and the provider, then checks them together.
pub struct FlowEngineBuilder {
    flows: Vec<Arc<dyn Flow>>,
    tools: Vec<Box<dyn Tool>>,
    provider: Option<Arc<dyn ModelProvider>>,
    default_model: String,
    temperature: Option<f32>,
    max_tool_rounds: u32,
    max_depth: usize,
    events: EventBus,
}

impl FlowEngineBuilder {
    pub fn new() -> Self {
        Self {
            flows: Vec::new(),
            tools: Vec::new(),
            provider: None,
            default_model: DEFAULT_MODEL.into(),
            temperature: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            max_depth: DEFAULT_MAX_DEPTH,
            events: EventBus::default(),
        }
    }

    /// Model and limits from configuration. The provider is set separately.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new()
            .with_model(config.model.default_model.clone())
            .with_temperature(config.model.temperature)
            .with_max_tool_rounds(config.flows.max_tool_rounds)
            .with_max_depth(config.flows.max_depth)
    }

    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    pub fn flow(mut self, flow: impl Flow + 'static) -> Self {
        self.flows.push(Arc::new(flow));
        self
    }

    /// Check names and tool references and freeze the engine.
    pub fn build(self) -> Result<FlowEngine, RegistryError> {
        let mut tools = ToolRegistry::new();
        for tool in self.tools {
            tools.register(tool)?;
        }

        let mut flows: HashMap<String, Arc<dyn Flow>> = HashMap::new();
        for flow in self.flows {
            let name = flow.name().to_string();
            for prompt in flow.prompts() {
                if let Some(missing) = prompt.tools().iter().find(|t| !tools.contains(t)) {
                    return Err(RegistryError::UnknownTool {
                        prompt: prompt.name().to_string(),
                        tool: missing.clone(),
                    });
                }
            }
            if flows.contains_key(&name) {
                return Err(RegistryError::DuplicateFlow(name));
            }
            flows.insert(name, flow);
        }

        if self.provider.is_none() {
            warn!("No model provider configured; flows that call the model will fail");
        }

        let tools = Arc::new(tools);
        let adapter = ModelAdapter::new(self.provider, tools.clone(), self.default_model)
            .with_temperature(self.temperature)
            .with_max_tool_rounds(self.max_tool_rounds)
            .with_event_bus(self.events.clone());

        info!(flows = flows.len(), tools = tools.len(), "Flow engine ready");

        Ok(FlowEngine {
            inner: Arc::new(EngineInner {
                flows,
                tools,
                adapter,
                events: self.events,
                max_depth: self.max_depth,
            }),
        })
    }
}

impl Default for FlowEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProvider, text_response};
    use sentinel_core::schema;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Doubles `n`; counts how often its body ran.
    struct Double {
        input: Schema,
        output: Schema,
        calls: Arc<AtomicUsize>,
        result_override: Option<Value>,
    }

    impl Double {
        fn new(calls: Arc<AtomicUsize>) -> Self {
            Self {
                input: schema::object().field("n", schema::integer()).into(),
                output: schema::object().field("doubled", schema::integer()).into(),
                calls,
                result_override: None,
            }
        }

        fn returning(mut self, value: Value) -> Self {
            self.result_override = Some(value);
            self
        }
    }

    #[async_trait]
    impl Flow for Double {
        fn name(&self) -> &str {
            "double"
        }
        fn input_schema(&self) -> &Schema {
            &self.input
        }
        fn output_schema(&self) -> &Schema {
            &self.output
        }
        async fn execute(&self, _ctx: &FlowContext, input: Value) -> Result<Value, FlowError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(v) = &self.result_override {
                return Ok(v.clone());
            }
            let n = input["n"].as_i64().unwrap_or_default();
            Ok(json!({"doubled": n * 2}))
        }
    }

    /// Calls itself until the engine stops it.
    struct Recurse {
        schema: Schema,
    }

    #[async_trait]
    impl Flow for Recurse {
        fn name(&self) -> &str {
            "recurse"
        }
        fn input_schema(&self) -> &Schema {
            &self.schema
        }
        fn output_schema(&self) -> &Schema {
            &self.schema
        }
        async fn execute(&self, ctx: &FlowContext, input: Value) -> Result<Value, FlowError> {
            ctx.run_flow("recurse", input).await
        }
    }

    /// Asks the model a fixed question.
    struct Ask {
        prompt: Prompt,
        input: Schema,
        output: Schema,
    }

    impl Ask {
        fn new(tools: &[&str]) -> Self {
            let input: Schema = schema::object().field("topic", schema::string()).into();
            Self {
                prompt: Prompt::new("askPrompt", "Tell me about {{topic}}", input.clone())
                    .unwrap()
                    .with_tools(tools.iter().copied()),
                input,
                output: schema::string().into(),
            }
        }
    }

    #[async_trait]
    impl Flow for Ask {
        fn name(&self) -> &str {
            "ask"
        }
        fn input_schema(&self) -> &Schema {
            &self.input
        }
        fn output_schema(&self) -> &Schema {
            &self.output
        }
        fn prompts(&self) -> Vec<&Prompt> {
            vec![&self.prompt]
        }
        async fn execute(&self, ctx: &FlowContext, input: Value) -> Result<Value, FlowError> {
            let result = ctx.prompt(&self.prompt, &input).await?;
            Ok(Value::String(result.into_text().unwrap_or_default()))
        }
    }

    fn engine_with(flow: impl Flow + 'static) -> FlowEngine {
        FlowEngine::builder().flow(flow).build().unwrap()
    }

    #[tokio::test]
    async fn runs_a_flow() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(Double::new(calls.clone()));
        let out = engine.run("double", json!({"n": 21})).await.unwrap();
        assert_eq!(out, json!({"doubled": 42}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_field_is_rejected_before_the_body_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(Double::new(calls.clone()));
        let err = engine.run("double", json!({})).await.unwrap_err();
        let FlowError::InvalidInput(failure) = &err else {
            panic!("expected InvalidInput, got {err:?}");
        };
        assert_eq!(failure.path, "n");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn nonconforming_output_fails_the_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(Double::new(calls.clone()).returning(json!({"doubled": "lots"})));
        let err = engine.run("double", json!({"n": 1})).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidOutput { ref failure, .. } if failure.path == "doubled"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_flow() {
        let engine = FlowEngine::builder().build().unwrap();
        assert!(matches!(engine.run("nope", json!({})).await, Err(FlowError::NotFound(_))));
    }

    #[tokio::test]
    async fn invoke_shapes() {
        let engine = engine_with(Double::new(Arc::new(AtomicUsize::new(0))));

        let ok = engine.invoke("double", json!({"n": 2})).await;
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"result": {"doubled": 4}}));

        let bad = engine.invoke("double", json!({"n": "two"})).await;
        assert_eq!(
            serde_json::to_value(&bad).unwrap(),
            json!({"error": "Invalid input: n: expected integer, found string \"two\""})
        );
    }

    #[tokio::test]
    async fn invoke_hides_output_defects() {
        let engine =
            engine_with(Double::new(Arc::new(AtomicUsize::new(0))).returning(json!({"doubled": 1.5})));
        let FlowResponse::Error { error } = engine.invoke("double", json!({"n": 1})).await else {
            panic!("expected an error response");
        };
        assert_eq!(error, "An internal error occurred while running 'double'. Please try again.");
    }

    #[tokio::test]
    async fn recursion_is_bounded() {
        let engine = FlowEngine::builder()
            .with_max_depth(3)
            .flow(Recurse { schema: schema::object().into() })
            .build()
            .unwrap();
        let err = engine.run("recurse", json!({})).await.unwrap_err();
        assert!(matches!(err, FlowError::RecursionLimit { max_depth: 3 }));
    }

    #[tokio::test]
    async fn duplicate_flows_are_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = FlowEngine::builder()
            .flow(Double::new(calls.clone()))
            .flow(Double::new(calls))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateFlow(name) if name == "double"));
    }

    #[tokio::test]
    async fn prompts_must_reference_registered_tools() {
        let err = FlowEngine::builder().flow(Ask::new(&["getWeatherForecast"])).build().unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnknownTool { ref prompt, ref tool } if prompt == "askPrompt" && tool == "getWeatherForecast"
        ));
    }

    #[tokio::test]
    async fn prompt_through_context() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("Crows are clever.")]));
        let engine = FlowEngine::builder()
            .with_provider(provider.clone())
            .with_model("test-model")
            .flow(Ask::new(&[]))
            .build()
            .unwrap();
        let out = engine.run("ask", json!({"topic": "crows"})).await.unwrap();
        assert_eq!(out, json!("Crows are clever."));
        assert_eq!(provider.requests()[0].messages[0].text(), "Tell me about crows");
    }

    #[tokio::test]
    async fn missing_provider_is_an_internal_failure() {
        let engine = engine_with(Ask::new(&[]));
        let err = engine.run("ask", json!({"topic": "crows"})).await.unwrap_err();
        assert!(matches!(err, FlowError::Adapter(AdapterError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn lifecycle_events() {
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let engine = FlowEngine::builder()
            .with_event_bus(events)
            .flow(Double::new(Arc::new(AtomicUsize::new(0))))
            .build()
            .unwrap();

        engine.run("double", json!({"n": 1})).await.unwrap();
        let started = rx.recv().await.unwrap();
        let completed = rx.recv().await.unwrap();
        let (DomainEvent::FlowStarted { invocation_id: a, .. }, DomainEvent::FlowCompleted { invocation_id: b, .. }) =
            (&*started, &*completed)
        else {
            panic!("unexpected events: {started:?}, {completed:?}");
        };
        assert_eq!(a, b);

        engine.run("double", json!({})).await.unwrap_err();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_run_is_started_before_it_fails() {
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let engine = FlowEngine::builder()
            .with_event_bus(events)
            .flow(Double::new(Arc::new(AtomicUsize::new(0))).returning(json!({"doubled": "lots"})))
            .build()
            .unwrap();

        engine.run("double", json!({"n": 1})).await.unwrap_err();
        let started = rx.try_recv().unwrap();
        let failed = rx.try_recv().unwrap();
        let (DomainEvent::FlowStarted { invocation_id: a, .. }, DomainEvent::FlowFailed { invocation_id: b, flow, .. }) =
            (&*started, &*failed)
        else {
            panic!("unexpected events: {started:?}, {failed:?}");
        };
        assert_eq!(a, b);
        assert_eq!(flow, "double");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn concurrent_runs_are_independent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(Double::new(calls.clone()));
        let runs = (0..16).map(|n| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run("double", json!({"n": n})).await })
        });
        let results = futures::future::join_all(runs).await;
        for (n, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap().unwrap(), json!({"doubled": n * 2}));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn listing_is_sorted_with_schemas() {
        let engine = FlowEngine::builder()
            .flow(Recurse { schema: schema::object().into() })
            .flow(Double::new(Arc::new(AtomicUsize::new(0))))
            .build()
            .unwrap();
        assert_eq!(engine.flow_names(), vec!["double", "recurse"]);
        let info = &engine.flows()[0];
        assert_eq!(info.input_schema["required"], json!(["n"]));
    }
}
