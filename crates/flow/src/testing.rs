//! Test providers: scripted responses and closures.
//!
//! Available to this crate's tests and, with the `testing` feature, to
//! downstream crates.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use sentinel_core::error::ProviderError;
use sentinel_core::media::Media;
use sentinel_core::message::{Message, MessageToolCall};
use sentinel_core::model::{ModelProvider, ProviderRequest, ProviderResponse, Usage};
use serde_json::Value;

/// A provider that returns a queue of scripted responses in order and
/// records every request it receives.
///
/// Once the queue is empty every call fails with `InvalidResponse`.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".into())))
    }
}

/// A provider backed by a closure, for responses that depend on the request.
pub struct FnProvider<F> {
    respond: F,
}

impl<F> FnProvider<F>
where
    F: Fn(&ProviderRequest) -> Result<ProviderResponse, ProviderError> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self { respond }
    }
}

#[async_trait]
impl<F> ModelProvider for FnProvider<F>
where
    F: Fn(&ProviderRequest) -> Result<ProviderResponse, ProviderError> + Send + Sync,
{
    fn name(&self) -> &str {
        "fn"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        (self.respond)(&request)
    }
}

fn response(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A final text answer.
pub fn text_response(text: &str) -> ProviderResponse {
    response(Message::assistant(text))
}

/// A final structured answer, serialized as the model would send it.
pub fn json_response(value: &Value) -> ProviderResponse {
    response(Message::assistant(value.to_string()))
}

/// A round that only requests tools.
pub fn tool_call_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    response(Message::assistant_tool_calls(calls))
}

/// A final answer carrying generated media.
pub fn media_response(mime_type: &str, data: Vec<u8>) -> ProviderResponse {
    response(Message::assistant_media(Media::new(mime_type, data)))
}

pub fn tool_call(name: &str, arguments: Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments,
    }
}
