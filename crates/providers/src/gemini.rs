//! Google Gemini provider (Generative Language REST API).
//!
//! Uses `models/{model}:generateContent` directly.
//!
//! Features:
//! - `x-goog-api-key` header authentication
//! - System instructions as a top-level field
//! - Native function calling with `functionCall` / `functionResponse` parts
//! - Inline image input (`inlineData`)
//! - JSON mode with `responseSchema`
//! - Speech output via `responseModalities: ["AUDIO"]` and a prebuilt voice

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sentinel_core::error::ProviderError;
use sentinel_core::media::Media;
use sentinel_core::message::{Message, MessageToolCall, Part, Role};
use sentinel_core::model::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Call ids we invent for function calls that arrive without one; never sent back.
const LOCAL_CALL_PREFIX: &str = "local-";

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: build_client(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.client = build_client(secs);
        self
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("googleai/").unwrap_or(model);
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{model}:generateContent", self.base_url)
    }

    /// Build the `generateContent` body for a request.
    fn to_api_request(request: &ProviderRequest) -> GenerateContentRequest {
        let mut system_parts: Vec<ApiPart> = Vec::new();
        let mut contents: Vec<Content> = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => system_parts.push(ApiPart::text(msg.text())),
                Role::User => contents.push(Content {
                    role: Some("user".into()),
                    parts: msg.parts.iter().map(ApiPart::from_part).collect(),
                }),
                Role::Assistant => {
                    let mut parts: Vec<ApiPart> = msg.parts.iter().map(ApiPart::from_part).collect();
                    parts.extend(msg.tool_calls.iter().map(|tc| ApiPart {
                        function_call: Some(FunctionCall {
                            id: wire_id(&tc.id),
                            name: tc.name.clone(),
                            args: tc.arguments.clone(),
                        }),
                        ..ApiPart::default()
                    }));
                    contents.push(Content {
                        role: Some("model".into()),
                        parts,
                    });
                }
                Role::Tool => {
                    let output: Value = serde_json::from_str(&msg.text())
                        .unwrap_or_else(|_| Value::String(msg.text()));
                    let part = ApiPart {
                        function_response: Some(FunctionResponse {
                            id: msg.tool_call_id.as_deref().and_then(wire_id),
                            name: msg.tool_name.clone().unwrap_or_default(),
                            response: serde_json::json!({ "content": output }),
                        }),
                        ..ApiPart::default()
                    };
                    // All responses to one model turn go back in a single turn.
                    match contents.last_mut() {
                        Some(last) if last.is_function_responses() => last.parts.push(part),
                        _ => contents.push(Content {
                            role: Some("user".into()),
                            parts: vec![part],
                        }),
                    }
                }
            }
        }

        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![ApiTool {
                function_declarations: request.tools.iter().map(FunctionDeclaration::from).collect(),
            }]
        };

        let config = &request.config;
        let mut generation_config = ApiGenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            ..ApiGenerationConfig::default()
        };
        if let Some(schema) = &request.response_schema {
            generation_config.response_mime_type = Some("application/json".into());
            generation_config.response_schema = Some(to_gemini_schema(schema));
        }
        if config.modality == Modality::Audio {
            generation_config.response_modalities = Some(vec!["AUDIO".into()]);
            generation_config.speech_config = config.voice.as_ref().map(|voice| SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: voice.clone(),
                    },
                },
            });
        }

        GenerateContentRequest {
            contents,
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(Content {
                    role: None,
                    parts: system_parts,
                })
            },
            tools,
            generation_config,
        }
    }

    /// Convert a Gemini API response to our ProviderResponse.
    fn response_to_provider_response(
        resp: GenerateContentResponse,
        requested_model: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let Some(candidate) = resp.candidates.into_iter().next() else {
            let reason = resp
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".into());
            return Err(ProviderError::InvalidResponse(format!("Gemini returned no answer: {reason}")));
        };

        let mut parts = Vec::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if part.thought {
                continue;
            }
            if let Some(text) = part.text {
                parts.push(Part::Text { text });
            }
            if let Some(blob) = part.inline_data {
                let data = STANDARD
                    .decode(blob.data.as_bytes())
                    .map_err(|e| ProviderError::InvalidResponse(format!("inline data is not base64: {e}")))?;
                parts.push(Part::Media(Media::new(blob.mime_type, data)));
            }
            if let Some(call) = part.function_call {
                tool_calls.push(MessageToolCall {
                    id: call
                        .id
                        .unwrap_or_else(|| format!("{LOCAL_CALL_PREFIX}{}", uuid::Uuid::new_v4())),
                    name: call.name,
                    arguments: call.args,
                });
            }
        }

        if parts.is_empty() && tool_calls.is_empty() {
            debug!(finish_reason = ?candidate.finish_reason, "Gemini candidate has no content");
        }

        let mut message = Message::user_parts(parts);
        message.role = Role::Assistant;
        message.tool_calls = tool_calls;

        let usage = resp.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: resp.model_version.unwrap_or_else(|| requested_model.to_string()),
        })
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key is missing (set SENTINEL_API_KEY or GEMINI_API_KEY)".into(),
            ));
        }

        let url = self.endpoint(&request.model);
        let body = Self::to_api_request(&request);

        debug!(
            provider = "gemini",
            model = %request.model,
            messages = body.contents.len(),
            tools = request.tools.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini API error");
            return Err(map_status(status, error_body, &request.model));
        }

        let api_resp: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse Gemini response: {e}")))?;

        Self::response_to_provider_response(api_resp, &request.model)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        // 200 = works, 400/401/403 = bad key, anything else = reachable but unhappy
        let status = response.status().as_u16();
        Ok(response.status().is_success() || !matches!(status, 400 | 401 | 403))
    }
}

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

fn wire_id(id: &str) -> Option<String> {
    if id.is_empty() || id.starts_with(LOCAL_CALL_PREFIX) {
        None
    } else {
        Some(id.to_string())
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

fn map_status(status: u16, body: String, model: &str) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited { retry_after_secs: 5 },
        401 | 403 => ProviderError::AuthenticationFailed("Invalid Gemini API key".into()),
        404 => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

/// Adapt an exported JSON Schema to the OpenAPI subset Gemini accepts:
/// upper-case type names, no `additionalProperties`.
fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                match key.as_str() {
                    "additionalProperties" | "$schema" => {}
                    "type" => {
                        let upper = value.as_str().map(str::to_ascii_uppercase).unwrap_or_default();
                        out.insert(key.clone(), Value::String(upper));
                    }
                    "properties" => {
                        let props = value
                            .as_object()
                            .map(|p| {
                                p.iter()
                                    .map(|(name, s)| (name.clone(), to_gemini_schema(s)))
                                    .collect::<serde_json::Map<_, _>>()
                            })
                            .unwrap_or_default();
                        out.insert(key.clone(), Value::Object(props));
                    }
                    "items" => {
                        out.insert(key.clone(), to_gemini_schema(value));
                    }
                    _ => {
                        out.insert(key.clone(), value.clone());
                    }
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

impl Content {
    fn is_function_responses(&self) -> bool {
        self.role.as_deref() == Some("user")
            && !self.parts.is_empty()
            && self.parts.iter().all(|p| p.function_response.is_some())
    }
}

/// A content part. Gemini encodes the kind by which field is present.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    /// Set on reasoning summaries, which are not part of the answer
    #[serde(default, skip_serializing)]
    thought: bool,
}

impl ApiPart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }

    fn from_part(part: &Part) -> Self {
        match part {
            Part::Text { text } => Self::text(text.clone()),
            Part::Media(media) => Self {
                inline_data: Some(Blob {
                    mime_type: media.mime_type.clone(),
                    data: STANDARD.encode(&media.data),
                }),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

impl From<&ToolDefinition> for FunctionDeclaration {
    fn from(def: &ToolDefinition) -> Self {
        // Gemini rejects OBJECT parameters without properties; omit them instead.
        let has_properties = def.parameters["properties"]
            .as_object()
            .is_some_and(|p| !p.is_empty());
        Self {
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: has_properties.then(|| to_gemini_schema(&def.parameters)),
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
