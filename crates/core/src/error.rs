//! Error types for the Sentinel orchestration domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; flow-level errors that
//! aggregate these live in `sentinel-flow`.

use thiserror::Error;

/// A value did not conform to its declared schema.
///
/// `path` is the dot-separated location of the failing value (array indices
/// are path segments); an empty path means the root value itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: expected {expected}, found {actual}", display_path(.path))]
pub struct ValidationFailure {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

impl ValidationFailure {
    pub fn new(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "(root)" } else { path }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for tool '{tool}': {failure}")]
    InputInvalid {
        tool: String,
        failure: ValidationFailure,
    },

    #[error("Tool '{tool}' returned output violating its schema: {failure}")]
    OutputInvalid {
        tool: String,
        failure: ValidationFailure,
    },

    #[error("Tool execution failed: {tool}: {reason}")]
    ExecutionFailed { tool: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unreadable provider response: {0}")]
    InvalidResponse(String),
}

/// Failures of the model invocation adapter (the bounded tool loop).
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("Model produced no usable output: {0}")]
    NoOutputProduced(String),

    #[error("No model provider is available: {0}")]
    ProviderUnavailable(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Model kept requesting tools after {max_rounds} rounds")]
    RoundLimitExceeded { max_rounds: u32 },

    #[error("Model output is not valid JSON: {0}")]
    MalformedOutput(String),

    #[error("Model output violates the requested schema: {0}")]
    OutputInvalid(ValidationFailure),

    #[error("Invalid media reference: {0}")]
    InvalidMedia(#[from] MediaError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("not a data URI")]
    NotDataUri,

    #[error("data URI is not base64-encoded")]
    NotBase64,

    #[error("base64 payload could not be decoded: {0}")]
    Decode(String),
}

/// Prompt template compilation errors. Raised once, at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template syntax error: {message}")]
    Syntax { message: String },

    #[error("template references '{path}', which the input schema does not declare")]
    UnknownPath { path: String },

    #[error("template iterates over '{path}', which is not an array")]
    NotAnArray { path: String },

    #[error("media reference '{path}' must point at a string field")]
    MediaNotString { path: String },

    #[error("template contains more than one media reference")]
    MultipleMedia,

    #[error("media reference '{path}' sits inside an each block")]
    MediaInEach { path: String },

    #[error("'@index' used outside of an each block")]
    IndexOutsideEach,

    #[error("template failed to render: {0}")]
    Render(String),
}

/// Registration-time errors for tools and flows.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("a tool named '{0}' is already registered")]
    DuplicateTool(String),

    #[error("a flow named '{0}' is already registered")]
    DuplicateFlow(String),

    #[error("prompt '{prompt}' declares tool '{tool}', which is not registered")]
    UnknownTool { prompt: String, tool: String },

    #[error("prompt '{prompt}' has an invalid template: {source}")]
    Template {
        prompt: String,
        #[source]
        source: TemplateError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failure_displays_path() {
        let failure = ValidationFailure::new("forecast.3.date", "string", "number 4");
        assert_eq!(
            failure.to_string(),
            "forecast.3.date: expected string, found number 4"
        );
    }

    #[test]
    fn validation_failure_root_path() {
        let failure = ValidationFailure::new("", "object", "null");
        assert!(failure.to_string().starts_with("(root):"));
    }

    #[test]
    fn provider_error_displays_correctly() {
        let err = AdapterError::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = ToolError::InputInvalid {
            tool: "getWeatherForecast".into(),
            failure: ValidationFailure::new("latitude", "number", "missing"),
        };
        assert!(err.to_string().contains("getWeatherForecast"));
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn template_error_names_media_path() {
        let err = TemplateError::MediaInEach { path: "this".into() };
        assert_eq!(err.to_string(), "media reference 'this' sits inside an each block");
    }
}
