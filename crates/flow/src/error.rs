//! Flow-level errors.

use sentinel_audio::EncodingError;
use sentinel_core::error::{AdapterError, ToolError, ValidationFailure};
use thiserror::Error;

/// Why a flow invocation failed.
///
/// The cause is preserved for logs; callers outside the process only ever
/// see [`FlowError::public_message`].
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Unknown flow '{0}'")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(ValidationFailure),

    #[error("Flow '{flow}' produced output that violates its schema: {failure}")]
    InvalidOutput {
        flow: String,
        failure: ValidationFailure,
    },

    #[error("Prompt '{prompt}' was rendered with invalid input: {failure}")]
    PromptInputInvalid {
        prompt: String,
        failure: ValidationFailure,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("Audio encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// A body-level requirement was not met; the message is shown to callers.
    #[error("{0}")]
    Precondition(String),

    #[error("Flow nesting is deeper than {max_depth} levels")]
    RecursionLimit { max_depth: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// The message a caller outside the process receives for a failed run
    /// of `flow`.
    pub fn public_message(&self, flow: &str) -> String {
        match self {
            Self::InvalidInput(_) | Self::NotFound(_) | Self::Precondition(_) => self.to_string(),
            _ => format!("An internal error occurred while running '{flow}'. Please try again."),
        }
    }

    /// Whether the caller is at fault (bad input or unknown flow).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::error::ProviderError;

    #[test]
    fn invalid_input_is_public() {
        let err = FlowError::InvalidInput(ValidationFailure::new("latitude", "number", "nothing (field is missing)"));
        assert_eq!(
            err.public_message("weatherSummaryFlow"),
            "Invalid input: latitude: expected number, found nothing (field is missing)"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn precondition_message_is_public() {
        let err = FlowError::precondition("No audio media was returned from the TTS model.");
        assert_eq!(err.public_message("x"), "No audio media was returned from the TTS model.");
        assert!(!err.is_client_error());
    }

    #[test]
    fn internal_causes_are_hidden() {
        let err = FlowError::Adapter(AdapterError::Provider(ProviderError::AuthenticationFailed(
            "key AIza-secret rejected".into(),
        )));
        let msg = err.public_message("dailyBriefingFlow");
        assert_eq!(
            msg,
            "An internal error occurred while running 'dailyBriefingFlow'. Please try again."
        );
        assert!(!msg.contains("AIza"));
    }

    #[test]
    fn unknown_flow_message() {
        assert_eq!(FlowError::NotFound("nope".into()).public_message("nope"), "Unknown flow 'nope'");
    }
}
