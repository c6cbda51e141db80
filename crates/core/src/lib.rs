//! # Sentinel Core
//!
//! Domain types, traits, and error definitions for the Sentinel flow
//! orchestration runtime. This crate has no framework dependencies; it
//! defines the model every other crate implements against.
//!
//! - [`schema`]: declarative value schemas and the validator
//! - [`tool`]: the `Tool` trait and the validating registry
//! - [`template`]: prompt templates compiled against a schema
//! - [`model`]: the `ModelProvider` trait and adapter request/result types
//! - [`event`]: domain events on a broadcast bus

pub mod error;
pub mod event;
pub mod media;
pub mod message;
pub mod model;
pub mod schema;
pub mod template;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{
    AdapterError, MediaError, ProviderError, RegistryError, TemplateError, ToolError,
    ValidationFailure,
};
pub use event::{DomainEvent, EventBus};
pub use media::Media;
pub use message::{Message, MessageToolCall, Part, Role};
pub use model::{
    GenerateRequest, GenerationConfig, InvocationOutput, InvocationResult, Modality,
    ModelProvider, ProviderRequest, ProviderResponse, ToolDefinition, Usage,
};
pub use schema::Schema;
pub use template::{PromptPart, PromptTemplate, RenderedPrompt};
pub use tool::{Tool, ToolCall, ToolExecution, ToolRegistry};
