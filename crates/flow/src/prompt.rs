//! Prompt definitions: a template compiled against its input schema plus
//! everything the adapter needs to run it.

use sentinel_core::error::RegistryError;
use sentinel_core::model::{GenerateRequest, GenerationConfig};
use sentinel_core::schema::Schema;
use sentinel_core::template::PromptTemplate;
use serde_json::Value;

use crate::error::FlowError;

#[derive(Debug, Clone)]
pub struct Prompt {
    name: String,
    template: PromptTemplate,
    input: Schema,
    output: Option<Schema>,
    tools: Vec<String>,
    model: Option<String>,
    config: GenerationConfig,
}

impl Prompt {
    /// Compile `source` against `input`. Template problems surface here,
    /// when the owning flow is constructed, never at call time.
    pub fn new(name: impl Into<String>, source: &str, input: impl Into<Schema>) -> Result<Self, RegistryError> {
        let name = name.into();
        let input = input.into();
        let template = PromptTemplate::compile(source, &input).map_err(|source| RegistryError::Template {
            prompt: name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            template,
            input,
            output: None,
            tools: Vec::new(),
            model: None,
            config: GenerationConfig::default(),
        })
    }

    /// Request structured output validated against `schema`.
    pub fn with_output(mut self, schema: impl Into<Schema>) -> Self {
        self.output = Some(schema.into());
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

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn input_schema(&self) -> &Schema {
        &self.input
    }

    pub fn output_schema(&self) -> Option<&Schema> {
        self.output.as_ref()
    }

    /// Validate `input` and render the adapter request.
    pub fn request(&self, input: &Value) -> Result<GenerateRequest, FlowError> {
        let input = self
            .input
            .validate(input)
            .map_err(|failure| FlowError::PromptInputInvalid {
                prompt: self.name.clone(),
                failure,
            })?;

        let rendered = self
            .template
            .render(&input)
            .map_err(|e| FlowError::Internal(format!("prompt '{}': {e}", self.name)))?;
        let mut request = GenerateRequest::new(rendered)
            .with_tools(self.tools.iter().cloned())
            .with_config(self.config.clone());
        if let Some(output) = &self.output {
            request = request.with_output_schema(output.clone());
        }
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        Ok(request)
    }
}
