//! `identifyPestFlow`: identify a pest from a photo and notes, and log
//! positive identifications.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_core::error::{RegistryError, ValidationFailure};
use sentinel_core::media::Media;
use sentinel_core::schema::{self, Schema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::engine::{Flow, FlowContext};
use crate::error::FlowError;
use crate::prompt::Prompt;

pub const NAME: &str = "identifyPestFlow";

const PROMPT: &str = "You are an expert agricultural entomologist and botanist. Your task is to identify a potential pest from an image and user-provided notes.

Analyze the image and the user's notes to identify the pest. If it is not a pest, set the isPest flag to false and explain why.

If it is a pest, provide the following information:
1.  The common name of the pest.
2.  A detailed description of the pest.
3.  The potential impact it could have on crops.
4.  A few high-level, non-pesticide recommendations for management (e.g., introducing natural predators, crop rotation, etc.).

User Notes: {{{userNotes}}}
Pest Photo: {{media url=photoDataUri}}";

/// A positive identification, as appended to the pest log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PestLogEntry {
    pub id: String,
    pub invocation_id: String,
    pub timestamp: DateTime<Utc>,
    pub pest_name: String,
    pub description: String,
    pub impact: String,
    pub recommendations: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_notes: Option<String>,
    pub photo_mime_type: String,
    pub photo_bytes: usize,
}

#[derive(Debug, Clone, Error)]
#[error("pest log write failed: {0}")]
pub struct PestLogError(pub String);

/// Where positive identifications are recorded.
#[async_trait]
pub trait PestLog: Send + Sync {
    async fn record(&self, entry: PestLogEntry) -> Result<(), PestLogError>;
}

/// Pest log kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryPestLog {
    entries: RwLock<Vec<PestLogEntry>>,
}

impl InMemoryPestLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in insertion order.
    pub async fn entries(&self) -> Vec<PestLogEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl PestLog for InMemoryPestLog {
    async fn record(&self, entry: PestLogEntry) -> Result<(), PestLogError> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

fn input_schema() -> Schema {
    schema::object()
        .field(
            "photoDataUri",
            schema::string().min_length(1).describe(
                "A photo of a potential pest (insect, weed, or fungus), as a data URI that must include a MIME type and use Base64 encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.",
            ),
        )
        .optional(
            "userNotes",
            schema::string()
                .describe("Any additional notes from the user about where the pest was found or its behavior."),
        )
        .into()
}

pub fn output_schema() -> Schema {
    schema::object()
        .field(
            "isPest",
            schema::boolean().describe("Whether or not the image contains a recognizable agricultural pest."),
        )
        .field("pestName", schema::string().describe("The common name of the identified pest."))
        .field(
            "description",
            schema::string().describe("A detailed description of the pest, its lifecycle, and characteristics."),
        )
        .field("impact", schema::string().describe("The potential impact of this pest on crops."))
        .field(
            "recommendations",
            schema::string()
                .describe("High-level, non-pesticide recommendations for managing or controlling the pest."),
        )
        .into()
}

pub struct IdentifyPestFlow {
    prompt: Prompt,
    input: Schema,
    output: Schema,
    log: Option<Arc<dyn PestLog>>,
}

impl IdentifyPestFlow {
    pub fn new(log: Option<Arc<dyn PestLog>>) -> Result<Self, RegistryError> {
        let input = input_schema();
        let output = output_schema();
        let prompt = Prompt::new("identifyPestPrompt", PROMPT, input.clone())?.with_output(output.clone());
        Ok(Self {
            prompt,
            input,
            output,
            log,
        })
    }

    async fn log_identification(&self, ctx: &FlowContext, photo: &Media, input: &Value, output: &Value) {
        let Some(log) = &self.log else {
            return;
        };
        let text = |key: &str| output[key].as_str().unwrap_or_default().to_string();
        let entry = PestLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            invocation_id: ctx.invocation_id().to_string(),
            timestamp: Utc::now(),
            pest_name: text("pestName"),
            description: text("description"),
            impact: text("impact"),
            recommendations: text("recommendations"),
            user_notes: input["userNotes"].as_str().map(str::to_string),
            photo_mime_type: photo.mime_type.clone(),
            photo_bytes: photo.len(),
        };
        let pest = entry.pest_name.clone();
        match log.record(entry).await {
            Ok(()) => debug!(pest = %pest, "Pest identification logged"),
            // The identification is still returned to the caller.
            Err(e) => warn!(pest = %pest, error = %e, "Could not log pest identification"),
        }
    }
}

#[async_trait]
impl Flow for IdentifyPestFlow {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Identifies a potential pest from a photo and notes, with non-pesticide management advice."
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
        let uri = input["photoDataUri"].as_str().unwrap_or_default();
        let photo = Media::from_data_uri(uri).map_err(|e| {
            FlowError::InvalidInput(ValidationFailure::new(
                "photoDataUri",
                "a base64 data URI",
                format!("an unusable value ({e})"),
            ))
        })?;

        let output = ctx
            .prompt(&self.prompt, &input)
            .await?
            .into_structured()
            .ok_or_else(|| FlowError::Internal("pest prompt returned no structured output".into()))?;

        if output["isPest"].as_bool() == Some(true) {
            self.log_identification(ctx, &photo, &input, &output).await;
        }
        Ok(output)
    }
}
