//! `predictBirdActivityFlow`: predicts the coming hours' bird activity from
//! the last day of detection counts.

use async_trait::async_trait;
use sentinel_core::error::RegistryError;
use sentinel_core::schema::{self, Schema};
use serde_json::Value;

use super::structured_or;
use crate::engine::{Flow, FlowContext};
use crate::error::FlowError;
use crate::prompt::Prompt;

pub const NAME: &str = "predictBirdActivityFlow";

const NO_OUTPUT: &str = "The AI model did not return a prediction. Please try again.";

const PROMPT: &str = "You are an expert in analyzing bird activity patterns. Given the following bird detection frequency data from the last 24 hours, predict the likely future bird activity level (low, medium, or high) for the next few hours and explain your reasoning. Look for trends, patterns, and peak activity times.

Bird Detection Frequency Data (last 24 hours):
{{#each detectionFrequency}}
- Time: {{time}}, Detections: {{detections}}
{{/each}}";

/// One detection sample, `{time, detections}`.
pub fn sample_schema() -> Schema {
    schema::object()
        .field("time", schema::string().describe("The time of day (HH:MM format)."))
        .field(
            "detections",
            schema::number().describe("The number of bird detections at this time."),
        )
        .into()
}

fn input_schema() -> Schema {
    schema::object()
        .field(
            "detectionFrequency",
            schema::array(sample_schema())
                .describe("A list of bird detection frequencies over a period of time."),
        )
        .into()
}

pub fn output_schema() -> Schema {
    schema::object()
        .field(
            "activityLevel",
            schema::enumeration(["low", "medium", "high"])
                .describe("The predicted bird activity level for the next few hours."),
        )
        .field(
            "reasoning",
            schema::string().describe("The reasoning behind the prediction, based on trends and peak times."),
        )
        .into()
}

pub struct PredictBirdActivityFlow {
    prompt: Prompt,
    input: Schema,
    output: Schema,
}

impl PredictBirdActivityFlow {
    pub fn new() -> Result<Self, RegistryError> {
        let input = input_schema();
        let output = output_schema();
        let prompt = Prompt::new("predictBirdActivityPrompt", PROMPT, input.clone())?.with_output(output.clone());
        Ok(Self { prompt, input, output })
    }
}

#[async_trait]
impl Flow for PredictBirdActivityFlow {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Predicts low, medium or high bird activity for the next few hours."
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
        structured_or(ctx.prompt(&self.prompt, &input).await, NO_OUTPUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::farm::fixtures;
    use crate::testing::{ScriptedProvider, json_response};
    use serde_json::json;
    use std::sync::Arc;

    fn samples() -> Value {
        json!({"detectionFrequency": [
            {"time": "06:00", "detections": 12},
            {"time": "08:00", "detections": 45},
            {"time": "10:00", "detections": 30}
        ]})
    }

    #[tokio::test]
    async fn renders_every_sample() {
        let provider = Arc::new(ScriptedProvider::new(vec![json_response(&json!({
            "activityLevel": "high",
            "reasoning": "Morning peak at 08:00."
        }))]));
        let engine = fixtures::engine(provider.clone(), fixtures::deps());

        let out = engine.run(NAME, samples()).await.unwrap();
        assert_eq!(out["activityLevel"], "high");

        let prompt = provider.requests()[0].messages[0].text();
        assert!(prompt.contains("- Time: 06:00, Detections: 12\n"));
        assert!(prompt.contains("- Time: 08:00, Detections: 45\n"));
        assert!(prompt.contains("- Time: 10:00, Detections: 30\n"));
        assert!(provider.requests()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn activity_level_outside_the_enum_is_rejected() {
        for level in ["LOW", "critical"] {
            let provider = Arc::new(ScriptedProvider::new(vec![json_response(&json!({
                "activityLevel": level,
                "reasoning": "…"
            }))]));
            let engine = fixtures::engine(provider, fixtures::deps());
            let err = engine.run(NAME, samples()).await.unwrap_err();
            assert!(matches!(err, FlowError::Adapter(_)), "{level} should be rejected");
        }
    }

    #[tokio::test]
    async fn empty_history_still_prompts() {
        let provider = Arc::new(ScriptedProvider::new(vec![json_response(&json!({
            "activityLevel": "low",
            "reasoning": "No detections recorded."
        }))]));
        let engine = fixtures::engine(provider.clone(), fixtures::deps());
        let out = engine.run(NAME, json!({"detectionFrequency": []})).await.unwrap();
        assert_eq!(out["activityLevel"], "low");
        assert!(
            provider.requests()[0].messages[0]
                .text()
                .ends_with("Bird Detection Frequency Data (last 24 hours):\n")
        );
    }

    #[tokio::test]
    async fn non_numeric_detections_are_invalid_input() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let engine = fixtures::engine(provider.clone(), fixtures::deps());
        let err = engine
            .run(NAME, json!({"detectionFrequency": [{"time": "06:00", "detections": "many"}]}))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput(ref f) if f.path == "detectionFrequency.0.detections"));
        assert_eq!(provider.call_count(), 0);
    }
}
