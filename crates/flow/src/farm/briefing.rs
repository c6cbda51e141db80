//! `dailyBriefingFlow`: gathers forecast, system status and bird detections,
//! then asks the model for a short briefing.

use std::sync::Arc;

use async_trait::async_trait;
use sentinel_core::error::RegistryError;
use sentinel_core::schema::{self, Schema};
use sentinel_tools::FarmDataSource;
use sentinel_tools::system_status::{self, status_schema};
use sentinel_tools::weather_forecast::{self, forecast_day_schema};
use serde_json::{Value, json};
use tracing::debug;

use super::bird_activity::sample_schema;
use super::{coordinates, structured_or};
use crate::engine::{Flow, FlowContext};
use crate::error::FlowError;
use crate::prompt::Prompt;

pub const NAME: &str = "dailyBriefingFlow";

const NO_OUTPUT: &str = "The AI model failed to generate a briefing. Please try again.";

const PROMPT: &str = "You are an agricultural assistant. Your task is to provide a daily briefing for a farmer based on the data provided.

- Analyze the provided weather, system status, and bird detection data.
- Use this information to generate a farmer-friendly briefing in the required JSON format.

Weather Forecast Data:
{{{json weatherForecast}}}

System Status Data:
{{{json systemStatus}}}

Bird Detection Frequency Data (last 24 hours):
{{#each detectionFrequency}}
- Time: {{time}}, Detections: {{detections}}
{{/each}}";

fn input_schema() -> Schema {
    schema::object()
        .field(
            "location",
            coordinates("The latitude of the farm.", "The longitude of the farm."),
        )
        .into()
}

fn prompt_schema() -> Schema {
    schema::object()
        .field("weatherForecast", schema::array(forecast_day_schema()))
        .field("systemStatus", status_schema())
        .field("detectionFrequency", schema::array(sample_schema()))
        .into()
}

fn section(field: &str, description: &str) -> Schema {
    schema::object()
        .field(field, schema::string().describe(description))
        .into()
}

pub fn output_schema() -> Schema {
    schema::object()
        .field(
            "weather",
            section(
                "summary",
                "A very concise, farmer-friendly summary of the day's weather. Mention temperature, chance of rain, and wind.",
            ),
        )
        .field(
            "birdActivity",
            section(
                "prediction",
                "A prediction of bird activity for the day, including the expected level (e.g., low, high) and a brief reason.",
            ),
        )
        .field(
            "systemStatus",
            section(
                "summary",
                "A summary of the system status, mentioning the number of offline nodes and any critical alerts. If all is well, state that the system is operating normally.",
            ),
        )
        .into()
}

pub struct DailyBriefingFlow {
    prompt: Prompt,
    input: Schema,
    output: Schema,
    farm: Arc<dyn FarmDataSource>,
}

impl DailyBriefingFlow {
    pub fn new(farm: Arc<dyn FarmDataSource>) -> Result<Self, RegistryError> {
        let output = output_schema();
        let prompt = Prompt::new("dailyBriefingPrompt", PROMPT, prompt_schema())?.with_output(output.clone());
        Ok(Self {
            prompt,
            input: input_schema(),
            output,
            farm,
        })
    }
}

#[async_trait]
impl Flow for DailyBriefingFlow {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "A daily farm briefing covering weather, bird activity and system status."
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
        let (forecast, status, detections) = futures::try_join!(
            ctx.call_tool(weather_forecast::NAME, input["location"].clone()),
            ctx.call_tool(system_status::NAME, json!({})),
            self.farm.detection_frequency(),
        )?;
        debug!(samples = detections.len(), "Briefing data gathered");

        let detections =
            serde_json::to_value(detections).map_err(|e| FlowError::Internal(format!("detection samples: {e}")))?;
        let prompt_input = json!({
            "weatherForecast": forecast,
            "systemStatus": status,
            "detectionFrequency": detections,
        });
        structured_or(ctx.prompt(&self.prompt, &prompt_input).await, NO_OUTPUT)
    }
}
