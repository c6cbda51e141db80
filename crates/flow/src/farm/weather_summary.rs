//! `weatherSummaryFlow`: the week's forecast with a farmer-friendly summary.

use async_trait::async_trait;
use sentinel_core::error::RegistryError;
use sentinel_core::schema::{self, Schema};
use sentinel_tools::weather_forecast;
use serde_json::Value;

use super::{coordinates, structured_or};
use crate::engine::{Flow, FlowContext};
use crate::error::FlowError;
use crate::prompt::Prompt;

pub const NAME: &str = "weatherSummaryFlow";

const NO_OUTPUT: &str = "The AI model did not return a valid output. Please try again.";

const PROMPT: &str = "You are a helpful agricultural assistant. The user wants to know the weather forecast for their farm at latitude: {{{latitude}}}, longitude: {{{longitude}}}.

1. Use the getWeatherForecast tool to get the 7-day forecast for the provided coordinates.
2. Analyze the forecast data you receive from the tool.
3. Based on the data, generate a concise, farmer-friendly summary. Highlight important events like upcoming rain, frost risks (if temperatures are low), high wind speeds, or drastic temperature shifts.
4. Also, return the structured forecast data you received from the tool.

Do not make up weather data. Only use the data returned by the tool. Address the user in a helpful and direct tone.";

pub fn output_schema() -> Schema {
    let day = schema::object()
        .field("date", schema::string().describe("The date of the forecast in ISO format."))
        .field("tempHigh", schema::number().describe("The high temperature in Celsius."))
        .field("tempLow", schema::number().describe("The low temperature in Celsius."))
        .field("precipitation", schema::number().describe("The precipitation amount in mm."))
        .field(
            "condition",
            schema::string().describe("A brief description of the weather condition."),
        );
    schema::object()
        .field(
            "summary",
            schema::string().describe(
                "A farmer-friendly summary of the upcoming week's weather, highlighting key events like rain, high winds, or significant temperature changes.",
            ),
        )
        .field(
            "forecast",
            schema::array(day).describe("The structured 7-day forecast data."),
        )
        .into()
}

pub struct WeatherSummaryFlow {
    prompt: Prompt,
    input: Schema,
    output: Schema,
}

impl WeatherSummaryFlow {
    pub fn new() -> Result<Self, RegistryError> {
        let input: Schema = coordinates(
            "The latitude for the weather forecast.",
            "The longitude for the weather forecast.",
        )
        .into();
        let output = output_schema();
        let prompt = Prompt::new("weatherSummaryPrompt", PROMPT, input.clone())?
            .with_tools([weather_forecast::NAME])
            .with_output(output.clone());
        Ok(Self { prompt, input, output })
    }
}

#[async_trait]
impl Flow for WeatherSummaryFlow {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Gets the 7-day forecast for a location and summarizes it for a farmer."
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
