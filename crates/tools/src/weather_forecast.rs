//! Weekly weather forecast tool.
//!
//! The tool validates coordinates and delegates to a [`ForecastSource`].
//! The bundled [`SyntheticForecast`] needs no network access: it produces a
//! plausible week (dry start, clouds mid-week, rain at the end) that is
//! deterministic for a given location and start instant, so the flows built
//! on it can be tested end-to-end.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sentinel_core::error::ToolError;
use sentinel_core::schema::{self, ObjectSchema, Schema};
use sentinel_core::tool::Tool;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::farm_data::reference_instant;

pub const NAME: &str = "getWeatherForecast";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Sunny,
    Cloudy,
    Rain,
    Thunderstorm,
    Snow,
}

impl Condition {
    pub const ALL: [&'static str; 5] = ["Sunny", "Cloudy", "Rain", "Thunderstorm", "Snow"];
}

/// One day of forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastDay {
    /// ISO-8601 timestamp of the forecast day
    pub date: String,
    /// °C
    pub temp_high: f64,
    /// °C
    pub temp_low: f64,
    /// mm
    pub precipitation: f64,
    /// km/h
    pub wind_speed: f64,
    pub condition: Condition,
}

/// Where forecasts come from.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn weekly_forecast(&self, latitude: f64, longitude: f64) -> Result<Vec<ForecastDay>, ToolError>;
}

/// Offline forecast generator.
#[derive(Debug, Clone)]
pub struct SyntheticForecast {
    start: DateTime<Utc>,
    days: u32,
}

impl SyntheticForecast {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { start, days: 7 }
    }

    /// A week starting at noon UTC today.
    pub fn starting_today() -> Self {
        let start = Utc::now()
            .date_naive()
            .and_hms_opt(12, 0, 0)
            .map(|noon| noon.and_utc())
            .unwrap_or_else(Utc::now);
        Self::new(start)
    }

    pub fn days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    fn day(&self, i: u32, latitude: f64, longitude: f64) -> ForecastDay {
        let x = f64::from(i);
        let noise = |salt: f64| jitter(latitude, longitude, x, salt);

        let condition = match i {
            0..=2 => Condition::Sunny,
            3..=4 => Condition::Cloudy,
            _ => Condition::Rain,
        };

        let temp_high = 25.0 + x.sin() * 5.0 + noise(1.0) * 2.0;
        let temp_low = 15.0 + x.sin() * 4.0 + noise(2.0) * 2.0;
        let precipitation = ((x * 1.5).cos() * 10.0 + (noise(3.0) - 0.2) * 5.0).max(0.0);
        let wind_speed = 10.0 + (noise(4.0) + 0.5) * 15.0;

        ForecastDay {
            date: (self.start + Duration::days(i64::from(i))).to_rfc3339_opts(SecondsFormat::Millis, true),
            temp_high: temp_high.round(),
            temp_low: temp_low.round(),
            precipitation: (precipitation * 10.0).round() / 10.0,
            wind_speed: wind_speed.round(),
            condition,
        }
    }
}

impl Default for SyntheticForecast {
    fn default() -> Self {
        Self::new(reference_instant())
    }
}

#[async_trait]
impl ForecastSource for SyntheticForecast {
    async fn weekly_forecast(&self, latitude: f64, longitude: f64) -> Result<Vec<ForecastDay>, ToolError> {
        tracing::debug!(latitude, longitude, days = self.days, "Generating synthetic forecast");
        Ok((0..self.days).map(|i| self.day(i, latitude, longitude)).collect())
    }
}

/// Deterministic pseudo-noise in `[-0.5, 0.5)`.
fn jitter(latitude: f64, longitude: f64, day: f64, salt: f64) -> f64 {
    let seed = latitude * 12.9898 + longitude * 78.233 + day * 37.719 + salt * 11.131;
    (seed.sin() * 43_758.545_3).fract().abs() - 0.5
}

/// `{latitude, longitude}` with range checks.
pub fn location_schema() -> ObjectSchema {
    schema::object()
        .field(
            "latitude",
            schema::number().range(-90.0, 90.0).describe("The latitude of the location."),
        )
        .field(
            "longitude",
            schema::number().range(-180.0, 180.0).describe("The longitude of the location."),
        )
}

/// One forecast entry as returned by the tool.
pub fn forecast_day_schema() -> ObjectSchema {
    schema::object()
        .field("date", schema::string().describe("The date of the forecast in ISO format."))
        .field("tempHigh", schema::number().describe("The high temperature in Celsius."))
        .field("tempLow", schema::number().describe("The low temperature in Celsius."))
        .field(
            "precipitation",
            schema::number().minimum(0.0).describe("The precipitation amount in millimeters."),
        )
        .field(
            "windSpeed",
            schema::number().minimum(0.0).describe("The wind speed in kilometers per hour."),
        )
        .field(
            "condition",
            schema::enumeration(Condition::ALL).describe("A brief description of the weather condition."),
        )
}

pub struct WeatherForecastTool {
    source: Arc<dyn ForecastSource>,
    input: Schema,
    output: Schema,
}

impl WeatherForecastTool {
    pub fn new(source: Arc<dyn ForecastSource>) -> Self {
        Self {
            source,
            input: location_schema().into(),
            output: schema::array(forecast_day_schema()).into(),
        }
    }
}

#[async_trait]
impl Tool for WeatherForecastTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Returns the 7-day weather forecast for a given geographical location."
    }

    fn input_schema(&self) -> &Schema {
        &self.input
    }

    fn output_schema(&self) -> &Schema {
        &self.output
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let latitude = arguments["latitude"].as_f64().unwrap_or_default();
        let longitude = arguments["longitude"].as_f64().unwrap_or_default();

        let forecast = self.source.weekly_forecast(latitude, longitude).await?;
        serde_json::to_value(&forecast).map_err(|e| ToolError::ExecutionFailed {
            tool: NAME.into(),
            reason: e.to_string(),
        })
    }
}
