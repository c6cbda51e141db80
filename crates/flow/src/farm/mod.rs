//! The farm flows: weather summary, pest identification, bird activity
//! prediction, the daily briefing and the spoken farm assistant.
//!
//! [`register_farm_flows`] wires all five, plus the two tools they use,
//! into an engine builder.

pub mod assistant;
pub mod bird_activity;
pub mod briefing;
pub mod pest;
pub mod weather_summary;

use std::sync::Arc;

use sentinel_config::AppConfig;
use sentinel_core::error::{AdapterError, RegistryError};
use sentinel_core::model::InvocationResult;
use sentinel_core::schema::{self, ObjectSchema};
use sentinel_tools::{FarmDataSource, ForecastSource, SystemStatusTool, WeatherForecastTool};
use serde_json::Value;

use crate::engine::FlowEngineBuilder;
use crate::error::FlowError;

pub use assistant::AskFarmAssistantFlow;
pub use bird_activity::PredictBirdActivityFlow;
pub use briefing::DailyBriefingFlow;
pub use pest::{IdentifyPestFlow, InMemoryPestLog, PestLog, PestLogEntry, PestLogError};
pub use weather_summary::WeatherSummaryFlow;

/// Which model speaks the assistant's answers, and in which voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechSettings {
    pub model: String,
    pub voice: String,
}

impl SpeechSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.tts_model.clone(),
            voice: config.model.voice.clone(),
        }
    }
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Collaborators the farm flows and tools read from.
#[derive(Clone)]
pub struct FarmDeps {
    pub forecast: Arc<dyn ForecastSource>,
    pub farm: Arc<dyn FarmDataSource>,
    pub pest_log: Option<Arc<dyn PestLog>>,
    pub speech: SpeechSettings,
}

impl FarmDeps {
    pub fn new(forecast: Arc<dyn ForecastSource>, farm: Arc<dyn FarmDataSource>) -> Self {
        Self {
            forecast,
            farm,
            pest_log: None,
            speech: SpeechSettings::default(),
        }
    }

    pub fn with_pest_log(mut self, log: Arc<dyn PestLog>) -> Self {
        self.pest_log = Some(log);
        self
    }

    pub fn with_speech(mut self, speech: SpeechSettings) -> Self {
        self.speech = speech;
        self
    }
}

/// Register the farm tools and all five farm flows.
pub fn register_farm_flows(builder: FlowEngineBuilder, deps: FarmDeps) -> Result<FlowEngineBuilder, RegistryError> {
    Ok(builder
        .tool(WeatherForecastTool::new(deps.forecast))
        .tool(SystemStatusTool::new(deps.farm.clone()))
        .flow(WeatherSummaryFlow::new()?)
        .flow(IdentifyPestFlow::new(deps.pest_log)?)
        .flow(PredictBirdActivityFlow::new()?)
        .flow(DailyBriefingFlow::new(deps.farm)?)
        .flow(AskFarmAssistantFlow::new(deps.speech)?))
}

/// `{latitude, longitude}` as flows accept it.
fn coordinates(latitude: &str, longitude: &str) -> ObjectSchema {
    schema::object()
        .field("latitude", schema::number().range(-90.0, 90.0).describe(latitude))
        .field("longitude", schema::number().range(-180.0, 180.0).describe(longitude))
}

/// The structured answer of a prompt run; a model that produced nothing
/// usable becomes a precondition failure carrying `message`.
fn structured_or(result: Result<InvocationResult, FlowError>, message: &str) -> Result<Value, FlowError> {
    match result {
        Ok(result) => result
            .into_structured()
            .ok_or_else(|| FlowError::precondition(message)),
        Err(FlowError::Adapter(AdapterError::NoOutputProduced(reason))) => {
            tracing::warn!(%reason, "Model produced no output");
            Err(FlowError::precondition(message))
        }
        Err(e) => Err(e),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FlowEngine;
    use crate::testing::ScriptedProvider;

    #[test]
    fn registers_all_flows_and_tools() {
        let engine = fixtures::engine(Arc::new(ScriptedProvider::new(vec![])), fixtures::deps());
        assert_eq!(
            engine.flow_names(),
            vec![
                "askFarmAssistantFlow",
                "dailyBriefingFlow",
                "identifyPestFlow",
                "predictBirdActivityFlow",
                "weatherSummaryFlow",
            ]
        );
        assert_eq!(engine.tools().names(), vec!["getSystemStatus", "getWeatherForecast"]);
    }

    #[test]
    fn registering_twice_is_rejected() {
        let builder = register_farm_flows(FlowEngine::builder(), fixtures::deps()).unwrap();
        let err = register_farm_flows(builder, fixtures::deps())
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool(_)));
    }

    #[test]
    fn speech_defaults_follow_config() {
        let speech = SpeechSettings::default();
        assert_eq!(speech.model, "gemini-2.5-flash-preview-tts");
        assert_eq!(speech.voice, "Algenib");
    }
}
