//! `askFarmAssistantFlow`: answers a question with the farm tools, then
//! speaks the answer.
//!
//! Two model calls: a text prompt that may call `getWeatherForecast` and
//! `getSystemStatus`, and an audio generation with the speech model. The raw
//! PCM that comes back is wrapped in a WAV container and returned as a data
//! URI next to the text.

use async_trait::async_trait;
use sentinel_audio::{PcmFormat, encode_wav, to_data_uri};
use sentinel_core::error::{AdapterError, RegistryError};
use sentinel_core::model::{GenerateRequest, GenerationConfig};
use sentinel_core::schema::{self, Schema};
use sentinel_tools::{system_status, weather_forecast};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{SpeechSettings, coordinates};
use crate::engine::{Flow, FlowContext};
use crate::error::FlowError;
use crate::prompt::Prompt;

pub const NAME: &str = "askFarmAssistantFlow";

const NO_AUDIO: &str = "No audio media was returned from the TTS model.";
const NO_ANSWER: &str = "The AI model did not return an answer. Please try again.";

const PROMPT: &str = "You are a friendly and helpful farm assistant named 'Sentinel'. Your goal is to answer the user's questions about their farm based on the available data from your tools.

Keep your answers concise and conversational.

User's question: \"{{question}}\"
Farm location: latitude: {{{location.latitude}}}, longitude: {{{location.longitude}}}.";

fn input_schema() -> Schema {
    schema::object()
        .field(
            "question",
            schema::string()
                .min_length(1)
                .describe("The user's question about the farm."),
        )
        .field(
            "location",
            coordinates("The latitude of the farm.", "The longitude of the farm."),
        )
        .into()
}

pub fn output_schema() -> Schema {
    schema::object()
        .field(
            "answer",
            schema::string().describe("The text response to the user's question."),
        )
        .field(
            "audioDataUri",
            schema::string().describe("The audio response as a data URI."),
        )
        .into()
}

pub struct AskFarmAssistantFlow {
    prompt: Prompt,
    input: Schema,
    output: Schema,
    speech: SpeechSettings,
}

impl AskFarmAssistantFlow {
    pub fn new(speech: SpeechSettings) -> Result<Self, RegistryError> {
        let input = input_schema();
        let prompt = Prompt::new("askFarmAssistantPrompt", PROMPT, input.clone())?
            .with_tools([weather_forecast::NAME, system_status::NAME]);
        Ok(Self {
            prompt,
            input,
            output: output_schema(),
            speech,
        })
    }

    async fn speak(&self, ctx: &FlowContext, answer: &str) -> Result<String, FlowError> {
        let request = GenerateRequest::new(answer)
            .with_model(self.speech.model.clone())
            .with_config(GenerationConfig::audio(self.speech.voice.clone()));

        let media = match ctx.generate(request).await {
            Ok(result) => result.into_media().ok_or_else(|| FlowError::precondition(NO_AUDIO))?,
            Err(AdapterError::NoOutputProduced(reason)) => {
                warn!(%reason, model = %self.speech.model, "Speech model returned no audio");
                return Err(FlowError::precondition(NO_AUDIO));
            }
            Err(e) => return Err(e.into()),
        };

        let format = PcmFormat::from_mime_type(&media.mime_type).unwrap_or_else(|e| {
            warn!(mime = %media.mime_type, error = %e, "Unrecognized audio format, assuming speech PCM");
            PcmFormat::SPEECH
        });
        let wav = encode_wav(&media.data, format)?;
        debug!(
            pcm_bytes = media.len(),
            wav_bytes = wav.len(),
            seconds = format.duration_secs(media.len()),
            "Answer spoken"
        );
        Ok(to_data_uri(&wav))
    }
}

#[async_trait]
impl Flow for AskFarmAssistantFlow {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Answers a question about the farm in text and speech."
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
        let answer = match ctx.prompt(&self.prompt, &input).await {
            Ok(result) => result.into_text().ok_or_else(|| FlowError::precondition(NO_ANSWER))?,
            Err(FlowError::Adapter(AdapterError::NoOutputProduced(reason))) => {
                warn!(%reason, "Assistant produced no answer");
                return Err(FlowError::precondition(NO_ANSWER));
            }
            Err(e) => return Err(e),
        };

        let audio = self.speak(ctx, &answer).await?;
        Ok(json!({
            "answer": answer,
            "audioDataUri": audio,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::farm::fixtures;
    use crate::testing::{ScriptedProvider, media_response, text_response, tool_call, tool_call_response};
    use sentinel_audio::WavInfo;
    use sentinel_core::media::Media;
    use sentinel_core::model::Modality;
    use std::io::Cursor;
    use std::sync::Arc;

    const L16: &str = "audio/L16;codec=pcm;rate=24000";

    fn question() -> Value {
        json!({
            "question": "Will it rain this week?",
            "location": {"latitude": 36.7378, "longitude": -119.7871}
        })
    }

    fn decode(uri: &str) -> Media {
        let media = Media::from_data_uri(uri).unwrap();
        assert_eq!(media.mime_type, "audio/wav");
        media
    }

    #[tokio::test]
    async fn answers_in_text_and_wav() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("Rain is expected at the weekend."),
            media_response(L16, vec![0u8; 48000]),
        ]));
        let engine = fixtures::engine(provider.clone(), fixtures::deps());

        let out = engine.run(NAME, question()).await.unwrap();
        assert_eq!(out["answer"], "Rain is expected at the weekend.");

        let wav = decode(out["audioDataUri"].as_str().unwrap());
        assert_eq!(wav.data.len(), 48044);
        let info = WavInfo::parse(&wav.data).unwrap();
        assert_eq!(info.format, PcmFormat::new(1, 24000, 16));
        assert_eq!(info.data_size, 48000);

        let reader = hound::WavReader::new(Cursor::new(wav.data)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 24000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 24000);
    }

    #[tokio::test]
    async fn speech_request_uses_configured_model_and_voice() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("All nodes are healthy."),
            media_response(L16, vec![0u8; 4]),
        ]));
        let speech = SpeechSettings {
            model: "tts-test".into(),
            voice: "Kore".into(),
        };
        let engine = fixtures::engine(provider.clone(), fixtures::deps().with_speech(speech));
        engine.run(NAME, question()).await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);

        let text = &requests[0];
        assert_eq!(text.tools.len(), 2);
        assert!(text.messages[0].text().contains("User's question: \"Will it rain this week?\""));
        assert!(text.messages[0].text().contains("latitude: 36.7378, longitude: -119.7871."));

        let audio = &requests[1];
        assert_eq!(audio.model, "tts-test");
        assert_eq!(audio.config.modality, Modality::Audio);
        assert_eq!(audio.config.voice.as_deref(), Some("Kore"));
        assert!(audio.tools.is_empty());
        assert_eq!(audio.messages[0].text(), "All nodes are healthy.");
    }

    #[tokio::test]
    async fn tool_calls_feed_the_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call_response(vec![tool_call(system_status::NAME, json!({}))]),
            text_response("Four nodes are offline."),
            media_response(L16, vec![0u8; 8]),
        ]));
        let engine = fixtures::engine(provider.clone(), fixtures::deps());
        let out = engine.run(NAME, question()).await.unwrap();
        assert_eq!(out["answer"], "Four nodes are offline.");

        let second = &provider.requests()[1];
        let tool_result = second.messages.last().unwrap();
        assert!(tool_result.text().contains("\"offlineNodes\":4"));
    }

    #[tokio::test]
    async fn missing_audio_is_a_precondition_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("Sunny all week."),
            text_response("I cannot speak."),
        ]));
        let engine = fixtures::engine(provider, fixtures::deps());
        let err = engine.run(NAME, question()).await.unwrap_err();
        assert!(matches!(err, FlowError::Precondition(_)));
        assert_eq!(err.public_message(NAME), NO_AUDIO);
    }

    #[tokio::test]
    async fn unknown_audio_mime_falls_back_to_speech_pcm() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("Hello."),
            media_response("application/octet-stream", vec![0u8; 10]),
        ]));
        let engine = fixtures::engine(provider, fixtures::deps());
        let out = engine.run(NAME, question()).await.unwrap();
        let wav = decode(out["audioDataUri"].as_str().unwrap());
        assert_eq!(WavInfo::parse(&wav.data).unwrap().format, PcmFormat::SPEECH);
    }

    #[tokio::test]
    async fn odd_length_pcm_fails_encoding() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("Hello."),
            media_response(L16, vec![0u8; 3]),
        ]));
        let engine = fixtures::engine(provider, fixtures::deps());
        let err = engine.run(NAME, question()).await.unwrap_err();
        assert!(matches!(err, FlowError::Encoding(_)));
    }

    #[tokio::test]
    async fn empty_question_is_invalid_input() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let engine = fixtures::engine(provider.clone(), fixtures::deps());
        let err = engine
            .run(NAME, json!({"question": "", "location": {"latitude": 0, "longitude": 0}}))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput(ref f) if f.path == "question"));
        assert_eq!(provider.call_count(), 0);
    }
}
