//! Subcommand implementations and the plumbing they share.

pub mod doctor;
pub mod farm;
pub mod flows;
pub mod onboard;
pub mod run;
pub mod serve;
pub mod wav;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use sentinel_config::AppConfig;
use sentinel_flow::farm::InMemoryPestLog;
use sentinel_flow::{FarmDeps, FlowEngine, FlowEngineBuilder, SpeechSettings, register_farm_flows};
use sentinel_tools::{StaticFarmData, SyntheticForecast};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, warn};

/// Global options every command sees.
pub struct Context {
    config_path: Option<PathBuf>,
    verbose: bool,
}

impl Context {
    pub fn new(config_path: Option<PathBuf>, verbose: bool) -> Self {
        Self { config_path, verbose }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
    }

    /// Load the config file (defaults if absent) with environment overrides.
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        load_config(&self.config_path())
    }

    /// Build the engine with the farm flows over the bundled demo data.
    pub fn engine(&self, config: &AppConfig) -> anyhow::Result<FlowEngine> {
        let engine = build_engine(config)?;
        if self.verbose {
            spawn_event_logger(&engine);
        }
        Ok(engine)
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_from(path).with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

/// Engine over the configured provider with the farm flows registered.
///
/// A missing provider is not fatal: flows that never call the model still
/// run, the rest fail with a provider error.
pub fn build_engine(config: &AppConfig) -> anyhow::Result<FlowEngine> {
    let mut builder = FlowEngineBuilder::from_config(config);
    match sentinel_providers::build_from_config(config) {
        Ok(provider) => builder = builder.with_provider(provider),
        Err(e) => warn!(error = %e, "No model provider available"),
    }

    let deps = FarmDeps::new(
        Arc::new(SyntheticForecast::starting_today()),
        Arc::new(StaticFarmData::anchored_at(Utc::now())),
    )
    .with_pest_log(Arc::new(InMemoryPestLog::new()))
    .with_speech(SpeechSettings::from_config(config));

    let engine = register_farm_flows(builder, deps)
        .context("Failed to register farm flows")?
        .build()
        .context("Failed to build flow engine")?;
    Ok(engine)
}

fn spawn_event_logger(engine: &FlowEngine) {
    let mut rx = engine.events().subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(event = ?event, "Domain event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event logger fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Run a flow; failures are logged in full and reported by their public message.
pub async fn run_flow(engine: &FlowEngine, name: &str, input: Value) -> anyhow::Result<Value> {
    engine.run(name, input).await.map_err(|e| {
        error!(flow = %name, error = %e, "Flow failed");
        anyhow::anyhow!(e.public_message(name))
    })
}

/// `{latitude, longitude}` from the flags, falling back to the configured farm.
pub fn location(config: &AppConfig, lat: Option<f64>, lon: Option<f64>) -> Value {
    serde_json::json!({
        "latitude": lat.unwrap_or(config.farm.latitude),
        "longitude": lon.unwrap_or(config.farm.longitude),
    })
}

pub fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
