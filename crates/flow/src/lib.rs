//! # Sentinel Flow
//!
//! Schema-typed flows over a generative model.
//!
//! A [`Flow`] has a name, an input schema, an output schema and an async
//! body. The [`FlowEngine`] validates input, runs the body and validates the
//! body's output before anything reaches the caller. Bodies talk to the model
//! through [`ModelAdapter`], which runs a bounded tool-calling loop against
//! the engine's tool registry, and can call tools or other flows directly
//! through their [`FlowContext`].
//!
//! The farm flows live in [`farm`]; [`register_farm_flows`] adds them and
//! their tools to a builder:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use sentinel_flow::{FarmDeps, FlowEngine, register_farm_flows};
//! # use sentinel_tools::{StaticFarmData, SyntheticForecast};
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let deps = FarmDeps::new(
//!     Arc::new(SyntheticForecast::starting_today()),
//!     Arc::new(StaticFarmData::new()),
//! );
//! let engine = register_farm_flows(FlowEngine::builder(), deps)?.build()?;
//! let summary = engine
//!     .run("weatherSummaryFlow", serde_json::json!({"latitude": 36.7, "longitude": -119.8}))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod farm;
pub mod generate;
pub mod prompt;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use engine::{Flow, FlowContext, FlowEngine, FlowEngineBuilder, FlowInfo, FlowResponse};
pub use error::FlowError;
pub use farm::{FarmDeps, SpeechSettings, register_farm_flows};
pub use generate::ModelAdapter;
pub use prompt::Prompt;
