//! Farm tools for Sentinel flows.
//!
//! Tools give the model typed access to farm state: the weekly weather
//! forecast for a location and the health of the sensor network. Each tool
//! reads through a data-source trait so deployments can plug in live
//! services while tests and the demo CLI use deterministic fixtures.

pub mod farm_data;
pub mod system_status;
pub mod weather_forecast;

use std::sync::Arc;

use sentinel_core::error::RegistryError;
use sentinel_core::tool::ToolRegistry;

pub use farm_data::{FarmDataSource, StaticFarmData};
pub use system_status::{SystemStatus, SystemStatusTool};
pub use weather_forecast::{ForecastSource, SyntheticForecast, WeatherForecastTool};

/// Create a registry with both farm tools.
pub fn default_registry(
    forecast: Arc<dyn ForecastSource>,
    farm: Arc<dyn FarmDataSource>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(WeatherForecastTool::new(forecast)))?;
    registry.register(Box::new(SystemStatusTool::new(farm)))?;
    Ok(registry)
}
