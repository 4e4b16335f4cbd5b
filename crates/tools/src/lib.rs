//! Built-in tool plugins for ragent.
//!
//! Two plugins ship with the agent: arithmetic evaluation and current
//! weather lookup.

pub mod math;
pub mod weather;

use ragent_config::ToolsConfig;
use ragent_core::tool::PluginRegistry;

pub use math::MathPlugin;
pub use weather::{OpenMeteoClient, WeatherError, WeatherPlugin};

/// Create the default registry with every built-in plugin.
///
/// Fails only if the HTTP client for the weather plugin cannot be built.
pub fn default_registry(config: &ToolsConfig) -> Result<PluginRegistry, WeatherError> {
    let mut registry = PluginRegistry::new();
    registry.register(Box::new(MathPlugin));
    registry.register(Box::new(WeatherPlugin::open_meteo(
        OpenMeteoClient::from_config(config)?,
    )));
    Ok(registry)
}

/// Integral values become JSON integers; everything else stays a float.
pub(crate) fn json_number(value: f64) -> serde_json::Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(value as i64)
    } else {
        serde_json::Value::from(value)
    }
}
