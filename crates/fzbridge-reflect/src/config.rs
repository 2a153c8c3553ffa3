use std::time::Duration;

use crate::convert::BUILTIN_LOCATION;

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Provider paths scanned when the converter registry is built.
    pub converter_locations: Vec<String>,
    /// Memoize converter lookups per requested mapping.
    pub cache_converters: bool,
    pub gc: GcConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            converter_locations: vec![BUILTIN_LOCATION.to_string()],
            cache_converters: true,
            gc: GcConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Adds a provider path on top of the defaults.
    pub fn with_converter_location(mut self, location: impl Into<String>) -> Self {
        self.converter_locations.push(location.into());
        self
    }
}

/// Bounds for the adaptive collection interval.
#[derive(Debug, Clone, PartialEq)]
pub struct GcConfig {
    pub initial_interval: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
    /// A cycle collecting at least this many handles shortens the interval.
    pub churn_threshold: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(30),
            min_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(300),
            churn_threshold: 1024,
        }
    }
}
