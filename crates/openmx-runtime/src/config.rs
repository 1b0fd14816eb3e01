//! Runtime configuration (openmx.toml)
//!
//! ```toml
//! [platform]
//! verbose_diagnostics = false
//! notifications = true
//!
//! [simulation]
//! heap_max = 268435456
//! processors = 0
//! ```

use crate::error::ConfigError;
use openmx_engine::PlatformConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable that forces verbose pump diagnostics
pub const VERBOSE_ENV: &str = "OPENMX_VERBOSE";

/// Whole configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Bean and pump settings
    pub platform: PlatformConfig,

    /// Simulated VM shape
    pub simulation: SimulationConfig,
}

/// Shape of the simulated VM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Heap limit in bytes
    pub heap_max: i64,

    /// Processor count; 0 means the host's count
    pub processors: i32,

    /// Installed physical memory in bytes
    pub total_physical_memory: i64,

    /// Processing capacity, percent of entitlement
    pub processing_capacity: i32,

    /// Host can change processors, capacity and memory at run time
    pub dynamic_reconfiguration: bool,

    /// VM has a JIT compiler
    pub jit: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            heap_max: 256 * 1024 * 1024,
            processors: 0,
            total_physical_memory: 8 * 1024 * 1024 * 1024,
            processing_capacity: 100,
            dynamic_reconfiguration: true,
            jit: true,
        }
    }
}

impl SimulationConfig {
    /// Processor count with 0 resolved to the host's
    pub fn effective_processors(&self) -> i32 {
        if self.processors == 0 {
            i32::try_from(num_cpus::get()).unwrap_or(i32::MAX)
        } else {
            self.processors
        }
    }
}

impl RuntimeConfig {
    /// Parse a config file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_str(&content)?;
        config.apply_env(std::env::var(VERBOSE_ENV).ok().as_deref());
        Ok(config)
    }

    /// Parse a config string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the value of `OPENMX_VERBOSE`
    pub fn apply_env(&mut self, verbose: Option<&str>) {
        if matches!(verbose, Some("1" | "true" | "yes")) {
            self.platform.verbose_diagnostics = true;
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.heap_max <= 0 {
            return Err(ConfigError::Validation(format!(
                "simulation.heap_max must be positive, got {}",
                sim.heap_max
            )));
        }
        if sim.processing_capacity <= 0 {
            return Err(ConfigError::Validation(format!(
                "simulation.processing_capacity must be positive, got {}",
                sim.processing_capacity
            )));
        }
        if sim.processors < 0 {
            return Err(ConfigError::Validation(format!(
                "simulation.processors must be 0 or positive, got {}",
                sim.processors
            )));
        }
        if sim.total_physical_memory <= 0 {
            return Err(ConfigError::Validation(format!(
                "simulation.total_physical_memory must be positive, got {}",
                sim.total_physical_memory
            )));
        }
        if self.platform.pump_thread_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "platform.pump_thread_prefix cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
