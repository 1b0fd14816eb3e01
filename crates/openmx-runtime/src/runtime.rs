//! A platform bound to a simulated VM

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::sim::SimulatedVm;
use openmx_engine::{Platform, VmBackend};
use std::path::Path;
use std::sync::Arc;

/// A booted simulated VM and the platform exposing it
pub struct Runtime {
    config: RuntimeConfig,
    vm: Arc<SimulatedVm>,
    platform: Platform,
}

impl Runtime {
    /// Boot a VM and build its platform
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let vm = Arc::new(SimulatedVm::new(&config.simulation));
        let backend: Arc<dyn VmBackend> = vm.clone();
        let platform = Platform::new(backend, config.platform.clone());
        tracing::debug!(
            notifications = config.platform.notifications,
            "runtime ready"
        );
        Ok(Runtime {
            config,
            vm,
            platform,
        })
    }

    /// Boot from an `openmx.toml`
    pub fn from_config(path: &Path) -> Result<Self, RuntimeError> {
        Self::new(RuntimeConfig::from_file(path)?)
    }

    /// The bean registry
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// The simulated VM, for driving workloads
    pub fn vm(&self) -> &Arc<SimulatedVm> {
        &self.vm
    }

    /// Settings in effect
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Stop every notification pump; idempotent
    pub fn shutdown(&self) {
        self.platform.shutdown();
    }
}
