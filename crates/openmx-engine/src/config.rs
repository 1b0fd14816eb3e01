//! Platform settings (the `[platform]` table of `openmx.toml`)

use serde::{Deserialize, Serialize};

/// Settings that shape how the platform builds beans and pumps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlatformConfig {
    /// Log events that pumps drop (undecodable or discarded at shutdown)
    pub verbose_diagnostics: bool,

    /// Prefix of pump thread names
    pub pump_thread_prefix: String,

    /// Create notification pumps at all
    pub notifications: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            verbose_diagnostics: false,
            pump_thread_prefix: default_pump_thread_prefix(),
            notifications: true,
        }
    }
}

fn default_pump_thread_prefix() -> String {
    "openmx-pump".to_string()
}

impl PlatformConfig {
    /// Thread name of the pump for `source`
    pub fn pump_thread_name(&self, source: &str) -> String {
        format!("{}-{}", self.pump_thread_prefix, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlatformConfig::default();
        assert!(config.notifications);
        assert!(!config.verbose_diagnostics);
        assert_eq!(config.pump_thread_name("memory"), "openmx-pump-memory");
    }
}
