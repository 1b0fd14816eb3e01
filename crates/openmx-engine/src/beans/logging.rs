//! Logging bean: logger levels by name

use crate::mgmt::{Impact, ManagedBean, TableBuilder};
use crate::native::LoggingBackend;
use openmx_sdk::{open_enum, MgmtError, MgmtResult, ObjectName, OpenEnum};
use std::sync::Arc;

/// Level names a logger accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Severe,
    Warning,
    Info,
    Config,
    Fine,
    Finer,
    Finest,
    All,
}

open_enum!(LogLevel {
    Off => "OFF",
    Severe => "SEVERE",
    Warning => "WARNING",
    Info => "INFO",
    Config => "CONFIG",
    Fine => "FINE",
    Finer => "FINER",
    Finest => "FINEST",
    All => "ALL",
});

/// `java.util.logging:type=Logging`
pub struct LoggingBean {
    backend: Arc<dyn LoggingBackend>,
    name: Option<ObjectName>,
}

impl LoggingBean {
    pub fn new(backend: Arc<dyn LoggingBackend>) -> Self {
        let name = super::bean_name("java.util.logging", &[("type", "Logging")]);
        LoggingBean { backend, name }
    }

    /// Registered logger names
    pub fn logger_names(&self) -> MgmtResult<Vec<String>> {
        Ok(self.backend.logger_names())
    }

    /// Level set on a logger; empty if it inherits, `None` if the logger does not exist
    pub fn logger_level(&self, logger: &str) -> MgmtResult<Option<String>> {
        Ok(self.backend.logger_level(logger))
    }

    /// Set or clear (`None`) a logger's level
    pub fn set_logger_level(&self, logger: &str, level: Option<&str>) -> MgmtResult<()> {
        if self.backend.logger_level(logger).is_none() {
            return Err(MgmtError::InvalidArgument {
                operation: "setLoggerLevel".to_string(),
                index: 0,
                reason: format!("logger `{}` does not exist", logger),
            });
        }
        if let Some(level) = level {
            if LogLevel::from_name(level).is_none() {
                return Err(MgmtError::InvalidArgument {
                    operation: "setLoggerLevel".to_string(),
                    index: 1,
                    reason: format!("unknown level `{}`", level),
                });
            }
        }
        Ok(self.backend.set_logger_level(logger, level)?)
    }

    /// Parent of a logger; empty for the root, `None` if the logger does not exist
    pub fn parent_logger_name(&self, logger: &str) -> MgmtResult<Option<String>> {
        Ok(self.backend.parent_logger_name(logger))
    }
}

impl ManagedBean for LoggingBean {
    const INTERFACE: &'static str = "java.util.logging.LoggingMXBean";
    const NAME_PATTERN: &'static str = "java.util.logging:type=Logging";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .attribute("LoggerNames", LoggingBean::logger_names)
            .operation(
                "getLoggerLevel",
                Impact::Info,
                |bean: &Self, (logger,): (String,)| bean.logger_level(&logger),
            )
            .operation(
                "setLoggerLevel",
                Impact::Action,
                |bean: &Self, (logger, level): (String, Option<String>)| {
                    bean.set_logger_level(&logger, level.as_deref())
                },
            )
            .operation(
                "getParentLoggerName",
                Impact::Info,
                |bean: &Self, (logger,): (String,)| bean.parent_logger_name(&logger),
            )
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }
}
