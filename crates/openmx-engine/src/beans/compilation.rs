//! JIT compilation bean; absent on VMs without a compiler

use super::{bean_name, PLATFORM_DOMAIN};
use crate::mgmt::{ManagedBean, TableBuilder};
use crate::native::CompilationBackend;
use openmx_sdk::{MgmtError, MgmtResult, ObjectName};
use std::sync::Arc;

/// `java.lang:type=Compilation`
pub struct CompilationBean {
    backend: Arc<dyn CompilationBackend>,
    name: Option<ObjectName>,
}

impl CompilationBean {
    pub fn new(backend: Arc<dyn CompilationBackend>) -> Self {
        let name = bean_name(PLATFORM_DOMAIN, &[("type", "Compilation")]);
        CompilationBean { backend, name }
    }

    /// Compiler name
    pub fn name(&self) -> MgmtResult<String> {
        Ok(self.backend.name())
    }

    pub fn is_compilation_time_monitoring_supported(&self) -> MgmtResult<bool> {
        Ok(self.backend.time_monitoring_supported())
    }

    /// Accumulated compilation time in milliseconds
    pub fn total_compilation_time(&self) -> MgmtResult<i64> {
        if !self.backend.time_monitoring_supported() {
            return Err(MgmtError::UnsupportedOperation(
                "compilation time monitoring is not supported".to_string(),
            ));
        }
        Ok(self.backend.total_compilation_time()?)
    }
}

impl ManagedBean for CompilationBean {
    const INTERFACE: &'static str = "java.lang.management.CompilationMXBean";
    const NAME_PATTERN: &'static str = "java.lang:type=Compilation";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .attribute("Name", CompilationBean::name)
            .flag(
                "CompilationTimeMonitoringSupported",
                CompilationBean::is_compilation_time_monitoring_supported,
            )
            .attribute("TotalCompilationTime", CompilationBean::total_compilation_time)
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }
}
