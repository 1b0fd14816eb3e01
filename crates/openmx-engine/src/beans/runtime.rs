//! Runtime bean: VM identity and process facts

use super::{bean_name, PLATFORM_DOMAIN};
use crate::mgmt::{ManagedBean, TableBuilder};
use crate::native::RuntimeBackend;
use openmx_sdk::{MgmtResult, ObjectName};
use std::collections::BTreeMap;
use std::sync::Arc;

/// `java.lang:type=Runtime`
pub struct RuntimeBean {
    backend: Arc<dyn RuntimeBackend>,
    name: Option<ObjectName>,
}

impl RuntimeBean {
    /// Wrap the runtime accessors
    pub fn new(backend: Arc<dyn RuntimeBackend>) -> Self {
        let name = bean_name(PLATFORM_DOMAIN, &[("type", "Runtime")]);
        RuntimeBean { backend, name }
    }

    /// `pid@hostname`
    pub fn name(&self) -> MgmtResult<String> {
        Ok(self.backend.name())
    }

    /// VM implementation name
    pub fn vm_name(&self) -> MgmtResult<String> {
        Ok(self.backend.vm_name())
    }

    /// VM implementation vendor
    pub fn vm_vendor(&self) -> MgmtResult<String> {
        Ok(self.backend.vm_vendor())
    }

    /// VM implementation version
    pub fn vm_version(&self) -> MgmtResult<String> {
        Ok(self.backend.vm_version())
    }

    /// Specification name
    pub fn spec_name(&self) -> MgmtResult<String> {
        Ok(self.backend.spec_name())
    }

    /// Specification vendor
    pub fn spec_vendor(&self) -> MgmtResult<String> {
        Ok(self.backend.spec_vendor())
    }

    /// Specification version
    pub fn spec_version(&self) -> MgmtResult<String> {
        Ok(self.backend.spec_version())
    }

    /// VM launch arguments
    pub fn input_arguments(&self) -> MgmtResult<Vec<String>> {
        Ok(self.backend.input_arguments())
    }

    /// Milliseconds since start
    pub fn uptime(&self) -> MgmtResult<i64> {
        Ok(self.backend.uptime()?)
    }

    /// Start time, ms since the epoch
    pub fn start_time(&self) -> MgmtResult<i64> {
        Ok(self.backend.start_time()?)
    }

    /// System properties as a key/value table
    pub fn system_properties(&self) -> MgmtResult<BTreeMap<String, String>> {
        Ok(self.backend.system_properties()?)
    }

    /// Process id
    pub fn process_id(&self) -> MgmtResult<i64> {
        Ok(self.backend.process_id()?)
    }

    /// Recent CPU load of the VM process, 0.0 to 1.0
    pub fn cpu_load(&self) -> MgmtResult<f64> {
        Ok(self.backend.cpu_load()?)
    }
}

impl ManagedBean for RuntimeBean {
    const INTERFACE: &'static str = "java.lang.management.RuntimeMXBean";
    const NAME_PATTERN: &'static str = "java.lang:type=Runtime";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .attribute("Name", RuntimeBean::name)
            .attribute("VmName", RuntimeBean::vm_name)
            .attribute("VmVendor", RuntimeBean::vm_vendor)
            .attribute("VmVersion", RuntimeBean::vm_version)
            .attribute("SpecName", RuntimeBean::spec_name)
            .attribute("SpecVendor", RuntimeBean::spec_vendor)
            .attribute("SpecVersion", RuntimeBean::spec_version)
            .attribute("InputArguments", RuntimeBean::input_arguments)
            .attribute("Uptime", RuntimeBean::uptime)
            .attribute("StartTime", RuntimeBean::start_time)
            .attribute("SystemProperties", RuntimeBean::system_properties)
            .attribute("ProcessId", RuntimeBean::process_id)
            .attribute("CpuLoad", RuntimeBean::cpu_load)
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }
}
