//! Class loading bean

use super::{bean_name, PLATFORM_DOMAIN};
use crate::mgmt::{ManagedBean, TableBuilder};
use crate::native::ClassLoadingBackend;
use openmx_sdk::{MgmtResult, ObjectName};
use std::sync::Arc;

/// `java.lang:type=ClassLoading`
pub struct ClassLoadingBean {
    backend: Arc<dyn ClassLoadingBackend>,
    name: Option<ObjectName>,
}

impl ClassLoadingBean {
    pub fn new(backend: Arc<dyn ClassLoadingBackend>) -> Self {
        let name = bean_name(PLATFORM_DOMAIN, &[("type", "ClassLoading")]);
        ClassLoadingBean { backend, name }
    }

    pub fn loaded_class_count(&self) -> MgmtResult<i32> {
        Ok(self.backend.loaded_class_count()?)
    }

    pub fn total_loaded_class_count(&self) -> MgmtResult<i64> {
        Ok(self.backend.total_loaded_class_count()?)
    }

    pub fn unloaded_class_count(&self) -> MgmtResult<i64> {
        Ok(self.backend.unloaded_class_count()?)
    }

    pub fn is_verbose(&self) -> MgmtResult<bool> {
        Ok(self.backend.verbose())
    }

    pub fn set_verbose(&self, verbose: bool) -> MgmtResult<()> {
        self.backend.set_verbose(verbose);
        Ok(())
    }
}

impl ManagedBean for ClassLoadingBean {
    const INTERFACE: &'static str = "java.lang.management.ClassLoadingMXBean";
    const NAME_PATTERN: &'static str = "java.lang:type=ClassLoading";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .attribute("LoadedClassCount", ClassLoadingBean::loaded_class_count)
            .attribute(
                "TotalLoadedClassCount",
                ClassLoadingBean::total_loaded_class_count,
            )
            .attribute("UnloadedClassCount", ClassLoadingBean::unloaded_class_count)
            .writable_flag(
                "Verbose",
                ClassLoadingBean::is_verbose,
                ClassLoadingBean::set_verbose,
            )
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }
}
