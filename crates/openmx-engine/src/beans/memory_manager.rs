//! Memory manager and garbage collector beans

use super::{bean_name, PLATFORM_DOMAIN};
use crate::mgmt::{ManagedBean, TableBuilder};
use crate::native::{CollectorBackend, ManagerBackend};
use crate::records::GcInfo;
use openmx_sdk::{MgmtResult, ObjectName};
use std::sync::Arc;

fn pool_names(manager: &dyn ManagerBackend) -> Vec<String> {
    manager.pools().iter().map(|pool| pool.name()).collect()
}

/// `java.lang:type=MemoryManager,name=<manager>`
pub struct MemoryManagerBean {
    backend: Arc<dyn ManagerBackend>,
    name: Option<ObjectName>,
}

impl MemoryManagerBean {
    /// Wrap a manager that does not collect
    pub fn new(backend: Arc<dyn ManagerBackend>) -> Self {
        let manager = backend.name();
        let name = bean_name(PLATFORM_DOMAIN, &[("type", "MemoryManager"), ("name", &manager)]);
        MemoryManagerBean { backend, name }
    }

    /// Manager name
    pub fn name(&self) -> MgmtResult<String> {
        Ok(self.backend.name())
    }

    /// Manager is still in use by the VM
    pub fn is_valid(&self) -> MgmtResult<bool> {
        Ok(self.backend.is_valid())
    }

    /// Names of the managed pools
    pub fn memory_pool_names(&self) -> MgmtResult<Vec<String>> {
        Ok(pool_names(self.backend.as_ref()))
    }
}

impl ManagedBean for MemoryManagerBean {
    const INTERFACE: &'static str = "java.lang.management.MemoryManagerMXBean";
    const NAME_PATTERN: &'static str = "java.lang:type=MemoryManager,name=*";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .attribute("Name", MemoryManagerBean::name)
            .flag("Valid", MemoryManagerBean::is_valid)
            .attribute("MemoryPoolNames", MemoryManagerBean::memory_pool_names)
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }
}

/// `java.lang:type=GarbageCollector,name=<collector>`
pub struct GarbageCollectorBean {
    backend: Arc<dyn CollectorBackend>,
    name: Option<ObjectName>,
}

impl GarbageCollectorBean {
    /// Wrap a collector
    pub fn new(backend: Arc<dyn CollectorBackend>) -> Self {
        let collector = backend.name();
        let name = bean_name(
            PLATFORM_DOMAIN,
            &[("type", "GarbageCollector"), ("name", &collector)],
        );
        GarbageCollectorBean { backend, name }
    }

    /// Collector name
    pub fn name(&self) -> MgmtResult<String> {
        Ok(self.backend.name())
    }

    /// Collector is still in use by the VM
    pub fn is_valid(&self) -> MgmtResult<bool> {
        Ok(self.backend.is_valid())
    }

    /// Names of the collected pools
    pub fn memory_pool_names(&self) -> MgmtResult<Vec<String>> {
        Ok(self
            .backend
            .pools()
            .iter()
            .map(|pool| pool.name())
            .collect())
    }

    /// Collections so far
    pub fn collection_count(&self) -> MgmtResult<i64> {
        Ok(self.backend.collection_count()?)
    }

    /// Accumulated collection time in milliseconds
    pub fn collection_time(&self) -> MgmtResult<i64> {
        Ok(self.backend.collection_time()?)
    }

    /// Start of the last collection, ms since VM start
    pub fn last_collection_start_time(&self) -> MgmtResult<i64> {
        Ok(self.backend.last_collection_start_time()?)
    }

    /// End of the last collection, ms since VM start
    pub fn last_collection_end_time(&self) -> MgmtResult<i64> {
        Ok(self.backend.last_collection_end_time()?)
    }

    /// Bytes freed by all collections
    pub fn total_memory_freed(&self) -> MgmtResult<i64> {
        Ok(self.backend.total_memory_freed()?)
    }

    /// Compacting collections so far
    pub fn total_compacts(&self) -> MgmtResult<i64> {
        Ok(self.backend.total_compacts()?)
    }

    /// Bytes in use in the collected pools
    pub fn memory_used(&self) -> MgmtResult<i64> {
        Ok(self.backend.memory_used()?)
    }

    /// Details of the last collection; `None` before the first one
    pub fn last_gc_info(&self) -> MgmtResult<Option<GcInfo>> {
        Ok(self.backend.last_gc_info()?)
    }
}

impl ManagedBean for GarbageCollectorBean {
    const INTERFACE: &'static str = "java.lang.management.GarbageCollectorMXBean";
    const NAME_PATTERN: &'static str = "java.lang:type=GarbageCollector,name=*";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .attribute("Name", GarbageCollectorBean::name)
            .flag("Valid", GarbageCollectorBean::is_valid)
            .attribute("MemoryPoolNames", GarbageCollectorBean::memory_pool_names)
            .attribute("CollectionCount", GarbageCollectorBean::collection_count)
            .attribute("CollectionTime", GarbageCollectorBean::collection_time)
            .attribute(
                "LastCollectionStartTime",
                GarbageCollectorBean::last_collection_start_time,
            )
            .attribute(
                "LastCollectionEndTime",
                GarbageCollectorBean::last_collection_end_time,
            )
            .attribute("TotalMemoryFreed", GarbageCollectorBean::total_memory_freed)
            .attribute("TotalCompacts", GarbageCollectorBean::total_compacts)
            .attribute("MemoryUsed", GarbageCollectorBean::memory_used)
            .attribute("LastGcInfo", GarbageCollectorBean::last_gc_info)
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }
}
