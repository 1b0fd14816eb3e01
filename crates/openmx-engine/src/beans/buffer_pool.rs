//! Direct and mapped buffer pool beans

use super::bean_name;
use crate::mgmt::{ManagedBean, TableBuilder};
use crate::native::BufferPoolBackend;
use openmx_sdk::{MgmtResult, ObjectName};
use std::sync::Arc;

/// `java.nio:type=BufferPool,name=<pool>`
pub struct BufferPoolBean {
    backend: Arc<dyn BufferPoolBackend>,
    name: Option<ObjectName>,
}

impl BufferPoolBean {
    pub fn new(backend: Arc<dyn BufferPoolBackend>) -> Self {
        let pool = backend.name();
        let name = bean_name("java.nio", &[("type", "BufferPool"), ("name", &pool)]);
        BufferPoolBean { backend, name }
    }

    pub fn name(&self) -> MgmtResult<String> {
        Ok(self.backend.name())
    }

    /// Buffers in the pool
    pub fn count(&self) -> MgmtResult<i64> {
        Ok(self.backend.count()?)
    }

    /// Bytes the VM uses for the pool
    pub fn memory_used(&self) -> MgmtResult<i64> {
        Ok(self.backend.memory_used()?)
    }

    /// Sum of buffer capacities
    pub fn total_capacity(&self) -> MgmtResult<i64> {
        Ok(self.backend.total_capacity()?)
    }
}

impl ManagedBean for BufferPoolBean {
    const INTERFACE: &'static str = "java.lang.management.BufferPoolMXBean";
    const NAME_PATTERN: &'static str = "java.nio:type=BufferPool,name=*";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .attribute("Name", BufferPoolBean::name)
            .attribute("Count", BufferPoolBean::count)
            .attribute("MemoryUsed", BufferPoolBean::memory_used)
            .attribute("TotalCapacity", BufferPoolBean::total_capacity)
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }
}
