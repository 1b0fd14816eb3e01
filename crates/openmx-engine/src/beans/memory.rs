//! Memory bean: heap totals, heap sizing and the memory notification pump

use super::{bean_name, PLATFORM_DOMAIN};
use crate::config::PlatformConfig;
use crate::mgmt::{ManagedBean, TableBuilder};
use crate::native::{ManagerRef, MemoryBackend, MemoryEvent};
use crate::notify::{
    types, NotificationBody, NotificationHub, NotificationInfo, Pump, ShutdownCoordinator,
};
use crate::records::{GarbageCollectionNotificationInfo, MemoryNotificationInfo, MemoryUsage};
use openmx_sdk::{MgmtError, MgmtResult, ObjectName, OpenMapped};
use std::sync::Arc;

/// Decode a memory event into a notification body
pub fn decode_memory_event(event: MemoryEvent) -> MgmtResult<NotificationBody> {
    match event {
        MemoryEvent::UsageThresholdExceeded { pool, count, .. }
        | MemoryEvent::CollectionThresholdExceeded { pool, count, .. }
            if pool.is_empty() || count <= 0 =>
        {
            Err(MgmtError::malformed(
                "MemoryNotificationInfo",
                format!("pool `{}` with crossing count {}", pool, count),
            ))
        }
        MemoryEvent::UsageThresholdExceeded { pool, usage, count } => Ok(NotificationBody {
            notification_type: types::MEMORY_THRESHOLD_EXCEEDED,
            message: format!("Memory usage of {} exceeds usage threshold", pool),
            user_data: MemoryNotificationInfo {
                pool_name: pool,
                usage,
                count,
            }
            .to_open(),
        }),
        MemoryEvent::CollectionThresholdExceeded { pool, usage, count } => Ok(NotificationBody {
            notification_type: types::MEMORY_COLLECTION_THRESHOLD_EXCEEDED,
            message: format!("Memory usage of {} exceeds collection usage threshold", pool),
            user_data: MemoryNotificationInfo {
                pool_name: pool,
                usage,
                count,
            }
            .to_open(),
        }),
        MemoryEvent::CollectionCompleted {
            collector,
            action,
            cause,
            info,
        } => Ok(NotificationBody {
            notification_type: types::GC_COLLECTION_COMPLETED,
            message: action.clone(),
            user_data: GarbageCollectionNotificationInfo {
                gc_name: collector,
                gc_action: action,
                gc_cause: cause,
                gc_info: info,
            }
            .to_open(),
        }),
    }
}

/// True if some pool reports a threshold that can trigger notifications
fn supports_thresholds(managers: &[ManagerRef]) -> bool {
    managers.iter().flat_map(ManagerRef::pools).any(|pool| {
        pool.usage_threshold_supported() || pool.collection_usage_threshold_supported()
    })
}

/// `java.lang:type=Memory`
pub struct MemoryBean {
    backend: Arc<dyn MemoryBackend>,
    name: Option<ObjectName>,
    hub: Arc<NotificationHub>,
    pump: Option<Arc<Pump<MemoryEvent>>>,
}

impl MemoryBean {
    /// Create the bean, starting its notification pump when some pool
    /// supports thresholds and the VM posts memory events
    pub fn new(
        backend: Arc<dyn MemoryBackend>,
        config: &PlatformConfig,
        coordinator: &ShutdownCoordinator,
    ) -> Self {
        let name = bean_name(PLATFORM_DOMAIN, &[("type", "Memory")]);
        let hub = Arc::new(NotificationHub::new());
        let pump = match backend.notification_queue() {
            Some(queue) if config.notifications && supports_thresholds(&backend.managers()) => {
                Some(Pump::new(
                    config.pump_thread_name("memory"),
                    queue,
                    Box::new(decode_memory_event),
                    hub.clone(),
                    name.clone(),
                    config.verbose_diagnostics,
                ))
            }
            _ => None,
        };
        if let Some(pump) = &pump {
            if let Err(err) = pump.start(coordinator) {
                tracing::error!(%err, "memory notification pump failed to start");
            }
        }
        MemoryBean {
            backend,
            name,
            hub,
            pump,
        }
    }

    /// Heap usage
    pub fn heap_memory_usage(&self) -> MgmtResult<MemoryUsage> {
        Ok(self.backend.heap_usage()?)
    }

    /// Non-heap usage
    pub fn non_heap_memory_usage(&self) -> MgmtResult<MemoryUsage> {
        Ok(self.backend.non_heap_usage()?)
    }

    /// Objects pending finalization
    pub fn object_pending_finalization_count(&self) -> MgmtResult<i32> {
        Ok(self.backend.pending_finalization_count()?)
    }

    /// Verbose GC output
    pub fn is_verbose(&self) -> MgmtResult<bool> {
        Ok(self.backend.verbose())
    }

    /// Turn verbose GC output on or off
    pub fn set_verbose(&self, verbose: bool) -> MgmtResult<()> {
        self.backend.set_verbose(verbose);
        Ok(())
    }

    /// Current heap limit
    pub fn max_heap_size(&self) -> MgmtResult<i64> {
        Ok(self.backend.max_heap_size()?)
    }

    /// Change the heap limit; must be positive and within the size limit
    pub fn set_max_heap_size(&self, size: i64) -> MgmtResult<()> {
        if !self.backend.set_max_heap_size_supported() {
            return Err(MgmtError::UnsupportedOperation(
                "heap resizing is not supported by this VM".to_string(),
            ));
        }
        let limit = self.backend.max_heap_size_limit()?;
        if size <= 0 || size > limit {
            return Err(MgmtError::invalid_value(
                "MaxHeapSize",
                format!("{} is outside 1..={}", size, limit),
            ));
        }
        Ok(self.backend.set_max_heap_size(size)?)
    }

    /// Largest accepted heap limit
    pub fn max_heap_size_limit(&self) -> MgmtResult<i64> {
        Ok(self.backend.max_heap_size_limit()?)
    }

    /// The heap limit can be changed
    pub fn is_set_max_heap_size_supported(&self) -> MgmtResult<bool> {
        Ok(self.backend.set_max_heap_size_supported())
    }

    /// Run a full collection
    pub fn gc(&self) -> MgmtResult<()> {
        Ok(self.backend.gc()?)
    }

    /// The notification pump, if one was created
    pub fn pump(&self) -> Option<&Arc<Pump<MemoryEvent>>> {
        self.pump.as_ref()
    }
}

impl ManagedBean for MemoryBean {
    const INTERFACE: &'static str = "java.lang.management.MemoryMXBean";
    const NAME_PATTERN: &'static str = "java.lang:type=Memory";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .attribute("HeapMemoryUsage", MemoryBean::heap_memory_usage)
            .attribute("NonHeapMemoryUsage", MemoryBean::non_heap_memory_usage)
            .attribute(
                "ObjectPendingFinalizationCount",
                MemoryBean::object_pending_finalization_count,
            )
            .writable_flag("Verbose", MemoryBean::is_verbose, MemoryBean::set_verbose)
            .writable("MaxHeapSize", MemoryBean::max_heap_size, MemoryBean::set_max_heap_size)
            .attribute("MaxHeapSizeLimit", MemoryBean::max_heap_size_limit)
            .flag("SetMaxHeapSizeSupported", MemoryBean::is_set_max_heap_size_supported)
            .action("gc", MemoryBean::gc)
            .notification(NotificationInfo::new(
                &[
                    types::MEMORY_THRESHOLD_EXCEEDED,
                    types::MEMORY_COLLECTION_THRESHOLD_EXCEEDED,
                ],
                "MemoryNotificationInfo",
                "Memory pool threshold exceeded",
            ))
            .notification(NotificationInfo::new(
                &[types::GC_COLLECTION_COMPLETED],
                "GarbageCollectionNotificationInfo",
                "Garbage collection completed",
            ))
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }

    fn hub(&self) -> Option<&Arc<NotificationHub>> {
        Some(&self.hub)
    }
}
