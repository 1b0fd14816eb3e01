//! Operating system bean and its reconfiguration notifications

use super::{bean_name, PLATFORM_DOMAIN};
use crate::config::PlatformConfig;
use crate::mgmt::{ManagedBean, TableBuilder};
use crate::native::{OsBackend, OsEvent};
use crate::notify::{
    types, NotificationBody, NotificationHub, NotificationInfo, Pump, ShutdownCoordinator,
};
use crate::records::{
    AvailableProcessorsNotificationInfo, ProcessingCapacityNotificationInfo,
    TotalPhysicalMemoryNotificationInfo,
};
use openmx_sdk::{MgmtError, MgmtResult, ObjectName, OpenMapped};
use std::sync::Arc;

/// Decode a host reconfiguration event; non-positive values are malformed
pub fn decode_os_event(event: OsEvent) -> MgmtResult<NotificationBody> {
    match event {
        OsEvent::AvailableProcessors(count) if count > 0 => Ok(NotificationBody {
            notification_type: types::AVAILABLE_PROCESSORS_CHANGE,
            message: format!("Available processors changed to {}", count),
            user_data: AvailableProcessorsNotificationInfo(count).to_open(),
        }),
        OsEvent::ProcessingCapacity(capacity) if capacity > 0 => Ok(NotificationBody {
            notification_type: types::PROCESSING_CAPACITY_CHANGE,
            message: format!("Processing capacity changed to {}", capacity),
            user_data: ProcessingCapacityNotificationInfo(capacity).to_open(),
        }),
        OsEvent::TotalPhysicalMemory(bytes) if bytes > 0 => Ok(NotificationBody {
            notification_type: types::TOTAL_PHYSICAL_MEMORY_CHANGE,
            message: format!("Total physical memory changed to {}", bytes),
            user_data: TotalPhysicalMemoryNotificationInfo(bytes).to_open(),
        }),
        other => Err(MgmtError::malformed(
            "OsEvent",
            format!("non-positive value in {:?}", other),
        )),
    }
}

/// `java.lang:type=OperatingSystem`
pub struct OperatingSystemBean {
    backend: Arc<dyn OsBackend>,
    name: Option<ObjectName>,
    hub: Arc<NotificationHub>,
    pump: Option<Arc<Pump<OsEvent>>>,
}

impl OperatingSystemBean {
    /// Create the bean, starting its pump when the host can be reconfigured
    pub fn new(
        backend: Arc<dyn OsBackend>,
        config: &PlatformConfig,
        coordinator: &ShutdownCoordinator,
    ) -> Self {
        let name = bean_name(PLATFORM_DOMAIN, &[("type", "OperatingSystem")]);
        let hub = Arc::new(NotificationHub::new());
        let pump = match backend.notification_queue() {
            Some(queue) if config.notifications && backend.dynamic_reconfiguration_supported() => {
                Some(Pump::new(
                    config.pump_thread_name("os"),
                    queue,
                    Box::new(decode_os_event),
                    hub.clone(),
                    name.clone(),
                    config.verbose_diagnostics,
                ))
            }
            _ => None,
        };
        if let Some(pump) = &pump {
            if let Err(err) = pump.start(coordinator) {
                tracing::error!(%err, "os notification pump failed to start");
            }
        }
        OperatingSystemBean {
            backend,
            name,
            hub,
            pump,
        }
    }

    /// OS name
    pub fn name(&self) -> MgmtResult<String> {
        Ok(self.backend.name())
    }

    /// Architecture
    pub fn arch(&self) -> MgmtResult<String> {
        Ok(self.backend.arch())
    }

    /// OS version
    pub fn version(&self) -> MgmtResult<String> {
        Ok(self.backend.version())
    }

    /// Processors available to the VM
    pub fn available_processors(&self) -> MgmtResult<i32> {
        Ok(self.backend.available_processors())
    }

    /// One-minute load average, negative if unavailable
    pub fn system_load_average(&self) -> MgmtResult<f64> {
        Ok(self.backend.system_load_average()?)
    }

    /// Installed physical memory in bytes
    pub fn total_physical_memory_size(&self) -> MgmtResult<i64> {
        Ok(self.backend.total_physical_memory()?)
    }

    /// Free physical memory in bytes
    pub fn free_physical_memory_size(&self) -> MgmtResult<i64> {
        Ok(self.backend.free_physical_memory()?)
    }

    /// CPU time used by the process in ns
    pub fn process_cpu_time(&self) -> MgmtResult<i64> {
        Ok(self.backend.process_cpu_time()?)
    }

    /// Recent CPU load of the process, 0.0 to 1.0
    pub fn process_cpu_load(&self) -> MgmtResult<f64> {
        Ok(self.backend.process_cpu_load()?)
    }

    /// Recent CPU load of the whole system, 0.0 to 1.0
    pub fn system_cpu_load(&self) -> MgmtResult<f64> {
        Ok(self.backend.system_cpu_load()?)
    }

    /// Processing capacity as a percentage of entitlement
    pub fn processing_capacity(&self) -> MgmtResult<i32> {
        Ok(self.backend.processing_capacity()?)
    }

    /// The host can change processors, capacity or memory at run time
    pub fn is_dynamic_reconfiguration_supported(&self) -> MgmtResult<bool> {
        Ok(self.backend.dynamic_reconfiguration_supported())
    }

    /// The notification pump, if one was created
    pub fn pump(&self) -> Option<&Arc<Pump<OsEvent>>> {
        self.pump.as_ref()
    }
}

impl ManagedBean for OperatingSystemBean {
    const INTERFACE: &'static str = "java.lang.management.OperatingSystemMXBean";
    const NAME_PATTERN: &'static str = "java.lang:type=OperatingSystem";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .attribute("Name", OperatingSystemBean::name)
            .attribute("Arch", OperatingSystemBean::arch)
            .attribute("Version", OperatingSystemBean::version)
            .attribute("AvailableProcessors", OperatingSystemBean::available_processors)
            .attribute("SystemLoadAverage", OperatingSystemBean::system_load_average)
            .attribute(
                "TotalPhysicalMemorySize",
                OperatingSystemBean::total_physical_memory_size,
            )
            .attribute(
                "FreePhysicalMemorySize",
                OperatingSystemBean::free_physical_memory_size,
            )
            .attribute("ProcessCpuTime", OperatingSystemBean::process_cpu_time)
            .attribute("ProcessCpuLoad", OperatingSystemBean::process_cpu_load)
            .attribute("SystemCpuLoad", OperatingSystemBean::system_cpu_load)
            .attribute("ProcessingCapacity", OperatingSystemBean::processing_capacity)
            .flag(
                "DynamicReconfigurationSupported",
                OperatingSystemBean::is_dynamic_reconfiguration_supported,
            )
            .notification(NotificationInfo::new(
                &[types::AVAILABLE_PROCESSORS_CHANGE],
                "AvailableProcessorsNotificationInfo",
                "Available processors changed",
            ))
            .notification(NotificationInfo::new(
                &[types::PROCESSING_CAPACITY_CHANGE],
                "ProcessingCapacityNotificationInfo",
                "Processing capacity changed",
            ))
            .notification(NotificationInfo::new(
                &[types::TOTAL_PHYSICAL_MEMORY_CHANGE],
                "TotalPhysicalMemoryNotificationInfo",
                "Total physical memory changed",
            ))
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }

    fn hub(&self) -> Option<&Arc<NotificationHub>> {
        Some(&self.hub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_processor_change() {
        let body = decode_os_event(OsEvent::AvailableProcessors(8)).unwrap();
        assert_eq!(body.notification_type, types::AVAILABLE_PROCESSORS_CHANGE);
        assert_eq!(
            AvailableProcessorsNotificationInfo::from_open(&body.user_data).unwrap(),
            AvailableProcessorsNotificationInfo(8)
        );
    }

    #[test]
    fn test_decode_memory_change() {
        let body = decode_os_event(OsEvent::TotalPhysicalMemory(1 << 34)).unwrap();
        assert_eq!(body.notification_type, types::TOTAL_PHYSICAL_MEMORY_CHANGE);
        assert_eq!(
            TotalPhysicalMemoryNotificationInfo::from_open(&body.user_data)
                .unwrap()
                .0,
            1 << 34
        );
    }

    #[test]
    fn test_decode_rejects_non_positive_values() {
        assert!(decode_os_event(OsEvent::AvailableProcessors(0)).is_err());
        assert!(decode_os_event(OsEvent::ProcessingCapacity(-5)).is_err());
        assert!(decode_os_event(OsEvent::TotalPhysicalMemory(0)).is_err());
    }
}
