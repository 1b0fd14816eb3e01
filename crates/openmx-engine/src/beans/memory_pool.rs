//! Memory pool bean with usage and collection-usage thresholds

use super::{bean_name, PLATFORM_DOMAIN};
use crate::mgmt::{ManagedBean, TableBuilder};
use crate::native::PoolBackend;
use crate::records::{MemoryType, MemoryUsage};
use openmx_sdk::{MgmtError, MgmtResult, ObjectName};
use std::sync::Arc;

/// `java.lang:type=MemoryPool,name=<pool>`
pub struct MemoryPoolBean {
    backend: Arc<dyn PoolBackend>,
    name: Option<ObjectName>,
}

impl MemoryPoolBean {
    /// Wrap one pool
    pub fn new(backend: Arc<dyn PoolBackend>) -> Self {
        let pool = backend.name();
        let name = bean_name(PLATFORM_DOMAIN, &[("type", "MemoryPool"), ("name", &pool)]);
        MemoryPoolBean { backend, name }
    }

    /// The wrapped pool
    pub fn backend(&self) -> &Arc<dyn PoolBackend> {
        &self.backend
    }

    /// Pool name
    pub fn name(&self) -> MgmtResult<String> {
        Ok(self.backend.name())
    }

    /// Heap or non-heap
    pub fn memory_type(&self) -> MgmtResult<MemoryType> {
        Ok(self.backend.memory_type())
    }

    /// Current usage
    pub fn usage(&self) -> MgmtResult<MemoryUsage> {
        Ok(self.backend.usage()?)
    }

    /// Peak usage since start or last reset
    pub fn peak_usage(&self) -> MgmtResult<MemoryUsage> {
        Ok(self.backend.peak_usage()?)
    }

    /// Usage after the most recent collection; `None` for pools that are not collected
    pub fn collection_usage(&self) -> MgmtResult<Option<MemoryUsage>> {
        Ok(self.backend.collection_usage()?)
    }

    /// Pool is still in use by the VM
    pub fn is_valid(&self) -> MgmtResult<bool> {
        Ok(self.backend.is_valid())
    }

    /// Managers of this pool
    pub fn memory_manager_names(&self) -> MgmtResult<Vec<String>> {
        Ok(self.backend.manager_names())
    }

    /// Reset peak usage to current usage
    pub fn reset_peak_usage(&self) -> MgmtResult<()> {
        Ok(self.backend.reset_peak_usage()?)
    }

    fn unsupported(&self, what: &str) -> MgmtError {
        MgmtError::UnsupportedOperation(format!(
            "{} threshold is not supported by pool {}",
            what,
            self.backend.name()
        ))
    }

    fn check_threshold(&self, attribute: &str, threshold: i64) -> MgmtResult<()> {
        if threshold < 0 {
            return Err(MgmtError::invalid_value(
                attribute,
                format!("threshold must be non-negative, got {}", threshold),
            ));
        }
        let max = self.backend.usage()?.max();
        if max >= 0 && threshold > max {
            return Err(MgmtError::invalid_value(
                attribute,
                format!("threshold {} exceeds pool maximum {}", threshold, max),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Usage threshold
    // ========================================================================

    /// Usage threshold can be set
    pub fn is_usage_threshold_supported(&self) -> MgmtResult<bool> {
        Ok(self.backend.usage_threshold_supported())
    }

    /// Usage threshold in bytes; 0 means disabled
    pub fn usage_threshold(&self) -> MgmtResult<i64> {
        if !self.backend.usage_threshold_supported() {
            return Err(self.unsupported("usage"));
        }
        Ok(self.backend.usage_threshold()?)
    }

    /// Set the usage threshold; 0 disables it
    pub fn set_usage_threshold(&self, threshold: i64) -> MgmtResult<()> {
        if !self.backend.usage_threshold_supported() {
            return Err(self.unsupported("usage"));
        }
        self.check_threshold("UsageThreshold", threshold)?;
        Ok(self.backend.set_usage_threshold(threshold)?)
    }

    /// Current usage has reached an enabled usage threshold
    pub fn is_usage_threshold_exceeded(&self) -> MgmtResult<bool> {
        let threshold = self.usage_threshold()?;
        Ok(threshold > 0 && self.backend.usage()?.used() >= threshold)
    }

    /// Times usage crossed the threshold
    pub fn usage_threshold_count(&self) -> MgmtResult<i64> {
        if !self.backend.usage_threshold_supported() {
            return Err(self.unsupported("usage"));
        }
        Ok(self.backend.usage_threshold_count()?)
    }

    // ========================================================================
    // Collection usage threshold
    // ========================================================================

    /// Collection usage threshold can be set
    pub fn is_collection_usage_threshold_supported(&self) -> MgmtResult<bool> {
        Ok(self.backend.collection_usage_threshold_supported())
    }

    /// Collection usage threshold in bytes; 0 means disabled
    pub fn collection_usage_threshold(&self) -> MgmtResult<i64> {
        if !self.backend.collection_usage_threshold_supported() {
            return Err(self.unsupported("collection usage"));
        }
        Ok(self.backend.collection_usage_threshold()?)
    }

    /// Set the collection usage threshold; 0 disables it
    pub fn set_collection_usage_threshold(&self, threshold: i64) -> MgmtResult<()> {
        if !self.backend.collection_usage_threshold_supported() {
            return Err(self.unsupported("collection usage"));
        }
        self.check_threshold("CollectionUsageThreshold", threshold)?;
        Ok(self.backend.set_collection_usage_threshold(threshold)?)
    }

    /// Usage after the last collection has reached an enabled threshold
    pub fn is_collection_usage_threshold_exceeded(&self) -> MgmtResult<bool> {
        let threshold = self.collection_usage_threshold()?;
        let after_gc = self.backend.collection_usage()?;
        Ok(threshold > 0 && after_gc.is_some_and(|usage| usage.used() >= threshold))
    }

    /// Times collection usage crossed the threshold
    pub fn collection_usage_threshold_count(&self) -> MgmtResult<i64> {
        if !self.backend.collection_usage_threshold_supported() {
            return Err(self.unsupported("collection usage"));
        }
        Ok(self.backend.collection_usage_threshold_count()?)
    }
}

impl ManagedBean for MemoryPoolBean {
    const INTERFACE: &'static str = "java.lang.management.MemoryPoolMXBean";
    const NAME_PATTERN: &'static str = "java.lang:type=MemoryPool,name=*";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .attribute("Name", MemoryPoolBean::name)
            .attribute("Type", MemoryPoolBean::memory_type)
            .attribute("Usage", MemoryPoolBean::usage)
            .attribute("PeakUsage", MemoryPoolBean::peak_usage)
            .attribute("CollectionUsage", MemoryPoolBean::collection_usage)
            .flag("Valid", MemoryPoolBean::is_valid)
            .attribute("MemoryManagerNames", MemoryPoolBean::memory_manager_names)
            .flag("UsageThresholdSupported", MemoryPoolBean::is_usage_threshold_supported)
            .writable(
                "UsageThreshold",
                MemoryPoolBean::usage_threshold,
                MemoryPoolBean::set_usage_threshold,
            )
            .flag("UsageThresholdExceeded", MemoryPoolBean::is_usage_threshold_exceeded)
            .attribute("UsageThresholdCount", MemoryPoolBean::usage_threshold_count)
            .flag(
                "CollectionUsageThresholdSupported",
                MemoryPoolBean::is_collection_usage_threshold_supported,
            )
            .writable(
                "CollectionUsageThreshold",
                MemoryPoolBean::collection_usage_threshold,
                MemoryPoolBean::set_collection_usage_threshold,
            )
            .flag(
                "CollectionUsageThresholdExceeded",
                MemoryPoolBean::is_collection_usage_threshold_exceeded,
            )
            .attribute(
                "CollectionUsageThresholdCount",
                MemoryPoolBean::collection_usage_threshold_count,
            )
            .action("resetPeakUsage", MemoryPoolBean::reset_peak_usage)
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeResult;
    use parking_lot::Mutex;

    struct FixedPool {
        threshold: Mutex<i64>,
        sets: Mutex<usize>,
        thresholds: bool,
    }

    impl FixedPool {
        fn new(thresholds: bool) -> Arc<Self> {
            Arc::new(FixedPool {
                threshold: Mutex::new(0),
                sets: Mutex::new(0),
                thresholds,
            })
        }
    }

    impl PoolBackend for FixedPool {
        fn name(&self) -> String {
            "old gen".to_string()
        }
        fn memory_type(&self) -> MemoryType {
            MemoryType::Heap
        }
        fn usage(&self) -> NativeResult<MemoryUsage> {
            Ok(MemoryUsage::new(0, 600, 800, 1000).unwrap())
        }
        fn peak_usage(&self) -> NativeResult<MemoryUsage> {
            self.usage()
        }
        fn collection_usage(&self) -> NativeResult<Option<MemoryUsage>> {
            Ok(None)
        }
        fn reset_peak_usage(&self) -> NativeResult<()> {
            Ok(())
        }
        fn is_valid(&self) -> bool {
            true
        }
        fn manager_names(&self) -> Vec<String> {
            vec!["global".to_string()]
        }
        fn usage_threshold_supported(&self) -> bool {
            self.thresholds
        }
        fn usage_threshold(&self) -> NativeResult<i64> {
            Ok(*self.threshold.lock())
        }
        fn set_usage_threshold(&self, threshold: i64) -> NativeResult<()> {
            *self.sets.lock() += 1;
            *self.threshold.lock() = threshold;
            Ok(())
        }
        fn usage_threshold_count(&self) -> NativeResult<i64> {
            Ok(0)
        }
        fn collection_usage_threshold_supported(&self) -> bool {
            false
        }
        fn collection_usage_threshold(&self) -> NativeResult<i64> {
            Ok(0)
        }
        fn set_collection_usage_threshold(&self, _threshold: i64) -> NativeResult<()> {
            Ok(())
        }
        fn collection_usage_threshold_count(&self) -> NativeResult<i64> {
            Ok(0)
        }
    }

    #[test]
    fn test_name_keeps_spaces() {
        let bean = MemoryPoolBean::new(FixedPool::new(true));
        let name = bean.object_name().unwrap();
        assert_eq!(name.key("type"), Some("MemoryPool"));
        assert_eq!(bean.name().unwrap(), "old gen");
    }

    #[test]
    fn test_threshold_validation() {
        let pool = FixedPool::new(true);
        let bean = MemoryPoolBean::new(pool.clone());

        assert!(matches!(
            bean.set_usage_threshold(-1),
            Err(MgmtError::InvalidAttributeValue { .. })
        ));
        assert!(matches!(
            bean.set_usage_threshold(1001),
            Err(MgmtError::InvalidAttributeValue { .. })
        ));
        assert_eq!(*pool.sets.lock(), 0);

        bean.set_usage_threshold(500).unwrap();
        assert_eq!(bean.usage_threshold().unwrap(), 500);
        assert!(bean.is_usage_threshold_exceeded().unwrap());

        bean.set_usage_threshold(0).unwrap();
        assert!(!bean.is_usage_threshold_exceeded().unwrap());
    }

    #[test]
    fn test_unsupported_thresholds() {
        let bean = MemoryPoolBean::new(FixedPool::new(false));
        assert!(matches!(
            bean.usage_threshold(),
            Err(MgmtError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            bean.set_collection_usage_threshold(10),
            Err(MgmtError::UnsupportedOperation(_))
        ));
        assert!(!bean.is_usage_threshold_supported().unwrap());
    }
}
