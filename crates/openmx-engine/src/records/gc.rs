//! Garbage collection records

use super::memory::MemoryUsage;
use openmx_sdk::{
    record_value, schemas, CompositeType, MgmtResult, OpenMapped, OpenType, OpenValue,
    RecordReader,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One completed collection
#[derive(Debug, Clone, PartialEq)]
pub struct GcInfo {
    /// Collection number for this collector, starting at 1
    pub id: i64,
    /// Start, in milliseconds since VM start
    pub start_time: i64,
    /// End, in milliseconds since VM start
    pub end_time: i64,
    /// Pool usage before the collection, by pool name
    pub memory_usage_before_gc: BTreeMap<String, MemoryUsage>,
    /// Pool usage after the collection, by pool name
    pub memory_usage_after_gc: BTreeMap<String, MemoryUsage>,
}

impl GcInfo {
    /// Elapsed time in milliseconds
    pub fn duration(&self) -> i64 {
        self.end_time - self.start_time
    }

    /// Bytes released across all pools
    pub fn memory_freed(&self) -> i64 {
        let before: i64 = self.memory_usage_before_gc.values().map(MemoryUsage::used).sum();
        let after: i64 = self.memory_usage_after_gc.values().map(MemoryUsage::used).sum();
        (before - after).max(0)
    }

    /// Composite schema
    pub fn schema() -> Arc<CompositeType> {
        schemas().composite("GcInfo", || {
            let usage_map = BTreeMap::<String, MemoryUsage>::open_type();
            CompositeType::builder("GcInfo")
                .description("Garbage collection")
                .field("id", OpenType::LONG)
                .field("startTime", OpenType::LONG)
                .field("endTime", OpenType::LONG)
                .field("duration", OpenType::LONG)
                .field("memoryUsageBeforeGc", usage_map.clone())
                .field("memoryUsageAfterGc", usage_map)
                .build()
        })
    }
}

impl OpenMapped for GcInfo {
    fn open_type() -> OpenType {
        OpenType::Composite(Self::schema())
    }

    fn to_open(&self) -> OpenValue {
        record_value(
            Self::schema(),
            vec![
                ("id", self.id.to_open()),
                ("startTime", self.start_time.to_open()),
                ("endTime", self.end_time.to_open()),
                ("duration", self.duration().to_open()),
                ("memoryUsageBeforeGc", self.memory_usage_before_gc.to_open()),
                ("memoryUsageAfterGc", self.memory_usage_after_gc.to_open()),
            ],
        )
    }

    fn from_open(value: &OpenValue) -> MgmtResult<Self> {
        let schema = Self::schema();
        let reader = RecordReader::open(value, &schema)?;
        Ok(GcInfo {
            id: reader.field("id")?,
            start_time: reader.field("startTime")?,
            end_time: reader.field("endTime")?,
            memory_usage_before_gc: reader.field("memoryUsageBeforeGc")?,
            memory_usage_after_gc: reader.field("memoryUsageAfterGc")?,
        })
    }
}

/// Payload of `gc-collection-completed`
#[derive(Debug, Clone, PartialEq)]
pub struct GarbageCollectionNotificationInfo {
    /// Collector name
    pub gc_name: String,
    /// `end of minor GC` or `end of major GC`
    pub gc_action: String,
    /// What triggered the collection
    pub gc_cause: String,
    /// The collection itself
    pub gc_info: GcInfo,
}

impl GarbageCollectionNotificationInfo {
    /// Composite schema
    pub fn schema() -> Arc<CompositeType> {
        schemas().composite("GarbageCollectionNotificationInfo", || {
            CompositeType::builder("GarbageCollectionNotificationInfo")
                .description("Completed garbage collection")
                .field("gcName", OpenType::STRING)
                .field("gcAction", OpenType::STRING)
                .field("gcCause", OpenType::STRING)
                .field("gcInfo", GcInfo::open_type())
                .build()
        })
    }
}

impl OpenMapped for GarbageCollectionNotificationInfo {
    fn open_type() -> OpenType {
        OpenType::Composite(Self::schema())
    }

    fn to_open(&self) -> OpenValue {
        record_value(
            Self::schema(),
            vec![
                ("gcName", self.gc_name.to_open()),
                ("gcAction", self.gc_action.to_open()),
                ("gcCause", self.gc_cause.to_open()),
                ("gcInfo", self.gc_info.to_open()),
            ],
        )
    }

    fn from_open(value: &OpenValue) -> MgmtResult<Self> {
        let schema = Self::schema();
        let reader = RecordReader::open(value, &schema)?;
        Ok(GarbageCollectionNotificationInfo {
            gc_name: reader.field("gcName")?,
            gc_action: reader.field("gcAction")?,
            gc_cause: reader.field("gcCause")?,
            gc_info: reader.field("gcInfo")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GcInfo {
        let mut before = BTreeMap::new();
        before.insert("eden".to_string(), MemoryUsage::new(0, 900, 1000, 1000).unwrap());
        before.insert("tenured".to_string(), MemoryUsage::new(0, 100, 1000, 4000).unwrap());
        let mut after = BTreeMap::new();
        after.insert("eden".to_string(), MemoryUsage::new(0, 0, 1000, 1000).unwrap());
        after.insert("tenured".to_string(), MemoryUsage::new(0, 300, 1000, 4000).unwrap());
        GcInfo {
            id: 1,
            start_time: 100,
            end_time: 112,
            memory_usage_before_gc: before,
            memory_usage_after_gc: after,
        }
    }

    #[test]
    fn test_gc_info_conversion() {
        let info = sample();
        assert_eq!(info.duration(), 12);
        assert_eq!(info.memory_freed(), 700);

        let open = info.to_open();
        let before = open.as_record().unwrap().get("memoryUsageBeforeGc").unwrap();
        assert_eq!(before.as_table().unwrap().len(), 2);
        assert_eq!(GcInfo::from_open(&open).unwrap(), info);
    }

    #[test]
    fn test_notification_payload_conversion() {
        let payload = GarbageCollectionNotificationInfo {
            gc_name: "Scavenge".to_string(),
            gc_action: "end of minor GC".to_string(),
            gc_cause: "Allocation Failure".to_string(),
            gc_info: sample(),
        };
        let open = payload.to_open();
        assert_eq!(
            GarbageCollectionNotificationInfo::from_open(&open).unwrap(),
            payload
        );
    }
}
