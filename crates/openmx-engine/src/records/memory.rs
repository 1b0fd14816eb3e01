//! Memory records: usage snapshots, pool kinds and threshold payloads

use openmx_sdk::{
    open_enum, record_value, schemas, CompositeType, MgmtError, MgmtResult, OpenMapped,
    OpenType, OpenValue, RecordReader,
};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// MemoryUsage
// ============================================================================

/// Snapshot of a memory area.
///
/// `init` and `max` may be `-1` (undefined). `used <= committed` always
/// holds, and `committed <= max` whenever `max` is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    init: i64,
    used: i64,
    committed: i64,
    max: i64,
}

impl MemoryUsage {
    /// Create a usage snapshot, checking the ordering invariants
    pub fn new(init: i64, used: i64, committed: i64, max: i64) -> MgmtResult<Self> {
        let reason = if init < -1 {
            Some(format!("init must be >= -1, got {}", init))
        } else if max < -1 {
            Some(format!("max must be >= -1, got {}", max))
        } else if used < 0 {
            Some(format!("used must be >= 0, got {}", used))
        } else if committed < 0 {
            Some(format!("committed must be >= 0, got {}", committed))
        } else if used > committed {
            Some(format!("used ({}) exceeds committed ({})", used, committed))
        } else if max >= 0 && committed > max {
            Some(format!("committed ({}) exceeds max ({})", committed, max))
        } else {
            None
        };
        match reason {
            Some(reason) => Err(MgmtError::malformed("MemoryUsage", reason)),
            None => Ok(MemoryUsage {
                init,
                used,
                committed,
                max,
            }),
        }
    }

    /// Initial size, or -1
    pub fn init(&self) -> i64 {
        self.init
    }

    /// Bytes in use
    pub fn used(&self) -> i64 {
        self.used
    }

    /// Bytes guaranteed to be available
    pub fn committed(&self) -> i64 {
        self.committed
    }

    /// Maximum size, or -1
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Sum of two areas; `init`/`max` stay undefined if either side is
    pub fn combine(&self, other: &MemoryUsage) -> MemoryUsage {
        let sum = |a: i64, b: i64| if a < 0 || b < 0 { -1 } else { a + b };
        MemoryUsage {
            init: sum(self.init, other.init),
            used: self.used + other.used,
            committed: self.committed + other.committed,
            max: sum(self.max, other.max),
        }
    }

    /// Composite schema
    pub fn schema() -> Arc<CompositeType> {
        schemas().composite("MemoryUsage", || {
            CompositeType::builder("MemoryUsage")
                .description("Memory usage snapshot")
                .field("init", OpenType::LONG)
                .field("used", OpenType::LONG)
                .field("committed", OpenType::LONG)
                .field("max", OpenType::LONG)
                .build()
        })
    }
}

impl fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "init = {}({}K) used = {}({}K) committed = {}({}K) max = {}({}K)",
            self.init,
            self.init >> 10,
            self.used,
            self.used >> 10,
            self.committed,
            self.committed >> 10,
            self.max,
            self.max >> 10
        )
    }
}

impl OpenMapped for MemoryUsage {
    fn open_type() -> OpenType {
        OpenType::Composite(Self::schema())
    }

    fn to_open(&self) -> OpenValue {
        record_value(
            Self::schema(),
            vec![
                ("init", self.init.to_open()),
                ("used", self.used.to_open()),
                ("committed", self.committed.to_open()),
                ("max", self.max.to_open()),
            ],
        )
    }

    fn from_open(value: &OpenValue) -> MgmtResult<Self> {
        let schema = Self::schema();
        let reader = RecordReader::open(value, &schema)?;
        MemoryUsage::new(
            reader.field("init")?,
            reader.field("used")?,
            reader.field("committed")?,
            reader.field("max")?,
        )
    }
}

// ============================================================================
// MemoryType
// ============================================================================

/// Kind of memory a pool belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryType {
    /// Garbage-collected object heap
    Heap,
    /// Everything else (class metadata, compiled code, ...)
    NonHeap,
}

open_enum!(MemoryType {
    Heap => "HEAP",
    NonHeap => "NON_HEAP",
});

// ============================================================================
// MemoryNotificationInfo
// ============================================================================

/// Payload of `memory-threshold-exceeded` and
/// `memory-collection-threshold-exceeded`
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryNotificationInfo {
    /// Pool that crossed its threshold
    pub pool_name: String,
    /// Pool usage when the crossing was detected
    pub usage: MemoryUsage,
    /// Number of crossings so far, this one included
    pub count: i64,
}

impl MemoryNotificationInfo {
    /// Composite schema
    pub fn schema() -> Arc<CompositeType> {
        schemas().composite("MemoryNotificationInfo", || {
            CompositeType::builder("MemoryNotificationInfo")
                .description("Memory threshold crossing")
                .field("poolName", OpenType::STRING)
                .field("usage", MemoryUsage::open_type())
                .field("count", OpenType::LONG)
                .build()
        })
    }
}

impl OpenMapped for MemoryNotificationInfo {
    fn open_type() -> OpenType {
        OpenType::Composite(Self::schema())
    }

    fn to_open(&self) -> OpenValue {
        record_value(
            Self::schema(),
            vec![
                ("poolName", self.pool_name.to_open()),
                ("usage", self.usage.to_open()),
                ("count", self.count.to_open()),
            ],
        )
    }

    fn from_open(value: &OpenValue) -> MgmtResult<Self> {
        let schema = Self::schema();
        let reader = RecordReader::open(value, &schema)?;
        Ok(MemoryNotificationInfo {
            pool_name: reader.field("poolName")?,
            usage: reader.field("usage")?,
            count: reader.field("count")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmx_sdk::OpenRecord;

    #[test]
    fn test_usage_invariants() {
        assert!(MemoryUsage::new(-1, 10, 20, -1).is_ok());
        assert!(MemoryUsage::new(0, 30, 20, 100).is_err());
        assert!(MemoryUsage::new(0, 10, 200, 100).is_err());
        assert!(MemoryUsage::new(-2, 0, 0, 0).is_err());
    }

    #[test]
    fn test_usage_conversion() {
        let usage = MemoryUsage::new(1024, 512, 2048, 4096).unwrap();
        let open = usage.to_open();
        let record = open.as_record().unwrap();
        assert_eq!(record.get("committed"), Some(&OpenValue::Long(2048)));
        assert_eq!(MemoryUsage::from_open(&open).unwrap(), usage);
    }

    #[test]
    fn test_usage_rejects_extra_field() {
        let wide = Arc::new(
            CompositeType::builder("MemoryUsage")
                .field("init", OpenType::LONG)
                .field("used", OpenType::LONG)
                .field("committed", OpenType::LONG)
                .field("max", OpenType::LONG)
                .field("peak", OpenType::LONG)
                .build(),
        );
        let record = OpenRecord::from_values(wide, vec![OpenValue::Long(0); 5]).unwrap();
        let err = MemoryUsage::from_open(&OpenValue::Composite(record)).unwrap_err();
        assert!(err.to_string().contains("unexpected field `peak`"));
    }

    #[test]
    fn test_usage_rejects_missing_field() {
        let narrow = Arc::new(
            CompositeType::builder("MemoryUsage")
                .field("init", OpenType::LONG)
                .field("used", OpenType::LONG)
                .field("max", OpenType::LONG)
                .build(),
        );
        let record = OpenRecord::from_values(narrow, vec![OpenValue::Long(0); 3]).unwrap();
        let err = MemoryUsage::from_open(&OpenValue::Composite(record)).unwrap_err();
        assert!(matches!(err, MgmtError::MalformedRecord { .. }));
        assert!(err.to_string().contains("missing field `committed`"));
    }

    #[test]
    fn test_usage_rejects_inconsistent_values() {
        let record = OpenRecord::from_values(
            MemoryUsage::schema(),
            vec![
                OpenValue::Long(0),
                OpenValue::Long(50),
                OpenValue::Long(10),
                OpenValue::Long(-1),
            ],
        )
        .unwrap();
        assert!(MemoryUsage::from_open(&OpenValue::Composite(record)).is_err());
    }

    #[test]
    fn test_combine_keeps_undefined() {
        let a = MemoryUsage::new(10, 1, 2, -1).unwrap();
        let b = MemoryUsage::new(20, 3, 4, 100).unwrap();
        let sum = a.combine(&b);
        assert_eq!(sum.init(), 30);
        assert_eq!(sum.used(), 4);
        assert_eq!(sum.max(), -1);
    }

    #[test]
    fn test_memory_type_names() {
        assert_eq!(MemoryType::NonHeap.to_open(), OpenValue::from("NON_HEAP"));
        assert_eq!(
            MemoryType::from_open(&OpenValue::from("HEAP")).unwrap(),
            MemoryType::Heap
        );
    }
}
