//! Operating system reconfiguration payloads
//!
//! Each payload is a single-field record named after the value that
//! changed.

use openmx_sdk::{
    record_value, schemas, CompositeType, MgmtResult, OpenMapped, OpenType, OpenValue,
    RecordReader,
};
use std::sync::Arc;

macro_rules! single_field_record {
    ($(#[$meta:meta])* $ty:ident, $field:literal, $native:ty, $open:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $ty(pub $native);

        impl $ty {
            /// Composite schema
            pub fn schema() -> Arc<CompositeType> {
                schemas().composite(stringify!($ty), || {
                    CompositeType::builder(stringify!($ty))
                        .field($field, $open)
                        .build()
                })
            }
        }

        impl OpenMapped for $ty {
            fn open_type() -> OpenType {
                OpenType::Composite(Self::schema())
            }

            fn to_open(&self) -> OpenValue {
                record_value(Self::schema(), vec![($field, self.0.to_open())])
            }

            fn from_open(value: &OpenValue) -> MgmtResult<Self> {
                let schema = Self::schema();
                let reader = RecordReader::open(value, &schema)?;
                Ok($ty(reader.field($field)?))
            }
        }
    };
}

single_field_record!(
    /// Payload of `available-processors-change`
    AvailableProcessorsNotificationInfo,
    "newAvailableProcessors",
    i32,
    OpenType::INT
);

single_field_record!(
    /// Payload of `processing-capacity-change`
    ProcessingCapacityNotificationInfo,
    "newProcessingCapacity",
    i32,
    OpenType::INT
);

single_field_record!(
    /// Payload of `total-physical-memory-change`
    TotalPhysicalMemoryNotificationInfo,
    "newTotalPhysicalMemory",
    i64,
    OpenType::LONG
);

#[cfg(test)]
mod tests {
    use super::*;
    use openmx_sdk::OpenRecord;

    #[test]
    fn test_payloads_have_one_field() {
        assert_eq!(AvailableProcessorsNotificationInfo::schema().len(), 1);
        assert_eq!(ProcessingCapacityNotificationInfo::schema().len(), 1);
        assert_eq!(TotalPhysicalMemoryNotificationInfo::schema().len(), 1);
    }

    #[test]
    fn test_payload_conversion() {
        let open = TotalPhysicalMemoryNotificationInfo(16 << 30).to_open();
        let record = open.as_record().unwrap();
        assert_eq!(
            record.get("newTotalPhysicalMemory"),
            Some(&OpenValue::Long(16 << 30))
        );
        assert_eq!(
            TotalPhysicalMemoryNotificationInfo::from_open(&open).unwrap().0,
            16 << 30
        );
    }

    #[test]
    fn test_payload_rejects_mistyped_field() {
        let wrong = Arc::new(
            CompositeType::builder("AvailableProcessorsNotificationInfo")
                .field("newAvailableProcessors", OpenType::LONG)
                .build(),
        );
        let record = OpenRecord::from_values(wrong, vec![OpenValue::Long(4)]).unwrap();
        let err = AvailableProcessorsNotificationInfo::from_open(&OpenValue::Composite(record))
            .unwrap_err();
        assert!(err.to_string().contains("newAvailableProcessors"));
    }
}
