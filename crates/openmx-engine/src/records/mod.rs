//! Records exchanged as composite open values
//!
//! Every record has a fixed schema, memoized in the process-wide schema
//! cache on first use, and a hand-written [`OpenMapped`](openmx_sdk::OpenMapped)
//! mapping that verifies field count, names and types on the way back in.

mod gc;
mod memory;
mod os;
mod thread;

pub use gc::{GarbageCollectionNotificationInfo, GcInfo};
pub use memory::{MemoryNotificationInfo, MemoryType, MemoryUsage};
pub use os::{
    AvailableProcessorsNotificationInfo, ProcessingCapacityNotificationInfo,
    TotalPhysicalMemoryNotificationInfo,
};
pub use thread::{LockInfo, MonitorInfo, StackFrame, ThreadInfo, ThreadState};
