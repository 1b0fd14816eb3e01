//! Thread records: states, stack frames, locks and thread snapshots

use openmx_sdk::{
    open_enum, record_value, schemas, CompositeType, MgmtResult, OpenMapped, OpenType, OpenValue,
    RecordReader,
};
use std::sync::Arc;

// ============================================================================
// ThreadState
// ============================================================================

/// Scheduling state of a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadState {
    /// Created, not yet started
    New,
    /// Executing or ready to execute
    Runnable,
    /// Waiting to enter a monitor
    Blocked,
    /// Waiting indefinitely for another thread
    Waiting,
    /// Waiting with a deadline
    TimedWaiting,
    /// Finished
    Terminated,
}

open_enum!(ThreadState {
    New => "NEW",
    Runnable => "RUNNABLE",
    Blocked => "BLOCKED",
    Waiting => "WAITING",
    TimedWaiting => "TIMED_WAITING",
    Terminated => "TERMINATED",
});

// ============================================================================
// StackFrame
// ============================================================================

/// One frame of a captured stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Declaring class
    pub class_name: String,
    /// Method name
    pub method_name: String,
    /// Source file, if known
    pub file_name: Option<String>,
    /// Source line; -1 if unknown, -2 for native frames
    pub line_number: i32,
    /// Frame belongs to a native method
    pub native_method: bool,
}

impl StackFrame {
    /// Create a frame for a non-native method
    pub fn new(class_name: &str, method_name: &str, file_name: Option<&str>, line_number: i32) -> Self {
        StackFrame {
            class_name: class_name.to_string(),
            method_name: method_name.to_string(),
            file_name: file_name.map(str::to_string),
            line_number,
            native_method: false,
        }
    }

    /// Composite schema
    pub fn schema() -> Arc<CompositeType> {
        schemas().composite("StackFrame", || {
            CompositeType::builder("StackFrame")
                .description("Stack frame")
                .field("className", OpenType::STRING)
                .field("methodName", OpenType::STRING)
                .field("fileName", OpenType::STRING)
                .field("lineNumber", OpenType::INT)
                .field("nativeMethod", OpenType::BOOLEAN)
                .build()
        })
    }
}

impl OpenMapped for StackFrame {
    fn open_type() -> OpenType {
        OpenType::Composite(Self::schema())
    }

    fn to_open(&self) -> OpenValue {
        record_value(
            Self::schema(),
            vec![
                ("className", self.class_name.to_open()),
                ("methodName", self.method_name.to_open()),
                ("fileName", self.file_name.to_open()),
                ("lineNumber", self.line_number.to_open()),
                ("nativeMethod", self.native_method.to_open()),
            ],
        )
    }

    fn from_open(value: &OpenValue) -> MgmtResult<Self> {
        let schema = Self::schema();
        let reader = RecordReader::open(value, &schema)?;
        Ok(StackFrame {
            class_name: reader.field("className")?,
            method_name: reader.field("methodName")?,
            file_name: reader.field("fileName")?,
            line_number: reader.field("lineNumber")?,
            native_method: reader.field("nativeMethod")?,
        })
    }
}

// ============================================================================
// LockInfo / MonitorInfo
// ============================================================================

/// A lock: an object monitor or an ownable synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    /// Class of the lock object
    pub class_name: String,
    /// Identity hash of the lock object
    pub identity_hash_code: i32,
}

impl LockInfo {
    /// Create a lock descriptor
    pub fn new(class_name: &str, identity_hash_code: i32) -> Self {
        LockInfo {
            class_name: class_name.to_string(),
            identity_hash_code,
        }
    }

    /// `Class@hash` form used in lock names
    pub fn lock_name(&self) -> String {
        format!("{}@{:x}", self.class_name, self.identity_hash_code)
    }

    /// Composite schema
    pub fn schema() -> Arc<CompositeType> {
        schemas().composite("LockInfo", || {
            CompositeType::builder("LockInfo")
                .description("Lock")
                .field("className", OpenType::STRING)
                .field("identityHashCode", OpenType::INT)
                .build()
        })
    }
}

impl OpenMapped for LockInfo {
    fn open_type() -> OpenType {
        OpenType::Composite(Self::schema())
    }

    fn to_open(&self) -> OpenValue {
        record_value(
            Self::schema(),
            vec![
                ("className", self.class_name.to_open()),
                ("identityHashCode", self.identity_hash_code.to_open()),
            ],
        )
    }

    fn from_open(value: &OpenValue) -> MgmtResult<Self> {
        let schema = Self::schema();
        let reader = RecordReader::open(value, &schema)?;
        Ok(LockInfo {
            class_name: reader.field("className")?,
            identity_hash_code: reader.field("identityHashCode")?,
        })
    }
}

/// A monitor held by a thread, with the frame that locked it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    /// The monitor
    pub lock: LockInfo,
    /// Depth of the locking frame; -1 if not captured
    pub locked_stack_depth: i32,
    /// The locking frame, if captured
    pub locked_stack_frame: Option<StackFrame>,
}

impl MonitorInfo {
    /// Composite schema
    pub fn schema() -> Arc<CompositeType> {
        schemas().composite("MonitorInfo", || {
            CompositeType::builder("MonitorInfo")
                .description("Locked monitor")
                .field("className", OpenType::STRING)
                .field("identityHashCode", OpenType::INT)
                .field("lockedStackDepth", OpenType::INT)
                .field("lockedStackFrame", StackFrame::open_type())
                .build()
        })
    }
}

impl OpenMapped for MonitorInfo {
    fn open_type() -> OpenType {
        OpenType::Composite(Self::schema())
    }

    fn to_open(&self) -> OpenValue {
        record_value(
            Self::schema(),
            vec![
                ("className", self.lock.class_name.to_open()),
                ("identityHashCode", self.lock.identity_hash_code.to_open()),
                ("lockedStackDepth", self.locked_stack_depth.to_open()),
                ("lockedStackFrame", self.locked_stack_frame.to_open()),
            ],
        )
    }

    fn from_open(value: &OpenValue) -> MgmtResult<Self> {
        let schema = Self::schema();
        let reader = RecordReader::open(value, &schema)?;
        Ok(MonitorInfo {
            lock: LockInfo {
                class_name: reader.field("className")?,
                identity_hash_code: reader.field("identityHashCode")?,
            },
            locked_stack_depth: reader.field("lockedStackDepth")?,
            locked_stack_frame: reader.field("lockedStackFrame")?,
        })
    }
}

// ============================================================================
// ThreadInfo
// ============================================================================

/// Snapshot of one thread
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadInfo {
    /// Thread ID (> 0)
    pub thread_id: i64,
    /// Thread name
    pub thread_name: String,
    /// State at capture time; `None` for a state name this side does not know
    pub thread_state: Option<ThreadState>,
    /// Suspended by a debugger
    pub suspended: bool,
    /// Executing native code
    pub in_native: bool,
    /// Times the thread blocked entering a monitor
    pub blocked_count: i64,
    /// -1 unless contention monitoring is enabled
    pub blocked_time: i64,
    /// Times the thread waited for notification
    pub waited_count: i64,
    /// -1 unless contention monitoring is enabled
    pub waited_time: i64,
    /// Lock the thread is blocked on or waiting for
    pub lock_info: Option<LockInfo>,
    /// Owner of `lock_info`, or -1
    pub lock_owner_id: i64,
    /// Name of the owner of `lock_info`
    pub lock_owner_name: Option<String>,
    /// Captured frames, innermost first
    pub stack_trace: Vec<StackFrame>,
    /// Monitors held (empty unless requested)
    pub locked_monitors: Vec<MonitorInfo>,
    /// Ownable synchronizers held (empty unless requested)
    pub locked_synchronizers: Vec<LockInfo>,
}

impl ThreadInfo {
    /// `Class@hash` of the lock the thread waits on
    pub fn lock_name(&self) -> Option<String> {
        self.lock_info.as_ref().map(LockInfo::lock_name)
    }

    /// Composite schema (16 fields)
    pub fn schema() -> Arc<CompositeType> {
        schemas().composite("ThreadInfo", || {
            CompositeType::builder("ThreadInfo")
                .description("Thread snapshot")
                .field("threadId", OpenType::LONG)
                .field("threadName", OpenType::STRING)
                .field("threadState", OpenType::STRING)
                .field("suspended", OpenType::BOOLEAN)
                .field("inNative", OpenType::BOOLEAN)
                .field("blockedCount", OpenType::LONG)
                .field("blockedTime", OpenType::LONG)
                .field("waitedCount", OpenType::LONG)
                .field("waitedTime", OpenType::LONG)
                .field("lockInfo", LockInfo::open_type())
                .field("lockName", OpenType::STRING)
                .field("lockOwnerId", OpenType::LONG)
                .field("lockOwnerName", OpenType::STRING)
                .field("stackTrace", Vec::<StackFrame>::open_type())
                .field("lockedMonitors", Vec::<MonitorInfo>::open_type())
                .field("lockedSynchronizers", Vec::<LockInfo>::open_type())
                .build()
        })
    }
}

impl OpenMapped for ThreadInfo {
    fn open_type() -> OpenType {
        OpenType::Composite(Self::schema())
    }

    fn to_open(&self) -> OpenValue {
        record_value(
            Self::schema(),
            vec![
                ("threadId", self.thread_id.to_open()),
                ("threadName", self.thread_name.to_open()),
                ("threadState", self.thread_state.to_open()),
                ("suspended", self.suspended.to_open()),
                ("inNative", self.in_native.to_open()),
                ("blockedCount", self.blocked_count.to_open()),
                ("blockedTime", self.blocked_time.to_open()),
                ("waitedCount", self.waited_count.to_open()),
                ("waitedTime", self.waited_time.to_open()),
                ("lockInfo", self.lock_info.to_open()),
                ("lockName", self.lock_name().to_open()),
                ("lockOwnerId", self.lock_owner_id.to_open()),
                ("lockOwnerName", self.lock_owner_name.to_open()),
                ("stackTrace", self.stack_trace.to_open()),
                ("lockedMonitors", self.locked_monitors.to_open()),
                ("lockedSynchronizers", self.locked_synchronizers.to_open()),
            ],
        )
    }

    fn from_open(value: &OpenValue) -> MgmtResult<Self> {
        let schema = Self::schema();
        let reader = RecordReader::open(value, &schema)?;
        // lockName is derived from lockInfo and not stored
        Ok(ThreadInfo {
            thread_id: reader.field("threadId")?,
            thread_name: reader.field("threadName")?,
            thread_state: reader.field("threadState")?,
            suspended: reader.field("suspended")?,
            in_native: reader.field("inNative")?,
            blocked_count: reader.field("blockedCount")?,
            blocked_time: reader.field("blockedTime")?,
            waited_count: reader.field("waitedCount")?,
            waited_time: reader.field("waitedTime")?,
            lock_info: reader.field("lockInfo")?,
            lock_owner_id: reader.field("lockOwnerId")?,
            lock_owner_name: reader.field("lockOwnerName")?,
            stack_trace: reader.field("stackTrace")?,
            locked_monitors: reader.field("lockedMonitors")?,
            locked_synchronizers: reader.field("lockedSynchronizers")?,
        })
    }
}
