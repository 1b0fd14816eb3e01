//! Native accessor boundary
//!
//! Beans never touch VM internals directly; every counter, snapshot and
//! control goes through these traits. A real VM binding and the simulated
//! backend in `openmx-runtime` both implement them. Calls are synchronous
//! and `-1` results are domain values ("undefined"), not errors.

use crate::native::queue::NativeQueue;
use crate::records::{GcInfo, MemoryType, MemoryUsage, ThreadInfo};
use openmx_sdk::{MgmtError, Severity};
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Errors
// ============================================================================

/// Result type for native calls
pub type NativeResult<T> = Result<T, NativeError>;

/// Failure reported by a native accessor
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NativeError {
    /// The VM lacks this capability
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The native call failed
    #[error("native fault ({severity}): {message}")]
    Fault {
        /// Whether the VM is still consistent
        severity: Severity,
        /// Failure description
        message: String,
    },
}

impl NativeError {
    /// Shorthand for a recoverable fault
    pub fn recoverable(message: impl Into<String>) -> Self {
        NativeError::Fault {
            severity: Severity::Recoverable,
            message: message.into(),
        }
    }
}

impl From<NativeError> for MgmtError {
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::Unsupported(what) => MgmtError::UnsupportedOperation(what),
            NativeError::Fault { severity, message } => {
                MgmtError::NativeInvocationFailure { severity, message }
            }
        }
    }
}

// ============================================================================
// Native Events
// ============================================================================

/// Events posted by the memory subsystem
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEvent {
    /// Pool usage crossed the usage threshold
    UsageThresholdExceeded {
        /// Pool name
        pool: String,
        /// Usage at crossing time
        usage: MemoryUsage,
        /// Crossing count, this one included
        count: i64,
    },
    /// Usage after a collection crossed the collection-usage threshold
    CollectionThresholdExceeded {
        /// Pool name
        pool: String,
        /// Collection usage at crossing time
        usage: MemoryUsage,
        /// Crossing count, this one included
        count: i64,
    },
    /// A collector finished a collection
    CollectionCompleted {
        /// Collector name
        collector: String,
        /// `end of minor GC` / `end of major GC`
        action: String,
        /// Trigger
        cause: String,
        /// The collection
        info: GcInfo,
    },
}

/// Events posted when the host is reconfigured
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OsEvent {
    /// Processor count changed
    AvailableProcessors(i32),
    /// Processing capacity (percent of entitlement) changed
    ProcessingCapacity(i32),
    /// Installed physical memory changed
    TotalPhysicalMemory(i64),
}

// ============================================================================
// Memory
// ============================================================================

/// Heap-wide accessors
pub trait MemoryBackend: Send + Sync {
    /// Heap usage summed over heap pools
    fn heap_usage(&self) -> NativeResult<MemoryUsage>;
    /// Non-heap usage summed over non-heap pools
    fn non_heap_usage(&self) -> NativeResult<MemoryUsage>;
    /// Objects waiting for finalization
    fn pending_finalization_count(&self) -> NativeResult<i32>;
    /// Verbose GC output flag
    fn verbose(&self) -> bool;
    /// Set the verbose GC output flag
    fn set_verbose(&self, verbose: bool);
    /// Current maximum heap size
    fn max_heap_size(&self) -> NativeResult<i64>;
    /// Resize the heap limit
    fn set_max_heap_size(&self, size: i64) -> NativeResult<()>;
    /// Upper bound accepted by `set_max_heap_size`
    fn max_heap_size_limit(&self) -> NativeResult<i64>;
    /// The heap limit can be changed at run time
    fn set_max_heap_size_supported(&self) -> bool;
    /// Run a full collection
    fn gc(&self) -> NativeResult<()>;
    /// Memory managers, collectors included
    fn managers(&self) -> Vec<ManagerRef>;
    /// Queue carrying threshold and collection events, if the VM posts them
    fn notification_queue(&self) -> Option<Arc<NativeQueue<MemoryEvent>>>;
}

/// One memory pool
pub trait PoolBackend: Send + Sync {
    /// Pool name
    fn name(&self) -> String;
    /// Heap or non-heap
    fn memory_type(&self) -> MemoryType;
    /// Current usage
    fn usage(&self) -> NativeResult<MemoryUsage>;
    /// Peak usage since start or last reset
    fn peak_usage(&self) -> NativeResult<MemoryUsage>;
    /// Usage after the most recent collection, if the pool is collected
    fn collection_usage(&self) -> NativeResult<Option<MemoryUsage>>;
    /// Reset peak usage to current usage
    fn reset_peak_usage(&self) -> NativeResult<()>;
    /// The pool still exists
    fn is_valid(&self) -> bool;
    /// Names of the managers managing this pool
    fn manager_names(&self) -> Vec<String>;

    /// Usage thresholds are supported
    fn usage_threshold_supported(&self) -> bool;
    /// Usage threshold in bytes; 0 disables
    fn usage_threshold(&self) -> NativeResult<i64>;
    /// Set the usage threshold (already validated)
    fn set_usage_threshold(&self, threshold: i64) -> NativeResult<()>;
    /// Times usage crossed the threshold
    fn usage_threshold_count(&self) -> NativeResult<i64>;

    /// Collection-usage thresholds are supported
    fn collection_usage_threshold_supported(&self) -> bool;
    /// Collection-usage threshold in bytes; 0 disables
    fn collection_usage_threshold(&self) -> NativeResult<i64>;
    /// Set the collection-usage threshold (already validated)
    fn set_collection_usage_threshold(&self, threshold: i64) -> NativeResult<()>;
    /// Times collection usage crossed the threshold
    fn collection_usage_threshold_count(&self) -> NativeResult<i64>;
}

/// A memory manager
pub trait ManagerBackend: Send + Sync {
    /// Manager name
    fn name(&self) -> String;
    /// The manager still exists
    fn is_valid(&self) -> bool;
    /// Pools this manager manages
    fn pools(&self) -> Vec<Arc<dyn PoolBackend>>;
}

/// A memory manager that collects garbage
pub trait CollectorBackend: ManagerBackend {
    /// Collections so far
    fn collection_count(&self) -> NativeResult<i64>;
    /// Accumulated collection time in milliseconds
    fn collection_time(&self) -> NativeResult<i64>;
    /// Start of the last collection, ms since VM start; 0 if none
    fn last_collection_start_time(&self) -> NativeResult<i64>;
    /// End of the last collection, ms since VM start; 0 if none
    fn last_collection_end_time(&self) -> NativeResult<i64>;
    /// Bytes freed over all collections
    fn total_memory_freed(&self) -> NativeResult<i64>;
    /// Compacting collections so far
    fn total_compacts(&self) -> NativeResult<i64>;
    /// Bytes in use across managed pools
    fn memory_used(&self) -> NativeResult<i64>;
    /// The last collection, if any
    fn last_gc_info(&self) -> NativeResult<Option<GcInfo>>;
}

/// Entry of the manager list: a plain manager or a collector
#[derive(Clone)]
pub enum ManagerRef {
    /// Manager that does not collect
    Manager(Arc<dyn ManagerBackend>),
    /// Garbage collector
    Collector(Arc<dyn CollectorBackend>),
}

impl ManagerRef {
    /// Manager name
    pub fn name(&self) -> String {
        match self {
            ManagerRef::Manager(manager) => manager.name(),
            ManagerRef::Collector(collector) => collector.name(),
        }
    }

    /// Pools managed
    pub fn pools(&self) -> Vec<Arc<dyn PoolBackend>> {
        match self {
            ManagerRef::Manager(manager) => manager.pools(),
            ManagerRef::Collector(collector) => collector.pools(),
        }
    }

    /// Address of the native object, for identity comparisons
    pub fn addr(&self) -> *const () {
        match self {
            ManagerRef::Manager(manager) => Arc::as_ptr(manager) as *const (),
            ManagerRef::Collector(collector) => Arc::as_ptr(collector) as *const (),
        }
    }
}

// ============================================================================
// Threads
// ============================================================================

/// Thread system accessors
pub trait ThreadBackend: Send + Sync {
    /// Live threads
    fn thread_count(&self) -> NativeResult<i32>;
    /// Peak live threads since start or last reset
    fn peak_thread_count(&self) -> NativeResult<i32>;
    /// Live daemon threads
    fn daemon_thread_count(&self) -> NativeResult<i32>;
    /// Threads started since VM start
    fn total_started_thread_count(&self) -> NativeResult<i64>;
    /// Reset the peak to the current count
    fn reset_peak_thread_count(&self) -> NativeResult<()>;
    /// IDs of live threads
    fn all_thread_ids(&self) -> NativeResult<Vec<i64>>;
    /// Snapshot of a live thread; `max_depth` of -1 captures the whole stack
    fn thread_info(
        &self,
        id: i64,
        max_depth: i32,
        locked_monitors: bool,
        locked_synchronizers: bool,
    ) -> NativeResult<Option<ThreadInfo>>;
    /// CPU time of the calling thread in ns, or -1 when disabled
    fn current_thread_cpu_time(&self) -> NativeResult<i64>;
    /// CPU time of a thread in ns, or -1 when disabled or not alive
    fn thread_cpu_time(&self, id: i64) -> NativeResult<i64>;
    /// CPU time measurement is supported
    fn thread_cpu_time_supported(&self) -> bool;
    /// CPU time measurement is on
    fn thread_cpu_time_enabled(&self) -> bool;
    /// Turn CPU time measurement on or off
    fn set_thread_cpu_time_enabled(&self, enabled: bool) -> NativeResult<()>;
    /// Contention monitoring is supported
    fn contention_monitoring_supported(&self) -> bool;
    /// Contention monitoring is on
    fn contention_monitoring_enabled(&self) -> bool;
    /// Turn contention monitoring on or off
    fn set_contention_monitoring_enabled(&self, enabled: bool) -> NativeResult<()>;
    /// Threads in a deadlock cycle; monitors only, or monitors and synchronizers
    fn find_deadlocked_threads(&self, monitors_only: bool) -> NativeResult<Vec<i64>>;
}

// ============================================================================
// Runtime / OS
// ============================================================================

/// VM identity and process accessors
pub trait RuntimeBackend: Send + Sync {
    /// `pid@hostname`
    fn name(&self) -> String;
    /// VM implementation name
    fn vm_name(&self) -> String;
    /// VM implementation vendor
    fn vm_vendor(&self) -> String;
    /// VM implementation version
    fn vm_version(&self) -> String;
    /// Specification name
    fn spec_name(&self) -> String;
    /// Specification vendor
    fn spec_vendor(&self) -> String;
    /// Specification version
    fn spec_version(&self) -> String;
    /// Arguments the VM was started with
    fn input_arguments(&self) -> Vec<String>;
    /// Milliseconds since VM start
    fn uptime(&self) -> NativeResult<i64>;
    /// VM start, ms since the epoch
    fn start_time(&self) -> NativeResult<i64>;
    /// System properties
    fn system_properties(&self) -> NativeResult<BTreeMap<String, String>>;
    /// Process ID
    fn process_id(&self) -> NativeResult<i64>;
    /// Recent VM CPU load in [0, 1], or negative if unavailable
    fn cpu_load(&self) -> NativeResult<f64>;
}

/// Host accessors
pub trait OsBackend: Send + Sync {
    /// OS name
    fn name(&self) -> String;
    /// OS architecture
    fn arch(&self) -> String;
    /// OS version
    fn version(&self) -> String;
    /// Processors available to the VM
    fn available_processors(&self) -> i32;
    /// One-minute load average, or negative if unavailable
    fn system_load_average(&self) -> NativeResult<f64>;
    /// Installed physical memory in bytes
    fn total_physical_memory(&self) -> NativeResult<i64>;
    /// Free physical memory in bytes
    fn free_physical_memory(&self) -> NativeResult<i64>;
    /// CPU time used by the process in ns
    fn process_cpu_time(&self) -> NativeResult<i64>;
    /// Recent process CPU load in [0, 1]
    fn process_cpu_load(&self) -> NativeResult<f64>;
    /// Recent host CPU load in [0, 1]
    fn system_cpu_load(&self) -> NativeResult<f64>;
    /// Processing capacity as a percentage of entitlement
    fn processing_capacity(&self) -> NativeResult<i32>;
    /// The host can be reconfigured while the VM runs
    fn dynamic_reconfiguration_supported(&self) -> bool;
    /// Queue carrying reconfiguration events, if the VM posts them
    fn notification_queue(&self) -> Option<Arc<NativeQueue<OsEvent>>>;
}

// ============================================================================
// Class Loading / Compilation / Logging / Buffers
// ============================================================================

/// Class loading counters
pub trait ClassLoadingBackend: Send + Sync {
    /// Classes currently loaded
    fn loaded_class_count(&self) -> NativeResult<i32>;
    /// Classes loaded since VM start
    fn total_loaded_class_count(&self) -> NativeResult<i64>;
    /// Classes unloaded since VM start
    fn unloaded_class_count(&self) -> NativeResult<i64>;
    /// Verbose class loading output flag
    fn verbose(&self) -> bool;
    /// Set the verbose class loading output flag
    fn set_verbose(&self, verbose: bool);
}

/// JIT compiler accessors
pub trait CompilationBackend: Send + Sync {
    /// Compiler name
    fn name(&self) -> String;
    /// Compilation time is measured
    fn time_monitoring_supported(&self) -> bool;
    /// Accumulated compilation time in ms
    fn total_compilation_time(&self) -> NativeResult<i64>;
}

/// Logger tree accessors
pub trait LoggingBackend: Send + Sync {
    /// Names of registered loggers; the root logger is `""`
    fn logger_names(&self) -> Vec<String>;
    /// `None` if no such logger, `Some("")` if the level is inherited
    fn logger_level(&self, logger: &str) -> Option<String>;
    /// Set (or, with `None`, clear) a logger's level; logger and level are validated
    fn set_logger_level(&self, logger: &str, level: Option<&str>) -> NativeResult<()>;
    /// `None` if no such logger, `Some("")` for the root logger
    fn parent_logger_name(&self, logger: &str) -> Option<String>;
}

/// A pool of direct or mapped buffers
pub trait BufferPoolBackend: Send + Sync {
    /// `direct` or `mapped`
    fn name(&self) -> String;
    /// Buffers in the pool
    fn count(&self) -> NativeResult<i64>;
    /// Bytes used by the pool
    fn memory_used(&self) -> NativeResult<i64>;
    /// Total capacity of all buffers
    fn total_capacity(&self) -> NativeResult<i64>;
}

// ============================================================================
// VM
// ============================================================================

/// Entry point to a VM's native accessors
pub trait VmBackend: Send + Sync {
    /// Memory subsystem
    fn memory(&self) -> Arc<dyn MemoryBackend>;
    /// Thread subsystem
    fn threads(&self) -> Arc<dyn ThreadBackend>;
    /// VM identity
    fn runtime(&self) -> Arc<dyn RuntimeBackend>;
    /// Host
    fn os(&self) -> Arc<dyn OsBackend>;
    /// Class loading
    fn class_loading(&self) -> Arc<dyn ClassLoadingBackend>;
    /// JIT compiler; `None` when the VM interprets only
    fn compilation(&self) -> Option<Arc<dyn CompilationBackend>>;
    /// Logger tree
    fn logging(&self) -> Arc<dyn LoggingBackend>;
    /// Buffer pools
    fn buffer_pools(&self) -> Vec<Arc<dyn BufferPoolBackend>>;
}
