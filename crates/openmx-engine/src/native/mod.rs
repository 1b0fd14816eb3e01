//! Native side: accessor traits, native errors and event queues

pub mod backend;
pub mod queue;

pub use backend::{
    BufferPoolBackend, ClassLoadingBackend, CollectorBackend, CompilationBackend,
    LoggingBackend, ManagerBackend, ManagerRef, MemoryBackend, MemoryEvent, NativeError,
    NativeResult, OsBackend, OsEvent, PoolBackend, RuntimeBackend, ThreadBackend, VmBackend,
};
pub use queue::{NativeQueue, QueueItem};
