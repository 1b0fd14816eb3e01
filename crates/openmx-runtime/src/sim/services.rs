//! Class loading, JIT, logger tree and buffer pools of the simulated VM

use openmx_engine::native::{
    BufferPoolBackend, ClassLoadingBackend, CompilationBackend, LoggingBackend, NativeError,
    NativeResult,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};

// ============================================================================
// Class Loading
// ============================================================================

/// Class counters
#[derive(Debug, Default)]
pub struct SimClassLoading {
    loaded: AtomicI32,
    total: AtomicI64,
    unloaded: AtomicI64,
    verbose: AtomicBool,
}

impl SimClassLoading {
    pub fn new(preloaded: i32) -> Self {
        let classes = SimClassLoading::default();
        classes.load(preloaded);
        classes
    }

    /// Load `count` classes
    pub fn load(&self, count: i32) {
        self.loaded.fetch_add(count, Ordering::Relaxed);
        self.total.fetch_add(i64::from(count), Ordering::Relaxed);
        if self.verbose.load(Ordering::Relaxed) {
            tracing::info!(count, "classes loaded");
        }
    }

    /// Unload up to `count` classes, returning how many went
    pub fn unload(&self, count: i32) -> i32 {
        let mut gone = 0;
        let _ = self
            .loaded
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |loaded| {
                gone = count.min(loaded).max(0);
                Some(loaded - gone)
            });
        self.unloaded.fetch_add(i64::from(gone), Ordering::Relaxed);
        gone
    }
}

impl ClassLoadingBackend for SimClassLoading {
    fn loaded_class_count(&self) -> NativeResult<i32> {
        Ok(self.loaded.load(Ordering::Relaxed))
    }

    fn total_loaded_class_count(&self) -> NativeResult<i64> {
        Ok(self.total.load(Ordering::Relaxed))
    }

    fn unloaded_class_count(&self) -> NativeResult<i64> {
        Ok(self.unloaded.load(Ordering::Relaxed))
    }

    fn verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }
}

// ============================================================================
// Compilation
// ============================================================================

/// The JIT
#[derive(Debug, Default)]
pub struct SimCompiler {
    time: AtomicI64,
}

impl SimCompiler {
    /// Account for a compilation that took `millis`
    pub fn compile(&self, millis: i64) {
        self.time.fetch_add(millis, Ordering::Relaxed);
    }
}

impl CompilationBackend for SimCompiler {
    fn name(&self) -> String {
        "simjit".to_string()
    }

    fn time_monitoring_supported(&self) -> bool {
        true
    }

    fn total_compilation_time(&self) -> NativeResult<i64> {
        Ok(self.time.load(Ordering::Relaxed))
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Logger tree; `None` levels are inherited from the parent
#[derive(Debug)]
pub struct SimLogging {
    loggers: Mutex<BTreeMap<String, Option<String>>>,
}

impl SimLogging {
    /// Root logger at INFO plus the given loggers with inherited levels
    pub fn new(names: &[&str]) -> Self {
        let mut loggers = BTreeMap::new();
        loggers.insert(String::new(), Some("INFO".to_string()));
        for name in names {
            loggers.insert(name.to_string(), None);
        }
        SimLogging {
            loggers: Mutex::new(loggers),
        }
    }

    /// Register a logger with an inherited level
    pub fn add_logger(&self, name: &str) {
        self.loggers.lock().entry(name.to_string()).or_insert(None);
    }
}

impl LoggingBackend for SimLogging {
    fn logger_names(&self) -> Vec<String> {
        self.loggers.lock().keys().cloned().collect()
    }

    fn logger_level(&self, logger: &str) -> Option<String> {
        self.loggers
            .lock()
            .get(logger)
            .map(|level| level.clone().unwrap_or_default())
    }

    fn set_logger_level(&self, logger: &str, level: Option<&str>) -> NativeResult<()> {
        if logger.is_empty() && level.is_none() {
            return Err(NativeError::recoverable("the root logger needs a level"));
        }
        let mut loggers = self.loggers.lock();
        match loggers.get_mut(logger) {
            Some(slot) => {
                *slot = level.map(str::to_string);
                Ok(())
            }
            None => Err(NativeError::recoverable(format!("no logger `{}`", logger))),
        }
    }

    fn parent_logger_name(&self, logger: &str) -> Option<String> {
        let loggers = self.loggers.lock();
        if !loggers.contains_key(logger) {
            return None;
        }
        let mut prefix = logger;
        while let Some(dot) = prefix.rfind('.') {
            prefix = &prefix[..dot];
            if loggers.contains_key(prefix) {
                return Some(prefix.to_string());
            }
        }
        Some(String::new())
    }
}

// ============================================================================
// Buffer Pools
// ============================================================================

/// `direct` or `mapped` buffers
#[derive(Debug)]
pub struct SimBufferPool {
    name: String,
    count: AtomicI64,
    used: AtomicI64,
    capacity: AtomicI64,
}

impl SimBufferPool {
    pub fn new(name: &str) -> Self {
        SimBufferPool {
            name: name.to_string(),
            count: AtomicI64::new(0),
            used: AtomicI64::new(0),
            capacity: AtomicI64::new(0),
        }
    }

    /// Add a buffer of `capacity` bytes
    pub fn allocate(&self, capacity: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.used.fetch_add(capacity, Ordering::Relaxed);
        self.capacity.fetch_add(capacity, Ordering::Relaxed);
    }
}

impl BufferPoolBackend for SimBufferPool {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn count(&self) -> NativeResult<i64> {
        Ok(self.count.load(Ordering::Relaxed))
    }

    fn memory_used(&self) -> NativeResult<i64> {
        Ok(self.used.load(Ordering::Relaxed))
    }

    fn total_capacity(&self) -> NativeResult<i64> {
        Ok(self.capacity.load(Ordering::Relaxed))
    }
}
