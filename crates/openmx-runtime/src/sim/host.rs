//! Simulated VM identity and host

use super::memory::SimMemory;
use crate::config::SimulationConfig;
use openmx_engine::native::{
    MemoryBackend, NativeError, NativeQueue, NativeResult, OsBackend, OsEvent, RuntimeBackend,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// CPU load figures, each in [0, 1]; negative means not sampled yet
#[derive(Debug, Clone, Copy)]
struct LoadSample {
    process: f64,
    system: f64,
    average: f64,
}

/// Load shared by the runtime and OS views
#[derive(Debug)]
pub struct HostLoad {
    sample: Mutex<LoadSample>,
}

impl HostLoad {
    /// No samples yet
    pub fn new() -> Self {
        HostLoad {
            sample: Mutex::new(LoadSample {
                process: -1.0,
                system: -1.0,
                average: -1.0,
            }),
        }
    }

    /// Record a sample; values are clamped to [0, 1] and the load average
    /// follows the system load
    pub fn record(&self, process: f64, system: f64) {
        let mut sample = self.sample.lock();
        sample.process = process.clamp(0.0, 1.0);
        sample.system = system.clamp(0.0, 1.0);
        sample.average = if sample.average < 0.0 {
            sample.system
        } else {
            sample.average * 0.8 + sample.system * 0.2
        };
    }
}

impl Default for HostLoad {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Runtime
// ============================================================================

/// Identity of the simulated VM
pub struct SimRuntime {
    started: Instant,
    start_time: i64,
    pid: i64,
    host: String,
    arguments: Vec<String>,
    properties: BTreeMap<String, String>,
    load: Arc<HostLoad>,
}

const VM_NAME: &str = "OpenMX Simulated VM";
const VM_VENDOR: &str = "OpenMX";
const SPEC_NAME: &str = "Java Virtual Machine Specification";
const SPEC_VENDOR: &str = "Oracle Corporation";
const SPEC_VERSION: &str = "1.8";

impl SimRuntime {
    /// Identity for a VM started now
    pub fn new(config: &SimulationConfig, load: Arc<HostLoad>) -> Self {
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| i64::try_from(since.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let arguments = vec![
            format!("-Xmx{}", config.heap_max),
            format!("-XX:ActiveProcessorCount={}", config.effective_processors()),
        ];

        let mut properties = BTreeMap::new();
        for (key, value) in [
            ("java.vm.name", VM_NAME),
            ("java.vm.vendor", VM_VENDOR),
            ("java.vm.version", env!("CARGO_PKG_VERSION")),
            ("java.vm.specification.name", SPEC_NAME),
            ("java.vm.specification.vendor", SPEC_VENDOR),
            ("java.vm.specification.version", SPEC_VERSION),
            ("os.name", std::env::consts::OS),
            ("os.arch", std::env::consts::ARCH),
        ] {
            properties.insert(key.to_string(), value.to_string());
        }

        SimRuntime {
            started: Instant::now(),
            start_time,
            pid: i64::from(std::process::id()),
            host,
            arguments,
            properties,
            load,
        }
    }
}

impl RuntimeBackend for SimRuntime {
    fn name(&self) -> String {
        format!("{}@{}", self.pid, self.host)
    }

    fn vm_name(&self) -> String {
        VM_NAME.to_string()
    }

    fn vm_vendor(&self) -> String {
        VM_VENDOR.to_string()
    }

    fn vm_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn spec_name(&self) -> String {
        SPEC_NAME.to_string()
    }

    fn spec_vendor(&self) -> String {
        SPEC_VENDOR.to_string()
    }

    fn spec_version(&self) -> String {
        SPEC_VERSION.to_string()
    }

    fn input_arguments(&self) -> Vec<String> {
        self.arguments.clone()
    }

    fn uptime(&self) -> NativeResult<i64> {
        Ok(i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX))
    }

    fn start_time(&self) -> NativeResult<i64> {
        Ok(self.start_time)
    }

    fn system_properties(&self) -> NativeResult<BTreeMap<String, String>> {
        Ok(self.properties.clone())
    }

    fn process_id(&self) -> NativeResult<i64> {
        Ok(self.pid)
    }

    fn cpu_load(&self) -> NativeResult<f64> {
        Ok(self.load.sample.lock().process)
    }
}

// ============================================================================
// Operating System
// ============================================================================

/// Host of the simulated VM; reconfigurable when dynamic reconfiguration is on
pub struct SimOs {
    processors: AtomicI32,
    capacity: AtomicI32,
    physical_memory: AtomicI64,
    cpu_time: AtomicI64,
    dynamic: bool,
    memory: Arc<SimMemory>,
    load: Arc<HostLoad>,
    events: Arc<NativeQueue<OsEvent>>,
}

impl SimOs {
    /// Host shaped by the simulation settings
    pub fn new(config: &SimulationConfig, memory: Arc<SimMemory>, load: Arc<HostLoad>) -> Self {
        SimOs {
            processors: AtomicI32::new(config.effective_processors()),
            capacity: AtomicI32::new(config.processing_capacity),
            physical_memory: AtomicI64::new(config.total_physical_memory),
            cpu_time: AtomicI64::new(0),
            dynamic: config.dynamic_reconfiguration,
            memory,
            load,
            events: Arc::new(NativeQueue::new()),
        }
    }

    /// Queue the OS pump drains
    pub fn events(&self) -> &Arc<NativeQueue<OsEvent>> {
        &self.events
    }

    fn reconfigurable(&self, what: &str) -> NativeResult<()> {
        if self.dynamic {
            Ok(())
        } else {
            Err(NativeError::Unsupported(format!("changing {} at run time", what)))
        }
    }

    fn announce(&self, changed: bool, event: OsEvent) {
        if changed {
            tracing::debug!(?event, "host reconfigured");
            self.events.push(event);
        }
    }

    /// Change the processor count
    pub fn set_available_processors(&self, count: i32) -> NativeResult<()> {
        self.reconfigurable("processor count")?;
        if count <= 0 {
            return Err(NativeError::recoverable(format!("processor count {}", count)));
        }
        let previous = self.processors.swap(count, Ordering::SeqCst);
        self.announce(previous != count, OsEvent::AvailableProcessors(count));
        Ok(())
    }

    /// Change the processing capacity
    pub fn set_processing_capacity(&self, capacity: i32) -> NativeResult<()> {
        self.reconfigurable("processing capacity")?;
        if capacity <= 0 {
            return Err(NativeError::recoverable(format!(
                "processing capacity {}",
                capacity
            )));
        }
        let previous = self.capacity.swap(capacity, Ordering::SeqCst);
        self.announce(previous != capacity, OsEvent::ProcessingCapacity(capacity));
        Ok(())
    }

    /// Change the installed physical memory
    pub fn set_total_physical_memory(&self, bytes: i64) -> NativeResult<()> {
        self.reconfigurable("physical memory")?;
        if bytes <= 0 {
            return Err(NativeError::recoverable(format!("physical memory {}", bytes)));
        }
        let previous = self.physical_memory.swap(bytes, Ordering::SeqCst);
        self.announce(previous != bytes, OsEvent::TotalPhysicalMemory(bytes));
        Ok(())
    }

    /// Charge CPU time to the process
    pub fn consume_cpu(&self, nanos: i64) {
        self.cpu_time.fetch_add(nanos, Ordering::Relaxed);
    }
}

impl OsBackend for SimOs {
    fn name(&self) -> String {
        std::env::consts::OS.to_string()
    }

    fn arch(&self) -> String {
        std::env::consts::ARCH.to_string()
    }

    fn version(&self) -> String {
        "sim".to_string()
    }

    fn available_processors(&self) -> i32 {
        self.processors.load(Ordering::SeqCst)
    }

    fn system_load_average(&self) -> NativeResult<f64> {
        let sample = self.load.sample.lock();
        if sample.average < 0.0 {
            return Ok(-1.0);
        }
        Ok(sample.average * f64::from(self.available_processors()))
    }

    fn total_physical_memory(&self) -> NativeResult<i64> {
        Ok(self.physical_memory.load(Ordering::SeqCst))
    }

    fn free_physical_memory(&self) -> NativeResult<i64> {
        let committed =
            self.memory.heap_usage()?.committed() + self.memory.non_heap_usage()?.committed();
        Ok((self.physical_memory.load(Ordering::SeqCst) - committed).max(0))
    }

    fn process_cpu_time(&self) -> NativeResult<i64> {
        Ok(self.cpu_time.load(Ordering::Relaxed))
    }

    fn process_cpu_load(&self) -> NativeResult<f64> {
        Ok(self.load.sample.lock().process)
    }

    fn system_cpu_load(&self) -> NativeResult<f64> {
        Ok(self.load.sample.lock().system)
    }

    fn processing_capacity(&self) -> NativeResult<i32> {
        Ok(self.capacity.load(Ordering::SeqCst))
    }

    fn dynamic_reconfiguration_supported(&self) -> bool {
        self.dynamic
    }

    fn notification_queue(&self) -> Option<Arc<NativeQueue<OsEvent>>> {
        if self.dynamic {
            Some(self.events.clone())
        } else {
            None
        }
    }
}
