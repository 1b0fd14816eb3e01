//! Simulated VM
//!
//! A deterministic implementation of every backend trait. Besides the
//! read-only accessors the beans use, each part exposes driver methods
//! (allocate, spawn, acquire, reconfigure, ...) so tests and the CLI can
//! make the VM do things and watch the beans react.

pub mod host;
pub mod memory;
pub mod services;
pub mod threads;

pub use host::{HostLoad, SimOs, SimRuntime};
pub use memory::{SimCollector, SimManager, SimMemory, SimPool};
pub use services::{SimBufferPool, SimClassLoading, SimCompiler, SimLogging};
pub use threads::{SimThreads, MAIN_THREAD};

use crate::config::SimulationConfig;
use openmx_engine::native::{
    BufferPoolBackend, ClassLoadingBackend, CompilationBackend, LoggingBackend, MemoryBackend,
    NativeResult, OsBackend, RuntimeBackend, ThreadBackend, VmBackend,
};
use std::sync::Arc;

/// Bytes of class storage per loaded class
const CLASS_FOOTPRINT: i64 = 2048;

/// Bytes of code cache per compiled method
const METHOD_FOOTPRINT: i64 = 512;

const BOOT_CLASSES: i32 = 420;

const BOOT_LOGGERS: &[&str] = &["global", "openmx", "openmx.pump"];

/// The whole simulated VM
pub struct SimulatedVm {
    memory: Arc<SimMemory>,
    threads: Arc<SimThreads>,
    runtime: Arc<SimRuntime>,
    os: Arc<SimOs>,
    classes: Arc<SimClassLoading>,
    jit: Option<Arc<SimCompiler>>,
    logging: Arc<SimLogging>,
    buffer_pools: Vec<Arc<SimBufferPool>>,
    load: Arc<HostLoad>,
}

impl SimulatedVm {
    /// Boot a VM shaped by `config`
    pub fn new(config: &SimulationConfig) -> Self {
        let load = Arc::new(HostLoad::new());
        let memory = Arc::new(SimMemory::new(config.heap_max));
        let vm = SimulatedVm {
            threads: Arc::new(SimThreads::new()),
            runtime: Arc::new(SimRuntime::new(config, load.clone())),
            os: Arc::new(SimOs::new(config, memory.clone(), load.clone())),
            classes: Arc::new(SimClassLoading::new(BOOT_CLASSES)),
            jit: config.jit.then(|| Arc::new(SimCompiler::default())),
            logging: Arc::new(SimLogging::new(BOOT_LOGGERS)),
            buffer_pools: vec![
                Arc::new(SimBufferPool::new("direct")),
                Arc::new(SimBufferPool::new("mapped")),
            ],
            memory,
            load,
        };
        tracing::debug!(
            heap_max = config.heap_max,
            processors = vm.os.available_processors(),
            jit = config.jit,
            "simulated VM booted"
        );
        vm
    }

    /// Heap, pools and collectors
    pub fn heap(&self) -> &Arc<SimMemory> {
        &self.memory
    }

    /// Thread table
    pub fn thread_table(&self) -> &Arc<SimThreads> {
        &self.threads
    }

    /// Host
    pub fn host(&self) -> &Arc<SimOs> {
        &self.os
    }

    /// Class counters
    pub fn classes(&self) -> &Arc<SimClassLoading> {
        &self.classes
    }

    /// The JIT, if enabled
    pub fn jit(&self) -> Option<&Arc<SimCompiler>> {
        self.jit.as_ref()
    }

    /// Logger tree
    pub fn loggers(&self) -> &Arc<SimLogging> {
        &self.logging
    }

    /// Buffer pool by name
    pub fn buffers(&self, name: &str) -> Option<&Arc<SimBufferPool>> {
        self.buffer_pools.iter().find(|pool| pool.name() == name)
    }

    /// CPU load shared by the runtime and OS views
    pub fn load(&self) -> &Arc<HostLoad> {
        &self.load
    }

    /// Load classes, growing class storage
    pub fn load_classes(&self, count: i32) -> NativeResult<()> {
        self.memory
            .define_classes(i64::from(count) * CLASS_FOOTPRINT)?;
        self.classes.load(count);
        Ok(())
    }

    /// Compile methods, growing the code cache; a no-op without a JIT
    pub fn compile(&self, methods: i32, millis: i64) -> NativeResult<()> {
        if let Some(jit) = &self.jit {
            self.memory
                .install_code(i64::from(methods) * METHOD_FOOTPRINT)?;
            jit.compile(millis);
        }
        Ok(())
    }
}

impl VmBackend for SimulatedVm {
    fn memory(&self) -> Arc<dyn MemoryBackend> {
        self.memory.clone()
    }

    fn threads(&self) -> Arc<dyn ThreadBackend> {
        self.threads.clone()
    }

    fn runtime(&self) -> Arc<dyn RuntimeBackend> {
        self.runtime.clone()
    }

    fn os(&self) -> Arc<dyn OsBackend> {
        self.os.clone()
    }

    fn class_loading(&self) -> Arc<dyn ClassLoadingBackend> {
        self.classes.clone()
    }

    fn compilation(&self) -> Option<Arc<dyn CompilationBackend>> {
        self.jit
            .as_ref()
            .map(|jit| jit.clone() as Arc<dyn CompilationBackend>)
    }

    fn logging(&self) -> Arc<dyn LoggingBackend> {
        self.logging.clone()
    }

    fn buffer_pools(&self) -> Vec<Arc<dyn BufferPoolBackend>> {
        self.buffer_pools
            .iter()
            .map(|pool| pool.clone() as Arc<dyn BufferPoolBackend>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot() {
        let vm = SimulatedVm::new(&SimulationConfig::default());
        assert_eq!(vm.classes().loaded_class_count().unwrap(), BOOT_CLASSES);
        assert!(vm.compilation().is_some());
        assert_eq!(vm.buffer_pools().len(), 2);
        assert!(vm.buffers("mapped").is_some());
        assert_eq!(vm.logging().logger_level("openmx.pump"), Some(String::new()));
    }

    #[test]
    fn test_without_jit() {
        let config = SimulationConfig {
            jit: false,
            ..SimulationConfig::default()
        };
        let vm = SimulatedVm::new(&config);
        assert!(vm.compilation().is_none());
        let before = vm.memory().non_heap_usage().unwrap().used();
        vm.compile(10, 5).unwrap();
        assert_eq!(vm.memory().non_heap_usage().unwrap().used(), before);
    }

    #[test]
    fn test_class_loading_grows_class_storage() {
        let vm = SimulatedVm::new(&SimulationConfig::default());
        let before = vm.memory().non_heap_usage().unwrap().used();
        vm.load_classes(10).unwrap();
        assert_eq!(
            vm.memory().non_heap_usage().unwrap().used(),
            before + 10 * CLASS_FOOTPRINT
        );
        assert_eq!(vm.classes().total_loaded_class_count().unwrap(), i64::from(BOOT_CLASSES) + 10);
    }
}
