//! Platform: the process-wide table of beans
//!
//! Fixed kinds are created on first access and cached. List kinds are
//! derived from the VM's manager list: managers are de-duplicated by
//! identity, pools are flattened from every manager and de-duplicated the
//! same way because several managers can share one pool.

use crate::beans::{
    BufferPoolBean, ClassLoadingBean, CompilationBean, GarbageCollectorBean, LoggingBean,
    MemoryBean, MemoryManagerBean, MemoryPoolBean, OperatingSystemBean, RuntimeBean,
    ThreadingBean,
};
use crate::config::PlatformConfig;
use crate::mgmt::{Dispatcher, DynamicBean, ManagedBean, MetadataCache};
use crate::native::{ManagerRef, VmBackend};
use crate::notify::ShutdownCoordinator;
use once_cell::sync::OnceCell;
use openmx_sdk::ObjectName;
use rustc_hash::FxHashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// Bean Kinds
// ============================================================================

/// Every kind of bean the platform exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeanKind {
    Memory,
    Threading,
    Runtime,
    OperatingSystem,
    ClassLoading,
    Compilation,
    Logging,
    BufferPool,
    MemoryPool,
    GarbageCollector,
    MemoryManager,
}

impl BeanKind {
    /// All kinds in listing order
    pub const ALL: [BeanKind; 11] = [
        BeanKind::Memory,
        BeanKind::Threading,
        BeanKind::Runtime,
        BeanKind::OperatingSystem,
        BeanKind::ClassLoading,
        BeanKind::Compilation,
        BeanKind::Logging,
        BeanKind::BufferPool,
        BeanKind::MemoryPool,
        BeanKind::GarbageCollector,
        BeanKind::MemoryManager,
    ];

    /// Kinds with at most one bean
    pub fn is_singleton(self) -> bool {
        !matches!(
            self,
            BeanKind::BufferPool
                | BeanKind::MemoryPool
                | BeanKind::GarbageCollector
                | BeanKind::MemoryManager
        )
    }

    /// Short name, as accepted by `FromStr`
    pub fn as_str(self) -> &'static str {
        match self {
            BeanKind::Memory => "memory",
            BeanKind::Threading => "threading",
            BeanKind::Runtime => "runtime",
            BeanKind::OperatingSystem => "os",
            BeanKind::ClassLoading => "class-loading",
            BeanKind::Compilation => "compilation",
            BeanKind::Logging => "logging",
            BeanKind::BufferPool => "buffer-pool",
            BeanKind::MemoryPool => "memory-pool",
            BeanKind::GarbageCollector => "gc",
            BeanKind::MemoryManager => "memory-manager",
        }
    }
}

impl fmt::Display for BeanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unknown bean kind name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bean kind `{0}`")]
pub struct UnknownBeanKind(pub String);

impl FromStr for BeanKind {
    type Err = UnknownBeanKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BeanKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownBeanKind(s.to_string()))
    }
}

// ============================================================================
// Platform
// ============================================================================

struct ManagerBeans {
    plain: Vec<Arc<Dispatcher<MemoryManagerBean>>>,
    collectors: Vec<Arc<Dispatcher<GarbageCollectorBean>>>,
    /// Every manager, collectors included, in VM order
    all: Vec<Arc<dyn DynamicBean>>,
}

/// Owner of every bean, the metadata cache and the pump coordinator
pub struct Platform {
    backend: Arc<dyn VmBackend>,
    config: PlatformConfig,
    cache: MetadataCache,
    coordinator: Arc<ShutdownCoordinator>,

    memory: OnceCell<Arc<Dispatcher<MemoryBean>>>,
    threading: OnceCell<Arc<Dispatcher<ThreadingBean>>>,
    runtime: OnceCell<Arc<Dispatcher<RuntimeBean>>>,
    operating_system: OnceCell<Arc<Dispatcher<OperatingSystemBean>>>,
    class_loading: OnceCell<Arc<Dispatcher<ClassLoadingBean>>>,
    compilation: OnceCell<Option<Arc<Dispatcher<CompilationBean>>>>,
    logging: OnceCell<Arc<Dispatcher<LoggingBean>>>,

    buffer_pools: OnceCell<Vec<Arc<Dispatcher<BufferPoolBean>>>>,
    memory_pools: OnceCell<Vec<Arc<Dispatcher<MemoryPoolBean>>>>,
    managers: OnceCell<ManagerBeans>,
}

impl Platform {
    /// Create an empty platform over a VM; beans are built lazily
    pub fn new(backend: Arc<dyn VmBackend>, config: PlatformConfig) -> Self {
        let cache = MetadataCache::new();
        cache.register::<MemoryBean>();
        cache.register::<ThreadingBean>();
        cache.register::<RuntimeBean>();
        cache.register::<OperatingSystemBean>();
        cache.register::<ClassLoadingBean>();
        cache.register::<CompilationBean>();
        cache.register::<LoggingBean>();
        cache.register::<BufferPoolBean>();
        cache.register::<MemoryPoolBean>();
        cache.register::<GarbageCollectorBean>();
        cache.register::<MemoryManagerBean>();

        Platform {
            backend,
            config,
            cache,
            coordinator: Arc::new(ShutdownCoordinator::new()),
            memory: OnceCell::new(),
            threading: OnceCell::new(),
            runtime: OnceCell::new(),
            operating_system: OnceCell::new(),
            class_loading: OnceCell::new(),
            compilation: OnceCell::new(),
            logging: OnceCell::new(),
            buffer_pools: OnceCell::new(),
            memory_pools: OnceCell::new(),
            managers: OnceCell::new(),
        }
    }

    fn wrap<B: ManagedBean>(&self, bean: B) -> Arc<Dispatcher<B>> {
        Arc::new(Dispatcher::new(bean, self.cache.table::<B>()))
    }

    /// Settings the platform was built with
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Interface metadata shared by all beans
    pub fn metadata(&self) -> &MetadataCache {
        &self.cache
    }

    /// Coordinator stopping every pump
    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    // ------------------------------------------------------------------------
    // Fixed kinds
    // ------------------------------------------------------------------------

    /// Memory bean; its pump starts on first access
    pub fn memory(&self) -> &Arc<Dispatcher<MemoryBean>> {
        self.memory.get_or_init(|| {
            self.wrap(MemoryBean::new(
                self.backend.memory(),
                &self.config,
                &self.coordinator,
            ))
        })
    }

    pub fn threading(&self) -> &Arc<Dispatcher<ThreadingBean>> {
        self.threading
            .get_or_init(|| self.wrap(ThreadingBean::new(self.backend.threads())))
    }

    pub fn runtime(&self) -> &Arc<Dispatcher<RuntimeBean>> {
        self.runtime
            .get_or_init(|| self.wrap(RuntimeBean::new(self.backend.runtime())))
    }

    /// Operating system bean; its pump starts on first access
    pub fn operating_system(&self) -> &Arc<Dispatcher<OperatingSystemBean>> {
        self.operating_system.get_or_init(|| {
            self.wrap(OperatingSystemBean::new(
                self.backend.os(),
                &self.config,
                &self.coordinator,
            ))
        })
    }

    pub fn class_loading(&self) -> &Arc<Dispatcher<ClassLoadingBean>> {
        self.class_loading
            .get_or_init(|| self.wrap(ClassLoadingBean::new(self.backend.class_loading())))
    }

    /// Compilation bean; `None` on a VM without a JIT
    pub fn compilation(&self) -> Option<&Arc<Dispatcher<CompilationBean>>> {
        self.compilation
            .get_or_init(|| {
                self.backend
                    .compilation()
                    .map(|backend| self.wrap(CompilationBean::new(backend)))
            })
            .as_ref()
    }

    pub fn logging(&self) -> &Arc<Dispatcher<LoggingBean>> {
        self.logging
            .get_or_init(|| self.wrap(LoggingBean::new(self.backend.logging())))
    }

    // ------------------------------------------------------------------------
    // List kinds
    // ------------------------------------------------------------------------

    pub fn buffer_pools(&self) -> &[Arc<Dispatcher<BufferPoolBean>>] {
        self.buffer_pools.get_or_init(|| {
            self.backend
                .buffer_pools()
                .into_iter()
                .map(|pool| self.wrap(BufferPoolBean::new(pool)))
                .collect()
        })
    }

    /// Every pool of every manager, once each
    pub fn memory_pools(&self) -> &[Arc<Dispatcher<MemoryPoolBean>>] {
        self.memory_pools.get_or_init(|| {
            let mut seen = FxHashSet::default();
            let mut pools = Vec::new();
            for manager in self.backend.memory().managers() {
                for pool in manager.pools() {
                    if seen.insert(Arc::as_ptr(&pool) as *const () as usize) {
                        pools.push(self.wrap(MemoryPoolBean::new(pool)));
                    }
                }
            }
            tracing::debug!(pools = pools.len(), "memory pool beans created");
            pools
        })
    }

    fn managers(&self) -> &ManagerBeans {
        self.managers.get_or_init(|| {
            let mut seen = FxHashSet::default();
            let mut beans = ManagerBeans {
                plain: Vec::new(),
                collectors: Vec::new(),
                all: Vec::new(),
            };
            for manager in self.backend.memory().managers() {
                if !seen.insert(manager.addr() as usize) {
                    continue;
                }
                match manager {
                    ManagerRef::Manager(backend) => {
                        let bean = self.wrap(MemoryManagerBean::new(backend));
                        beans.all.push(bean.clone());
                        beans.plain.push(bean);
                    }
                    ManagerRef::Collector(backend) => {
                        let bean = self.wrap(GarbageCollectorBean::new(backend));
                        beans.all.push(bean.clone());
                        beans.collectors.push(bean);
                    }
                }
            }
            tracing::debug!(
                managers = beans.all.len(),
                collectors = beans.collectors.len(),
                "memory manager beans created"
            );
            beans
        })
    }

    pub fn garbage_collectors(&self) -> &[Arc<Dispatcher<GarbageCollectorBean>>] {
        &self.managers().collectors
    }

    /// Every memory manager; collectors are managers too
    pub fn memory_managers(&self) -> &[Arc<dyn DynamicBean>] {
        &self.managers().all
    }

    // ------------------------------------------------------------------------
    // Dynamic access
    // ------------------------------------------------------------------------

    /// The bean of a fixed kind; `None` for list kinds and for an absent compiler
    pub fn get(&self, kind: BeanKind) -> Option<Arc<dyn DynamicBean>> {
        let bean: Arc<dyn DynamicBean> = match kind {
            BeanKind::Memory => self.memory().clone(),
            BeanKind::Threading => self.threading().clone(),
            BeanKind::Runtime => self.runtime().clone(),
            BeanKind::OperatingSystem => self.operating_system().clone(),
            BeanKind::ClassLoading => self.class_loading().clone(),
            BeanKind::Compilation => self.compilation()?.clone(),
            BeanKind::Logging => self.logging().clone(),
            BeanKind::BufferPool
            | BeanKind::MemoryPool
            | BeanKind::GarbageCollector
            | BeanKind::MemoryManager => return None,
        };
        Some(bean)
    }

    /// Every bean of a kind. `MemoryManager` lists the managers that do
    /// not collect; collectors are listed under `GarbageCollector`.
    pub fn beans(&self, kind: BeanKind) -> Vec<Arc<dyn DynamicBean>> {
        fn erase<B: ManagedBean>(beans: &[Arc<Dispatcher<B>>]) -> Vec<Arc<dyn DynamicBean>> {
            beans
                .iter()
                .map(|bean| bean.clone() as Arc<dyn DynamicBean>)
                .collect()
        }
        match kind {
            BeanKind::BufferPool => erase(self.buffer_pools()),
            BeanKind::MemoryPool => erase(self.memory_pools()),
            BeanKind::GarbageCollector => erase(self.garbage_collectors()),
            BeanKind::MemoryManager => erase(&self.managers().plain),
            fixed => self.get(fixed).into_iter().collect(),
        }
    }

    /// Every bean, in kind order
    pub fn all_beans(&self) -> Vec<Arc<dyn DynamicBean>> {
        BeanKind::ALL
            .iter()
            .flat_map(|kind| self.beans(*kind))
            .collect()
    }

    /// The bean registered under exactly this name
    pub fn find(&self, name: &ObjectName) -> Option<Arc<dyn DynamicBean>> {
        self.all_beans()
            .into_iter()
            .find(|bean| bean.object_name() == Some(name))
    }

    /// Beans whose names match a pattern
    pub fn query(&self, pattern: &ObjectName) -> Vec<Arc<dyn DynamicBean>> {
        self.all_beans()
            .into_iter()
            .filter(|bean| bean.object_name().is_some_and(|name| name.matches(pattern)))
            .collect()
    }

    /// Stop every pump. Idempotent; beans stay usable afterwards.
    pub fn shutdown(&self) {
        self.coordinator.shutdown();
    }
}

impl Drop for Platform {
    fn drop(&mut self) {
        self.shutdown();
    }
}
