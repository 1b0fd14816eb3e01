//! Simulated heap
//!
//! Five pools: eden and survivor (collected by the scavenger and by the
//! global collector), tenured (global collector only), class storage and
//! code cache (plain managers). Allocations land in eden unless they are
//! larger than eden. A full eden triggers a minor collection that keeps an
//! eighth of eden in survivor and promotes the previous survivor contents
//! to tenured. A full collection empties both young pools and halves
//! tenured.
//!
//! Usage thresholds notify on crossing only and re-arm once usage drops
//! below the threshold. Collection-usage thresholds are checked after every
//! collection of the pool.

use openmx_engine::native::{
    CollectorBackend, ManagerBackend, ManagerRef, MemoryBackend, MemoryEvent, NativeError,
    NativeQueue, NativeResult, PoolBackend,
};
use openmx_engine::records::{GcInfo, MemoryType, MemoryUsage};
use openmx_sdk::Severity;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub const EDEN: &str = "Eden Space";
pub const SURVIVOR: &str = "Survivor Space";
pub const TENURED: &str = "Tenured Gen";
pub const CLASS_STORAGE: &str = "Class Storage";
pub const CODE_CACHE: &str = "Code Cache";

pub const SCAVENGER: &str = "Scavenge";
pub const GLOBAL: &str = "Global";
pub const CLASS_STORAGE_MANAGER: &str = "Class Storage Manager";
pub const CODE_CACHE_MANAGER: &str = "Code Cache Manager";

const MB: i64 = 1024 * 1024;

fn snapshot(init: i64, used: i64, committed: i64, max: i64) -> NativeResult<MemoryUsage> {
    MemoryUsage::new(init, used, committed, max).map_err(|err| NativeError::Fault {
        severity: Severity::Fatal,
        message: err.to_string(),
    })
}

// ============================================================================
// Pools
// ============================================================================

struct PoolState {
    used: i64,
    committed: i64,
    max: i64,
    peak_used: i64,
    peak_committed: i64,
    collection_usage: Option<MemoryUsage>,
    usage_threshold: i64,
    usage_threshold_count: i64,
    above_usage_threshold: bool,
    collection_threshold: i64,
    collection_threshold_count: i64,
}

impl PoolState {
    fn recommit(&mut self, init: i64) {
        let mut committed = self.used.max(init);
        if self.max >= 0 {
            committed = committed.min(self.max);
        }
        self.committed = committed;
        self.peak_used = self.peak_used.max(self.used);
        self.peak_committed = self.peak_committed.max(self.committed);
    }
}

/// One simulated memory pool
pub struct SimPool {
    name: String,
    memory_type: MemoryType,
    init: i64,
    usage_threshold_supported: bool,
    collected: bool,
    manager_names: Vec<String>,
    state: Mutex<PoolState>,
    events: Arc<NativeQueue<MemoryEvent>>,
}

impl SimPool {
    #[allow(clippy::too_many_arguments)]
    fn new(
        name: &str,
        memory_type: MemoryType,
        init: i64,
        max: i64,
        used: i64,
        usage_threshold_supported: bool,
        collected: bool,
        manager_names: &[&str],
        events: Arc<NativeQueue<MemoryEvent>>,
    ) -> Arc<Self> {
        let mut state = PoolState {
            used,
            committed: 0,
            max,
            peak_used: 0,
            peak_committed: 0,
            collection_usage: None,
            usage_threshold: 0,
            usage_threshold_count: 0,
            above_usage_threshold: false,
            collection_threshold: 0,
            collection_threshold_count: 0,
        };
        state.recommit(init);
        if collected {
            state.collection_usage = MemoryUsage::new(init, 0, state.committed, max).ok();
        }
        Arc::new(SimPool {
            name: name.to_string(),
            memory_type,
            init,
            usage_threshold_supported,
            collected,
            manager_names: manager_names.iter().map(|name| name.to_string()).collect(),
            state: Mutex::new(state),
            events,
        })
    }

    /// Bytes in use
    pub fn used(&self) -> i64 {
        self.state.lock().used
    }

    /// Capacity, or -1 if unbounded
    pub fn max(&self) -> i64 {
        self.state.lock().max
    }

    fn free(&self) -> i64 {
        let state = self.state.lock();
        if state.max < 0 {
            i64::MAX
        } else {
            state.max - state.used
        }
    }

    fn crossing(&self, state: &mut PoolState) -> Option<MemoryEvent> {
        if state.usage_threshold <= 0 || state.used < state.usage_threshold {
            state.above_usage_threshold = false;
            return None;
        }
        if state.above_usage_threshold {
            return None;
        }
        state.above_usage_threshold = true;
        state.usage_threshold_count += 1;
        match snapshot(self.init, state.used, state.committed, state.max) {
            Ok(usage) => Some(MemoryEvent::UsageThresholdExceeded {
                pool: self.name.clone(),
                usage,
                count: state.usage_threshold_count,
            }),
            Err(err) => {
                tracing::error!(pool = %self.name, %err, "pool usage out of range");
                None
            }
        }
    }

    fn post(&self, event: Option<MemoryEvent>) {
        if let Some(event) = event {
            tracing::trace!(pool = %self.name, ?event, "memory event posted");
            self.events.push(event);
        }
    }

    fn add(&self, bytes: i64) -> NativeResult<()> {
        let event = {
            let mut state = self.state.lock();
            if state.max >= 0 && state.used + bytes > state.max {
                return Err(NativeError::recoverable(format!(
                    "{} cannot hold {} more bytes",
                    self.name, bytes
                )));
            }
            state.used += bytes;
            state.recommit(self.init);
            if self.usage_threshold_supported {
                self.crossing(&mut state)
            } else {
                None
            }
        };
        self.post(event);
        Ok(())
    }

    fn set_used(&self, used: i64) {
        let event = {
            let mut state = self.state.lock();
            state.used = used;
            state.recommit(self.init);
            if self.usage_threshold_supported {
                self.crossing(&mut state)
            } else {
                None
            }
        };
        self.post(event);
    }

    fn set_max(&self, max: i64) -> NativeResult<()> {
        let mut state = self.state.lock();
        if max < state.used {
            return Err(NativeError::recoverable(format!(
                "{} holds {} bytes, cannot shrink to {}",
                self.name, state.used, max
            )));
        }
        state.max = max;
        state.recommit(self.init);
        Ok(())
    }

    /// Record the usage left by a collection and check the collection threshold
    fn record_collection(&self) {
        let event = {
            let mut state = self.state.lock();
            let usage = match snapshot(self.init, state.used, state.committed, state.max) {
                Ok(usage) => usage,
                Err(err) => {
                    tracing::error!(pool = %self.name, %err, "pool usage out of range");
                    return;
                }
            };
            state.collection_usage = Some(usage);
            if state.collection_threshold > 0 && usage.used() >= state.collection_threshold {
                state.collection_threshold_count += 1;
                Some(MemoryEvent::CollectionThresholdExceeded {
                    pool: self.name.clone(),
                    usage,
                    count: state.collection_threshold_count,
                })
            } else {
                None
            }
        };
        self.post(event);
    }

    fn unsupported(&self, what: &str) -> NativeError {
        NativeError::Unsupported(format!("{} threshold on {}", what, self.name))
    }
}

impl PoolBackend for SimPool {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    fn usage(&self) -> NativeResult<MemoryUsage> {
        let state = self.state.lock();
        snapshot(self.init, state.used, state.committed, state.max)
    }

    fn peak_usage(&self) -> NativeResult<MemoryUsage> {
        let state = self.state.lock();
        let committed = state.peak_committed.max(state.peak_used);
        let max = if state.max >= 0 { state.max.max(committed) } else { -1 };
        snapshot(self.init, state.peak_used, committed, max)
    }

    fn collection_usage(&self) -> NativeResult<Option<MemoryUsage>> {
        Ok(self.state.lock().collection_usage)
    }

    fn reset_peak_usage(&self) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.peak_used = state.used;
        state.peak_committed = state.committed;
        Ok(())
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn manager_names(&self) -> Vec<String> {
        self.manager_names.clone()
    }

    fn usage_threshold_supported(&self) -> bool {
        self.usage_threshold_supported
    }

    fn usage_threshold(&self) -> NativeResult<i64> {
        if !self.usage_threshold_supported {
            return Err(self.unsupported("usage"));
        }
        Ok(self.state.lock().usage_threshold)
    }

    fn set_usage_threshold(&self, threshold: i64) -> NativeResult<()> {
        if !self.usage_threshold_supported {
            return Err(self.unsupported("usage"));
        }
        let event = {
            let mut state = self.state.lock();
            state.usage_threshold = threshold;
            state.above_usage_threshold = false;
            self.crossing(&mut state)
        };
        self.post(event);
        Ok(())
    }

    fn usage_threshold_count(&self) -> NativeResult<i64> {
        if !self.usage_threshold_supported {
            return Err(self.unsupported("usage"));
        }
        Ok(self.state.lock().usage_threshold_count)
    }

    fn collection_usage_threshold_supported(&self) -> bool {
        self.collected
    }

    fn collection_usage_threshold(&self) -> NativeResult<i64> {
        if !self.collected {
            return Err(self.unsupported("collection usage"));
        }
        Ok(self.state.lock().collection_threshold)
    }

    fn set_collection_usage_threshold(&self, threshold: i64) -> NativeResult<()> {
        if !self.collected {
            return Err(self.unsupported("collection usage"));
        }
        self.state.lock().collection_threshold = threshold;
        Ok(())
    }

    fn collection_usage_threshold_count(&self) -> NativeResult<i64> {
        if !self.collected {
            return Err(self.unsupported("collection usage"));
        }
        Ok(self.state.lock().collection_threshold_count)
    }
}

fn as_pool_backends(pools: &[Arc<SimPool>]) -> Vec<Arc<dyn PoolBackend>> {
    pools
        .iter()
        .map(|pool| pool.clone() as Arc<dyn PoolBackend>)
        .collect()
}

// ============================================================================
// Managers and Collectors
// ============================================================================

/// Manager that does not collect
pub struct SimManager {
    name: String,
    pools: Vec<Arc<SimPool>>,
}

impl ManagerBackend for SimManager {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn pools(&self) -> Vec<Arc<dyn PoolBackend>> {
        as_pool_backends(&self.pools)
    }
}

#[derive(Default)]
struct CollectorStats {
    count: i64,
    time: i64,
    last_start: i64,
    last_end: i64,
    freed: i64,
    compacts: i64,
    last_info: Option<GcInfo>,
}

/// A garbage collector and its statistics
pub struct SimCollector {
    name: String,
    pools: Vec<Arc<SimPool>>,
    stats: Mutex<CollectorStats>,
}

impl SimCollector {
    fn new(name: &str, pools: Vec<Arc<SimPool>>) -> Arc<Self> {
        Arc::new(SimCollector {
            name: name.to_string(),
            pools,
            stats: Mutex::new(CollectorStats::default()),
        })
    }

    /// Collections so far
    pub fn count(&self) -> i64 {
        self.stats.lock().count
    }
}

impl ManagerBackend for SimCollector {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn pools(&self) -> Vec<Arc<dyn PoolBackend>> {
        as_pool_backends(&self.pools)
    }
}

impl CollectorBackend for SimCollector {
    fn collection_count(&self) -> NativeResult<i64> {
        Ok(self.stats.lock().count)
    }

    fn collection_time(&self) -> NativeResult<i64> {
        Ok(self.stats.lock().time)
    }

    fn last_collection_start_time(&self) -> NativeResult<i64> {
        Ok(self.stats.lock().last_start)
    }

    fn last_collection_end_time(&self) -> NativeResult<i64> {
        Ok(self.stats.lock().last_end)
    }

    fn total_memory_freed(&self) -> NativeResult<i64> {
        Ok(self.stats.lock().freed)
    }

    fn total_compacts(&self) -> NativeResult<i64> {
        Ok(self.stats.lock().compacts)
    }

    fn memory_used(&self) -> NativeResult<i64> {
        Ok(self.pools.iter().map(|pool| pool.used()).sum())
    }

    fn last_gc_info(&self) -> NativeResult<Option<GcInfo>> {
        Ok(self.stats.lock().last_info.clone())
    }
}

// ============================================================================
// Heap
// ============================================================================

/// Heap-wide state: pools, managers, the event queue and heap sizing
pub struct SimMemory {
    eden: Arc<SimPool>,
    survivor: Arc<SimPool>,
    tenured: Arc<SimPool>,
    class_storage: Arc<SimPool>,
    code_cache: Arc<SimPool>,
    scavenger: Arc<SimCollector>,
    global: Arc<SimCollector>,
    class_manager: Arc<SimManager>,
    code_manager: Arc<SimManager>,
    events: Arc<NativeQueue<MemoryEvent>>,
    verbose: AtomicBool,
    pending_finalization: AtomicI32,
    heap_limit: i64,
    started: Instant,
    heap_lock: Mutex<()>,
}

impl SimMemory {
    /// Lay out a heap of `heap_max` bytes
    pub fn new(heap_max: i64) -> Self {
        let events = Arc::new(NativeQueue::new());
        let eden_max = heap_max / 4;
        let survivor_max = heap_max / 16;
        let tenured_max = heap_max - eden_max - survivor_max;
        let young = [SCAVENGER, GLOBAL];

        let eden = SimPool::new(
            EDEN, MemoryType::Heap, eden_max / 4, eden_max, 0, false, true, &young, events.clone(),
        );
        let survivor = SimPool::new(
            SURVIVOR, MemoryType::Heap, survivor_max / 4, survivor_max, 0, false, true, &young,
            events.clone(),
        );
        let tenured = SimPool::new(
            TENURED, MemoryType::Heap, tenured_max / 4, tenured_max, 0, true, true, &[GLOBAL],
            events.clone(),
        );
        let class_storage = SimPool::new(
            CLASS_STORAGE, MemoryType::NonHeap, 0, -1, 4 * MB, true, false,
            &[CLASS_STORAGE_MANAGER], events.clone(),
        );
        let code_cache = SimPool::new(
            CODE_CACHE, MemoryType::NonHeap, 2 * MB, 48 * MB, MB, true, false,
            &[CODE_CACHE_MANAGER], events.clone(),
        );

        SimMemory {
            scavenger: SimCollector::new(SCAVENGER, vec![eden.clone(), survivor.clone()]),
            global: SimCollector::new(
                GLOBAL,
                vec![eden.clone(), survivor.clone(), tenured.clone()],
            ),
            class_manager: Arc::new(SimManager {
                name: CLASS_STORAGE_MANAGER.to_string(),
                pools: vec![class_storage.clone()],
            }),
            code_manager: Arc::new(SimManager {
                name: CODE_CACHE_MANAGER.to_string(),
                pools: vec![code_cache.clone()],
            }),
            eden,
            survivor,
            tenured,
            class_storage,
            code_cache,
            events,
            verbose: AtomicBool::new(false),
            pending_finalization: AtomicI32::new(0),
            heap_limit: heap_max.saturating_mul(2),
            started: Instant::now(),
            heap_lock: Mutex::new(()),
        }
    }

    /// Pool by name
    pub fn pool(&self, name: &str) -> Option<&Arc<SimPool>> {
        self.all_pools().into_iter().find(|pool| pool.name == name)
    }

    fn all_pools(&self) -> [&Arc<SimPool>; 5] {
        [
            &self.eden,
            &self.survivor,
            &self.tenured,
            &self.class_storage,
            &self.code_cache,
        ]
    }

    /// The young-generation collector
    pub fn scavenger(&self) -> &Arc<SimCollector> {
        &self.scavenger
    }

    /// The full-heap collector
    pub fn global_collector(&self) -> &Arc<SimCollector> {
        &self.global
    }

    /// Queue the memory pump drains
    pub fn events(&self) -> &Arc<NativeQueue<MemoryEvent>> {
        &self.events
    }

    fn uptime_ms(&self) -> i64 {
        i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    /// Allocate heap bytes, collecting as needed
    pub fn allocate(&self, bytes: i64) -> NativeResult<()> {
        if bytes < 0 {
            return Err(NativeError::recoverable(format!(
                "cannot allocate {} bytes",
                bytes
            )));
        }
        let _heap = self.heap_lock.lock();
        if bytes > self.eden.max() {
            self.reserve_tenured(bytes)?;
            return self.tenured.add(bytes);
        }
        if self.eden.free() < bytes {
            self.minor_collection("Allocation Failure")?;
        }
        self.eden.add(bytes)
    }

    /// Grow class storage, as class loading does
    pub fn define_classes(&self, bytes: i64) -> NativeResult<()> {
        self.class_storage.add(bytes)
    }

    /// Grow the code cache, as compilation does
    pub fn install_code(&self, bytes: i64) -> NativeResult<()> {
        self.code_cache.add(bytes)
    }

    /// Objects awaiting finalization; cleared by the next full collection
    pub fn register_finalizable(&self, count: i32) {
        self.pending_finalization.fetch_add(count, Ordering::Relaxed);
    }

    fn reserve_tenured(&self, bytes: i64) -> NativeResult<()> {
        if self.tenured.free() < bytes {
            self.full_collection("Allocation Failure")?;
        }
        if self.tenured.free() < bytes {
            return Err(NativeError::recoverable(format!(
                "out of memory: {} bytes do not fit in {}",
                bytes, TENURED
            )));
        }
        Ok(())
    }

    fn usage_map(&self) -> NativeResult<BTreeMap<String, MemoryUsage>> {
        self.all_pools()
            .into_iter()
            .map(|pool| Ok((pool.name.clone(), pool.usage()?)))
            .collect()
    }

    fn minor_collection(&self, cause: &str) -> NativeResult<()> {
        let eden_used = self.eden.used();
        let survivor_used = self.survivor.used();
        let survivors = eden_used / 8;
        let kept = survivors.min(self.survivor.max());
        let promoted = survivor_used + (survivors - kept);
        if self.tenured.free() < promoted {
            return self.full_collection(cause);
        }

        let before = self.usage_map()?;
        let start = self.uptime_ms();
        self.eden.set_used(0);
        self.survivor.set_used(kept);
        self.tenured.add(promoted)?;
        self.eden.record_collection();
        self.survivor.record_collection();

        let freed = eden_used + survivor_used - kept - promoted;
        let duration = 1 + eden_used / (64 * MB);
        self.finish(&self.scavenger, "end of minor GC", cause, start, duration, before, freed, false)
    }

    fn full_collection(&self, cause: &str) -> NativeResult<()> {
        let before = self.usage_map()?;
        let start = self.uptime_ms();
        let young = self.eden.used() + self.survivor.used();
        let old = self.tenured.used();
        let kept = old / 2;

        self.eden.set_used(0);
        self.survivor.set_used(0);
        self.tenured.set_used(kept);
        self.pending_finalization.store(0, Ordering::Relaxed);
        for pool in [&self.eden, &self.survivor, &self.tenured] {
            pool.record_collection();
        }

        let freed = young + old - kept;
        let duration = 5 + old / (32 * MB);
        self.finish(&self.global, "end of major GC", cause, start, duration, before, freed, true)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        collector: &SimCollector,
        action: &str,
        cause: &str,
        start: i64,
        duration: i64,
        before: BTreeMap<String, MemoryUsage>,
        freed: i64,
        compacting: bool,
    ) -> NativeResult<()> {
        let after = self.usage_map()?;
        let info = {
            let mut stats = collector.stats.lock();
            stats.count += 1;
            stats.time += duration;
            stats.last_start = start;
            stats.last_end = start + duration;
            stats.freed += freed;
            if compacting {
                stats.compacts += 1;
            }
            let info = GcInfo {
                id: stats.count,
                start_time: start,
                end_time: start + duration,
                memory_usage_before_gc: before,
                memory_usage_after_gc: after,
            };
            stats.last_info = Some(info.clone());
            info
        };
        if self.verbose.load(Ordering::Relaxed) {
            tracing::info!(collector = %collector.name, id = info.id, freed, cause, "{}", action);
        }
        self.events.push(MemoryEvent::CollectionCompleted {
            collector: collector.name.clone(),
            action: action.to_string(),
            cause: cause.to_string(),
            info,
        });
        Ok(())
    }
}

impl MemoryBackend for SimMemory {
    fn heap_usage(&self) -> NativeResult<MemoryUsage> {
        Ok(self
            .eden
            .usage()?
            .combine(&self.survivor.usage()?)
            .combine(&self.tenured.usage()?))
    }

    fn non_heap_usage(&self) -> NativeResult<MemoryUsage> {
        Ok(self.class_storage.usage()?.combine(&self.code_cache.usage()?))
    }

    fn pending_finalization_count(&self) -> NativeResult<i32> {
        Ok(self.pending_finalization.load(Ordering::Relaxed))
    }

    fn verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    fn max_heap_size(&self) -> NativeResult<i64> {
        Ok(self.eden.max() + self.survivor.max() + self.tenured.max())
    }

    fn set_max_heap_size(&self, size: i64) -> NativeResult<()> {
        let _heap = self.heap_lock.lock();
        let tenured_max = size - self.eden.max() - self.survivor.max();
        if tenured_max <= 0 {
            return Err(NativeError::recoverable(format!(
                "heap of {} bytes leaves no room for {}",
                size, TENURED
            )));
        }
        self.tenured.set_max(tenured_max)
    }

    fn max_heap_size_limit(&self) -> NativeResult<i64> {
        Ok(self.heap_limit)
    }

    fn set_max_heap_size_supported(&self) -> bool {
        true
    }

    fn gc(&self) -> NativeResult<()> {
        let _heap = self.heap_lock.lock();
        self.full_collection("System.gc()")
    }

    fn managers(&self) -> Vec<ManagerRef> {
        vec![
            ManagerRef::Collector(self.scavenger.clone()),
            ManagerRef::Collector(self.global.clone()),
            ManagerRef::Manager(self.class_manager.clone()),
            ManagerRef::Manager(self.code_manager.clone()),
        ]
    }

    fn notification_queue(&self) -> Option<Arc<NativeQueue<MemoryEvent>>> {
        Some(self.events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmx_engine::native::QueueItem;

    /// A heap whose event queue accepts events as if a pump were attached
    fn armed(heap_max: i64) -> SimMemory {
        let memory = SimMemory::new(heap_max);
        memory.events().arm();
        memory
    }

    fn drain(memory: &SimMemory) -> Vec<MemoryEvent> {
        let mut events = Vec::new();
        while memory.events().pending() > 0 {
            if let QueueItem::Event(event) = memory.events().take() {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn test_layout() {
        let memory = SimMemory::new(64 * MB);
        assert_eq!(memory.max_heap_size().unwrap(), 64 * MB);
        let heap = memory.heap_usage().unwrap();
        assert_eq!(heap.used(), 0);
        assert_eq!(heap.max(), 64 * MB);
        assert_eq!(memory.non_heap_usage().unwrap().max(), -1);
        assert_eq!(memory.managers().len(), 4);
    }

    #[test]
    fn test_allocation_triggers_minor_collection() {
        let memory = armed(64 * MB);
        let eden_max = memory.pool(EDEN).unwrap().max();
        memory.allocate(eden_max).unwrap();
        assert_eq!(memory.scavenger().count(), 0);
        memory.allocate(MB).unwrap();
        assert_eq!(memory.scavenger().count(), 1);
        assert_eq!(memory.pool(EDEN).unwrap().used(), MB);
        assert_eq!(memory.pool(SURVIVOR).unwrap().used(), eden_max / 8);

        let events = drain(&memory);
        assert!(matches!(
            events.last(),
            Some(MemoryEvent::CollectionCompleted { collector, .. }) if collector == SCAVENGER
        ));
        let info = memory.scavenger().last_gc_info().unwrap().unwrap();
        assert_eq!(info.id, 1);
        assert_eq!(info.memory_usage_before_gc[EDEN].used(), eden_max);
        assert_eq!(info.memory_usage_after_gc[EDEN].used(), 0);
    }

    #[test]
    fn test_usage_threshold_notifies_on_crossing_only() {
        let memory = armed(64 * MB);
        let tenured = memory.pool(TENURED).unwrap().clone();
        tenured.set_usage_threshold(10 * MB).unwrap();

        memory.allocate(20 * MB).unwrap();
        memory.allocate(20 * MB).unwrap();
        let crossings: Vec<_> = drain(&memory)
            .into_iter()
            .filter(|event| matches!(event, MemoryEvent::UsageThresholdExceeded { .. }))
            .collect();
        assert_eq!(crossings.len(), 1);
        assert_eq!(tenured.usage_threshold_count().unwrap(), 1);

        // 40 -> 20 -> 10 MB stays at or above the threshold
        memory.gc().unwrap();
        memory.gc().unwrap();
        assert_eq!(tenured.usage_threshold_count().unwrap(), 1);
        // 5 MB re-arms it
        memory.gc().unwrap();
        memory.allocate(20 * MB).unwrap();
        assert_eq!(tenured.usage_threshold_count().unwrap(), 2);
    }

    #[test]
    fn test_collection_threshold_checked_after_gc() {
        let memory = armed(64 * MB);
        let tenured = memory.pool(TENURED).unwrap().clone();
        tenured.set_collection_usage_threshold(MB).unwrap();
        memory.allocate(30 * MB).unwrap();
        memory.gc().unwrap();
        assert_eq!(tenured.collection_usage_threshold_count().unwrap(), 1);
        assert_eq!(
            tenured.collection_usage().unwrap().unwrap().used(),
            15 * MB
        );
        assert!(drain(&memory).iter().any(|event| matches!(
            event,
            MemoryEvent::CollectionThresholdExceeded { pool, count: 1, .. } if pool == TENURED
        )));
    }

    #[test]
    fn test_events_dropped_without_a_pump() {
        let memory = SimMemory::new(64 * MB);
        for _ in 0..1000 {
            memory.gc().unwrap();
        }
        assert_eq!(memory.global_collector().count(), 1000);
        assert_eq!(memory.events().pending(), 0);

        memory.events().arm();
        memory.gc().unwrap();
        assert_eq!(memory.events().pending(), 1);
        memory.events().signal_shutdown();
        for _ in 0..1000 {
            memory.gc().unwrap();
        }
        assert_eq!(memory.events().pending(), 1);
    }

    #[test]
    fn test_unsupported_thresholds() {
        let memory = SimMemory::new(64 * MB);
        let eden = memory.pool(EDEN).unwrap();
        assert!(matches!(
            eden.set_usage_threshold(1),
            Err(NativeError::Unsupported(_))
        ));
        let code = memory.pool(CODE_CACHE).unwrap();
        assert_eq!(code.collection_usage().unwrap(), None);
    }

    #[test]
    fn test_heap_resize() {
        let memory = SimMemory::new(64 * MB);
        memory.set_max_heap_size(96 * MB).unwrap();
        assert_eq!(memory.max_heap_size().unwrap(), 96 * MB);
        assert!(memory.set_max_heap_size(MB).is_err());
    }

    #[test]
    fn test_out_of_memory() {
        let memory = SimMemory::new(16 * MB);
        assert!(memory.allocate(64 * MB).is_err());
    }
}
