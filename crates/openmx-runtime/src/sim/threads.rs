//! Simulated thread table
//!
//! Threads own monitors and synchronizers. A thread that asks for a lock
//! someone else holds blocks on it until the owner releases it, at which
//! point the lowest-numbered waiter gets it. Deadlocks are cycles in the
//! resulting wait-for graph.

use openmx_engine::native::{NativeError, NativeResult, ThreadBackend};
use openmx_engine::records::{LockInfo, MonitorInfo, StackFrame, ThreadInfo, ThreadState};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// ID of the thread created with the VM
pub const MAIN_THREAD: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockKind {
    Monitor,
    Synchronizer,
}

struct Lock {
    info: LockInfo,
    kind: LockKind,
    owner: Option<i64>,
}

struct SimThread {
    name: String,
    daemon: bool,
    state: ThreadState,
    /// Outermost frame first
    stack: Vec<StackFrame>,
    /// Monitor hash and the stack height when it was locked
    monitors: Vec<(i32, usize)>,
    synchronizers: Vec<i32>,
    waiting_on: Option<i32>,
    blocked_count: i64,
    waited_count: i64,
    cpu_time: i64,
}

struct ThreadTable {
    threads: BTreeMap<i64, SimThread>,
    locks: BTreeMap<i32, Lock>,
    next_id: i64,
    next_hash: i32,
    peak: i32,
    total_started: i64,
}

impl ThreadTable {
    fn live(&self) -> i32 {
        i32::try_from(self.threads.len()).unwrap_or(i32::MAX)
    }

    fn thread_mut(&mut self, id: i64) -> NativeResult<&mut SimThread> {
        self.threads
            .get_mut(&id)
            .ok_or_else(|| NativeError::recoverable(format!("no live thread {}", id)))
    }

    /// Owner of the lock `id` waits on, if any
    fn blocker(&self, id: i64, monitors_only: bool) -> Option<i64> {
        let hash = self.threads.get(&id)?.waiting_on?;
        let lock = self.locks.get(&hash)?;
        if monitors_only && lock.kind != LockKind::Monitor {
            return None;
        }
        lock.owner
    }
}

/// Thread subsystem of the simulated VM
pub struct SimThreads {
    table: Mutex<ThreadTable>,
    cpu_time_enabled: AtomicBool,
    contention_enabled: AtomicBool,
}

impl SimThreads {
    /// Start with the main thread and the usual system daemons
    pub fn new() -> Self {
        let threads = SimThreads {
            table: Mutex::new(ThreadTable {
                threads: BTreeMap::new(),
                locks: BTreeMap::new(),
                next_id: MAIN_THREAD,
                next_hash: 0x1b6d_3586,
                peak: 0,
                total_started: 0,
            }),
            cpu_time_enabled: AtomicBool::new(true),
            contention_enabled: AtomicBool::new(false),
        };
        let main = threads.spawn("main", false);
        threads.push_frame(main, "Main", "main").ok();
        for name in ["Reference Handler", "Finalizer", "Signal Dispatcher"] {
            threads.spawn(name, true);
        }
        threads
    }

    /// Start a thread, returning its ID
    pub fn spawn(&self, name: &str, daemon: bool) -> i64 {
        let mut table = self.table.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.threads.insert(
            id,
            SimThread {
                name: name.to_string(),
                daemon,
                state: ThreadState::Runnable,
                stack: Vec::new(),
                monitors: Vec::new(),
                synchronizers: Vec::new(),
                waiting_on: None,
                blocked_count: 0,
                waited_count: 0,
                cpu_time: 0,
            },
        );
        table.total_started += 1;
        table.peak = table.peak.max(table.live());
        tracing::trace!(id, name, daemon, "thread started");
        id
    }

    /// End a thread, releasing everything it holds
    pub fn terminate(&self, id: i64) -> NativeResult<()> {
        let held: Vec<i32> = {
            let mut table = self.table.lock();
            let thread = table.thread_mut(id)?;
            thread.state = ThreadState::Terminated;
            thread
                .monitors
                .iter()
                .map(|(hash, _)| *hash)
                .chain(thread.synchronizers.iter().copied())
                .collect()
        };
        for hash in held {
            self.release_hash(id, hash)?;
        }
        let mut table = self.table.lock();
        if let Some(thread) = table.threads.remove(&id) {
            if let Some(hash) = thread.waiting_on {
                tracing::debug!(id, hash, "terminated while waiting");
            }
        }
        Ok(())
    }

    fn new_lock(&self, class_name: &str, kind: LockKind) -> LockInfo {
        let mut table = self.table.lock();
        let hash = table.next_hash;
        table.next_hash = table.next_hash.wrapping_add(0x2f1);
        let info = LockInfo::new(class_name, hash);
        table.locks.insert(
            hash,
            Lock {
                info: info.clone(),
                kind,
                owner: None,
            },
        );
        info
    }

    /// Create an object monitor
    pub fn new_monitor(&self, class_name: &str) -> LockInfo {
        self.new_lock(class_name, LockKind::Monitor)
    }

    /// Create an ownable synchronizer
    pub fn new_synchronizer(&self, class_name: &str) -> LockInfo {
        self.new_lock(class_name, LockKind::Synchronizer)
    }

    /// Enter a method
    pub fn push_frame(&self, id: i64, class_name: &str, method_name: &str) -> NativeResult<()> {
        let mut table = self.table.lock();
        let thread = table.thread_mut(id)?;
        let line = i32::try_from(thread.stack.len() * 10 + 12).unwrap_or(-1);
        let file = format!("{}.java", class_name.rsplit('.').next().unwrap_or(class_name));
        thread
            .stack
            .push(StackFrame::new(class_name, method_name, Some(&file), line));
        Ok(())
    }

    /// Leave the innermost method
    pub fn pop_frame(&self, id: i64) -> NativeResult<()> {
        let mut table = self.table.lock();
        table.thread_mut(id)?.stack.pop();
        Ok(())
    }

    /// Charge CPU time to a thread
    pub fn consume_cpu(&self, id: i64, nanos: i64) -> NativeResult<()> {
        let mut table = self.table.lock();
        table.thread_mut(id)?.cpu_time += nanos;
        Ok(())
    }

    /// Take a lock; `false` means the thread is now blocked on it
    pub fn acquire(&self, id: i64, lock: &LockInfo) -> NativeResult<bool> {
        let mut table = self.table.lock();
        let hash = lock.identity_hash_code;
        let (kind, owner) = match table.locks.get(&hash) {
            Some(entry) => (entry.kind, entry.owner),
            None => {
                return Err(NativeError::recoverable(format!(
                    "unknown lock {}",
                    lock.lock_name()
                )))
            }
        };
        let thread = table.thread_mut(id)?;
        match owner {
            Some(owner) if owner == id => Ok(true),
            Some(_) => {
                thread.waiting_on = Some(hash);
                match kind {
                    LockKind::Monitor => {
                        thread.state = ThreadState::Blocked;
                        thread.blocked_count += 1;
                    }
                    LockKind::Synchronizer => {
                        thread.state = ThreadState::Waiting;
                        thread.waited_count += 1;
                    }
                }
                Ok(false)
            }
            None => {
                grant(&mut table, id, hash, kind);
                Ok(true)
            }
        }
    }

    /// Release a held lock, handing it to the next waiter
    pub fn release(&self, id: i64, lock: &LockInfo) -> NativeResult<()> {
        self.release_hash(id, lock.identity_hash_code)
    }

    fn release_hash(&self, id: i64, hash: i32) -> NativeResult<()> {
        let mut table = self.table.lock();
        let kind = match table.locks.get_mut(&hash) {
            Some(lock) if lock.owner == Some(id) => {
                lock.owner = None;
                lock.kind
            }
            _ => {
                return Err(NativeError::recoverable(format!(
                    "thread {} does not hold lock {:x}",
                    id, hash
                )))
            }
        };
        if let Some(thread) = table.threads.get_mut(&id) {
            thread.monitors.retain(|(held, _)| *held != hash);
            thread.synchronizers.retain(|held| *held != hash);
        }
        let next = table
            .threads
            .iter()
            .find(|(_, thread)| thread.waiting_on == Some(hash))
            .map(|(waiter, _)| *waiter);
        if let Some(waiter) = next {
            grant(&mut table, waiter, hash, kind);
        }
        Ok(())
    }
}

fn grant(table: &mut ThreadTable, id: i64, hash: i32, kind: LockKind) {
    if let Some(lock) = table.locks.get_mut(&hash) {
        lock.owner = Some(id);
    }
    if let Some(thread) = table.threads.get_mut(&id) {
        thread.waiting_on = None;
        thread.state = ThreadState::Runnable;
        match kind {
            LockKind::Monitor => thread.monitors.push((hash, thread.stack.len())),
            LockKind::Synchronizer => thread.synchronizers.push(hash),
        }
    }
}

impl Default for SimThreads {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadBackend for SimThreads {
    fn thread_count(&self) -> NativeResult<i32> {
        Ok(self.table.lock().live())
    }

    fn peak_thread_count(&self) -> NativeResult<i32> {
        Ok(self.table.lock().peak)
    }

    fn daemon_thread_count(&self) -> NativeResult<i32> {
        let table = self.table.lock();
        let daemons = table.threads.values().filter(|thread| thread.daemon).count();
        Ok(i32::try_from(daemons).unwrap_or(i32::MAX))
    }

    fn total_started_thread_count(&self) -> NativeResult<i64> {
        Ok(self.table.lock().total_started)
    }

    fn reset_peak_thread_count(&self) -> NativeResult<()> {
        let mut table = self.table.lock();
        table.peak = table.live();
        Ok(())
    }

    fn all_thread_ids(&self) -> NativeResult<Vec<i64>> {
        Ok(self.table.lock().threads.keys().copied().collect())
    }

    fn thread_info(
        &self,
        id: i64,
        max_depth: i32,
        locked_monitors: bool,
        locked_synchronizers: bool,
    ) -> NativeResult<Option<ThreadInfo>> {
        let table = self.table.lock();
        let thread = match table.threads.get(&id) {
            Some(thread) => thread,
            None => return Ok(None),
        };
        let height = thread.stack.len();
        let depth = usize::try_from(max_depth).unwrap_or(height);
        let stack_trace: Vec<StackFrame> = thread.stack.iter().rev().take(depth).cloned().collect();

        let monitors = if locked_monitors {
            thread
                .monitors
                .iter()
                .filter_map(|(hash, locked_at)| {
                    let lock = table.locks.get(hash)?;
                    let from_top = height.checked_sub(*locked_at)?;
                    let frame = stack_trace.get(from_top).cloned();
                    Some(MonitorInfo {
                        lock: lock.info.clone(),
                        locked_stack_depth: match frame {
                            Some(_) => i32::try_from(from_top).unwrap_or(-1),
                            None => -1,
                        },
                        locked_stack_frame: frame,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };
        let synchronizers = if locked_synchronizers {
            thread
                .synchronizers
                .iter()
                .filter_map(|hash| table.locks.get(hash).map(|lock| lock.info.clone()))
                .collect()
        } else {
            Vec::new()
        };

        let waiting = thread.waiting_on.and_then(|hash| table.locks.get(&hash));
        let owner = waiting.and_then(|lock| lock.owner);
        let timed = self.contention_enabled.load(Ordering::Relaxed);
        Ok(Some(ThreadInfo {
            thread_id: id,
            thread_name: thread.name.clone(),
            thread_state: Some(thread.state),
            suspended: false,
            in_native: false,
            blocked_count: thread.blocked_count,
            blocked_time: if timed { 0 } else { -1 },
            waited_count: thread.waited_count,
            waited_time: if timed { 0 } else { -1 },
            lock_info: waiting.map(|lock| lock.info.clone()),
            lock_owner_id: owner.unwrap_or(-1),
            lock_owner_name: owner
                .and_then(|owner| table.threads.get(&owner))
                .map(|owner| owner.name.clone()),
            stack_trace,
            locked_monitors: monitors,
            locked_synchronizers: synchronizers,
        }))
    }

    fn current_thread_cpu_time(&self) -> NativeResult<i64> {
        self.thread_cpu_time(MAIN_THREAD)
    }

    fn thread_cpu_time(&self, id: i64) -> NativeResult<i64> {
        if !self.cpu_time_enabled.load(Ordering::Relaxed) {
            return Ok(-1);
        }
        Ok(self
            .table
            .lock()
            .threads
            .get(&id)
            .map_or(-1, |thread| thread.cpu_time))
    }

    fn thread_cpu_time_supported(&self) -> bool {
        true
    }

    fn thread_cpu_time_enabled(&self) -> bool {
        self.cpu_time_enabled.load(Ordering::Relaxed)
    }

    fn set_thread_cpu_time_enabled(&self, enabled: bool) -> NativeResult<()> {
        self.cpu_time_enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    fn contention_monitoring_supported(&self) -> bool {
        true
    }

    fn contention_monitoring_enabled(&self) -> bool {
        self.contention_enabled.load(Ordering::Relaxed)
    }

    fn set_contention_monitoring_enabled(&self, enabled: bool) -> NativeResult<()> {
        self.contention_enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    fn find_deadlocked_threads(&self, monitors_only: bool) -> NativeResult<Vec<i64>> {
        let table = self.table.lock();
        let mut deadlocked = BTreeSet::new();
        for &start in table.threads.keys() {
            let mut path = vec![start];
            let mut current = start;
            while let Some(next) = table.blocker(current, monitors_only) {
                if let Some(pos) = path.iter().position(|id| *id == next) {
                    deadlocked.extend(path[pos..].iter().copied());
                    break;
                }
                if deadlocked.contains(&next) {
                    break;
                }
                path.push(next);
                current = next;
            }
        }
        Ok(deadlocked.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_threads() {
        let threads = SimThreads::new();
        assert_eq!(threads.thread_count().unwrap(), 4);
        assert_eq!(threads.daemon_thread_count().unwrap(), 3);
        assert_eq!(threads.all_thread_ids().unwrap(), vec![1, 2, 3, 4]);
        let main = threads.thread_info(MAIN_THREAD, -1, false, false).unwrap().unwrap();
        assert_eq!(main.thread_name, "main");
        assert_eq!(main.stack_trace[0].method_name, "main");
    }

    #[test]
    fn test_peak_and_terminate() {
        let threads = SimThreads::new();
        let worker = threads.spawn("worker", false);
        threads.terminate(worker).unwrap();
        assert_eq!(threads.thread_count().unwrap(), 4);
        assert_eq!(threads.peak_thread_count().unwrap(), 5);
        assert_eq!(threads.total_started_thread_count().unwrap(), 5);
        threads.reset_peak_thread_count().unwrap();
        assert_eq!(threads.peak_thread_count().unwrap(), 4);
        assert_eq!(threads.thread_info(worker, 0, false, false).unwrap(), None);
    }

    #[test]
    fn test_blocked_thread_reports_owner() {
        let threads = SimThreads::new();
        let a = threads.spawn("a", false);
        let b = threads.spawn("b", false);
        let lock = threads.new_monitor("java.lang.Object");
        assert!(threads.acquire(a, &lock).unwrap());
        assert!(!threads.acquire(b, &lock).unwrap());

        let info = threads.thread_info(b, 0, false, false).unwrap().unwrap();
        assert_eq!(info.thread_state, Some(ThreadState::Blocked));
        assert_eq!(info.lock_owner_id, a);
        assert_eq!(info.lock_owner_name.as_deref(), Some("a"));
        assert_eq!(info.blocked_time, -1);

        threads.release(a, &lock).unwrap();
        let info = threads.thread_info(b, 0, true, false).unwrap().unwrap();
        assert_eq!(info.thread_state, Some(ThreadState::Runnable));
        assert_eq!(info.locked_monitors.len(), 1);
        assert_eq!(info.locked_monitors[0].locked_stack_depth, -1);
    }

    #[test]
    fn test_monitor_frame_depth() {
        let threads = SimThreads::new();
        let lock = threads.new_monitor("Cache");
        threads.push_frame(MAIN_THREAD, "Cache", "fill").unwrap();
        threads.acquire(MAIN_THREAD, &lock).unwrap();
        threads.push_frame(MAIN_THREAD, "Cache", "load").unwrap();

        let info = threads.thread_info(MAIN_THREAD, -1, true, false).unwrap().unwrap();
        assert_eq!(info.stack_trace.len(), 3);
        let monitor = &info.locked_monitors[0];
        assert_eq!(monitor.locked_stack_depth, 1);
        assert_eq!(
            monitor.locked_stack_frame.as_ref().map(|f| f.method_name.as_str()),
            Some("fill")
        );
    }

    #[test]
    fn test_deadlock_cycle() {
        let threads = SimThreads::new();
        let a = threads.spawn("a", false);
        let b = threads.spawn("b", false);
        let c = threads.spawn("c", false);
        let first = threads.new_monitor("First");
        let second = threads.new_synchronizer("Second");
        threads.acquire(a, &first).unwrap();
        threads.acquire(b, &second).unwrap();
        threads.acquire(a, &second).unwrap();
        threads.acquire(b, &first).unwrap();
        // c waits on the cycle but is not part of it
        threads.acquire(c, &first).unwrap();

        assert_eq!(threads.find_deadlocked_threads(false).unwrap(), vec![a, b]);
        assert!(threads.find_deadlocked_threads(true).unwrap().is_empty());
    }

    #[test]
    fn test_cpu_time_toggle() {
        let threads = SimThreads::new();
        threads.consume_cpu(MAIN_THREAD, 500).unwrap();
        assert_eq!(threads.current_thread_cpu_time().unwrap(), 500);
        threads.set_thread_cpu_time_enabled(false).unwrap();
        assert_eq!(threads.thread_cpu_time(MAIN_THREAD).unwrap(), -1);
    }
}
