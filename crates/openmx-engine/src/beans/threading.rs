//! Threading bean: counts, snapshots, CPU time and deadlock detection

use super::{bean_name, PLATFORM_DOMAIN};
use crate::mgmt::{Impact, ManagedBean, TableBuilder};
use crate::native::ThreadBackend;
use crate::records::ThreadInfo;
use openmx_sdk::{MgmtError, MgmtResult, ObjectName};
use std::sync::Arc;

fn invalid_argument(operation: &str, index: usize, reason: String) -> MgmtError {
    MgmtError::InvalidArgument {
        operation: operation.to_string(),
        index,
        reason,
    }
}

fn check_id(operation: &str, index: usize, id: i64) -> MgmtResult<()> {
    if id <= 0 {
        return Err(invalid_argument(
            operation,
            index,
            format!("thread id must be positive, got {}", id),
        ));
    }
    Ok(())
}

/// `java.lang:type=Threading`
pub struct ThreadingBean {
    backend: Arc<dyn ThreadBackend>,
    name: Option<ObjectName>,
}

impl ThreadingBean {
    /// Wrap the thread system
    pub fn new(backend: Arc<dyn ThreadBackend>) -> Self {
        let name = bean_name(PLATFORM_DOMAIN, &[("type", "Threading")]);
        ThreadingBean { backend, name }
    }

    /// Live threads
    pub fn thread_count(&self) -> MgmtResult<i32> {
        Ok(self.backend.thread_count()?)
    }

    /// Peak live threads
    pub fn peak_thread_count(&self) -> MgmtResult<i32> {
        Ok(self.backend.peak_thread_count()?)
    }

    /// Live daemon threads
    pub fn daemon_thread_count(&self) -> MgmtResult<i32> {
        Ok(self.backend.daemon_thread_count()?)
    }

    /// Threads started since VM start
    pub fn total_started_thread_count(&self) -> MgmtResult<i64> {
        Ok(self.backend.total_started_thread_count()?)
    }

    /// IDs of live threads
    pub fn all_thread_ids(&self) -> MgmtResult<Vec<i64>> {
        Ok(self.backend.all_thread_ids()?)
    }

    /// Reset the peak to the current count
    pub fn reset_peak_thread_count(&self) -> MgmtResult<()> {
        Ok(self.backend.reset_peak_thread_count()?)
    }

    /// Snapshot of one thread without stack; `None` if it is not alive
    pub fn thread_info(&self, id: i64) -> MgmtResult<Option<ThreadInfo>> {
        self.thread_info_with_depth(id, 0)
    }

    /// Snapshot of one thread with at most `max_depth` frames
    pub fn thread_info_with_depth(&self, id: i64, max_depth: i32) -> MgmtResult<Option<ThreadInfo>> {
        check_id("getThreadInfo", 0, id)?;
        if max_depth < 0 {
            return Err(invalid_argument(
                "getThreadInfo",
                1,
                format!("max depth must be non-negative, got {}", max_depth),
            ));
        }
        Ok(self.backend.thread_info(id, max_depth, false, false)?)
    }

    /// Snapshots of several threads without stack, in request order
    pub fn thread_infos(&self, ids: &[i64]) -> MgmtResult<Vec<Option<ThreadInfo>>> {
        for id in ids {
            check_id("getThreadInfo", 0, *id)?;
        }
        ids.iter()
            .map(|id| {
                self.backend
                    .thread_info(*id, 0, false, false)
                    .map_err(MgmtError::from)
            })
            .collect()
    }

    /// Full snapshots of every live thread
    pub fn dump_all_threads(
        &self,
        locked_monitors: bool,
        locked_synchronizers: bool,
    ) -> MgmtResult<Vec<ThreadInfo>> {
        let mut infos = Vec::new();
        for id in self.backend.all_thread_ids()? {
            if let Some(info) =
                self.backend
                    .thread_info(id, -1, locked_monitors, locked_synchronizers)?
            {
                infos.push(info);
            }
        }
        Ok(infos)
    }

    fn require_cpu_time(&self) -> MgmtResult<()> {
        if !self.backend.thread_cpu_time_supported() {
            return Err(MgmtError::UnsupportedOperation(
                "thread CPU time is not supported by this VM".to_string(),
            ));
        }
        Ok(())
    }

    /// CPU time of the calling thread in ns, -1 when disabled
    pub fn current_thread_cpu_time(&self) -> MgmtResult<i64> {
        self.require_cpu_time()?;
        Ok(self.backend.current_thread_cpu_time()?)
    }

    /// CPU time of a thread in ns, -1 when disabled or not alive
    pub fn thread_cpu_time(&self, id: i64) -> MgmtResult<i64> {
        check_id("getThreadCpuTime", 0, id)?;
        self.require_cpu_time()?;
        Ok(self.backend.thread_cpu_time(id)?)
    }

    /// CPU time measurement is supported
    pub fn is_thread_cpu_time_supported(&self) -> MgmtResult<bool> {
        Ok(self.backend.thread_cpu_time_supported())
    }

    /// CPU time measurement is on
    pub fn is_thread_cpu_time_enabled(&self) -> MgmtResult<bool> {
        self.require_cpu_time()?;
        Ok(self.backend.thread_cpu_time_enabled())
    }

    /// Turn CPU time measurement on or off
    pub fn set_thread_cpu_time_enabled(&self, enabled: bool) -> MgmtResult<()> {
        self.require_cpu_time()?;
        Ok(self.backend.set_thread_cpu_time_enabled(enabled)?)
    }

    fn require_contention(&self) -> MgmtResult<()> {
        if !self.backend.contention_monitoring_supported() {
            return Err(MgmtError::UnsupportedOperation(
                "thread contention monitoring is not supported by this VM".to_string(),
            ));
        }
        Ok(())
    }

    /// Contention monitoring is supported
    pub fn is_thread_contention_monitoring_supported(&self) -> MgmtResult<bool> {
        Ok(self.backend.contention_monitoring_supported())
    }

    /// Contention monitoring is on
    pub fn is_thread_contention_monitoring_enabled(&self) -> MgmtResult<bool> {
        self.require_contention()?;
        Ok(self.backend.contention_monitoring_enabled())
    }

    /// Turn contention monitoring on or off
    pub fn set_thread_contention_monitoring_enabled(&self, enabled: bool) -> MgmtResult<()> {
        self.require_contention()?;
        Ok(self.backend.set_contention_monitoring_enabled(enabled)?)
    }

    /// Threads deadlocked on monitors or ownable synchronizers; `None` if there are none
    pub fn find_deadlocked_threads(&self) -> MgmtResult<Option<Vec<i64>>> {
        let ids = self.backend.find_deadlocked_threads(false)?;
        Ok((!ids.is_empty()).then_some(ids))
    }

    /// Threads deadlocked on monitors; `None` if there are none
    pub fn find_monitor_deadlocked_threads(&self) -> MgmtResult<Option<Vec<i64>>> {
        let ids = self.backend.find_deadlocked_threads(true)?;
        Ok((!ids.is_empty()).then_some(ids))
    }
}

impl ManagedBean for ThreadingBean {
    const INTERFACE: &'static str = "java.lang.management.ThreadMXBean";
    const NAME_PATTERN: &'static str = "java.lang:type=Threading";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .attribute("ThreadCount", ThreadingBean::thread_count)
            .attribute("PeakThreadCount", ThreadingBean::peak_thread_count)
            .attribute("DaemonThreadCount", ThreadingBean::daemon_thread_count)
            .attribute(
                "TotalStartedThreadCount",
                ThreadingBean::total_started_thread_count,
            )
            .attribute("AllThreadIds", ThreadingBean::all_thread_ids)
            .attribute("CurrentThreadCpuTime", ThreadingBean::current_thread_cpu_time)
            .flag(
                "ThreadCpuTimeSupported",
                ThreadingBean::is_thread_cpu_time_supported,
            )
            .writable_flag(
                "ThreadCpuTimeEnabled",
                ThreadingBean::is_thread_cpu_time_enabled,
                ThreadingBean::set_thread_cpu_time_enabled,
            )
            .flag(
                "ThreadContentionMonitoringSupported",
                ThreadingBean::is_thread_contention_monitoring_supported,
            )
            .writable_flag(
                "ThreadContentionMonitoringEnabled",
                ThreadingBean::is_thread_contention_monitoring_enabled,
                ThreadingBean::set_thread_contention_monitoring_enabled,
            )
            .operation("getThreadInfo", Impact::Info, |bean: &Self, (id,): (i64,)| {
                bean.thread_info(id)
            })
            .operation(
                "getThreadInfo",
                Impact::Info,
                |bean: &Self, (ids,): (Vec<i64>,)| bean.thread_infos(&ids),
            )
            .operation(
                "getThreadInfo",
                Impact::Info,
                |bean: &Self, (id, depth): (i64, i32)| bean.thread_info_with_depth(id, depth),
            )
            .operation(
                "getThreadCpuTime",
                Impact::Info,
                |bean: &Self, (id,): (i64,)| bean.thread_cpu_time(id),
            )
            .operation(
                "findDeadlockedThreads",
                Impact::Info,
                |bean: &Self, (): ()| bean.find_deadlocked_threads(),
            )
            .operation(
                "findMonitorDeadlockedThreads",
                Impact::Info,
                |bean: &Self, (): ()| bean.find_monitor_deadlocked_threads(),
            )
            .operation(
                "dumpAllThreads",
                Impact::Info,
                |bean: &Self, (monitors, synchronizers): (bool, bool)| {
                    bean.dump_all_threads(monitors, synchronizers)
                },
            )
            .action("resetPeakThreadCount", ThreadingBean::reset_peak_thread_count)
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }
}
