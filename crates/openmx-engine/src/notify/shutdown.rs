//! Coordinated shutdown of notification pumps
//!
//! Every running pump registers here. [`ShutdownCoordinator::shutdown`]
//! flips the coordinator into shutdown mode, posts the sentinel into every
//! pump's queue and joins the pump threads. Once shutdown has begun, new
//! registrations are refused and the refused pump terminates without ever
//! starting a thread.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What the coordinator needs from a pump
pub trait PumpControl: Send + Sync {
    /// Pump name, for diagnostics
    fn name(&self) -> &str;
    /// Post the shutdown sentinel
    fn begin_shutdown(&self);
    /// Wait for the pump thread to exit
    fn join(&self);
}

/// Registration refused because shutdown is under way
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("shutdown in progress")]
pub struct ShutdownInProgress;

/// Owner of every pump's shutdown
#[derive(Default)]
pub struct ShutdownCoordinator {
    pumps: Mutex<Vec<Arc<dyn PumpControl>>>,
    shutting_down: AtomicBool,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no pumps
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a pump until shutdown
    pub fn register(&self, pump: Arc<dyn PumpControl>) -> Result<(), ShutdownInProgress> {
        let mut pumps = self.pumps.lock();
        // Checked under the lock so a pump cannot slip in after shutdown took the list
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(ShutdownInProgress);
        }
        tracing::debug!(pump = pump.name(), "pump registered for shutdown");
        pumps.push(pump);
        Ok(())
    }

    /// Stop and join every registered pump. Idempotent; later calls return
    /// immediately.
    pub fn shutdown(&self) {
        let pumps = {
            let mut pumps = self.pumps.lock();
            if self.shutting_down.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *pumps)
        };
        tracing::debug!(pumps = pumps.len(), "shutting down notification pumps");
        for pump in &pumps {
            pump.begin_shutdown();
        }
        for pump in &pumps {
            pump.join();
            tracing::debug!(pump = pump.name(), "pump joined");
        }
    }

    /// True once [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Pumps registered and not yet shut down
    pub fn active(&self) -> usize {
        self.pumps.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct FakePump {
        stops: AtomicUsize,
        joins: AtomicUsize,
    }

    impl PumpControl for FakePump {
        fn name(&self) -> &str {
            "fake"
        }

        fn begin_shutdown(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn join(&self) {
            self.joins.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_shutdown_stops_and_joins_every_pump() {
        let coordinator = ShutdownCoordinator::new();
        let a = Arc::new(FakePump::default());
        let b = Arc::new(FakePump::default());
        coordinator.register(a.clone()).unwrap();
        coordinator.register(b.clone()).unwrap();
        assert_eq!(coordinator.active(), 2);

        coordinator.shutdown();
        coordinator.shutdown();
        for pump in [&a, &b] {
            assert_eq!(pump.stops.load(Ordering::SeqCst), 1);
            assert_eq!(pump.joins.load(Ordering::SeqCst), 1);
        }
        assert_eq!(coordinator.active(), 0);
    }

    #[test]
    fn test_register_after_shutdown_is_refused() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.shutdown();
        assert!(coordinator.is_shutting_down());
        let late = Arc::new(FakePump::default());
        assert_eq!(coordinator.register(late.clone()), Err(ShutdownInProgress));
        assert_eq!(late.stops.load(Ordering::SeqCst), 0);
    }
}
