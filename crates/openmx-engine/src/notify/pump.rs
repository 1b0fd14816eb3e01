//! Notification pump: a named thread draining one native queue
//!
//! A pump decodes each native event into a [`NotificationBody`], numbers it
//! from the owning hub's sequence counter and publishes it through the hub.
//! Decode failures (and decoder panics) drop the event without consuming a
//! sequence number. The pump stops when it takes the shutdown sentinel.
//!
//! States: `Created -> Running -> ShuttingDown -> Terminated`. A pump refused
//! by the coordinator goes straight from `Created` to `Terminated`.

use crate::native::queue::{NativeQueue, QueueItem};
use crate::notify::hub::{panic_message, NotificationHub};
use crate::notify::notification::{Notification, NotificationBody};
use crate::notify::shutdown::{PumpControl, ShutdownCoordinator};
use openmx_sdk::{MgmtError, MgmtResult, ObjectName};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Decodes a native event
pub type Decoder<E> = Box<dyn Fn(E) -> MgmtResult<NotificationBody> + Send + Sync>;

/// Lifecycle of a pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PumpState {
    /// Built, thread not started
    Created = 0,
    /// Draining the queue
    Running = 1,
    /// Sentinel posted, thread still draining
    ShuttingDown = 2,
    /// Thread exited (or never started)
    Terminated = 3,
}

impl PumpState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PumpState::Created,
            1 => PumpState::Running,
            2 => PumpState::ShuttingDown,
            _ => PumpState::Terminated,
        }
    }
}

/// Background delivery thread for one notification source
pub struct Pump<E> {
    name: String,
    queue: Arc<NativeQueue<E>>,
    decode: Decoder<E>,
    hub: Arc<NotificationHub>,
    source: Option<ObjectName>,
    verbose: bool,
    state: AtomicU8,
    delivered: AtomicU64,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Send + 'static> Pump<E> {
    /// Create a pump; nothing runs until [`start`](Self::start)
    pub fn new(
        name: impl Into<String>,
        queue: Arc<NativeQueue<E>>,
        decode: Decoder<E>,
        hub: Arc<NotificationHub>,
        source: Option<ObjectName>,
        verbose: bool,
    ) -> Arc<Self> {
        Arc::new(Pump {
            name: name.into(),
            queue,
            decode,
            hub,
            source,
            verbose,
            state: AtomicU8::new(PumpState::Created as u8),
            delivered: AtomicU64::new(0),
            handle: Mutex::new(None),
        })
    }

    /// Register with the coordinator and spawn the pump thread.
    ///
    /// If shutdown is already in progress the pump terminates silently and
    /// `Ok(())` is returned. Starting a pump twice is a no-op.
    pub fn start(self: &Arc<Self>, coordinator: &ShutdownCoordinator) -> MgmtResult<()> {
        // Held until the handle is stored so a concurrent join waits for it
        let mut handle = self.handle.lock();
        if self
            .state
            .compare_exchange(
                PumpState::Created as u8,
                PumpState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Ok(());
        }

        let control: Arc<dyn PumpControl> = self.clone();
        if coordinator.register(control).is_err() {
            self.set_state(PumpState::Terminated);
            tracing::debug!(pump = %self.name, "shutdown in progress, pump not started");
            return Ok(());
        }

        self.queue.arm();
        let pump = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || pump.run_loop());
        match spawned {
            Ok(join) => {
                *handle = Some(join);
                tracing::debug!(pump = %self.name, "pump started");
                Ok(())
            }
            Err(err) => {
                self.queue.signal_shutdown();
                self.set_state(PumpState::Terminated);
                Err(MgmtError::fatal(format!(
                    "failed to spawn pump thread {}: {}",
                    self.name, err
                )))
            }
        }
    }

    /// Post the shutdown sentinel. Pending events are discarded.
    pub fn stop(&self) {
        let previous = self.state.fetch_max(PumpState::ShuttingDown as u8, Ordering::AcqRel);
        match PumpState::from_u8(previous) {
            PumpState::Created => self.set_state(PumpState::Terminated),
            PumpState::Running => {
                let discarded = self.queue.signal_shutdown();
                if discarded > 0 && self.verbose {
                    tracing::warn!(pump = %self.name, discarded, "pending events discarded at shutdown");
                }
            }
            PumpState::ShuttingDown | PumpState::Terminated => {}
        }
    }

    /// Wait for the pump thread to exit. Returns immediately when called
    /// from the pump thread itself or when no thread was started.
    pub fn join(&self) {
        if let Some(handle) = self.take_joinable() {
            self.reap(handle);
        }
    }

    /// Wait at most `timeout` for the pump thread; true if it exited
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let Some(handle) = self.take_joinable() else {
            return self.state() == PumpState::Terminated;
        };
        let start = Instant::now();
        loop {
            if handle.is_finished() {
                self.reap(handle);
                return true;
            }
            if start.elapsed() > timeout {
                *self.handle.lock() = Some(handle);
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Current state
    pub fn state(&self) -> PumpState {
        PumpState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Notifications published so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Pump (and thread) name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn reap(&self, handle: JoinHandle<()>) {
        if handle.join().is_err() {
            tracing::error!(pump = %self.name, "pump thread panicked");
            self.set_state(PumpState::Terminated);
        }
    }

    fn take_joinable(&self) -> Option<JoinHandle<()>> {
        let mut slot = self.handle.lock();
        let own_thread = slot
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id());
        if own_thread {
            None
        } else {
            slot.take()
        }
    }

    fn set_state(&self, state: PumpState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn run_loop(&self) {
        loop {
            match self.queue.take() {
                QueueItem::Shutdown => break,
                QueueItem::Event(event) => self.dispatch(event),
            }
        }
        self.set_state(PumpState::Terminated);
        tracing::debug!(pump = %self.name, delivered = self.delivered(), "pump terminated");
    }

    fn dispatch(&self, event: E) {
        let decoded = catch_unwind(AssertUnwindSafe(|| (self.decode)(event)));
        let body = match decoded {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => {
                self.drop_event(&err.to_string());
                return;
            }
            Err(payload) => {
                self.drop_event(panic_message(payload.as_ref()));
                return;
            }
        };
        let notification = Notification::new(body, self.source.clone(), self.hub.next_sequence());
        tracing::trace!(
            pump = %self.name,
            notification_type = notification.notification_type(),
            sequence = notification.sequence(),
            "publishing"
        );
        self.hub.publish(&notification);
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn drop_event(&self, reason: &str) {
        if self.verbose {
            tracing::warn!(pump = %self.name, reason, "dropping undecodable native event");
        } else {
            tracing::trace!(pump = %self.name, reason, "dropping undecodable native event");
        }
    }
}

impl<E: Send + 'static> PumpControl for Pump<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin_shutdown(&self) {
        self.stop();
    }

    fn join(&self) {
        Pump::join(self);
    }
}
