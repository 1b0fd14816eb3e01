//! Native event queue drained by notification pumps
//!
//! The VM side pushes events; exactly one pump blocks in [`NativeQueue::take`].
//! A queue accepts events only while armed: a pump arms it when it starts,
//! and [`NativeQueue::signal_shutdown`] closes it for good, discards
//! everything still pending and enqueues a sentinel. Events pushed with no
//! pump attached are dropped, so an undrained queue never grows.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// An entry in a native queue
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem<E> {
    /// A native event to decode and publish
    Event(E),
    /// Stop draining
    Shutdown,
}

struct QueueState<E> {
    items: VecDeque<QueueItem<E>>,
    armed: bool,
    closed: bool,
}

/// Blocking FIFO of native events
pub struct NativeQueue<E> {
    state: Mutex<QueueState<E>>,
    available: Condvar,
}

impl<E> NativeQueue<E> {
    /// Create an empty, disarmed queue
    pub fn new() -> Self {
        NativeQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                armed: false,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Start accepting events. No effect once shut down.
    pub fn arm(&self) {
        let mut state = self.state.lock();
        state.armed = !state.closed;
    }

    /// True while events are accepted
    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }

    /// Enqueue an event. Returns false (and drops the event) when the queue
    /// is not armed.
    pub fn push(&self, event: E) -> bool {
        let mut state = self.state.lock();
        if !state.armed {
            return false;
        }
        state.items.push_back(QueueItem::Event(event));
        self.available.notify_one();
        true
    }

    /// Enqueue a raw item, sentinel included, armed or not
    pub fn push_item(&self, item: QueueItem<E>) {
        self.state.lock().items.push_back(item);
        self.available.notify_one();
    }

    /// Close the queue, drop pending events and enqueue the shutdown sentinel.
    ///
    /// Returns the number of events discarded.
    pub fn signal_shutdown(&self) -> usize {
        let mut state = self.state.lock();
        let discarded = state
            .items
            .iter()
            .filter(|item| matches!(item, QueueItem::Event(_)))
            .count();
        state.armed = false;
        state.closed = true;
        state.items.clear();
        state.items.push_back(QueueItem::Shutdown);
        self.available.notify_all();
        discarded
    }

    /// Block until an item is available and remove it
    pub fn take(&self) -> QueueItem<E> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return item;
            }
            self.available.wait(&mut state);
        }
    }

    /// Like [`take`](Self::take), giving up after `timeout`
    pub fn take_timeout(&self, timeout: Duration) -> Option<QueueItem<E>> {
        let mut state = self.state.lock();
        if let Some(item) = state.items.pop_front() {
            return Some(item);
        }
        self.available.wait_for(&mut state, timeout);
        state.items.pop_front()
    }

    /// Items not yet taken
    pub fn pending(&self) -> usize {
        self.state.lock().items.len()
    }
}

impl<E> Default for NativeQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}
