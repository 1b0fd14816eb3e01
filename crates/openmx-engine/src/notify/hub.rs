//! Per-bean listener registry and synchronous delivery
//!
//! The registration list is copy-on-write: `publish` iterates an `Arc`
//! snapshot taken under a short read lock, so listeners may subscribe or
//! unsubscribe (even from inside a callback) while a delivery is running.
//! Listeners and filters are identified by `Arc` pointer identity.

use crate::notify::notification::Notification;
use openmx_sdk::{MgmtError, MgmtResult};
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque value handed back to a listener with every notification
pub type Handback = Arc<dyn Any + Send + Sync>;

/// Receives notifications
pub trait NotificationListener: Send + Sync {
    /// Called once per accepted notification, on the publishing thread
    fn handle_notification(&self, notification: &Notification, handback: Option<&Handback>);
}

impl<F> NotificationListener for F
where
    F: Fn(&Notification, Option<&Handback>) + Send + Sync,
{
    fn handle_notification(&self, notification: &Notification, handback: Option<&Handback>) {
        self(notification, handback)
    }
}

/// Selects which notifications a listener receives
pub trait NotificationFilter: Send + Sync {
    /// True if the notification should be delivered
    fn is_enabled(&self, notification: &Notification) -> bool;
}

impl<F> NotificationFilter for F
where
    F: Fn(&Notification) -> bool + Send + Sync,
{
    fn is_enabled(&self, notification: &Notification) -> bool {
        self(notification)
    }
}

/// Filter accepting a fixed set of notification types
#[derive(Debug, Clone, Default)]
pub struct TypeFilter {
    enabled: Vec<String>,
}

impl TypeFilter {
    /// Filter accepting nothing until types are enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept one more type
    pub fn enable(mut self, notification_type: &str) -> Self {
        if !self.enabled.iter().any(|t| t == notification_type) {
            self.enabled.push(notification_type.to_string());
        }
        self
    }
}

impl NotificationFilter for TypeFilter {
    fn is_enabled(&self, notification: &Notification) -> bool {
        self.enabled
            .iter()
            .any(|t| t == notification.notification_type())
    }
}

#[derive(Clone)]
struct Registration {
    listener: Arc<dyn NotificationListener>,
    filter: Option<Arc<dyn NotificationFilter>>,
    handback: Option<Handback>,
}

fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn same_opt<T: ?Sized>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => same(a, b),
        _ => false,
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Listener registry of one bean
pub struct NotificationHub {
    registrations: RwLock<Arc<Vec<Registration>>>,
    sequence: AtomicU64,
}

impl NotificationHub {
    /// Create a hub with no listeners; the first sequence number is 1
    pub fn new() -> Self {
        NotificationHub {
            registrations: RwLock::new(Arc::new(Vec::new())),
            sequence: AtomicU64::new(1),
        }
    }

    /// Register a listener. The same listener may be registered several
    /// times with different filters or handbacks.
    pub fn subscribe(
        &self,
        listener: Arc<dyn NotificationListener>,
        filter: Option<Arc<dyn NotificationFilter>>,
        handback: Option<Handback>,
    ) {
        let mut guard = self.registrations.write();
        let mut list = Vec::with_capacity(guard.len() + 1);
        list.extend(guard.iter().cloned());
        list.push(Registration {
            listener,
            filter,
            handback,
        });
        *guard = Arc::new(list);
        tracing::debug!(listeners = guard.len(), "listener subscribed");
    }

    /// Remove every registration of `listener`
    pub fn unsubscribe(&self, listener: &Arc<dyn NotificationListener>) -> MgmtResult<()> {
        let mut guard = self.registrations.write();
        let before = guard.len();
        let kept: Vec<Registration> = guard
            .iter()
            .filter(|reg| !same(&reg.listener, listener))
            .cloned()
            .collect();
        if kept.len() == before {
            return Err(MgmtError::ListenerNotFound);
        }
        *guard = Arc::new(kept);
        tracing::debug!(removed = before - guard.len(), "listener unsubscribed");
        Ok(())
    }

    /// Remove the registration with exactly this listener, filter and handback
    pub fn unsubscribe_exact(
        &self,
        listener: &Arc<dyn NotificationListener>,
        filter: Option<&Arc<dyn NotificationFilter>>,
        handback: Option<&Handback>,
    ) -> MgmtResult<()> {
        let mut guard = self.registrations.write();
        let position = guard.iter().position(|reg| {
            same(&reg.listener, listener)
                && same_opt(reg.filter.as_ref(), filter)
                && same_opt(reg.handback.as_ref(), handback)
        });
        let position = position.ok_or(MgmtError::ListenerNotFound)?;
        let mut list: Vec<Registration> = guard.iter().cloned().collect();
        list.remove(position);
        *guard = Arc::new(list);
        Ok(())
    }

    /// Deliver to every listener whose filter accepts, in registration order.
    ///
    /// A panicking filter counts as rejecting; a panicking listener is
    /// logged and delivery continues. Returns the number of listeners
    /// that received the notification.
    pub fn publish(&self, notification: &Notification) -> usize {
        let snapshot = self.registrations.read().clone();
        let mut delivered = 0;
        for reg in snapshot.iter() {
            if let Some(filter) = &reg.filter {
                let accepted = catch_unwind(AssertUnwindSafe(|| filter.is_enabled(notification)));
                match accepted {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(payload) => {
                        tracing::warn!(
                            notification_type = notification.notification_type(),
                            panic = panic_message(payload.as_ref()),
                            "notification filter panicked"
                        );
                        continue;
                    }
                }
            }
            let result = catch_unwind(AssertUnwindSafe(|| {
                reg.listener
                    .handle_notification(notification, reg.handback.as_ref())
            }));
            match result {
                Ok(()) => delivered += 1,
                Err(payload) => tracing::warn!(
                    notification_type = notification.notification_type(),
                    sequence = notification.sequence(),
                    panic = panic_message(payload.as_ref()),
                    "notification listener panicked"
                ),
            }
        }
        tracing::trace!(
            notification_type = notification.notification_type(),
            sequence = notification.sequence(),
            delivered,
            "notification published"
        );
        delivered
    }

    /// Take the next sequence number. Numbers are never reused.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of registrations
    pub fn listener_count(&self) -> usize {
        self.registrations.read().len()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}
