//! Notifications: events, per-bean hubs, pumps and coordinated shutdown

pub mod hub;
pub mod notification;
pub mod pump;
pub mod shutdown;

pub use hub::{Handback, NotificationFilter, NotificationHub, NotificationListener, TypeFilter};
pub use notification::{types, Notification, NotificationBody, NotificationInfo};
pub use pump::{Decoder, Pump, PumpState};
pub use shutdown::{PumpControl, ShutdownCoordinator, ShutdownInProgress};
