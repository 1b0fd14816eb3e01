//! OpenMX Management Engine
//!
//! This crate turns a VM's native accessors into managed beans:
//! - **Native**: accessor traits a VM implements and its event queues (`native` module)
//! - **Records**: open-schema records exchanged by beans (`records` module)
//! - **Mgmt**: bean metadata, dispatch tables and dynamic dispatch (`mgmt` module)
//! - **Notify**: notification hubs, pumps and coordinated shutdown (`notify` module)
//! - **Beans**: the platform beans (`beans` module)
//! - **Registry**: the `Platform` owning every bean (`registry` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use openmx_engine::{Platform, PlatformConfig, DynamicBean};
//!
//! let platform = Platform::new(vm, PlatformConfig::default());
//! let heap = platform.memory().heap_memory_usage()?;
//! let same = platform.memory().get_attribute("HeapMemoryUsage")?;
//! platform.shutdown();
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::new_without_default)]

// ============================================================================
// Core Modules
// ============================================================================

/// Platform settings
pub mod config;

/// Native accessor boundary: backend traits, native errors, event queues
pub mod native;

/// Open-schema records
pub mod records;

/// Metadata cache, dispatch tables and dynamic dispatch
pub mod mgmt;

/// Notification hubs, pumps and shutdown coordination
pub mod notify;

/// Platform beans
pub mod beans;

/// Bean registry
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::PlatformConfig;
pub use mgmt::{
    BeanDescriptor, DispatchTable, Dispatcher, DynamicBean, Impact, ManagedBean, MetadataCache,
    TableBuilder,
};
pub use native::{NativeError, NativeQueue, NativeResult, QueueItem, VmBackend};
pub use notify::{
    types, Notification, NotificationFilter, NotificationHub, NotificationListener, Pump,
    PumpState, ShutdownCoordinator, TypeFilter,
};
pub use registry::{BeanKind, Platform, UnknownBeanKind};

pub use openmx_sdk::{MgmtError, MgmtResult, ObjectName, OpenValue};
