//! Platform beans
//!
//! Each bean wraps one native accessor trait, exposes typed methods for
//! in-process callers and declares its management interface through
//! [`ManagedBean::table`](crate::mgmt::ManagedBean::table).

mod buffer_pool;
mod class_loading;
mod compilation;
mod logging;
mod memory;
mod memory_manager;
mod memory_pool;
mod os;
mod runtime;
mod threading;

pub use buffer_pool::BufferPoolBean;
pub use class_loading::ClassLoadingBean;
pub use compilation::CompilationBean;
pub use logging::{LogLevel, LoggingBean};
pub use memory::{decode_memory_event, MemoryBean};
pub use memory_manager::{GarbageCollectorBean, MemoryManagerBean};
pub use memory_pool::MemoryPoolBean;
pub use os::{decode_os_event, OperatingSystemBean};
pub use runtime::RuntimeBean;
pub use threading::ThreadingBean;

use openmx_sdk::ObjectName;

/// Domain of the VM beans
pub const PLATFORM_DOMAIN: &str = "java.lang";

/// Build a bean name; a name that cannot be built leaves the bean unnamed
pub(crate) fn bean_name(domain: &str, properties: &[(&str, &str)]) -> Option<ObjectName> {
    let name = ObjectName::new(domain, properties);
    if name.is_none() {
        tracing::debug!(domain, ?properties, "bean left unnamed: invalid object name");
    }
    name
}
