//! Management metadata and dynamic dispatch

pub mod descriptor;
pub mod dispatch;
pub mod metadata;

pub use descriptor::{AttributeDescriptor, BeanDescriptor, Impact, OperationDescriptor};
pub use dispatch::{build_table, DispatchTable, Dispatcher, DynamicBean, ManagedBean, TableBuilder};
pub use metadata::{AnyTable, MetadataCache};
