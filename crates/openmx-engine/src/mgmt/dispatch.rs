//! Dynamic dispatch over typed bean accessors
//!
//! Each bean kind declares its attributes and operations once, through a
//! [`TableBuilder`], as typed closures over the bean. The builder records
//! the open types from the closures' signatures and wraps every closure in
//! the conversion it needs, producing a [`DispatchTable`] whose entries
//! all speak [`OpenValue`]. A [`Dispatcher`] pairs a bean with its table
//! and exposes it through the object-safe [`DynamicBean`] trait.
//!
//! ```ignore
//! impl ManagedBean for MemoryBean {
//!     const INTERFACE: &'static str = "java.lang.management.MemoryMXBean";
//!     const NAME_PATTERN: &'static str = "java.lang:type=Memory";
//!
//!     fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
//!         table
//!             .attribute("HeapMemoryUsage", MemoryBean::heap_memory_usage)
//!             .writable_flag("Verbose", MemoryBean::is_verbose, MemoryBean::set_verbose)
//!             .action("gc", MemoryBean::gc)
//!     }
//! }
//! ```

use crate::mgmt::descriptor::{AttributeDescriptor, BeanDescriptor, Impact, OperationDescriptor};
use crate::notify::hub::panic_message;
use crate::notify::{NotificationHub, NotificationInfo};
use openmx_sdk::{MgmtError, MgmtResult, ObjectName, OpenArgs, OpenMapped, OpenValue};
use std::fmt;
use std::ops::Deref;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

type Getter<B> = Box<dyn Fn(&B) -> MgmtResult<OpenValue> + Send + Sync>;
type Setter<B> = Box<dyn Fn(&B, &OpenValue) -> MgmtResult<()> + Send + Sync>;
type Invoker<B> = Box<dyn Fn(&B, &[OpenValue]) -> MgmtResult<OpenValue> + Send + Sync>;

// ============================================================================
// Managed Beans
// ============================================================================

/// A bean kind with a statically declared management interface
pub trait ManagedBean: Send + Sync + Sized + 'static {
    /// Interface name; the metadata cache key
    const INTERFACE: &'static str;

    /// Object name (or pattern, for list kinds) of beans of this kind
    const NAME_PATTERN: &'static str;

    /// Declare attributes, operations and notifications
    fn table(table: TableBuilder<Self>) -> TableBuilder<Self>;

    /// Name of this bean instance, if it could be built
    fn object_name(&self) -> Option<&ObjectName>;

    /// Notification hub, for beans that emit notifications
    fn hub(&self) -> Option<&Arc<NotificationHub>> {
        None
    }
}

/// Build the dispatch table of `B` from scratch
pub fn build_table<B: ManagedBean>() -> DispatchTable<B> {
    B::table(TableBuilder::new(B::INTERFACE, B::NAME_PATTERN)).build()
}

/// Convert and validate a value given to a setter
fn setter_value<T: OpenMapped>(attribute: &str, value: &OpenValue) -> MgmtResult<T> {
    if value.is_null() && !T::NULLABLE {
        return Err(MgmtError::invalid_value(
            attribute,
            format!("null is not a valid {}", T::open_type()),
        ));
    }
    if !value.conforms_to(&T::open_type()) {
        return Err(MgmtError::invalid_value(
            attribute,
            format!("expected {}, got {}", T::open_type(), value.open_type_name()),
        ));
    }
    T::from_open(value).map_err(|err| MgmtError::invalid_value(attribute, err.to_string()))
}

/// Run an accessor, turning a panic into a fatal native failure
fn guarded<T>(what: &str, call: impl FnOnce() -> MgmtResult<T>) -> MgmtResult<T> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => {
            let message = format!("{} panicked: {}", what, panic_message(payload.as_ref()));
            tracing::error!(%message, "accessor panicked");
            Err(MgmtError::fatal(message))
        }
    }
}

// ============================================================================
// Table Builder
// ============================================================================

/// Collects typed accessors for one bean kind
pub struct TableBuilder<B> {
    interface: &'static str,
    name_pattern: &'static str,
    attributes: Vec<AttributeDescriptor>,
    getters: Vec<Option<Getter<B>>>,
    setters: Vec<Option<Setter<B>>>,
    operations: Vec<OperationDescriptor>,
    invokers: Vec<Invoker<B>>,
    notifications: Vec<NotificationInfo>,
}

impl<B: 'static> TableBuilder<B> {
    /// Start an empty table
    pub fn new(interface: &'static str, name_pattern: &'static str) -> Self {
        TableBuilder {
            interface,
            name_pattern,
            attributes: Vec::new(),
            getters: Vec::new(),
            setters: Vec::new(),
            operations: Vec::new(),
            invokers: Vec::new(),
            notifications: Vec::new(),
        }
    }

    fn push_attribute<T: OpenMapped>(
        mut self,
        name: &'static str,
        is_getter: bool,
        getter: Getter<B>,
        setter: Option<Setter<B>>,
    ) -> Self {
        if self.attributes.iter().any(|attr| attr.name == name) {
            debug_assert!(false, "attribute {} declared twice on {}", name, self.interface);
            return self;
        }
        self.attributes.push(AttributeDescriptor {
            name,
            open_type: T::open_type(),
            native_type: std::any::type_name::<T>(),
            readable: true,
            writable: setter.is_some(),
            is_getter,
        });
        self.getters.push(Some(getter));
        self.setters.push(setter);
        self
    }

    /// Read-only attribute
    pub fn attribute<T, G>(self, name: &'static str, get: G) -> Self
    where
        T: OpenMapped,
        G: Fn(&B) -> MgmtResult<T> + Send + Sync + 'static,
    {
        let getter: Getter<B> = Box::new(move |bean| get(bean).map(|value| value.to_open()));
        self.push_attribute::<T>(name, false, getter, None)
    }

    /// Read-only boolean attribute with an `isX` getter
    pub fn flag<G>(self, name: &'static str, get: G) -> Self
    where
        G: Fn(&B) -> MgmtResult<bool> + Send + Sync + 'static,
    {
        let getter: Getter<B> = Box::new(move |bean| get(bean).map(OpenValue::Boolean));
        self.push_attribute::<bool>(name, true, getter, None)
    }

    /// Read-write attribute. Settable attributes are simple-typed.
    pub fn writable<T, G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        T: OpenMapped,
        G: Fn(&B) -> MgmtResult<T> + Send + Sync + 'static,
        S: Fn(&B, T) -> MgmtResult<()> + Send + Sync + 'static,
    {
        debug_assert!(T::open_type().is_simple(), "settable attribute {} must be simple", name);
        let getter: Getter<B> = Box::new(move |bean| get(bean).map(|value| value.to_open()));
        let setter: Setter<B> = Box::new(move |bean, value| set(bean, setter_value::<T>(name, value)?));
        self.push_attribute::<T>(name, false, getter, Some(setter))
    }

    /// Read-write boolean attribute with an `isX` getter
    pub fn writable_flag<G, S>(self, name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&B) -> MgmtResult<bool> + Send + Sync + 'static,
        S: Fn(&B, bool) -> MgmtResult<()> + Send + Sync + 'static,
    {
        let getter: Getter<B> = Box::new(move |bean| get(bean).map(OpenValue::Boolean));
        let setter: Setter<B> =
            Box::new(move |bean, value| set(bean, setter_value::<bool>(name, value)?));
        self.push_attribute::<bool>(name, true, getter, Some(setter))
    }

    /// Operation taking the argument tuple `A`. Overloads share a name and
    /// differ in `A`.
    pub fn operation<A, R, F>(mut self, name: &'static str, impact: Impact, call: F) -> Self
    where
        A: OpenArgs,
        R: OpenMapped,
        F: Fn(&B, A) -> MgmtResult<R> + Send + Sync + 'static,
    {
        let descriptor = OperationDescriptor {
            name,
            params: A::signature(),
            return_type: R::open_type(),
            impact,
        };
        if self
            .operations
            .iter()
            .any(|op| op.name == name && op.params == descriptor.params)
        {
            debug_assert!(false, "operation {} declared twice on {}", descriptor, self.interface);
            return self;
        }
        self.operations.push(descriptor);
        self.invokers.push(Box::new(move |bean, args| {
            let args = A::from_args(name, args)?;
            call(bean, args).map(|value| value.to_open())
        }));
        self
    }

    /// Operation without arguments or result that changes state
    pub fn action<F>(self, name: &'static str, call: F) -> Self
    where
        F: Fn(&B) -> MgmtResult<()> + Send + Sync + 'static,
    {
        self.operation(name, Impact::Action, move |bean: &B, (): ()| call(bean))
    }

    /// Declare emitted notification types
    pub fn notification(mut self, info: NotificationInfo) -> Self {
        self.notifications.push(info);
        self
    }

    /// Finish the table
    pub fn build(self) -> DispatchTable<B> {
        let descriptor = BeanDescriptor::new(
            self.interface,
            self.name_pattern,
            self.attributes,
            self.operations,
            self.notifications,
        );
        tracing::trace!(
            interface = self.interface,
            attributes = descriptor.attributes().len(),
            operations = descriptor.operations().len(),
            "dispatch table built"
        );
        DispatchTable {
            descriptor: Arc::new(descriptor),
            getters: self.getters,
            setters: self.setters,
            invokers: self.invokers,
        }
    }
}

// ============================================================================
// Dispatch Table
// ============================================================================

/// Descriptor plus the converted accessors of one bean kind
pub struct DispatchTable<B> {
    descriptor: Arc<BeanDescriptor>,
    getters: Vec<Option<Getter<B>>>,
    setters: Vec<Option<Setter<B>>>,
    invokers: Vec<Invoker<B>>,
}

impl<B> fmt::Debug for DispatchTable<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("interface", &self.descriptor.interface())
            .field("attributes", &self.getters.len())
            .field("operations", &self.invokers.len())
            .finish()
    }
}

impl<B> DispatchTable<B> {
    /// Metadata of the interface
    pub fn descriptor(&self) -> &Arc<BeanDescriptor> {
        &self.descriptor
    }

    fn attribute_not_found(&self, name: &str) -> MgmtError {
        MgmtError::AttributeNotFound {
            interface: self.descriptor.interface().to_string(),
            attribute: name.to_string(),
        }
    }

    /// Read an attribute of `bean`
    pub fn get(&self, bean: &B, name: &str) -> MgmtResult<OpenValue> {
        let getter = self
            .descriptor
            .readable(name)
            .and_then(|(idx, _)| self.getters.get(idx))
            .and_then(Option::as_ref)
            .ok_or_else(|| self.attribute_not_found(name))?;
        guarded(name, || getter(bean))
    }

    /// Write an attribute of `bean`. The value is validated before the
    /// setter runs.
    pub fn set(&self, bean: &B, name: &str, value: &OpenValue) -> MgmtResult<()> {
        let setter = self
            .descriptor
            .writable(name)
            .and_then(|(idx, _)| self.setters.get(idx))
            .and_then(Option::as_ref)
            .ok_or_else(|| self.attribute_not_found(name))?;
        guarded(name, || setter(bean, value))
    }

    /// Invoke the overload of `operation` matching `signature`
    pub fn invoke(
        &self,
        bean: &B,
        operation: &str,
        args: &[OpenValue],
        signature: &[&str],
    ) -> MgmtResult<OpenValue> {
        let invoker = self
            .descriptor
            .operation(operation, signature)
            .and_then(|(idx, _)| self.invokers.get(idx))
            .ok_or_else(|| MgmtError::OperationNotFound {
                interface: self.descriptor.interface().to_string(),
                operation: operation.to_string(),
                signature: signature.join(","),
            })?;
        guarded(operation, || invoker(bean, args))
    }
}

// ============================================================================
// Dynamic Beans
// ============================================================================

/// Uniform, type-erased management interface of a bean
pub trait DynamicBean: Send + Sync {
    /// Interface metadata
    fn descriptor(&self) -> &Arc<BeanDescriptor>;

    /// Bean name, if it could be built
    fn object_name(&self) -> Option<&ObjectName>;

    /// Read one attribute
    fn get_attribute(&self, name: &str) -> MgmtResult<OpenValue>;

    /// Write one attribute
    fn set_attribute(&self, name: &str, value: &OpenValue) -> MgmtResult<()>;

    /// Invoke an operation by name and parameter type names
    fn invoke(&self, operation: &str, args: &[OpenValue], signature: &[&str]) -> MgmtResult<OpenValue>;

    /// Notification hub, if the bean emits notifications
    fn hub(&self) -> Option<&Arc<NotificationHub>>;

    /// Read several attributes; failing ones are left out
    fn get_attributes(&self, names: &[&str]) -> Vec<(String, OpenValue)> {
        names
            .iter()
            .filter_map(|name| match self.get_attribute(name) {
                Ok(value) => Some((name.to_string(), value)),
                Err(err) => {
                    tracing::debug!(attribute = %name, %err, "skipped in bulk read");
                    None
                }
            })
            .collect()
    }

    /// Write several attributes; returns the ones that were set
    fn set_attributes(&self, values: &[(&str, OpenValue)]) -> Vec<(String, OpenValue)> {
        values
            .iter()
            .filter_map(|(name, value)| match self.set_attribute(name, value) {
                Ok(()) => Some((name.to_string(), value.clone())),
                Err(err) => {
                    tracing::debug!(attribute = %name, %err, "skipped in bulk write");
                    None
                }
            })
            .collect()
    }

    /// Notification catalogue
    fn notification_info(&self) -> &[NotificationInfo] {
        self.descriptor().notifications()
    }
}

/// A bean paired with its dispatch table
pub struct Dispatcher<B> {
    bean: B,
    table: Arc<DispatchTable<B>>,
}

impl<B: ManagedBean> Dispatcher<B> {
    /// Pair a bean with its (cached) table
    pub fn new(bean: B, table: Arc<DispatchTable<B>>) -> Self {
        Dispatcher { bean, table }
    }

    /// The typed bean
    pub fn bean(&self) -> &B {
        &self.bean
    }

    /// The shared dispatch table
    pub fn table(&self) -> &Arc<DispatchTable<B>> {
        &self.table
    }
}

impl<B> Deref for Dispatcher<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.bean
    }
}

impl<B: ManagedBean> DynamicBean for Dispatcher<B> {
    fn descriptor(&self) -> &Arc<BeanDescriptor> {
        self.table.descriptor()
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.bean.object_name()
    }

    fn get_attribute(&self, name: &str) -> MgmtResult<OpenValue> {
        self.table.get(&self.bean, name)
    }

    fn set_attribute(&self, name: &str, value: &OpenValue) -> MgmtResult<()> {
        self.table.set(&self.bean, name, value)
    }

    fn invoke(&self, operation: &str, args: &[OpenValue], signature: &[&str]) -> MgmtResult<OpenValue> {
        self.table.invoke(&self.bean, operation, args, signature)
    }

    fn hub(&self) -> Option<&Arc<NotificationHub>> {
        self.bean.hub()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmx_sdk::Severity;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        value: Mutex<i64>,
        label: Mutex<Option<String>>,
        sets: AtomicUsize,
    }

    impl Counter {
        fn value(&self) -> MgmtResult<i64> {
            Ok(*self.value.lock())
        }

        fn set_value(&self, value: i64) -> MgmtResult<()> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            *self.value.lock() = value;
            Ok(())
        }

        fn label(&self) -> MgmtResult<Option<String>> {
            Ok(self.label.lock().clone())
        }

        fn set_label(&self, label: Option<String>) -> MgmtResult<()> {
            *self.label.lock() = label;
            Ok(())
        }
    }

    impl ManagedBean for Counter {
        const INTERFACE: &'static str = "test.Counter";
        const NAME_PATTERN: &'static str = "test:type=Counter";

        fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
            table
                .writable("Value", Counter::value, Counter::set_value)
                .writable("Label", Counter::label, Counter::set_label)
                .flag("Positive", |c: &Counter| Ok(*c.value.lock() > 0))
                .attribute("Broken", |_: &Counter| -> MgmtResult<i64> { panic!("boom") })
                .attribute("Unsupported", |_: &Counter| -> MgmtResult<i64> {
                    Err(MgmtError::UnsupportedOperation("Unsupported".to_string()))
                })
                .operation("add", Impact::Action, |c: &Counter, (delta,): (i64,)| {
                    let mut value = c.value.lock();
                    *value += delta;
                    Ok(*value)
                })
                .operation("add", Impact::Action, |c: &Counter, (a, b): (i64, i64)| {
                    let mut value = c.value.lock();
                    *value += a + b;
                    Ok(*value)
                })
                .action("reset", |c: &Counter| {
                    *c.value.lock() = 0;
                    Ok(())
                })
        }

        fn object_name(&self) -> Option<&ObjectName> {
            None
        }
    }

    fn counter() -> Dispatcher<Counter> {
        Dispatcher::new(Counter::default(), Arc::new(build_table::<Counter>()))
    }

    #[test]
    fn test_get_and_set() {
        let bean = counter();
        bean.set_attribute("Value", &OpenValue::Long(5)).unwrap();
        assert_eq!(bean.get_attribute("Value").unwrap(), OpenValue::Long(5));
        assert_eq!(bean.get_attribute("Positive").unwrap(), OpenValue::Boolean(true));
        assert!(bean.descriptor().readable("Positive").unwrap().1.is_getter);
    }

    #[test]
    fn test_missing_attribute() {
        let bean = counter();
        let err = bean.get_attribute("Nope").unwrap_err();
        assert!(matches!(err, MgmtError::AttributeNotFound { .. }));
        let err = bean.set_attribute("Positive", &OpenValue::Boolean(true)).unwrap_err();
        assert!(matches!(err, MgmtError::AttributeNotFound { .. }));
    }

    #[test]
    fn test_wrong_type_never_reaches_setter() {
        let bean = counter();
        let err = bean.set_attribute("Value", &OpenValue::from("7")).unwrap_err();
        assert!(matches!(err, MgmtError::InvalidAttributeValue { .. }));
        let err = bean.set_attribute("Value", &OpenValue::Null).unwrap_err();
        assert!(matches!(err, MgmtError::InvalidAttributeValue { .. }));
        assert_eq!(bean.sets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_null_allowed_for_nullable_attribute() {
        let bean = counter();
        bean.set_attribute("Label", &OpenValue::from("x")).unwrap();
        bean.set_attribute("Label", &OpenValue::Null).unwrap();
        assert_eq!(bean.get_attribute("Label").unwrap(), OpenValue::Null);
    }

    #[test]
    fn test_panicking_accessor_is_fatal() {
        let bean = counter();
        let err = bean.get_attribute("Broken").unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            MgmtError::NativeInvocationFailure {
                severity: Severity::Fatal,
                ..
            }
        ));
    }

    #[test]
    fn test_management_errors_propagate_unchanged() {
        let bean = counter();
        assert_eq!(
            bean.get_attribute("Unsupported").unwrap_err(),
            MgmtError::UnsupportedOperation("Unsupported".to_string())
        );
    }

    #[test]
    fn test_overloads_and_signatures() {
        let bean = counter();
        assert_eq!(
            bean.invoke("add", &[OpenValue::Long(2)], &["long"]).unwrap(),
            OpenValue::Long(2)
        );
        assert_eq!(
            bean.invoke("add", &[OpenValue::Long(1), OpenValue::Long(3)], &["long", "long"])
                .unwrap(),
            OpenValue::Long(6)
        );
        let err = bean.invoke("add", &[OpenValue::Int(1)], &["int"]).unwrap_err();
        assert!(matches!(err, MgmtError::OperationNotFound { .. }));

        let err = bean.invoke("add", &[OpenValue::Int(1)], &["long"]).unwrap_err();
        assert!(matches!(err, MgmtError::InvalidArgument { index: 0, .. }));

        assert_eq!(bean.invoke("reset", &[], &[]).unwrap(), OpenValue::Null);
        assert_eq!(*bean.value.lock(), 0);
    }

    #[test]
    fn test_bulk_operations_skip_failures() {
        let bean = counter();
        let read = bean.get_attributes(&["Value", "Broken", "Nope", "Positive"]);
        let names: Vec<_> = read.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Value", "Positive"]);

        let written = bean.set_attributes(&[
            ("Value", OpenValue::Long(9)),
            ("Value", OpenValue::from("bad")),
            ("Label", OpenValue::from("nine")),
        ]);
        assert_eq!(written.len(), 2);
        assert_eq!(*bean.value.lock(), 9);
    }

    #[test]
    fn test_descriptor_records_types() {
        let table = build_table::<Counter>();
        let (_, value) = table.descriptor().readable("Value").unwrap();
        assert_eq!(value.open_type, openmx_sdk::OpenType::LONG);
        assert_eq!(value.native_type, "i64");
        assert_eq!(value.access(), "rw");
        assert_eq!(table.descriptor().overloads("add").len(), 2);
    }
}
