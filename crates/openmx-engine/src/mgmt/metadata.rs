//! Metadata cache: one dispatch table per bean interface
//!
//! Bean kinds register a factory under their interface name. The table is
//! built on first use and kept for the life of the cache; there is no
//! invalidation. Two threads racing on a first build may both run the
//! factory; the first insert wins.

use crate::mgmt::descriptor::BeanDescriptor;
use crate::mgmt::dispatch::{build_table, DispatchTable, ManagedBean};
use dashmap::DashMap;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A dispatch table with its bean type erased
pub trait AnyTable: Send + Sync {
    /// Interface metadata
    fn descriptor(&self) -> &Arc<BeanDescriptor>;

    /// Upcast for downcasting back to the typed table
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<B: ManagedBean> AnyTable for DispatchTable<B> {
    fn descriptor(&self) -> &Arc<BeanDescriptor> {
        DispatchTable::descriptor(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

type TableFactory = fn() -> Arc<dyn AnyTable>;

fn factory<B: ManagedBean>() -> Arc<dyn AnyTable> {
    Arc::new(build_table::<B>())
}

/// Per-interface cache of dispatch tables
#[derive(Default)]
pub struct MetadataCache {
    factories: DashMap<&'static str, TableFactory>,
    tables: DashMap<&'static str, Arc<dyn AnyTable>>,
    builds: AtomicUsize,
}

impl MetadataCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `B`'s interface known to [`describe`](Self::describe). Idempotent.
    pub fn register<B: ManagedBean>(&self) {
        self.factories.entry(B::INTERFACE).or_insert(factory::<B>);
    }

    /// Descriptor of a registered interface; `None` if unknown
    pub fn describe(&self, interface: &str) -> Option<Arc<BeanDescriptor>> {
        self.get_or_build(interface)
            .map(|table| table.descriptor().clone())
    }

    /// Typed dispatch table of `B`, registering and building it on first use
    pub fn table<B: ManagedBean>(&self) -> Arc<DispatchTable<B>> {
        self.register::<B>();
        let Some(erased) = self.get_or_build(B::INTERFACE) else {
            return Arc::new(build_table::<B>());
        };
        match erased.into_any().downcast::<DispatchTable<B>>() {
            Ok(table) => table,
            Err(_) => {
                tracing::error!(
                    interface = B::INTERFACE,
                    bean = std::any::type_name::<B>(),
                    "interface registered by a different bean type; using an uncached table"
                );
                Arc::new(build_table::<B>())
            }
        }
    }

    fn get_or_build(&self, interface: &str) -> Option<Arc<dyn AnyTable>> {
        if let Some(table) = self.tables.get(interface) {
            return Some(table.clone());
        }
        let (key, factory) = {
            let entry = self.factories.get(interface)?;
            (*entry.key(), *entry.value())
        };
        let built = factory();
        self.builds.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(interface = key, "descriptor built");
        Some(self.tables.entry(key).or_insert(built).clone())
    }

    /// Registered interface names, sorted
    pub fn interfaces(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.iter().map(|entry| *entry.key()).collect();
        names.sort_unstable();
        names
    }

    /// Number of tables built so far, races included
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mgmt::dispatch::TableBuilder;
    use openmx_sdk::{MgmtResult, ObjectName};

    struct Probe;

    impl Probe {
        fn answer(&self) -> MgmtResult<i32> {
            Ok(42)
        }
    }

    impl ManagedBean for Probe {
        const INTERFACE: &'static str = "test.Probe";
        const NAME_PATTERN: &'static str = "test:type=Probe";

        fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
            table.attribute("Answer", Probe::answer)
        }

        fn object_name(&self) -> Option<&ObjectName> {
            None
        }
    }

    struct Impostor;

    impl ManagedBean for Impostor {
        const INTERFACE: &'static str = "test.Probe";
        const NAME_PATTERN: &'static str = "test:type=Impostor";

        fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
            table
        }

        fn object_name(&self) -> Option<&ObjectName> {
            None
        }
    }

    #[test]
    fn test_unknown_interface_is_none() {
        let cache = MetadataCache::new();
        assert!(cache.describe("test.Nothing").is_none());
        assert_eq!(cache.builds(), 0);
    }

    #[test]
    fn test_describe_is_memoized() {
        let cache = MetadataCache::new();
        cache.register::<Probe>();
        let first = cache.describe("test.Probe").unwrap();
        let second = cache.describe("test.Probe").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.builds(), 1);

        let table = cache.table::<Probe>();
        assert!(Arc::ptr_eq(table.descriptor(), &first));
        assert_eq!(cache.builds(), 1);
        assert_eq!(cache.interfaces(), vec!["test.Probe"]);
    }

    #[test]
    fn test_racing_first_builds_agree() {
        let cache = Arc::new(MetadataCache::new());
        cache.register::<Probe>();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.describe("test.Probe").unwrap())
            })
            .collect();
        let descriptors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let retained = cache.describe("test.Probe").unwrap();
        for descriptor in &descriptors {
            assert_eq!(descriptor.attributes(), retained.attributes());
        }
    }

    #[test]
    fn test_type_confusion_falls_back_to_fresh_table() {
        let cache = MetadataCache::new();
        cache.register::<Probe>();
        let table = cache.table::<Impostor>();
        assert_eq!(table.descriptor().name_pattern(), "test:type=Impostor");
        assert_eq!(
            cache.describe("test.Probe").unwrap().name_pattern(),
            "test:type=Probe"
        );
    }
}
