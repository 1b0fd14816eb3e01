//! Process-wide memo of record schemas
//!
//! Composite and tabular schemas for known record kinds are built on first
//! use and kept for the life of the process. Two threads racing on the same
//! kind may both build it; the first insert wins and the other result is
//! dropped, so builders must be pure.

use crate::open_type::{CompositeType, TabularType};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Cache of schemas keyed by record kind
#[derive(Default)]
pub struct SchemaCache {
    composites: DashMap<&'static str, Arc<CompositeType>>,
    tables: DashMap<&'static str, Arc<TabularType>>,
}

impl SchemaCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Composite schema for `kind`, building it with `build` on first use
    pub fn composite(
        &self,
        kind: &'static str,
        build: impl FnOnce() -> CompositeType,
    ) -> Arc<CompositeType> {
        if let Some(schema) = self.composites.get(kind) {
            return schema.clone();
        }
        // Built without holding a shard lock: builders may recurse into the
        // cache for nested record kinds.
        let built = Arc::new(build());
        tracing::trace!(kind, fields = built.len(), "composite schema built");
        self.composites.entry(kind).or_insert(built).clone()
    }

    /// Tabular schema for `kind`, building it with `build` on first use
    pub fn tabular(
        &self,
        kind: &'static str,
        build: impl FnOnce() -> TabularType,
    ) -> Arc<TabularType> {
        if let Some(schema) = self.tables.get(kind) {
            return schema.clone();
        }
        let built = Arc::new(build());
        tracing::trace!(kind, "tabular schema built");
        self.tables.entry(kind).or_insert(built).clone()
    }

    /// Number of cached schemas
    pub fn len(&self) -> usize {
        self.composites.len() + self.tables.len()
    }

    /// True if nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static SCHEMAS: Lazy<SchemaCache> = Lazy::new(SchemaCache::new);

/// The process-wide schema cache
pub fn schemas() -> &'static SchemaCache {
    &SCHEMAS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_type::OpenType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn point() -> CompositeType {
        CompositeType::builder("Point")
            .field("x", OpenType::INT)
            .field("y", OpenType::INT)
            .build()
    }

    #[test]
    fn test_builds_once() {
        let cache = SchemaCache::new();
        let builds = AtomicUsize::new(0);
        let first = cache.composite("Point", || {
            builds.fetch_add(1, Ordering::SeqCst);
            point()
        });
        let second = cache.composite("Point", || {
            builds.fetch_add(1, Ordering::SeqCst);
            point()
        });
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_nested_build_does_not_deadlock() {
        let cache = SchemaCache::new();
        let line = cache.composite("Line", || {
            let p = cache.composite("Point", point);
            CompositeType::builder("Line")
                .field("from", OpenType::Composite(p.clone()))
                .field("to", OpenType::Composite(p))
                .build()
        });
        assert_eq!(line.len(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_racing_builders_agree() {
        let cache = Arc::new(SchemaCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.composite("Point", point))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for schema in &results {
            assert_eq!(schema.as_ref(), results[0].as_ref());
        }
        assert_eq!(cache.len(), 1);
    }
}
