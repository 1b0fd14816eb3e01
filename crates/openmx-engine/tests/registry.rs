//! Registry Integration Tests
//!
//! The platform over a simulated VM: kinds, lookup by name and pattern,
//! metadata sharing and optional beans.

use openmx_engine::{BeanKind, DynamicBean, ObjectName, OpenValue, Platform, PlatformConfig, VmBackend};
use openmx_runtime::{Runtime, RuntimeConfig, SimulatedVm, SimulationConfig};
use std::sync::Arc;

fn platform(config: &SimulationConfig) -> Platform {
    let vm: Arc<dyn VmBackend> = Arc::new(SimulatedVm::new(config));
    Platform::new(vm, PlatformConfig::default())
}

fn names(beans: &[Arc<dyn DynamicBean>]) -> Vec<String> {
    beans
        .iter()
        .filter_map(|bean| bean.object_name().map(ObjectName::canonical))
        .collect()
}

#[test]
fn test_bean_kind_names() {
    for kind in BeanKind::ALL {
        assert_eq!(kind.as_str().parse::<BeanKind>(), Ok(kind));
    }
    let err = "heap".parse::<BeanKind>().unwrap_err();
    assert_eq!(err.to_string(), "unknown bean kind `heap`");
    assert!(BeanKind::Memory.is_singleton());
    assert!(!BeanKind::GarbageCollector.is_singleton());
}

#[test]
fn test_fixed_and_list_kinds() {
    let platform = platform(&SimulationConfig::default());
    assert!(platform.get(BeanKind::Memory).is_some());
    assert!(platform.get(BeanKind::MemoryPool).is_none());

    assert_eq!(platform.beans(BeanKind::MemoryPool).len(), 5);
    assert_eq!(platform.beans(BeanKind::GarbageCollector).len(), 2);
    // plain managers only; collectors are listed under their own kind
    assert_eq!(
        names(&platform.beans(BeanKind::MemoryManager)),
        vec![
            "java.lang:name=Class Storage Manager,type=MemoryManager".to_string(),
            "java.lang:name=Code Cache Manager,type=MemoryManager".to_string(),
        ]
    );
    assert_eq!(platform.memory_managers().len(), 4);
    // 7 fixed beans, 2 buffer pools, 5 pools, 2 collectors, 2 managers
    assert_eq!(platform.all_beans().len(), 18);
}

#[test]
fn test_find_and_query() {
    let platform = platform(&SimulationConfig::default());
    let memory = ObjectName::parse("java.lang:type=Memory").unwrap();
    let bean = platform.find(&memory).unwrap();
    assert_eq!(bean.descriptor().interface(), "java.lang.management.MemoryMXBean");
    assert!(platform
        .find(&ObjectName::parse("java.lang:type=Nothing").unwrap())
        .is_none());

    let buffers = ObjectName::parse("java.nio:type=BufferPool,*").unwrap();
    let mut found = names(&platform.query(&buffers));
    found.sort();
    assert_eq!(
        found,
        vec![
            "java.nio:name=direct,type=BufferPool".to_string(),
            "java.nio:name=mapped,type=BufferPool".to_string(),
        ]
    );
    let logging = ObjectName::parse("java.util.logging:*").unwrap();
    assert_eq!(platform.query(&logging).len(), 1);
}

#[test]
fn test_metadata_shared_across_instances() {
    let platform = platform(&SimulationConfig::default());
    assert_eq!(platform.metadata().interfaces().len(), 11);
    assert_eq!(platform.metadata().builds(), 0);

    let pools = platform.memory_pools();
    assert!(Arc::ptr_eq(pools[0].table(), pools[4].table()));
    let before = platform.metadata().builds();
    platform.all_beans();
    platform.all_beans();
    assert!(platform.metadata().builds() <= 11);
    assert!(platform.metadata().builds() >= before);

    let descriptor = platform
        .metadata()
        .describe("java.lang.management.GarbageCollectorMXBean")
        .unwrap();
    assert!(descriptor.readable("LastGcInfo").is_some());
    assert!(descriptor.readable("MemoryPoolNames").is_some());
}

#[test]
fn test_compilation_absent_without_jit() {
    let config = SimulationConfig {
        jit: false,
        ..SimulationConfig::default()
    };
    let platform = platform(&config);
    assert!(platform.compilation().is_none());
    assert!(platform.get(BeanKind::Compilation).is_none());
    assert!(platform.beans(BeanKind::Compilation).is_empty());
    assert_eq!(platform.all_beans().len(), 17);
}

#[test]
fn test_runtime_bean_attributes() {
    let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
    let bean = runtime.platform().get(BeanKind::Runtime).unwrap();
    let name = bean.get_attribute("Name").unwrap();
    match name {
        OpenValue::String(name) => assert!(name.contains('@')),
        other => panic!("expected string, got {:?}", other),
    }
    assert_eq!(
        bean.get_attribute("VmVendor").unwrap(),
        OpenValue::String("OpenMX".to_string())
    );
    let bulk = bean.get_attributes(&["VmName", "NoSuchAttribute", "Uptime"]);
    let keys: Vec<&str> = bulk.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(keys, vec!["VmName", "Uptime"]);
}

#[test]
fn test_bulk_set_reports_applied_values() {
    let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
    let classes = runtime.platform().class_loading();
    let applied = classes.set_attributes(&[
        ("Verbose", OpenValue::Boolean(true)),
        ("LoadedClassCount", OpenValue::Int(3)),
    ]);
    assert_eq!(applied, vec![("Verbose".to_string(), OpenValue::Boolean(true))]);
    assert!(classes.is_verbose().unwrap());
}
