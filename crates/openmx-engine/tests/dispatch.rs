//! Dynamic Dispatch Integration Tests
//!
//! A bean kind declared outside the engine, driven only through the
//! type-erased `DynamicBean` surface:
//! - Metadata built once per interface and shared
//! - Conversion of records, enums, optionals, arrays and maps
//! - Overload resolution and argument errors
//! - Concurrent readers and writers

use openmx_engine::mgmt::MetadataCache;
use openmx_engine::notify::{NotificationInfo, types};
use openmx_engine::records::MemoryUsage;
use openmx_engine::{Dispatcher, DynamicBean, Impact, ManagedBean, NotificationHub, TableBuilder};
use openmx_sdk::{open_enum, MgmtError, MgmtResult, ObjectName, OpenMapped, OpenType, OpenValue};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Heat,
    Cool,
    Off,
}

open_enum!(Mode {
    Heat => "HEAT",
    Cool => "COOL",
    Off => "OFF",
});

struct Thermostat {
    mode: Mutex<Mode>,
    target: Mutex<f64>,
    fallback: Mutex<Option<Mode>>,
    history: Mutex<Vec<i64>>,
    hub: Arc<NotificationHub>,
    name: Option<ObjectName>,
}

impl Thermostat {
    fn new(room: &str) -> Self {
        Thermostat {
            mode: Mutex::new(Mode::Off),
            target: Mutex::new(20.0),
            fallback: Mutex::new(None),
            history: Mutex::new(Vec::new()),
            hub: Arc::new(NotificationHub::new()),
            name: ObjectName::new("test", &[("type", "Thermostat"), ("room", room)]),
        }
    }

    fn mode(&self) -> MgmtResult<Mode> {
        Ok(*self.mode.lock())
    }

    fn set_mode(&self, mode: Mode) -> MgmtResult<()> {
        *self.mode.lock() = mode;
        Ok(())
    }

    fn target(&self) -> MgmtResult<f64> {
        Ok(*self.target.lock())
    }

    fn set_target(&self, target: f64) -> MgmtResult<()> {
        if !(5.0..=30.0).contains(&target) {
            return Err(MgmtError::invalid_value("Target", format!("{} out of range", target)));
        }
        *self.target.lock() = target;
        self.history.lock().push(target as i64);
        Ok(())
    }

    fn fallback(&self) -> MgmtResult<Option<Mode>> {
        Ok(*self.fallback.lock())
    }

    fn set_fallback(&self, mode: Option<Mode>) -> MgmtResult<()> {
        *self.fallback.lock() = mode;
        Ok(())
    }

    fn budget(&self) -> MgmtResult<MemoryUsage> {
        MemoryUsage::new(100, 40, 60, 200)
    }

    fn history(&self) -> MgmtResult<Vec<i64>> {
        Ok(self.history.lock().clone())
    }

    fn labels(&self) -> MgmtResult<BTreeMap<String, String>> {
        let mut labels = BTreeMap::new();
        labels.insert("floor".to_string(), "2".to_string());
        Ok(labels)
    }

    fn adjust(&self, delta: f64) -> MgmtResult<f64> {
        let mut target = self.target.lock();
        *target += delta;
        Ok(*target)
    }
}

impl ManagedBean for Thermostat {
    const INTERFACE: &'static str = "test.ThermostatMXBean";
    const NAME_PATTERN: &'static str = "test:type=Thermostat,room=*";

    fn table(table: TableBuilder<Self>) -> TableBuilder<Self> {
        table
            .writable("Mode", Thermostat::mode, Thermostat::set_mode)
            .writable("Target", Thermostat::target, Thermostat::set_target)
            .writable("Fallback", Thermostat::fallback, Thermostat::set_fallback)
            .attribute("Budget", Thermostat::budget)
            .attribute("History", Thermostat::history)
            .attribute("Labels", Thermostat::labels)
            .operation("adjust", Impact::Action, |bean: &Self, (delta,): (f64,)| {
                bean.adjust(delta)
            })
            .operation(
                "adjust",
                Impact::Action,
                |bean: &Self, (delta, mode): (f64, Mode)| {
                    bean.set_mode(mode)?;
                    bean.adjust(delta)
                },
            )
            .operation("budgetFor", Impact::Info, |bean: &Self, (room,): (String,)| {
                if room.is_empty() {
                    return Ok(None);
                }
                bean.budget().map(Some)
            })
            .action("off", |bean: &Self| bean.set_mode(Mode::Off))
            .notification(NotificationInfo::new(
                &[types::GC_COLLECTION_COMPLETED],
                "GarbageCollectionNotificationInfo",
                "Unused, declared for the catalogue",
            ))
    }

    fn object_name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }

    fn hub(&self) -> Option<&Arc<NotificationHub>> {
        Some(&self.hub)
    }
}

fn thermostat(cache: &MetadataCache, room: &str) -> Arc<Dispatcher<Thermostat>> {
    Arc::new(Dispatcher::new(Thermostat::new(room), cache.table::<Thermostat>()))
}

// ===== Metadata =====

#[test]
fn test_metadata_built_once_and_shared() {
    let cache = MetadataCache::new();
    let kitchen = thermostat(&cache, "kitchen");
    let hall = thermostat(&cache, "hall");
    assert!(Arc::ptr_eq(kitchen.table(), hall.table()));
    assert!(Arc::ptr_eq(kitchen.descriptor(), hall.descriptor()));
    assert_eq!(cache.builds(), 1);

    let descriptor = cache.describe("test.ThermostatMXBean").unwrap();
    assert_eq!(descriptor.attributes().len(), 6);
    assert_eq!(descriptor.operations().len(), 4);
    assert_eq!(descriptor.overloads("adjust").len(), 2);
    assert!(cache.describe("test.Unknown").is_none());
    assert_eq!(cache.interfaces(), vec!["test.ThermostatMXBean"]);
}

#[test]
fn test_descriptor_open_types() {
    let cache = MetadataCache::new();
    let bean = thermostat(&cache, "kitchen");
    let descriptor = bean.descriptor();
    let (_, mode) = descriptor.readable("Mode").unwrap();
    assert_eq!(mode.open_type, OpenType::STRING);
    let (_, budget) = descriptor.readable("Budget").unwrap();
    assert_eq!(budget.open_type, MemoryUsage::open_type());
    assert_eq!(budget.access(), "r");
    let (_, history) = descriptor.readable("History").unwrap();
    assert_eq!(history.open_type.type_name(), "long[]");
    assert_eq!(bean.notification_info().len(), 1);
}

// ===== Conversion =====

#[test]
fn test_unknown_enum_name_is_null_to_required_setter() {
    let cache = MetadataCache::new();
    let bean = thermostat(&cache, "kitchen");
    bean.set_attribute("Mode", &OpenValue::from("COOL")).unwrap();
    assert_eq!(bean.get_attribute("Mode").unwrap(), OpenValue::from("COOL"));

    // same outcome as an explicit null
    let err = bean.set_attribute("Mode", &OpenValue::from("FAN")).unwrap_err();
    assert!(matches!(err, MgmtError::InvalidAttributeValue { .. }));
    assert!(err.to_string().contains("degrades to null"));
    let err = bean.set_attribute("Mode", &OpenValue::Null).unwrap_err();
    assert!(matches!(err, MgmtError::InvalidAttributeValue { .. }));
    assert_eq!(*bean.mode.lock(), Mode::Cool);

    assert_eq!(Option::<Mode>::from_open(&OpenValue::from("FAN")).unwrap(), None);
}

#[test]
fn test_optional_enum_degrades_unknown_names() {
    let cache = MetadataCache::new();
    let bean = thermostat(&cache, "kitchen");
    bean.set_attribute("Fallback", &OpenValue::from("HEAT")).unwrap();
    assert_eq!(*bean.fallback.lock(), Some(Mode::Heat));

    bean.set_attribute("Fallback", &OpenValue::from("FAN")).unwrap();
    assert_eq!(bean.get_attribute("Fallback").unwrap(), OpenValue::Null);
}

#[test]
fn test_setter_errors_propagate() {
    let cache = MetadataCache::new();
    let bean = thermostat(&cache, "kitchen");
    let err = bean.set_attribute("Target", &OpenValue::Double(90.0)).unwrap_err();
    assert!(matches!(err, MgmtError::InvalidAttributeValue { ref attribute, .. } if attribute == "Target"));
    let err = bean.set_attribute("Target", &OpenValue::Null).unwrap_err();
    assert!(matches!(err, MgmtError::InvalidAttributeValue { .. }));
}

#[test]
fn test_composite_and_tabular_values() {
    let cache = MetadataCache::new();
    let bean = thermostat(&cache, "kitchen");
    let budget = bean.get_attribute("Budget").unwrap();
    assert!(budget.conforms_to(&MemoryUsage::open_type()));
    assert_eq!(MemoryUsage::from_open(&budget).unwrap().committed(), 60);

    let labels = bean.get_attribute("Labels").unwrap();
    let labels = BTreeMap::<String, String>::from_open(&labels).unwrap();
    assert_eq!(labels["floor"], "2");

    bean.set_attribute("Target", &OpenValue::Double(21.0)).unwrap();
    bean.set_attribute("Target", &OpenValue::Double(22.0)).unwrap();
    assert_eq!(
        bean.get_attribute("History").unwrap(),
        OpenValue::Array(vec![OpenValue::Long(21), OpenValue::Long(22)])
    );
}

// ===== Operations =====

#[test]
fn test_overload_resolution() {
    let cache = MetadataCache::new();
    let bean = thermostat(&cache, "kitchen");
    assert_eq!(
        bean.invoke("adjust", &[OpenValue::Double(1.5)], &["double"]).unwrap(),
        OpenValue::Double(21.5)
    );
    assert_eq!(
        bean.invoke(
            "adjust",
            &[OpenValue::Double(-1.5), OpenValue::from("HEAT")],
            &["double", "string"]
        )
        .unwrap(),
        OpenValue::Double(20.0)
    );
    assert_eq!(*bean.mode.lock(), Mode::Heat);

    let err = bean.invoke("adjust", &[], &[]).unwrap_err();
    assert!(matches!(err, MgmtError::OperationNotFound { .. }));
}

#[test]
fn test_argument_errors_name_the_position() {
    let cache = MetadataCache::new();
    let bean = thermostat(&cache, "kitchen");
    let err = bean
        .invoke(
            "adjust",
            &[OpenValue::Double(1.0), OpenValue::from("FAN")],
            &["double", "string"],
        )
        .unwrap_err();
    assert!(matches!(err, MgmtError::InvalidArgument { index: 1, .. }));

    let err = bean
        .invoke("adjust", &[OpenValue::Double(1.0), OpenValue::Double(2.0)], &["double"])
        .unwrap_err();
    assert!(matches!(err, MgmtError::InvalidArgument { .. }));
}

#[test]
fn test_optional_result() {
    let cache = MetadataCache::new();
    let bean = thermostat(&cache, "kitchen");
    assert_eq!(
        bean.invoke("budgetFor", &[OpenValue::from("")], &["string"]).unwrap(),
        OpenValue::Null
    );
    let budget = bean
        .invoke("budgetFor", &[OpenValue::from("attic")], &["string"])
        .unwrap();
    assert!(matches!(budget, OpenValue::Composite(_)));
    assert_eq!(bean.invoke("off", &[], &[]).unwrap(), OpenValue::Null);
}

// ===== Concurrency =====

#[test]
fn test_concurrent_access() {
    let cache = MetadataCache::new();
    let bean = thermostat(&cache, "kitchen");
    crossbeam::scope(|scope| {
        for worker in 0..8 {
            let bean = bean.clone();
            scope.spawn(move |_| {
                for step in 0..100 {
                    let value = 5.0 + f64::from((worker + step) % 25);
                    bean.set_attribute("Target", &OpenValue::Double(value)).unwrap();
                    assert!(bean.get_attribute("Target").is_ok());
                    assert!(bean.get_attribute("Budget").is_ok());
                }
            });
        }
    })
    .unwrap();
    assert_eq!(bean.history.lock().len(), 800);
    assert_eq!(cache.builds(), 1);
}

#[test]
fn test_names_and_hub() {
    let cache = MetadataCache::new();
    let bean: Arc<dyn DynamicBean> = thermostat(&cache, "living room");
    let name = bean.object_name().unwrap();
    assert_eq!(name.key("room"), Some("living room"));
    let pattern = ObjectName::parse("test:type=Thermostat,*").unwrap();
    assert!(name.matches(&pattern));
    assert_eq!(bean.hub().unwrap().listener_count(), 0);
}
