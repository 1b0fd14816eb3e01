//! Pump Shutdown Tests
//!
//! Many pumps under one coordinator: per-pump ordering, concurrent
//! shutdown callers, and shutdown requested from inside a listener.

use openmx_engine::native::NativeQueue;
use openmx_engine::notify::{Decoder, Handback, NotificationBody};
use openmx_engine::{types, Notification, NotificationHub, OpenValue, Pump, PumpState, ShutdownCoordinator};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn decoder() -> Decoder<i64> {
    Box::new(|value: i64| {
        Ok(NotificationBody {
            notification_type: types::PROCESSING_CAPACITY_CHANGE,
            message: format!("capacity {}", value),
            user_data: OpenValue::Long(value),
        })
    })
}

struct Rig {
    queue: Arc<NativeQueue<i64>>,
    pump: Arc<Pump<i64>>,
    seen: Arc<Mutex<Vec<(u64, i64)>>>,
}

fn rig(name: &str, coordinator: &ShutdownCoordinator) -> Rig {
    let queue = Arc::new(NativeQueue::new());
    let hub = Arc::new(NotificationHub::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    hub.subscribe(
        Arc::new(move |n: &Notification, _: Option<&Handback>| {
            if let OpenValue::Long(value) = n.user_data() {
                sink.lock().push((n.sequence(), *value));
            }
        }),
        None,
        None,
    );
    let pump = Pump::new(name, queue.clone(), decoder(), hub, None, false);
    pump.start(coordinator).unwrap();
    Rig { queue, pump, seen }
}

#[test]
fn test_each_pump_delivers_in_order() {
    let coordinator = ShutdownCoordinator::new();
    let rigs: Vec<Rig> = (0..8)
        .map(|i| rig(&format!("openmx-pump-{}", i), &coordinator))
        .collect();
    assert_eq!(coordinator.active(), 8);

    for value in 0..200 {
        for rig in &rigs {
            rig.queue.push(value);
        }
    }
    coordinator.shutdown();

    for rig in &rigs {
        assert_eq!(rig.pump.state(), PumpState::Terminated);
        let seen = rig.seen.lock();
        // whatever was delivered before the sentinel is an in-order prefix
        for (position, (sequence, value)) in seen.iter().enumerate() {
            assert_eq!(*value, position as i64);
            assert_eq!(*sequence, position as u64 + 1);
        }
        assert_eq!(rig.pump.delivered(), seen.len() as u64);
    }
}

#[test]
fn test_concurrent_shutdown_callers() {
    let coordinator = Arc::new(ShutdownCoordinator::new());
    let rigs: Vec<Rig> = (0..4)
        .map(|i| rig(&format!("openmx-pump-{}", i), &coordinator))
        .collect();
    for rig in &rigs {
        for value in 0..50 {
            rig.queue.push(value);
        }
    }

    crossbeam::scope(|scope| {
        for _ in 0..6 {
            let coordinator = coordinator.clone();
            scope.spawn(move |_| coordinator.shutdown());
        }
    })
    .unwrap();

    for rig in &rigs {
        rig.pump.join();
        assert_eq!(rig.pump.state(), PumpState::Terminated);
    }
    assert!(coordinator.is_shutting_down());
    assert_eq!(coordinator.active(), 0);
}

#[test]
fn test_shutdown_from_listener_does_not_deadlock() {
    let coordinator = Arc::new(ShutdownCoordinator::new());
    let other = rig("openmx-pump-other", &coordinator);

    let queue = Arc::new(NativeQueue::new());
    let hub = Arc::new(NotificationHub::new());
    let trigger = coordinator.clone();
    hub.subscribe(
        Arc::new(move |_: &Notification, _: Option<&Handback>| trigger.shutdown()),
        None,
        None,
    );
    let pump = Pump::new("openmx-pump-self", queue.clone(), decoder(), hub, None, false);
    pump.start(&coordinator).unwrap();

    queue.push(1);
    assert!(pump.join_timeout(Duration::from_secs(5)));
    assert_eq!(pump.state(), PumpState::Terminated);
    assert_eq!(pump.delivered(), 1);

    assert!(other.pump.join_timeout(Duration::from_secs(5)));
    assert_eq!(other.pump.state(), PumpState::Terminated);
    assert!(coordinator.is_shutting_down());
}

#[test]
fn test_pump_started_after_shutdown_is_refused() {
    let coordinator = ShutdownCoordinator::new();
    coordinator.shutdown();
    let late = rig("openmx-pump-late", &coordinator);
    assert_eq!(late.pump.state(), PumpState::Terminated);
    assert!(!late.queue.push(7));
    assert_eq!(late.queue.pending(), 0);
    late.pump.join();
    assert!(late.seen.lock().is_empty());
    assert_eq!(coordinator.active(), 0);
}
