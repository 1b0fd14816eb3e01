//! `openmx watch`: Drive a synthetic workload and stream notifications.
//!
//! Every step either allocates on the heap, loads classes, runs a short
//! worker thread or reconfigures the host. Notifications are forwarded from
//! the pump threads over a channel and printed between steps.

use crate::output::StyledOutput;
use crate::render::notification_json;
use anyhow::Context;
use crossbeam::channel::{unbounded, Receiver, Sender};
use openmx_engine::notify::Handback;
use openmx_engine::{DynamicBean, Notification, NotificationListener, ObjectName, OpenValue};
use openmx_runtime::sim::memory::TENURED;
use openmx_runtime::Runtime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const MB: i64 = 1024 * 1024;

/// How long to keep listening after the last step
const DRAIN: Duration = Duration::from_millis(250);

pub struct WatchOptions {
    pub steps: u32,
    pub threshold: u8,
    pub seed: u64,
}

fn forward(bean: &dyn DynamicBean, tx: &Sender<Notification>) -> bool {
    let Some(hub) = bean.hub() else {
        return false;
    };
    let tx = tx.clone();
    let listener: Arc<dyn NotificationListener> =
        Arc::new(move |notification: &Notification, _: Option<&Handback>| {
            let _ = tx.send(notification.clone());
        });
    hub.subscribe(listener, None, None);
    true
}

fn arm_threshold(runtime: &Runtime, percent: u8) -> anyhow::Result<i64> {
    let pool = runtime
        .vm()
        .heap()
        .pool(TENURED)
        .context("simulated heap has no old generation")?;
    let threshold = pool.max() * i64::from(percent.min(100)) / 100;
    let name = ObjectName::new("java.lang", &[("type", "MemoryPool"), ("name", TENURED)])
        .context("cannot name the old generation")?;
    let bean = runtime
        .platform()
        .find(&name)
        .context("old generation is not registered")?;
    bean.set_attribute("UsageThreshold", &OpenValue::Long(threshold))?;
    bean.set_attribute("CollectionUsageThreshold", &OpenValue::Long(threshold / 2))?;
    Ok(threshold)
}

struct Printer<'a> {
    out: &'a mut StyledOutput,
    counts: BTreeMap<&'static str, u64>,
}

impl Printer<'_> {
    fn print(&mut self, notification: &Notification) {
        *self.counts.entry(notification.notification_type()).or_default() += 1;
        if self.out.is_json() {
            self.out.json_line(&notification_json(notification));
            return;
        }
        let source = notification
            .source()
            .map(ObjectName::canonical)
            .unwrap_or_default();
        self.out.tagged(
            &format!("#{:<4}", notification.sequence()),
            &format!(
                "{} [{}] {}",
                notification.notification_type(),
                source,
                notification.message()
            ),
        );
    }

    fn drain(&mut self, rx: &Receiver<Notification>) {
        for notification in rx.try_iter() {
            self.print(&notification);
        }
    }
}

fn step(runtime: &Runtime, rng: &mut StdRng, index: u32) -> anyhow::Result<()> {
    let vm = runtime.vm();
    match rng.gen_range(0..10) {
        0..=6 => {
            let bytes = rng.gen_range(1..=4) * MB;
            if let Err(err) = vm.heap().allocate(bytes) {
                tracing::warn!(%err, bytes, "allocation failed, collecting");
                runtime.platform().memory().gc()?;
            }
        }
        7 => vm.load_classes(rng.gen_range(1..20))?,
        8 => {
            let threads = vm.thread_table();
            let id = threads.spawn(&format!("worker-{}", index), rng.gen_bool(0.3));
            threads.consume_cpu(id, rng.gen_range(1_000..1_000_000))?;
            vm.host().consume_cpu(rng.gen_range(1_000..1_000_000));
            if rng.gen_bool(0.7) {
                threads.terminate(id)?;
            }
        }
        _ => {
            let current = runtime.platform().operating_system().available_processors()?;
            let next = if rng.gen_bool(0.5) { current + 1 } else { (current - 1).max(1) };
            // a static host refuses; the workload carries on
            if let Err(err) = vm.host().set_available_processors(next) {
                tracing::debug!(%err, "host reconfiguration refused");
            }
        }
    }
    Ok(())
}

pub fn execute(runtime: &Runtime, options: WatchOptions, out: &mut StyledOutput) -> anyhow::Result<()> {
    let (tx, rx) = unbounded();
    let platform = runtime.platform();
    forward(&**platform.memory(), &tx);
    if !forward(&**platform.operating_system(), &tx) {
        tracing::debug!("operating system bean emits no notifications");
    }
    drop(tx);

    let threshold = arm_threshold(runtime, options.threshold)?;
    if !out.is_json() {
        out.heading(&format!(
            "Watching {} steps, old generation threshold {} MB",
            options.steps,
            threshold / MB
        ));
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut printer = Printer {
        out,
        counts: BTreeMap::new(),
    };
    for index in 0..options.steps {
        step(runtime, &mut rng, index)?;
        printer.drain(&rx);
    }
    while let Ok(notification) = rx.recv_timeout(DRAIN) {
        printer.print(&notification);
    }

    let heap = platform.memory().heap_memory_usage()?;
    let Printer { out, counts } = printer;
    if out.is_json() {
        out.json_line(&json!({
            "summary": counts,
            "heapUsed": heap.used(),
            "heapCommitted": heap.committed(),
        }));
    } else {
        out.newline();
        out.heading("Summary");
        for (notification_type, count) in &counts {
            out.field(&format!("  {:<40}", notification_type), &count.to_string());
        }
        out.field("  heap used", &format!("{} MB", heap.used() / MB));
    }
    Ok(())
}
