use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use openmx_engine::{DynamicBean, OpenValue, Platform, PlatformConfig, VmBackend};
use openmx_runtime::{SimulatedVm, SimulationConfig};
use std::sync::Arc;

fn platform() -> Platform {
    let vm: Arc<dyn VmBackend> = Arc::new(SimulatedVm::new(&SimulationConfig::default()));
    Platform::new(vm, PlatformConfig::default())
}

fn bench_get_attribute(c: &mut Criterion) {
    let platform = platform();
    let mut group = c.benchmark_group("get_attribute");

    let memory = platform.memory().clone();
    for attribute in ["ObjectPendingFinalizationCount", "HeapMemoryUsage"] {
        group.bench_with_input(BenchmarkId::new("memory", attribute), &attribute, |b, name| {
            b.iter(|| memory.get_attribute(black_box(name)).unwrap());
        });
    }

    let threading = platform.threading().clone();
    group.bench_function("threading/AllThreadIds", |b| {
        b.iter(|| threading.get_attribute(black_box("AllThreadIds")).unwrap());
    });

    group.finish();
}

fn bench_invoke(c: &mut Criterion) {
    let platform = platform();
    let threading = platform.threading().clone();

    c.bench_function("invoke_get_thread_info", |b| {
        let args = [OpenValue::Long(1)];
        b.iter(|| {
            threading
                .invoke("getThreadInfo", black_box(&args), &["long"])
                .unwrap()
        });
    });

    let logging = platform.logging().clone();
    c.bench_function("invoke_get_logger_level", |b| {
        let args = [OpenValue::String("openmx.pump".to_string())];
        b.iter(|| {
            logging
                .invoke("getLoggerLevel", black_box(&args), &["string"])
                .unwrap()
        });
    });
}

fn bench_cold_platform(c: &mut Criterion) {
    c.bench_function("build_all_beans", |b| {
        b.iter(|| {
            let platform = platform();
            black_box(platform.all_beans().len())
        });
    });
}

criterion_group!(benches, bench_get_attribute, bench_invoke, bench_cold_platform);
criterion_main!(benches);
