//! Benchmarks for the scheduler intake path and the transition table.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use camera_broker::core::transitions;
use camera_broker::core::{EventHub, OperationScheduler};
use camera_broker::runtime::TokioSpawner;
use camera_broker::util::NoopMetrics;
use camera_broker::{
    CameraConfiguration, CameraState, OperationType, OwnerToken, ResourceId, ResourceTable,
    TimeoutProfile,
};

fn bench_transition_lookup(c: &mut Criterion) {
    c.bench_function("transition_lookup", |b| {
        b.iter(|| {
            black_box(transitions::next_state(
                black_box(CameraState::Streaming),
                black_box(OperationType::Pause),
            ))
        })
    });
}

fn bench_intake(c: &mut Criterion) {
    let table = Arc::new(ResourceTable::new());
    let spawner = Arc::new(TokioSpawner::with_worker_threads(1).expect("runtime"));
    let hub = Arc::new(EventHub::new(spawner));
    let scheduler = OperationScheduler::start(
        Arc::clone(&table),
        hub,
        Arc::new(NoopMetrics),
        TimeoutProfile::default(),
        CameraConfiguration::default(),
    );

    let id = ResourceId::camera(0);
    let owner = OwnerToken::new("bench");
    table.acquire(id, &owner).expect("free resource");
    // Leave the state Uninitialized: every request is rejected at worker
    // time without an adapter call, so the bench measures pure intake.

    let mut group = c.benchmark_group("intake");
    group.throughput(Throughput::Elements(1));
    group.bench_function("enqueue", |b| {
        b.iter(|| {
            black_box(scheduler.enqueue(
                black_box(id),
                owner.clone(),
                OperationType::StartStreaming,
                None,
                None,
            ))
        })
    });
    group.finish();

    scheduler.shutdown();
}

fn bench_acquire_release(c: &mut Criterion) {
    let table = ResourceTable::new();
    let id = ResourceId::camera(1);
    let owner = OwnerToken::new("bench");

    c.bench_function("acquire_release", |b| {
        b.iter(|| {
            table.acquire(black_box(id), &owner).expect("free");
            table.release(id, &owner);
        })
    });
}

criterion_group!(
    benches,
    bench_transition_lookup,
    bench_intake,
    bench_acquire_release
);
criterion_main!(benches);
