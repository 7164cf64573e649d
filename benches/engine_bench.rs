use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use dispatch_sim::duration::HandleTime;
use dispatch_sim::engine::DispatchEngine;
use dispatch_sim::models::{CustomCall, QueueItem, SimConfig, Transcript};
use dispatch_sim::sim::run_simulation;

const POOL_SIZES: &[usize] = &[2, 8, 32];
const QUEUE_ITEMS: usize = 200;

fn build_calls(count: usize) -> Vec<CustomCall> {
    (0..count)
        .map(|idx| CustomCall {
            transcript: Transcript {
                text: format!("Caller {} reports smoke in the building.", idx),
                time: "2026-01-10T09:15:00Z".to_string(),
                location: "V6B1A1".to_string(),
                duration: "00:30".to_string(),
            },
        })
        .collect()
}

fn build_config(dispatchers: usize) -> SimConfig {
    SimConfig {
        dispatchers,
        handle_time: HandleTime::Random,
        initial_busy_dispatchers: dispatchers / 2,
        custom_incoming_calls: build_calls(QUEUE_ITEMS),
        seed: Some(7),
        duration_ms: 6 * 60 * 60 * 1000,
        ..SimConfig::default()
    }
}

fn build_queue(count: usize) -> Vec<QueueItem> {
    (0..count)
        .map(|idx| QueueItem {
            id: format!("INC-{:06}", idx + 1),
            incident_type: "Fire".to_string(),
            location: "V6B1A1".to_string(),
            time: "09:15".to_string(),
            severity_level: "1".to_string(),
            suggested_actions: "dispatch firefighters".to_string(),
        })
        .collect()
}

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation");
    for &dispatchers in POOL_SIZES {
        group.bench_with_input(
            BenchmarkId::new("drain", format!("{}x{}", QUEUE_ITEMS, dispatchers)),
            &dispatchers,
            |b, &dispatchers| {
                b.iter_batched(
                    || build_config(dispatchers),
                    |config| {
                        let result = run_simulation(&config).expect("simulation should succeed");
                        black_box(result);
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    let queue = build_queue(QUEUE_ITEMS);
    for &dispatchers in POOL_SIZES {
        group.bench_with_input(
            BenchmarkId::new("claim_all", dispatchers),
            &dispatchers,
            |b, &dispatchers| {
                b.iter_batched(
                    || {
                        let config = SimConfig {
                            dispatchers,
                            incoming_calls: 0,
                            seed: Some(1),
                            ..SimConfig::default()
                        };
                        let mut engine =
                            DispatchEngine::new(config).expect("config should be valid");
                        engine.initialize(0);
                        engine
                    },
                    |mut engine| {
                        black_box(engine.tick(0, &queue, None));
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_simulation, bench_tick);
criterion_main!(benches);
