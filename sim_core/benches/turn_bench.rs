use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use sim_core::{EnvironmentConfig, World};

fn bench_turn(c: &mut Criterion) {
    let mut group = c.benchmark_group("turn");

    for size in [16i32, 32, 48, 64] {
        group.bench_with_input(BenchmarkId::new("grid", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let mut config = EnvironmentConfig::default();
                    config.map_width = size;
                    config.map_height = size;
                    config.num_agents = (size as usize).min(64);
                    let mut world = World::new(config);
                    world.reset();
                    world
                },
                |mut world| {
                    let actions = vec![0u8; world.config.num_agents];
                    world.step(&actions);
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(turn_benches, bench_turn);
criterion_main!(turn_benches);
