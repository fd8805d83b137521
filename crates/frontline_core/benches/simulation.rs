//! Simulation benchmarks for frontline_core.
//!
//! Run with: `cargo bench -p frontline_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use frontline_core::archetypes::UnitKind;
use frontline_core::factions::FactionId;
use frontline_test_utils::fixtures::{default_dt, duel, pos, small_match, spawn_row};

/// Tick throughput for an idle generated match and a crowded battle.
pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("tick_small_match", |b| {
        b.iter_batched(
            || small_match(1),
            |mut sim| {
                for _ in 0..10 {
                    black_box(sim.tick(default_dt()));
                }
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("tick_battle_100_units", |b| {
        b.iter_batched(
            || {
                let mut sim = duel(1);
                spawn_row(&mut sim, UnitKind::Rifleman, FactionId(0), pos(100, 140), 50);
                spawn_row(&mut sim, UnitKind::Rifleman, FactionId(1), pos(100, 150), 50);
                sim
            },
            |mut sim| {
                for _ in 0..10 {
                    black_box(sim.tick(default_dt()));
                }
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("state_hash", |b| {
        let sim = small_match(1);
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
