//! Test fixtures and helpers.
//!
//! Pre-built match states and unit placements for consistent testing.

use fixed::types::I32F32;
use frontline_core::archetypes::{ArchetypeTable, UnitKind};
use frontline_core::components::EntityId;
use frontline_core::config::SimConfig;
use frontline_core::factions::FactionId;
use frontline_core::map_generation::MapConfig;
use frontline_core::math::{ratio, Vec2Fixed};
use frontline_core::simulation::Simulation;
use frontline_core::territory::TileCoord;

/// Tick length used by fixtures and the determinism harness.
#[must_use]
pub fn default_dt() -> I32F32 {
    ratio(1, 10)
}

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Position from integer map coordinates.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Empty 8×8 world with default tuning and no factions.
///
/// # Panics
///
/// Panics if the default tuning fails validation.
#[must_use]
pub fn empty_world(seed: u64) -> Simulation {
    empty_world_with(SimConfig::default(), seed)
}

/// Empty 8×8 world with custom tuning.
///
/// # Panics
///
/// Panics if `config` fails validation.
#[must_use]
pub fn empty_world_with(config: SimConfig, seed: u64) -> Simulation {
    Simulation::new(config, ArchetypeTable::default(), 8, 8, seed).expect("fixture config must be valid")
}

/// Two factions in opposite corners of an 8×8 world, fully set up.
///
/// # Panics
///
/// Panics if setup fails.
#[must_use]
pub fn duel(seed: u64) -> Simulation {
    let mut sim = empty_world(seed);
    sim.setup_faction(FactionId(0), TileCoord::new(1, 1)).expect("start tile in bounds");
    sim.setup_faction(FactionId(1), TileCoord::new(6, 6)).expect("start tile in bounds");
    sim
}

/// Generated small map with two factions.
///
/// # Panics
///
/// Panics if generation fails.
#[must_use]
pub fn small_match(seed: u64) -> Simulation {
    Simulation::generate(
        SimConfig::default(),
        ArchetypeTable::default(),
        &MapConfig::small().with_seed(seed),
    )
    .expect("small map generation must succeed")
}

/// Spawn `count` units of `kind` in a row starting at `origin`, two units apart.
///
/// The faction is registered if it is not yet part of the match.
///
/// # Panics
///
/// Panics if `kind` has no archetype.
pub fn spawn_row(
    sim: &mut Simulation,
    kind: UnitKind,
    owner: FactionId,
    origin: Vec2Fixed,
    count: usize,
) -> Vec<EntityId> {
    sim.add_faction(owner);
    (0..count)
        .map(|i| {
            let position = origin + Vec2Fixed::from_ints(2 * i as i32, 0);
            sim.spawn_unit(kind, position, owner).expect("archetype exists")
        })
        .collect()
}

/// Run `ticks` ticks of [`default_dt`].
pub fn run_ticks(sim: &mut Simulation, ticks: u64) {
    for _ in 0..ticks {
        sim.tick(default_dt());
    }
}
