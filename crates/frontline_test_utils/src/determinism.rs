//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Lockstep play and replays require a 100% deterministic simulation.
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`frontline_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Entity storage is `BTreeMap`-backed and visited in id order.
//!
//! - **System randomness**: All "random" behavior draws from the seeded
//!   `ChaCha8Rng` stored in the world snapshot.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (capture, combat, etc.)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full matches are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::thread;

use frontline_core::simulation::Simulation;
use tracing::debug;

use crate::fixtures::default_dt;

/// Final state hashes from several runs of the same match setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHashes {
    /// Final hash of each run, in run order.
    pub hashes: Vec<u64>,
    /// Ticks simulated per run.
    pub ticks: u64,
}

impl RunHashes {
    /// True when every run ended on the same hash.
    #[must_use]
    pub fn agree(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Distinct final hashes, sorted.
    #[must_use]
    pub fn distinct(&self) -> Vec<u64> {
        let mut distinct = self.hashes.clone();
        distinct.sort_unstable();
        distinct.dedup();
        distinct
    }

    /// # Panics
    ///
    /// Panics listing every hash when the runs disagree.
    pub fn assert_agree(&self) {
        assert!(
            self.agree(),
            "runs diverged after {} ticks: {} distinct hashes in {:?}",
            self.ticks,
            self.distinct().len(),
            self.hashes
        );
    }
}

fn play(mut sim: Simulation, ticks: u64) -> u64 {
    for _ in 0..ticks {
        sim.tick(default_dt());
    }
    sim.state_hash()
}

/// Play `runs` fresh copies of a match one after another.
pub fn repeat_runs<F>(setup_fn: F, runs: usize, ticks: u64) -> RunHashes
where
    F: Fn() -> Simulation,
{
    RunHashes {
        hashes: (0..runs).map(|_| play(setup_fn(), ticks)).collect(),
        ticks,
    }
}

/// Play `runs` fresh copies of a match on scoped threads.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn parallel_runs<F>(setup_fn: F, runs: usize, ticks: u64) -> RunHashes
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..runs).map(|_| s.spawn(|| play(setup_fn(), ticks))).collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    RunHashes { hashes, ticks }
}

/// Step two copies of a match side by side and report the first tick
/// whose hashes differ (0 when they differ before any tick).
pub fn find_first_divergence<F>(setup_fn: F, ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut left = setup_fn();
    let mut right = setup_fn();

    if left.state_hash() != right.state_hash() {
        return Some(0);
    }

    for tick in 1..=ticks {
        left.tick(default_dt());
        right.tick(default_dt());

        if left.state_hash() != right.state_hash() {
            debug!(tick, "Simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Play `ticks`, save, restore into a fresh match, then check both copies
/// agree immediately and after another `ticks`.
pub fn snapshot_resumes_identically<F>(setup_fn: F, ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for _ in 0..ticks {
        sim.tick(default_dt());
    }

    let Ok(bytes) = sim.snapshot_bytes() else {
        return false;
    };
    let mut restored = setup_fn();
    if restored.restore_from_bytes(&bytes).is_err() || restored.state_hash() != sim.state_hash() {
        return false;
    }

    play(sim, ticks) == play(restored, ticks)
}

/// Proptest strategies for simulation inputs.
pub mod strategies {
    use frontline_core::archetypes::UnitKind;
    use frontline_core::math::{Fixed, Vec2Fixed};
    use proptest::prelude::*;

    /// A position on an 8×8 map of 40-unit tiles.
    pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
        (0i32..=320, 0i32..=320).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }

    /// A tick length, including out-of-range values the clock must clamp.
    pub fn arb_dt() -> impl Strategy<Value = Fixed> {
        (-100i32..500).prop_map(|ms| Fixed::from_num(ms) / 1000)
    }

    /// Any combat unit kind.
    pub fn arb_unit_kind() -> impl Strategy<Value = UnitKind> {
        prop_oneof![
            Just(UnitKind::Rifleman),
            Just(UnitKind::Sniper),
            Just(UnitKind::MachineGunner),
            Just(UnitKind::Medic),
            Just(UnitKind::LightTank),
            Just(UnitKind::HeavyTank),
        ]
    }

    /// Damage values (1-200).
    pub fn arb_damage() -> impl Strategy<Value = Fixed> {
        (1i32..200).prop_map(Fixed::from_num)
    }

    /// Armor values (0-100).
    pub fn arb_armor() -> impl Strategy<Value = Fixed> {
        (0i32..100).prop_map(Fixed::from_num)
    }

    /// A battle roster: unit kinds and positions for one side.
    pub fn arb_roster(max_units: usize) -> impl Strategy<Value = Vec<(UnitKind, Vec2Fixed)>> {
        proptest::collection::vec((arb_unit_kind(), arb_position()), 1..max_units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::duel;

    #[test]
    fn test_run_hashes_report_disagreement() {
        let runs = RunHashes {
            hashes: vec![7, 3, 7],
            ticks: 10,
        };
        assert!(!runs.agree());
        assert_eq!(runs.distinct(), vec![3, 7]);

        let runs = RunHashes {
            hashes: vec![5, 5],
            ticks: 10,
        };
        assert!(runs.agree());
        runs.assert_agree();
    }

    #[test]
    #[should_panic(expected = "runs diverged")]
    fn test_assert_agree_panics_on_divergence() {
        RunHashes {
            hashes: vec![1, 2],
            ticks: 1,
        }
        .assert_agree();
    }

    #[test]
    fn test_divergence_found_at_setup() {
        let calls = std::cell::Cell::new(0u32);
        let setup = || {
            calls.set(calls.get() + 1);
            let mut sim = duel(4);
            if calls.get() > 1 {
                sim.tick(default_dt());
            }
            sim
        };
        assert_eq!(find_first_divergence(setup, 10), Some(0));
    }
}
