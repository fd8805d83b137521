//! AI-versus-AI match execution and metrics.
//!
//! Runs a scenario to completion (an outcome or the tick limit) with every
//! AI faction driven by its controller, and collects per-faction statistics
//! from the tick events.

use std::collections::BTreeMap;

use frontline_core::capture::CaptureEvent;
use frontline_core::components::EntityId;
use frontline_core::factions::FactionId;
use frontline_core::production::ProductionEvent;
use frontline_core::simulation::{MatchOutcome, Simulation, TickEvents};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::runner::{scenario_controllers, RunnerError};
use crate::scenario::Scenario;

/// Per-faction statistics for one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactionReport {
    /// Faction index.
    pub faction: u8,
    /// Display name from the scenario.
    pub name: String,
    /// Units that finished production.
    pub units_produced: u32,
    /// Own units evicted.
    pub units_lost: u32,
    /// Buildings placed by orders.
    pub buildings_placed: u32,
    /// Own buildings evicted.
    pub buildings_lost: u32,
    /// Tiles captured from others or neutral ground.
    pub tiles_captured: u32,
    /// Tiles owned at the end.
    pub tiles_owned: usize,
    /// Damage dealt by this faction's units and buildings.
    pub damage_dealt: f64,
    /// Kills landed by this faction.
    pub kills: u32,
    /// Dollars at the end.
    pub final_dollars: f64,
    /// Whether the faction lost its core structures.
    pub eliminated: bool,
}

/// Result of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Identifier (`<scenario>_<seed>`).
    pub game_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Map and RNG seed.
    pub seed: u64,
    /// Ticks simulated.
    pub ticks: u64,
    /// Simulated seconds.
    pub duration_seconds: f64,
    /// Decided result; `None` means the tick limit was reached.
    pub outcome: Option<MatchOutcome>,
    /// Per-faction statistics.
    pub factions: Vec<FactionReport>,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl MatchReport {
    /// Winning faction index, if any.
    #[must_use]
    pub fn winner(&self) -> Option<u8> {
        match self.outcome {
            Some(MatchOutcome::Victory { winner }) => Some(winner.0),
            _ => None,
        }
    }

    /// Whether the match hit the tick limit undecided.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.outcome.is_none()
    }
}

/// Event-driven statistics collector.
#[derive(Debug, Default)]
struct MetricsCollector {
    owners: BTreeMap<EntityId, FactionId>,
    factions: BTreeMap<FactionId, FactionReport>,
}

impl MetricsCollector {
    fn new(sim: &Simulation, scenario: &Scenario) -> Self {
        let mut collector = Self::default();
        for (index, &faction) in sim.factions().iter().enumerate() {
            let name = scenario.factions.get(index).map(|f| f.name.clone()).unwrap_or_default();
            collector.factions.insert(
                faction,
                FactionReport {
                    faction: faction.0,
                    name,
                    ..FactionReport::default()
                },
            );
        }
        for unit in sim.store().units() {
            collector.owners.insert(unit.id, unit.owner);
        }
        for building in sim.store().buildings() {
            collector.owners.insert(building.id, building.owner);
        }
        collector
    }

    fn report(&mut self, faction: FactionId) -> &mut FactionReport {
        self.factions.entry(faction).or_insert_with(|| FactionReport {
            faction: faction.0,
            ..FactionReport::default()
        })
    }

    fn observe(&mut self, sim: &Simulation, events: &TickEvents) {
        for event in events.orders.iter().chain(&events.production) {
            match event {
                ProductionEvent::UnitCompleted { unit, .. } => {
                    if let Some(owner) = sim.store().unit(*unit).map(|u| u.owner) {
                        self.owners.insert(*unit, owner);
                        self.report(owner).units_produced += 1;
                    }
                }
                ProductionEvent::BuildingPlaced { building, owner, .. } => {
                    self.owners.insert(*building, *owner);
                    self.report(*owner).buildings_placed += 1;
                }
                _ => {}
            }
        }
        for capture in &events.captures {
            if let CaptureEvent::TileCaptured { faction, .. } = capture {
                self.report(*faction).tiles_captured += 1;
            }
        }
        for hit in &events.damage {
            if let Some(&owner) = self.owners.get(&hit.attacker) {
                let report = self.report(owner);
                report.damage_dealt += hit.amount.to_num::<f64>();
                if hit.killed {
                    report.kills += 1;
                }
            }
        }
        for id in &events.removed.units {
            if let Some(owner) = self.owners.remove(id) {
                self.report(owner).units_lost += 1;
            }
        }
        for id in &events.removed.buildings {
            if let Some(owner) = self.owners.remove(id) {
                self.report(owner).buildings_lost += 1;
            }
        }
    }

    fn finish(mut self, sim: &Simulation) -> Vec<FactionReport> {
        for &faction in sim.factions() {
            let tiles = sim.grid().territory_count(faction);
            let dollars = sim.ledger(faction).map_or(0.0, |l| l.dollars.to_num::<f64>());
            let eliminated = sim.is_eliminated(faction);
            let report = self.report(faction);
            report.tiles_owned = tiles;
            report.final_dollars = dollars;
            report.eliminated = eliminated;
        }
        self.factions.into_values().collect()
    }
}

/// Run `scenario` with `seed` until it is decided or `max_ticks` pass.
///
/// `max_ticks` of `None` uses the scenario's time limit.
pub fn run_match(scenario: &Scenario, seed: u64, max_ticks: Option<u64>) -> Result<MatchReport, RunnerError> {
    let scenario = scenario.clone().with_seed(seed);
    let mut sim = scenario.build_simulation()?;
    let mut ais = scenario_controllers(&scenario)?;
    let dt = scenario.dt();
    let max_ticks = max_ticks.unwrap_or_else(|| scenario.max_ticks());
    let mut metrics = MetricsCollector::new(&sim, &scenario);

    while sim.tick_count() < max_ticks && sim.outcome().is_none() {
        for ai in &mut ais {
            ai.update(&mut sim, dt);
        }
        let events = sim.tick(dt);
        metrics.observe(&sim, &events);
        if events.tick % 600 == 0 {
            debug!(tick = events.tick, hash = sim.state_hash(), "Match progress");
        }
    }

    let report = MatchReport {
        game_id: format!("{}_{}", scenario.name, seed),
        scenario: scenario.name.clone(),
        seed,
        ticks: sim.tick_count(),
        duration_seconds: sim.elapsed().to_num(),
        outcome: sim.outcome(),
        final_state_hash: sim.state_hash(),
        factions: metrics.finish(&sim),
    };
    info!(
        game = %report.game_id,
        ticks = report.ticks,
        winner = ?report.winner(),
        "Match finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{Controller, FactionSetup};

    fn short_scenario() -> Scenario {
        Scenario::skirmish_1v1().with_max_duration(60)
    }

    #[test]
    fn test_match_respects_tick_limit() {
        let report = run_match(&short_scenario(), 1, None).unwrap();
        assert_eq!(report.ticks, 600);
        assert!(report.timed_out());
        assert_eq!(report.winner(), None);
        assert_eq!(report.factions.len(), 2);
        assert_eq!(report.game_id, "skirmish_1v1_1");
    }

    #[test]
    fn test_explicit_limit_overrides_scenario() {
        let report = run_match(&short_scenario(), 1, Some(25)).unwrap();
        assert_eq!(report.ticks, 25);
    }

    #[test]
    fn test_ai_factions_produce_units() {
        let report = run_match(&short_scenario(), 3, None).unwrap();
        for faction in &report.factions {
            assert!(faction.units_produced > 0, "{} produced nothing", faction.name);
            assert!(faction.tiles_owned >= 9);
        }
    }

    #[test]
    fn test_same_seed_same_report() {
        let a = run_match(&short_scenario(), 42, Some(300)).unwrap();
        let b = run_match(&short_scenario(), 42, Some(300)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_idle_factions_do_nothing() {
        let scenario = Scenario {
            factions: vec![
                FactionSetup::new("A", Controller::Idle),
                FactionSetup::new("B", Controller::External),
            ],
            ..short_scenario()
        };
        let report = run_match(&scenario, 5, Some(100)).unwrap();
        for faction in &report.factions {
            assert_eq!(faction.units_produced, 0);
            assert_eq!(faction.buildings_placed, 0);
            assert_eq!(faction.final_dollars, 10_000.0);
        }
    }
}
