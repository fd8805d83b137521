//! Property tests for world invariants.

use frontline_core::archetypes::{ArchetypeTable, UnitKind};
use frontline_core::capture::{capture_system, CaptureEvent};
use frontline_core::combat::mitigate;
use frontline_core::components::Health;
use frontline_core::config::SimConfig;
use frontline_core::economy::{Cost, Ledger, ResourceKind};
use frontline_core::entities::EntityStore;
use frontline_core::factions::FactionId;
use frontline_core::math::{Fixed, Vec2Fixed};
use frontline_core::simulation::TickContext;
use frontline_core::territory::{TerritoryGrid, TileCoord};
use frontline_test_utils::determinism::strategies::{arb_armor, arb_damage, arb_dt, arb_position, arb_roster};
use frontline_test_utils::fixtures::{duel, fixed, spawn_row};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_heal_never_exceeds_max(max in 1i32..5000, damage in 0i32..6000, heal in 0i32..10_000) {
        let mut health = Health::new(fixed(max));
        health.apply_damage(fixed(damage));
        health.heal(fixed(heal));
        prop_assert!(health.current <= health.max);
        prop_assert!(health.current >= Fixed::ZERO);
    }

    #[test]
    fn test_mitigation_never_amplifies(damage in arb_damage(), armor in arb_armor()) {
        let dealt = mitigate(damage, armor);
        prop_assert!(dealt <= damage);
        prop_assert!(dealt > Fixed::ZERO);
    }

    #[test]
    fn test_spend_then_afford_reflects_balance(balance in 0u32..10_000, price in 1u32..10_000, oil in 0u32..50) {
        let mut ledger = Ledger::new(fixed(balance as i32));
        ledger.credit(ResourceKind::Oil, fixed(oil as i32));
        let cost = Cost::dollars(price).with_resource(ResourceKind::Oil, 10);
        ledger.spend(&cost);
        let enough = ledger.dollars >= fixed(price as i32) && ledger.resource(ResourceKind::Oil) >= fixed(10);
        prop_assert_eq!(ledger.can_afford(&cost), enough);
    }

    #[test]
    fn test_capture_progress_stays_in_unit_interval(
        blue in arb_roster(6),
        red in arb_roster(6),
        dts in proptest::collection::vec(arb_dt(), 1..60),
    ) {
        let config = SimConfig::default();
        let archetypes = ArchetypeTable::default();
        let mut grid = TerritoryGrid::new(8, 8, config.tile_size);
        grid.claim_starting_territory(TileCoord::new(1, 1), FactionId(0));
        grid.claim_starting_territory(TileCoord::new(6, 6), FactionId(1));
        let mut store = EntityStore::new();
        for (kind, position) in &blue {
            store.create_unit(&archetypes, *kind, *position, FactionId(0)).unwrap();
        }
        for (kind, position) in &red {
            store.create_unit(&archetypes, *kind, *position, FactionId(1)).unwrap();
        }

        let mut now = Fixed::ZERO;
        for dt in dts {
            let dt = dt.clamp(Fixed::ZERO, config.max_dt);
            now += dt;
            let ctx = TickContext { config: &config, archetypes: &archetypes, dt, now };
            let events = capture_system(&ctx, &mut grid, &store);
            for tile in grid.tiles() {
                prop_assert!(tile.capture_progress >= Fixed::ZERO);
                prop_assert!(tile.capture_progress < Fixed::ONE);
            }
            for event in events {
                if let CaptureEvent::TileCaptured { tile, faction, .. } = event {
                    prop_assert_eq!(grid.owner_of(tile), Some(faction));
                }
            }
        }
    }

    #[test]
    fn test_contested_tile_never_flips(blue_count in 1usize..8, red_count in 1usize..8, ticks in 1usize..200) {
        let config = SimConfig::default();
        let archetypes = ArchetypeTable::default();
        let mut grid = TerritoryGrid::new(4, 4, config.tile_size);
        let contested = TileCoord::new(2, 2);
        let centre = grid.tile_center(contested);
        let mut store = EntityStore::new();
        for i in 0..blue_count {
            store.create_unit(&archetypes, UnitKind::Medic, centre + Vec2Fixed::from_ints(i as i32, 1), FactionId(0)).unwrap();
        }
        for i in 0..red_count {
            store.create_unit(&archetypes, UnitKind::Medic, centre + Vec2Fixed::from_ints(i as i32, -1), FactionId(1)).unwrap();
        }

        let dt = config.max_dt;
        for tick in 1..=ticks {
            let ctx = TickContext { config: &config, archetypes: &archetypes, dt, now: dt * Fixed::from_num(tick as i32) };
            capture_system(&ctx, &mut grid, &store);
            prop_assert_eq!(grid.owner_of(contested), None);
            prop_assert_eq!(grid.tile(contested).unwrap().capture_progress, Fixed::ZERO);
        }
    }

    #[test]
    fn test_remove_dead_is_idempotent(kills in proptest::collection::vec(any::<bool>(), 1..20)) {
        let archetypes = ArchetypeTable::default();
        let mut store = EntityStore::new();
        let mut ids = Vec::new();
        for (i, _) in kills.iter().enumerate() {
            let position = Vec2Fixed::from_ints(i as i32 * 3, 0);
            ids.push(store.create_unit(&archetypes, UnitKind::Rifleman, position, FactionId(0)).unwrap());
        }
        for (id, kill) in ids.iter().zip(&kills) {
            if *kill {
                store.unit_mut(*id).unwrap().health.kill();
            }
        }

        let first = store.remove_dead(&archetypes);
        prop_assert_eq!(first.units.len(), kills.iter().filter(|k| **k).count());
        let after_first = store.clone();
        let second = store.remove_dead(&archetypes);
        prop_assert!(second.is_empty());
        prop_assert_eq!(store, after_first);
    }

    #[test]
    fn test_ticks_preserve_invariants(
        dts in proptest::collection::vec(arb_dt(), 1..80),
        point in arb_position(),
        seed in 0u64..1000,
    ) {
        let mut sim = duel(seed);
        spawn_row(&mut sim, UnitKind::Sniper, FactionId(1), Vec2Fixed::from_ints(70, 100), 3);
        let blue: Vec<u64> = sim.store().units_of(FactionId(0)).map(|u| u.id).collect();
        sim.issue_move_order(&blue, point).unwrap();

        let mut last_tick = 0;
        for dt in dts {
            let events = sim.tick(dt);
            prop_assert_eq!(events.tick, last_tick + 1);
            last_tick = events.tick;
            prop_assert!(sim.validate_invariants().is_ok());
        }
        prop_assert!(sim.elapsed() <= sim.config().max_dt * Fixed::from_num(last_tick as i32));
    }
}
