//! Capture engine: turns unit presence on tiles into ownership over time.
//!
//! Each tick every tile looks at which factions have living capture-capable
//! units standing on it:
//!
//! - exactly one faction, not the owner, and either bordering the tile or the
//!   tile is neutral: progress advances, faster with more units;
//! - anything else: progress decays toward zero.
//!
//! A contested tile therefore never changes hands, however lopsided the
//! numbers are.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::EntityId;
use crate::entities::EntityStore;
use crate::factions::FactionId;
use crate::math::Fixed;
use crate::simulation::TickContext;
use crate::territory::{TerritoryGrid, TileCoord};

/// Ownership-related outcome of a capture pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureEvent {
    /// A faction began capturing a tile (progress restarted from zero).
    CaptureStarted {
        /// Tile being captured.
        tile: TileCoord,
        /// Capturing faction.
        faction: FactionId,
    },
    /// A tile changed owner.
    TileCaptured {
        /// Tile captured.
        tile: TileCoord,
        /// New owner.
        faction: FactionId,
        /// Previous owner, if any.
        previous_owner: Option<FactionId>,
        /// Resource sites on the tile, which now belong to the new owner.
        resource_sites: Vec<EntityId>,
    },
}

/// Count living capture-capable units per tile and faction.
#[must_use]
pub fn count_presence(
    ctx: &TickContext<'_>,
    grid: &TerritoryGrid,
    store: &EntityStore,
) -> BTreeMap<TileCoord, BTreeMap<FactionId, u32>> {
    let mut presence: BTreeMap<TileCoord, BTreeMap<FactionId, u32>> = BTreeMap::new();
    for unit in store.units().filter(|unit| unit.is_alive()) {
        let can_capture = ctx
            .archetypes
            .unit(unit.kind)
            .is_some_and(|archetype| archetype.can_capture());
        if !can_capture {
            continue;
        }
        if let Some(coord) = grid.tile_at(unit.position) {
            *presence.entry(coord).or_default().entry(unit.owner).or_insert(0) += 1;
        }
    }
    presence
}

/// Advance or decay capture on every tile.
pub fn capture_system(
    ctx: &TickContext<'_>,
    grid: &mut TerritoryGrid,
    store: &EntityStore,
) -> Vec<CaptureEvent> {
    let presence = count_presence(ctx, grid, store);
    let coords: Vec<TileCoord> = grid.tiles().map(|tile| tile.coord).collect();
    let mut events = Vec::new();

    for coord in coords {
        let sole = presence.get(&coord).and_then(|factions| {
            let mut present = factions.iter().filter(|(_, count)| **count > 0);
            match (present.next(), present.next()) {
                (Some((faction, count)), None) => Some((*faction, *count)),
                _ => None,
            }
        });

        let owner = grid.owner_of(coord);
        let advancing = sole.filter(|(faction, _)| {
            Some(*faction) != owner && (owner.is_none() || grid.is_adjacent_to_territory(coord, *faction))
        });

        let Some(tile) = grid.tile_mut(coord) else {
            continue;
        };

        match advancing {
            Some((faction, count)) => {
                if tile.capturing != Some(faction) {
                    tile.capturing = Some(faction);
                    tile.capture_progress = Fixed::ZERO;
                    events.push(CaptureEvent::CaptureStarted { tile: coord, faction });
                }
                let extra = Fixed::from_num(count.saturating_sub(1));
                let speed = Fixed::ONE + ctx.config.capture_unit_bonus * extra;
                tile.capture_progress += ctx.dt / ctx.config.capture_time * speed;

                if tile.capture_progress >= Fixed::ONE {
                    let previous_owner = tile.owner;
                    tile.owner = Some(faction);
                    tile.capture_progress = Fixed::ZERO;
                    tile.capturing = None;
                    let resource_sites: Vec<EntityId> = store.sites_on_tile(coord).map(|site| site.id).collect();
                    debug!(
                        tile = %coord,
                        %faction,
                        sites = resource_sites.len(),
                        "Tile captured"
                    );
                    events.push(CaptureEvent::TileCaptured {
                        tile: coord,
                        faction,
                        previous_owner,
                        resource_sites,
                    });
                }
            }
            None => {
                if tile.capture_progress > Fixed::ZERO {
                    tile.capture_progress =
                        (tile.capture_progress - ctx.config.capture_decay_rate * ctx.dt).max(Fixed::ZERO);
                }
                if tile.capture_progress == Fixed::ZERO {
                    tile.capturing = None;
                }
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetypes::{ArchetypeTable, UnitKind};
    use crate::config::SimConfig;
    use crate::math::{ratio, Vec2Fixed};

    struct Fixture {
        config: SimConfig,
        archetypes: ArchetypeTable,
        grid: TerritoryGrid,
        store: EntityStore,
    }

    impl Fixture {
        fn new() -> Self {
            let config = SimConfig::default();
            let grid = TerritoryGrid::new(4, 4, config.tile_size);
            Self {
                config,
                archetypes: ArchetypeTable::default(),
                grid,
                store: EntityStore::new(),
            }
        }

        fn spawn(&mut self, kind: UnitKind, tile: TileCoord, faction: FactionId) -> EntityId {
            let pos = self.grid.tile_center(tile);
            self.store.create_unit(&self.archetypes, kind, pos, faction).unwrap()
        }

        fn step(&mut self, dt: Fixed) -> Vec<CaptureEvent> {
            let ctx = TickContext {
                config: &self.config,
                archetypes: &self.archetypes,
                dt,
                now: Fixed::ZERO,
            };
            capture_system(&ctx, &mut self.grid, &self.store)
        }
    }

    #[test]
    fn test_single_unit_captures_neutral_tile() {
        let mut fx = Fixture::new();
        let tile = TileCoord::new(2, 2);
        fx.spawn(UnitKind::Rifleman, tile, FactionId(0));

        // 5s at 0.125s per tick is 40 ticks; allow one tick of rounding
        for _ in 0..39 {
            fx.step(ratio(1, 8));
        }
        assert_eq!(fx.grid.owner_of(tile), None);
        let mut events = fx.step(ratio(1, 8));
        events.extend(fx.step(ratio(1, 8)));
        assert_eq!(fx.grid.owner_of(tile), Some(FactionId(0)));
        assert!(events.iter().any(|e| matches!(e, CaptureEvent::TileCaptured { .. })));

        let tile = fx.grid.tile(tile).unwrap();
        assert_eq!(tile.capture_progress, Fixed::ZERO);
        assert_eq!(tile.capturing, None);
    }

    #[test]
    fn test_non_capturing_units_do_not_count() {
        let mut fx = Fixture::new();
        let tile = TileCoord::new(1, 1);
        fx.spawn(UnitKind::LightTank, tile, FactionId(0));
        for _ in 0..100 {
            fx.step(ratio(1, 10));
        }
        assert_eq!(fx.grid.owner_of(tile), None);
        assert_eq!(fx.grid.tile(tile).unwrap().capture_progress, Fixed::ZERO);
    }

    #[test]
    fn test_contested_tile_never_flips() {
        let mut fx = Fixture::new();
        let tile = TileCoord::new(1, 1);
        for _ in 0..6 {
            fx.spawn(UnitKind::Rifleman, tile, FactionId(0));
        }
        fx.spawn(UnitKind::Rifleman, tile, FactionId(1));

        for _ in 0..200 {
            fx.step(ratio(1, 10));
        }
        assert_eq!(fx.grid.owner_of(tile), None);
        assert_eq!(fx.grid.tile(tile).unwrap().capturing, None);
    }

    #[test]
    fn test_owned_tile_needs_adjacency() {
        let mut fx = Fixture::new();
        fx.grid.claim_starting_territory(TileCoord::new(0, 0), FactionId(1));
        let target = TileCoord::new(1, 0);
        fx.spawn(UnitKind::Rifleman, target, FactionId(0));

        for _ in 0..100 {
            fx.step(ratio(1, 10));
        }
        assert_eq!(fx.grid.owner_of(target), Some(FactionId(1)));

        // Give faction 0 a bordering tile and capture succeeds
        fx.grid.claim_starting_territory(TileCoord::new(2, 1), FactionId(0));
        assert!(fx.grid.is_adjacent_to_territory(target, FactionId(0)));
        for _ in 0..60 {
            fx.step(ratio(1, 10));
        }
        assert_eq!(fx.grid.owner_of(target), Some(FactionId(0)));
    }

    #[test]
    fn test_progress_decays_after_units_leave() {
        let mut fx = Fixture::new();
        let tile = TileCoord::new(3, 3);
        let unit = fx.spawn(UnitKind::Rifleman, tile, FactionId(0));
        for _ in 0..10 {
            fx.step(ratio(1, 10));
        }
        let progress = fx.grid.tile(tile).unwrap().capture_progress;
        assert!(progress > Fixed::ZERO);

        fx.store.unit_mut(unit).unwrap().position = Vec2Fixed::from_ints(5, 5);
        fx.step(ratio(1, 10));
        let decayed = fx.grid.tile(tile).unwrap().capture_progress;
        assert!(decayed < progress);

        for _ in 0..20 {
            fx.step(ratio(1, 10));
        }
        let tile = fx.grid.tile(tile).unwrap();
        assert_eq!(tile.capture_progress, Fixed::ZERO);
        assert_eq!(tile.capturing, None);
    }

    #[test]
    fn test_capture_reports_resource_sites() {
        let mut fx = Fixture::new();
        let tile = TileCoord::new(0, 3);
        let site = fx.store.create_resource_site(
            crate::economy::ResourceKind::Gold,
            Fixed::from_num(300),
            tile,
            fx.grid.tile_center(tile),
            Fixed::ONE,
        );
        fx.spawn(UnitKind::Rifleman, tile, FactionId(2));

        let mut captured = None;
        for _ in 0..60 {
            for event in fx.step(ratio(1, 10)) {
                if let CaptureEvent::TileCaptured { resource_sites, .. } = event {
                    captured = Some(resource_sites);
                }
            }
        }
        assert_eq!(captured, Some(vec![site]));
    }
}
