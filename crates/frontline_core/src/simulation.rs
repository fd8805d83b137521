//! Simulation clock: the fixed-order tick over the whole world.
//!
//! Each call to [`Simulation::tick`] runs five phases in this order:
//!
//! 1. **Economy** - passive income from owned resource sites, market repricing
//! 2. **Capture** - per-tile capture progress and ownership changes
//! 3. **Buildings** - production queues, defensive fire, hospital heals
//! 4. **Units** - retreat, movement, targeting, attacks, healing
//! 5. **Cleanup** - projectiles, dead-entity eviction, elimination check
//!
//! Every phase receives an explicit [`TickContext`] and only the parts of the
//! world it mutates. Nothing is global, so any number of simulations can run
//! side by side in one process.
//!
//! # Determinism
//!
//! - Fixed-point arithmetic only
//! - Entities stored in `BTreeMap`s and visited in ascending id order
//! - One seeded `ChaCha8Rng`, carried inside the snapshot
//!
//! # Example
//!
//! ```
//! use frontline_core::prelude::*;
//!
//! let mut sim = Simulation::generate(
//!     SimConfig::default(),
//!     ArchetypeTable::default(),
//!     &MapConfig::small().with_seed(7),
//! )
//! .unwrap();
//!
//! let events = sim.tick(Fixed::from_num(0.1));
//! assert_eq!(events.tick, 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::archetypes::{ArchetypeTable, BuildingKind, UnitKind};
use crate::capture::{capture_system, CaptureEvent};
use crate::combat::{
    building_combat_system, projectile_system, unit_system, DamageEvent, HealEvent, Projectile,
};
use crate::components::EntityId;
use crate::config::SimConfig;
use crate::economy::{amount, passive_income_system, upgrade_resource_site, Ledger, Ledgers, ResourceKind};
use crate::entities::{EntityStore, RemovalReport};
use crate::error::{CommandError, CommandResult, GameError, Result};
use crate::factions::FactionId;
use crate::map_generation::{generate_map, site_size, starts_are_spaced, MapConfig};
use crate::market::{market_system, Market, TradeReceipt};
use crate::math::{fixed_serde, ratio, Fixed, Vec2Fixed};
use crate::production::{self, production_system, ProductionEvent};
use crate::territory::{TerritoryGrid, TileCoord};

/// Riflemen handed to each faction at the start, around its headquarters.
const STARTING_RIFLEMEN: [(i32, i32); 5] = [
    (0, 3_500_000),
    (-3_328_700, 1_081_560),
    (-2_057_248, -2_831_560),
    (2_057_248, -2_831_560),
    (3_328_700, 1_081_560),
];

/// Everything a system needs to know about the current tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Tuning.
    pub config: &'a SimConfig,
    /// Capability table.
    pub archetypes: &'a ArchetypeTable,
    /// Seconds covered by this tick (already clamped).
    pub dt: Fixed,
    /// Simulation time at the end of this tick.
    pub now: Fixed,
}

impl<'a> TickContext<'a> {
    /// Bundle the tick inputs.
    #[must_use]
    pub const fn new(config: &'a SimConfig, archetypes: &'a ArchetypeTable, dt: Fixed, now: Fixed) -> Self {
        Self {
            config,
            archetypes,
            dt,
            now,
        }
    }
}

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// One faction still holds a core structure.
    Victory {
        /// Surviving faction.
        winner: FactionId,
    },
    /// Every faction lost its core structures.
    Draw,
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Tick number after this update.
    pub tick: u64,
    /// Events produced by orders issued since the previous tick.
    pub orders: Vec<ProductionEvent>,
    /// Capture starts and tile ownership changes.
    pub captures: Vec<CaptureEvent>,
    /// Completed units.
    pub production: Vec<ProductionEvent>,
    /// Hits landed by buildings and units.
    pub damage: Vec<DamageEvent>,
    /// Heals applied.
    pub heals: Vec<HealEvent>,
    /// Entities evicted in cleanup.
    pub removed: RemovalReport,
    /// Factions that lost their last core structure this tick.
    pub eliminated: Vec<FactionId>,
    /// Set on the tick the match is decided.
    pub outcome: Option<MatchOutcome>,
    /// Whether market prices moved.
    pub market_updated: bool,
}

/// The complete mutable world, serializable as one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Ticks run so far.
    pub tick: u64,
    /// Simulated seconds so far.
    #[serde(with = "fixed_serde")]
    pub elapsed: Fixed,
    /// Participating factions in join order.
    pub factions: Vec<FactionId>,
    /// Factions without a core structure.
    pub eliminated: Vec<FactionId>,
    /// Units, buildings and resource sites.
    pub store: EntityStore,
    /// Territory.
    pub grid: TerritoryGrid,
    /// Per-faction balances.
    pub ledgers: Ledgers,
    /// Resource exchange.
    pub market: Market,
    /// Cosmetic projectiles in flight.
    pub projectiles: VecDeque<Projectile>,
    /// Simulation RNG.
    pub rng: ChaCha8Rng,
    /// Decided result, if any.
    pub outcome: Option<MatchOutcome>,
}

impl WorldSnapshot {
    fn empty(width: u16, height: u16, tile_size: Fixed, seed: u64) -> Self {
        Self {
            tick: 0,
            elapsed: Fixed::ZERO,
            factions: Vec::new(),
            eliminated: Vec::new(),
            store: EntityStore::new(),
            grid: TerritoryGrid::new(width, height, tile_size),
            ledgers: Ledgers::new(),
            market: Market::new(),
            projectiles: VecDeque::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            outcome: None,
        }
    }
}

/// The simulation: configuration, capability table and world state.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimConfig,
    archetypes: ArchetypeTable,
    world: WorldSnapshot,
    pending: Vec<ProductionEvent>,
}

impl Simulation {
    /// Create an empty world: a grid of unowned tiles and no factions.
    pub fn new(config: SimConfig, archetypes: ArchetypeTable, width: u16, height: u16, seed: u64) -> Result<Self> {
        config.validate()?;
        archetypes.validate()?;
        if width == 0 || height == 0 {
            return Err(GameError::InvalidConfig(format!("map must not be empty ({width}x{height})")));
        }
        let world = WorldSnapshot::empty(width, height, config.tile_size, seed);
        Ok(Self {
            config,
            archetypes,
            world,
            pending: Vec::new(),
        })
    }

    /// Generate a map and set every faction up on its start tile.
    pub fn generate(config: SimConfig, archetypes: ArchetypeTable, map: &MapConfig) -> Result<Self> {
        if map.factions == 0 {
            return Err(GameError::InvalidConfig("a match needs at least one faction".into()));
        }
        let (width, height) = map.size.dimensions();
        let mut sim = Self::new(config, archetypes, width, height, map.seed)?;

        let generated = generate_map(map, sim.config.tile_size, &mut sim.world.rng);
        if generated.start_tiles.len() != usize::from(map.factions) || !starts_are_spaced(&generated.start_tiles) {
            return Err(GameError::InvalidConfig(format!(
                "{} factions do not fit on a {}×{} map",
                map.factions, width, height
            )));
        }
        for site in &generated.sites {
            sim.world
                .store
                .create_resource_site(site.resource, site.base_rate, site.tile, site.position, site.size);
        }
        for (index, tile) in generated.start_tiles.iter().enumerate() {
            let faction = FactionId::new(index as u8);
            sim.setup_faction(faction, *tile)?;
        }
        info!(
            factions = map.factions,
            sites = generated.sites.len(),
            seed = map.seed,
            "Match generated"
        );
        Ok(sim)
    }

    /// Rebuild a simulation around a saved world.
    pub fn from_snapshot(config: SimConfig, archetypes: ArchetypeTable, snapshot: WorldSnapshot) -> Result<Self> {
        let (width, height) = (snapshot.grid.width(), snapshot.grid.height());
        let mut sim = Self::new(config, archetypes, width.max(1) as u16, height.max(1) as u16, 0)?;
        sim.apply_snapshot(snapshot)?;
        Ok(sim)
    }

    /// Register a faction with a fresh ledger. Does nothing if already present.
    pub fn add_faction(&mut self, faction: FactionId) {
        if self.world.factions.contains(&faction) {
            return;
        }
        self.world.factions.push(faction);
        self.world
            .ledgers
            .open(faction, amount(self.config.starting_dollars));
    }

    /// Give a faction its starting territory, headquarters, barracks and riflemen.
    ///
    /// Returns the headquarters id.
    pub fn setup_faction(&mut self, faction: FactionId, tile: TileCoord) -> Result<EntityId> {
        if !self.world.grid.in_bounds(tile) {
            return Err(GameError::InvalidConfig(format!("start tile {tile} is off the map")));
        }
        self.add_faction(faction);
        self.world.grid.claim_starting_territory(tile, faction);

        let centre = self.world.grid.tile_center(tile);
        let capacity = self.config.queue_capacity;
        let store = &mut self.world.store;
        let hq = store.create_building(&self.archetypes, BuildingKind::Headquarters, centre, faction, capacity)?;
        let barracks_at = centre + Vec2Fixed::from_ints(4, 0);
        store.create_building(&self.archetypes, BuildingKind::Barracks, barracks_at, faction, capacity)?;
        for (dx, dy) in STARTING_RIFLEMEN {
            let offset = Vec2Fixed::new(ratio(dx, 1_000_000), ratio(dy, 1_000_000));
            store.create_unit(&self.archetypes, UnitKind::Rifleman, centre + offset, faction)?;
        }
        debug!(%faction, %tile, "Faction set up");
        Ok(hq)
    }

    /// Place a unit directly, free of charge. Used by scenarios and tests.
    pub fn spawn_unit(&mut self, kind: UnitKind, position: Vec2Fixed, owner: FactionId) -> Result<EntityId> {
        let position = self.world.grid.clamp_to_bounds(position);
        self.world.store.create_unit(&self.archetypes, kind, position, owner)
    }

    /// Place a building directly, skipping cost and placement rules.
    pub fn spawn_building(&mut self, kind: BuildingKind, position: Vec2Fixed, owner: FactionId) -> Result<EntityId> {
        self.world
            .store
            .create_building(&self.archetypes, kind, position, owner, self.config.queue_capacity)
    }

    /// Add a resource site at the centre of `tile`.
    pub fn spawn_resource_site(&mut self, resource: ResourceKind, base_rate: Fixed, tile: TileCoord) -> Result<EntityId> {
        if !self.world.grid.in_bounds(tile) {
            return Err(GameError::InvalidConfig(format!("resource site tile {tile} is off the map")));
        }
        let position = self.world.grid.tile_center(tile);
        Ok(self
            .world
            .store
            .create_resource_site(resource, base_rate, tile, position, site_size(base_rate)))
    }

    /// Hand a tile to `faction` outright, clearing any capture in progress.
    pub fn claim_tile(&mut self, tile: TileCoord, faction: Option<FactionId>) -> Result<()> {
        let Some(slot) = self.world.grid.tile_mut(tile) else {
            return Err(GameError::InvalidConfig(format!("tile {tile} is off the map")));
        };
        slot.owner = faction;
        slot.capture_progress = Fixed::ZERO;
        slot.capturing = None;
        Ok(())
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Tuning in use.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Capability table in use.
    #[must_use]
    pub fn archetypes(&self) -> &ArchetypeTable {
        &self.archetypes
    }

    /// Units, buildings and resource sites.
    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.world.store
    }

    /// Territory.
    #[must_use]
    pub fn grid(&self) -> &TerritoryGrid {
        &self.world.grid
    }

    /// Ledger of one faction.
    #[must_use]
    pub fn ledger(&self, faction: FactionId) -> Option<&Ledger> {
        self.world.ledgers.get(faction)
    }

    /// All ledgers.
    #[must_use]
    pub fn ledgers(&self) -> &Ledgers {
        &self.world.ledgers
    }

    /// Resource exchange.
    #[must_use]
    pub fn market(&self) -> &Market {
        &self.world.market
    }

    /// Projectiles in flight, oldest first.
    #[must_use]
    pub fn projectiles(&self) -> &VecDeque<Projectile> {
        &self.world.projectiles
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.world.tick
    }

    /// Simulated seconds so far.
    #[must_use]
    pub const fn elapsed(&self) -> Fixed {
        self.world.elapsed
    }

    /// Decided result, if any.
    #[must_use]
    pub const fn outcome(&self) -> Option<MatchOutcome> {
        self.world.outcome
    }

    /// Participating factions.
    #[must_use]
    pub fn factions(&self) -> &[FactionId] {
        &self.world.factions
    }

    /// Whether `faction` has lost its last core structure.
    #[must_use]
    pub fn is_eliminated(&self, faction: FactionId) -> bool {
        self.world.eliminated.contains(&faction)
    }

    /// The simulation RNG, for seeded decisions made outside the tick.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.world.rng
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the world by `dt` seconds, clamped to `[0, max_dt]`.
    pub fn tick(&mut self, dt: Fixed) -> TickEvents {
        let dt = dt.clamp(Fixed::ZERO, self.config.max_dt);
        let now = self.world.elapsed + dt;
        let ctx = TickContext::new(&self.config, &self.archetypes, dt, now);
        let world = &mut self.world;

        let mut events = TickEvents {
            orders: std::mem::take(&mut self.pending),
            ..TickEvents::default()
        };

        // 1. Economy
        passive_income_system(&ctx, &world.grid, &world.store, &mut world.ledgers);
        events.market_updated = market_system(&ctx, &mut world.market);

        // 2. Capture
        events.captures = capture_system(&ctx, &mut world.grid, &world.store);

        // 3. Buildings
        events.production = production_system(&ctx, &mut world.store, &world.grid, &mut world.rng);
        let mut combat = building_combat_system(&ctx, &mut world.store, &mut world.projectiles);

        // 4. Units
        combat.merge(unit_system(&ctx, &mut world.store, &world.grid, &mut world.projectiles));
        events.damage = combat.damage;
        events.heals = combat.heals;

        // 5. Cleanup
        projectile_system(&ctx, &world.store, &mut world.projectiles);
        events.removed = world.store.remove_dead(ctx.archetypes);
        for (faction, building) in &events.removed.core_losses {
            if world.eliminated.contains(faction) || world.store.has_core_structure(ctx.archetypes, *faction) {
                continue;
            }
            info!(%faction, building, "Faction eliminated");
            world.eliminated.push(*faction);
            events.eliminated.push(*faction);
        }
        if world.outcome.is_none() && !events.eliminated.is_empty() {
            let mut survivors = world.factions.iter().filter(|f| !world.eliminated.contains(f));
            world.outcome = match (survivors.next(), survivors.next()) {
                (None, _) => Some(MatchOutcome::Draw),
                (Some(winner), None) => Some(MatchOutcome::Victory { winner: *winner }),
                _ => None,
            };
            if let Some(outcome) = world.outcome {
                info!(?outcome, tick = world.tick + 1, "Match decided");
                events.outcome = Some(outcome);
            }
        }

        world.tick += 1;
        world.elapsed = now;
        events.tick = world.tick;

        trace!(tick = self.world.tick, state_hash = self.state_hash(), "Tick complete");

        #[cfg(feature = "debug-validation")]
        if let Err(err) = self.validate_invariants() {
            tracing::error!(tick = self.world.tick, %err, "Invariant violated");
            debug_assert!(false, "invariant violated: {err}");
        }

        events
    }

    fn order_context(&self) -> TickContext<'_> {
        TickContext::new(&self.config, &self.archetypes, Fixed::ZERO, self.world.elapsed)
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Move units to `point`, spread in a square formation around it.
    ///
    /// Dead and unknown ids are skipped. Returns how many units were ordered.
    pub fn issue_move_order(&mut self, units: &[EntityId], point: Vec2Fixed) -> CommandResult<usize> {
        let living: Vec<EntityId> = units
            .iter()
            .copied()
            .filter(|id| self.world.store.living_unit(*id).is_some())
            .collect();
        if living.is_empty() {
            return Err(CommandError::NoValidUnits);
        }

        let offsets = formation_offsets(living.len(), self.config.formation_spacing);
        for (id, offset) in living.iter().zip(offsets) {
            let destination = self.world.grid.clamp_to_bounds(point + offset);
            if let Some(unit) = self.world.store.unit_mut(*id) {
                unit.order_move(destination);
            }
        }
        Ok(living.len())
    }

    /// Order units to attack `target`.
    ///
    /// A dead, unknown or friendly target is rejected and any stale reference
    /// to it held by these units is cleared.
    pub fn issue_attack_order(&mut self, units: &[EntityId], target: EntityId) -> CommandResult<usize> {
        let living: Vec<EntityId> = units
            .iter()
            .copied()
            .filter(|id| self.world.store.living_unit(*id).is_some())
            .collect();

        let info = self.world.store.target_info(target);
        let friendly = info.is_some_and(|info| {
            living
                .iter()
                .filter_map(|id| self.world.store.unit(*id))
                .any(|unit| unit.owner == info.owner)
        });
        if info.is_none() || friendly {
            for id in &living {
                if let Some(unit) = self.world.store.unit_mut(*id) {
                    if unit.attack_target == Some(target) {
                        unit.clear_target();
                    }
                }
            }
            return Err(CommandError::TargetInvalid);
        }
        if living.is_empty() {
            return Err(CommandError::NoValidUnits);
        }

        for id in &living {
            if let Some(unit) = self.world.store.unit_mut(*id) {
                unit.order_attack(target);
            }
        }
        Ok(living.len())
    }

    /// Drop every order of the given units.
    pub fn issue_stop_order(&mut self, units: &[EntityId]) -> CommandResult<usize> {
        let mut stopped = 0;
        for id in units {
            if let Some(unit) = self.world.store.unit_mut(*id).filter(|u| u.is_alive()) {
                unit.stop();
                stopped += 1;
            }
        }
        if stopped == 0 {
            return Err(CommandError::NoValidUnits);
        }
        Ok(stopped)
    }

    /// Construct a building for `owner` centred at `point`.
    pub fn place_building(&mut self, kind: BuildingKind, point: Vec2Fixed, owner: FactionId) -> CommandResult<EntityId> {
        let ctx = TickContext::new(&self.config, &self.archetypes, Fixed::ZERO, self.world.elapsed);
        let world = &mut self.world;
        let id = production::place_building(&ctx, &mut world.store, &world.grid, &mut world.ledgers, kind, point, owner)?;
        self.pending.push(ProductionEvent::BuildingPlaced {
            building: id,
            kind,
            owner,
        });
        Ok(id)
    }

    /// Check a placement without paying for it.
    pub fn check_placement(&self, kind: BuildingKind, point: Vec2Fixed, owner: FactionId) -> CommandResult<()> {
        production::check_placement(&self.order_context(), &self.world.store, &self.world.grid, kind, point, owner)
    }

    /// Queue a unit at a building.
    ///
    /// A faction holding no territory cannot produce.
    pub fn queue_unit(&mut self, building: EntityId, kind: UnitKind) -> CommandResult<()> {
        let owner = self
            .world
            .store
            .living_building(building)
            .map(|b| b.owner)
            .ok_or(CommandError::UnknownEntity(building))?;
        if self.world.grid.territory_count(owner) == 0 {
            return Err(CommandError::NotProducible);
        }
        let ctx = TickContext::new(&self.config, &self.archetypes, Fixed::ZERO, self.world.elapsed);
        let event = production::queue_unit(&ctx, &mut self.world.store, &mut self.world.ledgers, building, kind)?;
        self.pending.push(event);
        Ok(())
    }

    /// Cancel the queue item at `index`.
    pub fn cancel_production(&mut self, building: EntityId, index: usize) -> CommandResult<()> {
        let ctx = TickContext::new(&self.config, &self.archetypes, Fixed::ZERO, self.world.elapsed);
        let event =
            production::cancel_production(&ctx, &mut self.world.store, &mut self.world.ledgers, building, index)?;
        self.pending.push(event);
        Ok(())
    }

    /// Set where a building's new units gather.
    pub fn set_rally_point(&mut self, building: EntityId, point: Vec2Fixed) -> CommandResult<()> {
        production::set_rally_point(&mut self.world.store, &self.world.grid, building, point)
    }

    /// Sell a building for part of its cost.
    pub fn sell_building(&mut self, building: EntityId) -> CommandResult<()> {
        let ctx = TickContext::new(&self.config, &self.archetypes, Fixed::ZERO, self.world.elapsed);
        let event = production::sell_building(&ctx, &mut self.world.store, &mut self.world.ledgers, building)?;
        self.pending.push(event);
        Ok(())
    }

    /// Raise a defensive building one level. Returns the new level.
    pub fn upgrade_building(&mut self, building: EntityId) -> CommandResult<u8> {
        let ctx = TickContext::new(&self.config, &self.archetypes, Fixed::ZERO, self.world.elapsed);
        let event = production::upgrade_building(&ctx, &mut self.world.store, &mut self.world.ledgers, building)?;
        let level = match event {
            ProductionEvent::BuildingUpgraded { level, .. } => level,
            _ => 0,
        };
        self.pending.push(event);
        Ok(level)
    }

    /// Raise a resource site owned by `faction` one level. Returns the new level.
    pub fn upgrade_resource_site(&mut self, site: EntityId, faction: FactionId) -> CommandResult<u8> {
        let ctx = TickContext::new(&self.config, &self.archetypes, Fixed::ZERO, self.world.elapsed);
        let world = &mut self.world;
        upgrade_resource_site(&ctx, &world.grid, &mut world.store, &mut world.ledgers, site, faction)
    }

    /// Sell resources on the market.
    pub fn sell_resource(&mut self, faction: FactionId, kind: ResourceKind, amount: Fixed) -> CommandResult<TradeReceipt> {
        let ledger = self
            .world
            .ledgers
            .get_mut(faction)
            .ok_or(CommandError::InsufficientFunds)?;
        self.world.market.sell_resource(&self.config.market, ledger, kind, amount)
    }

    /// Buy resources on the market.
    pub fn buy_resource(&mut self, faction: FactionId, kind: ResourceKind, amount: Fixed) -> CommandResult<TradeReceipt> {
        let ledger = self
            .world
            .ledgers
            .get_mut(faction)
            .ok_or(CommandError::InsufficientFunds)?;
        self.world.market.buy_resource(&self.config.market, ledger, kind, amount)
    }

    // ========================================================================
    // Persistence and checks
    // ========================================================================

    /// Copy of the whole world.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        self.world.clone()
    }

    /// Replace the world with a saved one.
    ///
    /// Rejected (and the current world kept) if the snapshot's tile size does
    /// not match the configuration or it breaks an invariant.
    pub fn apply_snapshot(&mut self, snapshot: WorldSnapshot) -> Result<()> {
        if snapshot.grid.tile_size() != self.config.tile_size {
            warn!(
                snapshot = %snapshot.grid.tile_size(),
                config = %self.config.tile_size,
                "Rejected snapshot with mismatched tile size"
            );
            return Err(GameError::InvalidState("snapshot tile size does not match configuration".into()));
        }
        let previous = std::mem::replace(&mut self.world, snapshot);
        if let Err(err) = self.validate_invariants() {
            warn!(%err, "Rejected snapshot");
            self.world = previous;
            return Err(err);
        }
        self.pending.clear();
        Ok(())
    }

    /// Encode the world with bincode.
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.world)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize snapshot: {e}")))
    }

    /// Decode and apply a bincode-encoded world.
    pub fn restore_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let snapshot: WorldSnapshot = bincode::deserialize(bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize snapshot: {e}")))?;
        self.apply_snapshot(snapshot)
    }

    /// Hash of the world, for desync detection.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        let world = &self.world;
        world.tick.hash(&mut hasher);
        world.elapsed.hash(&mut hasher);
        world.factions.hash(&mut hasher);
        world.eliminated.hash(&mut hasher);
        world.store.hash(&mut hasher);
        world.grid.hash(&mut hasher);
        world.ledgers.hash(&mut hasher);
        world.market.hash(&mut hasher);
        world.projectiles.hash(&mut hasher);
        world.outcome.hash(&mut hasher);
        hasher.finish()
    }

    /// Compare against a hash computed by another replica.
    pub fn verify_hash(&self, remote_hash: u64) -> Result<()> {
        let local_hash = self.state_hash();
        if local_hash != remote_hash {
            return Err(GameError::DesyncDetected {
                tick: self.world.tick,
                local_hash,
                remote_hash,
            });
        }
        Ok(())
    }

    /// Check every world invariant, reporting the first violation.
    pub fn validate_invariants(&self) -> Result<()> {
        let world = &self.world;
        let broken = |message: String| Err(GameError::InvalidState(message));

        for unit in world.store.units() {
            if unit.health.current < Fixed::ZERO || unit.health.current > unit.health.max {
                return broken(format!("unit {} hp {} outside [0, {}]", unit.id, unit.health.current, unit.health.max));
            }
            if unit.id >= world.store.next_id() {
                return broken(format!("unit {} at or above the id counter", unit.id));
            }
        }
        for building in world.store.buildings() {
            let health = building.health;
            if health.current < Fixed::ZERO || health.current > health.max {
                return broken(format!("building {} hp {} outside [0, {}]", building.id, health.current, health.max));
            }
            if building.queue.len() > building.queue.capacity() {
                return broken(format!("building {} queue over capacity", building.id));
            }
            if building.id >= world.store.next_id() {
                return broken(format!("building {} at or above the id counter", building.id));
            }
        }
        for site in world.store.resource_sites() {
            if site.level == 0 || site.level > self.config.resource_max_level {
                return broken(format!("site {} level {} out of range", site.id, site.level));
            }
        }
        for tile in world.grid.tiles() {
            if tile.capture_progress < Fixed::ZERO || tile.capture_progress > Fixed::ONE {
                return broken(format!("tile {} progress {} outside [0, 1]", tile.coord, tile.capture_progress));
            }
        }
        for (faction, ledger) in world.ledgers.iter() {
            if ledger.is_overdrawn() {
                return broken(format!("{faction} ledger is overdrawn"));
            }
        }
        if world.projectiles.len() > self.config.max_projectiles {
            return broken(format!("{} projectiles exceed the cap", world.projectiles.len()));
        }
        Ok(())
    }
}

/// Offsets of a square formation of `count` slots centred on the origin.
fn formation_offsets(count: usize, spacing: Fixed) -> Vec<Vec2Fixed> {
    let mut columns = 1;
    while columns * columns < count {
        columns += 1;
    }
    let rows = count.div_ceil(columns);
    let centred = |index: usize, span: usize| Fixed::from_num(2 * index as i32 - (span as i32 - 1)) * spacing / 2;
    (0..count)
        .map(|i| Vec2Fixed::new(centred(i % columns, columns), centred(i / columns, rows)))
        .collect()
}
