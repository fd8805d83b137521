//! Production scheduler: unit queues, spawning and building placement.
//!
//! Each building owns a FIFO [`ProductionQueue`]. Costs are paid when an item
//! is queued; the head item accumulates elapsed time and spawns when it
//! reaches its archetype's build time. At most one unit completes per
//! building per tick.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::archetypes::{BuildingKind, UnitKind};
use crate::components::{footprints_overlap, EntityId};
use crate::economy::{Cost, Ledgers};
use crate::entities::EntityStore;
use crate::error::{CommandError, CommandResult, PlacementIssue};
use crate::factions::FactionId;
use crate::math::{fixed_serde, ratio, Fixed, Vec2Fixed};
use crate::simulation::TickContext;
use crate::territory::TerritoryGrid;

// ============================================================================
// Queue
// ============================================================================

/// Per-building production queue.
///
/// The front item is the one in production; `progress` is the time it has
/// accumulated so far.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductionQueue {
    items: VecDeque<UnitKind>,
    #[serde(with = "fixed_serde")]
    progress: Fixed,
    capacity: usize,
}

impl Default for ProductionQueue {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl ProductionQueue {
    /// Default maximum queue length.
    pub const DEFAULT_CAPACITY: usize = 5;

    /// Create an empty queue.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            progress: Fixed::ZERO,
            capacity,
        }
    }

    /// Maximum queue length.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Seconds accumulated on the head item.
    #[must_use]
    pub const fn progress(&self) -> Fixed {
        self.progress
    }

    /// Check if the queue is full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// The item in production.
    #[must_use]
    pub fn current(&self) -> Option<UnitKind> {
        self.items.front().copied()
    }

    /// Queued items, head first.
    pub fn items(&self) -> impl Iterator<Item = UnitKind> + '_ {
        self.items.iter().copied()
    }

    /// Append an item.
    pub fn push(&mut self, kind: UnitKind) -> CommandResult<()> {
        if self.is_full() {
            return Err(CommandError::QueueFull);
        }
        self.items.push_back(kind);
        Ok(())
    }

    /// Remove the item at `index`. Removing the head resets progress.
    pub fn remove(&mut self, index: usize) -> Option<UnitKind> {
        let removed = self.items.remove(index)?;
        if index == 0 {
            self.progress = Fixed::ZERO;
        }
        Some(removed)
    }

    /// Add elapsed time and pop the head once it reaches `build_time`.
    ///
    /// Progress resets to zero whenever an item is popped.
    pub fn advance(&mut self, dt: Fixed, build_time: Fixed) -> Option<UnitKind> {
        if self.items.is_empty() {
            self.progress = Fixed::ZERO;
            return None;
        }
        self.progress += dt;
        if self.progress >= build_time {
            self.progress = Fixed::ZERO;
            return self.items.pop_front();
        }
        None
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.progress = Fixed::ZERO;
    }
}

// ============================================================================
// Events
// ============================================================================

/// Events generated by production and construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionEvent {
    /// A unit was added to a queue and paid for.
    UnitQueued {
        /// Producing building.
        building: EntityId,
        /// Queued unit kind.
        unit_kind: UnitKind,
    },
    /// A unit finished and spawned.
    UnitCompleted {
        /// Producing building.
        building: EntityId,
        /// New unit.
        unit: EntityId,
        /// Unit kind.
        unit_kind: UnitKind,
        /// Spawn position.
        position: Vec2Fixed,
    },
    /// A queued unit was cancelled.
    ProductionCancelled {
        /// Producing building.
        building: EntityId,
        /// Cancelled unit kind.
        unit_kind: UnitKind,
        /// Dollars refunded.
        refund: u32,
    },
    /// A building was placed.
    BuildingPlaced {
        /// New building.
        building: EntityId,
        /// Building kind.
        kind: BuildingKind,
        /// Owner.
        owner: FactionId,
    },
    /// A building was sold.
    BuildingSold {
        /// Sold building.
        building: EntityId,
        /// Dollars refunded.
        refund: u32,
    },
    /// A building reached a new level.
    BuildingUpgraded {
        /// Upgraded building.
        building: EntityId,
        /// New level.
        level: u8,
    },
}

// ============================================================================
// Orders
// ============================================================================

fn percent_of(dollars: u32, percent: u32) -> u32 {
    (u64::from(dollars) * u64::from(percent) / 100) as u32
}

/// Queue a unit at a building, paying its cost now.
///
/// Checks, in order: the building exists and is alive, it can produce `kind`,
/// the queue has room, the owner can pay.
pub fn queue_unit(
    ctx: &TickContext<'_>,
    store: &mut EntityStore,
    ledgers: &mut Ledgers,
    building_id: EntityId,
    kind: UnitKind,
) -> CommandResult<ProductionEvent> {
    let building = store
        .buildings
        .get_mut(&building_id)
        .filter(|b| b.is_alive())
        .ok_or(CommandError::UnknownEntity(building_id))?;
    let producible = ctx
        .archetypes
        .building(building.kind)
        .is_some_and(|archetype| archetype.can_produce(kind));
    let cost = ctx
        .archetypes
        .unit(kind)
        .filter(|_| producible)
        .map(|archetype| &archetype.cost)
        .ok_or(CommandError::NotProducible)?;
    if building.queue.is_full() {
        return Err(CommandError::QueueFull);
    }
    ledgers.try_spend(building.owner, cost)?;
    building.queue.push(kind)?;
    debug!(building = building_id, unit = kind.id(), "Unit queued");
    Ok(ProductionEvent::UnitQueued {
        building: building_id,
        unit_kind: kind,
    })
}

/// Cancel the queue item at `index`, refunding part of its cost.
pub fn cancel_production(
    ctx: &TickContext<'_>,
    store: &mut EntityStore,
    ledgers: &mut Ledgers,
    building_id: EntityId,
    index: usize,
) -> CommandResult<ProductionEvent> {
    let building = store
        .buildings
        .get_mut(&building_id)
        .filter(|b| b.is_alive())
        .ok_or(CommandError::UnknownEntity(building_id))?;
    let kind = building
        .queue
        .remove(index)
        .ok_or(CommandError::NoSuchQueueItem(index))?;
    let percent = ctx.config.cancel_refund_percent;
    let mut refund = 0;
    if let Some(archetype) = ctx.archetypes.unit(kind) {
        if let Some(ledger) = ledgers.get_mut(building.owner) {
            ledger.refund(&archetype.cost, percent);
        }
        refund = percent_of(archetype.cost.dollars, percent);
    }
    Ok(ProductionEvent::ProductionCancelled {
        building: building_id,
        unit_kind: kind,
        refund,
    })
}

/// Set where a building's new units head.
pub fn set_rally_point(
    store: &mut EntityStore,
    grid: &TerritoryGrid,
    building_id: EntityId,
    point: Vec2Fixed,
) -> CommandResult<()> {
    let building = store
        .buildings
        .get_mut(&building_id)
        .filter(|b| b.is_alive())
        .ok_or(CommandError::UnknownEntity(building_id))?;
    building.rally_point = Some(grid.clamp_to_bounds(point));
    Ok(())
}

/// Check whether `owner` may place `kind` centred at `point`.
pub fn check_placement(
    ctx: &TickContext<'_>,
    store: &EntityStore,
    grid: &TerritoryGrid,
    kind: BuildingKind,
    point: Vec2Fixed,
    owner: FactionId,
) -> CommandResult<()> {
    let archetype = ctx
        .archetypes
        .building(kind)
        .filter(|archetype| archetype.is_buildable())
        .ok_or(CommandError::NotBuildable)?;

    let tile = grid
        .tile_at(point)
        .ok_or(CommandError::InvalidPlacement(PlacementIssue::OutOfBounds))?;
    if grid.owner_of(tile) != Some(owner) {
        return Err(CommandError::InvalidPlacement(PlacementIssue::NotOwnedTerritory));
    }
    if !grid.footprint_in_bounds(point, archetype.size) {
        return Err(CommandError::InvalidPlacement(PlacementIssue::OutOfBounds));
    }
    if store
        .buildings()
        .any(|b| b.is_alive() && b.overlaps(point, archetype.size))
    {
        return Err(CommandError::InvalidPlacement(PlacementIssue::OverlapsStructure));
    }
    if store
        .resource_sites()
        .any(|site| footprints_overlap(site.position, site.size, point, archetype.size))
    {
        return Err(CommandError::InvalidPlacement(PlacementIssue::OverlapsResourceSite));
    }
    Ok(())
}

/// Place a building, paying its cost.
pub fn place_building(
    ctx: &TickContext<'_>,
    store: &mut EntityStore,
    grid: &TerritoryGrid,
    ledgers: &mut Ledgers,
    kind: BuildingKind,
    point: Vec2Fixed,
    owner: FactionId,
) -> CommandResult<EntityId> {
    check_placement(ctx, store, grid, kind, point, owner)?;
    let cost = ctx
        .archetypes
        .building(kind)
        .map(|archetype| archetype.cost.clone())
        .ok_or(CommandError::NotBuildable)?;
    if !ledgers.can_afford(owner, &cost) {
        return Err(CommandError::InsufficientFunds);
    }
    let id = store
        .create_building(ctx.archetypes, kind, point, owner, ctx.config.queue_capacity)
        .map_err(|_| CommandError::NotBuildable)?;
    ledgers.try_spend(owner, &cost)?;
    debug!(building = id, kind = kind.id(), %owner, "Building placed");
    Ok(id)
}

/// Sell a building: refund part of its cost and mark it dead.
///
/// The building is evicted in the cleanup phase. Core structures cannot be
/// sold.
pub fn sell_building(
    ctx: &TickContext<'_>,
    store: &mut EntityStore,
    ledgers: &mut Ledgers,
    building_id: EntityId,
) -> CommandResult<ProductionEvent> {
    let building = store
        .buildings
        .get_mut(&building_id)
        .filter(|b| b.is_alive())
        .ok_or(CommandError::UnknownEntity(building_id))?;
    let archetype = ctx
        .archetypes
        .building(building.kind)
        .ok_or(CommandError::NotSellable)?;
    if archetype.is_core() {
        return Err(CommandError::NotSellable);
    }
    let percent = ctx.config.sell_refund_percent;
    if let Some(ledger) = ledgers.get_mut(building.owner) {
        ledger.refund(&archetype.cost, percent);
    }
    building.health.kill();
    building.queue.clear();
    debug!(building = building_id, "Building sold");
    Ok(ProductionEvent::BuildingSold {
        building: building_id,
        refund: percent_of(archetype.cost.dollars, percent),
    })
}

/// Raise an upgradable building one level.
///
/// Costs `cost_per_level * current_level` dollars. Buildings without an
/// upgrade profile are treated as already at their maximum level.
pub fn upgrade_building(
    ctx: &TickContext<'_>,
    store: &mut EntityStore,
    ledgers: &mut Ledgers,
    building_id: EntityId,
) -> CommandResult<ProductionEvent> {
    let building = store
        .buildings
        .get_mut(&building_id)
        .filter(|b| b.is_alive())
        .ok_or(CommandError::UnknownEntity(building_id))?;
    let archetype = ctx
        .archetypes
        .building(building.kind)
        .ok_or(CommandError::MaxLevel)?;
    let upgrade = archetype.upgrade.as_ref().ok_or(CommandError::MaxLevel)?;
    if building.level >= upgrade.max_level {
        return Err(CommandError::MaxLevel);
    }
    let cost = Cost::dollars(upgrade.cost_per_level.saturating_mul(u32::from(building.level)));
    ledgers.try_spend(building.owner, &cost)?;
    building.level += 1;
    building.health.raise_max(archetype.max_hp_at_level(building.level));
    debug!(building = building_id, level = building.level, "Building upgraded");
    Ok(ProductionEvent::BuildingUpgraded {
        building: building_id,
        level: building.level,
    })
}

// ============================================================================
// System
// ============================================================================

/// Random point on the square ring around a footprint.
///
/// The ring sits `margin` outside the footprint edge.
pub fn spawn_point<R: Rng>(rng: &mut R, centre: Vec2Fixed, size: Fixed, margin: Fixed) -> Vec2Fixed {
    let half = size / 2 + margin;
    let along = half * ratio(rng.gen_range(-1000..=1000), 1000);
    let offset = match rng.gen_range(0..4u8) {
        0 => Vec2Fixed::new(along, -half),
        1 => Vec2Fixed::new(half, along),
        2 => Vec2Fixed::new(along, half),
        _ => Vec2Fixed::new(-half, along),
    };
    centre + offset
}

/// Advance every living building's queue and spawn finished units.
pub fn production_system<R: Rng>(
    ctx: &TickContext<'_>,
    store: &mut EntityStore,
    grid: &TerritoryGrid,
    rng: &mut R,
) -> Vec<ProductionEvent> {
    let mut events = Vec::new();
    let ids: Vec<EntityId> = store
        .buildings()
        .filter(|b| b.is_alive() && !b.queue.is_empty())
        .map(|b| b.id)
        .collect();

    for building_id in ids {
        let Some(building) = store.buildings.get_mut(&building_id) else {
            continue;
        };
        let Some(head) = building.queue.current() else {
            continue;
        };
        let Some(build_time) = ctx.archetypes.unit(head).map(|a| a.build_time) else {
            warn!(unit = head.id(), "Dropping queued unit with no archetype");
            building.queue.remove(0);
            continue;
        };
        let Some(kind) = building.queue.advance(ctx.dt, build_time) else {
            continue;
        };

        let (owner, centre, size, rally) = (building.owner, building.position, building.size, building.rally_point);
        let position = grid.clamp_to_bounds(spawn_point(rng, centre, size, ctx.config.spawn_margin));
        match store.create_unit(ctx.archetypes, kind, position, owner) {
            Ok(unit_id) => {
                if let (Some(point), Some(unit)) = (rally, store.unit_mut(unit_id)) {
                    unit.order_move(point);
                }
                debug!(building = building_id, unit = unit_id, kind = kind.id(), "Unit completed");
                events.push(ProductionEvent::UnitCompleted {
                    building: building_id,
                    unit: unit_id,
                    unit_kind: kind,
                    position,
                });
            }
            Err(e) => warn!(error = %e, "Failed to spawn produced unit"),
        }
    }

    events
}
