//! Entity store: canonical ownership of units, buildings and resource sites.
//!
//! All three collections are `BTreeMap`s keyed by [`EntityId`], so iteration
//! is always in ascending id order. Ids come from a single counter and are
//! never reused.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archetypes::{ArchetypeTable, BuildingKind, UnitKind};
use crate::components::{Building, EntityId, Health, ResourceSite, Unit};
use crate::economy::ResourceKind;
use crate::error::{GameError, Result};
use crate::factions::FactionId;
use crate::math::{Fixed, Vec2Fixed};
use crate::production::ProductionQueue;
use crate::territory::TileCoord;

/// What one `remove_dead` pass evicted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReport {
    /// Units evicted.
    pub units: Vec<EntityId>,
    /// Buildings evicted.
    pub buildings: Vec<EntityId>,
    /// Core structures evicted, with their owners.
    pub core_losses: Vec<(FactionId, EntityId)>,
}

impl RemovalReport {
    /// Whether nothing was evicted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.buildings.is_empty()
    }
}

/// A resolved, living target: who owns it and where it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    /// Owning faction.
    pub owner: FactionId,
    /// Current position.
    pub position: Vec2Fixed,
    /// Whether the target is a building.
    pub is_building: bool,
}

/// Owns every entity in the world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityStore {
    next_id: EntityId,
    pub(crate) units: BTreeMap<EntityId, Unit>,
    pub(crate) buildings: BTreeMap<EntityId, Building>,
    pub(crate) sites: BTreeMap<EntityId, ResourceSite>,
}

impl EntityStore {
    /// Create an empty store. The first id handed out is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    // ------------------------------------------------------------------
    // Creation and destruction
    // ------------------------------------------------------------------

    /// Create a unit at full health.
    pub fn create_unit(
        &mut self,
        archetypes: &ArchetypeTable,
        kind: UnitKind,
        position: Vec2Fixed,
        owner: FactionId,
    ) -> Result<EntityId> {
        let archetype = archetypes
            .unit(kind)
            .ok_or_else(|| GameError::InvalidConfig(format!("no archetype for unit '{}'", kind.id())))?;
        let id = self.allocate_id();
        self.units
            .insert(id, Unit::new(id, kind, owner, position, archetype.max_hp));
        Ok(id)
    }

    /// Create a level-1 building with an empty queue.
    pub fn create_building(
        &mut self,
        archetypes: &ArchetypeTable,
        kind: BuildingKind,
        position: Vec2Fixed,
        owner: FactionId,
        queue_capacity: usize,
    ) -> Result<EntityId> {
        let archetype = archetypes.building(kind).ok_or_else(|| {
            GameError::InvalidConfig(format!("no archetype for building '{}'", kind.id()))
        })?;
        let id = self.allocate_id();
        self.buildings.insert(
            id,
            Building {
                id,
                kind,
                owner,
                position,
                size: archetype.size,
                health: Health::new(archetype.max_hp_at_level(1)),
                queue: ProductionQueue::new(queue_capacity),
                rally_point: None,
                last_attack: None,
                level: 1,
            },
        );
        Ok(id)
    }

    /// Create a level-1 resource site.
    pub fn create_resource_site(
        &mut self,
        resource: ResourceKind,
        base_rate: Fixed,
        tile: TileCoord,
        position: Vec2Fixed,
        size: Fixed,
    ) -> EntityId {
        let id = self.allocate_id();
        self.sites.insert(
            id,
            ResourceSite {
                id,
                resource,
                base_rate,
                level: 1,
                tile,
                position,
                size,
            },
        );
        id
    }

    /// Evict every unit and building with hp at or below zero.
    ///
    /// Calling it again without new deaths evicts nothing and reports nothing.
    pub fn remove_dead(&mut self, archetypes: &ArchetypeTable) -> RemovalReport {
        let mut report = RemovalReport::default();

        self.units.retain(|id, unit| {
            if unit.health.is_dead() {
                report.units.push(*id);
                false
            } else {
                true
            }
        });

        self.buildings.retain(|id, building| {
            if !building.health.is_dead() {
                return true;
            }
            report.buildings.push(*id);
            if archetypes.building(building.kind).is_some_and(|a| a.is_core()) {
                report.core_losses.push((building.owner, *id));
            }
            false
        });

        if !report.is_empty() {
            debug!(
                units = report.units.len(),
                buildings = report.buildings.len(),
                "Removed dead entities"
            );
        }
        report
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Unit by id, dead or alive.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Mutable unit by id.
    pub fn unit_mut(&mut self, id: EntityId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Unit by id, only if alive.
    #[must_use]
    pub fn living_unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(&id).filter(|unit| unit.is_alive())
    }

    /// Building by id, dead or alive.
    #[must_use]
    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// Mutable building by id.
    pub fn building_mut(&mut self, id: EntityId) -> Option<&mut Building> {
        self.buildings.get_mut(&id)
    }

    /// Building by id, only if alive.
    #[must_use]
    pub fn living_building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(&id).filter(|building| building.is_alive())
    }

    /// Resource site by id.
    #[must_use]
    pub fn resource_site(&self, id: EntityId) -> Option<&ResourceSite> {
        self.sites.get(&id)
    }

    /// Mutable resource site by id.
    pub fn resource_site_mut(&mut self, id: EntityId) -> Option<&mut ResourceSite> {
        self.sites.get_mut(&id)
    }

    /// All units in id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// All buildings in id order.
    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    /// All resource sites in id order.
    pub fn resource_sites(&self) -> impl Iterator<Item = &ResourceSite> {
        self.sites.values()
    }

    /// Living units owned by `faction`.
    pub fn units_of(&self, faction: FactionId) -> impl Iterator<Item = &Unit> {
        self.units
            .values()
            .filter(move |unit| unit.owner == faction && unit.is_alive())
    }

    /// Living buildings owned by `faction`.
    pub fn buildings_of(&self, faction: FactionId) -> impl Iterator<Item = &Building> {
        self.buildings
            .values()
            .filter(move |building| building.owner == faction && building.is_alive())
    }

    /// Resource sites on `tile`.
    pub fn sites_on_tile(&self, tile: TileCoord) -> impl Iterator<Item = &ResourceSite> {
        self.sites.values().filter(move |site| site.tile == tile)
    }

    /// Resolve a living unit or building.
    #[must_use]
    pub fn target_info(&self, id: EntityId) -> Option<TargetInfo> {
        if let Some(unit) = self.living_unit(id) {
            return Some(TargetInfo {
                owner: unit.owner,
                position: unit.position,
                is_building: false,
            });
        }
        self.living_building(id).map(|building| TargetInfo {
            owner: building.owner,
            position: building.position,
            is_building: true,
        })
    }

    /// Whether `faction` still owns a living core structure.
    #[must_use]
    pub fn has_core_structure(&self, archetypes: &ArchetypeTable, faction: FactionId) -> bool {
        self.buildings_of(faction)
            .any(|building| archetypes.building(building.kind).is_some_and(|a| a.is_core()))
    }

    /// Number of units (including any pending removal).
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Number of buildings (including any pending removal).
    #[must_use]
    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    /// Number of resource sites.
    #[must_use]
    pub fn resource_site_count(&self) -> usize {
        self.sites.len()
    }

    /// The id the next created entity will receive.
    #[must_use]
    pub const fn next_id(&self) -> EntityId {
        self.next_id
    }
}
