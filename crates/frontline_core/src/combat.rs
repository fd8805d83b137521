//! Combat resolver: targeting, attacks, healing and cosmetic projectiles.
//!
//! Damage is logical and immediate: when an attack fires, the target's hit
//! points drop in the same tick and a [`Projectile`] is spawned purely for
//! presentation. Targets are held as [`EntityId`]s and re-resolved against
//! the store every tick, so a dead or evicted target is simply dropped.
//!
//! Armor uses one formula for every entity type:
//! `damage * 100 / (100 + armor)`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archetypes::{ArchetypeTable, AttackProfile, EffectKind, HealProfile, HealTarget, TargetClass};
use crate::components::{CombatState, EntityId, Unit};
use crate::entities::EntityStore;
use crate::factions::FactionId;
use crate::math::{fixed_serde, ratio, Fixed, Vec2Fixed};
use crate::simulation::TickContext;
use crate::territory::TerritoryGrid;

// ============================================================================
// Records and events
// ============================================================================

/// A cosmetic shot in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Projectile {
    /// Where it was fired from.
    pub origin: Vec2Fixed,
    /// Current position.
    pub position: Vec2Fixed,
    /// Entity it is flying at.
    pub target: EntityId,
    /// Last known target position.
    pub target_point: Vec2Fixed,
    /// Speed in map units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Damage dealt by the shot (display only).
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// Faction that fired.
    pub owner: FactionId,
    /// Visual style.
    pub effect: EffectKind,
    /// Recent positions, oldest first.
    pub trail: VecDeque<Vec2Fixed>,
}

/// Damage applied by one attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Unit or building that fired.
    pub attacker: EntityId,
    /// Entity hit.
    pub target: EntityId,
    /// Hit points removed after mitigation.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
    /// Whether the hit brought the target to zero.
    pub killed: bool,
}

/// Hit points restored by one healer this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealEvent {
    /// Healing unit or building.
    pub healer: EntityId,
    /// Entity healed.
    pub target: EntityId,
    /// Hit points restored.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
}

/// Combat output of one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatReport {
    /// Attacks that landed.
    pub damage: Vec<DamageEvent>,
    /// Heals applied.
    pub heals: Vec<HealEvent>,
}

impl CombatReport {
    /// Append another report.
    pub fn merge(&mut self, other: Self) {
        self.damage.extend(other.damage);
        self.heals.extend(other.heals);
    }
}

// ============================================================================
// Damage math and target resolution
// ============================================================================

/// Percentage armor mitigation.
#[must_use]
pub fn mitigate(damage: Fixed, armor: Fixed) -> Fixed {
    let hundred = Fixed::from_num(100);
    damage * hundred / (hundred + armor)
}

/// What an attacker needs to know about a living target.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TargetView {
    owner: FactionId,
    position: Vec2Fixed,
    armor: Fixed,
    classes: Vec<TargetClass>,
    airborne: bool,
    is_building: bool,
}

fn view_target(archetypes: &ArchetypeTable, store: &EntityStore, id: EntityId) -> Option<TargetView> {
    if let Some(unit) = store.living_unit(id) {
        let archetype = archetypes.unit(unit.kind)?;
        return Some(TargetView {
            owner: unit.owner,
            position: unit.position,
            armor: archetype.armor,
            classes: archetype.target_classes(),
            airborne: archetype.is_airborne(),
            is_building: false,
        });
    }
    let building = store.living_building(id)?;
    let archetype = archetypes.building(building.kind)?;
    Some(TargetView {
        owner: building.owner,
        position: building.position,
        armor: archetype.armor,
        classes: vec![TargetClass::Building],
        airborne: false,
        is_building: true,
    })
}

fn engageable(attack: &AttackProfile, target: &TargetView) -> bool {
    if target.is_building {
        attack.domain.allows_buildings()
    } else {
        attack.domain.allows_unit(target.airborne)
    }
}

fn ready_to_fire(last_attack: Option<Fixed>, now: Fixed, interval: Fixed) -> bool {
    last_attack.map_or(true, |last| now - last >= interval)
}

/// Nearest legal enemy within `radius` of `position`.
///
/// Units are preferred; buildings are considered only when no unit qualifies
/// and `include_buildings` is set. Candidates inside the weapon's minimum
/// range are skipped. Ties keep the lowest id.
#[must_use]
pub fn acquire_target(
    archetypes: &ArchetypeTable,
    store: &EntityStore,
    owner: FactionId,
    position: Vec2Fixed,
    attack: &AttackProfile,
    radius: Fixed,
    include_buildings: bool,
) -> Option<EntityId> {
    let max_sq = radius * radius;
    let min_sq = attack.min_range * attack.min_range;
    let in_band = |dist_sq: Fixed| dist_sq <= max_sq && dist_sq >= min_sq;

    let mut best: Option<(Fixed, EntityId)> = None;
    for unit in store.units() {
        if unit.owner == owner || !unit.is_alive() {
            continue;
        }
        let airborne = archetypes.unit(unit.kind).is_some_and(|a| a.is_airborne());
        if !attack.domain.allows_unit(airborne) {
            continue;
        }
        let dist_sq = position.distance_squared(unit.position);
        if in_band(dist_sq) && best.map_or(true, |(d, _)| dist_sq < d) {
            best = Some((dist_sq, unit.id));
        }
    }
    if best.is_some() || !include_buildings || !attack.domain.allows_buildings() {
        return best.map(|(_, id)| id);
    }

    for building in store.buildings() {
        if building.owner == owner || !building.is_alive() {
            continue;
        }
        let dist_sq = position.distance_squared(building.position);
        if in_band(dist_sq) && best.map_or(true, |(d, _)| dist_sq < d) {
            best = Some((dist_sq, building.id));
        }
    }
    best.map(|(_, id)| id)
}

/// Apply one shot: bonus, mitigation, hp loss, projectile.
///
/// Returns the damage event, or `None` if the target no longer resolves.
fn fire(
    ctx: &TickContext<'_>,
    store: &mut EntityStore,
    projectiles: &mut VecDeque<Projectile>,
    attacker: EntityId,
    owner: FactionId,
    origin: Vec2Fixed,
    attack: &AttackProfile,
    target_id: EntityId,
) -> Option<DamageEvent> {
    let view = view_target(ctx.archetypes, store, target_id)?;
    let raw = attack.damage * attack.bonus_against(&view.classes);
    let damage = mitigate(raw, view.armor);

    let health = if view.is_building {
        &mut store.building_mut(target_id)?.health
    } else {
        &mut store.unit_mut(target_id)?.health
    };
    let amount = health.apply_damage(damage);
    let killed = health.is_dead();
    if killed {
        debug!(attacker, target = target_id, "Target destroyed");
    }

    spawn_projectile(
        projectiles,
        ctx.config.max_projectiles,
        Projectile {
            origin,
            position: origin,
            target: target_id,
            target_point: view.position,
            speed: attack.effect.speed(),
            damage: amount,
            owner,
            effect: attack.effect,
            trail: VecDeque::new(),
        },
    );

    Some(DamageEvent {
        attacker,
        target: target_id,
        amount,
        killed,
    })
}

fn spawn_projectile(projectiles: &mut VecDeque<Projectile>, cap: usize, projectile: Projectile) {
    if cap == 0 {
        return;
    }
    while projectiles.len() >= cap {
        projectiles.pop_front();
    }
    projectiles.push_back(projectile);
}

/// Heal the most damaged eligible ally within reach of `position`.
///
/// The healer never heals itself. Ties keep the lowest id.
fn heal_allies(
    ctx: &TickContext<'_>,
    store: &mut EntityStore,
    healer: EntityId,
    owner: FactionId,
    position: Vec2Fixed,
    heal: &HealProfile,
) -> Option<HealEvent> {
    let amount = heal.rate * ctx.dt;
    if amount <= Fixed::ZERO {
        return None;
    }
    let range_sq = heal.range * heal.range;
    let in_reach = |at: Vec2Fixed| position.distance_squared(at) <= range_sq;

    let mut best: Option<(Fixed, EntityId)> = None;
    let mut consider = |hp: Fixed, id: EntityId| {
        if best.map_or(true, |(lowest, _)| hp < lowest) {
            best = Some((hp, id));
        }
    };
    match heal.target {
        HealTarget::Units => {
            for unit in store.units_of(owner) {
                if unit.id != healer && !unit.health.is_full() && in_reach(unit.position) {
                    consider(unit.health.current, unit.id);
                }
            }
        }
        HealTarget::Structures => {
            for building in store.buildings_of(owner) {
                if building.id != healer && !building.health.is_full() && in_reach(building.position) {
                    consider(building.health.current, building.id);
                }
            }
        }
    }
    let (_, target) = best?;

    let health = match heal.target {
        HealTarget::Units => &mut store.unit_mut(target)?.health,
        HealTarget::Structures => &mut store.building_mut(target)?.health,
    };
    let restored = health.heal(amount);
    (restored > Fixed::ZERO).then_some(HealEvent {
        healer,
        target,
        amount: restored,
    })
}

// ============================================================================
// Systems
// ============================================================================

/// Defensive fire and healing auras of every living building.
pub fn building_combat_system(
    ctx: &TickContext<'_>,
    store: &mut EntityStore,
    projectiles: &mut VecDeque<Projectile>,
) -> CombatReport {
    let mut report = CombatReport::default();
    let ids: Vec<EntityId> = store.buildings.keys().copied().collect();

    for id in ids {
        let Some(building) = store.living_building(id) else {
            continue;
        };
        let Some(archetype) = ctx.archetypes.building(building.kind) else {
            continue;
        };
        let (owner, position, level, last_attack) =
            (building.owner, building.position, building.level, building.last_attack);

        if let Some(attack) = archetype.attack_at_level(level) {
            if ready_to_fire(last_attack, ctx.now, attack.interval) {
                let target = acquire_target(ctx.archetypes, store, owner, position, &attack, attack.range, false);
                if let Some(target) = target {
                    if let Some(event) = fire(ctx, store, projectiles, id, owner, position, &attack, target) {
                        report.damage.push(event);
                        if let Some(b) = store.building_mut(id) {
                            b.last_attack = Some(ctx.now);
                        }
                    }
                }
            }
        }

        if let Some(heal) = &archetype.heal {
            if let Some(event) = heal_allies(ctx, store, id, owner, position, heal) {
                report.heals.push(event);
            }
        }
    }

    report
}

/// Movement, retreat, targeting, attacks and healing of every living unit.
pub fn unit_system(
    ctx: &TickContext<'_>,
    store: &mut EntityStore,
    grid: &TerritoryGrid,
    projectiles: &mut VecDeque<Projectile>,
) -> CombatReport {
    let mut report = CombatReport::default();
    let ids: Vec<EntityId> = store.units.keys().copied().collect();

    for id in ids {
        let Some(mut unit) = store.living_unit(id).cloned() else {
            continue;
        };
        let Some(archetype) = ctx.archetypes.unit(unit.kind) else {
            continue;
        };

        if archetype.retreat_below > Fixed::ZERO {
            update_retreat(store, &mut unit, archetype.retreat_below);
        }

        move_unit(ctx, grid, &mut unit, archetype.speed);

        if unit.combat_state != CombatState::Retreating {
            if let Some(attack) = &archetype.attack {
                if let Some(event) = engage(ctx, store, projectiles, &mut unit, attack) {
                    report.damage.push(event);
                }
            }
        }

        if let Some(heal) = &archetype.heal {
            if let Some(event) = heal_allies(ctx, store, id, unit.owner, unit.position, heal) {
                report.heals.push(event);
            }
        }

        if let Some(slot) = store.unit_mut(id) {
            // hp is only ever changed by others, keep whatever they did
            unit.health = slot.health;
            *slot = unit;
        }
    }

    report
}

/// Enter or leave the retreating state based on the hp fraction.
///
/// A unit carrying out an issued order never starts retreating on its own.
fn update_retreat(store: &EntityStore, unit: &mut Unit, threshold: Fixed) {
    let fraction = unit.health.fraction();
    if unit.combat_state == CombatState::Retreating {
        if fraction >= threshold {
            unit.combat_state = CombatState::Idle;
            if !unit.ordered {
                unit.move_target = None;
            }
        }
        return;
    }
    if fraction >= threshold || unit.ordered {
        return;
    }
    let refuge = store
        .buildings_of(unit.owner)
        .map(|b| (unit.position.distance_squared(b.position), b.position))
        .fold(None::<(Fixed, Vec2Fixed)>, |best, candidate| match best {
            Some(b) if b.0 <= candidate.0 => Some(b),
            _ => Some(candidate),
        });
    if let Some((_, point)) = refuge {
        unit.attack_target = None;
        unit.chasing = false;
        unit.move_target = Some(point);
        unit.combat_state = CombatState::Retreating;
        debug!(unit = unit.id, "Unit retreating");
    }
}

/// Straight-line step toward the move target, clamped to the map.
fn move_unit(ctx: &TickContext<'_>, grid: &TerritoryGrid, unit: &mut Unit, speed: Fixed) {
    let Some(target) = unit.move_target else {
        return;
    };
    if unit.position.within(target, ctx.config.arrival_threshold) {
        if !unit.chasing {
            unit.ordered = false;
        }
        unit.move_target = None;
        unit.chasing = false;
        return;
    }
    let step = speed * ctx.dt;
    unit.position = grid.clamp_to_bounds(unit.position.move_towards(target, step));
}

/// Validate or acquire a target, then fire or chase.
fn engage(
    ctx: &TickContext<'_>,
    store: &mut EntityStore,
    projectiles: &mut VecDeque<Projectile>,
    unit: &mut Unit,
    attack: &AttackProfile,
) -> Option<DamageEvent> {
    let min_sq = attack.min_range * attack.min_range;

    if let Some(target) = unit.attack_target {
        let valid = view_target(ctx.archetypes, store, target).is_some_and(|view| {
            view.owner != unit.owner
                && engageable(attack, &view)
                && unit.position.distance_squared(view.position) >= min_sq
        });
        if !valid {
            unit.clear_target();
        }
    }

    if unit.attack_target.is_none() {
        let radius = attack.range * ctx.config.search_range_multiplier;
        unit.attack_target = acquire_target(ctx.archetypes, store, unit.owner, unit.position, attack, radius, true);
    }

    let Some(target) = unit.attack_target else {
        unit.combat_state = CombatState::Idle;
        return None;
    };
    let view = view_target(ctx.archetypes, store, target)?;

    if !unit.position.within(view.position, attack.range) {
        unit.combat_state = CombatState::Seeking;
        if unit.move_target.is_none() || unit.chasing {
            unit.move_target = Some(view.position);
            unit.chasing = true;
        }
        return None;
    }

    unit.combat_state = CombatState::Engaging;
    if unit.chasing {
        unit.move_target = None;
        unit.chasing = false;
    }
    if !ready_to_fire(unit.last_attack, ctx.now, attack.interval) {
        return None;
    }
    let event = fire(ctx, store, projectiles, unit.id, unit.owner, unit.position, attack, target)?;
    unit.last_attack = Some(ctx.now);
    if event.killed {
        unit.clear_target();
    }
    Some(event)
}

/// Advance projectiles and drop those that arrived or lost their target.
///
/// Returns how many were removed.
pub fn projectile_system(ctx: &TickContext<'_>, store: &EntityStore, projectiles: &mut VecDeque<Projectile>) -> usize {
    let arrival = ratio(3, 10);
    let before = projectiles.len();
    projectiles.retain_mut(|p| {
        let Some(target) = store.target_info(p.target) else {
            return false;
        };
        p.target_point = target.position;
        p.trail.push_back(p.position);
        while p.trail.len() > p.effect.trail_length() {
            p.trail.pop_front();
        }
        if p.position.within(p.target_point, arrival) {
            return false;
        }
        p.position = p.position.move_towards(p.target_point, p.speed * ctx.dt);
        true
    });
    before - projectiles.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetypes::{BuildingKind, UnitArchetype, UnitCategory, UnitKind};
    use crate::config::SimConfig;
    use crate::economy::Cost;

    struct Fixture {
        config: SimConfig,
        archetypes: ArchetypeTable,
        grid: TerritoryGrid,
        store: EntityStore,
        projectiles: VecDeque<Projectile>,
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
                projectiles: VecDeque::new(),
            }
        }

        fn unit(&mut self, kind: UnitKind, x: i32, y: i32, faction: u8) -> EntityId {
            self.store
                .create_unit(&self.archetypes, kind, Vec2Fixed::from_ints(x, y), FactionId(faction))
                .unwrap()
        }

        fn building(&mut self, kind: BuildingKind, x: i32, y: i32, faction: u8) -> EntityId {
            self.store
                .create_building(&self.archetypes, kind, Vec2Fixed::from_ints(x, y), FactionId(faction), 5)
                .unwrap()
        }

        fn units_step(&mut self, dt: Fixed, now: Fixed) -> CombatReport {
            let ctx = TickContext {
                config: &self.config,
                archetypes: &self.archetypes,
                dt,
                now,
            };
            unit_system(&ctx, &mut self.store, &self.grid, &mut self.projectiles)
        }

        fn buildings_step(&mut self, dt: Fixed, now: Fixed) -> CombatReport {
            let ctx = TickContext {
                config: &self.config,
                archetypes: &self.archetypes,
                dt,
                now,
            };
            building_combat_system(&ctx, &mut self.store, &mut self.projectiles)
        }

        fn projectiles_step(&mut self, dt: Fixed) -> usize {
            let ctx = TickContext {
                config: &self.config,
                archetypes: &self.archetypes,
                dt,
                now: Fixed::ZERO,
            };
            projectile_system(&ctx, &self.store, &mut self.projectiles)
        }

        fn hp(&self, id: EntityId) -> Fixed {
            self.store.unit(id).unwrap().health.current
        }
    }

    fn close_to(value: Fixed, expected: f64) -> bool {
        (value.to_num::<f64>() - expected).abs() < 0.01
    }

    #[test]
    fn test_mitigation_formula() {
        assert_eq!(mitigate(Fixed::from_num(50), Fixed::ZERO), Fixed::from_num(50));
        assert!(close_to(mitigate(Fixed::from_num(50), Fixed::from_num(50)), 33.333));
        assert_eq!(mitigate(Fixed::from_num(200), Fixed::from_num(100)), Fixed::from_num(100));
    }

    #[test]
    fn test_armored_target_takes_reduced_hits_until_removed() {
        let mut fx = Fixture::new();
        fx.archetypes.units.insert(
            UnitKind::Rifleman,
            UnitArchetype::new("Striker", UnitCategory::Infantry, 100, Fixed::ONE, Cost::dollars(100), 5)
                .with_attack(AttackProfile::new(Fixed::from_num(50), Fixed::from_num(5), Fixed::ONE)),
        );
        fx.archetypes.units.insert(
            UnitKind::Medic,
            UnitArchetype::new("Plated", UnitCategory::Infantry, 100, Fixed::ONE, Cost::dollars(100), 5)
                .with_armor(50),
        );
        let a = fx.unit(UnitKind::Rifleman, 10, 10, 0);
        let b = fx.unit(UnitKind::Medic, 12, 10, 1);

        let report = fx.units_step(ratio(1, 10), Fixed::ZERO);
        assert_eq!(report.damage.len(), 1);
        assert!(close_to(fx.hp(b), 66.667));

        // Not ready again until the interval has elapsed
        let report = fx.units_step(ratio(1, 10), ratio(1, 2));
        assert!(report.damage.is_empty());

        fx.units_step(ratio(1, 10), Fixed::ONE);
        assert!(close_to(fx.hp(b), 33.333));

        let mut killed = false;
        for second in 2..6 {
            let report = fx.units_step(ratio(1, 10), Fixed::from_num(second));
            if report.damage.iter().any(|d| d.killed) {
                killed = true;
                break;
            }
        }
        assert!(killed);
        assert!(fx.store.unit(a).unwrap().attack_target.is_none());

        let removed = fx.store.remove_dead(&fx.archetypes);
        assert_eq!(removed.units, vec![b]);
        assert!(fx.store.unit(b).is_none());
    }

    #[test]
    fn test_acquire_prefers_nearest_then_lowest_id() {
        let mut fx = Fixture::new();
        let attack = AttackProfile::new(Fixed::from_num(10), Fixed::from_num(5), Fixed::ONE);
        let first = fx.unit(UnitKind::Medic, 13, 10, 1);
        let second = fx.unit(UnitKind::Medic, 7, 10, 1);
        let far = fx.unit(UnitKind::Medic, 10, 14, 1);
        let origin = Vec2Fixed::from_ints(10, 10);

        let picked = acquire_target(&fx.archetypes, &fx.store, FactionId(0), origin, &attack, Fixed::from_num(6), true);
        assert_eq!(picked, Some(first));
        assert_ne!(picked, Some(second));

        fx.store.unit_mut(first).unwrap().health.kill();
        fx.store.unit_mut(second).unwrap().health.kill();
        let picked = acquire_target(&fx.archetypes, &fx.store, FactionId(0), origin, &attack, Fixed::from_num(6), true);
        assert_eq!(picked, Some(far));
    }

    #[test]
    fn test_buildings_targeted_only_without_units() {
        let mut fx = Fixture::new();
        let attack = AttackProfile::new(Fixed::from_num(10), Fixed::from_num(5), Fixed::ONE);
        let origin = Vec2Fixed::from_ints(10, 10);
        let barracks = fx.building(BuildingKind::Barracks, 12, 10, 1);
        let medic = fx.unit(UnitKind::Medic, 14, 10, 1);

        let pick = |fx: &Fixture, buildings| {
            acquire_target(&fx.archetypes, &fx.store, FactionId(0), origin, &attack, Fixed::from_num(6), buildings)
        };
        assert_eq!(pick(&fx, true), Some(medic));
        fx.store.unit_mut(medic).unwrap().health.kill();
        assert_eq!(pick(&fx, true), Some(barracks));
        assert_eq!(pick(&fx, false), None);
    }

    #[test]
    fn test_artillery_ignores_targets_inside_min_range() {
        let mut fx = Fixture::new();
        let artillery = fx.archetypes.unit(UnitKind::Artillery).unwrap().attack.clone().unwrap();
        let origin = Vec2Fixed::from_ints(20, 20);
        let close = fx.unit(UnitKind::Medic, 22, 20, 1);

        let picked = acquire_target(&fx.archetypes, &fx.store, FactionId(0), origin, &artillery, artillery.range, true);
        assert_eq!(picked, None);

        let distant = fx.unit(UnitKind::Medic, 28, 20, 1);
        let picked = acquire_target(&fx.archetypes, &fx.store, FactionId(0), origin, &artillery, artillery.range, true);
        assert_eq!(picked, Some(distant));
        assert!(fx.store.unit(close).is_some());
    }

    #[test]
    fn test_turret_domains() {
        let mut fx = Fixture::new();
        let turret = fx.building(BuildingKind::MgTurret, 20, 20, 0);
        let sam = fx.building(BuildingKind::SamSite, 60, 20, 0);
        let heli_near_turret = fx.unit(UnitKind::ScoutHeli, 22, 20, 1);
        let rifle_near_sam = fx.unit(UnitKind::Rifleman, 62, 20, 1);

        let report = fx.buildings_step(ratio(1, 10), Fixed::ZERO);
        assert!(report.damage.is_empty());

        let rifle_near_turret = fx.unit(UnitKind::Rifleman, 23, 20, 1);
        let heli_near_sam = fx.unit(UnitKind::ScoutHeli, 63, 20, 1);
        let report = fx.buildings_step(ratio(1, 10), Fixed::ZERO);
        let hits: Vec<(EntityId, EntityId)> = report.damage.iter().map(|d| (d.attacker, d.target)).collect();
        assert_eq!(hits, vec![(turret, rifle_near_turret), (sam, heli_near_sam)]);
        assert!(fx.store.unit(heli_near_turret).unwrap().health.is_full());
        assert!(fx.store.unit(rifle_near_sam).unwrap().health.is_full());
    }

    #[test]
    fn test_upgraded_turret_hits_harder() {
        let mut fx = Fixture::new();
        let turret = fx.building(BuildingKind::MgTurret, 20, 20, 0);
        let target = fx.unit(UnitKind::Rifleman, 22, 20, 1);
        let base = fx.buildings_step(ratio(1, 10), Fixed::ZERO).damage[0].amount;

        fx.store.building_mut(turret).unwrap().level = 3;
        fx.store.unit_mut(target).unwrap().health.current = Fixed::from_num(100);
        let upgraded = fx.buildings_step(ratio(1, 10), Fixed::ONE).damage[0].amount;
        assert!(close_to(upgraded, base.to_num::<f64>() * 1.5));
    }

    #[test]
    fn test_unit_chases_then_stops_in_range() {
        let mut fx = Fixture::new();
        let rifle = fx.unit(UnitKind::Rifleman, 10, 10, 0);
        let medic = fx.unit(UnitKind::Medic, 14, 10, 1);

        fx.units_step(ratio(1, 10), Fixed::ZERO);
        let unit = fx.store.unit(rifle).unwrap();
        assert_eq!(unit.attack_target, Some(medic));
        assert!(unit.chasing);
        assert_eq!(unit.combat_state, CombatState::Seeking);

        let mut now = Fixed::ZERO;
        for _ in 0..10 {
            now += ratio(1, 10);
            fx.units_step(ratio(1, 10), now);
        }
        let unit = fx.store.unit(rifle).unwrap();
        assert!(!unit.chasing);
        assert_eq!(unit.move_target, None);
        assert_eq!(unit.combat_state, CombatState::Engaging);
        assert!(!fx.store.unit(medic).unwrap().health.is_full());
    }

    #[test]
    fn test_move_order_arrives_and_clears() {
        let mut fx = Fixture::new();
        let rifle = fx.unit(UnitKind::Rifleman, 10, 10, 0);
        fx.store.unit_mut(rifle).unwrap().order_move(Vec2Fixed::from_ints(12, 10));

        for _ in 0..20 {
            fx.units_step(ratio(1, 10), Fixed::ZERO);
        }
        let unit = fx.store.unit(rifle).unwrap();
        assert_eq!(unit.move_target, None);
        assert!(unit.position.within(Vec2Fixed::from_ints(12, 10), fx.config.arrival_threshold));
    }

    #[test]
    fn test_medic_heals_lowest_ally_and_caps() {
        let mut fx = Fixture::new();
        let medic = fx.unit(UnitKind::Medic, 20, 20, 0);
        let scratched = fx.unit(UnitKind::Rifleman, 21, 20, 0);
        let wounded = fx.unit(UnitKind::Rifleman, 20, 21, 0);
        fx.store.unit_mut(scratched).unwrap().health.current = Fixed::from_num(98);
        fx.store.unit_mut(wounded).unwrap().health.current = Fixed::from_num(40);

        let report = fx.units_step(ratio(1, 2), Fixed::ZERO);
        assert_eq!(
            report.heals,
            vec![HealEvent {
                healer: medic,
                target: wounded,
                amount: Fixed::from_num(10),
            }]
        );
        assert_eq!(fx.hp(wounded), Fixed::from_num(50));

        fx.store.unit_mut(wounded).unwrap().health.current = Fixed::from_num(100);
        let report = fx.units_step(ratio(1, 2), Fixed::ZERO);
        assert_eq!(report.heals[0].target, scratched);
        assert_eq!(report.heals[0].amount, Fixed::from_num(2));
        assert!(fx.store.unit(scratched).unwrap().health.is_full());
    }

    #[test]
    fn test_engineer_repairs_structures() {
        let mut fx = Fixture::new();
        let barracks = fx.building(BuildingKind::Barracks, 20, 20, 0);
        fx.unit(UnitKind::Engineer, 21, 20, 0);
        fx.store.building_mut(barracks).unwrap().health.current = Fixed::from_num(7000);

        let report = fx.units_step(Fixed::ONE, Fixed::ZERO);
        assert_eq!(report.heals.len(), 1);
        assert_eq!(report.heals[0].target, barracks);
        assert_eq!(fx.store.building(barracks).unwrap().health.current, Fixed::from_num(7030));
    }

    #[test]
    fn test_hospital_heals_nearby_units() {
        let mut fx = Fixture::new();
        let hospital = fx.building(BuildingKind::Hospital, 20, 20, 0);
        let rifle = fx.unit(UnitKind::Rifleman, 24, 20, 0);
        fx.store.unit_mut(rifle).unwrap().health.current = Fixed::from_num(10);

        let report = fx.buildings_step(ratio(1, 10), Fixed::ZERO);
        assert_eq!(report.heals[0].healer, hospital);
        assert_eq!(fx.hp(rifle), Fixed::from_num(15));
    }

    #[test]
    fn test_wounded_sniper_retreats_to_nearest_building() {
        let mut fx = Fixture::new();
        let near = fx.building(BuildingKind::Barracks, 30, 20, 0);
        fx.building(BuildingKind::Hospital, 80, 80, 0);
        let sniper = fx.unit(UnitKind::Sniper, 40, 20, 0);
        fx.unit(UnitKind::Medic, 44, 20, 1);
        fx.store.unit_mut(sniper).unwrap().health.current = Fixed::from_num(10);

        let report = fx.units_step(ratio(1, 10), Fixed::ZERO);
        assert!(report.damage.is_empty());
        let unit = fx.store.unit(sniper).unwrap();
        assert_eq!(unit.combat_state, CombatState::Retreating);
        assert_eq!(unit.attack_target, None);
        assert_eq!(unit.move_target, Some(fx.store.building(near).unwrap().position));

        fx.store.unit_mut(sniper).unwrap().health.current = Fixed::from_num(60);
        fx.units_step(ratio(1, 10), Fixed::ZERO);
        assert_ne!(fx.store.unit(sniper).unwrap().combat_state, CombatState::Retreating);
    }

    #[test]
    fn test_wounded_unit_keeps_issued_attack_order() {
        let mut fx = Fixture::new();
        fx.building(BuildingKind::Barracks, 30, 20, 0);
        let sniper = fx.unit(UnitKind::Sniper, 40, 20, 0);
        let enemy = fx.unit(UnitKind::Medic, 60, 20, 1);
        {
            let unit = fx.store.unit_mut(sniper).unwrap();
            unit.health.current = Fixed::from_num(10);
            unit.order_attack(enemy);
        }

        fx.units_step(ratio(1, 10), Fixed::ZERO);
        fx.units_step(ratio(1, 10), ratio(1, 10));
        let unit = fx.store.unit(sniper).unwrap();
        assert_eq!(unit.attack_target, Some(enemy));
        assert_eq!(unit.combat_state, CombatState::Seeking);
        assert!(unit.chasing);
        assert!(unit.position.x > Fixed::from_num(40));

        // Once the ordered target is gone the unit falls back to retreating
        fx.store.unit_mut(enemy).unwrap().health.kill();
        fx.units_step(ratio(1, 10), ratio(2, 10));
        fx.units_step(ratio(1, 10), ratio(3, 10));
        let unit = fx.store.unit(sniper).unwrap();
        assert!(!unit.ordered);
        assert_eq!(unit.combat_state, CombatState::Retreating);
    }

    #[test]
    fn test_projectile_cap_drops_oldest() {
        let mut fx = Fixture::new();
        fx.config.max_projectiles = 2;
        for x in [20, 40, 60] {
            fx.unit(UnitKind::Rifleman, x, 20, 0);
            fx.unit(UnitKind::Medic, x + 2, 20, 1);
        }
        let report = fx.units_step(ratio(1, 10), Fixed::ZERO);
        assert_eq!(report.damage.len(), 3);
        assert_eq!(fx.projectiles.len(), 2);
        assert_eq!(fx.projectiles[0].origin, Vec2Fixed::from_ints(40, 20));
    }

    #[test]
    fn test_projectiles_fly_and_vanish() {
        let mut fx = Fixture::new();
        fx.unit(UnitKind::Rifleman, 20, 20, 0);
        let target = fx.unit(UnitKind::Medic, 22, 20, 1);
        fx.units_step(ratio(1, 10), Fixed::ZERO);
        assert_eq!(fx.projectiles.len(), 1);

        assert_eq!(fx.projectiles_step(ratio(1, 100)), 0);
        assert!(fx.projectiles[0].position.x > Fixed::from_num(20));
        assert_eq!(fx.projectiles[0].trail.len(), 1);

        fx.store.unit_mut(target).unwrap().health.kill();
        assert_eq!(fx.projectiles_step(ratio(1, 100)), 1);
        assert!(fx.projectiles.is_empty());
    }
}
