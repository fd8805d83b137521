//! Entity records.
//!
//! Records are plain data. Behaviour lives in the systems that operate on
//! them (`capture`, `production`, `combat`) and is driven by the archetype
//! table rather than by anything stored here.

use serde::{Deserialize, Serialize};

use crate::archetypes::{BuildingKind, UnitKind};
use crate::economy::ResourceKind;
use crate::factions::FactionId;
use crate::math::{fixed_serde, option_fixed_serde, Fixed, Vec2Fixed};
use crate::production::ProductionQueue;
use crate::territory::TileCoord;

/// Unique identifier for entities.
///
/// Units, buildings and resource sites draw ids from one shared counter, so an
/// id never refers to two different entities over a match.
pub type EntityId = u64;

// ============================================================================
// Health
// ============================================================================

/// Hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current hit points.
    #[serde(with = "fixed_serde")]
    pub current: Fixed,
    /// Maximum hit points.
    #[serde(with = "fixed_serde")]
    pub max: Fixed,
}

impl Health {
    /// Create new health at full.
    #[must_use]
    pub const fn new(max: Fixed) -> Self {
        Self { current: max, max }
    }

    /// Dead once hit points reach zero.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.current <= Fixed::ZERO
    }

    /// Check if at full health.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Apply damage, returning the amount actually removed.
    ///
    /// Hit points are clamped at zero.
    pub fn apply_damage(&mut self, amount: Fixed) -> Fixed {
        let actual = amount.max(Fixed::ZERO).min(self.current.max(Fixed::ZERO));
        self.current = (self.current - actual).max(Fixed::ZERO);
        actual
    }

    /// Heal, returning the amount actually restored. Never exceeds max.
    pub fn heal(&mut self, amount: Fixed) -> Fixed {
        let headroom = (self.max - self.current).max(Fixed::ZERO);
        let actual = amount.max(Fixed::ZERO).min(headroom);
        self.current += actual;
        actual
    }

    /// Raise max hp, adding the same delta to current hp.
    pub fn raise_max(&mut self, new_max: Fixed) {
        if new_max > self.max {
            self.current += new_max - self.max;
            self.max = new_max;
        }
    }

    /// Current hit points as a fraction of max (0 when max is 0).
    #[must_use]
    pub fn fraction(&self) -> Fixed {
        if self.max <= Fixed::ZERO {
            Fixed::ZERO
        } else {
            self.current / self.max
        }
    }

    /// Mark dead.
    pub fn kill(&mut self) {
        self.current = Fixed::ZERO;
    }
}

// ============================================================================
// Units
// ============================================================================

/// Combat behaviour state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CombatState {
    /// No target.
    #[default]
    Idle,
    /// Has a target that is out of range.
    Seeking,
    /// Target in range; firing or on cooldown.
    Engaging,
    /// Falling back to heal.
    Retreating,
}

/// A mobile unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Entity id.
    pub id: EntityId,
    /// Archetype key.
    pub kind: UnitKind,
    /// Owning faction.
    pub owner: FactionId,
    /// Position in map units.
    pub position: Vec2Fixed,
    /// Hit points.
    pub health: Health,
    /// Where the unit is heading.
    pub move_target: Option<Vec2Fixed>,
    /// Current attack target (validated every tick).
    pub attack_target: Option<EntityId>,
    /// Simulation time of the last shot.
    #[serde(with = "option_fixed_serde")]
    pub last_attack: Option<Fixed>,
    /// Combat state machine.
    pub combat_state: CombatState,
    /// True when `move_target` was set by auto-chase rather than an order.
    pub chasing: bool,
    /// True while an issued move or attack order is still being carried out.
    #[serde(default)]
    pub ordered: bool,
}

impl Unit {
    /// Create a unit at full health with no orders.
    #[must_use]
    pub fn new(id: EntityId, kind: UnitKind, owner: FactionId, position: Vec2Fixed, max_hp: Fixed) -> Self {
        Self {
            id,
            kind,
            owner,
            position,
            health: Health::new(max_hp),
            move_target: None,
            attack_target: None,
            last_attack: None,
            combat_state: CombatState::Idle,
            chasing: false,
            ordered: false,
        }
    }

    /// Living units have hp above zero.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.health.is_dead()
    }

    /// Whether the unit has neither a move order nor a target.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.move_target.is_none() && self.attack_target.is_none()
    }

    /// Replace current orders with a move.
    pub fn order_move(&mut self, point: Vec2Fixed) {
        self.move_target = Some(point);
        self.attack_target = None;
        self.chasing = false;
        self.ordered = true;
        if self.combat_state != CombatState::Retreating {
            self.combat_state = CombatState::Idle;
        }
    }

    /// Replace current orders with an attack.
    pub fn order_attack(&mut self, target: EntityId) {
        self.attack_target = Some(target);
        self.move_target = None;
        self.chasing = false;
        self.ordered = true;
        self.combat_state = CombatState::Seeking;
    }

    /// Drop all orders.
    pub fn stop(&mut self) {
        self.move_target = None;
        self.attack_target = None;
        self.chasing = false;
        self.ordered = false;
        self.combat_state = CombatState::Idle;
    }

    /// Drop the current target, and the chase move that followed it.
    ///
    /// An attack order ends with its target; an explicit move keeps going.
    pub fn clear_target(&mut self) {
        self.attack_target = None;
        if self.chasing {
            self.move_target = None;
            self.chasing = false;
        }
        if self.move_target.is_none() {
            self.ordered = false;
        }
        if self.combat_state != CombatState::Retreating {
            self.combat_state = CombatState::Idle;
        }
    }
}

// ============================================================================
// Buildings
// ============================================================================

/// A placed structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Building {
    /// Entity id.
    pub id: EntityId,
    /// Archetype key.
    pub kind: BuildingKind,
    /// Owning faction.
    pub owner: FactionId,
    /// Centre of the footprint.
    pub position: Vec2Fixed,
    /// Side length of the square footprint.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
    /// Hit points.
    pub health: Health,
    /// Unit production queue.
    pub queue: ProductionQueue,
    /// Where newly produced units head.
    pub rally_point: Option<Vec2Fixed>,
    /// Simulation time of the last defensive shot.
    #[serde(with = "option_fixed_serde")]
    pub last_attack: Option<Fixed>,
    /// Upgrade level, starting at 1.
    pub level: u8,
}

impl Building {
    /// Living buildings have hp above zero.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.health.is_dead()
    }

    /// Whether `point` lies inside the footprint.
    #[must_use]
    pub fn contains(&self, point: Vec2Fixed) -> bool {
        let half = self.size / 2;
        (point.x - self.position.x).abs() <= half && (point.y - self.position.y).abs() <= half
    }

    /// Whether a square footprint of `size` at `centre` overlaps this one.
    #[must_use]
    pub fn overlaps(&self, centre: Vec2Fixed, size: Fixed) -> bool {
        footprints_overlap(self.position, self.size, centre, size)
    }
}

/// Whether two axis-aligned square footprints overlap.
#[must_use]
pub fn footprints_overlap(a: Vec2Fixed, a_size: Fixed, b: Vec2Fixed, b_size: Fixed) -> bool {
    let reach = (a_size + b_size) / 2;
    (a.x - b.x).abs() < reach && (a.y - b.y).abs() < reach
}

// ============================================================================
// Resource sites
// ============================================================================

/// A resource-producing point on the map.
///
/// The owner is not stored: it is whoever owns [`ResourceSite::tile`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceSite {
    /// Entity id.
    pub id: EntityId,
    /// Resource produced.
    pub resource: ResourceKind,
    /// Production per minute at level 1.
    #[serde(with = "fixed_serde")]
    pub base_rate: Fixed,
    /// Upgrade level, starting at 1.
    pub level: u8,
    /// Tile the site sits on.
    pub tile: TileCoord,
    /// Centre position.
    pub position: Vec2Fixed,
    /// Side length of the square footprint.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
}

impl ResourceSite {
    /// Production per minute at the current level.
    #[must_use]
    pub fn rate_per_minute(&self, level_bonus: Fixed) -> Fixed {
        self.base_rate * (Fixed::ONE + level_bonus * Fixed::from_num(self.level.saturating_sub(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ratio;

    #[test]
    fn test_health_damage_clamps_at_zero() {
        let mut health = Health::new(Fixed::from_num(100));
        let dealt = health.apply_damage(Fixed::from_num(150));
        assert_eq!(dealt, Fixed::from_num(100));
        assert_eq!(health.current, Fixed::ZERO);
        assert!(health.is_dead());
    }

    #[test]
    fn test_health_heal_caps_at_max() {
        let mut health = Health::new(Fixed::from_num(100));
        health.apply_damage(Fixed::from_num(30));
        let healed = health.heal(Fixed::from_num(50));
        assert_eq!(healed, Fixed::from_num(30));
        assert!(health.is_full());
        assert_eq!(health.current, health.max);
    }

    #[test]
    fn test_health_raise_max_keeps_damage() {
        let mut health = Health::new(Fixed::from_num(100));
        health.apply_damage(Fixed::from_num(40));
        health.raise_max(Fixed::from_num(120));
        assert_eq!(health.current, Fixed::from_num(80));
        assert_eq!(health.max, Fixed::from_num(120));
    }

    #[test]
    fn test_health_fraction() {
        let mut health = Health::new(Fixed::from_num(200));
        health.apply_damage(Fixed::from_num(150));
        assert_eq!(health.fraction(), ratio(1, 4));
    }

    #[test]
    fn test_unit_orders_replace_each_other() {
        let mut unit = Unit::new(1, UnitKind::Rifleman, FactionId(0), Vec2Fixed::ZERO, Fixed::from_num(100));
        unit.order_attack(7);
        assert_eq!(unit.combat_state, CombatState::Seeking);

        unit.order_move(Vec2Fixed::from_ints(5, 5));
        assert_eq!(unit.attack_target, None);
        assert_eq!(unit.move_target, Some(Vec2Fixed::from_ints(5, 5)));

        assert!(unit.ordered);

        unit.stop();
        assert!(unit.is_idle());
        assert!(!unit.ordered);
    }

    #[test]
    fn test_attack_order_ends_with_its_target() {
        let mut unit = Unit::new(1, UnitKind::Rifleman, FactionId(0), Vec2Fixed::ZERO, Fixed::from_num(100));
        unit.order_attack(7);
        assert!(unit.ordered);
        unit.clear_target();
        assert!(!unit.ordered);

        unit.order_move(Vec2Fixed::from_ints(9, 9));
        unit.attack_target = Some(3);
        unit.clear_target();
        assert!(unit.ordered);
    }

    #[test]
    fn test_clear_target_drops_chase_but_keeps_explicit_move() {
        let mut unit = Unit::new(1, UnitKind::Rifleman, FactionId(0), Vec2Fixed::ZERO, Fixed::from_num(100));
        unit.attack_target = Some(3);
        unit.move_target = Some(Vec2Fixed::from_ints(9, 9));
        unit.chasing = true;
        unit.clear_target();
        assert_eq!(unit.move_target, None);

        unit.attack_target = Some(3);
        unit.move_target = Some(Vec2Fixed::from_ints(9, 9));
        unit.chasing = false;
        unit.clear_target();
        assert_eq!(unit.move_target, Some(Vec2Fixed::from_ints(9, 9)));
    }

    #[test]
    fn test_footprint_overlap() {
        let a = Vec2Fixed::from_ints(10, 10);
        let b = Vec2Fixed::from_ints(12, 10);
        assert!(footprints_overlap(a, Fixed::from_num(3), b, Fixed::from_num(2)));
        assert!(!footprints_overlap(a, Fixed::from_num(2), b, Fixed::from_num(2)));
    }

    #[test]
    fn test_resource_site_level_rate() {
        let site = ResourceSite {
            id: 1,
            resource: ResourceKind::Oil,
            base_rate: Fixed::from_num(600),
            level: 3,
            tile: TileCoord::new(0, 0),
            position: Vec2Fixed::ZERO,
            size: Fixed::ONE,
        };
        // 600 * (1 + 0.2 * 2) = 840
        let rate = site.rate_per_minute(ratio(1, 5));
        assert!((rate - Fixed::from_num(840)).abs() < ratio(1, 1000));
    }
}
