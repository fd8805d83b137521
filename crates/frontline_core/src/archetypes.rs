//! Archetype definitions: the immutable per-type capability table.
//!
//! Update loops never branch on a concrete [`UnitKind`] or [`BuildingKind`].
//! They look the kind up in the [`ArchetypeTable`] and dispatch on what the
//! archetype declares: an [`AttackProfile`], a [`HealProfile`], or
//! [`Capabilities`] flags such as [`Capabilities::CAN_CAPTURE`].
//!
//! Distances and speeds are in map units (one tile is 40 units by default),
//! times in seconds, hit points and damage in raw points.
//!
//! # Example RON
//!
//! ```ron
//! ArchetypeTable(
//!     units: {
//!         rifleman: UnitArchetype(
//!             name: "Rifleman",
//!             category: infantry,
//!             max_hp: "100",
//!             speed: "1.5",
//!             cost: Cost(dollars: 100),
//!             build_time: "5",
//!             capabilities: (1),
//!             attack: Some(AttackProfile(damage: "15", range: "3.5", interval: "0.8")),
//!         ),
//!     },
//!     buildings: {},
//! )
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::economy::{Cost, MAX_AMOUNT};
use crate::error::{GameError, Result};
use crate::math::{fixed_str_serde, ratio, Fixed};

// ============================================================================
// Kinds
// ============================================================================

/// Unit archetype key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Basic capturing infantry.
    Rifleman,
    /// Rapid-fire infantry.
    MachineGunner,
    /// Long-range, slow-firing infantry.
    Sniper,
    /// Anti-vehicle infantry.
    Rocketeer,
    /// Field healer.
    Medic,
    /// Structure repair infantry.
    Engineer,
    /// Armored personnel carrier.
    Apc,
    /// Fast light tank.
    LightTank,
    /// Main battle tank.
    MainBattleTank,
    /// Slow heavy tank.
    HeavyTank,
    /// Long-range gun with a minimum range.
    Artillery,
    /// Multiple rocket launcher.
    Mlrs,
    /// Mobile anti-air vehicle.
    AntiAir,
    /// Light reconnaissance helicopter.
    ScoutHeli,
    /// Anti-armor helicopter.
    AttackHeli,
    /// Air superiority jet.
    Fighter,
    /// Anti-structure bomber.
    Bomber,
    /// Armed drone.
    Drone,
}

impl UnitKind {
    /// All unit kinds in declaration order.
    pub const ALL: [Self; 18] = [
        Self::Rifleman,
        Self::MachineGunner,
        Self::Sniper,
        Self::Rocketeer,
        Self::Medic,
        Self::Engineer,
        Self::Apc,
        Self::LightTank,
        Self::MainBattleTank,
        Self::HeavyTank,
        Self::Artillery,
        Self::Mlrs,
        Self::AntiAir,
        Self::ScoutHeli,
        Self::AttackHeli,
        Self::Fighter,
        Self::Bomber,
        Self::Drone,
    ];

    /// Snake-case identifier used in data files and the wire protocol.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Rifleman => "rifleman",
            Self::MachineGunner => "machine_gunner",
            Self::Sniper => "sniper",
            Self::Rocketeer => "rocketeer",
            Self::Medic => "medic",
            Self::Engineer => "engineer",
            Self::Apc => "apc",
            Self::LightTank => "light_tank",
            Self::MainBattleTank => "main_battle_tank",
            Self::HeavyTank => "heavy_tank",
            Self::Artillery => "artillery",
            Self::Mlrs => "mlrs",
            Self::AntiAir => "anti_air",
            Self::ScoutHeli => "scout_heli",
            Self::AttackHeli => "attack_heli",
            Self::Fighter => "fighter",
            Self::Bomber => "bomber",
            Self::Drone => "drone",
        }
    }

    /// Look a kind up by its identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

/// Building archetype key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    /// Core structure; losing it eliminates the faction.
    Headquarters,
    /// Infantry production.
    Barracks,
    /// Vehicle production.
    TankFactory,
    /// Aircraft production.
    Airfield,
    /// Heals nearby units.
    Hospital,
    /// Ground-only defensive turret.
    MgTurret,
    /// Air-only defensive launcher.
    SamSite,
}

impl BuildingKind {
    /// All building kinds in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Headquarters,
        Self::Barracks,
        Self::TankFactory,
        Self::Airfield,
        Self::Hospital,
        Self::MgTurret,
        Self::SamSite,
    ];

    /// Snake-case identifier used in data files and the wire protocol.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Headquarters => "headquarters",
            Self::Barracks => "barracks",
            Self::TankFactory => "tank_factory",
            Self::Airfield => "airfield",
            Self::Hospital => "hospital",
            Self::MgTurret => "mg_turret",
            Self::SamSite => "sam_site",
        }
    }

    /// Look a kind up by its identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

// ============================================================================
// Capabilities and categories
// ============================================================================

/// Capability flags consulted by the generic update systems.
///
/// ```
/// use frontline_core::archetypes::Capabilities;
///
/// let caps = Capabilities::CAN_CAPTURE.union(Capabilities::AIRBORNE);
/// assert!(caps.contains(Capabilities::CAN_CAPTURE));
/// assert!(!caps.contains(Capabilities::CORE));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities(u16);

impl Capabilities {
    /// No capabilities.
    pub const NONE: Self = Self(0);
    /// Counts toward territory capture.
    pub const CAN_CAPTURE: Self = Self(1 << 0);
    /// Flies; only air-capable weapons may target it.
    pub const AIRBORNE: Self = Self(1 << 1);
    /// Headquarters-equivalent; its loss eliminates the owner.
    pub const CORE: Self = Self(1 << 2);
    /// May be placed by players.
    pub const BUILDABLE: Self = Self(1 << 3);

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Check whether all flags in `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check whether any flag in `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Combine two flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Broad unit class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    /// Foot soldiers.
    #[default]
    Infantry,
    /// Wheeled or tracked.
    Vehicle,
    /// Helicopters, jets and drones.
    Aircraft,
}

/// Target class a weapon may declare a damage bonus against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetClass {
    /// Vehicle units.
    Vehicle,
    /// Any structure.
    Building,
    /// Airborne units.
    Air,
}

/// Which targets a weapon can engage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetDomain {
    /// Ground and air units, and structures.
    #[default]
    Any,
    /// Ground units and structures only.
    Ground,
    /// Airborne units only.
    Air,
}

impl TargetDomain {
    /// Whether a unit with the given airborne flag is a legal target.
    #[must_use]
    pub const fn allows_unit(self, airborne: bool) -> bool {
        match self {
            Self::Any => true,
            Self::Ground => !airborne,
            Self::Air => airborne,
        }
    }

    /// Whether structures are legal targets.
    #[must_use]
    pub const fn allows_buildings(self) -> bool {
        !matches!(self, Self::Air)
    }
}

/// Visual projectile style. Purely cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Rifle round.
    #[default]
    Bullet,
    /// Tracer burst.
    MachineGun,
    /// High-velocity round.
    Sniper,
    /// Tank shell.
    Cannon,
    /// Heavy tank shell.
    HeavyCannon,
    /// Unguided rocket.
    Rocket,
    /// Guided missile.
    Missile,
    /// Arcing artillery shell.
    Artillery,
    /// Rocket salvo.
    Mlrs,
    /// Free-fall bomb.
    Bomb,
}

impl EffectKind {
    /// Travel speed in map units per second.
    #[must_use]
    pub fn speed(self) -> Fixed {
        match self {
            Self::Bullet => Fixed::from_num(25),
            Self::MachineGun => Fixed::from_num(28),
            Self::Sniper => Fixed::from_num(35),
            Self::Cannon => Fixed::from_num(15),
            Self::HeavyCannon | Self::Missile => Fixed::from_num(12),
            Self::Rocket => Fixed::from_num(8),
            Self::Artillery => Fixed::from_num(6),
            Self::Mlrs => Fixed::from_num(7),
            Self::Bomb => Fixed::from_num(4),
        }
    }

    /// Number of trail points kept for rendering.
    #[must_use]
    pub const fn trail_length(self) -> usize {
        match self {
            Self::Bullet => 3,
            Self::MachineGun => 5,
            Self::Sniper | Self::Artillery => 10,
            Self::Cannon => 6,
            Self::HeavyCannon => 8,
            Self::Rocket => 15,
            Self::Missile => 20,
            Self::Mlrs => 12,
            Self::Bomb => 5,
        }
    }
}

// ============================================================================
// Profiles
// ============================================================================

/// Damage multiplier against one target class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageBonus {
    /// Class the bonus applies to.
    pub vs: TargetClass,
    /// Multiplier applied to base damage.
    #[serde(with = "fixed_str_serde")]
    pub multiplier: Fixed,
}

/// Weapon definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackProfile {
    /// Base damage per shot.
    #[serde(with = "fixed_str_serde")]
    pub damage: Fixed,
    /// Maximum firing distance.
    #[serde(with = "fixed_str_serde")]
    pub range: Fixed,
    /// Minimum firing distance (zero for most weapons).
    #[serde(default, with = "fixed_str_serde")]
    pub min_range: Fixed,
    /// Seconds between shots.
    #[serde(with = "fixed_str_serde")]
    pub interval: Fixed,
    /// Category bonuses.
    #[serde(default)]
    pub bonuses: Vec<DamageBonus>,
    /// Legal targets.
    #[serde(default)]
    pub domain: TargetDomain,
    /// Projectile look.
    #[serde(default)]
    pub effect: EffectKind,
}

impl AttackProfile {
    /// Create a weapon with no bonuses, no minimum range, hitting anything.
    #[must_use]
    pub fn new(damage: Fixed, range: Fixed, interval: Fixed) -> Self {
        Self {
            damage,
            range,
            min_range: Fixed::ZERO,
            interval,
            bonuses: Vec::new(),
            domain: TargetDomain::Any,
            effect: EffectKind::Bullet,
        }
    }

    /// Add a bonus multiplier against a target class.
    #[must_use]
    pub fn with_bonus(mut self, vs: TargetClass, multiplier: Fixed) -> Self {
        self.bonuses.push(DamageBonus { vs, multiplier });
        self
    }

    /// Set the minimum firing distance.
    #[must_use]
    pub fn with_min_range(mut self, min_range: Fixed) -> Self {
        self.min_range = min_range;
        self
    }

    /// Restrict legal targets.
    #[must_use]
    pub fn with_domain(mut self, domain: TargetDomain) -> Self {
        self.domain = domain;
        self
    }

    /// Set the projectile look.
    #[must_use]
    pub fn with_effect(mut self, effect: EffectKind) -> Self {
        self.effect = effect;
        self
    }

    /// Bonus multiplier against a target of the given classes (1 if none match).
    #[must_use]
    pub fn bonus_against(&self, classes: &[TargetClass]) -> Fixed {
        self.bonuses
            .iter()
            .filter(|bonus| classes.contains(&bonus.vs))
            .fold(Fixed::ONE, |acc, bonus| acc * bonus.multiplier)
    }
}

/// What a healer restores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealTarget {
    /// Friendly units (medics, hospitals).
    #[default]
    Units,
    /// Friendly structures (engineers).
    Structures,
}

/// Continuous healing definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealProfile {
    /// Hit points restored per second.
    #[serde(with = "fixed_str_serde")]
    pub rate: Fixed,
    /// Reach.
    #[serde(with = "fixed_str_serde")]
    pub range: Fixed,
    /// What gets healed.
    #[serde(default)]
    pub target: HealTarget,
}

impl HealProfile {
    /// Create a unit-healing profile.
    #[must_use]
    pub const fn new(rate: Fixed, range: Fixed) -> Self {
        Self {
            rate,
            range,
            target: HealTarget::Units,
        }
    }

    /// Heal structures instead of units.
    #[must_use]
    pub const fn for_structures(mut self) -> Self {
        self.target = HealTarget::Structures;
        self
    }
}

/// Level-scaling for upgradable defensive structures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeProfile {
    /// Highest level (level 1 is the initial build).
    pub max_level: u8,
    /// Dollars per upgrade, multiplied by the current level.
    pub cost_per_level: u32,
    /// Damage gained per level above 1, as a fraction of base.
    #[serde(with = "fixed_str_serde")]
    pub damage_per_level: Fixed,
    /// Range gained per level above 1, as a fraction of base.
    #[serde(with = "fixed_str_serde")]
    pub range_per_level: Fixed,
    /// Max hp gained per level above 1, as a fraction of base.
    #[serde(with = "fixed_str_serde")]
    pub hp_per_level: Fixed,
}

impl Default for UpgradeProfile {
    fn default() -> Self {
        Self {
            max_level: 3,
            cost_per_level: 1000,
            damage_per_level: ratio(1, 4),
            range_per_level: ratio(1, 10),
            hp_per_level: ratio(1, 5),
        }
    }
}

impl UpgradeProfile {
    fn multiplier(per_level: Fixed, level: u8) -> Fixed {
        Fixed::ONE + per_level * Fixed::from_num(level.saturating_sub(1))
    }

    /// Damage multiplier at `level`.
    #[must_use]
    pub fn damage_multiplier(&self, level: u8) -> Fixed {
        Self::multiplier(self.damage_per_level, level)
    }

    /// Range multiplier at `level`.
    #[must_use]
    pub fn range_multiplier(&self, level: u8) -> Fixed {
        Self::multiplier(self.range_per_level, level)
    }

    /// Max hp multiplier at `level`.
    #[must_use]
    pub fn hp_multiplier(&self, level: u8) -> Fixed {
        Self::multiplier(self.hp_per_level, level)
    }
}

// ============================================================================
// Archetypes
// ============================================================================

/// Immutable definition shared by every unit of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitArchetype {
    /// Display name.
    pub name: String,
    /// Broad class, used for damage bonuses.
    #[serde(default)]
    pub category: UnitCategory,
    /// Maximum hit points.
    #[serde(with = "fixed_str_serde")]
    pub max_hp: Fixed,
    /// Armor for the percentage mitigation formula.
    #[serde(default, with = "fixed_str_serde")]
    pub armor: Fixed,
    /// Movement speed in map units per second.
    #[serde(with = "fixed_str_serde")]
    pub speed: Fixed,
    /// Production cost.
    pub cost: Cost,
    /// Seconds of production.
    #[serde(with = "fixed_str_serde")]
    pub build_time: Fixed,
    /// Capability flags.
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Weapon, if any.
    #[serde(default)]
    pub attack: Option<AttackProfile>,
    /// Healing, if any.
    #[serde(default)]
    pub heal: Option<HealProfile>,
    /// Hp fraction below which the unit falls back (zero disables).
    #[serde(default, with = "fixed_str_serde")]
    pub retreat_below: Fixed,
}

impl UnitArchetype {
    /// Create an unarmed archetype.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        category: UnitCategory,
        max_hp: i32,
        speed: Fixed,
        cost: Cost,
        build_time: i32,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            max_hp: Fixed::from_num(max_hp),
            armor: Fixed::ZERO,
            speed,
            cost,
            build_time: Fixed::from_num(build_time),
            capabilities: Capabilities::NONE,
            attack: None,
            heal: None,
            retreat_below: Fixed::ZERO,
        }
    }

    /// Attach a weapon.
    #[must_use]
    pub fn with_attack(mut self, attack: AttackProfile) -> Self {
        self.attack = Some(attack);
        self
    }

    /// Attach a heal profile.
    #[must_use]
    pub fn with_heal(mut self, heal: HealProfile) -> Self {
        self.heal = Some(heal);
        self
    }

    /// Set armor.
    #[must_use]
    pub fn with_armor(mut self, armor: i32) -> Self {
        self.armor = Fixed::from_num(armor);
        self
    }

    /// Add capability flags.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = self.capabilities.union(capabilities);
        self
    }

    /// Set the retreat threshold as an hp fraction.
    #[must_use]
    pub fn with_retreat_below(mut self, fraction: Fixed) -> Self {
        self.retreat_below = fraction;
        self
    }

    /// Whether the unit counts toward capture.
    #[must_use]
    pub const fn can_capture(&self) -> bool {
        self.capabilities.contains(Capabilities::CAN_CAPTURE)
    }

    /// Whether the unit flies.
    #[must_use]
    pub const fn is_airborne(&self) -> bool {
        self.capabilities.contains(Capabilities::AIRBORNE)
    }

    /// Target classes this unit presents to incoming fire.
    #[must_use]
    pub fn target_classes(&self) -> Vec<TargetClass> {
        let mut classes = Vec::with_capacity(2);
        if self.category == UnitCategory::Vehicle {
            classes.push(TargetClass::Vehicle);
        }
        if self.is_airborne() {
            classes.push(TargetClass::Air);
        }
        classes
    }
}

/// Immutable definition shared by every building of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingArchetype {
    /// Display name.
    pub name: String,
    /// Maximum hit points at level 1.
    #[serde(with = "fixed_str_serde")]
    pub max_hp: Fixed,
    /// Armor for the percentage mitigation formula.
    #[serde(default, with = "fixed_str_serde")]
    pub armor: Fixed,
    /// Side length of the square footprint.
    #[serde(with = "fixed_str_serde")]
    pub size: Fixed,
    /// Construction cost.
    pub cost: Cost,
    /// Capability flags.
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Units this building can produce.
    #[serde(default)]
    pub produces: Vec<UnitKind>,
    /// Defensive weapon, if any.
    #[serde(default)]
    pub attack: Option<AttackProfile>,
    /// Healing aura, if any.
    #[serde(default)]
    pub heal: Option<HealProfile>,
    /// Upgrade scaling, if upgradable.
    #[serde(default)]
    pub upgrade: Option<UpgradeProfile>,
}

impl BuildingArchetype {
    /// Create a building archetype with no production, weapon or aura.
    #[must_use]
    pub fn new(name: impl Into<String>, max_hp: i32, size: Fixed, cost: Cost) -> Self {
        Self {
            name: name.into(),
            max_hp: Fixed::from_num(max_hp),
            armor: Fixed::ZERO,
            size,
            cost,
            capabilities: Capabilities::BUILDABLE,
            produces: Vec::new(),
            attack: None,
            heal: None,
            upgrade: None,
        }
    }

    /// Set the producible unit list.
    #[must_use]
    pub fn with_produces(mut self, units: Vec<UnitKind>) -> Self {
        self.produces = units;
        self
    }

    /// Attach a defensive weapon.
    #[must_use]
    pub fn with_attack(mut self, attack: AttackProfile) -> Self {
        self.attack = Some(attack);
        self
    }

    /// Attach a healing aura.
    #[must_use]
    pub fn with_heal(mut self, heal: HealProfile) -> Self {
        self.heal = Some(heal);
        self
    }

    /// Make the building upgradable.
    #[must_use]
    pub fn with_upgrade(mut self, upgrade: UpgradeProfile) -> Self {
        self.upgrade = Some(upgrade);
        self
    }

    /// Replace capability flags.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Whether this kind can produce `unit`.
    #[must_use]
    pub fn can_produce(&self, unit: UnitKind) -> bool {
        self.produces.contains(&unit)
    }

    /// Whether losing this building eliminates its owner.
    #[must_use]
    pub const fn is_core(&self) -> bool {
        self.capabilities.contains(Capabilities::CORE)
    }

    /// Whether players may place it.
    #[must_use]
    pub const fn is_buildable(&self) -> bool {
        self.capabilities.contains(Capabilities::BUILDABLE)
    }

    /// Weapon stats scaled to an upgrade level.
    #[must_use]
    pub fn attack_at_level(&self, level: u8) -> Option<AttackProfile> {
        let mut attack = self.attack.clone()?;
        if let Some(upgrade) = &self.upgrade {
            attack.damage *= upgrade.damage_multiplier(level);
            attack.range *= upgrade.range_multiplier(level);
        }
        Some(attack)
    }

    /// Max hp scaled to an upgrade level.
    #[must_use]
    pub fn max_hp_at_level(&self, level: u8) -> Fixed {
        match &self.upgrade {
            Some(upgrade) => self.max_hp * upgrade.hp_multiplier(level),
            None => self.max_hp,
        }
    }
}

// ============================================================================
// Table
// ============================================================================

/// Archetype lookup table keyed by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchetypeTable {
    /// Unit archetypes.
    pub units: BTreeMap<UnitKind, UnitArchetype>,
    /// Building archetypes.
    pub buildings: BTreeMap<BuildingKind, BuildingArchetype>,
}

impl ArchetypeTable {
    /// Look up a unit archetype.
    #[must_use]
    pub fn unit(&self, kind: UnitKind) -> Option<&UnitArchetype> {
        self.units.get(&kind)
    }

    /// Look up a building archetype.
    #[must_use]
    pub fn building(&self, kind: BuildingKind) -> Option<&BuildingArchetype> {
        self.buildings.get(&kind)
    }

    /// Parse a table from RON text and validate it.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let table: Self = ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        table.validate()?;
        Ok(table)
    }

    /// Load a table from a RON file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let table: Self = ron::from_str(&text).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        table.validate()?;
        Ok(table)
    }

    /// Check that every kind is defined and every number is sane.
    pub fn validate(&self) -> Result<()> {
        fn check_cost(what: &str, largest: u32) -> Result<()> {
            if largest > MAX_AMOUNT {
                return Err(GameError::InvalidConfig(format!(
                    "{what} cost must be at most {MAX_AMOUNT}, got {largest}"
                )));
            }
            Ok(())
        }

        for kind in UnitKind::ALL {
            let unit = self
                .unit(kind)
                .ok_or_else(|| GameError::InvalidConfig(format!("missing unit archetype '{}'", kind.id())))?;
            if unit.max_hp <= Fixed::ZERO || unit.build_time <= Fixed::ZERO {
                return Err(GameError::InvalidConfig(format!(
                    "unit '{}' needs positive max_hp and build_time",
                    kind.id()
                )));
            }
            if unit.armor <= Fixed::from_num(-100) {
                return Err(GameError::InvalidConfig(format!(
                    "unit '{}' armor must be above -100",
                    kind.id()
                )));
            }
            check_cost(&format!("unit '{}'", kind.id()), unit.cost.largest_amount())?;
            if let Some(attack) = &unit.attack {
                if attack.interval <= Fixed::ZERO || attack.min_range > attack.range {
                    return Err(GameError::InvalidConfig(format!(
                        "unit '{}' has an invalid attack profile",
                        kind.id()
                    )));
                }
            }
        }
        for kind in BuildingKind::ALL {
            let building = self.building(kind).ok_or_else(|| {
                GameError::InvalidConfig(format!("missing building archetype '{}'", kind.id()))
            })?;
            if building.max_hp <= Fixed::ZERO || building.size <= Fixed::ZERO {
                return Err(GameError::InvalidConfig(format!(
                    "building '{}' needs positive max_hp and size",
                    kind.id()
                )));
            }
            check_cost(&format!("building '{}'", kind.id()), building.cost.largest_amount())?;
            if let Some(upgrade) = &building.upgrade {
                let top = upgrade.cost_per_level.saturating_mul(u32::from(upgrade.max_level));
                check_cost(&format!("building '{}' upgrade", kind.id()), top)?;
            }
            if let Some(attack) = &building.attack {
                if attack.interval <= Fixed::ZERO {
                    return Err(GameError::InvalidConfig(format!(
                        "building '{}' has an invalid attack profile",
                        kind.id()
                    )));
                }
            }
        }
        Ok(())
    }
}

fn tenths(value: i32) -> Fixed {
    ratio(value, 10)
}

impl Default for ArchetypeTable {
    #[allow(clippy::too_many_lines)]
    fn default() -> Self {
        use TargetClass::{Air, Building, Vehicle};
        use UnitCategory::{Aircraft, Infantry, Vehicle as Armor};

        let n = Fixed::from_num;
        let capture = Capabilities::CAN_CAPTURE;
        let air = Capabilities::AIRBORNE;

        let mut units = BTreeMap::new();
        let mut add = |kind: UnitKind, archetype: UnitArchetype| {
            units.insert(kind, archetype);
        };

        add(
            UnitKind::Rifleman,
            UnitArchetype::new("Rifleman", Infantry, 100, tenths(15), Cost::dollars(100), 5)
                .with_capabilities(capture)
                .with_attack(AttackProfile::new(n(15), tenths(35), tenths(8))),
        );
        add(
            UnitKind::MachineGunner,
            UnitArchetype::new("Machine Gunner", Infantry, 120, tenths(12), Cost::dollars(200), 7)
                .with_capabilities(capture)
                .with_attack(
                    AttackProfile::new(n(8), n(4), ratio(15, 100)).with_effect(EffectKind::MachineGun),
                ),
        );
        add(
            UnitKind::Sniper,
            UnitArchetype::new("Sniper", Infantry, 60, n(1), Cost::dollars(400), 10)
                .with_capabilities(capture)
                .with_retreat_below(tenths(3))
                .with_attack(
                    AttackProfile::new(n(150), n(9), tenths(25)).with_effect(EffectKind::Sniper),
                ),
        );
        add(
            UnitKind::Rocketeer,
            UnitArchetype::new("Rocketeer", Infantry, 80, tenths(11), Cost::dollars(350), 8)
                .with_capabilities(capture)
                .with_attack(
                    AttackProfile::new(n(200), n(5), n(3))
                        .with_bonus(Vehicle, tenths(25))
                        .with_effect(EffectKind::Rocket),
                ),
        );
        add(
            UnitKind::Medic,
            UnitArchetype::new("Medic", Infantry, 70, tenths(14), Cost::dollars(250), 6)
                .with_capabilities(capture)
                .with_retreat_below(tenths(3))
                .with_heal(HealProfile::new(n(20), n(2))),
        );
        add(
            UnitKind::Engineer,
            UnitArchetype::new("Engineer", Infantry, 80, tenths(13), Cost::dollars(300), 8)
                .with_capabilities(capture)
                .with_attack(AttackProfile::new(n(10), n(2), n(1)))
                .with_heal(HealProfile::new(n(30), n(2)).for_structures()),
        );
        add(
            UnitKind::Apc,
            UnitArchetype::new("APC", Armor, 400, n(2), Cost::dollars(1500), 15)
                .with_armor(30)
                .with_attack(
                    AttackProfile::new(n(20), tenths(35), tenths(3)).with_effect(EffectKind::MachineGun),
                ),
        );
        add(
            UnitKind::LightTank,
            UnitArchetype::new("Light Tank", Armor, 600, tenths(18), Cost::dollars(3000), 20)
                .with_armor(50)
                .with_attack(
                    AttackProfile::new(n(80), n(5), tenths(15)).with_effect(EffectKind::Cannon),
                ),
        );
        add(
            UnitKind::MainBattleTank,
            UnitArchetype::new("Main Battle Tank", Armor, 1200, tenths(12), Cost::dollars(6000), 30)
                .with_armor(100)
                .with_attack(AttackProfile::new(n(150), n(6), n(2)).with_effect(EffectKind::Cannon)),
        );
        add(
            UnitKind::HeavyTank,
            UnitArchetype::new("Heavy Tank", Armor, 2000, tenths(8), Cost::dollars(10_000), 45)
                .with_armor(150)
                .with_attack(
                    AttackProfile::new(n(200), tenths(55), tenths(25))
                        .with_effect(EffectKind::HeavyCannon),
                ),
        );
        add(
            UnitKind::Artillery,
            UnitArchetype::new("Artillery", Armor, 300, tenths(6), Cost::dollars(5000), 25)
                .with_armor(20)
                .with_attack(
                    AttackProfile::new(n(300), n(15), n(5))
                        .with_min_range(n(4))
                        .with_effect(EffectKind::Artillery),
                ),
        );
        add(
            UnitKind::Mlrs,
            UnitArchetype::new("MLRS", Armor, 250, tenths(7), Cost::dollars(7000), 30)
                .with_armor(15)
                .with_attack(AttackProfile::new(n(100), n(18), tenths(5)).with_effect(EffectKind::Mlrs)),
        );
        add(
            UnitKind::AntiAir,
            UnitArchetype::new("Anti-Air", Armor, 350, n(1), Cost::dollars(4000), 20)
                .with_armor(25)
                .with_attack(
                    AttackProfile::new(n(120), n(10), tenths(8))
                        .with_bonus(Air, tenths(15))
                        .with_effect(EffectKind::Missile),
                ),
        );
        add(
            UnitKind::ScoutHeli,
            UnitArchetype::new("Scout Helicopter", Aircraft, 150, n(3), Cost::dollars(2000), 15)
                .with_capabilities(air)
                .with_retreat_below(ratio(1, 4))
                .with_attack(
                    AttackProfile::new(n(15), n(4), tenths(4)).with_effect(EffectKind::MachineGun),
                ),
        );
        add(
            UnitKind::AttackHeli,
            UnitArchetype::new("Attack Helicopter", Aircraft, 350, tenths(22), Cost::dollars(8000), 25)
                .with_capabilities(air)
                .with_attack(
                    AttackProfile::new(n(100), n(6), tenths(15))
                        .with_bonus(Vehicle, n(2))
                        .with_effect(EffectKind::Rocket),
                ),
        );
        add(
            UnitKind::Fighter,
            UnitArchetype::new("Fighter", Aircraft, 250, tenths(45), Cost::dollars(12_000), 30)
                .with_capabilities(air)
                .with_attack(
                    AttackProfile::new(n(80), n(8), n(1))
                        .with_bonus(Air, n(2))
                        .with_effect(EffectKind::Missile),
                ),
        );
        add(
            UnitKind::Bomber,
            UnitArchetype::new("Bomber", Aircraft, 400, tenths(28), Cost::dollars(15_000), 40)
                .with_capabilities(air)
                .with_attack(
                    AttackProfile::new(n(400), n(3), n(4))
                        .with_domain(TargetDomain::Ground)
                        .with_bonus(Building, n(2))
                        .with_effect(EffectKind::Bomb),
                ),
        );
        add(
            UnitKind::Drone,
            UnitArchetype::new("Drone", Aircraft, 120, tenths(18), Cost::dollars(6000), 20)
                .with_capabilities(air)
                .with_attack(
                    AttackProfile::new(n(150), n(10), n(3))
                        .with_bonus(Vehicle, tenths(25))
                        .with_effect(EffectKind::Missile),
                ),
        );

        let mut buildings = BTreeMap::new();
        buildings.insert(
            BuildingKind::Headquarters,
            BuildingArchetype::new("Headquarters", 50_000, n(3), Cost::dollars(0))
                .with_capabilities(Capabilities::CORE),
        );
        buildings.insert(
            BuildingKind::Barracks,
            BuildingArchetype::new("Barracks", 8000, n(2), Cost::dollars(2000)).with_produces(vec![
                UnitKind::Rifleman,
                UnitKind::MachineGunner,
                UnitKind::Sniper,
                UnitKind::Rocketeer,
                UnitKind::Medic,
                UnitKind::Engineer,
            ]),
        );
        buildings.insert(
            BuildingKind::TankFactory,
            BuildingArchetype::new("Tank Factory", 15_000, tenths(28), Cost::dollars(8000))
                .with_produces(vec![
                    UnitKind::Apc,
                    UnitKind::LightTank,
                    UnitKind::MainBattleTank,
                    UnitKind::HeavyTank,
                    UnitKind::Artillery,
                    UnitKind::Mlrs,
                    UnitKind::AntiAir,
                ]),
        );
        buildings.insert(
            BuildingKind::Airfield,
            BuildingArchetype::new("Airfield", 12_000, tenths(35), Cost::dollars(15_000))
                .with_produces(vec![
                    UnitKind::ScoutHeli,
                    UnitKind::AttackHeli,
                    UnitKind::Fighter,
                    UnitKind::Bomber,
                    UnitKind::Drone,
                ]),
        );
        buildings.insert(
            BuildingKind::Hospital,
            BuildingArchetype::new("Hospital", 5000, n(2), Cost::dollars(3000))
                .with_heal(HealProfile::new(n(50), n(8))),
        );
        buildings.insert(
            BuildingKind::MgTurret,
            BuildingArchetype::new("MG Turret", 2000, tenths(12), Cost::dollars(1500))
                .with_attack(
                    AttackProfile::new(n(25), n(6), tenths(2))
                        .with_domain(TargetDomain::Ground)
                        .with_effect(EffectKind::MachineGun),
                )
                .with_upgrade(UpgradeProfile::default()),
        );
        buildings.insert(
            BuildingKind::SamSite,
            BuildingArchetype::new("SAM Site", 3500, tenths(15), Cost::dollars(6000))
                .with_attack(
                    AttackProfile::new(n(200), n(12), tenths(15))
                        .with_domain(TargetDomain::Air)
                        .with_effect(EffectKind::Missile),
                )
                .with_upgrade(UpgradeProfile {
                    cost_per_level: 3000,
                    ..UpgradeProfile::default()
                }),
        );

        Self { units, buildings }
    }
}
