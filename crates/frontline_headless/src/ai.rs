//! Built-in AI opponent.
//!
//! An [`AiController`] drives one faction through the same order API an
//! external controller uses. Every `decision_interval` seconds it:
//!
//! 1. Places the next missing building from its build order (or, once the
//!    order is complete, occasionally a turret) on a random owned tile.
//! 2. Tops production queues up with weighted random unit choices.
//! 3. Sends idle capture-capable units to the nearest tile on the frontier.
//! 4. Attacks the nearest enemy core structure once enough idle combat units
//!    have gathered.
//! 5. Sells resources above its reserve and, if the profile allows, upgrades
//!    resource sites.
//!
//! All random choices draw from the simulation's seeded RNG, so a match with
//! AI factions is as reproducible as one without.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use frontline_core::archetypes::{BuildingKind, UnitKind};
use frontline_core::components::EntityId;
use frontline_core::economy::{amount, site_upgrade_cost, ResourceKind, MAX_AMOUNT};
use frontline_core::error::CommandResult;
use frontline_core::factions::FactionId;
use frontline_core::math::{fixed_str_serde, ratio, Fixed, Vec2Fixed};
use frontline_core::simulation::Simulation;
use frontline_core::territory::TileCoord;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

/// Error type for AI profile operations.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// File not found.
    #[error("AI profile file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read AI profile: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse AI profile: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A value is out of range.
    #[error("Invalid AI profile: {0}")]
    Invalid(String),
}

// ============================================================================
// Profile
// ============================================================================

/// How many of a building the AI wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Building kind.
    pub kind: BuildingKind,
    /// Desired count.
    pub count: usize,
}

impl BuildTarget {
    /// Create a build target.
    pub const fn new(kind: BuildingKind, count: usize) -> Self {
        Self { kind, count }
    }
}

/// Relative chance of picking a unit at a production building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedUnit {
    /// Unit kind.
    pub unit: UnitKind,
    /// Relative weight.
    pub weight: u32,
}

const fn weighted(unit: UnitKind, weight: u32) -> WeightedUnit {
    WeightedUnit { unit, weight }
}

/// AI tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiProfile {
    /// Profile name.
    pub name: String,
    /// Seconds between decisions.
    #[serde(with = "fixed_str_serde")]
    pub decision_interval: Fixed,
    /// Seconds before the first construction.
    #[serde(with = "fixed_str_serde")]
    pub first_build_delay: Fixed,
    /// Seconds between constructions.
    #[serde(with = "fixed_str_serde")]
    pub build_cooldown: Fixed,
    /// Seconds before the first attack.
    #[serde(with = "fixed_str_serde")]
    pub first_attack_delay: Fixed,
    /// Seconds between attacks.
    #[serde(with = "fixed_str_serde")]
    pub attack_cooldown: Fixed,
    /// Buildings to construct, in priority order.
    pub build_order: Vec<BuildTarget>,
    /// Percent chance per construction slot of adding a turret once the build order is done.
    pub turret_chance: u32,
    /// Random spots tried per construction.
    pub placement_attempts: u32,
    /// Queue length to keep at each production building.
    pub queue_target: usize,
    /// Unit choices per production building.
    pub unit_weights: BTreeMap<BuildingKind, Vec<WeightedUnit>>,
    /// Idle combat units needed before attacking.
    pub attack_group_size: usize,
    /// Capturers sent out per decision.
    pub max_capturers: usize,
    /// Resource units kept per kind; the rest is sold. `None` never sells.
    pub resource_reserve: Option<u32>,
    /// Whether to spend spare dollars on resource-site upgrades.
    pub upgrade_sites: bool,
    /// Dollars kept back when upgrading sites.
    pub dollar_reserve: u32,
}

impl Default for AiProfile {
    fn default() -> Self {
        Self::balanced()
    }
}

fn default_unit_weights() -> BTreeMap<BuildingKind, Vec<WeightedUnit>> {
    BTreeMap::from([
        (
            BuildingKind::Barracks,
            vec![
                weighted(UnitKind::Rifleman, 40),
                weighted(UnitKind::MachineGunner, 20),
                weighted(UnitKind::Rocketeer, 15),
                weighted(UnitKind::Sniper, 10),
                weighted(UnitKind::Medic, 15),
            ],
        ),
        (
            BuildingKind::TankFactory,
            vec![
                weighted(UnitKind::Apc, 30),
                weighted(UnitKind::LightTank, 30),
                weighted(UnitKind::HeavyTank, 20),
                weighted(UnitKind::AntiAir, 20),
            ],
        ),
        (
            BuildingKind::Airfield,
            vec![
                weighted(UnitKind::ScoutHeli, 30),
                weighted(UnitKind::Drone, 30),
                weighted(UnitKind::AttackHeli, 20),
                weighted(UnitKind::Fighter, 20),
            ],
        ),
    ])
}

impl AiProfile {
    /// Steady expansion with a mixed army.
    #[must_use]
    pub fn balanced() -> Self {
        Self {
            name: "balanced".to_string(),
            decision_interval: Fixed::from_num(2),
            first_build_delay: Fixed::from_num(10),
            build_cooldown: Fixed::from_num(15),
            first_attack_delay: Fixed::from_num(60),
            attack_cooldown: Fixed::from_num(45),
            build_order: vec![
                BuildTarget::new(BuildingKind::Barracks, 2),
                BuildTarget::new(BuildingKind::TankFactory, 2),
                BuildTarget::new(BuildingKind::Airfield, 1),
                BuildTarget::new(BuildingKind::Hospital, 1),
            ],
            turret_chance: 30,
            placement_attempts: 20,
            queue_target: 3,
            unit_weights: default_unit_weights(),
            attack_group_size: 10,
            max_capturers: 5,
            resource_reserve: Some(200),
            upgrade_sites: false,
            dollar_reserve: 0,
        }
    }

    /// Early, frequent attacks with cheap units.
    #[must_use]
    pub fn aggressive() -> Self {
        let mut unit_weights = default_unit_weights();
        unit_weights.insert(
            BuildingKind::Barracks,
            vec![
                weighted(UnitKind::Rifleman, 50),
                weighted(UnitKind::MachineGunner, 30),
                weighted(UnitKind::Rocketeer, 20),
            ],
        );
        unit_weights.insert(
            BuildingKind::TankFactory,
            vec![weighted(UnitKind::LightTank, 60), weighted(UnitKind::Apc, 40)],
        );
        Self {
            name: "aggressive".to_string(),
            first_build_delay: Fixed::from_num(6),
            first_attack_delay: Fixed::from_num(40),
            attack_cooldown: Fixed::from_num(30),
            build_order: vec![
                BuildTarget::new(BuildingKind::Barracks, 3),
                BuildTarget::new(BuildingKind::TankFactory, 1),
            ],
            turret_chance: 10,
            unit_weights,
            attack_group_size: 6,
            max_capturers: 3,
            ..Self::balanced()
        }
    }

    /// Territory and site upgrades first, late large attacks.
    #[must_use]
    pub fn economic() -> Self {
        Self {
            name: "economic".to_string(),
            first_attack_delay: Fixed::from_num(120),
            attack_cooldown: Fixed::from_num(60),
            build_order: vec![
                BuildTarget::new(BuildingKind::Barracks, 1),
                BuildTarget::new(BuildingKind::Hospital, 1),
                BuildTarget::new(BuildingKind::TankFactory, 2),
                BuildTarget::new(BuildingKind::Airfield, 1),
            ],
            turret_chance: 40,
            attack_group_size: 15,
            max_capturers: 8,
            resource_reserve: Some(100),
            upgrade_sites: true,
            dollar_reserve: 2000,
            ..Self::balanced()
        }
    }

    /// Load a profile from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ProfileError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ProfileError> {
        let profile: AiProfile = ron::from_str(ron)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Resolve a preset name or a path to a RON file.
    pub fn resolve(name_or_path: &str) -> Result<Self, ProfileError> {
        match name_or_path {
            "balanced" | "default" => Ok(Self::balanced()),
            "aggressive" | "rush" => Ok(Self::aggressive()),
            "economic" | "eco" => Ok(Self::economic()),
            path => Self::load(path),
        }
    }

    /// Reject values the controller cannot work with.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.decision_interval <= Fixed::ZERO {
            return Err(ProfileError::Invalid("decision_interval must be positive".into()));
        }
        if self.build_cooldown < Fixed::ZERO || self.attack_cooldown < Fixed::ZERO {
            return Err(ProfileError::Invalid("cooldowns cannot be negative".into()));
        }
        if self.turret_chance > 100 {
            return Err(ProfileError::Invalid(format!(
                "turret_chance is a percentage, got {}",
                self.turret_chance
            )));
        }
        if self.attack_group_size == 0 {
            return Err(ProfileError::Invalid("attack_group_size must be at least 1".into()));
        }
        let reserve = self.resource_reserve.unwrap_or(0).max(self.dollar_reserve);
        if reserve > MAX_AMOUNT {
            return Err(ProfileError::Invalid(format!(
                "reserves must be at most {MAX_AMOUNT}, got {reserve}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Controller
// ============================================================================

/// What one controller update did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AiTurn {
    /// Whether a decision ran this update.
    pub decided: bool,
    /// Orders the simulation accepted.
    pub issued: u32,
    /// Orders the simulation rejected.
    pub rejected: u32,
}

impl AiTurn {
    fn record<T>(&mut self, faction: FactionId, order: &str, result: CommandResult<T>) -> bool {
        match result {
            Ok(_) => {
                self.issued += 1;
                true
            }
            Err(e) => {
                self.rejected += 1;
                debug!(%faction, order, reason = e.code(), "AI order rejected");
                false
            }
        }
    }
}

/// Drives one faction.
#[derive(Debug, Clone)]
pub struct AiController {
    faction: FactionId,
    profile: AiProfile,
    decision_timer: Fixed,
    build_timer: Fixed,
    attack_timer: Fixed,
}

impl AiController {
    /// Create a controller for `faction`.
    #[must_use]
    pub fn new(faction: FactionId, profile: AiProfile) -> Self {
        Self {
            faction,
            decision_timer: Fixed::ZERO,
            build_timer: profile.first_build_delay,
            attack_timer: profile.first_attack_delay,
            profile,
        }
    }

    /// The controlled faction.
    #[must_use]
    pub const fn faction(&self) -> FactionId {
        self.faction
    }

    /// The active profile.
    #[must_use]
    pub fn profile(&self) -> &AiProfile {
        &self.profile
    }

    /// Advance the decision clock by `dt` and act if a decision is due.
    ///
    /// Call once per tick, before [`Simulation::tick`], with the same `dt`.
    pub fn update(&mut self, sim: &mut Simulation, dt: Fixed) -> AiTurn {
        if sim.outcome().is_some() || sim.is_eliminated(self.faction) {
            return AiTurn::default();
        }
        self.decision_timer += dt.clamp(Fixed::ZERO, sim.config().max_dt);
        if self.decision_timer < self.profile.decision_interval {
            return AiTurn::default();
        }
        let elapsed = self.decision_timer;
        self.decision_timer = Fixed::ZERO;
        self.build_timer -= elapsed;
        self.attack_timer -= elapsed;

        let mut turn = AiTurn {
            decided: true,
            ..AiTurn::default()
        };
        self.construct(sim, &mut turn);
        self.produce(sim, &mut turn);
        let capturers = self.expand(sim, &mut turn);
        self.attack(sim, &capturers, &mut turn);
        self.sell_surplus(sim, &mut turn);
        self.upgrade_sites(sim, &mut turn);

        trace!(
            faction = %self.faction,
            issued = turn.issued,
            rejected = turn.rejected,
            "AI decision"
        );
        turn
    }

    fn next_building(&self, sim: &mut Simulation) -> Option<BuildingKind> {
        let mut owned: BTreeMap<BuildingKind, usize> = BTreeMap::new();
        for building in sim.store().buildings_of(self.faction).filter(|b| b.is_alive()) {
            *owned.entry(building.kind).or_default() += 1;
        }
        let missing = self
            .profile
            .build_order
            .iter()
            .find(|target| owned.get(&target.kind).copied().unwrap_or(0) < target.count);
        if let Some(target) = missing {
            return Some(target.kind);
        }
        if self.profile.turret_chance == 0 || sim.rng().gen_range(0..100) >= self.profile.turret_chance {
            return None;
        }
        if sim.rng().gen_range(0..2) == 0 {
            Some(BuildingKind::MgTurret)
        } else {
            Some(BuildingKind::SamSite)
        }
    }

    fn construct(&mut self, sim: &mut Simulation, turn: &mut AiTurn) {
        if self.build_timer > Fixed::ZERO {
            return;
        }
        let Some(kind) = self.next_building(sim) else {
            return;
        };
        let Some((cost, size)) = sim.archetypes().building(kind).map(|a| (a.cost.clone(), a.size)) else {
            return;
        };
        if !sim.ledger(self.faction).is_some_and(|l| l.can_afford(&cost)) {
            return;
        }
        let tiles = sim.grid().owned_tiles(self.faction);
        if tiles.is_empty() {
            return;
        }

        let tile_size = sim.grid().tile_size();
        let span = (tile_size - size).max(Fixed::ZERO);
        let half = size / 2;
        for _ in 0..self.profile.placement_attempts {
            let tile = tiles[sim.rng().gen_range(0..tiles.len())];
            let dx = ratio(sim.rng().gen_range(0..=100), 100) * span + half;
            let dy = ratio(sim.rng().gen_range(0..=100), 100) * span + half;
            let spot = sim.grid().tile_origin(tile) + Vec2Fixed::new(dx, dy);
            if sim.check_placement(kind, spot, self.faction).is_err() {
                continue;
            }
            if turn.record(self.faction, "place", sim.place_building(kind, spot, self.faction)) {
                debug!(faction = %self.faction, building = kind.id(), "AI placed building");
                self.build_timer = self.profile.build_cooldown;
            }
            return;
        }
    }

    fn produce(&self, sim: &mut Simulation, turn: &mut AiTurn) {
        let mut jobs: Vec<(EntityId, Vec<(UnitKind, u32)>)> = Vec::new();
        for building in sim.store().buildings_of(self.faction).filter(|b| b.is_alive()) {
            if building.queue.len() >= self.profile.queue_target {
                continue;
            }
            let (Some(archetype), Some(weights)) = (
                sim.archetypes().building(building.kind),
                self.profile.unit_weights.get(&building.kind),
            ) else {
                continue;
            };
            let options: Vec<(UnitKind, u32)> = weights
                .iter()
                .filter(|w| w.weight > 0 && archetype.can_produce(w.unit))
                .map(|w| (w.unit, w.weight))
                .collect();
            if !options.is_empty() {
                jobs.push((building.id, options));
            }
        }

        for (building, options) in jobs {
            let total: u32 = options.iter().map(|(_, weight)| weight).sum();
            let mut roll = sim.rng().gen_range(0..total);
            let mut choice = options[0].0;
            for (unit, weight) in &options {
                if roll < *weight {
                    choice = *unit;
                    break;
                }
                roll -= weight;
            }

            let affordable = sim
                .archetypes()
                .unit(choice)
                .zip(sim.ledger(self.faction))
                .is_some_and(|(archetype, ledger)| ledger.can_afford(&archetype.cost));
            if affordable {
                turn.record(self.faction, "queue", sim.queue_unit(building, choice));
            }
        }
    }

    /// Send idle capturers to frontier tiles. Returns the units now busy capturing.
    fn expand(&self, sim: &mut Simulation, turn: &mut AiTurn) -> BTreeSet<EntityId> {
        let grid = sim.grid();
        let faction = self.faction;
        let capturers: Vec<(EntityId, Vec2Fixed, Option<TileCoord>)> = sim
            .store()
            .units_of(faction)
            .filter(|u| u.is_alive() && u.is_idle())
            .filter(|u| sim.archetypes().unit(u.kind).is_some_and(|a| a.can_capture()))
            .take(self.profile.max_capturers)
            .map(|u| (u.id, u.position, grid.tile_at(u.position)))
            .collect();
        let frontier: Vec<TileCoord> = grid
            .tiles()
            .filter(|tile| tile.owner != Some(faction) && grid.is_adjacent_to_territory(tile.coord, faction))
            .map(|tile| tile.coord)
            .collect();

        let mut busy = BTreeSet::new();
        let mut claimed: BTreeSet<TileCoord> = BTreeSet::new();
        let mut orders = Vec::new();
        for (id, position, tile) in capturers {
            if tile.is_some_and(|t| grid.owner_of(t) != Some(faction)) {
                busy.insert(id);
                continue;
            }
            let nearest = frontier
                .iter()
                .filter(|t| !claimed.contains(*t))
                .min_by_key(|t| (grid.tile_center(**t).distance_squared(position), **t))
                .or_else(|| frontier.iter().min_by_key(|t| (grid.tile_center(**t).distance_squared(position), **t)));
            if let Some(target) = nearest {
                claimed.insert(*target);
                busy.insert(id);
                orders.push((id, grid.tile_center(*target)));
            }
        }

        for (id, point) in orders {
            turn.record(self.faction, "move", sim.issue_move_order(&[id], point));
        }
        busy
    }

    fn attack(&mut self, sim: &mut Simulation, capturers: &BTreeSet<EntityId>, turn: &mut AiTurn) {
        if self.attack_timer > Fixed::ZERO {
            return;
        }
        let faction = self.faction;
        let army: Vec<EntityId> = sim
            .store()
            .units_of(faction)
            .filter(|u| u.is_alive() && u.is_idle() && !capturers.contains(&u.id))
            .filter(|u| sim.archetypes().unit(u.kind).is_some_and(|a| a.attack.is_some()))
            .map(|u| u.id)
            .collect();
        if army.len() < self.profile.attack_group_size {
            return;
        }
        let Some(target) = self.pick_target(sim) else {
            return;
        };

        let jitter = sim.grid().tile_size() / 2;
        let dx = ratio(sim.rng().gen_range(-100..=100), 100) * jitter;
        let dy = ratio(sim.rng().gen_range(-100..=100), 100) * jitter;
        let point = sim.grid().clamp_to_bounds(target + Vec2Fixed::new(dx, dy));
        if turn.record(faction, "attack_move", sim.issue_move_order(&army, point)) {
            debug!(%faction, units = army.len(), "AI attack launched");
            self.attack_timer = self.profile.attack_cooldown;
        }
    }

    /// Nearest enemy core structure, else nearest enemy building, else nearest enemy unit.
    fn pick_target(&self, sim: &Simulation) -> Option<Vec2Fixed> {
        let store = sim.store();
        let archetypes = sim.archetypes();
        let is_core = |kind| archetypes.building(kind).is_some_and(|a| a.is_core());
        let home = store
            .buildings_of(self.faction)
            .find(|b| b.is_alive() && is_core(b.kind))
            .map(|b| b.position)
            .or_else(|| store.units_of(self.faction).next().map(|u| u.position))?;
        let nearest = |points: Vec<Vec2Fixed>| points.into_iter().min_by_key(|p| p.distance_squared(home));

        let enemy_buildings = || store.buildings().filter(move |b| b.is_alive() && b.owner != self.faction);
        nearest(enemy_buildings().filter(|b| is_core(b.kind)).map(|b| b.position).collect())
            .or_else(|| nearest(enemy_buildings().map(|b| b.position).collect()))
            .or_else(|| {
                nearest(
                    store
                        .units()
                        .filter(|u| u.is_alive() && u.owner != self.faction)
                        .map(|u| u.position)
                        .collect(),
                )
            })
    }

    fn sell_surplus(&self, sim: &mut Simulation, turn: &mut AiTurn) {
        let Some(reserve) = self.profile.resource_reserve else {
            return;
        };
        let Some(ledger) = sim.ledger(self.faction).copied() else {
            return;
        };
        let reserve = amount(reserve);
        for kind in ResourceKind::ALL {
            let surplus = (ledger.resource(kind) - reserve).floor();
            if surplus >= Fixed::ONE {
                turn.record(self.faction, "sell", sim.sell_resource(self.faction, kind, surplus));
            }
        }
    }

    fn upgrade_sites(&self, sim: &mut Simulation, turn: &mut AiTurn) {
        if !self.profile.upgrade_sites {
            return;
        }
        let config = sim.config();
        let candidate = sim
            .store()
            .resource_sites()
            .filter(|site| site.level < config.resource_max_level)
            .filter(|site| sim.grid().owner_of(site.tile) == Some(self.faction))
            .min_by_key(|site| (site.level, site.id))
            .map(|site| {
                let cost = site_upgrade_cost(config.site_upgrade_base_cost, config.site_upgrade_cost_growth, site.level);
                (site.id, cost)
            });
        let Some((site, cost)) = candidate else {
            return;
        };
        let budget = amount(cost).saturating_add(amount(self.profile.dollar_reserve));
        if sim.ledger(self.faction).is_some_and(|l| l.dollars >= budget) {
            turn.record(self.faction, "upgrade_site", sim.upgrade_resource_site(site, self.faction));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontline_core::archetypes::ArchetypeTable;
    use frontline_core::config::SimConfig;

    fn duel() -> Simulation {
        let mut sim = Simulation::new(SimConfig::default(), ArchetypeTable::default(), 8, 8, 7).unwrap();
        sim.setup_faction(FactionId(0), TileCoord::new(1, 1)).unwrap();
        sim.setup_faction(FactionId(1), TileCoord::new(6, 6)).unwrap();
        sim
    }

    fn dt() -> Fixed {
        ratio(1, 16)
    }

    fn decide(ai: &mut AiController, sim: &mut Simulation) -> AiTurn {
        for _ in 0..32 {
            let turn = ai.update(sim, dt());
            if turn.decided {
                return turn;
            }
        }
        AiTurn::default()
    }

    fn run(sim: &mut Simulation, ais: &mut [AiController], ticks: usize) {
        for _ in 0..ticks {
            for ai in ais.iter_mut() {
                ai.update(sim, dt());
            }
            sim.tick(dt());
        }
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    #[test]
    fn test_presets_validate() {
        for profile in [AiProfile::balanced(), AiProfile::aggressive(), AiProfile::economic()] {
            assert!(profile.validate().is_ok(), "{} should validate", profile.name);
        }
    }

    #[test]
    fn test_resolve_names() {
        assert_eq!(AiProfile::resolve("rush").unwrap().name, "aggressive");
        assert_eq!(AiProfile::resolve("eco").unwrap().name, "economic");
        assert!(matches!(
            AiProfile::resolve("/definitely/missing.ron"),
            Err(ProfileError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let profile = AiProfile::from_ron_str(r#"(name: "custom", decision_interval: "1.5", attack_group_size: 4)"#).unwrap();
        assert_eq!(profile.decision_interval, Fixed::from_num(1.5));
        assert_eq!(profile.attack_group_size, 4);
        assert_eq!(profile.build_order, AiProfile::balanced().build_order);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AiProfile::from_ron_str(r#"(decision_interval: "0")"#),
            Err(ProfileError::Invalid(_))
        ));
        assert!(matches!(
            AiProfile::from_ron_str("(turret_chance: 150)"),
            Err(ProfileError::Invalid(_))
        ));
    }

    #[test]
    fn test_oversized_reserves_rejected() {
        assert!(matches!(
            AiProfile::from_ron_str("(dollar_reserve: 3000000000)"),
            Err(ProfileError::Invalid(_))
        ));
        assert!(matches!(
            AiProfile::from_ron_str("(resource_reserve: Some(4000000000))"),
            Err(ProfileError::Invalid(_))
        ));
        assert!(AiProfile::from_ron_str("(resource_reserve: None)").is_ok());
    }

    #[test]
    fn test_profile_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("economic.ron");
        let text = ron::ser::to_string_pretty(&AiProfile::economic(), ron::ser::PrettyConfig::default()).unwrap();
        std::fs::write(&path, text).unwrap();
        assert_eq!(AiProfile::load(&path).unwrap(), AiProfile::economic());
    }

    // =========================================================================
    // Decisions
    // =========================================================================

    #[test]
    fn test_waits_for_decision_interval() {
        let mut sim = duel();
        let mut ai = AiController::new(FactionId(0), AiProfile::balanced());
        for _ in 0..31 {
            assert!(!ai.update(&mut sim, dt()).decided);
        }
        assert!(ai.update(&mut sim, dt()).decided);
    }

    #[test]
    fn test_first_decision_queues_and_expands() {
        let mut sim = duel();
        let mut ai = AiController::new(FactionId(0), AiProfile::balanced());
        let turn = decide(&mut ai, &mut sim);
        assert!(turn.decided);
        assert_eq!(turn.rejected, 0);

        let barracks = sim
            .store()
            .buildings_of(FactionId(0))
            .find(|b| b.kind == BuildingKind::Barracks)
            .unwrap();
        assert_eq!(barracks.queue.len(), 1);

        let moving = sim
            .store()
            .units_of(FactionId(0))
            .filter(|u| u.move_target.is_some())
            .count();
        assert_eq!(moving, 5);
        for unit in sim.store().units_of(FactionId(0)) {
            let target = unit.move_target.unwrap();
            let tile = sim.grid().tile_at(target).unwrap();
            assert_ne!(sim.grid().owner_of(tile), Some(FactionId(0)));
        }
    }

    #[test]
    fn test_no_construction_before_first_delay() {
        let mut sim = duel();
        let mut ai = AiController::new(FactionId(0), AiProfile::balanced());
        run(&mut sim, std::slice::from_mut(&mut ai), 150);
        let barracks = sim
            .store()
            .buildings_of(FactionId(0))
            .filter(|b| b.kind == BuildingKind::Barracks)
            .count();
        assert_eq!(barracks, 1);
    }

    #[test]
    fn test_builds_second_barracks() {
        let mut sim = duel();
        let mut ai = AiController::new(FactionId(0), AiProfile::balanced());
        run(&mut sim, std::slice::from_mut(&mut ai), 400);
        let barracks = sim
            .store()
            .buildings_of(FactionId(0))
            .filter(|b| b.kind == BuildingKind::Barracks)
            .count();
        assert_eq!(barracks, 2);
        assert!(sim.validate_invariants().is_ok());
    }

    #[test]
    fn test_sells_surplus_resources() {
        let mut sim = duel();
        let mut snapshot = sim.snapshot();
        snapshot
            .ledgers
            .get_mut(FactionId(0))
            .unwrap()
            .credit(ResourceKind::Gold, Fixed::from_num(500));
        sim.apply_snapshot(snapshot).unwrap();

        let mut ai = AiController::new(FactionId(0), AiProfile::balanced());
        assert!(decide(&mut ai, &mut sim).decided);
        let gold = sim.ledger(FactionId(0)).unwrap().resource(ResourceKind::Gold);
        assert_eq!(gold, Fixed::from_num(200));
    }

    #[test]
    fn test_eliminated_faction_is_passive() {
        let mut sim = duel();
        let mut ai = AiController::new(FactionId(0), AiProfile::aggressive());
        let mut snapshot = sim.snapshot();
        snapshot.outcome = Some(frontline_core::simulation::MatchOutcome::Draw);
        sim.apply_snapshot(snapshot).unwrap();
        assert_eq!(ai.update(&mut sim, Fixed::from_num(5)), AiTurn::default());
    }

    #[test]
    fn test_ai_match_is_deterministic() {
        let play = || {
            let mut sim = duel();
            let mut ais = vec![
                AiController::new(FactionId(0), AiProfile::balanced()),
                AiController::new(FactionId(1), AiProfile::aggressive()),
            ];
            run(&mut sim, &mut ais, 600);
            sim.state_hash()
        };
        assert_eq!(play(), play());
    }
}
