//! Scenario loading and configuration.
//!
//! Scenarios define how a headless match is set up: map preset and seed,
//! which factions take part and who controls them, the tick rate and the
//! time limit. Simulation tuning and archetype tables can be overridden by
//! pointing at RON data files.

use std::path::{Path, PathBuf};

use frontline_core::archetypes::ArchetypeTable;
use frontline_core::config::SimConfig;
use frontline_core::error::GameError;
use frontline_core::map_generation::{MapConfig, MapSize};
use frontline_core::math::Fixed;
use frontline_core::simulation::Simulation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario is well-formed but unusable.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
    /// The simulation refused the setup or a referenced data file.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Who issues orders for a faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Controller {
    /// Orders arrive over the JSON-lines protocol.
    #[default]
    External,
    /// A built-in AI opponent using the named profile.
    Ai {
        /// Profile name (`balanced`, `aggressive`, `economic`) or path to a RON profile.
        profile: String,
    },
    /// Nobody; the faction only defends itself.
    Idle,
}

impl Controller {
    /// Shorthand for an AI controller.
    pub fn ai(profile: &str) -> Self {
        Self::Ai {
            profile: profile.to_string(),
        }
    }
}

/// One participant in a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionSetup {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Who controls the faction.
    #[serde(default)]
    pub controller: Controller,
}

impl FactionSetup {
    /// Create a faction setup.
    pub fn new(name: &str, controller: Controller) -> Self {
        Self {
            name: name.to_string(),
            controller,
        }
    }
}

/// Highest accepted tick rate.
pub const MAX_TICK_RATE: u32 = 1000;

fn default_tick_rate() -> u32 {
    10
}

fn default_max_duration() -> u32 {
    1800
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map preset.
    #[serde(default)]
    pub map_size: MapSize,
    /// Seed for map generation and the simulation RNG.
    #[serde(default)]
    pub seed: u64,
    /// Participants, in faction-id order.
    pub factions: Vec<FactionSetup>,
    /// Ticks per simulated second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    /// Simulated seconds before a match is called a timeout.
    #[serde(default = "default_max_duration")]
    pub max_duration_seconds: u32,
    /// Optional simulation tuning file (RON).
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    /// Optional archetype table file (RON).
    #[serde(default)]
    pub archetypes_path: Option<PathBuf>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish_1v1()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario = Self::from_ron_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Resolve a preset name or a path to a RON file.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match name_or_path {
            "skirmish_1v1" | "default" => Ok(Self::skirmish_1v1()),
            "vs_ai" => Ok(Self::vs_ai()),
            "free_for_all" | "ffa" => Ok(Self::free_for_all()),
            "sandbox" => Ok(Self::sandbox()),
            path => Self::load(path),
        }
    }

    /// Two AI opponents on a small map.
    #[must_use]
    pub fn skirmish_1v1() -> Self {
        Self {
            name: "skirmish_1v1".to_string(),
            description: "Balanced AI against aggressive AI on a small map".to_string(),
            map_size: MapSize::Small,
            seed: 12345,
            factions: vec![
                FactionSetup::new("Blue", Controller::ai("balanced")),
                FactionSetup::new("Red", Controller::ai("aggressive")),
            ],
            tick_rate: default_tick_rate(),
            max_duration_seconds: default_max_duration(),
            config_path: None,
            archetypes_path: None,
        }
    }

    /// An external controller against a balanced AI.
    #[must_use]
    pub fn vs_ai() -> Self {
        Self {
            name: "vs_ai".to_string(),
            description: "Faction 0 is driven over stdin, faction 1 by the AI".to_string(),
            factions: vec![
                FactionSetup::new("Player", Controller::External),
                FactionSetup::new("Computer", Controller::ai("balanced")),
            ],
            ..Self::skirmish_1v1()
        }
    }

    /// Four AI opponents on a large map.
    #[must_use]
    pub fn free_for_all() -> Self {
        Self {
            name: "free_for_all".to_string(),
            description: "Four AI factions on a large map".to_string(),
            map_size: MapSize::Large,
            factions: vec![
                FactionSetup::new("Blue", Controller::ai("balanced")),
                FactionSetup::new("Red", Controller::ai("aggressive")),
                FactionSetup::new("Green", Controller::ai("economic")),
                FactionSetup::new("Yellow", Controller::ai("balanced")),
            ],
            max_duration_seconds: 3600,
            ..Self::skirmish_1v1()
        }
    }

    /// Two passive factions, for scripted tests.
    #[must_use]
    pub fn sandbox() -> Self {
        Self {
            name: "sandbox".to_string(),
            description: "Two factions with no AI".to_string(),
            factions: vec![
                FactionSetup::new("Blue", Controller::External),
                FactionSetup::new("Red", Controller::Idle),
            ],
            ..Self::skirmish_1v1()
        }
    }

    /// Override the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Override the time limit.
    #[must_use]
    pub fn with_max_duration(mut self, seconds: u32) -> Self {
        self.max_duration_seconds = seconds;
        self
    }

    /// Check values the simulation cannot repair on its own.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.factions.is_empty() {
            return Err(ScenarioError::Invalid("at least one faction is required".into()));
        }
        if self.factions.len() > 8 {
            return Err(ScenarioError::Invalid(format!(
                "{} factions requested, at most 8 are supported",
                self.factions.len()
            )));
        }
        if self.tick_rate == 0 || self.tick_rate > MAX_TICK_RATE {
            return Err(ScenarioError::Invalid(format!(
                "tick_rate must be within 1..={MAX_TICK_RATE}, got {}",
                self.tick_rate
            )));
        }
        Ok(())
    }

    /// Seconds per tick.
    #[must_use]
    pub fn dt(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.clamp(1, MAX_TICK_RATE))
    }

    /// Tick budget implied by the time limit.
    #[must_use]
    pub fn max_ticks(&self) -> u64 {
        u64::from(self.max_duration_seconds) * u64::from(self.tick_rate)
    }

    /// Load the simulation tuning, falling back to defaults.
    pub fn sim_config(&self) -> Result<SimConfig, ScenarioError> {
        match &self.config_path {
            Some(path) => Ok(SimConfig::load(path)?),
            None => Ok(SimConfig::default()),
        }
    }

    /// Load the archetype table, falling back to the built-in one.
    pub fn archetype_table(&self) -> Result<ArchetypeTable, ScenarioError> {
        match &self.archetypes_path {
            Some(path) => Ok(ArchetypeTable::load(path)?),
            None => Ok(ArchetypeTable::default()),
        }
    }

    /// Map generation parameters for this scenario.
    #[must_use]
    pub fn map_config(&self) -> MapConfig {
        MapConfig {
            size: self.map_size,
            seed: self.seed,
            factions: self.factions.len() as u8,
        }
    }

    /// Generate the map and set every faction up.
    pub fn build_simulation(&self) -> Result<Simulation, ScenarioError> {
        self.validate()?;
        let sim = Simulation::generate(self.sim_config()?, self.archetype_table()?, &self.map_config())?;
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontline_core::factions::FactionId;

    #[test]
    fn test_presets_are_valid() {
        for scenario in [
            Scenario::skirmish_1v1(),
            Scenario::vs_ai(),
            Scenario::free_for_all(),
            Scenario::sandbox(),
        ] {
            assert!(scenario.validate().is_ok(), "{} should validate", scenario.name);
        }
    }

    #[test]
    fn test_resolve_presets() {
        assert_eq!(Scenario::resolve("ffa").unwrap().factions.len(), 4);
        assert!(matches!(
            Scenario::resolve("/definitely/missing.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_parse_minimal_ron() {
        let scenario = Scenario::from_ron_str(
            r#"(
                name: "mini",
                factions: [
                    (name: "A", controller: Ai(profile: "economic")),
                    (controller: External),
                ],
            )"#,
        )
        .unwrap();

        assert_eq!(scenario.map_size, MapSize::Medium);
        assert_eq!(scenario.tick_rate, 10);
        assert_eq!(scenario.max_ticks(), 18_000);
        assert_eq!(scenario.factions[0].controller, Controller::ai("economic"));
        assert_eq!(scenario.factions[1].name, "");
    }

    #[test]
    fn test_empty_faction_list_rejected() {
        let err = Scenario::from_ron_str(r#"(name: "empty", factions: [])"#).unwrap_err();
        assert!(matches!(err, ScenarioError::Invalid(_)));
    }

    #[test]
    fn test_zero_tick_rate_rejected() {
        let mut scenario = Scenario::sandbox();
        scenario.tick_rate = 0;
        assert!(scenario.build_simulation().is_err());
    }

    #[test]
    fn test_oversized_tick_rate_rejected() {
        let mut scenario = Scenario::sandbox();
        scenario.tick_rate = 3_000_000_000;
        assert!(matches!(scenario.validate(), Err(ScenarioError::Invalid(_))));
        assert_eq!(scenario.dt(), Fixed::ONE / Fixed::from_num(MAX_TICK_RATE));
    }

    #[test]
    fn test_dt_from_tick_rate() {
        let mut scenario = Scenario::sandbox();
        scenario.tick_rate = 4;
        assert_eq!(scenario.dt(), Fixed::from_num(0.25));
    }

    #[test]
    fn test_build_simulation() {
        let sim = Scenario::skirmish_1v1().build_simulation().unwrap();
        assert_eq!(sim.factions(), &[FactionId(0), FactionId(1)]);
        assert!(sim.store().resource_site_count() > 0);
        assert!(sim.validate_invariants().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.ron");
        let text = ron::ser::to_string_pretty(&Scenario::vs_ai(), ron::ser::PrettyConfig::default()).unwrap();
        std::fs::write(&path, text).unwrap();

        let loaded = Scenario::load(&path).unwrap();
        assert_eq!(loaded, Scenario::vs_ai());
    }

    #[test]
    fn test_missing_data_file_is_reported() {
        let mut scenario = Scenario::sandbox();
        scenario.config_path = Some(PathBuf::from("/definitely/missing_config.ron"));
        assert!(matches!(scenario.build_simulation(), Err(ScenarioError::Game(_))));
    }
}
