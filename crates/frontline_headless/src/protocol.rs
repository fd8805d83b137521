//! JSON protocol for headless match control.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from an external controller
//! **Output (stdout):** Responses and state summaries
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. Controller sends commands as JSON lines
//! 3. Runner answers every command with exactly one response line
//! 4. When a match is decided, a `game_over` line follows the tick summary
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"queue","building":2,"unit_type":"rifleman"}
//! <- {"type":"ack","cmd":"queue"}
//! -> {"cmd":"tick","count":50}
//! <- {"type":"ticked","tick":50,"summary":{...}}
//! -> {"cmd":"move","units":[3,4,5],"x":200.0,"y":120.0}
//! <- {"type":"ack","cmd":"move"}
//! -> {"cmd":"place","building_type":"hospital","x":60.0,"y":80.0,"faction":0}
//! <- {"type":"placed","entity_id":42,"building_type":"hospital"}
//! ```

use std::collections::BTreeMap;

use frontline_core::archetypes::{BuildingKind, UnitKind};
use frontline_core::capture::CaptureEvent;
use frontline_core::components::{CombatState, EntityId};
use frontline_core::economy::ResourceKind;
use frontline_core::error::CommandError;
use frontline_core::math::{Fixed, Vec2Fixed};
use frontline_core::production::ProductionEvent;
use frontline_core::simulation::{MatchOutcome, Simulation, TickEvents};
use serde::{Deserialize, Serialize};

/// Protocol version announced in the `ready` line.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance simulation by N ticks (default: 1).
    Tick {
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Query current match state without advancing time.
    Query,

    /// Move units towards a point in formation.
    Move { units: Vec<EntityId>, x: f64, y: f64 },

    /// Attack a specific entity.
    Attack { units: Vec<EntityId>, target: EntityId },

    /// Clear move and attack orders.
    Stop { units: Vec<EntityId> },

    /// Construct a building on owned territory.
    Place {
        building_type: BuildingKind,
        x: f64,
        y: f64,
        faction: u8,
    },

    /// Queue a unit at a production building.
    Queue { building: EntityId, unit_type: UnitKind },

    /// Cancel a queued unit by index (refunds part of its cost).
    Cancel {
        building: EntityId,
        #[serde(default)]
        index: usize,
    },

    /// Set where a building sends finished units.
    Rally { building: EntityId, x: f64, y: f64 },

    /// Sell a building for a partial refund.
    Sell { building: EntityId },

    /// Upgrade a defensive structure.
    Upgrade { building: EntityId },

    /// Upgrade a resource site on owned territory.
    UpgradeSite { site: EntityId, faction: u8 },

    /// Buy or sell resources at the market.
    Trade {
        faction: u8,
        resource: ResourceKind,
        amount: f64,
        side: TradeSide,
    },

    /// Report the current state hash (for determinism verification).
    Hash,

    /// Write a binary world snapshot to a file.
    Save { path: String },

    /// Restore a binary world snapshot from a file.
    Load { path: String },

    /// Quit the runner.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

/// Direction of a market trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    /// Exchange resources for dollars.
    Sell,
    /// Exchange dollars for resources.
    Buy,
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready { version: String, tick: u64 },

    /// Acknowledgment of a command.
    Ack { cmd: String },

    /// Error processing a command.
    Error {
        message: String,
        /// Stable reason code for rejected orders.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        code: Option<String>,
        cmd: Option<String>,
    },

    /// Result of one or more ticks.
    Ticked { tick: u64, summary: TickSummary },

    /// Current match state.
    State(MatchState),

    /// A building was placed.
    Placed {
        entity_id: EntityId,
        building_type: BuildingKind,
    },

    /// A building or resource site reached a new level.
    Upgraded { entity_id: EntityId, level: u8 },

    /// A market trade completed.
    Traded {
        resource: ResourceKind,
        amount: f64,
        dollars: f64,
    },

    /// State hash for determinism verification.
    StateHash { tick: u64, hash: u64 },

    /// A snapshot was written.
    Saved { path: String, tick: u64 },

    /// A snapshot was restored.
    Loaded { path: String, tick: u64 },

    /// The match has been decided.
    GameOver { outcome: MatchOutcome, ticks: u64 },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Snapshot of the match for external controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub tick: u64,
    pub elapsed: f64,
    pub factions: Vec<FactionState>,
    pub units: Vec<UnitState>,
    pub buildings: Vec<BuildingState>,
    pub resource_sites: Vec<SiteState>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub outcome: Option<MatchOutcome>,
    pub hash: u64,
}

/// Per-faction economy and territory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionState {
    pub id: u8,
    pub dollars: f64,
    pub resources: BTreeMap<ResourceKind, f64>,
    pub tiles: usize,
    pub units: usize,
    pub buildings: usize,
    pub eliminated: bool,
}

/// State of a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    pub id: EntityId,
    pub kind: UnitKind,
    pub faction: u8,
    pub x: f64,
    pub y: f64,
    pub hp: f64,
    pub max_hp: f64,
    pub state: CombatState,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target: Option<EntityId>,
}

/// State of a single building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingState {
    pub id: EntityId,
    pub kind: BuildingKind,
    pub faction: u8,
    pub x: f64,
    pub y: f64,
    pub hp: f64,
    pub max_hp: f64,
    pub level: u8,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub queue: Vec<UnitKind>,
    pub progress: f64,
}

/// State of a resource site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteState {
    pub id: EntityId,
    pub resource: ResourceKind,
    pub tile_x: i32,
    pub tile_y: i32,
    pub level: u8,
    pub rate_per_minute: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub owner: Option<u8>,
}

/// Condensed events from one or more ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    /// Tiles that changed owner, as `(x, y, new owner)`.
    pub captured: Vec<(i32, i32, u8)>,
    /// Units that finished production.
    pub produced: Vec<EntityId>,
    /// Buildings placed by orders.
    pub placed: Vec<EntityId>,
    /// Hits landed.
    pub hits: usize,
    /// Hits that killed their target.
    pub kills: usize,
    /// Entities evicted.
    pub removed: Vec<EntityId>,
    /// Factions eliminated.
    pub eliminated: Vec<u8>,
}

impl TickSummary {
    /// Fold one tick's events into the summary.
    pub fn absorb(&mut self, events: &TickEvents) {
        for capture in &events.captures {
            if let CaptureEvent::TileCaptured { tile, faction, .. } = capture {
                self.captured.push((tile.x, tile.y, faction.0));
            }
        }
        for event in events.orders.iter().chain(&events.production) {
            match event {
                ProductionEvent::UnitCompleted { unit, .. } => self.produced.push(*unit),
                ProductionEvent::BuildingPlaced { building, .. } => self.placed.push(*building),
                _ => {}
            }
        }
        self.hits += events.damage.len();
        self.kills += events.damage.iter().filter(|hit| hit.killed).count();
        self.removed.extend(&events.removed.units);
        self.removed.extend(&events.removed.buildings);
        self.eliminated.extend(events.eliminated.iter().map(|f| f.0));
    }
}

fn to_f64(value: Fixed) -> f64 {
    value.to_num::<f64>()
}

impl MatchState {
    /// Capture the controller-facing view of a simulation.
    #[must_use]
    pub fn capture(sim: &Simulation) -> Self {
        let store = sim.store();
        let grid = sim.grid();
        let level_bonus = sim.config().resource_level_bonus;

        let factions = sim
            .factions()
            .iter()
            .map(|&faction| {
                let ledger = sim.ledger(faction).copied().unwrap_or_default();
                FactionState {
                    id: faction.0,
                    dollars: to_f64(ledger.dollars),
                    resources: ResourceKind::ALL
                        .into_iter()
                        .map(|kind| (kind, to_f64(ledger.resource(kind))))
                        .collect(),
                    tiles: grid.territory_count(faction),
                    units: store.units_of(faction).count(),
                    buildings: store.buildings_of(faction).count(),
                    eliminated: sim.is_eliminated(faction),
                }
            })
            .collect();

        let units = store
            .units()
            .map(|unit| UnitState {
                id: unit.id,
                kind: unit.kind,
                faction: unit.owner.0,
                x: to_f64(unit.position.x),
                y: to_f64(unit.position.y),
                hp: to_f64(unit.health.current),
                max_hp: to_f64(unit.health.max),
                state: unit.combat_state,
                target: unit.attack_target,
            })
            .collect();

        let buildings = store
            .buildings()
            .map(|building| BuildingState {
                id: building.id,
                kind: building.kind,
                faction: building.owner.0,
                x: to_f64(building.position.x),
                y: to_f64(building.position.y),
                hp: to_f64(building.health.current),
                max_hp: to_f64(building.health.max),
                level: building.level,
                queue: building.queue.items().collect(),
                progress: to_f64(building.queue.progress()),
            })
            .collect();

        let resource_sites = store
            .resource_sites()
            .map(|site| SiteState {
                id: site.id,
                resource: site.resource,
                tile_x: site.tile.x,
                tile_y: site.tile.y,
                level: site.level,
                rate_per_minute: to_f64(site.rate_per_minute(level_bonus)),
                owner: grid.owner_of(site.tile).map(|f| f.0),
            })
            .collect();

        Self {
            tick: sim.tick_count(),
            elapsed: to_f64(sim.elapsed()),
            factions,
            units,
            buildings,
            resource_sites,
            outcome: sim.outcome(),
            hash: sim.state_hash(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Convert a protocol coordinate pair into a map position.
///
/// Returns `None` for NaN, infinite or out-of-range values.
#[must_use]
pub fn point(x: f64, y: f64) -> Option<Vec2Fixed> {
    Some(Vec2Fixed::new(Fixed::checked_from_num(x)?, Fixed::checked_from_num(y)?))
}

impl Response {
    /// Create a ready response.
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create an acknowledgment.
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            code: None,
            cmd: cmd.map(String::from),
        }
    }

    /// Create an error response for a rejected order.
    pub fn rejected(error: CommandError, cmd: &str) -> Self {
        Self::Error {
            message: error.to_string(),
            code: Some(error.code().to_string()),
            cmd: Some(cmd.to_string()),
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","message":"Serialization failed: {}"}}"#,
                e
            )
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::Stop { .. } => "stop",
            Self::Place { .. } => "place",
            Self::Queue { .. } => "queue",
            Self::Cancel { .. } => "cancel",
            Self::Rally { .. } => "rally",
            Self::Sell { .. } => "sell",
            Self::Upgrade { .. } => "upgrade",
            Self::UpgradeSite { .. } => "upgrade_site",
            Self::Trade { .. } => "trade",
            Self::Hash => "hash",
            Self::Save { .. } => "save",
            Self::Load { .. } => "load",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontline_core::archetypes::ArchetypeTable;
    use frontline_core::config::SimConfig;
    use frontline_core::factions::FactionId;
    use frontline_core::territory::TileCoord;

    #[test]
    fn test_parse_tick_command() {
        let json = r#"{"cmd":"tick","count":60}"#;
        let cmd = Command::from_json(json).unwrap();
        assert!(matches!(cmd, Command::Tick { count: 60 }));
    }

    #[test]
    fn test_default_tick_count() {
        let json = r#"{"cmd":"tick"}"#;
        let cmd = Command::from_json(json).unwrap();
        assert!(matches!(cmd, Command::Tick { count: 1 }));
    }

    #[test]
    fn test_parse_move_command() {
        let json = r#"{"cmd":"move","units":[3,4],"x":100.0,"y":200.5}"#;
        let cmd = Command::from_json(json).unwrap();
        assert!(matches!(
            cmd,
            Command::Move { units, x, y } if units == vec![3, 4] && x == 100.0 && y == 200.5
        ));
    }

    #[test]
    fn test_parse_kinds_by_snake_case_id() {
        let place = Command::from_json(r#"{"cmd":"place","building_type":"tank_factory","x":1,"y":2,"faction":1}"#)
            .unwrap();
        assert!(matches!(
            place,
            Command::Place { building_type: BuildingKind::TankFactory, faction: 1, .. }
        ));

        let queue = Command::from_json(r#"{"cmd":"queue","building":7,"unit_type":"machine_gunner"}"#).unwrap();
        assert_eq!(
            queue,
            Command::Queue {
                building: 7,
                unit_type: UnitKind::MachineGunner
            }
        );

        let trade =
            Command::from_json(r#"{"cmd":"trade","faction":0,"resource":"oil","amount":5,"side":"sell"}"#).unwrap();
        assert_eq!(trade.name(), "trade");
    }

    #[test]
    fn test_unknown_kind_is_a_parse_error() {
        assert!(Command::from_json(r#"{"cmd":"queue","building":7,"unit_type":"dragon"}"#).is_err());
        assert!(Command::from_json(r#"{"cmd":"warp"}"#).is_err());
    }

    #[test]
    fn test_rejected_carries_reason_code() {
        let line = Response::rejected(CommandError::QueueFull, "queue").to_json_line();
        assert!(line.contains(r#""type":"error""#));
        assert!(line.contains(r#""code":"queue_full""#));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_plain_error_omits_code() {
        let line = Response::error("bad json", None).to_json_line();
        assert!(!line.contains("code"));
    }

    #[test]
    fn test_point_rejects_non_finite() {
        assert!(point(f64::NAN, 1.0).is_none());
        assert!(point(1.0, f64::INFINITY).is_none());
        assert_eq!(point(3.0, 4.0), Some(Vec2Fixed::from_ints(3, 4)));
    }

    #[test]
    fn test_match_state_capture() {
        let mut sim = Simulation::new(SimConfig::default(), ArchetypeTable::default(), 8, 8, 1).unwrap();
        sim.setup_faction(FactionId(0), TileCoord::new(1, 1)).unwrap();
        sim.setup_faction(FactionId(1), TileCoord::new(6, 6)).unwrap();

        let state = MatchState::capture(&sim);
        assert_eq!(state.factions.len(), 2);
        assert_eq!(state.units.len(), 10);
        assert_eq!(state.buildings.len(), 4);
        assert_eq!(state.factions[0].tiles, 9);
        assert_eq!(state.factions[0].dollars, 10_000.0);
        assert_eq!(state.hash, sim.state_hash());

        let line = Response::State(state).to_json_line();
        assert!(line.contains(r#""type":"state""#));
        assert!(line.contains(r#""kind":"headquarters""#));
    }

    #[test]
    fn test_summary_absorbs_events() {
        let mut sim = Simulation::new(SimConfig::default(), ArchetypeTable::default(), 8, 8, 1).unwrap();
        sim.setup_faction(FactionId(0), TileCoord::new(1, 1)).unwrap();
        let barracks = sim
            .store()
            .buildings_of(FactionId(0))
            .find(|b| b.kind == BuildingKind::Barracks)
            .map(|b| b.id)
            .unwrap();
        sim.queue_unit(barracks, UnitKind::Rifleman).unwrap();

        let mut summary = TickSummary::default();
        for _ in 0..60 {
            let events = sim.tick(Fixed::from_num(1) / 10);
            summary.absorb(&events);
        }
        assert_eq!(summary.produced.len(), 1);
        assert!(summary.eliminated.is_empty());
    }
}
