//! Headless match runner implementation.
//!
//! Reads [`Command`] lines, applies them to a [`Simulation`] and writes one
//! [`Response`] line per command (plus a `game_over` line when a tick decides
//! the match). AI-controlled factions act before every tick.

use std::io::{BufRead, Write};

use frontline_core::error::CommandError;
use frontline_core::factions::FactionId;
use frontline_core::math::Fixed;
use frontline_core::simulation::Simulation;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ai::{AiController, AiProfile, ProfileError};
use crate::protocol::{point, Command, MatchState, Response, TickSummary, TradeSide};
use crate::scenario::{Controller, Scenario, ScenarioError};

/// Error type for the runner loop.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Reading commands or writing responses failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The scenario could not be built.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// An AI profile could not be resolved.
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Headless runner configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Output state after every tick command (vs only on query).
    pub auto_state_output: bool,
    /// Upper bound on ticks a single `tick` command may run.
    pub max_ticks_per_command: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            auto_state_output: false,
            max_ticks_per_command: 100_000,
        }
    }
}

/// Drives one simulation from a command stream.
#[derive(Debug)]
pub struct HeadlessRunner {
    sim: Simulation,
    ais: Vec<AiController>,
    dt: Fixed,
    config: HeadlessConfig,
    game_over_sent: bool,
}

/// Build the AI controllers a scenario asks for.
pub fn scenario_controllers(scenario: &Scenario) -> Result<Vec<AiController>, ProfileError> {
    scenario
        .factions
        .iter()
        .enumerate()
        .filter_map(|(index, setup)| match &setup.controller {
            Controller::Ai { profile } => Some((index, profile)),
            Controller::External | Controller::Idle => None,
        })
        .map(|(index, profile)| {
            let profile = AiProfile::resolve(profile)?;
            Ok(AiController::new(FactionId::new(index as u8), profile))
        })
        .collect()
}

impl HeadlessRunner {
    /// Wrap an existing simulation.
    #[must_use]
    pub fn new(sim: Simulation, dt: Fixed) -> Self {
        Self {
            sim,
            ais: Vec::new(),
            dt,
            config: HeadlessConfig::default(),
            game_over_sent: false,
        }
    }

    /// Build the scenario's match and its AI controllers.
    pub fn from_scenario(scenario: &Scenario, config: HeadlessConfig) -> Result<Self, RunnerError> {
        let sim = scenario.build_simulation()?;
        let ais = scenario_controllers(scenario)?;
        info!(
            scenario = %scenario.name,
            factions = scenario.factions.len(),
            ai = ais.len(),
            "Headless runner ready"
        );
        Ok(Self {
            sim,
            ais,
            dt: scenario.dt(),
            config,
            game_over_sent: false,
        })
    }

    /// Set the runner configuration.
    #[must_use]
    pub fn with_config(mut self, config: HeadlessConfig) -> Self {
        self.config = config;
        self
    }

    /// Add an AI controller.
    #[must_use]
    pub fn with_ai(mut self, controller: AiController) -> Self {
        self.ais.push(controller);
        self
    }

    /// The simulation being driven.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Read commands until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<(), RunnerError> {
        output.write_all(Response::ready(self.sim.tick_count()).to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let responses = self.handle_line(line);
            let quit = responses.iter().any(|r| matches!(r, Response::Bye));
            for response in responses {
                output.write_all(response.to_json_line().as_bytes())?;
            }
            output.flush()?;
            if quit {
                return Ok(());
            }
        }

        debug!("Input closed");
        output.write_all(Response::Bye.to_json_line().as_bytes())?;
        output.flush()?;
        Ok(())
    }

    /// Parse and apply one JSON line.
    pub fn handle_line(&mut self, line: &str) -> Vec<Response> {
        match Command::from_json(line) {
            Ok(command) => self.handle(command),
            Err(e) => {
                warn!(error = %e, "Unparseable command");
                vec![Response::error(format!("Invalid command: {e}"), None)]
            }
        }
    }

    /// Apply one command.
    pub fn handle(&mut self, command: Command) -> Vec<Response> {
        let name = command.name();
        debug!(cmd = name, "Handling command");
        let response = match command {
            Command::Tick { count } => return self.step(count),
            Command::Query => Response::State(MatchState::capture(&self.sim)),
            Command::Hash => Response::StateHash {
                tick: self.sim.tick_count(),
                hash: self.sim.state_hash(),
            },
            Command::Quit => Response::Bye,
            Command::Move { units, x, y } => match point(x, y) {
                Some(target) => ack(name, self.sim.issue_move_order(&units, target)),
                None => bad_coordinates(name),
            },
            Command::Attack { units, target } => ack(name, self.sim.issue_attack_order(&units, target)),
            Command::Stop { units } => ack(name, self.sim.issue_stop_order(&units)),
            Command::Place {
                building_type,
                x,
                y,
                faction,
            } => match point(x, y) {
                Some(spot) => match self.sim.place_building(building_type, spot, FactionId::new(faction)) {
                    Ok(entity_id) => Response::Placed {
                        entity_id,
                        building_type,
                    },
                    Err(e) => Response::rejected(e, name),
                },
                None => bad_coordinates(name),
            },
            Command::Queue { building, unit_type } => ack(name, self.sim.queue_unit(building, unit_type)),
            Command::Cancel { building, index } => ack(name, self.sim.cancel_production(building, index)),
            Command::Rally { building, x, y } => match point(x, y) {
                Some(spot) => ack(name, self.sim.set_rally_point(building, spot)),
                None => bad_coordinates(name),
            },
            Command::Sell { building } => ack(name, self.sim.sell_building(building)),
            Command::Upgrade { building } => upgraded(name, building, self.sim.upgrade_building(building)),
            Command::UpgradeSite { site, faction } => upgraded(
                name,
                site,
                self.sim.upgrade_resource_site(site, FactionId::new(faction)),
            ),
            Command::Trade {
                faction,
                resource,
                amount,
                side,
            } => {
                let Some(amount) = Fixed::checked_from_num(amount) else {
                    return vec![Response::rejected(CommandError::InvalidAmount, name)];
                };
                let faction = FactionId::new(faction);
                let result = match side {
                    TradeSide::Sell => self.sim.sell_resource(faction, resource, amount),
                    TradeSide::Buy => self.sim.buy_resource(faction, resource, amount),
                };
                match result {
                    Ok(receipt) => Response::Traded {
                        resource: receipt.resource,
                        amount: receipt.amount.to_num(),
                        dollars: receipt.dollars.to_num(),
                    },
                    Err(e) => Response::rejected(e, name),
                }
            }
            Command::Save { path } => self.save(&path),
            Command::Load { path } => self.load(&path),
        };
        vec![response]
    }

    fn step(&mut self, count: u32) -> Vec<Response> {
        if self.sim.outcome().is_some() {
            return vec![Response::error("Match is already decided", Some("tick"))];
        }
        let count = count.min(self.config.max_ticks_per_command);
        let mut summary = TickSummary::default();
        for _ in 0..count {
            for ai in &mut self.ais {
                ai.update(&mut self.sim, self.dt);
            }
            let events = self.sim.tick(self.dt);
            summary.absorb(&events);
            if events.outcome.is_some() {
                break;
            }
        }

        let mut responses = vec![Response::Ticked {
            tick: self.sim.tick_count(),
            summary,
        }];
        if self.config.auto_state_output {
            responses.push(Response::State(MatchState::capture(&self.sim)));
        }
        if let Some(outcome) = self.sim.outcome() {
            if !self.game_over_sent {
                self.game_over_sent = true;
                info!(?outcome, tick = self.sim.tick_count(), "Match decided");
                responses.push(Response::GameOver {
                    outcome,
                    ticks: self.sim.tick_count(),
                });
            }
        }
        responses
    }

    fn save(&self, path: &str) -> Response {
        let written = self
            .sim
            .snapshot_bytes()
            .map_err(|e| e.to_string())
            .and_then(|bytes| std::fs::write(path, bytes).map_err(|e| e.to_string()));
        match written {
            Ok(()) => Response::Saved {
                path: path.to_string(),
                tick: self.sim.tick_count(),
            },
            Err(message) => Response::error(message, Some("save")),
        }
    }

    fn load(&mut self, path: &str) -> Response {
        let restored = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| self.sim.restore_from_bytes(&bytes).map_err(|e| e.to_string()));
        match restored {
            Ok(()) => {
                self.game_over_sent = self.sim.outcome().is_some();
                Response::Loaded {
                    path: path.to_string(),
                    tick: self.sim.tick_count(),
                }
            }
            Err(message) => Response::error(message, Some("load")),
        }
    }
}

fn ack<T>(name: &str, result: Result<T, CommandError>) -> Response {
    match result {
        Ok(_) => Response::ack(name),
        Err(e) => Response::rejected(e, name),
    }
}

fn upgraded(name: &str, entity_id: u64, result: Result<u8, CommandError>) -> Response {
    match result {
        Ok(level) => Response::Upgraded { entity_id, level },
        Err(e) => Response::rejected(e, name),
    }
}

fn bad_coordinates(name: &str) -> Response {
    Response::error("Coordinates must be finite numbers", Some(name))
}
