//! Batch match runner for balance testing.
//!
//! Runs many seeds of one scenario in parallel using rayon and aggregates
//! win rates, match lengths and per-faction averages.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::match_runner::{run_match, MatchReport};
use crate::scenario::Scenario;

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario to run.
    pub scenario: Scenario,
    /// Number of matches to run.
    pub game_count: u32,
    /// Seed of the first match; match `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Tick limit per match (`None` = the scenario's time limit).
    pub max_ticks: Option<u64>,
    /// Maximum parallel matches (0 = rayon default).
    pub parallel_games: usize,
    /// Where to write `batch.json`, if anywhere.
    pub output_dir: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::skirmish_1v1(),
            game_count: 100,
            seed_start: 0,
            max_ticks: None,
            parallel_games: 0,
            output_dir: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario.
    pub fn new(scenario: Scenario, game_count: u32) -> Self {
        Self {
            scenario,
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory.
    #[must_use]
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    /// Set seed start.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the tick limit.
    #[must_use]
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallel_games = threads;
        self
    }
}

/// Error during a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Match index.
    pub game_index: u32,
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Aggregate statistics over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Matches completed.
    pub total_games: u32,
    /// Wins per faction index.
    pub wins: BTreeMap<u8, u32>,
    /// Matches where every faction was eliminated on the same tick.
    pub draws: u32,
    /// Matches that hit the tick limit.
    pub timeouts: u32,
    /// Mean match length in ticks.
    pub average_ticks: f64,
    /// Mean units produced per faction index.
    pub average_units_produced: BTreeMap<u8, f64>,
    /// Mean tiles owned at the end per faction index.
    pub average_tiles_owned: BTreeMap<u8, f64>,
}

impl BatchSummary {
    /// Aggregate a set of match reports.
    #[must_use]
    pub fn from_reports(reports: &[MatchReport]) -> Self {
        let mut summary = Self {
            total_games: reports.len() as u32,
            ..Self::default()
        };
        if reports.is_empty() {
            return summary;
        }

        let mut units: BTreeMap<u8, u64> = BTreeMap::new();
        let mut tiles: BTreeMap<u8, u64> = BTreeMap::new();
        let mut total_ticks = 0u64;
        for report in reports {
            total_ticks += report.ticks;
            match (report.outcome, report.winner()) {
                (None, _) => summary.timeouts += 1,
                (Some(_), Some(winner)) => *summary.wins.entry(winner).or_default() += 1,
                (Some(_), None) => summary.draws += 1,
            }
            for faction in &report.factions {
                *units.entry(faction.faction).or_default() += u64::from(faction.units_produced);
                *tiles.entry(faction.faction).or_default() += faction.tiles_owned as u64;
            }
        }

        let games = reports.len() as f64;
        summary.average_ticks = total_ticks as f64 / games;
        summary.average_units_produced = units.into_iter().map(|(f, n)| (f, n as f64 / games)).collect();
        summary.average_tiles_owned = tiles.into_iter().map(|(f, n)| (f, n as f64 / games)).collect();
        summary
    }

    /// Win rate of a faction over all completed matches.
    #[must_use]
    pub fn win_rate(&self, faction: u8) -> f64 {
        if self.total_games == 0 {
            return 0.0;
        }
        f64::from(self.wins.get(&faction).copied().unwrap_or(0)) / f64::from(self.total_games)
    }

    /// Whether every faction's decided-match win rate is within `threshold` of the others.
    #[must_use]
    pub fn is_balanced(&self, threshold: f64) -> bool {
        let decided: u32 = self.wins.values().sum();
        if decided == 0 {
            return true;
        }
        let rates: Vec<f64> = self.wins.values().map(|w| f64::from(*w) / f64::from(decided)).collect();
        let max = rates.iter().copied().fold(0.0, f64::max);
        let min = if rates.len() < self.average_units_produced.len() {
            0.0
        } else {
            rates.iter().copied().fold(1.0, f64::min)
        };
        max - min <= threshold
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual match reports, in seed order.
    pub games: Vec<MatchReport>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
    /// Errors encountered.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

fn run_all(config: &BatchConfig, completed: &AtomicU32) -> Vec<Result<MatchReport, BatchError>> {
    (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            let result = run_match(&config.scenario, seed, config.max_ticks).map_err(|e| {
                warn!("Game {} failed: {}", i, e);
                BatchError {
                    game_index: i,
                    seed,
                    message: e.to_string(),
                }
            });
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 10 == 0 {
                debug!("Progress: {}/{}", done, config.game_count);
            }
            result
        })
        .collect()
}

/// Run a batch of matches.
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let completed = AtomicU32::new(0);
    info!(
        "Starting batch run: {} games of '{}'",
        config.game_count, config.scenario.name
    );

    let results = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games)
            .build()
        {
            Ok(pool) => pool.install(|| run_all(&config, &completed)),
            Err(e) => {
                warn!("Could not build a {}-thread pool ({}), using the global pool", config.parallel_games, e);
                run_all(&config, &completed)
            }
        }
    } else {
        run_all(&config, &completed)
    };

    let mut games = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(report) => games.push(report),
            Err(e) => errors.push(e),
        }
    }

    let summary = BatchSummary::from_reports(&games);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        "Batch complete: {} games in {:.1}s ({} errors)",
        games.len(),
        duration_seconds,
        errors.len()
    );

    BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    }
}

/// Run the same seed `runs` times and check every run ends in the same state.
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32, max_ticks: Option<u64>) -> bool {
    let hashes: Vec<Option<u64>> = (0..runs.max(2))
        .into_par_iter()
        .map(|_| run_match(scenario, seed, max_ticks).ok().map(|r| r.final_state_hash))
        .collect();
    let first = hashes[0];
    first.is_some() && hashes.iter().all(|h| *h == first)
}
